//! # Tank Combat Tools
//!
//! Command-line tools for development:
//! - Loadout and scenario validators
//! - Headless battle runs with JSON reports

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod error;
pub mod simulate;
pub mod validate;

pub use error::{ToolError, ToolResult};
