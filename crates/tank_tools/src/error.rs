//! Errors raised while loading data files and writing reports.

use std::path::{Path, PathBuf};

use tank_core::error::CombatError;
use thiserror::Error;

/// Errors that can occur in the command-line tools.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Failed to read or write a file.
    #[error("Failed to access '{path}': {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a RON file.
    #[error("Failed to parse RON file '{path}': {source}")]
    Parse {
        /// Path to the file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: ron::error::SpannedError,
    },

    /// The file parsed but its contents are out of range.
    #[error("Invalid data in '{path}': {source}")]
    Invalid {
        /// Path to the file.
        path: PathBuf,
        /// What the core rejected.
        #[source]
        source: CombatError,
    },

    /// Failed to encode a report.
    #[error("Failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

impl ToolError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn invalid(path: &Path, source: CombatError) -> Self {
        Self::Invalid {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;
