//! Error types for the combat simulation.
//!
//! Gameplay operations never fail with an error: rejected actions return
//! `0`, `false` or `None`. These errors cover configuration, data parsing
//! and lookups issued against the world from outside a tick.

use thiserror::Error;

use crate::collaborators::EntityId;

/// Result type alias using [`CombatError`].
pub type Result<T> = std::result::Result<T, CombatError>;

/// Top-level error type for the combat core.
#[derive(Debug, Error)]
pub enum CombatError {
    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Entity exists but lacks the component an operation needs.
    #[error("Entity {entity} has no {component} component")]
    MissingComponent {
        /// Entity that was addressed.
        entity: EntityId,
        /// Name of the missing component.
        component: &'static str,
    },

    /// A configuration value is out of its legal range.
    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfig {
        /// Dotted path of the offending field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParse {
        /// Path (or label) of the data that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid simulation state.
    #[error("Invalid simulation state: {0}")]
    InvalidState(String),
}

impl CombatError {
    /// Shorthand for an [`CombatError::InvalidConfig`] error.
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Check that a value is strictly positive.
pub(crate) fn ensure_positive(field: &str, value: f32) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(CombatError::invalid_config(
            field,
            format!("must be positive, got {value}"),
        ))
    }
}

/// Check that a value is zero or positive.
pub(crate) fn ensure_non_negative(field: &str, value: f32) -> Result<()> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(CombatError::invalid_config(
            field,
            format!("must not be negative, got {value}"),
        ))
    }
}

/// Check that a value lies in `[0, 1]`.
pub(crate) fn ensure_fraction(field: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(CombatError::invalid_config(
            field,
            format!("must be within [0, 1], got {value}"),
        ))
    }
}
