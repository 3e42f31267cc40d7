//! Configuration and construction errors.
//!
//! Contract violations inside the timing loop (load/store count mismatches, empty
//! port masks) are programming errors and panic; only fallible setup paths return
//! these errors.

use thiserror::Error;

/// Errors raised while loading a configuration or assembling a model.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration text is not valid JSON for the expected schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A configuration or trace file could not be opened or written.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A field holds a value the model cannot work with.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Human-readable description of the constraint.
        reason: String,
    },

    /// A builder was finished without a required component.
    #[error("missing component: {0}")]
    Missing(&'static str),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::Invalid`].
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
