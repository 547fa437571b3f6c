//! Error types for the runtime itself.

use std::path::PathBuf;

use thiserror::Error;

use crate::condition::Condition;

#[derive(Debug, Error)]
pub enum ConditionError {
    /// A restart was invoked that the condition does not offer, or whose
    /// signal has already returned.
    #[error("no restart named `{name}` is available")]
    InvalidRestart { name: String },

    /// An error or interrupt reached the top-level runner uncaught.
    #[error("unhandled {0}")]
    Unhandled(Condition),

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid warning policy `{0}` (expected deferred, immediate or error)")]
    InvalidPolicy(String),
}

impl ConditionError {
    pub fn invalid_restart(name: impl Into<String>) -> Self {
        ConditionError::InvalidRestart { name: name.into() }
    }

    /// The uncaught condition, when this error came from the top-level runner.
    pub fn condition(&self) -> Option<&Condition> {
        match self {
            ConditionError::Unhandled(cnd) => Some(cnd),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConditionError::invalid_restart("muffle_warning");
        assert_eq!(
            err.to_string(),
            "no restart named `muffle_warning` is available"
        );

        let err = ConditionError::Unhandled(Condition::error("x must be numeric"));
        assert_eq!(err.to_string(), "unhandled Error: x must be numeric");
        assert!(err.condition().is_some());
    }
}
