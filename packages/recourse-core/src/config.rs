//! Runtime configuration.
//!
//! Loaded from TOML, either a standalone file or an embedded string:
//!
//! ```toml
//! warning_policy = "immediate"
//! max_deferred_warnings = 10
//! report_chain = true
//! ```
//!
//! The `RECOURSE_WARN` environment variable overrides `warning_policy`.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConditionError;

/// Environment variable that overrides the configured warning policy.
pub const WARN_ENV_VAR: &str = "RECOURSE_WARN";

/// What happens to a warning no handler muffles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningPolicy {
    /// Buffer and report as one batch when the outermost scope exits.
    #[default]
    Deferred,
    /// Report each warning as it happens.
    Immediate,
    /// Promote the warning to an error wrapping it.
    Error,
}

impl FromStr for WarningPolicy {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deferred" => Ok(WarningPolicy::Deferred),
            "immediate" => Ok(WarningPolicy::Immediate),
            "error" => Ok(WarningPolicy::Error),
            other => Err(ConditionError::InvalidPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for WarningPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WarningPolicy::Deferred => "deferred",
            WarningPolicy::Immediate => "immediate",
            WarningPolicy::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub warning_policy: WarningPolicy,

    /// Warnings kept in the deferred buffer; later ones are only counted.
    pub max_deferred_warnings: usize,

    /// Walk `parent` links when reporting an unhandled error.
    pub report_chain: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            warning_policy: WarningPolicy::Deferred,
            max_deferred_warnings: 50,
            report_chain: true,
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConditionError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConditionError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| ConditionError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&content)
    }

    /// Apply `RECOURSE_WARN` if it is set.
    pub fn with_env_overrides(self) -> Result<Self, ConditionError> {
        match std::env::var(WARN_ENV_VAR) {
            Ok(value) => self.with_policy_override(Some(&value)),
            Err(_) => Ok(self),
        }
    }

    pub(crate) fn with_policy_override(mut self, value: Option<&str>) -> Result<Self, ConditionError> {
        if let Some(value) = value {
            self.warning_policy = value.parse()?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.warning_policy, WarningPolicy::Deferred);
        assert_eq!(config.max_deferred_warnings, 50);
        assert!(config.report_chain);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RuntimeConfig::from_toml_str(r#"warning_policy = "immediate""#).unwrap();
        assert_eq!(config.warning_policy, WarningPolicy::Immediate);
        assert_eq!(config.max_deferred_warnings, 50);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = RuntimeConfig::from_toml_str("warn_policy = 1").unwrap_err();
        assert!(matches!(err, ConditionError::ConfigParse(_)));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "warning_policy = \"error\"\nmax_deferred_warnings = 3").unwrap();

        let config = RuntimeConfig::from_path(file.path()).unwrap();
        assert_eq!(config.warning_policy, WarningPolicy::Error);
        assert_eq!(config.max_deferred_warnings, 3);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RuntimeConfig::from_path(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConditionError::ConfigRead { .. }));
    }

    #[test]
    fn test_policy_override() {
        let config = RuntimeConfig::default()
            .with_policy_override(Some("Immediate"))
            .unwrap();
        assert_eq!(config.warning_policy, WarningPolicy::Immediate);

        let err = RuntimeConfig::default()
            .with_policy_override(Some("loud"))
            .unwrap_err();
        assert!(matches!(err, ConditionError::InvalidPolicy(p) if p == "loud"));
    }
}
