//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// How several incoming dependencies on the same endpoint are folded into one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationPolicy {
    /// Every dependency is evaluated against the original proposal and the last one
    /// evaluated decides. Only meaningful with at most one binding dependency per endpoint.
    #[default]
    LastWins,
    /// Each dependency is evaluated against the previous result, so the latest bound wins.
    Tightest,
}

impl PropagationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropagationPolicy::LastWins => "last_wins",
            PropagationPolicy::Tightest => "tightest",
        }
    }
}

impl std::str::FromStr for PropagationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last_wins" | "last-wins" | "last" => Ok(PropagationPolicy::LastWins),
            "tightest" | "max" => Ok(PropagationPolicy::Tightest),
            other => Err(format!("unknown propagation policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub propagation_policy: PropagationPolicy,
    /// Working hours that make up one day when turning work hours into a duration.
    pub hours_per_workday: u32,
    /// Refit group bounds to their children after a full propagation.
    pub fit_groups_to_children: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            propagation_policy: PropagationPolicy::default(),
            hours_per_workday: 8,
            fit_groups_to_children: true,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl EngineConfig {
    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hours_per_workday == 0 {
            return Err(ConfigError::Invalid(
                "hours_per_workday must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.propagation_policy, PropagationPolicy::LastWins);
    }

    #[test]
    fn policy_parses_from_snake_case() {
        let config = EngineConfig::from_json_str(
            r#"{ "propagation_policy": "tightest", "hours_per_workday": 7 }"#,
        )
        .unwrap();
        assert_eq!(config.propagation_policy, PropagationPolicy::Tightest);
        assert_eq!(config.hours_per_workday, 7);
        assert!(config.fit_groups_to_children);
    }

    #[test]
    fn zero_hours_per_day_is_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "hours_per_workday": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_from_path_reads_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), r#"{ "fit_groups_to_children": false }"#).unwrap();
        let config = EngineConfig::load_from_path(file.path()).unwrap();
        assert!(!config.fit_groups_to_children);
    }
}
