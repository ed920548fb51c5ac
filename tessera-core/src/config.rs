//! Graph configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tunables for a [`ComputeGraph`](crate::graph::ComputeGraph).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Run the full consistency check after every structural mutation and
    /// panic if it fails. On by default in debug builds.
    pub verify_mutations: bool,
}

impl GraphConfig {
    /// Parse a config from a JSON document. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            verify_mutations: cfg!(debug_assertions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_use_defaults() {
        let config = GraphConfig::from_json("{}").unwrap();
        assert_eq!(config, GraphConfig::default());
    }

    #[test]
    fn parse_explicit_values() {
        let config = GraphConfig::from_json(r#"{"verify_mutations": false}"#).unwrap();
        assert!(!config.verify_mutations);
    }

    #[test]
    fn malformed_config_is_reported() {
        let err = GraphConfig::from_json(r#"{"verify_mutations": "yes"}"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid configuration"));
    }
}
