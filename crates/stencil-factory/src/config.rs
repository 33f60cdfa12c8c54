use serde::{Deserialize, Serialize};

use crate::error::FactoryResult;

/// Configuration for a blueprint [`Registry`](crate::Registry).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Log every created document at `info` level, with its overrides.
    pub debug: bool,
    /// Whether `reset()` removes tracked documents before forgetting the
    /// blueprints that created them.
    pub cleanup_on_reset: bool,
    /// When `true`, `cleanup()` fails if the store no longer has a tracked
    /// document. Otherwise the id is logged and skipped.
    pub strict_cleanup: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            debug: false,
            cleanup_on_reset: true,
            strict_cleanup: false,
        }
    }
}

impl RegistryConfig {
    /// Parse a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> FactoryResult<Self> {
        Ok(toml::from_str(input)?)
    }
}
