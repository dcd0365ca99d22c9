//! Engine configuration.

use crate::core::TypeName;
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};

/// Runtime switches of a validation engine.
///
/// # Example
///
/// ```rust
/// use constraint_engine::config::EngineConfig;
///
/// let config = EngineConfig::from_json(r#"{ "fail_fast": true, "preload": ["Customer"] }"#).unwrap();
/// assert!(config.fail_fast);
/// assert!(!config.closed_world);
/// assert_eq!(config.preload.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Stop at the first recorded violation.
    pub fail_fast: bool,
    /// Every bean type is known at build time: metadata is built eagerly and
    /// cycle tracking is skipped for types that provably cannot recur.
    pub closed_world: bool,
    /// Types whose metadata is built when the engine is assembled.
    pub preload: Vec<TypeName>,
}

impl EngineConfig {
    /// Defaults: collect every violation, open world, nothing preloaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a configuration document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json).map_err(|e| ConfigurationError::MalformedConfig {
            reason: e.to_string(),
        })
    }

    /// Stop at the first violation.
    pub fn fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    /// Enable the static cascade analysis.
    pub fn closed_world(mut self, enabled: bool) -> Self {
        self.closed_world = enabled;
        self
    }

    /// Build metadata for `type_name` when the engine is built.
    pub fn preload(mut self, type_name: impl Into<TypeName>) -> Self {
        self.preload.push(type_name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn malformed_json_is_a_configuration_error() {
        let result = EngineConfig::from_json("{ \"fail_fast\": 3 }");
        assert!(matches!(
            result,
            Err(ConfigurationError::MalformedConfig { .. })
        ));
    }

    #[test]
    fn builder_methods_compose() {
        let config = EngineConfig::new()
            .fail_fast(true)
            .closed_world(true)
            .preload("Car");
        assert!(config.fail_fast && config.closed_world);
        assert_eq!(config.preload, vec![TypeName::new("Car")]);
    }
}
