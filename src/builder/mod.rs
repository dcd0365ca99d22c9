//! Builder API for ergonomic engine construction.
//!
//! This module provides the fluent [`ValidatorEngineBuilder`] and macros for
//! assembling dynamic object graphs with minimal boilerplate.

pub mod engine;
pub mod macros;

pub use engine::ValidatorEngineBuilder;

use crate::engine::ValidatorEngine;
use crate::error::ConfigurationError;
use crate::metadata::descriptor;

/// Build an engine whose declarations all come from one JSON mapping
/// descriptor.
///
/// # Example
///
/// ```
/// use constraint_engine::builder::from_descriptor;
///
/// let engine = from_descriptor(r#"{
///     "beans": [
///         { "type": "Order", "fields": [
///             { "name": "orderNumber", "type": "String", "constraints": [ { "constraint": "NotNull" } ] }
///         ] }
///     ]
/// }"#).unwrap();
/// assert!(engine.metadata_manager().types().contains(&"Order".into()));
/// ```
pub fn from_descriptor(json: &str) -> Result<ValidatorEngine, ConfigurationError> {
    ValidatorEngineBuilder::new()
        .source(descriptor::from_json(json)?)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TypeName, Value};

    #[test]
    fn descriptor_engine_validates() {
        let engine = from_descriptor(
            r#"{ "beans": [ { "type": "Order", "fields": [
                { "name": "orderNumber", "type": "String", "constraints": [ { "constraint": "NotNull" } ] }
            ] } ] }"#,
        )
        .unwrap();

        let order = crate::dynamic_bean!("Order", "orderNumber" => Value::Null);
        let violations = engine.validate(&order.into(), &[]).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].constraint_type(), &TypeName::new("NotNull"));
    }

    #[test]
    fn malformed_descriptors_are_rejected() {
        assert!(matches!(
            from_descriptor("{ \"beans\": 3 }"),
            Err(ConfigurationError::MalformedDescriptor { .. })
        ));
    }
}
