//! Constraint violations, their serializable reports and message
//! interpolation.

use crate::core::{BeanRef, PropertyPath, TypeName, Value};
use crate::metadata::ConstraintDeclaration;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// One failed constraint. Violations compare by value, so the same failure
/// found twice is reported once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstraintViolation {
    pub message: String,
    pub message_template: String,
    /// `None` for `validate_value` and constructor validation.
    pub root_bean: Option<BeanRef>,
    pub root_type: TypeName,
    pub leaf_bean: Option<BeanRef>,
    pub invalid_value: Value,
    pub property_path: PropertyPath,
    pub constraint: Arc<ConstraintDeclaration>,
    pub executable_parameters: Option<Vec<Value>>,
    pub executable_return_value: Option<Value>,
}

impl ConstraintViolation {
    /// The type of the violated constraint, e.g. `NotNull`.
    pub fn constraint_type(&self) -> &TypeName {
        &self.constraint.constraint_type
    }

    /// A serializable summary of this violation.
    pub fn report(&self) -> ViolationReport {
        ViolationReport {
            message: self.message.clone(),
            message_template: self.message_template.clone(),
            property_path: self.property_path.to_string(),
            constraint: self.constraint.constraint_type.to_string(),
            invalid_value: serde_json::to_value(&self.invalid_value).unwrap_or(JsonValue::Null),
            root_type: self.root_type.to_string(),
        }
    }
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.property_path, self.message)
    }
}

/// Serializable snapshot of a violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationReport {
    pub message: String,
    pub message_template: String,
    pub property_path: String,
    pub constraint: String,
    pub invalid_value: JsonValue,
    pub root_type: String,
}

/// What an interpolator may look at besides the template.
pub struct InterpolationContext<'a> {
    pub constraint: &'a ConstraintDeclaration,
    pub invalid_value: &'a Value,
}

/// Turns message templates into messages.
pub trait MessageInterpolator: Send + Sync {
    fn interpolate(&self, template: &str, context: &InterpolationContext<'_>) -> String;
}

/// Returns templates unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughInterpolator;

impl MessageInterpolator for PassthroughInterpolator {
    fn interpolate(&self, template: &str, _context: &InterpolationContext<'_>) -> String {
        template.to_string()
    }
}
