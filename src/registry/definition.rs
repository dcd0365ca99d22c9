//! Constraint type definitions.
//!
//! A definition describes a constraint type independently of where it is
//! applied: its attributes, default message, composing constraints and
//! how composed results combine.

use crate::core::TypeName;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Attribute values of a constraint application (`min`, `message`, ...).
pub type Attributes = Map<String, JsonValue>;

/// Attributes every constraint carries.
pub const MESSAGE: &str = "message";
pub const GROUPS: &str = "groups";
pub const PAYLOAD: &str = "payload";
/// Attribute holding the bundled constraints of a multi-value wrapper.
pub const VALUE: &str = "value";

/// How the results of composing constraints combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompositionType {
    /// Every member must pass.
    #[default]
    And,
    /// At least one member must pass.
    Or,
    /// Every member must fail.
    AllFalse,
}

/// One constraint a composed constraint is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposingConstraint {
    pub constraint_type: TypeName,
    pub attributes: Attributes,
}

impl ComposingConstraint {
    pub fn new(constraint_type: impl Into<TypeName>) -> Self {
        Self {
            constraint_type: constraint_type.into(),
            attributes: Attributes::new(),
        }
    }

    /// Fixes an attribute of the composing constraint.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// Forwards an attribute of the composed constraint to a composing member.
///
/// `occurrence` is the 1-based position among composing members of the
/// same type; `None` targets every member of that type.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeOverride {
    pub attribute: String,
    pub target: TypeName,
    pub target_attribute: String,
    pub occurrence: Option<usize>,
}

/// Definition of a constraint type.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintDefinition {
    pub constraint_type: TypeName,
    pub default_message: String,
    /// Attributes that have no default and must be supplied at every use.
    pub required_attributes: Vec<String>,
    pub defaults: Attributes,
    pub composing: Vec<ComposingConstraint>,
    pub overrides: Vec<AttributeOverride>,
    pub report_as_single_violation: bool,
    pub composition: CompositionType,
    /// Set for multi-value wrappers: the constraint type bundled in `value`.
    pub repeated: Option<TypeName>,
}

impl ConstraintDefinition {
    /// A constraint type with the message template
    /// `{constraints.<type>.message}`, no attributes and no composition.
    ///
    /// # Example
    ///
    /// ```
    /// use constraint_engine::registry::{ComposingConstraint, ConstraintDefinition};
    ///
    /// let code = ConstraintDefinition::new("Code")
    ///     .composed_of(ComposingConstraint::new("NotBlank"))
    ///     .composed_of(ComposingConstraint::new("Size").attr("max", 3))
    ///     .report_as_single_violation();
    /// assert!(code.is_composed());
    /// assert_eq!(code.default_message, "{constraints.Code.message}");
    /// ```
    pub fn new(constraint_type: impl Into<TypeName>) -> Self {
        let constraint_type = constraint_type.into();
        Self {
            default_message: format!("{{constraints.{constraint_type}.message}}"),
            constraint_type,
            required_attributes: Vec::new(),
            defaults: Attributes::new(),
            composing: Vec::new(),
            overrides: Vec::new(),
            report_as_single_violation: false,
            composition: CompositionType::And,
            repeated: None,
        }
    }

    /// Multi-value wrapper bundling several applications of `repeated`.
    pub fn list_of(wrapper: impl Into<TypeName>, repeated: impl Into<TypeName>) -> Self {
        Self {
            repeated: Some(repeated.into()),
            ..Self::new(wrapper)
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.default_message = message.into();
        self
    }

    /// Marks `attribute` as mandatory at every use of the constraint.
    pub fn required(mut self, attribute: impl Into<String>) -> Self {
        self.required_attributes.push(attribute.into());
        self
    }

    /// Value `name` takes when a use does not set it.
    pub fn default_attr(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    /// Adds a composing constraint, evaluated before the constraint's own validators.
    pub fn composed_of(mut self, member: ComposingConstraint) -> Self {
        self.composing.push(member);
        self
    }

    /// Forwards `attribute` of this constraint to `target_attribute` of the
    /// composing constraint `target`. `occurrence` picks one of several
    /// composing constraints of the same type, counting from 1.
    pub fn override_attribute(
        mut self,
        attribute: impl Into<String>,
        target: impl Into<TypeName>,
        target_attribute: impl Into<String>,
        occurrence: Option<usize>,
    ) -> Self {
        self.overrides.push(AttributeOverride {
            attribute: attribute.into(),
            target: target.into(),
            target_attribute: target_attribute.into(),
            occurrence,
        });
        self
    }

    /// Reports failing composing constraints as one violation of this constraint.
    pub fn report_as_single_violation(mut self) -> Self {
        self.report_as_single_violation = true;
        self
    }

    /// How the results of the composing constraints are combined.
    pub fn composition(mut self, composition: CompositionType) -> Self {
        self.composition = composition;
        self
    }

    pub fn is_multi_value(&self) -> bool {
        self.repeated.is_some()
    }

    pub fn is_composed(&self) -> bool {
        !self.composing.is_empty()
    }

    /// `AllFalse` composition can only be reported as a single violation.
    pub fn reports_as_single_violation(&self) -> bool {
        self.report_as_single_violation || self.composition == CompositionType::AllFalse
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_message_is_a_template_key() {
        let definition = ConstraintDefinition::new("NotNull");
        assert_eq!(definition.default_message, "{constraints.NotNull.message}");
    }

    #[test]
    fn all_false_always_reports_single() {
        let definition = ConstraintDefinition::new("NeitherAB").composition(CompositionType::AllFalse);
        assert!(definition.reports_as_single_violation());
        assert!(!ConstraintDefinition::new("X").reports_as_single_violation());
    }

    #[test]
    fn list_wrappers_are_multi_value() {
        let wrapper = ConstraintDefinition::list_of("Size.List", "Size");
        assert!(wrapper.is_multi_value());
        assert_eq!(wrapper.repeated, Some(TypeName::new("Size")));
    }
}
