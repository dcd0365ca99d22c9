//! Expanded constraint declarations.
//!
//! A [`ConstraintDeclaration`] is one application of a constraint to an
//! element after multi-value wrappers have been unpacked, defaults applied
//! and composing constraints expanded into a tree.

use super::checks::missing_attributes;
use super::source::{ContainerSlot, RawConstraint, SourceOrigin};
use crate::core::{Group, TypeName};
use crate::error::ConfigurationError;
use crate::registry::{
    Attributes, CompositionType, ConstraintDefinition, ConstraintRegistry, ResolvedValidatorType,
    ValidatorError, GROUPS, MESSAGE, PAYLOAD, VALUE,
};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identity of a declaration.
///
/// Derived from where the declaration is written, so the same inherited
/// declaration has the same id in the metadata of every subtype.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclarationId(Arc<str>);

impl DeclarationId {
    /// Wraps a structural identifier.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeclarationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The element a constraint is declared on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstraintLocation {
    Bean,
    Property { name: String },
    Parameter { executable: String, index: usize },
    CrossParameter { executable: String },
    ReturnValue { executable: String },
    ContainerElement {
        parent: Box<ConstraintLocation>,
        slots: Vec<ContainerSlot>,
    },
}

impl ConstraintLocation {
    /// The location of a container slot nested in `parent`.
    pub fn container_element(parent: &ConstraintLocation, slot: ContainerSlot) -> Self {
        match parent {
            Self::ContainerElement { parent, slots } => {
                let mut slots = slots.clone();
                slots.push(slot);
                Self::ContainerElement {
                    parent: parent.clone(),
                    slots,
                }
            }
            other => Self::ContainerElement {
                parent: Box::new(other.clone()),
                slots: vec![slot],
            },
        }
    }
}

impl fmt::Display for ConstraintLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bean => f.write_str("<class>"),
            Self::Property { name } => f.write_str(name),
            Self::Parameter { executable, index } => write!(f, "{executable}#{index}"),
            Self::CrossParameter { executable } => write!(f, "{executable}<cross-parameter>"),
            Self::ReturnValue { executable } => write!(f, "{executable}<return value>"),
            Self::ContainerElement { parent, slots } => {
                write!(f, "{parent}")?;
                for slot in slots {
                    write!(f, "{slot}")?;
                }
                Ok(())
            }
        }
    }
}

/// One expanded constraint application. Immutable once built.
#[derive(Debug, Clone)]
pub struct ConstraintDeclaration {
    pub id: DeclarationId,
    pub constraint_type: TypeName,
    pub declaring_type: TypeName,
    pub location: ConstraintLocation,
    pub attributes: Attributes,
    /// Never empty. Includes the declaring type as implicit group whenever
    /// `Default` is present.
    pub groups: Vec<Group>,
    pub payload: Vec<String>,
    pub message_template: String,
    pub composing: Vec<Arc<ConstraintDeclaration>>,
    pub report_as_single_violation: bool,
    pub composition: CompositionType,
    pub validators: Arc<[ResolvedValidatorType]>,
    pub origin: SourceOrigin,
}

impl ConstraintDeclaration {
    /// Whether the declaration is validated when `group` is in scope.
    pub fn belongs_to(&self, group: &Group) -> bool {
        self.groups.contains(group)
    }

    pub fn is_composed(&self) -> bool {
        !self.composing.is_empty()
    }

    /// A resolved attribute value, defaults and overrides applied.
    pub fn attribute(&self, name: &str) -> Option<&JsonValue> {
        self.attributes.get(name)
    }

    /// An integer attribute, for validators that need a bound such as `min`.
    pub fn attribute_i64(&self, name: &str) -> Result<i64, ValidatorError> {
        let value = self
            .attribute(name)
            .ok_or_else(|| ValidatorError::MissingAttribute(name.to_string()))?;
        value.as_i64().ok_or_else(|| ValidatorError::InvalidAttribute {
            name: name.to_string(),
            value: value.to_string(),
        })
    }

    /// `Type.element` description used in error messages.
    pub fn element(&self) -> String {
        format!("{}.{}", self.declaring_type, self.location)
    }
}

impl PartialEq for ConstraintDeclaration {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConstraintDeclaration {}

impl Hash for ConstraintDeclaration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Where raw constraints are being expanded.
pub(crate) struct DeclarationSite<'a> {
    pub declaring_type: &'a TypeName,
    pub location: ConstraintLocation,
    pub origin: SourceOrigin,
    /// Position of the declaring layer among the type's layers.
    pub layer: usize,
    /// Distinguishes members that share a canonical location, e.g. a field
    /// and its getter.
    pub member: &'a str,
}

impl DeclarationSite<'_> {
    fn element(&self) -> String {
        format!("{}.{}", self.declaring_type, self.location)
    }

    fn id(&self, suffix: &str) -> DeclarationId {
        DeclarationId(Arc::from(format!(
            "{}:{}:{}:{:?}{}:{suffix}",
            self.declaring_type, self.location, self.member, self.origin, self.layer
        )))
    }
}

/// Expands raw constraints against the registry.
pub(crate) struct DeclarationFactory<'a> {
    registry: &'a ConstraintRegistry,
}

impl<'a> DeclarationFactory<'a> {
    pub fn new(registry: &'a ConstraintRegistry) -> Self {
        Self { registry }
    }

    /// Expands every raw constraint declared at `site`. Multi-value wrappers
    /// become one declaration per contained constraint.
    pub fn expand_all(
        &self,
        raws: &[RawConstraint],
        site: &DeclarationSite<'_>,
    ) -> Result<Vec<Arc<ConstraintDeclaration>>, ConfigurationError> {
        let mut declarations = Vec::new();
        for (i, raw) in raws.iter().enumerate() {
            declarations.extend(self.expand(raw, site, i.to_string())?);
        }
        Ok(declarations)
    }

    fn definition(&self, constraint_type: &TypeName) -> Result<&'a ConstraintDefinition, ConfigurationError> {
        self.registry
            .definition(constraint_type)
            .ok_or_else(|| ConfigurationError::UnknownConstraint {
                constraint: constraint_type.clone(),
            })
    }

    fn expand(
        &self,
        raw: &RawConstraint,
        site: &DeclarationSite<'_>,
        key: String,
    ) -> Result<Vec<Arc<ConstraintDeclaration>>, ConfigurationError> {
        let definition = self.definition(&raw.constraint_type)?;
        let Some(repeated) = &definition.repeated else {
            return Ok(vec![Arc::new(self.build(raw, definition, site, key)?)]);
        };

        let malformed = || ConfigurationError::MalformedMultiValueConstraint {
            constraint: raw.constraint_type.clone(),
            element: site.element(),
        };
        let items = raw
            .attributes
            .get(VALUE)
            .and_then(JsonValue::as_array)
            .ok_or_else(malformed)?;
        let mut declarations = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let attributes = item.as_object().ok_or_else(malformed)?.clone();
            let single = RawConstraint {
                constraint_type: repeated.clone(),
                attributes,
            };
            declarations.extend(self.expand(&single, site, format!("{key}[{i}]"))?);
        }
        Ok(declarations)
    }

    fn build(
        &self,
        raw: &RawConstraint,
        definition: &ConstraintDefinition,
        site: &DeclarationSite<'_>,
        key: String,
    ) -> Result<ConstraintDeclaration, ConfigurationError> {
        let mut attributes = definition.defaults.clone();
        attributes.extend(raw.attributes.clone());
        if let Some(missing) = missing_attributes(&definition.required_attributes, &attributes) {
            return Err(ConfigurationError::MissingAttributes {
                constraint: raw.constraint_type.clone(),
                element: site.element(),
                attributes: missing,
            });
        }
        let message_template = match attributes.get(MESSAGE) {
            Some(JsonValue::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => definition.default_message.clone(),
        };
        attributes.insert(MESSAGE.to_string(), JsonValue::String(message_template.clone()));

        let mut groups = string_list(attributes.get(GROUPS))
            .into_iter()
            .map(Group::from)
            .collect::<Vec<_>>();
        if groups.is_empty() {
            groups.push(Group::default());
        }
        let implicit = Group::from(site.declaring_type);
        if groups.iter().any(Group::is_default) && !groups.contains(&implicit) {
            groups.push(implicit);
        }
        let payload = string_list(attributes.get(PAYLOAD));

        let mut composing = Vec::with_capacity(definition.composing.len());
        let mut occurrences: HashMap<&TypeName, usize> = HashMap::new();
        for (i, member) in definition.composing.iter().enumerate() {
            let occurrence = occurrences.entry(&member.constraint_type).or_insert(0);
            *occurrence += 1;

            let mut member_attributes = member.attributes.clone();
            for rule in definition.overrides.iter().filter(|rule| {
                rule.target == member.constraint_type
                    && rule.occurrence.map_or(true, |o| o == *occurrence)
            }) {
                if let Some(value) = attributes.get(&rule.attribute) {
                    member_attributes.insert(rule.target_attribute.clone(), value.clone());
                }
            }
            for inherited in [GROUPS, PAYLOAD] {
                match raw.attributes.get(inherited) {
                    Some(value) => member_attributes.insert(inherited.to_string(), value.clone()),
                    None => member_attributes.remove(inherited),
                };
            }
            member_attributes
                .entry(MESSAGE.to_string())
                .or_insert_with(|| JsonValue::String(message_template.clone()));

            let member_raw = RawConstraint {
                constraint_type: member.constraint_type.clone(),
                attributes: member_attributes,
            };
            let member_definition = self.definition(&member.constraint_type)?;
            composing.push(Arc::new(self.build(
                &member_raw,
                member_definition,
                site,
                format!("{key}/{i}"),
            )?));
        }

        Ok(ConstraintDeclaration {
            id: site.id(&key),
            constraint_type: raw.constraint_type.clone(),
            declaring_type: site.declaring_type.clone(),
            location: site.location.clone(),
            attributes,
            groups,
            payload,
            message_template,
            composing,
            report_as_single_violation: definition.reports_as_single_violation(),
            composition: definition.composition,
            validators: Arc::from(self.registry.validator_types(&raw.constraint_type).to_vec()),
            origin: site.origin,
        })
    }
}

fn string_list(value: Option<&JsonValue>) -> Vec<String> {
    match value {
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Some(JsonValue::String(single)) => vec![single.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TypeGraph;
    use crate::registry::{builtin, ComposingConstraint};
    use serde_json::json;

    fn registry() -> ConstraintRegistry {
        let mut registry = ConstraintRegistry::new();
        builtin::register(&mut registry, &TypeGraph::with_builtins()).unwrap();
        registry
            .define(
                ConstraintDefinition::new("Range")
                    .composed_of(ComposingConstraint::new("Min").attr("value", 0))
                    .composed_of(ComposingConstraint::new("Max").attr("value", i64::MAX))
                    .default_attr("min", 0)
                    .default_attr("max", i64::MAX)
                    .override_attribute("min", "Min", "value", None)
                    .override_attribute("max", "Max", "value", None),
            )
            .unwrap();
        registry
            .define(
                ConstraintDefinition::new("Window")
                    .required("from")
                    .required("to")
                    .composed_of(ComposingConstraint::new("Size"))
                    .composed_of(ComposingConstraint::new("Size").attr("message", "second"))
                    .override_attribute("from", "Size", "min", Some(1))
                    .override_attribute("to", "Size", "max", Some(2)),
            )
            .unwrap();
        registry
    }

    fn site(declaring_type: &TypeName) -> DeclarationSite<'_> {
        DeclarationSite {
            declaring_type,
            location: ConstraintLocation::Property {
                name: "quantity".into(),
            },
            origin: SourceOrigin::Inline,
            layer: 0,
            member: "quantity",
        }
    }

    #[test]
    fn default_group_brings_implicit_type_group() {
        let registry = registry();
        let factory = DeclarationFactory::new(&registry);
        let order = TypeName::new("Order");
        let declarations = factory
            .expand_all(&[RawConstraint::new("NotNull")], &site(&order))
            .unwrap();
        assert_eq!(declarations[0].groups, vec![Group::default(), Group::from("Order")]);
        assert!(declarations[0].belongs_to(&"Order".into()));

        let explicit = factory
            .expand_all(&[RawConstraint::new("NotNull").groups(["Checks"])], &site(&order))
            .unwrap();
        assert_eq!(explicit[0].groups, vec![Group::from("Checks")]);
    }

    #[test]
    fn list_wrappers_expand_into_single_declarations() {
        let registry = registry();
        let factory = DeclarationFactory::new(&registry);
        let raw = RawConstraint::new("Size.List").attr(
            "value",
            json!([{ "min": 1, "groups": ["A"] }, { "max": 3, "groups": ["B"] }]),
        );
        let declarations = factory.expand_all(&[raw], &site(&"Order".into())).unwrap();
        assert_eq!(declarations.len(), 2);
        assert!(declarations.iter().all(|d| d.constraint_type.as_str() == "Size"));
        assert_eq!(declarations[0].attribute_i64("min").unwrap(), 1);
        assert_eq!(declarations[1].attribute_i64("max").unwrap(), 3);
        assert_ne!(declarations[0].id, declarations[1].id);
    }

    #[test]
    fn malformed_list_wrapper_is_rejected() {
        let registry = registry();
        let factory = DeclarationFactory::new(&registry);
        let raw = RawConstraint::new("Size.List").attr("value", 3);
        assert!(matches!(
            factory.expand_all(&[raw], &site(&"Order".into())),
            Err(ConfigurationError::MalformedMultiValueConstraint { .. })
        ));
    }

    #[test]
    fn overrides_flow_into_composing_members() {
        let registry = registry();
        let factory = DeclarationFactory::new(&registry);
        let raw = RawConstraint::new("Range")
            .attr("min", 5)
            .attr("max", 10)
            .groups(["Checks"])
            .message("out of range");
        let declaration = &factory.expand_all(&[raw], &site(&"Order".into())).unwrap()[0];

        let min = &declaration.composing[0];
        let max = &declaration.composing[1];
        assert_eq!(min.attribute_i64("value").unwrap(), 5);
        assert_eq!(max.attribute_i64("value").unwrap(), 10);
        assert_eq!(min.groups, vec![Group::from("Checks")]);
        assert_eq!(min.message_template, "out of range");
    }

    #[test]
    fn overrides_target_members_by_occurrence() {
        let registry = registry();
        let factory = DeclarationFactory::new(&registry);
        let raw = RawConstraint::new("Window").attr("from", 2).attr("to", 4);
        let declaration = &factory.expand_all(&[raw], &site(&"Order".into())).unwrap()[0];

        let first = &declaration.composing[0];
        let second = &declaration.composing[1];
        assert_eq!(first.attribute_i64("min").unwrap(), 2);
        assert_eq!(first.attribute_i64("max").unwrap(), builtin::MAX_SIZE);
        assert_eq!(second.attribute_i64("min").unwrap(), 0);
        assert_eq!(second.attribute_i64("max").unwrap(), 4);
        assert_eq!(second.message_template, "second");
        assert_eq!(first.message_template, declaration.message_template);
    }

    #[test]
    fn missing_required_attributes_are_all_reported() {
        let registry = registry();
        let factory = DeclarationFactory::new(&registry);
        let result = factory.expand_all(&[RawConstraint::new("Window")], &site(&"Order".into()));
        match result {
            Err(ConfigurationError::MissingAttributes { attributes, element, .. }) => {
                assert_eq!(attributes, vec!["from".to_string(), "to".to_string()]);
                assert_eq!(element, "Order.quantity");
            }
            other => panic!("Expected missing attributes, got {other:?}"),
        }
    }

    #[test]
    fn ids_are_stable_across_expansions() {
        let registry = registry();
        let factory = DeclarationFactory::new(&registry);
        let order = TypeName::new("Order");
        let first = factory.expand_all(&[RawConstraint::new("NotEmpty")], &site(&order)).unwrap();
        let second = factory.expand_all(&[RawConstraint::new("NotEmpty")], &site(&order)).unwrap();
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[0].composing[1].id, second[0].composing[1].id);
    }
}
