//! External JSON mapping descriptors.
//!
//! A descriptor is deserialized into [`TypeDeclarations`] and served as a
//! [`Mapping`] with [`SourceOrigin::Descriptor`] precedence:
//!
//! ```rust
//! use constraint_engine::metadata::{descriptor, DeclarationSource};
//!
//! let mapping = descriptor::from_json(r#"{
//!     "beans": [{
//!         "type": "Customer",
//!         "fields": [{
//!             "name": "orderList",
//!             "type": "List<Order>",
//!             "valid": true,
//!             "constraints": [{ "constraint": "NotNull" }]
//!         }]
//!     }]
//! }"#).unwrap();
//! assert_eq!(mapping.declared_types().len(), 1);
//! ```

use super::source::{
    ContainerElementDeclaration, ContainerSlot, ElementDeclaration, ExecutableDeclaration, Mapping,
    ParameterDeclaration, PropertyDeclaration, RawConstraint, SourceOrigin, TypeDeclarations,
};
use crate::core::{Group, TypeName, TypeRef};
use crate::error::ConfigurationError;
use crate::registry::Attributes;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A JSON mapping descriptor: constraint declarations for any number of
/// bean types, kept apart from the types themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingDocument {
    #[serde(default)]
    pub beans: Vec<BeanDescriptor>,
}

/// Declarations for one bean type. `ignore_inline` drops the inline
/// declarations of that type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BeanDescriptor {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub ignore_inline: bool,
    #[serde(default)]
    pub class_constraints: Vec<ConstraintDescriptor>,
    #[serde(default)]
    pub default_group_sequence: Option<Vec<String>>,
    #[serde(default)]
    pub fields: Vec<MemberDescriptor>,
    #[serde(default)]
    pub getters: Vec<MemberDescriptor>,
    #[serde(default)]
    pub methods: Vec<ExecutableDescriptor>,
    #[serde(default)]
    pub constructors: Vec<ExecutableDescriptor>,
}

/// One constraint use with its attribute values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConstraintDescriptor {
    pub constraint: String,
    #[serde(default)]
    pub attributes: Attributes,
}

/// A `from -> to` group conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConversionDescriptor {
    pub from: String,
    pub to: String,
}

/// Constraints, cascade and conversions on one container slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerElementDescriptor {
    pub slot: ContainerSlot,
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub constraints: Vec<ConstraintDescriptor>,
    #[serde(default)]
    pub convert_groups: Vec<ConversionDescriptor>,
    #[serde(default)]
    pub nested: Vec<ContainerElementDescriptor>,
}

/// Shape shared by fields, getters, parameters and return values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub constraints: Vec<ConstraintDescriptor>,
    #[serde(default)]
    pub container_elements: Vec<ContainerElementDescriptor>,
    #[serde(default)]
    pub convert_groups: Vec<ConversionDescriptor>,
    #[serde(default)]
    pub ignore_inline: bool,
}

pub type MemberDescriptor = ElementDescriptor;

/// A method or constructor entry of a bean descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutableDescriptor {
    /// Required for methods; constructors are named after their type.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ElementDescriptor>,
    #[serde(default)]
    pub cross_parameter: Vec<ConstraintDescriptor>,
    #[serde(default)]
    pub return_value: Option<ElementDescriptor>,
    #[serde(default)]
    pub ignore_inline: bool,
}

impl MappingDocument {
    /// Parses a descriptor document. Unknown fields are rejected.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json).map_err(|e| ConfigurationError::MalformedDescriptor { reason: e.to_string() })
    }

    /// Normalizes the document. A bean may be described once per document
    /// and a member once per bean.
    pub fn into_mapping(self) -> Result<Mapping, ConfigurationError> {
        let mut mapping = Mapping::new(SourceOrigin::Descriptor);
        let mut seen: HashSet<String> = HashSet::new();
        for bean in self.beans {
            if !seen.insert(bean.type_name.clone()) {
                return Err(ConfigurationError::DuplicateDescriptor {
                    type_name: TypeName::new(&bean.type_name),
                });
            }
            mapping = mapping.with(bean.into_declarations()?);
        }
        Ok(mapping)
    }
}

/// Parses a JSON descriptor into a declaration source.
pub fn from_json(json: &str) -> Result<Mapping, ConfigurationError> {
    MappingDocument::from_json(json)?.into_mapping()
}

impl BeanDescriptor {
    fn into_declarations(self) -> Result<TypeDeclarations, ConfigurationError> {
        let type_name = TypeName::new(&self.type_name);
        let mut members = MemberSet::new(&type_name);
        let mut declarations = TypeDeclarations::new(type_name.clone());
        declarations.ignore_inline = self.ignore_inline;
        declarations.class_constraints = raw_constraints(self.class_constraints);
        if let Some(sequence) = self.default_group_sequence {
            declarations = declarations.default_group_sequence(sequence);
        }

        for (getter, descriptors) in [(false, self.fields), (true, self.getters)] {
            for descriptor in descriptors {
                let name = descriptor.name.clone().ok_or_else(|| malformed("member without a name"))?;
                members.insert(format!("{}{name}", if getter { "getter " } else { "field " }))?;
                let mut property = if getter {
                    PropertyDeclaration::getter(name, descriptor.type_ref.clone())
                } else {
                    PropertyDeclaration::field(name, descriptor.type_ref.clone())
                };
                property.ignore_inline = descriptor.ignore_inline;
                property.element = descriptor.into_element();
                declarations = declarations.property(property);
            }
        }

        for descriptor in self.methods {
            let name = descriptor.name.clone().ok_or_else(|| malformed("method without a name"))?;
            let executable = descriptor.into_executable(ExecutableDeclaration::method(name));
            members.insert(executable_key(&executable))?;
            declarations = declarations.executable(executable);
        }
        for descriptor in self.constructors {
            let executable = descriptor.into_executable(ExecutableDeclaration::constructor(type_name.clone()));
            members.insert(executable_key(&executable))?;
            declarations = declarations.executable(executable);
        }
        Ok(declarations)
    }
}

impl ElementDescriptor {
    fn into_element(self) -> ElementDeclaration {
        ElementDeclaration {
            declared_type: self.type_ref,
            constraints: raw_constraints(self.constraints),
            cascade: self.valid,
            container_elements: self.container_elements.into_iter().map(container_element).collect(),
            group_conversions: conversions(self.convert_groups),
        }
    }
}

impl ExecutableDescriptor {
    fn into_executable(self, mut executable: ExecutableDeclaration) -> ExecutableDeclaration {
        executable.ignore_inline = self.ignore_inline;
        for parameter in self.parameters {
            let name = parameter.name.clone();
            let mut declaration = ParameterDeclaration::new(parameter.type_ref.clone());
            declaration.name = name;
            declaration.element = parameter.into_element();
            executable = executable.parameter(declaration);
        }
        executable.cross_parameter = raw_constraints(self.cross_parameter);
        executable.return_value = self.return_value.map(ElementDescriptor::into_element);
        executable
    }
}

struct MemberSet<'t> {
    type_name: &'t TypeName,
    seen: HashSet<String>,
}

impl<'t> MemberSet<'t> {
    fn new(type_name: &'t TypeName) -> Self {
        Self {
            type_name,
            seen: HashSet::new(),
        }
    }

    fn insert(&mut self, member: String) -> Result<(), ConfigurationError> {
        if self.seen.contains(&member) {
            return Err(ConfigurationError::DuplicateMember {
                type_name: self.type_name.clone(),
                member,
            });
        }
        self.seen.insert(member);
        Ok(())
    }
}

fn executable_key(executable: &ExecutableDeclaration) -> String {
    let parameters: Vec<String> = executable
        .parameters
        .iter()
        .map(|p| p.element.declared_type.to_string())
        .collect();
    format!("{}({})", executable.name, parameters.join(", "))
}

fn raw_constraints(descriptors: Vec<ConstraintDescriptor>) -> Vec<RawConstraint> {
    descriptors
        .into_iter()
        .map(|d| RawConstraint {
            constraint_type: TypeName::new(&d.constraint),
            attributes: d.attributes,
        })
        .collect()
}

fn conversions(descriptors: Vec<ConversionDescriptor>) -> Vec<(Group, Group)> {
    descriptors
        .into_iter()
        .map(|c| (Group::from(c.from), Group::from(c.to)))
        .collect()
}

fn container_element(descriptor: ContainerElementDescriptor) -> ContainerElementDeclaration {
    ContainerElementDeclaration {
        slot: descriptor.slot,
        constraints: raw_constraints(descriptor.constraints),
        cascade: descriptor.valid,
        group_conversions: conversions(descriptor.convert_groups),
        nested: descriptor.nested.into_iter().map(container_element).collect(),
    }
}

fn malformed(reason: &str) -> ConfigurationError {
    ConfigurationError::MalformedDescriptor {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::source::{DeclarationSource, MemberKind};

    const CAR: &str = r#"{
        "beans": [{
            "type": "Car",
            "ignore_inline": true,
            "default_group_sequence": ["Car", "CarChecks"],
            "class_constraints": [{ "constraint": "NotNull" }],
            "fields": [{
                "name": "passengers",
                "type": "Map<String, Person>",
                "container_elements": [{ "slot": "map_value", "valid": true }],
                "convert_groups": [{ "from": "Default", "to": "PersonChecks" }]
            }],
            "getters": [{
                "name": "getSeats",
                "type": "Long",
                "constraints": [{ "constraint": "Min", "attributes": { "value": 2, "groups": ["CarChecks"] } }]
            }],
            "methods": [{
                "name": "drive",
                "parameters": [{ "name": "speed", "type": "Long", "constraints": [{ "constraint": "NotNull" }] }],
                "return_value": { "type": "Long", "valid": false, "constraints": [{ "constraint": "NotNull" }] }
            }],
            "constructors": [{ "parameters": [{ "type": "String" }] }]
        }]
    }"#;

    #[test]
    fn descriptor_normalizes_into_declarations() {
        let mapping = from_json(CAR).unwrap();
        assert_eq!(mapping.origin(), SourceOrigin::Descriptor);
        let car = &mapping.declarations_for(&"Car".into())[0];
        assert!(car.ignore_inline);
        assert_eq!(car.default_group_sequence.as_ref().unwrap().len(), 2);
        assert_eq!(car.class_constraints.len(), 1);

        let passengers = &car.properties[0];
        assert_eq!(passengers.kind, MemberKind::Field);
        assert_eq!(passengers.element.container_elements[0].slot, ContainerSlot::MapValue);
        assert!(passengers.element.container_elements[0].cascade);
        assert_eq!(passengers.element.group_conversions.len(), 1);

        let seats = &car.properties[1];
        assert_eq!(seats.property_name(), "seats");
        assert_eq!(seats.element.constraints[0].attributes["value"], 2);

        assert_eq!(car.executables.len(), 2);
        assert_eq!(car.executables[0].parameters[0].name.as_deref(), Some("speed"));
        assert_eq!(car.executables[1].name, "Car");
    }

    #[test]
    fn a_bean_is_described_once_per_document() {
        let json = r#"{ "beans": [{ "type": "Car" }, { "type": "Car" }] }"#;
        assert!(matches!(
            from_json(json),
            Err(ConfigurationError::DuplicateDescriptor { .. })
        ));
    }

    #[test]
    fn a_member_is_described_once_per_bean() {
        let json = r#"{ "beans": [{ "type": "Car", "fields": [
            { "name": "seats", "type": "Long" },
            { "name": "seats", "type": "Long" }
        ] }] }"#;
        match from_json(json) {
            Err(ConfigurationError::DuplicateMember { member, .. }) => assert_eq!(member, "field seats"),
            other => panic!("Expected duplicate member, got {other:?}"),
        }
    }

    #[test]
    fn syntax_and_type_errors_are_malformed_descriptors() {
        assert!(matches!(
            from_json("{ beans: "),
            Err(ConfigurationError::MalformedDescriptor { .. })
        ));
        assert!(matches!(
            from_json(r#"{ "beans": [{ "type": "Car", "fields": [{ "name": "x", "type": "List<" }] }] }"#),
            Err(ConfigurationError::MalformedDescriptor { .. })
        ));
        assert!(matches!(
            from_json(r#"{ "beans": [{ "type": "Car", "methods": [{ "parameters": [] }] }] }"#),
            Err(ConfigurationError::MalformedDescriptor { .. })
        ));
    }
}
