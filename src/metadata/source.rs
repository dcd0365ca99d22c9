//! Normalized constraint declarations as delivered by declarative sources.
//!
//! Whatever a declaration came from (inline registration, a mapping
//! descriptor, the programmatic API) it reaches the metadata builder in
//! this shape.

use super::bean::DefaultGroupSequenceProvider;
use crate::core::{Group, TypeName, TypeRef};
use crate::registry::{Attributes, GROUPS, MESSAGE, PAYLOAD};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// Where a declaration came from. Later variants take precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceOrigin {
    Inline,
    Descriptor,
    Programmatic,
}

/// One constraint application before expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct RawConstraint {
    pub constraint_type: TypeName,
    pub attributes: Attributes,
}

impl RawConstraint {
    /// An application of `constraint_type` with no attributes set.
    pub fn new(constraint_type: impl Into<TypeName>) -> Self {
        Self {
            constraint_type: constraint_type.into(),
            attributes: Attributes::new(),
        }
    }

    /// Sets an attribute of this application.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Overrides the message template.
    pub fn message(self, message: impl Into<String>) -> Self {
        self.attr(MESSAGE, message.into())
    }

    /// Restricts the constraint to `groups` instead of `Default`.
    ///
    /// # Example
    ///
    /// ```
    /// use constraint_engine::metadata::RawConstraint;
    ///
    /// let constraint = RawConstraint::new("NotNull").groups(["Billing", "Shipping"]);
    /// assert_eq!(constraint.attributes["groups"], serde_json::json!(["Billing", "Shipping"]));
    /// ```
    pub fn groups<I, G>(self, groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<Group>,
    {
        let names: Vec<JsonValue> = groups
            .into_iter()
            .map(|g| {
                let group: Group = g.into();
                JsonValue::from(group.as_str())
            })
            .collect();
        self.attr(GROUPS, names)
    }

    pub fn payload<I, S>(self, payload: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<JsonValue> = payload.into_iter().map(|p| JsonValue::String(p.into())).collect();
        self.attr(PAYLOAD, names)
    }
}

/// Type argument slot of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerSlot {
    /// Element of a list, set, iterable or array.
    Element,
    MapKey,
    MapValue,
}

impl ContainerSlot {
    /// Index of the type argument this slot refers to.
    pub fn type_argument(self) -> usize {
        match self {
            Self::Element | Self::MapKey => 0,
            Self::MapValue => 1,
        }
    }
}

impl fmt::Display for ContainerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element => f.write_str("<element>"),
            Self::MapKey => f.write_str("<map key>"),
            Self::MapValue => f.write_str("<map value>"),
        }
    }
}

/// Constraints and cascading on one type argument of a container.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerElementDeclaration {
    pub slot: ContainerSlot,
    pub constraints: Vec<RawConstraint>,
    pub cascade: bool,
    pub group_conversions: Vec<(Group, Group)>,
    pub nested: Vec<ContainerElementDeclaration>,
}

impl ContainerElementDeclaration {
    /// A slot with nothing declared on it yet.
    pub fn new(slot: ContainerSlot) -> Self {
        Self {
            slot,
            constraints: Vec::new(),
            cascade: false,
            group_conversions: Vec::new(),
            nested: Vec::new(),
        }
    }

    /// Adds a constraint on the slot's values.
    pub fn constraint(mut self, constraint: RawConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Validates the beans held in this slot.
    pub fn cascade(mut self) -> Self {
        self.cascade = true;
        self
    }

    pub fn convert_group(mut self, from: impl Into<Group>, to: impl Into<Group>) -> Self {
        self.group_conversions.push((from.into(), to.into()));
        self
    }

    /// Declares a slot of the slot's own type argument, e.g. the elements
    /// of the lists in a `Map<String, List<Order>>`.
    pub fn nested(mut self, nested: ContainerElementDeclaration) -> Self {
        self.nested.push(nested);
        self
    }
}

/// Shared shape of properties, parameters and return values.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDeclaration {
    pub declared_type: TypeRef,
    pub constraints: Vec<RawConstraint>,
    pub cascade: bool,
    pub container_elements: Vec<ContainerElementDeclaration>,
    pub group_conversions: Vec<(Group, Group)>,
}

impl ElementDeclaration {
    /// An element of `declared_type` with nothing declared on it.
    pub fn new(declared_type: impl Into<TypeRef>) -> Self {
        Self {
            declared_type: declared_type.into(),
            constraints: Vec::new(),
            cascade: false,
            container_elements: Vec::new(),
            group_conversions: Vec::new(),
        }
    }
}

macro_rules! element_builder_methods {
    ($($path:ident).+) => {
        /// Adds a constraint on the element's value.
        pub fn constraint(mut self, constraint: RawConstraint) -> Self {
            self.$($path).+.constraints.push(constraint);
            self
        }

        /// Validates the bean held by the element.
        pub fn cascade(mut self) -> Self {
            self.$($path).+.cascade = true;
            self
        }

        /// Declares constraints or a cascade on a container slot.
        pub fn container_element(mut self, element: ContainerElementDeclaration) -> Self {
            self.$($path).+.container_elements.push(element);
            self
        }

        /// Validates the cascaded bean for `to` when `from` is in scope.
        pub fn convert_group(mut self, from: impl Into<Group>, to: impl Into<Group>) -> Self {
            self.$($path).+.group_conversions.push((from.into(), to.into()));
            self
        }
    };
}

/// How a property is read: directly, or through an accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Field,
    Getter,
}

/// A field or getter and what is declared on it.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDeclaration {
    /// Field name or accessor name (`getName`, `isActive`).
    pub member: String,
    pub kind: MemberKind,
    pub element: ElementDeclaration,
    /// Drop inline declarations for this member.
    pub ignore_inline: bool,
}

impl PropertyDeclaration {
    /// A field named `member`.
    pub fn field(member: impl Into<String>, declared_type: impl Into<TypeRef>) -> Self {
        Self {
            member: member.into(),
            kind: MemberKind::Field,
            element: ElementDeclaration::new(declared_type),
            ignore_inline: false,
        }
    }

    /// An accessor such as `getName`; the property is named `name`.
    pub fn getter(member: impl Into<String>, declared_type: impl Into<TypeRef>) -> Self {
        Self {
            kind: MemberKind::Getter,
            ..Self::field(member, declared_type)
        }
    }

    element_builder_methods!(element);

    pub fn ignore_inline(mut self) -> Self {
        self.ignore_inline = true;
        self
    }

    /// Logical property name: getter prefixes `get`, `is` and `has` are
    /// stripped and the rest decapitalized unless it starts with an acronym.
    pub fn property_name(&self) -> String {
        match self.kind {
            MemberKind::Field => self.member.clone(),
            MemberKind::Getter => canonical_property_name(&self.member),
        }
    }
}

pub(crate) fn canonical_property_name(accessor: &str) -> String {
    for prefix in ["get", "is", "has"] {
        if let Some(rest) = accessor.strip_prefix(prefix) {
            if rest.chars().next().is_some_and(char::is_uppercase) {
                return decapitalize(rest);
            }
        }
    }
    accessor.to_string()
}

fn decapitalize(name: &str) -> String {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let second_upper = name.chars().nth(1).is_some_and(char::is_uppercase);
    if second_upper {
        return name.to_string();
    }
    first.to_lowercase().chain(chars).collect()
}

/// One parameter of an executable. Unnamed parameters are reported as
/// `arg<index>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDeclaration {
    pub name: Option<String>,
    pub element: ElementDeclaration,
}

impl ParameterDeclaration {
    /// A parameter of `declared_type`.
    pub fn new(declared_type: impl Into<TypeRef>) -> Self {
        Self {
            name: None,
            element: ElementDeclaration::new(declared_type),
        }
    }

    /// Names the parameter in property paths.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    element_builder_methods!(element);
}

/// Method or constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutableKind {
    Method,
    Constructor,
}

/// A method or constructor with constraints on its parameters, across its
/// parameters, or on its return value.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutableDeclaration {
    pub kind: ExecutableKind,
    pub name: String,
    pub parameters: Vec<ParameterDeclaration>,
    pub cross_parameter: Vec<RawConstraint>,
    pub return_value: Option<ElementDeclaration>,
    pub ignore_inline: bool,
}

impl ExecutableDeclaration {
    /// A method named `name` with no parameters.
    pub fn method(name: impl Into<String>) -> Self {
        Self {
            kind: ExecutableKind::Method,
            name: name.into(),
            parameters: Vec::new(),
            cross_parameter: Vec::new(),
            return_value: None,
            ignore_inline: false,
        }
    }

    /// Constructors are named after their type.
    pub fn constructor(type_name: impl Into<TypeName>) -> Self {
        let type_name: TypeName = type_name.into();
        Self {
            kind: ExecutableKind::Constructor,
            ..Self::method(type_name.as_str())
        }
    }

    /// Appends the next parameter.
    pub fn parameter(mut self, parameter: ParameterDeclaration) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// A constraint on the argument list as a whole.
    pub fn cross_parameter(mut self, constraint: RawConstraint) -> Self {
        self.cross_parameter.push(constraint);
        self
    }

    /// Declares the return value.
    pub fn returns(mut self, return_value: ElementDeclaration) -> Self {
        self.return_value = Some(return_value);
        self
    }

    pub fn ignore_inline(mut self) -> Self {
        self.ignore_inline = true;
        self
    }
}

/// Reference to a per-instance default group sequence strategy.
#[derive(Clone)]
pub struct SequenceProviderRef(pub Arc<dyn DefaultGroupSequenceProvider>);

impl fmt::Debug for SequenceProviderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SequenceProviderRef")
    }
}

impl PartialEq for SequenceProviderRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Everything one source declares on one type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDeclarations {
    pub type_name: TypeName,
    /// Drop inline declarations for the whole type.
    pub ignore_inline: bool,
    pub class_constraints: Vec<RawConstraint>,
    pub properties: Vec<PropertyDeclaration>,
    pub executables: Vec<ExecutableDeclaration>,
    pub default_group_sequence: Option<Vec<Group>>,
    pub group_sequence_provider: Option<SequenceProviderRef>,
}

impl TypeDeclarations {
    /// No declarations for `type_name` yet.
    pub fn new(type_name: impl Into<TypeName>) -> Self {
        Self {
            type_name: type_name.into(),
            ignore_inline: false,
            class_constraints: Vec::new(),
            properties: Vec::new(),
            executables: Vec::new(),
            default_group_sequence: None,
            group_sequence_provider: None,
        }
    }

    /// Adds a class-level constraint.
    pub fn constraint(mut self, constraint: RawConstraint) -> Self {
        self.class_constraints.push(constraint);
        self
    }

    pub fn property(mut self, property: PropertyDeclaration) -> Self {
        self.properties.push(property);
        self
    }

    pub fn executable(mut self, executable: ExecutableDeclaration) -> Self {
        self.executables.push(executable);
        self
    }

    /// Redefines `Default` for this type. The list must contain the type's
    /// own name and must not contain `Default`.
    pub fn default_group_sequence<I, G>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<Group>,
    {
        self.default_group_sequence = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    /// Chooses the default group sequence per instance at validation time.
    pub fn group_sequence_provider(mut self, provider: Arc<dyn DefaultGroupSequenceProvider>) -> Self {
        self.group_sequence_provider = Some(SequenceProviderRef(provider));
        self
    }

    pub fn ignore_inline(mut self) -> Self {
        self.ignore_inline = true;
        self
    }
}

/// A producer of normalized declarations.
pub trait DeclarationSource: Send + Sync {
    fn origin(&self) -> SourceOrigin;

    /// Declarations for `type_name`, in source order. A well-formed
    /// descriptor yields at most one entry per type.
    fn declarations_for(&self, type_name: &TypeName) -> Vec<TypeDeclarations>;

    fn declared_types(&self) -> Vec<TypeName>;
}

/// In-memory declaration source.
#[derive(Debug, Clone)]
pub struct Mapping {
    origin: SourceOrigin,
    types: Vec<TypeDeclarations>,
}

impl Mapping {
    /// An empty source with the given precedence.
    pub fn new(origin: SourceOrigin) -> Self {
        Self {
            origin,
            types: Vec::new(),
        }
    }

    /// Declarations attached directly to types, the lowest precedence layer.
    pub fn inline() -> Self {
        Self::new(SourceOrigin::Inline)
    }

    /// Declarations made through the builder API, the highest precedence layer.
    pub fn programmatic() -> Self {
        Self::new(SourceOrigin::Programmatic)
    }

    /// Adds the declarations of one type.
    pub fn with(mut self, declarations: TypeDeclarations) -> Self {
        self.types.push(declarations);
        self
    }

    pub fn types(&self) -> &[TypeDeclarations] {
        &self.types
    }
}

impl DeclarationSource for Mapping {
    fn origin(&self) -> SourceOrigin {
        self.origin
    }

    fn declarations_for(&self, type_name: &TypeName) -> Vec<TypeDeclarations> {
        self.types
            .iter()
            .filter(|t| &t.type_name == type_name)
            .cloned()
            .collect()
    }

    fn declared_types(&self) -> Vec<TypeName> {
        let mut names: Vec<TypeName> = Vec::new();
        for declarations in &self.types {
            if !names.contains(&declarations.type_name) {
                names.push(declarations.type_name.clone());
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn getter_names_are_canonicalized() {
        assert_eq!(canonical_property_name("getName"), "name");
        assert_eq!(canonical_property_name("isActive"), "active");
        assert_eq!(canonical_property_name("hasChildren"), "children");
        assert_eq!(canonical_property_name("getURL"), "URL");
        assert_eq!(canonical_property_name("history"), "history");
        assert_eq!(canonical_property_name("get"), "get");
    }

    #[test]
    fn raw_constraints_record_groups_as_names() {
        let constraint = RawConstraint::new("NotNull").groups(["A", "B"]);
        assert_eq!(
            constraint.attributes.get(GROUPS),
            Some(&serde_json::json!(["A", "B"]))
        );
    }

    #[test]
    fn mapping_reports_each_declared_type_once() {
        let mapping = Mapping::programmatic()
            .with(TypeDeclarations::new("Car"))
            .with(TypeDeclarations::new("Car"))
            .with(TypeDeclarations::new("Driver"));
        assert_eq!(mapping.declared_types().len(), 2);
        assert_eq!(mapping.declarations_for(&"Car".into()).len(), 2);
    }
}
