//! Immutable per-type validation metadata.

use super::declaration::ConstraintDeclaration;
use super::source::{ContainerSlot, ExecutableKind, SequenceProviderRef};
use super::checks::valid_default_group_list;
use crate::core::{BeanRef, Group, TypeName, TypeRef};
use crate::error::{ArgumentError, ConfigurationError};
use crate::groups::{Sequence, ValidationOrderGenerator};
use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Computes a type's default group sequence per instance.
///
/// The returned list follows the same rules as a static redefinition: it
/// must contain the type's own marker and must not contain `Default`.
pub trait DefaultGroupSequenceProvider: Send + Sync {
    /// `bean` is `None` when no instance exists (`validate_value`).
    fn validation_groups(&self, bean: Option<&BeanRef>) -> Vec<Group>;
}

/// Constraints, cascading and group conversions of one element: a property,
/// a parameter, a return value or a container type argument.
#[derive(Debug, Clone)]
pub struct ElementMetadata {
    pub declared_type: TypeRef,
    pub constraints: Vec<Arc<ConstraintDeclaration>>,
    pub cascading: bool,
    pub container_elements: Vec<ContainerElementMetadata>,
    pub group_conversions: Vec<(Group, Group)>,
}

impl ElementMetadata {
    /// An element of `declared_type` without constraints or cascades.
    pub fn new(declared_type: TypeRef) -> Self {
        Self {
            declared_type,
            constraints: Vec::new(),
            cascading: false,
            container_elements: Vec::new(),
            group_conversions: Vec::new(),
        }
    }

    /// Whether traversal has to descend into this element at all.
    pub fn is_cascading(&self) -> bool {
        self.cascading || self.container_elements.iter().any(|c| c.element.is_cascading())
    }

    pub fn is_constrained(&self) -> bool {
        !self.constraints.is_empty()
            || self.container_elements.iter().any(|c| c.element.is_constrained())
    }

    /// The group to cascade with when validating `group` at this element.
    pub fn convert_group(&self, group: &Group) -> Group {
        self.group_conversions
            .iter()
            .find(|(from, _)| from == group)
            .map(|(_, to)| to.clone())
            .unwrap_or_else(|| group.clone())
    }

    /// Metadata of the container slot `slot`, if anything was declared on it.
    pub fn container_element(&self, slot: ContainerSlot) -> Option<&ContainerElementMetadata> {
        self.container_elements.iter().find(|c| c.slot == slot)
    }

    /// Every declaration on the element, including container type arguments.
    pub fn all_constraints(&self) -> Vec<&Arc<ConstraintDeclaration>> {
        let mut all: Vec<&Arc<ConstraintDeclaration>> = self.constraints.iter().collect();
        for container in &self.container_elements {
            all.extend(container.element.all_constraints());
        }
        all
    }
}

/// A type argument slot of a container element.
#[derive(Debug, Clone)]
pub struct ContainerElementMetadata {
    pub slot: ContainerSlot,
    /// `declared_type` is the type argument bound to the slot.
    pub element: ElementMetadata,
}

/// A field or getter, merged across the type hierarchy.
#[derive(Debug, Clone)]
pub struct PropertyMetadata {
    pub name: String,
    pub element: ElementMetadata,
}

/// Identifies a method or constructor by name and parameter types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecutableSignature {
    pub kind: ExecutableKind,
    pub name: String,
    pub parameter_types: Vec<TypeRef>,
}

impl ExecutableSignature {
    /// Identifies a method by name and parameter types.
    pub fn method<I, T>(name: impl Into<String>, parameter_types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeRef>,
    {
        Self {
            kind: ExecutableKind::Method,
            name: name.into(),
            parameter_types: parameter_types.into_iter().map(Into::into).collect(),
        }
    }

    /// Identifies a constructor of `type_name` by its parameter types.
    pub fn constructor<I, T>(type_name: impl Into<TypeName>, parameter_types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeRef>,
    {
        let type_name: TypeName = type_name.into();
        Self {
            kind: ExecutableKind::Constructor,
            ..Self::method(type_name.as_str(), parameter_types)
        }
    }
}

impl fmt::Display for ExecutableSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, parameter) in self.parameter_types.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{parameter}")?;
        }
        f.write_str(")")
    }
}

/// Parses a method signature such as `drive(Long, Map<String, Long>)`.
impl FromStr for ExecutableSignature {
    type Err = ArgumentError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || ArgumentError::UnknownExecutable {
            type_name: TypeName::object(),
            signature: input.to_string(),
        };
        let input = input.trim();
        let open = input.find('(').ok_or_else(invalid)?;
        let inner = input
            .get(open + 1..)
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(invalid)?;
        let name = input[..open].trim();
        if name.is_empty() {
            return Err(invalid());
        }

        let mut parameter_types: Vec<TypeRef> = Vec::new();
        let mut depth = 0usize;
        let mut start = 0;
        for (i, c) in inner.char_indices() {
            match c {
                '<' => depth += 1,
                '>' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    parameter_types.push(inner[start..i].trim().parse().map_err(|_| invalid())?);
                    start = i + 1;
                }
                _ => {}
            }
        }
        let last = inner[start..].trim();
        if !last.is_empty() {
            parameter_types.push(last.parse().map_err(|_| invalid())?);
        } else if !parameter_types.is_empty() {
            return Err(invalid());
        }
        Ok(Self::method(name, parameter_types))
    }
}

/// One parameter of an executable. `name` falls back to `arg<index>`.
#[derive(Debug, Clone)]
pub struct ParameterMetadata {
    pub index: usize,
    pub name: String,
    pub element: ElementMetadata,
}

/// Merged metadata of one executable across the type hierarchy.
#[derive(Debug, Clone)]
pub struct ExecutableMetadata {
    pub signature: ExecutableSignature,
    pub parameters: Vec<ParameterMetadata>,
    pub cross_parameter: Vec<Arc<ConstraintDeclaration>>,
    pub return_value: Option<ElementMetadata>,
}

impl ExecutableMetadata {
    /// Whether parameter validation has anything to check.
    pub fn has_parameter_constraints(&self) -> bool {
        !self.cross_parameter.is_empty()
            || self
                .parameters
                .iter()
                .any(|p| p.element.is_constrained() || p.element.is_cascading())
    }
}

/// How `Default` is expanded for a type.
#[derive(Debug, Clone)]
pub enum DefaultGroupSequence {
    Implicit,
    /// `groups` has the type's marker already replaced by `Default`.
    Redefined {
        groups: Vec<Group>,
        sequence: Arc<Sequence>,
    },
    Provider(SequenceProviderRef),
}

/// Everything the engine needs to validate instances of one type.
#[derive(Debug, Clone)]
pub struct BeanMetadata {
    pub(crate) type_name: TypeName,
    pub(crate) class_hierarchy: Vec<TypeName>,
    pub(crate) ancestors: Vec<TypeName>,
    /// The type itself and the interfaces it implements directly.
    pub(crate) direct_types: Vec<TypeName>,
    pub(crate) class_constraints: IndexMap<TypeName, Vec<Arc<ConstraintDeclaration>>>,
    pub(crate) properties: IndexMap<String, PropertyMetadata>,
    pub(crate) executables: IndexMap<ExecutableSignature, ExecutableMetadata>,
    pub(crate) default_group_sequence: DefaultGroupSequence,
}

impl BeanMetadata {
    pub fn type_name(&self) -> &TypeName {
        &self.type_name
    }

    /// The type and its superclasses, most specific first.
    pub fn class_hierarchy(&self) -> &[TypeName] {
        &self.class_hierarchy
    }

    /// The type itself followed by all of its supertypes, without duplicates.
    pub fn ancestors(&self) -> &[TypeName] {
        &self.ancestors
    }

    /// Class-level constraints keyed by the type that declared them.
    pub fn class_constraints_by_declaring_type(&self) -> &IndexMap<TypeName, Vec<Arc<ConstraintDeclaration>>> {
        &self.class_constraints
    }

    /// Class-level constraints of the type and its supertypes.
    pub fn class_constraints(&self) -> impl Iterator<Item = &Arc<ConstraintDeclaration>> {
        self.class_constraints.values().flatten()
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyMetadata> {
        self.properties.values()
    }

    pub fn property(&self, name: &str) -> Option<&PropertyMetadata> {
        self.properties.get(name)
    }

    /// Properties whose value, or a container slot of it, is cascaded into.
    pub fn cascaded_properties(&self) -> impl Iterator<Item = &PropertyMetadata> {
        self.properties.values().filter(|p| p.element.is_cascading())
    }

    pub fn executables(&self) -> impl Iterator<Item = &ExecutableMetadata> {
        self.executables.values()
    }

    /// The executable matching `signature`, if the type declares one.
    pub fn executable(&self, signature: &ExecutableSignature) -> Option<&ExecutableMetadata> {
        self.executables.get(signature)
    }

    /// Like [`executable`](Self::executable), failing for undeclared signatures.
    pub fn require_executable(&self, signature: &ExecutableSignature) -> Result<&ExecutableMetadata, ArgumentError> {
        self.executable(signature).ok_or_else(|| ArgumentError::UnknownExecutable {
            type_name: self.type_name.clone(),
            signature: signature.to_string(),
        })
    }

    /// True when the type has neither constraints nor cascades.
    pub fn is_empty(&self) -> bool {
        self.class_constraints().next().is_none()
            && self
                .properties
                .values()
                .all(|p| !p.element.is_constrained() && !p.element.is_cascading())
    }

    /// Whether `declaring_type` is the type itself or one of its direct
    /// interfaces; those are the constraints the type hosts when `Default`
    /// is walked along the class hierarchy.
    pub fn hosts(&self, declaring_type: &TypeName) -> bool {
        self.direct_types.contains(declaring_type)
    }

    /// How `Default` expands for this type.
    pub fn default_group_sequence(&self) -> &DefaultGroupSequence {
        &self.default_group_sequence
    }

    pub fn is_default_group_sequence_redefined(&self) -> bool {
        !matches!(self.default_group_sequence, DefaultGroupSequence::Implicit)
    }

    /// The default group list for `bean`, marker replaced by `Default`.
    pub fn default_group_list(&self, bean: Option<&BeanRef>) -> Result<Vec<Group>, ConfigurationError> {
        match &self.default_group_sequence {
            DefaultGroupSequence::Implicit => Ok(vec![Group::default()]),
            DefaultGroupSequence::Redefined { groups, .. } => Ok(groups.clone()),
            DefaultGroupSequence::Provider(provider) => {
                valid_default_group_list(&self.type_name, &provider.0.validation_groups(bean))
            }
        }
    }

    /// The expanded default sequence for `bean`.
    pub fn default_sequence(
        &self,
        bean: Option<&BeanRef>,
        generator: &ValidationOrderGenerator,
    ) -> Result<Arc<Sequence>, ConfigurationError> {
        match &self.default_group_sequence {
            DefaultGroupSequence::Implicit => Ok(Arc::new(Sequence::implicit_default())),
            DefaultGroupSequence::Redefined { sequence, .. } => Ok(sequence.clone()),
            DefaultGroupSequence::Provider(_) => {
                let groups = self.default_group_list(bean)?;
                Ok(Arc::new(generator.default_sequence(&self.type_name, &groups)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures_parse_generic_parameters() {
        let signature: ExecutableSignature = "rent(Long, Map<String, List<Car>>)".parse().unwrap();
        assert_eq!(signature.name, "rent");
        assert_eq!(signature.parameter_types.len(), 2);
        assert_eq!(signature.to_string(), "rent(Long, Map<String, List<Car>>)");

        let empty: ExecutableSignature = "start()".parse().unwrap();
        assert!(empty.parameter_types.is_empty());
    }

    #[test]
    fn malformed_signatures_are_argument_errors() {
        assert!("start".parse::<ExecutableSignature>().is_err());
        assert!("(Long)".parse::<ExecutableSignature>().is_err());
        assert!("drive(Long,)".parse::<ExecutableSignature>().is_err());
    }

    #[test]
    fn group_conversion_falls_back_to_the_inbound_group() {
        let mut element = ElementMetadata::new(TypeRef::raw("Driver"));
        element.group_conversions.push(("Default".into(), "DriverChecks".into()));
        assert_eq!(element.convert_group(&Group::default()), Group::from("DriverChecks"));
        assert_eq!(element.convert_group(&"Other".into()), Group::from("Other"));
    }
}
