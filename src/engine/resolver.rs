//! Picks and initializes the validator of a constraint for a value type.

use crate::core::{TypeGraph, TypeRef};
use crate::error::ConfigurationError;
use crate::metadata::{ConstraintDeclaration, DeclarationId};
use crate::registry::{ConstraintValidator, ConstraintValidatorFactory, DefaultValidatorFactory};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

static NEXT_FACTORY_ID: AtomicUsize = AtomicUsize::new(0);

/// A validator factory with an identity, so validator instances created by
/// different factories are cached apart.
#[derive(Clone)]
pub struct FactoryHandle {
    id: usize,
    factory: Arc<dyn ConstraintValidatorFactory>,
}

impl FactoryHandle {
    /// Wraps `factory` under a process-unique id.
    pub fn new(factory: Arc<dyn ConstraintValidatorFactory>) -> Self {
        Self {
            id: NEXT_FACTORY_ID.fetch_add(1, Ordering::Relaxed),
            factory,
        }
    }

    /// Key under which validator instances created by this factory are cached.
    pub fn id(&self) -> usize {
        self.id
    }
}

impl Default for FactoryHandle {
    fn default() -> Self {
        Self::new(Arc::new(DefaultValidatorFactory))
    }
}

impl fmt::Debug for FactoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryHandle").field("id", &self.id).finish()
    }
}

type InstanceSlot = Arc<OnceCell<Arc<dyn ConstraintValidator>>>;

/// Engine-wide cache of validator selections and initialized instances.
pub struct ValidatorResolver {
    types: Arc<TypeGraph>,
    selections: DashMap<(DeclarationId, TypeRef), usize>,
    instances: DashMap<(DeclarationId, usize, usize), InstanceSlot>,
}

impl ValidatorResolver {
    /// An empty resolver over the given type model.
    pub fn new(types: Arc<TypeGraph>) -> Self {
        Self {
            types,
            selections: DashMap::new(),
            instances: DashMap::new(),
        }
    }

    /// Index of the most specific validator accepting `value_type`.
    ///
    /// Candidates are the validators whose accepted type `value_type` is
    /// assignable to; of those, every candidate less specific than another
    /// one is dropped. Exactly one may remain.
    pub fn select(&self, constraint: &ConstraintDeclaration, value_type: &TypeRef) -> Result<usize, ConfigurationError> {
        let key = (constraint.id.clone(), value_type.clone());
        if let Some(index) = self.selections.get(&key) {
            return Ok(*index);
        }

        let validators = &constraint.validators;
        let candidates: Vec<usize> = (0..validators.len())
            .filter(|&i| self.types.is_assignable(&validators[i].accepted, value_type))
            .collect();
        let maximal: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&i| {
                !candidates
                    .iter()
                    .any(|&j| j != i && self.types.is_more_specific(&validators[j].accepted, &validators[i].accepted))
            })
            .collect();

        let index = match maximal.as_slice() {
            [] => {
                return Err(ConfigurationError::UnsupportedType {
                    constraint: constraint.constraint_type.clone(),
                    value_type: value_type.clone(),
                })
            }
            [index] => *index,
            _ => {
                return Err(ConfigurationError::AmbiguousValidators {
                    constraint: constraint.constraint_type.clone(),
                    value_type: value_type.clone(),
                    candidates: maximal
                        .iter()
                        .map(|&i| validators[i].descriptor.implementation.clone())
                        .collect(),
                })
            }
        };
        trace!(
            constraint = %constraint.constraint_type,
            value_type = %value_type,
            implementation = %validators[index].descriptor.implementation,
            "Selected validator"
        );
        self.selections.insert(key, index);
        Ok(index)
    }

    /// The initialized validator for `constraint` and `value_type`, created
    /// by `factory` on first use.
    pub fn resolve(
        &self,
        constraint: &ConstraintDeclaration,
        value_type: &TypeRef,
        factory: &FactoryHandle,
    ) -> Result<Arc<dyn ConstraintValidator>, ConfigurationError> {
        let index = self.select(constraint, value_type)?;
        let slot: InstanceSlot = self
            .instances
            .entry((constraint.id.clone(), index, factory.id))
            .or_default()
            .clone();
        slot.get_or_try_init(|| {
            let descriptor = &constraint.validators[index].descriptor;
            let mut validator = factory.factory.instance(descriptor);
            validator
                .initialize(constraint)
                .map_err(|source| ConfigurationError::ValidatorInitialization {
                    constraint: constraint.constraint_type.clone(),
                    implementation: descriptor.implementation.clone(),
                    source,
                })?;
            Ok(Arc::from(validator))
        })
        .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TypeDecl, TypeName, Value};
    use crate::metadata::{ConstraintLocation, SourceOrigin};
    use crate::registry::{CompositionType, ConstraintRegistry, ValidatorContext, ValidatorDescriptor, ValidatorError};

    fn graph() -> TypeGraph {
        let mut graph = TypeGraph::with_builtins();
        graph.declare(TypeDecl::interface("Serializable")).unwrap();
        graph
            .declare(TypeDecl::class("Ticket").extends("Object").implements("Serializable"))
            .unwrap();
        graph
            .declare(
                TypeDecl::class("Receipt")
                    .extends("Object")
                    .implements("Serializable")
                    .implements("CharSequence"),
            )
            .unwrap();
        graph
    }

    fn declaration(types: &TypeGraph, validators: Vec<ValidatorDescriptor>) -> ConstraintDeclaration {
        let resolved = ConstraintRegistry::resolve_validator_types(types, &validators).unwrap();
        ConstraintDeclaration {
            id: DeclarationId::new("Ticket:<class>:0"),
            constraint_type: TypeName::new("Check"),
            declaring_type: TypeName::new("Ticket"),
            location: ConstraintLocation::Bean,
            attributes: Default::default(),
            groups: vec![Default::default()],
            payload: Vec::new(),
            message_template: "invalid".into(),
            composing: Vec::new(),
            report_as_single_violation: false,
            composition: CompositionType::And,
            validators: Arc::from(resolved),
            origin: SourceOrigin::Programmatic,
        }
    }

    fn always(implementation: &str, accepted: &str) -> ValidatorDescriptor {
        ValidatorDescriptor::from_fn(implementation, accepted, |_: &Value, _: &ValidatorContext<'_>| true)
    }

    #[test]
    fn most_specific_validator_wins() {
        let types = Arc::new(graph());
        let constraint = declaration(&types, vec![always("ForObject", "Object"), always("ForTicket", "Ticket")]);
        let resolver = ValidatorResolver::new(types);
        assert_eq!(resolver.select(&constraint, &TypeRef::raw("Ticket")).unwrap(), 1);
        assert_eq!(resolver.select(&constraint, &TypeRef::raw("String")).unwrap(), 0);
    }

    #[test]
    fn incomparable_validators_are_ambiguous() {
        let types = Arc::new(graph());
        let constraint = declaration(
            &types,
            vec![always("ForSerializable", "Serializable"), always("ForText", "CharSequence")],
        );
        let resolver = ValidatorResolver::new(types);
        assert_eq!(resolver.select(&constraint, &TypeRef::raw("Ticket")).unwrap(), 0);
        match resolver.select(&constraint, &TypeRef::raw("Receipt")) {
            Err(ConfigurationError::AmbiguousValidators { candidates, .. }) => assert_eq!(candidates.len(), 2),
            other => panic!("Expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn no_candidate_is_an_unsupported_type() {
        let types = Arc::new(graph());
        let constraint = declaration(&types, vec![always("ForText", "CharSequence")]);
        let resolver = ValidatorResolver::new(types);
        assert!(matches!(
            resolver.select(&constraint, &TypeRef::raw("Long")),
            Err(ConfigurationError::UnsupportedType { .. })
        ));
    }

    struct Counting {
        initialized: Arc<AtomicUsize>,
    }

    impl ConstraintValidator for Counting {
        fn initialize(&mut self, _: &ConstraintDeclaration) -> Result<(), ValidatorError> {
            self.initialized.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn is_valid(&self, _: &Value, _: &ValidatorContext<'_>) -> Result<bool, ValidatorError> {
            Ok(true)
        }
    }

    #[test]
    fn instances_are_initialized_once_per_factory() {
        let types = Arc::new(graph());
        let initialized = Arc::new(AtomicUsize::new(0));
        let counter = initialized.clone();
        let constraint = declaration(
            &types,
            vec![ValidatorDescriptor::new("CountingValidator", "Object", move || Counting {
                initialized: counter.clone(),
            })],
        );
        let resolver = ValidatorResolver::new(types);
        let first_factory = FactoryHandle::default();
        let second_factory = FactoryHandle::default();

        let a = resolver.resolve(&constraint, &TypeRef::raw("Ticket"), &first_factory).unwrap();
        let b = resolver.resolve(&constraint, &TypeRef::raw("Ticket"), &first_factory).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(initialized.load(Ordering::SeqCst), 1);

        resolver.resolve(&constraint, &TypeRef::raw("Ticket"), &second_factory).unwrap();
        assert_eq!(initialized.load(Ordering::SeqCst), 2);
    }

    struct Broken;

    impl ConstraintValidator for Broken {
        fn initialize(&mut self, _: &ConstraintDeclaration) -> Result<(), ValidatorError> {
            Err(ValidatorError::MissingAttribute("pattern".into()))
        }

        fn is_valid(&self, _: &Value, _: &ValidatorContext<'_>) -> Result<bool, ValidatorError> {
            Ok(true)
        }
    }

    #[test]
    fn initialization_failures_are_configuration_errors() {
        let types = Arc::new(graph());
        let constraint = declaration(&types, vec![ValidatorDescriptor::new("BrokenValidator", "Object", || Broken)]);
        let resolver = ValidatorResolver::new(types);
        assert!(matches!(
            resolver.resolve(&constraint, &TypeRef::raw("Ticket"), &FactoryHandle::default()),
            Err(ConfigurationError::ValidatorInitialization { .. })
        ));
    }
}
