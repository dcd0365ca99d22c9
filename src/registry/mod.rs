//! Constraint registry.
//!
//! Maps each constraint type to its definition and to the ordered list of
//! validator implementations that can check it. The registry is written
//! during engine assembly and only read afterwards.

pub mod builtin;
mod definition;
mod validator;

pub use definition::{
    AttributeOverride, Attributes, ComposingConstraint, CompositionType, ConstraintDefinition,
    GROUPS, MESSAGE, PAYLOAD, VALUE,
};
pub use validator::{
    AcceptedType, ClockProvider, ConstraintValidator, ConstraintValidatorFactory,
    DefaultValidatorFactory, FixedClock, ResolvedValidatorType, SystemClock, ValidatorContext,
    ValidatorDescriptor, ValidatorError,
};

use crate::core::{TypeGraph, TypeName, CONSTRAINT_VALIDATOR};
use crate::error::ConfigurationError;
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::trace;

/// Validators contributed for one constraint type.
#[derive(Debug, Clone)]
pub struct ValidatorContribution {
    pub constraint_type: TypeName,
    pub validators: Vec<ValidatorDescriptor>,
    /// Append to the already registered validators instead of replacing them.
    pub include_existing: bool,
}

impl ValidatorContribution {
    /// A contribution that adds to the validators already registered.
    pub fn new(constraint_type: impl Into<TypeName>) -> Self {
        Self {
            constraint_type: constraint_type.into(),
            validators: Vec::new(),
            include_existing: true,
        }
    }

    pub fn validator(mut self, validator: ValidatorDescriptor) -> Self {
        self.validators.push(validator);
        self
    }

    /// Drop the validators registered so far for the constraint.
    pub fn replace_existing(mut self) -> Self {
        self.include_existing = false;
        self
    }
}

/// Constraint definitions and the validators registered for them.
#[derive(Debug, Default)]
pub struct ConstraintRegistry {
    definitions: IndexMap<TypeName, ConstraintDefinition>,
    validators: IndexMap<TypeName, Vec<ResolvedValidatorType>>,
    builtins: HashSet<TypeName>,
}

impl ConstraintRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constraint type. Each type may be defined once.
    pub fn define(&mut self, definition: ConstraintDefinition) -> Result<(), ConfigurationError> {
        if self.definitions.contains_key(&definition.constraint_type) {
            return Err(ConfigurationError::DuplicateConstraintDefinition {
                constraint: definition.constraint_type,
            });
        }
        self.definitions
            .insert(definition.constraint_type.clone(), definition);
        Ok(())
    }

    /// Records the default validators of a built-in constraint. Fails when
    /// called twice for the same type; use [`contribute`](Self::contribute)
    /// to extend or replace them.
    pub fn register_builtin(
        &mut self,
        types: &TypeGraph,
        constraint_type: impl Into<TypeName>,
        validators: Vec<ValidatorDescriptor>,
    ) -> Result<(), ConfigurationError> {
        let constraint_type = constraint_type.into();
        if self.builtins.contains(&constraint_type) {
            return Err(ConfigurationError::DuplicateBuiltin {
                constraint: constraint_type,
            });
        }
        self.contribute(
            types,
            ValidatorContribution {
                constraint_type: constraint_type.clone(),
                validators,
                include_existing: true,
            },
        )?;
        self.builtins.insert(constraint_type);
        Ok(())
    }

    /// Adds or replaces validators of a defined constraint. Accepted types
    /// are resolved here, so unresolvable registrations fail immediately.
    /// A failed contribution leaves the registry unchanged.
    pub fn contribute(
        &mut self,
        types: &TypeGraph,
        contribution: ValidatorContribution,
    ) -> Result<(), ConfigurationError> {
        let constraint_type = contribution.constraint_type;
        if !self.definitions.contains_key(&constraint_type) {
            return Err(ConfigurationError::UnknownConstraint {
                constraint: constraint_type,
            });
        }
        let resolved = Self::resolve_validator_types(types, &contribution.validators)?;
        let mut merged: Vec<ResolvedValidatorType> = if contribution.include_existing {
            self.validator_types(&constraint_type).to_vec()
        } else {
            Vec::new()
        };
        let kept = merged.len();
        for candidate in resolved {
            if merged.iter().any(|existing| existing.accepted == candidate.accepted) {
                return Err(ConfigurationError::MultipleValidatorsForType {
                    constraint: constraint_type,
                    accepted: candidate.accepted,
                });
            }
            merged.push(candidate);
        }
        for validator in &merged[kept..] {
            trace!(
                constraint = %constraint_type,
                implementation = %validator.descriptor.implementation,
                accepted = %validator.accepted,
                "Registered validator"
            );
        }
        self.validators.insert(constraint_type, merged);
        Ok(())
    }

    /// Resolves the value type each candidate accepts. Inferred types walk
    /// the implementation's supertypes, substituting type variables, up to
    /// the second argument of `ConstraintValidator`.
    pub fn resolve_validator_types(
        types: &TypeGraph,
        candidates: &[ValidatorDescriptor],
    ) -> Result<Vec<ResolvedValidatorType>, ConfigurationError> {
        candidates
            .iter()
            .map(|descriptor| {
                let accepted = match &descriptor.accepted {
                    AcceptedType::Declared(accepted) => {
                        if !accepted.is_bound() {
                            return Err(ConfigurationError::UnboundAcceptedType {
                                implementation: descriptor.implementation.clone(),
                                accepted: accepted.clone(),
                            });
                        }
                        accepted.clone()
                    }
                    AcceptedType::Inferred => types
                        .resolve_type_argument(&descriptor.implementation, CONSTRAINT_VALIDATOR, 1)
                        .map_err(|source| ConfigurationError::UnresolvableValidatorType {
                            implementation: descriptor.implementation.clone(),
                            source,
                        })?,
                };
                Ok(ResolvedValidatorType {
                    descriptor: descriptor.clone(),
                    accepted,
                })
            })
            .collect()
    }

    /// Whether `declaration_type` names a defined constraint.
    pub fn is_constraint(&self, declaration_type: &TypeName) -> bool {
        self.definitions.contains_key(declaration_type)
    }

    /// Whether `declaration_type` is the `List` wrapper of a constraint,
    /// holding several declarations of it.
    pub fn is_multi_value_constraint(&self, declaration_type: &TypeName) -> bool {
        self.definitions
            .get(declaration_type)
            .is_some_and(ConstraintDefinition::is_multi_value)
    }

    /// The definition registered for `constraint_type`, if any.
    ///
    /// # Example
    ///
    /// ```
    /// use constraint_engine::registry::{ConstraintDefinition, ConstraintRegistry};
    ///
    /// let mut registry = ConstraintRegistry::new();
    /// registry.define(ConstraintDefinition::new("Checked")).unwrap();
    /// assert!(registry.definition(&"Checked".into()).is_some());
    /// assert!(registry.definition(&"Unknown".into()).is_none());
    /// ```
    pub fn definition(&self, constraint_type: &TypeName) -> Option<&ConstraintDefinition> {
        self.definitions.get(constraint_type)
    }

    /// Registered validators in registration order.
    pub fn validator_types(&self, constraint_type: &TypeName) -> &[ResolvedValidatorType] {
        self.validators
            .get(constraint_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TypeDecl, TypeRef, Value};

    fn always(name: &str, accepted: &str) -> ValidatorDescriptor {
        ValidatorDescriptor::from_fn(name, TypeRef::raw(accepted), |_: &Value, _| true)
    }

    fn registry_with(constraint: &str) -> ConstraintRegistry {
        let mut registry = ConstraintRegistry::new();
        registry
            .define(ConstraintDefinition::new(constraint))
            .unwrap();
        registry
    }

    #[test]
    fn registering_builtin_twice_fails() {
        let types = TypeGraph::with_builtins();
        let mut registry = registry_with("Check");
        registry
            .register_builtin(&types, "Check", vec![always("A", "String")])
            .unwrap();
        let second = registry.register_builtin(&types, "Check", vec![always("B", "Long")]);
        assert!(matches!(
            second,
            Err(ConfigurationError::DuplicateBuiltin { .. })
        ));
    }

    #[test]
    fn contributions_extend_or_replace() {
        let types = TypeGraph::with_builtins();
        let mut registry = registry_with("Check");
        registry
            .register_builtin(&types, "Check", vec![always("A", "String")])
            .unwrap();

        registry
            .contribute(
                &types,
                ValidatorContribution::new("Check").validator(always("B", "Long")),
            )
            .unwrap();
        assert_eq!(registry.validator_types(&"Check".into()).len(), 2);

        registry
            .contribute(
                &types,
                ValidatorContribution::new("Check")
                    .validator(always("C", "Double"))
                    .replace_existing(),
            )
            .unwrap();
        let remaining = registry.validator_types(&"Check".into());
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].descriptor.implementation.as_str(), "C");
    }

    #[test]
    fn two_validators_for_the_same_type_are_rejected() {
        let types = TypeGraph::with_builtins();
        let mut registry = registry_with("Check");
        let result = registry.contribute(
            &types,
            ValidatorContribution::new("Check")
                .validator(always("A", "String"))
                .validator(always("B", "String")),
        );
        assert!(matches!(
            result,
            Err(ConfigurationError::MultipleValidatorsForType { .. })
        ));
    }

    #[test]
    fn rejected_contributions_leave_validators_untouched() {
        let types = TypeGraph::with_builtins();
        let mut registry = registry_with("Check");
        registry
            .register_builtin(&types, "Check", vec![always("A", "String")])
            .unwrap();

        let replacing = registry.contribute(
            &types,
            ValidatorContribution::new("Check")
                .validator(always("B", "Long"))
                .validator(always("C", "Long"))
                .replace_existing(),
        );
        assert!(matches!(
            replacing,
            Err(ConfigurationError::MultipleValidatorsForType { .. })
        ));

        let extending = registry.contribute(
            &types,
            ValidatorContribution::new("Check")
                .validator(always("D", "Double"))
                .validator(always("E", "String")),
        );
        assert!(matches!(
            extending,
            Err(ConfigurationError::MultipleValidatorsForType { .. })
        ));

        let remaining = registry.validator_types(&"Check".into());
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].descriptor.implementation.as_str(), "A");
    }

    #[test]
    fn unbound_inferred_types_fail_at_registration() {
        let mut types = TypeGraph::with_builtins();
        types
            .declare(TypeDecl::class("GenericValidator").params(["T"]).implements(
                TypeRef::generic(CONSTRAINT_VALIDATOR, [TypeRef::raw("Check"), TypeRef::var("T")]),
            ))
            .unwrap();
        let mut registry = registry_with("Check");
        let result = registry.contribute(
            &types,
            ValidatorContribution::new("Check").validator(ValidatorDescriptor::inferred(
                "GenericValidator",
                || {
                    crate::registry::builtin::NotNullValidator
                },
            )),
        );
        assert!(matches!(
            result,
            Err(ConfigurationError::UnresolvableValidatorType { .. })
        ));
    }

    #[test]
    fn unknown_constraints_cannot_receive_validators() {
        let types = TypeGraph::with_builtins();
        let mut registry = ConstraintRegistry::new();
        let result = registry.contribute(
            &types,
            ValidatorContribution::new("Missing").validator(always("A", "String")),
        );
        assert!(matches!(
            result,
            Err(ConfigurationError::UnknownConstraint { .. })
        ));
        assert!(!registry.is_constraint(&"Missing".into()));
    }
}
