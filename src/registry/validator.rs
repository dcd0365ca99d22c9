//! Validator implementations and how they are instantiated.

use crate::core::{TypeName, TypeRef, Value};
use crate::metadata::ConstraintDeclaration;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure raised by a validator itself, during initialization or while
/// checking a value. Not a violation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidatorError {
    #[error("Missing attribute '{0}'")]
    MissingAttribute(String),

    #[error("Attribute '{name}' has an unusable value: {value}")]
    InvalidAttribute { name: String, value: String },

    #[error("Cannot check a value of type {0}")]
    UnexpectedValue(String),

    #[error("{0}")]
    Failed(String),
}

/// Source of the current time for temporal constraints.
pub trait ClockProvider: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockProvider for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl ClockProvider for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// What a validator sees besides the value under test.
pub struct ValidatorContext<'a> {
    clock: &'a dyn ClockProvider,
    constraint: &'a ConstraintDeclaration,
}

impl<'a> ValidatorContext<'a> {
    /// Context for validating `constraint` at the time given by `clock`.
    pub fn new(clock: &'a dyn ClockProvider, constraint: &'a ConstraintDeclaration) -> Self {
        Self { clock, constraint }
    }

    /// The current time as seen by the engine's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn constraint(&self) -> &ConstraintDeclaration {
        self.constraint
    }
}

/// Checks one constraint against values of its accepted type.
///
/// `initialize` runs once per constraint declaration and validator factory
/// before the first check. `is_valid` must be a total function over the
/// accepted type: an `Err` is reported as a failure of the validator, not
/// as a violation.
pub trait ConstraintValidator: Send + Sync {
    fn initialize(&mut self, _constraint: &ConstraintDeclaration) -> Result<(), ValidatorError> {
        Ok(())
    }

    fn is_valid(&self, value: &Value, context: &ValidatorContext<'_>) -> Result<bool, ValidatorError>;
}

type Constructor = Arc<dyn Fn() -> Box<dyn ConstraintValidator> + Send + Sync>;

/// How the value type a validator accepts is determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptedType {
    /// Stated at registration.
    Declared(TypeRef),
    /// Resolved from the implementation's declared supertypes, i.e. the
    /// second argument of `ConstraintValidator<A, T>`.
    Inferred,
}

/// A validator implementation registered for a constraint.
#[derive(Clone)]
pub struct ValidatorDescriptor {
    pub implementation: TypeName,
    pub accepted: AcceptedType,
    constructor: Constructor,
}

impl ValidatorDescriptor {
    /// Registers `implementation` for values assignable to `accepted`.
    /// `constructor` creates a fresh, uninitialized instance.
    pub fn new<F, V>(implementation: impl Into<TypeName>, accepted: impl Into<TypeRef>, constructor: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: ConstraintValidator + 'static,
    {
        Self {
            implementation: implementation.into(),
            accepted: AcceptedType::Declared(accepted.into()),
            constructor: Arc::new(move || Box::new(constructor()) as Box<dyn ConstraintValidator>),
        }
    }

    /// Registers an implementation whose accepted type is inferred from the
    /// type graph. The implementation must be declared there.
    pub fn inferred<F, V>(implementation: impl Into<TypeName>, constructor: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: ConstraintValidator + 'static,
    {
        Self {
            implementation: implementation.into(),
            accepted: AcceptedType::Inferred,
            constructor: Arc::new(move || Box::new(constructor()) as Box<dyn ConstraintValidator>),
        }
    }

    /// Stateless validator from a predicate.
    pub fn from_fn<F>(implementation: impl Into<TypeName>, accepted: impl Into<TypeRef>, predicate: F) -> Self
    where
        F: Fn(&Value, &ValidatorContext<'_>) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        Self::new(implementation, accepted, move || FnValidator {
            predicate: predicate.clone(),
        })
    }

    /// A new instance from the registered constructor.
    pub fn instantiate(&self) -> Box<dyn ConstraintValidator> {
        (self.constructor)()
    }
}

impl fmt::Debug for ValidatorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorDescriptor")
            .field("implementation", &self.implementation)
            .field("accepted", &self.accepted)
            .finish_non_exhaustive()
    }
}

struct FnValidator<F> {
    predicate: Arc<F>,
}

impl<F> ConstraintValidator for FnValidator<F>
where
    F: Fn(&Value, &ValidatorContext<'_>) -> bool + Send + Sync,
{
    fn is_valid(&self, value: &Value, context: &ValidatorContext<'_>) -> Result<bool, ValidatorError> {
        Ok((self.predicate)(value, context))
    }
}

/// A registered validator together with its resolved accepted type.
#[derive(Clone, Debug)]
pub struct ResolvedValidatorType {
    pub descriptor: ValidatorDescriptor,
    pub accepted: TypeRef,
}

/// Creates validator instances. Callers may supply their own to manage
/// validator state; instances are cached per factory.
pub trait ConstraintValidatorFactory: Send + Sync {
    fn instance(&self, descriptor: &ValidatorDescriptor) -> Box<dyn ConstraintValidator>;
}

/// Creates validators with their registered constructors.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValidatorFactory;

impl ConstraintValidatorFactory for DefaultValidatorFactory {
    fn instance(&self, descriptor: &ValidatorDescriptor) -> Box<dyn ConstraintValidator> {
        descriptor.instantiate()
    }
}
