//! Error types.
//!
//! Three disjoint classes of failure are kept apart:
//! - [`ConfigurationError`]: the declarative setup is broken (bad
//!   definitions, unresolvable validators, invalid group sequences).
//! - [`ArgumentError`]: the caller misused an entry point.
//! - [`ValidationError::Validator`]: a validator failed while checking a value.
//!
//! A constraint that is simply not satisfied is never an error; it is
//! reported as a violation.

use crate::core::{Group, TypeError, TypeName, TypeRef};
use crate::metadata::{ContainerSlot, ConversionProblem, SequenceProblem};
use crate::registry::ValidatorError;
use std::fmt::Display;
use thiserror::Error;

fn join<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Definition, bootstrap and metadata errors. Never recoverable at run time.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigurationError {
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("Constraint {constraint} is defined more than once")]
    DuplicateConstraintDefinition { constraint: TypeName },

    #[error("Built-in validators for {constraint} are already registered")]
    DuplicateBuiltin { constraint: TypeName },

    #[error("{constraint} is not a known constraint")]
    UnknownConstraint { constraint: TypeName },

    #[error("Constraint {constraint} defines multiple validators for type {accepted}")]
    MultipleValidatorsForType {
        constraint: TypeName,
        accepted: TypeRef,
    },

    #[error("Cannot determine the type validated by {implementation}: {source}")]
    UnresolvableValidatorType {
        implementation: TypeName,
        source: TypeError,
    },

    #[error("Validator {implementation} declares unbound accepted type {accepted}")]
    UnboundAcceptedType {
        implementation: TypeName,
        accepted: TypeRef,
    },

    #[error("Constraint {constraint} on {element} is missing required attributes: {}", join(.attributes))]
    MissingAttributes {
        constraint: TypeName,
        element: String,
        attributes: Vec<String>,
    },

    #[error("Multi-valued constraint {constraint} on {element} needs a 'value' array of attribute objects")]
    MalformedMultiValueConstraint { constraint: TypeName, element: String },

    #[error("Invalid default group sequence for {type_name}: {}", join(.problems))]
    InvalidDefaultGroupSequence {
        type_name: TypeName,
        problems: Vec<SequenceProblem>,
    },

    #[error("{type_name} defines both a default group sequence and a group sequence provider")]
    SequenceAndProvider { type_name: TypeName },

    #[error("Cyclic dependency in group sequence definitions through {group}")]
    GroupSequenceCycle { group: Group },

    #[error("Group {group} appears more than once in the expansion of sequence {sequence}")]
    DuplicateGroupInSequence { group: Group, sequence: Group },

    #[error("Group {group} is declared more than once")]
    DuplicateGroupDeclaration { group: Group },

    #[error("Unable to expand default group list [{}] into sequence {sequence}", join(.default_sequence))]
    UnexpandableDefaultSequence {
        sequence: Group,
        default_sequence: Vec<Group>,
    },

    #[error("Invalid group conversions on {element}: {}", join(.problems))]
    InvalidGroupConversions {
        element: String,
        problems: Vec<ConversionProblem>,
    },

    #[error("{type_name} is configured by more than one mapping descriptor")]
    DuplicateDescriptor { type_name: TypeName },

    #[error("Member {member} of {type_name} is described more than once")]
    DuplicateMember { type_name: TypeName, member: String },

    #[error("Malformed mapping descriptor: {reason}")]
    MalformedDescriptor { reason: String },

    #[error("Malformed engine configuration: {reason}")]
    MalformedConfig { reason: String },

    #[error("{executable} in {type_name} overrides a method of {overridden_in} and must not alter its parameter constraints")]
    IllegalParameterConstraints {
        type_name: TypeName,
        executable: String,
        overridden_in: TypeName,
    },

    #[error("No value extractor for slot {slot:?} of {container} on {element}")]
    UnsupportedContainerSlot {
        element: String,
        container: TypeRef,
        slot: ContainerSlot,
    },

    #[error("No validator for constraint {constraint} can check type {value_type}")]
    UnsupportedType {
        constraint: TypeName,
        value_type: TypeRef,
    },

    #[error("Ambiguous validators for constraint {constraint} and type {value_type}: {}", join(.candidates))]
    AmbiguousValidators {
        constraint: TypeName,
        value_type: TypeRef,
        candidates: Vec<TypeName>,
    },

    #[error("Initialization of {implementation} for {constraint} failed: {source}")]
    ValidatorInitialization {
        constraint: TypeName,
        implementation: TypeName,
        source: ValidatorError,
    },
}

/// Caller misuse of an entry point.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("The object to validate must not be null")]
    NullObject,

    #[error("Only beans can be validated, got {value_type}")]
    NotABean { value_type: String },

    #[error("The property path must not be empty")]
    EmptyPropertyPath,

    #[error("Invalid property path '{path}': {reason}")]
    InvalidPropertyPath { path: String, reason: String },

    #[error("{type_name} has no property '{property}'")]
    UnknownProperty { type_name: TypeName, property: String },

    #[error("{type_name} declares no executable {signature}")]
    UnknownExecutable { type_name: TypeName, signature: String },

    #[error("{executable} takes {expected} arguments, got {actual}")]
    ArgumentCountMismatch {
        executable: String,
        expected: usize,
        actual: usize,
    },
}

/// Error returned by every validation entry point.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error("Validator {implementation} for {constraint} failed at '{path}': {source}")]
    Validator {
        constraint: TypeName,
        implementation: TypeName,
        path: String,
        source: ValidatorError,
    },
}

impl From<TypeError> for ValidationError {
    fn from(error: TypeError) -> Self {
        Self::Configuration(error.into())
    }
}
