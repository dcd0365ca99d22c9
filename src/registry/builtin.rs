//! Built-in constraints and their validators.

use super::{
    ComposingConstraint, ConstraintDefinition, ConstraintRegistry, ConstraintValidator,
    ValidatorContext, ValidatorDescriptor, ValidatorError,
};
use crate::core::{TypeGraph, TypeRef, Value};
use crate::error::ConfigurationError;
use crate::metadata::ConstraintDeclaration;

/// Largest size accepted by `Size` when no `max` is given.
pub const MAX_SIZE: i64 = i32::MAX as i64;

fn unexpected(value: &Value) -> ValidatorError {
    let type_name = value
        .runtime_type()
        .map_or_else(|| "null".to_string(), |t| t.to_string());
    ValidatorError::UnexpectedValue(type_name)
}

/// Accepts any value except null.
#[derive(Debug, Default)]
pub struct NotNullValidator;

impl ConstraintValidator for NotNullValidator {
    fn is_valid(&self, value: &Value, _: &ValidatorContext<'_>) -> Result<bool, ValidatorError> {
        Ok(!value.is_null())
    }
}

/// Accepts only null.
#[derive(Debug, Default)]
pub struct NullValidator;

impl ConstraintValidator for NullValidator {
    fn is_valid(&self, value: &Value, _: &ValidatorContext<'_>) -> Result<bool, ValidatorError> {
        Ok(value.is_null())
    }
}

/// `AssertTrue` when `expected` is true, `AssertFalse` otherwise.
#[derive(Debug)]
pub struct AssertBooleanValidator {
    expected: bool,
}

impl ConstraintValidator for AssertBooleanValidator {
    fn is_valid(&self, value: &Value, _: &ValidatorContext<'_>) -> Result<bool, ValidatorError> {
        match value {
            Value::Null => Ok(true),
            Value::Bool(b) => Ok(*b == self.expected),
            other => Err(unexpected(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Min,
    Max,
}

/// `Min`/`Max` over integral and floating point numbers.
#[derive(Debug)]
pub struct BoundValidator {
    bound: Bound,
    limit: i64,
}

impl ConstraintValidator for BoundValidator {
    fn initialize(&mut self, constraint: &ConstraintDeclaration) -> Result<(), ValidatorError> {
        self.limit = constraint.attribute_i64("value")?;
        Ok(())
    }

    fn is_valid(&self, value: &Value, _: &ValidatorContext<'_>) -> Result<bool, ValidatorError> {
        let ordering = match value {
            Value::Null => return Ok(true),
            Value::Int(i) => i.cmp(&self.limit),
            Value::Float(f) if f.is_nan() => return Ok(false),
            Value::Float(f) => f.total_cmp(&(self.limit as f64)),
            other => return Err(unexpected(other)),
        };
        Ok(match self.bound {
            Bound::Min => ordering.is_ge(),
            Bound::Max => ordering.is_le(),
        })
    }
}

/// `Size` over text, collections, maps and arrays.
#[derive(Debug)]
pub struct SizeValidator {
    min: i64,
    max: i64,
}

impl ConstraintValidator for SizeValidator {
    fn initialize(&mut self, constraint: &ConstraintDeclaration) -> Result<(), ValidatorError> {
        self.min = constraint.attribute_i64("min")?;
        self.max = constraint.attribute_i64("max")?;
        if self.min < 0 || self.max < self.min {
            return Err(ValidatorError::InvalidAttribute {
                name: "min/max".to_string(),
                value: format!("{}..{}", self.min, self.max),
            });
        }
        Ok(())
    }

    fn is_valid(&self, value: &Value, _: &ValidatorContext<'_>) -> Result<bool, ValidatorError> {
        let size = match value {
            Value::Null => return Ok(true),
            Value::Text(s) => s.chars().count(),
            Value::List(items) | Value::Set(items) | Value::Array(items) => items.len(),
            Value::Map(entries) => entries.len(),
            other => return Err(unexpected(other)),
        };
        let size = i64::try_from(size).unwrap_or(i64::MAX);
        Ok(self.min <= size && size <= self.max)
    }
}

/// Accepts text with at least one non-whitespace character. Null fails.
#[derive(Debug, Default)]
pub struct NotBlankValidator;

impl ConstraintValidator for NotBlankValidator {
    fn is_valid(&self, value: &Value, _: &ValidatorContext<'_>) -> Result<bool, ValidatorError> {
        match value {
            Value::Null => Ok(false),
            Value::Text(s) => Ok(!s.trim().is_empty()),
            other => Err(unexpected(other)),
        }
    }
}

/// `Past` when `past` is true, `Future` otherwise. Uses the engine clock.
#[derive(Debug)]
pub struct TemporalValidator {
    past: bool,
}

impl ConstraintValidator for TemporalValidator {
    fn is_valid(&self, value: &Value, context: &ValidatorContext<'_>) -> Result<bool, ValidatorError> {
        match value {
            Value::Null => Ok(true),
            Value::Timestamp(t) if self.past => Ok(*t < context.now()),
            Value::Timestamp(t) => Ok(*t > context.now()),
            other => Err(unexpected(other)),
        }
    }
}

fn definitions() -> Vec<ConstraintDefinition> {
    vec![
        ConstraintDefinition::new("NotNull"),
        ConstraintDefinition::new("Null"),
        ConstraintDefinition::new("AssertTrue"),
        ConstraintDefinition::new("AssertFalse"),
        ConstraintDefinition::new("Min").required("value"),
        ConstraintDefinition::new("Max").required("value"),
        ConstraintDefinition::new("Size")
            .default_attr("min", 0)
            .default_attr("max", MAX_SIZE),
        ConstraintDefinition::new("NotBlank"),
        ConstraintDefinition::new("NotEmpty")
            .composed_of(ComposingConstraint::new("NotNull"))
            .composed_of(ComposingConstraint::new("Size").attr("min", 1))
            .report_as_single_violation(),
        ConstraintDefinition::new("Past"),
        ConstraintDefinition::new("Future"),
        ConstraintDefinition::list_of("Size.List", "Size"),
        ConstraintDefinition::list_of("Min.List", "Min"),
        ConstraintDefinition::list_of("Max.List", "Max"),
    ]
}

fn bound(name: &'static str, bound: Bound, accepted: &'static str) -> ValidatorDescriptor {
    ValidatorDescriptor::new(name, TypeRef::raw(accepted), move || BoundValidator {
        bound,
        limit: 0,
    })
}

fn size(name: &'static str, accepted: &str) -> ValidatorDescriptor {
    let accepted: TypeRef = accepted
        .parse()
        .unwrap_or_else(|_| TypeRef::raw(accepted));
    ValidatorDescriptor::new(name, accepted, || SizeValidator { min: 0, max: MAX_SIZE })
}

/// Defines the built-in constraints and registers their validators.
pub fn register(registry: &mut ConstraintRegistry, types: &TypeGraph) -> Result<(), ConfigurationError> {
    for definition in definitions() {
        registry.define(definition)?;
    }

    registry.register_builtin(
        types,
        "NotNull",
        vec![ValidatorDescriptor::new("NotNullValidator", TypeRef::object(), || NotNullValidator)],
    )?;
    registry.register_builtin(
        types,
        "Null",
        vec![ValidatorDescriptor::new("NullValidator", TypeRef::object(), || NullValidator)],
    )?;
    registry.register_builtin(
        types,
        "AssertTrue",
        vec![ValidatorDescriptor::new("AssertTrueValidator", TypeRef::raw("Boolean"), || {
            AssertBooleanValidator { expected: true }
        })],
    )?;
    registry.register_builtin(
        types,
        "AssertFalse",
        vec![ValidatorDescriptor::new("AssertFalseValidator", TypeRef::raw("Boolean"), || {
            AssertBooleanValidator { expected: false }
        })],
    )?;
    registry.register_builtin(types, "Min", vec![bound("MinValidatorForNumber", Bound::Min, "Number")])?;
    registry.register_builtin(types, "Max", vec![bound("MaxValidatorForNumber", Bound::Max, "Number")])?;
    registry.register_builtin(
        types,
        "Size",
        vec![
            size("SizeValidatorForCharSequence", "CharSequence"),
            size("SizeValidatorForCollection", "Collection<?>"),
            size("SizeValidatorForMap", "Map<?, ?>"),
            size("SizeValidatorForArray", "Array<?>"),
        ],
    )?;
    registry.register_builtin(
        types,
        "NotBlank",
        vec![ValidatorDescriptor::new("NotBlankValidator", TypeRef::raw("CharSequence"), || {
            NotBlankValidator
        })],
    )?;
    registry.register_builtin(
        types,
        "Past",
        vec![ValidatorDescriptor::new("PastValidatorForInstant", TypeRef::raw("Instant"), || {
            TemporalValidator { past: true }
        })],
    )?;
    registry.register_builtin(
        types,
        "Future",
        vec![ValidatorDescriptor::new("FutureValidatorForInstant", TypeRef::raw("Instant"), || {
            TemporalValidator { past: false }
        })],
    )?;
    Ok(())
}
