//! Evaluation of a constraint together with its composing constraints.

use super::context::ValidationContext;
use crate::core::{BeanRef, PropertyPath, TypeRef, Value};
use crate::error::ValidationError;
use crate::metadata::ConstraintDeclaration;
use crate::registry::{CompositionType, ValidatorContext};
use std::sync::Arc;
use tracing::trace;

impl ValidationContext<'_> {
    /// Evaluates `constraint` against `value` and records what fails.
    ///
    /// A declaration is evaluated at most once per leaf bean and path, no
    /// matter how many groups or hierarchy levels select it.
    pub(super) fn validate_constraint(
        &mut self,
        constraint: &Arc<ConstraintDeclaration>,
        value: &Value,
        declared_type: &TypeRef,
        path: &PropertyPath,
        leaf: Option<&BeanRef>,
    ) -> Result<(), ValidationError> {
        if !self.mark_processed(leaf, path, &constraint.id) {
            return Ok(());
        }
        trace!(constraint = %constraint.constraint_type, path = %path, "Evaluating constraint");

        let value_type = value.runtime_type().unwrap_or_else(|| declared_type.clone());
        let failures = self.evaluate(constraint, value, &value_type, path)?;
        for failed in &failures {
            self.record(failed, value, path, leaf);
        }
        Ok(())
    }

    /// The declarations to report for `constraint`; empty when it holds.
    fn evaluate(
        &self,
        constraint: &Arc<ConstraintDeclaration>,
        value: &Value,
        value_type: &TypeRef,
        path: &PropertyPath,
    ) -> Result<Vec<Arc<ConstraintDeclaration>>, ValidationError> {
        if !constraint.is_composed() {
            let valid = self.is_valid(constraint, value, value_type, path)?;
            return Ok(if valid { Vec::new() } else { vec![constraint.clone()] });
        }

        let composition = constraint.composition;
        let report_as_single = constraint.report_as_single_violation;
        let stop_at_first_failure =
            composition == CompositionType::And && (report_as_single || self.shared.config.fail_fast);

        let mut failures = Vec::new();
        let mut any_passed = false;
        let mut all_passed = true;
        for member in &constraint.composing {
            let member_failures = self.evaluate(member, value, value_type, path)?;
            if member_failures.is_empty() {
                any_passed = true;
                if composition == CompositionType::Or {
                    break;
                }
            } else {
                all_passed = false;
                failures.extend(member_failures);
                if stop_at_first_failure {
                    break;
                }
            }
        }

        let evaluate_own = !constraint.validators.is_empty() && !(stop_at_first_failure && !failures.is_empty());
        let own_failed = evaluate_own && !self.is_valid(constraint, value, value_type, path)?;

        let passed = match composition {
            CompositionType::And => all_passed,
            CompositionType::Or => any_passed,
            CompositionType::AllFalse => !any_passed,
        };
        if passed {
            failures.clear();
            if own_failed {
                failures.push(constraint.clone());
            }
        } else if report_as_single {
            failures = vec![constraint.clone()];
        } else if own_failed {
            failures.push(constraint.clone());
        }
        Ok(failures)
    }

    fn is_valid(
        &self,
        constraint: &ConstraintDeclaration,
        value: &Value,
        value_type: &TypeRef,
        path: &PropertyPath,
    ) -> Result<bool, ValidationError> {
        let resolver = &self.shared.resolver;
        let validator = resolver.resolve(constraint, value_type, self.factory)?;
        let context = ValidatorContext::new(self.shared.clock.as_ref(), constraint);
        validator.is_valid(value, &context).map_err(|source| {
            let implementation = resolver
                .select(constraint, value_type)
                .map(|index| constraint.validators[index].descriptor.implementation.clone())
                .unwrap_or_else(|_| constraint.constraint_type.clone());
            ValidationError::Validator {
                constraint: constraint.constraint_type.clone(),
                implementation,
                path: path.to_string(),
                source,
            }
        })
    }
}
