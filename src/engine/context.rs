//! Per-call traversal state.

use super::resolver::FactoryHandle;
use super::validator::EngineShared;
use super::violation::{ConstraintViolation, InterpolationContext};
use crate::core::{BeanRef, Group, PropertyPath, TypeName, Value};
use crate::metadata::{ConstraintDeclaration, DeclarationId};
use indexmap::IndexSet;
use std::collections::HashSet;
use std::sync::Arc;

/// Violations of one call, in discovery order, equal violations collapsed.
pub type Violations = IndexSet<ConstraintViolation>;

type ProcessedKey = (Option<usize>, PropertyPath, DeclarationId);
type ProgressKey = (usize, TypeName, Group);

/// What [`ValidationContext::enter`] changed, undone by
/// [`ValidationContext::leave`].
#[must_use]
pub(crate) struct Entered {
    keys: Vec<ProgressKey>,
    mistyped: bool,
}

/// State of one top-level validation call. Never shared between calls.
pub(crate) struct ValidationContext<'e> {
    pub(super) shared: &'e EngineShared,
    pub(super) factory: &'e FactoryHandle,
    pub(super) root_bean: Option<BeanRef>,
    pub(super) root_type: TypeName,
    executable_parameters: Option<Vec<Value>>,
    executable_return_value: Option<Value>,
    violations: Violations,
    /// Beans currently being validated on the path from the root, with the
    /// group they were entered for.
    in_progress: HashSet<ProgressKey>,
    /// Cascades on the current path into a bean that is not an instance of
    /// the cascading element's declared type.
    mistyped: usize,
    processed: HashSet<ProcessedKey>,
}

impl<'e> ValidationContext<'e> {
    /// A fresh context for one call rooted at `root_type`.
    pub fn new(
        shared: &'e EngineShared,
        factory: &'e FactoryHandle,
        root_bean: Option<BeanRef>,
        root_type: TypeName,
    ) -> Self {
        Self {
            shared,
            factory,
            root_bean,
            root_type,
            executable_parameters: None,
            executable_return_value: None,
            violations: Violations::new(),
            in_progress: HashSet::new(),
            mistyped: 0,
            processed: HashSet::new(),
        }
    }

    /// Attaches the arguments of the validated invocation to every violation.
    pub fn with_parameters(mut self, arguments: &[Value]) -> Self {
        self.executable_parameters = Some(arguments.to_vec());
        self
    }

    /// Attaches the validated return value to every violation.
    pub fn with_return_value(mut self, value: &Value) -> Self {
        self.executable_return_value = Some(value.clone());
        self
    }

    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    /// Fail-fast mode and something was already found.
    pub fn should_stop(&self) -> bool {
        self.shared.config.fail_fast && !self.violations.is_empty()
    }

    /// Marks a declaration as evaluated for `leaf` at `path`. Returns false
    /// when it already was.
    pub fn mark_processed(&mut self, leaf: Option<&BeanRef>, path: &PropertyPath, id: &DeclarationId) -> bool {
        self.processed
            .insert((leaf.map(BeanRef::identity), path.clone(), id.clone()))
    }

    /// Whether the static cascade analysis rules out `bean` being its own
    /// ancestor. It only covers paths on which every cascaded bean was an
    /// instance of its declared type.
    fn is_provably_acyclic(&self, type_name: &TypeName, conforms: bool) -> bool {
        conforms
            && self.mistyped == 0
            && self
                .shared
                .acyclic
                .as_ref()
                .is_some_and(|acyclic| acyclic.contains(type_name))
    }

    /// Whether `bean` is already being validated for `group` on the path
    /// from the root. `conforms` tells whether the bean is an instance of
    /// the declared type it was cascaded through.
    pub fn is_in_progress(&self, bean: &BeanRef, type_name: &TypeName, group: &Group, conforms: bool) -> bool {
        !self.is_provably_acyclic(type_name, conforms)
            && self
                .in_progress
                .contains(&(bean.identity(), type_name.clone(), group.clone()))
    }

    /// Marks `bean` as being validated for `groups` until the returned
    /// [`Entered`] is passed back to [`Self::leave`].
    pub fn enter(&mut self, bean: &BeanRef, type_name: &TypeName, groups: Vec<Group>, conforms: bool) -> Entered {
        let keys = groups
            .into_iter()
            .map(|group| (bean.identity(), type_name.clone(), group))
            .filter(|key| self.in_progress.insert(key.clone()))
            .collect();
        if !conforms {
            self.mistyped += 1;
        }
        Entered {
            keys,
            mistyped: !conforms,
        }
    }

    pub fn leave(&mut self, entered: Entered) {
        for key in entered.keys {
            self.in_progress.remove(&key);
        }
        if entered.mistyped {
            self.mistyped -= 1;
        }
    }

    /// Records a violation of `constraint` by `value` at `path`.
    pub fn record(
        &mut self,
        constraint: &Arc<ConstraintDeclaration>,
        value: &Value,
        path: &PropertyPath,
        leaf: Option<&BeanRef>,
    ) {
        let message = self.shared.interpolator.interpolate(
            &constraint.message_template,
            &InterpolationContext {
                constraint,
                invalid_value: value,
            },
        );
        self.violations.insert(ConstraintViolation {
            message,
            message_template: constraint.message_template.clone(),
            root_bean: self.root_bean.clone(),
            root_type: self.root_type.clone(),
            leaf_bean: leaf.cloned(),
            invalid_value: value.clone(),
            property_path: path.clone(),
            constraint: constraint.clone(),
            executable_parameters: self.executable_parameters.clone(),
            executable_return_value: self.executable_return_value.clone(),
        });
    }

    pub fn into_violations(self) -> Violations {
        self.violations
    }
}
