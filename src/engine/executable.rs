//! Method and constructor validation: parameters, cross-parameter
//! constraints and return values.

use super::context::ValidationContext;
use crate::core::{BeanRef, Group, PathNode, PropertyPath, TypeRef, Value, OBJECT};
use crate::error::ValidationError;
use crate::groups::ValidationOrder;
use crate::metadata::{BeanMetadata, ExecutableKind, ExecutableMetadata};
use std::sync::Arc;

/// What of an invocation is being validated.
#[derive(Clone, Copy)]
pub(crate) enum Invocation<'v> {
    Parameters(&'v [Value]),
    ReturnValue(&'v Value),
}

/// An executable of a bean type, with the instance it is invoked on.
pub(crate) struct ExecutableTarget<'t> {
    /// `None` for constructor parameters.
    pub bean: Option<&'t BeanRef>,
    pub metadata: Arc<BeanMetadata>,
    pub executable: &'t ExecutableMetadata,
}

impl ExecutableTarget<'_> {
    fn path(&self) -> PropertyPath {
        let signature = &self.executable.signature;
        let step = match signature.kind {
            ExecutableKind::Method => PathNode::Method(signature.name.clone()),
            ExecutableKind::Constructor => PathNode::Constructor(self.metadata.type_name().clone()),
        };
        PropertyPath::root().join(step)
    }
}

impl ValidationContext<'_> {
    /// Validates one side of an invocation for every group of `order`.
    pub(super) fn validate_invocation(
        &mut self,
        target: &ExecutableTarget<'_>,
        invocation: Invocation<'_>,
        order: &ValidationOrder,
    ) -> Result<(), ValidationError> {
        for group in order.groups() {
            self.validate_invocation_for_group(target, invocation, group)?;
            if self.should_stop() {
                return Ok(());
            }
        }
        for group in order.groups() {
            self.cascade_invocation(target, invocation, group)?;
            if self.should_stop() {
                return Ok(());
            }
        }

        for sequence in order.sequences() {
            for bucket in sequence.buckets() {
                let before = self.violation_count();
                for group in bucket {
                    self.validate_invocation_for_group(target, invocation, group)?;
                    if self.should_stop() {
                        return Ok(());
                    }
                }
                if self.violation_count() > before {
                    break;
                }
                for group in bucket {
                    self.cascade_invocation(target, invocation, group)?;
                    if self.should_stop() {
                        return Ok(());
                    }
                }
                if self.violation_count() > before {
                    break;
                }
            }
        }
        Ok(())
    }

    fn validate_invocation_for_group(
        &mut self,
        target: &ExecutableTarget<'_>,
        invocation: Invocation<'_>,
        group: &Group,
    ) -> Result<(), ValidationError> {
        if !group.is_default() || !target.metadata.is_default_group_sequence_redefined() {
            return self.validate_invocation_for_single_group(target, invocation, group);
        }

        let sequence = target
            .metadata
            .default_sequence(target.bean, self.shared.manager.generator())?;
        for bucket in sequence.buckets() {
            let before = self.violation_count();
            for group in bucket {
                self.validate_invocation_for_single_group(target, invocation, group)?;
                if self.should_stop() {
                    return Ok(());
                }
            }
            if self.violation_count() > before {
                break;
            }
        }
        Ok(())
    }

    fn validate_invocation_for_single_group(
        &mut self,
        target: &ExecutableTarget<'_>,
        invocation: Invocation<'_>,
        group: &Group,
    ) -> Result<(), ValidationError> {
        let executable = target.executable;
        let path = target.path();
        match invocation {
            Invocation::Parameters(arguments) => {
                let cross_path = path.join(PathNode::CrossParameter);
                let all_arguments = Value::Array(arguments.to_vec());
                let arguments_type = TypeRef::generic("Array", [TypeRef::raw(OBJECT)]);
                for constraint in &executable.cross_parameter {
                    if !constraint.belongs_to(group) {
                        continue;
                    }
                    self.validate_constraint(constraint, &all_arguments, &arguments_type, &cross_path, target.bean)?;
                    if self.should_stop() {
                        return Ok(());
                    }
                }

                for (parameter, argument) in executable.parameters.iter().zip(arguments) {
                    let parameter_path = path.join(PathNode::Parameter {
                        index: parameter.index,
                        name: parameter.name.clone(),
                    });
                    self.validate_element(&parameter.element, argument, &parameter_path, target.bean, group, &mut |_| true)?;
                    if self.should_stop() {
                        return Ok(());
                    }
                }
            }
            Invocation::ReturnValue(value) => {
                if let Some(return_value) = &executable.return_value {
                    let return_path = path.join(PathNode::ReturnValue);
                    self.validate_element(return_value, value, &return_path, target.bean, group, &mut |_| true)?;
                }
            }
        }
        Ok(())
    }

    fn cascade_invocation(
        &mut self,
        target: &ExecutableTarget<'_>,
        invocation: Invocation<'_>,
        group: &Group,
    ) -> Result<(), ValidationError> {
        let executable = target.executable;
        let path = target.path();
        match invocation {
            Invocation::Parameters(arguments) => {
                for (parameter, argument) in executable.parameters.iter().zip(arguments) {
                    if !parameter.element.is_cascading() {
                        continue;
                    }
                    let parameter_path = path.join(PathNode::Parameter {
                        index: parameter.index,
                        name: parameter.name.clone(),
                    });
                    self.cascade_element(&parameter.element, argument, &parameter_path, group)?;
                    if self.should_stop() {
                        return Ok(());
                    }
                }
            }
            Invocation::ReturnValue(value) => {
                if let Some(return_value) = executable.return_value.as_ref().filter(|r| r.is_cascading()) {
                    self.cascade_element(return_value, value, &path.join(PathNode::ReturnValue), group)?;
                }
            }
        }
        Ok(())
    }
}
