//! Walking a bean graph: group ordering per node, property and container
//! element constraints, and cascades into nested beans.

use super::context::ValidationContext;
use super::cycles::legacy_item_type;
use crate::core::{BeanRef, Group, PathNode, PropertyPath, TypeName, TypeRef, Value};
use crate::error::ValidationError;
use crate::groups::ValidationOrder;
use crate::metadata::{BeanMetadata, ConstraintDeclaration, ContainerSlot, ElementMetadata};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Which part of a bean a traversal step covers.
pub(crate) enum Scope<'n> {
    /// Class constraints, every property, then cascades.
    Bean,
    /// One property, no cascades. `value` replaces the property's value when
    /// there is no instance to read it from.
    Property { name: &'n str, value: Option<&'n Value> },
}

/// A bean being validated at a position in the graph.
pub(crate) struct Node<'n> {
    pub bean: Option<&'n BeanRef>,
    pub path: PropertyPath,
    pub metadata: Arc<BeanMetadata>,
    pub scope: Scope<'n>,
}

impl<'n> Node<'n> {
    pub fn bean(bean: &'n BeanRef, path: PropertyPath, metadata: Arc<BeanMetadata>) -> Self {
        Self {
            bean: Some(bean),
            path,
            metadata,
            scope: Scope::Bean,
        }
    }

    fn property_value(&self, name: &str) -> Value {
        if let Scope::Property { value: Some(value), .. } = &self.scope {
            return (*value).clone();
        }
        self.bean
            .and_then(|bean| bean.property(name))
            .unwrap_or(Value::Null)
    }

    fn covers(&self, property: &str) -> bool {
        match &self.scope {
            Scope::Bean => true,
            Scope::Property { name, .. } => *name == property,
        }
    }
}

type Filter<'f> = &'f mut dyn FnMut(&ConstraintDeclaration) -> bool;

/// The values held by one slot of a container, with their paths.
pub(super) fn container_items(value: &Value, slot: ContainerSlot, path: &PropertyPath) -> Vec<(Value, PropertyPath)> {
    match slot {
        ContainerSlot::Element => value
            .as_elements()
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| (item.clone(), path.index(i)))
                    .collect()
            })
            .unwrap_or_default(),
        ContainerSlot::MapKey | ContainerSlot::MapValue => value
            .as_entries()
            .map(|entries| {
                entries
                    .iter()
                    .map(|(key, entry)| {
                        let of_key = slot == ContainerSlot::MapKey;
                        let item = if of_key { key.clone() } else { entry.clone() };
                        (item, path.key(key.clone(), of_key))
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Targets of a cascade on a whole container: iterable elements or map values.
fn legacy_items(value: &Value, path: &PropertyPath) -> Vec<(Value, PropertyPath)> {
    if value.as_entries().is_some() {
        container_items(value, ContainerSlot::MapValue, path)
    } else {
        container_items(value, ContainerSlot::Element, path)
    }
}

impl ValidationContext<'_> {
    /// Validates `node` for every group of `order`.
    pub(super) fn validate_in_context(&mut self, node: &Node<'_>, order: &ValidationOrder) -> Result<(), ValidationError> {
        let metadata = &node.metadata;
        if metadata.is_default_group_sequence_redefined() {
            order.assert_default_group_sequence_is_expandable(&metadata.default_group_list(node.bean)?)?;
        }

        for group in order.groups() {
            self.validate_constraints_for_group(node, group)?;
            if self.should_stop() {
                return Ok(());
            }
        }
        for group in order.groups() {
            self.validate_cascaded(node, group)?;
            if self.should_stop() {
                return Ok(());
            }
        }

        for sequence in order.sequences() {
            for bucket in sequence.buckets() {
                let before = self.violation_count();
                for group in bucket {
                    self.validate_constraints_for_group(node, group)?;
                    if self.should_stop() {
                        return Ok(());
                    }
                }
                if self.violation_count() > before {
                    break;
                }
                for group in bucket {
                    self.validate_cascaded(node, group)?;
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

    fn validate_constraints_for_group(&mut self, node: &Node<'_>, group: &Group) -> Result<(), ValidationError> {
        if group.is_default() {
            return self.validate_constraints_for_default_group(node);
        }
        let metadata = node.metadata.clone();
        self.validate_meta_constraints(node, &metadata, group, &mut |_| true)
    }

    /// Walks the class hierarchy. Each class contributes the constraints it
    /// hosts; a class with a redefined default sequence takes over the rest
    /// of the walk with its own buckets.
    fn validate_constraints_for_default_group(&mut self, node: &Node<'_>) -> Result<(), ValidationError> {
        let shared = self.shared;
        let types = shared.manager.types();
        let mut validated_interfaces: HashMap<TypeName, TypeName> = HashMap::new();

        for class in node.metadata.class_hierarchy() {
            let hosting = if class == node.metadata.type_name() {
                node.metadata.clone()
            } else {
                shared.manager.metadata(class)?
            };

            let mut filter = |constraint: &ConstraintDeclaration, hosted_only: bool| {
                if hosted_only && !hosting.hosts(&constraint.declaring_type) {
                    return false;
                }
                if types.is_interface(&constraint.declaring_type) {
                    match validated_interfaces.get(&constraint.declaring_type) {
                        Some(validated_by) if validated_by != class => return false,
                        Some(_) => {}
                        None => {
                            validated_interfaces.insert(constraint.declaring_type.clone(), class.clone());
                        }
                    }
                }
                true
            };

            if hosting.is_default_group_sequence_redefined() {
                let sequence = hosting.default_sequence(node.bean, shared.manager.generator())?;
                for bucket in sequence.buckets() {
                    let before = self.violation_count();
                    for group in bucket {
                        self.validate_meta_constraints(node, &hosting, group, &mut |c| filter(c, false))?;
                        if self.should_stop() {
                            return Ok(());
                        }
                    }
                    if self.violation_count() > before {
                        break;
                    }
                }
                // The redefined sequence covers the superclasses too.
                break;
            }

            self.validate_meta_constraints(node, &hosting, &Group::default(), &mut |c| filter(c, true))?;
            if self.should_stop() {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Class and property constraints of `metadata` in `group` accepted by
    /// `filter`.
    fn validate_meta_constraints(
        &mut self,
        node: &Node<'_>,
        metadata: &BeanMetadata,
        group: &Group,
        filter: Filter<'_>,
    ) -> Result<(), ValidationError> {
        if let (Scope::Bean, Some(bean)) = (&node.scope, node.bean) {
            let bean_value = Value::Bean(bean.clone());
            let bean_type = TypeRef::raw(metadata.type_name().clone());
            for constraint in metadata.class_constraints() {
                if !constraint.belongs_to(group) || !filter(constraint.as_ref()) {
                    continue;
                }
                self.validate_constraint(constraint, &bean_value, &bean_type, &node.path, node.bean)?;
                if self.should_stop() {
                    return Ok(());
                }
            }
        }

        let shared = self.shared;
        for property in metadata.properties() {
            if !node.covers(&property.name) || !property.element.is_constrained() {
                continue;
            }
            let step = PathNode::Property(property.name.clone());
            if !shared
                .traversable
                .is_reachable(node.bean, &step, &self.root_type, &node.path)
            {
                continue;
            }
            let value = node.property_value(&property.name);
            let path = node.path.join(step);
            self.validate_element(&property.element, &value, &path, node.bean, group, &mut *filter)?;
            if self.should_stop() {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Constraints of an element and, recursively, of its container slots.
    pub(super) fn validate_element(
        &mut self,
        element: &ElementMetadata,
        value: &Value,
        path: &PropertyPath,
        leaf: Option<&BeanRef>,
        group: &Group,
        filter: Filter<'_>,
    ) -> Result<(), ValidationError> {
        for constraint in &element.constraints {
            if !constraint.belongs_to(group) || !filter(constraint.as_ref()) {
                continue;
            }
            self.validate_constraint(constraint, value, &element.declared_type, path, leaf)?;
            if self.should_stop() {
                return Ok(());
            }
        }
        for container in &element.container_elements {
            if !container.element.is_constrained() {
                continue;
            }
            for (item, item_path) in container_items(value, container.slot, path) {
                self.validate_element(&container.element, &item, &item_path, leaf, group, &mut *filter)?;
                if self.should_stop() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn validate_cascaded(&mut self, node: &Node<'_>, group: &Group) -> Result<(), ValidationError> {
        let (Scope::Bean, Some(bean)) = (&node.scope, node.bean) else {
            return Ok(());
        };
        let shared = self.shared;
        for property in node.metadata.cascaded_properties() {
            let step = PathNode::Property(property.name.clone());
            let traversable = &shared.traversable;
            if !traversable.is_reachable(Some(bean), &step, &self.root_type, &node.path)
                || !traversable.is_cascadable(Some(bean), &step, &self.root_type, &node.path)
            {
                trace!(property = %property.name, path = %node.path, "Skipping untraversable cascade");
                continue;
            }
            let value = bean.property(&property.name).unwrap_or(Value::Null);
            let path = node.path.join(step);
            self.cascade_element(&property.element, &value, &path, group)?;
            if self.should_stop() {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Follows the cascades of `element` holding `value`.
    pub(super) fn cascade_element(
        &mut self,
        element: &ElementMetadata,
        value: &Value,
        path: &PropertyPath,
        group: &Group,
    ) -> Result<(), ValidationError> {
        if value.is_null() {
            return Ok(());
        }

        if element.cascading {
            let converted = element.convert_group(group);
            let expand = converted != *group;
            match value {
                Value::Bean(bean) => self.cascade_bean(bean, &element.declared_type, path, &converted, expand)?,
                _ => {
                    let item_type = legacy_item_type(self.shared.manager.types(), &element.declared_type)
                        .unwrap_or_else(TypeRef::object);
                    for (item, item_path) in legacy_items(value, path) {
                        if let Value::Bean(bean) = &item {
                            self.cascade_bean(bean, &item_type, &item_path, &converted, expand)?;
                            if self.should_stop() {
                                return Ok(());
                            }
                        }
                    }
                }
            }
            if self.should_stop() {
                return Ok(());
            }
        }

        for container in &element.container_elements {
            if !container.element.is_cascading() {
                continue;
            }
            for (item, item_path) in container_items(value, container.slot, path) {
                self.cascade_element(&container.element, &item, &item_path, group)?;
                if self.should_stop() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Validates `bean`, reached through an element declared as `declared`,
    /// unless it is already being validated for `group` further up.
    fn cascade_bean(
        &mut self,
        bean: &BeanRef,
        declared: &TypeRef,
        path: &PropertyPath,
        group: &Group,
        expand: bool,
    ) -> Result<(), ValidationError> {
        let runtime_type = bean.type_name();
        let shared = self.shared;
        let conforms = shared
            .manager
            .types()
            .is_subtype(&runtime_type, &declared.erased_name());
        if self.is_in_progress(bean, &runtime_type, group, conforms) {
            trace!(bean_type = %runtime_type, path = %path, group = %group, "Skipping cascade into bean already being validated");
            return Ok(());
        }

        let metadata = shared.manager.metadata(&runtime_type)?;
        let order = shared.manager.generator().single_group_order(group, expand)?;
        let mut groups = order.all_groups();
        groups.push(group.clone());
        let entered = self.enter(bean, &runtime_type, groups, conforms);

        let node = Node::bean(bean, path.clone(), metadata);
        let result = self.validate_in_context(&node, &order);
        self.leave(entered);
        result
    }
}
