//! The validation engine and its entry points.

use super::context::{ValidationContext, Violations};
use super::cycles::legacy_item_type;
use super::executable::{ExecutableTarget, Invocation};
use super::resolver::{FactoryHandle, ValidatorResolver};
use super::traversable::TraversableResolver;
use super::traversal::{Node, Scope};
use super::violation::MessageInterpolator;
use crate::builder::ValidatorEngineBuilder;
use crate::config::EngineConfig;
use crate::core::{BeanRef, Group, PathNode, PropertyPath, TypeName, TypeRef, Value};
use crate::error::{ArgumentError, ConfigurationError, ValidationError};
use crate::metadata::{BeanMetadata, ExecutableSignature, MetadataManager};
use crate::registry::{ClockProvider, ConstraintValidatorFactory};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug_span;

/// Everything an engine and its factory views share. Frozen after build.
pub(crate) struct EngineShared {
    pub config: EngineConfig,
    pub manager: MetadataManager,
    pub resolver: ValidatorResolver,
    pub clock: Arc<dyn ClockProvider>,
    pub interpolator: Arc<dyn MessageInterpolator>,
    pub traversable: Arc<dyn TraversableResolver>,
    /// Types proven to lie on no cascade cycle; `None` in an open world.
    pub acyclic: Option<HashSet<TypeName>>,
}

/// A bean validation engine.
///
/// Cheap to clone and safe to share between threads. Every call allocates
/// its own traversal state; metadata and validator instances are cached
/// engine-wide.
///
/// # Example
///
/// ```rust
/// use constraint_engine::prelude::*;
///
/// let engine = ValidatorEngine::builder()
///     .source(Mapping::programmatic().with(
///         TypeDeclarations::new("Order")
///             .property(PropertyDeclaration::field("orderNumber", "String").constraint(RawConstraint::new("NotNull"))),
///     ))
///     .build()
///     .unwrap();
///
/// let order = dynamic_bean!("Order", "orderNumber" => Value::Null);
/// let violations = engine.validate(&order.into(), &[]).unwrap();
/// assert_eq!(violations.len(), 1);
/// assert_eq!(violations[0].property_path.to_string(), "orderNumber");
/// ```
#[derive(Clone)]
pub struct ValidatorEngine {
    shared: Arc<EngineShared>,
    factory: FactoryHandle,
}

fn require_bean(object: &Value) -> Result<&BeanRef, ArgumentError> {
    match object {
        Value::Null => Err(ArgumentError::NullObject),
        Value::Bean(bean) => Ok(bean),
        other => Err(ArgumentError::NotABean {
            value_type: other
                .runtime_type()
                .map(|t| t.to_string())
                .unwrap_or_default(),
        }),
    }
}

fn invalid_path(path: &PropertyPath, reason: &str) -> ArgumentError {
    ArgumentError::InvalidPropertyPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// Looks up the value of a map entry addressed by a path subscript.
fn entry_value(entries: &[(Value, Value)], subscript: &PathNode) -> Value {
    let wanted = match subscript {
        PathNode::Index(index) => index.to_string(),
        PathNode::Key { key, .. } => key.to_string(),
        _ => return Value::Null,
    };
    entries
        .iter()
        .find(|(key, _)| key.to_string() == wanted)
        .map(|(_, value)| value.clone())
        .unwrap_or(Value::Null)
}

/// The bean a property path ends on, the path to it and the property name.
struct PropertyTarget {
    bean: Option<BeanRef>,
    metadata: Arc<BeanMetadata>,
    path: PropertyPath,
    property: String,
}

impl ValidatorEngine {
    /// Starts building an engine.
    pub fn builder() -> ValidatorEngineBuilder {
        ValidatorEngineBuilder::new()
    }

    pub(crate) fn new(shared: EngineShared, factory: FactoryHandle) -> Self {
        Self {
            shared: Arc::new(shared),
            factory,
        }
    }

    /// The switches this engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn metadata_manager(&self) -> &MetadataManager {
        &self.shared.manager
    }

    /// The metadata of `type_name`, built on first access.
    ///
    /// Fails when the declarations of the type or of one of its supertypes
    /// are invalid.
    pub fn metadata_for(&self, type_name: &TypeName) -> Result<Arc<BeanMetadata>, ConfigurationError> {
        self.shared.manager.metadata(type_name)
    }

    /// A view of this engine creating validators with `factory`. Metadata
    /// is shared; validator instances are cached per factory.
    pub fn with_factory(&self, factory: Arc<dyn ConstraintValidatorFactory>) -> Self {
        Self {
            shared: self.shared.clone(),
            factory: FactoryHandle::new(factory),
        }
    }

    /// Validates `object` and everything it cascades into. No groups means
    /// `Default`.
    pub fn validate(&self, object: &Value, groups: &[Group]) -> Result<Violations, ValidationError> {
        let bean = require_bean(object)?;
        let type_name = bean.type_name();
        let span = debug_span!("validate", root_type = %type_name);
        let _entered = span.enter();

        let order = self.shared.manager.generator().validation_order(groups)?;
        let metadata = self.shared.manager.metadata(&type_name)?;
        let mut context = ValidationContext::new(&self.shared, &self.factory, Some(bean.clone()), type_name.clone());
        let entered = context.enter(bean, &type_name, order.all_groups(), true);
        context.validate_in_context(&Node::bean(bean, PropertyPath::root(), metadata), &order)?;
        context.leave(entered);
        Ok(context.into_violations())
    }

    /// Validates the constraints of one property of `object`, without
    /// cascading. `property_path` may lead through nested beans, e.g.
    /// `orderList[0].orderNumber`; a null on the way yields no violations.
    pub fn validate_property(
        &self,
        object: &Value,
        property_path: &str,
        groups: &[Group],
    ) -> Result<Violations, ValidationError> {
        let root = require_bean(object)?;
        let root_type = root.type_name();
        let span = debug_span!("validate_property", root_type = %root_type, property = property_path);
        let _entered = span.enter();

        let path = PropertyPath::parse(property_path)?;
        let Some(target) = self.navigate_instance(root, &path)? else {
            return Ok(Violations::new());
        };
        self.validate_property_target(Some(root.clone()), root_type, &target, None, groups)
    }

    /// Validates `value` as if it were the value of `property_path` on a
    /// `bean_type` instance. Violations carry no root or leaf bean.
    pub fn validate_value(
        &self,
        bean_type: &TypeName,
        property_path: &str,
        value: &Value,
        groups: &[Group],
    ) -> Result<Violations, ValidationError> {
        let span = debug_span!("validate_value", root_type = %bean_type, property = property_path);
        let _entered = span.enter();

        let path = PropertyPath::parse(property_path)?;
        let target = self.navigate_type(bean_type, &path)?;
        self.validate_property_target(None, bean_type.clone(), &target, Some(value), groups)
    }

    /// Validates the arguments of a method call on `object` before it runs.
    /// An executable `object`'s type does not declare yields no violations.
    ///
    /// # Example
    ///
    /// ```
    /// use constraint_engine::prelude::*;
    ///
    /// let engine = ValidatorEngine::builder()
    ///     .source(Mapping::programmatic().with(TypeDeclarations::new("Warehouse").executable(
    ///         ExecutableDeclaration::method("ship")
    ///             .parameter(ParameterDeclaration::new("String").constraint(RawConstraint::new("NotNull"))),
    ///     )))
    ///     .build()
    ///     .unwrap();
    ///
    /// let warehouse: Value = dynamic_bean!("Warehouse").into();
    /// let ship = ExecutableSignature::method("ship", ["String"]);
    /// let violations = engine.validate_parameters(&warehouse, &ship, &[Value::Null], &[]).unwrap();
    /// assert_eq!(violations[0].property_path.to_string(), "ship.arg0");
    /// ```
    pub fn validate_parameters(
        &self,
        object: &Value,
        signature: &ExecutableSignature,
        arguments: &[Value],
        groups: &[Group],
    ) -> Result<Violations, ValidationError> {
        let bean = require_bean(object)?;
        let type_name = bean.type_name();
        let span = debug_span!("validate_parameters", root_type = %type_name, executable = %signature);
        let _entered = span.enter();
        self.validate_invocation(Some(bean), Some(bean), type_name, signature, Invocation::Parameters(arguments), groups)
    }

    /// Validates the value a method call on `object` returned.
    pub fn validate_return_value(
        &self,
        object: &Value,
        signature: &ExecutableSignature,
        return_value: &Value,
        groups: &[Group],
    ) -> Result<Violations, ValidationError> {
        let bean = require_bean(object)?;
        let type_name = bean.type_name();
        let span = debug_span!("validate_return_value", root_type = %type_name, executable = %signature);
        let _entered = span.enter();
        self.validate_invocation(Some(bean), Some(bean), type_name, signature, Invocation::ReturnValue(return_value), groups)
    }

    /// Constructor arguments, before any instance exists.
    pub fn validate_constructor_parameters(
        &self,
        bean_type: &TypeName,
        signature: &ExecutableSignature,
        arguments: &[Value],
        groups: &[Group],
    ) -> Result<Violations, ValidationError> {
        let span = debug_span!("validate_constructor_parameters", root_type = %bean_type, executable = %signature);
        let _entered = span.enter();
        self.validate_invocation(None, None, bean_type.clone(), signature, Invocation::Parameters(arguments), groups)
    }

    /// The object a constructor created.
    pub fn validate_constructor_return_value(
        &self,
        signature: &ExecutableSignature,
        created: &Value,
        groups: &[Group],
    ) -> Result<Violations, ValidationError> {
        let bean = require_bean(created)?;
        let bean_type = TypeName::new(signature.name.as_str());
        let span = debug_span!("validate_constructor_return_value", root_type = %bean_type, executable = %signature);
        let _entered = span.enter();
        self.validate_invocation(None, Some(bean), bean_type, signature, Invocation::ReturnValue(created), groups)
    }

    fn validate_invocation(
        &self,
        root: Option<&BeanRef>,
        leaf: Option<&BeanRef>,
        type_name: TypeName,
        signature: &ExecutableSignature,
        invocation: Invocation<'_>,
        groups: &[Group],
    ) -> Result<Violations, ValidationError> {
        let metadata = self.shared.manager.metadata(&type_name)?;
        let Some(executable) = metadata.executable(signature) else {
            return Ok(Violations::new());
        };
        if let Invocation::Parameters(arguments) = invocation {
            if arguments.len() != executable.parameters.len() {
                return Err(ArgumentError::ArgumentCountMismatch {
                    executable: signature.to_string(),
                    expected: executable.parameters.len(),
                    actual: arguments.len(),
                }
                .into());
            }
        }

        let order = self.shared.manager.generator().validation_order(groups)?;
        let context = ValidationContext::new(&self.shared, &self.factory, root.cloned(), type_name);
        let mut context = match invocation {
            Invocation::Parameters(arguments) => context.with_parameters(arguments),
            Invocation::ReturnValue(value) => context.with_return_value(value),
        };
        let target = ExecutableTarget {
            bean: leaf,
            metadata: metadata.clone(),
            executable,
        };
        context.validate_invocation(&target, invocation, &order)?;
        Ok(context.into_violations())
    }

    fn validate_property_target(
        &self,
        root: Option<BeanRef>,
        root_type: TypeName,
        target: &PropertyTarget,
        value: Option<&Value>,
        groups: &[Group],
    ) -> Result<Violations, ValidationError> {
        let order = self.shared.manager.generator().validation_order(groups)?;
        let mut context = ValidationContext::new(&self.shared, &self.factory, root, root_type);
        let node = Node {
            bean: target.bean.as_ref(),
            path: target.path.clone(),
            metadata: target.metadata.clone(),
            scope: Scope::Property {
                name: &target.property,
                value,
            },
        };
        context.validate_in_context(&node, &order)?;
        Ok(context.into_violations())
    }

    fn require_property(&self, type_name: &TypeName, property: &str) -> Result<Arc<BeanMetadata>, ValidationError> {
        let metadata = self.shared.manager.metadata(type_name)?;
        if metadata.property(property).is_none() {
            return Err(ArgumentError::UnknownProperty {
                type_name: type_name.clone(),
                property: property.to_string(),
            }
            .into());
        }
        Ok(metadata)
    }

    /// Follows `path` through the instance graph. `None` when a value on the
    /// way is null.
    fn navigate_instance(&self, root: &BeanRef, path: &PropertyPath) -> Result<Option<PropertyTarget>, ValidationError> {
        let Some((PathNode::Property(property), steps)) = path.nodes().split_last() else {
            return Err(invalid_path(path, "must end with a property name").into());
        };

        let mut current = Value::Bean(root.clone());
        for step in steps {
            current = match (step, &current) {
                (_, Value::Null) => return Ok(None),
                (PathNode::Property(name), Value::Bean(bean)) => {
                    self.require_property(&bean.type_name(), name)?;
                    bean.property(name).unwrap_or(Value::Null)
                }
                (PathNode::Index(index), value) if value.as_elements().is_some() => value
                    .as_elements()
                    .and_then(|items| items.get(*index).cloned())
                    .unwrap_or(Value::Null),
                (PathNode::Index(_) | PathNode::Key { .. }, Value::Map(entries)) => entry_value(entries, step),
                _ => return Err(invalid_path(path, "does not lead to a bean").into()),
            };
        }

        match current {
            Value::Null => Ok(None),
            Value::Bean(bean) => {
                let metadata = self.require_property(&bean.type_name(), property)?;
                Ok(Some(PropertyTarget {
                    bean: Some(bean),
                    metadata,
                    path: path.parent(),
                    property: property.clone(),
                }))
            }
            _ => Err(invalid_path(path, "does not lead to a bean").into()),
        }
    }

    /// Follows `path` through declared property types.
    fn navigate_type(&self, bean_type: &TypeName, path: &PropertyPath) -> Result<PropertyTarget, ValidationError> {
        let Some((PathNode::Property(property), steps)) = path.nodes().split_last() else {
            return Err(invalid_path(path, "must end with a property name").into());
        };

        let types = self.shared.manager.types();
        let mut declared = TypeRef::raw(bean_type.clone());
        for step in steps {
            declared = match step {
                PathNode::Property(name) => {
                    let metadata = self.require_property(&declared.erased_name(), name)?;
                    metadata
                        .property(name)
                        .map(|p| p.element.declared_type.clone())
                        .ok_or_else(|| invalid_path(path, "does not lead to a bean"))?
                }
                PathNode::Index(_) | PathNode::Key { .. } => legacy_item_type(types, &declared)
                    .ok_or_else(|| invalid_path(path, "subscripts a type that is not a container"))?,
                _ => return Err(invalid_path(path, "does not lead to a bean").into()),
            };
        }

        let metadata = self.require_property(&declared.erased_name(), property)?;
        Ok(PropertyTarget {
            bean: None,
            metadata,
            path: path.parent(),
            property: property.clone(),
        })
    }
}

impl fmt::Debug for ValidatorEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorEngine")
            .field("config", &self.shared.config)
            .field("factory", &self.factory)
            .field("cached_types", &self.shared.manager.len())
            .finish()
    }
}
