//! Runtime values of the object graph being validated.
//!
//! Beans expose their properties through the [`Bean`] trait; everything the
//! engine reads from a graph is a [`Value`]. Bean references compare by
//! identity so that cyclic graphs can be tracked during traversal.

use super::types::{TypeName, TypeRef};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An object whose properties can be validated.
///
/// `property` receives the canonical property name (`name` for both a
/// `name` field and a `getName` accessor) and returns `None` when the
/// bean has no such property. Absent properties are validated as `Null`.
pub trait Bean: Send + Sync + fmt::Debug {
    fn type_name(&self) -> TypeName;

    fn property(&self, name: &str) -> Option<Value>;
}

/// Shared handle to a bean. Equality and hashing use instance identity.
#[derive(Clone)]
pub struct BeanRef(Arc<dyn Bean>);

impl BeanRef {
    /// Wraps a shared bean. Clones of the result keep its identity.
    pub fn new(bean: Arc<dyn Bean>) -> Self {
        Self(bean)
    }

    /// Stable identity of the referenced instance for the lifetime of the handle.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn type_name(&self) -> TypeName {
        self.0.type_name()
    }

    /// Reads property `name`; `None` when the bean has no such property.
    pub fn property(&self, name: &str) -> Option<Value> {
        self.0.property(name)
    }

    /// Whether both references point at the same instance.
    pub fn ptr_eq(&self, other: &BeanRef) -> bool {
        self.identity() == other.identity()
    }
}

impl PartialEq for BeanRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for BeanRef {}

impl Hash for BeanRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for BeanRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:x}", self.type_name(), self.identity())
    }
}

impl<B: Bean + 'static> From<Arc<B>> for BeanRef {
    fn from(bean: Arc<B>) -> Self {
        Self(bean)
    }
}

/// A value read from the object graph.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
    Set(Vec<Value>),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Bean(BeanRef),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The bean held by this value, if it is one.
    pub fn as_bean(&self) -> Option<&BeanRef> {
        match self {
            Self::Bean(bean) => Some(bean),
            _ => None,
        }
    }

    /// Elements of a list, set or array.
    pub fn as_elements(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) | Self::Set(items) | Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Key/value pairs of a map, in insertion order.
    pub fn as_entries(&self) -> Option<&[(Value, Value)]> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Whether this is a list, set, array or map.
    pub fn is_container(&self) -> bool {
        self.as_elements().is_some() || self.as_entries().is_some()
    }

    /// The run-time type used for validator resolution and metadata lookup.
    /// `None` for `Null`, which has no run-time type.
    pub fn runtime_type(&self) -> Option<TypeRef> {
        let name = match self {
            Self::Null => return None,
            Self::Bool(_) => "Boolean",
            Self::Int(_) => "Long",
            Self::Float(_) => "Double",
            Self::Text(_) => "String",
            Self::Timestamp(_) => "Instant",
            Self::List(_) => "List",
            Self::Set(_) => "Set",
            Self::Array(_) => "Array",
            Self::Map(_) => "Map",
            Self::Bean(bean) => return Some(TypeRef::raw(bean.type_name())),
        };
        Some(TypeRef::raw(name))
    }

    /// Identity of the referenced bean, if this is one.
    pub fn identity(&self) -> Option<usize> {
        self.as_bean().map(BeanRef::identity)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::List(a), Self::List(b))
            | (Self::Set(a), Self::Set(b))
            | (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Bean(a), Self::Bean(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Float(f) => f.to_bits().hash(state),
            Self::Text(s) => s.hash(state),
            Self::Timestamp(t) => t.hash(state),
            Self::List(items) | Self::Set(items) | Self::Array(items) => items.hash(state),
            Self::Map(entries) => entries.hash(state),
            Self::Bean(bean) => bean.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            Ok(())
        }

        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            Self::List(items) | Self::Array(items) => {
                f.write_str("[")?;
                join(f, items)?;
                f.write_str("]")
            }
            Self::Set(items) => {
                f.write_str("{")?;
                join(f, items)?;
                f.write_str("}")
            }
            Self::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}={value}")?;
                }
                f.write_str("}")
            }
            Self::Bean(bean) => write!(f, "{bean:?}"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Timestamp(t) => t.serialize(serializer),
            Self::List(items) | Self::Set(items) | Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(&key.to_string(), value)?;
                }
                map.end()
            }
            // Beans are reported by type only; their graph may be cyclic.
            Self::Bean(bean) => serializer.serialize_str(bean.type_name().as_str()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}

impl From<BeanRef> for Value {
    fn from(value: BeanRef) -> Self {
        Self::Bean(value)
    }
}

impl<B: Bean + 'static> From<Arc<B>> for Value {
    fn from(value: Arc<B>) -> Self {
        Self::Bean(BeanRef::from(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A bean backed by a property map, for graphs assembled at run time.
///
/// Properties can be set after construction, which allows building cyclic
/// graphs.
///
/// # Example
///
/// ```rust
/// use constraint_engine::core::{Bean, DynamicBean, Value};
/// use std::sync::Arc;
///
/// let order = Arc::new(DynamicBean::new("Order").with("orderNumber", Value::Null));
/// let customer = Arc::new(DynamicBean::new("Customer"));
/// customer.set("orderList", Value::List(vec![order.clone().into()]));
///
/// assert_eq!(customer.type_name().as_str(), "Customer");
/// assert!(order.property("orderNumber").is_some_and(|v| v.is_null()));
/// ```
pub struct DynamicBean {
    type_name: TypeName,
    properties: RwLock<IndexMap<String, Value>>,
}

impl DynamicBean {
    /// A bean of `type_name` without properties.
    pub fn new(type_name: impl Into<TypeName>) -> Self {
        Self {
            type_name: type_name.into(),
            properties: RwLock::new(IndexMap::new()),
        }
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.write().insert(name.into(), value.into());
        self
    }

    /// Sets or replaces a property. Takes `&self` so that beans already
    /// shared through an `Arc` can be linked into cycles.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.write().insert(name.into(), value.into());
    }

    pub fn into_value(self) -> Value {
        Value::from(Arc::new(self))
    }
}

impl Bean for DynamicBean {
    fn type_name(&self) -> TypeName {
        self.type_name.clone()
    }

    fn property(&self, name: &str) -> Option<Value> {
        self.properties.read().get(name).cloned()
    }
}

impl fmt::Debug for DynamicBean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Property values are left out: the graph may be cyclic.
        f.debug_struct("DynamicBean")
            .field("type_name", &self.type_name)
            .field("properties", &self.properties.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bean_refs_compare_by_identity() {
        let a = Arc::new(DynamicBean::new("Order").with("id", 1));
        let b = Arc::new(DynamicBean::new("Order").with("id", 1));

        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn runtime_types_follow_value_kind() {
        assert_eq!(Value::Null.runtime_type(), None);
        assert_eq!(Value::from("x").runtime_type(), Some(TypeRef::raw("String")));
        assert_eq!(Value::from(3).runtime_type(), Some(TypeRef::raw("Long")));
        let bean = Arc::new(DynamicBean::new("Car"));
        assert_eq!(Value::from(bean).runtime_type(), Some(TypeRef::raw("Car")));
    }

    #[test]
    fn cyclic_bean_debug_terminates() {
        let parent = Arc::new(DynamicBean::new("Parent"));
        let child = Arc::new(DynamicBean::new("Child").with("parent", parent.clone()));
        parent.set("child", child);

        let rendered = format!("{parent:?}");
        assert!(rendered.contains("Parent"));
        assert!(rendered.contains("child"));
    }

    #[test]
    fn display_uses_natural_representation() {
        let map = Value::Map(vec![(Value::from("a"), Value::from(1))]);
        assert_eq!(map.to_string(), "{a=1}");
        assert_eq!(Value::List(vec![1.into(), 2.into()]).to_string(), "[1, 2]");
    }

    #[test]
    fn serializes_maps_with_string_keys() {
        let map = Value::Map(vec![(Value::from(7), Value::from(true))]);
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json, serde_json::json!({"7": true}));
    }
}
