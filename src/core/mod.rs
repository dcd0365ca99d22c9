//! Core model shared by every other module.
//!
//! - Type references and the declared type hierarchy
//! - Runtime values and beans
//! - Group markers
//! - Property paths

mod group;
mod path;
mod types;
mod value;

pub use group::{Group, DEFAULT_GROUP};
pub use path::{PathNode, PropertyPath};
pub use types::{
    TypeDecl, TypeError, TypeGraph, TypeKind, TypeName, TypeRef, CONSTRAINT_VALIDATOR, OBJECT,
};
pub use value::{Bean, BeanRef, DynamicBean, Value};
