//! Constraint Engine: declarative validation of in-memory object graphs
//!
//! Constraints are declared against types and their members, either inline,
//! through JSON mapping descriptors or programmatically. The engine merges
//! those declarations across the type hierarchy, orders them by validation
//! group and walks object graphs from a root bean, reporting every failed
//! constraint with the path that leads to it.
//!
//! # Core Concepts
//!
//! - **Constraint**: a named rule with attributes, checked by the most
//!   specific registered validator for the value's run-time type
//! - **Group**: a marker partitioning constraints into validation phases;
//!   group sequences stop at the first phase with violations
//! - **Cascade**: following a member into the bean (or container of beans)
//!   it holds
//! - **Violation**: a failed constraint, its message and property path
//!
//! # Example
//!
//! ```rust
//! use constraint_engine::prelude::*;
//!
//! let engine = ValidatorEngine::builder()
//!     .source(
//!         Mapping::programmatic()
//!             .with(TypeDeclarations::new("Customer").property(
//!                 PropertyDeclaration::field("orderList", "List<Order>").cascade(),
//!             ))
//!             .with(TypeDeclarations::new("Order").property(
//!                 PropertyDeclaration::field("orderNumber", "String").constraint(RawConstraint::new("NotNull")),
//!             )),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let order = dynamic_bean!("Order", "orderNumber" => Value::Null);
//! let customer = dynamic_bean!("Customer", "orderList" => Value::List(vec![order.into()]));
//!
//! let violations = engine.validate(&customer.into(), &[]).unwrap();
//! assert_eq!(violations.len(), 1);
//! assert_eq!(violations[0].property_path.to_string(), "orderList[0].orderNumber");
//! ```

pub mod builder;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod groups;
pub mod metadata;
pub mod registry;

// Re-export commonly used types
pub use builder::ValidatorEngineBuilder;
pub use config::EngineConfig;
pub use core::{Group, PropertyPath, TypeName, TypeRef, Value};
pub use engine::{ConstraintViolation, ValidatorEngine, Violations};
pub use error::{ArgumentError, ConfigurationError, ValidationError};

/// Everything needed to declare constraints and run validations.
pub mod prelude {
    pub use crate::builder::ValidatorEngineBuilder;
    pub use crate::config::EngineConfig;
    pub use crate::core::{Bean, BeanRef, DynamicBean, Group, PropertyPath, TypeDecl, TypeName, TypeRef, Value};
    pub use crate::engine::{ConstraintViolation, ValidatorEngine, Violations};
    pub use crate::error::{ArgumentError, ConfigurationError, ValidationError};
    pub use crate::groups::GroupDecl;
    pub use crate::metadata::{
        ContainerElementDeclaration, ContainerSlot, ElementDeclaration, ExecutableDeclaration, ExecutableSignature,
        Mapping, ParameterDeclaration, PropertyDeclaration, RawConstraint, TypeDeclarations,
    };
    pub use crate::registry::{ConstraintDefinition, ValidatorContribution, ValidatorDescriptor};
    pub use crate::{dynamic_bean, groups};
}
