//! The validation engine.
//!
//! A [`ValidatorEngine`] walks a bean graph from a root, evaluates the
//! constraints its metadata selects for the requested groups and follows
//! cascades into nested beans, containers and maps. Validators are picked
//! per run-time value type by the [`ValidatorResolver`].
//!
//! Traversal state lives in a per-call context; everything else is frozen
//! at build time and shared.

mod context;
mod cycles;
mod executable;
mod resolver;
mod traversable;
mod traversal;
mod tree;
mod validator;
mod violation;

pub use context::Violations;
pub use cycles::CascadeGraph;
pub use resolver::{FactoryHandle, ValidatorResolver};
pub use traversable::{TraversableResolver, TraverseAll};
pub use validator::ValidatorEngine;
pub use violation::{ConstraintViolation, InterpolationContext, MessageInterpolator, PassthroughInterpolator, ViolationReport};

pub(crate) use validator::EngineShared;
