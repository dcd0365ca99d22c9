//! Bean metadata: what is constrained, what cascades and how `Default`
//! expands, per type.
//!
//! Declarations from every [`DeclarationSource`] are merged across a type's
//! ancestors by the [`MetadataBuilder`] into an immutable [`BeanMetadata`]
//! snapshot, which the [`MetadataManager`] builds lazily and caches.

mod bean;
mod builder;
mod checks;
mod declaration;
pub mod descriptor;
mod manager;
mod source;

pub use bean::{
    BeanMetadata, ContainerElementMetadata, DefaultGroupSequence, DefaultGroupSequenceProvider, ElementMetadata,
    ExecutableMetadata, ExecutableSignature, ParameterMetadata, PropertyMetadata,
};
pub use builder::MetadataBuilder;
pub use checks::{ConversionProblem, SequenceProblem};
pub use declaration::{ConstraintDeclaration, ConstraintLocation, DeclarationId};
pub use manager::MetadataManager;
pub use source::{
    ContainerElementDeclaration, ContainerSlot, DeclarationSource, ElementDeclaration, ExecutableDeclaration,
    ExecutableKind, Mapping, MemberKind, ParameterDeclaration, PropertyDeclaration, RawConstraint,
    SequenceProviderRef, SourceOrigin, TypeDeclarations,
};
