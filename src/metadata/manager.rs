//! Lazily built, engine-wide metadata cache.

use super::bean::BeanMetadata;
use super::builder::MetadataBuilder;
use super::source::DeclarationSource;
use crate::core::{TypeGraph, TypeName};
use crate::error::ConfigurationError;
use crate::groups::ValidationOrderGenerator;
use crate::registry::ConstraintRegistry;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::sync::Arc;

type Slot = Arc<OnceCell<Arc<BeanMetadata>>>;

/// Owns everything needed to build metadata and caches one snapshot per
/// type. Each type is built at most once; concurrent callers for the same
/// type block until the first build finishes.
pub struct MetadataManager {
    types: Arc<TypeGraph>,
    registry: Arc<ConstraintRegistry>,
    generator: Arc<ValidationOrderGenerator>,
    sources: Vec<Arc<dyn DeclarationSource>>,
    cache: DashMap<TypeName, Slot>,
}

impl MetadataManager {
    /// A manager with an empty cache.
    pub fn new(
        types: Arc<TypeGraph>,
        registry: Arc<ConstraintRegistry>,
        generator: Arc<ValidationOrderGenerator>,
        sources: Vec<Arc<dyn DeclarationSource>>,
    ) -> Self {
        Self {
            types,
            registry,
            generator,
            sources,
            cache: DashMap::new(),
        }
    }

    /// The declared type model.
    pub fn types(&self) -> &TypeGraph {
        &self.types
    }

    /// Constraint definitions and their validators.
    pub fn registry(&self) -> &ConstraintRegistry {
        &self.registry
    }

    /// Expands requested groups into validation orders.
    pub fn generator(&self) -> &ValidationOrderGenerator {
        &self.generator
    }

    pub fn sources(&self) -> &[Arc<dyn DeclarationSource>] {
        &self.sources
    }

    /// The metadata of `type_name`, built and cached on first access.
    ///
    /// A failed build is not cached; the next call tries again and fails
    /// the same way.
    pub fn metadata(&self, type_name: &TypeName) -> Result<Arc<BeanMetadata>, ConfigurationError> {
        // Shard guard is released here, before the build runs.
        let slot: Slot = self.cache.entry(type_name.clone()).or_default().clone();
        slot.get_or_try_init(|| {
            MetadataBuilder::new(&self.types, &self.registry, &self.generator, &self.sources)
                .build(type_name)
                .map(Arc::new)
        })
        .cloned()
    }

    /// Builds metadata for `type_names` up front.
    pub fn preload<'t>(&self, type_names: impl IntoIterator<Item = &'t TypeName>) -> Result<(), ConfigurationError> {
        for type_name in type_names {
            self.metadata(type_name)?;
        }
        Ok(())
    }

    /// Number of types with built metadata.
    pub fn len(&self) -> usize {
        self.cache.iter().filter(|entry| entry.value().get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::GroupRegistry;
    use crate::metadata::{Mapping, PropertyDeclaration, RawConstraint, TypeDeclarations};
    use crate::registry::builtin;

    fn manager() -> MetadataManager {
        let types = TypeGraph::with_builtins();
        let mut registry = ConstraintRegistry::new();
        builtin::register(&mut registry, &types).unwrap();
        let mapping = Mapping::inline().with(
            TypeDeclarations::new("Order")
                .property(PropertyDeclaration::field("number", "String").constraint(RawConstraint::new("NotNull"))),
        );
        MetadataManager::new(
            Arc::new(types),
            Arc::new(registry),
            Arc::new(ValidationOrderGenerator::new(GroupRegistry::new())),
            vec![Arc::new(mapping)],
        )
    }

    #[test]
    fn metadata_is_built_once_and_shared() {
        let manager = manager();
        let first = manager.metadata(&"Order".into()).unwrap();
        let second = manager.metadata(&"Order".into()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn unknown_types_get_empty_metadata() {
        let manager = manager();
        let metadata = manager.metadata(&"Unregistered".into()).unwrap();
        assert!(metadata.is_empty());
    }

    #[test]
    fn concurrent_builds_converge_on_one_snapshot() {
        let manager = Arc::new(manager());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                std::thread::spawn(move || manager.metadata(&"Order".into()).unwrap())
            })
            .collect();
        let snapshots: Vec<Arc<BeanMetadata>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(snapshots.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
