//! Builder for constructing validation engines.

use crate::config::EngineConfig;
use crate::core::{TypeDecl, TypeGraph, TypeName, OBJECT};
use crate::engine::{
    CascadeGraph, EngineShared, FactoryHandle, MessageInterpolator, PassthroughInterpolator, TraversableResolver,
    TraverseAll, ValidatorEngine, ValidatorResolver,
};
use crate::error::ConfigurationError;
use crate::groups::{GroupDecl, GroupRegistry, ValidationOrderGenerator};
use crate::metadata::{DeclarationSource, MetadataManager, SourceOrigin};
use crate::registry::{
    builtin, ClockProvider, ConstraintDefinition, ConstraintRegistry, ConstraintValidatorFactory,
    SystemClock, ValidatorContribution,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Builder for a [`ValidatorEngine`] with a fluent API.
///
/// Everything registered here is frozen by [`build`](Self::build); an
/// engine never changes after that.
pub struct ValidatorEngineBuilder {
    config: EngineConfig,
    types: Vec<TypeDecl>,
    groups: Vec<GroupDecl>,
    definitions: Vec<ConstraintDefinition>,
    contributions: Vec<ValidatorContribution>,
    sources: Vec<Arc<dyn DeclarationSource>>,
    factory: Option<Arc<dyn ConstraintValidatorFactory>>,
    clock: Option<Arc<dyn ClockProvider>>,
    interpolator: Option<Arc<dyn MessageInterpolator>>,
    traversable: Option<Arc<dyn TraversableResolver>>,
}

impl ValidatorEngineBuilder {
    /// Creates a builder with the default configuration and no declarations.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            types: Vec::new(),
            groups: Vec::new(),
            definitions: Vec::new(),
            contributions: Vec::new(),
            sources: Vec::new(),
            factory: None,
            clock: None,
            interpolator: None,
            traversable: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Stop each validation call at its first violation.
    pub fn fail_fast(mut self, enabled: bool) -> Self {
        self.config.fail_fast = enabled;
        self
    }

    /// Treat the declared types as the complete object model.
    ///
    /// The cascade graph is analysed once at build time and beans of types
    /// that can never be their own ancestor skip the cycle check.
    pub fn closed_world(mut self, enabled: bool) -> Self {
        self.config.closed_world = enabled;
        self
    }

    /// Build the metadata of `type_name` eagerly in [`build`](Self::build).
    pub fn preload(mut self, type_name: impl Into<TypeName>) -> Self {
        self.config.preload.push(type_name.into());
        self
    }

    /// Declare a type of the object model. Types only named by declaration
    /// sources are declared as plain classes automatically.
    pub fn declare_type(mut self, decl: TypeDecl) -> Self {
        self.types.push(decl);
        self
    }

    /// Declare a group, its parents, or a group sequence.
    ///
    /// # Example
    ///
    /// ```
    /// use constraint_engine::prelude::*;
    ///
    /// let engine = ValidatorEngine::builder()
    ///     .group(GroupDecl::new("Extended").extends("Basic"))
    ///     .group(GroupDecl::sequence("Checkout", ["Basic", "Payment"]))
    ///     .build();
    /// assert!(engine.is_ok());
    /// ```
    pub fn group(mut self, decl: GroupDecl) -> Self {
        self.groups.push(decl);
        self
    }

    /// Define a custom constraint.
    pub fn constraint(mut self, definition: ConstraintDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// Add or replace validators of a constraint.
    pub fn validators(mut self, contribution: ValidatorContribution) -> Self {
        self.contributions.push(contribution);
        self
    }

    /// Add a declaration source. Sources are merged by origin precedence,
    /// not by the order they are added in.
    pub fn source(mut self, source: impl DeclarationSource + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Like [`source`](Self::source), for a source that is shared with other engines.
    pub fn shared_source(mut self, source: Arc<dyn DeclarationSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Factory used to instantiate validators. Defaults to calling each
    /// descriptor's constructor.
    pub fn validator_factory(mut self, factory: Arc<dyn ConstraintValidatorFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Clock consulted by time-based validators such as `Past` and `Future`.
    /// Defaults to the system clock.
    pub fn clock(mut self, clock: Arc<dyn ClockProvider>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Turns message templates into violation messages. The default keeps
    /// the template unchanged.
    pub fn interpolator(mut self, interpolator: Arc<dyn MessageInterpolator>) -> Self {
        self.interpolator = Some(interpolator);
        self
    }

    /// Decides which properties may be read and cascaded into. The default
    /// allows all of them.
    pub fn traversable_resolver(mut self, resolver: Arc<dyn TraversableResolver>) -> Self {
        self.traversable = Some(resolver);
        self
    }

    /// Build the engine.
    /// Returns an error if any part of the declarative setup is broken.
    pub fn build(self) -> Result<ValidatorEngine, ConfigurationError> {
        let mut types = TypeGraph::with_builtins();
        for decl in self.types {
            types.declare(decl)?;
        }
        for source in &self.sources {
            for type_name in source.declared_types() {
                if !types.contains(&type_name) {
                    types.declare(TypeDecl::class(type_name).extends(OBJECT))?;
                }
            }
        }
        types.verify()?;

        let mut registry = ConstraintRegistry::new();
        builtin::register(&mut registry, &types)?;
        for definition in self.definitions {
            registry.define(definition)?;
        }
        for contribution in self.contributions {
            registry.contribute(&types, contribution)?;
        }

        let mut groups = GroupRegistry::new();
        for decl in self.groups {
            groups.declare(decl)?;
        }

        let mut described = HashSet::new();
        for source in self.sources.iter().filter(|s| s.origin() == SourceOrigin::Descriptor) {
            for type_name in source.declared_types() {
                if !described.insert(type_name.clone()) {
                    return Err(ConfigurationError::DuplicateDescriptor { type_name });
                }
            }
        }

        let types = Arc::new(types);
        let source_count = self.sources.len();
        let manager = MetadataManager::new(
            types.clone(),
            Arc::new(registry),
            Arc::new(ValidationOrderGenerator::new(groups)),
            self.sources,
        );
        manager.preload(&self.config.preload)?;

        let acyclic = if self.config.closed_world {
            Some(CascadeGraph::build(&manager)?.acyclic_types())
        } else {
            None
        };

        debug!(
            types = types.names().count(),
            sources = source_count,
            fail_fast = self.config.fail_fast,
            closed_world = self.config.closed_world,
            acyclic_types = acyclic.as_ref().map_or(0, HashSet::len),
            "Assembled validator engine"
        );

        let shared = EngineShared {
            config: self.config,
            manager,
            resolver: ValidatorResolver::new(types),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            interpolator: self.interpolator.unwrap_or_else(|| Arc::new(PassthroughInterpolator)),
            traversable: self.traversable.unwrap_or_else(|| Arc::new(TraverseAll)),
            acyclic,
        };
        let factory = self
            .factory
            .map(FactoryHandle::new)
            .unwrap_or_default();
        Ok(ValidatorEngine::new(shared, factory))
    }
}

impl Default for ValidatorEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TypeKind;
    use crate::metadata::descriptor;
    use crate::metadata::{Mapping, PropertyDeclaration, RawConstraint, TypeDeclarations};

    fn order_mapping() -> Mapping {
        Mapping::programmatic().with(
            TypeDeclarations::new("Order")
                .property(PropertyDeclaration::field("orderNumber", "String").constraint(RawConstraint::new("NotNull"))),
        )
    }

    #[test]
    fn source_types_are_declared_automatically() {
        let engine = ValidatorEngineBuilder::new().source(order_mapping()).build().unwrap();
        let types = engine.metadata_manager().types();
        assert!(types.contains(&TypeName::new("Order")));
        assert!(!types.is_interface(&TypeName::new("Order")));
    }

    #[test]
    fn explicit_declarations_take_precedence() {
        let engine = ValidatorEngineBuilder::new()
            .declare_type(TypeDecl::interface("Order"))
            .source(order_mapping())
            .build()
            .unwrap();
        let types = engine.metadata_manager().types();
        assert_eq!(types.get(&TypeName::new("Order")).map(|d| d.kind), Some(TypeKind::Interface));
    }

    #[test]
    fn unknown_constraints_fail_the_build() {
        let result = ValidatorEngineBuilder::new()
            .validators(ValidatorContribution::new("Unheard"))
            .build();
        assert!(matches!(result, Err(ConfigurationError::UnknownConstraint { .. })));
    }

    #[test]
    fn a_bean_may_be_described_by_one_descriptor_only() {
        let json = r#"{ "beans": [ { "type": "Order", "fields": [ { "name": "orderNumber", "type": "String" } ] } ] }"#;
        let result = ValidatorEngineBuilder::new()
            .source(descriptor::from_json(json).unwrap())
            .source(descriptor::from_json(json).unwrap())
            .build();
        assert!(matches!(result, Err(ConfigurationError::DuplicateDescriptor { .. })));
    }

    #[test]
    fn preloading_builds_metadata_eagerly() {
        let engine = ValidatorEngineBuilder::new()
            .source(order_mapping())
            .preload("Order")
            .build()
            .unwrap();
        assert_eq!(engine.metadata_manager().len(), 1);
    }

    #[test]
    fn broken_declarations_fail_preloading() {
        let mapping = Mapping::programmatic().with(
            TypeDeclarations::new("Order")
                .property(PropertyDeclaration::field("quantity", "Long").constraint(RawConstraint::new("Min"))),
        );
        let result = ValidatorEngineBuilder::new().source(mapping).preload("Order").build();
        assert!(matches!(result, Err(ConfigurationError::MissingAttributes { .. })));
    }
}
