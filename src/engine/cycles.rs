//! Static cascade analysis for closed-world engines.
//!
//! A type is acyclic when no chain of cascades starting at one of its
//! instances can reach an instance of the same type again. The analysis
//! only sees declared types: a bean of such a type cannot be its own
//! ancestor as long as every bean on the path from the root is an instance
//! of the type its cascade declares. Only then does the engine skip the
//! cycle check.

use crate::core::{TypeGraph, TypeName, TypeRef};
use crate::error::ConfigurationError;
use crate::metadata::{ElementMetadata, MetadataManager};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;

/// "Type cascades into type" edges over every declared type.
#[derive(Debug, Default)]
pub struct CascadeGraph {
    edges: IndexMap<TypeName, IndexSet<TypeName>>,
}

/// The item type a cascade on a whole container reaches.
pub(super) fn legacy_item_type(types: &TypeGraph, declared: &TypeRef) -> Option<TypeRef> {
    let name = declared.erased_name();
    [("Map", 1), ("Array", 0), ("Iterable", 0)]
        .into_iter()
        .map(|(container, index)| (TypeName::new(container), index))
        .find(|(container, _)| types.is_subtype(&name, container))
        .map(|(container, index)| {
            types
                .supertype_as(declared, &container)
                .map(|view| view.arg_or_object(index))
                .unwrap_or_else(TypeRef::object)
        })
}

/// Declared types of the values an element cascades into.
fn cascade_targets(types: &TypeGraph, element: &ElementMetadata, targets: &mut Vec<TypeRef>) {
    if element.cascading {
        targets.push(element.declared_type.clone());
        if let Some(item) = legacy_item_type(types, &element.declared_type) {
            targets.push(item);
        }
    }
    for container in &element.container_elements {
        cascade_targets(types, &container.element, targets);
    }
}

impl CascadeGraph {
    /// Builds the metadata of every declared type and collects, for each,
    /// the types its cascades may reach, subtypes included.
    pub fn build(manager: &MetadataManager) -> Result<Self, ConfigurationError> {
        let types = manager.types();
        let universe: Vec<TypeName> = types.names().cloned().collect();
        let mut edges = IndexMap::new();

        for type_name in &universe {
            let metadata = manager.metadata(type_name)?;
            let mut targets = Vec::new();
            for property in metadata.cascaded_properties() {
                cascade_targets(types, &property.element, &mut targets);
            }

            let reachable: IndexSet<TypeName> = targets
                .iter()
                .map(TypeRef::erased_name)
                .flat_map(|target| types.subtypes_of(&target))
                .collect();
            edges.insert(type_name.clone(), reachable);
        }
        Ok(Self { edges })
    }

    /// Types a bean of `type_name` may cascade into.
    pub fn successors(&self, type_name: &TypeName) -> impl Iterator<Item = &TypeName> {
        self.edges.get(type_name).into_iter().flatten()
    }

    /// Types that lie on no cascade cycle.
    pub fn acyclic_types(&self) -> HashSet<TypeName> {
        let mut tarjan = Tarjan::new(self);
        for node in self.edges.keys() {
            if !tarjan.index.contains_key(node) {
                tarjan.connect(node);
            }
        }

        let mut acyclic = HashSet::new();
        for component in tarjan.components {
            if let [single] = component.as_slice() {
                let self_loop = self.successors(single).any(|s| s == single);
                if !self_loop {
                    acyclic.insert(single.clone());
                }
            }
        }
        acyclic
    }
}

/// Strongly connected components, Tarjan's algorithm.
struct Tarjan<'g> {
    graph: &'g CascadeGraph,
    next_index: usize,
    index: IndexMap<&'g TypeName, usize>,
    low_link: IndexMap<&'g TypeName, usize>,
    stack: Vec<&'g TypeName>,
    on_stack: HashSet<&'g TypeName>,
    components: Vec<Vec<TypeName>>,
}

impl<'g> Tarjan<'g> {
    fn new(graph: &'g CascadeGraph) -> Self {
        Self {
            graph,
            next_index: 0,
            index: IndexMap::new(),
            low_link: IndexMap::new(),
            stack: Vec::new(),
            on_stack: HashSet::new(),
            components: Vec::new(),
        }
    }

    fn connect(&mut self, node: &'g TypeName) {
        self.index.insert(node, self.next_index);
        self.low_link.insert(node, self.next_index);
        self.next_index += 1;
        self.stack.push(node);
        self.on_stack.insert(node);

        let graph = self.graph;
        for successor in graph.successors(node) {
            if !self.index.contains_key(successor) {
                self.connect(successor);
                let low = self.low_link[successor].min(self.low_link[node]);
                self.low_link.insert(node, low);
            } else if self.on_stack.contains(successor) {
                let low = self.index[successor].min(self.low_link[node]);
                self.low_link.insert(node, low);
            }
        }

        if self.low_link[node] == self.index[node] {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack.remove(member);
                component.push(member.clone());
                if member == node {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TypeDecl;
    use crate::groups::{GroupRegistry, ValidationOrderGenerator};
    use crate::metadata::{DeclarationSource, Mapping, PropertyDeclaration, TypeDeclarations};
    use crate::registry::ConstraintRegistry;
    use std::sync::Arc;

    fn cascade(member: &str, declared: &str) -> PropertyDeclaration {
        let declared: TypeRef = declared.parse().unwrap();
        PropertyDeclaration::field(member, declared).cascade()
    }

    fn analyze(classes: &[(&str, &str)], mapping: Mapping) -> HashSet<TypeName> {
        let mut types = TypeGraph::with_builtins();
        for (name, parent) in classes {
            types.declare(TypeDecl::class(*name).extends(*parent)).unwrap();
        }
        let sources: Vec<Arc<dyn DeclarationSource>> = vec![Arc::new(mapping)];
        let manager = MetadataManager::new(
            Arc::new(types),
            Arc::new(ConstraintRegistry::new()),
            Arc::new(ValidationOrderGenerator::new(GroupRegistry::new())),
            sources,
        );
        CascadeGraph::build(&manager).unwrap().acyclic_types()
    }

    #[test]
    fn tree_shaped_cascades_are_acyclic() {
        let acyclic = analyze(
            &[("Order", "Object"), ("Item", "Object")],
            Mapping::programmatic().with(TypeDeclarations::new("Order").property(cascade("items", "List<Item>"))),
        );
        assert!(acyclic.contains(&TypeName::new("Order")));
        assert!(acyclic.contains(&TypeName::new("Item")));
    }

    #[test]
    fn mutual_and_self_references_are_cycles() {
        let acyclic = analyze(
            &[("Parent", "Object"), ("Child", "Object"), ("Node", "Object")],
            Mapping::programmatic()
                .with(TypeDeclarations::new("Parent").property(cascade("child", "Child")))
                .with(TypeDeclarations::new("Child").property(cascade("parent", "Parent")))
                .with(TypeDeclarations::new("Node").property(cascade("next", "Node"))),
        );
        assert!(!acyclic.contains(&TypeName::new("Parent")));
        assert!(!acyclic.contains(&TypeName::new("Child")));
        assert!(!acyclic.contains(&TypeName::new("Node")));
    }

    #[test]
    fn cycles_through_subtypes_and_map_values_are_found() {
        let acyclic = analyze(
            &[("Holder", "Object"), ("Animal", "Object"), ("Dog", "Animal"), ("Leaf", "Object")],
            Mapping::programmatic()
                .with(TypeDeclarations::new("Holder").property(cascade("pets", "Map<String, Animal>")))
                .with(TypeDeclarations::new("Dog").property(cascade("owner", "Holder")))
                .with(TypeDeclarations::new("Leaf").property(cascade("pet", "Animal"))),
        );
        assert!(!acyclic.contains(&TypeName::new("Holder")));
        assert!(!acyclic.contains(&TypeName::new("Dog")));
        assert!(acyclic.contains(&TypeName::new("Animal")));
        assert!(acyclic.contains(&TypeName::new("Leaf")));
    }
}
