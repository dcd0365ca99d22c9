//! Property-based tests for graph validation.
//!
//! These tests use proptest to verify that traversal terminates on
//! arbitrary (possibly cyclic) graphs and reports what a reference walk
//! over the same graph predicts.

use constraint_engine::prelude::*;
use proptest::prelude::*;
use std::sync::Arc;

/// Shape of a generated `Node` graph. Node 0 is the root.
#[derive(Debug, Clone)]
struct GraphShape {
    labelled: Vec<bool>,
    next: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
}

impl GraphShape {
    fn build(&self) -> Value {
        let nodes: Vec<Arc<DynamicBean>> = self
            .labelled
            .iter()
            .map(|&labelled| {
                let label = if labelled { Value::from("node") } else { Value::Null };
                dynamic_bean!("Node", "label" => label)
            })
            .collect();
        for (i, node) in nodes.iter().enumerate() {
            node.set("next", self.next[i].map(|j| Value::from(nodes[j].clone())));
            let children = self.children[i].iter().map(|&j| Value::from(nodes[j].clone())).collect();
            node.set("children", Value::List(children));
        }
        nodes[0].clone().into()
    }

    /// Paths of every unlabelled node, reached along each route that does
    /// not revisit a node already being validated.
    fn expected_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.walk(0, String::new(), &mut vec![0], &mut paths);
        paths.sort();
        paths
    }

    fn walk(&self, node: usize, prefix: String, ancestors: &mut Vec<usize>, paths: &mut Vec<String>) {
        if !self.labelled[node] {
            paths.push(format!("{prefix}label"));
        }
        let targets = self.next[node]
            .map(|j| (format!("{prefix}next."), j))
            .into_iter()
            .chain(
                self.children[node]
                    .iter()
                    .enumerate()
                    .map(|(k, &j)| (format!("{prefix}children[{k}]."), j)),
            );
        for (path, target) in targets {
            if ancestors.contains(&target) {
                continue;
            }
            ancestors.push(target);
            self.walk(target, path, ancestors, paths);
            ancestors.pop();
        }
    }
}

fn node_engine(closed_world: bool) -> ValidatorEngine {
    ValidatorEngine::builder()
        .source(
            Mapping::programmatic().with(
                TypeDeclarations::new("Node")
                    .property(PropertyDeclaration::field("label", "String").constraint(RawConstraint::new("NotNull")))
                    .property(PropertyDeclaration::field("next", "Node").cascade())
                    .property(
                        PropertyDeclaration::field("children", "List<Node>")
                            .container_element(ContainerElementDeclaration::new(ContainerSlot::Element).cascade()),
                    ),
            ),
        )
        .closed_world(closed_world)
        .build()
        .unwrap()
}

fn customer_engine() -> ValidatorEngine {
    ValidatorEngine::builder()
        .source(
            Mapping::programmatic()
                .with(TypeDeclarations::new("Customer").property(PropertyDeclaration::field("orderList", "List<Order>").cascade()))
                .with(TypeDeclarations::new("Order").property(
                    PropertyDeclaration::field("orderNumber", "String").constraint(RawConstraint::new("NotNull")),
                )),
        )
        .build()
        .unwrap()
}

fn sorted_paths(violations: &Violations) -> Vec<String> {
    let mut paths: Vec<String> = violations.iter().map(|v| v.property_path.to_string()).collect();
    paths.sort();
    paths
}

prop_compose! {
    fn arbitrary_graph()(size in 1..6usize)(
        labelled in prop::collection::vec(any::<bool>(), size),
        next in prop::collection::vec(prop::option::of(0..size), size),
        children in prop::collection::vec(prop::collection::vec(0..size, 0..3), size),
    ) -> GraphShape {
        GraphShape { labelled, next, children }
    }
}

prop_compose! {
    fn arbitrary_order_numbers()(numbers in prop::collection::vec(prop::option::of("[A-Z]-[0-9]{1,3}"), 0..8)) -> Vec<Option<String>> {
        numbers
    }
}

proptest! {
    #[test]
    fn cyclic_graphs_match_reference_walk(shape in arbitrary_graph()) {
        let engine = node_engine(false);
        let violations = engine.validate(&shape.build(), &[]).unwrap();
        prop_assert_eq!(sorted_paths(&violations), shape.expected_paths());
    }

    #[test]
    fn closed_world_matches_open_world(shape in arbitrary_graph()) {
        let root = shape.build();
        let open = node_engine(false).validate(&root, &[]).unwrap();
        let closed = node_engine(true).validate(&root, &[]).unwrap();
        prop_assert_eq!(sorted_paths(&open), sorted_paths(&closed));
    }

    #[test]
    fn validation_is_idempotent(shape in arbitrary_graph()) {
        let engine = node_engine(false);
        let root = shape.build();
        let first = engine.validate(&root, &[]).unwrap();
        let second = engine.validate(&root, &[]).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn every_missing_order_number_is_reported_once(numbers in arbitrary_order_numbers()) {
        let orders = numbers
            .iter()
            .map(|number| Value::from(dynamic_bean!("Order", "orderNumber" => number.clone())))
            .collect();
        let customer: Value = dynamic_bean!("Customer", "orderList" => Value::List(orders)).into();

        let violations = customer_engine().validate(&customer, &[]).unwrap();
        let mut expected: Vec<String> = numbers
            .iter()
            .enumerate()
            .filter(|(_, number)| number.is_none())
            .map(|(i, _)| format!("orderList[{i}].orderNumber"))
            .collect();
        expected.sort();
        prop_assert_eq!(sorted_paths(&violations), expected);
        prop_assert!(violations.iter().all(|v| v.invalid_value.is_null()));
    }
}
