//! Concurrent use of one engine from many tasks.

use constraint_engine::prelude::*;

fn engine() -> ValidatorEngine {
    ValidatorEngine::builder()
        .source(
            Mapping::programmatic()
                .with(TypeDeclarations::new("Customer").property(PropertyDeclaration::field("orderList", "List<Order>").cascade()))
                .with(
                    TypeDeclarations::new("Order")
                        .property(PropertyDeclaration::field("orderNumber", "String").constraint(RawConstraint::new("NotNull")))
                        .property(
                            PropertyDeclaration::field("quantity", "Long").constraint(RawConstraint::new("Min").attr("value", 1)),
                        ),
                ),
        )
        .build()
        .unwrap()
}

fn customer(orders: usize) -> Value {
    let orders = (0..orders)
        .map(|i| {
            let number = if i % 2 == 0 { Value::Null } else { Value::from(format!("A-{i}")) };
            Value::from(dynamic_bean!("Order", "orderNumber" => number, "quantity" => i as i64))
        })
        .collect();
    dynamic_bean!("Customer", "orderList" => Value::List(orders)).into()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shared_engine_gives_identical_results() {
    let engine = engine();
    let root = customer(6);
    let expected = engine.validate(&root, &[]).unwrap();
    // Orders 0, 2 and 4 miss a number; order 0 also has quantity 0.
    assert_eq!(expected.len(), 4);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let engine = engine.clone();
            let root = root.clone();
            tokio::task::spawn_blocking(move || engine.validate(&root, &[]))
        })
        .collect();

    for handle in handles {
        let violations = handle.await.unwrap().unwrap();
        assert_eq!(violations, expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn metadata_is_built_once_under_contention() {
    let engine = engine();

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let engine = engine.clone();
            tokio::task::spawn_blocking(move || engine.validate(&customer(n), &[]).map(|v| v.len()))
        })
        .collect();

    for (n, handle) in handles.into_iter().enumerate() {
        let count = handle.await.unwrap().unwrap();
        let missing_numbers = (n + 1) / 2;
        let zero_quantity = usize::from(n > 0);
        assert_eq!(count, missing_numbers + zero_quantity);
    }

    let first = engine.metadata_for(&"Order".into()).unwrap();
    let second = engine.metadata_for(&"Order".into()).unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}
