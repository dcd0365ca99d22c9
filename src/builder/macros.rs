//! Macros for ergonomic object graph and group construction.

/// Build a shared [`DynamicBean`](crate::core::DynamicBean) from a type name
/// and `property => value` pairs.
///
/// # Example
///
/// ```
/// use constraint_engine::dynamic_bean;
/// use constraint_engine::core::{Bean, Value};
///
/// let order = dynamic_bean!("Order", "orderNumber" => "A-1", "quantity" => 3);
/// assert_eq!(order.type_name().as_str(), "Order");
/// assert_eq!(order.property("quantity"), Some(Value::Int(3)));
/// ```
#[macro_export]
macro_rules! dynamic_bean {
    ($type_name:expr $(, $name:expr => $value:expr)* $(,)?) => {
        ::std::sync::Arc::new(
            $crate::core::DynamicBean::new($type_name)
                $(.with($name, $value))*
        )
    };
}

/// Build a `Vec<Group>` from group names.
///
/// # Example
///
/// ```
/// use constraint_engine::groups;
/// use constraint_engine::core::Group;
///
/// let requested: Vec<Group> = groups!["Default", "Checks"];
/// assert!(requested[0].is_default());
/// ```
#[macro_export]
macro_rules! groups {
    ($($group:expr),* $(,)?) => {
        vec![$($crate::core::Group::from($group)),*]
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{Bean, Group, Value};

    #[test]
    fn dynamic_bean_macro_sets_properties() {
        let customer = dynamic_bean!("Customer", "name" => "Ada", "orders" => Value::List(Vec::new()));
        assert_eq!(customer.type_name().as_str(), "Customer");
        assert_eq!(customer.property("name"), Some(Value::Text("Ada".into())));
        assert!(customer.property("missing").is_none());
    }

    #[test]
    fn dynamic_bean_macro_works_without_properties() {
        let empty = dynamic_bean!("Empty");
        assert!(empty.property("anything").is_none());
    }

    #[test]
    fn groups_macro_converts_names() {
        let requested: Vec<Group> = groups!["A", "B",];
        assert_eq!(requested, vec![Group::new("A"), Group::new("B")]);
        let none: Vec<Group> = groups![];
        assert!(none.is_empty());
    }
}
