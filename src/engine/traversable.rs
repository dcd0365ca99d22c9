use crate::core::{BeanRef, PathNode, PropertyPath, TypeName};

/// Decides which properties the engine may read and cascade into.
///
/// `is_reachable` is consulted before a property's constraints are
/// evaluated; a cascade additionally needs `is_cascadable`.
pub trait TraversableResolver: Send + Sync {
    fn is_reachable(
        &self,
        bean: Option<&BeanRef>,
        property: &PathNode,
        root_type: &TypeName,
        path_to_bean: &PropertyPath,
    ) -> bool;

    fn is_cascadable(
        &self,
        bean: Option<&BeanRef>,
        property: &PathNode,
        root_type: &TypeName,
        path_to_bean: &PropertyPath,
    ) -> bool;
}

/// Everything is reachable and cascadable.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraverseAll;

impl TraversableResolver for TraverseAll {
    fn is_reachable(&self, _: Option<&BeanRef>, _: &PathNode, _: &TypeName, _: &PropertyPath) -> bool {
        true
    }

    fn is_cascadable(&self, _: Option<&BeanRef>, _: &PathNode, _: &TypeName, _: &PropertyPath) -> bool {
        true
    }
}
