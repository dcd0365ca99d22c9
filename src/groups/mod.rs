//! Validation groups, group inheritance and group sequences.
//!
//! Requested groups are turned into a [`ValidationOrder`]: plain groups that
//! are validated together, and sequences whose members are validated one
//! after the other until a member produces a violation.

mod order;

pub use order::{Sequence, ValidationOrder, ValidationOrderGenerator};

use crate::core::Group;
use crate::error::ConfigurationError;
use indexmap::IndexMap;

/// Declaration of a group marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDecl {
    pub group: Group,
    /// Groups this one extends; they are validated whenever it is.
    pub extends: Vec<Group>,
    /// Set when the group is a sequence of other groups.
    pub sequence: Option<Vec<Group>>,
}

impl GroupDecl {
    /// A plain group without parents.
    pub fn new(group: impl Into<Group>) -> Self {
        Self {
            group: group.into(),
            extends: Vec::new(),
            sequence: None,
        }
    }

    /// A group sequence: `members` are validated in order, stopping at the
    /// first member that produces a violation.
    ///
    /// # Example
    ///
    /// ```
    /// use constraint_engine::groups::{GroupDecl, GroupRegistry};
    ///
    /// let mut registry = GroupRegistry::new();
    /// registry.declare(GroupDecl::sequence("Checkout", ["Basic", "Payment"])).unwrap();
    /// assert!(registry.is_sequence(&"Checkout".into()));
    /// assert!(!registry.is_sequence(&"Basic".into()));
    /// ```
    pub fn sequence<I, G>(group: impl Into<Group>, members: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<Group>,
    {
        Self {
            sequence: Some(members.into_iter().map(Into::into).collect()),
            ..Self::new(group)
        }
    }

    /// Adds a parent group.
    pub fn extends(mut self, parent: impl Into<Group>) -> Self {
        self.extends.push(parent.into());
        self
    }
}

/// All declared groups. Undeclared groups are plain groups without parents.
#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
    groups: IndexMap<Group, GroupDecl>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `decl`. Each group may be declared once.
    pub fn declare(&mut self, decl: GroupDecl) -> Result<(), ConfigurationError> {
        if self.groups.contains_key(&decl.group) {
            return Err(ConfigurationError::DuplicateGroupDeclaration { group: decl.group });
        }
        self.groups.insert(decl.group.clone(), decl);
        Ok(())
    }

    pub fn is_sequence(&self, group: &Group) -> bool {
        self.sequence_members(group).is_some()
    }

    /// Direct members of `group` when it is a sequence, unexpanded.
    pub fn sequence_members(&self, group: &Group) -> Option<&[Group]> {
        self.groups.get(group).and_then(|d| d.sequence.as_deref())
    }

    /// Transitively inherited groups, nearest first, without `group` itself.
    pub fn inherited(&self, group: &Group) -> Vec<Group> {
        let mut result: Vec<Group> = Vec::new();
        let mut pending: Vec<Group> = self
            .groups
            .get(group)
            .map(|d| d.extends.clone())
            .unwrap_or_default();
        pending.reverse();
        while let Some(next) = pending.pop() {
            if next == *group || result.contains(&next) {
                continue;
            }
            if let Some(decl) = self.groups.get(&next) {
                pending.extend(decl.extends.iter().rev().cloned());
            }
            result.push(next);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inherited_groups_are_transitive() {
        let mut registry = GroupRegistry::new();
        registry.declare(GroupDecl::new("Basic")).unwrap();
        registry
            .declare(GroupDecl::new("Extended").extends("Basic"))
            .unwrap();
        registry
            .declare(GroupDecl::new("Full").extends("Extended").extends("Billing"))
            .unwrap();

        let inherited = registry.inherited(&"Full".into());
        assert_eq!(
            inherited,
            vec![Group::from("Extended"), Group::from("Basic"), Group::from("Billing")]
        );
    }

    #[test]
    fn duplicate_declarations_are_rejected() {
        let mut registry = GroupRegistry::new();
        registry.declare(GroupDecl::new("A")).unwrap();
        assert!(matches!(
            registry.declare(GroupDecl::new("A")),
            Err(ConfigurationError::DuplicateGroupDeclaration { .. })
        ));
    }
}
