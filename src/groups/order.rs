//! Expansion of requested groups into a validation order.

use super::GroupRegistry;
use crate::core::{Group, TypeName};
use crate::error::ConfigurationError;
use dashmap::DashMap;
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;

/// A fully expanded group sequence.
///
/// `members` is the flattened list of groups; each member becomes one
/// bucket holding the member and the groups it inherits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    defining: Group,
    members: Vec<Group>,
    buckets: Vec<Vec<Group>>,
}

impl Sequence {
    /// The group that names this sequence.
    pub fn defining(&self) -> &Group {
        &self.defining
    }

    pub fn members(&self) -> &[Group] {
        &self.members
    }

    /// Groups validated together at each step, in order.
    pub fn buckets(&self) -> &[Vec<Group>] {
        &self.buckets
    }

    /// The implicit `[Default]` sequence of a type without redefinition.
    pub fn implicit_default() -> Self {
        Self {
            defining: Group::default(),
            members: vec![Group::default()],
            buckets: vec![vec![Group::default()]],
        }
    }
}

/// Plain groups are validated together; sequences bucket by bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOrder {
    groups: IndexSet<Group>,
    sequences: IndexMap<Group, Arc<Sequence>>,
}

impl ValidationOrder {
    /// The order used when no groups are requested: `Default` alone.
    pub fn default_order() -> Self {
        let mut order = Self::default();
        order.groups.insert(Group::default());
        order
    }

    /// Plain groups, validated together before any sequence.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    pub fn sequences(&self) -> impl Iterator<Item = &Arc<Sequence>> {
        self.sequences.values()
    }

    /// Every group the order may put in scope, including sequence names.
    pub fn all_groups(&self) -> Vec<Group> {
        let mut all: IndexSet<Group> = self.groups.iter().cloned().collect();
        for (name, sequence) in &self.sequences {
            all.insert(name.clone());
            all.extend(sequence.buckets().iter().flatten().cloned());
        }
        all.into_iter().collect()
    }

    fn insert_group(&mut self, group: Group) {
        self.groups.insert(group);
    }

    fn insert_sequence(&mut self, sequence: Arc<Sequence>) {
        self.sequences
            .entry(sequence.defining().clone())
            .or_insert(sequence);
    }

    /// Checks that every requested sequence containing `Default` can still be
    /// ordered once `Default` is replaced by the bean's redefined list. A group
    /// of that list may only appear in the sequence directly before `Default`
    /// (when it is the list's first element) or directly after it (when last).
    pub fn assert_default_group_sequence_is_expandable(
        &self,
        default_groups: &[Group],
    ) -> Result<(), ConfigurationError> {
        for (name, sequence) in &self.sequences {
            let members = sequence.members();
            let Some(default_index) = members.iter().position(Group::is_default) else {
                continue;
            };
            let last = default_groups.len().saturating_sub(1);
            for (i, group) in default_groups.iter().enumerate() {
                if group.is_default() {
                    continue;
                }
                let Some(index) = members.iter().position(|m| m == group) else {
                    continue;
                };
                let before = i == 0 && index + 1 == default_index;
                let after = i == last && index == default_index + 1;
                if !(before || after) {
                    return Err(ConfigurationError::UnexpandableDefaultSequence {
                        sequence: name.clone(),
                        default_sequence: default_groups.to_vec(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// What to do with a group that appears twice while flattening a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repeats {
    /// Requested sequences keep the first occurrence.
    KeepFirst,
    Reject,
}

/// Builds validation orders. Resolved sequences are cached for the lifetime
/// of the engine.
#[derive(Debug, Default)]
pub struct ValidationOrderGenerator {
    registry: GroupRegistry,
    resolved: DashMap<Group, Arc<Sequence>>,
}

impl ValidationOrderGenerator {
    /// A generator over the declared groups, with an empty sequence cache.
    pub fn new(registry: GroupRegistry) -> Self {
        Self {
            registry,
            resolved: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &GroupRegistry {
        &self.registry
    }

    /// Order for the groups requested by a caller. No groups means `Default`.
    pub fn validation_order(&self, groups: &[Group]) -> Result<ValidationOrder, ConfigurationError> {
        if groups.is_empty() {
            return Ok(ValidationOrder::default_order());
        }
        let mut order = ValidationOrder::default();
        for group in groups {
            if group.is_default() {
                order.insert_group(group.clone());
            } else if let Some(members) = self.registry.sequence_members(group) {
                order.insert_sequence(self.cached_sequence(group, members)?);
            } else {
                order.insert_group(group.clone());
                for inherited in self.registry.inherited(group) {
                    order.insert_group(inherited);
                }
            }
        }
        Ok(order)
    }

    /// Order for one group reached through a cascade. Sequences are expanded
    /// only when `expand` is set, i.e. when the group was produced by a
    /// group conversion.
    pub fn single_group_order(&self, group: &Group, expand: bool) -> Result<ValidationOrder, ConfigurationError> {
        if group.is_default() {
            return Ok(ValidationOrder::default_order());
        }
        if expand {
            return self.validation_order(std::slice::from_ref(group));
        }
        let mut order = ValidationOrder::default();
        order.insert_group(group.clone());
        Ok(order)
    }

    /// Expands a bean's redefined default sequence, in which the bean's own
    /// marker has already been replaced by `Default`. A group reached twice
    /// across the expansion is a configuration error.
    pub fn default_sequence(&self, bean_type: &TypeName, groups: &[Group]) -> Result<Sequence, ConfigurationError> {
        self.resolve(&Group::from(bean_type), groups, Repeats::Reject, &mut Vec::new())
    }

    fn cached_sequence(&self, group: &Group, members: &[Group]) -> Result<Arc<Sequence>, ConfigurationError> {
        if let Some(sequence) = self.resolved.get(group) {
            return Ok(sequence.clone());
        }
        let sequence = Arc::new(self.resolve(group, members, Repeats::KeepFirst, &mut Vec::new())?);
        Ok(self
            .resolved
            .entry(group.clone())
            .or_insert(sequence)
            .clone())
    }

    fn resolve(
        &self,
        defining: &Group,
        members: &[Group],
        repeats: Repeats,
        stack: &mut Vec<Group>,
    ) -> Result<Sequence, ConfigurationError> {
        if stack.contains(defining) {
            return Err(ConfigurationError::GroupSequenceCycle {
                group: defining.clone(),
            });
        }
        stack.push(defining.clone());

        let mut flattened: Vec<Group> = Vec::new();
        for member in members {
            let expanded = match self.registry.sequence_members(member) {
                Some(nested) if !member.is_default() => {
                    self.resolve(member, nested, repeats, stack)?.members
                }
                _ => vec![member.clone()],
            };
            for group in expanded {
                if !flattened.contains(&group) {
                    flattened.push(group);
                } else if repeats == Repeats::Reject {
                    return Err(ConfigurationError::DuplicateGroupInSequence {
                        group,
                        sequence: defining.clone(),
                    });
                }
            }
        }
        stack.pop();

        let buckets = flattened
            .iter()
            .map(|group| {
                let mut bucket = vec![group.clone()];
                bucket.extend(self.registry.inherited(group));
                bucket
            })
            .collect();
        Ok(Sequence {
            defining: defining.clone(),
            members: flattened,
            buckets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::GroupDecl;

    fn generator(decls: Vec<GroupDecl>) -> ValidationOrderGenerator {
        let mut registry = GroupRegistry::new();
        for decl in decls {
            registry.declare(decl).unwrap();
        }
        ValidationOrderGenerator::new(registry)
    }

    #[test]
    fn empty_request_means_default() {
        let order = generator(vec![]).validation_order(&[]).unwrap();
        assert_eq!(order.groups().cloned().collect::<Vec<_>>(), vec![Group::default()]);
        assert_eq!(order.sequences().count(), 0);
    }

    #[test]
    fn nested_sequences_are_flattened_in_order() {
        let generator = generator(vec![
            GroupDecl::sequence("Inner", ["B", "C"]),
            GroupDecl::sequence("Outer", ["A", "Inner", "D"]),
        ]);
        let order = generator.validation_order(&["Outer".into()]).unwrap();
        let sequence = order.sequences().next().unwrap();
        let members: Vec<&str> = sequence.members().iter().map(Group::as_str).collect();
        assert_eq!(members, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn sequence_cycles_are_configuration_errors() {
        let generator = generator(vec![
            GroupDecl::sequence("First", ["A", "Second"]),
            GroupDecl::sequence("Second", ["B", "First"]),
        ]);
        assert!(matches!(
            generator.validation_order(&["First".into()]),
            Err(ConfigurationError::GroupSequenceCycle { .. })
        ));
    }

    #[test]
    fn requested_sequences_keep_the_first_occurrence() {
        let generator = generator(vec![
            GroupDecl::sequence("Inner", ["A", "B"]),
            GroupDecl::sequence("Outer", ["A", "Inner", "B", "C"]),
        ]);
        let order = generator.validation_order(&["Outer".into()]).unwrap();
        let sequence = order.sequences().next().unwrap();
        let members: Vec<&str> = sequence.members().iter().map(Group::as_str).collect();
        assert_eq!(members, vec!["A", "B", "C"]);
        assert_eq!(sequence.buckets().len(), 3);
    }

    #[test]
    fn redefined_default_sequences_reject_repeated_groups() {
        let generator = generator(vec![GroupDecl::sequence("Checks", ["Basic", "Extra"])]);
        let result = generator.default_sequence(&"Car".into(), &["Default".into(), "Basic".into(), "Checks".into()]);
        match result {
            Err(ConfigurationError::DuplicateGroupInSequence { group, sequence }) => {
                assert_eq!(group, Group::from("Basic"));
                assert_eq!(sequence, Group::from("Car"));
            }
            other => panic!("Expected duplicate group, got {other:?}"),
        }
    }

    #[test]
    fn plain_groups_pull_in_inherited_groups() {
        let generator = generator(vec![GroupDecl::new("Extended").extends("Basic")]);
        let order = generator.validation_order(&["Extended".into()]).unwrap();
        let groups: Vec<&str> = order.groups().map(Group::as_str).collect();
        assert_eq!(groups, vec!["Extended", "Basic"]);
    }

    #[test]
    fn sequence_buckets_include_inherited_groups() {
        let generator = generator(vec![
            GroupDecl::new("Extended").extends("Basic"),
            GroupDecl::sequence("Seq", ["Extended", "Final"]),
        ]);
        let order = generator.validation_order(&["Seq".into()]).unwrap();
        let sequence = order.sequences().next().unwrap();
        assert_eq!(
            sequence.buckets()[0],
            vec![Group::from("Extended"), Group::from("Basic")]
        );
    }

    #[test]
    fn cascaded_groups_expand_only_when_converted() {
        let generator = generator(vec![GroupDecl::sequence("Seq", ["A", "B"])]);
        let plain = generator.single_group_order(&"Seq".into(), false).unwrap();
        assert_eq!(plain.sequences().count(), 0);
        let expanded = generator.single_group_order(&"Seq".into(), true).unwrap();
        assert_eq!(expanded.sequences().count(), 1);
    }

    #[test]
    fn default_list_must_fit_around_default_in_sequence() {
        let generator = generator(vec![
            GroupDecl::sequence("Fits", ["First", "Default", "Last"]),
            GroupDecl::sequence("Breaks", ["Default", "First"]),
        ]);
        let default_list = vec![Group::from("First"), Group::default(), Group::from("Last")];

        let fits = generator.validation_order(&["Fits".into()]).unwrap();
        assert!(fits
            .assert_default_group_sequence_is_expandable(&default_list)
            .is_ok());

        let breaks = generator.validation_order(&["Breaks".into()]).unwrap();
        assert!(matches!(
            breaks.assert_default_group_sequence_is_expandable(&default_list),
            Err(ConfigurationError::UnexpandableDefaultSequence { .. })
        ));
    }
}
