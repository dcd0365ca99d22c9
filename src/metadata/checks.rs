//! Definition rules that report every broken rule of an element at once.

use crate::core::{Group, TypeName};
use crate::error::ConfigurationError;
use crate::groups::GroupRegistry;
use crate::registry::Attributes;
use std::fmt;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check<E> = Validation<(), NonEmptyVec<E>>;

fn check<E>(ok: bool, problem: impl FnOnce() -> E) -> Check<E> {
    if ok {
        Validation::success(())
    } else {
        Validation::fail(problem())
    }
}

fn into_vec<E: Clone>(problems: NonEmptyVec<E>) -> Vec<E> {
    problems.iter().cloned().collect()
}

/// A broken rule of a default group sequence redefinition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceProblem {
    /// The type's own marker is missing, so its constraints are unreachable.
    MissingBeanMarker,
    ContainsDefault,
    Duplicate(Group),
}

impl fmt::Display for SequenceProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingBeanMarker => f.write_str("the type itself must be part of its default group sequence"),
            Self::ContainsDefault => f.write_str("Default is not allowed in a default group sequence"),
            Self::Duplicate(group) => write!(f, "{group} is listed more than once"),
        }
    }
}

/// Validates a redefined default sequence and replaces the type's own
/// marker by `Default`.
pub fn valid_default_group_list(
    type_name: &TypeName,
    groups: &[Group],
) -> Result<Vec<Group>, ConfigurationError> {
    let marker = Group::from(type_name);
    let mut checks = vec![
        check(groups.contains(&marker), || SequenceProblem::MissingBeanMarker),
        check(!groups.iter().any(Group::is_default), || SequenceProblem::ContainsDefault),
    ];
    for (i, group) in groups.iter().enumerate() {
        if !group.is_default() && groups[..i].contains(group) {
            checks.push(Validation::fail(SequenceProblem::Duplicate(group.clone())));
        }
    }

    match Validation::all_vec(checks).map(|_| ()) {
        Validation::Success(_) => Ok(groups
            .iter()
            .map(|g| if *g == marker { Group::default() } else { g.clone() })
            .collect()),
        Validation::Failure(problems) => Err(ConfigurationError::InvalidDefaultGroupSequence {
            type_name: type_name.clone(),
            problems: into_vec(problems),
        }),
    }
}

/// A broken group conversion rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionProblem {
    NotCascaded { from: Group, to: Group },
    FromSequence { from: Group },
    AmbiguousSource { from: Group },
}

impl fmt::Display for ConversionProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotCascaded { from, to } => {
                write!(f, "conversion {from} -> {to} on an element that is not cascaded")
            }
            Self::FromSequence { from } => write!(f, "{from} is a group sequence and cannot be converted"),
            Self::AmbiguousSource { from } => write!(f, "{from} is converted to more than one group"),
        }
    }
}

/// Checks the group conversions of one element. Identical duplicates (from
/// several configuration layers) are accepted.
pub fn check_group_conversions(
    element: &str,
    conversions: &[(Group, Group)],
    cascading: bool,
    groups: &GroupRegistry,
) -> Result<(), ConfigurationError> {
    let mut checks: Vec<Check<ConversionProblem>> = Vec::new();
    for (i, (from, to)) in conversions.iter().enumerate() {
        checks.push(check(cascading, || ConversionProblem::NotCascaded {
            from: from.clone(),
            to: to.clone(),
        }));
        checks.push(check(!groups.is_sequence(from), || ConversionProblem::FromSequence {
            from: from.clone(),
        }));
        let conflicting = conversions[..i]
            .iter()
            .any(|(other_from, other_to)| other_from == from && other_to != to);
        checks.push(check(!conflicting, || ConversionProblem::AmbiguousSource {
            from: from.clone(),
        }));
    }

    match Validation::all_vec(checks).map(|_| ()) {
        Validation::Success(_) => Ok(()),
        Validation::Failure(problems) => Err(ConfigurationError::InvalidGroupConversions {
            element: element.to_string(),
            problems: into_vec(problems),
        }),
    }
}

/// Names of required attributes absent from `attributes`, all of them.
pub fn missing_attributes(required: &[String], attributes: &Attributes) -> Option<Vec<String>> {
    let checks: Vec<Check<String>> = required
        .iter()
        .map(|name| check(attributes.contains_key(name), || name.clone()))
        .collect();
    match Validation::all_vec(checks).map(|_| ()) {
        Validation::Success(_) => None,
        Validation::Failure(missing) => Some(into_vec(missing)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::GroupDecl;

    #[test]
    fn valid_sequence_replaces_marker_with_default() {
        let list = valid_default_group_list(&"Car".into(), &["Car".into(), "CarChecks".into()]).unwrap();
        assert_eq!(list, vec![Group::default(), Group::from("CarChecks")]);
    }

    #[test]
    fn sequence_problems_accumulate() {
        let result = valid_default_group_list(
            &"Car".into(),
            &["Default".into(), "CarChecks".into(), "CarChecks".into()],
        );
        match result {
            Err(ConfigurationError::InvalidDefaultGroupSequence { problems, .. }) => {
                assert_eq!(problems.len(), 3);
                assert!(problems.contains(&SequenceProblem::MissingBeanMarker));
                assert!(problems.contains(&SequenceProblem::ContainsDefault));
                assert!(problems.contains(&SequenceProblem::Duplicate("CarChecks".into())));
            }
            other => panic!("Expected sequence problems, got {other:?}"),
        }
    }

    #[test]
    fn conversion_problems_accumulate() {
        let mut registry = GroupRegistry::new();
        registry.declare(GroupDecl::sequence("Seq", ["A"])).unwrap();
        let conversions = vec![
            (Group::from("Seq"), Group::from("B")),
            (Group::from("A"), Group::from("B")),
            (Group::from("A"), Group::from("C")),
        ];

        let result = check_group_conversions("Order.items", &conversions, false, &registry);
        match result {
            Err(ConfigurationError::InvalidGroupConversions { problems, .. }) => {
                assert!(problems.contains(&ConversionProblem::FromSequence { from: "Seq".into() }));
                assert!(problems.contains(&ConversionProblem::AmbiguousSource { from: "A".into() }));
                let not_cascaded = problems
                    .iter()
                    .filter(|p| matches!(p, ConversionProblem::NotCascaded { .. }))
                    .count();
                assert_eq!(not_cascaded, 3);
            }
            other => panic!("Expected conversion problems, got {other:?}"),
        }
    }

    #[test]
    fn identical_conversions_from_several_layers_are_accepted() {
        let conversions = vec![
            (Group::from("A"), Group::from("B")),
            (Group::from("A"), Group::from("B")),
        ];
        assert!(check_group_conversions("x", &conversions, true, &GroupRegistry::new()).is_ok());
    }

    #[test]
    fn all_missing_attributes_are_reported() {
        let required = vec!["value".to_string(), "unit".to_string(), "scale".to_string()];
        let mut attributes = Attributes::new();
        attributes.insert("scale".into(), 2.into());
        assert_eq!(
            missing_attributes(&required, &attributes),
            Some(vec!["value".to_string(), "unit".to_string()])
        );
        attributes.insert("value".into(), 1.into());
        attributes.insert("unit".into(), "kg".into());
        assert_eq!(missing_attributes(&required, &attributes), None);
    }
}
