//! Type references and the statically declared type hierarchy.
//!
//! There is no runtime reflection to lean on, so every type that takes part
//! in validation (bean types, container types, validator implementations)
//! is declared up front in a [`TypeGraph`]. The graph answers the questions
//! the engine needs: ancestry, assignability, specificity, and which
//! concrete type a generic validator implementation binds to.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Root of every type hierarchy.
pub const OBJECT: &str = "Object";

/// Marker interface implemented by every validator: `ConstraintValidator<A, T>`.
pub const CONSTRAINT_VALIDATOR: &str = "ConstraintValidator";

/// Name of a declared type. Cheap to clone.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(Arc<str>);

impl TypeName {
    /// Interns `name` as a type name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The root of every type hierarchy.
    pub fn object() -> Self {
        Self::new(OBJECT)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this names the root type.
    pub fn is_object(&self) -> bool {
        &*self.0 == OBJECT
    }
}

impl fmt::Debug for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&TypeName> for TypeName {
    fn from(name: &TypeName) -> Self {
        name.clone()
    }
}

/// A (possibly parameterized) reference to a type.
///
/// `Named` with no arguments is the raw form. Serialized as its display
/// string, e.g. `"Map<String, List<Order>>"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    Named { name: TypeName, args: Vec<TypeRef> },
    Wildcard,
    Variable(String),
}

impl TypeRef {
    /// A reference to `name` without type arguments.
    pub fn raw(name: impl Into<TypeName>) -> Self {
        Self::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// A parameterized reference, `name<args..>`.
    ///
    /// # Example
    ///
    /// ```
    /// use constraint_engine::TypeRef;
    ///
    /// let list = TypeRef::generic("List", [TypeRef::raw("Order")]);
    /// assert_eq!(list.to_string(), "List<Order>");
    /// assert_eq!(list, "List<Order>".parse::<TypeRef>().unwrap());
    /// ```
    pub fn generic(name: impl Into<TypeName>, args: impl IntoIterator<Item = TypeRef>) -> Self {
        Self::Named {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }

    /// A type variable such as `T`.
    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    pub fn object() -> Self {
        Self::raw(OBJECT)
    }

    /// The referenced type, or `None` for variables and wildcards.
    pub fn name(&self) -> Option<&TypeName> {
        match self {
            Self::Named { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Raw name, with wildcards and unbound variables erased to `Object`.
    pub fn erased_name(&self) -> TypeName {
        self.name().cloned().unwrap_or_else(TypeName::object)
    }

    /// Type arguments; empty for raw references.
    pub fn args(&self) -> &[TypeRef] {
        match self {
            Self::Named { args, .. } => args,
            _ => &[],
        }
    }

    /// Type argument at `index`, or `Object` when the reference is raw.
    pub fn arg_or_object(&self, index: usize) -> TypeRef {
        self.args().get(index).cloned().unwrap_or_else(TypeRef::object)
    }

    pub fn is_parameterized(&self) -> bool {
        !self.args().is_empty()
    }

    /// The raw reference with every type argument dropped.
    pub fn erasure(&self) -> TypeRef {
        TypeRef::raw(self.erased_name())
    }

    /// True when no type variable remains anywhere in the reference.
    pub fn is_bound(&self) -> bool {
        match self {
            Self::Variable(_) => false,
            Self::Wildcard => true,
            Self::Named { args, .. } => args.iter().all(TypeRef::is_bound),
        }
    }

    fn first_variable(&self) -> Option<&str> {
        match self {
            Self::Variable(v) => Some(v),
            Self::Wildcard => None,
            Self::Named { args, .. } => args.iter().find_map(TypeRef::first_variable),
        }
    }

    /// Replaces bound type variables, recursively. Unbound variables are kept.
    pub fn substitute(&self, bindings: &HashMap<String, TypeRef>) -> TypeRef {
        match self {
            Self::Variable(v) => bindings.get(v).cloned().unwrap_or_else(|| self.clone()),
            Self::Wildcard => Self::Wildcard,
            Self::Named { name, args } => Self::Named {
                name: name.clone(),
                args: args.iter().map(|a| a.substitute(bindings)).collect(),
            },
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard => f.write_str("?"),
            Self::Variable(v) => f.write_str(v),
            Self::Named { name, args } => {
                write!(f, "{name}")?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
        }
    }
}

impl From<TypeRef> for String {
    fn from(type_ref: TypeRef) -> Self {
        type_ref.to_string()
    }
}

impl TryFrom<String> for TypeRef {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<&str> for TypeRef {
    /// Parses `name` like [`str::parse`]; input that does not parse is taken
    /// as a raw type name.
    fn from(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| TypeRef::raw(name))
    }
}

impl FromStr for TypeRef {
    type Err = TypeError;

    /// Parses `Name`, `Name<Arg, ...>` and `?`. Single upper-case letters
    /// are read as type variables.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = TypeParser {
            input: s,
            chars: s.char_indices().peekable(),
        };
        let parsed = parser.parse_type()?;
        parser.skip_whitespace();
        if parser.chars.peek().is_some() {
            return Err(TypeError::Parse {
                input: s.to_string(),
            });
        }
        Ok(parsed)
    }
}

struct TypeParser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl TypeParser<'_> {
    fn error(&self) -> TypeError {
        TypeError::Parse {
            input: self.input.to_string(),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn parse_type(&mut self) -> Result<TypeRef, TypeError> {
        self.skip_whitespace();
        if matches!(self.chars.peek(), Some((_, '?'))) {
            self.chars.next();
            return Ok(TypeRef::Wildcard);
        }
        let mut name = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' || c == '.' || c == '$' {
                name.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(self.error());
        }
        self.skip_whitespace();
        let mut args = Vec::new();
        if matches!(self.chars.peek(), Some((_, '<'))) {
            self.chars.next();
            loop {
                args.push(self.parse_type()?);
                self.skip_whitespace();
                match self.chars.next() {
                    Some((_, ',')) => continue,
                    Some((_, '>')) => break,
                    _ => return Err(self.error()),
                }
            }
        }
        if args.is_empty() && name.len() == 1 && name.chars().all(|c| c.is_ascii_uppercase()) {
            return Ok(TypeRef::Variable(name));
        }
        Ok(TypeRef::generic(name, args))
    }
}

/// Classes have at most one superclass; interfaces only extend interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Interface,
}

/// Declaration of one type: its kind, type parameters and direct supertypes.
///
/// For classes the first class-kind supertype is the superclass. Supertype
/// references may use the declaration's own type parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub name: TypeName,
    pub kind: TypeKind,
    pub params: Vec<String>,
    pub supertypes: Vec<TypeRef>,
}

impl TypeDecl {
    /// A class without type parameters or supertypes.
    pub fn class(name: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Class,
            params: Vec::new(),
            supertypes: Vec::new(),
        }
    }

    /// An interface without type parameters or supertypes.
    pub fn interface(name: impl Into<TypeName>) -> Self {
        Self {
            kind: TypeKind::Interface,
            ..Self::class(name)
        }
    }

    /// Sets the type parameters, in declaration order.
    pub fn params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a supertype (superclass or implemented/extended interface).
    pub fn extends(mut self, supertype: impl Into<TypeRef>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    pub fn implements(self, interface: impl Into<TypeRef>) -> Self {
        self.extends(interface)
    }
}

/// Problems in the declared type model.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("Type {name} is declared twice with different definitions")]
    ConflictingDeclaration { name: TypeName },

    #[error("Type {name} refers to undeclared supertype {supertype}")]
    UnknownSupertype { name: TypeName, supertype: TypeName },

    #[error("Type {name} is part of an inheritance cycle")]
    InheritanceCycle { name: TypeName },

    #[error("{implementation} does not implement {marker}")]
    MissingMarker {
        implementation: TypeName,
        marker: String,
    },

    #[error("{implementation} binds {marker} with unresolved type variable {variable}")]
    UnboundTypeArgument {
        implementation: TypeName,
        marker: String,
        variable: String,
    },

    #[error("Cannot parse type reference '{input}'")]
    Parse { input: String },
}

/// The statically known "extends/implements" graph.
#[derive(Debug, Clone, Default)]
pub struct TypeGraph {
    decls: IndexMap<TypeName, TypeDecl>,
}

impl TypeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph pre-populated with the value types the engine knows natively.
    pub fn with_builtins() -> Self {
        let mut graph = Self::new();
        let e = || TypeRef::var("E");
        let builtins = [
            TypeDecl::class(OBJECT),
            TypeDecl::class("Boolean").extends(OBJECT),
            TypeDecl::class("Number").extends(OBJECT),
            TypeDecl::class("Long").extends("Number"),
            TypeDecl::class("Double").extends("Number"),
            TypeDecl::interface("CharSequence"),
            TypeDecl::class("String")
                .extends(OBJECT)
                .implements("CharSequence"),
            TypeDecl::class("Instant").extends(OBJECT),
            TypeDecl::interface("Iterable").params(["E"]),
            TypeDecl::interface("Collection")
                .params(["E"])
                .extends(TypeRef::generic("Iterable", [e()])),
            TypeDecl::interface("List")
                .params(["E"])
                .extends(TypeRef::generic("Collection", [e()])),
            TypeDecl::interface("Set")
                .params(["E"])
                .extends(TypeRef::generic("Collection", [e()])),
            TypeDecl::interface("Map").params(["K", "V"]),
            TypeDecl::class("Array").params(["E"]).extends(OBJECT),
            TypeDecl::interface(CONSTRAINT_VALIDATOR).params(["A", "T"]),
        ];
        for decl in builtins {
            graph.decls.insert(decl.name.clone(), decl);
        }
        graph
    }

    /// Declares a type. Re-declaring an identical type is a no-op.
    pub fn declare(&mut self, decl: TypeDecl) -> Result<(), TypeError> {
        if let Some(existing) = self.decls.get(&decl.name) {
            if *existing == decl {
                return Ok(());
            }
            return Err(TypeError::ConflictingDeclaration { name: decl.name });
        }
        self.decls.insert(decl.name.clone(), decl);
        Ok(())
    }

    /// Checks that every referenced supertype is declared and that no
    /// type inherits from itself.
    pub fn verify(&self) -> Result<(), TypeError> {
        for decl in self.decls.values() {
            for supertype in &decl.supertypes {
                if let Some(name) = supertype.name() {
                    if !self.decls.contains_key(name) {
                        return Err(TypeError::UnknownSupertype {
                            name: decl.name.clone(),
                            supertype: name.clone(),
                        });
                    }
                }
            }
        }
        for name in self.decls.keys() {
            let mut seen = HashSet::new();
            let mut queue: VecDeque<&TypeName> = self.direct_supertypes(name).collect();
            while let Some(current) = queue.pop_front() {
                if current == name {
                    return Err(TypeError::InheritanceCycle { name: name.clone() });
                }
                if seen.insert(current.clone()) {
                    queue.extend(self.direct_supertypes(current));
                }
            }
        }
        Ok(())
    }

    /// The declaration of `name`, if it was declared.
    pub fn get(&self, name: &TypeName) -> Option<&TypeDecl> {
        self.decls.get(name)
    }

    pub fn contains(&self, name: &TypeName) -> bool {
        self.decls.contains_key(name)
    }

    /// Whether `name` is declared as an interface.
    pub fn is_interface(&self, name: &TypeName) -> bool {
        self.decls
            .get(name)
            .is_some_and(|d| d.kind == TypeKind::Interface)
    }

    /// Every declared type, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &TypeName> {
        self.decls.keys()
    }

    fn direct_supertypes<'a>(&'a self, name: &TypeName) -> impl Iterator<Item = &'a TypeName> {
        self.decls
            .get(name)
            .into_iter()
            .flat_map(|d| d.supertypes.iter().filter_map(TypeRef::name))
    }

    fn superclass(&self, name: &TypeName) -> Option<&TypeName> {
        self.direct_supertypes(name)
            .find(|s| !self.is_interface(s) && !s.is_object())
    }

    /// The class itself followed by its superclasses, most specific first.
    /// Interfaces and `Object` are not part of the result.
    pub fn class_hierarchy(&self, name: &TypeName) -> Vec<TypeName> {
        let mut chain = vec![name.clone()];
        let mut current = name;
        while let Some(parent) = self.superclass(current) {
            if chain.contains(parent) {
                break;
            }
            chain.push(parent.clone());
            current = parent;
        }
        chain
    }

    /// Interfaces `name` implements itself, with their super-interfaces, but
    /// not the ones only reached through its superclass.
    pub fn direct_interfaces(&self, name: &TypeName) -> Vec<TypeName> {
        let mut result: Vec<TypeName> = Vec::new();
        let mut queue: VecDeque<TypeName> = self
            .direct_supertypes(name)
            .filter(|s| self.is_interface(s))
            .cloned()
            .collect();
        while let Some(current) = queue.pop_front() {
            if result.contains(&current) {
                continue;
            }
            queue.extend(self.direct_supertypes(&current).filter(|s| self.is_interface(s)).cloned());
            result.push(current);
        }
        result
    }

    /// Every ancestor (self first, then the superclass chain, then all
    /// interfaces breadth first). Deduplicated, stable across runs, and
    /// `Object` last.
    pub fn ancestors(&self, name: &TypeName) -> Vec<TypeName> {
        let mut result = self.class_hierarchy(name);
        let mut seen: HashSet<TypeName> = result.iter().cloned().collect();
        let mut queue: VecDeque<TypeName> = result.iter().cloned().collect();
        while let Some(current) = queue.pop_front() {
            for supertype in self.direct_supertypes(&current) {
                if supertype.is_object() || !seen.insert(supertype.clone()) {
                    continue;
                }
                result.push(supertype.clone());
                queue.push_back(supertype.clone());
            }
        }
        if !name.is_object() {
            result.push(TypeName::object());
        }
        result
    }

    /// Raw subtype check. Reflexive; everything is a subtype of `Object`.
    pub fn is_subtype(&self, sub: &TypeName, sup: &TypeName) -> bool {
        if sub == sup || sup.is_object() {
            return true;
        }
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&TypeName> = self.direct_supertypes(sub).collect();
        while let Some(current) = queue.pop_front() {
            if current == sup {
                return true;
            }
            if seen.insert(current) {
                queue.extend(self.direct_supertypes(current));
            }
        }
        false
    }

    /// Declared types (including `name` itself) that are subtypes of `name`.
    pub fn subtypes_of(&self, name: &TypeName) -> Vec<TypeName> {
        self.decls
            .keys()
            .filter(|candidate| self.is_subtype(candidate, name))
            .cloned()
            .collect()
    }

    /// The parameterization of `target` as seen from `from`, walking the
    /// supertype graph and substituting type arguments level by level.
    pub fn supertype_as(&self, from: &TypeRef, target: &TypeName) -> Option<TypeRef> {
        let TypeRef::Named { name, args } = from else {
            return target.is_object().then(TypeRef::object);
        };
        if name == target {
            return Some(from.clone());
        }
        if target.is_object() {
            return Some(TypeRef::object());
        }
        let decl = self.decls.get(name)?;
        let bindings: HashMap<String, TypeRef> = decl
            .params
            .iter()
            .cloned()
            .zip(args.iter().cloned())
            .collect();
        decl.supertypes
            .iter()
            .map(|supertype| supertype.substitute(&bindings))
            .find_map(|supertype| self.supertype_as(&supertype, target))
    }

    /// Whether a value of type `from` may be checked by something accepting `target`.
    ///
    /// Raw forms are erased: a raw `from` is assignable to any
    /// parameterization of a supertype. Non-wildcard arguments are invariant.
    pub fn is_assignable(&self, target: &TypeRef, from: &TypeRef) -> bool {
        let TypeRef::Named {
            name: target_name,
            args: target_args,
        } = target
        else {
            return true;
        };
        let from_name = from.erased_name();
        if !self.is_subtype(&from_name, target_name) {
            return false;
        }
        if target_args.is_empty()
            || target_args.iter().all(|a| matches!(a, TypeRef::Wildcard))
            || !from.is_parameterized()
        {
            return true;
        }
        let Some(view) = self.supertype_as(from, target_name) else {
            return false;
        };
        if !view.is_parameterized() {
            return true;
        }
        target_args
            .iter()
            .zip(view.args())
            .all(|(expected, actual)| matches!(expected, TypeRef::Wildcard) || expected == actual)
    }

    /// Specificity order used for validator resolution: `a` is more specific
    /// than `b` if its erasure is a proper subtype of `b`'s, or if both share
    /// a raw type and only `a` is parameterized.
    pub fn is_more_specific(&self, a: &TypeRef, b: &TypeRef) -> bool {
        let a_name = a.erased_name();
        let b_name = b.erased_name();
        if a_name == b_name {
            return a.is_parameterized() && !b.is_parameterized();
        }
        self.is_subtype(&a_name, &b_name)
    }

    /// Resolves the concrete type bound to `marker`'s type parameter at
    /// `index` by `implementation`, following generic superclasses and
    /// interfaces through any number of levels.
    pub fn resolve_type_argument(
        &self,
        implementation: &TypeName,
        marker: &str,
        index: usize,
    ) -> Result<TypeRef, TypeError> {
        let params = self
            .decls
            .get(implementation)
            .map(|d| d.params.iter().map(TypeRef::var).collect::<Vec<_>>())
            .unwrap_or_default();
        let start = TypeRef::generic(implementation.clone(), params);
        let marker_name = TypeName::new(marker);
        let missing = || TypeError::MissingMarker {
            implementation: implementation.clone(),
            marker: marker.to_string(),
        };
        let view = self
            .supertype_as(&start, &marker_name)
            .filter(|_| !marker_name.is_object())
            .ok_or_else(missing)?;
        let resolved = view.args().get(index).cloned().ok_or_else(missing)?;
        if let Some(variable) = resolved.first_variable() {
            return Err(TypeError::UnboundTypeArgument {
                implementation: implementation.clone(),
                marker: marker.to_string(),
                variable: variable.to_string(),
            });
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> TypeGraph {
        let mut graph = TypeGraph::with_builtins();
        graph.declare(TypeDecl::interface("Vehicle")).unwrap();
        graph
            .declare(TypeDecl::class("Car").extends(OBJECT).implements("Vehicle"))
            .unwrap();
        graph
            .declare(TypeDecl::class("SportsCar").extends("Car"))
            .unwrap();
        graph
    }

    #[test]
    fn ancestors_are_stable_and_deduplicated() {
        let graph = graph();
        let ancestors = graph.ancestors(&TypeName::new("SportsCar"));
        let names: Vec<&str> = ancestors.iter().map(TypeName::as_str).collect();
        assert_eq!(names, vec!["SportsCar", "Car", "Vehicle", "Object"]);
        assert_eq!(ancestors, graph.ancestors(&TypeName::new("SportsCar")));
    }

    #[test]
    fn class_hierarchy_excludes_interfaces() {
        let graph = graph();
        let hierarchy = graph.class_hierarchy(&TypeName::new("SportsCar"));
        assert_eq!(hierarchy, vec![TypeName::new("SportsCar"), TypeName::new("Car")]);
    }

    #[test]
    fn direct_interfaces_skip_those_of_the_superclass() {
        let mut graph = graph();
        graph.declare(TypeDecl::interface("Insured")).unwrap();
        graph
            .declare(TypeDecl::interface("Leased").extends("Insured"))
            .unwrap();
        graph
            .declare(TypeDecl::class("Rental").extends("Car").implements("Leased"))
            .unwrap();
        assert_eq!(
            graph.direct_interfaces(&TypeName::new("Rental")),
            vec![TypeName::new("Leased"), TypeName::new("Insured")]
        );
        assert!(graph.direct_interfaces(&TypeName::new("SportsCar")).is_empty());
    }

    #[test]
    fn list_is_assignable_to_parameterized_collection() {
        let graph = graph();
        let list_of_strings: TypeRef = "List<String>".parse().unwrap();
        assert!(graph.is_assignable(&"Collection<?>".parse().unwrap(), &list_of_strings));
        assert!(graph.is_assignable(&"Collection<String>".parse().unwrap(), &list_of_strings));
        assert!(!graph.is_assignable(&"Collection<Long>".parse().unwrap(), &list_of_strings));
        assert!(graph.is_assignable(&"Collection<Long>".parse().unwrap(), &TypeRef::raw("List")));
        assert!(!graph.is_assignable(&TypeRef::raw("Map"), &TypeRef::raw("List")));
    }

    #[test]
    fn parameterized_form_is_more_specific_than_raw() {
        let graph = graph();
        let raw = TypeRef::raw("Collection");
        let wildcard: TypeRef = "Collection<?>".parse().unwrap();
        assert!(graph.is_more_specific(&wildcard, &raw));
        assert!(!graph.is_more_specific(&raw, &wildcard));
        assert!(graph.is_more_specific(&TypeRef::raw("List"), &wildcard));
        assert!(graph.is_more_specific(&TypeRef::raw("Long"), &TypeRef::raw("Number")));
    }

    #[test]
    fn resolves_type_argument_through_generic_hierarchy() {
        let mut graph = graph();
        graph
            .declare(TypeDecl::class("AbstractSizeValidator").params(["T"]).extends(
                TypeRef::generic(
                    CONSTRAINT_VALIDATOR,
                    [TypeRef::raw("Size"), TypeRef::var("T")],
                ),
            ))
            .unwrap();
        graph
            .declare(
                TypeDecl::class("CollectionSizeValidator")
                    .params(["X"])
                    .extends(TypeRef::generic(
                        "AbstractSizeValidator",
                        [TypeRef::generic("Collection", [TypeRef::var("X")])],
                    )),
            )
            .unwrap();
        graph
            .declare(TypeDecl::class("StringListSizeValidator").extends(TypeRef::generic(
                "CollectionSizeValidator",
                [TypeRef::raw("String")],
            )))
            .unwrap();

        let resolved = graph
            .resolve_type_argument(&"StringListSizeValidator".into(), CONSTRAINT_VALIDATOR, 1)
            .unwrap();
        assert_eq!(resolved.to_string(), "Collection<String>");

        let unbound = graph.resolve_type_argument(
            &"CollectionSizeValidator".into(),
            CONSTRAINT_VALIDATOR,
            1,
        );
        assert!(matches!(unbound, Err(TypeError::UnboundTypeArgument { ref variable, .. }) if variable == "X"));
    }

    #[test]
    fn resolving_non_validator_fails() {
        let graph = graph();
        let result = graph.resolve_type_argument(&"Car".into(), CONSTRAINT_VALIDATOR, 1);
        assert!(matches!(result, Err(TypeError::MissingMarker { .. })));
    }

    #[test]
    fn parses_and_prints_nested_references() {
        let parsed: TypeRef = "Map<String, List<Order>>".parse().unwrap();
        assert_eq!(parsed.to_string(), "Map<String, List<Order>>");
        assert_eq!(parsed.arg_or_object(1).arg_or_object(0), TypeRef::raw("Order"));
        assert!("List<".parse::<TypeRef>().is_err());
        assert_eq!("T".parse::<TypeRef>().unwrap(), TypeRef::var("T"));
    }

    #[test]
    fn verify_rejects_unknown_supertypes_and_cycles() {
        let mut graph = TypeGraph::with_builtins();
        graph.declare(TypeDecl::class("Orphan").extends("Missing")).unwrap();
        assert!(matches!(graph.verify(), Err(TypeError::UnknownSupertype { .. })));

        let mut graph = TypeGraph::with_builtins();
        graph.declare(TypeDecl::interface("Ping").extends("Pong")).unwrap();
        graph.declare(TypeDecl::interface("Pong").extends("Ping")).unwrap();
        assert!(matches!(graph.verify(), Err(TypeError::InheritanceCycle { .. })));
    }

    #[test]
    fn conflicting_redeclaration_is_rejected() {
        let mut graph = graph();
        assert!(graph.declare(TypeDecl::class("Car").extends(OBJECT).implements("Vehicle")).is_ok());
        assert!(matches!(
            graph.declare(TypeDecl::class("Car")),
            Err(TypeError::ConflictingDeclaration { .. })
        ));
    }
}
