//! Property paths from a validation root to a failing element.

use super::types::TypeName;
use super::value::Value;
use crate::error::ArgumentError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One traversal step.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathNode {
    Property(String),
    /// 0-based position in iteration order.
    Index(usize),
    /// Map entry; `of_key` marks the key itself rather than the value.
    Key { key: Value, of_key: bool },
    Method(String),
    Constructor(TypeName),
    Parameter { index: usize, name: String },
    CrossParameter,
    ReturnValue,
}

impl PathNode {
    fn is_subscript(&self) -> bool {
        matches!(self, Self::Index(_) | Self::Key { .. })
    }
}

/// Ordered sequence of [`PathNode`]s. Displays as `orderList[0].orderNumber`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    nodes: Vec<PathNode>,
}

impl PropertyPath {
    /// The empty path, pointing at the validated object itself.
    ///
    /// # Example
    ///
    /// ```
    /// use constraint_engine::PropertyPath;
    ///
    /// let path = PropertyPath::root().property("orderList").index(0).property("orderNumber");
    /// assert_eq!(path.to_string(), "orderList[0].orderNumber");
    /// assert!(PropertyPath::root().is_root());
    /// ```
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[PathNode] {
        &self.nodes
    }

    /// The last node, if the path is not the root.
    pub fn leaf(&self) -> Option<&PathNode> {
        self.nodes.last()
    }

    /// Appends `node` in place.
    pub fn push(&mut self, node: PathNode) {
        self.nodes.push(node);
    }

    /// A copy of this path extended by `node`.
    pub fn join(&self, node: PathNode) -> Self {
        let mut nodes = self.nodes.clone();
        nodes.push(node);
        Self { nodes }
    }

    /// A copy extended by a property step.
    pub fn property(&self, name: impl Into<String>) -> Self {
        self.join(PathNode::Property(name.into()))
    }

    pub fn index(&self, index: usize) -> Self {
        self.join(PathNode::Index(index))
    }

    /// A copy extended by a map key step. Set `of_key` when the key itself,
    /// not its value, is the subject.
    pub fn key(&self, key: Value, of_key: bool) -> Self {
        self.join(PathNode::Key { key, of_key })
    }

    /// The path without its last node.
    pub fn parent(&self) -> Self {
        let mut nodes = self.nodes.clone();
        nodes.pop();
        Self { nodes }
    }

    /// Parses `a.b[0].c[key]`. Numeric subscripts become indices, anything
    /// else a textual map key.
    pub fn parse(input: &str) -> Result<Self, ArgumentError> {
        let invalid = |reason: &str| ArgumentError::InvalidPropertyPath {
            path: input.to_string(),
            reason: reason.to_string(),
        };
        if input.trim().is_empty() {
            return Err(ArgumentError::EmptyPropertyPath);
        }

        let mut nodes = Vec::new();
        let mut chars = input.chars().peekable();
        let mut expect_name = true;
        while chars.peek().is_some() {
            if expect_name {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '.' || c == '[' {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                if name.is_empty() {
                    return Err(invalid("missing property name"));
                }
                nodes.push(PathNode::Property(name));
                expect_name = false;
                continue;
            }
            match chars.next() {
                Some('.') => {
                    expect_name = true;
                    if chars.peek().is_none() {
                        return Err(invalid("trailing '.'"));
                    }
                }
                Some('[') => {
                    let mut subscript = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(c) => subscript.push(c),
                            None => return Err(invalid("unclosed '['")),
                        }
                    }
                    if subscript.is_empty() {
                        return Err(invalid("empty subscript"));
                    }
                    let node = match subscript.parse::<usize>() {
                        Ok(index) => PathNode::Index(index),
                        Err(_) => PathNode::Key {
                            key: Value::Text(subscript),
                            of_key: false,
                        },
                    };
                    nodes.push(node);
                }
                _ => return Err(invalid("unexpected character")),
            }
        }
        Ok(Self { nodes })
    }
}

impl FromStr for PropertyPath {
    type Err = ArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 && !node.is_subscript() {
                f.write_str(".")?;
            }
            match node {
                PathNode::Property(name) | PathNode::Method(name) => f.write_str(name)?,
                PathNode::Constructor(type_name) => write!(f, "{type_name}")?,
                PathNode::Parameter { name, .. } => f.write_str(name)?,
                PathNode::Index(index) => write!(f, "[{index}]")?,
                PathNode::Key { key, of_key } => {
                    write!(f, "[{key}]")?;
                    if *of_key {
                        f.write_str(".<map key>")?;
                    }
                }
                PathNode::CrossParameter => f.write_str("<cross-parameter>")?,
                PathNode::ReturnValue => f.write_str("<return value>")?,
            }
        }
        Ok(())
    }
}

impl Serialize for PropertyPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_indexed_property_paths() {
        let path = PropertyPath::root()
            .property("orderList")
            .index(0)
            .property("orderNumber");
        assert_eq!(path.to_string(), "orderList[0].orderNumber");
    }

    #[test]
    fn displays_executable_paths() {
        let path = PropertyPath::root()
            .join(PathNode::Method("placeOrder".into()))
            .join(PathNode::Parameter {
                index: 1,
                name: "arg1".into(),
            })
            .property("customer");
        assert_eq!(path.to_string(), "placeOrder.arg1.customer");

        let cross = PropertyPath::root()
            .join(PathNode::Method("book".into()))
            .join(PathNode::CrossParameter);
        assert_eq!(cross.to_string(), "book.<cross-parameter>");
    }

    #[test]
    fn parses_indices_and_keys() {
        let path = PropertyPath::parse("addresses[home].lines[2]").unwrap();
        assert_eq!(
            path.nodes(),
            &[
                PathNode::Property("addresses".into()),
                PathNode::Key {
                    key: Value::from("home"),
                    of_key: false
                },
                PathNode::Property("lines".into()),
                PathNode::Index(2),
            ]
        );
        assert_eq!(path.to_string(), "addresses[home].lines[2]");
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(matches!(
            PropertyPath::parse(""),
            Err(ArgumentError::EmptyPropertyPath)
        ));
        for bad in ["a.", ".a", "a[0", "a[]", "a..b", "a[0]b"] {
            assert!(
                matches!(
                    PropertyPath::parse(bad),
                    Err(ArgumentError::InvalidPropertyPath { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }
}
