//! Validation group markers.

use super::types::TypeName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the implicit group every constraint belongs to unless told otherwise.
pub const DEFAULT_GROUP: &str = "Default";

/// An opaque group marker. Groups compare by name only.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Group(TypeName);

impl Group {
    /// Creates a group marker named `name`.
    pub fn new(name: impl Into<TypeName>) -> Self {
        Self(name.into())
    }

    /// Whether this is the `Default` group.
    pub fn is_default(&self) -> bool {
        self.0.as_str() == DEFAULT_GROUP
    }

    pub fn name(&self) -> &TypeName {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for Group {
    fn default() -> Self {
        Self::new(DEFAULT_GROUP)
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<&str> for Group {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Group {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<TypeName> for Group {
    fn from(name: TypeName) -> Self {
        Self(name)
    }
}

impl From<&TypeName> for Group {
    fn from(name: &TypeName) -> Self {
        Self(name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_group_is_recognized() {
        assert!(Group::default().is_default());
        assert!(Group::from("Default").is_default());
        assert!(!Group::from("CarChecks").is_default());
    }

    #[test]
    fn groups_serialize_as_plain_names() {
        let json = serde_json::to_string(&Group::from("CarChecks")).unwrap();
        assert_eq!(json, "\"CarChecks\"");
    }
}
