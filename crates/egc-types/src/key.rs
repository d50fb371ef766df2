use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier for one logical entity.
///
/// An `IdentityKey` is computed by the identity resolver, either as the
/// default `<typename>:<id>` composition or a custom composition over
/// declared fields. Two objects with the same key are the same entity no
/// matter where they appear in a response tree.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Key of the record holding the root fields of query operations.
    pub const ROOT_QUERY: &'static str = "ROOT_QUERY";
    /// Key of the record holding the root fields of mutation operations.
    pub const ROOT_MUTATION: &'static str = "ROOT_MUTATION";

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Compose the default `<typename>:<id>` key.
    pub fn typed(typename: &str, id: &str) -> Self {
        Self(format!("{typename}:{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityKey({})", self.0)
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for IdentityKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for IdentityKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for IdentityKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Pointer to another record, resolved only at read time.
///
/// Serializes as `{"__ref": "<key>"}` so extracted store snapshots stay
/// readable next to the response trees they came from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Reference {
    #[serde(rename = "__ref")]
    key: IdentityKey,
}

impl Reference {
    pub fn new(key: impl Into<IdentityKey>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &IdentityKey {
        &self.key
    }

    pub fn into_key(self) -> IdentityKey {
        self.key
    }
}

impl From<IdentityKey> for Reference {
    fn from(key: IdentityKey) -> Self {
        Self { key }
    }
}
