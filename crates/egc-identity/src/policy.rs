use serde::{Deserialize, Serialize};

use egc_types::schema::{default_id_fields, default_separator};

/// Composite identity rule applied to every object, regardless of type.
///
/// An object matches when it carries a non-null value for every field in
/// `fields`; the key is those values joined by `separator`, ignoring the
/// object's typename.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeRule {
    pub fields: Vec<String>,
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl CompositeRule {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            separator: default_separator(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

/// Global identity configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPolicy {
    /// Fields consulted, in order, by the default `<typename>:<id>` policy.
    #[serde(default = "default_id_fields")]
    pub id_fields: Vec<String>,
    /// Composite rules checked before the default policy, in order.
    #[serde(default)]
    pub composite: Vec<CompositeRule>,
}

impl Default for IdentityPolicy {
    fn default() -> Self {
        Self {
            id_fields: default_id_fields(),
            composite: Vec::new(),
        }
    }
}

impl IdentityPolicy {
    pub fn with_rule(mut self, rule: CompositeRule) -> Self {
        self.composite.push(rule);
        self
    }
}
