use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use egc_types::IdentityKey;

/// Why a requested path could not be served.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum MissReason {
    /// The record exists but does not hold this storage field.
    MissingField { field: String },
    /// A reference points at a key with no record.
    DanglingReference { key: IdentityKey },
}

/// One unsatisfied path in a read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingField {
    /// Response path, e.g. `$.people[2].cats`.
    pub path: String,
    #[serde(flatten)]
    pub reason: MissReason,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            MissReason::MissingField { field } => {
                write!(f, "{}: field {field} not in store", self.path)
            }
            MissReason::DanglingReference { key } => {
                write!(f, "{}: no record for {key}", self.path)
            }
        }
    }
}

/// Result tree of a read, or the list of paths that were missing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum ReadOutcome {
    Complete(Value),
    Miss(Vec<MissingField>),
}

impl ReadOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, ReadOutcome::Complete(_))
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, ReadOutcome::Miss(_))
    }

    /// The tree, if the read was complete.
    pub fn data(&self) -> Option<&Value> {
        match self {
            ReadOutcome::Complete(value) => Some(value),
            ReadOutcome::Miss(_) => None,
        }
    }

    /// The missing paths, empty for a complete read.
    pub fn missing(&self) -> &[MissingField] {
        match self {
            ReadOutcome::Complete(_) => &[],
            ReadOutcome::Miss(missing) => missing,
        }
    }

    /// Whether a watcher holding `self` should hear about `next`.
    ///
    /// A changed tree, a tree turning into a miss, and a miss turning into a
    /// tree all count. A miss staying a miss does not, even if the set of
    /// missing paths moved.
    pub fn differs_from(&self, next: &ReadOutcome) -> bool {
        match (self, next) {
            (ReadOutcome::Complete(a), ReadOutcome::Complete(b)) => a != b,
            (ReadOutcome::Miss(_), ReadOutcome::Miss(_)) => false,
            _ => true,
        }
    }
}

/// A read's outcome plus every key it looked at.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Denormalized {
    pub outcome: ReadOutcome,
    pub dependencies: BTreeSet<IdentityKey>,
}

impl Denormalized {
    pub fn is_complete(&self) -> bool {
        self.outcome.is_complete()
    }

    pub fn data(&self) -> Option<&Value> {
        self.outcome.data()
    }

    /// Consume the read, keeping only the tree.
    pub fn into_data(self) -> Option<Value> {
        match self.outcome {
            ReadOutcome::Complete(value) => Some(value),
            ReadOutcome::Miss(_) => None,
        }
    }

    /// True if any of `keys` is among this read's dependencies.
    pub fn depends_on_any(&self, keys: &BTreeSet<IdentityKey>) -> bool {
        if self.dependencies.len() <= keys.len() {
            self.dependencies.iter().any(|k| keys.contains(k))
        } else {
            keys.iter().any(|k| self.dependencies.contains(k))
        }
    }
}
