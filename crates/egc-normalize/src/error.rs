use egc_types::TypeError;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while normalizing a response tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// The selection or schema is misconfigured.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// A field declared as an object held something else.
    #[error("expected {type_name} object at {path}, found {found}")]
    ExpectedObject {
        path: String,
        type_name: String,
        found: &'static str,
    },

    /// A field declared as a list held something else.
    #[error("expected list at {path}, found {found}")]
    ExpectedList { path: String, found: &'static str },
}

/// Convenience type alias for normalization.
pub type NormalizeResult<T> = Result<T, NormalizeError>;

/// Short JSON kind name used in error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
