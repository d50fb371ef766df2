use thiserror::Error;

/// Errors produced by schema and selection operations.
///
/// Every variant describes a setup-time misconfiguration: an unknown type, a
/// field the schema does not declare, or a variable the caller never supplied.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown type: {0}")]
    UnknownType(String),

    #[error("type {type_name} has no field {field}")]
    UnknownField { type_name: String, field: String },

    #[error("field {type_name}.{field} is an object and needs a selection set")]
    MissingSelection { type_name: String, field: String },

    #[error("field {type_name}.{field} is a scalar and cannot take a selection set")]
    UnexpectedSelection { type_name: String, field: String },

    #[error("variable ${0} was not provided")]
    UndefinedVariable(String),

    #[error("schema has no {0} root type")]
    MissingRootType(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for type operations.
pub type TypeResult<T> = Result<T, TypeError>;
