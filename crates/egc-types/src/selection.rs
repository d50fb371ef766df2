//! Requested shapes: operations, selection sets, and argument handling.
//!
//! A selection set names the fields a caller wants, the way a GraphQL
//! document does. The cache uses it both to drive normalization (which
//! fields of the response to store, under which storage names) and to drive
//! reads (which fields to reconstruct).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{TypeError, TypeResult};

/// Variables supplied alongside an operation.
pub type Variables = Map<String, Value>;

/// Whether an operation reads or writes on the collaborator's side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Query,
    Mutation,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Query => f.write_str("query"),
            OperationKind::Mutation => f.write_str("mutation"),
        }
    }
}

/// A named or anonymous query/mutation with its root selection set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub selection: SelectionSet,
}

impl Operation {
    pub fn query(selection: SelectionSet) -> Self {
        Self {
            kind: OperationKind::Query,
            name: None,
            selection,
        }
    }

    pub fn mutation(selection: SelectionSet) -> Self {
        Self {
            kind: OperationKind::Mutation,
            name: None,
            selection,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Display label for logs.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

/// Ordered list of field selections on one object type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionSet {
    fields: Vec<FieldSelection>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plain field with no alias, arguments or sub-selection.
    pub fn field(self, name: impl Into<String>) -> Self {
        self.with(FieldSelection::new(name))
    }

    pub fn with(mut self, field: FieldSelection) -> Self {
        self.fields.push(field);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSelection> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One selected field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSelection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, ArgValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionSet>,
}

impl FieldSelection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            args: BTreeMap::new(),
            selection: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn arg(mut self, name: impl Into<String>, value: ArgValue) -> Self {
        self.args.insert(name.into(), value);
        self
    }

    pub fn select(mut self, selection: SelectionSet) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Key under which this field appears in response trees.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Key under which this field is stored in a record.
    ///
    /// Fields without arguments are stored under their name. Fields with
    /// arguments are stored as `name({...})`, the arguments rendered as
    /// compact JSON with sorted keys and variables substituted, so the same
    /// arguments always land on the same storage field.
    pub fn storage_key(&self, variables: &Variables) -> TypeResult<String> {
        if self.args.is_empty() {
            return Ok(self.name.clone());
        }
        let mut resolved = Map::new();
        for (name, value) in &self.args {
            resolved.insert(name.clone(), value.resolve(variables)?);
        }
        let rendered = serde_json::to_string(&Value::Object(resolved))
            .map_err(|e| TypeError::Serialization(e.to_string()))?;
        Ok(format!("{}({rendered})", self.name))
    }
}

/// Argument value: a literal or a reference to an operation variable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgValue {
    Var(String),
    Literal(Value),
}

impl ArgValue {
    pub fn var(name: impl Into<String>) -> Self {
        ArgValue::Var(name.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        ArgValue::Literal(value.into())
    }

    pub fn resolve(&self, variables: &Variables) -> TypeResult<Value> {
        match self {
            ArgValue::Literal(value) => Ok(value.clone()),
            ArgValue::Var(name) => variables
                .get(name)
                .cloned()
                .ok_or_else(|| TypeError::UndefinedVariable(name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: Value) -> Variables {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn plain_field_storage_key_is_name() {
        let field = FieldSelection::new("people").alias("everyone");
        assert_eq!(field.storage_key(&Variables::new()).unwrap(), "people");
        assert_eq!(field.response_key(), "everyone");
    }

    #[test]
    fn storage_key_substitutes_variables() {
        let field = FieldSelection::new("updatePerson")
            .arg("id", ArgValue::var("id"))
            .arg("name", ArgValue::literal("Sara"));
        let key = field.storage_key(&vars(json!({ "id": "2" }))).unwrap();
        assert_eq!(key, r#"updatePerson({"id":"2","name":"Sara"})"#);
    }

    #[test]
    fn storage_key_is_independent_of_argument_order() {
        let a = FieldSelection::new("f")
            .arg("b", ArgValue::literal(1))
            .arg("a", ArgValue::literal(json!({ "y": 1, "x": 2 })));
        let b = FieldSelection::new("f")
            .arg("a", ArgValue::literal(json!({ "x": 2, "y": 1 })))
            .arg("b", ArgValue::literal(1));
        let none = Variables::new();
        assert_eq!(a.storage_key(&none).unwrap(), b.storage_key(&none).unwrap());
    }

    #[test]
    fn missing_variable_is_an_error() {
        let field = FieldSelection::new("person").arg("id", ArgValue::var("id"));
        assert_eq!(
            field.storage_key(&Variables::new()).unwrap_err(),
            TypeError::UndefinedVariable("id".into())
        );
    }

    #[test]
    fn operation_parses_from_json() {
        let op: Operation = serde_json::from_value(json!({
            "kind": "mutation",
            "name": "UpdateName",
            "selection": [
                {
                    "name": "updatePerson",
                    "args": { "id": { "var": "id" } },
                    "selection": [ { "name": "id" } ]
                }
            ]
        }))
        .unwrap();
        assert_eq!(op.kind, OperationKind::Mutation);
        assert_eq!(op.label(), "UpdateName");
        let field = op.selection.iter().next().unwrap();
        assert_eq!(field.args.get("id"), Some(&ArgValue::var("id")));
        assert_eq!(field.selection.as_ref().map(SelectionSet::len), Some(1));
    }
}
