//! Shape descriptors: static per-type metadata supplied at setup.
//!
//! A [`Schema`] registers one [`TypeDescriptor`] per object type. Each
//! descriptor lists the type's fields with their [`FieldKind`] and may declare
//! a [`KeySpec`] saying which fields carry the type's identity.
//!
//! Schemas load from TOML or JSON:
//!
//! ```toml
//! query_type = "Query"
//! mutation_type = "Mutation"
//!
//! [types.Query.fields]
//! people = { list = { object = "Person" } }
//!
//! [types.Person.fields]
//! id = "scalar"
//! name = { object = "Name" }
//!
//! [types.Name]
//! fields = { ownerId = "scalar", fieldKey = "scalar", value = "scalar" }
//! key = { strategy = "fields", fields = ["ownerId", "fieldKey"] }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};
use crate::selection::{Operation, OperationKind, SelectionSet};
use crate::TYPENAME_FIELD;

/// Separator used by composite keys unless a rule overrides it.
pub const DEFAULT_SEPARATOR: &str = "::";

static TYPENAME_KIND: FieldKind = FieldKind::Scalar;

/// Declared kind of a single field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Leaf value. Stored verbatim, even when the value is a JSON object.
    Scalar,
    /// Nested object of the named type; a reference candidate.
    Object(String),
    /// Ordered list of the inner kind.
    List(Box<FieldKind>),
}

impl FieldKind {
    pub fn object(type_name: impl Into<String>) -> Self {
        FieldKind::Object(type_name.into())
    }

    pub fn list(item: FieldKind) -> Self {
        FieldKind::List(Box::new(item))
    }

    /// The object type at the bottom of any list nesting.
    pub fn named_type(&self) -> Option<&str> {
        match self {
            FieldKind::Scalar => None,
            FieldKind::Object(name) => Some(name),
            FieldKind::List(inner) => inner.named_type(),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, FieldKind::List(_))
    }
}

/// How a type derives its identity key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum KeySpec {
    /// `<typename>:<id>` using the first present id field.
    TypenameId {
        #[serde(default = "default_id_fields")]
        id_fields: Vec<String>,
    },
    /// Declared fields joined by `separator`; typename is ignored.
    Fields {
        fields: Vec<String>,
        #[serde(default = "default_separator")]
        separator: String,
    },
    /// Never identified: always stored inline in the parent.
    Inline,
}

impl KeySpec {
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        KeySpec::Fields {
            fields: fields.into_iter().map(Into::into).collect(),
            separator: default_separator(),
        }
    }

    /// Field names this key strategy reads.
    pub fn key_fields(&self) -> &[String] {
        match self {
            KeySpec::TypenameId { id_fields } => id_fields,
            KeySpec::Fields { fields, .. } => fields,
            KeySpec::Inline => &[],
        }
    }
}

pub fn default_id_fields() -> Vec<String> {
    vec!["id".to_string(), "_id".to_string()]
}

pub fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

/// Static metadata for one object type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub name: String,
    pub fields: BTreeMap<String, FieldKind>,
    pub key: Option<KeySpec>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
            key: None,
        }
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.insert(name.into(), kind);
        self
    }

    pub fn scalar(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::Scalar)
    }

    pub fn object(self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.field(name, FieldKind::object(type_name))
    }

    pub fn list_of(self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.field(name, FieldKind::list(FieldKind::object(type_name)))
    }

    pub fn keyed_by(mut self, key: KeySpec) -> Self {
        self.key = Some(key);
        self
    }

    /// Kind of a field, treating `__typename` as an implicit scalar.
    pub fn field_kind(&self, field: &str) -> Option<&FieldKind> {
        if field == TYPENAME_FIELD {
            return Some(&TYPENAME_KIND);
        }
        self.fields.get(field)
    }
}

/// Registry of type descriptors plus the operation root types.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SchemaDocument", into = "SchemaDocument")]
pub struct Schema {
    query_type: String,
    mutation_type: Option<String>,
    types: BTreeMap<String, TypeDescriptor>,
}

impl Schema {
    pub fn new(query_type: impl Into<String>) -> Self {
        Self {
            query_type: query_type.into(),
            mutation_type: None,
            types: BTreeMap::new(),
        }
    }

    pub fn with_mutation_type(mut self, name: impl Into<String>) -> Self {
        self.mutation_type = Some(name.into());
        self
    }

    pub fn with_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.types.insert(descriptor.name.clone(), descriptor);
        self
    }

    pub fn from_toml_str(text: &str) -> TypeResult<Self> {
        toml::from_str(text).map_err(|e| TypeError::Parse(e.to_string()))
    }

    pub fn from_json_str(text: &str) -> TypeResult<Self> {
        serde_json::from_str(text).map_err(|e| TypeError::Parse(e.to_string()))
    }

    pub fn query_type(&self) -> &str {
        &self.query_type
    }

    pub fn mutation_type(&self) -> Option<&str> {
        self.mutation_type.as_deref()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }

    pub fn get(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.types.get(type_name)
    }

    /// Look up a type, failing on unknown names.
    pub fn type_for(&self, type_name: &str) -> TypeResult<&TypeDescriptor> {
        self.types
            .get(type_name)
            .ok_or_else(|| TypeError::UnknownType(type_name.to_string()))
    }

    /// Root type descriptor for an operation kind.
    pub fn root_type(&self, kind: OperationKind) -> TypeResult<&TypeDescriptor> {
        match kind {
            OperationKind::Query => self.type_for(&self.query_type),
            OperationKind::Mutation => {
                let name = self
                    .mutation_type
                    .as_deref()
                    .ok_or_else(|| TypeError::MissingRootType("mutation".into()))?;
                self.type_for(name)
            }
        }
    }

    /// Kind of `type_name.field`, failing on unknown types or fields.
    pub fn field_kind(&self, type_name: &str, field: &str) -> TypeResult<&FieldKind> {
        self.type_for(type_name)?
            .field_kind(field)
            .ok_or_else(|| TypeError::UnknownField {
                type_name: type_name.to_string(),
                field: field.to_string(),
            })
    }

    /// Check internal consistency: root types exist, every object kind names
    /// a registered type, and key specs only use declared fields.
    pub fn validate(&self) -> TypeResult<()> {
        self.type_for(&self.query_type)?;
        if let Some(mutation) = &self.mutation_type {
            self.type_for(mutation)?;
        }
        for descriptor in self.types.values() {
            if descriptor.name.is_empty() {
                return Err(TypeError::InvalidSchema("empty type name".into()));
            }
            for (field, kind) in &descriptor.fields {
                if let Some(target) = kind.named_type() {
                    if !self.types.contains_key(target) {
                        return Err(TypeError::InvalidSchema(format!(
                            "{}.{field} refers to unknown type {target}",
                            descriptor.name
                        )));
                    }
                }
            }
            if let Some(key) = &descriptor.key {
                if matches!(key, KeySpec::Fields { fields, .. } if fields.is_empty()) {
                    return Err(TypeError::InvalidSchema(format!(
                        "{} declares a composite key with no fields",
                        descriptor.name
                    )));
                }
                for field in key.key_fields() {
                    if descriptor.field_kind(field).is_none() {
                        return Err(TypeError::UnknownField {
                            type_name: descriptor.name.clone(),
                            field: field.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Check a selection set against `type_name`, recursively.
    pub fn validate_selection(&self, type_name: &str, selection: &SelectionSet) -> TypeResult<()> {
        for field in selection.iter() {
            let kind = self.field_kind(type_name, &field.name)?;
            match (kind.named_type(), &field.selection) {
                (Some(target), Some(nested)) => self.validate_selection(target, nested)?,
                (Some(_), None) => {
                    return Err(TypeError::MissingSelection {
                        type_name: type_name.to_string(),
                        field: field.name.clone(),
                    })
                }
                (None, Some(_)) => {
                    return Err(TypeError::UnexpectedSelection {
                        type_name: type_name.to_string(),
                        field: field.name.clone(),
                    })
                }
                (None, None) => {}
            }
        }
        Ok(())
    }

    pub fn validate_operation(&self, operation: &Operation) -> TypeResult<()> {
        let root = self.root_type(operation.kind)?;
        self.validate_selection(&root.name, &operation.selection)
    }
}

#[derive(Serialize, Deserialize)]
struct SchemaDocument {
    #[serde(default = "default_query_type")]
    query_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mutation_type: Option<String>,
    #[serde(default)]
    types: BTreeMap<String, TypeDocument>,
}

#[derive(Serialize, Deserialize)]
struct TypeDocument {
    #[serde(default)]
    fields: BTreeMap<String, FieldKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<KeySpec>,
}

fn default_query_type() -> String {
    "Query".to_string()
}

impl TryFrom<SchemaDocument> for Schema {
    type Error = TypeError;

    fn try_from(doc: SchemaDocument) -> TypeResult<Self> {
        let types = doc
            .types
            .into_iter()
            .map(|(name, ty)| {
                let descriptor = TypeDescriptor {
                    name: name.clone(),
                    fields: ty.fields,
                    key: ty.key,
                };
                (name, descriptor)
            })
            .collect();
        let schema = Schema {
            query_type: doc.query_type,
            mutation_type: doc.mutation_type,
            types,
        };
        schema.validate()?;
        Ok(schema)
    }
}

impl From<Schema> for SchemaDocument {
    fn from(schema: Schema) -> Self {
        SchemaDocument {
            query_type: schema.query_type,
            mutation_type: schema.mutation_type,
            types: schema
                .types
                .into_iter()
                .map(|(name, descriptor)| {
                    (
                        name,
                        TypeDocument {
                            fields: descriptor.fields,
                            key: descriptor.key,
                        },
                    )
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{FieldSelection, SelectionSet};

    const PEOPLE_SCHEMA: &str = r#"
query_type = "Query"
mutation_type = "Mutation"

[types.Query.fields]
people = { list = { object = "Person" } }

[types.Mutation.fields]
updatePerson = { object = "Person" }

[types.Person.fields]
id = "scalar"
name = { object = "Name" }

[types.Name]
fields = { ownerId = "scalar", fieldKey = "scalar", value = "scalar" }
key = { strategy = "fields", fields = ["ownerId", "fieldKey"] }
"#;

    #[test]
    fn parses_toml_schema() {
        let schema = Schema::from_toml_str(PEOPLE_SCHEMA).unwrap();
        assert_eq!(schema.query_type(), "Query");
        assert_eq!(schema.mutation_type(), Some("Mutation"));
        assert_eq!(schema.len(), 4);
        assert_eq!(
            schema.field_kind("Query", "people").unwrap(),
            &FieldKind::list(FieldKind::object("Person"))
        );
        let name = schema.type_for("Name").unwrap();
        assert_eq!(name.key, Some(KeySpec::fields(["ownerId", "fieldKey"])));
    }

    #[test]
    fn json_roundtrip() {
        let schema = Schema::from_toml_str(PEOPLE_SCHEMA).unwrap();
        let json = serde_json::to_string(&schema).unwrap();
        let parsed = Schema::from_json_str(&json).unwrap();
        assert_eq!(parsed, schema);
    }

    #[test]
    fn typename_is_implicit_scalar() {
        let schema = Schema::from_toml_str(PEOPLE_SCHEMA).unwrap();
        assert_eq!(schema.field_kind("Person", "__typename").unwrap(), &FieldKind::Scalar);
    }

    #[test]
    fn unknown_field_is_an_error() {
        let schema = Schema::from_toml_str(PEOPLE_SCHEMA).unwrap();
        let err = schema.field_kind("Person", "age").unwrap_err();
        assert_eq!(
            err,
            TypeError::UnknownField {
                type_name: "Person".into(),
                field: "age".into()
            }
        );
    }

    #[test]
    fn dangling_object_kind_fails_validation() {
        let schema = Schema::new("Query")
            .with_type(TypeDescriptor::new("Query").object("me", "Person"));
        assert!(matches!(schema.validate(), Err(TypeError::InvalidSchema(_))));
    }

    #[test]
    fn key_on_undeclared_field_fails_validation() {
        let schema = Schema::new("Query").with_type(
            TypeDescriptor::new("Query")
                .scalar("value")
                .keyed_by(KeySpec::fields(["ownerId"])),
        );
        assert!(matches!(schema.validate(), Err(TypeError::UnknownField { .. })));
    }

    #[test]
    fn missing_root_type_fails_validation() {
        let schema = Schema::new("Query");
        assert_eq!(schema.validate(), Err(TypeError::UnknownType("Query".into())));
    }

    #[test]
    fn invalid_toml_reports_parse_error() {
        let err = Schema::from_toml_str("[types.Query.fields]\nx = { object = \"Nope\" }\n").unwrap_err();
        assert!(matches!(err, TypeError::Parse(_)));
    }

    #[test]
    fn selection_validation() {
        let schema = Schema::from_toml_str(PEOPLE_SCHEMA).unwrap();
        let good = SelectionSet::new().with(
            FieldSelection::new("people").select(
                SelectionSet::new()
                    .field("id")
                    .with(FieldSelection::new("name").select(SelectionSet::new().field("value"))),
            ),
        );
        schema.validate_selection("Query", &good).unwrap();

        let missing = SelectionSet::new().field("people");
        assert!(matches!(
            schema.validate_selection("Query", &missing),
            Err(TypeError::MissingSelection { .. })
        ));

        let unexpected = SelectionSet::new().with(
            FieldSelection::new("people").select(
                SelectionSet::new().with(FieldSelection::new("id").select(SelectionSet::new().field("x"))),
            ),
        );
        assert!(matches!(
            schema.validate_selection("Query", &unexpected),
            Err(TypeError::UnexpectedSelection { .. })
        ));
    }

    #[test]
    fn mutation_root_required_for_mutations() {
        let schema = Schema::new("Query").with_type(TypeDescriptor::new("Query").scalar("ok"));
        assert_eq!(
            schema.root_type(OperationKind::Mutation).unwrap_err(),
            TypeError::MissingRootType("mutation".into())
        );
    }
}
