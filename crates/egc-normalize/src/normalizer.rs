use serde_json::{Map, Value};
use tracing::debug;

use egc_identity::IdentityResolver;
use egc_store::{merge_value, WriteBatch};
use egc_types::{
    FieldKind, FieldValue, IdentityKey, Operation, Record, Reference, Schema, SelectionSet,
    TypeDescriptor, TypeError, Variables, TYPENAME_FIELD,
};

use crate::error::{json_kind, NormalizeError, NormalizeResult};

/// Output of one normalization pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Normalized {
    /// What the root of the tree became: a reference if it had identity,
    /// otherwise the inline object.
    pub root: FieldValue,
    /// Records to write, one per identity key.
    pub batch: WriteBatch,
}

/// Flattens response trees into record batches.
///
/// Borrowing the schema and resolver keeps a normalizer cheap to build per
/// write; it holds no state between calls.
#[derive(Clone, Copy, Debug)]
pub struct Normalizer<'a> {
    schema: &'a Schema,
    resolver: &'a IdentityResolver,
}

impl<'a> Normalizer<'a> {
    pub fn new(schema: &'a Schema, resolver: &'a IdentityResolver) -> Self {
        Self { schema, resolver }
    }

    /// Normalize an object tree of type `type_name`.
    pub fn normalize(
        &self,
        tree: &Value,
        type_name: &str,
        selection: &SelectionSet,
        variables: &Variables,
    ) -> NormalizeResult<Normalized> {
        let descriptor = self.schema.type_for(type_name)?;
        let object = expect_object(tree, "$", type_name)?;
        let mut batch = WriteBatch::new();
        let root = self.normalize_object(object, descriptor, selection, variables, "$", &mut batch)?;
        debug!(type_name, records = batch.len(), "tree normalized");
        Ok(Normalized { root, batch })
    }

    /// Normalize an operation result onto its fixed root record.
    ///
    /// Root fields are stored on `root_key` (e.g. `ROOT_QUERY`) under their
    /// storage names, so the same field with the same arguments always lands
    /// in the same place.
    pub fn normalize_operation(
        &self,
        root_key: &IdentityKey,
        operation: &Operation,
        variables: &Variables,
        data: &Value,
    ) -> NormalizeResult<Normalized> {
        let descriptor = self.schema.root_type(operation.kind)?;
        let normalized =
            self.normalize_at(root_key, data, &descriptor.name, &operation.selection, variables)?;
        debug!(
            operation = operation.label(),
            kind = %operation.kind,
            records = normalized.batch.len(),
            "operation normalized"
        );
        Ok(normalized)
    }

    /// Normalize `tree` and store its top-level fields under `key`, whatever
    /// identity the resolver would have given it.
    pub fn normalize_at(
        &self,
        key: &IdentityKey,
        tree: &Value,
        type_name: &str,
        selection: &SelectionSet,
        variables: &Variables,
    ) -> NormalizeResult<Normalized> {
        let descriptor = self.schema.type_for(type_name)?;
        let object = expect_object(tree, "$", type_name)?;
        let mut batch = WriteBatch::new();
        let record = self.normalize_fields(object, descriptor, selection, variables, "$", &mut batch)?;
        batch.put(key.clone(), record);
        Ok(Normalized {
            root: FieldValue::Reference(Reference::new(key.clone())),
            batch,
        })
    }

    fn normalize_object(
        &self,
        object: &Map<String, Value>,
        descriptor: &TypeDescriptor,
        selection: &SelectionSet,
        variables: &Variables,
        path: &str,
        batch: &mut WriteBatch,
    ) -> NormalizeResult<FieldValue> {
        let record = self.normalize_fields(object, descriptor, selection, variables, path, batch)?;
        match self.resolver.resolve(object, descriptor) {
            Some(key) => {
                batch.put(key.clone(), record);
                Ok(FieldValue::Reference(Reference::new(key)))
            }
            None => Ok(FieldValue::Object(record)),
        }
    }

    fn normalize_fields(
        &self,
        object: &Map<String, Value>,
        descriptor: &TypeDescriptor,
        selection: &SelectionSet,
        variables: &Variables,
        path: &str,
        batch: &mut WriteBatch,
    ) -> NormalizeResult<Record> {
        let mut record = Record::new();
        let typename = object
            .get(TYPENAME_FIELD)
            .and_then(Value::as_str)
            .unwrap_or(&descriptor.name);
        record.insert(TYPENAME_FIELD, FieldValue::Scalar(Value::String(typename.to_string())));

        for field in selection.iter() {
            let kind = descriptor
                .field_kind(&field.name)
                .ok_or_else(|| TypeError::UnknownField {
                    type_name: descriptor.name.clone(),
                    field: field.name.clone(),
                })?;
            if kind.named_type().is_some() && field.selection.is_none() {
                return Err(TypeError::MissingSelection {
                    type_name: descriptor.name.clone(),
                    field: field.name.clone(),
                }
                .into());
            }

            // Absent stays absent; only present values (null included) are stored.
            let Some(value) = object.get(field.response_key()) else {
                continue;
            };

            let storage = field.storage_key(variables)?;
            let child_path = format!("{path}.{}", field.response_key());
            let normalized = self.normalize_value(
                value,
                kind,
                field.selection.as_ref(),
                variables,
                &child_path,
                batch,
            )?;
            match record.get_mut(&storage) {
                Some(current) => {
                    merge_value(current, normalized);
                }
                None => {
                    record.insert(storage, normalized);
                }
            }
        }

        Ok(record)
    }

    fn normalize_value(
        &self,
        value: &Value,
        kind: &FieldKind,
        selection: Option<&SelectionSet>,
        variables: &Variables,
        path: &str,
        batch: &mut WriteBatch,
    ) -> NormalizeResult<FieldValue> {
        match (kind, value) {
            (_, Value::Null) => Ok(FieldValue::null()),
            (FieldKind::Scalar, value) => Ok(FieldValue::Scalar(value.clone())),
            (FieldKind::List(item), Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, element) in items.iter().enumerate() {
                    let element_path = format!("{path}[{index}]");
                    out.push(self.normalize_value(
                        element,
                        item,
                        selection,
                        variables,
                        &element_path,
                        batch,
                    )?);
                }
                Ok(FieldValue::List(out))
            }
            (FieldKind::List(_), other) => Err(NormalizeError::ExpectedList {
                path: path.to_string(),
                found: json_kind(other),
            }),
            (FieldKind::Object(type_name), Value::Object(object)) => {
                let descriptor = self.schema.type_for(type_name)?;
                let empty = SelectionSet::new();
                let selection = selection.unwrap_or(&empty);
                self.normalize_object(object, descriptor, selection, variables, path, batch)
            }
            (FieldKind::Object(type_name), other) => Err(NormalizeError::ExpectedObject {
                path: path.to_string(),
                type_name: type_name.clone(),
                found: json_kind(other),
            }),
        }
    }
}

fn expect_object<'v>(value: &'v Value, path: &str, type_name: &str) -> NormalizeResult<&'v Map<String, Value>> {
    value.as_object().ok_or_else(|| NormalizeError::ExpectedObject {
        path: path.to_string(),
        type_name: type_name.to_string(),
        found: json_kind(value),
    })
}
