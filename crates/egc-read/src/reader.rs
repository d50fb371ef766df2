use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::debug;

use egc_store::RecordSource;
use egc_types::{
    FieldKind, FieldValue, IdentityKey, Operation, Record, Schema, SelectionSet, TypeDescriptor,
    TypeError, Variables, TYPENAME_FIELD,
};

use crate::error::ReadResult;
use crate::outcome::{Denormalized, MissReason, MissingField, ReadOutcome};

/// Rebuilds response trees from stored records.
#[derive(Clone, Copy, Debug)]
pub struct Reader<'a> {
    schema: &'a Schema,
}

/// Per-read bookkeeping: keys looked at and paths that came up empty.
struct Walk<'s> {
    source: &'s dyn RecordSource,
    variables: &'s Variables,
    dependencies: BTreeSet<IdentityKey>,
    missing: Vec<MissingField>,
}

impl<'s> Walk<'s> {
    fn lookup(&mut self, key: &IdentityKey, path: &str) -> Option<&'s Record> {
        self.dependencies.insert(key.clone());
        let record = self.source.record(key);
        if record.is_none() {
            self.miss(path, MissReason::DanglingReference { key: key.clone() });
        }
        record
    }

    fn miss(&mut self, path: &str, reason: MissReason) {
        self.missing.push(MissingField {
            path: path.to_string(),
            reason,
        });
    }
}

impl<'a> Reader<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Read `selection` starting at the record `root` of type `type_name`.
    ///
    /// `source` should be a single consistent view of the store (e.g. a
    /// [`StoreView`](egc_store::StoreView)) held for the whole call.
    pub fn read(
        &self,
        source: &dyn RecordSource,
        root: &IdentityKey,
        type_name: &str,
        selection: &SelectionSet,
        variables: &Variables,
    ) -> ReadResult<Denormalized> {
        let descriptor = self.schema.type_for(type_name)?;
        let mut walk = Walk {
            source,
            variables,
            dependencies: BTreeSet::new(),
            missing: Vec::new(),
        };

        let tree = match walk.lookup(root, "$") {
            Some(record) => self.read_fields(&mut walk, record, descriptor, selection, "$")?,
            None => None,
        };

        let outcome = match tree {
            Some(tree) if walk.missing.is_empty() => ReadOutcome::Complete(tree),
            _ => ReadOutcome::Miss(walk.missing),
        };
        debug!(
            root = %root,
            complete = outcome.is_complete(),
            dependencies = walk.dependencies.len(),
            "tree read"
        );
        Ok(Denormalized {
            outcome,
            dependencies: walk.dependencies,
        })
    }

    /// Read an operation's selection from its root record.
    pub fn read_operation(
        &self,
        source: &dyn RecordSource,
        root_key: &IdentityKey,
        operation: &Operation,
        variables: &Variables,
    ) -> ReadResult<Denormalized> {
        let descriptor = self.schema.root_type(operation.kind)?;
        self.read(source, root_key, &descriptor.name, &operation.selection, variables)
    }

    /// Read the selected fields of one record. `None` means something below
    /// was missing; the walk keeps going so every miss is reported.
    fn read_fields(
        &self,
        walk: &mut Walk<'_>,
        record: &Record,
        descriptor: &TypeDescriptor,
        selection: &SelectionSet,
        path: &str,
    ) -> ReadResult<Option<Value>> {
        let mut out = Map::new();
        let mut complete = true;

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

            let response_key = field.response_key();
            let storage = field.storage_key(walk.variables)?;
            let child_path = format!("{path}.{response_key}");

            let stored = match record.get(&storage) {
                Some(stored) => stored,
                None if field.name == TYPENAME_FIELD => {
                    out.insert(response_key.to_string(), Value::String(descriptor.name.clone()));
                    continue;
                }
                None => {
                    walk.miss(&child_path, MissReason::MissingField { field: storage });
                    complete = false;
                    continue;
                }
            };

            match self.read_value(walk, stored, kind, field.selection.as_ref(), &child_path)? {
                Some(value) => {
                    out.insert(response_key.to_string(), value);
                }
                None => complete = false,
            }
        }

        Ok(complete.then_some(Value::Object(out)))
    }

    fn read_value(
        &self,
        walk: &mut Walk<'_>,
        stored: &FieldValue,
        kind: &FieldKind,
        selection: Option<&SelectionSet>,
        path: &str,
    ) -> ReadResult<Option<Value>> {
        match stored {
            FieldValue::Scalar(value) => Ok(Some(value.clone())),
            FieldValue::List(items) => {
                let item_kind = match kind {
                    FieldKind::List(inner) => inner.as_ref(),
                    other => other,
                };
                let mut out = Vec::with_capacity(items.len());
                let mut complete = true;
                for (index, item) in items.iter().enumerate() {
                    let item_path = format!("{path}[{index}]");
                    match self.read_value(walk, item, item_kind, selection, &item_path)? {
                        Some(value) => out.push(value),
                        None => complete = false,
                    }
                }
                Ok(complete.then_some(Value::Array(out)))
            }
            FieldValue::Reference(reference) => match walk.lookup(reference.key(), path) {
                Some(record) => self.read_nested(walk, record, kind, selection, path),
                None => Ok(None),
            },
            FieldValue::Object(record) => self.read_nested(walk, record, kind, selection, path),
        }
    }

    fn read_nested(
        &self,
        walk: &mut Walk<'_>,
        record: &Record,
        kind: &FieldKind,
        selection: Option<&SelectionSet>,
        path: &str,
    ) -> ReadResult<Option<Value>> {
        match (kind.named_type(), selection) {
            (Some(type_name), Some(selection)) => {
                let descriptor = self.schema.type_for(type_name)?;
                self.read_fields(walk, record, descriptor, selection, path)
            }
            // A scalar slot that somehow holds a record reads back as stored.
            _ => Ok(Some(record.to_json())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egc_identity::{CompositeRule, IdentityPolicy, IdentityResolver};
    use egc_normalize::Normalizer;
    use egc_store::{InMemoryRecordStore, RecordStore, WriteBatch};
    use egc_types::{ArgValue, FieldSelection};
    use serde_json::json;
    use std::collections::HashMap;

    fn schema() -> Schema {
        Schema::new("Query")
            .with_type(
                TypeDescriptor::new("Query")
                    .list_of("people", "Person")
                    .object("person", "Person"),
            )
            .with_type(
                TypeDescriptor::new("Person")
                    .scalar("id")
                    .scalar("meta")
                    .object("name", "Name")
                    .object("best", "Cat")
                    .list_of("cats", "Cat"),
            )
            .with_type(TypeDescriptor::new("Name").scalar("fieldKey").scalar("ownerId").scalar("value"))
            .with_type(TypeDescriptor::new("Cat").scalar("id").scalar("name"))
    }

    fn resolver() -> IdentityResolver {
        IdentityResolver::new(
            IdentityPolicy::default().with_rule(CompositeRule::new(["ownerId", "fieldKey"])),
        )
    }

    fn people_query() -> Operation {
        Operation::query(SelectionSet::new().with(
            FieldSelection::new("people").select(
                SelectionSet::new()
                    .field("id")
                    .with(FieldSelection::new("name").select(SelectionSet::new().field("value")))
                    .with(FieldSelection::new("cats").select(SelectionSet::new().field("name"))),
            ),
        ))
    }

    fn write(store: &InMemoryRecordStore, op: &Operation, vars: &Variables, data: &Value) {
        let schema = schema();
        let resolver = resolver();
        let normalized = Normalizer::new(&schema, &resolver)
            .normalize_operation(&"ROOT_QUERY".into(), op, vars, data)
            .unwrap();
        store.write(normalized.batch).unwrap();
    }

    fn read(store: &InMemoryRecordStore, op: &Operation, vars: &Variables) -> Denormalized {
        let schema = schema();
        let view = store.read_view().unwrap();
        Reader::new(&schema)
            .read_operation(&view, &"ROOT_QUERY".into(), op, vars)
            .unwrap()
    }

    fn people_data() -> Value {
        json!({
            "people": [
                {
                    "id": "1",
                    "name": { "value": "John", "fieldKey": "name", "ownerId": 1 },
                    "cats": [ { "id": 7, "name": "charlie" }, { "name": "stray" } ]
                },
                { "id": "2", "name": null, "cats": [] }
            ]
        })
    }

    #[test]
    fn round_trip_reproduces_selected_fields() {
        let store = InMemoryRecordStore::new();
        let op = people_query();
        write(&store, &op, &Variables::new(), &people_data());

        let read = read(&store, &op, &Variables::new());
        assert_eq!(
            read.data(),
            Some(&json!({
                "people": [
                    {
                        "id": "1",
                        "name": { "value": "John" },
                        "cats": [ { "name": "charlie" }, { "name": "stray" } ]
                    },
                    { "id": "2", "name": null, "cats": [] }
                ]
            }))
        );
        let deps: Vec<&str> = read.dependencies.iter().map(IdentityKey::as_str).collect();
        assert_eq!(deps, vec!["1::name", "Cat:7", "Person:1", "Person:2", "ROOT_QUERY"]);
    }

    #[test]
    fn aliases_shape_the_output_not_the_lookup() {
        let store = InMemoryRecordStore::new();
        write(&store, &people_query(), &Variables::new(), &people_data());

        let op = Operation::query(SelectionSet::new().with(
            FieldSelection::new("people")
                .alias("everyone")
                .select(SelectionSet::new().with(FieldSelection::new("id").alias("key")).field("__typename")),
        ));
        let read = read(&store, &op, &Variables::new());
        assert_eq!(
            read.data(),
            Some(&json!({
                "everyone": [
                    { "key": "1", "__typename": "Person" },
                    { "key": "2", "__typename": "Person" }
                ]
            }))
        );
    }

    #[test]
    fn arguments_select_the_storage_field() {
        let store = InMemoryRecordStore::new();
        let op = Operation::query(SelectionSet::new().with(
            FieldSelection::new("person")
                .arg("id", ArgValue::var("id"))
                .select(SelectionSet::new().field("id")),
        ));
        let mut one = Variables::new();
        one.insert("id".into(), json!("1"));
        let mut two = Variables::new();
        two.insert("id".into(), json!("2"));

        write(&store, &op, &one, &json!({ "person": { "id": "1" } }));
        assert_eq!(read(&store, &op, &one).data(), Some(&json!({ "person": { "id": "1" } })));
        assert!(read(&store, &op, &two).outcome.is_miss());
    }

    #[test]
    fn unselected_fields_are_a_miss_listing_every_path() {
        let store = InMemoryRecordStore::new();
        write(&store, &people_query(), &Variables::new(), &people_data());

        let op = Operation::query(SelectionSet::new().with(
            FieldSelection::new("people").select(SelectionSet::new().field("id").field("meta")),
        ));
        let read = read(&store, &op, &Variables::new());
        let paths: Vec<&str> = read.outcome.missing().iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["$.people[0].meta", "$.people[1].meta"]);
        assert!(read.dependencies.contains(&IdentityKey::from("Person:2")));
    }

    #[test]
    fn empty_store_misses_at_the_root() {
        let store = InMemoryRecordStore::new();
        let read = read(&store, &people_query(), &Variables::new());
        assert_eq!(
            read.outcome,
            ReadOutcome::Miss(vec![MissingField {
                path: "$".into(),
                reason: MissReason::DanglingReference { key: "ROOT_QUERY".into() },
            }])
        );
        assert!(read.dependencies.contains(&IdentityKey::from("ROOT_QUERY")));
    }

    #[test]
    fn dangling_reference_is_a_miss_then_resolves() {
        let mut records: HashMap<IdentityKey, Record> = HashMap::new();
        records.insert(
            "ROOT_QUERY".into(),
            Record::new().with("person", FieldValue::reference("Person:9")),
        );
        let schema = schema();
        let op = Operation::query(
            SelectionSet::new().with(FieldSelection::new("person").select(SelectionSet::new().field("id"))),
        );

        let read = Reader::new(&schema)
            .read_operation(&records, &"ROOT_QUERY".into(), &op, &Variables::new())
            .unwrap();
        assert_eq!(
            read.outcome.missing()[0].reason,
            MissReason::DanglingReference { key: "Person:9".into() }
        );
        assert!(read.dependencies.contains(&IdentityKey::from("Person:9")));

        records.insert("Person:9".into(), Record::new().with("id", json!(9)));
        let read = Reader::new(&schema)
            .read_operation(&records, &"ROOT_QUERY".into(), &op, &Variables::new())
            .unwrap();
        assert_eq!(read.data(), Some(&json!({ "person": { "id": 9 } })));
    }

    #[test]
    fn typename_falls_back_to_the_declared_type() {
        let mut batch = WriteBatch::new();
        batch.put("Person:1".into(), Record::new().with("id", json!(1)));
        let schema = schema();
        let read = Reader::new(&schema)
            .read(
                &batch,
                &"Person:1".into(),
                "Person",
                &SelectionSet::new().field("__typename").field("id"),
                &Variables::new(),
            )
            .unwrap();
        assert_eq!(read.data(), Some(&json!({ "__typename": "Person", "id": 1 })));
    }

    #[test]
    fn scalar_objects_come_back_verbatim() {
        let store = InMemoryRecordStore::new();
        let op = Operation::query(SelectionSet::new().with(
            FieldSelection::new("person").select(SelectionSet::new().field("id").field("meta")),
        ));
        let data = json!({ "person": { "id": 1, "meta": { "tags": ["a"], "id": 3 } } });
        write(&store, &op, &Variables::new(), &data);
        assert_eq!(read(&store, &op, &Variables::new()).data(), Some(&data));
    }

    #[test]
    fn unknown_field_in_read_is_an_error() {
        let store = InMemoryRecordStore::new();
        write(&store, &people_query(), &Variables::new(), &people_data());
        let schema = schema();
        let view = store.read_view().unwrap();
        let op = Operation::query(SelectionSet::new().field("nope"));
        let err = Reader::new(&schema)
            .read_operation(&view, &"ROOT_QUERY".into(), &op, &Variables::new())
            .unwrap_err();
        assert!(matches!(err, crate::ReadError::Type(TypeError::UnknownField { .. })));
    }
}
