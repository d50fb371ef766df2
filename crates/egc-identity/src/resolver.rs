use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use egc_types::{IdentityKey, KeySpec, TypeDescriptor, TYPENAME_FIELD};

use crate::policy::IdentityPolicy;

/// Custom key derivation for one type. Returning `None` stores the object
/// inline.
pub type IdentityFn =
    Arc<dyn Fn(&Map<String, Value>, &TypeDescriptor) -> Option<IdentityKey> + Send + Sync>;

/// Maps raw response objects to identity keys.
///
/// The resolver never mutates anything and holds no per-call state, so the
/// same object and descriptor always produce the same key.
#[derive(Clone, Default)]
pub struct IdentityResolver {
    policy: IdentityPolicy,
    custom: HashMap<String, IdentityFn>,
}

impl IdentityResolver {
    pub fn new(policy: IdentityPolicy) -> Self {
        Self {
            policy,
            custom: HashMap::new(),
        }
    }

    pub fn policy(&self) -> &IdentityPolicy {
        &self.policy
    }

    /// Register a custom key function for `type_name`, replacing any
    /// previous one. Custom functions take precedence over every other rule.
    pub fn register<F>(&mut self, type_name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&Map<String, Value>, &TypeDescriptor) -> Option<IdentityKey> + Send + Sync + 'static,
    {
        self.custom.insert(type_name.into(), Arc::new(f));
        self
    }

    /// Compute the identity key of `object`, or `None` if it has no identity.
    pub fn resolve(&self, object: &Map<String, Value>, descriptor: &TypeDescriptor) -> Option<IdentityKey> {
        if let Some(custom) = self.custom.get(&descriptor.name) {
            return custom(object, descriptor);
        }

        match &descriptor.key {
            Some(KeySpec::Inline) => return None,
            Some(KeySpec::Fields { fields, separator }) => {
                return compose(object, fields, separator);
            }
            Some(KeySpec::TypenameId { id_fields }) => {
                return typename_id(object, descriptor, id_fields);
            }
            None => {}
        }

        self.policy
            .composite
            .iter()
            .find_map(|rule| compose(object, &rule.fields, &rule.separator))
            .or_else(|| typename_id(object, descriptor, &self.policy.id_fields))
    }
}

impl fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut custom: Vec<&String> = self.custom.keys().collect();
        custom.sort();
        f.debug_struct("IdentityResolver")
            .field("policy", &self.policy)
            .field("custom", &custom)
            .finish()
    }
}

/// Render one key component. `null` counts as absent.
///
/// Strings are used verbatim, numbers and booleans by their display form,
/// and anything else as compact JSON.
pub fn render_component(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => serde_json::to_string(other).ok(),
    }
}

fn compose(object: &Map<String, Value>, fields: &[String], separator: &str) -> Option<IdentityKey> {
    if fields.is_empty() {
        return None;
    }
    let parts = fields
        .iter()
        .map(|field| object.get(field).and_then(render_component))
        .collect::<Option<Vec<String>>>()?;
    Some(IdentityKey::new(parts.join(separator)))
}

fn typename_id(
    object: &Map<String, Value>,
    descriptor: &TypeDescriptor,
    id_fields: &[String],
) -> Option<IdentityKey> {
    let typename = object
        .get(TYPENAME_FIELD)
        .and_then(Value::as_str)
        .unwrap_or(&descriptor.name);
    let id = id_fields
        .iter()
        .find_map(|field| object.get(field).and_then(render_component))?;
    Some(IdentityKey::typed(typename, &id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::CompositeRule;
    use proptest::prelude::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("fixture must be an object")
    }

    fn field_holder_resolver() -> IdentityResolver {
        IdentityResolver::new(
            IdentityPolicy::default().with_rule(CompositeRule::new(["ownerId", "fieldKey"])),
        )
    }

    #[test]
    fn default_policy_uses_typename_and_id() {
        let resolver = IdentityResolver::default();
        let person = TypeDescriptor::new("Person").scalar("id");
        let key = resolver.resolve(&obj(json!({ "__typename": "Person", "id": 1 })), &person);
        assert_eq!(key, Some(IdentityKey::from("Person:1")));
    }

    #[test]
    fn default_policy_falls_back_to_descriptor_name() {
        let resolver = IdentityResolver::default();
        let person = TypeDescriptor::new("Person").scalar("id");
        let key = resolver.resolve(&obj(json!({ "id": "7" })), &person);
        assert_eq!(key, Some(IdentityKey::from("Person:7")));
    }

    #[test]
    fn underscore_id_is_consulted_second() {
        let resolver = IdentityResolver::default();
        let doc = TypeDescriptor::new("Doc").scalar("_id");
        let key = resolver.resolve(&obj(json!({ "_id": "abc" })), &doc);
        assert_eq!(key, Some(IdentityKey::from("Doc:abc")));
    }

    #[test]
    fn no_id_means_no_identity() {
        let resolver = IdentityResolver::default();
        let cat = TypeDescriptor::new("Cat").scalar("name");
        assert_eq!(resolver.resolve(&obj(json!({ "name": "charlie" })), &cat), None);
    }

    #[test]
    fn null_id_means_no_identity() {
        let resolver = IdentityResolver::default();
        let person = TypeDescriptor::new("Person").scalar("id");
        assert_eq!(resolver.resolve(&obj(json!({ "id": null })), &person), None);
    }

    #[test]
    fn composite_rule_ignores_typename() {
        let resolver = field_holder_resolver();
        let name = TypeDescriptor::new("Name");
        let weight = TypeDescriptor::new("Weight");

        let a = resolver.resolve(
            &obj(json!({ "__typename": "Name", "ownerId": 1, "fieldKey": "name", "value": "John" })),
            &name,
        );
        let b = resolver.resolve(
            &obj(json!({ "__typename": "Weight", "ownerId": 1, "fieldKey": "weight", "value": 60 })),
            &weight,
        );
        assert_eq!(a, Some(IdentityKey::from("1::name")));
        assert_eq!(b, Some(IdentityKey::from("1::weight")));
    }

    #[test]
    fn full_and_partial_payloads_collapse_onto_one_key() {
        let resolver = field_holder_resolver();
        let cats = TypeDescriptor::new("PersonCats");
        let full = obj(json!({
            "ownerId": "3",
            "fieldKey": "cats",
            "value": { "cats": [ { "name": "whiskers", "lives": 8 } ] }
        }));
        let partial = obj(json!({ "ownerId": 3, "fieldKey": "cats" }));
        assert_eq!(resolver.resolve(&full, &cats), resolver.resolve(&partial, &cats));
        assert_eq!(resolver.resolve(&full, &cats), Some(IdentityKey::from("3::cats")));
    }

    #[test]
    fn composite_rule_wins_over_default() {
        let resolver = field_holder_resolver();
        let holder = TypeDescriptor::new("Name");
        let key = resolver.resolve(
            &obj(json!({ "__typename": "Name", "id": 9, "ownerId": 2, "fieldKey": "name" })),
            &holder,
        );
        assert_eq!(key, Some(IdentityKey::from("2::name")));
    }

    #[test]
    fn partial_composite_falls_through_to_default() {
        let resolver = field_holder_resolver();
        let person = TypeDescriptor::new("Person");
        let key = resolver.resolve(&obj(json!({ "id": 4, "ownerId": 2 })), &person);
        assert_eq!(key, Some(IdentityKey::from("Person:4")));
    }

    #[test]
    fn declared_key_spec_takes_precedence_over_rules() {
        let resolver = field_holder_resolver();
        let book = TypeDescriptor::new("Book")
            .scalar("isbn")
            .scalar("ownerId")
            .scalar("fieldKey")
            .keyed_by(KeySpec::TypenameId {
                id_fields: vec!["isbn".into()],
            });
        let key = resolver.resolve(
            &obj(json!({ "isbn": "978-0", "ownerId": 1, "fieldKey": "x" })),
            &book,
        );
        assert_eq!(key, Some(IdentityKey::from("Book:978-0")));
    }

    #[test]
    fn inline_spec_never_identifies() {
        let resolver = IdentityResolver::default();
        let money = TypeDescriptor::new("Money").scalar("id").keyed_by(KeySpec::Inline);
        assert_eq!(resolver.resolve(&obj(json!({ "id": 1 })), &money), None);
    }

    #[test]
    fn custom_function_overrides_everything() {
        let mut resolver = field_holder_resolver();
        resolver.register("Person", |object, _| {
            object
                .get("email")
                .and_then(Value::as_str)
                .map(|email| IdentityKey::new(format!("email:{email}")))
        });
        let person = TypeDescriptor::new("Person");
        let key = resolver.resolve(&obj(json!({ "id": 1, "email": "a@b.c" })), &person);
        assert_eq!(key, Some(IdentityKey::from("email:a@b.c")));

        let anonymous = resolver.resolve(&obj(json!({ "id": 1 })), &person);
        assert_eq!(anonymous, None);
    }

    #[test]
    fn custom_separator() {
        let resolver = IdentityResolver::new(
            IdentityPolicy::default()
                .with_rule(CompositeRule::new(["ownerId", "fieldKey"]).with_separator("/")),
        );
        let key = resolver.resolve(
            &obj(json!({ "ownerId": 5, "fieldKey": "height" })),
            &TypeDescriptor::new("Height"),
        );
        assert_eq!(key, Some(IdentityKey::from("5/height")));
    }

    #[test]
    fn component_rendering() {
        assert_eq!(render_component(&json!("x")), Some("x".into()));
        assert_eq!(render_component(&json!(12)), Some("12".into()));
        assert_eq!(render_component(&json!(true)), Some("true".into()));
        assert_eq!(render_component(&json!({ "a": 1 })), Some(r#"{"a":1}"#.into()));
        assert_eq!(render_component(&Value::Null), None);
    }

    #[test]
    fn debug_lists_custom_types() {
        let mut resolver = IdentityResolver::default();
        resolver.register("Person", |_, _| None);
        let debug = format!("{resolver:?}");
        assert!(debug.contains("IdentityResolver"));
        assert!(debug.contains("Person"));
    }

    fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z0-9]{0,8}".prop_map(Value::String),
        ]
    }

    proptest! {
        #[test]
        fn resolution_is_deterministic(
            id in arb_scalar(),
            owner in arb_scalar(),
            field_key in arb_scalar(),
            typename in "[A-Z][a-z]{0,6}",
        ) {
            let resolver = field_holder_resolver();
            let descriptor = TypeDescriptor::new(typename.clone());
            let object = obj(json!({
                "__typename": typename,
                "id": id,
                "ownerId": owner,
                "fieldKey": field_key,
            }));
            prop_assert_eq!(
                resolver.resolve(&object, &descriptor),
                resolver.resolve(&object, &descriptor)
            );
        }
    }
}
