//! Field-level merge of incoming records into stored ones.

use egc_types::{FieldValue, Record};

/// Merge `incoming` into `existing`, returning `true` if anything changed.
///
/// Fields missing from `incoming` are left as they are. Present fields follow
/// [`merge_value`].
pub fn merge_record(existing: &mut Record, incoming: Record) -> bool {
    let mut changed = false;
    for (field, value) in incoming {
        match existing.get_mut(&field) {
            Some(current) => changed |= merge_value(current, value),
            None => {
                existing.insert(field, value);
                changed = true;
            }
        }
    }
    changed
}

/// Merge one incoming field value into the stored one.
///
/// Two inline objects merge recursively. Every other combination is a plain
/// overwrite: scalars, references (the referent is not touched) and lists
/// (replaced wholesale, never appended).
pub fn merge_value(current: &mut FieldValue, incoming: FieldValue) -> bool {
    match (current, incoming) {
        (FieldValue::Object(existing), FieldValue::Object(incoming)) => {
            merge_record(existing, incoming)
        }
        (current, incoming) => {
            if *current == incoming {
                false
            } else {
                *current = incoming;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn untouched_fields_survive() {
        let mut existing = Record::new().with("a", json!(1)).with("b", json!(2));
        let changed = merge_record(&mut existing, Record::new().with("b", json!(3)));
        assert!(changed);
        assert_eq!(existing, Record::new().with("a", json!(1)).with("b", json!(3)));
    }

    #[test]
    fn lists_are_replaced_not_appended() {
        let x = FieldValue::reference("Cat:x");
        let y = FieldValue::reference("Cat:y");
        let mut existing = Record::new().with("cats", FieldValue::List(vec![x.clone()]));
        merge_record(
            &mut existing,
            Record::new().with("cats", FieldValue::List(vec![x.clone(), y.clone()])),
        );
        assert_eq!(existing.get("cats"), Some(&FieldValue::List(vec![x, y])));
    }

    #[test]
    fn shorter_list_replaces_longer_one() {
        let mut existing = Record::new().with(
            "tags",
            FieldValue::List(vec![json!("a").into(), json!("b").into()]),
        );
        merge_record(
            &mut existing,
            Record::new().with("tags", FieldValue::List(vec![])),
        );
        assert_eq!(existing.get("tags"), Some(&FieldValue::List(vec![])));
    }

    #[test]
    fn references_are_repointed() {
        let mut existing = Record::new().with("best", FieldValue::reference("Person:1"));
        let changed = merge_record(&mut existing, Record::new().with("best", FieldValue::reference("Person:2")));
        assert!(changed);
        assert_eq!(existing.get("best"), Some(&FieldValue::reference("Person:2")));
    }

    #[test]
    fn inline_objects_merge_recursively() {
        let mut existing = Record::new().with(
            "address",
            Record::new().with("city", json!("Oslo")).with("zip", json!("0150")),
        );
        merge_record(
            &mut existing,
            Record::new().with("address", Record::new().with("zip", json!("0151"))),
        );
        let address = existing.get("address").and_then(FieldValue::as_object).unwrap();
        assert_eq!(address.get("city"), Some(&FieldValue::from(json!("Oslo"))));
        assert_eq!(address.get("zip"), Some(&FieldValue::from(json!("0151"))));
    }

    #[test]
    fn inline_object_replaced_by_other_kinds() {
        let mut existing = Record::new().with("value", Record::new().with("x", json!(1)));
        merge_record(&mut existing, Record::new().with("value", FieldValue::null()));
        assert!(existing.get("value").unwrap().is_null());
    }

    #[test]
    fn identical_write_reports_no_change() {
        let record = Record::new()
            .with("a", json!(1))
            .with("nested", Record::new().with("b", json!(2)));
        let mut existing = record.clone();
        assert!(!merge_record(&mut existing, record.clone()));
        assert_eq!(existing, record);
    }

    #[test]
    fn null_overwrites_value() {
        let mut existing = Record::new().with("nickname", json!("Bud"));
        assert!(merge_record(&mut existing, Record::new().with("nickname", FieldValue::null())));
        assert!(existing.get("nickname").unwrap().is_null());
    }

    fn arb_record() -> impl Strategy<Value = Record> {
        prop::collection::btree_map("[a-e]", any::<i32>(), 0..5).prop_map(|fields| {
            fields
                .into_iter()
                .map(|(name, value)| (name, FieldValue::Scalar(json!(value))))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn merge_preserves_fields_absent_from_incoming(
            existing in arb_record(),
            incoming in arb_record(),
        ) {
            let mut merged = existing.clone();
            merge_record(&mut merged, incoming.clone());
            for (field, value) in existing.iter() {
                if !incoming.contains_field(field) {
                    prop_assert_eq!(merged.get(field), Some(value));
                }
            }
            for (field, value) in incoming.iter() {
                prop_assert_eq!(merged.get(field), Some(value));
            }
        }

        #[test]
        fn merge_is_idempotent(existing in arb_record(), incoming in arb_record()) {
            let mut once = existing.clone();
            merge_record(&mut once, incoming.clone());
            let mut twice = once.clone();
            prop_assert!(!merge_record(&mut twice, incoming));
            prop_assert_eq!(once, twice);
        }
    }
}
