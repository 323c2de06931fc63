/// Property-based tests for the encoder and the identity registry.
///
/// Strategies generate:
/// - arbitrary `f64` values, including infinities, NaN and signed zero
/// - flat objects with random keys and scalar values
/// - random sequences of elements with repeats, to exercise handle reuse
///
/// Properties checked:
/// - numbers survive encode → JSON → decode exactly (NaN as NaN)
/// - shallow object/array encodings carry only a count
/// - deep children mirror the source keys and order
/// - `assign` is idempotent and handles follow first-encounter order
use std::sync::Arc;

use inspect_core::{decode, encode, EncodedValue, HandleCounter, ObjectRef, Registry, Value};
use proptest::prelude::*;

fn registry() -> Registry {
    Registry::with_counter(Arc::new(HandleCounter::new()))
}

fn arb_number() -> impl Strategy<Value = f64> {
    prop_oneof![
        any::<f64>(),
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
        Just(f64::NAN),
        Just(0.0),
        Just(-0.0),
        (-1_000_000i64..1_000_000i64).prop_map(|n| n as f64),
    ]
}

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        arb_number().prop_map(Value::Number),
        any::<bool>().prop_map(Value::Boolean),
        "[a-z ]{0,12}".prop_map(Value::String),
        Just(Value::Null),
        Just(Value::Undefined),
    ]
}

/// Distinct keys in a stable, random order.
fn arb_entries() -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::vec(("[a-z][a-z0-9_]{0,8}", arb_scalar()), 0..12).prop_map(|pairs| {
        let mut seen = std::collections::HashSet::new();
        pairs
            .into_iter()
            .filter(|(k, _)| seen.insert(k.clone()))
            .collect()
    })
}

proptest! {
    #[test]
    fn numbers_round_trip_through_the_wire(n in arb_number()) {
        let encoded = encode(&Value::Number(n), false, &mut registry(), None).unwrap();
        let payload = serde_json::to_string(&encoded).unwrap();
        let EncodedValue::Number { value } = decode(&payload).unwrap() else {
            panic!("expected a number node");
        };
        let back = value.to_f64();
        if n.is_nan() {
            prop_assert!(back.is_nan());
        } else {
            // -0 travels as 0, which compares equal.
            prop_assert_eq!(back, n);
        }
    }

    #[test]
    fn shallow_object_is_just_a_count(entries in arb_entries()) {
        let len = entries.len();
        let obj = ObjectRef::from_entries(entries);
        let encoded = encode(&Value::from(obj), false, &mut registry(), None).unwrap();
        prop_assert_eq!(encoded, EncodedValue::Object { value: len, children: None });
    }

    #[test]
    fn deep_object_mirrors_keys(entries in arb_entries()) {
        let keys: Vec<String> = entries.iter().map(|(k, _)| k.clone()).collect();
        let obj = ObjectRef::from_entries(entries);
        let encoded = encode(&Value::from(obj), true, &mut registry(), None).unwrap();
        let EncodedValue::Object { value, children: Some(children) } = encoded else {
            panic!("expected a deep object node");
        };
        prop_assert_eq!(value, keys.len());
        let got: Vec<&str> = children.keys().collect();
        prop_assert_eq!(got, keys.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn shallow_array_is_just_a_length(items in prop::collection::vec(arb_scalar(), 0..20)) {
        let len = items.len();
        let arr = ObjectRef::array(items);
        let encoded = encode(&Value::from(arr), false, &mut registry(), None).unwrap();
        prop_assert_eq!(encoded, EncodedValue::Array { value: len, children: None });
    }

    #[test]
    fn handles_are_idempotent_and_ordered(picks in prop::collection::vec(0usize..6, 1..40)) {
        let pool: Vec<ObjectRef> = (0..6).map(|i| ObjectRef::element(&format!("E{i}"))).collect();
        let mut reg = registry();

        let mut first_seen: Vec<usize> = Vec::new();
        let mut handles = std::collections::HashMap::new();
        for &i in &picks {
            let h = reg.assign(&pool[i]).unwrap();
            if let Some(prev) = handles.insert(i, h) {
                prop_assert_eq!(prev, h);
            } else {
                first_seen.push(i);
            }
        }

        prop_assert_eq!(reg.len(), first_seen.len());
        for pair in first_seen.windows(2) {
            prop_assert!(handles[&pair[0]] < handles[&pair[1]]);
        }
    }
}
