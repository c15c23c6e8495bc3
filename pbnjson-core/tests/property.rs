//! Property-based tests covering the universal invariants (§8.1).

use proptest::prelude::*;
use pbnjson_core::Value;

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::null()),
        any::<bool>().prop_map(Value::boolean),
        any::<i32>().prop_map(Value::from_i32),
        any::<i64>().prop_map(Value::from_i64),
        "[a-zA-Z0-9_ ]{0,30}".prop_map(|s| Value::string_copied(&s)),
    ]
}

fn arb_value(depth: u32) -> impl Strategy<Value = Value> {
    let leaf = arb_scalar();
    if depth == 0 {
        leaf.boxed()
    } else {
        leaf.prop_recursive(2, 16, 4, move |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(|items| {
                    let arr = Value::empty_array();
                    for item in items {
                        arr.append(item);
                    }
                    arr
                }),
                prop::collection::vec(("[a-z]{1,6}", inner), 0..4).prop_map(|entries| {
                    let obj = Value::empty_object();
                    for (k, v) in entries {
                        obj.put(std::sync::Arc::from(k.as_str()), v);
                    }
                    obj
                }),
            ]
        })
        .boxed()
    }
}

proptest! {
    #[test]
    fn duplicate_is_structurally_equal_and_compares_equal(v in arb_value(3)) {
        let d = v.duplicate();
        prop_assert!(v.equal(&d));
        prop_assert_eq!(v.compare(&d), std::cmp::Ordering::Equal);
    }

    #[test]
    fn stringify_then_parse_round_trips_for_non_float_values(v in arb_value(3)) {
        let bytes = pbnjson_core::stringify(&v);
        let reparsed = pbnjson_core::parse(&bytes, None).unwrap();
        prop_assert!(v.equal(&reparsed));
    }

    #[test]
    fn put_then_get_returns_the_same_value(key in "[a-z]{1,10}", v in arb_scalar()) {
        let obj = Value::empty_object();
        obj.put(std::sync::Arc::from(key.as_str()), v.clone());
        prop_assert!(obj.get(&key).equal(&v));
    }

    #[test]
    fn removing_every_key_empties_the_object(entries in prop::collection::vec(("[a-z]{1,8}", arb_scalar()), 0..8)) {
        let obj = Value::empty_object();
        let mut keys = Vec::new();
        for (k, v) in entries {
            obj.put(std::sync::Arc::from(k.as_str()), v);
            keys.push(k);
        }
        for k in &keys {
            obj.remove(k);
        }
        prop_assert_eq!(obj.size(), 0);
    }

    #[test]
    fn i64_round_trip_flags_are_stable(n in any::<i64>()) {
        let v = Value::from_i64(n);
        let (first, first_flags) = v.as_i64();
        let (second, second_flags) = Value::from_i64(first).as_i64();
        prop_assert_eq!(first, second);
        prop_assert_eq!(first_flags, second_flags);
    }

    #[test]
    fn i64_comparison_matches_numeric_order_regardless_of_f64_rounding(a in any::<i64>(), b in any::<i64>()) {
        let expected = a.cmp(&b);
        prop_assert_eq!(Value::from_i64(a).compare(&Value::from_i64(b)), expected);
    }
}

#[test]
fn byte_by_byte_sax_feed_matches_whole_feed() {
    use pbnjson_core::{Event, SaxCallbacks, SaxSession};

    struct Collector(Vec<Event>);
    impl SaxCallbacks for Collector {
        fn on_event(&mut self, event: Event) -> bool {
            self.0.push(event);
            true
        }
    }

    let input = br#"{"a":[1,2,3],"b":"hello","c":null}"#;

    let mut whole = Collector(Vec::new());
    let mut whole_session = SaxSession::new(None);
    assert!(whole_session.feed(input, &mut whole));
    assert!(whole_session.end(&mut whole));

    let mut piecewise = Collector(Vec::new());
    let mut piecewise_session = SaxSession::new(None);
    for byte in input {
        assert!(piecewise_session.feed(std::slice::from_ref(byte), &mut piecewise));
    }
    assert!(piecewise_session.end(&mut piecewise));

    assert_eq!(whole.0, piecewise.0);
}

#[test]
fn interner_returns_pointer_equal_values_across_threads() {
    use pbnjson_core::interner;
    use std::sync::Arc;

    let handles: Vec<_> = (0..8)
        .map(|_| std::thread::spawn(|| interner::intern("shared-key")))
        .collect();
    let interned: Vec<Arc<str>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for pair in interned.windows(2) {
        assert!(Arc::ptr_eq(&pair[0], &pair[1]));
    }
}
