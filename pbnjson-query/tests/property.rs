//! Property-based tests over the query grammar's positional and universal
//! selectors, mirroring pbnjson-core's own `tests/property.rs` style.

use proptest::prelude::*;

use pbnjson_core::Value;
use pbnjson_query::compile;

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::null()),
        any::<bool>().prop_map(Value::boolean),
        any::<i32>().prop_map(Value::from_i32),
    ]
}

fn arb_array(max_len: usize) -> impl Strategy<Value = Value> {
    prop::collection::vec(arb_scalar(), 0..max_len).prop_map(|items| {
        let arr = Value::empty_array();
        for item in items {
            arr.append(item);
        }
        arr
    })
}

proptest! {
    #[test]
    fn universal_selector_matches_every_array_element(items in prop::collection::vec(any::<i32>(), 0..12)) {
        let arr = Value::empty_array();
        for n in &items {
            arr.append(Value::from_i32(*n));
        }
        let query = compile("*").unwrap();
        let results = query.select(&arr);
        prop_assert_eq!(results.len(), items.len());
        for (r, n) in results.iter().zip(items.iter()) {
            prop_assert_eq!(r.as_i32().0, *n);
        }
    }

    #[test]
    fn nth_child_selects_exactly_the_one_based_index(items in prop::collection::vec(any::<i32>(), 1..12), pick in 0usize..11) {
        let n = pick % items.len();
        let arr = Value::empty_array();
        for v in &items {
            arr.append(Value::from_i32(*v));
        }
        let query = compile(&format!("number:nth-child({})", n + 1)).unwrap();
        let results = query.select(&arr);
        prop_assert_eq!(results.len(), 1);
        prop_assert_eq!(results[0].as_i32().0, items[n]);
    }

    #[test]
    fn negative_nth_child_counts_from_the_end(items in prop::collection::vec(any::<i32>(), 1..12), pick in 0usize..11) {
        let n = pick % items.len();
        let arr = Value::empty_array();
        for v in &items {
            arr.append(Value::from_i32(*v));
        }
        // nth-child(-1) is the last element, nth-child(-2) the second-to-last, etc.
        let from_end = (items.len() - n) as i64;
        let query = compile(&format!("number:nth-child(-{})", from_end)).unwrap();
        let results = query.select(&arr);
        prop_assert_eq!(results.len(), 1);
        prop_assert_eq!(results[0].as_i32().0, items[n]);
    }

    #[test]
    fn type_selector_matches_only_values_of_that_type(arr in arb_array(12)) {
        let query = compile("number").unwrap();
        let results = query.select(&arr);
        let expected = arr.items().iter().filter(|v| v.is_number()).count();
        prop_assert_eq!(results.len(), expected);
        prop_assert!(results.iter().all(|v| v.is_number()));
    }

    #[test]
    fn first_and_last_child_are_disjoint_unless_the_array_is_a_singleton(arr in arb_array(12)) {
        let first = compile("*:first-child").unwrap().select(&arr);
        let last = compile("*:last-child").unwrap().select(&arr);
        if arr.size() <= 1 {
            prop_assert_eq!(first.len(), arr.size());
            prop_assert_eq!(last.len(), arr.size());
        } else {
            prop_assert_eq!(first.len(), 1);
            prop_assert_eq!(last.len(), 1);
            prop_assert!(!first[0].equal(&last[0]));
        }
    }
}
