//! End-to-end (schema, input, expected outcome) scenarios.

use pbnjson_core::{parse, parse_from_value, Error, ValidationCode, Value};

fn schema_from_json(text: &str) -> pbnjson_core::CompiledSchema {
    let doc = parse(text.as_bytes(), None).expect("schema document parses");
    parse_from_value(&doc, "relative:///scenario").expect("schema compiles")
}

fn validation_code(err: &Error) -> ValidationCode {
    match err {
        Error::Validation { code, .. } => *code,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn s1_number_below_minimum_fails_with_number_too_small() {
    let schema = schema_from_json(r#"{"type":"number","minimum":1,"maximum":10}"#);
    let err = parse(b"0", Some(&schema)).unwrap_err();
    assert_eq!(validation_code(&err), ValidationCode::NumberTooSmall);
}

#[test]
fn s2_array_with_duplicates_fails_uniqueness() {
    let schema = schema_from_json(r#"{"type":"array","uniqueItems":true}"#);
    let err = parse(b"[null, true, 1, false, 1]", Some(&schema)).unwrap_err();
    assert_eq!(validation_code(&err), ValidationCode::ArrayHasDuplicates);
}

#[test]
fn s3_one_of_reports_more_than_one_of_and_neither_of_any() {
    let schema = schema_from_json(r#"{"oneOf":[{"enum":["hello"]},{"type":"string"}]}"#);

    let err = parse(br#""hello""#, Some(&schema)).unwrap_err();
    assert_eq!(validation_code(&err), ValidationCode::MoreThanOneOf);

    let err = parse(b"null", Some(&schema)).unwrap_err();
    assert_eq!(validation_code(&err), ValidationCode::NeitherOfAny);
}

#[test]
fn s4_apply_injects_declared_default() {
    let schema = schema_from_json(
        r#"{"type":"object","properties":{"foo":{"type":"integer","default":3}}}"#,
    );
    let document = parse(b"{}", None).unwrap();
    let (ok, err) = pbnjson_core::apply(&document, &schema);
    assert!(ok, "{err:?}");
    let (foo, _) = document.get("foo").as_i64();
    assert_eq!(foo, 3);
}

#[test]
fn s5_ref_through_one_of_resolves_within_same_document() {
    let schema = schema_from_json(
        r#"{"definitions":{"A":{"type":"string"}},"oneOf":[{"$ref":"#/definitions/A"},{"type":"integer"}]}"#,
    );

    assert!(parse(br#""x""#, Some(&schema)).is_ok());

    let err = parse(b"true", Some(&schema)).unwrap_err();
    assert_eq!(validation_code(&err), ValidationCode::NeitherOfAny);
}

#[test]
fn boundary_array_min_max_items_of_one() {
    let schema = schema_from_json(r#"{"type":"array","minItems":1,"maxItems":1}"#);
    assert!(parse(b"[]", Some(&schema)).is_err());
    assert!(parse(b"[1,2]", Some(&schema)).is_err());
    assert!(parse(b"{}", Some(&schema)).is_err());
    assert!(parse(b"[1]", Some(&schema)).is_ok());
    assert!(parse(b"[-50]", Some(&schema)).is_ok());
}

#[test]
fn boundary_precision_loss_example() {
    let v = parse(b"1.05960464477550000000", None).unwrap();
    let (n, flags) = v.as_i64();
    assert_eq!(n, 1);
    assert!(flags.contains(pbnjson_core::ConversionFlags::PRECISION_LOSS));
}

#[test]
fn stringify_round_trips_through_parse() {
    let v = parse(br#"{"a":[1,2,"x"],"b":null,"c":true}"#, None).unwrap();
    let bytes = pbnjson_core::stringify(&v);
    let reparsed = parse(&bytes, None).unwrap();
    assert!(v.equal(&reparsed));
}

#[test]
fn mixed_number_encodings_compare_numerically() {
    let raw = Value::from_raw_number(std::sync::Arc::from(&b"2.0"[..]));
    let int = Value::from_i64(2);
    assert!(raw.equal(&int));
    assert_eq!(raw.compare(&int), std::cmp::Ordering::Equal);
}
