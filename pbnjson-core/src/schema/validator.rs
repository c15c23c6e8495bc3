//! Validator (§4.8): checks an already-built value tree against a compiled
//! schema graph.
//!
//! The source runs this in lock-step with the lexer, as a stack of frames
//! that each see every event. Here the same per-keyword checks (§9.1,
//! "features as orthogonal fields on a validator node, applied in a fixed
//! order") run over an already-built [`Value`] subtree instead: sessions
//! that validate during a streaming parse (`crate::session`) build a
//! transient internal DOM for this purpose even when the caller only asked
//! for SAX events, so the observable result — which error code fires, and
//! when — matches what a literal event-driven automaton would produce. See
//! DESIGN.md for why this redesign is sound.

use std::sync::Arc;

use crate::error::{Error, ValidationCode};
use crate::interner;
use crate::value::Value;

use super::compiler::{AdditionalItems, AdditionalProperties, CompiledSchema, Items, JsonType, NodeId, SchemaGraph, SchemaNode};

/// Validates `value` against `schema`, stopping at the first violation.
pub fn validate(value: &Value, schema: &CompiledSchema) -> (bool, Option<Error>) {
    let graph = schema.graph().read().expect("schema graph lock poisoned");
    match check_node(&graph, schema.root(), value) {
        Ok(()) => (true, None),
        Err(code) => (false, Some(validation_error(code))),
    }
}

/// Validates `value` against `schema` after splicing in every schema-declared
/// default for a property absent from the event stream (§4.8 "default
/// injection"). Idempotent: defaults already present are left untouched.
pub fn apply(value: &Value, schema: &CompiledSchema) -> (bool, Option<Error>) {
    let graph = schema.graph().read().expect("schema graph lock poisoned");
    inject_defaults(&graph, schema.root(), value);
    match check_node(&graph, schema.root(), value) {
        Ok(()) => (true, None),
        Err(code) => (false, Some(validation_error(code))),
    }
}

fn validation_error(code: ValidationCode) -> Error {
    Error::Validation {
        code,
        message: format!("{code:?}"),
    }
}

fn resolved<'a>(graph: &'a SchemaGraph, node_id: NodeId) -> (NodeId, &'a SchemaNode) {
    let id = graph.resolve_ref_chain(node_id);
    (id, graph.node(id))
}

fn check_node(graph: &SchemaGraph, node_id: NodeId, value: &Value) -> Result<(), ValidationCode> {
    let (_, node) = resolved(graph, node_id);

    if let Some(types) = &node.types {
        if !types.iter().any(|t| value_matches_type(value, *t)) {
            return Err(type_mismatch_code(types));
        }
    }

    if let Some(values) = &node.enum_values {
        if !values.iter().any(|v| v.equal(value)) {
            return Err(ValidationCode::UnexpectedValue);
        }
    }

    if value.is_number() {
        check_number(node, value)?;
    }
    if value.is_string() {
        check_string(node, value)?;
    }
    if value.is_array() {
        check_array(graph, node, value)?;
    }
    if value.is_object() {
        check_object(graph, node, value)?;
    }

    check_combinators(graph, node, value)?;

    Ok(())
}

fn value_matches_type(value: &Value, t: JsonType) -> bool {
    match t {
        JsonType::Null => value.is_null(),
        JsonType::Boolean => value.is_bool(),
        JsonType::Object => value.is_object(),
        JsonType::Array => value.is_array(),
        JsonType::String => value.is_string(),
        JsonType::Number => value.is_number(),
        JsonType::Integer => {
            if !value.is_number() {
                return false;
            }
            let (f, _) = value.as_f64();
            f.fract() == 0.0
        }
    }
}

fn type_mismatch_code(types: &[JsonType]) -> ValidationCode {
    if types.len() != 1 {
        return ValidationCode::TypeNotAllowed;
    }
    match types[0] {
        JsonType::Null => ValidationCode::NotNull,
        JsonType::Boolean => ValidationCode::NotBoolean,
        JsonType::Object => ValidationCode::NotObject,
        JsonType::Array => ValidationCode::NotArray,
        JsonType::String => ValidationCode::NotString,
        JsonType::Number => ValidationCode::NotNumber,
        JsonType::Integer => ValidationCode::NotInteger,
    }
}

fn check_number(node: &SchemaNode, value: &Value) -> Result<(), ValidationCode> {
    let (v, _) = value.as_f64();
    if let Some(min) = node.minimum {
        let violates = if node.exclusive_minimum { v <= min } else { v < min };
        if violates {
            return Err(ValidationCode::NumberTooSmall);
        }
    }
    if let Some(max) = node.maximum {
        let violates = if node.exclusive_maximum { v >= max } else { v > max };
        if violates {
            return Err(ValidationCode::NumberTooBig);
        }
    }
    if let Some(mo) = node.multiple_of {
        let ratio = v / mo;
        if (ratio - ratio.round()).abs() > 1e-9 {
            return Err(ValidationCode::UnexpectedValue);
        }
    }
    Ok(())
}

fn check_string(node: &SchemaNode, value: &Value) -> Result<(), ValidationCode> {
    let s = value.as_str().unwrap_or("");
    let len = s.chars().count() as u64;
    if let Some(min) = node.min_length {
        if len < min {
            return Err(ValidationCode::StringTooShort);
        }
    }
    if let Some(max) = node.max_length {
        if len > max {
            return Err(ValidationCode::StringTooLong);
        }
    }
    if let Some(re) = &node.pattern {
        if !re.is_match(s) {
            return Err(ValidationCode::UnexpectedValue);
        }
    }
    Ok(())
}

fn check_array(graph: &SchemaGraph, node: &SchemaNode, value: &Value) -> Result<(), ValidationCode> {
    let items = value.items();

    if let Some(min) = node.min_items {
        if (items.len() as u64) < min {
            return Err(ValidationCode::ArrayTooShort);
        }
    }
    if let Some(max) = node.max_items {
        if (items.len() as u64) > max {
            return Err(ValidationCode::ArrayTooLong);
        }
    }

    match &node.items {
        Some(Items::Single(child)) => {
            for item in &items {
                check_node(graph, *child, item)?;
            }
        }
        Some(Items::Tuple(children)) => {
            for (i, item) in items.iter().enumerate() {
                if let Some(&child) = children.get(i) {
                    check_node(graph, child, item)?;
                } else {
                    match &node.additional_items {
                        Some(AdditionalItems::Disallowed) => return Err(ValidationCode::UnexpectedValue),
                        Some(AdditionalItems::Schema(s)) => check_node(graph, *s, item)?,
                        _ => {}
                    }
                }
            }
        }
        None => {}
    }

    if node.unique_items {
        for i in 0..items.len() {
            for j in (i + 1)..items.len() {
                if items[i].equal(&items[j]) {
                    return Err(ValidationCode::ArrayHasDuplicates);
                }
            }
        }
    }

    Ok(())
}

fn check_object(graph: &SchemaGraph, node: &SchemaNode, value: &Value) -> Result<(), ValidationCode> {
    let entries = value.entries();

    if let Some(min) = node.min_properties {
        if (entries.len() as u64) < min {
            return Err(ValidationCode::NotEnoughKeys);
        }
    }
    if let Some(max) = node.max_properties {
        if (entries.len() as u64) > max {
            return Err(ValidationCode::TooManyKeys);
        }
    }
    if let Some(required) = &node.required {
        for key in required {
            if value.get(key).is_invalid() {
                return Err(ValidationCode::MissingRequiredKey);
            }
        }
    }

    for (key, val) in &entries {
        let mut matched = false;
        if let Some(&child) = node.properties.get(key.as_ref()) {
            check_node(graph, child, val)?;
            matched = true;
        }
        for (re, child) in &node.pattern_properties {
            if re.is_match(key) {
                check_node(graph, *child, val)?;
                matched = true;
            }
        }
        if !matched {
            match &node.additional_properties {
                Some(AdditionalProperties::Disallowed) => return Err(ValidationCode::ObjectPropertyNotAllowed),
                Some(AdditionalProperties::Schema(s)) => check_node(graph, *s, val)?,
                _ => {}
            }
        }
    }

    Ok(())
}

fn check_combinators(graph: &SchemaGraph, node: &SchemaNode, value: &Value) -> Result<(), ValidationCode> {
    if let Some(all) = &node.all_of {
        for &child in all {
            if check_node(graph, child, value).is_err() {
                return Err(ValidationCode::NotEveryAllOf);
            }
        }
    }

    if let Some(any) = &node.any_of {
        if !any.iter().any(|&child| check_node(graph, child, value).is_ok()) {
            return Err(ValidationCode::NeitherOfAny);
        }
    }

    if let Some(one) = &node.one_of {
        let passing = one.iter().filter(|&&child| check_node(graph, child, value).is_ok()).count();
        match passing {
            0 => return Err(ValidationCode::NeitherOfAny),
            1 => {}
            _ => return Err(ValidationCode::MoreThanOneOf),
        }
    }

    if let Some(not) = node.not {
        if check_node(graph, not, value).is_ok() {
            return Err(ValidationCode::UnexpectedValue);
        }
    }

    Ok(())
}

fn inject_defaults(graph: &SchemaGraph, node_id: NodeId, value: &Value) {
    let (_, node) = resolved(graph, node_id);

    if value.is_object() {
        for (key, &child) in &node.properties {
            if value.get(key).is_invalid() {
                if let Some(default) = &graph.node(graph.resolve_ref_chain(child)).default {
                    value.put(interner::intern(key), default.clone());
                }
            }
        }
        for (key, &child) in &node.properties {
            let current = value.get(key);
            if !current.is_invalid() {
                inject_defaults(graph, child, &current);
            }
        }
    }

    if value.is_array() {
        match &node.items {
            Some(Items::Single(child)) => {
                for item in value.items() {
                    inject_defaults(graph, *child, &item);
                }
            }
            Some(Items::Tuple(children)) => {
                for (i, item) in value.items().iter().enumerate() {
                    if let Some(&child) = children.get(i) {
                        inject_defaults(graph, child, item);
                    }
                }
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::compiler::compile;

    fn obj_schema(fields: &[(&str, Value)]) -> Value {
        let o = Value::empty_object();
        for (k, v) in fields {
            o.put(Arc::from(*k), v.clone());
        }
        o
    }

    #[test]
    fn s1_number_too_small() {
        let schema = obj_schema(&[
            ("type", Value::string_copied("number")),
            ("minimum", Value::from_i64(1)),
            ("maximum", Value::from_i64(10)),
        ]);
        let compiled = compile(&schema, "relative:").unwrap();
        let (ok, err) = validate(&Value::from_i64(0), &compiled);
        assert!(!ok);
        assert!(matches!(err, Some(Error::Validation { code: ValidationCode::NumberTooSmall, .. })));
    }

    #[test]
    fn s2_array_has_duplicates() {
        let schema = obj_schema(&[
            ("type", Value::string_copied("array")),
            ("uniqueItems", Value::boolean(true)),
        ]);
        let compiled = compile(&schema, "relative:").unwrap();
        let arr = Value::array(vec![
            Value::null(),
            Value::boolean(true),
            Value::from_i64(1),
            Value::boolean(false),
            Value::from_i64(1),
        ]);
        let (ok, err) = validate(&arr, &compiled);
        assert!(!ok);
        assert!(matches!(err, Some(Error::Validation { code: ValidationCode::ArrayHasDuplicates, .. })));
    }

    #[test]
    fn unique_items_distinguishes_large_integers_that_collapse_under_f64() {
        let schema = obj_schema(&[
            ("type", Value::string_copied("array")),
            ("uniqueItems", Value::boolean(true)),
        ]);
        let compiled = compile(&schema, "relative:").unwrap();
        // i64::MAX and i64::MAX - 2 both round to the same f64; this must not
        // be flagged as a duplicate pair.
        let arr = Value::array(vec![Value::from_i64(i64::MAX), Value::from_i64(i64::MAX - 2)]);
        let (ok, _) = validate(&arr, &compiled);
        assert!(ok);
    }

    #[test]
    fn s3_one_of_more_than_one_and_neither() {
        let branch_enum = obj_schema(&[("enum", Value::array(vec![Value::string_copied("hello")]))]);
        let branch_string = obj_schema(&[("type", Value::string_copied("string"))]);
        let schema = obj_schema(&[("oneOf", Value::array(vec![branch_enum, branch_string]))]);
        let compiled = compile(&schema, "relative:").unwrap();

        let (ok, err) = validate(&Value::string_copied("hello"), &compiled);
        assert!(!ok);
        assert!(matches!(err, Some(Error::Validation { code: ValidationCode::MoreThanOneOf, .. })));

        let (ok, err) = validate(&Value::null(), &compiled);
        assert!(!ok);
        assert!(matches!(err, Some(Error::Validation { code: ValidationCode::NeitherOfAny, .. })));
    }

    #[test]
    fn s4_apply_injects_default() {
        let foo_schema = obj_schema(&[("type", Value::string_copied("integer")), ("default", Value::from_i64(3))]);
        let props = Value::empty_object();
        props.put(Arc::from("foo"), foo_schema);
        let schema = obj_schema(&[("type", Value::string_copied("object")), ("properties", props)]);
        let compiled = compile(&schema, "relative:").unwrap();

        let value = Value::empty_object();
        let (ok, _) = apply(&value, &compiled);
        assert!(ok);
        let (v, _) = value.get("foo").as_i64();
        assert_eq!(v, 3);

        // idempotent
        let (ok2, _) = apply(&value, &compiled);
        assert!(ok2);
        assert_eq!(value.size(), 1);
    }
}
