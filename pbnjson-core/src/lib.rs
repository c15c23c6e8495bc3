//! Streaming JSON parser, reference-counted value graph, and JSON Schema
//! validator.
//!
//! # Example
//!
//! ```rust
//! use pbnjson_core::{parse, Value};
//!
//! let value = parse(br#"{"name":"alice","age":30}"#, None).unwrap();
//! assert_eq!(value.get("name").as_str(), Some("alice"));
//! ```

pub mod arena;
mod dom;
mod error;
mod input;
pub mod interner;
mod lexer;
mod numeric;
pub mod schema;
mod session;
mod stringify;
mod value;

pub use arena::{SlabSlice, StringArena};
pub use dom::{BorrowingDomBuilder, DomBuilder};
pub use error::{Error, ErrorCategory, ResolutionStatus, SchemaErrorCode, ValidationCode};
pub use input::{open as open_input, InputBuffer};
pub use lexer::{Event, EventSink, Lexer};
pub use numeric::{ConversionFlags, NumberComponents};
pub use schema::{apply, compile, resolve, validate, CompiledSchema, JsonType, NodeId, ResolveOutcome};
pub use session::{DomSession, SaxCallbacks, SaxSession};
pub use stringify::{prettify, stringify};
pub use value::{KeyStr, NumberReprKind, Value};

use std::path::Path;
use std::sync::Arc;

/// Result alias used throughout this crate's public surface.
pub type Result<T> = std::result::Result<T, Error>;

/// One-shot DOM parse: feeds `bytes` through a [`DomSession`] and, if
/// `schema` is given, validates the finished document before returning it.
pub fn parse(bytes: &[u8], schema: Option<&CompiledSchema>) -> Result<Value> {
    let mut session = DomSession::new(schema.cloned());
    if !session.feed(bytes) || !session.end() {
        let message = session.error().unwrap_or("parse failed").to_string();
        return Err(Error::Syntax(message));
    }
    Ok(session.result().cloned().unwrap_or_else(Value::invalid))
}

/// One-shot DOM parse from a file path (§6.1's file-input helper feeding
/// §6.2's one-shot `parse`).
pub fn parse_file(path: impl AsRef<Path>, schema: Option<&CompiledSchema>) -> Result<Value> {
    let buffer = input::open(path)?;
    parse(buffer.as_bytes(), schema)
}

/// One-shot DOM parse in §3.4's "input outlives DOM, no mutation" zero-copy
/// mode: escape-free string and number payloads in the result share
/// ownership of `buffer` instead of being copied off it, so `buffer` stays
/// alive for as long as any part of the returned value needs it.
///
/// There is no streaming/chunked counterpart to this entry point: a token
/// split across a `feed()` call has no single buffer to borrow from, so
/// this mode only applies to a document handed over whole, as `buffer`
/// already is.
pub fn parse_borrowing(buffer: Arc<InputBuffer>, schema: Option<&CompiledSchema>) -> Result<Value> {
    let document = DomBuilder::new_borrowing(buffer).parse()?;
    if let Some(schema) = schema {
        let (ok, err) = validate(&document, schema);
        if !ok {
            return Err(err.unwrap_or_else(|| Error::Validation {
                code: ValidationCode::UnexpectedValue,
                message: "validation failed".to_string(),
            }));
        }
    }
    Ok(document)
}

/// Memory-maps `path` and parses it in the same zero-copy mode as
/// [`parse_borrowing`]; the mapping is kept alive by the returned value and
/// unmapped once the last reference into it drops.
pub fn parse_file_borrowing(path: impl AsRef<Path>, schema: Option<&CompiledSchema>) -> Result<Value> {
    let buffer = Arc::new(input::open(path)?);
    parse_borrowing(buffer, schema)
}

/// One-shot SAX parse: feeds `bytes` to `callbacks`, validating against
/// `schema` (via a transient shadow DOM, per §4.11) once the document
/// closes.
pub fn parse_sax(
    bytes: &[u8],
    schema: Option<&CompiledSchema>,
    callbacks: &mut dyn SaxCallbacks,
) -> Result<()> {
    let mut session = SaxSession::new(schema.cloned());
    if !session.feed(bytes, callbacks) || !session.end(callbacks) {
        let message = session.error().unwrap_or("parse failed").to_string();
        return Err(Error::Syntax(message));
    }
    Ok(())
}

/// Compiles a schema from an in-memory value graph (§6.2 item 2,
/// `parse_from_value`).
pub fn parse_from_value(document: &Value, base_uri: &str) -> Result<CompiledSchema> {
    compile(document, base_uri)
}

/// Parses `bytes` as JSON and compiles the result as a schema (§6.2 item 2,
/// `parse_from_bytes`).
pub fn parse_from_bytes(bytes: &[u8], base_uri: &str) -> Result<CompiledSchema> {
    let document = parse(bytes, None)?;
    compile(&document, base_uri)
}

/// Reads a file, parses it as JSON, and compiles the result as a schema
/// (§6.2 item 2, `parse_from_file`).
pub fn parse_schema_file(path: impl AsRef<Path>, base_uri: &str) -> Result<CompiledSchema> {
    let document = parse_file(&path, None)?;
    compile(&document, base_uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_parse_builds_a_value() {
        let v = parse(br#"{"a":[1,2,3]}"#, None).unwrap();
        assert_eq!(v.get("a").size(), 3);
    }

    #[test]
    fn one_shot_parse_rejects_truncated_input() {
        assert!(parse(br#"{"a":"#, None).is_err());
    }

    #[test]
    fn schema_from_value_validates_one_shot_parse() {
        let schema_doc = Value::empty_object();
        schema_doc.put("type".into(), Value::string_copied("array"));
        let schema = parse_from_value(&schema_doc, "relative:///test").unwrap();
        assert!(parse(b"1", Some(&schema)).is_err());
        assert!(parse(b"[1,2]", Some(&schema)).is_ok());
    }

    #[test]
    fn one_shot_sax_delivers_and_validates() {
        let schema_doc = Value::empty_object();
        schema_doc.put("type".into(), Value::string_copied("object"));
        let schema = parse_from_value(&schema_doc, "relative:///test").unwrap();
        let mut count = 0usize;
        let mut callbacks = |_: Event| {
            count += 1;
            true
        };
        assert!(parse_sax(br#"{"a":1}"#, Some(&schema), &mut callbacks).is_ok());
        assert!(count > 0);
    }

    #[test]
    fn parse_borrowing_matches_the_copying_parse() {
        let input = br#"{"a":[1,2,3],"b":"text"}"#;
        let buffer = Arc::new(InputBuffer::Owned(input.to_vec()));
        let borrowed = parse_borrowing(buffer, None).unwrap();
        let copied = parse(input, None).unwrap();
        assert!(borrowed.equal(&copied));
    }

    #[test]
    fn parse_borrowing_validates_against_a_schema() {
        let schema_doc = Value::empty_object();
        schema_doc.put("type".into(), Value::string_copied("array"));
        let schema = parse_from_value(&schema_doc, "relative:///test").unwrap();
        let buffer = Arc::new(InputBuffer::Owned(b"1".to_vec()));
        assert!(parse_borrowing(buffer, Some(&schema)).is_err());
        let buffer = Arc::new(InputBuffer::Owned(b"[1,2]".to_vec()));
        assert!(parse_borrowing(buffer, Some(&schema)).is_ok());
    }

    #[test]
    fn parse_file_borrowing_reads_and_parses_a_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"k":"v"}"#).unwrap();
        let v = parse_file_borrowing(file.path(), None).unwrap();
        assert_eq!(v.get("k").as_str(), Some("v"));
    }
}
