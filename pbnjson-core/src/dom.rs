//! DOM builder (§4.9): a stack-based consumer of lexer events that produces
//! a [`Value`] graph.

use std::ops::Range;
use std::sync::Arc;

use crate::error::Error;
use crate::input::InputBuffer;
use crate::interner;
use crate::lexer::{push_unicode_escape, Event, EventSink};
use crate::value::Value;

/// Consumes lexer events and assembles a [`Value`] tree. The stack holds
/// every currently-open container; the pending key slot is populated by
/// `object_key` and consumed by the value event that follows it.
pub struct DomBuilder {
    stack: Vec<Value>,
    pending_key: Option<Arc<str>>,
    root: Option<Value>,
}

impl DomBuilder {
    pub fn new() -> DomBuilder {
        DomBuilder {
            stack: Vec::new(),
            pending_key: None,
            root: None,
        }
    }

    fn attach(&mut self, value: Value) {
        match self.stack.last() {
            Some(top) if top.is_object() => {
                let key = self.pending_key.take().expect("object value with no pending key");
                top.put(key, value);
            }
            Some(top) => {
                top.append(value);
            }
            None => self.root = Some(value),
        }
    }

    /// The finished root value, once `object_start`/`array_start` depth has
    /// returned to zero. `None` if called before the document closed.
    pub fn finish(mut self) -> Option<Value> {
        if self.stack.is_empty() {
            self.root.take()
        } else {
            None
        }
    }

    /// §3.4's "input outlives DOM, no mutation" zero-copy mode: returns a
    /// builder handle whose [`BorrowingDomBuilder::parse`] scans `buffer`
    /// once, whole, and hands back a [`Value`] whose escape-free string and
    /// number payloads are byte ranges sharing ownership of `buffer` rather
    /// than copies. `buffer`'s own `Drop` (`munmap` for a memory-mapped
    /// file, `free` for a heap buffer) is the deallocation hook once the
    /// last such payload is gone.
    ///
    /// There is no chunked/resumable entry point for this mode, unlike the
    /// [`EventSink`] path above: a token split across a `feed()` boundary
    /// has no single contiguous buffer to borrow, so this only makes sense
    /// when the whole document is handed over at once.
    pub fn new_borrowing(buffer: Arc<InputBuffer>) -> BorrowingDomBuilder {
        BorrowingDomBuilder { buffer }
    }
}

impl Default for DomBuilder {
    fn default() -> Self {
        DomBuilder::new()
    }
}

impl EventSink for DomBuilder {
    fn on_event(&mut self, event: Event) -> bool {
        match event {
            Event::ObjectStart => {
                let obj = Value::empty_object();
                self.stack.push(obj);
            }
            Event::ObjectEnd => {
                let obj = self.stack.pop().expect("object_end with no open object");
                self.attach(obj);
            }
            Event::ArrayStart => {
                let arr = Value::empty_array();
                self.stack.push(arr);
            }
            Event::ArrayEnd => {
                let arr = self.stack.pop().expect("array_end with no open array");
                self.attach(arr);
            }
            Event::ObjectKey(bytes) => {
                let key = String::from_utf8_lossy(&bytes);
                self.pending_key = Some(interner::intern(&key));
            }
            Event::String(bytes) => self.attach(Value::string_borrowed(Arc::from(bytes))),
            Event::Number(bytes) => self.attach(Value::from_raw_number(Arc::from(bytes))),
            Event::Boolean(b) => self.attach(Value::boolean(b)),
            Event::Null => self.attach(Value::null()),
        }
        true
    }
}

/// Handle returned by [`DomBuilder::new_borrowing`]. Holds the input buffer
/// until [`parse`](BorrowingDomBuilder::parse) consumes it.
pub struct BorrowingDomBuilder {
    buffer: Arc<InputBuffer>,
}

impl BorrowingDomBuilder {
    /// Scans the whole buffer in one pass and builds the value graph.
    /// Escape-free strings and every number literal become byte ranges
    /// sharing ownership of the buffer (§3.4); escaped strings still
    /// allocate, since decoding an escape leaves no contiguous span of the
    /// original bytes to borrow.
    pub fn parse(self) -> Result<Value, Error> {
        let mut scan = BorrowScan {
            buffer: &self.buffer,
            bytes: self.buffer.as_bytes(),
            pos: 0,
        };
        scan.skip_ws_and_comments();
        let value = scan.parse_value()?;
        scan.skip_ws_and_comments();
        if scan.pos != scan.bytes.len() {
            return Err(Error::Syntax("trailing bytes after document".to_string()));
        }
        Ok(value)
    }
}

enum StringSpan {
    /// Byte range of the string's content (excluding quotes), no escapes.
    Plain(Range<usize>),
    /// A decoded copy, built because the string contained an escape.
    Escaped(Vec<u8>),
}

struct BorrowScan<'b> {
    buffer: &'b Arc<InputBuffer>,
    bytes: &'b [u8],
    pos: usize,
}

impl<'b> BorrowScan<'b> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
                self.pos += 1;
            }
            if self.peek() == Some(b'/') {
                match self.bytes.get(self.pos + 1) {
                    Some(b'/') => {
                        self.pos += 2;
                        while !matches!(self.peek(), None | Some(b'\n')) {
                            self.pos += 1;
                        }
                        continue;
                    }
                    Some(b'*') => {
                        self.pos += 2;
                        while self.pos + 1 < self.bytes.len()
                            && !(self.bytes[self.pos] == b'*' && self.bytes[self.pos + 1] == b'/')
                        {
                            self.pos += 1;
                        }
                        self.pos = (self.pos + 2).min(self.bytes.len());
                        continue;
                    }
                    _ => {}
                }
            }
            break;
        }
    }

    fn parse_value(&mut self) -> Result<Value, Error> {
        self.skip_ws_and_comments();
        match self.peek() {
            Some(b'{') => self.parse_object(),
            Some(b'[') => self.parse_array(),
            Some(b'"') => self.parse_string_value(),
            Some(b'-' | b'0'..=b'9') => Ok(self.parse_number()),
            Some(b't') => self.parse_literal(b"true", Value::boolean(true)),
            Some(b'f') => self.parse_literal(b"false", Value::boolean(false)),
            Some(b'n') => self.parse_literal(b"null", Value::null()),
            Some(other) => Err(Error::Syntax(format!("unexpected byte {other:#x}"))),
            None => Err(Error::Syntax("unexpected end of input".to_string())),
        }
    }

    fn parse_object(&mut self) -> Result<Value, Error> {
        self.pos += 1;
        let obj = Value::empty_object();
        self.skip_ws_and_comments();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(obj);
        }
        loop {
            self.skip_ws_and_comments();
            if self.peek() != Some(b'"') {
                return Err(Error::Syntax("expected object key".to_string()));
            }
            let key_bytes = self.scan_string_owned()?;
            let key = interner::intern(&String::from_utf8_lossy(&key_bytes));
            self.skip_ws_and_comments();
            if self.peek() != Some(b':') {
                return Err(Error::Syntax("expected ':'".to_string()));
            }
            self.pos += 1;
            let value = self.parse_value()?;
            obj.put(key, value);
            self.skip_ws_and_comments();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                }
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(Error::Syntax("expected ',' or '}'".to_string())),
            }
        }
        Ok(obj)
    }

    fn parse_array(&mut self) -> Result<Value, Error> {
        self.pos += 1;
        let arr = Value::empty_array();
        self.skip_ws_and_comments();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(arr);
        }
        loop {
            let value = self.parse_value()?;
            arr.append(value);
            self.skip_ws_and_comments();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                }
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(Error::Syntax("expected ',' or ']'".to_string())),
            }
        }
        Ok(arr)
    }

    fn parse_string_value(&mut self) -> Result<Value, Error> {
        match self.scan_string_span()? {
            StringSpan::Plain(range) => Ok(Value::string_input_slice(Arc::clone(self.buffer), range)),
            StringSpan::Escaped(bytes) => Ok(Value::string_borrowed(Arc::from(bytes))),
        }
    }

    fn scan_string_owned(&mut self) -> Result<Vec<u8>, Error> {
        match self.scan_string_span()? {
            StringSpan::Plain(range) => Ok(self.bytes[range].to_vec()),
            StringSpan::Escaped(bytes) => Ok(bytes),
        }
    }

    /// Assumes `self.pos` is on the opening `"`. Scans ahead for the
    /// matching close quote; if no escape is seen before it, the content is
    /// a plain contiguous span. Otherwise falls back to decoding.
    fn scan_string_span(&mut self) -> Result<StringSpan, Error> {
        self.pos += 1;
        let content_start = self.pos;
        let mut i = content_start;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'"' => {
                    self.pos = i + 1;
                    return Ok(StringSpan::Plain(content_start..i));
                }
                b'\\' => {
                    self.pos = i;
                    return self.decode_escaped_string(content_start).map(StringSpan::Escaped);
                }
                _ => i += 1,
            }
        }
        Err(Error::Syntax("unterminated string".to_string()))
    }

    fn decode_escaped_string(&mut self, content_start: usize) -> Result<Vec<u8>, Error> {
        let mut out = self.bytes[content_start..self.pos].to_vec();
        let mut pending_high_surrogate: Option<u16> = None;
        loop {
            let b = *self
                .bytes
                .get(self.pos)
                .ok_or_else(|| Error::Syntax("unterminated string".to_string()))?;
            self.pos += 1;
            match b {
                b'"' => return Ok(out),
                b'\\' => {
                    let esc = *self
                        .bytes
                        .get(self.pos)
                        .ok_or_else(|| Error::Syntax("unterminated escape".to_string()))?;
                    self.pos += 1;
                    match esc {
                        b'"' | b'\\' | b'/' => out.push(esc),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'u' => {
                            let digits = self
                                .bytes
                                .get(self.pos..self.pos + 4)
                                .ok_or_else(|| Error::Syntax("truncated \\u escape".to_string()))?;
                            let hex = std::str::from_utf8(digits)
                                .map_err(|_| Error::Syntax("invalid \\u escape".to_string()))?;
                            let unit = u16::from_str_radix(hex, 16)
                                .map_err(|_| Error::Syntax("invalid \\u escape".to_string()))?;
                            push_unicode_escape(&mut out, unit, &mut pending_high_surrogate);
                            self.pos += 4;
                        }
                        _ => return Err(Error::Syntax("invalid escape sequence".to_string())),
                    }
                }
                _ => out.push(b),
            }
        }
    }

    fn parse_number(&mut self) -> Value {
        let start = self.pos;
        self.pos += 1;
        while matches!(self.peek(), Some(b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')) {
            self.pos += 1;
        }
        Value::number_input_slice(Arc::clone(self.buffer), start..self.pos)
    }

    fn parse_literal(&mut self, expected: &'static [u8], value: Value) -> Result<Value, Error> {
        if self.bytes[self.pos..].starts_with(expected) {
            self.pos += expected.len();
            Ok(value)
        } else {
            Err(Error::Syntax("invalid literal".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn build(input: &[u8]) -> Value {
        let mut lexer = Lexer::new();
        let mut builder = DomBuilder::new();
        assert!(lexer.feed(input, &mut builder));
        assert!(lexer.end(&mut builder));
        builder.finish().expect("document did not close")
    }

    #[test]
    fn builds_nested_structure() {
        let v = build(br#"{"a":[1,2,{"b":true}],"c":null}"#);
        assert!(v.is_object());
        let a = v.get("a");
        assert_eq!(a.size(), 3);
        let (n, _) = a.at(0).as_i64();
        assert_eq!(n, 1);
        assert!(a.at(2).get("b").as_bool().0);
        assert!(v.get("c").is_null());
    }

    #[test]
    fn root_scalar_closes_with_empty_stack() {
        let v = build(b"42");
        let (n, _) = v.as_i64();
        assert_eq!(n, 42);
    }

    #[test]
    fn object_key_reuses_interned_allocation() {
        let v = build(br#"{"dup":1}"#);
        let entries = v.entries();
        let (key, _) = &entries[0];
        let again = interner::intern("dup");
        assert!(Arc::ptr_eq(key, &again));
    }

    fn build_borrowing(input: &[u8]) -> (Value, Arc<InputBuffer>) {
        let buffer = Arc::new(InputBuffer::Owned(input.to_vec()));
        let value = DomBuilder::new_borrowing(Arc::clone(&buffer))
            .parse()
            .expect("borrowing parse failed");
        (value, buffer)
    }

    #[test]
    fn borrowing_mode_builds_the_same_structure_as_the_copying_path() {
        let input = br#"{"a":[1,2,{"b":true}],"c":null}"#;
        let (v, _buffer) = build_borrowing(input);
        let copied = build(input);
        assert!(v.equal(&copied));
    }

    #[test]
    fn borrowing_mode_keeps_the_input_buffer_alive_through_plain_strings() {
        let buffer = Arc::new(InputBuffer::Owned(br#"{"a":"hello","n":42}"#.to_vec()));
        let before = Arc::strong_count(&buffer);
        let value = DomBuilder::new_borrowing(Arc::clone(&buffer)).parse().unwrap();
        assert!(Arc::strong_count(&buffer) > before);
        assert_eq!(value.get("a").as_str(), Some("hello"));
        let (n, _) = value.get("n").as_i64();
        assert_eq!(n, 42);
        drop(value);
        assert_eq!(Arc::strong_count(&buffer), before);
    }

    #[test]
    fn borrowing_mode_still_decodes_escaped_strings() {
        let (v, _buffer) = build_borrowing(br#"{"s":"a\nbA"}"#);
        assert_eq!(v.get("s").as_str(), Some("a\nbA"));
    }

    #[test]
    fn borrowing_mode_root_scalar_number_borrows_the_buffer() {
        let (v, _buffer) = build_borrowing(b"1.050");
        assert_eq!(v.as_raw_bytes(), Some(b"1.050".as_slice()));
    }

    #[test]
    fn borrowing_mode_rejects_trailing_bytes() {
        let buffer = Arc::new(InputBuffer::Owned(b"1 2".to_vec()));
        assert!(DomBuilder::new_borrowing(buffer).parse().is_err());
    }
}
