//! Chunk-fed, resumable JSON tokenizer (§4.5).
//!
//! Unlike a whole-string tokenizer, this lexer's state survives an arbitrary
//! byte-boundary split of the input: a chunk may end mid-string, mid-number,
//! mid-escape, mid-comment, or anywhere in whitespace, and a later `feed`
//! call picks up exactly where the last one left off. It buffers only the
//! bytes of the token currently in progress, not the whole document, so the
//! cost of resuming is proportional to that one token, not to everything fed
//! so far.

use crate::error::{Error, ErrorCategory};

/// One lexer event. Borrows from the lexer's own resume buffer or from the
/// caller's chunk, whichever currently holds the complete token.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ObjectStart,
    ObjectEnd,
    ObjectKey(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    String(Vec<u8>),
    /// Raw byte slice of a number literal; never pre-converted (§4.5, §4.1).
    Number(Vec<u8>),
    Boolean(bool),
    Null,
}

/// Receives lexer events during `feed`. Returning `false` cancels the parse:
/// `feed` stops and returns `false` with a sticky "client canceled" error.
pub trait EventSink {
    fn on_event(&mut self, event: Event) -> bool;
}

impl<F: FnMut(Event) -> bool> EventSink for F {
    fn on_event(&mut self, event: Event) -> bool {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayState {
    ExpectValueOrEnd,
    ExpectCommaOrEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectState {
    ExpectKeyOrEnd,
    ExpectColon,
    ExpectValue,
    ExpectCommaOrEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Array(ArrayState),
    Object(ObjectState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootState {
    ExpectValue,
    ExpectEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartialKind {
    None,
    String {
        in_escape: bool,
        unicode_remaining: u8,
        unicode_value: u16,
        pending_high_surrogate: Option<u16>,
    },
    Number,
    Literal { expected: &'static [u8] },
    LineComment,
    BlockComment { saw_star: bool },
    SlashAmbiguous,
}

/// A chunk-fed, resumable JSON tokenizer.
pub struct Lexer {
    stack: Vec<Frame>,
    root: RootState,
    /// Bytes of whatever token is currently in progress across feed calls.
    /// Empty whenever the lexer is between tokens.
    partial: Vec<u8>,
    partial_kind: PartialKind,
    /// Whether the in-progress value is a pending object key (affects which
    /// event kind the completed string becomes).
    as_key: bool,
    sticky_error: Option<String>,
    ended: bool,
}

impl Lexer {
    pub fn new() -> Lexer {
        Lexer {
            stack: Vec::new(),
            root: RootState::ExpectValue,
            partial: Vec::new(),
            partial_kind: PartialKind::None,
            as_key: false,
            sticky_error: None,
            ended: false,
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.sticky_error.as_deref()
    }

    fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.sticky_error.is_none() {
            self.sticky_error = Some(message.into());
        }
        false
    }

    /// Feed the next chunk of bytes. Returns `false` on syntax error or
    /// caller cancellation; the sticky error is then available via
    /// [`Lexer::error`] until the lexer is discarded.
    pub fn feed(&mut self, chunk: &[u8], sink: &mut dyn EventSink) -> bool {
        if self.sticky_error.is_some() {
            return false;
        }
        if self.ended {
            return self.fail("feed after end");
        }

        let mut pos = 0usize;
        // Resume whatever token was in progress using the new chunk as its
        // continuation, without copying the rest of `chunk` up front.
        if self.partial_kind != PartialKind::None {
            match self.resume_partial(chunk, &mut pos, sink) {
                Ok(true) => {}
                Ok(false) => return true, // still incomplete, chunk exhausted
                Err(e) => return self.fail(e),
            }
        }

        while pos < chunk.len() {
            match self.step(chunk, &mut pos, sink) {
                Ok(true) => {}
                Ok(false) => return true, // value consumed the rest as a partial token
                Err(e) => return self.fail(e),
            }
        }
        true
    }

    /// Signals end of input. Returns `false` if input was truncated mid-token
    /// or mid-structure.
    pub fn end(&mut self, sink: &mut dyn EventSink) -> bool {
        if self.sticky_error.is_some() {
            return false;
        }
        self.ended = true;

        // A number has no closing delimiter: it ends at the first byte that
        // isn't part of its grammar, or at end of input. Flush it here.
        if self.partial_kind == PartialKind::Number {
            let bytes = std::mem::take(&mut self.partial);
            self.partial_kind = PartialKind::None;
            if self.emit(Event::Number(bytes), sink).is_err() {
                return self.fail("client canceled");
            }
        }

        if self.partial_kind != PartialKind::None {
            return self.fail("truncated input: unfinished token at end of stream");
        }
        if !self.stack.is_empty() {
            return self.fail("truncated input: unclosed container at end of stream");
        }
        if self.root != RootState::ExpectEnd {
            return self.fail("truncated input: no value seen before end of stream");
        }
        true
    }

    // -- structural bookkeeping -------------------------------------------

    fn after_value(&mut self) {
        match self.stack.last_mut() {
            Some(Frame::Array(state)) => *state = ArrayState::ExpectCommaOrEnd,
            Some(Frame::Object(state)) => *state = ObjectState::ExpectCommaOrEnd,
            None => self.root = RootState::ExpectEnd,
        }
    }

    fn expecting_value(&self) -> bool {
        match self.stack.last() {
            Some(Frame::Array(ArrayState::ExpectValueOrEnd)) => true,
            Some(Frame::Object(ObjectState::ExpectValue)) => true,
            None => self.root == RootState::ExpectValue,
            _ => false,
        }
    }

    fn emit(&mut self, event: Event, sink: &mut dyn EventSink) -> Result<(), &'static str> {
        if !self.expecting_value() && !matches!(event, Event::ObjectEnd | Event::ArrayEnd) {
            return Err("unexpected value in this context");
        }
        let is_key = self.as_key;
        self.as_key = false;
        if let (Event::String(bytes), true) = (&event, is_key) {
            if !sink.on_event(Event::ObjectKey(bytes.clone())) {
                return Err("client canceled");
            }
            if let Some(Frame::Object(state)) = self.stack.last_mut() {
                *state = ObjectState::ExpectColon;
            }
            return Ok(());
        }
        if !sink.on_event(event) {
            return Err("client canceled");
        }
        self.after_value();
        Ok(())
    }

    // -- main scan step ----------------------------------------------------

    /// Consumes one lexeme starting at `chunk[*pos]`. Returns `Ok(true)` if a
    /// full step was taken (caller should continue the loop), `Ok(false)` if
    /// the chunk was exhausted mid-token (state saved in `self.partial`).
    fn step(&mut self, chunk: &[u8], pos: &mut usize, sink: &mut dyn EventSink) -> Result<bool, &'static str> {
        skip_whitespace(chunk, pos);
        if *pos >= chunk.len() {
            return Ok(true);
        }
        let b = chunk[*pos];

        match b {
            b'{' => {
                if !self.expecting_value() {
                    return Err("unexpected '{'");
                }
                *pos += 1;
                self.emit(Event::ObjectStart, sink)?;
                self.stack.push(Frame::Object(ObjectState::ExpectKeyOrEnd));
                Ok(true)
            }
            b'}' => {
                *pos += 1;
                match self.stack.pop() {
                    Some(Frame::Object(ObjectState::ExpectKeyOrEnd))
                    | Some(Frame::Object(ObjectState::ExpectCommaOrEnd)) => {
                        if !sink.on_event(Event::ObjectEnd) {
                            return Err("client canceled");
                        }
                        self.after_value();
                        Ok(true)
                    }
                    _ => Err("unexpected '}'"),
                }
            }
            b'[' => {
                if !self.expecting_value() {
                    return Err("unexpected '['");
                }
                *pos += 1;
                self.emit(Event::ArrayStart, sink)?;
                self.stack.push(Frame::Array(ArrayState::ExpectValueOrEnd));
                Ok(true)
            }
            b']' => {
                *pos += 1;
                match self.stack.pop() {
                    Some(Frame::Array(ArrayState::ExpectValueOrEnd))
                    | Some(Frame::Array(ArrayState::ExpectCommaOrEnd)) => {
                        if !sink.on_event(Event::ArrayEnd) {
                            return Err("client canceled");
                        }
                        self.after_value();
                        Ok(true)
                    }
                    _ => Err("unexpected ']'"),
                }
            }
            b':' => {
                *pos += 1;
                match self.stack.last_mut() {
                    Some(Frame::Object(state)) if *state == ObjectState::ExpectColon => {
                        *state = ObjectState::ExpectValue;
                        Ok(true)
                    }
                    _ => Err("unexpected ':'"),
                }
            }
            b',' => {
                *pos += 1;
                match self.stack.last_mut() {
                    Some(Frame::Array(state)) if *state == ArrayState::ExpectCommaOrEnd => {
                        *state = ArrayState::ExpectValueOrEnd;
                        Ok(true)
                    }
                    Some(Frame::Object(state)) if *state == ObjectState::ExpectCommaOrEnd => {
                        *state = ObjectState::ExpectKeyOrEnd;
                        Ok(true)
                    }
                    _ => Err("unexpected ','"),
                }
            }
            b'"' => {
                *pos += 1;
                self.as_key = matches!(self.stack.last(), Some(Frame::Object(ObjectState::ExpectKeyOrEnd)));
                self.partial_kind = PartialKind::String {
                    in_escape: false,
                    unicode_remaining: 0,
                    unicode_value: 0,
                    pending_high_surrogate: None,
                };
                self.partial.clear();
                self.continue_string(chunk, pos, sink)
            }
            b'-' | b'0'..=b'9' => {
                self.partial_kind = PartialKind::Number;
                self.partial.clear();
                self.continue_number(chunk, pos, sink)
            }
            b't' => self.start_literal(chunk, pos, b"true", sink),
            b'f' => self.start_literal(chunk, pos, b"false", sink),
            b'n' => self.start_literal(chunk, pos, b"null", sink),
            b'/' => {
                *pos += 1;
                self.partial_kind = PartialKind::SlashAmbiguous;
                self.continue_comment_start(chunk, pos)
            }
            other => Err(lexer_error_for_byte(other)),
        }
    }

    fn start_literal(
        &mut self,
        chunk: &[u8],
        pos: &mut usize,
        expected: &'static [u8],
        sink: &mut dyn EventSink,
    ) -> Result<bool, &'static str> {
        self.partial_kind = PartialKind::Literal { expected };
        self.partial.clear();
        self.continue_literal(chunk, pos, sink)
    }

    // -- resumable sub-scanners ---------------------------------------------

    fn resume_partial(
        &mut self,
        chunk: &[u8],
        pos: &mut usize,
        sink: &mut dyn EventSink,
    ) -> Result<bool, &'static str> {
        match self.partial_kind {
            PartialKind::String { .. } => self.continue_string(chunk, pos, sink),
            PartialKind::Number => self.continue_number(chunk, pos, sink),
            PartialKind::Literal { .. } => self.continue_literal(chunk, pos, sink),
            PartialKind::LineComment => {
                self.continue_line_comment(chunk, pos);
                Ok(self.partial_kind == PartialKind::None)
            }
            PartialKind::BlockComment { .. } => self.continue_block_comment(chunk, pos),
            PartialKind::SlashAmbiguous => self.continue_comment_start(chunk, pos),
            PartialKind::None => Ok(true),
        }
    }

    fn continue_string(
        &mut self,
        chunk: &[u8],
        pos: &mut usize,
        sink: &mut dyn EventSink,
    ) -> Result<bool, &'static str> {
        let (mut in_escape, mut unicode_remaining, mut unicode_value, mut pending_high_surrogate) =
            match self.partial_kind {
                PartialKind::String {
                    in_escape,
                    unicode_remaining,
                    unicode_value,
                    pending_high_surrogate,
                } => (in_escape, unicode_remaining, unicode_value, pending_high_surrogate),
                _ => unreachable!(),
            };

        while *pos < chunk.len() {
            let b = chunk[*pos];
            *pos += 1;

            if unicode_remaining > 0 {
                let digit = (b as char).to_digit(16).ok_or("invalid \\u escape")?;
                unicode_value = (unicode_value << 4) | digit as u16;
                unicode_remaining -= 1;
                if unicode_remaining == 0 {
                    push_unicode_escape(&mut self.partial, unicode_value, &mut pending_high_surrogate);
                }
                continue;
            }

            if in_escape {
                match b {
                    b'"' | b'\\' | b'/' => self.partial.push(b),
                    b'b' => self.partial.push(0x08),
                    b'f' => self.partial.push(0x0c),
                    b'n' => self.partial.push(b'\n'),
                    b'r' => self.partial.push(b'\r'),
                    b't' => self.partial.push(b'\t'),
                    b'u' => {
                        unicode_remaining = 4;
                        unicode_value = 0;
                        in_escape = false;
                        continue;
                    }
                    _ => return Err("invalid escape sequence"),
                }
                in_escape = false;
                continue;
            }

            match b {
                b'"' => {
                    let bytes = std::mem::take(&mut self.partial);
                    self.partial_kind = PartialKind::None;
                    self.emit(Event::String(bytes), sink)?;
                    return Ok(true);
                }
                b'\\' => in_escape = true,
                _ => self.partial.push(b),
            }
        }

        self.partial_kind = PartialKind::String {
            in_escape,
            unicode_remaining,
            unicode_value,
            pending_high_surrogate,
        };
        Ok(false)
    }

    fn continue_number(
        &mut self,
        chunk: &[u8],
        pos: &mut usize,
        sink: &mut dyn EventSink,
    ) -> Result<bool, &'static str> {
        while *pos < chunk.len() {
            let b = chunk[*pos];
            if matches!(b, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E') {
                self.partial.push(b);
                *pos += 1;
            } else {
                break;
            }
        }

        if *pos >= chunk.len() {
            // Number grammar has no closing delimiter; it ends only where a
            // structural byte or end-of-input follows, so this chunk may
            // still be mid-literal even though we consumed all of it.
            return Ok(false);
        }

        let bytes = std::mem::take(&mut self.partial);
        self.partial_kind = PartialKind::None;
        self.emit(Event::Number(bytes), sink)?;
        Ok(true)
    }

    fn continue_literal(
        &mut self,
        chunk: &[u8],
        pos: &mut usize,
        sink: &mut dyn EventSink,
    ) -> Result<bool, &'static str> {
        let expected = match self.partial_kind {
            PartialKind::Literal { expected } => expected,
            _ => unreachable!(),
        };

        while *pos < chunk.len() && self.partial.len() < expected.len() {
            let b = chunk[*pos];
            if b != expected[self.partial.len()] {
                return Err("invalid literal");
            }
            self.partial.push(b);
            *pos += 1;
        }

        if self.partial.len() < expected.len() {
            return Ok(false);
        }

        self.partial_kind = PartialKind::None;
        self.partial.clear();
        let event = match expected {
            b"true" => Event::Boolean(true),
            b"false" => Event::Boolean(false),
            b"null" => Event::Null,
            _ => unreachable!(),
        };
        self.emit(event, sink)?;
        Ok(true)
    }

    fn continue_comment_start(&mut self, chunk: &[u8], pos: &mut usize) -> Result<bool, &'static str> {
        if *pos >= chunk.len() {
            return Ok(false);
        }
        let b = chunk[*pos];
        *pos += 1;
        match b {
            b'/' => {
                self.partial_kind = PartialKind::LineComment;
                self.continue_line_comment(chunk, pos);
                Ok(self.partial_kind == PartialKind::None)
            }
            b'*' => {
                self.partial_kind = PartialKind::BlockComment { saw_star: false };
                self.continue_block_comment(chunk, pos)
            }
            _ => Err("unexpected '/'"),
        }
    }

    fn continue_line_comment(&mut self, chunk: &[u8], pos: &mut usize) {
        while *pos < chunk.len() {
            let b = chunk[*pos];
            *pos += 1;
            if b == b'\n' {
                self.partial_kind = PartialKind::None;
                return;
            }
        }
    }

    fn continue_block_comment(&mut self, chunk: &[u8], pos: &mut usize) -> Result<bool, &'static str> {
        let mut saw_star = match self.partial_kind {
            PartialKind::BlockComment { saw_star } => saw_star,
            _ => unreachable!(),
        };
        while *pos < chunk.len() {
            let b = chunk[*pos];
            *pos += 1;
            if saw_star && b == b'/' {
                self.partial_kind = PartialKind::None;
                return Ok(true);
            }
            saw_star = b == b'*';
        }
        self.partial_kind = PartialKind::BlockComment { saw_star };
        Ok(false)
    }
}

impl Default for Lexer {
    fn default() -> Self {
        Lexer::new()
    }
}

/// Appends the UTF-8 encoding of a completed `\uXXXX` escape to `out`,
/// merging a preceding high surrogate with a following low surrogate per
/// RFC 8259; a high surrogate with no matching low surrogate, or a lone low
/// surrogate, is replaced with U+FFFD.
pub(crate) fn push_unicode_escape(out: &mut Vec<u8>, unit: u16, pending_high_surrogate: &mut Option<u16>) {
    const REPLACEMENT: char = '\u{FFFD}';

    if let Some(high) = pending_high_surrogate.take() {
        if (0xDC00..=0xDFFF).contains(&unit) {
            let codepoint = 0x10000 + ((high - 0xD800) as u32) * 0x400 + (unit - 0xDC00) as u32;
            if let Some(ch) = char::from_u32(codepoint) {
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                return;
            }
        }
        // Unpaired high surrogate: emit a replacement for it, then fall
        // through to handle `unit` on its own.
        let mut buf = [0u8; 4];
        out.extend_from_slice(REPLACEMENT.encode_utf8(&mut buf).as_bytes());
    }

    if (0xD800..=0xDBFF).contains(&unit) {
        *pending_high_surrogate = Some(unit);
        return;
    }

    let mut buf = [0u8; 4];
    let ch = char::from_u32(unit as u32).unwrap_or(REPLACEMENT);
    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
}

fn skip_whitespace(chunk: &[u8], pos: &mut usize) {
    while *pos < chunk.len() && matches!(chunk[*pos], b' ' | b'\t' | b'\n' | b'\r') {
        *pos += 1;
    }
}

fn lexer_error_for_byte(b: u8) -> &'static str {
    if b.is_ascii() {
        "unexpected byte in input"
    } else {
        "unexpected non-ASCII byte outside a string"
    }
}

impl From<&'static str> for Error {
    fn from(message: &'static str) -> Error {
        Error::Syntax(message.to_string())
    }
}

pub fn category_of_lex_failure() -> ErrorCategory {
    ErrorCategory::Syntax
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Collector(Vec<Event>);
    impl EventSink for Collector {
        fn on_event(&mut self, event: Event) -> bool {
            self.0.push(event);
            true
        }
    }

    fn parse_all(input: &[u8]) -> (Vec<Event>, bool) {
        let mut lexer = Lexer::new();
        let mut collector = Collector(Vec::new());
        let fed_ok = lexer.feed(input, &mut collector);
        let ended_ok = fed_ok && lexer.end(&mut collector);
        (collector.0, ended_ok)
    }

    #[test]
    fn parses_flat_object() {
        let (events, ok) = parse_all(br#"{"a":1,"b":true}"#);
        assert!(ok);
        assert_eq!(
            events,
            vec![
                Event::ObjectStart,
                Event::ObjectKey(b"a".to_vec()),
                Event::Number(b"1".to_vec()),
                Event::ObjectKey(b"b".to_vec()),
                Event::Boolean(true),
                Event::ObjectEnd,
            ]
        );
    }

    #[test]
    fn parses_nested_array() {
        let (events, ok) = parse_all(b"[1, [2, 3], null]");
        assert!(ok);
        assert_eq!(
            events,
            vec![
                Event::ArrayStart,
                Event::Number(b"1".to_vec()),
                Event::ArrayStart,
                Event::Number(b"2".to_vec()),
                Event::Number(b"3".to_vec()),
                Event::ArrayEnd,
                Event::Null,
                Event::ArrayEnd,
            ]
        );
    }

    #[test]
    fn byte_by_byte_feed_matches_whole_feed() {
        let input: &[u8] = br#"{"enum":3,"ebool":true,"earray":[6,"brdm"]}"#;

        let mut whole = Collector(Vec::new());
        let mut lexer_whole = Lexer::new();
        assert!(lexer_whole.feed(input, &mut whole));
        assert!(lexer_whole.end(&mut whole));

        let mut piecewise = Collector(Vec::new());
        let mut lexer_piecewise = Lexer::new();
        for byte in input {
            assert!(lexer_piecewise.feed(std::slice::from_ref(byte), &mut piecewise));
        }
        assert!(lexer_piecewise.end(&mut piecewise));

        assert_eq!(whole.0, piecewise.0);
    }

    #[test]
    fn resumes_a_string_split_mid_escape() {
        let mut lexer = Lexer::new();
        let mut collector = Collector(Vec::new());
        assert!(lexer.feed(b"\"a\\", &mut collector));
        assert!(lexer.feed(b"n", &mut collector));
        assert!(lexer.feed(b"b\"", &mut collector));
        assert!(lexer.end(&mut collector));
        assert_eq!(collector.0, vec![Event::String(b"a\nb".to_vec())]);
    }

    #[test]
    fn accepts_line_and_block_comments() {
        let (events, ok) = parse_all(b"[1, // trailing\n2, /* block */ 3]");
        assert!(ok);
        assert_eq!(
            events,
            vec![
                Event::ArrayStart,
                Event::Number(b"1".to_vec()),
                Event::Number(b"2".to_vec()),
                Event::Number(b"3".to_vec()),
                Event::ArrayEnd,
            ]
        );
    }

    #[test]
    fn truncated_object_fails_at_end() {
        let mut lexer = Lexer::new();
        let mut collector = Collector(Vec::new());
        assert!(lexer.feed(br#"{"a":1"#, &mut collector));
        assert!(!lexer.end(&mut collector));
        assert!(lexer.error().is_some());
    }

    #[test]
    fn cancel_from_sink_stops_feed() {
        struct Canceling(usize);
        impl EventSink for Canceling {
            fn on_event(&mut self, _event: Event) -> bool {
                self.0 += 1;
                self.0 < 2
            }
        }
        let mut lexer = Lexer::new();
        let mut sink = Canceling(0);
        assert!(!lexer.feed(b"[1,2,3]", &mut sink));
        assert_eq!(lexer.error(), Some("client canceled"));
    }
}
