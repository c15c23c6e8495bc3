//! Session objects (§4.11): the SAX and DOM parsing sessions, sharing the
//! same lexer plumbing and (when a schema is attached) the same validator.

use crate::dom::DomBuilder;
use crate::lexer::{Event, EventSink, Lexer};
use crate::schema::{validate, CompiledSchema};
use crate::value::Value;

/// Receives parsed events from a [`SaxSession`]. Mirrors [`EventSink`] at the
/// session boundary so callers don't need to depend on the lexer module
/// directly. Returning `false` cancels the session the same way an
/// [`EventSink`] cancellation does.
pub trait SaxCallbacks {
    fn on_event(&mut self, event: Event) -> bool;
}

impl<F: FnMut(Event) -> bool> SaxCallbacks for F {
    fn on_event(&mut self, event: Event) -> bool {
        self(event)
    }
}

/// Forwards every event to the caller's callback table and, when a schema is
/// attached, also mirrors it into a transient [`DomBuilder`] so the session
/// can validate the finished document at `end()`. A SAX session never
/// exposes that shadow tree to the caller; it exists purely to give the
/// validator (§4.8, built as a whole-tree checker — see DESIGN.md) something
/// to check.
struct SessionSink<'a> {
    callbacks: &'a mut dyn SaxCallbacks,
    shadow: Option<DomBuilder>,
}

impl EventSink for SessionSink<'_> {
    fn on_event(&mut self, event: Event) -> bool {
        if let Some(shadow) = &mut self.shadow {
            if !shadow.on_event(event.clone()) {
                return false;
            }
        }
        self.callbacks.on_event(event)
    }
}

/// A streaming (SAX) parsing session: feeds bytes through the lexer and
/// delivers events to a caller-supplied callback table, optionally
/// validating the document against a schema as it closes.
pub struct SaxSession {
    lexer: Lexer,
    schema: Option<CompiledSchema>,
    shadow: Option<DomBuilder>,
    sticky_error: Option<String>,
    ended: bool,
}

impl SaxSession {
    pub fn new(schema: Option<CompiledSchema>) -> SaxSession {
        let shadow = schema.as_ref().map(|_| DomBuilder::new());
        SaxSession {
            lexer: Lexer::new(),
            schema,
            shadow,
            sticky_error: None,
            ended: false,
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.sticky_error.as_deref().or_else(|| self.lexer.error())
    }

    /// Feeds the next chunk to the lexer, delivering events to `callbacks`.
    /// Returns `false` on syntax error or caller cancellation.
    pub fn feed(&mut self, bytes: &[u8], callbacks: &mut dyn SaxCallbacks) -> bool {
        if self.sticky_error.is_some() || self.ended {
            return false;
        }
        let shadow = self.shadow.take();
        let mut sink = SessionSink { callbacks, shadow };
        let ok = self.lexer.feed(bytes, &mut sink);
        self.shadow = sink.shadow;
        if !ok {
            self.sticky_error = Some(
                self.lexer
                    .error()
                    .unwrap_or("client canceled parse")
                    .to_string(),
            );
        }
        ok
    }

    /// Closes the document. If a schema is attached, the transient shadow
    /// tree built alongside the callback stream is validated here.
    pub fn end(&mut self, callbacks: &mut dyn SaxCallbacks) -> bool {
        if self.sticky_error.is_some() || self.ended {
            return false;
        }
        self.ended = true;
        let shadow = self.shadow.take();
        let mut sink = SessionSink { callbacks, shadow };
        if !self.lexer.end(&mut sink) {
            self.sticky_error = Some(
                self.lexer
                    .error()
                    .unwrap_or("document truncated")
                    .to_string(),
            );
            return false;
        }
        if let Some(schema) = &self.schema {
            let document = sink
                .shadow
                .take()
                .and_then(DomBuilder::finish)
                .unwrap_or_else(Value::invalid);
            let (ok, err) = validate(&document, schema);
            if !ok {
                self.sticky_error =
                    Some(err.map(|e| e.to_string()).unwrap_or_else(|| "validation failed".into()));
                return false;
            }
        }
        true
    }
}

/// A whole-document (DOM) parsing session: feeds bytes through the lexer
/// into a [`DomBuilder`], validating against a schema (if attached) once the
/// document closes, and exposing the finished root value via [`result`].
pub struct DomSession {
    lexer: Lexer,
    builder: DomBuilder,
    schema: Option<CompiledSchema>,
    result: Option<Value>,
    sticky_error: Option<String>,
    ended: bool,
}

impl DomSession {
    pub fn new(schema: Option<CompiledSchema>) -> DomSession {
        DomSession {
            lexer: Lexer::new(),
            builder: DomBuilder::new(),
            schema,
            result: None,
            sticky_error: None,
            ended: false,
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.sticky_error.as_deref().or_else(|| self.lexer.error())
    }

    pub fn feed(&mut self, bytes: &[u8]) -> bool {
        if self.sticky_error.is_some() || self.ended {
            return false;
        }
        let ok = self.lexer.feed(bytes, &mut self.builder);
        if !ok {
            self.sticky_error = Some(
                self.lexer
                    .error()
                    .unwrap_or("client canceled parse")
                    .to_string(),
            );
        }
        ok
    }

    pub fn end(&mut self) -> bool {
        if self.sticky_error.is_some() || self.ended {
            return false;
        }
        self.ended = true;
        if !self.lexer.end(&mut self.builder) {
            self.sticky_error = Some(
                self.lexer
                    .error()
                    .unwrap_or("document truncated")
                    .to_string(),
            );
            return false;
        }
        let builder = std::mem::replace(&mut self.builder, DomBuilder::new());
        let document = builder.finish().unwrap_or_else(Value::invalid);
        if let Some(schema) = &self.schema {
            let (ok, err) = validate(&document, schema);
            if !ok {
                self.sticky_error =
                    Some(err.map(|e| e.to_string()).unwrap_or_else(|| "validation failed".into()));
                self.result = Some(document);
                return false;
            }
        }
        self.result = Some(document);
        true
    }

    /// The finished root value. Available after a successful `end()`; the
    /// source's semantics (return the document even on schema validation
    /// failure so the caller can still inspect it) are preserved above.
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dom_session_parses_and_exposes_result() {
        let mut session = DomSession::new(None);
        assert!(session.feed(br#"{"a":1}"#));
        assert!(session.end());
        let value = session.result().expect("result");
        let (n, _) = value.get("a").as_i64();
        assert_eq!(n, 1);
    }

    #[test]
    fn dom_session_reports_schema_violation() {
        let schema_doc = crate::value::Value::empty_object();
        schema_doc.put("type".into(), crate::value::Value::string_copied("array"));
        let schema = crate::schema::compile(&schema_doc, "relative:///test").unwrap();
        let mut session = DomSession::new(Some(schema));
        assert!(session.feed(b"1"));
        assert!(!session.end());
        assert!(session.error().is_some());
    }

    #[test]
    fn sax_session_delivers_events_to_callback() {
        let mut session = SaxSession::new(None);
        let mut seen = Vec::new();
        let mut callbacks = |event: Event| {
            seen.push(event);
            true
        };
        assert!(session.feed(br#"[1,2]"#, &mut callbacks));
        assert!(session.end(&mut callbacks));
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn sax_session_cancellation_stops_feed() {
        let mut session = SaxSession::new(None);
        let mut callbacks = |_: Event| false;
        assert!(!session.feed(br#"[1,2]"#, &mut callbacks));
        assert!(session.error().is_some());
    }
}
