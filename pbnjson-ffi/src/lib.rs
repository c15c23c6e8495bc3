//! C FFI bindings for pbnjson-core.
//!
//! This crate provides a C-compatible API for use from other languages
//! like C#, Python, and Node.js.

use pbnjson_core::{self as pj_core, CompiledSchema, DomSession, Event, SaxCallbacks, SaxSession, Value};
use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::path::PathBuf;
use std::ptr;

// =============================================================================
// Thread-Local Error Storage
// =============================================================================

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = RefCell::new(None);
}

fn set_last_error(msg: String) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = Some(msg);
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Get the last error message. Returns NULL if no error. Caller must free
/// with `pj_string_free`.
#[no_mangle]
pub extern "C" fn pj_get_last_error() -> *mut c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(msg) => CString::new(msg.as_str())
            .map(|c| c.into_raw())
            .unwrap_or(ptr::null_mut()),
        None => ptr::null_mut(),
    })
}

#[no_mangle]
pub extern "C" fn pj_clear_error() {
    clear_last_error();
}

/// Frees a string previously returned by this library.
#[no_mangle]
pub unsafe extern "C" fn pj_string_free(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    drop(CString::from_raw(s));
}

// =============================================================================
// Opaque Types
// =============================================================================

pub struct PjValue {
    inner: Value,
}

pub struct PjSchema {
    inner: CompiledSchema,
}

pub struct PjDomSession {
    inner: DomSession,
}

// =============================================================================
// Helpers
// =============================================================================

unsafe fn bytes_from_raw<'a>(ptr: *const u8, len: usize) -> Option<&'a [u8]> {
    if ptr.is_null() {
        None
    } else {
        Some(std::slice::from_raw_parts(ptr, len))
    }
}

unsafe fn str_from_cstr<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

fn to_c_string(s: &str) -> *mut c_char {
    CString::new(s)
        .map(|c| c.into_raw())
        .unwrap_or(ptr::null_mut())
}

fn box_value(v: Value) -> *mut PjValue {
    Box::into_raw(Box::new(PjValue { inner: v }))
}

unsafe fn value_ref<'a>(handle: *const PjValue) -> Option<&'a Value> {
    handle.as_ref().map(|h| &h.inner)
}

unsafe fn schema_ref<'a>(handle: *const PjSchema) -> Option<&'a CompiledSchema> {
    handle.as_ref().map(|h| &h.inner)
}

// =============================================================================
// Schema lifecycle (§6.2 item 2)
// =============================================================================

/// Parses `bytes` as JSON and compiles the result as a schema. Returns NULL
/// on failure; check `pj_get_last_error`.
#[no_mangle]
pub unsafe extern "C" fn pj_schema_parse_from_bytes(
    bytes: *const u8,
    len: usize,
    base_uri: *const c_char,
) -> *mut PjSchema {
    clear_last_error();
    let Some(bytes) = bytes_from_raw(bytes, len) else {
        set_last_error("null byte pointer".into());
        return ptr::null_mut();
    };
    let Some(base_uri) = (str_from_cstr(base_uri)) else {
        set_last_error("invalid or null base_uri".into());
        return ptr::null_mut();
    };
    match pj_core::parse_from_bytes(bytes, base_uri) {
        Ok(schema) => Box::into_raw(Box::new(PjSchema { inner: schema })),
        Err(e) => {
            set_last_error(e.to_string());
            ptr::null_mut()
        }
    }
}

/// Compiles a schema from an on-disk JSON file.
#[no_mangle]
pub unsafe extern "C" fn pj_schema_parse_from_file(
    path: *const c_char,
    base_uri: *const c_char,
) -> *mut PjSchema {
    clear_last_error();
    let (Some(path), Some(base_uri)) =
        (str_from_cstr(path), str_from_cstr(base_uri))
    else {
        set_last_error("invalid or null path/base_uri".into());
        return ptr::null_mut();
    };
    match pj_core::parse_schema_file(PathBuf::from(path), base_uri) {
        Ok(schema) => Box::into_raw(Box::new(PjSchema { inner: schema })),
        Err(e) => {
            set_last_error(e.to_string());
            ptr::null_mut()
        }
    }
}

/// Copy (refcount bump) of a compiled schema handle.
#[no_mangle]
pub unsafe extern "C" fn pj_schema_copy(handle: *const PjSchema) -> *mut PjSchema {
    match schema_ref(handle) {
        Some(schema) => Box::into_raw(Box::new(PjSchema {
            inner: schema.clone(),
        })),
        None => ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn pj_schema_release(handle: *mut PjSchema) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

// =============================================================================
// Validation (§6.2 item 3)
// =============================================================================

#[no_mangle]
pub unsafe extern "C" fn pj_validate(value: *const PjValue, schema: *const PjSchema) -> bool {
    clear_last_error();
    let (Some(value), Some(schema)) =
        (value_ref(value), schema_ref(schema))
    else {
        set_last_error("null value or schema handle".into());
        return false;
    };
    let (ok, err) = pj_core::validate(value, schema);
    if let Some(e) = err {
        set_last_error(e.to_string());
    }
    ok
}

/// Validates after splicing schema-declared defaults into `value` in place.
#[no_mangle]
pub unsafe extern "C" fn pj_apply(value: *const PjValue, schema: *const PjSchema) -> bool {
    clear_last_error();
    let (Some(value), Some(schema)) =
        (value_ref(value), schema_ref(schema))
    else {
        set_last_error("null value or schema handle".into());
        return false;
    };
    let (ok, err) = pj_core::apply(value, schema);
    if let Some(e) = err {
        set_last_error(e.to_string());
    }
    ok
}

// =============================================================================
// One-shot parsing (§6.2 item 4)
// =============================================================================

#[no_mangle]
pub unsafe extern "C" fn pj_parse(
    bytes: *const u8,
    len: usize,
    schema: *const PjSchema,
) -> *mut PjValue {
    clear_last_error();
    let Some(bytes) = bytes_from_raw(bytes, len) else {
        set_last_error("null byte pointer".into());
        return ptr::null_mut();
    };
    let schema = schema_ref(schema);
    match pj_core::parse(bytes, schema) {
        Ok(v) => box_value(v),
        Err(e) => {
            set_last_error(e.to_string());
            ptr::null_mut()
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn pj_parse_file(path: *const c_char, schema: *const PjSchema) -> *mut PjValue {
    clear_last_error();
    let Some(path) = str_from_cstr(path) else {
        set_last_error("invalid or null path".into());
        return ptr::null_mut();
    };
    let schema = schema_ref(schema);
    match pj_core::parse_file(PathBuf::from(path), schema) {
        Ok(v) => box_value(v),
        Err(e) => {
            set_last_error(e.to_string());
            ptr::null_mut()
        }
    }
}

// =============================================================================
// Streaming DOM sessions (§4.11, §6.2 item 4)
// =============================================================================

#[no_mangle]
pub unsafe extern "C" fn pj_dom_session_new(schema: *const PjSchema) -> *mut PjDomSession {
    let schema = schema_ref(schema).cloned();
    Box::into_raw(Box::new(PjDomSession {
        inner: DomSession::new(schema),
    }))
}

#[no_mangle]
pub unsafe extern "C" fn pj_dom_session_feed(
    handle: *mut PjDomSession,
    bytes: *const u8,
    len: usize,
) -> bool {
    clear_last_error();
    let (Some(session), Some(bytes)) = (handle.as_mut(), bytes_from_raw(bytes, len))
    else {
        set_last_error("null session or byte pointer".into());
        return false;
    };
    let ok = session.inner.feed(bytes);
    if !ok {
        set_last_error(session.inner.error().unwrap_or("feed failed").to_string());
    }
    ok
}

#[no_mangle]
pub unsafe extern "C" fn pj_dom_session_end(handle: *mut PjDomSession) -> bool {
    clear_last_error();
    let Some(session) = (handle.as_mut()) else {
        set_last_error("null session handle".into());
        return false;
    };
    let ok = session.inner.end();
    if !ok {
        set_last_error(session.inner.error().unwrap_or("end failed").to_string());
    }
    ok
}

#[no_mangle]
pub unsafe extern "C" fn pj_dom_session_error(handle: *const PjDomSession) -> *mut c_char {
    match handle.as_ref().and_then(|s| s.inner.error()) {
        Some(msg) => to_c_string(msg),
        None => ptr::null_mut(),
    }
}

/// Returns the finished root value after a successful `end`. Ownership of
/// the returned handle passes to the caller; release it with
/// `pj_value_release`.
#[no_mangle]
pub unsafe extern "C" fn pj_dom_session_result(handle: *const PjDomSession) -> *mut PjValue {
    match handle.as_ref().and_then(|s| s.inner.result()) {
        Some(v) => box_value(v.clone()),
        None => ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn pj_dom_session_release(handle: *mut PjDomSession) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

// =============================================================================
// Streaming SAX sessions (§4.11, §6.2 item 4)
// =============================================================================

/// Discriminant for the event delivered to a [`PjEventCallback`]. `data`/`len`
/// are only meaningful for `ObjectKey`, `String`, and `Number`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PjEventKind {
    ObjectStart = 0,
    ObjectEnd = 1,
    ObjectKey = 2,
    ArrayStart = 3,
    ArrayEnd = 4,
    String = 5,
    Number = 6,
    BooleanTrue = 7,
    BooleanFalse = 8,
    Null = 9,
}

/// Returning `false` cancels the parse, the same as an `EventSink` returning
/// `false` does on the Rust side.
pub type PjEventCallback =
    extern "C" fn(user_data: *mut c_void, kind: PjEventKind, data: *const u8, len: usize) -> bool;

struct CCallbackSink {
    callback: PjEventCallback,
    user_data: *mut c_void,
}

impl SaxCallbacks for CCallbackSink {
    fn on_event(&mut self, event: Event) -> bool {
        match event {
            Event::ObjectStart => (self.callback)(self.user_data, PjEventKind::ObjectStart, ptr::null(), 0),
            Event::ObjectEnd => (self.callback)(self.user_data, PjEventKind::ObjectEnd, ptr::null(), 0),
            Event::ArrayStart => (self.callback)(self.user_data, PjEventKind::ArrayStart, ptr::null(), 0),
            Event::ArrayEnd => (self.callback)(self.user_data, PjEventKind::ArrayEnd, ptr::null(), 0),
            Event::Null => (self.callback)(self.user_data, PjEventKind::Null, ptr::null(), 0),
            Event::Boolean(b) => {
                let kind = if b { PjEventKind::BooleanTrue } else { PjEventKind::BooleanFalse };
                (self.callback)(self.user_data, kind, ptr::null(), 0)
            }
            Event::ObjectKey(bytes) => {
                (self.callback)(self.user_data, PjEventKind::ObjectKey, bytes.as_ptr(), bytes.len())
            }
            Event::String(bytes) => {
                (self.callback)(self.user_data, PjEventKind::String, bytes.as_ptr(), bytes.len())
            }
            Event::Number(bytes) => {
                (self.callback)(self.user_data, PjEventKind::Number, bytes.as_ptr(), bytes.len())
            }
        }
    }
}

pub struct PjSaxSession {
    inner: SaxSession,
    sink: CCallbackSink,
}

/// `user_data` is handed back to `callback` unchanged on every event; the
/// caller owns whatever it points to and must keep it alive for the
/// session's lifetime.
#[no_mangle]
pub unsafe extern "C" fn pj_sax_session_new(
    schema: *const PjSchema,
    callback: PjEventCallback,
    user_data: *mut c_void,
) -> *mut PjSaxSession {
    let schema = schema_ref(schema).cloned();
    Box::into_raw(Box::new(PjSaxSession {
        inner: SaxSession::new(schema),
        sink: CCallbackSink { callback, user_data },
    }))
}

#[no_mangle]
pub unsafe extern "C" fn pj_sax_session_feed(
    handle: *mut PjSaxSession,
    bytes: *const u8,
    len: usize,
) -> bool {
    clear_last_error();
    let (Some(session), Some(bytes)) = (handle.as_mut(), bytes_from_raw(bytes, len))
    else {
        set_last_error("null session or byte pointer".into());
        return false;
    };
    let ok = session.inner.feed(bytes, &mut session.sink);
    if !ok {
        set_last_error(session.inner.error().unwrap_or("feed failed").to_string());
    }
    ok
}

#[no_mangle]
pub unsafe extern "C" fn pj_sax_session_end(handle: *mut PjSaxSession) -> bool {
    clear_last_error();
    let Some(session) = (handle.as_mut()) else {
        set_last_error("null session handle".into());
        return false;
    };
    let ok = session.inner.end(&mut session.sink);
    if !ok {
        set_last_error(session.inner.error().unwrap_or("end failed").to_string());
    }
    ok
}

#[no_mangle]
pub unsafe extern "C" fn pj_sax_session_error(handle: *const PjSaxSession) -> *mut c_char {
    match handle.as_ref().and_then(|s| s.inner.error()) {
        Some(msg) => to_c_string(msg),
        None => ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn pj_sax_session_release(handle: *mut PjSaxSession) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

// =============================================================================
// Value handles (§6.2 item 1)
// =============================================================================

#[no_mangle]
pub unsafe extern "C" fn pj_value_copy(handle: *const PjValue) -> *mut PjValue {
    match value_ref(handle) {
        Some(v) => box_value(v.copy()),
        None => ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn pj_value_duplicate(handle: *const PjValue) -> *mut PjValue {
    match value_ref(handle) {
        Some(v) => box_value(v.duplicate()),
        None => ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn pj_value_release(handle: *mut PjValue) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

#[no_mangle]
pub unsafe extern "C" fn pj_value_is_object(handle: *const PjValue) -> bool {
    value_ref(handle).map(Value::is_object).unwrap_or(false)
}

#[no_mangle]
pub unsafe extern "C" fn pj_value_is_array(handle: *const PjValue) -> bool {
    value_ref(handle).map(Value::is_array).unwrap_or(false)
}

#[no_mangle]
pub unsafe extern "C" fn pj_value_size(handle: *const PjValue) -> usize {
    value_ref(handle).map(Value::size).unwrap_or(0)
}

/// Looks up `key` in an object value. Returns NULL (not `invalid`) on a
/// null/non-object handle; an absent key returns an `invalid`-variant value
/// handle, matching `Value::get`'s own missing-key behavior.
#[no_mangle]
pub unsafe extern "C" fn pj_value_get(handle: *const PjValue, key: *const c_char) -> *mut PjValue {
    let (Some(value), Some(key)) = (value_ref(handle), str_from_cstr(key))
    else {
        return ptr::null_mut();
    };
    box_value(value.get(key))
}

// =============================================================================
// Stringification (§6.2 item 5)
// =============================================================================

#[no_mangle]
pub unsafe extern "C" fn pj_stringify(handle: *const PjValue) -> *mut c_char {
    match value_ref(handle) {
        Some(v) => {
            let bytes = pj_core::stringify(v);
            match String::from_utf8(bytes) {
                Ok(s) => to_c_string(&s),
                Err(_) => ptr::null_mut(),
            }
        }
        None => ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn pj_prettify(handle: *const PjValue, indent: *const c_char) -> *mut c_char {
    clear_last_error();
    let (Some(v), Some(indent)) = (value_ref(handle), str_from_cstr(indent))
    else {
        set_last_error("null value handle or indent".into());
        return ptr::null_mut();
    };
    match pj_core::prettify(v, indent) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(s) => to_c_string(&s),
            Err(_) => ptr::null_mut(),
        },
        Err(e) => {
            set_last_error(e.to_string());
            ptr::null_mut()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn parse_validate_and_release_round_trip() {
        unsafe {
            let base = CString::new("relative:///ffi-test").unwrap();
            let schema_json = br#"{"type":"object","required":["a"]}"#;
            let schema = pj_schema_parse_from_bytes(
                schema_json.as_ptr(),
                schema_json.len(),
                base.as_ptr(),
            );
            assert!(!schema.is_null());

            let doc_json = br#"{"a":1}"#;
            let value = pj_parse(doc_json.as_ptr(), doc_json.len(), schema);
            assert!(!value.is_null());
            assert!(pj_validate(value, schema));

            pj_value_release(value);
            pj_schema_release(schema);
        }
    }

    #[test]
    fn dom_session_streams_and_stringifies() {
        unsafe {
            let session = pj_dom_session_new(ptr::null());
            let chunk = br#"{"x":1}"#;
            assert!(pj_dom_session_feed(session, chunk.as_ptr(), chunk.len()));
            assert!(pj_dom_session_end(session));

            let result = pj_dom_session_result(session);
            assert!(!result.is_null());
            let out = pj_stringify(result);
            assert!(!out.is_null());
            let s = CStr::from_ptr(out).to_str().unwrap().to_string();
            assert_eq!(s, r#"{"x":1}"#);

            pj_string_free(out);
            pj_value_release(result);
            pj_dom_session_release(session);
        }
    }

    extern "C" fn count_events(
        user_data: *mut c_void,
        _kind: PjEventKind,
        _data: *const u8,
        _len: usize,
    ) -> bool {
        let counter = unsafe { &mut *(user_data as *mut usize) };
        *counter += 1;
        true
    }

    #[test]
    fn sax_session_delivers_events_through_c_callback() {
        unsafe {
            let mut count: usize = 0;
            let session = pj_sax_session_new(
                ptr::null(),
                count_events,
                &mut count as *mut usize as *mut c_void,
            );
            let chunk = br#"[1,2,3]"#;
            assert!(pj_sax_session_feed(session, chunk.as_ptr(), chunk.len()));
            assert!(pj_sax_session_end(session));
            pj_sax_session_release(session);

            assert_eq!(count, 5); // ArrayStart, 3 numbers, ArrayEnd
        }
    }
}
