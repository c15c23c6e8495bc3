//! The reference-counted value graph (§3.1-§3.5).
//!
//! A [`Value`] is a cheap-to-clone handle (`Arc`) over tagged payload data.
//! `Value::clone` is the "copy" operation from the source (a refcount bump);
//! [`Value::duplicate`] is the deep "duplicate" operation. There is no
//! explicit `release`: dropping the last `Value` handle drops the payload,
//! which is what an explicit `j_release` call bought in the source.

use std::cmp::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use std::ops::Range;

use crate::input::InputBuffer;
use crate::numeric::{self, ConversionFlags, NumberComponents};

/// An interned or ad-hoc object key. The key interner (`crate::interner`)
/// hands out deduplicated instances of this type; values constructed
/// directly from caller-owned strings use their own allocation.
pub type KeyStr = Arc<str>;

enum NumberRepr {
    /// Raw decimal bytes straight from the lexer, decoded lazily.
    Raw(Arc<[u8]>),
    Integer(i64),
    Float(f64),
    /// §3.4's "input outlives DOM, no mutation" mode: the same decoding as
    /// `Raw`, but the bytes are a range into a shared input buffer instead
    /// of an owned copy. `buffer`'s `Drop` is the deallocation hook (`munmap`
    /// for a memory-mapped file, `free` for a heap buffer).
    InputSlice { buffer: Arc<InputBuffer>, range: Range<usize> },
}

impl NumberRepr {
    fn bytes(&self) -> Option<&[u8]> {
        match self {
            NumberRepr::Raw(bytes) => Some(bytes),
            NumberRepr::InputSlice { buffer, range } => Some(&buffer.as_bytes()[range.clone()]),
            NumberRepr::Integer(_) | NumberRepr::Float(_) => None,
        }
    }
}

impl std::fmt::Debug for NumberRepr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NumberRepr::Raw(b) => f.debug_tuple("Raw").field(b).finish(),
            NumberRepr::Integer(i) => f.debug_tuple("Integer").field(i).finish(),
            NumberRepr::Float(x) => f.debug_tuple("Float").field(x).finish(),
            NumberRepr::InputSlice { range, .. } => {
                f.debug_struct("InputSlice").field("range", range).finish()
            }
        }
    }
}

/// Which [`NumberRepr`] variant backs a number value, exposed for callers
/// (the stringifier) that must choose an emission style without reaching
/// into the private representation directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberReprKind {
    Raw,
    Integer,
    Float,
}

enum StringRepr {
    Owned(Arc<str>),
    /// Shares ownership of the backing byte range with whatever produced it
    /// (an input buffer or an arena slab) rather than the source's weak
    /// reference plus deallocation hook — see DESIGN.md for why ownership
    /// sharing is the idiomatic substitute here.
    Borrowed(Arc<[u8]>),
    /// §3.4's "input outlives DOM, no mutation" mode: a byte range into a
    /// shared input buffer rather than a private allocation. `buffer`'s
    /// `Drop` runs the deallocation hook once the last reference is gone.
    InputSlice { buffer: Arc<InputBuffer>, range: Range<usize> },
}

impl StringRepr {
    fn as_bytes(&self) -> &[u8] {
        match self {
            StringRepr::Owned(s) => s.as_bytes(),
            StringRepr::Borrowed(b) => b,
            StringRepr::InputSlice { buffer, range } => &buffer.as_bytes()[range.clone()],
        }
    }
}

impl std::fmt::Debug for StringRepr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StringRepr::Owned(s) => f.debug_tuple("Owned").field(s).finish(),
            StringRepr::Borrowed(b) => f.debug_tuple("Borrowed").field(b).finish(),
            StringRepr::InputSlice { range, .. } => {
                f.debug_struct("InputSlice").field("range", range).finish()
            }
        }
    }
}

#[derive(Debug)]
enum ValueData {
    Invalid,
    Null,
    Bool(bool),
    Number(NumberRepr),
    Str(StringRepr),
    Array(Mutex<Vec<Value>>),
    Object(Mutex<IndexMap<KeyStr, Value>>),
}

/// A handle into the value graph. Cloning bumps a reference count; it never
/// copies the payload.
#[derive(Clone, Debug)]
pub struct Value(Arc<ValueData>);

static NULL: Lazy<Value> = Lazy::new(|| Value(Arc::new(ValueData::Null)));
static INVALID: Lazy<Value> = Lazy::new(|| Value(Arc::new(ValueData::Invalid)));
static TRUE: Lazy<Value> = Lazy::new(|| Value(Arc::new(ValueData::Bool(true))));
static FALSE: Lazy<Value> = Lazy::new(|| Value(Arc::new(ValueData::Bool(false))));
static EMPTY_STRING: Lazy<Value> =
    Lazy::new(|| Value(Arc::new(ValueData::Str(StringRepr::Owned(Arc::from(""))))));

impl Value {
    pub fn null() -> Value {
        NULL.clone()
    }

    /// The `invalid` sentinel returned by fallible lookups and failed parses.
    /// Distinct from `null`; releasing it (dropping the handle) is always safe.
    pub fn invalid() -> Value {
        INVALID.clone()
    }

    pub fn boolean(b: bool) -> Value {
        if b {
            TRUE.clone()
        } else {
            FALSE.clone()
        }
    }

    pub fn from_i32(v: i32) -> Value {
        Value::from_i64(v as i64)
    }

    pub fn from_i64(v: i64) -> Value {
        Value(Arc::new(ValueData::Number(NumberRepr::Integer(v))))
    }

    pub fn from_f64(v: f64) -> Value {
        debug_assert!(!v.is_nan() && !v.is_infinite(), "number value must be finite");
        Value(Arc::new(ValueData::Number(NumberRepr::Float(v))))
    }

    /// A number whose textual form is kept verbatim and decoded on demand.
    pub fn from_raw_number(bytes: impl Into<Arc<[u8]>>) -> Value {
        Value(Arc::new(ValueData::Number(NumberRepr::Raw(bytes.into()))))
    }

    /// A number whose textual form is a byte range shared with `buffer`
    /// (§3.4's zero-copy mode) instead of an owned copy.
    pub fn number_input_slice(buffer: Arc<InputBuffer>, range: Range<usize>) -> Value {
        Value(Arc::new(ValueData::Number(NumberRepr::InputSlice { buffer, range })))
    }

    pub fn string_copied(s: &str) -> Value {
        if s.is_empty() {
            return EMPTY_STRING.clone();
        }
        Value(Arc::new(ValueData::Str(StringRepr::Owned(Arc::from(s)))))
    }

    /// A string value that shares ownership of `bytes` with its producer
    /// (an input buffer or arena slab) instead of copying.
    pub fn string_borrowed(bytes: Arc<[u8]>) -> Value {
        Value(Arc::new(ValueData::Str(StringRepr::Borrowed(bytes))))
    }

    /// A string value whose payload is a byte range shared with `buffer`
    /// (§3.4's zero-copy mode) instead of an owned or arena-backed copy.
    pub fn string_input_slice(buffer: Arc<InputBuffer>, range: Range<usize>) -> Value {
        Value(Arc::new(ValueData::Str(StringRepr::InputSlice { buffer, range })))
    }

    pub fn empty_array() -> Value {
        Value(Arc::new(ValueData::Array(Mutex::new(Vec::new()))))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value(Arc::new(ValueData::Array(Mutex::new(items))))
    }

    pub fn empty_object() -> Value {
        Value(Arc::new(ValueData::Object(Mutex::new(IndexMap::new()))))
    }

    // -- variant predicates --------------------------------------------

    pub fn is_invalid(&self) -> bool {
        matches!(*self.0, ValueData::Invalid)
    }
    pub fn is_null(&self) -> bool {
        matches!(*self.0, ValueData::Null)
    }
    pub fn is_bool(&self) -> bool {
        matches!(*self.0, ValueData::Bool(_))
    }
    pub fn is_number(&self) -> bool {
        matches!(*self.0, ValueData::Number(_))
    }
    pub fn is_string(&self) -> bool {
        matches!(*self.0, ValueData::Str(_))
    }
    pub fn is_array(&self) -> bool {
        matches!(*self.0, ValueData::Array(_))
    }
    pub fn is_object(&self) -> bool {
        matches!(*self.0, ValueData::Object(_))
    }

    fn rank(&self) -> u8 {
        match &*self.0 {
            ValueData::Invalid => 0,
            ValueData::Null => 1,
            ValueData::Bool(_) => 2,
            ValueData::Number(_) => 3,
            ValueData::Str(_) => 4,
            ValueData::Array(_) => 5,
            ValueData::Object(_) => 6,
        }
    }

    // -- typed accessors -------------------------------------------------

    pub fn as_bool(&self) -> (bool, ConversionFlags) {
        match &*self.0 {
            ValueData::Bool(b) => (*b, ConversionFlags::OK),
            _ => (false, ConversionFlags::NOT_A_NUMBER),
        }
    }

    fn number_components(&self) -> Option<NumberComponents> {
        match &*self.0 {
            ValueData::Number(repr @ (NumberRepr::Raw(_) | NumberRepr::InputSlice { .. })) => {
                repr.bytes().map(numeric::decode)
            }
            ValueData::Number(NumberRepr::Integer(i)) => Some(NumberComponents {
                fraction: i.unsigned_abs(),
                exponent: 0,
                sign: if *i < 0 { -1 } else { 1 },
                flags: ConversionFlags::OK,
            }),
            ValueData::Number(NumberRepr::Float(_)) => None,
            _ => None,
        }
    }

    pub fn as_i32(&self) -> (i32, ConversionFlags) {
        match &*self.0 {
            ValueData::Number(NumberRepr::Integer(i)) => numeric::to_i32(NumberComponents {
                fraction: i.unsigned_abs(),
                exponent: 0,
                sign: if *i < 0 { -1 } else { 1 },
                flags: ConversionFlags::OK,
            }),
            ValueData::Number(NumberRepr::Float(f)) => float_to_i32(*f),
            ValueData::Number(repr @ (NumberRepr::Raw(_) | NumberRepr::InputSlice { .. })) => {
                numeric::to_i32(numeric::decode(repr.bytes().expect("number repr has bytes")))
            }
            _ => (0, ConversionFlags::NOT_A_NUMBER),
        }
    }

    pub fn as_i64(&self) -> (i64, ConversionFlags) {
        match &*self.0 {
            ValueData::Number(NumberRepr::Integer(i)) => (*i, ConversionFlags::OK),
            ValueData::Number(NumberRepr::Float(f)) => float_to_i64(*f),
            ValueData::Number(repr @ (NumberRepr::Raw(_) | NumberRepr::InputSlice { .. })) => {
                numeric::to_i64(numeric::decode(repr.bytes().expect("number repr has bytes")))
            }
            _ => (0, ConversionFlags::NOT_A_NUMBER),
        }
    }

    pub fn as_f64(&self) -> (f64, ConversionFlags) {
        match &*self.0 {
            ValueData::Number(NumberRepr::Float(f)) => (*f, ConversionFlags::OK),
            ValueData::Number(NumberRepr::Integer(i)) => (*i as f64, ConversionFlags::OK),
            ValueData::Number(repr @ (NumberRepr::Raw(_) | NumberRepr::InputSlice { .. })) => {
                numeric::to_f64(numeric::decode(repr.bytes().expect("number repr has bytes")))
            }
            _ => (0.0, ConversionFlags::NOT_A_NUMBER),
        }
    }

    pub fn as_raw_bytes(&self) -> Option<&[u8]> {
        match &*self.0 {
            ValueData::Number(repr @ (NumberRepr::Raw(_) | NumberRepr::InputSlice { .. })) => repr.bytes(),
            _ => None,
        }
    }

    /// Which representation backs a number value, for callers (the
    /// stringifier) that must pick an emission style per §4.10 ("raw →
    /// verbatim; `i64` → `%d` style; `f64` → `%.14g` style"). A zero-copy
    /// `InputSlice` payload is verbatim text just like `Raw`, so it reports
    /// as `Raw` too.
    pub fn number_repr_kind(&self) -> Option<NumberReprKind> {
        match &*self.0 {
            ValueData::Number(NumberRepr::Raw(_) | NumberRepr::InputSlice { .. }) => Some(NumberReprKind::Raw),
            ValueData::Number(NumberRepr::Integer(_)) => Some(NumberReprKind::Integer),
            ValueData::Number(NumberRepr::Float(_)) => Some(NumberReprKind::Float),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &*self.0 {
            ValueData::Str(repr) => std::str::from_utf8(repr.as_bytes()).ok(),
            _ => None,
        }
    }

    pub fn as_str_bytes(&self) -> Option<&[u8]> {
        match &*self.0 {
            ValueData::Str(repr) => Some(repr.as_bytes()),
            _ => None,
        }
    }

    // -- container ops ----------------------------------------------------

    fn array_lock(&self) -> Option<MutexGuard<'_, Vec<Value>>> {
        match &*self.0 {
            ValueData::Array(m) => Some(m.lock().expect("value array mutex poisoned")),
            _ => None,
        }
    }

    fn object_lock(&self) -> Option<MutexGuard<'_, IndexMap<KeyStr, Value>>> {
        match &*self.0 {
            ValueData::Object(m) => Some(m.lock().expect("value object mutex poisoned")),
            _ => None,
        }
    }

    /// Number of elements (array), keys (object), or 0 otherwise.
    pub fn size(&self) -> usize {
        if let Some(v) = self.array_lock() {
            return v.len();
        }
        if let Some(o) = self.object_lock() {
            return o.len();
        }
        0
    }

    /// Object `get`. Returns `invalid` on absent key or non-object receiver.
    pub fn get(&self, key: &str) -> Value {
        match self.object_lock() {
            Some(o) => o.get(key).cloned().unwrap_or_else(Value::invalid),
            None => Value::invalid(),
        }
    }

    /// Object `put`: takes ownership of `val`; duplicate keys replace.
    pub fn put(&self, key: KeyStr, val: Value) -> bool {
        match self.object_lock() {
            Some(mut o) => {
                o.insert(key, val);
                true
            }
            None => false,
        }
    }

    /// Object `set`: borrows `val`, retaining a shared copy (a refcount bump).
    pub fn set(&self, key: KeyStr, val: &Value) -> bool {
        self.put(key, val.clone())
    }

    pub fn remove(&self, key: &str) -> bool {
        match self.object_lock() {
            Some(mut o) => o.shift_remove(key).is_some(),
            None => false,
        }
    }

    /// Object key/value snapshot, safe to iterate without racing a concurrent
    /// mutation (the lock is held only for the duration of the clone).
    pub fn entries(&self) -> Vec<(KeyStr, Value)> {
        match self.object_lock() {
            Some(o) => o.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            None => Vec::new(),
        }
    }

    /// Array element at `i`, or `invalid` if out of range or non-array.
    pub fn at(&self, i: usize) -> Value {
        match self.array_lock() {
            Some(a) => a.get(i).cloned().unwrap_or_else(Value::invalid),
            None => Value::invalid(),
        }
    }

    /// Array `put`: pads with `null` when `i >= size`.
    pub fn array_put(&self, i: usize, val: Value) -> bool {
        match self.array_lock() {
            Some(mut a) => {
                if i >= a.len() {
                    a.resize_with(i, Value::null);
                    a.push(val);
                } else {
                    a[i] = val;
                }
                true
            }
            None => false,
        }
    }

    pub fn append(&self, val: Value) -> bool {
        match self.array_lock() {
            Some(mut a) => {
                a.push(val);
                true
            }
            None => false,
        }
    }

    /// How a `splice`'s source range is attached to the destination array.
    pub fn items(&self) -> Vec<Value> {
        match self.array_lock() {
            Some(a) => a.clone(),
            None => Vec::new(),
        }
    }

    /// Removes `remove_n` elements starting at `at`, then inserts `source[begin..end)`
    /// in their place. Splicing past the end extends with `null`;
    /// removing more than remains removes to the end.
    pub fn splice(&self, at: usize, remove_n: usize, source: &[Value], begin: usize, end: usize) -> bool {
        let mut a = match self.array_lock() {
            Some(a) => a,
            None => return false,
        };
        if at > a.len() {
            a.resize_with(at, Value::null);
        }
        let remove_n = remove_n.min(a.len().saturating_sub(at));
        let insert: Vec<Value> = source[begin.min(source.len())..end.min(source.len())].to_vec();
        a.splice(at..at + remove_n, insert);
        true
    }

    // -- lifetime ops ------------------------------------------------------

    /// Shallow copy: a reference-count bump. Identical to [`Clone::clone`].
    pub fn copy(&self) -> Value {
        self.clone()
    }

    /// Deep copy: allocates an independent subtree. Immutable singletons
    /// (`null`, `invalid`, the booleans, the empty string) short-circuit to a
    /// refcount bump since no observer can tell the difference.
    pub fn duplicate(&self) -> Value {
        match &*self.0 {
            ValueData::Invalid | ValueData::Null | ValueData::Bool(_) => self.clone(),
            ValueData::Str(StringRepr::Owned(s)) if s.is_empty() => self.clone(),
            ValueData::Number(NumberRepr::Raw(b)) => Value::from_raw_number(Arc::clone(b)),
            ValueData::Number(NumberRepr::Integer(i)) => Value::from_i64(*i),
            ValueData::Number(NumberRepr::Float(f)) => Value::from_f64(*f),
            // A duplicate is explicitly independent of whatever it was
            // duplicated from, so an `InputSlice` becomes an owned `Raw`
            // copy rather than keeping the input buffer alive.
            ValueData::Number(NumberRepr::InputSlice { .. }) => {
                Value::from_raw_number(Arc::from(self.as_raw_bytes().unwrap_or(b"0")))
            }
            ValueData::Str(StringRepr::Owned(s)) => Value::string_copied(s),
            ValueData::Str(StringRepr::Borrowed(b)) => {
                Value::string_copied(std::str::from_utf8(b).unwrap_or(""))
            }
            ValueData::Str(StringRepr::InputSlice { buffer, range }) => {
                let bytes = &buffer.as_bytes()[range.clone()];
                Value::string_copied(std::str::from_utf8(bytes).unwrap_or(""))
            }
            ValueData::Array(m) => {
                let items: Vec<Value> = m
                    .lock()
                    .expect("value array mutex poisoned")
                    .iter()
                    .map(Value::duplicate)
                    .collect();
                Value::array(items)
            }
            ValueData::Object(m) => {
                let entries: IndexMap<KeyStr, Value> = m
                    .lock()
                    .expect("value object mutex poisoned")
                    .iter()
                    .map(|(k, v)| (k.clone(), v.duplicate()))
                    .collect();
                Value(Arc::new(ValueData::Object(Mutex::new(entries))))
            }
        }
    }

    // -- equality and ordering ---------------------------------------------

    pub fn equal(&self, other: &Value) -> bool {
        self.compare(other) == Ordering::Equal
    }

    /// Total order: `invalid < null < bool < number < string < array < object`.
    pub fn compare(&self, other: &Value) -> Ordering {
        let (ra, rb) = (self.rank(), other.rank());
        if ra != rb {
            return ra.cmp(&rb);
        }
        match (&*self.0, &*other.0) {
            (ValueData::Invalid, ValueData::Invalid) => Ordering::Equal,
            (ValueData::Null, ValueData::Null) => Ordering::Equal,
            (ValueData::Bool(a), ValueData::Bool(b)) => a.cmp(b),
            (ValueData::Number(_), ValueData::Number(_)) => {
                // Exact-integer encodings compare as `i64` so magnitudes beyond
                // `f64`'s 2^53 mantissa don't collapse together; only fall back
                // to `f64` once either side actually needs a float to represent
                // (or its `i64` conversion itself lost precision).
                let (ai, aflags) = self.as_i64();
                let (bi, bflags) = other.as_i64();
                if aflags.is_ok() && bflags.is_ok() {
                    ai.cmp(&bi)
                } else {
                    let (a, _) = self.as_f64();
                    let (b, _) = other.as_f64();
                    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
                }
            }
            (ValueData::Str(a), ValueData::Str(b)) => a.as_bytes().cmp(b.as_bytes()),
            (ValueData::Array(_), ValueData::Array(_)) => {
                let a = self.items();
                let b = other.items();
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                a.len().cmp(&b.len())
            }
            (ValueData::Object(_), ValueData::Object(_)) => {
                let mut a = self.entries();
                let mut b = other.entries();
                a.sort_by(|x, y| x.0.cmp(&y.0));
                b.sort_by(|x, y| x.0.cmp(&y.0));
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.0.cmp(&y.0) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                    match x.1.compare(&y.1) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => unreachable!("rank equality implies variant match"),
        }
    }
}

fn float_to_i64(f: f64) -> (i64, ConversionFlags) {
    if f.is_nan() {
        return (0, ConversionFlags::NOT_A_NUMBER);
    }
    if f >= i64::MAX as f64 {
        return (i64::MAX, ConversionFlags::POSITIVE_OVERFLOW);
    }
    if f <= i64::MIN as f64 {
        return (i64::MIN, ConversionFlags::NEGATIVE_OVERFLOW);
    }
    let truncated = f.trunc();
    let mut flags = ConversionFlags::OK;
    if (truncated - f).abs() > f64::EPSILON {
        flags |= ConversionFlags::PRECISION_LOSS;
    }
    (truncated as i64, flags)
}

fn float_to_i32(f: f64) -> (i32, ConversionFlags) {
    let (v, mut flags) = float_to_i64(f);
    if v > i32::MAX as i64 {
        flags |= ConversionFlags::POSITIVE_OVERFLOW;
        (i32::MAX, flags)
    } else if v < i32::MIN as i64 {
        flags |= ConversionFlags::NEGATIVE_OVERFLOW;
        (i32::MIN, flags)
    } else {
        (v as i32, flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singletons_are_distinct() {
        assert!(!Value::invalid().equal(&Value::null()));
        assert!(Value::null().is_null());
        assert!(Value::invalid().is_invalid());
    }

    #[test]
    fn copy_shares_storage_duplicate_does_not() {
        let obj = Value::empty_object();
        obj.put(Arc::from("a"), Value::from_i64(1));

        let shallow = obj.copy();
        shallow.put(Arc::from("b"), Value::from_i64(2));
        assert_eq!(obj.size(), 2, "copy must share the same backing map");

        let deep = obj.duplicate();
        deep.put(Arc::from("c"), Value::from_i64(3));
        assert_eq!(obj.size(), 2, "duplicate must not affect the original");
        assert_eq!(deep.size(), 3);
    }

    #[test]
    fn get_put_round_trips() {
        let obj = Value::empty_object();
        obj.put(Arc::from("k"), Value::from_i64(42));
        let (v, flags) = obj.get("k").as_i64();
        assert!(flags.is_ok());
        assert_eq!(v, 42);
        assert!(obj.get("missing").is_invalid());
    }

    #[test]
    fn array_put_pads_with_null() {
        let arr = Value::empty_array();
        arr.array_put(2, Value::from_i64(7));
        assert_eq!(arr.size(), 3);
        assert!(arr.at(0).is_null());
        assert!(arr.at(1).is_null());
        let (v, _) = arr.at(2).as_i64();
        assert_eq!(v, 7);
    }

    #[test]
    fn splice_past_end_extends_with_null() {
        let arr = Value::array(vec![Value::from_i64(1)]);
        let source = vec![Value::from_i64(9)];
        arr.splice(5, 0, &source, 0, 1);
        assert_eq!(arr.size(), 6);
        assert!(arr.at(4).is_null());
        let (v, _) = arr.at(5).as_i64();
        assert_eq!(v, 9);
    }

    #[test]
    fn total_ordering_across_variants() {
        assert_eq!(Value::invalid().compare(&Value::null()), Ordering::Less);
        assert_eq!(Value::null().compare(&Value::boolean(false)), Ordering::Less);
        assert_eq!(
            Value::boolean(false).compare(&Value::boolean(true)),
            Ordering::Less
        );
        assert_eq!(
            Value::boolean(true).compare(&Value::from_i64(0)),
            Ordering::Less
        );
        assert_eq!(
            Value::from_i64(1).compare(&Value::string_copied("a")),
            Ordering::Less
        );
    }

    #[test]
    fn objects_compare_by_sorted_key_sequence() {
        let a = Value::empty_object();
        a.put(Arc::from("x"), Value::from_i64(1));
        let b = Value::empty_object();
        b.put(Arc::from("x"), Value::from_i64(2));
        assert_eq!(a.compare(&b), Ordering::Less);
    }

    #[test]
    fn precision_loss_flagged_on_fractional_float_to_int() {
        let v = Value::from_f64(1.5);
        let (i, flags) = v.as_i64();
        assert_eq!(i, 1);
        assert!(flags.contains(ConversionFlags::PRECISION_LOSS));
    }

    #[test]
    fn large_i64_magnitudes_compare_exactly_not_via_lossy_f64() {
        // i64::MAX and i64::MAX - 2 both round to the same f64; comparing
        // through as_f64() would incorrectly call them equal.
        let a = Value::from_i64(i64::MAX);
        let b = Value::from_i64(i64::MAX - 2);
        assert_eq!(a.as_f64().0, b.as_f64().0, "precondition: f64 cannot tell these apart");
        assert_eq!(a.compare(&b), Ordering::Greater);
        assert!(!a.equal(&b));
    }

    #[test]
    fn large_raw_number_magnitudes_compare_exactly() {
        let a = Value::from_raw_number(Arc::from(b"9223372036854775807".as_slice()));
        let b = Value::from_raw_number(Arc::from(b"9223372036854775805".as_slice()));
        assert_eq!(a.compare(&b), Ordering::Greater);
    }

    #[test]
    fn float_and_integer_encodings_still_compare_numerically() {
        assert!(Value::from_f64(2.0).equal(&Value::from_i64(2)));
        assert_eq!(
            Value::from_f64(1.5).compare(&Value::from_i64(1)),
            Ordering::Greater
        );
    }
}
