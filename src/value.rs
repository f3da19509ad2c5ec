//! Watched objects and the values they hold.
//!
//! [`Value`] mirrors the value model of a dynamic object graph: primitives,
//! arrays, and nested objects, plus an explicit `Undefined` for absent
//! properties. Equality is strict-identity style — primitives compare by
//! value, arrays and objects by reference.
//!
//! [`Obj`] is a shared handle to one mutable key→value map. `set` is the
//! assignment primitive the whole observation mechanism hangs off: it is an
//! identity no-op when the new value is identical to the current one, and
//! otherwise stores the value and synchronously notifies every listener
//! registered for that key, in registration order, with `(new, old)`.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::registry;

/// Maximum nesting depth for JSON conversion in either direction. Conversion
/// of a cyclic object graph terminates by exceeding this.
pub const MAX_VALUE_DEPTH: usize = 100;

/// Error converting between [`Obj`]/[`Value`] and `serde_json::Value`.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("expected a JSON object at the document root, got {0}")]
    RootNotObject(&'static str),

    #[error("maximum value depth exceeded ({MAX_VALUE_DEPTH})")]
    DepthExceeded,
}

// ============================================================================
// ObjectId
// ============================================================================

/// Stable identity of an [`Obj`], assigned at creation and never reused.
///
/// The listener registry is keyed on this, so a long-dead object can never be
/// confused with a newly created one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(u64);

fn next_object_id() -> ObjectId {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    ObjectId(NEXT.fetch_add(1, Ordering::Relaxed))
}

// ============================================================================
// Value
// ============================================================================

/// A dynamic value held in a watched object.
#[derive(Debug, Clone)]
pub enum Value {
    /// An absent property. Reading a key that was never set yields this.
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Arrays are opaque leaf values here — element mutation is not watched.
    Array(Arc<Vec<Value>>),
    Object(Obj),
}

impl Value {
    /// Strict-identity comparison: primitives by value, arrays and objects by
    /// reference. `NaN` is not identical to `NaN`, so re-assigning `NaN` over
    /// `NaN` notifies.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Obj> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

/// Equality on `Value` is [`Value::same`] — identity semantics, not deep
/// equality. Two objects with equal contents are *not* equal.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.same(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }
}

impl From<Obj> for Value {
    fn from(obj: Obj) -> Self {
        Value::Object(obj)
    }
}

// ============================================================================
// Obj
// ============================================================================

/// A shared handle to one mutable, watchable object.
///
/// Cloning the handle clones the *reference*, not the object — all clones see
/// the same slots and the same identity. Identity comparison (`==`,
/// [`Obj::ptr_eq`]) follows the handle, never the contents.
#[derive(Clone)]
pub struct Obj {
    inner: Arc<ObjInner>,
}

struct ObjInner {
    id: ObjectId,
    slots: Mutex<HashMap<String, Value>>,
}

impl Drop for ObjInner {
    fn drop(&mut self) {
        // Listener lists for an unreachable object are themselves unreachable.
        registry::sweep(self.id);
    }
}

impl Obj {
    /// Create a new, empty object with a fresh identity.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ObjInner {
                id: next_object_id(),
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub(crate) fn id(&self) -> ObjectId {
        self.inner.id
    }

    /// `true` if both handles refer to the same object.
    pub fn ptr_eq(&self, other: &Obj) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Current value of `key`, or [`Value::Undefined`] if it was never set.
    pub fn get(&self, key: &str) -> Value {
        self.inner
            .slots
            .lock()
            .get(key)
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    /// Assign `value` to `key`.
    ///
    /// If the new value is identical (by [`Value::same`]) to the current one
    /// this is a no-op. Otherwise the slot is updated and every listener
    /// registered for `key` is invoked synchronously, in registration order,
    /// with `(new, Some(old))`. The slot lock is released before any listener
    /// runs, so listeners may reentrantly read, write, watch, or unwatch.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let new = value.into();
        let old = {
            let mut slots = self.inner.slots.lock();
            let old = slots.get(key).cloned().unwrap_or(Value::Undefined);
            if old.same(&new) {
                return;
            }
            slots.insert(key.to_string(), new.clone());
            old
        };
        registry::notify(self.inner.id, key, &new, &old);
    }

    /// Keys currently present, sorted.
    pub fn keys(&self) -> Vec<String> {
        let slots = self.inner.slots.lock();
        let mut keys: Vec<String> = slots.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.inner.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.slots.lock().is_empty()
    }

    // -----------------------------------------------------------------------
    // JSON conversion
    // -----------------------------------------------------------------------

    /// Build an object graph from a JSON value. The root must be a JSON
    /// object; nested objects become fresh [`Obj`]s with their own identity.
    pub fn from_json(json: &serde_json::Value) -> Result<Obj, ConvertError> {
        match json {
            serde_json::Value::Object(map) => obj_from_map(map, 0),
            other => Err(ConvertError::RootNotObject(json_kind(other))),
        }
    }

    /// Serialize the object graph to JSON.
    ///
    /// `Undefined` entries are omitted and non-finite numbers become `null`,
    /// the way dynamic objects serialize. A cyclic graph exceeds
    /// [`MAX_VALUE_DEPTH`] and errors rather than recursing forever.
    pub fn to_json(&self) -> Result<serde_json::Value, ConvertError> {
        obj_to_json(self, 0)
    }
}

impl Default for Obj {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Obj {
    fn eq(&self, other: &Obj) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Obj {}

/// Shallow by intent: prints identity and key names only, so a cyclic graph
/// cannot recurse.
impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Obj#{} ", self.inner.id.0)?;
        f.debug_set().entries(self.keys()).finish()
    }
}

// ============================================================================
// JSON conversion internals
// ============================================================================

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

fn value_from_json(json: &serde_json::Value, depth: usize) -> Result<Value, ConvertError> {
    if depth > MAX_VALUE_DEPTH {
        return Err(ConvertError::DepthExceeded);
    }
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => {
            let converted = items
                .iter()
                .map(|item| value_from_json(item, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            Value::Array(Arc::new(converted))
        }
        serde_json::Value::Object(map) => Value::Object(obj_from_map(map, depth)?),
    })
}

fn obj_from_map(
    map: &serde_json::Map<String, serde_json::Value>,
    depth: usize,
) -> Result<Obj, ConvertError> {
    if depth > MAX_VALUE_DEPTH {
        return Err(ConvertError::DepthExceeded);
    }
    let obj = Obj::new();
    {
        let mut slots = obj.inner.slots.lock();
        for (key, value) in map {
            slots.insert(key.clone(), value_from_json(value, depth + 1)?);
        }
    }
    Ok(obj)
}

/// `Ok(None)` means the value is `Undefined` and its key should be omitted.
fn value_to_json(value: &Value, depth: usize) -> Result<Option<serde_json::Value>, ConvertError> {
    if depth > MAX_VALUE_DEPTH {
        return Err(ConvertError::DepthExceeded);
    }
    Ok(Some(match value {
        Value::Undefined => return Ok(None),
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number_to_json(*n),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => {
            let converted = items
                .iter()
                .map(|item| {
                    // Inside arrays, undefined serializes as null.
                    value_to_json(item, depth + 1)
                        .map(|opt| opt.unwrap_or(serde_json::Value::Null))
                })
                .collect::<Result<Vec<_>, _>>()?;
            serde_json::Value::Array(converted)
        }
        Value::Object(obj) => obj_to_json(obj, depth + 1)?,
    }))
}

/// Integral doubles serialize as JSON integers, the way dynamic objects
/// print them; everything else stays a float, with non-finite values
/// becoming null.
fn number_to_json(n: f64) -> serde_json::Value {
    // `i64::MAX as f64` rounds up to 2^63, so the exclusive bound is exact.
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        serde_json::Value::Number(serde_json::Number::from(n as i64))
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

fn obj_to_json(obj: &Obj, depth: usize) -> Result<serde_json::Value, ConvertError> {
    if depth > MAX_VALUE_DEPTH {
        return Err(ConvertError::DepthExceeded);
    }
    // Snapshot the slots before recursing — the lock must not be held while
    // descending into children, which may alias this object.
    let entries: Vec<(String, Value)> = {
        let slots = obj.inner.slots.lock();
        slots.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    };
    let mut map = serde_json::Map::new();
    for (key, value) in entries {
        if let Some(json) = value_to_json(&value, depth + 1)? {
            map.insert(key, json);
        }
    }
    Ok(serde_json::Value::Object(map))
}

// ============================================================================
// Tests
// ============================================================================
