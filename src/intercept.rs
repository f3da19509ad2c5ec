//! The leaf observation primitive: one listener on one key of one object.

use std::sync::Arc;

use crate::registry;
use crate::value::{Obj, Value};

/// Identifies one registered listener within an object's per-key list.
pub type ListenerId = u64;

/// Listener callback: `(new_value, old_value)`.
///
/// The old value is `None` on the one-time initial delivery performed at
/// registration, and `Some(old)` on every change delivery.
pub type Listener = Arc<dyn Fn(&Value, Option<&Value>) + Send + Sync>;

/// A one-shot teardown closure returned by every watch installation.
/// Destroy-once semantics are encoded in the type: `FnOnce` cannot be
/// invoked twice.
pub type Unwatch = Box<dyn FnOnce() + Send + Sync>;

/// Register `listener` for changes to `key` on `obj`.
///
/// The listener is appended to the key's listener list and then immediately
/// invoked once, synchronously, with the current value (`None` old value) —
/// even if that value is [`Value::Undefined`]. Afterwards it fires on every
/// assignment to `key` whose new value differs from the old one by identity,
/// with `(new, Some(old))`.
///
/// Multiple listeners on the same key accumulate and fire in registration
/// order. The returned [`Unwatch`] removes only this listener, leaving the
/// others intact.
pub fn intercept(
    obj: &Obj,
    key: &str,
    listener: impl Fn(&Value, Option<&Value>) + Send + Sync + 'static,
) -> Unwatch {
    intercept_arc(obj, key, Arc::new(listener))
}

pub(crate) fn intercept_arc(obj: &Obj, key: &str, listener: Listener) -> Unwatch {
    let id = registry::subscribe(obj.id(), key, Arc::clone(&listener));
    let current = obj.get(key);
    listener(&current, None);

    let obj_id = obj.id();
    let key = key.to_string();
    Box::new(move || registry::unsubscribe(obj_id, &key, id))
}

/// Number of listeners currently registered for `key` on `obj`.
pub fn listener_count(obj: &Obj, key: &str) -> usize {
    registry::count(obj.id(), key)
}
