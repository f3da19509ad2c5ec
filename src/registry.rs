//! Identity-keyed listener side table.
//!
//! Observation metadata lives here rather than on the watched objects
//! themselves: one process-wide table maps an object's [`ObjectId`] to its
//! per-key listener lists. Entries are created lazily on first subscription,
//! pruned when teardown empties them, and swept wholesale when the owning
//! object is dropped.
//!
//! Snapshot-on-notify semantics:
//!   - A listener removed *during* notification is still called in that round.
//!   - A listener added *during* notification is NOT called until the next
//!     round (its one-time initial delivery still happens immediately).
//!
//! The table lock is never held while a listener runs, so listeners are free
//! to subscribe, unsubscribe, or mutate watched objects reentrantly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::intercept::{Listener, ListenerId};
use crate::value::{ObjectId, Value};

type KeyListeners = HashMap<String, Vec<(ListenerId, Listener)>>;

struct Registry {
    tables: Mutex<HashMap<ObjectId, KeyListeners>>,
    next_id: AtomicU64,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry {
        tables: Mutex::new(HashMap::new()),
        next_id: AtomicU64::new(1),
    })
}

/// Append `listener` to the list for `key` on the object identified by `obj`
/// and return its id. Listeners notify in the order they were appended.
pub(crate) fn subscribe(obj: ObjectId, key: &str, listener: Listener) -> ListenerId {
    let reg = registry();
    let id = reg.next_id.fetch_add(1, Ordering::Relaxed);
    reg.tables
        .lock()
        .entry(obj)
        .or_default()
        .entry(key.to_string())
        .or_default()
        .push((id, listener));
    id
}

/// Remove the listener identified by `id`, leaving the rest of the list
/// intact. Safe to call after the list — or the whole object entry — is gone.
///
/// The removed listener is dropped only after the table lock is released: its
/// captures may hold the last handle to some object, whose drop re-enters the
/// registry via [`sweep`].
pub(crate) fn unsubscribe(obj: ObjectId, key: &str, id: ListenerId) {
    let removed = {
        let mut tables = registry().tables.lock();
        let Some(table) = tables.get_mut(&obj) else {
            return;
        };
        let mut removed = None;
        if let Some(listeners) = table.get_mut(key) {
            if let Some(pos) = listeners.iter().position(|(lid, _)| *lid == id) {
                removed = Some(listeners.remove(pos));
            }
            if listeners.is_empty() {
                table.remove(key);
            }
        }
        if table.is_empty() {
            tables.remove(&obj);
        }
        removed
    };
    drop(removed);
}

/// Invoke every listener registered for `key` on `obj` with `(new, Some(old))`
/// in registration order.
///
/// A snapshot of the list is taken under the lock, and the lock is released
/// before any listener runs.
pub(crate) fn notify(obj: ObjectId, key: &str, new: &Value, old: &Value) {
    let snapshot: Vec<Listener> = {
        let tables = registry().tables.lock();
        match tables.get(&obj).and_then(|table| table.get(key)) {
            Some(listeners) => listeners.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => return,
        }
    };
    for cb in snapshot {
        cb(new, Some(old));
    }
}

/// Drop every listener list for `obj`. Called when the object itself is
/// dropped, so the table never outlives the identity it is keyed on.
/// The removed lists outlive the lock for the same reason as in
/// [`unsubscribe`].
pub(crate) fn sweep(obj: ObjectId) {
    let removed = registry().tables.lock().remove(&obj);
    drop(removed);
}

/// Number of listeners currently registered for `key` on `obj`.
pub(crate) fn count(obj: ObjectId, key: &str) -> usize {
    registry()
        .tables
        .lock()
        .get(&obj)
        .and_then(|table| table.get(key))
        .map_or(0, Vec::len)
}
