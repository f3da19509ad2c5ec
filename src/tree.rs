//! Recursive tree watcher — composes interceptors over nested paths.
//!
//! A [`WatchSpec`] describes which keys to watch; each [`WatchNode`] is a
//! leaf listener, a subtree, or both. [`watch_properties`] installs one
//! interceptor per top-level key and recurses: when a watched key holds an
//! object and that object is replaced wholesale, the subtree watch is
//! re-installed against the new value, so deep listeners always observe the
//! current live object, never a stale one.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::intercept::{intercept_arc, Listener, Unwatch};
use crate::value::{Obj, Value};

// ============================================================================
// Watch-specification tree
// ============================================================================

/// One node of a watch-specification tree.
#[derive(Clone)]
pub enum WatchNode {
    /// Notify the listener on every change to the key.
    Leaf(Listener),
    /// Re-install the subtree against the key's new value on every change.
    Branch(WatchSpec),
    /// Notify the listener first, then re-install the subtree.
    Both(Listener, WatchSpec),
}

impl WatchNode {
    pub fn leaf(listener: impl Fn(&Value, Option<&Value>) + Send + Sync + 'static) -> Self {
        WatchNode::Leaf(Arc::new(listener))
    }

    pub fn branch(children: WatchSpec) -> Self {
        WatchNode::Branch(children)
    }

    pub fn both(
        listener: impl Fn(&Value, Option<&Value>) + Send + Sync + 'static,
        children: WatchSpec,
    ) -> Self {
        WatchNode::Both(Arc::new(listener), children)
    }

    pub fn listener(&self) -> Option<&Listener> {
        match self {
            WatchNode::Leaf(listener) | WatchNode::Both(listener, _) => Some(listener),
            WatchNode::Branch(_) => None,
        }
    }

    pub fn children(&self) -> Option<&WatchSpec> {
        match self {
            WatchNode::Branch(children) | WatchNode::Both(_, children) => Some(children),
            WatchNode::Leaf(_) => None,
        }
    }
}

impl fmt::Debug for WatchNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchNode::Leaf(_) => f.write_str("Leaf"),
            WatchNode::Branch(children) => f.debug_tuple("Branch").field(children).finish(),
            WatchNode::Both(_, children) => f.debug_tuple("Both").field(children).finish(),
        }
    }
}

/// A watch-specification tree: a mapping from property key to [`WatchNode`].
///
/// An empty spec is a valid no-op. Specs are cheap to clone — listeners are
/// shared behind `Arc`.
#[derive(Clone, Default)]
pub struct WatchSpec {
    nodes: BTreeMap<String, WatchNode>,
}

impl WatchSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, node: WatchNode) {
        self.nodes.insert(key.into(), node);
    }

    /// Chainable: attach a leaf listener at `key`.
    pub fn leaf(
        mut self,
        key: impl Into<String>,
        listener: impl Fn(&Value, Option<&Value>) + Send + Sync + 'static,
    ) -> Self {
        self.insert(key, WatchNode::leaf(listener));
        self
    }

    /// Chainable: attach a subtree at `key`.
    pub fn branch(mut self, key: impl Into<String>, children: WatchSpec) -> Self {
        self.insert(key, WatchNode::Branch(children));
        self
    }

    /// Chainable: attach both a listener and a subtree at `key`.
    pub fn both(
        mut self,
        key: impl Into<String>,
        listener: impl Fn(&Value, Option<&Value>) + Send + Sync + 'static,
        children: WatchSpec,
    ) -> Self {
        self.insert(key, WatchNode::both(listener, children));
        self
    }

    pub fn get(&self, key: &str) -> Option<&WatchNode> {
        self.nodes.get(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WatchNode)> + '_ {
        self.nodes.iter().map(|(key, node)| (key.as_str(), node))
    }

    pub(crate) fn take(&mut self, key: &str) -> Option<WatchNode> {
        self.nodes.remove(key)
    }
}

impl fmt::Debug for WatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.nodes.iter()).finish()
    }
}

// ============================================================================
// Install
// ============================================================================

/// Install a watch tree on `obj` and return a composite teardown.
///
/// With `None` as the root, nothing is installed: every leaf listener in the
/// spec is invoked once with `Undefined` (the reset pass) and the returned
/// teardown is a no-op. This is how a subtree reacts to its host object being
/// replaced by null or a primitive.
pub fn watch_properties(obj: Option<&Obj>, spec: &WatchSpec) -> Unwatch {
    let Some(obj) = obj else {
        reset_listeners(spec);
        return Box::new(|| {});
    };

    let mut unwatches: Vec<Unwatch> = Vec::with_capacity(spec.len());
    for (key, node) in spec.iter() {
        unwatches.push(install_node(obj, key, node));
    }
    Box::new(move || {
        for unwatch in unwatches {
            unwatch();
        }
    })
}

fn install_node(obj: &Obj, key: &str, node: &WatchNode) -> Unwatch {
    match node {
        WatchNode::Leaf(listener) => intercept_arc(obj, key, Arc::clone(listener)),

        WatchNode::Both(listener, children) => {
            let listener = Arc::clone(listener);
            let children = children.clone();
            // Holds the teardown of the most recently installed subtree.
            // Overwritten (not invoked) on every rebind; read once by the
            // composite teardown below.
            let slot: Arc<Mutex<Option<Unwatch>>> = Arc::new(Mutex::new(None));
            let rebind_slot = Arc::clone(&slot);

            let outer = intercept_arc(
                obj,
                key,
                Arc::new(move |new: &Value, _old: Option<&Value>| {
                    // The direct listener fires strictly before the subtree
                    // rebuild, and never receives an old value on this path.
                    listener(new, None);
                    let rebuilt = install_subtree(new, &children);
                    *rebind_slot.lock() = Some(rebuilt);
                }),
            );

            Box::new(move || {
                outer();
                if let Some(inner) = slot.lock().take() {
                    inner();
                }
            })
        }

        WatchNode::Branch(children) => {
            let children = children.clone();
            intercept_arc(
                obj,
                key,
                Arc::new(move |new: &Value, _old: Option<&Value>| {
                    // Subtree teardowns are not tracked on this path: a
                    // replaced subtree is abandoned along with the object it
                    // was installed on, and lives until that object drops.
                    let _ = install_subtree(new, &children);
                }),
            )
        }
    }
}

/// (Re-)install `children` against the value now held at a watched key.
/// Anything that is not an object degrades to the reset pass.
fn install_subtree(value: &Value, children: &WatchSpec) -> Unwatch {
    watch_properties(value.as_object(), children)
}

/// The reset pass: deliver `Undefined` once to every terminal listener.
/// A node that has its own listener is not recursed into.
fn reset_listeners(spec: &WatchSpec) {
    for (_key, node) in spec.iter() {
        match node {
            WatchNode::Leaf(listener) | WatchNode::Both(listener, _) => {
                listener(&Value::Undefined, None);
            }
            WatchNode::Branch(children) => reset_listeners(children),
        }
    }
}
