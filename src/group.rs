//! Dotted path expressions compiled into a watch-specification tree.
//!
//! `"a.b"` and `"a.c"` merge into one `a` branch with two leaves; `"a"` and
//! `"a.b"` together produce an `a` node that both notifies and recurses.

use std::sync::Arc;

use crate::intercept::{Listener, Unwatch};
use crate::tree::{watch_properties, WatchNode, WatchSpec};
use crate::value::{Obj, Value};

/// Watch a flat list of dotted path expressions with one shared listener.
///
/// Compiles `paths` into a [`WatchSpec`] and delegates to
/// [`watch_properties`]. The listener receives one initial delivery per
/// compiled leaf, then one delivery per subsequent change anywhere along the
/// watched paths.
pub fn watch_group(
    obj: Option<&Obj>,
    paths: &[&str],
    listener: impl Fn(&Value, Option<&Value>) + Send + Sync + 'static,
) -> Unwatch {
    let listener: Listener = Arc::new(listener);
    let spec = compile_paths(paths, &listener);
    watch_properties(obj, &spec)
}

/// Compile dotted path expressions into a [`WatchSpec`], merging shared
/// prefixes. The terminal segment of every path gets `listener` attached.
pub fn compile_paths(paths: &[&str], listener: &Listener) -> WatchSpec {
    let mut spec = WatchSpec::new();
    for path in paths {
        let segments: Vec<&str> = path.split('.').collect();
        insert_path(&mut spec, &segments, listener);
    }
    spec
}

fn insert_path(spec: &mut WatchSpec, segments: &[&str], listener: &Listener) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    if rest.is_empty() {
        // Terminal segment: attach the listener, keeping any children a
        // longer path already created. A listener already present at this
        // node is replaced.
        let node = match spec.take(head) {
            Some(WatchNode::Branch(children)) | Some(WatchNode::Both(_, children)) => {
                WatchNode::Both(Arc::clone(listener), children)
            }
            _ => WatchNode::Leaf(Arc::clone(listener)),
        };
        spec.insert(*head, node);
        return;
    }

    // Intermediate segment: descend, preserving any listener already attached
    // by a shorter path.
    let (existing, mut children) = match spec.take(head) {
        None => (None, WatchSpec::new()),
        Some(WatchNode::Leaf(l)) => (Some(l), WatchSpec::new()),
        Some(WatchNode::Branch(c)) => (None, c),
        Some(WatchNode::Both(l, c)) => (Some(l), c),
    };
    insert_path(&mut children, rest, listener);
    let node = match existing {
        Some(l) => WatchNode::Both(l, children),
        None => WatchNode::Branch(children),
    };
    spec.insert(*head, node);
}
