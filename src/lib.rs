//! prop-watch — recursive, path-based property-change observation over plain
//! mutable objects.
//!
//! # Overview
//!
//! Three layers, composed bottom-up:
//!
//! - [`intercept`](intercept::intercept) — the leaf primitive: one listener on
//!   one key of one [`Obj`], notified synchronously on every assignment that
//!   changes the value by identity, plus a one-time initial delivery of the
//!   current value.
//! - [`watch_properties`] — the recursive tree watcher: installs interceptors
//!   for a nested [`WatchSpec`] and rebinds subtree watches whenever an
//!   intermediate object is replaced wholesale, so deep listeners always
//!   observe the current live object.
//! - [`watch_group`] — the convenience surface: compiles a flat list of dotted
//!   path expressions (`"user.title"`) plus one shared listener into a
//!   [`WatchSpec`] and installs it.
//!
//! Every install returns an [`Unwatch`] handle that removes the listeners it
//! registered, transitively. Notification is synchronous and in-line on the
//! call stack of the mutating assignment; there is no queuing or batching.
//!
//! ```
//! use prop_watch::{watch_group, Obj};
//! use serde_json::json;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let scope = Obj::from_json(&json!({"a": {"b": "c"}, "d": "e"}))?;
//! let hits = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&hits);
//! let unwatch = watch_group(Some(&scope), &["a.b", "d"], move |_new, _old| {
//!     counter.fetch_add(1, Ordering::Relaxed);
//! });
//! // One initial delivery per compiled leaf.
//! assert_eq!(hits.load(Ordering::Relaxed), 2);
//! scope.set("d", "f");
//! assert_eq!(hits.load(Ordering::Relaxed), 3);
//! unwatch();
//! scope.set("d", "g");
//! assert_eq!(hits.load(Ordering::Relaxed), 3);
//! # Ok::<(), prop_watch::ConvertError>(())
//! ```
//!
//! # Modules
//!
//! - [`value`] — [`Value`], [`Obj`] and JSON conversion.
//! - [`intercept`] — the leaf observation primitive.
//! - [`tree`] — [`WatchSpec`]/[`WatchNode`] and [`watch_properties`].
//! - [`group`] — path expression compiler and [`watch_group`].

pub mod group;
pub mod intercept;
mod registry;
pub mod tree;
pub mod value;

pub use group::{compile_paths, watch_group};
pub use intercept::{intercept, listener_count, Listener, ListenerId, Unwatch};
pub use tree::{watch_properties, WatchNode, WatchSpec};
pub use value::{ConvertError, Obj, ObjectId, Value};
