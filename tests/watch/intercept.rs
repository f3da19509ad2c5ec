//! Tests for the leaf observation primitive.

use prop_watch::{intercept, listener_count, Obj, Unwatch, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Helper: create a shared call-log that listeners append to.
fn make_log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

fn render(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => format!("{other:?}"),
    }
}

// ============================================================================
// Initial delivery
// ============================================================================

#[test]
fn registration_delivers_current_value_once_synchronously() {
    let obj = Obj::new();
    obj.set("title", "a");
    let log = make_log();
    let log_clone = Arc::clone(&log);

    let _unwatch = intercept(&obj, "title", move |new, old| {
        assert!(old.is_none(), "initial delivery carries no old value");
        log_clone.lock().unwrap().push(render(new));
    });

    assert_eq!(*log.lock().unwrap(), vec!["a"]);
}

#[test]
fn registration_delivers_undefined_for_absent_key() {
    let obj = Obj::new();
    let log = make_log();
    let log_clone = Arc::clone(&log);

    let _unwatch = intercept(&obj, "missing", move |new, _old| {
        log_clone.lock().unwrap().push(render(new));
    });

    assert_eq!(*log.lock().unwrap(), vec!["undefined"]);
}

// ============================================================================
// Change delivery
// ============================================================================

#[test]
fn change_delivers_new_and_old_in_assignment_order() {
    let obj = Obj::new();
    obj.set("title", "a");
    let log = make_log();
    let log_clone = Arc::clone(&log);

    let _unwatch = intercept(&obj, "title", move |new, old| {
        let old = old.map(render).unwrap_or_else(|| "-".to_string());
        log_clone.lock().unwrap().push(format!("{}<-{old}", render(new)));
    });
    obj.set("title", "b");
    obj.set("title", "c");

    assert_eq!(*log.lock().unwrap(), vec!["a<--", "b<-a", "c<-b"]);
}

#[test]
fn identical_assignment_is_a_no_op() {
    let obj = Obj::new();
    obj.set("title", "a");
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    let _unwatch = intercept(&obj, "title", move |_new, _old| {
        counter.fetch_add(1, Ordering::Relaxed);
    });
    obj.set("title", "a");
    assert_eq!(hits.load(Ordering::Relaxed), 1, "only the initial delivery");

    let child = Obj::new();
    obj.set("title", child.clone());
    assert_eq!(hits.load(Ordering::Relaxed), 2);
    // Same handle again: identical by reference.
    obj.set("title", child);
    assert_eq!(hits.load(Ordering::Relaxed), 2);
}

#[test]
fn equal_contents_different_object_still_notifies() {
    let obj = Obj::new();
    obj.set("user", Obj::from_json(&serde_json::json!({"t": 1})).unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    let _unwatch = intercept(&obj, "user", move |_new, _old| {
        counter.fetch_add(1, Ordering::Relaxed);
    });
    obj.set("user", Obj::from_json(&serde_json::json!({"t": 1})).unwrap());

    assert_eq!(hits.load(Ordering::Relaxed), 2);
}

#[test]
fn assignment_to_unwatched_key_does_not_notify() {
    let obj = Obj::new();
    obj.set("title", "a");
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    let _unwatch = intercept(&obj, "title", move |_new, _old| {
        counter.fetch_add(1, Ordering::Relaxed);
    });
    obj.set("name", "b");

    assert_eq!(hits.load(Ordering::Relaxed), 1);
}

// ============================================================================
// Multiple listeners
// ============================================================================

#[test]
fn listeners_accumulate_and_fire_in_registration_order() {
    let obj = Obj::new();
    obj.set("title", "a");
    let log = make_log();

    let _u1 = {
        let log = Arc::clone(&log);
        intercept(&obj, "title", move |new, _| {
            log.lock().unwrap().push(format!("first:{}", render(new)));
        })
    };
    let _u2 = {
        let log = Arc::clone(&log);
        intercept(&obj, "title", move |new, _| {
            log.lock().unwrap().push(format!("second:{}", render(new)));
        })
    };

    obj.set("title", "b");
    assert_eq!(
        *log.lock().unwrap(),
        vec!["first:a", "second:a", "first:b", "second:b"]
    );
}

#[test]
fn teardown_removes_only_its_own_listener() {
    let obj = Obj::new();
    obj.set("title", "a");
    let log = make_log();

    let u1 = {
        let log = Arc::clone(&log);
        intercept(&obj, "title", move |new, _| {
            log.lock().unwrap().push(format!("first:{}", render(new)));
        })
    };
    let _u2 = {
        let log = Arc::clone(&log);
        intercept(&obj, "title", move |new, _| {
            log.lock().unwrap().push(format!("second:{}", render(new)));
        })
    };
    assert_eq!(listener_count(&obj, "title"), 2);

    u1();
    assert_eq!(listener_count(&obj, "title"), 1);

    obj.set("title", "b");
    assert_eq!(
        *log.lock().unwrap(),
        vec!["first:a", "second:a", "second:b"]
    );
}

#[test]
fn teardown_stops_all_future_notification() {
    let obj = Obj::new();
    obj.set("title", "a");
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    let unwatch = intercept(&obj, "title", move |_new, _old| {
        counter.fetch_add(1, Ordering::Relaxed);
    });
    unwatch();
    obj.set("title", "b");

    assert_eq!(hits.load(Ordering::Relaxed), 1);
    assert_eq!(listener_count(&obj, "title"), 0);
}

// ============================================================================
// Reentrancy — snapshot semantics during notification
// ============================================================================

#[test]
fn listener_added_during_notification_waits_for_next_round() {
    let obj = Obj::new();
    obj.set("title", "a");
    let log = make_log();

    let _outer = {
        let host = obj.clone();
        let log = Arc::clone(&log);
        intercept(&obj, "title", move |_new, old| {
            if old.is_none() {
                return;
            }
            log.lock().unwrap().push("adder".to_string());
            let inner_log = Arc::clone(&log);
            // New listener gets its initial delivery immediately but must
            // not receive the change notification of the current round.
            // Dropping the teardown abandons it in place, which is fine here.
            let _ = intercept(&host, "title", move |new, old| {
                let kind = if old.is_some() { "change" } else { "initial" };
                inner_log
                    .lock()
                    .unwrap()
                    .push(format!("added:{kind}:{}", render(new)));
            });
        })
    };

    obj.set("title", "b");
    assert_eq!(*log.lock().unwrap(), vec!["adder", "added:initial:b"]);

    obj.set("title", "c");
    assert_eq!(
        log.lock().unwrap().last().map(String::as_str),
        Some("added:change:c")
    );
}

#[test]
fn self_removal_during_notification_does_not_skip_later_listeners() {
    let obj = Obj::new();
    obj.set("title", "a");
    let log = make_log();

    let slot: Arc<Mutex<Option<Unwatch>>> = Arc::new(Mutex::new(None));
    let u1 = {
        let log = Arc::clone(&log);
        let slot = Arc::clone(&slot);
        intercept(&obj, "title", move |_new, old| {
            if old.is_none() {
                return;
            }
            log.lock().unwrap().push("first".to_string());
            if let Some(unwatch) = slot.lock().unwrap().take() {
                unwatch();
            }
        })
    };
    *slot.lock().unwrap() = Some(u1);
    let _u2 = {
        let log = Arc::clone(&log);
        intercept(&obj, "title", move |_new, old| {
            if old.is_some() {
                log.lock().unwrap().push("second".to_string());
            }
        })
    };

    obj.set("title", "b");
    assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);

    obj.set("title", "c");
    assert_eq!(
        *log.lock().unwrap(),
        vec!["first", "second", "second"],
        "self-removed listener must stay silent in later rounds"
    );
}
