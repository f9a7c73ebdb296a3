//! In-process synchronous event dispatch (spec §4.6).

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

use super::Event;

/// An id returned by [`Emitter::subscribe`], used to cancel later.
pub type SubscriptionId = u64;

/// A subscriber's callback, invoked synchronously on the thread that
/// committed the change.
pub type Callback = Box<dyn Fn(&Event) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    pattern: String,
    include_children: bool,
    callback: Callback,
}

/// The subscription registry. A linear scan per event against all active
/// subscriptions is the documented acceptable cost for expected subscription
/// counts (spec §4.6); an index is an optimization, not a correctness
/// requirement.
#[derive(Default)]
pub struct Emitter {
    subscriptions: Mutex<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl Emitter {
    /// An emitter with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if at least one subscription is active. The engine uses this
    /// to skip the `old_value` read on a hot-path `set`/`delete` when no one
    /// is listening (spec §4.4.1 step 2).
    #[must_use]
    pub fn has_subscribers(&self) -> bool {
        !self.subscriptions.lock().unwrap().is_empty()
    }

    /// Register `callback` for events matching `pattern`.
    ///
    /// Pattern semantics (spec §4.6):
    /// - An exact path fires only for that path.
    /// - A pattern ending in `*` matches any path with everything before the
    ///   `*` as a prefix.
    /// - `include_children = true` additionally matches any descendant of an
    ///   exact (non-`*`) pattern.
    pub fn subscribe(&self, pattern: &str, include_children: bool, callback: Callback) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscriptions.lock().unwrap().push(Subscription {
            id,
            pattern: pattern.to_string(),
            include_children,
            callback,
        });
        id
    }

    /// Cancel a subscription. A callback already in progress for it may
    /// still run to completion; no future callback fires.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.lock().unwrap().retain(|s| s.id != id);
    }

    /// Dispatch `event` to every matching subscriber, in subscription-id
    /// (registration) order, synchronously on the caller's thread.
    pub fn dispatch(&self, event: &Event) {
        let subs = self.subscriptions.lock().unwrap();
        for sub in subs.iter() {
            if matches_pattern(event.path(), &sub.pattern, sub.include_children) {
                (sub.callback)(event);
            }
        }
    }
}

fn matches_pattern(path: &str, pattern: &str, include_children: bool) -> bool {
    if let Some(prefix) = pattern.strip_suffix('*') {
        return path.starts_with(prefix);
    }
    if path == pattern {
        return true;
    }
    if include_children {
        let child_prefix = if pattern == "/" { "/".to_string() } else { format!("{pattern}/") };
        return path.starts_with(&child_prefix);
    }
    false
}
