//! Post-commit event delivery: an in-process synchronous emitter for
//! subscribers living in this process (spec §4.6), and a lock-free SPSC
//! queue for out-of-process consumers (spec §4.7). Both are fed the same
//! [`Event`] by the engine after a transaction commits.

pub mod emitter;
pub mod queue;

pub use emitter::{Callback, Emitter, SubscriptionId};
pub use queue::{EventQueue, EventQueueConfig, OverflowPolicy, QueuedEvent, QueuedEventKind};

use crate::value::Value;

/// What happened to a path, post-commit.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// `set`/`update` produced a new value at `path`.
    Changed {
        /// The normalized path that changed.
        path: String,
        /// The value now stored at `path`.
        new: Value,
        /// The value previously at `path`, if any subscriber needed it.
        old: Option<Value>,
    },
    /// `delete` removed whatever was at `path`.
    Deleted {
        /// The normalized path that was deleted.
        path: String,
        /// The value that was at `path` before deletion, if retained.
        old: Option<Value>,
    },
}

impl Event {
    /// The path this event is about.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Event::Changed { path, .. } | Event::Deleted { path, .. } => path,
        }
    }
}
