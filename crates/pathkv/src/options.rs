//! Engine configuration.
//!
//! spec.md's own scope is silent on a configuration surface; this is ambient
//! engineering (SPEC_FULL.md §3) in the same plain-struct-with-defaults
//! idiom as the teacher's parser options.

use std::path::PathBuf;

use crate::event::EventQueueConfig;

/// Commit durability mode (spec §4.3: "durability mode tuned for moderate
/// sync latency").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Durability {
    /// Sync every commit before returning.
    Immediate,
    /// Group commits; moderate sync latency is acceptable.
    #[default]
    Eventual,
}

/// Construction-time configuration for an [`crate::engine::Engine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory the backing store is rooted at; created if absent.
    pub data_dir: PathBuf,
    /// Advisory ceiling on the backing store's map size, in bytes. `redb`
    /// grows its file dynamically and has no fixed-ceiling knob, so this is
    /// presently unenforced by [`crate::store::Store`]; it is kept on the
    /// config surface for interface parity with the black-box backing-store
    /// contract (spec §4.3) and in case a bounded backend is swapped in.
    pub map_size_bytes: u64,
    /// Commit durability mode.
    pub durability: Durability,
    /// Capacity and overflow policy for the out-of-process event queue,
    /// used only once [`crate::engine::Engine::enable_event_queue`] is
    /// called.
    pub event_queue: EventQueueConfig,
}

impl EngineConfig {
    /// A config rooted at `data_dir` with every other field defaulted.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            map_size_bytes: 1 << 30,
            durability: Durability::default(),
            event_queue: EventQueueConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_defaults_are_sane() {
        let config = EngineConfig::new("/tmp/pathkv");
        assert_eq!(config.data_dir, std::path::Path::new("/tmp/pathkv"));
        assert_eq!(config.durability, Durability::Eventual);
        assert!(config.map_size_bytes > 0);
    }
}
