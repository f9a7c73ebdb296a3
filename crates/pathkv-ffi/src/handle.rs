//! Process-wide handle table.
//!
//! Foreign hosts address an [`Engine`] by an opaque `u64` rather than a raw
//! pointer, so a misbehaving caller can at worst pass a stale or unknown id
//! (rejected by a map lookup) instead of dereferencing freed memory.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, OnceLock,
    },
};

use pathkv::Engine;

use crate::async_queue::AsyncWriteQueue;

pub struct Handle {
    pub engine: Arc<Engine>,
    pub write_queue: Mutex<Option<Arc<AsyncWriteQueue>>>,
}

struct HandleTable {
    handles: Mutex<HashMap<u64, Arc<Handle>>>,
    next_id: AtomicU64,
}

static TABLE: OnceLock<HandleTable> = OnceLock::new();

fn table() -> &'static HandleTable {
    TABLE.get_or_init(|| HandleTable {
        handles: Mutex::new(HashMap::new()),
        next_id: AtomicU64::new(1),
    })
}

/// Registers `engine` under a fresh id. Ids start at 1; 0 is reserved as
/// the "no handle" sentinel returned by `init` on failure.
pub fn insert(engine: Engine) -> u64 {
    let id = table().next_id.fetch_add(1, Ordering::Relaxed);
    let handle = Arc::new(Handle {
        engine: Arc::new(engine),
        write_queue: Mutex::new(None),
    });
    table().handles.lock().unwrap().insert(id, handle);
    id
}

pub fn get(id: u64) -> Option<Arc<Handle>> {
    table().handles.lock().unwrap().get(&id).cloned()
}

pub fn remove(id: u64) -> Option<Arc<Handle>> {
    table().handles.lock().unwrap().remove(&id)
}
