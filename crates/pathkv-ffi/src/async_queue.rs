//! Background write queue behind `enable_write_queue`/`set_async`/
//! `delete_async`/`wait_for_write`.
//!
//! A single worker thread drains an MPSC channel of write requests against
//! the shared [`Engine`] and publishes each request's completion through a
//! `Mutex`-guarded completion map plus a `Condvar` that `wait` blocks on.
//! This exists only at the FFI boundary: `pathkv::Engine` itself is
//! synchronous, and a foreign host that wants fire-and-forget writes needs
//! somewhere to park the result until it asks for it.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc, Condvar, Mutex,
    },
    thread::JoinHandle,
};

use pathkv::{auth::AuthContext, Engine, Error, Value};
use std::sync::Arc;

type Completion = Option<Result<(), Error>>;

enum WriteRequest {
    Set { id: u64, path: String, value: Value, ctx: AuthContext },
    Delete { id: u64, path: String, ctx: AuthContext },
}

pub struct AsyncWriteQueue {
    sender: Option<mpsc::Sender<WriteRequest>>,
    completions: Arc<(Mutex<HashMap<u64, Completion>>, Condvar)>,
    next_id: AtomicU64,
    worker: Option<JoinHandle<()>>,
}

impl AsyncWriteQueue {
    pub fn spawn(engine: Arc<Engine>) -> Self {
        let (sender, receiver) = mpsc::channel::<WriteRequest>();
        let completions = Arc::new((Mutex::new(HashMap::new()), Condvar::new()));
        let worker_completions = Arc::clone(&completions);
        let worker = std::thread::spawn(move || {
            for request in receiver {
                let (id, result) = match request {
                    WriteRequest::Set { id, path, value, ctx } => (id, engine.set(&path, value, &ctx)),
                    WriteRequest::Delete { id, path, ctx } => (id, engine.delete(&path, &ctx)),
                };
                let (lock, cvar) = &*worker_completions;
                lock.lock().unwrap().insert(id, Some(result));
                cvar.notify_all();
            }
        });
        Self {
            sender: Some(sender),
            completions,
            next_id: AtomicU64::new(1),
            worker: Some(worker),
        }
    }

    fn reserve_id(&self) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.completions.0.lock().unwrap().insert(id, None);
        id
    }

    pub fn set_async(&self, path: String, value: Value, ctx: AuthContext) -> u64 {
        let id = self.reserve_id();
        if let Some(sender) = &self.sender {
            let _ = sender.send(WriteRequest::Set { id, path, value, ctx });
        }
        id
    }

    pub fn delete_async(&self, path: String, ctx: AuthContext) -> u64 {
        let id = self.reserve_id();
        if let Some(sender) = &self.sender {
            let _ = sender.send(WriteRequest::Delete { id, path, ctx });
        }
        id
    }

    /// Blocks until request `id` completes, returning its result. Returns
    /// `None` if `id` was never issued by this queue (or has already been
    /// collected by an earlier `wait`).
    pub fn wait(&self, id: u64) -> Option<Result<(), Error>> {
        let (lock, cvar) = &*self.completions;
        let mut completions = lock.lock().unwrap();
        loop {
            match completions.get(&id) {
                None => return None,
                Some(Some(_)) => return completions.remove(&id).unwrap(),
                Some(None) => completions = cvar.wait(completions).unwrap(),
            }
        }
    }
}

impl Drop for AsyncWriteQueue {
    fn drop(&mut self) {
        // Drop the sender first so the worker's `for request in receiver`
        // loop observes the channel closing and exits; joining before that
        // would deadlock.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
