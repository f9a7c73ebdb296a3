//! The storage engine (spec §4.4): `set`, `get`, `delete`, `update`,
//! `exists`, `list`, plus hook/emitter configuration. This is the module
//! that owns the write-path decomposition ([`decompose`]) and the
//! read-path cursor reconstruction ([`reconstruct`]), mirroring the
//! teacher's split of its largest module into a directory with a dedicated
//! scanning submodule.

mod decompose;
mod reconstruct;

use std::sync::{Arc, RwLock};

use tracing::{instrument, warn};

use crate::{
    auth::{AllowAll, AuthContext, AuthHook, Decision, Operation},
    codec,
    error::{Error, Result},
    event::{emitter, Emitter, Event, EventQueue, EventQueueConfig, QueuedEvent, QueuedEventKind},
    options::EngineConfig,
    path::{self, Path},
    store::Store,
    value::{Map, Value},
};

/// An open storage engine over one backing-store environment.
pub struct Engine {
    store: Store,
    auth_hook: RwLock<Arc<dyn AuthHook>>,
    emitter: Emitter,
    event_queue: RwLock<Option<Arc<EventQueue>>>,
}

impl Engine {
    /// Open (or create) an engine rooted at `config.data_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be opened.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let store = Store::open(&config.data_dir, config.durability)?;
        Ok(Self {
            store,
            auth_hook: RwLock::new(Arc::new(AllowAll)),
            emitter: Emitter::new(),
            event_queue: RwLock::new(None),
        })
    }

    /// Install `hook`, replacing whatever was previously configured.
    pub fn set_auth_hook(&self, hook: Arc<dyn AuthHook>) {
        *self.auth_hook.write().unwrap() = hook;
    }

    /// Register an in-process subscriber (spec §4.6).
    pub fn subscribe(&self, pattern: &str, include_children: bool, callback: emitter::Callback) -> emitter::SubscriptionId {
        self.emitter.subscribe(pattern, include_children, callback)
    }

    /// Cancel a subscription registered with [`Engine::subscribe`].
    pub fn unsubscribe(&self, id: emitter::SubscriptionId) {
        self.emitter.unsubscribe(id);
    }

    /// Switch the engine into queued mode (spec §4.7): every post-commit
    /// event is additionally appended to an out-of-process ring with the
    /// given configuration. Replaces any previously enabled queue.
    pub fn enable_event_queue(&self, config: EventQueueConfig) -> Arc<EventQueue> {
        let queue = Arc::new(EventQueue::new(config));
        *self.event_queue.write().unwrap() = Some(Arc::clone(&queue));
        queue
    }

    /// The currently enabled out-of-process event queue, if any.
    #[must_use]
    pub fn event_queue(&self) -> Option<Arc<EventQueue>> {
        self.event_queue.read().unwrap().clone()
    }

    fn authorize(&self, op: Operation, path: &Path, ctx: &AuthContext) -> Result<()> {
        match self.auth_hook.read().unwrap().authorize(op, path, ctx) {
            Decision::Allow => Ok(()),
            Decision::Deny => {
                warn!(%path, ?op, "access denied");
                Err(Error::AccessDenied)
            }
            Decision::AuthenticationFailed => Err(Error::AuthenticationFailed),
        }
    }

    fn wants_event(&self) -> bool {
        self.emitter.has_subscribers() || self.event_queue.read().unwrap().is_some()
    }

    fn emit(&self, event: Event) {
        if self.emitter.has_subscribers() {
            self.emitter.dispatch(&event);
        }
        let queue = self.event_queue.read().unwrap();
        if let Some(queue) = queue.as_ref() {
            let dropped = queue.take_dropped();
            if dropped > 0 {
                warn!(dropped, "event queue dropped events since last drain");
            }
            queue.push(to_queued_event(&event, queue.next_sequence()));
        }
    }

    /// Write `value` at `path`, decomposing it into per-primitive leaves
    /// (spec §4.4.1).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] on a malformed path, an authorization
    /// error if the configured hook denies the write, or a codec/backing-
    /// store error.
    #[instrument(skip(self, path, value, ctx), fields(path = tracing::field::Empty))]
    pub fn set(&self, path: &str, value: Value, ctx: &AuthContext) -> Result<()> {
        let path = path::normalize(path).map_err(|e| Error::InvalidPath(e.to_string()))?;
        tracing::Span::current().record("path", path.as_str());
        self.authorize(Operation::Write, &path, ctx)?;

        let wants_event = self.wants_event();
        let old_value = if wants_event { self.get_value(&path).ok() } else { None };

        let write = self.store.begin_write()?;
        decompose::set_recursive(&write, &path, &value)?;
        write.commit()?;

        if wants_event {
            self.emit(Event::Changed { path: path.as_str().to_string(), new: value, old: old_value });
        }
        Ok(())
    }

    /// Read the value at `path`, reconstructing a subtree if `path` is
    /// interior (spec §4.4.2).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if nothing exists at `path`, an
    /// authorization error, or a codec/backing-store error.
    #[instrument(skip(self, path, ctx), fields(path = tracing::field::Empty))]
    pub fn get(&self, path: &str, ctx: &AuthContext) -> Result<Value> {
        let path = path::normalize(path).map_err(|e| Error::InvalidPath(e.to_string()))?;
        tracing::Span::current().record("path", path.as_str());
        self.authorize(Operation::Read, &path, ctx)?;
        self.get_value(&path)
    }

    fn get_value(&self, path: &Path) -> Result<Value> {
        let read = self.store.begin_read()?;
        match reconstruct::get_at(&read, path)? {
            Some(value) => Ok(value),
            None if path.is_root() => Ok(Value::Object(Map::new())),
            None => Err(Error::NotFound),
        }
    }

    /// Delete `path` and everything under it (spec §4.4.4). A no-op delete
    /// of an already-absent path succeeds without emitting an event.
    ///
    /// # Errors
    ///
    /// Returns an authorization error or a backing-store error.
    #[instrument(skip(self, path, ctx), fields(path = tracing::field::Empty))]
    pub fn delete(&self, path: &str, ctx: &AuthContext) -> Result<()> {
        let path = path::normalize(path).map_err(|e| Error::InvalidPath(e.to_string()))?;
        tracing::Span::current().record("path", path.as_str());
        self.authorize(Operation::Delete, &path, ctx)?;

        let wants_event = self.wants_event();
        let old_value = if wants_event { self.get_value(&path).ok() } else { None };

        let write = self.store.begin_write()?;
        let mut any_deleted = false;
        if path.is_root() {
            for key in write.keys_with_prefix(b"/")? {
                write.delete(&key)?;
                any_deleted = true;
            }
        } else {
            if write.get(path.as_bytes())?.is_some() {
                write.delete(path.as_bytes())?;
                any_deleted = true;
            }
            let prefix = path.child_prefix();
            for key in write.keys_with_prefix(prefix.as_bytes())? {
                write.delete(&key)?;
                any_deleted = true;
            }
        }
        write.commit()?;

        if any_deleted && wants_event {
            self.emit(Event::Deleted { path: path.as_str().to_string(), old: old_value });
        }
        Ok(())
    }

    /// Shallow-merge `patch` (which must be an object) into the object at
    /// `path`, or `set(path, patch)` if nothing exists there yet
    /// (spec §4.4.5).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] if `patch` is not an object or the
    /// current value at `path` is not an object, or any `set`/`get` error.
    pub fn update(&self, path: &str, patch: Value, ctx: &AuthContext) -> Result<()> {
        let Value::Object(patch_map) = patch else {
            return Err(Error::InvalidPath("update patch must be an object".to_string()));
        };
        let normalized = path::normalize(path).map_err(|e| Error::InvalidPath(e.to_string()))?;

        match self.get(path, ctx) {
            Ok(Value::Object(mut current)) => {
                for (key, value) in patch_map {
                    current.insert(key, value);
                }
                self.set(normalized.as_str(), Value::Object(current), ctx)
            }
            Ok(_) => Err(Error::InvalidPath(format!("{normalized} is not an object"))),
            Err(Error::NotFound) => self.set(normalized.as_str(), Value::Object(patch_map), ctx),
            Err(e) => Err(e),
        }
    }

    /// `true` if `get(path, ctx)` would succeed, computed by a cheaper
    /// point-then-prefix existence test rather than full reconstruction
    /// (spec §4.4.6).
    ///
    /// # Errors
    ///
    /// Returns an authorization error or a backing-store error.
    pub fn exists(&self, path: &str, ctx: &AuthContext) -> Result<bool> {
        let path = path::normalize(path).map_err(|e| Error::InvalidPath(e.to_string()))?;
        self.authorize(Operation::Read, &path, ctx)?;
        if path.is_root() {
            return Ok(true);
        }
        let read = self.store.begin_read()?;
        if read.get(path.as_bytes())?.is_some() {
            return Ok(true);
        }
        let prefix = path.child_prefix();
        let mut cursor = read.cursor_from(prefix.as_bytes())?;
        match cursor.next()? {
            Some((key, _)) => Ok(key.starts_with(prefix.as_bytes())),
            None => Ok(false),
        }
    }

    /// Direct-child segment names at `path`, without recursing into them
    /// (spec §4.4.7).
    ///
    /// # Errors
    ///
    /// Returns an authorization error or a backing-store error.
    pub fn list(&self, path: &str, ctx: &AuthContext) -> Result<Vec<String>> {
        let path = path::normalize(path).map_err(|e| Error::InvalidPath(e.to_string()))?;
        self.authorize(Operation::Read, &path, ctx)?;
        let read = self.store.begin_read()?;
        reconstruct::list_children(&read, &path)
    }
}

fn encode_for_queue(value: &Value) -> Option<Vec<u8>> {
    value.is_primitive().then(|| codec::encode(value))
}

fn to_queued_event(event: &Event, sequence: u64) -> QueuedEvent {
    let timestamp_millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64);
    match event {
        Event::Changed { path, new, .. } => QueuedEvent {
            kind: QueuedEventKind::Changed,
            path: path.clone(),
            value: encode_for_queue(new),
            sequence,
            timestamp_millis,
        },
        Event::Deleted { path, old } => QueuedEvent {
            kind: QueuedEventKind::Deleted,
            path: path.clone(),
            value: old.as_ref().and_then(encode_for_queue),
            sequence,
            timestamp_millis,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tempfile::tempdir;

    use super::*;
    use crate::auth::SharedSecretAuthHook;

    fn engine() -> (tempfile::TempDir, Engine) {
        let dir = tempdir().unwrap();
        let engine = Engine::new(EngineConfig::new(dir.path())).unwrap();
        (dir, engine)
    }

    #[test]
    fn set_then_get_round_trips_a_primitive() {
        let (_dir, engine) = engine();
        engine.set("/a", Value::from("hi"), &AuthContext::none()).unwrap();
        assert_eq!(engine.get("/a", &AuthContext::none()).unwrap(), Value::from("hi"));
    }

    #[test]
    fn set_object_decomposes_and_leaves_no_entry_at_its_path() {
        let (_dir, engine) = engine();
        let value = Value::Object(Map::from([
            ("name".to_string(), Value::from("Alice")),
            ("age".to_string(), Value::from(30.0)),
        ]));
        engine.set("/u/1", value.clone(), &AuthContext::none()).unwrap();

        assert_eq!(engine.get("/u/1/name", &AuthContext::none()).unwrap(), Value::from("Alice"));
        assert_eq!(engine.get("/u/1/age", &AuthContext::none()).unwrap(), Value::from(30.0));
        assert_eq!(engine.get("/u/1", &AuthContext::none()).unwrap(), value);

        let read = engine.store.begin_read().unwrap();
        assert_eq!(read.get(b"/u/1").unwrap(), None);
    }

    #[test]
    fn set_array_round_trips_with_nested_object_element() {
        let (_dir, engine) = engine();
        let value = Value::Array(vec![
            Value::from(10.0),
            Value::from(20.0),
            Value::Object(Map::from([("k".to_string(), Value::from("v"))])),
        ]);
        engine.set("/arr", value.clone(), &AuthContext::none()).unwrap();
        assert_eq!(engine.get("/arr", &AuthContext::none()).unwrap(), value);
        assert_eq!(engine.get("/arr/2/k", &AuthContext::none()).unwrap(), Value::from("v"));
    }

    #[test]
    fn deep_path_reconstructs_every_ancestor() {
        let (_dir, engine) = engine();
        engine.set("/a/b/c/d", Value::from("deep"), &AuthContext::none()).unwrap();

        let expected = Value::Object(Map::from([(
            "b".to_string(),
            Value::Object(Map::from([(
                "c".to_string(),
                Value::Object(Map::from([("d".to_string(), Value::from("deep"))])),
            )])),
        )]));
        assert_eq!(engine.get("/a", &AuthContext::none()).unwrap(), expected);
    }

    #[test]
    fn get_missing_path_is_not_found() {
        let (_dir, engine) = engine();
        assert!(matches!(engine.get("/missing", &AuthContext::none()), Err(Error::NotFound)));
    }

    #[test]
    fn root_always_exists_and_starts_empty() {
        let (_dir, engine) = engine();
        assert_eq!(engine.get("/", &AuthContext::none()).unwrap(), Value::Object(Map::new()));
        assert!(engine.exists("/", &AuthContext::none()).unwrap());
    }

    #[test]
    fn delete_removes_subtree_and_is_idempotent() {
        let (_dir, engine) = engine();
        engine.set("/a/b", Value::from(1.0), &AuthContext::none()).unwrap();
        engine.delete("/a", &AuthContext::none()).unwrap();
        assert!(matches!(engine.get("/a/b", &AuthContext::none()), Err(Error::NotFound)));
        // second delete is a no-op, not an error
        engine.delete("/a", &AuthContext::none()).unwrap();
    }

    #[test]
    fn update_merges_shallowly_and_overrides_nested_objects() {
        let (_dir, engine) = engine();
        engine
            .set(
                "/a",
                Value::Object(Map::from([
                    ("x".to_string(), Value::from(1.0)),
                    ("nested".to_string(), Value::Object(Map::from([("keep".to_string(), Value::from(true))]))),
                ])),
                &AuthContext::none(),
            )
            .unwrap();

        engine
            .update(
                "/a",
                Value::Object(Map::from([("nested".to_string(), Value::Object(Map::new()))])),
                &AuthContext::none(),
            )
            .unwrap();

        let result = engine.get("/a", &AuthContext::none()).unwrap();
        let Value::Object(map) = result else { panic!("expected object") };
        assert_eq!(map.get("x"), Some(&Value::from(1.0)));
        assert_eq!(map.get("nested"), Some(&Value::Object(Map::new())));
    }

    #[test]
    fn update_on_missing_path_behaves_like_set() {
        let (_dir, engine) = engine();
        engine.update("/a", Value::Object(Map::from([("x".to_string(), Value::from(1.0))])), &AuthContext::none()).unwrap();
        assert_eq!(engine.get("/a/x", &AuthContext::none()).unwrap(), Value::from(1.0));
    }

    #[test]
    fn list_returns_direct_children_only() {
        let (_dir, engine) = engine();
        engine.set("/a/b/c", Value::from(1.0), &AuthContext::none()).unwrap();
        engine.set("/a/d", Value::from(2.0), &AuthContext::none()).unwrap();
        let mut names = engine.list("/a", &AuthContext::none()).unwrap();
        names.sort();
        assert_eq!(names, vec!["b", "d"]);
    }

    #[test]
    fn auth_hook_denies_without_touching_storage() {
        let (_dir, engine) = engine();
        engine.set_auth_hook(Arc::new(SharedSecretAuthHook::new("s3cret")));
        let err = engine.set("/a", Value::from(1.0), &AuthContext::none()).unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed));
    }

    #[test]
    fn subscriber_receives_changed_and_deleted_in_commit_order() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let (_dir, engine) = engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        engine.subscribe("/users/*", false, Box::new(move |event| recorder.lock().unwrap().push(event.clone())));

        engine.set("/users/a", Value::from(1.0), &AuthContext::none()).unwrap();
        engine.set("/users/b", Value::from(2.0), &AuthContext::none()).unwrap();
        engine.delete("/users/a", &AuthContext::none()).unwrap();

        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], Event::Changed { path, .. } if path == "/users/a"));
        assert!(matches!(&events[1], Event::Changed { path, .. } if path == "/users/b"));
        assert!(matches!(&events[2], Event::Deleted { path, .. } if path == "/users/a"));
    }

    #[test]
    fn event_queue_receives_events_with_monotonic_sequence() {
        let (_dir, engine) = engine();
        let queue = engine.enable_event_queue(EventQueueConfig::default());
        engine.set("/a", Value::from(1.0), &AuthContext::none()).unwrap();
        engine.set("/b", Value::from(2.0), &AuthContext::none()).unwrap();

        let batch = queue.pop_batch(10);
        assert_eq!(batch.len(), 2);
        assert!(batch[0].sequence < batch[1].sequence);
    }

    #[test]
    fn legacy_branch_marker_reads_as_implicit_object() {
        let (_dir, engine) = engine();
        let write = engine.store.begin_write().unwrap();
        write.put(b"/legacy", reconstruct::LEGACY_OBJECT_MARKER).unwrap();
        write.put(b"/legacy/x", &codec::encode(&Value::from("y"))).unwrap();
        write.commit().unwrap();

        let expected = Value::Object(Map::from([("x".to_string(), Value::from("y"))]));
        assert_eq!(engine.get("/legacy", &AuthContext::none()).unwrap(), expected);
    }

    #[test]
    fn large_fanout_list_uses_skip_ahead_without_missing_entries() {
        let (_dir, engine) = engine();
        for i in 0..200 {
            engine.set(&format!("/u/{i}"), Value::from(f64::from(i)), &AuthContext::none()).unwrap();
        }
        let Value::Object(map) = engine.get("/u", &AuthContext::none()).unwrap() else {
            panic!("expected object")
        };
        assert_eq!(map.len(), 200);
    }
}
