//! Embedded, hierarchically-addressed key/value tree store.
//!
//! Writes of compound values decompose into per-primitive leaves under
//! descendant paths; reads at an interior path reconstruct the subtree by
//! scanning the backing store with prefix cursors. [`Engine`] is the
//! top-level entry point.
//!
//! ```
//! use pathkv::{auth::AuthContext, Engine, EngineConfig, Value};
//!
//! # fn main() -> pathkv::Result<()> {
//! let dir = tempfile::tempdir().unwrap();
//! let engine = Engine::new(EngineConfig::new(dir.path()))?;
//! let ctx = AuthContext::none();
//!
//! engine.set("/users/1/name", Value::from("Alice"), &ctx)?;
//! assert_eq!(engine.get("/users/1/name", &ctx)?, Value::from("Alice"));
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod codec;
pub mod engine;
pub mod error;
pub mod event;
pub mod options;
pub mod path;
pub mod store;
pub mod value;

pub use engine::Engine;
pub use error::{Error, Result};
pub use options::EngineConfig;
pub use path::Path;
pub use value::{Array, Map, Value};
