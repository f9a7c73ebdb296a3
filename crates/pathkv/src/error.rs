//! The engine's flat error type.
//!
//! spec §9 calls out the teacher's nested, backend-generic error union as a
//! design smell for a single-backend store: one flat [`Error`] enum covers
//! every failure mode from path validation through the backing store.

use thiserror::Error;

use crate::codec::CodecError;

/// Everything that can go wrong calling into the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A path string failed validation (spec §4.1).
    #[error("invalid path: {0}")]
    InvalidPath(String),
    /// No value exists at the requested path, and it has no children either.
    #[error("not found")]
    NotFound,
    /// The configured [`crate::auth::AuthHook`] denied the operation.
    #[error("access denied")]
    AccessDenied,
    /// Caller-supplied credentials were rejected outright, distinct from a
    /// permitted-but-insufficient [`Error::AccessDenied`].
    #[error("authentication failed")]
    AuthenticationFailed,
    /// A stored leaf's bytes could not be decoded.
    #[error("decoding failed: {0}")]
    DecodingFailed(#[from] CodecError),
    /// A value could not be encoded for storage.
    #[error("encoding failed: {0}")]
    EncodingFailed(String),
    /// The backing store is out of space.
    #[error("storage full")]
    StorageFull,
    /// The backing store contains data that violates an engine invariant.
    #[error("corrupted: {0}")]
    Corrupted(String),
    /// The backing store's transaction machinery failed.
    #[error("transaction failed: {0}")]
    TransactionFailed(String),
    /// The out-of-process event queue dropped `{0}` events because no
    /// consumer drained it in time.
    #[error("event queue overflowed, {0} events dropped")]
    QueueOverflow(u64),
}

impl From<redb::DatabaseError> for Error {
    fn from(e: redb::DatabaseError) -> Self {
        Error::TransactionFailed(e.to_string())
    }
}

impl From<redb::TransactionError> for Error {
    fn from(e: redb::TransactionError) -> Self {
        Error::TransactionFailed(e.to_string())
    }
}

impl From<redb::TableError> for Error {
    fn from(e: redb::TableError) -> Self {
        Error::TransactionFailed(e.to_string())
    }
}

impl From<redb::CommitError> for Error {
    fn from(e: redb::CommitError) -> Self {
        Error::TransactionFailed(e.to_string())
    }
}

impl From<redb::StorageError> for Error {
    fn from(e: redb::StorageError) -> Self {
        match e {
            redb::StorageError::ValueTooLarge(_) => Error::StorageFull,
            other => Error::Corrupted(other.to_string()),
        }
    }
}

/// The engine's result alias.
pub type Result<T> = std::result::Result<T, Error>;
