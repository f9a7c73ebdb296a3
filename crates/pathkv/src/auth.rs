//! Pluggable authorization hook (spec §4.5).
//!
//! The engine calls a hook synchronously before every operation with
//! `(op, normalized_path, auth_context)`. JWT validation and a declarative
//! rules engine are out of scope here; this module only defines the
//! interface the engine calls and one concrete reference hook so
//! `pathkv-ffi`'s `enable_auth` has something real to install.

use crate::path::Path;

/// The kind of access an [`AuthHook`] is asked to authorize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `get`, `exists`, or `list`.
    Read,
    /// `set` or `update`.
    Write,
    /// `delete`.
    Delete,
}

/// Caller-supplied credentials. Opaque to the engine; a hook interprets
/// `token` however its scheme requires.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    /// A bearer token, or `None` for an unauthenticated caller.
    pub token: Option<String>,
}

impl AuthContext {
    /// An unauthenticated context.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// A context carrying a bearer token.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self { token: Some(token.into()) }
    }
}

/// A hook's verdict on one authorization call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Proceed with the operation.
    Allow,
    /// The caller is known but not permitted; surfaces as
    /// [`crate::error::Error::AccessDenied`].
    Deny,
    /// The caller's credentials themselves are invalid; surfaces as
    /// [`crate::error::Error::AuthenticationFailed`], distinct from a
    /// permitted-but-insufficient [`Decision::Deny`].
    AuthenticationFailed,
}

/// A collaborator the engine calls synchronously before every operation
/// (spec §4.5). Implementations may call back into the engine for
/// read-only introspection while evaluating a rule; the engine never holds
/// a write transaction open across a hook call, and rejects a write
/// initiated from inside a hook.
pub trait AuthHook: Send + Sync {
    /// Decide whether `op` on `path` under `ctx` may proceed.
    fn authorize(&self, op: Operation, path: &Path, ctx: &AuthContext) -> Decision;
}

/// The default hook: every operation is allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AuthHook for AllowAll {
    fn authorize(&self, _op: Operation, _path: &Path, _ctx: &AuthContext) -> Decision {
        Decision::Allow
    }
}

/// A reference hook that compares `ctx.token` against one configured
/// secret. Not a JWT validator or rules engine (those are explicitly out of
/// scope); this exists so there is a concrete, testable hook to wire into
/// `enable_auth` at the C-ABI boundary.
pub struct SharedSecretAuthHook {
    secret: String,
}

impl SharedSecretAuthHook {
    /// Build a hook that requires `ctx.token == Some(secret)`.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }
}

impl AuthHook for SharedSecretAuthHook {
    fn authorize(&self, _op: Operation, _path: &Path, ctx: &AuthContext) -> Decision {
        match &ctx.token {
            Some(token) if token == &self.secret => Decision::Allow,
            _ => Decision::AuthenticationFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;

    #[test]
    fn allow_all_always_allows() {
        let p = path::normalize("/a").unwrap();
        assert_eq!(AllowAll.authorize(Operation::Write, &p, &AuthContext::none()), Decision::Allow);
    }

    #[test]
    fn shared_secret_accepts_matching_token() {
        let hook = SharedSecretAuthHook::new("s3cret");
        let p = path::normalize("/a").unwrap();
        assert_eq!(
            hook.authorize(Operation::Read, &p, &AuthContext::bearer("s3cret")),
            Decision::Allow
        );
    }

    #[test]
    fn shared_secret_rejects_missing_or_wrong_token() {
        let hook = SharedSecretAuthHook::new("s3cret");
        let p = path::normalize("/a").unwrap();
        assert_eq!(
            hook.authorize(Operation::Read, &p, &AuthContext::none()),
            Decision::AuthenticationFailed
        );
        assert_eq!(
            hook.authorize(Operation::Read, &p, &AuthContext::bearer("wrong")),
            Decision::AuthenticationFailed
        );
    }
}
