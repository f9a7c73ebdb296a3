//! C-ABI surface for the `pathkv` storage engine.
//!
//! Every entry point takes a process-wide `u64` handle rather than a raw
//! pointer (see [`handle`]); result codes are `0` (ok), `-1` (generic
//! failure), `-2` (authentication failed). Functions returning a pointer
//! use null for "not found" or "access denied" rather than a result code,
//! since a foreign host cannot otherwise distinguish "no value" from an
//! error without an extra out-parameter.
//!
//! `enable_rules` is part of the table for ABI completeness but always
//! fails: a declarative authorization-rules engine is out of scope here,
//! hosts needing one implement [`pathkv::auth::AuthHook`] in Rust and link
//! it in directly.

#![allow(clippy::missing_safety_doc)]

mod async_queue;
mod convert;
mod handle;

use std::{
    ffi::{CStr, CString},
    os::raw::c_char,
    sync::Arc,
};

use pathkv::{
    auth::{AuthContext, SharedSecretAuthHook},
    event::{EventQueueConfig, QueuedEventKind},
    Engine, EngineConfig, Error,
};

use async_queue::AsyncWriteQueue;

const OK: i32 = 0;
const ERR: i32 = -1;
const AUTH_FAILED: i32 = -2;

unsafe fn cstr_to_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

unsafe fn token_to_ctx(token_or_null: *const c_char) -> AuthContext {
    match cstr_to_str(token_or_null) {
        Some(token) => AuthContext::bearer(token),
        None => AuthContext::none(),
    }
}

fn to_code(result: Result<(), Error>) -> i32 {
    match result {
        Ok(()) => OK,
        Err(Error::AuthenticationFailed) => AUTH_FAILED,
        Err(_) => ERR,
    }
}

fn leak_bytes(bytes: Vec<u8>) -> *mut u8 {
    let mut boxed = bytes.into_boxed_slice();
    let ptr = boxed.as_mut_ptr();
    std::mem::forget(boxed);
    ptr
}

/// Opens (or creates) a store at `data_dir`, returning a handle, or `0` on
/// failure.
#[no_mangle]
pub unsafe extern "C" fn init(data_dir: *const c_char) -> u64 {
    let Some(data_dir) = cstr_to_str(data_dir) else {
        return 0;
    };
    match Engine::new(EngineConfig::new(data_dir)) {
        Ok(engine) => handle::insert(engine),
        Err(error) => {
            tracing::warn!(%error, "failed to open engine");
            0
        }
    }
}

/// Releases a handle. The store on disk is untouched; a later `init` on
/// the same `data_dir` reopens it.
#[no_mangle]
pub unsafe extern "C" fn close(handle: u64) {
    handle::remove(handle);
}

#[no_mangle]
pub unsafe extern "C" fn enable_auth(handle: u64, secret_utf8: *const c_char) -> i32 {
    let Some(h) = handle::get(handle) else {
        return ERR;
    };
    let Some(secret) = cstr_to_str(secret_utf8) else {
        return ERR;
    };
    h.engine.set_auth_hook(Arc::new(SharedSecretAuthHook::new(secret)));
    OK
}

#[no_mangle]
pub unsafe extern "C" fn enable_rules(_handle: u64, _rules_json_utf8: *const c_char) -> i32 {
    ERR
}

#[no_mangle]
pub unsafe extern "C" fn set_string(
    handle: u64,
    path: *const c_char,
    json_utf8: *const c_char,
    token_or_null: *const c_char,
) -> i32 {
    let Some(h) = handle::get(handle) else {
        return ERR;
    };
    let Some(path) = cstr_to_str(path) else {
        return ERR;
    };
    let Some(json) = cstr_to_str(json_utf8) else {
        return ERR;
    };
    let Ok(json_value) = serde_json::from_str::<serde_json::Value>(json) else {
        return ERR;
    };
    let value = convert::from_json(&json_value);
    let ctx = token_to_ctx(token_or_null);
    to_code(h.engine.set(path, value, &ctx))
}

/// Returns a heap-allocated, null-terminated JSON string the caller must
/// release with [`free_string`], or null on not-found / access-denied /
/// failure.
#[no_mangle]
pub unsafe extern "C" fn get_string(handle: u64, path: *const c_char, token_or_null: *const c_char) -> *mut c_char {
    let Some(h) = handle::get(handle) else {
        return std::ptr::null_mut();
    };
    let Some(path) = cstr_to_str(path) else {
        return std::ptr::null_mut();
    };
    let ctx = token_to_ctx(token_or_null);
    match h.engine.get(path, &ctx) {
        Ok(value) => {
            let json = convert::to_json(&value).to_string();
            CString::new(json).map_or(std::ptr::null_mut(), CString::into_raw)
        }
        Err(_) => std::ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn set_binary(
    handle: u64,
    path: *const c_char,
    bytes: *const u8,
    len: usize,
    token_or_null: *const c_char,
) -> i32 {
    let Some(h) = handle::get(handle) else {
        return ERR;
    };
    let Some(path) = cstr_to_str(path) else {
        return ERR;
    };
    if bytes.is_null() {
        return ERR;
    }
    let slice = std::slice::from_raw_parts(bytes, len);
    let Ok(value) = pathkv::codec::decode(slice) else {
        return ERR;
    };
    let ctx = token_to_ctx(token_or_null);
    to_code(h.engine.set(path, value, &ctx))
}

/// Returns the leaf's raw codec bytes (`*out_len` set to the length) the
/// caller must release with [`free_bytes`], or null if the path is
/// missing, denied, or not a single primitive leaf.
#[no_mangle]
pub unsafe extern "C" fn get_binary(
    handle: u64,
    path: *const c_char,
    out_len: *mut usize,
    token_or_null: *const c_char,
) -> *mut u8 {
    let Some(h) = handle::get(handle) else {
        return std::ptr::null_mut();
    };
    let Some(path) = cstr_to_str(path) else {
        return std::ptr::null_mut();
    };
    let ctx = token_to_ctx(token_or_null);
    match h.engine.get(path, &ctx) {
        Ok(value) if value.is_primitive() => {
            let bytes = pathkv::codec::encode(&value);
            if !out_len.is_null() {
                *out_len = bytes.len();
            }
            leak_bytes(bytes)
        }
        _ => std::ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn delete(handle: u64, path: *const c_char, token_or_null: *const c_char) -> i32 {
    let Some(h) = handle::get(handle) else {
        return ERR;
    };
    let Some(path) = cstr_to_str(path) else {
        return ERR;
    };
    let ctx = token_to_ctx(token_or_null);
    to_code(h.engine.delete(path, &ctx))
}

#[repr(C)]
pub struct RawInfo {
    pub len: usize,
    pub is_primitive: i32,
}

/// Same payload as [`get_binary`], with a `RawInfo` out-parameter instead
/// of a bare length. This is a copy of the leaf's bytes, not a borrow into
/// the backing store: the read transaction closes before this function
/// returns, so nothing would be left to borrow from.
#[no_mangle]
pub unsafe extern "C" fn get_raw(
    handle: u64,
    path: *const c_char,
    info: *mut RawInfo,
    token_or_null: *const c_char,
) -> *mut u8 {
    let Some(h) = handle::get(handle) else {
        return std::ptr::null_mut();
    };
    let Some(path) = cstr_to_str(path) else {
        return std::ptr::null_mut();
    };
    let ctx = token_to_ctx(token_or_null);
    match h.engine.get(path, &ctx) {
        Ok(value) if value.is_primitive() => {
            let bytes = pathkv::codec::encode(&value);
            if !info.is_null() {
                *info = RawInfo { len: bytes.len(), is_primitive: 1 };
            }
            leak_bytes(bytes)
        }
        _ => {
            if !info.is_null() {
                *info = RawInfo { len: 0, is_primitive: 0 };
            }
            std::ptr::null_mut()
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn enable_event_queue(handle: u64) -> i32 {
    let Some(h) = handle::get(handle) else {
        return ERR;
    };
    h.engine.enable_event_queue(EventQueueConfig::default());
    OK
}

#[repr(C)]
pub struct FfiEvent {
    pub kind: i32,
    pub path: *mut c_char,
    pub value: *mut u8,
    pub value_len: usize,
    pub sequence: u64,
    pub timestamp_millis: u64,
}

/// Pops up to `max_count` queued events into `buffer` (caller-owned, at
/// least `max_count` elements), returning how many were written. Each
/// written event's `path`/`value` must be released with [`free_string`]/
/// [`free_bytes`] respectively.
#[no_mangle]
pub unsafe extern "C" fn event_queue_pop_batch(handle: u64, buffer: *mut FfiEvent, max_count: usize) -> usize {
    let Some(h) = handle::get(handle) else {
        return 0;
    };
    let Some(queue) = h.engine.event_queue() else {
        return 0;
    };
    if buffer.is_null() {
        return 0;
    }
    let batch = queue.pop_batch(max_count);
    for (i, event) in batch.iter().enumerate() {
        let path_ptr = CString::new(event.path.clone()).map_or(std::ptr::null_mut(), CString::into_raw);
        let (value_ptr, value_len) = match &event.value {
            Some(bytes) => (leak_bytes(bytes.clone()), bytes.len()),
            None => (std::ptr::null_mut(), 0),
        };
        let kind = match event.kind {
            QueuedEventKind::Changed => 0,
            QueuedEventKind::Deleted => 1,
        };
        *buffer.add(i) = FfiEvent {
            kind,
            path: path_ptr,
            value: value_ptr,
            value_len,
            sequence: event.sequence,
            timestamp_millis: event.timestamp_millis,
        };
    }
    batch.len()
}

#[no_mangle]
pub unsafe extern "C" fn event_queue_pending(handle: u64) -> usize {
    handle::get(handle).and_then(|h| h.engine.event_queue()).map_or(0, |q| q.pending())
}

#[no_mangle]
pub unsafe extern "C" fn enable_write_queue(handle: u64) -> i32 {
    let Some(h) = handle::get(handle) else {
        return ERR;
    };
    let mut guard = h.write_queue.lock().unwrap();
    if guard.is_none() {
        *guard = Some(Arc::new(AsyncWriteQueue::spawn(Arc::clone(&h.engine))));
    }
    OK
}

/// Enqueues a write and returns a request id for [`wait_for_write`], or
/// `0` if the handle is unknown, the path is invalid, or no write queue
/// has been enabled.
#[no_mangle]
pub unsafe extern "C" fn set_async(
    handle: u64,
    path: *const c_char,
    bytes: *const u8,
    len: usize,
    token_or_null: *const c_char,
) -> u64 {
    let Some(h) = handle::get(handle) else {
        return 0;
    };
    let Some(path) = cstr_to_str(path) else {
        return 0;
    };
    if bytes.is_null() {
        return 0;
    }
    let slice = std::slice::from_raw_parts(bytes, len);
    let Ok(value) = pathkv::codec::decode(slice) else {
        return 0;
    };
    let ctx = token_to_ctx(token_or_null);
    let queue = h.write_queue.lock().unwrap().clone();
    queue.map_or(0, |q| q.set_async(path.to_string(), value, ctx))
}

#[no_mangle]
pub unsafe extern "C" fn delete_async(handle: u64, path: *const c_char, token_or_null: *const c_char) -> u64 {
    let Some(h) = handle::get(handle) else {
        return 0;
    };
    let Some(path) = cstr_to_str(path) else {
        return 0;
    };
    let ctx = token_to_ctx(token_or_null);
    let queue = h.write_queue.lock().unwrap().clone();
    queue.map_or(0, |q| q.delete_async(path.to_string(), ctx))
}

#[no_mangle]
pub unsafe extern "C" fn wait_for_write(handle: u64, id: u64) -> i32 {
    let Some(h) = handle::get(handle) else {
        return ERR;
    };
    let queue = h.write_queue.lock().unwrap().clone();
    match queue.and_then(|q| q.wait(id)) {
        Some(Ok(())) => OK,
        Some(Err(Error::AuthenticationFailed)) => AUTH_FAILED,
        Some(Err(_)) | None => ERR,
    }
}

#[no_mangle]
pub unsafe extern "C" fn free_string(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    drop(CString::from_raw(ptr));
}

#[no_mangle]
pub unsafe extern "C" fn free_bytes(ptr: *mut u8, len: usize) {
    if ptr.is_null() {
        return;
    }
    drop(Vec::from_raw_parts(ptr, len, len));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn init_handle() -> (tempfile::TempDir, u64) {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = CString::new(dir.path().to_str().unwrap()).unwrap();
        let handle = unsafe { init(data_dir.as_ptr()) };
        assert_ne!(handle, 0);
        (dir, handle)
    }

    #[test]
    fn set_and_get_string_round_trips() {
        let (_dir, handle) = init_handle();
        let path = CString::new("/users/1/name").unwrap();
        let json = CString::new("\"Alice\"").unwrap();
        unsafe {
            assert_eq!(set_string(handle, path.as_ptr(), json.as_ptr(), std::ptr::null()), OK);
            let got = get_string(handle, path.as_ptr(), std::ptr::null());
            assert!(!got.is_null());
            let text = CStr::from_ptr(got).to_str().unwrap().to_string();
            assert_eq!(text, "\"Alice\"");
            free_string(got);
            close(handle);
        }
    }

    #[test]
    fn get_string_on_missing_path_is_null() {
        let (_dir, handle) = init_handle();
        let path = CString::new("/missing").unwrap();
        unsafe {
            assert!(get_string(handle, path.as_ptr(), std::ptr::null()).is_null());
            close(handle);
        }
    }

    #[test]
    fn set_binary_then_get_raw_round_trips() {
        let (_dir, handle) = init_handle();
        let path = CString::new("/count").unwrap();
        let bytes = pathkv::codec::encode(&pathkv::Value::Number(42.0));
        unsafe {
            assert_eq!(set_binary(handle, path.as_ptr(), bytes.as_ptr(), bytes.len(), std::ptr::null()), OK);
            let mut info = RawInfo { len: 0, is_primitive: 0 };
            let got = get_raw(handle, path.as_ptr(), &mut info, std::ptr::null());
            assert!(!got.is_null());
            assert_eq!(info.is_primitive, 1);
            let slice = std::slice::from_raw_parts(got, info.len);
            assert_eq!(pathkv::codec::decode(slice).unwrap(), pathkv::Value::Number(42.0));
            free_bytes(got, info.len);
            close(handle);
        }
    }

    #[test]
    fn wrong_auth_token_is_rejected() {
        let (_dir, handle) = init_handle();
        let secret = CString::new("topsecret").unwrap();
        let path = CString::new("/a").unwrap();
        let json = CString::new("1").unwrap();
        let bad_token = CString::new("wrong").unwrap();
        unsafe {
            assert_eq!(enable_auth(handle, secret.as_ptr()), OK);
            let code = set_string(handle, path.as_ptr(), json.as_ptr(), bad_token.as_ptr());
            assert_eq!(code, AUTH_FAILED);
            close(handle);
        }
    }

    #[test]
    fn async_write_then_wait_completes() {
        let (_dir, handle) = init_handle();
        let path = CString::new("/async").unwrap();
        let bytes = pathkv::codec::encode(&pathkv::Value::Boolean(true));
        unsafe {
            assert_eq!(enable_write_queue(handle), OK);
            let id = set_async(handle, path.as_ptr(), bytes.as_ptr(), bytes.len(), std::ptr::null());
            assert_ne!(id, 0);
            assert_eq!(wait_for_write(handle, id), OK);
            let got = get_string(handle, path.as_ptr(), std::ptr::null());
            assert!(!got.is_null());
            assert_eq!(CStr::from_ptr(got).to_str().unwrap(), "true");
            free_string(got);
            close(handle);
        }
    }

    #[test]
    fn event_queue_reports_changes() {
        let (_dir, handle) = init_handle();
        let path = CString::new("/watched").unwrap();
        let json = CString::new("1").unwrap();
        unsafe {
            assert_eq!(enable_event_queue(handle), OK);
            assert_eq!(set_string(handle, path.as_ptr(), json.as_ptr(), std::ptr::null()), OK);
            assert_eq!(event_queue_pending(handle), 1);
            let mut buffer = [FfiEvent {
                kind: 0,
                path: std::ptr::null_mut(),
                value: std::ptr::null_mut(),
                value_len: 0,
                sequence: 0,
                timestamp_millis: 0,
            }];
            let n = event_queue_pop_batch(handle, buffer.as_mut_ptr(), 1);
            assert_eq!(n, 1);
            assert_eq!(buffer[0].kind, 0);
            free_string(buffer[0].path);
            if !buffer[0].value.is_null() {
                free_bytes(buffer[0].value, buffer[0].value_len);
            }
            close(handle);
        }
    }
}
