//! Write-path decomposition: turning a compound `Value` into per-primitive
//! backing-store entries (spec §4.4.1).

use crate::{codec, error::Result, path::Path, store::WriteTxn, value::Value};

use super::reconstruct::ARRAY_SENTINEL_PREFIX;

/// Write `value` under `path`, decomposing arrays and objects into
/// per-primitive leaves. Clears `path`'s existing value and subtree first,
/// so a compound write never leaves a stale leaf or a stale descendant
/// behind (spec §3: primitives are terminal, no key may have both a value
/// and children; spec §4.4.5: an object-valued patch key replaces its
/// corresponding subtree).
pub(super) fn set_recursive(write: &WriteTxn, path: &Path, value: &Value) -> Result<()> {
    clear_subtree(write, path)?;
    write_value(write, path, value)
}

fn write_value(write: &WriteTxn, path: &Path, value: &Value) -> Result<()> {
    match value {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                write_value(write, &path.index(i), item)?;
            }
            let sentinel = format!("{ARRAY_SENTINEL_PREFIX}{}", items.len());
            write.put(path.as_bytes(), sentinel.as_bytes())?;
        }
        Value::Object(map) => {
            for (key, item) in map {
                write_value(write, &path.child(key), item)?;
            }
        }
        primitive => {
            write.put(path.as_bytes(), &codec::encode(primitive))?;
        }
    }
    Ok(())
}

/// Delete `path`'s own entry, if any, and every key under `path.child_prefix()`.
/// A strict superset of the old array-only orphan deletion: it also covers an
/// object or array write landing over a previously-stored primitive leaf, or
/// over a previously-longer array or differently-shaped object.
fn clear_subtree(write: &WriteTxn, path: &Path) -> Result<()> {
    if path.is_root() {
        for key in write.keys_with_prefix(b"/")? {
            write.delete(&key)?;
        }
        return Ok(());
    }
    if write.get(path.as_bytes())?.is_some() {
        write.delete(path.as_bytes())?;
    }
    let prefix = path.child_prefix();
    for key in write.keys_with_prefix(prefix.as_bytes())? {
        write.delete(&key)?;
    }
    Ok(())
}
