//! Cursor-driven subtree reconstruction (spec §4.4.2–§4.4.3, §4.4.7).
//!
//! This is the read-path counterpart of [`super::decompose`]: given an
//! interior path, it walks one forward cursor pass over the path's
//! `<path>/` prefix and reassembles an object, using the skip-ahead
//! optimization to jump past a whole nested descendant run in a single
//! re-seek rather than visiting every descendant one at a time.

use crate::{
    codec,
    error::{Error, Result},
    path::Path,
    store::ReadTxn,
    value::{Map, Value},
};

pub(super) const ARRAY_SENTINEL_PREFIX: &str = "__array__:";
pub(super) const LEGACY_OBJECT_MARKER: &[u8] = b"__branch__";

/// Parse an `__array__:<N>` sentinel's element count, if `bytes` is one.
pub(super) fn parse_array_sentinel(bytes: &[u8]) -> Option<usize> {
    let s = std::str::from_utf8(bytes).ok()?;
    let n = s.strip_prefix(ARRAY_SENTINEL_PREFIX)?;
    n.parse().ok()
}

/// Resolve the value at `path`: point-lookup first, falling back to subtree
/// reconstruction exactly as spec §4.4.2 describes. Returns `Ok(None)` for
/// the "genuinely missing, not even via children" case so callers can
/// distinguish it from the root's always-present empty object.
pub(super) fn get_at(read: &ReadTxn, path: &Path) -> Result<Option<Value>> {
    if let Some(bytes) = read.get(path.as_bytes())? {
        if let Some(n) = parse_array_sentinel(&bytes) {
            return reconstruct_array(read, path, n).map(Some);
        }
        if bytes == LEGACY_OBJECT_MARKER {
            // Tolerated but never written: an explicit object marker from
            // an older writer reads exactly like the no-entry-but-children
            // case (spec §3 Legacy note).
            return reconstruct_object(read, path);
        }
        let value = codec::decode(&bytes)?;
        return Ok(Some(value));
    }
    reconstruct_object(read, path)
}

fn reconstruct_array(read: &ReadTxn, path: &Path, len: usize) -> Result<Value> {
    let mut items = Vec::with_capacity(len);
    for i in 0..len {
        let child_path = path.index(i);
        let value = get_at(read, &child_path)?.ok_or(Error::Corrupted(format!(
            "array sentinel at {path} claims {len} elements but index {i} is missing"
        )))?;
        items.push(value);
    }
    Ok(Value::Array(items))
}

/// Build an object from every key strictly under `path`'s `/`-prefix by a
/// single forward cursor pass. Returns `Ok(None)` if `path` has no children
/// at all (the caller decides whether that's `NotFound` or, for the root,
/// an empty object).
pub(super) fn reconstruct_object(read: &ReadTxn, path: &Path) -> Result<Option<Value>> {
    let prefix = path.child_prefix();
    let prefix_bytes = prefix.as_bytes();
    let mut cursor = read.cursor_from(prefix_bytes)?;
    let mut map = Map::new();

    while let Some((key, value)) = cursor.next()? {
        if !key.starts_with(prefix_bytes) {
            break;
        }
        let suffix = std::str::from_utf8(&key[prefix_bytes.len()..])
            .map_err(|_| Error::Corrupted(format!("non-utf-8 key under {path}")))?;

        match suffix.find('/') {
            None => {
                // A direct child's own entry: decide what it is from the
                // bytes the cursor already handed us, per spec §4.4.3 step 4.
                let child = if let Some(n) = parse_array_sentinel(&value) {
                    let child_path = path.child(suffix);
                    reconstruct_array(read, &child_path, n)?
                } else if value == LEGACY_OBJECT_MARKER {
                    let child_path = path.child(suffix);
                    reconstruct_object(read, &child_path)?.unwrap_or(Value::Object(Map::new()))
                } else {
                    codec::decode(&value)?
                };
                map.insert(suffix.to_string(), child);
            }
            Some(split) => {
                // A grand-descendant: the whole subtree under this direct
                // child belongs to it. Recurse once to build the child's
                // full value (its own fresh cursor pass), then skip this
                // cursor past every remaining descendant of that child.
                let direct_child = &suffix[..split];
                let child_path = path.child(direct_child);
                if !map.contains_key(direct_child) {
                    let child_value = reconstruct_object(read, &child_path)?
                        .unwrap_or(Value::Object(Map::new()));
                    map.insert(direct_child.to_string(), child_value);
                }
                let synthetic = format!("{prefix}{direct_child}0");
                cursor.seek(synthetic.as_bytes())?;
            }
        }
    }

    if map.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Value::Object(map)))
    }
}

/// Direct-child segment names at `path`, without recursing into them
/// (spec §4.4.7).
pub(super) fn list_children(read: &ReadTxn, path: &Path) -> Result<Vec<String>> {
    let prefix = path.child_prefix();
    let prefix_bytes = prefix.as_bytes();
    let mut cursor = read.cursor_from(prefix_bytes)?;
    let mut names: Vec<String> = Vec::new();

    while let Some((key, _value)) = cursor.next()? {
        if !key.starts_with(prefix_bytes) {
            break;
        }
        let suffix = std::str::from_utf8(&key[prefix_bytes.len()..])
            .map_err(|_| Error::Corrupted(format!("non-utf-8 key under {path}")))?;
        let split = suffix.find('/');
        let direct_child = split.map_or(suffix, |i| &suffix[..i]);

        if names.last().map(String::as_str) != Some(direct_child) {
            names.push(direct_child.to_string());
        }
        if let Some(i) = split {
            let synthetic = format!("{prefix}{}0", &suffix[..i]);
            cursor.seek(synthetic.as_bytes())?;
        }
    }

    Ok(names)
}
