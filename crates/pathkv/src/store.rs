//! A thin wrapper over the backing ordered byte-key/byte-value store.
//!
//! `redb` stands in for the spec's black-box ordered store: a single
//! [`redb::Database`] is the environment, one unnamed
//! [`redb::TableDefinition`] holds every path key (spec §6.1), write
//! transactions are exclusive, and read transactions see a point-in-time
//! snapshot. [`Cursor`] wraps `redb::Range` to provide the prefix-seekable
//! cursor the storage engine's reconstruction pass needs.

use std::path::Path as FsPath;

use redb::{Database, ReadableTable, TableDefinition};

use crate::{
    error::{Error, Result},
    options::Durability,
};

const TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("pathkv");

fn to_redb_durability(durability: Durability) -> redb::Durability {
    match durability {
        Durability::Immediate => redb::Durability::Immediate,
        Durability::Eventual => redb::Durability::Eventual,
    }
}

/// An open backing-store environment rooted at a directory.
pub struct Store {
    db: Database,
    durability: redb::Durability,
}

impl Store {
    /// Open (creating if absent) the environment rooted at `dir`, applying
    /// `durability` to every write transaction this `Store` begins
    /// (spec §4.3).
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionFailed`] if the directory or database
    /// file cannot be created or opened.
    pub fn open(dir: &FsPath, durability: Durability) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| Error::TransactionFailed(e.to_string()))?;
        let db = Database::create(dir.join("pathkv.redb"))?;
        // Ensure the table exists even for a brand-new database: a read
        // transaction against a table that was never created errors, and
        // the engine's root-always-exists invariant must hold immediately.
        let tx = db.begin_write()?;
        {
            let _ = tx.open_table(TABLE)?;
        }
        tx.commit()?;
        Ok(Self { db, durability: to_redb_durability(durability) })
    }

    /// Begin an exclusive write transaction, applying this store's
    /// configured durability mode. Only one may be open at a time per
    /// [`Store`]; the caller must not hold it across a thread boundary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionFailed`] if the transaction cannot begin.
    pub fn begin_write(&self) -> Result<WriteTxn> {
        let mut txn = self.db.begin_write()?;
        txn.set_durability(self.durability);
        Ok(WriteTxn { txn })
    }

    /// Begin a read transaction, snapshotted at this call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionFailed`] if the transaction cannot begin,
    /// or the table cannot be opened.
    pub fn begin_read(&self) -> Result<ReadTxn> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TABLE)?;
        Ok(ReadTxn { _txn: txn, table })
    }
}

/// An open write transaction. Dropping without calling [`WriteTxn::commit`]
/// aborts it.
pub struct WriteTxn {
    txn: redb::WriteTransaction,
}

impl WriteTxn {
    /// Point-get a key's value, if present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionFailed`] on a backing-store read failure.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let table = self.txn.open_table(TABLE)?;
        let guard = table.get(key)?;
        Ok(guard.map(|v| v.value().to_vec()))
    }

    /// Insert or overwrite `key`'s value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionFailed`] on a backing-store write
    /// failure.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut table = self.txn.open_table(TABLE)?;
        table.insert(key, value)?;
        Ok(())
    }

    /// Remove `key`, if present. A no-op if absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionFailed`] on a backing-store write
    /// failure.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let mut table = self.txn.open_table(TABLE)?;
        table.remove(key)?;
        Ok(())
    }

    /// Collect every key with the given byte prefix. Used by subtree delete
    /// (spec §4.4.4), which must remove a whole contiguous run within one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionFailed`] on a backing-store read
    /// failure.
    pub fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let table = self.txn.open_table(TABLE)?;
        let mut out = Vec::new();
        for entry in table.range(prefix..)? {
            let (k, _) = entry?;
            let k = k.value();
            if !k.starts_with(prefix) {
                break;
            }
            out.push(k.to_vec());
        }
        Ok(out)
    }

    /// Commit, making every write in this transaction visible together.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionFailed`] if the commit fails.
    pub fn commit(self) -> Result<()> {
        self.txn.commit()?;
        Ok(())
    }
}

/// An open read transaction, snapshotted at creation, with its table handle
/// already resolved so [`Cursor`]s can re-seek without reopening it.
pub struct ReadTxn {
    _txn: redb::ReadTransaction,
    table: redb::ReadOnlyTable<&'static [u8], &'static [u8]>,
}

impl ReadTxn {
    /// Point-get a key's value, if present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionFailed`] on a backing-store read failure.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.table.get(key)?.map(|v| v.value().to_vec()))
    }

    /// Open a forward cursor seeked to the first key `>= start`, yielding
    /// `(key, value)` pairs in ascending lexical order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionFailed`] if the cursor cannot be opened.
    pub fn cursor_from(&self, start: &[u8]) -> Result<Cursor<'_>> {
        let range = self.table.range(start..)?;
        Ok(Cursor { table: &self.table, range })
    }
}

/// A forward, prefix-seekable cursor over the backing store.
///
/// Reconstruction (spec §4.4.3) stops as soon as [`Cursor::next`] yields a
/// key that no longer starts with the prefix it seeked to; the skip-ahead
/// optimization uses [`Cursor::seek`] to jump past a whole subtree in one
/// call instead of walking every descendant with `next`.
pub struct Cursor<'a> {
    table: &'a redb::ReadOnlyTable<&'static [u8], &'static [u8]>,
    range: redb::Range<'a, &'static [u8], &'static [u8]>,
}

impl<'a> Cursor<'a> {
    /// Advance to the next entry in ascending key order, or `None` at the
    /// end of the table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionFailed`] on a backing-store read failure.
    pub fn next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        match self.range.next() {
            None => Ok(None),
            Some(entry) => {
                let (k, v) = entry?;
                Ok(Some((k.value().to_vec(), v.value().to_vec())))
            }
        }
    }

    /// Re-seek this cursor forward to the first key `>= key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionFailed`] if the cursor cannot be
    /// re-opened at the new position.
    pub fn seek(&mut self, key: &[u8]) -> Result<()> {
        self.range = self.table.range(key..)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn open_creates_empty_table() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path(), Durability::Eventual).unwrap();
        let read = store.begin_read().unwrap();
        assert_eq!(read.get(b"/anything").unwrap(), None);
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path(), Durability::Eventual).unwrap();
        let write = store.begin_write().unwrap();
        write.put(b"/a", b"1").unwrap();
        write.commit().unwrap();

        let read = store.begin_read().unwrap();
        assert_eq!(read.get(b"/a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn cursor_enumerates_prefix_in_order() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path(), Durability::Eventual).unwrap();
        let write = store.begin_write().unwrap();
        for k in ["/a/0", "/a/1", "/a/2", "/b/0"] {
            write.put(k.as_bytes(), b"v").unwrap();
        }
        write.commit().unwrap();

        let read = store.begin_read().unwrap();
        let mut cursor = read.cursor_from(b"/a/").unwrap();
        let mut seen = Vec::new();
        while let Some((k, _)) = cursor.next().unwrap() {
            let k = String::from_utf8(k).unwrap();
            if !k.starts_with("/a/") {
                break;
            }
            seen.push(k);
        }
        assert_eq!(seen, vec!["/a/0", "/a/1", "/a/2"]);
    }

    #[test]
    fn keys_with_prefix_collects_subtree() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path(), Durability::Eventual).unwrap();
        let write = store.begin_write().unwrap();
        for k in ["/a", "/a/b", "/a/b/c", "/ab"] {
            write.put(k.as_bytes(), b"v").unwrap();
        }
        write.commit().unwrap();

        let write = store.begin_write().unwrap();
        let keys = write.keys_with_prefix(b"/a/").unwrap();
        let keys: Vec<String> = keys.into_iter().map(|k| String::from_utf8(k).unwrap()).collect();
        assert_eq!(keys, vec!["/a/b", "/a/b/c"]);
    }
}
