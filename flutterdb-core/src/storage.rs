// src/storage.rs
//! Storage adapter (C7, §4.7/§6): a thin abstraction over the embedded
//! relational engine. `SqliteStorage` wraps a single `rusqlite::Connection`
//! behind a `Mutex` (mirroring the teacher's `Arc<RwLock<S>>` storage
//! handle, per §5's note that Rust's aliasing rules need an explicit lock
//! even though SQLite serializes writers at the file level).
//!
//! Grounded on the pragma-application and `execute_batch` DDL style of
//! `other_examples`'s `docstore_core.rs` (`open_conn`/`init_schema`): this
//! crate has no counterpart in the teacher's own storage module, which has
//! no SQL surface at all (§6.1) -- the adapter shape is enrichment from the
//! rest of the pack, not a generalization of teacher code.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

/// Ambient configuration (§1.1) passed to `Store::open_with_options`.
#[derive(Debug, Clone)]
pub struct Options {
    /// `PRAGMA page_size`, applied only on a freshly-created database file.
    pub page_size: Option<u32>,
    /// `PRAGMA busy_timeout`, in milliseconds.
    pub busy_timeout_ms: u32,
    /// `PRAGMA foreign_keys`, enforcing the `documents.collection_name`
    /// cascade (I1).
    pub foreign_keys: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            page_size: None,
            busy_timeout_ms: 5_000,
            foreign_keys: true,
        }
    }
}

/// A single decoded row from `documents`.
pub struct DocumentRow {
    pub id: String,
    pub data: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One buffered write, accumulated by [`Batch`] and replayed inside a single
/// `rusqlite::Transaction` on commit (§6 `batch()`).
enum Operation {
    Insert {
        collection: String,
        id: String,
        data: String,
        created_at: i64,
        updated_at: i64,
    },
    Update {
        collection: String,
        id: String,
        data: String,
        updated_at: i64,
    },
    Delete {
        collection: String,
        id: String,
    },
}

/// The storage adapter (§4.7/§6): owns the process-wide database handle,
/// enforces the schema on first open, and executes operations as
/// parameterized SQL.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) the database file at `path` and ensure the schema
    /// in §3 exists. WAL journaling is enabled at open, per §6.
    pub fn open<P: AsRef<Path>>(path: P, options: &Options) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::apply_pragmas(&conn, options)?;
        Self::init_schema(&conn)?;
        Ok(SqliteStorage {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database, useful for tests that don't need a
    /// backing file.
    pub fn open_in_memory(options: &Options) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn, options)?;
        Self::init_schema(&conn)?;
        Ok(SqliteStorage {
            conn: Mutex::new(conn),
        })
    }

    fn apply_pragmas(conn: &Connection, options: &Options) -> Result<()> {
        if let Some(page_size) = options.page_size {
            conn.pragma_update(None, "page_size", page_size)?;
        }
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(
            None,
            "foreign_keys",
            if options.foreign_keys { "ON" } else { "OFF" },
        )?;
        conn.pragma_update(None, "busy_timeout", options.busy_timeout_ms)?;
        Ok(())
    }

    /// DDL execution (§6 `execute(sql)`). Schema exactly as §3: a
    /// `collections` table, a shared `documents` table carrying a foreign
    /// key to it with cascading delete (I1), and a secondary index on
    /// `collection_name`.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                collection_name TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (collection_name) REFERENCES collections(name)
                    ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection_name
                ON documents(collection_name);
            ",
        )?;
        Ok(())
    }

    /// Ensure a row exists in `collections` (auto-creation policy, §3
    /// Lifecycle / §4.6 `collection(name)`).
    pub fn ensure_collection(&self, name: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO collections (name) VALUES (?1)",
            params![name],
        )?;
        Ok(())
    }

    /// `listCollections() -> [name]` (§4.6).
    pub fn list_collections(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT name FROM collections ORDER BY name")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// `dropCollection(name) -> bool` (§4.6): delete the `collections` row;
    /// cascading delete removes all `documents` rows for it (I1). Errors
    /// are the caller's responsibility to swallow (§7: `dropCollection`
    /// catches errors and returns false), so this returns the raw count.
    pub fn drop_collection(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let affected = conn.execute("DELETE FROM collections WHERE name = ?1", params![name])?;
        Ok(affected > 0)
    }

    /// Single-row insert (§6 `insert(table, row)`).
    pub fn insert_document(
        &self,
        collection: &str,
        id: &str,
        data: &str,
        created_at: i64,
        updated_at: i64,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO documents (id, collection_name, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, collection, data, created_at, updated_at],
        )?;
        Ok(())
    }

    /// Batched insert for `insertMany`: all rows in one transaction (§4.5).
    pub fn insert_documents(
        &self,
        collection: &str,
        rows: &[(String, String, i64, i64)],
    ) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO documents (id, collection_name, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (id, data, created_at, updated_at) in rows {
                stmt.execute(params![id, collection, data, created_at, updated_at])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Direct primary-key lookup within the collection scope (§4.5
    /// `findById`).
    pub fn get_document(&self, collection: &str, id: &str) -> Result<Option<DocumentRow>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, data, created_at, updated_at FROM documents
                 WHERE collection_name = ?1 AND id = ?2",
                params![collection, id],
                |row| {
                    Ok(DocumentRow {
                        id: row.get(0)?,
                        data: row.get(1)?,
                        created_at: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Full scan of a collection's rows, in the adapter's natural row
    /// order -- primary-key (i.e. approximately time-ordered `_id`) order,
    /// per §4.5 `find`.
    pub fn all_documents(&self, collection: &str) -> Result<Vec<DocumentRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, data, created_at, updated_at FROM documents
             WHERE collection_name = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![collection], |row| {
                Ok(DocumentRow {
                    id: row.get(0)?,
                    data: row.get(1)?,
                    created_at: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// `SELECT COUNT(*)` fast path for `count({})` (§4.5, §6 `raw_query`).
    pub fn count_all(&self, collection: &str) -> Result<i64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection_name = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Single-row update (§6 `update(table, row, where, args)`).
    pub fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: &str,
        updated_at: i64,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let affected = conn.execute(
            "UPDATE documents SET data = ?1, updated_at = ?2
             WHERE collection_name = ?3 AND id = ?4",
            params![data, updated_at, collection, id],
        )?;
        Ok(affected > 0)
    }

    /// Single-row delete (§6 `delete(table, where, args)`).
    pub fn delete_document(&self, collection: &str, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let affected = conn.execute(
            "DELETE FROM documents WHERE collection_name = ?1 AND id = ?2",
            params![collection, id],
        )?;
        Ok(affected > 0)
    }

    /// Run `f` inside a single ACID transaction (§6 `transaction(f)`).
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Start a new [`Batch`] (§6 `batch()`): an accumulator of
    /// inserts/updates/deletes that commits atomically.
    pub fn batch(&self) -> Batch<'_> {
        Batch {
            storage: self,
            ops: Vec::new(),
        }
    }
}

/// Accumulates writes for one atomic commit, used by `updateMany` and
/// `deleteMany` (§4.5) to apply every matched document's rewrite inside a
/// single transaction.
pub struct Batch<'a> {
    storage: &'a SqliteStorage,
    ops: Vec<Operation>,
}

impl Batch<'_> {
    pub fn insert(&mut self, collection: &str, id: &str, data: &str, created_at: i64, updated_at: i64) {
        self.ops.push(Operation::Insert {
            collection: collection.to_string(),
            id: id.to_string(),
            data: data.to_string(),
            created_at,
            updated_at,
        });
    }

    pub fn update(&mut self, collection: &str, id: &str, data: &str, updated_at: i64) {
        self.ops.push(Operation::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            data: data.to_string(),
            updated_at,
        });
    }

    pub fn delete(&mut self, collection: &str, id: &str) {
        self.ops.push(Operation::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Replay every buffered operation inside one `rusqlite::Transaction`.
    pub fn commit(self) -> Result<usize> {
        if self.ops.is_empty() {
            return Ok(0);
        }
        let mut conn = self.storage.conn.lock();
        let tx = conn.transaction()?;
        let mut applied = 0usize;
        for op in self.ops {
            match op {
                Operation::Insert {
                    collection,
                    id,
                    data,
                    created_at,
                    updated_at,
                } => {
                    tx.execute(
                        "INSERT INTO documents (id, collection_name, data, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![id, collection, data, created_at, updated_at],
                    )?;
                }
                Operation::Update {
                    collection,
                    id,
                    data,
                    updated_at,
                } => {
                    tx.execute(
                        "UPDATE documents SET data = ?1, updated_at = ?2
                         WHERE collection_name = ?3 AND id = ?4",
                        params![data, updated_at, collection, id],
                    )?;
                }
                Operation::Delete { collection, id } => {
                    tx.execute(
                        "DELETE FROM documents WHERE collection_name = ?1 AND id = ?2",
                        params![collection, id],
                    )?;
                }
            }
            applied += 1;
        }
        tx.commit()?;
        Ok(applied)
    }
}

/// Resolve the on-disk path for a `Store` opened against a directory, per
/// §6: `<given-dir>/flutterdb.db`.
pub fn default_db_path(dir: &Path) -> PathBuf {
    dir.join("flutterdb.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> SqliteStorage {
        SqliteStorage::open_in_memory(&Options::default()).unwrap()
    }

    #[test]
    fn ensure_collection_is_idempotent_and_listed() {
        let s = storage();
        s.ensure_collection("users").unwrap();
        s.ensure_collection("users").unwrap();
        assert_eq!(s.list_collections().unwrap(), vec!["users".to_string()]);
    }

    #[test]
    fn insert_and_get_document_round_trips() {
        let s = storage();
        s.ensure_collection("users").unwrap();
        s.insert_document("users", "abc", "{\"_id\":\"abc\"}", 1, 1)
            .unwrap();
        let row = s.get_document("users", "abc").unwrap().unwrap();
        assert_eq!(row.data, "{\"_id\":\"abc\"}");
    }

    #[test]
    fn drop_collection_cascades_to_documents() {
        let s = storage();
        s.ensure_collection("users").unwrap();
        s.insert_document("users", "abc", "{}", 1, 1).unwrap();
        assert!(s.drop_collection("users").unwrap());
        assert!(s.get_document("users", "abc").unwrap().is_none());
        assert!(s.list_collections().unwrap().is_empty());
    }

    #[test]
    fn batch_commits_mixed_operations_atomically() {
        let s = storage();
        s.ensure_collection("users").unwrap();
        s.insert_document("users", "1", "{}", 1, 1).unwrap();
        s.insert_document("users", "2", "{}", 1, 1).unwrap();

        let mut batch = s.batch();
        batch.update("users", "1", "{\"v\":1}", 2);
        batch.delete("users", "2");
        assert_eq!(batch.commit().unwrap(), 2);

        assert_eq!(s.get_document("users", "1").unwrap().unwrap().data, "{\"v\":1}");
        assert!(s.get_document("users", "2").unwrap().is_none());
    }

    #[test]
    fn count_all_matches_row_count() {
        let s = storage();
        s.ensure_collection("users").unwrap();
        s.insert_document("users", "1", "{}", 1, 1).unwrap();
        s.insert_document("users", "2", "{}", 1, 1).unwrap();
        assert_eq!(s.count_all("users").unwrap(), 2);
    }
}
