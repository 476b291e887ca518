// src/store.rs
//! Store (C6, §4.6): the crate's entry point, handed an explicit path by
//! the caller rather than kept as a process-wide singleton (§5 -- decided
//! against the source's optional singleton pattern so multiple `Store`s at
//! distinct paths can coexist in one process, e.g. in tests).

use std::path::Path;
use std::sync::Arc;

use crate::collection::Collection;
use crate::error::Result;
use crate::storage::{default_db_path, Options, SqliteStorage};

/// A handle to one database file and every collection within it.
pub struct Store {
    storage: Arc<SqliteStorage>,
}

impl Store {
    /// Open (creating if absent) the database file at `<dir>/flutterdb.db`
    /// (§6), with default options.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::open_with_options(dir, Options::default())
    }

    /// Same as [`Store::open`] but with explicit ambient configuration
    /// (§1.1): page size, busy-timeout, and the foreign-key pragma backing
    /// cascade delete (I1).
    pub fn open_with_options<P: AsRef<Path>>(dir: P, options: Options) -> Result<Self> {
        let path = default_db_path(dir.as_ref());
        let storage = SqliteStorage::open(path, &options)?;
        Ok(Store {
            storage: Arc::new(storage),
        })
    }

    /// Open against an explicit file path rather than a containing
    /// directory, for callers that already name the `.db` file (used by the
    /// import/export CLI).
    pub fn open_file<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        let storage = SqliteStorage::open(path, &options)?;
        Ok(Store {
            storage: Arc::new(storage),
        })
    }

    /// An ephemeral in-memory store, useful for tests.
    pub fn open_in_memory() -> Result<Self> {
        let storage = SqliteStorage::open_in_memory(&Options::default())?;
        Ok(Store {
            storage: Arc::new(storage),
        })
    }

    /// `collection(name)` (§4.6): auto-creates the collection on first
    /// reference.
    pub fn collection(&self, name: &str) -> Result<Collection> {
        self.storage.ensure_collection(name)?;
        Ok(Collection::new(name.to_string(), self.storage.clone()))
    }

    /// `dropCollection(name) -> bool` (§4.6). Storage errors are swallowed
    /// into `false` per §7's error taxonomy, which reserves `Error` for
    /// genuine I/O and serialization failures, not "nothing to drop".
    pub fn drop_collection(&self, name: &str) -> bool {
        self.storage.drop_collection(name).unwrap_or(false)
    }

    /// `listCollections() -> [name]` (§4.6).
    pub fn list_collections(&self) -> Result<Vec<String>> {
        self.storage.list_collections()
    }
}
