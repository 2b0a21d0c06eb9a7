//! The storage engine: tables of typed rows kept in a memtable and flushed
//! to immutable, memory-mapped segments.
//!
//! A [`Store`] owns a root directory laid out as
//! `<root>/<database>/<table>/`, one directory per table holding its
//! `schema.json` and segment files. Tables are created or opened through the
//! store and shared as `Arc<Table>`.

pub(crate) mod flush;
pub mod memtable;
pub mod metrics;
pub(crate) mod recovery;
pub mod search;
pub mod sstable;
pub mod table;

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::flock::FileLock;
use crate::schema::{validate_name, Schema};
use crate::txn::coordinator::CommitCoordinator;
use crate::txn::{self, RetryPolicy, Transaction, TxnId};

pub use search::Direction;
pub use table::{Table, TableId};

const LOCK_FILE: &str = "segdb.lock";

/// Store root with interior mutability
pub struct Store {
    config: StoreConfig,
    lock: Option<FileLock>,
    tables: RwLock<HashMap<TableId, Arc<Table>>>,
    coordinator: Arc<CommitCoordinator>,
}

impl Store {
    /// Open store with default configuration
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_config(StoreConfig::new(dir))
    }

    /// Open store with custom configuration
    pub fn open_with_config(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.dir)?;
        let lock = FileLock::lock(config.dir.join(LOCK_FILE)).map_err(Error::Locked)?;

        tracing::info!(dir = %config.dir.display(), "Opened store");
        Ok(Self {
            config,
            lock: Some(lock),
            tables: RwLock::new(HashMap::new()),
            coordinator: Arc::new(CommitCoordinator::new()),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn coordinator(&self) -> &Arc<CommitCoordinator> {
        &self.coordinator
    }

    fn table_dir(&self, id: &TableId) -> PathBuf {
        self.config.dir.join(&id.database).join(&id.name)
    }

    fn table_id(database: &str, name: &str) -> Result<TableId> {
        validate_name("database", database)?;
        validate_name("table", name)?;
        Ok(TableId::new(database, name))
    }

    /// Creates a table and writes its schema document.
    pub fn create_table(&self, database: &str, name: &str, schema: Schema) -> Result<Arc<Table>> {
        let id = Self::table_id(database, name)?;
        let mut tables = self.tables.write();
        if tables.contains_key(&id) {
            return Err(Error::TableExists(id.to_string()));
        }
        let dir = self.table_dir(&id);
        let table = Arc::new(recovery::create_table(
            &dir,
            id.clone(),
            schema,
            self.config.memtable_limit,
        )?);
        tables.insert(id, table.clone());
        Ok(table)
    }

    /// Opens an existing table, loading its schema and segments from disk on
    /// first use.
    pub fn open_table(&self, database: &str, name: &str) -> Result<Arc<Table>> {
        let id = Self::table_id(database, name)?;
        if let Some(table) = self.tables.read().get(&id) {
            return Ok(table.clone());
        }

        let mut tables = self.tables.write();
        if let Some(table) = tables.get(&id) {
            return Ok(table.clone());
        }
        let dir = self.table_dir(&id);
        let table = Arc::new(recovery::open_table(&dir, id.clone(), self.config.memtable_limit)?);
        tables.insert(id, table.clone());
        Ok(table)
    }

    /// An already open table.
    pub fn table(&self, database: &str, name: &str) -> Option<Arc<Table>> {
        self.tables.read().get(&TableId::new(database, name)).cloned()
    }

    /// Every open table, ordered by id.
    pub fn tables(&self) -> Vec<Arc<Table>> {
        let mut tables: Vec<_> = self.tables.read().values().cloned().collect();
        tables.sort_by(|a, b| a.id().cmp(b.id()));
        tables
    }

    /// Begins a transaction on the calling thread.
    pub fn begin(&self) -> Transaction {
        Transaction::begin(
            self.coordinator.clone(),
            RetryPolicy {
                interval: self.config.commit_retry_interval,
                max_attempts: self.config.max_commit_attempts,
            },
        )
    }

    /// Id of the calling thread's innermost open transaction.
    pub fn current_transaction_id() -> Option<TxnId> {
        txn::current_id()
    }

    /// Flushes every non-empty memtable.
    pub fn flush_all(&self) -> Result<()> {
        for table in self.tables() {
            table.flush()?;
        }
        Ok(())
    }

    /// Collect and log metrics
    pub fn collect_metrics(&self) -> Result<()> {
        metrics::collect_metrics(self)
    }

    /// Flushes every table and releases the directory lock.
    pub fn close(mut self) -> Result<()> {
        self.flush_all()?;
        self.tables.write().clear();
        if let Some(lock) = self.lock.take() {
            lock.unlock()?;
        }
        tracing::info!(dir = %self.config.dir.display(), "Closed store");
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.flush_all() {
            tracing::error!(error = %e, "Failed to flush tables while dropping store");
        }
        // Release file lock
        if let Some(lock) = self.lock.take() {
            let _ = lock.unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use crate::schema::Column;
    use crate::value::Value;
    use tempfile::tempdir;

    fn schema() -> Schema {
        Schema::new(vec![Column::int("id"), Column::text("v")], vec!["id".to_string()]).unwrap()
    }

    #[test]
    fn test_directory_lock() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = Store::open(dir.path()).expect("Failed to open store");
        assert!(dir.path().join(LOCK_FILE).exists());
        assert!(matches!(Store::open(dir.path()), Err(Error::Locked(_))));

        store.close().unwrap();
        Store::open(dir.path()).expect("Failed to reopen store after close");
    }

    #[test]
    fn test_create_and_open_tables() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = Store::open(dir.path()).unwrap();

        let table = store.create_table("app", "users", schema()).unwrap();
        assert!(dir.path().join("app").join("users").join("schema.json").exists());
        assert!(matches!(
            store.create_table("app", "users", schema()),
            Err(Error::TableExists(_))
        ));
        assert!(Arc::ptr_eq(&table, &store.open_table("app", "users").unwrap()));
        assert!(store.table("app", "users").is_some());
        assert!(store.table("app", "other").is_none());

        assert!(matches!(
            store.open_table("app", "other"),
            Err(Error::TableMissing(_))
        ));
        assert!(matches!(
            store.create_table("app", "../escape", schema()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_close_flushes_and_reopen_recovers() {
        let dir = tempdir().expect("Failed to create temp dir");
        {
            let store = Store::open(dir.path()).unwrap();
            let table = store.create_table("db", "t", schema()).unwrap();
            let txn = store.begin();
            table.insert(&txn, row!("id" => 1, "v" => "kept"));
            txn.commit().unwrap();
            assert_eq!(table.stats().segments, 0);
            store.close().unwrap();
        }

        let store = Store::open(dir.path()).unwrap();
        assert!(store.table("db", "t").is_none());
        let table = store.open_table("db", "t").unwrap();
        assert_eq!(table.stats().segments, 1);
        let row = table.lookup_key(&[Value::Int(1)]).unwrap().unwrap();
        assert_eq!(row["v"], Value::from("kept"));
    }

    #[test]
    fn test_collect_metrics() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = Store::open(dir.path()).unwrap();
        store.create_table("db", "a", schema()).unwrap();
        store.create_table("db", "b", schema()).unwrap();
        assert_eq!(store.tables().len(), 2);
        store.collect_metrics().unwrap();
    }
}
