//! segdb: an embedded, log-structured table engine.
//!
//! Tables of typed rows are buffered in a sorted memtable, flushed to
//! immutable segment files once the memtable fills up, and read back through
//! memory-mapped key indexes. Mutations and reads are grouped into
//! optimistic transactions that validate their write footprint against
//! concurrently committing transactions before applying.
//!
//! ```no_run
//! use segdb::{row, Column, Schema, Store, Value};
//!
//! # fn main() -> segdb::Result<()> {
//! let store = Store::open("./data")?;
//! let schema = Schema::new(
//!     vec![Column::int("id"), Column::str("name", 32)],
//!     vec!["id".to_string()],
//! )?;
//! let users = store.create_table("app", "users", schema)?;
//!
//! let txn = store.begin();
//! users.insert(&txn, row!("id" => 1, "name" => "ada"));
//! let found = users.get(&txn, vec![Value::Int(1)]);
//! txn.commit()?;
//! assert_eq!(found.row()?["name"], Value::from("ada"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod encoding;
pub mod error;
pub mod flock;
pub mod schema;
pub mod store;
pub mod txn;
pub mod value;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use schema::{Column, ColumnType, Schema};
pub use store::{Direction, Store, Table, TableId};
pub use txn::{Deferred, Transaction, TxnId, TxnState};
pub use value::{Key, PartialKey, Row, Value};
