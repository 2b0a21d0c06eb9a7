use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failure reading a specific on-disk structure.
    #[error("failed to read {0}: {1}")]
    Read(&'static str, io::Error),

    /// Failure writing a specific on-disk structure.
    #[error("failed to write {0}: {1}")]
    Write(&'static str, io::Error),

    /// Bad schema definition or a value that does not fit its column type.
    #[error("schema error: {0}")]
    Schema(String),

    /// A row or lookup that does not agree with the table's schema.
    #[error("validation error: {0}")]
    Validation(String),

    /// A lookup had no matching record in the memtable or any segment.
    #[error("not found")]
    NotFound,

    /// A deferred result was read before its transaction applied.
    #[error("deferred value is not set yet")]
    Unset,

    #[error("write-write conflict still present after {attempts} validation attempts")]
    Conflict { attempts: u32 },

    #[error("corrupted data: {0}")]
    Corruption(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("schema document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store directory is locked by another process: {0}")]
    Locked(io::Error),

    #[error("table {0} already exists")]
    TableExists(String),

    #[error("table {0} does not exist")]
    TableMissing(String),

    #[error("no transaction is active on this thread")]
    NoTransaction,
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Encoding(err.to_string())
    }
}
