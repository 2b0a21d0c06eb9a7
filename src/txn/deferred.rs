//! Single-assignment result cells filled in when a transaction applies.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};
use crate::value::Row;

/// A value produced by a logged operation. It stays unset until the owning
/// transaction commits and the operation is applied.
pub struct Deferred<T> {
    cell: Arc<OnceLock<T>>,
}

impl<T> Deferred<T> {
    pub(crate) fn new() -> Self {
        Self {
            cell: Arc::new(OnceLock::new()),
        }
    }

    /// Stores the result. Later calls are ignored.
    pub(crate) fn set(&self, value: T) {
        let _ = self.cell.set(value);
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_set(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(value) => f.debug_tuple("Deferred").field(value).finish(),
            None => f.write_str("Deferred(<unset>)"),
        }
    }
}

impl Deferred<Option<Row>> {
    /// The looked up row: `Unset` before apply, `NotFound` on a miss.
    pub fn row(&self) -> Result<&Row> {
        match self.cell.get() {
            None => Err(Error::Unset),
            Some(None) => Err(Error::NotFound),
            Some(Some(row)) => Ok(row),
        }
    }
}

impl Deferred<Vec<Row>> {
    pub fn rows(&self) -> Result<&[Row]> {
        self.cell.get().map(Vec::as_slice).ok_or(Error::Unset)
    }
}
