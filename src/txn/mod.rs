//! Optimistic transactions.
//!
//! A [`Transaction`] records operations instead of executing them. Reads hand
//! back [`Deferred`] cells that are filled when the transaction applies. On
//! [`Transaction::commit`] the write footprint (the tables the log inserts
//! into) is validated against every transaction currently applying; on
//! overlap the commit sleeps for the configured interval and validates again,
//! up to the configured number of attempts. Once validated, the log is
//! applied in order.
//!
//! Transactions are bound to the thread that began them and cannot be sent
//! to another thread.

pub mod coordinator;
pub mod deferred;
pub(crate) mod op;
pub(crate) mod registry;

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use coordinator::{CommitCoordinator, CommitGuard, Footprint};
use op::LoggedOp;

pub use deferred::Deferred;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxnId(u64);

impl TxnId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TxnId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Open,
    Validating,
    Applying,
    Done,
}

/// The part of a transaction reachable from the thread registry.
pub(crate) struct TxnShared {
    pub id: TxnId,
    log: Mutex<Vec<LoggedOp>>,
}

impl TxnShared {
    pub(crate) fn new() -> Self {
        Self {
            id: TxnId::next(),
            log: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn record(&self, op: LoggedOp) {
        self.log.lock().push(op);
    }
}

/// How long and how often a commit waits for conflicting commits to finish.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

pub struct Transaction {
    shared: Arc<TxnShared>,
    coordinator: Arc<CommitCoordinator>,
    retry: RetryPolicy,
    state: Cell<TxnState>,
    _not_send: PhantomData<*const ()>,
}

impl Transaction {
    /// Creates a transaction and makes it the calling thread's current one.
    pub(crate) fn begin(coordinator: Arc<CommitCoordinator>, retry: RetryPolicy) -> Self {
        let shared = Arc::new(TxnShared::new());
        registry::push(shared.clone());
        tracing::debug!(txn = %shared.id, "Began transaction");
        Self {
            shared,
            coordinator,
            retry,
            state: Cell::new(TxnState::Open),
            _not_send: PhantomData,
        }
    }

    pub fn id(&self) -> TxnId {
        self.shared.id
    }

    pub fn state(&self) -> TxnState {
        self.state.get()
    }

    /// Number of logged operations.
    pub fn len(&self) -> usize {
        self.shared.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn record(&self, op: LoggedOp) {
        self.shared.record(op);
    }

    /// Validates the log against concurrent commits and applies it.
    ///
    /// The first failing operation stops the commit and its error is
    /// returned. Operations applied before it stay applied.
    pub fn commit(self) -> Result<()> {
        registry::remove(self.shared.id);
        let ops = std::mem::take(&mut *self.shared.log.lock());
        let footprint: Footprint = ops
            .iter()
            .filter(|op| op.is_write())
            .map(|op| op.table.id().clone())
            .collect();

        self.state.set(TxnState::Validating);
        let guard = self.validate(&footprint);
        let _guard = match guard {
            Ok(guard) => guard,
            Err(e) => {
                self.state.set(TxnState::Done);
                return Err(e);
            }
        };

        self.state.set(TxnState::Applying);
        let result = ops.iter().enumerate().try_for_each(|(i, op)| {
            op.apply().map_err(|e| {
                tracing::error!(
                    txn = %self.shared.id,
                    table = %op.table.id(),
                    op = op.name(),
                    position = i,
                    error = %e,
                    "Transaction apply failed"
                );
                e
            })
        });
        self.state.set(TxnState::Done);

        if result.is_ok() {
            tracing::debug!(txn = %self.shared.id, ops = ops.len(), "Committed transaction");
        }
        result
    }

    fn validate(&self, footprint: &Footprint) -> Result<CommitGuard> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if let Some(guard) = self.coordinator.try_enter(self.shared.id, footprint) {
                tracing::debug!(txn = %self.shared.id, attempts, "Validated transaction");
                return Ok(guard);
            }
            if attempts >= self.retry.max_attempts {
                tracing::warn!(txn = %self.shared.id, attempts, "Giving up on conflicting commit");
                return Err(Error::Conflict { attempts });
            }
            if attempts.is_power_of_two() {
                tracing::warn!(
                    txn = %self.shared.id,
                    attempts,
                    tables = ?footprint,
                    "Commit conflicts with an applying transaction, retrying"
                );
            }
            thread::sleep(self.retry.interval);
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        registry::remove(self.shared.id);
        let discarded = std::mem::take(&mut *self.shared.log.lock());
        if !discarded.is_empty() {
            tracing::debug!(
                txn = %self.shared.id,
                ops = discarded.len(),
                "Discarded uncommitted transaction"
            );
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.shared.id)
            .field("state", &self.state.get())
            .field("ops", &self.len())
            .finish()
    }
}

/// Id of the calling thread's innermost open transaction.
pub fn current_id() -> Option<TxnId> {
    registry::current().map(|txn| txn.id)
}

/// Records `op` in the calling thread's innermost open transaction.
pub(crate) fn record_current(op: LoggedOp) -> Result<()> {
    let txn = registry::current().ok_or(Error::NoTransaction)?;
    txn.record(op);
    Ok(())
}
