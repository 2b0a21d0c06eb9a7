//! Process-wide set of transactions that passed validation and are applying.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use super::TxnId;
use crate::store::TableId;

/// Tables a transaction inserts into.
pub type Footprint = BTreeSet<TableId>;

#[derive(Debug, Default)]
pub struct CommitCoordinator {
    committing: Mutex<HashMap<TxnId, Footprint>>,
}

impl CommitCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `footprint` against every committing transaction and, if no
    /// table is shared, registers it in the same critical section.
    ///
    /// The returned guard removes the registration when dropped.
    pub fn try_enter(self: &Arc<Self>, id: TxnId, footprint: &Footprint) -> Option<CommitGuard> {
        let mut committing = self.committing.lock();
        let conflict = committing
            .values()
            .any(|other| !other.is_disjoint(footprint));
        if conflict {
            return None;
        }
        committing.insert(id, footprint.clone());
        Some(CommitGuard {
            coordinator: self.clone(),
            id,
        })
    }

    /// Number of transactions currently applying.
    pub fn committing(&self) -> usize {
        self.committing.lock().len()
    }
}

/// RAII registration in the committing set.
pub struct CommitGuard {
    coordinator: Arc<CommitCoordinator>,
    id: TxnId,
}

impl Drop for CommitGuard {
    fn drop(&mut self) {
        self.coordinator.committing.lock().remove(&self.id);
    }
}
