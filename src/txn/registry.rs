//! Per-thread stacks of open transactions.
//!
//! Each thread that begins a transaction gets an entry keyed by its
//! [`ThreadId`]; the innermost open transaction is the top of the stack. The
//! entry is removed together with the thread's last transaction so the map
//! never outgrows the set of threads with work in flight.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use super::{TxnId, TxnShared};

type Stacks = HashMap<ThreadId, Vec<Arc<TxnShared>>>;

fn stacks() -> &'static Mutex<Stacks> {
    static STACKS: OnceLock<Mutex<Stacks>> = OnceLock::new();
    STACKS.get_or_init(Default::default)
}

pub(crate) fn push(txn: Arc<TxnShared>) {
    stacks()
        .lock()
        .entry(thread::current().id())
        .or_default()
        .push(txn);
}

/// Removes `id` from the calling thread's stack. Missing ids are ignored.
pub(crate) fn remove(id: TxnId) {
    let thread = thread::current().id();
    let mut stacks = stacks().lock();
    if let Some(stack) = stacks.get_mut(&thread) {
        stack.retain(|txn| txn.id != id);
        if stack.is_empty() {
            stacks.remove(&thread);
        }
    }
}

/// Innermost open transaction of the calling thread.
pub(crate) fn current() -> Option<Arc<TxnShared>> {
    stacks()
        .lock()
        .get(&thread::current().id())
        .and_then(|stack| stack.last().cloned())
}

/// Number of open transactions on the calling thread.
pub(crate) fn depth() -> usize {
    stacks()
        .lock()
        .get(&thread::current().id())
        .map_or(0, Vec::len)
}

/// Whether the calling thread has a registry entry.
pub(crate) fn has_entry() -> bool {
    stacks().lock().contains_key(&thread::current().id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_and_teardown() {
        // runs on its own thread so parallel tests do not share a stack
        thread::spawn(|| {
            let outer = Arc::new(TxnShared::new());
            let inner = Arc::new(TxnShared::new());
            assert!(current().is_none());

            push(outer.clone());
            push(inner.clone());
            assert_eq!(depth(), 2);
            assert_eq!(current().map(|t| t.id), Some(inner.id));

            remove(inner.id);
            assert_eq!(current().map(|t| t.id), Some(outer.id));

            remove(outer.id);
            assert_eq!(depth(), 0);
            assert!(!has_entry());
            remove(outer.id);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_threads_are_isolated() {
        let txn = Arc::new(TxnShared::new());
        let id = txn.id;
        thread::spawn(move || {
            push(txn);
            let seen = thread::spawn(current).join().unwrap();
            assert!(seen.is_none());
            remove(id);
        })
        .join()
        .unwrap();
    }
}
