use std::time::{SystemTime, UNIX_EPOCH};

use super::memtable::Memtable;
use super::sstable::Segment;
use super::table::{Table, TableState};
use crate::error::Result;

/// Writes the memtable to a new segment and replaces it with an empty one.
///
/// Runs under the table's write lock. Returns `false` if there was nothing
/// to flush.
pub(crate) fn flush_memtable(table: &Table, state: &mut TableState) -> Result<bool> {
    if state.memtable.is_empty() {
        return Ok(false);
    }

    let generation = next_generation(state.last_generation);
    let rows = state.memtable.get_sorted_rows(table.schema().primary_key());
    let segment = Segment::create(table.dir(), table.schema(), generation, &rows)?;

    state.segments.push(segment);
    state.last_generation = generation;
    state.memtable = Memtable::new(table.schema().clone());

    tracing::info!(
        table = %table.id(),
        generation = generation,
        rows = rows.len(),
        segments = state.segments.len(),
        "Flushed memtable to segment"
    );
    Ok(true)
}

/// Wall-clock microseconds, bumped past `last` so generations stay strictly
/// increasing even if the clock stalls or steps back.
fn next_generation(last: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0);
    now.max(last.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_monotonic() {
        let first = next_generation(0);
        assert!(first > 0);
        assert_eq!(next_generation(u64::MAX - 1), u64::MAX);
        assert!(next_generation(first) > first);
    }
}
