use super::Store;
use crate::error::Result;

/// Point-in-time counters for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    pub memtable_rows: usize,
    pub segments: usize,
    pub segment_rows: usize,
    pub last_generation: u64,
}

/// Collect metrics from every open table and log them
pub fn collect_metrics(store: &Store) -> Result<()> {
    let committing = store.coordinator().committing();
    for table in store.tables() {
        let stats = table.stats();
        tracing::info!(
            table = %table.id(),
            memtable_rows = stats.memtable_rows,
            segments = stats.segments,
            segment_rows = stats.segment_rows,
            last_generation = stats.last_generation,
            committing = committing,
            "Table metrics"
        );
    }
    Ok(())
}
