use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use super::flush;
use super::memtable::Memtable;
use super::metrics::TableStats;
use super::search::Direction;
use super::sstable::Segment;
use crate::encoding::key::check_probe;
use crate::error::{Error, Result};
use crate::schema::{Column, ColumnType, Schema};
use crate::txn::op::{LoggedOp, Op};
use crate::txn::{self, Deferred, Transaction};
use crate::value::{exact, Key, PartialKey, Row, Value};

/// Fully qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId {
    pub database: String,
    pub name: String,
}

impl TableId {
    pub fn new(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.name)
    }
}

pub(crate) struct TableState {
    pub memtable: Memtable,
    /// Oldest first.
    pub segments: Vec<Segment>,
    pub last_generation: u64,
}

/// A table: one memtable plus its flushed segments.
///
/// Transactional operations take the [`Transaction`] they belong to and only
/// record themselves; they run when the transaction commits. [`Table::lookup`],
/// [`Table::lookup_key`] and [`Table::range`] read the current state directly.
///
/// Column lists name the columns a lookup probes. An empty list means the
/// primary key. Only the primary key and its individual columns are indexed.
pub struct Table {
    id: TableId,
    dir: PathBuf,
    schema: Arc<Schema>,
    memtable_limit: usize,
    state: RwLock<TableState>,
}

impl Table {
    pub(crate) fn new(
        id: TableId,
        dir: PathBuf,
        schema: Arc<Schema>,
        memtable_limit: usize,
        segments: Vec<Segment>,
    ) -> Self {
        let last_generation = segments.last().map_or(0, Segment::generation);
        let state = TableState {
            memtable: Memtable::new(schema.clone()),
            segments,
            last_generation,
        };
        Self {
            id,
            dir,
            schema,
            memtable_limit,
            state: RwLock::new(state),
        }
    }

    pub fn id(&self) -> &TableId {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Schema column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.schema.column(name)
    }

    pub fn stats(&self) -> TableStats {
        let state = self.state.read();
        TableStats {
            memtable_rows: state.memtable.len(),
            segments: state.segments.len(),
            segment_rows: state.segments.iter().map(Segment::len).sum(),
            last_generation: state.last_generation,
        }
    }

    // ===== TRANSACTIONAL OPERATIONS =====

    /// Logs an insert. Missing columns are stored as null.
    pub fn insert(self: &Arc<Self>, txn: &Transaction, row: Row) {
        txn.record(self.logged(Op::Insert { row }));
    }

    /// Logs an insert in the calling thread's innermost open transaction.
    pub fn insert_current(self: &Arc<Self>, row: Row) -> Result<()> {
        txn::record_current(self.logged(Op::Insert { row }))
    }

    /// Logs an exact primary-key lookup.
    pub fn get(self: &Arc<Self>, txn: &Transaction, key: Key) -> Deferred<Option<Row>> {
        let columns = self.schema.primary_key().to_vec();
        self.log_lookup(txn, Direction::Eq, exact(&key), columns)
    }

    pub fn get_lt(
        self: &Arc<Self>,
        txn: &Transaction,
        probe: PartialKey,
        columns: &[&str],
    ) -> Deferred<Option<Row>> {
        self.log_lookup(txn, Direction::Lt, probe, owned(columns))
    }

    pub fn get_le(
        self: &Arc<Self>,
        txn: &Transaction,
        probe: PartialKey,
        columns: &[&str],
    ) -> Deferred<Option<Row>> {
        self.log_lookup(txn, Direction::Le, probe, owned(columns))
    }

    pub fn get_gt(
        self: &Arc<Self>,
        txn: &Transaction,
        probe: PartialKey,
        columns: &[&str],
    ) -> Deferred<Option<Row>> {
        self.log_lookup(txn, Direction::Gt, probe, owned(columns))
    }

    pub fn get_ge(
        self: &Arc<Self>,
        txn: &Transaction,
        probe: PartialKey,
        columns: &[&str],
    ) -> Deferred<Option<Row>> {
        self.log_lookup(txn, Direction::Ge, probe, owned(columns))
    }

    /// Logs a range read over `columns` between two partial-key bounds.
    pub fn select(
        self: &Arc<Self>,
        txn: &Transaction,
        columns: &[&str],
        lower: Bound<PartialKey>,
        upper: Bound<PartialKey>,
    ) -> Deferred<Vec<Row>> {
        let result = Deferred::new();
        txn.record(self.logged(Op::Select {
            columns: owned(columns),
            lower,
            upper,
            result: result.clone(),
        }));
        result
    }

    fn log_lookup(
        self: &Arc<Self>,
        txn: &Transaction,
        direction: Direction,
        probe: PartialKey,
        columns: Vec<String>,
    ) -> Deferred<Option<Row>> {
        let result = Deferred::new();
        txn.record(self.logged(Op::Lookup {
            direction,
            probe,
            columns,
            result: result.clone(),
        }));
        result
    }

    fn logged(self: &Arc<Self>, op: Op) -> LoggedOp {
        LoggedOp {
            table: self.clone(),
            op,
        }
    }

    // ===== DIRECT READS =====

    /// Exact primary-key lookup: the memtable, then segments newest first.
    /// The first hit wins.
    pub fn lookup_key(&self, key: &[Value]) -> Result<Option<Row>> {
        if key.len() != self.schema.primary_key().len() {
            return Err(Error::Validation(format!(
                "key has {} values, primary key of {} has {} columns",
                key.len(),
                self.id,
                self.schema.primary_key().len()
            )));
        }

        let state = self.state.read();
        if let Some((row, _)) = state.memtable.get(key) {
            return Ok(Some(row.clone()));
        }
        for segment in state.segments.iter().rev() {
            if let Some(row) = segment.get(key)? {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    /// Directional lookup across the memtable and every segment.
    ///
    /// Each source yields its own candidate; the one nearest the probe in
    /// (columns, primary key) order wins, and on equal keys the newest source
    /// wins.
    pub fn lookup(
        &self,
        direction: Direction,
        probe: &[Option<Value>],
        columns: &[&str],
    ) -> Result<Option<Row>> {
        let columns = self.resolve_columns(columns)?;
        check_probe(probe, columns.len())?;

        let exact_key = direction == Direction::Eq
            && columns == self.schema.primary_key()
            && probe.len() == columns.len()
            && probe.iter().all(Option::is_some);
        if exact_key {
            let key: Key = probe.iter().flatten().cloned().collect();
            return self.lookup_key(&key);
        }

        let state = self.state.read();
        let mut candidates = Vec::with_capacity(state.segments.len() + 1);
        if let Some((row, _)) = state.memtable.find(direction, probe, &columns)? {
            candidates.push(row.clone());
        }
        for segment in state.segments.iter().rev() {
            if let Some(row) = segment.find(direction, probe, &columns)? {
                candidates.push(row);
            }
        }
        drop(state);

        let mut best: Option<((Key, Key), Row)> = None;
        for row in candidates {
            let order = (Schema::project(&row, &columns), self.schema.key_of(&row));
            let nearer = match &best {
                None => true,
                Some((current, _)) => {
                    let ord = order.cmp(current);
                    if direction.descending() {
                        ord == Ordering::Greater
                    } else {
                        ord == Ordering::Less
                    }
                }
            };
            if nearer {
                best = Some((order, row));
            }
        }
        Ok(best.map(|(_, row)| row))
    }

    /// Rows whose `columns` lie between the bounds, newest version of each
    /// primary key only, ordered by (columns, primary key).
    pub fn range(
        &self,
        columns: &[&str],
        lower: &Bound<PartialKey>,
        upper: &Bound<PartialKey>,
    ) -> Result<Vec<Row>> {
        let columns = self.resolve_columns(columns)?;
        for bound in [lower, upper] {
            if let Bound::Included(probe) | Bound::Excluded(probe) = bound {
                check_probe(probe, columns.len())?;
            }
        }

        let mut newest: BTreeMap<Key, Row> = BTreeMap::new();
        {
            let state = self.state.read();
            for row in state.memtable.scan(&columns, lower, upper) {
                newest.insert(self.schema.key_of(row), row.clone());
            }
            for segment in state.segments.iter().rev() {
                for row in segment.scan(&columns, lower, upper)? {
                    newest.entry(self.schema.key_of(&row)).or_insert(row);
                }
            }
        }

        let mut rows: Vec<(Key, Row)> = newest
            .into_values()
            .map(|row| (Schema::project(&row, &columns), row))
            .collect();
        // stable: equal projections stay in primary-key order
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    /// Maps a column list to an indexed column set. Empty means the primary
    /// key.
    fn resolve_columns(&self, columns: &[&str]) -> Result<Vec<String>> {
        if columns.is_empty() {
            return Ok(self.schema.primary_key().to_vec());
        }
        let columns = owned(columns);
        self.schema.resolve(&columns)?;
        if !self.schema.indexed_column_sets().contains(&columns) {
            return Err(Error::Validation(format!(
                "table {} has no index on ({})",
                self.id,
                columns.join(", ")
            )));
        }
        Ok(columns)
    }

    // ===== MUTATION =====

    /// Stores a row in the memtable and flushes if the memtable is full.
    pub(crate) fn apply_insert(&self, row: Row) -> Result<()> {
        let row = self.complete_row(row)?;
        let key = self.schema.key_of(&row);
        let mut state = self.state.write();
        state.memtable.set(key, row);
        self.flush_if_full(&mut state)?;
        Ok(())
    }

    /// Checks a row against the schema and fills absent columns with null.
    fn complete_row(&self, mut row: Row) -> Result<Row> {
        for (name, value) in &row {
            let column = self.schema.column(name).ok_or_else(|| {
                Error::Validation(format!("column {name:?} is not defined in {}", self.id))
            })?;
            if !column.accepts(value) {
                return Err(Error::Validation(format!(
                    "column {name:?} of type {} cannot hold {value}",
                    column.ty
                )));
            }
            if let (ColumnType::Str, Some(size), Value::Str(s)) = (column.ty, column.size, value) {
                if s.len() > size {
                    return Err(Error::Validation(format!(
                        "value for column {name:?} is {} bytes, declared size is {size}",
                        s.len()
                    )));
                }
            }
        }
        for column in self.schema.columns() {
            row.entry(column.name.clone()).or_insert(Value::Null);
        }
        for name in self.schema.primary_key() {
            if row.get(name).map_or(true, Value::is_null) {
                return Err(Error::Validation(format!(
                    "primary key column {name:?} of {} cannot be null",
                    self.id
                )));
            }
        }
        Ok(row)
    }

    /// Flushes the memtable once it holds `memtable_limit` rows.
    pub fn commit_if_required(&self) -> Result<bool> {
        let mut state = self.state.write();
        self.flush_if_full(&mut state)
    }

    fn flush_if_full(&self, state: &mut TableState) -> Result<bool> {
        if state.memtable.len() < self.memtable_limit {
            return Ok(false);
        }
        flush::flush_memtable(self, state)
    }

    /// Flushes a non-empty memtable regardless of its size.
    pub fn flush(&self) -> Result<bool> {
        let mut state = self.state.write();
        flush::flush_memtable(self, &mut state)
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("id", &self.id)
            .field("dir", &self.dir)
            .field("stats", &self.stats())
            .finish()
    }
}

fn owned(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use tempfile::tempdir;

    fn table(dir: &Path, limit: usize) -> Table {
        let schema = Schema::new(
            vec![
                Column::int("a"),
                Column::int("b"),
                Column::str("s", 4),
                Column::float("f"),
            ],
            vec!["a".to_string(), "b".to_string()],
        )
        .unwrap();
        Table::new(TableId::new("db", "t"), dir.to_path_buf(), Arc::new(schema), limit, vec![])
    }

    fn ab(row: &Row) -> (Value, Value) {
        (row["a"].clone(), row["b"].clone())
    }

    fn key(a: i64, b: i64) -> Key {
        vec![Value::Int(a), Value::Int(b)]
    }

    #[test]
    fn test_insert_fills_nulls() {
        let dir = tempdir().expect("Failed to create temp dir");
        let table = table(dir.path(), 100);
        table.apply_insert(row!("a" => 1, "b" => 2)).unwrap();

        let row = table.lookup_key(&key(1, 2)).unwrap().unwrap();
        assert_eq!(row.len(), 4);
        assert!(row["s"].is_null());
        assert!(row["f"].is_null());
    }

    #[test]
    fn test_insert_validation() {
        let dir = tempdir().expect("Failed to create temp dir");
        let table = table(dir.path(), 100);

        let cases = [
            row!("a" => 1, "b" => 1, "zzz" => 1),
            row!("a" => 1, "b" => "x"),
            row!("a" => 1, "b" => 1, "s" => "too long"),
            row!("a" => 1),
        ];
        for row in cases {
            assert!(matches!(table.apply_insert(row), Err(Error::Validation(_))));
        }
        assert_eq!(table.stats().memtable_rows, 0);
    }

    #[test]
    fn test_flush_threshold() {
        let dir = tempdir().expect("Failed to create temp dir");
        let table = table(dir.path(), 3);
        table.apply_insert(row!("a" => 1, "b" => 1)).unwrap();
        table.apply_insert(row!("a" => 2, "b" => 1)).unwrap();
        assert_eq!(table.stats().segments, 0);
        assert_eq!(table.stats().memtable_rows, 2);

        table.apply_insert(row!("a" => 3, "b" => 1)).unwrap();
        let stats = table.stats();
        assert_eq!(stats.segments, 1);
        assert_eq!(stats.memtable_rows, 0);
        assert_eq!(stats.segment_rows, 3);
    }

    #[test]
    fn test_newest_version_wins() {
        let dir = tempdir().expect("Failed to create temp dir");
        let table = table(dir.path(), 100);

        table.apply_insert(row!("a" => 1, "b" => 1, "f" => 1.0)).unwrap();
        table.flush().unwrap();
        table.apply_insert(row!("a" => 1, "b" => 1, "f" => 2.0)).unwrap();
        table.flush().unwrap();
        assert_eq!(table.stats().segments, 2);

        let row = table.lookup_key(&key(1, 1)).unwrap().unwrap();
        assert_eq!(row["f"], Value::Float(2.0));

        let probe = [Some(Value::Int(1)), None];
        let row = table.lookup(Direction::Ge, &probe, &[]).unwrap().unwrap();
        assert_eq!(row["f"], Value::Float(2.0));

        table.apply_insert(row!("a" => 1, "b" => 1, "f" => 3.0)).unwrap();
        let rows = table.range(&["a"], &Bound::Unbounded, &Bound::Unbounded).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["f"], Value::Float(3.0));
    }

    #[test]
    fn test_directional_lookup_merges_sources() {
        let dir = tempdir().expect("Failed to create temp dir");
        let table = table(dir.path(), 100);

        table.apply_insert(row!("a" => 0, "b" => 0)).unwrap();
        table.apply_insert(row!("a" => 2, "b" => 2)).unwrap();
        table.flush().unwrap();
        table.apply_insert(row!("a" => 1, "b" => 5)).unwrap();
        table.flush().unwrap();
        table.apply_insert(row!("a" => 0, "b" => 1)).unwrap();
        table.apply_insert(row!("a" => 1, "b" => 0)).unwrap();

        let one = [Some(Value::Int(1)), None];
        let ge = table.lookup(Direction::Ge, &one, &["a", "b"]).unwrap().unwrap();
        assert_eq!(ab(&ge), (Value::Int(1), Value::Int(0)));
        let le = table.lookup(Direction::Le, &one, &[]).unwrap().unwrap();
        assert_eq!(ab(&le), (Value::Int(1), Value::Int(5)));
        let lt = table.lookup(Direction::Lt, &one, &[]).unwrap().unwrap();
        assert_eq!(ab(&lt), (Value::Int(0), Value::Int(1)));

        let full = [Some(Value::Int(1)), Some(Value::Int(5))];
        let gt = table.lookup(Direction::Gt, &full, &[]).unwrap().unwrap();
        assert_eq!(ab(&gt), (Value::Int(2), Value::Int(2)));

        // b index: 0 (0,0), 0 (1,0), 1 (0,1), 2 (2,2), 5 (1,5)
        let b = table.lookup(Direction::Gt, &[Some(Value::Int(0))], &["b"]).unwrap().unwrap();
        assert_eq!(ab(&b), (Value::Int(0), Value::Int(1)));
        let b = table.lookup(Direction::Le, &[Some(Value::Int(0))], &["b"]).unwrap().unwrap();
        assert_eq!(ab(&b), (Value::Int(1), Value::Int(0)));

        let rows = table
            .range(&["b"], &Bound::Included(vec![Some(Value::Int(1))]), &Bound::Unbounded)
            .unwrap();
        let keys: Vec<_> = rows.iter().map(ab).collect();
        assert_eq!(
            keys,
            vec![
                (Value::Int(0), Value::Int(1)),
                (Value::Int(2), Value::Int(2)),
                (Value::Int(1), Value::Int(5)),
            ]
        );
    }

    #[test]
    fn test_unindexed_columns_rejected() {
        let dir = tempdir().expect("Failed to create temp dir");
        let table = table(dir.path(), 100);
        let probe = [Some(Value::Float(1.0))];
        assert!(matches!(
            table.lookup(Direction::Ge, &probe, &["f"]),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            table.lookup(Direction::Ge, &probe, &["nope"]),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_column_delegates_to_schema() {
        let dir = tempdir().expect("Failed to create temp dir");
        let table = table(dir.path(), 100);
        assert_eq!(table.column("s").map(|c| c.size), Some(Some(4)));
        assert!(table.column("missing").is_none());
    }
}
