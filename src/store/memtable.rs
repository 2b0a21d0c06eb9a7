//! In-memory sorted buffer of the rows inserted since the last flush.
//!
//! Rows are kept in a vector sorted by primary key. Inserts are a binary
//! search plus a shift, which is cheap at the row counts a memtable holds
//! before it is flushed. The memtable is only mutated under its table's write
//! lock and is replaced wholesale once its rows are flushed to a segment.

use std::cmp::Ordering;
use std::ops::Bound;
use std::sync::Arc;

use super::search::{self, Direction};
use crate::encoding::key::{check_probe, compare_partial};
use crate::error::Result;
use crate::schema::Schema;
use crate::value::{Key, PartialKey, Row, Value};

#[derive(Debug)]
pub struct Memtable {
    schema: Arc<Schema>,
    entries: Vec<(Key, Row)>,
}

impl Memtable {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts or replaces the row stored under `key`.
    pub fn set(&mut self, key: Key, row: Row) {
        match self.entries.binary_search_by(|(k, _)| k.cmp(&key)) {
            Ok(i) => self.entries[i].1 = row,
            Err(i) => self.entries.insert(i, (key, row)),
        }
    }

    /// Exact primary-key lookup. Returns the row and its ordinal.
    pub fn get(&self, key: &[Value]) -> Option<(&Row, usize)> {
        self.entries
            .binary_search_by(|(k, _)| k.as_slice().cmp(key))
            .ok()
            .map(|i| (&self.entries[i].1, i))
    }

    pub fn get_lt(
        &self,
        probe: &[Option<Value>],
        columns: &[String],
    ) -> Result<Option<(&Row, usize)>> {
        self.find(Direction::Lt, probe, columns)
    }

    pub fn get_le(
        &self,
        probe: &[Option<Value>],
        columns: &[String],
    ) -> Result<Option<(&Row, usize)>> {
        self.find(Direction::Le, probe, columns)
    }

    pub fn get_gt(
        &self,
        probe: &[Option<Value>],
        columns: &[String],
    ) -> Result<Option<(&Row, usize)>> {
        self.find(Direction::Gt, probe, columns)
    }

    pub fn get_ge(
        &self,
        probe: &[Option<Value>],
        columns: &[String],
    ) -> Result<Option<(&Row, usize)>> {
        self.find(Direction::Ge, probe, columns)
    }

    /// Directional lookup over `columns`, ordered by (columns, primary key).
    ///
    /// When `columns` is a prefix of the primary key the entries are already in
    /// that order and the lookup is a binary search. Otherwise every entry is
    /// visited once and the nearest qualifying one is kept.
    pub fn find(
        &self,
        direction: Direction,
        probe: &[Option<Value>],
        columns: &[String],
    ) -> Result<Option<(&Row, usize)>> {
        check_probe(probe, columns.len())?;

        if self.schema.is_key_prefix(columns) {
            let found = search::locate(self.entries.len(), direction, |i| {
                Ok(compare_partial(&self.entries[i].0, probe))
            })?;
            return Ok(found.map(|i| (&self.entries[i].1, i)));
        }

        let mut best: Option<(Vec<Value>, usize)> = None;
        for (i, (key, row)) in self.entries.iter().enumerate() {
            let projected = Schema::project(row, columns);
            if !direction.accepts(compare_partial(&projected, probe)) {
                continue;
            }
            let nearer = match &best {
                None => true,
                Some((p, j)) => {
                    let ord = (&projected, key).cmp(&(p, &self.entries[*j].0));
                    if direction.descending() {
                        ord == Ordering::Greater
                    } else {
                        ord == Ordering::Less
                    }
                }
            };
            if nearer {
                best = Some((projected, i));
            }
        }
        Ok(best.map(|(_, i)| (&self.entries[i].1, i)))
    }

    /// Rows whose `columns` projection lies between the bounds, ordered by
    /// (columns, primary key).
    pub fn scan(
        &self,
        columns: &[String],
        lower: &Bound<PartialKey>,
        upper: &Bound<PartialKey>,
    ) -> Vec<&Row> {
        let mut rows: Vec<(Vec<Value>, &Key, &Row)> = self
            .entries
            .iter()
            .filter_map(|(key, row)| {
                let projected = Schema::project(row, columns);
                search::within(&projected, lower, upper).then_some((projected, key, row))
            })
            .collect();
        if !self.schema.is_key_prefix(columns) {
            rows.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));
        }
        rows.into_iter().map(|(_, _, row)| row).collect()
    }

    /// All rows, stably sorted by the `columns` projection.
    pub fn get_sorted_rows(&self, columns: &[String]) -> Vec<Row> {
        let mut rows: Vec<Row> = self.entries.iter().map(|(_, row)| row.clone()).collect();
        if !self.schema.is_key_prefix(columns) {
            rows.sort_by_cached_key(|row| Schema::project(row, columns));
        }
        rows
    }
}
