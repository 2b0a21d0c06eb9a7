use std::fs::File;
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use memmap2::Mmap;

use super::index::KeyIndex;
use super::meta::SegmentMeta;
use super::position::PositionIndex;
use crate::encoding::column;
use crate::encoding::key::KeyLayout;
use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::store::search::Direction;
use crate::value::{exact, PartialKey, Row, Value};

const ROW_HEADER: usize = 8;

/// An immutable, memory-mapped segment.
pub struct Segment {
    generation: u64,
    schema: Arc<Schema>,
    data: Mmap,
    positions: PositionIndex,
    indexes: Vec<KeyIndex>,
}

impl Segment {
    /// Writes `rows` (sorted by primary key) as a new segment and opens it.
    ///
    /// Every file is staged under a `.tmp` name, synced, and renamed into
    /// place. The metadata file is renamed last, so a crash part way leaves
    /// only files that [`Segment::open`] never looks at.
    pub fn create(dir: &Path, schema: &Arc<Schema>, generation: u64, rows: &[Row]) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::Validation("cannot create an empty segment".to_string()));
        }

        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity(rows.len());
        let mut encoded = Vec::new();
        for row in rows {
            encoded.clear();
            for c in schema.columns() {
                let value = row.get(&c.name).unwrap_or(&Value::Null);
                column::encode_into(&mut encoded, c, value)?;
            }
            offsets.push(data.len() as u64);
            data.write_u64::<BigEndian>(encoded.len() as u64)?;
            data.extend_from_slice(&encoded);
        }

        let mut staged = vec![
            (
                super::write_staged(&super::data_path(dir, generation), &data, "segment data")?,
                super::data_path(dir, generation),
            ),
            (
                super::write_staged(
                    &super::position_path(dir, generation),
                    &PositionIndex::encode(&offsets),
                    "position index",
                )?,
                super::position_path(dir, generation),
            ),
        ];

        let sets = schema.indexed_column_sets();
        for set in &sets {
            let layout = KeyLayout::new(schema.resolve(set)?)?;
            let mut records: Vec<(Vec<Value>, u64)> = rows
                .iter()
                .zip(&offsets)
                .map(|(row, offset)| (Schema::project(row, set), *offset))
                .collect();
            if !schema.is_key_prefix(set) {
                // stable: equal projections stay in primary-key order
                records.sort_by(|a, b| a.0.cmp(&b.0));
            }
            let bytes = KeyIndex::encode(
                &layout,
                records.iter().map(|(key, offset)| (key.as_slice(), *offset)),
            )?;
            let path = super::index_path(dir, generation, set);
            staged.push((super::write_staged(&path, &bytes, "key index")?, path));
        }

        let meta = SegmentMeta {
            generation,
            row_count: rows.len() as u64,
            indexes: sets,
        };
        let meta_path = super::meta_path(dir, generation);
        let staged_meta = super::write_staged(&meta_path, &meta.encode()?, "segment metadata")?;

        for (from, to) in &staged {
            super::publish(from, to)?;
        }
        super::publish(&staged_meta, &meta_path)?;
        File::open(dir)?.sync_all()?;

        Self::open(dir, schema, generation)
    }

    /// Opens a published segment.
    pub fn open(dir: &Path, schema: &Arc<Schema>, generation: u64) -> Result<Self> {
        let meta = SegmentMeta::load(&super::meta_path(dir, generation))?;
        if meta.generation != generation {
            return Err(Error::Corruption(format!(
                "segment {generation} metadata names generation {}",
                meta.generation
            )));
        }
        let rows = usize::try_from(meta.row_count).map_err(|_| {
            Error::Corruption(format!("segment {generation} claims {} rows", meta.row_count))
        })?;

        let data = super::map_file(&super::data_path(dir, generation), "segment data")?;
        let positions = PositionIndex::open(&super::position_path(dir, generation), rows)?;
        let indexes = meta
            .indexes
            .into_iter()
            .map(|set| {
                let layout = KeyLayout::new(schema.resolve(&set)?)?;
                let path = super::index_path(dir, generation, &set);
                KeyIndex::open(&path, set, layout, rows)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            generation,
            schema: schema.clone(),
            data,
            positions,
            indexes,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn indexed_columns(&self) -> impl Iterator<Item = &[String]> {
        self.indexes.iter().map(|index| index.columns())
    }

    fn index_for(&self, columns: &[String]) -> Result<&KeyIndex> {
        self.indexes
            .iter()
            .find(|index| index.columns() == columns)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "segment {} has no index on ({})",
                    self.generation,
                    columns.join(", ")
                ))
            })
    }

    /// Decodes the row stored at `offset` in the data file.
    pub fn read_row(&self, offset: u64) -> Result<Row> {
        let corrupt = || Error::Corruption(format!("row at offset {offset} is out of bounds"));
        let start = usize::try_from(offset).map_err(|_| corrupt())?;
        let body_start = start.checked_add(ROW_HEADER).ok_or_else(corrupt)?;
        let header = self.data.get(start..body_start).ok_or_else(corrupt)?;
        let len = BigEndian::read_u64(header) as usize;
        let body_end = body_start.checked_add(len).ok_or_else(corrupt)?;
        let body = self.data.get(body_start..body_end).ok_or_else(corrupt)?;

        let mut row = Row::new();
        let mut pos = 0;
        for c in self.schema.columns() {
            let (value, next) = column::decode(c, body, pos)?;
            row.insert(c.name.clone(), value);
            pos = next;
        }
        if pos != len {
            return Err(Error::Corruption(format!(
                "row at offset {offset} has {} trailing bytes",
                len - pos
            )));
        }
        Ok(row)
    }

    /// Row number `ordinal` in primary-key order.
    pub fn row_at(&self, ordinal: usize) -> Result<Option<Row>> {
        self.positions
            .offset(ordinal)
            .map(|offset| self.read_row(offset))
            .transpose()
    }

    pub fn find(
        &self,
        direction: Direction,
        probe: &[Option<Value>],
        columns: &[String],
    ) -> Result<Option<Row>> {
        match self.index_for(columns)?.find(direction, probe)? {
            Some((_, offset)) => Ok(Some(self.read_row(offset)?)),
            None => Ok(None),
        }
    }

    /// Exact primary-key lookup.
    pub fn get(&self, key: &[Value]) -> Result<Option<Row>> {
        self.find(Direction::Eq, &exact(key), self.schema.primary_key())
    }

    pub fn get_lt(&self, probe: &[Option<Value>], columns: &[String]) -> Result<Option<Row>> {
        self.find(Direction::Lt, probe, columns)
    }

    pub fn get_le(&self, probe: &[Option<Value>], columns: &[String]) -> Result<Option<Row>> {
        self.find(Direction::Le, probe, columns)
    }

    pub fn get_gt(&self, probe: &[Option<Value>], columns: &[String]) -> Result<Option<Row>> {
        self.find(Direction::Gt, probe, columns)
    }

    pub fn get_ge(&self, probe: &[Option<Value>], columns: &[String]) -> Result<Option<Row>> {
        self.find(Direction::Ge, probe, columns)
    }

    /// Rows whose `columns` lie between the bounds, in index order.
    pub fn scan(
        &self,
        columns: &[String],
        lower: &Bound<PartialKey>,
        upper: &Bound<PartialKey>,
    ) -> Result<Vec<Row>> {
        self.index_for(columns)?
            .range(lower, upper)?
            .into_iter()
            .map(|(_, offset)| self.read_row(offset))
            .collect()
    }
}
