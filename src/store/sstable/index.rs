//! Memory-mapped key index over one column set.
//!
//! The file is a dense array of fixed-stride records (see
//! [`crate::encoding::key`]) sorted by the indexed columns, ties in primary-key
//! order. Record `i` lives at `i * stride`, so lookups binary search the
//! mapping directly without loading the index.

use std::cmp::Ordering;
use std::ops::Bound;
use std::path::Path;

use memmap2::Mmap;

use crate::encoding::key::{check_probe, compare_partial, KeyLayout};
use crate::error::{Error, Result};
use crate::store::search::{self, Direction};
use crate::value::{Key, PartialKey, Value};

pub struct KeyIndex {
    columns: Vec<String>,
    layout: KeyLayout,
    map: Mmap,
    len: usize,
}

impl KeyIndex {
    pub fn open(path: &Path, columns: Vec<String>, layout: KeyLayout, rows: usize) -> Result<Self> {
        let expected = rows.checked_mul(layout.stride()).ok_or_else(|| {
            Error::Corruption(format!("key index {} claims {rows} rows", path.display()))
        })?;
        let map = super::map_file(path, "key index")?;
        if map.len() != expected {
            return Err(Error::Corruption(format!(
                "key index {} is {} bytes, expected {} records of {} bytes",
                path.display(),
                map.len(),
                rows,
                layout.stride()
            )));
        }
        Ok(Self {
            columns,
            layout,
            map,
            len: rows,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Decodes record `i` into its key and data offset.
    pub fn record(&self, i: usize) -> Result<(Key, u64)> {
        let stride = self.layout.stride();
        let start = i * stride;
        let bytes = self.map.get(start..start + stride).ok_or_else(|| {
            Error::Corruption(format!("key index record {i} is out of bounds"))
        })?;
        self.layout.decode(bytes)
    }

    fn compare(&self, i: usize, probe: &[Option<Value>]) -> Result<Ordering> {
        let (key, _) = self.record(i)?;
        Ok(compare_partial(&key, probe))
    }

    /// Binary searches for the record selected by `direction`.
    pub fn find(
        &self,
        direction: Direction,
        probe: &[Option<Value>],
    ) -> Result<Option<(Key, u64)>> {
        check_probe(probe, self.columns.len())?;
        match search::locate(self.len, direction, |i| self.compare(i, probe))? {
            Some(i) => Ok(Some(self.record(i)?)),
            None => Ok(None),
        }
    }

    /// Records between the bounds, in index order.
    pub fn range(
        &self,
        lower: &Bound<PartialKey>,
        upper: &Bound<PartialKey>,
    ) -> Result<Vec<(Key, u64)>> {
        for bound in [lower, upper] {
            if let Bound::Included(probe) | Bound::Excluded(probe) = bound {
                check_probe(probe, self.columns.len())?;
            }
        }

        let start = search::lower_start(self.len, lower, |i, probe| self.compare(i, probe))?;
        let mut records = Vec::new();
        for i in start..self.len {
            let (key, offset) = self.record(i)?;
            if !search::below_upper(&key, upper) {
                break;
            }
            records.push((key, offset));
        }
        Ok(records)
    }

    /// Encodes sorted `(key, offset)` records into index file contents.
    pub fn encode<'a, I>(layout: &KeyLayout, records: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = (&'a [Value], u64)>,
    {
        let mut buf = Vec::new();
        for (key, offset) in records {
            layout.encode_into(&mut buf, key, offset)?;
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use tempfile::tempdir;

    fn keys() -> Vec<Vec<Value>> {
        [(0, 0), (0, 1), (1, 0), (1, 5), (2, 2)]
            .iter()
            .map(|(a, b)| vec![Value::Int(*a), Value::Int(*b)])
            .collect()
    }

    fn open_index(dir: &Path) -> KeyIndex {
        let layout = KeyLayout::new(vec![Column::int("a"), Column::int("b")]).unwrap();
        let keys = keys();
        let bytes = KeyIndex::encode(
            &layout,
            keys.iter().enumerate().map(|(i, k)| (k.as_slice(), i as u64 * 100)),
        )
        .unwrap();
        let path = dir.join("segment.a+b.idx");
        std::fs::write(&path, bytes).unwrap();
        KeyIndex::open(&path, vec!["a".to_string(), "b".to_string()], layout, 5).unwrap()
    }

    #[test]
    fn test_find() {
        let dir = tempdir().expect("Failed to create temp dir");
        let index = open_index(dir.path());
        assert_eq!(index.len(), 5);

        let one = [Some(Value::Int(1)), None];
        let (key, offset) = index.find(Direction::Ge, &one).unwrap().unwrap();
        assert_eq!(key, vec![Value::Int(1), Value::Int(0)]);
        assert_eq!(offset, 200);

        let (key, _) = index.find(Direction::Lt, &one).unwrap().unwrap();
        assert_eq!(key, vec![Value::Int(0), Value::Int(1)]);

        let exact = [Some(Value::Int(1)), Some(Value::Int(5))];
        let (_, offset) = index.find(Direction::Eq, &exact).unwrap().unwrap();
        assert_eq!(offset, 300);

        let missing = [Some(Value::Int(9)), Some(Value::Int(9))];
        assert!(index.find(Direction::Eq, &missing).unwrap().is_none());
    }

    #[test]
    fn test_range() {
        let dir = tempdir().expect("Failed to create temp dir");
        let index = open_index(dir.path());

        let records = index
            .range(
                &Bound::Excluded(vec![Some(Value::Int(0))]),
                &Bound::Included(vec![Some(Value::Int(1))]),
            )
            .unwrap();
        let offsets: Vec<u64> = records.iter().map(|(_, o)| *o).collect();
        assert_eq!(offsets, vec![200, 300]);

        let all = index.range(&Bound::Unbounded, &Bound::Unbounded).unwrap();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn test_size_mismatch_is_corruption() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("short.idx");
        std::fs::write(&path, [0u8; 10]).unwrap();
        let layout = KeyLayout::new(vec![Column::int("a")]).unwrap();
        let result = KeyIndex::open(&path, vec!["a".to_string()], layout.clone(), 1);
        assert!(matches!(result, Err(Error::Corruption(_))));

        let result = KeyIndex::open(&path, vec!["a".to_string()], layout, usize::MAX);
        assert!(matches!(result, Err(Error::Corruption(_))));
    }
}
