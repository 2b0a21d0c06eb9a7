//! Position index: row ordinal to data file offset.

use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use memmap2::Mmap;

use crate::error::{Error, Result};

const RECORD_SIZE: usize = 8;

pub struct PositionIndex {
    map: Mmap,
    len: usize,
}

impl PositionIndex {
    pub fn open(path: &Path, rows: usize) -> Result<Self> {
        let expected = rows.checked_mul(RECORD_SIZE).ok_or_else(|| {
            Error::Corruption(format!("position index {} claims {rows} rows", path.display()))
        })?;
        let map = super::map_file(path, "position index")?;
        if map.len() != expected {
            return Err(Error::Corruption(format!(
                "position index {} is {} bytes, expected {} rows",
                path.display(),
                map.len(),
                rows
            )));
        }
        Ok(Self { map, len: rows })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn offset(&self, ordinal: usize) -> Option<u64> {
        if ordinal >= self.len {
            return None;
        }
        let start = ordinal * RECORD_SIZE;
        Some(BigEndian::read_u64(&self.map[start..start + RECORD_SIZE]))
    }

    pub fn encode(offsets: &[u64]) -> Vec<u8> {
        let mut buf = vec![0; offsets.len() * RECORD_SIZE];
        BigEndian::write_u64_into(offsets, &mut buf);
        buf
    }
}
