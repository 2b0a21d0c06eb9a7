//! Fixed-stride key index records and partial-key comparison.
//!
//! A record is the concatenation of each indexed column's key field followed
//! by a big-endian `u64` position (a byte offset into the segment data file):
//!
//! ```text
//! +-------------+-------------+-----+---------------+
//! | key field 0 | key field 1 | ... | position:u64  |
//! +-------------+-------------+-----+---------------+
//! ```
//!
//! Every record of a layout has the same size, so record `i` starts at
//! `i * stride` and a key index file can be binary searched in place.

use std::cmp::Ordering;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use super::column;
use crate::error::{Error, Result};
use crate::schema::Column;
use crate::value::{Key, Value};

/// Size of the position reference that ends every record.
pub const POSITION_SIZE: usize = 8;

#[derive(Debug, Clone)]
pub struct KeyLayout {
    columns: Vec<Column>,
    stride: usize,
}

impl KeyLayout {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::Schema("key layout needs at least one column".to_string()));
        }
        let mut stride = POSITION_SIZE;
        for c in &columns {
            stride += column::key_field_size(c)?;
        }
        Ok(Self { columns, stride })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Appends one record to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>, key: &[Value], position: u64) -> Result<()> {
        if key.len() != self.columns.len() {
            return Err(Error::Validation(format!(
                "key has {} values, index has {} columns",
                key.len(),
                self.columns.len()
            )));
        }
        for (c, v) in self.columns.iter().zip(key) {
            column::encode_key_field(buf, c, v)?;
        }
        buf.write_u64::<BigEndian>(position)?;
        Ok(())
    }

    pub fn encode(&self, key: &[Value], position: u64) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.stride);
        self.encode_into(&mut buf, key, position)?;
        Ok(buf)
    }

    /// Decodes one record. `record` must be exactly one stride long.
    pub fn decode(&self, record: &[u8]) -> Result<(Key, u64)> {
        if record.len() != self.stride {
            return Err(Error::Corruption(format!(
                "key record is {} bytes, expected {}",
                record.len(),
                self.stride
            )));
        }
        let mut key = Vec::with_capacity(self.columns.len());
        let mut offset = 0;
        for c in &self.columns {
            let (value, next) = column::decode_key_field(c, record, offset)?;
            key.push(value);
            offset = next;
        }
        let position = BigEndian::read_u64(&record[offset..]);
        Ok((key, position))
    }
}

/// Compares a stored key against a probe over the positions the probe
/// specifies. Unspecified positions and positions past the end of the probe
/// are skipped, so `(1, None)` equals every stored key starting with `1`.
pub fn compare_partial(stored: &[Value], probe: &[Option<Value>]) -> Ordering {
    stored
        .iter()
        .zip(probe)
        .filter_map(|(s, p)| p.as_ref().map(|p| s.cmp(p)))
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Checks that a probe fits an index of `width` columns and only leaves
/// trailing positions unspecified; other shapes are not monotone over the
/// index order and cannot be binary searched.
pub fn check_probe(probe: &[Option<Value>], width: usize) -> Result<()> {
    if probe.len() > width {
        return Err(Error::Validation(format!(
            "lookup key has {} values, index has {width} columns",
            probe.len()
        )));
    }
    let bound = probe.iter().take_while(|p| p.is_some()).count();
    if probe[bound..].iter().any(Option::is_some) {
        return Err(Error::Validation(
            "lookup key may only leave trailing columns unspecified".to_string(),
        ));
    }
    Ok(())
}
