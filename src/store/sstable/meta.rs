use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::encoding::bincode;
use crate::error::{Error, Result};

/// Metadata record that makes a segment visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMeta {
    pub generation: u64,
    pub row_count: u64,
    /// Indexed column sets, in the order their index files were written.
    pub indexes: Vec<Vec<String>>,
}

impl SegmentMeta {
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| Error::Read("segment metadata", e))?;
        let meta: SegmentMeta = bincode::deserialize(&bytes)?;
        if meta.row_count == 0 || meta.indexes.is_empty() {
            return Err(Error::Corruption(format!(
                "segment {} metadata describes no rows or no indexes",
                meta.generation
            )));
        }
        Ok(meta)
    }
}
