//! Immutable on-disk segments.
//!
//! A segment is published as a family of files sharing the stem
//! `segment-<generation>` (generation zero-padded to 20 digits):
//!
//! - `.data`: length-prefixed rows in primary-key order.
//! - `.pos`: one big-endian `u64` data offset per row, in row order.
//! - `.<col>[+<col>...].idx`: one fixed-stride key index per indexed column set.
//! - `.meta`: bincode [`meta::SegmentMeta`], renamed into place last.
//!
//! A stem without a `.meta` file was never published and is ignored.

pub mod index;
pub mod meta;
pub mod position;
pub mod table;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use memmap2::Mmap;

use crate::error::{Error, Result};

pub use table::Segment;

const PREFIX: &str = "segment-";
pub const META_EXTENSION: &str = "meta";
pub const TMP_EXTENSION: &str = "tmp";

fn stem(generation: u64) -> String {
    format!("{PREFIX}{generation:020}")
}

pub fn data_path(dir: &Path, generation: u64) -> PathBuf {
    dir.join(format!("{}.data", stem(generation)))
}

pub fn position_path(dir: &Path, generation: u64) -> PathBuf {
    dir.join(format!("{}.pos", stem(generation)))
}

pub fn index_path(dir: &Path, generation: u64, columns: &[String]) -> PathBuf {
    dir.join(format!("{}.{}.idx", stem(generation), columns.iter().join("+")))
}

pub fn meta_path(dir: &Path, generation: u64) -> PathBuf {
    dir.join(format!("{}.{META_EXTENSION}", stem(generation)))
}

/// Generation of a published segment, from its metadata file name.
pub fn parse_generation(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix(PREFIX)?
        .strip_suffix(META_EXTENSION)?
        .strip_suffix('.')?
        .parse()
        .ok()
}

/// Generation named by any file of a segment family, published or not.
pub fn file_generation(file_name: &str) -> Option<u64> {
    let (generation, _) = file_name.strip_prefix(PREFIX)?.split_once('.')?;
    generation.parse().ok()
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(TMP_EXTENSION);
    PathBuf::from(name)
}

/// Writes `bytes` to `<path>.tmp` and syncs it. The caller renames it into
/// place with [`publish`].
fn write_staged(path: &Path, bytes: &[u8], what: &'static str) -> Result<PathBuf> {
    let staged = tmp_path(path);
    let mut file = File::create(&staged).map_err(|e| Error::Write(what, e))?;
    file.write_all(bytes).map_err(|e| Error::Write(what, e))?;
    file.sync_all().map_err(|e| Error::Write(what, e))?;
    Ok(staged)
}

fn publish(staged: &Path, path: &Path) -> Result<()> {
    fs::rename(staged, path)?;
    Ok(())
}

/// Maps a published segment file read-only.
fn map_file(path: &Path, what: &'static str) -> Result<Mmap> {
    let file = File::open(path).map_err(|e| Error::Read(what, e))?;
    // SAFETY: segment files are immutable once renamed into place and the
    // mapping is read-only. Record boundaries are checked before slicing.
    unsafe { Mmap::map(&file) }.map_err(|e| Error::Read(what, e))
}
