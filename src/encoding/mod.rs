//! Binary formats shared by the memtable flush and the segment readers.
//!
//! - [`column`]: one typed value, with a null flag.
//! - [`key`]: fixed-stride key index records and partial-key comparison.
//! - [`bincode`]: segment metadata records.

pub mod bincode;
pub mod column;
pub mod key;
