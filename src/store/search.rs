//! Directional binary search over sorted key sequences.
//!
//! Every lookup is phrased as "first index where a monotone predicate
//! holds", which keeps the boundary handling in one place for the memtable
//! and for memory-mapped key indexes alike.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;

use crate::encoding::key::compare_partial;
use crate::error::Result;
use crate::value::{PartialKey, Value};

/// Which record a lookup selects relative to the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Leftmost record equal to the probe.
    Eq,
    /// Greatest record strictly below the probe.
    Lt,
    /// Greatest record at or below the probe.
    Le,
    /// Smallest record strictly above the probe.
    Gt,
    /// Smallest record at or above the probe.
    Ge,
}

impl Direction {
    /// Whether the nearest candidate is the largest one (`Lt`, `Le`) rather
    /// than the smallest.
    pub fn descending(self) -> bool {
        matches!(self, Direction::Lt | Direction::Le)
    }

    /// Whether a record comparing `ord` to the probe qualifies.
    pub fn accepts(self, ord: Ordering) -> bool {
        match self {
            Direction::Eq => ord == Ordering::Equal,
            Direction::Lt => ord == Ordering::Less,
            Direction::Le => ord != Ordering::Greater,
            Direction::Gt => ord == Ordering::Greater,
            Direction::Ge => ord != Ordering::Less,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Direction::Eq => "=",
            Direction::Lt => "<",
            Direction::Le => "<=",
            Direction::Gt => ">",
            Direction::Ge => ">=",
        };
        f.write_str(op)
    }
}

/// First index in `0..len` where `pred` holds, or `len`. `pred` must be
/// false for a prefix of the range and true for the rest.
pub fn partition_point<F>(len: usize, mut pred: F) -> Result<usize>
where
    F: FnMut(usize) -> Result<bool>,
{
    let mut low = 0;
    let mut high = len;
    while low < high {
        let mid = low + (high - low) / 2;
        if pred(mid)? {
            high = mid;
        } else {
            low = mid + 1;
        }
    }
    Ok(low)
}

/// Finds the record selected by `direction` in a sequence of `len` records
/// sorted ascending. `cmp_at(i)` compares record `i` against the probe.
pub fn locate<F>(len: usize, direction: Direction, mut cmp_at: F) -> Result<Option<usize>>
where
    F: FnMut(usize) -> Result<Ordering>,
{
    let found = match direction {
        Direction::Eq => {
            let i = partition_point(len, |i| Ok(cmp_at(i)? != Ordering::Less))?;
            (i < len && cmp_at(i)? == Ordering::Equal).then_some(i)
        }
        Direction::Ge => {
            let i = partition_point(len, |i| Ok(cmp_at(i)? != Ordering::Less))?;
            (i < len).then_some(i)
        }
        Direction::Gt => {
            let i = partition_point(len, |i| Ok(cmp_at(i)? == Ordering::Greater))?;
            (i < len).then_some(i)
        }
        Direction::Le => {
            partition_point(len, |i| Ok(cmp_at(i)? == Ordering::Greater))?.checked_sub(1)
        }
        Direction::Lt => {
            partition_point(len, |i| Ok(cmp_at(i)? != Ordering::Less))?.checked_sub(1)
        }
    };
    Ok(found)
}

/// Index of the first record inside `lower`.
pub fn lower_start<F>(len: usize, lower: &Bound<PartialKey>, mut cmp_at: F) -> Result<usize>
where
    F: FnMut(usize, &[Option<Value>]) -> Result<Ordering>,
{
    match lower {
        Bound::Unbounded => Ok(0),
        Bound::Included(probe) => {
            partition_point(len, |i| Ok(cmp_at(i, probe)? != Ordering::Less))
        }
        Bound::Excluded(probe) => {
            partition_point(len, |i| Ok(cmp_at(i, probe)? == Ordering::Greater))
        }
    }
}

pub fn above_lower(stored: &[Value], lower: &Bound<PartialKey>) -> bool {
    match lower {
        Bound::Unbounded => true,
        Bound::Included(probe) => compare_partial(stored, probe) != Ordering::Less,
        Bound::Excluded(probe) => compare_partial(stored, probe) == Ordering::Greater,
    }
}

pub fn below_upper(stored: &[Value], upper: &Bound<PartialKey>) -> bool {
    match upper {
        Bound::Unbounded => true,
        Bound::Included(probe) => compare_partial(stored, probe) != Ordering::Greater,
        Bound::Excluded(probe) => compare_partial(stored, probe) == Ordering::Less,
    }
}

/// Whether `stored` lies between both bounds.
pub fn within(stored: &[Value], lower: &Bound<PartialKey>, upper: &Bound<PartialKey>) -> bool {
    above_lower(stored, lower) && below_upper(stored, upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Vec<Vec<Value>> {
        [(0, 0), (0, 1), (1, 0), (1, 5), (2, 2)]
            .iter()
            .map(|(a, b)| vec![Value::Int(*a), Value::Int(*b)])
            .collect()
    }

    fn find(direction: Direction, probe: &[Option<Value>]) -> Option<Vec<Value>> {
        let keys = keys();
        locate(keys.len(), direction, |i| Ok(compare_partial(&keys[i], probe)))
            .unwrap()
            .map(|i| keys[i].clone())
    }

    fn key(a: i64, b: i64) -> Option<Vec<Value>> {
        Some(vec![Value::Int(a), Value::Int(b)])
    }

    #[test]
    fn test_partition_point() {
        let values = [1, 3, 3, 5, 8];
        assert_eq!(partition_point(5, |i| Ok(values[i] >= 3)).unwrap(), 1);
        assert_eq!(partition_point(5, |i| Ok(values[i] > 3)).unwrap(), 3);
        assert_eq!(partition_point(5, |i| Ok(values[i] > 9)).unwrap(), 5);
        assert_eq!(partition_point(0, |_| Ok(true)).unwrap(), 0);
    }

    #[test]
    fn test_partial_probe_directions() {
        let one = [Some(Value::Int(1)), None];
        assert_eq!(find(Direction::Ge, &one), key(1, 0));
        assert_eq!(find(Direction::Le, &one), key(1, 5));
        assert_eq!(find(Direction::Lt, &one), key(0, 1));
        assert_eq!(find(Direction::Gt, &one), key(2, 2));
        assert_eq!(find(Direction::Eq, &one), key(1, 0));
    }

    #[test]
    fn test_full_probe_directions() {
        let probe = [Some(Value::Int(1)), Some(Value::Int(5))];
        assert_eq!(find(Direction::Gt, &probe), key(2, 2));
        assert_eq!(find(Direction::Ge, &probe), key(1, 5));
        assert_eq!(find(Direction::Lt, &probe), key(1, 0));
        assert_eq!(find(Direction::Eq, &probe), key(1, 5));

        let missing = [Some(Value::Int(1)), Some(Value::Int(3))];
        assert_eq!(find(Direction::Eq, &missing), None);
        assert_eq!(find(Direction::Le, &missing), key(1, 0));
    }

    #[test]
    fn test_out_of_range() {
        let low = [Some(Value::Int(-1)), None];
        assert_eq!(find(Direction::Lt, &low), None);
        assert_eq!(find(Direction::Le, &low), None);
        assert_eq!(find(Direction::Ge, &low), key(0, 0));

        let high = [Some(Value::Int(9)), Some(Value::Int(9))];
        assert_eq!(find(Direction::Gt, &high), None);
        assert_eq!(find(Direction::Ge, &high), None);
        assert_eq!(find(Direction::Le, &high), key(2, 2));
    }

    #[test]
    fn test_empty_sequence() {
        for direction in [
            Direction::Eq,
            Direction::Lt,
            Direction::Le,
            Direction::Gt,
            Direction::Ge,
        ] {
            let found = locate(0, direction, |_| Ok(Ordering::Equal)).unwrap();
            assert_eq!(found, None, "direction {direction}");
        }
    }

    #[test]
    fn test_bounds() {
        let keys = keys();
        let lower = Bound::Included(vec![Some(Value::Int(1))]);
        let upper = Bound::Excluded(vec![Some(Value::Int(2))]);
        let start =
            lower_start(keys.len(), &lower, |i, p| Ok(compare_partial(&keys[i], p))).unwrap();
        assert_eq!(start, 2);

        let inside: Vec<_> = keys.iter().filter(|k| within(k, &lower, &upper)).collect();
        assert_eq!(inside, vec![&keys[2], &keys[3]]);

        let after = Bound::Excluded(vec![Some(Value::Int(1))]);
        let start =
            lower_start(keys.len(), &after, |i, p| Ok(compare_partial(&keys[i], p))).unwrap();
        assert_eq!(start, 4);
        assert!(within(&keys[0], &Bound::Unbounded, &Bound::Unbounded));
    }
}
