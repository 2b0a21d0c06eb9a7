//! Typed values, rows, and key tuples.
//!
//! A [`Row`] maps column names to [`Value`]s. Projecting a row onto the
//! primary-key columns yields a [`Key`], which is ordered lexicographically by
//! the natural order of each value. A [`PartialKey`] leaves trailing positions
//! unspecified (`None`) so a lookup can bind only a prefix of the key.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A single typed column value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// A row keyed by column name. After insert every schema column is present.
pub type Row = BTreeMap<String, Value>;

/// A fully specified key tuple in primary-key (or index) column order.
pub type Key = Vec<Value>;

/// A key tuple where `None` marks an unspecified position.
pub type PartialKey = Vec<Option<Value>>;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
        }
    }

    // Cross-type order only exists to make the total order deterministic.
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::Str(_) => 4,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Turns a full key into a partial key with every position specified.
pub fn exact(key: &[Value]) -> PartialKey {
    key.iter().cloned().map(Some).collect()
}

/// Builds a [`Row`] from `column => value` pairs.
#[macro_export]
macro_rules! row {
    ($($column:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut row = $crate::Row::new();
        $( row.insert($column.to_string(), $crate::Value::from($value)); )*
        row
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_type_ordering() {
        assert!(Value::Int(-5) < Value::Int(3));
        assert!(Value::Float(-0.5) < Value::Float(0.25));
        assert!(Value::from("apple") < Value::from("banana"));
        assert!(Value::Bool(false) < Value::Bool(true));
    }

    #[test]
    fn test_float_total_order() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert!(Value::Float(f64::NEG_INFINITY) < Value::Float(-1.0));
        assert!(Value::Float(-0.0) < Value::Float(0.0));
    }

    #[test]
    fn test_tuple_ordering_is_lexicographic() {
        let a: Key = vec![1.into(), 9.into()];
        let b: Key = vec![2.into(), 0.into()];
        let c: Key = vec![2.into(), 1.into()];
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_row_macro_and_null_conversion() {
        let row = row!("a" => 1, "b" => None::<i64>, "c" => "x");
        assert_eq!(row["a"], Value::Int(1));
        assert!(row["b"].is_null());
        assert_eq!(row["c"], Value::Str("x".to_string()));
    }

    #[test]
    fn test_exact_partial_key() {
        let probe = exact(&[Value::Int(1), Value::Int(2)]);
        assert_eq!(probe, vec![Some(Value::Int(1)), Some(Value::Int(2))]);
    }
}
