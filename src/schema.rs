//! Table schema: ordered columns plus the primary-key column list.
//!
//! The schema is created once with the table and persisted next to its
//! segments as `schema.json`. Column order defines the row encoding order,
//! primary-key order defines key comparison order.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::{Key, Row, Value};

pub const SCHEMA_FILE: &str = "schema.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Bool,
    Int,
    Float,
    Str,
}

impl FromStr for ColumnType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bool" => Ok(ColumnType::Bool),
            "int" | "int64" => Ok(ColumnType::Int),
            "float" | "float64" => Ok(ColumnType::Float),
            "str" | "string" => Ok(ColumnType::Str),
            other => Err(Error::Schema(format!("unsupported column type {other:?}"))),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Bool => "bool",
            ColumnType::Int => "int",
            ColumnType::Float => "float",
            ColumnType::Str => "str",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    /// Declared byte width of a string column. `None` is a variable-length
    /// string, which cannot be part of the primary key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType, size: Option<usize>) -> Self {
        Self {
            name: name.into(),
            ty,
            size,
        }
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Bool, None)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Int, None)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Float, None)
    }

    /// A fixed-size string column.
    pub fn str(name: impl Into<String>, size: usize) -> Self {
        Self::new(name, ColumnType::Str, Some(size))
    }

    /// A variable-length string column.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Str, None)
    }

    /// Whether `value` has this column's type. Null fits every column.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self.ty, value),
            (_, Value::Null)
                | (ColumnType::Bool, Value::Bool(_))
                | (ColumnType::Int, Value::Int(_))
                | (ColumnType::Float, Value::Float(_))
                | (ColumnType::Str, Value::Str(_))
        )
    }
}

/// Names end up in file and directory names, so they are restricted.
pub(crate) fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::Validation(format!(
            "invalid {kind} name {name:?}: expected [A-Za-z0-9_]+"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
    primary_key: Vec<String>,
}

impl Schema {
    pub fn new(columns: Vec<Column>, primary_key: Vec<String>) -> Result<Self> {
        let schema = Self {
            columns,
            primary_key,
        };
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::Schema("schema has no columns".to_string()));
        }
        for (i, column) in self.columns.iter().enumerate() {
            validate_name("column", &column.name).map_err(|e| Error::Schema(e.to_string()))?;
            if self.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(Error::Schema(format!("duplicate column {:?}", column.name)));
            }
            if column.ty != ColumnType::Str && column.size.is_some() {
                return Err(Error::Schema(format!(
                    "column {:?} of type {} cannot declare a size",
                    column.name, column.ty
                )));
            }
        }

        if self.primary_key.is_empty() {
            return Err(Error::Schema("primary key is missing".to_string()));
        }
        for (i, name) in self.primary_key.iter().enumerate() {
            if self.primary_key[..i].contains(name) {
                return Err(Error::Schema(format!(
                    "column {name:?} appears twice in the primary key"
                )));
            }
            let column = self.column(name).ok_or_else(|| {
                Error::Schema(format!("primary key column {name:?} is not defined"))
            })?;
            if column.ty == ColumnType::Str && column.size.is_none() {
                return Err(Error::Schema(format!(
                    "primary key column {name:?} is a variable-length string"
                )));
            }
        }
        Ok(())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Looks up each named column, failing on the first unknown name.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<Column>> {
        names
            .iter()
            .map(|name| {
                self.column(name).cloned().ok_or_else(|| {
                    Error::Validation(format!("column {name:?} is not defined in schema"))
                })
            })
            .collect()
    }

    /// Projects a row onto the given columns; absent columns project to Null.
    pub fn project(row: &Row, columns: &[String]) -> Vec<Value> {
        columns
            .iter()
            .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// The primary key of a row.
    pub fn key_of(&self, row: &Row) -> Key {
        Self::project(row, &self.primary_key)
    }

    /// Whether `columns` is a leading prefix of the primary key, in which case
    /// primary-key order is also `columns` order.
    pub fn is_key_prefix(&self, columns: &[String]) -> bool {
        !columns.is_empty()
            && columns.len() <= self.primary_key.len()
            && self.primary_key[..columns.len()] == *columns
    }

    /// Column sets that get a key index in every segment: the full primary
    /// key, then every primary-key column on its own.
    pub fn indexed_column_sets(&self) -> Vec<Vec<String>> {
        let mut sets = vec![self.primary_key.clone()];
        for name in &self.primary_key {
            let single = vec![name.clone()];
            if !sets.contains(&single) {
                sets.push(single);
            }
        }
        sets
    }

    /// Writes the schema document atomically (temp file, then rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        let document = serde_json::to_vec_pretty(self)?;
        fs::write(&tmp, document).map_err(|e| Error::Write("schema document", e))?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let document = fs::read(path).map_err(|e| Error::Read("schema document", e))?;
        let schema: Schema = serde_json::from_slice(&document)?;
        schema.validate()?;
        Ok(schema)
    }
}
