use std::ops::Bound;
use std::sync::Arc;

use super::deferred::Deferred;
use crate::error::Result;
use crate::store::search::Direction;
use crate::store::Table;
use crate::value::{PartialKey, Row};

/// An operation recorded in a transaction log, executed at commit.
pub(crate) enum Op {
    Insert {
        row: Row,
    },
    Lookup {
        direction: Direction,
        probe: PartialKey,
        columns: Vec<String>,
        result: Deferred<Option<Row>>,
    },
    Select {
        columns: Vec<String>,
        lower: Bound<PartialKey>,
        upper: Bound<PartialKey>,
        result: Deferred<Vec<Row>>,
    },
}

pub(crate) struct LoggedOp {
    pub table: Arc<Table>,
    pub op: Op,
}

impl LoggedOp {
    pub fn is_write(&self) -> bool {
        matches!(self.op, Op::Insert { .. })
    }

    pub fn name(&self) -> &'static str {
        match self.op {
            Op::Insert { .. } => "insert",
            Op::Lookup { .. } => "lookup",
            Op::Select { .. } => "select",
        }
    }

    pub fn apply(&self) -> Result<()> {
        match &self.op {
            Op::Insert { row } => self.table.apply_insert(row.clone()),
            Op::Lookup {
                direction,
                probe,
                columns,
                result,
            } => {
                let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
                let found = self.table.lookup(*direction, probe, &columns)?;
                result.set(found);
                Ok(())
            }
            Op::Select {
                columns,
                lower,
                upper,
                result,
            } => {
                let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
                let rows = self.table.range(&columns, lower, upper)?;
                result.set(rows);
                Ok(())
            }
        }
    }
}
