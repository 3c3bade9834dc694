//! Row operations: the per-row work a pipeline stage performs.
//!
//! Every chain call on a [`Pipeline`](crate::Pipeline) wraps one of these in an
//! `Arc<dyn RowOp>`. Operations are pure with respect to the pipeline: they
//! receive one row, produce zero or one row, and never see another row.

use crate::remap::{remap, PathMap};
use crate::row::{Row, Value};
use anyhow::Result;
use std::sync::Arc;

pub trait RowOp: Send + Sync {
    /// Short, static label used in errors and logs (`"filter"`, `"map"`, ...).
    fn kind(&self) -> &'static str;

    /// Process one row. `Ok(None)` drops it; `Err` fails the stage.
    fn apply(&self, row: Row) -> Result<Option<Row>>;
}

pub type Predicate = Arc<dyn Fn(&Row) -> Result<bool> + Send + Sync>;
pub type Transform = Arc<dyn Fn(Row) -> Result<Row> + Send + Sync>;
pub type Compute = Arc<dyn Fn(&Row) -> Result<Value> + Send + Sync>;

pub(crate) struct FilterOp(pub(crate) Predicate);

impl RowOp for FilterOp {
    fn kind(&self) -> &'static str {
        "filter"
    }

    fn apply(&self, row: Row) -> Result<Option<Row>> {
        Ok((self.0)(&row)?.then_some(row))
    }
}

pub(crate) struct MapOp(pub(crate) Transform);

impl RowOp for MapOp {
    fn kind(&self) -> &'static str {
        "map"
    }

    fn apply(&self, row: Row) -> Result<Option<Row>> {
        (self.0)(row).map(Some)
    }
}

/// What an added column is filled with.
#[derive(Clone)]
pub enum ColumnValue {
    Const(Value),
    Computed(Compute),
}

pub(crate) struct AddColumnOp {
    pub(crate) name: String,
    pub(crate) value: ColumnValue,
}

impl RowOp for AddColumnOp {
    fn kind(&self) -> &'static str {
        "add_column"
    }

    fn apply(&self, mut row: Row) -> Result<Option<Row>> {
        let v = match &self.value {
            ColumnValue::Const(v) => v.clone(),
            ColumnValue::Computed(f) => f(&row)?,
        };
        row.insert(self.name.clone(), v);
        Ok(Some(row))
    }
}

pub(crate) struct RemapOp(pub(crate) PathMap);

impl RowOp for RemapOp {
    fn kind(&self) -> &'static str {
        "remap"
    }

    fn apply(&self, row: Row) -> Result<Option<Row>> {
        Ok(Some(remap(&row, &self.0)))
    }
}
