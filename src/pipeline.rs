//! The pipeline description: a source recipe, a chain of stages and a
//! terminal action.
//!
//! A [`Pipeline`] does nothing until it is run or iterated. Every chain call
//! takes `&self` and returns a **new** pipeline; the receiver is never
//! modified, so one prefix can be branched into several pipelines:
//!
//! ```
//! use rowflow::*;
//!
//! let base = Pipeline::from_rows(vec![row!({"a": 1}), row!({"a": 2})]);
//! let doubled = base.map(|mut r| {
//!     let a = r.get_i64("a").unwrap_or(0);
//!     r.insert("a", a * 2);
//!     r
//! });
//! let odd = base.filter(|r| r.get_i64("a") == Some(1));
//!
//! assert_eq!(base.stage_count(), 0);
//! assert_eq!(doubled.collect()?.len(), 2);
//! assert_eq!(odd.collect()?.len(), 1);
//! # Ok::<(), rowflow::PipelineError>(())
//! ```
//!
//! Stages are kept in a persistent list: chaining shares the existing prefix
//! instead of copying it.

use crate::adapter::RowIter;
use crate::config::{AdapterConfig, SortOptions};
use crate::error::PipelineError;
use crate::io::format::FormatOptions;
use crate::node::{AddColumnOp, ColumnValue, FilterOp, MapOp, RemapOp, RowOp};
use crate::remap::PathMap;
use crate::row::{Row, Value};
use crate::runner::{self, RunOutput};
use crate::sink::{PipeSink, SinkTarget, WriteOptions};
use crate::sort::{sort, Comparator};
use crate::source::{DecodeSource, RowSource, SourceFactory, SourceLocation, VecSource};
use anyhow::Result;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Per-row callback of a for-each terminal.
pub type RowCallback = Arc<dyn Fn(Row) -> Result<()> + Send + Sync>;

/// One link of the persistent stage list. `prev` points towards the source.
pub(crate) struct StageNode {
    op: Arc<dyn RowOp>,
    prev: Option<Arc<StageNode>>,
    depth: usize,
}

/// What `run` does with the rows.
#[derive(Clone, Default)]
pub(crate) enum Terminal {
    #[default]
    None,
    Collect,
    ToSink {
        target: SinkTarget,
        options: WriteOptions,
    },
    ForEach(RowCallback),
    PipeTo(Arc<Mutex<dyn PipeSink>>),
}

impl Terminal {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::None => "drain",
            Self::Collect => "collect",
            Self::ToSink { .. } => "to_sink",
            Self::ForEach(_) => "for_each",
            Self::PipeTo(_) => "pipe_to",
        }
    }
}

/// An immutable, lazily evaluated description of a row pipeline.
#[derive(Clone)]
pub struct Pipeline {
    pub(crate) source_name: Arc<str>,
    pub(crate) factory: SourceFactory,
    stages: Option<Arc<StageNode>>,
    pub(crate) terminal: Terminal,
    pub(crate) adapter: AdapterConfig,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("source", &self.source_name)
            .field("stages", &self.stage_kinds())
            .field("terminal", &self.terminal.name())
            .field("adapter", &self.adapter)
            .finish()
    }
}

/// Describe a pipeline that decodes rows from `location`.
///
/// Nothing is opened here; the file (if any) is acquired when the pipeline is
/// run or iterated, once per run.
pub fn open_source(location: impl Into<SourceLocation>, format: FormatOptions) -> Pipeline {
    Pipeline::open(location, format)
}

impl Pipeline {
    /// Pipeline over a custom source. `factory` is called once per run.
    pub fn from_source(name: impl Into<String>, factory: SourceFactory) -> Self {
        Self {
            source_name: Arc::from(name.into()),
            factory,
            stages: None,
            terminal: Terminal::None,
            adapter: AdapterConfig::default(),
        }
    }

    /// Pipeline over rows held in memory. Each run replays them from the start.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let rows: Arc<[Row]> = rows.into();
        let factory: SourceFactory = Arc::new(move || -> Result<Box<dyn RowSource>> {
            Ok(Box::new(VecSource::new(Arc::clone(&rows))))
        });
        Self::from_source("rows", factory)
    }

    /// See [`open_source`].
    pub fn open(location: impl Into<SourceLocation>, format: FormatOptions) -> Self {
        let location = location.into();
        let name = location.label();
        let factory: SourceFactory = Arc::new(move || -> Result<Box<dyn RowSource>> {
            Ok(Box::new(DecodeSource::open(&location, &format)?))
        });
        Self::from_source(name, factory)
    }

    /// Pipeline over a file whose format is guessed from its extension.
    ///
    /// # Errors
    /// Fails when the extension names no known format.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let format = FormatOptions::from_path(&path)?;
        Ok(Self::open(path.as_ref(), format))
    }

    /// Pipeline over inline text.
    pub fn from_text(text: impl Into<String>, format: FormatOptions) -> Self {
        Self::open(SourceLocation::text(text), format)
    }

    // -------- chaining --------

    fn with_stage(&self, op: Arc<dyn RowOp>) -> Self {
        let depth = self.stage_count() + 1;
        Self {
            stages: Some(Arc::new(StageNode {
                op,
                prev: self.stages.clone(),
                depth,
            })),
            ..self.clone()
        }
    }

    /// Keep rows for which `pred` returns `true`.
    pub fn filter<F>(&self, pred: F) -> Self
    where
        F: Fn(&Row) -> bool + Send + Sync + 'static,
    {
        self.try_filter(move |r| Ok(pred(r)))
    }

    /// Fallible [`filter`](Self::filter). An `Err` fails the stage and the run.
    pub fn try_filter<F>(&self, pred: F) -> Self
    where
        F: Fn(&Row) -> Result<bool> + Send + Sync + 'static,
    {
        self.with_stage(Arc::new(FilterOp(Arc::new(pred))))
    }

    /// Replace every row with `f(row)`.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(Row) -> Row + Send + Sync + 'static,
    {
        self.try_map(move |r| Ok(f(r)))
    }

    /// Fallible [`map`](Self::map). An `Err` fails the stage and the run.
    pub fn try_map<F>(&self, f: F) -> Self
    where
        F: Fn(Row) -> Result<Row> + Send + Sync + 'static,
    {
        self.with_stage(Arc::new(MapOp(Arc::new(f))))
    }

    /// Set column `name` to a constant on every row, overwriting an existing
    /// value in place.
    pub fn add_column(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_stage(Arc::new(AddColumnOp {
            name: name.into(),
            value: ColumnValue::Const(value.into()),
        }))
    }

    /// Set column `name` to a value computed from the row.
    pub fn add_column_with<F>(&self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Row) -> Value + Send + Sync + 'static,
    {
        self.try_add_column_with(name, move |r| Ok(f(r)))
    }

    /// Fallible [`add_column_with`](Self::add_column_with).
    pub fn try_add_column_with<F>(&self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Row) -> Result<Value> + Send + Sync + 'static,
    {
        self.with_stage(Arc::new(AddColumnOp {
            name: name.into(),
            value: ColumnValue::Computed(Arc::new(f)),
        }))
    }

    /// Reshape every row through `map`; see [`remap`](crate::remap::remap).
    pub fn remap(&self, map: PathMap) -> Self {
        self.with_stage(Arc::new(RemapOp(map)))
    }

    #[must_use]
    pub fn with_adapter_config(&self, config: AdapterConfig) -> Self {
        Self {
            adapter: config,
            ..self.clone()
        }
    }

    /// Shorthand for an adapter of `capacity` rows with default watermarks.
    #[must_use]
    pub fn with_capacity(&self, capacity: usize) -> Self {
        self.with_adapter_config(AdapterConfig {
            capacity,
            ..self.adapter
        })
    }

    pub fn stage_count(&self) -> usize {
        self.stages.as_ref().map_or(0, |s| s.depth)
    }

    /// Stage kinds from source to terminal, e.g. `["filter", "map"]`.
    pub fn stage_kinds(&self) -> Vec<&'static str> {
        self.stages().iter().map(|op| op.kind()).collect()
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn adapter_config(&self) -> &AdapterConfig {
        &self.adapter
    }

    /// Stage operations in source-to-terminal order.
    pub(crate) fn stages(&self) -> Vec<Arc<dyn RowOp>> {
        let mut out = Vec::with_capacity(self.stage_count());
        let mut cur = self.stages.as_deref();
        while let Some(node) = cur {
            out.push(Arc::clone(&node.op));
            cur = node.prev.as_deref();
        }
        out.reverse();
        out
    }

    // -------- terminal configuration --------

    fn with_terminal(&self, terminal: Terminal) -> Self {
        Self {
            terminal,
            ..self.clone()
        }
    }

    /// Configure `run` to gather every row into memory.
    ///
    /// Memory use is unbounded: the whole output is held at once.
    #[must_use]
    pub fn prepare_collect(&self) -> Self {
        self.with_terminal(Terminal::Collect)
    }

    /// Configure `run` to encode every row into `target`.
    #[must_use]
    pub fn prepare_to_sink(&self, target: impl Into<SinkTarget>, options: WriteOptions) -> Self {
        self.with_terminal(Terminal::ToSink {
            target: target.into(),
            options,
        })
    }

    /// Configure `run` to call `f` once per row, in order.
    #[must_use]
    pub fn prepare_for_each<F>(&self, f: F) -> Self
    where
        F: Fn(Row) -> Result<()> + Send + Sync + 'static,
    {
        self.with_terminal(Terminal::ForEach(Arc::new(f)))
    }

    /// Configure `run` to hand every row to `sink`.
    ///
    /// The sink is shared by every run of the returned pipeline.
    #[must_use]
    pub fn prepare_pipe_to(&self, sink: impl PipeSink + 'static) -> Self {
        self.with_terminal(Terminal::PipeTo(Arc::new(Mutex::new(sink))))
    }

    /// Like [`prepare_pipe_to`](Self::prepare_pipe_to) for a sink the caller
    /// keeps a handle to.
    #[must_use]
    pub fn prepare_pipe_to_shared(&self, sink: Arc<Mutex<dyn PipeSink>>) -> Self {
        self.with_terminal(Terminal::PipeTo(sink))
    }

    // -------- execution --------

    /// Build the execution graph and perform the configured terminal action.
    ///
    /// With no terminal configured the rows are pulled and discarded.
    ///
    /// # Errors
    /// The first source, stage, callback or sink failure, naming where it
    /// happened.
    pub fn run(&self) -> Result<RunOutput, PipelineError> {
        runner::run(self)
    }

    /// Run to completion and return every row.
    ///
    /// # Errors
    /// See [`run`](Self::run).
    pub fn collect(&self) -> Result<Vec<Row>, PipelineError> {
        Ok(self.prepare_collect().run()?.into_rows())
    }

    /// Collect, then sort with the worker-parallel sort engine.
    ///
    /// # Example
    /// ```
    /// use rowflow::*;
    ///
    /// let p = Pipeline::from_rows(vec![row!({"a": 3}), row!({"a": 1}), row!({"a": 2})]);
    /// let sorted = p.collect_sorted(&Comparator::asc("a"), &SortOptions::default())?;
    /// let keys: Vec<_> = sorted.iter().filter_map(|r| r.get_i64("a")).collect();
    /// assert_eq!(keys, vec![1, 2, 3]);
    /// # Ok::<(), rowflow::PipelineError>(())
    /// ```
    ///
    /// # Errors
    /// See [`run`](Self::run); sort failures surface as [`PipelineError::Sort`].
    pub fn collect_sorted(
        &self,
        comparator: &Comparator,
        options: &SortOptions,
    ) -> Result<Vec<Row>, PipelineError> {
        let rows = self.collect()?;
        Ok(sort(rows, comparator, options)?)
    }

    /// Pull rows one at a time. Each call builds a fresh graph; dropping the
    /// iterator tears it down.
    pub fn iter(&self) -> RowIter {
        runner::iterate(self)
    }
}

impl IntoIterator for &Pipeline {
    type Item = Result<Row, PipelineError>;
    type IntoIter = RowIter;

    fn into_iter(self) -> RowIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;

    #[test]
    fn chaining_shares_the_prefix() {
        let base = Pipeline::from_rows(vec![row!({"a": 1})]).filter(|_| true);
        let left = base.map(|r| r);
        let right = base.add_column("b", 2);

        assert_eq!(base.stage_kinds(), vec!["filter"]);
        assert_eq!(left.stage_kinds(), vec!["filter", "map"]);
        assert_eq!(right.stage_kinds(), vec!["filter", "add_column"]);

        let shared = |p: &Pipeline| p.stages.as_ref().and_then(|n| n.prev.clone());
        let (Some(l), Some(r)) = (shared(&left), shared(&right)) else {
            panic!("both branches should have a parent stage");
        };
        assert!(Arc::ptr_eq(&l, &r));
    }

    #[test]
    fn terminal_configuration_does_not_touch_the_receiver() {
        let p = Pipeline::from_rows(vec![]);
        let c = p.prepare_collect();
        assert_eq!(p.terminal.name(), "drain");
        assert_eq!(c.terminal.name(), "collect");
    }
}
