//! Execution: turns a [`Pipeline`] description into a live graph and drives
//! its terminal action.
//!
//! The graph is built fresh on every run: the source factory is called, each
//! stage wraps the source before it, and the outermost source feeds a
//! [`BoundedAdapter`]. Terminal actions then pull from the adapter one row at
//! a time, so memory stays bounded by the adapter capacity for every terminal
//! except collect.

use crate::adapter::{BoundedAdapter, RowIter};
use crate::config::AdapterConfig;
use crate::error::{shared, PipelineError};
use crate::io::compression::{auto_detect_writer, CompressedWriter};
use crate::io::format::{encoder_for, RowEncoder};
use crate::pipeline::{Pipeline, Terminal};
use crate::row::Row;
use crate::sink::{CountingWriter, PipeSink, SharedWriter, SinkTarget, WriteOptions};
use crate::source::{RowSource, StageSource};
use anyhow::Context;
use std::fs::File;
use std::io::Write;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// What a run produced, by terminal action.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutput {
    /// No terminal was configured; this many rows were pulled and discarded.
    Drained(usize),
    Collected(Vec<Row>),
    /// Rows encoded and bytes that reached the target (preamble included,
    /// before compression).
    Written { rows: usize, bytes: u64 },
    Visited(usize),
    Piped(usize),
}

impl RunOutput {
    /// Number of rows that reached the terminal.
    pub fn row_count(&self) -> usize {
        match self {
            Self::Drained(n) | Self::Visited(n) | Self::Piped(n) => *n,
            Self::Collected(rows) => rows.len(),
            Self::Written { rows, .. } => *rows,
        }
    }

    /// The collected rows; empty for every other terminal.
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Self::Collected(rows) => rows,
            _ => Vec::new(),
        }
    }
}

pub(crate) fn build(p: &Pipeline) -> Result<BoundedAdapter, PipelineError> {
    p.adapter.validate()?;
    let name = p.source_name.as_ref();
    let mut src: Box<dyn RowSource> =
        (p.factory)().map_err(|e| PipelineError::source_failed(name, e))?;
    let stages = p.stages();
    let stage_count = stages.len();
    for (index, op) in stages.into_iter().enumerate() {
        src = Box::new(StageSource::new(src, op, index));
    }
    debug!(
        source = name,
        stages = stage_count,
        capacity = p.adapter.capacity,
        "execution graph built"
    );
    Ok(BoundedAdapter::new(name, src, &p.adapter))
}

pub(crate) fn iterate(p: &Pipeline) -> RowIter {
    match build(p) {
        Ok(adapter) => RowIter::new(adapter),
        Err(err) => RowIter::new(BoundedAdapter::failed(
            p.source_name.as_ref(),
            err,
            &AdapterConfig::with_capacity(1),
        )),
    }
}

pub(crate) fn run(p: &Pipeline) -> Result<RunOutput, PipelineError> {
    let terminal = p.terminal.name();
    let out = match &p.terminal {
        Terminal::None => {
            let mut adapter = build(p)?;
            let mut n = 0;
            while let Some(row) = adapter.next_row() {
                row?;
                n += 1;
            }
            RunOutput::Drained(n)
        }
        Terminal::Collect => {
            let mut adapter = build(p)?;
            let mut rows = Vec::new();
            while let Some(row) = adapter.next_row() {
                rows.push(row?);
            }
            RunOutput::Collected(rows)
        }
        Terminal::ToSink { target, options } => write_to_sink(p, target, options)?,
        Terminal::ForEach(f) => {
            let mut adapter = build(p)?;
            let mut n = 0;
            while let Some(row) = adapter.next_row() {
                f(row?).map_err(|e| PipelineError::Callback {
                    row: n,
                    cause: shared(e),
                })?;
                n += 1;
            }
            RunOutput::Visited(n)
        }
        Terminal::PipeTo(sink) => {
            let mut sink = lock_sink(sink);
            match pipe_rows(p, &mut *sink) {
                Ok(n) => RunOutput::Piped(n),
                Err(err) => {
                    sink.abort(&err);
                    return Err(err);
                }
            }
        }
    };
    debug!(terminal, rows = out.row_count(), "run finished");
    Ok(out)
}

fn lock_sink<'a>(sink: &'a Mutex<dyn PipeSink + 'static>) -> MutexGuard<'a, dyn PipeSink + 'static> {
    // Poisoned only if an earlier run panicked inside the sink itself.
    sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn pipe_rows(p: &Pipeline, sink: &mut dyn PipeSink) -> Result<usize, PipelineError> {
    let mut adapter = build(p)?;
    let mut n = 0;
    while let Some(row) = adapter.next_row() {
        sink.write_row(row?)
            .map_err(|e| PipelineError::sink_failed("pipe", e))?;
        n += 1;
    }
    sink.finish()
        .map_err(|e| PipelineError::sink_failed("pipe", e))?;
    Ok(n)
}

fn open_target(target: &SinkTarget) -> anyhow::Result<CompressedWriter> {
    match target {
        SinkTarget::Path(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create dir {}", parent.display()))?;
            }
            let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
            auto_detect_writer(f, path)
        }
        SinkTarget::Writer(w) => Ok(CompressedWriter::plain(Box::new(SharedWriter(w.clone())))),
    }
}

fn write_to_sink(
    p: &Pipeline,
    target: &SinkTarget,
    options: &WriteOptions,
) -> Result<RunOutput, PipelineError> {
    let label = target.label();
    let sink_err = |e: anyhow::Error| PipelineError::sink_failed(label.clone(), e);

    // Source first: a source that cannot open must not leave an empty file.
    let mut adapter = build(p)?;
    let mut out = CountingWriter::new(open_target(target).map_err(sink_err)?);

    if let Some(preamble) = &options.preamble {
        out.write_all(preamble.as_bytes())
            .context("write preamble")
            .map_err(sink_err)?;
    }

    let mut rows = 0;
    {
        let mut enc: Box<dyn RowEncoder + '_> = encoder_for(&mut out, &options.format);
        while let Some(row) = adapter.next_row() {
            let row = row?;
            enc.write_row(&row)
                .with_context(|| format!("encode row #{}", rows + 1))
                .map_err(sink_err)?;
            rows += 1;
        }
        enc.finish().map_err(sink_err)?;
    }

    let bytes = out.bytes();
    out.into_inner()
        .finish()
        .context("finish output")
        .map_err(sink_err)?;
    Ok(RunOutput::Written { rows, bytes })
}
