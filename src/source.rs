//! The push-style side of a pipeline.
//!
//! A [`RowSource`] produces rows by pushing them into a [`RowSink`] whenever it
//! is resumed. The sink answers every push with a [`Demand`]; on
//! [`Demand::Pause`] the source must return from [`RowSource::resume`] and wait
//! to be resumed again. Completion and failure are notified through
//! [`RowSink::end`] and [`RowSink::fail`].
//!
//! Scheduling is cooperative and single-threaded: a source only runs inside
//! `resume`, and `resume` is only called by whoever owns the source (in
//! practice the [`BoundedAdapter`](crate::adapter::BoundedAdapter)).
//!
//! Stages are sources too: [`StageSource`] wraps an upstream source and applies
//! a [`RowOp`] to each row on its way downstream.

use crate::error::PipelineError;
use crate::io::compression::auto_detect_reader;
use crate::io::format::{decoder_for, FormatOptions, RowDecoder};
use crate::node::RowOp;
use crate::row::Row;
use anyhow::Context;
use std::fs::File;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

/// Backpressure answer to a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demand {
    More,
    Pause,
}

/// Receiver of push notifications.
pub trait RowSink {
    fn push(&mut self, row: Row) -> Demand;
    fn end(&mut self);
    fn fail(&mut self, err: PipelineError);
}

/// A push-style producer of rows.
pub trait RowSource: Send {
    /// Push rows into `sink` until it answers [`Demand::Pause`], the source is
    /// exhausted (`sink.end()`), or it fails (`sink.fail(..)`).
    ///
    /// Returning in any other state is a contract violation. When the adapter
    /// is waiting on an empty buffer, a call that made no progress is reported
    /// as [`PipelineError::Stalled`]. A source that produces in batches must
    /// keep going inside one call until it pauses, ends or fails.
    fn resume(&mut self, sink: &mut dyn RowSink);

    /// Stop producing and release any held resource. Must be idempotent.
    fn halt(&mut self);
}

/// Recipe for a fresh source; called once per run or iteration.
pub type SourceFactory = Arc<dyn Fn() -> anyhow::Result<Box<dyn RowSource>> + Send + Sync>;

/// Where a decoded source reads from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceLocation {
    Path(PathBuf),
    Text(String),
}

impl SourceLocation {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub(crate) fn label(&self) -> String {
        match self {
            Self::Path(p) => p.display().to_string(),
            Self::Text(_) => "<inline text>".to_string(),
        }
    }
}

impl From<PathBuf> for SourceLocation {
    fn from(p: PathBuf) -> Self {
        Self::Path(p)
    }
}

impl From<&std::path::Path> for SourceLocation {
    fn from(p: &std::path::Path) -> Self {
        Self::Path(p.to_path_buf())
    }
}

/// Rows held in memory, replayed from the start on every run.
pub struct VecSource {
    rows: Arc<[Row]>,
    next: usize,
    halted: bool,
}

impl VecSource {
    pub fn new(rows: Arc<[Row]>) -> Self {
        Self {
            rows,
            next: 0,
            halted: false,
        }
    }
}

impl RowSource for VecSource {
    fn resume(&mut self, sink: &mut dyn RowSink) {
        while !self.halted {
            let Some(row) = self.rows.get(self.next) else {
                self.halted = true;
                sink.end();
                return;
            };
            self.next += 1;
            if sink.push(row.clone()) == Demand::Pause {
                return;
            }
        }
    }

    fn halt(&mut self) {
        self.halted = true;
    }
}

/// Rows decoded incrementally from text or a file.
///
/// The file handle lives inside the decoder and is closed when the source is
/// halted or dropped, whichever comes first.
pub struct DecodeSource {
    label: String,
    decoder: Option<Box<dyn RowDecoder>>,
}

impl DecodeSource {
    /// Open `location` and prepare a decoder. This is the only point a file is
    /// acquired.
    ///
    /// # Errors
    /// Fails when the file cannot be opened or its decompressor set up.
    pub fn open(location: &SourceLocation, format: &FormatOptions) -> anyhow::Result<Self> {
        let decoder = match location {
            SourceLocation::Path(path) => {
                let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
                let rdr = auto_detect_reader(f, path)
                    .with_context(|| format!("setup decompression for {}", path.display()))?;
                decoder_for(rdr, format)
            }
            SourceLocation::Text(text) => {
                decoder_for(Box::new(Cursor::new(text.clone().into_bytes())), format)
            }
        };
        Ok(Self {
            label: location.label(),
            decoder: Some(decoder),
        })
    }
}

impl RowSource for DecodeSource {
    fn resume(&mut self, sink: &mut dyn RowSink) {
        while let Some(decoder) = self.decoder.as_mut() {
            match decoder.next_row() {
                Ok(Some(row)) => {
                    if sink.push(row) == Demand::Pause {
                        return;
                    }
                }
                Ok(None) => {
                    self.decoder = None;
                    sink.end();
                }
                Err(e) => {
                    self.decoder = None;
                    sink.fail(PipelineError::source_failed(self.label.clone(), e));
                }
            }
        }
    }

    fn halt(&mut self) {
        self.decoder = None;
    }
}

/// One pipeline stage: `upstream` with `op` applied to every row.
pub struct StageSource {
    upstream: Box<dyn RowSource>,
    op: Arc<dyn RowOp>,
    index: usize,
    failed: bool,
}

impl StageSource {
    pub fn new(upstream: Box<dyn RowSource>, op: Arc<dyn RowOp>, index: usize) -> Self {
        Self {
            upstream,
            op,
            index,
            failed: false,
        }
    }
}

impl RowSource for StageSource {
    fn resume(&mut self, sink: &mut dyn RowSink) {
        if self.failed {
            return;
        }
        let mut stage = StageSink {
            downstream: sink,
            op: self.op.as_ref(),
            index: self.index,
            failed: false,
        };
        self.upstream.resume(&mut stage);
        if stage.failed {
            self.failed = true;
            self.upstream.halt();
        }
    }

    fn halt(&mut self) {
        self.upstream.halt();
    }
}

struct StageSink<'a> {
    downstream: &'a mut dyn RowSink,
    op: &'a dyn RowOp,
    index: usize,
    failed: bool,
}

impl RowSink for StageSink<'_> {
    fn push(&mut self, row: Row) -> Demand {
        if self.failed {
            return Demand::Pause;
        }
        match self.op.apply(row) {
            Ok(Some(out)) => self.downstream.push(out),
            Ok(None) => Demand::More,
            Err(e) => {
                tracing::warn!(stage = self.index, kind = self.op.kind(), error = %e, "stage failed");
                self.failed = true;
                self.downstream
                    .fail(PipelineError::stage_failed(self.index, self.op.kind(), e));
                Demand::Pause
            }
        }
    }

    fn end(&mut self) {
        if !self.failed {
            self.downstream.end();
        }
    }

    fn fail(&mut self, err: PipelineError) {
        self.downstream.fail(err);
    }
}

/// Factory adapter for closures that build a source.
pub fn source_fn<S, F>(f: F) -> SourceFactory
where
    S: RowSource + 'static,
    F: Fn() -> anyhow::Result<S> + Send + Sync + 'static,
{
    Arc::new(move || -> anyhow::Result<Box<dyn RowSource>> { Ok(Box::new(f()?)) })
}
