//! A push source with scripted behaviour and shared counters.

use crate::error::PipelineError;
use crate::row::Row;
use crate::source::{Demand, RowSink, RowSource, SourceFactory};
use anyhow::anyhow;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct ProbeState {
    pushes: AtomicUsize,
    resumes: AtomicUsize,
    halts: AtomicUsize,
    halted: AtomicBool,
    dropped: AtomicUsize,
}

/// Observes every [`ScriptedSource`] created from the same script.
///
/// Counters accumulate across runs: a pipeline run twice shows the sum.
#[derive(Debug, Clone, Default)]
pub struct SourceProbe(Arc<ProbeState>);

impl SourceProbe {
    /// Rows pushed so far.
    pub fn pushes(&self) -> usize {
        self.0.pushes.load(Ordering::SeqCst)
    }

    /// Times `resume` was called.
    pub fn resumes(&self) -> usize {
        self.0.resumes.load(Ordering::SeqCst)
    }

    /// Times `halt` was called.
    pub fn halts(&self) -> usize {
        self.0.halts.load(Ordering::SeqCst)
    }

    /// Whether the most recent source was halted.
    pub fn halted(&self) -> bool {
        self.0.halted.load(Ordering::SeqCst)
    }

    /// Number of source instances dropped.
    pub fn dropped(&self) -> usize {
        self.0.dropped.load(Ordering::SeqCst)
    }
}

/// A [`RowSource`] that pushes a fixed list of rows and can misbehave on demand.
///
/// By default it honours [`Demand::Pause`] and ends after the last row.
#[derive(Clone)]
pub struct ScriptedSource {
    rows: VecDeque<Row>,
    fail_after: Option<usize>,
    ignore_pause: bool,
    stall: bool,
    pushed: usize,
    done: bool,
    probe: SourceProbe,
}

impl ScriptedSource {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into(),
            fail_after: None,
            ignore_pause: false,
            stall: false,
            pushed: 0,
            done: false,
            probe: SourceProbe::default(),
        }
    }

    /// Fail with a source error once `n` rows have been pushed.
    #[must_use]
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Keep pushing after the sink answers [`Demand::Pause`].
    #[must_use]
    pub fn ignoring_backpressure(mut self) -> Self {
        self.ignore_pause = true;
        self
    }

    /// Return from `resume` without pushing, ending or failing.
    #[must_use]
    pub fn stalling(mut self) -> Self {
        self.stall = true;
        self
    }

    pub fn probe(&self) -> SourceProbe {
        self.probe.clone()
    }

    /// A factory producing a fresh copy of this script per run. All copies
    /// report to the same probe.
    pub fn into_factory(self) -> SourceFactory {
        self.probe.0.halted.store(false, Ordering::SeqCst);
        Arc::new(move || -> anyhow::Result<Box<dyn RowSource>> { Ok(Box::new(self.clone())) })
    }
}

impl RowSource for ScriptedSource {
    fn resume(&mut self, sink: &mut dyn RowSink) {
        self.probe.0.resumes.fetch_add(1, Ordering::SeqCst);
        if self.done || self.stall {
            return;
        }
        loop {
            if let Some(n) = self.fail_after
                && self.pushed >= n
            {
                self.done = true;
                sink.fail(PipelineError::source_failed(
                    "scripted",
                    anyhow!("scripted failure after {n} rows"),
                ));
                return;
            }
            let Some(row) = self.rows.pop_front() else {
                self.done = true;
                sink.end();
                return;
            };
            self.pushed += 1;
            self.probe.0.pushes.fetch_add(1, Ordering::SeqCst);
            if sink.push(row) == Demand::Pause && !self.ignore_pause {
                return;
            }
        }
    }

    fn halt(&mut self) {
        self.done = true;
        self.probe.0.halts.fetch_add(1, Ordering::SeqCst);
        self.probe.0.halted.store(true, Ordering::SeqCst);
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.probe.0.dropped.fetch_add(1, Ordering::SeqCst);
    }
}
