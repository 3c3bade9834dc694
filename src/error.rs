//! Error types for pipeline runs and sorts.
//!
//! User callbacks and the I/O leaf report failures as [`anyhow::Error`]; those
//! are wrapped here at the boundary where they surfaced (source, stage, sink,
//! callback). Causes are reference-counted so that the adapter can hand the
//! same first error to every later pull.

use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// A cloneable, thread-safe error cause.
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// Wrap any error into a [`SharedError`], keeping its source chain.
pub fn shared(err: impl Into<anyhow::Error>) -> SharedError {
    let boxed: Box<dyn StdError + Send + Sync + 'static> = err.into().into();
    Arc::from(boxed)
}

/// Errors surfaced by [`Pipeline::run`](crate::Pipeline::run) and pipeline iteration.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("source `{origin}` failed: {cause}")]
    Source {
        origin: String,
        #[source]
        cause: SharedError,
    },

    #[error("stage #{index} ({kind}) failed: {cause}")]
    Stage {
        index: usize,
        kind: &'static str,
        #[source]
        cause: SharedError,
    },

    #[error("per-row callback failed on row #{row}: {cause}")]
    Callback {
        row: usize,
        #[source]
        cause: SharedError,
    },

    #[error("sink `{sink}` failed: {cause}")]
    Sink {
        sink: String,
        #[source]
        cause: SharedError,
    },

    /// A source kept pushing into a full adapter after being told to pause.
    #[error("source ignored backpressure and overran the adapter capacity of {capacity} rows")]
    Overrun { capacity: usize },

    /// A source returned from `resume` without producing, ending or failing.
    #[error("source `{origin}` yielded without progress")]
    Stalled { origin: String },

    /// The adapter was closed before its source ended.
    #[error("source `{origin}` was closed before it ended")]
    Cancelled { origin: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Sorting collected rows failed (see [`Pipeline::collect_sorted`](crate::Pipeline::collect_sorted)).
    #[error(transparent)]
    Sort(#[from] SortError),
}

impl PipelineError {
    pub(crate) fn source_failed(origin: impl Into<String>, err: impl Into<anyhow::Error>) -> Self {
        Self::Source {
            origin: origin.into(),
            cause: shared(err),
        }
    }

    pub(crate) fn stage_failed(index: usize, kind: &'static str, err: impl Into<anyhow::Error>) -> Self {
        Self::Stage {
            index,
            kind,
            cause: shared(err),
        }
    }

    pub(crate) fn sink_failed(sink: impl Into<String>, err: impl Into<anyhow::Error>) -> Self {
        Self::Sink {
            sink: sink.into(),
            cause: shared(err),
        }
    }

    /// Stage index for stage failures, `None` otherwise.
    pub fn stage_index(&self) -> Option<usize> {
        match self {
            Self::Stage { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Errors surfaced by [`sort`](crate::sort::sort).
///
/// Worker failures never appear here: they are absorbed by the single-threaded
/// fallback. Only a failure of that fallback reaches the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SortError {
    #[error("no comparison rule registered under `{0}`")]
    UnknownRule(String),

    #[error("comparator panicked: {0}")]
    ComparatorPanicked(String),

    #[error("invalid sort options: {0}")]
    Config(String),
}
