//! Parallel chunk sorting on a dedicated rayon pool.
//!
//! Each worker receives a private copy of its chunk and the comparator as a
//! serialized descriptor, re-binds the comparator in its own thread and sorts.
//! Results come back over an `mpsc` channel tagged with the chunk index. Any
//! failure is reported as a [`WorkerFailure`] and never crosses into the
//! caller as a panic.

use crate::config::SortOptions;
use crate::error::SortError;
use crate::row::Row;
use crate::sort::comparator::Comparator;
use crate::sort::merge::merge_chunks;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use thiserror::Error;

/// Prefix of sort worker thread names (`rowflow-sort-0`, `rowflow-sort-1`, ...).
pub const WORKER_THREAD_PREFIX: &str = "rowflow-sort";

#[derive(Debug, Error)]
pub(crate) enum WorkerFailure {
    #[error("could not start worker pool: {0}")]
    Pool(String),

    #[error("could not serialize comparator: {0}")]
    Descriptor(String),

    #[error("worker for chunk #{chunk} failed: {reason}")]
    Chunk { chunk: usize, reason: String },

    #[error("no worker reported within {0:?}")]
    Timeout(Duration),

    #[error("worker channel disconnected before all chunks were sorted")]
    Disconnected,

    #[error("merge panicked: {0}")]
    Merge(String),
}

type ChunkResult = (usize, Result<Vec<Row>, String>);

/// Sort `chunks` in parallel, then merge them. `chunks` must be contiguous
/// slices of the input, in order.
pub(crate) fn sort_parallel(
    chunks: Vec<Vec<Row>>,
    comparator: &Comparator,
    options: &SortOptions,
) -> Result<Vec<Row>, WorkerFailure> {
    let workers = chunks.len();
    let descriptor = comparator
        .to_descriptor()
        .map_err(|e| WorkerFailure::Descriptor(e.to_string()))?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("{WORKER_THREAD_PREFIX}-{i}"))
        .build()
        .map_err(|e| WorkerFailure::Pool(e.to_string()))?;

    let (tx, rx) = mpsc::channel::<ChunkResult>();
    for (chunk, rows) in chunks.into_iter().enumerate() {
        let tx = tx.clone();
        let descriptor = descriptor.clone();
        pool.spawn(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| sort_chunk(&descriptor, rows)))
                .unwrap_or_else(|panic| Err(format!("panicked: {}", panic_message(panic.as_ref()))));
            // The coordinator may have given up already.
            let _ = tx.send((chunk, outcome));
        });
    }
    drop(tx);

    let mut sorted: Vec<Option<Vec<Row>>> = (0..workers).map(|_| None).collect();
    for _ in 0..workers {
        let (chunk, outcome) = match options.worker_timeout {
            Some(t) => rx.recv_timeout(t).map_err(|e| match e {
                RecvTimeoutError::Timeout => WorkerFailure::Timeout(t),
                RecvTimeoutError::Disconnected => WorkerFailure::Disconnected,
            })?,
            None => rx.recv().map_err(|_| WorkerFailure::Disconnected)?,
        };
        let rows = outcome.map_err(|reason| WorkerFailure::Chunk { chunk, reason })?;
        if let Some(slot) = sorted.get_mut(chunk) {
            *slot = Some(rows);
        }
    }
    let chunks: Vec<Vec<Row>> = sorted.into_iter().collect::<Option<_>>().ok_or(WorkerFailure::Disconnected)?;

    // Rules run again here, in the caller's thread.
    let bound = comparator
        .bind()
        .map_err(|e| WorkerFailure::Merge(e.to_string()))?;
    catch_unwind(AssertUnwindSafe(|| merge_chunks(chunks, &bound, options.merge)))
        .map_err(|panic| WorkerFailure::Merge(panic_message(panic.as_ref())))
}

fn sort_chunk(descriptor: &str, mut rows: Vec<Row>) -> Result<Vec<Row>, String> {
    let comparator = Comparator::from_descriptor(descriptor).map_err(|e| format!("bad comparator descriptor: {e}"))?;
    let bound = comparator.bind().map_err(|e| e.to_string())?;
    rows.sort_by(|a, b| bound.compare(a, b));
    Ok(rows)
}

/// Stable single-threaded sort in the calling thread.
pub(crate) fn sort_sequential(mut rows: Vec<Row>, comparator: &Comparator) -> Result<Vec<Row>, SortError> {
    let bound = comparator.bind()?;
    catch_unwind(AssertUnwindSafe(move || {
        rows.sort_by(|a, b| bound.compare(a, b));
        rows
    }))
    .map_err(|panic| SortError::ComparatorPanicked(panic_message(panic.as_ref())))
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
