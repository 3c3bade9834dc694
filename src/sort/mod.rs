//! Concurrent sort engine.
//!
//! [`sort`] orders a set of rows by a [`Comparator`]. Small inputs are sorted
//! in the calling thread. Larger ones are split into contiguous chunks, sorted
//! by worker threads and merged back; the result is identical to a stable
//! single-threaded sort.
//!
//! Worker failures (a panic, an unknown rule in the worker, a timeout) are
//! never reported to the caller. The parallel attempt is discarded and the
//! original rows are sorted sequentially instead; only a failure of that
//! fallback surfaces as a [`SortError`]. [`sort_with_report`] tells which path
//! was taken.
//!
//! # Example
//! ```
//! use rowflow::sort::{sort, Comparator};
//! use rowflow::{row, SortOptions};
//!
//! let rows = vec![row!({"a": 3}), row!({"a": 1}), row!({"a": 2})];
//! let sorted = sort(rows, &Comparator::desc("a"), &SortOptions::default())?;
//! let keys: Vec<_> = sorted.iter().filter_map(|r| r.get_i64("a")).collect();
//! assert_eq!(keys, vec![3, 2, 1]);
//! # Ok::<(), rowflow::SortError>(())
//! ```

mod chunk;
mod comparator;
mod merge;
mod worker;

pub use comparator::{compare_values, register_rule, unregister_rule, BoundComparator, Comparator, Direction, RuleFn};
pub use worker::WORKER_THREAD_PREFIX;

use crate::config::SortOptions;
use crate::error::SortError;
use crate::row::Row;
use tracing::{debug, warn};

/// How a sort was carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortPath {
    Sequential,
    Parallel { workers: usize },
    /// The parallel attempt failed and the rows were sorted sequentially.
    Fallback { workers: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortReport {
    pub len: usize,
    pub path: SortPath,
}

impl SortReport {
    pub fn fell_back(&self) -> bool {
        matches!(self.path, SortPath::Fallback { .. })
    }
}

/// Sort `rows` by `comparator`.
///
/// # Errors
/// [`SortError::Config`] for invalid options; otherwise only when the
/// single-threaded path fails ([`SortError::UnknownRule`],
/// [`SortError::ComparatorPanicked`]).
pub fn sort(rows: Vec<Row>, comparator: &Comparator, options: &SortOptions) -> Result<Vec<Row>, SortError> {
    sort_with_report(rows, comparator, options).map(|(rows, _)| rows)
}

/// [`sort`], also returning how the sort was carried out.
///
/// # Errors
/// See [`sort`].
pub fn sort_with_report(
    rows: Vec<Row>,
    comparator: &Comparator,
    options: &SortOptions,
) -> Result<(Vec<Row>, SortReport), SortError> {
    options.validate()?;
    let len = rows.len();
    let workers = options.max_workers.min(options.units()).min(len);

    if len < options.worker_threshold || workers <= 1 {
        debug!(len, "sorting sequentially");
        let sorted = worker::sort_sequential(rows, comparator)?;
        return Ok((sorted, SortReport { len, path: SortPath::Sequential }));
    }

    debug!(len, workers, "sorting in parallel");
    let chunks = chunk::clone_chunks(&rows, workers);
    match worker::sort_parallel(chunks, comparator, options) {
        Ok(sorted) => Ok((sorted, SortReport { len, path: SortPath::Parallel { workers } })),
        Err(failure) => {
            warn!(len, workers, error = %failure, "parallel sort failed, falling back to sequential");
            let sorted = worker::sort_sequential(rows, comparator)?;
            Ok((
                sorted,
                SortReport {
                    len,
                    path: SortPath::Fallback {
                        workers,
                        reason: failure.to_string(),
                    },
                },
            ))
        }
    }
}
