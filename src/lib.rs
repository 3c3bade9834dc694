//! # Rowflow
//!
//! Lazy, backpressured **record pipelines** over keyed rows, plus a
//! **worker-parallel sort engine**.
//!
//! ## Key Features
//!
//! - **Immutable pipeline descriptions** - chain `filter`, `map`, `add_column`
//!   and `remap`; every chain call returns a new pipeline and the old one stays
//!   usable
//! - **Lazy execution** - nothing is opened or read until `run` or iteration
//! - **Bounded memory** - rows flow through a fixed-capacity adapter that
//!   pauses the source at a high-water mark and resumes it under a low-water
//!   mark
//! - **Fail-fast errors** - the first source, stage or sink failure stops the
//!   run and says where it happened
//! - **Parallel sort** - large row sets are sorted by worker threads and merged
//!   into exactly the result of a stable sort, with transparent fallback to a
//!   single thread when a worker fails
//! - **I/O** - CSV/TSV and JSON Lines, with gzip/zstd by file extension
//!
//! ## Quick Start
//!
//! ```
//! use rowflow::*;
//!
//! # fn main() -> Result<(), PipelineError> {
//! let p = Pipeline::from_rows(vec![row!({"a": 3}), row!({"a": 1}), row!({"a": 2})])
//!     .map(|mut r| {
//!         let a = r.get_i64("a").unwrap_or(0);
//!         r.insert("a", a * 10);
//!         r
//!     });
//!
//! let rows = p.collect()?;
//! let values: Vec<_> = rows.iter().filter_map(|r| r.get_i64("a")).collect();
//! assert_eq!(values, vec![30, 10, 20]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Pipeline
//!
//! A [`Pipeline`] describes a source and the stages rows pass through. Create
//! one with [`Pipeline::from_rows`], [`open_source`] (a file or inline text in
//! a [`Format`]) or [`Pipeline::from_source`] (any [`RowSource`]).
//!
//! ### Terminal actions
//!
//! `prepare_*` methods choose what [`Pipeline::run`] does:
//! - [`prepare_collect`](Pipeline::prepare_collect) - gather all rows (unbounded memory)
//! - [`prepare_to_sink`](Pipeline::prepare_to_sink) - encode into a file or writer
//! - [`prepare_for_each`](Pipeline::prepare_for_each) - call a function per row
//! - [`prepare_pipe_to`](Pipeline::prepare_pipe_to) - hand rows to a [`PipeSink`]
//!
//! A pipeline can also be iterated directly: `for row in &pipeline { .. }`.
//!
//! ### Sources and backpressure
//!
//! Sources push rows; consumers pull them. The [`BoundedAdapter`] in between
//! answers each push with a [`Demand`], which is how a fast source is held
//! back by a slow consumer. See [`source`] for the protocol.
//!
//! ### Sorting
//!
//! [`sort`] orders rows by a [`Comparator`]: a column with a direction, or a
//! named rule registered with [`register_rule`]. See [`sort`](mod@sort).
//!
//! ## Logging
//!
//! The crate emits [`tracing`](https://docs.rs/tracing) events (graph build,
//! run completion, stage failures, sort path and fallback). It installs no
//! subscriber.

pub mod adapter;
pub mod config;
pub mod error;
pub mod io;
pub mod node;
pub mod pipeline;
pub mod remap;
pub mod row;
pub mod runner;
pub mod sink;
pub mod sort;
pub mod source;
pub mod testing;

pub use adapter::{AdapterStats, BoundedAdapter, RowIter};
pub use config::{AdapterConfig, MergeStrategy, SortOptions};
pub use error::{PipelineError, SortError};
pub use io::{decode, encode, Format, FormatOptions};
pub use node::RowOp;
pub use pipeline::{open_source, Pipeline};
pub use remap::{remap, PathMap};
pub use row::{Row, Value};
pub use runner::RunOutput;
pub use sink::{ChannelItem, ChannelSink, PipeSink, SinkTarget, WriteOptions};
pub use sort::{register_rule, sort, sort_with_report, unregister_rule, Comparator, Direction, SortPath, SortReport};
pub use source::{source_fn, Demand, RowSink, RowSource, SourceFactory, SourceLocation};

#[doc(hidden)]
pub mod __private {
    pub use serde_json::json;
}
