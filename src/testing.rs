//! Testing utilities for rowflow pipelines and sorts.
//!
//! - **Assertions**: compare rows with readable failure messages
//! - **Fixtures**: deterministic row sets for ordering and volume tests
//! - **Scripted sources**: a push source whose behaviour is fully scripted and
//!   observable, for exercising backpressure and error paths
//!
//! # Quick Start
//!
//! ```
//! use rowflow::*;
//! use rowflow::testing::*;
//!
//! let rows = shuffled_rows(500, 7);
//! let sorted = sort(rows.clone(), &Comparator::asc("k"), &SortOptions::default())?;
//! assert_sorted_by(&sorted, &Comparator::asc("k"));
//! assert_permutation_of(&sorted, &rows);
//! # Ok::<(), SortError>(())
//! ```
//!
//! Scripted sources report what the pipeline did to them through a shared
//! [`SourceProbe`]:
//!
//! ```
//! use rowflow::*;
//! use rowflow::testing::*;
//!
//! let script = ScriptedSource::new(rows_with_key(100, "id"));
//! let probe = script.probe();
//! let p = Pipeline::from_source("scripted", script.into_factory()).with_capacity(10);
//!
//! let first_two: Vec<_> = p.iter().take(2).collect();
//! assert_eq!(first_two.len(), 2);
//! assert!(probe.halted());
//! assert!(probe.pushes() <= 2 + 10);
//! ```

pub mod assertions;
pub mod fixtures;
pub mod scripted;

pub use assertions::*;
pub use fixtures::*;
pub use scripted::*;
