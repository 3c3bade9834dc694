//! Tunables for the bounded adapter and the sort engine.
//!
//! Both config types are plain serde structs with sensible defaults. They can
//! be overridden from the environment:
//!
//! - `ROWFLOW_ADAPTER_CAPACITY`: ring buffer capacity in rows
//! - `ROWFLOW_ADAPTER_HIGH_WATER`: pause ratio in `(0, 1]`
//! - `ROWFLOW_ADAPTER_LOW_WATER`: resume ratio in `(0, high_water)`
//! - `ROWFLOW_SORT_WORKER_THRESHOLD`: minimum record count for parallel sorting
//! - `ROWFLOW_SORT_MAX_WORKERS`: upper bound on sort workers
//!
//! Unparseable values are ignored and the default is kept.

use crate::error::{PipelineError, SortError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded adapter sizing and hysteresis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Maximum number of buffered rows.
    pub capacity: usize,
    /// Occupancy ratio at which the upstream source is paused.
    pub high_water: f64,
    /// Occupancy ratio under which a paused source is resumed.
    pub low_water: f64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            high_water: 0.8,
            low_water: 0.5,
        }
    }
}

impl AdapterConfig {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_watermarks(mut self, low_water: f64, high_water: f64) -> Self {
        self.low_water = low_water;
        self.high_water = high_water;
        self
    }

    /// # Errors
    /// Returns [`PipelineError::Config`] unless `capacity >= 1` and
    /// `0 < low_water < high_water <= 1`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.capacity == 0 {
            return Err(PipelineError::Config("adapter capacity must be at least 1".into()));
        }
        if !(self.high_water > 0.0 && self.high_water <= 1.0) {
            return Err(PipelineError::Config(format!(
                "high_water must be in (0, 1], got {}",
                self.high_water
            )));
        }
        if !(self.low_water > 0.0 && self.low_water < self.high_water) {
            return Err(PipelineError::Config(format!(
                "low_water must be in (0, high_water), got {} with high_water {}",
                self.low_water, self.high_water
            )));
        }
        Ok(())
    }

    /// Occupancy at which the source is paused, in `[1, capacity]`.
    pub fn high_water_rows(&self) -> usize {
        ((self.capacity as f64 * self.high_water).ceil() as usize).clamp(1, self.capacity)
    }

    /// Occupancy under which a paused source is resumed.
    pub fn low_water_rows(&self) -> usize {
        ((self.capacity as f64 * self.low_water).floor() as usize).min(self.high_water_rows())
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(v) = parse(&lookup, "ROWFLOW_ADAPTER_CAPACITY") {
            cfg.capacity = v;
        }
        if let Some(v) = parse(&lookup, "ROWFLOW_ADAPTER_HIGH_WATER") {
            cfg.high_water = v;
        }
        if let Some(v) = parse(&lookup, "ROWFLOW_ADAPTER_LOW_WATER") {
            cfg.low_water = v;
        }
        cfg
    }
}

/// How sorted chunks are recombined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Merge chunk 1 with 2, the result with 3, and so on. `O(n * k)`.
    #[default]
    Pairwise,
    /// Min-heap k-way merge. `O(n * log k)`; worth it for large worker counts.
    KWay,
}

/// Options for [`sort`](crate::sort::sort).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortOptions {
    /// Inputs shorter than this are sorted in the calling thread.
    /// `usize::MAX` disables workers entirely.
    pub worker_threshold: usize,
    /// Upper bound on workers.
    pub max_workers: usize,
    /// Execution units to assume; `None` asks the OS.
    pub available_units: Option<usize>,
    pub merge: MergeStrategy,
    /// Give up on the parallel attempt if any worker is silent this long.
    /// `None` waits indefinitely.
    pub worker_timeout: Option<Duration>,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            worker_threshold: 10_000,
            max_workers: num_cpus::get().max(1),
            available_units: None,
            merge: MergeStrategy::Pairwise,
            worker_timeout: None,
        }
    }
}

impl SortOptions {
    #[must_use]
    pub fn with_worker_threshold(mut self, threshold: usize) -> Self {
        self.worker_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    #[must_use]
    pub fn with_available_units(mut self, units: usize) -> Self {
        self.available_units = Some(units);
        self
    }

    #[must_use]
    pub fn with_merge(mut self, merge: MergeStrategy) -> Self {
        self.merge = merge;
        self
    }

    #[must_use]
    pub fn with_worker_timeout(mut self, timeout: Duration) -> Self {
        self.worker_timeout = Some(timeout);
        self
    }

    /// Options that never leave the calling thread.
    #[must_use]
    pub fn sequential() -> Self {
        Self::default().with_worker_threshold(usize::MAX)
    }

    /// # Errors
    /// Returns [`SortError::Config`] when `max_workers` or `available_units` is zero.
    pub fn validate(&self) -> Result<(), SortError> {
        if self.max_workers == 0 {
            return Err(SortError::Config("max_workers must be at least 1".into()));
        }
        if self.available_units == Some(0) {
            return Err(SortError::Config("available_units must be at least 1".into()));
        }
        Ok(())
    }

    pub(crate) fn units(&self) -> usize {
        self.available_units.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(v) = parse(&lookup, "ROWFLOW_SORT_WORKER_THRESHOLD") {
            cfg.worker_threshold = v;
        }
        if let Some(v) = parse(&lookup, "ROWFLOW_SORT_MAX_WORKERS") {
            cfg.max_workers = v;
        }
        cfg
    }
}

fn parse<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}
