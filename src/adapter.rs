//! Push-to-pull conversion with bounded memory.
//!
//! [`BoundedAdapter`] owns a [`RowSource`] and a fixed-size [`RingBuffer`]. The
//! consumer pulls with [`BoundedAdapter::next_row`]; the source pushes into
//! [`AdapterState`], which answers with backpressure:
//!
//! - once occupancy reaches the high-water mark the push is answered with
//!   [`Demand::Pause`] and the state is marked saturated;
//! - a saturated adapter resumes its source only after a pull takes occupancy
//!   below the low-water mark (hysteresis);
//! - an empty adapter with an active source always resumes it, since that is
//!   the only way the consumer can make progress.
//!
//! Occupancy never exceeds capacity. The first error observed (from the source
//! or a stage) is kept and returned by every later pull.

use crate::config::AdapterConfig;
use crate::error::PipelineError;
use crate::row::Row;
use crate::source::{Demand, RowSink, RowSource};

/// Fixed-capacity FIFO of rows.
pub struct RingBuffer {
    slots: Vec<Option<Row>>,
    read: usize,
    write: usize,
    len: usize,
}

impl RingBuffer {
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            read: 0,
            write: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Append a row, handing it back if the ring is full.
    pub fn push(&mut self, row: Row) -> Result<(), Row> {
        if self.is_full() {
            return Err(row);
        }
        self.slots[self.write] = Some(row);
        self.write = (self.write + 1) % self.slots.len();
        self.len += 1;
        Ok(())
    }

    /// Remove the oldest row.
    pub fn pop(&mut self) -> Option<Row> {
        if self.is_empty() {
            return None;
        }
        let row = self.slots[self.read].take();
        self.read = (self.read + 1) % self.slots.len();
        self.len -= 1;
        row
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.read = 0;
        self.write = 0;
        self.len = 0;
    }
}

/// Counters describing how an adapter behaved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterStats {
    pub capacity: usize,
    /// Highest occupancy ever observed.
    pub peak: usize,
    /// Rows accepted from the source.
    pub pushed: usize,
    /// Rows handed to the consumer.
    pub pulled: usize,
    /// Times the source was told to pause at the high-water mark.
    pub pauses: usize,
    /// Times a saturated adapter dropped under the low-water mark.
    pub resumes: usize,
}

/// The backpressure state machine. Receives the source's push notifications.
pub struct AdapterState {
    ring: RingBuffer,
    high_water: usize,
    low_water: usize,
    saturated: bool,
    resume_due: bool,
    ended: bool,
    closed: bool,
    error: Option<PipelineError>,
    stats: AdapterStats,
}

impl AdapterState {
    pub fn new(config: &AdapterConfig) -> Self {
        let capacity = config.capacity.max(1);
        let config = AdapterConfig { capacity, ..*config };
        Self {
            ring: RingBuffer::new(capacity),
            high_water: config.high_water_rows(),
            low_water: config.low_water_rows(),
            saturated: false,
            resume_due: false,
            ended: false,
            closed: false,
            error: None,
            stats: AdapterStats {
                capacity,
                ..AdapterStats::default()
            },
        }
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    pub fn stats(&self) -> AdapterStats {
        self.stats
    }

    /// Take the oldest row. Clears saturation once occupancy falls under the
    /// low-water mark.
    pub fn pop(&mut self) -> Option<Row> {
        let row = self.ring.pop()?;
        self.stats.pulled += 1;
        if self.saturated && self.ring.len() < self.low_water {
            self.saturated = false;
            self.resume_due = true;
            self.stats.resumes += 1;
            tracing::trace!(len = self.ring.len(), low_water = self.low_water, "adapter resumed");
        }
        Some(row)
    }

    /// Whether a pop just crossed the low-water mark. Reading clears it.
    pub fn take_resume_signal(&mut self) -> bool {
        std::mem::take(&mut self.resume_due)
    }

    fn unsaturate(&mut self) {
        self.saturated = false;
    }

    fn close(&mut self) {
        self.closed = true;
        self.ring.clear();
    }

    fn progress_marker(&self) -> (usize, bool, bool) {
        (self.stats.pushed, self.ended, self.error.is_some())
    }
}

impl RowSink for AdapterState {
    fn push(&mut self, row: Row) -> Demand {
        if self.closed || self.ended || self.error.is_some() {
            return Demand::Pause;
        }
        if self.ring.push(row).is_err() {
            self.fail(PipelineError::Overrun {
                capacity: self.ring.capacity(),
            });
            return Demand::Pause;
        }
        self.stats.pushed += 1;
        self.stats.peak = self.stats.peak.max(self.ring.len());
        if self.ring.len() >= self.high_water {
            if !self.saturated {
                self.stats.pauses += 1;
                tracing::trace!(len = self.ring.len(), high_water = self.high_water, "adapter paused source");
            }
            self.saturated = true;
            return Demand::Pause;
        }
        Demand::More
    }

    fn end(&mut self) {
        self.ended = true;
    }

    fn fail(&mut self, err: PipelineError) {
        if self.error.is_none() && !self.closed {
            self.error = Some(err);
        }
    }
}

/// Pull-style view over a push-style source.
pub struct BoundedAdapter {
    origin: String,
    source: Option<Box<dyn RowSource>>,
    state: AdapterState,
}

impl BoundedAdapter {
    pub fn new(origin: impl Into<String>, source: Box<dyn RowSource>, config: &AdapterConfig) -> Self {
        Self {
            origin: origin.into(),
            source: Some(source),
            state: AdapterState::new(config),
        }
    }

    /// An adapter that fails every pull with `err` and owns no source.
    pub(crate) fn failed(origin: impl Into<String>, err: PipelineError, config: &AdapterConfig) -> Self {
        let mut state = AdapterState::new(config);
        state.fail(err);
        Self {
            origin: origin.into(),
            source: None,
            state,
        }
    }

    /// Next row, `None` when the source is exhausted.
    ///
    /// After a failure every call returns the same error.
    pub fn next_row(&mut self) -> Option<Result<Row, PipelineError>> {
        loop {
            if let Some(err) = self.state.error() {
                let err = err.clone();
                self.release();
                return Some(Err(err));
            }
            if let Some(row) = self.state.pop() {
                if self.state.take_resume_signal() && !self.state.is_ended() {
                    self.pump();
                }
                return Some(Ok(row));
            }
            if self.state.is_ended() {
                self.release();
                return None;
            }
            if self.source.is_none() {
                return Some(Err(PipelineError::Cancelled {
                    origin: self.origin.clone(),
                }));
            }
            let before = self.state.progress_marker();
            self.pump();
            if self.state.progress_marker() == before {
                self.state.fail(PipelineError::Stalled {
                    origin: self.origin.clone(),
                });
            }
        }
    }

    fn pump(&mut self) {
        self.state.unsaturate();
        if let Some(src) = self.source.as_mut() {
            src.resume(&mut self.state);
        }
    }

    /// Halt and drop the source and discard buffered rows. Idempotent.
    pub(crate) fn release(&mut self) {
        if let Some(mut src) = self.source.take() {
            src.halt();
            tracing::trace!(origin = %self.origin, "adapter released source");
        }
        self.state.ring.clear();
    }

    /// Stop listening for good: release the source and ignore late notifications.
    ///
    /// Pulling from a closed adapter that had not reached the end of its source
    /// returns [`PipelineError::Cancelled`].
    pub fn close(&mut self) {
        self.release();
        self.state.close();
    }

    pub fn stats(&self) -> AdapterStats {
        self.state.stats()
    }

    pub fn state(&self) -> &AdapterState {
        &self.state
    }
}

impl Drop for BoundedAdapter {
    fn drop(&mut self) {
        self.close();
    }
}

/// Iterator over a pipeline's output; see [`Pipeline::iter`](crate::Pipeline::iter).
///
/// Yields each row, or one error after which it is exhausted. Dropping it
/// before the end releases the source.
pub struct RowIter {
    adapter: BoundedAdapter,
    done: bool,
}

impl RowIter {
    pub(crate) fn new(adapter: BoundedAdapter) -> Self {
        Self {
            adapter,
            done: false,
        }
    }

    pub fn stats(&self) -> AdapterStats {
        self.adapter.stats()
    }

    /// Abandon iteration now instead of at drop.
    pub fn cancel(&mut self) {
        self.done = true;
        self.adapter.close();
    }
}

impl Iterator for RowIter {
    type Item = Result<Row, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.adapter.next_row();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

impl std::iter::FusedIterator for RowIter {}
