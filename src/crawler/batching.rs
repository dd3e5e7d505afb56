//! Batch scheduling over numeric ranges
//!
//! This module turns a numeric range and a batch size into strictly
//! sequential batches of concurrently-run units of work:
//! - `CrawlRange` validates the range and clamps the batch size
//! - `BatchRunner` drives a unit-of-work factory over the range, one batch
//!   at a time, joining each batch's futures concurrently
//!
//! Within a batch the concurrency equals the batch size; across batches
//! nothing overlaps. Results are gathered in input order regardless of
//! completion order.

use crate::{AutolotError, Result};
use futures::future::join_all;
use std::future::Future;

/// A validated half-open range `[from, to)` processed in fixed-size batches
///
/// Invariants: `to > from`, and the effective batch size never exceeds the
/// range width (it is clamped at construction, which is not an error).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlRange {
    from: usize,
    to: usize,
    batch_size: usize,
}

impl CrawlRange {
    /// Validates the range and clamps the batch size to its width
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlRange)` - Valid range, batch size clamped to `[1, to - from]`
    /// * `Err(AutolotError::InvalidRange)` - `to <= from`
    pub fn new(from: usize, to: usize, batch_size: usize) -> Result<Self> {
        if to <= from {
            return Err(AutolotError::InvalidRange { from, to });
        }

        Ok(Self {
            from,
            to,
            batch_size: batch_size.clamp(1, to - from),
        })
    }

    pub fn from(&self) -> usize {
        self.from
    }

    pub fn to(&self) -> usize {
        self.to
    }

    /// Effective (clamped) batch size
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Total number of units in the range
    pub fn len(&self) -> usize {
        self.to - self.from
    }

    /// `[start, end)` bounds of every batch, in execution order
    pub fn bounds(self) -> impl Iterator<Item = (usize, usize)> {
        let Self {
            from,
            to,
            batch_size,
        } = self;
        (from..to)
            .step_by(batch_size)
            .map(move |start| (start, (start + batch_size).min(to)))
    }
}

/// Drives a unit-of-work factory over a [`CrawlRange`], batch by batch
///
/// The factory receives `[start, end)` bounds and returns one future per unit
/// in that sub-range. `next_batch` runs those futures concurrently and yields
/// their results in input order; batches are produced strictly sequentially
/// by repeated calls. The sequence is finite and consumed exactly once.
pub struct BatchRunner<F> {
    range: CrawlRange,
    next_start: usize,
    factory: F,
}

impl<F, Fut, T> BatchRunner<F>
where
    F: FnMut(usize, usize) -> Vec<Fut>,
    Fut: Future<Output = T>,
{
    pub fn new(range: CrawlRange, factory: F) -> Self {
        Self {
            range,
            next_start: range.from(),
            factory,
        }
    }

    /// Runs the next batch to completion
    ///
    /// # Returns
    ///
    /// * `Some(results)` - One result per unit, ordered like the factory input
    /// * `None` - The range is fully consumed
    pub async fn next_batch(&mut self) -> Option<Vec<T>> {
        if self.next_start >= self.range.to() {
            return None;
        }

        let start = self.next_start;
        let end = (start + self.range.batch_size()).min(self.range.to());
        self.next_start = end;

        let units = (self.factory)(start, end);
        Some(join_all(units).await)
    }
}
