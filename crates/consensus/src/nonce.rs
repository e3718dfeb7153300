//! Nonce search space: lazy ranges, per-worker partitioning and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A finite, restartable range of candidate nonces.
///
/// Cloning a range restarts the search from its current position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceRange {
    next: u64,
    end: u64,
}

impl NonceRange {
    /// Nonces in `start..end`.
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            next: start,
            end: end.max(start),
        }
    }

    pub fn start(&self) -> u64 {
        self.next
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.next >= self.end
    }
}

impl Iterator for NonceRange {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.next >= self.end {
            return None;
        }
        let nonce = self.next;
        self.next += 1;
        Some(nonce)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.end - self.next).ok();
        (remaining.unwrap_or(usize::MAX), remaining)
    }
}

/// Partition of `0..max_nonce` into fixed-size batches dealt round-robin to
/// workers: worker `w` scans batches `w`, `w + workers`, `w + 2 * workers`...
///
/// Each worker sees its batches in ascending order, so once any worker holds
/// a solution every smaller nonce belongs to a batch some worker has yet to
/// reach or has already scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceSchedule {
    max_nonce: u64,
    batch_size: u64,
    workers: u64,
}

impl NonceSchedule {
    pub fn new(max_nonce: u64, batch_size: u64, workers: usize) -> Self {
        Self {
            max_nonce,
            batch_size: batch_size.max(1),
            workers: (workers as u64).max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers as usize
    }

    /// Lazily yield the batches owned by `worker`.
    pub fn batches(&self, worker: usize) -> WorkerBatches {
        let first = (worker as u64).checked_mul(self.batch_size);
        WorkerBatches {
            next_start: first.filter(|start| *start < self.max_nonce),
            stride: self.batch_size.saturating_mul(self.workers),
            batch_size: self.batch_size,
            end: self.max_nonce,
        }
    }
}

/// Iterator over one worker's share of a [`NonceSchedule`].
#[derive(Debug, Clone)]
pub struct WorkerBatches {
    next_start: Option<u64>,
    stride: u64,
    batch_size: u64,
    end: u64,
}

impl Iterator for WorkerBatches {
    type Item = NonceRange;

    fn next(&mut self) -> Option<NonceRange> {
        let start = self.next_start?;
        let stop = start.saturating_add(self.batch_size).min(self.end);
        self.next_start = start
            .checked_add(self.stride)
            .filter(|next| *next < self.end);
        Some(NonceRange::new(start, stop))
    }
}

/// Cooperative cancellation flag shared between a sealing run and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
