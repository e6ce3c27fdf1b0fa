//! Progress reporting for long-running volume operations.
//!
//! An operation announces its total once via [`ProgressReporter::set_bound`]
//! and then calls [`advance`](ProgressReporter::advance) as units complete.
//! Units are bytes for single-file transfers and nodes for directory trees
//! (the tree's root counts as one node).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Sink for bounded progress updates.
pub trait ProgressReporter: Send + Sync {
    fn set_bound(&self, max_units: u64);
    fn advance(&self, units: u64);
}

impl<T: ProgressReporter + ?Sized> ProgressReporter for &T {
    fn set_bound(&self, max_units: u64) {
        (**self).set_bound(max_units);
    }

    fn advance(&self, units: u64) {
        (**self).advance(units);
    }
}

impl<T: ProgressReporter + ?Sized> ProgressReporter for Arc<T> {
    fn set_bound(&self, max_units: u64) {
        (**self).set_bound(max_units);
    }

    fn advance(&self, units: u64) {
        (**self).advance(units);
    }
}

/// Discards all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn set_bound(&self, _max_units: u64) {}
    fn advance(&self, _units: u64) {}
}

/// Lock-free counter, readable from another thread while the operation runs.
#[derive(Debug, Default)]
pub struct ProgressCounter {
    bound: AtomicU64,
    completed: AtomicU64,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bound(&self) -> u64 {
        self.bound.load(Ordering::Acquire)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Completed fraction in `0.0..=1.0`; 0 while no bound is set.
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        let bound = self.bound();
        if bound == 0 {
            return 0.0;
        }
        (self.completed() as f64 / bound as f64).min(1.0)
    }
}

impl ProgressReporter for ProgressCounter {
    fn set_bound(&self, max_units: u64) {
        self.bound.store(max_units, Ordering::Release);
        self.completed.store(0, Ordering::Release);
    }

    fn advance(&self, units: u64) {
        self.completed.fetch_add(units, Ordering::AcqRel);
    }
}

/// Emits progress as tracing events under a fixed label.
#[derive(Debug)]
pub struct TracingProgress {
    label: String,
    counter: ProgressCounter,
}

impl TracingProgress {
    pub fn new(label: impl Into<String>) -> Self {
        TracingProgress {
            label: label.into(),
            counter: ProgressCounter::new(),
        }
    }
}

impl ProgressReporter for TracingProgress {
    fn set_bound(&self, max_units: u64) {
        self.counter.set_bound(max_units);
        debug!(label = %self.label, bound = max_units, "Progress bound set");
    }

    fn advance(&self, units: u64) {
        self.counter.advance(units);
        trace!(
            label = %self.label,
            completed = self.counter.completed(),
            bound = self.counter.bound(),
            "Progress"
        );
    }
}
