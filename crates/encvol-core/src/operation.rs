//! Lifecycle tracking for a single long-running operation.
//!
//! An [`OperationTracker`] moves through
//! `Idle -> Running -> Succeeded | Failed` exactly once. It doubles as a
//! [`ProgressReporter`], so the engine can report into it directly while an
//! observer polls [`OperationTracker::status`] from another thread.

use parking_lot::Mutex;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::VolumeError;
use crate::progress::ProgressReporter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Idle,
    Running { completed: u64, bound: u64 },
    Succeeded,
    Failed { detail: String },
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Succeeded | OperationStatus::Failed { .. })
    }

    fn name(&self) -> &'static str {
        match self {
            OperationStatus::Idle => "idle",
            OperationStatus::Running { .. } => "running",
            OperationStatus::Succeeded => "succeeded",
            OperationStatus::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Running { completed, bound } => {
                write!(f, "running ({completed}/{bound})")
            }
            OperationStatus::Failed { detail } => write!(f, "failed: {detail}"),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Operation '{label}' cannot {action} while {state}")]
pub struct TransitionError {
    pub label: String,
    pub action: &'static str,
    pub state: &'static str,
}

#[derive(Debug)]
pub struct OperationTracker {
    label: String,
    status: Mutex<OperationStatus>,
}

impl OperationTracker {
    pub fn new(label: impl Into<String>) -> Self {
        OperationTracker {
            label: label.into(),
            status: Mutex::new(OperationStatus::Idle),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn status(&self) -> OperationStatus {
        self.status.lock().clone()
    }

    /// Idle -> Running.
    pub fn begin(&self) -> Result<(), TransitionError> {
        let mut status = self.status.lock();
        if *status != OperationStatus::Idle {
            return Err(self.transition_error("begin", &status));
        }
        *status = OperationStatus::Running {
            completed: 0,
            bound: 0,
        };
        debug!(label = %self.label, "Operation started");
        Ok(())
    }

    /// Running -> Succeeded or Failed, depending on `outcome`.
    pub fn finish<T>(&self, outcome: &Result<T, VolumeError>) -> Result<(), TransitionError> {
        let mut status = self.status.lock();
        if !matches!(*status, OperationStatus::Running { .. }) {
            return Err(self.transition_error("finish", &status));
        }
        *status = match outcome {
            Ok(_) => {
                info!(label = %self.label, "Operation succeeded");
                OperationStatus::Succeeded
            }
            Err(e) => {
                warn!(label = %self.label, error = %e, "Operation failed");
                OperationStatus::Failed {
                    detail: e.to_string(),
                }
            }
        };
        Ok(())
    }

    /// Begin, run `work` with `self` as its progress sink, then finish.
    pub fn run<T>(
        &self,
        work: impl FnOnce(&dyn ProgressReporter) -> Result<T, VolumeError>,
    ) -> Result<T, VolumeError> {
        self.begin()
            .map_err(|e| VolumeError::failed_plain(e.to_string()))?;
        let outcome = work(self);
        // Only this call moved us to Running, so finishing cannot fail.
        let _ = self.finish(&outcome);
        outcome
    }

    fn transition_error(&self, action: &'static str, status: &OperationStatus) -> TransitionError {
        TransitionError {
            label: self.label.clone(),
            action,
            state: status.name(),
        }
    }
}

impl ProgressReporter for OperationTracker {
    fn set_bound(&self, max_units: u64) {
        if let OperationStatus::Running { completed, bound } = &mut *self.status.lock() {
            *bound = max_units;
            *completed = 0;
        }
    }

    fn advance(&self, units: u64) {
        if let OperationStatus::Running { completed, .. } = &mut *self.status.lock() {
            *completed = completed.saturating_add(units);
        }
    }
}
