//! Fractional progress over one partition run

use std::sync::{Arc, Mutex};

/// Receives the run's completion fraction after every unit.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: f64);
}

/// Reports progress as a `debug` event.
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, progress: f64) {
        tracing::debug!(progress, "progress");
    }
}

#[derive(Debug, Default)]
struct Completed {
    units: usize,
    progress: f64,
}

/// Progress of one partition run.
///
/// `increment` is fixed when the run is partitioned. Every unit contributes
/// it exactly once, whatever its outcome; the last unit lands on exactly 1.0.
pub struct ProgressCounter {
    total: usize,
    increment: f64,
    completed: Mutex<Completed>,
    reporter: Arc<dyn ProgressReporter>,
}

impl ProgressCounter {
    pub fn new(total: usize, reporter: Arc<dyn ProgressReporter>) -> Self {
        let increment = if total == 0 { 0.0 } else { 1.0 / total as f64 };
        Self {
            total,
            increment,
            completed: Mutex::new(Completed::default()),
            reporter,
        }
    }

    pub fn increment(&self) -> f64 {
        self.increment
    }

    pub fn progress(&self) -> f64 {
        self.completed
            .lock()
            .map(|c| c.progress)
            .unwrap_or_else(|e| e.into_inner().progress)
    }

    /// Record one finished unit and report the new fraction.
    pub fn unit_finished(&self) -> f64 {
        let progress = {
            let mut completed = self.completed.lock().unwrap_or_else(|e| e.into_inner());
            completed.units += 1;
            completed.progress = if completed.units >= self.total {
                1.0
            } else {
                (completed.progress + self.increment).min(1.0)
            };
            completed.progress
        };
        self.reporter.report(progress);
        progress
    }
}
