//! Reconciler metrics.

use metrics::{Counter, Histogram};
use metrics_derive::Metrics;
use std::time::Duration;

/// Metrics for a [`Reconciler`](crate::reconcile::Reconciler) and its
/// [`Executor`](crate::reconcile::Executor).
#[derive(Metrics, Clone)]
#[metrics(scope = "reconciler")]
pub struct ReconcilerMetrics {
    /// Number of endpoint state reads.
    pub reads: Counter,
    /// Number of endpoint state reads that failed.
    pub read_failures: Counter,
    /// Number of submissions sent to a chain, including retries.
    pub steps_submitted: Counter,
    /// Number of steps that succeeded.
    pub steps_succeeded: Counter,
    /// Number of steps that failed.
    pub steps_failed: Counter,
    /// Number of steps that were skipped.
    pub steps_skipped: Counter,
    /// Number of retried submissions.
    pub retries: Counter,
    /// Time it takes for a submission to resolve, in milliseconds.
    pub submission_latency: Histogram,
}

impl ReconcilerMetrics {
    /// Records how long a submission took to resolve.
    pub fn record_submission(&self, elapsed: Duration) {
        self.steps_submitted.increment(1);
        self.submission_latency.record(elapsed.as_millis() as f64);
    }
}
