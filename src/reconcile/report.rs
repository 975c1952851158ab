//! Summary of a reconciliation run.

use super::{PlanStep, StepOutcome, StepResult};
use crate::{chains::TransactionRef, types::ConnectionId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReconciliationStatus {
    /// Every step succeeded, or nothing had to be done.
    Converged,
    /// Some work is left, but the run made progress or was held up by unreadable state.
    PartiallyConverged,
    /// Steps were attempted and none of them succeeded.
    Failed,
}

impl ReconciliationStatus {
    /// Derives the status from the step results of a run.
    pub fn from_results(results: &[StepResult]) -> Self {
        if results.iter().all(|result| result.outcome.is_success()) {
            return Self::Converged;
        }
        if results.iter().any(|result| result.outcome.is_success()) {
            return Self::PartiallyConverged;
        }
        if results.iter().any(|result| result.attempts > 0) {
            return Self::Failed;
        }
        // Nothing was attempted, e.g. everything was blocked on unreadable state.
        Self::PartiallyConverged
    }
}

/// Serializable view of a [`StepResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepSummary {
    /// The connection the step belongs to.
    pub connection: ConnectionId,
    /// Step kind.
    pub kind: &'static str,
    /// Outcome kind.
    pub outcome: &'static str,
    /// Failure or skip cause, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// The included transaction, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionRef>,
    /// Number of submissions made.
    pub attempts: u32,
}

impl From<&StepResult> for StepSummary {
    fn from(result: &StepResult) -> Self {
        let cause = match &result.outcome {
            StepOutcome::Success => None,
            StepOutcome::Failed(err) => Some(err.to_string()),
            StepOutcome::Skipped(reason) => Some(reason.to_string()),
        };
        Self {
            connection: result.step.connection(),
            kind: result.step.kind(),
            outcome: result.outcome.kind(),
            cause,
            transaction: result.transaction.clone(),
            attempts: result.attempts,
        }
    }
}

/// The only output of a reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    /// Overall status.
    pub status: ReconciliationStatus,
    /// One summary per plan step, in plan order.
    pub steps: Vec<StepSummary>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Full step results.
    #[serde(skip)]
    pub results: Vec<StepResult>,
}

impl ReconciliationReport {
    /// Builds a report from the step results of a run.
    pub fn new(results: Vec<StepResult>, started_at: DateTime<Utc>) -> Self {
        Self {
            status: ReconciliationStatus::from_results(&results),
            steps: results.iter().map(StepSummary::from).collect(),
            started_at,
            finished_at: Utc::now(),
            results,
        }
    }

    /// Whether every connection is converged.
    pub fn is_converged(&self) -> bool {
        self.status == ReconciliationStatus::Converged
    }

    /// Steps that did not succeed: blocked, skipped or failed.
    pub fn issues(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter().filter(|result| !result.outcome.is_success())
    }

    /// Steps that failed after being submitted.
    pub fn failed(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter().filter(|result| result.outcome.is_failed())
    }

    /// Steps that were not submitted.
    pub fn skipped(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter().filter(|result| result.outcome.is_skipped())
    }

    /// Steps that were blocked on unreadable state.
    pub fn blocked(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter().filter(|result| result.step.is_blocked())
    }
}

impl fmt::Display for ReconciliationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let succeeded = self.results.iter().filter(|result| result.outcome.is_success()).count();
        writeln!(
            f,
            "status: {} ({succeeded}/{} steps succeeded, {:.1}s)",
            self.status,
            self.results.len(),
            (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
        )?;

        for result in &self.results {
            match (&result.outcome, &result.transaction) {
                (StepOutcome::Success, Some(transaction)) => {
                    writeln!(f, "  ok      {} [{transaction}]", result.step)?
                }
                (StepOutcome::Success, None) => writeln!(f, "  ok      {}", result.step)?,
                (StepOutcome::Failed(err), _) => writeln!(
                    f,
                    "  failed  {} after {} attempt(s): {err}",
                    result.step, result.attempts
                )?,
                (StepOutcome::Skipped(reason), _) => match &result.step {
                    PlanStep::Blocked { connection, .. } => {
                        writeln!(f, "  blocked {connection}: {reason}")?
                    }
                    step => writeln!(f, "  skipped {step}: {reason}")?,
                },
            }
        }

        Ok(())
    }
}
