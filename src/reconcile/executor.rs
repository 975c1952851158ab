//! Applies a [`Plan`] to the chains.

use super::{CancelHandle, Plan, PlanStep};
use crate::{
    chains::{Chains, TransactionRef, WriteAdapter},
    config::ExecutorConfig,
    error::{ReadError, SubmitError},
    metrics::ReconcilerMetrics,
    types::{Endpoint, EndpointId},
};
use futures_util::future::join_all;
use itertools::Itertools;
use serde::Serialize;
use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, error, info, instrument, warn};

/// Why a step was not executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The peer registration the step depends on did not succeed.
    DependencyUnmet,
    /// The connection state could not be read.
    Blocked(ReadError),
    /// The run was cancelled before the step was submitted.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DependencyUnmet => f.write_str("peer registration did not succeed"),
            Self::Blocked(cause) => write!(f, "blocked: {cause}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Terminal state of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The transaction was included.
    Success,
    /// All attempts failed. Holds the last error.
    Failed(SubmitError),
    /// The step was never submitted.
    Skipped(SkipReason),
}

impl StepOutcome {
    /// Whether the step succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether the step failed after being submitted.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Whether the step was skipped.
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    /// Short name of the outcome.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed(_) => "failed",
            Self::Skipped(_) => "skipped",
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failed(err) => write!(f, "failed: {err}"),
            Self::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

impl Serialize for StepOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result of executing a single [`PlanStep`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    /// The executed step.
    pub step: PlanStep,
    /// How the step ended.
    pub outcome: StepOutcome,
    /// The included transaction, if the step succeeded.
    pub transaction: Option<TransactionRef>,
    /// Number of submissions made.
    pub attempts: u32,
}

impl StepResult {
    fn success(step: PlanStep, transaction: TransactionRef, attempts: u32) -> Self {
        Self { step, outcome: StepOutcome::Success, transaction: Some(transaction), attempts }
    }

    fn failed(step: PlanStep, err: SubmitError, attempts: u32) -> Self {
        Self { step, outcome: StepOutcome::Failed(err), transaction: None, attempts }
    }

    fn skipped(step: PlanStep, reason: SkipReason) -> Self {
        Self { step, outcome: StepOutcome::Skipped(reason), transaction: None, attempts: 0 }
    }
}

/// Executes plans, one worker per chain.
///
/// Steps targeting the same chain run one after another in plan order; different chains run
/// concurrently. Every submission holds the submission slot of its chain, so no two
/// submissions to one chain overlap even across concurrent [`Executor::execute`] calls.
#[derive(Debug)]
pub struct Executor {
    config: ExecutorConfig,
    metrics: Arc<ReconcilerMetrics>,
    slots: Mutex<HashMap<EndpointId, Arc<Mutex<()>>>>,
}

impl Executor {
    /// Creates a new [`Executor`].
    pub fn new(config: ExecutorConfig, metrics: Arc<ReconcilerMetrics>) -> Self {
        Self { config, metrics, slots: Default::default() }
    }

    /// Executes `plan` against `chains` and returns one result per step, in plan order.
    ///
    /// Failures are recorded per step and never abort other steps. Once `cancel` is signalled,
    /// steps that were not submitted yet are skipped.
    pub async fn execute(
        &self,
        plan: &Plan,
        chains: &Chains,
        cancel: &CancelHandle,
    ) -> Vec<StepResult> {
        let by_chain = plan.iter().enumerate().into_group_map_by(|(_, step)| step.eid());

        info!(steps = plan.len(), chains = by_chain.len(), "Executing plan");

        let workers = by_chain.into_iter().map(|(eid, steps)| {
            let writer = chains.writer(eid).cloned();
            self.run_chain(eid, writer, steps, cancel)
        });

        join_all(workers)
            .await
            .into_iter()
            .flatten()
            .sorted_by_key(|(index, _)| *index)
            .map(|(_, result)| result)
            .collect()
    }

    /// Runs the steps of one chain in order.
    #[instrument(skip(self, writer, steps, cancel), fields(steps = steps.len()))]
    async fn run_chain(
        &self,
        eid: EndpointId,
        writer: Option<Arc<dyn WriteAdapter>>,
        steps: Vec<(usize, &PlanStep)>,
        cancel: &CancelHandle,
    ) -> Vec<(usize, StepResult)> {
        let slot = self.slot(eid).await;
        let mut registered = HashSet::<(Endpoint, Endpoint)>::new();
        let mut results = Vec::with_capacity(steps.len());

        for (index, step) in steps {
            let result = match step {
                PlanStep::Blocked { cause, .. } => {
                    StepResult::skipped(step.clone(), SkipReason::Blocked(cause.clone()))
                }
                _ if cancel.is_cancelled() => {
                    StepResult::skipped(step.clone(), SkipReason::Cancelled)
                }
                PlanStep::SetEnforcedOptions {
                    endpoint, peer, depends_on_registration: true, ..
                } if !registered.contains(&(*endpoint, *peer)) => {
                    StepResult::skipped(step.clone(), SkipReason::DependencyUnmet)
                }
                _ => match &writer {
                    Some(writer) => self.submit_step(step, writer.as_ref(), &slot, cancel).await,
                    None => StepResult::failed(
                        step.clone(),
                        SubmitError::Rejected(format!("no write adapter for endpoint {eid}")),
                        0,
                    ),
                },
            };

            if let PlanStep::RegisterPeer { endpoint, peer } = step {
                if result.outcome.is_success() {
                    registered.insert((*endpoint, *peer));
                }
            }

            match &result.outcome {
                StepOutcome::Success => self.metrics.steps_succeeded.increment(1),
                StepOutcome::Failed(_) => self.metrics.steps_failed.increment(1),
                StepOutcome::Skipped(reason) => {
                    debug!(step = index, %reason, "Skipping step");
                    self.metrics.steps_skipped.increment(1);
                }
            }

            results.push((index, result));
        }

        results
    }

    /// Submits a single step, retrying transient failures with exponential backoff.
    ///
    /// The step moves from pending to submitted, then either to a terminal state or through a
    /// backoff back to submitted.
    async fn submit_step(
        &self,
        step: &PlanStep,
        writer: &dyn WriteAdapter,
        slot: &Mutex<()>,
        cancel: &CancelHandle,
    ) -> StepResult {
        let _slot = slot.lock().await;

        let deadline = self.config.submission_timeout();
        let max_attempts = self.config.max_attempts.max(1);
        let mut backoff = self.config.initial_backoff;
        let mut attempt = 0;
        let mut last_error = None;

        loop {
            if cancel.is_cancelled() {
                return match last_error {
                    Some(err) => StepResult::failed(step.clone(), err, attempt),
                    None => StepResult::skipped(step.clone(), SkipReason::Cancelled),
                };
            }

            attempt += 1;
            let started = Instant::now();
            let outcome = tokio::time::timeout(deadline, submit(writer, step))
                .await
                .unwrap_or(Err(SubmitError::Timeout(deadline)));
            self.metrics.record_submission(started.elapsed());

            let err = match outcome {
                Ok(transaction) => {
                    debug!(step = %step, attempt, %transaction, "Step succeeded");
                    return StepResult::success(step.clone(), transaction, attempt);
                }
                Err(err) => err,
            };

            if !err.is_transient() || attempt >= max_attempts {
                error!(step = %step, attempt, %err, "Step failed");
                return StepResult::failed(step.clone(), err, attempt);
            }

            warn!(step = %step, attempt, %err, ?backoff, "Transient submission failure, retrying");
            self.metrics.retries.increment(1);
            last_error = Some(err);

            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = cancel.cancelled() => {
                    debug!(step = %step, attempt, "Cancelled during backoff");
                }
            }

            backoff = backoff.saturating_mul(2).min(self.config.max_backoff);
        }
    }

    /// Returns the submission slot of the given chain.
    async fn slot(&self, eid: EndpointId) -> Arc<Mutex<()>> {
        self.slots.lock().await.entry(eid).or_default().clone()
    }
}

async fn submit(writer: &dyn WriteAdapter, step: &PlanStep) -> Result<TransactionRef, SubmitError> {
    match step {
        PlanStep::RegisterPeer { endpoint, peer } => writer.register_peer(endpoint, peer).await,
        PlanStep::SetEnforcedOptions { endpoint, peer, options, .. } => {
            writer.set_enforced_options(endpoint, peer, options).await
        }
        PlanStep::Blocked { connection, .. } => {
            Err(SubmitError::Rejected(format!("connection {connection} is blocked")))
        }
    }
}
