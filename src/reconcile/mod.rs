//! Reconciliation of the desired peering graph against on-chain state.
//!
//! A run validates the graph, reads the state of every sending endpoint in parallel, computes
//! one [`Delta`] per connection, turns those into a [`Plan`] and lets the [`Executor`] apply it.
//! The outcome is a [`ReconciliationReport`].
//!
//! Reconciliation is additive: peers and options that are on-chain but not declared are left
//! alone.

mod cancel;
pub use cancel::CancelHandle;

pub mod diff;
pub use diff::{ConnectionDelta, Delta, Observations, OptionChange, diff};

mod executor;
pub use executor::{Executor, SkipReason, StepOutcome, StepResult};

mod plan;
pub use plan::{Plan, PlanStep};

mod report;
pub use report::{ReconciliationReport, ReconciliationStatus, StepSummary};

use crate::{
    chains::Chains,
    config::ExecutorConfig,
    error::{ReadError, ReadFailure, ReconcileError},
    metrics::ReconcilerMetrics,
    types::GraphModel,
};
use chrono::Utc;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives reconciliation runs for one graph.
#[derive(Debug)]
pub struct Reconciler {
    graph: GraphModel,
    chains: Chains,
    config: ExecutorConfig,
    executor: Executor,
    metrics: Arc<ReconcilerMetrics>,
}

impl Reconciler {
    /// Creates a new [`Reconciler`].
    ///
    /// Fails if the graph is invalid. Nothing is read from the chains at this point.
    pub fn new(
        graph: GraphModel,
        chains: Chains,
        config: ExecutorConfig,
    ) -> Result<Self, ReconcileError> {
        graph.validate()?;

        let metrics = Arc::new(ReconcilerMetrics::default());
        let executor = Executor::new(config.clone(), metrics.clone());

        Ok(Self { graph, chains, config, executor, metrics })
    }

    /// The desired graph.
    pub fn graph(&self) -> &GraphModel {
        &self.graph
    }

    /// Reads the state of every endpoint that has outgoing connections, in parallel.
    ///
    /// Individual read failures are returned as part of the observations. Only a missing reader
    /// is an error.
    pub async fn observe(&self) -> Result<Observations, ReconcileError> {
        let queries = self
            .graph
            .state_queries()
            .into_iter()
            .map(|query| {
                let eid = query.endpoint.eid;
                let reader = self.chains.reader(eid).ok_or(ReconcileError::MissingReader(eid))?;
                Ok((query, reader.clone()))
            })
            .collect::<Result<Vec<_>, ReconcileError>>()?;

        let timeout = self.config.rpc_timeout;
        let reads = queries.iter().map(|(query, reader)| async move {
            let eid = query.endpoint.eid;
            let result = tokio::time::timeout(timeout, reader.fetch_observed_state(query))
                .await
                .unwrap_or_else(|_| {
                    Err(ReadError::unavailable(eid, ReadFailure::Timeout(timeout)))
                });

            self.metrics.reads.increment(1);
            match &result {
                Ok(state) => debug!(eid, peers = state.peers.len(), "Observed endpoint state"),
                Err(err) => {
                    self.metrics.read_failures.increment(1);
                    warn!(eid, %err, "Could not read endpoint state");
                }
            }

            (eid, result)
        });

        Ok(join_all(reads).await.into_iter().collect())
    }

    /// Computes what a run would do, without writing anything.
    pub async fn plan(&self) -> Result<(Vec<Delta>, Plan), ReconcileError> {
        let observations = self.observe().await?;
        let deltas = diff(&self.graph, &observations);
        let plan = Plan::build(&deltas);

        debug!(
            connections = deltas.len(),
            steps = plan.len(),
            blocked = plan.len() - plan.executable_len(),
            "Built plan"
        );

        Ok((deltas, plan))
    }

    /// Reconciles the chains with the graph.
    ///
    /// Fails only if the run cannot start. Everything that goes wrong during the run is recorded
    /// in the returned report.
    pub async fn run(&self) -> Result<ReconciliationReport, ReconcileError> {
        self.run_with(&CancelHandle::new()).await
    }

    /// Like [`Reconciler::run`], but stops submitting new steps once `cancel` is signalled.
    ///
    /// The handle only applies to this run.
    pub async fn run_with(
        &self,
        cancel: &CancelHandle,
    ) -> Result<ReconciliationReport, ReconcileError> {
        if let Some(eid) = self
            .graph
            .state_queries()
            .iter()
            .map(|query| query.endpoint.eid)
            .find(|eid| self.chains.writer(*eid).is_none())
        {
            return Err(ReconcileError::MissingWriter(eid));
        }

        let started_at = Utc::now();
        info!(
            endpoints = self.graph.endpoints().len(),
            connections = self.graph.connections().len(),
            "Starting reconciliation"
        );

        let (_, plan) = self.plan().await?;
        let results = self.executor.execute(&plan, &self.chains, cancel).await;
        let report = ReconciliationReport::new(results, started_at);

        info!(
            status = %report.status,
            steps = report.steps.len(),
            issues = report.issues().count(),
            "Finished reconciliation"
        );

        Ok(report)
    }
}
