use crate::*;
use async_trait::async_trait;
use omniwire::{
    chains::{ChainStateReader, Chains, memory::Operation},
    error::{GraphError, ReadError, ReadFailure, ReconcileError, SubmitError},
    reconcile::{PlanStep, Reconciler, ReconciliationStatus, SkipReason, StepOutcome},
    types::{ConnectionId, ConnectionSpec, GraphModel, ObservedState, StateQuery},
};
use std::{sync::Arc, time::Duration};

const NOT_OWNER: &str = "Ownable: caller is not the owner";

#[tokio::test]
async fn partial_failure_on_base_registration() {
    let env = Environment::polygon_base();
    env.base
        .fail_submissions(
            Operation::RegisterPeer { peer: POLYGON },
            SubmitError::Revert(NOT_OWNER.into()),
            1,
        )
        .await;

    let report = env.run().await;

    assert_eq!(report.status, ReconciliationStatus::PartiallyConverged);
    let outcomes = report
        .results
        .iter()
        .map(|result| (result.step.connection(), result.step.kind(), result.outcome.clone()))
        .collect::<Vec<_>>();
    assert_eq!(
        outcomes,
        vec![
            (ConnectionId::new(POLYGON, BASE), "register_peer", StepOutcome::Success),
            (ConnectionId::new(POLYGON, BASE), "set_enforced_options", StepOutcome::Success),
            (
                ConnectionId::new(BASE, POLYGON),
                "register_peer",
                StepOutcome::Failed(SubmitError::Revert(NOT_OWNER.into()))
            ),
            (
                ConnectionId::new(BASE, POLYGON),
                "set_enforced_options",
                StepOutcome::Skipped(SkipReason::DependencyUnmet)
            ),
        ]
    );
    assert_eq!(report.issues().count(), 2);

    // Re-running only touches the Base side.
    let plan = env.plan().await;
    assert_eq!(touched_connections(&plan), vec![ConnectionId::new(BASE, POLYGON)]);
    assert_eq!(plan.len(), 2);

    let polygon_submissions = env.polygon.submissions().await.len();
    let report = env.run().await;
    assert_eq!(report.status, ReconciliationStatus::Converged);
    assert_eq!(env.polygon.submissions().await.len(), polygon_submissions);
}

#[tokio::test]
async fn terminal_failures_everywhere_fail_the_run() {
    let env = Environment::polygon_base();
    for (chain, peer) in [(&env.polygon, BASE), (&env.base, POLYGON)] {
        chain
            .fail_submissions(
                Operation::RegisterPeer { peer },
                SubmitError::InvalidSignature("bad v".into()),
                1,
            )
            .await;
    }

    let report = env.run().await;

    assert_eq!(report.status, ReconciliationStatus::Failed);
    assert_eq!(report.failed().count(), 2);
    assert_eq!(report.skipped().count(), 2);
    assert!(report.results.iter().all(|result| result.attempts <= 1));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_until_success() {
    let env = Environment::polygon_base();
    env.base
        .fail_submissions(
            Operation::SetEnforcedOptions { peer: POLYGON },
            SubmitError::NonceCollision("nonce too low".into()),
            2,
        )
        .await;

    let report = env.run().await;

    assert_eq!(report.status, ReconciliationStatus::Converged);
    let options = report
        .results
        .iter()
        .find(|result| {
            result.step.connection() == ConnectionId::new(BASE, POLYGON)
                && matches!(result.step, PlanStep::SetEnforcedOptions { .. })
        })
        .unwrap();
    assert_eq!(options.attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_escalate_after_max_attempts() {
    let env = Environment::polygon_base();
    env.base
        .fail_submissions(
            Operation::RegisterPeer { peer: POLYGON },
            SubmitError::Network("connection refused".into()),
            10,
        )
        .await;

    let report = env.run().await;

    assert_eq!(report.status, ReconciliationStatus::PartiallyConverged);
    let failed = report.failed().next().unwrap();
    assert_eq!(failed.attempts, env.config.executor.max_attempts);
    assert_eq!(
        failed.outcome,
        StepOutcome::Failed(SubmitError::Network("connection refused".into()))
    );
}

#[tokio::test]
async fn read_failure_only_blocks_own_connections() {
    let env = Environment::mainnet();
    env.zksync.fail_reads(ReadFailure::Rpc("503 Service Unavailable".into())).await;

    let report = env.run().await;

    assert_eq!(report.status, ReconciliationStatus::PartiallyConverged);
    let blocked = report.blocked().collect::<Vec<_>>();
    assert_eq!(blocked.len(), 1);
    assert_eq!(blocked[0].step.connection(), ConnectionId::new(ZKSYNC, BASE));
    assert_eq!(
        blocked[0].outcome,
        StepOutcome::Skipped(SkipReason::Blocked(ReadError::unavailable(
            ZKSYNC,
            ReadFailure::Rpc("503 Service Unavailable".into())
        )))
    );
    assert!(env.zksync.submissions().await.is_empty());
    // Base still registers zkSync as a peer, its own state was readable.
    assert_eq!(env.base.submissions().await.len(), 4);

    env.zksync.restore_reads().await;
    let plan = env.plan().await;
    assert_eq!(touched_connections(&plan), vec![ConnectionId::new(ZKSYNC, BASE)]);
}

#[tokio::test]
async fn unreadable_state_alone_is_partial() {
    let env = Environment::polygon_base();
    env.polygon.fail_reads(ReadFailure::Decode("unsupported options format 2".into())).await;
    env.base.fail_reads(ReadFailure::Rpc("timeout".into())).await;

    let report = env.run().await;

    assert_eq!(report.status, ReconciliationStatus::PartiallyConverged);
    assert_eq!(report.blocked().count(), 2);
    assert!(report.results.iter().all(|result| result.attempts == 0));
}

#[derive(Debug)]
struct StalledReader;

#[async_trait]
impl ChainStateReader for StalledReader {
    async fn fetch_observed_state(&self, _query: &StateQuery) -> Result<ObservedState, ReadError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_reads_time_out() {
    let mut env = Environment::polygon_base();
    env.config.executor = env.config.executor.clone().with_rpc_timeout(Duration::from_secs(3));

    let chains = Chains::new()
        .with_chain(POLYGON, env.polygon.clone())
        .with_adapters(BASE, Arc::new(StalledReader), env.base.clone());
    let reconciler = Reconciler::new(env.graph(), chains, env.config.executor.clone()).unwrap();

    let observations = reconciler.observe().await.unwrap();
    assert_eq!(
        observations[&BASE],
        Err(ReadError::unavailable(BASE, ReadFailure::Timeout(Duration::from_secs(3))))
    );
    assert!(observations[&POLYGON].is_ok());
}

#[tokio::test]
async fn invalid_graph_never_reaches_the_chains() {
    let mut env = Environment::polygon_base();
    let duplicate = env.config.connections[0].clone();
    env.config.connections.push(duplicate);
    assert_eq!(
        env.config.graph(),
        Err(GraphError::DuplicateConnection(ConnectionId::new(POLYGON, BASE)))
    );

    let graph = GraphModel::new(
        env.config.contracts.iter().map(|contract| contract.endpoint()).collect(),
        vec![ConnectionSpec::new(env.endpoint(POLYGON), env.endpoint(POLYGON), vec![])],
    );
    let err = Reconciler::new(graph, env.chains(), Default::default()).unwrap_err();
    assert!(matches!(err, ReconcileError::Graph(GraphError::SelfLoop(_))));

    assert!(env.polygon.submissions().await.is_empty());
    assert!(env.base.submissions().await.is_empty());
}

/// Reconciler over the mainnet graph without any adapter for zkSync.
fn reconciler_without_zksync(env: &Environment) -> Reconciler {
    let chains = Chains::new()
        .with_chain(POLYGON, env.polygon.clone())
        .with_chain(BASE, env.base.clone());
    Reconciler::new(env.graph(), chains, Default::default()).unwrap()
}

#[tokio::test]
async fn missing_writer_is_rejected_before_running() {
    let env = Environment::mainnet();
    let reconciler = reconciler_without_zksync(&env);

    assert!(matches!(reconciler.run().await, Err(ReconcileError::MissingWriter(ZKSYNC))));
    assert!(env.polygon.submissions().await.is_empty());
    assert!(env.base.submissions().await.is_empty());
}

#[tokio::test]
async fn missing_reader_is_rejected_before_reading() {
    let env = Environment::mainnet();
    let reconciler = reconciler_without_zksync(&env);

    assert!(matches!(reconciler.plan().await, Err(ReconcileError::MissingReader(ZKSYNC))));
    assert!(env.polygon.submissions().await.is_empty());
    assert!(env.base.submissions().await.is_empty());
}
