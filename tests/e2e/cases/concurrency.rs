use crate::*;
use omniwire::reconcile::{CancelHandle, ReconciliationStatus, SkipReason, StepOutcome};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn same_chain_submissions_are_serialized() {
    let env = Environment::mainnet();
    for eid in [POLYGON, BASE, ZKSYNC] {
        env.chain(eid).set_latency(Duration::from_millis(50)).await;
    }

    let report = env.run().await;

    assert_eq!(report.status, ReconciliationStatus::Converged);
    for eid in [POLYGON, BASE, ZKSYNC] {
        assert_eq!(env.chain(eid).max_in_flight(), 1, "chain {eid}");
    }
}

#[tokio::test(start_paused = true)]
async fn chains_are_reconciled_in_parallel() {
    let env = Environment::mainnet();
    for eid in [POLYGON, BASE, ZKSYNC] {
        env.chain(eid).set_latency(Duration::from_secs(1)).await;
    }

    let started = Instant::now();
    let report = env.run().await;

    assert_eq!(report.status, ReconciliationStatus::Converged);
    // Base has the most steps (4); the other chains run alongside it.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(4), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_pending_steps_only() {
    let env = Environment::mainnet();
    for eid in [POLYGON, BASE, ZKSYNC] {
        env.chain(eid).set_latency(Duration::from_secs(1)).await;
    }

    let reconciler = env.reconciler();
    let cancel = CancelHandle::new();
    let (report, _) = tokio::join!(reconciler.run_with(&cancel), async {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        cancel.cancel();
    });
    let report = report.unwrap();

    assert_eq!(report.status, ReconciliationStatus::PartiallyConverged);
    // Submissions in flight at cancellation time are completed, never rolled back.
    assert_eq!(report.results.iter().filter(|result| result.outcome.is_success()).count(), 6);
    let cancelled = report
        .results
        .iter()
        .filter(|result| result.outcome == StepOutcome::Skipped(SkipReason::Cancelled))
        .count();
    assert_eq!(cancelled, 2);
    assert_eq!(env.base.submissions().await.len(), 2);

    // A later run of the same reconciler picks up where the cancelled one stopped.
    let report = reconciler.run().await.unwrap();
    assert_eq!(report.status, ReconciliationStatus::Converged);
    assert_eq!(report.results.len(), 2);
}
