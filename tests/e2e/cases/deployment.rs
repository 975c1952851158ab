use crate::*;
use omniwire::{
    chains::{ChainStateReader, memory::Operation},
    reconcile::{Delta, PlanStep, ReconciliationStatus, StepOutcome},
    types::{
        ConnectionId, EnforcedOption, ExecutorOptionType, OptionKey, OptionValue, PeerQuery,
        StateQuery,
    },
};
use std::collections::BTreeSet;

#[tokio::test]
async fn fresh_polygon_base_deployment_converges() {
    let env = Environment::polygon_base();

    let report = env.run().await;

    assert_eq!(report.status, ReconciliationStatus::Converged);
    assert_eq!(report.results.len(), 4);
    assert!(report.results.iter().all(|result| result.outcome == StepOutcome::Success));
    assert_eq!(
        env.polygon.submissions().await,
        vec![Operation::RegisterPeer { peer: BASE }, Operation::SetEnforcedOptions { peer: BASE }]
    );
    assert_eq!(
        env.base.submissions().await,
        vec![
            Operation::RegisterPeer { peer: POLYGON },
            Operation::SetEnforcedOptions { peer: POLYGON }
        ]
    );
    assert!(env.zksync.submissions().await.is_empty());

    // Nothing left to do afterwards.
    let (deltas, plan) = env.reconciler().plan().await.unwrap();
    assert!(plan.is_empty());
    assert!(deltas.iter().all(Delta::is_empty));
}

#[tokio::test]
async fn full_mesh_converges() {
    let env = Environment::mainnet();

    let report = env.run().await;

    assert_eq!(report.status, ReconciliationStatus::Converged);
    assert_eq!(report.results.len(), 8);
    assert_eq!(env.base.submissions().await.len(), 4);
    assert!(env.plan().await.is_empty());
}

#[tokio::test]
async fn registration_always_precedes_options() {
    let env = Environment::mainnet();
    let plan = env.plan().await;

    for (index, step) in plan.iter().enumerate() {
        if let PlanStep::SetEnforcedOptions { depends_on_registration, .. } = step {
            let registered_before = plan.steps()[..index].iter().any(|earlier| {
                matches!(earlier, PlanStep::RegisterPeer { .. })
                    && earlier.connection() == step.connection()
            });
            assert!(*depends_on_registration);
            assert!(registered_before, "options before registration for {}", step.connection());
        }
    }
}

#[tokio::test]
async fn option_only_change() {
    let mut env = Environment::polygon_base();
    for connection in &mut env.config.connections {
        connection.enforced_options = vec![EnforcedOption::lz_receive(1, 100_000, 0)];
    }
    env.seed_converged().await;
    assert!(env.plan().await.is_empty());

    for connection in &mut env.config.connections {
        connection.enforced_options = vec![EnforcedOption::lz_receive(1, 200_000, 0)];
    }

    let plan = env.plan().await;
    assert_eq!(plan.len(), 2);
    assert!(plan.iter().all(|step| matches!(
        step,
        PlanStep::SetEnforcedOptions { depends_on_registration: false, .. }
    )));

    let report = env.run().await;
    assert_eq!(report.status, ReconciliationStatus::Converged);

    let polygon = env.endpoint(POLYGON);
    let base = env.endpoint(BASE);
    let state = env
        .polygon
        .fetch_observed_state(&StateQuery {
            endpoint: polygon,
            peers: vec![PeerQuery { peer: base, msg_types: BTreeSet::from([1]) }],
        })
        .await
        .unwrap();
    assert_eq!(
        state.enforced_option(BASE, &OptionKey::new(1, ExecutorOptionType::LzReceive)),
        Some(&OptionValue::new(200_000, 0))
    );
}

#[tokio::test]
async fn additional_options_are_batched_per_pathway() {
    let mut env = Environment::polygon_base();
    env.seed_converged().await;

    let extra = [
        EnforcedOption::lz_receive(2, 250_000, 0),
        EnforcedOption {
            msg_type: 2,
            option_type: ExecutorOptionType::OrderedExecution,
            gas: 0,
            native_value: 0,
        },
    ];
    env.config.connections[0].enforced_options.extend(extra);

    let plan = env.plan().await;
    let [PlanStep::SetEnforcedOptions { options, .. }] = plan.steps() else {
        panic!("expected a single batched step, got {plan:?}");
    };
    assert_eq!(options, &extra);
    assert_eq!(touched_connections(&plan), vec![ConnectionId::new(POLYGON, BASE)]);
}

#[tokio::test]
async fn undeclared_peers_are_left_alone() {
    let env = Environment::polygon_base();
    let polygon = env.endpoint(POLYGON);
    let zksync = env.endpoint(ZKSYNC);
    env.polygon.seed_peer(&polygon, &zksync).await;

    let report = env.run().await;
    assert_eq!(report.status, ReconciliationStatus::Converged);

    let state = env
        .polygon
        .fetch_observed_state(&StateQuery {
            endpoint: polygon,
            peers: vec![PeerQuery { peer: zksync, msg_types: BTreeSet::new() }],
        })
        .await
        .unwrap();
    assert!(state.is_peer_registered(&zksync));
}

#[tokio::test]
async fn diff_is_idempotent() {
    let env = Environment::mainnet();
    env.polygon.seed_peer(&env.endpoint(POLYGON), &env.endpoint(BASE)).await;

    let reconciler = env.reconciler();
    let (first, _) = reconciler.plan().await.unwrap();
    let (second, _) = reconciler.plan().await.unwrap();
    assert_eq!(first, second);
}
