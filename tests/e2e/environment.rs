//! Reconciliation end-to-end test environment.

use omniwire::{
    chains::{Chains, MemoryChain},
    config::ReconcilerConfig,
    reconcile::{Plan, Reconciler, ReconciliationReport},
    types::{ConnectionId, Endpoint, EndpointId, GraphModel},
};
use std::sync::Arc;

pub const POLYGON: EndpointId = 30109;
pub const BASE: EndpointId = 30184;
pub const ZKSYNC: EndpointId = 30165;

/// Three simulated chains with the mainnet mesh deployed on them.
#[derive(Debug)]
pub struct Environment {
    pub config: ReconcilerConfig,
    pub polygon: Arc<MemoryChain>,
    pub base: Arc<MemoryChain>,
    pub zksync: Arc<MemoryChain>,
}

impl Environment {
    /// Creates the environment with the full Polygon, Base and zkSync mesh.
    pub fn mainnet() -> Self {
        let config = serde_yaml::from_str(include_str!("../assets/config/mainnet.yaml"))
            .expect("valid fixture");
        Self {
            config,
            polygon: Arc::new(MemoryChain::new(POLYGON)),
            base: Arc::new(MemoryChain::new(BASE)),
            zksync: Arc::new(MemoryChain::new(ZKSYNC)),
        }
    }

    /// Creates the environment with only the Polygon and Base connections declared.
    pub fn polygon_base() -> Self {
        let mut env = Self::mainnet();
        env.config.connections.retain(|connection| {
            [POLYGON, BASE].contains(&connection.from) && [POLYGON, BASE].contains(&connection.to)
        });
        env
    }

    /// The simulated chain with the given endpoint id.
    pub fn chain(&self, eid: EndpointId) -> &Arc<MemoryChain> {
        match eid {
            POLYGON => &self.polygon,
            BASE => &self.base,
            ZKSYNC => &self.zksync,
            _ => panic!("unknown chain {eid}"),
        }
    }

    /// The declared endpoint on the given chain.
    pub fn endpoint(&self, eid: EndpointId) -> Endpoint {
        self.config
            .contracts
            .iter()
            .find(|contract| contract.eid == eid)
            .map(|contract| contract.endpoint())
            .expect("declared contract")
    }

    pub fn graph(&self) -> GraphModel {
        self.config.graph().expect("valid graph")
    }

    pub fn chains(&self) -> Chains {
        [&self.polygon, &self.base, &self.zksync]
            .into_iter()
            .fold(Chains::new(), |chains, chain| chains.with_chain(chain.eid(), chain.clone()))
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.graph(), self.chains(), self.config.executor.clone())
            .expect("valid reconciler")
    }

    /// Runs a full reconciliation with a fresh reconciler.
    pub async fn run(&self) -> ReconciliationReport {
        self.reconciler().run().await.expect("run started")
    }

    /// Computes the plan a fresh reconciler would execute.
    pub async fn plan(&self) -> Plan {
        self.reconciler().plan().await.expect("plan built").1
    }

    /// Writes every declared connection of this environment directly to the chains.
    pub async fn seed_converged(&self) {
        for connection in self.graph().connections() {
            let chain = self.chain(connection.from.eid);
            chain.seed_peer(&connection.from, &connection.to).await;
            for option in &connection.enforced_options {
                chain.seed_option(&connection.from, connection.to.eid, *option).await;
            }
        }
    }
}

/// Connections touched by the executable steps of `plan`, in plan order and deduplicated.
pub fn touched_connections(plan: &Plan) -> Vec<ConnectionId> {
    let mut connections = Vec::new();
    for step in plan.iter().filter(|step| !step.is_blocked()) {
        if !connections.contains(&step.connection()) {
            connections.push(step.connection());
        }
    }
    connections
}
