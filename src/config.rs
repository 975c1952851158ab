//! Reconciler configuration.
use crate::{
    chains::{Chains, EvmChain, MemoryChain},
    constants::{
        DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF,
        DEFAULT_RECEIPT_TIMEOUT, DEFAULT_RPC_TIMEOUT, SIGNER_KEY_ENV,
    },
    error::GraphError,
    types::{ConnectionId, ConnectionSpec, EnforcedOption, Endpoint, EndpointId, GraphModel},
};
use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use eyre::{Context, OptionExt};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, path::Path, str::FromStr, sync::Arc, time::Duration};
use tracing::debug;
use url::Url;

/// Reconciler configuration.
///
/// Declares the desired peering graph and how to reach each chain.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Deployed OApp contracts, at most one per chain.
    pub contracts: Vec<ContractConfig>,
    /// Directed connections between the contracts.
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
    /// Chain access, keyed by endpoint id.
    #[serde(default, with = "crate::serde::hash_map")]
    pub chains: HashMap<EndpointId, ChainConfig>,
    /// Executor configuration.
    #[serde(default)]
    pub executor: ExecutorConfig,
}

impl ReconcilerConfig {
    /// Adds a contract.
    pub fn with_contract(mut self, eid: EndpointId, address: Address) -> Self {
        self.contracts.push(ContractConfig { eid, address, name: None });
        self
    }

    /// Adds a connection.
    pub fn with_connection(
        mut self,
        from: EndpointId,
        to: EndpointId,
        enforced_options: Vec<EnforcedOption>,
    ) -> Self {
        self.connections.push(ConnectionConfig { from, to, enforced_options });
        self
    }

    /// Sets the RPC endpoint of a chain.
    pub fn with_chain(mut self, eid: EndpointId, rpc_url: Url) -> Self {
        self.chains.insert(eid, ChainConfig { rpc_url, signer_key: None });
        self
    }

    /// Sets the executor configuration.
    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    /// Builds and validates the [`GraphModel`] described by this configuration.
    pub fn graph(&self) -> Result<GraphModel, GraphError> {
        let endpoints =
            self.contracts.iter().map(|contract| contract.endpoint()).collect::<Vec<_>>();

        let resolve = |id: ConnectionId, eid: EndpointId| {
            endpoints
                .iter()
                .find(|endpoint| endpoint.eid == eid)
                .copied()
                .ok_or(GraphError::DanglingEndpointReference { connection: id, eid })
        };

        let connections = self
            .connections
            .iter()
            .map(|connection| {
                let id = ConnectionId::new(connection.from, connection.to);
                Ok(ConnectionSpec::new(
                    resolve(id, connection.from)?,
                    resolve(id, connection.to)?,
                    connection.enforced_options.clone(),
                ))
            })
            .collect::<Result<Vec<_>, GraphError>>()?;

        GraphModel::validated(endpoints, connections)
    }

    /// Creates EVM adapters for every configured chain.
    ///
    /// Chains without their own signer key use the one in the `OMNIWIRE_SIGNER_KEY` environment
    /// variable.
    pub fn build_chains(&self) -> eyre::Result<Chains> {
        let fallback_key = std::env::var(SIGNER_KEY_ENV).ok();

        let mut chains = Chains::new();
        for (eid, config) in &self.chains {
            let key = config
                .signer_key
                .as_deref()
                .or(fallback_key.as_deref())
                .ok_or_eyre(format!("no signer key for chain {eid}, set {SIGNER_KEY_ENV}"))?;
            let signer = PrivateKeySigner::from_str(key)
                .wrap_err_with(|| format!("invalid signer key for chain {eid}"))?;

            debug!(eid, rpc_url = %config.rpc_url, signer = %signer.address(), "Adding chain");

            let chain = EvmChain::new(
                *eid,
                config.rpc_url.clone(),
                signer,
                self.executor.receipt_timeout,
            );
            chains = chains.with_chain(*eid, Arc::new(chain));
        }

        Ok(chains)
    }

    /// Creates an empty simulated chain for every declared contract.
    pub fn build_simulated_chains(&self) -> Chains {
        self.contracts.iter().fold(Chains::new(), |chains, contract| {
            chains.with_chain(contract.eid, Arc::new(MemoryChain::new(contract.eid)))
        })
    }

    /// Load from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;
        let config = serde_yaml::from_reader(&file)
            .wrap_err_with(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save to a YAML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> eyre::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// A deployed OApp contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Endpoint id of the chain the contract is deployed on.
    pub eid: EndpointId,
    /// Contract address.
    pub address: Address,
    /// Human readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ContractConfig {
    /// The [`Endpoint`] of this contract.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.eid, self.address)
    }
}

/// A directed connection between two contracts, referenced by endpoint id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Sending endpoint id.
    pub from: EndpointId,
    /// Receiving endpoint id.
    pub to: EndpointId,
    /// Options enforced for messages sent along this connection.
    #[serde(default)]
    pub enforced_options: Vec<EnforcedOption>,
}

/// Access to one chain.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// HTTP RPC endpoint.
    pub rpc_url: Url,
    /// Hex encoded private key used to sign transactions on this chain.
    #[serde(default, skip_serializing)]
    pub signer_key: Option<String>,
}

impl fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainConfig")
            .field("rpc_url", &self.rpc_url)
            .field("signer_key", &self.signer_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Executor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Maximum number of submission attempts per step, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(with = "crate::serde::duration")]
    pub initial_backoff: Duration,
    /// Upper bound of the retry delay.
    #[serde(with = "crate::serde::duration")]
    pub max_backoff: Duration,
    /// Deadline of a single RPC call.
    #[serde(with = "crate::serde::duration")]
    pub rpc_timeout: Duration,
    /// How long to wait for a transaction to be included.
    #[serde(with = "crate::serde::duration")]
    pub receipt_timeout: Duration,
}

impl ExecutorConfig {
    /// Sets the maximum number of submission attempts per step.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the delay before the first retry.
    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    /// Sets the upper bound of the retry delay.
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Sets the deadline of a single RPC call.
    pub fn with_rpc_timeout(mut self, rpc_timeout: Duration) -> Self {
        self.rpc_timeout = rpc_timeout;
        self
    }

    /// Sets how long to wait for a transaction to be included.
    pub fn with_receipt_timeout(mut self, receipt_timeout: Duration) -> Self {
        self.receipt_timeout = receipt_timeout;
        self
    }

    /// Deadline of one submission: sending the transaction and waiting for its receipt.
    pub fn submission_timeout(&self) -> Duration {
        self.rpc_timeout.saturating_add(self.receipt_timeout)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        }
    }
}
