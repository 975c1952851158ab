//! Per-chain adapters used by the reconciler to read and write OApp peering state.

use crate::{
    error::{ReadError, SubmitError},
    types::{EnforcedOption, Endpoint, EndpointId, ObservedState, StateQuery},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, sync::Arc};

pub mod contracts;
pub mod evm;
pub use evm::EvmChain;
pub mod memory;
pub use memory::MemoryChain;

/// Opaque, chain-specific reference to a submitted transaction (e.g. a transaction hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionRef(String);

impl TransactionRef {
    /// Creates a new [`TransactionRef`].
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The reference as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reads the peering state of OApps on one chain.
///
/// Implementations must not mutate chain state, and must return [`ReadError`] rather than
/// partial or zero-valued state when anything could not be read.
#[async_trait]
pub trait ChainStateReader: fmt::Debug + Send + Sync {
    /// Fetches the current peers and enforced options of `query.endpoint`.
    async fn fetch_observed_state(&self, query: &StateQuery) -> Result<ObservedState, ReadError>;
}

/// Submits peering transactions to one chain.
///
/// Each call submits a single transaction and resolves once it is included, or fails.
#[async_trait]
pub trait WriteAdapter: fmt::Debug + Send + Sync {
    /// Registers `peer` on `endpoint`.
    async fn register_peer(
        &self,
        endpoint: &Endpoint,
        peer: &Endpoint,
    ) -> Result<TransactionRef, SubmitError>;

    /// Enforces `options` on `endpoint` for messages sent to `peer`.
    ///
    /// Options not mentioned in the batch must be left untouched.
    async fn set_enforced_options(
        &self,
        endpoint: &Endpoint,
        peer: &Endpoint,
        options: &[EnforcedOption],
    ) -> Result<TransactionRef, SubmitError>;
}

/// Reader and writer of a single chain.
#[derive(Debug, Clone)]
pub struct Chain {
    /// Reads OApp state on the chain.
    pub reader: Arc<dyn ChainStateReader>,
    /// Submits transactions to the chain.
    pub writer: Arc<dyn WriteAdapter>,
}

/// A collection of adapters for different chains, keyed by endpoint id.
#[derive(Debug, Clone, Default)]
pub struct Chains {
    chains: HashMap<EndpointId, Chain>,
}

impl Chains {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a chain whose adapter both reads and writes.
    pub fn with_chain<A>(mut self, eid: EndpointId, adapter: Arc<A>) -> Self
    where
        A: ChainStateReader + WriteAdapter + 'static,
    {
        self.chains.insert(eid, Chain { reader: adapter.clone(), writer: adapter });
        self
    }

    /// Adds a chain with separate reader and writer.
    pub fn with_adapters(
        mut self,
        eid: EndpointId,
        reader: Arc<dyn ChainStateReader>,
        writer: Arc<dyn WriteAdapter>,
    ) -> Self {
        self.chains.insert(eid, Chain { reader, writer });
        self
    }

    /// Returns the chain with the given endpoint id.
    pub fn get(&self, eid: EndpointId) -> Option<&Chain> {
        self.chains.get(&eid)
    }

    /// Returns the state reader of the given chain.
    pub fn reader(&self, eid: EndpointId) -> Option<&Arc<dyn ChainStateReader>> {
        self.chains.get(&eid).map(|chain| &chain.reader)
    }

    /// Returns the write adapter of the given chain.
    pub fn writer(&self, eid: EndpointId) -> Option<&Arc<dyn WriteAdapter>> {
        self.chains.get(&eid).map(|chain| &chain.writer)
    }

    /// Iterates over all chains.
    pub fn iter(&self) -> impl Iterator<Item = (&EndpointId, &Chain)> {
        self.chains.iter()
    }

    /// Number of chains.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
