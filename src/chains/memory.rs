//! Simulated chain held in memory. For testing and dry runs only.

use super::{ChainStateReader, TransactionRef, WriteAdapter};
use crate::{
    error::{ReadError, ReadFailure, SubmitError},
    types::{EnforcedOption, Endpoint, EndpointId, ObservedState, OptionTable, StateQuery},
};
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use std::{
    collections::{HashMap, VecDeque},
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
    time::Duration,
};
use tokio::sync::{Mutex, RwLock};

/// A write operation submitted to a [`MemoryChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `setPeer` for the peer on the given endpoint id.
    RegisterPeer {
        /// Endpoint id of the peer.
        peer: EndpointId,
    },
    /// `setEnforcedOptions` towards the peer on the given endpoint id.
    SetEnforcedOptions {
        /// Endpoint id of the peer.
        peer: EndpointId,
    },
}

/// Peering state of one simulated OApp.
#[derive(Debug, Default)]
struct OAppState {
    peers: HashMap<EndpointId, B256>,
    enforced_options: HashMap<EndpointId, OptionTable>,
}

/// Injected faults.
#[derive(Debug, Default)]
struct Faults {
    /// Failure returned by every read, if set.
    read: Option<ReadFailure>,
    /// Queued failures per operation, consumed one per submission.
    submissions: HashMap<Operation, VecDeque<SubmitError>>,
    /// Delay applied to every submission before it takes effect.
    latency: Duration,
}

/// [`ChainStateReader`] and [`WriteAdapter`] implementation in memory.
///
/// Writes take effect immediately unless a fault was injected for them. A submission that is
/// dropped before its latency elapsed has no effect.
#[derive(Debug)]
pub struct MemoryChain {
    eid: EndpointId,
    contracts: RwLock<HashMap<Address, OAppState>>,
    faults: Mutex<Faults>,
    submissions: Mutex<Vec<Operation>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    tx_count: AtomicU64,
}

impl MemoryChain {
    /// Creates an empty chain.
    pub fn new(eid: EndpointId) -> Self {
        Self {
            eid,
            contracts: Default::default(),
            faults: Default::default(),
            submissions: Default::default(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            tx_count: AtomicU64::new(0),
        }
    }

    /// Endpoint id of the chain.
    pub fn eid(&self) -> EndpointId {
        self.eid
    }

    /// Registers `peer` on `oapp` without going through a submission.
    pub async fn seed_peer(&self, oapp: &Endpoint, peer: &Endpoint) {
        self.contracts
            .write()
            .await
            .entry(oapp.address)
            .or_default()
            .peers
            .insert(peer.eid, peer.peer_bytes());
    }

    /// Enforces `option` on `oapp` towards `peer` without going through a submission.
    pub async fn seed_option(&self, oapp: &Endpoint, peer: EndpointId, option: EnforcedOption) {
        self.contracts
            .write()
            .await
            .entry(oapp.address)
            .or_default()
            .enforced_options
            .entry(peer)
            .or_default()
            .insert(option.key(), option.value());
    }

    /// Makes every subsequent read fail with `failure`.
    pub async fn fail_reads(&self, failure: ReadFailure) {
        self.faults.lock().await.read = Some(failure);
    }

    /// Lets reads succeed again.
    pub async fn restore_reads(&self) {
        self.faults.lock().await.read = None;
    }

    /// Makes the next `times` submissions of `operation` fail with `error`.
    pub async fn fail_submissions(&self, operation: Operation, error: SubmitError, times: usize) {
        self.faults
            .lock()
            .await
            .submissions
            .entry(operation)
            .or_default()
            .extend(std::iter::repeat_n(error, times));
    }

    /// Delays every submission by `latency`.
    pub async fn set_latency(&self, latency: Duration) {
        self.faults.lock().await.latency = latency;
    }

    /// All submissions received so far, including failed ones, in arrival order.
    pub async fn submissions(&self) -> Vec<Operation> {
        self.submissions.lock().await.clone()
    }

    /// The highest number of submissions that were in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn submit(
        &self,
        oapp: Address,
        operation: Operation,
        apply: impl FnOnce(&mut OAppState) + Send,
    ) -> Result<TransactionRef, SubmitError> {
        let _guard = InFlightGuard::enter(self);

        let latency = self.faults.lock().await.latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.submissions.lock().await.push(operation);
        let fault = self
            .faults
            .lock()
            .await
            .submissions
            .get_mut(&operation)
            .and_then(|queue| queue.pop_front());
        if let Some(err) = fault {
            return Err(err);
        }

        apply(self.contracts.write().await.entry(oapp).or_default());

        let nonce = self.tx_count.fetch_add(1, Ordering::SeqCst);
        Ok(TransactionRef::new(format!("memory:{}:{nonce}", self.eid)))
    }
}

/// Tracks the number of submissions in flight, including ones dropped mid-way.
struct InFlightGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl<'a> InFlightGuard<'a> {
    fn enter(chain: &'a MemoryChain) -> Self {
        let current = chain.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        chain.max_in_flight.fetch_max(current, Ordering::SeqCst);
        Self { in_flight: &chain.in_flight }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainStateReader for MemoryChain {
    async fn fetch_observed_state(&self, query: &StateQuery) -> Result<ObservedState, ReadError> {
        if let Some(failure) = self.faults.lock().await.read.clone() {
            return Err(ReadError::unavailable(self.eid, failure));
        }

        let contracts = self.contracts.read().await;
        let mut state = ObservedState::new(query.endpoint);
        let Some(oapp) = contracts.get(&query.endpoint.address) else {
            return Ok(state);
        };

        for peer_query in &query.peers {
            let peer = peer_query.peer.eid;
            if let Some(registered) = oapp.peers.get(&peer) {
                state = state.with_peer(peer, *registered);
            }
            let Some(table) = oapp.enforced_options.get(&peer) else { continue };
            for (key, value) in table {
                if peer_query.msg_types.contains(&key.msg_type) {
                    state = state.with_option(peer, *key, *value);
                }
            }
        }

        Ok(state)
    }
}

#[async_trait]
impl WriteAdapter for MemoryChain {
    async fn register_peer(
        &self,
        endpoint: &Endpoint,
        peer: &Endpoint,
    ) -> Result<TransactionRef, SubmitError> {
        let (eid, bytes) = (peer.eid, peer.peer_bytes());
        self.submit(endpoint.address, Operation::RegisterPeer { peer: eid }, move |oapp| {
            oapp.peers.insert(eid, bytes);
        })
        .await
    }

    async fn set_enforced_options(
        &self,
        endpoint: &Endpoint,
        peer: &Endpoint,
        options: &[EnforcedOption],
    ) -> Result<TransactionRef, SubmitError> {
        let eid = peer.eid;
        let options = options.to_vec();
        self.submit(endpoint.address, Operation::SetEnforcedOptions { peer: eid }, move |oapp| {
            let table = oapp.enforced_options.entry(eid).or_default();
            for option in options {
                table.insert(option.key(), option.value());
            }
        })
        .await
    }
}
