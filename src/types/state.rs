//! Observed on-chain state.

use super::{Endpoint, EndpointId, MsgType, OptionKey, OptionTable, OptionValue};
use alloy::primitives::B256;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

/// What to read about one peer of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerQuery {
    /// The peer endpoint.
    pub peer: Endpoint,
    /// Message types whose enforced options should be read.
    pub msg_types: BTreeSet<MsgType>,
}

/// What to read from one endpoint.
///
/// OApps cannot enumerate their peers, so the reader is told which peers to look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateQuery {
    /// The endpoint to read from.
    pub endpoint: Endpoint,
    /// Peers of interest.
    pub peers: Vec<PeerQuery>,
}

/// Snapshot of the peering configuration of one endpoint.
///
/// Snapshots of different endpoints are taken independently and are not consistent with each
/// other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedState {
    /// The endpoint the snapshot was taken from.
    pub endpoint: Endpoint,
    /// Registered peers, keyed by peer endpoint id. Unset peers are absent.
    pub peers: HashMap<EndpointId, B256>,
    /// Enforced options per peer endpoint id.
    pub enforced_options: HashMap<EndpointId, OptionTable>,
    /// When the snapshot was taken.
    pub observed_at: DateTime<Utc>,
}

impl ObservedState {
    /// Creates an empty snapshot of `endpoint`, taken now.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            peers: HashMap::new(),
            enforced_options: HashMap::new(),
            observed_at: Utc::now(),
        }
    }

    /// Records a registered peer. A zero peer is treated as unset.
    pub fn with_peer(mut self, eid: EndpointId, peer: B256) -> Self {
        if !peer.is_zero() {
            self.peers.insert(eid, peer);
        }
        self
    }

    /// Records an enforced option towards the peer on `eid`.
    pub fn with_option(mut self, eid: EndpointId, key: OptionKey, value: OptionValue) -> Self {
        self.enforced_options.entry(eid).or_default().insert(key, value);
        self
    }

    /// Whether `peer` is registered with its exact address.
    pub fn is_peer_registered(&self, peer: &Endpoint) -> bool {
        self.peers.get(&peer.eid) == Some(&peer.peer_bytes())
    }

    /// The enforced option for `key` towards the peer on `eid`, if any.
    pub fn enforced_option(&self, eid: EndpointId, key: &OptionKey) -> Option<&OptionValue> {
        self.enforced_options.get(&eid).and_then(|table| table.get(key))
    }
}
