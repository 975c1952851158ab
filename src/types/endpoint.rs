use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// LayerZero Endpoint ID (EID) - unique identifier for each blockchain in the LayerZero network.
pub type EndpointId = u32;

/// A deployed instance of the application on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    /// Endpoint id of the chain the contract lives on.
    pub eid: EndpointId,
    /// Address of the OApp contract.
    pub address: Address,
}

impl Endpoint {
    /// Creates a new [`Endpoint`].
    pub const fn new(eid: EndpointId, address: Address) -> Self {
        Self { eid, address }
    }

    /// The address as stored in the `peers` mapping of a remote OApp, left-padded to 32 bytes.
    pub fn peer_bytes(&self) -> B256 {
        B256::left_padding_from(self.address.as_slice())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.address, self.eid)
    }
}

/// Identifies a directed connection by the endpoint ids it links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId {
    /// Sending side.
    pub from: EndpointId,
    /// Receiving side.
    pub to: EndpointId,
}

impl ConnectionId {
    /// Creates a new [`ConnectionId`].
    pub const fn new(from: EndpointId, to: EndpointId) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}
