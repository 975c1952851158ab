//! Desired peering topology.

use super::{
    ConnectionId, EnforcedOption, Endpoint, EndpointId, MsgType, PeerQuery, StateQuery,
};
use crate::error::GraphError;
use std::collections::{BTreeSet, HashMap, HashSet};

/// A directed connection between two endpoints and the options enforced on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSpec {
    /// Sending endpoint. This is where the peer is registered and the options are enforced.
    pub from: Endpoint,
    /// Receiving endpoint.
    pub to: Endpoint,
    /// Options enforced for messages sent along this connection.
    pub enforced_options: Vec<EnforcedOption>,
}

impl ConnectionSpec {
    /// Creates a new [`ConnectionSpec`].
    pub fn new(from: Endpoint, to: Endpoint, enforced_options: Vec<EnforcedOption>) -> Self {
        Self { from, to, enforced_options }
    }

    /// The [`ConnectionId`] of this connection.
    pub fn id(&self) -> ConnectionId {
        ConnectionId::new(self.from.eid, self.to.eid)
    }

    /// Message types for which options are enforced, in ascending order.
    pub fn msg_types(&self) -> BTreeSet<MsgType> {
        self.enforced_options.iter().map(|option| option.msg_type).collect()
    }
}

/// Desired topology: deployed endpoints and the directed connections between them.
///
/// Constructed once per reconciliation run and never mutated afterwards. Both endpoints and
/// connections keep their declaration order, which makes plans reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphModel {
    endpoints: Vec<Endpoint>,
    connections: Vec<ConnectionSpec>,
}

impl GraphModel {
    /// Creates a new [`GraphModel`] without validating it.
    pub fn new(endpoints: Vec<Endpoint>, connections: Vec<ConnectionSpec>) -> Self {
        Self { endpoints, connections }
    }

    /// Creates a new [`GraphModel`] and validates it.
    pub fn validated(
        endpoints: Vec<Endpoint>,
        connections: Vec<ConnectionSpec>,
    ) -> Result<Self, GraphError> {
        let graph = Self::new(endpoints, connections);
        graph.validate()?;
        Ok(graph)
    }

    /// Declared endpoints, in declaration order.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Declared connections, in declaration order.
    pub fn connections(&self) -> &[ConnectionSpec] {
        &self.connections
    }

    /// Returns the endpoint declared on the given chain.
    pub fn endpoint(&self, eid: EndpointId) -> Option<&Endpoint> {
        self.endpoints.iter().find(|endpoint| endpoint.eid == eid)
    }

    /// Outgoing connections of `endpoint`, in declaration order.
    pub fn connections_from<'a>(
        &'a self,
        endpoint: &'a Endpoint,
    ) -> impl Iterator<Item = &'a ConnectionSpec> + 'a {
        self.connections.iter().filter(move |connection| connection.from == *endpoint)
    }

    /// Checks all graph invariants, returning the first violation found.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut endpoints = HashMap::with_capacity(self.endpoints.len());
        for endpoint in &self.endpoints {
            if endpoints.insert(endpoint.eid, endpoint).is_some() {
                return Err(GraphError::DuplicateEndpoint(endpoint.eid));
            }
        }

        let mut seen = HashSet::with_capacity(self.connections.len());
        for connection in &self.connections {
            let id = connection.id();

            if connection.from == connection.to || id.from == id.to {
                return Err(GraphError::SelfLoop(id));
            }

            for side in [&connection.from, &connection.to] {
                if endpoints.get(&side.eid).is_none_or(|declared| *declared != side) {
                    return Err(GraphError::DanglingEndpointReference {
                        connection: id,
                        eid: side.eid,
                    });
                }
            }

            if !seen.insert(id) {
                return Err(GraphError::DuplicateConnection(id));
            }

            let mut keys = HashSet::with_capacity(connection.enforced_options.len());
            for option in &connection.enforced_options {
                let key = option.key();
                if !keys.insert(key) {
                    return Err(GraphError::DuplicateOptionKey { connection: id, key });
                }
                if option.option_type.requires_gas() && option.gas == 0 {
                    return Err(GraphError::InvalidGasValue { connection: id, key });
                }
            }
        }

        Ok(())
    }

    /// Derives what has to be read from each endpoint that has outgoing connections.
    ///
    /// Queries are returned in endpoint declaration order, peers in connection declaration order.
    pub fn state_queries(&self) -> Vec<StateQuery> {
        self.endpoints
            .iter()
            .filter_map(|endpoint| {
                let peers = self
                    .connections_from(endpoint)
                    .map(|connection| PeerQuery {
                        peer: connection.to,
                        msg_types: connection.msg_types(),
                    })
                    .collect::<Vec<_>>();

                (!peers.is_empty()).then_some(StateQuery { endpoint: *endpoint, peers })
            })
            .collect()
    }
}
