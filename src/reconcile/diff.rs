//! Computes what has to change on-chain for each declared connection.

use crate::{
    error::{ReadError, ReadFailure},
    types::{
        ConnectionId, ConnectionSpec, Endpoint, EndpointId, GraphModel, ObservedState, OptionKey,
        OptionValue,
    },
};
use std::collections::HashMap;
use tracing::trace;

/// Observed state per endpoint id, or why it could not be read.
pub type Observations = HashMap<EndpointId, Result<ObservedState, ReadError>>;

/// A single enforced option that has to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionChange {
    /// The option key.
    pub key: OptionKey,
    /// Desired value.
    pub new_value: OptionValue,
    /// Currently enforced value, if any.
    pub previous: Option<OptionValue>,
}

/// The changes required for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDelta {
    /// Endpoint to write to.
    pub endpoint: Endpoint,
    /// The peer of the connection.
    pub peer: Endpoint,
    /// Whether the peer has to be (re-)registered.
    pub peer_registration_needed: bool,
    /// Options to write, in declaration order.
    pub option_changes: Vec<OptionChange>,
}

impl ConnectionDelta {
    /// The connection this delta applies to.
    pub fn connection(&self) -> ConnectionId {
        ConnectionId::new(self.endpoint.eid, self.peer.eid)
    }

    /// Whether the connection is already converged.
    pub fn is_empty(&self) -> bool {
        !self.peer_registration_needed && self.option_changes.is_empty()
    }
}

/// Difference between desired and observed state of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    /// The required changes are known.
    Resolved(ConnectionDelta),
    /// State of the sending endpoint could not be read, so nothing is known about the connection.
    Unresolvable {
        /// The affected connection.
        connection: ConnectionId,
        /// Why the state could not be read.
        cause: ReadError,
    },
}

impl Delta {
    /// The connection this delta applies to.
    pub fn connection(&self) -> ConnectionId {
        match self {
            Self::Resolved(delta) => delta.connection(),
            Self::Unresolvable { connection, .. } => *connection,
        }
    }

    /// Whether nothing has to be done for the connection.
    ///
    /// Unresolvable deltas are never empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Resolved(delta) if delta.is_empty())
    }
}

/// Computes one [`Delta`] per connection of `graph`, in declaration order.
///
/// Connections whose sending endpoint has no successful observation become
/// [`Delta::Unresolvable`]; they are never treated as needing every write.
pub fn diff(graph: &GraphModel, observations: &Observations) -> Vec<Delta> {
    graph
        .connections()
        .iter()
        .map(|connection| match observations.get(&connection.from.eid) {
            Some(Ok(observed)) => Delta::Resolved(diff_connection(connection, observed)),
            Some(Err(cause)) => {
                Delta::Unresolvable { connection: connection.id(), cause: cause.clone() }
            }
            None => Delta::Unresolvable {
                connection: connection.id(),
                cause: ReadError::unavailable(connection.from.eid, ReadFailure::NotObserved),
            },
        })
        .collect()
}

fn diff_connection(connection: &ConnectionSpec, observed: &ObservedState) -> ConnectionDelta {
    let peer = connection.to;

    let option_changes = connection
        .enforced_options
        .iter()
        .filter_map(|option| {
            let key = option.key();
            let new_value = option.value();
            let previous = observed.enforced_option(peer.eid, &key).copied();
            (previous != Some(new_value)).then_some(OptionChange { key, new_value, previous })
        })
        .collect::<Vec<_>>();

    let delta = ConnectionDelta {
        endpoint: connection.from,
        peer,
        peer_registration_needed: !observed.is_peer_registered(&peer),
        option_changes,
    };

    trace!(
        connection = %delta.connection(),
        register = delta.peer_registration_needed,
        option_changes = delta.option_changes.len(),
        "Computed delta"
    );

    delta
}
