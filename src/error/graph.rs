use crate::types::{ConnectionId, EndpointId, OptionKey};
use thiserror::Error;

/// Violations found while validating a [`GraphModel`](crate::types::GraphModel).
///
/// Only the first violation is reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Two contracts were declared on the same chain.
    #[error("endpoint {0} is declared more than once")]
    DuplicateEndpoint(EndpointId),
    /// The same ordered pair of endpoints is connected twice.
    #[error("connection {0} is declared more than once")]
    DuplicateConnection(ConnectionId),
    /// A connection points from an endpoint to itself.
    #[error("connection {0} is a self-loop")]
    SelfLoop(ConnectionId),
    /// A connection references an endpoint that is not part of the graph.
    #[error("connection {connection} references unknown endpoint {eid}")]
    DanglingEndpointReference {
        /// The offending connection.
        connection: ConnectionId,
        /// The endpoint that could not be resolved.
        eid: EndpointId,
    },
    /// The same `(msgType, optionType)` pair is enforced twice on one connection.
    #[error("connection {connection} enforces {key} more than once")]
    DuplicateOptionKey {
        /// The offending connection.
        connection: ConnectionId,
        /// The duplicated key.
        key: OptionKey,
    },
    /// An option that guarantees execution does not carry any gas.
    #[error("connection {connection} enforces {key} with zero gas")]
    InvalidGasValue {
        /// The offending connection.
        connection: ConnectionId,
        /// The key of the option with an invalid gas value.
        key: OptionKey,
    },
}
