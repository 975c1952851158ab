//! Reconciler error types.
use crate::types::EndpointId;
use thiserror::Error;

mod graph;
pub use graph::GraphError;

mod read;
pub use read::{ReadError, ReadFailure};

mod submit;
pub use submit::SubmitError;

/// The overarching error type returned before a reconciliation run starts.
///
/// Failures that happen while a run is in progress are never raised: they are recorded per step
/// in the [`ReconciliationReport`](crate::reconcile::ReconciliationReport).
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The desired graph is invalid.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// No state reader was supplied for a chain that has outgoing connections.
    #[error("no state reader configured for endpoint {0}")]
    MissingReader(EndpointId),
    /// No write adapter was supplied for a chain that has outgoing connections.
    #[error("no write adapter configured for endpoint {0}")]
    MissingWriter(EndpointId),
    /// An internal error occurred.
    #[error(transparent)]
    Internal(#[from] eyre::Error),
}
