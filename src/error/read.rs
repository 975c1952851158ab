use crate::types::{EndpointId, OptionsError};
use std::time::Duration;
use thiserror::Error;

/// Why on-chain state could not be determined.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadFailure {
    /// The read did not complete before its deadline.
    #[error("read timed out after {0:?}")]
    Timeout(Duration),
    /// The RPC endpoint returned an error.
    #[error("rpc error: {0}")]
    Rpc(String),
    /// The returned data could not be decoded.
    #[error("could not decode on-chain data: {0}")]
    Decode(String),
    /// The endpoint was not observed during this run.
    #[error("endpoint was not observed")]
    NotObserved,
}

impl From<OptionsError> for ReadFailure {
    fn from(err: OptionsError) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<alloy::contract::Error> for ReadFailure {
    fn from(err: alloy::contract::Error) -> Self {
        Self::Rpc(err.to_string())
    }
}

/// Error returned by a [`ChainStateReader`](crate::chains::ChainStateReader).
///
/// A reader never returns partial or zero-valued state in place of this error, so callers can
/// tell "peer not registered" apart from "could not determine".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// State of the endpoint could not be read.
    #[error("state of endpoint {eid} is unavailable: {cause}")]
    Unavailable {
        /// The endpoint whose state could not be read.
        eid: EndpointId,
        /// The underlying failure.
        cause: ReadFailure,
    },
}

impl ReadError {
    /// Creates a new [`ReadError::Unavailable`].
    pub fn unavailable(eid: EndpointId, cause: impl Into<ReadFailure>) -> Self {
        Self::Unavailable { eid, cause: cause.into() }
    }

    /// The endpoint whose state could not be read.
    pub fn eid(&self) -> EndpointId {
        match self {
            Self::Unavailable { eid, .. } => *eid,
        }
    }
}
