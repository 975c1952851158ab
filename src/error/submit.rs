use alloy::{
    providers::{PendingTransactionError, WatchTxError},
    transports::{RpcError, TransportErrorKind},
};
use std::time::Duration;
use thiserror::Error;

/// Errors that may occur while submitting a plan step to a chain.
///
/// Errors are either transient, and the step is retried with backoff, or terminal, and the step
/// fails immediately. See [`SubmitError::is_transient`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The submission did not complete before its deadline.
    #[error("submission timed out after {0:?}")]
    Timeout(Duration),
    /// The signer nonce was already used or the transaction is already known.
    #[error("nonce collision: {0}")]
    NonceCollision(String),
    /// The RPC endpoint could not be reached.
    #[error("network error: {0}")]
    Network(String),
    /// The transaction reverted.
    #[error("transaction reverted: {0}")]
    Revert(String),
    /// The transaction was signed by a key that is not accepted.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    /// The node rejected the transaction for any other reason.
    #[error("transaction rejected: {0}")]
    Rejected(String),
}

impl SubmitError {
    /// Whether the submission may succeed when retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::NonceCollision(_) | Self::Network(_))
    }

    /// Classifies a failure while waiting for the receipt of a transaction that was watched for
    /// at most `receipt_timeout`.
    pub fn from_receipt_error(err: PendingTransactionError, receipt_timeout: Duration) -> Self {
        match err {
            PendingTransactionError::TransportError(err) => err.into(),
            PendingTransactionError::TxWatcher(WatchTxError::Timeout) => {
                Self::Timeout(receipt_timeout)
            }
            err => Self::Network(err.to_string()),
        }
    }

    /// Classifies a JSON-RPC error message returned by a node.
    fn from_node_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("nonce too low")
            || lower.contains("already known")
            || lower.contains("replacement transaction underpriced")
        {
            Self::NonceCollision(message.to_string())
        } else if lower.contains("revert") {
            Self::Revert(message.to_string())
        } else if lower.contains("invalid signature") || lower.contains("invalid sender") {
            Self::InvalidSignature(message.to_string())
        } else {
            Self::Rejected(message.to_string())
        }
    }
}

impl From<RpcError<TransportErrorKind>> for SubmitError {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        match &err {
            RpcError::ErrorResp(payload) => Self::from_node_message(&payload.message),
            RpcError::Transport(_) | RpcError::NullResp => Self::Network(err.to_string()),
            RpcError::LocalUsageError(_) => Self::InvalidSignature(err.to_string()),
            _ => Self::Rejected(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_node_messages() {
        assert!(matches!(
            SubmitError::from_node_message("nonce too low: next nonce 5, tx nonce 4"),
            SubmitError::NonceCollision(_)
        ));
        assert!(matches!(
            SubmitError::from_node_message("execution reverted: OnlyOwner"),
            SubmitError::Revert(_)
        ));
        assert!(matches!(
            SubmitError::from_node_message("invalid sender"),
            SubmitError::InvalidSignature(_)
        ));
        assert!(matches!(
            SubmitError::from_node_message("insufficient funds for gas * price + value"),
            SubmitError::Rejected(_)
        ));
    }

    #[test]
    fn receipt_timeout_carries_the_watch_deadline() {
        let timeout = Duration::from_secs(120);
        assert_eq!(
            SubmitError::from_receipt_error(
                PendingTransactionError::TxWatcher(WatchTxError::Timeout),
                timeout
            ),
            SubmitError::Timeout(timeout)
        );
        assert!(matches!(
            SubmitError::from_receipt_error(
                PendingTransactionError::TransportError(RpcError::NullResp),
                timeout
            ),
            SubmitError::Network(_)
        ));
    }

    #[test]
    fn only_timeouts_nonces_and_network_are_transient() {
        assert!(SubmitError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(SubmitError::NonceCollision(String::new()).is_transient());
        assert!(SubmitError::Network(String::new()).is_transient());
        assert!(!SubmitError::Revert(String::new()).is_transient());
        assert!(!SubmitError::InvalidSignature(String::new()).is_transient());
        assert!(!SubmitError::Rejected(String::new()).is_transient());
    }
}
