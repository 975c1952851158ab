//! Reconciler constants.

use std::time::Duration;

/// Maximum number of submission attempts for a single plan step, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Delay before the first retry of a transiently failed submission.
///
/// Doubles on every subsequent retry, up to [`DEFAULT_MAX_BACKOFF`].
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Upper bound for the delay between two submission attempts.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Deadline for a single RPC call (state read or transaction submission).
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to wait for a submitted transaction to be included.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// LayerZero executor options format version.
pub const OPTIONS_TYPE_3: u16 = 3;

/// LayerZero worker id of the executor.
pub const EXECUTOR_WORKER_ID: u8 = 1;

/// Environment variable holding the default signer key, used when a chain does not configure
/// its own.
pub const SIGNER_KEY_ENV: &str = "OMNIWIRE_SIGNER_KEY";
