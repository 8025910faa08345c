//! Error types for the swap follower

use thiserror::Error;

/// Main error type for the follower
#[derive(Error, Debug)]
pub enum FollowerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Swap resource unavailable at {url}: {message}")]
    ResourceUnavailable { url: String, message: String },

    #[error("Action '{action}' not listed on swap")]
    ActionNotFound { action: String },

    #[error("Timeout waiting for {awaiting}")]
    Timeout { awaiting: String },

    #[error("Timed out waiting for action '{action}' to become available")]
    ActionTimeout { action: String },

    #[error("Timed out waiting for event '{event}' to appear")]
    EventTimeout { event: String },

    #[error("Transaction {tx_id} rejected by the chain")]
    TransactionRejected { tx_id: String },

    #[error("Could not acquire account lock {path} after {attempts} attempts")]
    LockTimeout { path: String, attempts: u32 },

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Unsupported ledger payload '{kind}' for this wallet set")]
    UnsupportedPayload { kind: String },

    #[error("Malformed document from {url}: {message}")]
    MalformedDocument { url: String, message: String },

    #[error("Order state mismatch: {0}")]
    OrderState(String),

    #[error("{count} swap(s) still active, expected none")]
    ActiveSwapsRemain { count: usize },
}

impl FollowerError {
    /// Conditions a poll loop may keep retrying on its next tick.
    ///
    /// `ActionNotFound` means the daemon has not yet advertised the action;
    /// `ResourceUnavailable` means the daemon or network hiccupped. Everything
    /// else is terminal for the current assertion.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FollowerError::ResourceUnavailable { .. } | FollowerError::ActionNotFound { .. }
        )
    }
}

/// Result type for follower operations
pub type FollowerResult<T> = Result<T, FollowerError>;
