//! Unified error type for agentkit.
//!
//! Each layer keeps its own error enum; this module folds them into one
//! [`Error`] for applications that do not care which layer failed.

use crate::action::ActionError;
use crate::cdp::CdpError;
use crate::wallet::WalletError;

/// Result type alias for agentkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for agentkit.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Wallet provider error.
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    /// CDP API error.
    #[error("CDP error: {0}")]
    Cdp(#[from] CdpError),

    /// Action dispatch error.
    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the failure came from configuration rather than a remote call.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        match self {
            Self::Wallet(err) => err.is_config(),
            _ => false,
        }
    }
}
