//! Wallet error types.

use std::time::Duration;

use crate::cdp::CdpError;

/// Errors raised by wallet providers.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WalletError {
    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// One or more CDP credentials were not supplied.
    #[error(
        "missing CDP credentials: {0}. CDP_API_KEY_ID, CDP_API_KEY_SECRET and CDP_WALLET_SECRET are required"
    )]
    MissingCredentials(String),

    /// The network identifier is not in the chain table.
    #[error("unknown network '{0}'")]
    UnknownNetwork(String),

    /// A caller-supplied argument could not be parsed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// JSON-RPC provider failure.
    #[error("provider error: {0}")]
    Provider(String),

    /// Signing failure.
    #[error("signing error: {0}")]
    Signing(String),

    /// Transaction construction or submission failure.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// HD key derivation failure.
    #[error("key derivation error: {0}")]
    Derivation(String),

    /// Failure reported by the CDP API.
    #[error(transparent)]
    Cdp(#[from] CdpError),

    /// A user operation reached a terminal state other than complete.
    #[error("user operation {user_op_hash} ended with status '{status}'")]
    UserOperationFailed {
        /// Hash of the user operation.
        user_op_hash: String,
        /// Terminal status reported by the API.
        status: String,
    },

    /// No receipt appeared before the deadline.
    #[error("transaction {hash} was not mined within {timeout:?}")]
    Timeout {
        /// Transaction hash that was polled.
        hash: String,
        /// Deadline that elapsed.
        timeout: Duration,
    },

    /// The blocking bridge could not run the operation.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl WalletError {
    /// Create an invalid argument error.
    #[must_use]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a provider error.
    #[must_use]
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Whether this error was raised while validating configuration.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::MissingCredentials(_) | Self::UnknownNetwork(_)
        )
    }
}
