//! Client for the Coinbase Developer Platform (CDP) wallet API.
//!
//! The custody service is consumed through the [`CdpApi`] trait. Sessions are
//! short-lived: [`CdpClient`] opens one through its [`CdpConnector`] for every
//! unit of work and closes it before returning, on success and on failure.
//!
//! # Architecture
//!
//! ```text
//! CdpClient (ApiKeys + connector + BlockingBridge)
//!   ├── run(op)           → block on with_session(op)
//!   └── with_session(op)  → connect → op(&dyn CdpApi) → close
//!
//! CdpConnector
//!   └── HttpConnector     → HttpSession (reqwest, one pool per session)
//! ```

mod auth;
mod error;
pub mod http;
mod types;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, B256, Bytes, TxHash};
use async_trait::async_trait;
use tracing::{debug, warn};

pub use auth::{Authenticator, JwtAuthenticator, RequestContext};
pub use error::CdpError;
pub use http::{CDP_API_BASE_URL, HttpConnector};
pub use types::{
    ApiKeys, ContractDeployment, DeployedContract, EncodedCall, EvmServerAccount,
    EvmSmartAccount, SolanaFaucetResponse, TradeResult, UserOperation, UserOperationStatus,
};

use crate::runtime::BlockingBridge;
use crate::wallet::{TransactionRequest, WalletError};

/// Polling parameters for [`CdpApi::wait_for_user_operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserOperationWait {
    /// Give up after this long.
    pub timeout: Duration,
    /// Delay between status checks.
    pub interval: Duration,
}

impl Default for UserOperationWait {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            interval: Duration::from_millis(200),
        }
    }
}

/// Operations offered by the CDP wallet API within one session.
#[async_trait]
pub trait CdpApi: Send + Sync {
    /// Fetch an existing server account by address.
    async fn get_account(&self, address: Address) -> Result<EvmServerAccount, CdpError>;

    /// Create a server account. The idempotency key deduplicates retries.
    async fn create_account(
        &self,
        idempotency_key: Option<&str>,
    ) -> Result<EvmServerAccount, CdpError>;

    /// Fetch an existing smart account by address.
    async fn get_smart_account(&self, address: Address) -> Result<EvmSmartAccount, CdpError>;

    /// Create a smart account owned by `owner`.
    async fn create_smart_account(
        &self,
        owner: Address,
        idempotency_key: Option<&str>,
    ) -> Result<EvmSmartAccount, CdpError>;

    /// Sign and broadcast a transaction from a server account.
    async fn send_transaction(
        &self,
        address: Address,
        network: &str,
        transaction: &TransactionRequest,
    ) -> Result<TxHash, CdpError>;

    /// Prepare, sign with `owner` and submit a user operation for a smart account.
    async fn send_user_operation(
        &self,
        smart_account: Address,
        owner: Address,
        network: &str,
        calls: &[EncodedCall],
        paymaster_url: Option<&str>,
    ) -> Result<UserOperation, CdpError>;

    /// Fetch the current state of a user operation.
    async fn get_user_operation(
        &self,
        smart_account: Address,
        user_op_hash: B256,
    ) -> Result<UserOperation, CdpError>;

    /// Poll a user operation until it reaches a terminal status.
    async fn wait_for_user_operation(
        &self,
        smart_account: Address,
        user_op_hash: B256,
        wait: UserOperationWait,
    ) -> Result<UserOperation, CdpError> {
        let poll = async {
            loop {
                let op = self.get_user_operation(smart_account, user_op_hash).await?;
                if op.status.is_terminal() {
                    return Ok(op);
                }
                debug!(%user_op_hash, status = %op.status, "user operation pending");
                tokio::time::sleep(wait.interval).await;
            }
        };
        tokio::time::timeout(wait.timeout, poll)
            .await
            .map_err(|_| CdpError::Timeout(format!("user operation {user_op_hash}")))?
    }

    /// Sign an EIP-191 message with a server account.
    async fn sign_message(&self, address: Address, message: &[u8]) -> Result<String, CdpError>;

    /// Sign a raw 32-byte hash with a server account.
    async fn sign_hash(&self, address: Address, hash: B256) -> Result<String, CdpError>;

    /// Sign EIP-712 typed data with a server account.
    async fn sign_typed_data(
        &self,
        address: Address,
        typed_data: &TypedData,
    ) -> Result<String, CdpError>;

    /// Sign an unsigned, EIP-2718 encoded transaction with a server account.
    async fn sign_transaction(
        &self,
        address: Address,
        unsigned_transaction: &Bytes,
    ) -> Result<String, CdpError>;

    /// Request testnet funds for an EVM address.
    async fn request_faucet(
        &self,
        address: Address,
        network: &str,
        token: &str,
    ) -> Result<TxHash, CdpError>;

    /// Request devnet funds for a Solana address.
    async fn request_solana_faucet(
        &self,
        address: &str,
        token: &str,
    ) -> Result<SolanaFaucetResponse, CdpError>;

    /// Compile and deploy a Solidity contract from a server account.
    async fn deploy_contract(
        &self,
        address: Address,
        network: &str,
        deployment: &ContractDeployment,
    ) -> Result<DeployedContract, CdpError>;

    /// Deploy an ERC-721 collection.
    async fn deploy_nft(
        &self,
        address: Address,
        network: &str,
        name: &str,
        symbol: &str,
        base_uri: &str,
    ) -> Result<DeployedContract, CdpError>;

    /// Deploy an ERC-20 token.
    async fn deploy_token(
        &self,
        address: Address,
        network: &str,
        name: &str,
        symbol: &str,
        total_supply: &str,
    ) -> Result<DeployedContract, CdpError>;

    /// Trade `amount` of one asset for another.
    async fn trade(
        &self,
        address: Address,
        network: &str,
        amount: &str,
        from_asset_id: &str,
        to_asset_id: &str,
    ) -> Result<TradeResult, CdpError>;

    /// Release the session's resources. Further calls fail with [`CdpError::Closed`].
    async fn close(&self) -> Result<(), CdpError>;
}

/// Opens [`CdpApi`] sessions.
#[async_trait]
pub trait CdpConnector: Send + Sync + fmt::Debug {
    /// Open a new session authenticated with `keys`.
    async fn connect(&self, keys: &ApiKeys) -> Result<Box<dyn CdpApi>, CdpError>;
}

/// Entry point for all CDP calls made by a wallet provider.
///
/// Holds validated credentials and a [`CdpConnector`]; never holds a session
/// between calls.
pub struct CdpClient {
    keys: ApiKeys,
    connector: Arc<dyn CdpConnector>,
    bridge: BlockingBridge,
}

impl fmt::Debug for CdpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdpClient")
            .field("keys", &self.keys)
            .field("connector", &self.connector)
            .finish_non_exhaustive()
    }
}

impl CdpClient {
    /// Create a client that opens sessions through `connector`.
    #[must_use]
    pub fn new(keys: ApiKeys, connector: Arc<dyn CdpConnector>) -> Self {
        Self {
            keys,
            connector,
            bridge: BlockingBridge::new(),
        }
    }

    /// Create a client using the default [`HttpConnector`].
    ///
    /// # Errors
    ///
    /// Returns an error if the default HTTP connector cannot be built.
    pub fn http(keys: ApiKeys) -> Result<Self, WalletError> {
        Ok(Self::new(keys, Arc::new(HttpConnector::new()?)))
    }

    /// The bridge used by [`run`](Self::run).
    #[must_use]
    pub const fn bridge(&self) -> &BlockingBridge {
        &self.bridge
    }

    /// Open a session, run `op` against it and close it.
    ///
    /// The session is closed whether `op` succeeds or fails. When `op` fails
    /// its error is returned and a close failure is only logged; when `op`
    /// succeeds a close failure is returned.
    ///
    /// # Errors
    ///
    /// Returns connection, operation or close errors.
    pub async fn with_session<T, F>(&self, op: F) -> Result<T, WalletError>
    where
        F: AsyncFnOnce(&dyn CdpApi) -> Result<T, WalletError>,
    {
        let session = self.connector.connect(&self.keys).await?;
        debug!("CDP session opened");

        let result = op(session.as_ref()).await;
        let closed = session.close().await;
        drop(session);
        debug!(ok = result.is_ok(), "CDP session closed");

        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(close_err)) => Err(close_err.into()),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                warn!(error = %close_err, "failed to close CDP session after error");
                Err(err)
            }
        }
    }

    /// Blocking form of [`with_session`](Self::with_session).
    ///
    /// # Errors
    ///
    /// Same as [`with_session`](Self::with_session), plus bridge errors.
    pub fn run<T, F>(&self, op: F) -> Result<T, WalletError>
    where
        F: AsyncFnOnce(&dyn CdpApi) -> Result<T, WalletError>,
    {
        self.bridge.block_on(self.with_session(op))
    }
}
