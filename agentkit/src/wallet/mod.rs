//! Wallet providers that let agents hold and move funds.
//!
//! Every backend implements the chain-agnostic [`WalletProvider`] trait and,
//! for EVM networks, [`EvmWalletProvider`]. Agent frameworks hold an
//! `Arc<dyn EvmWalletProvider>` and never learn which backend is behind it.
//!
//! # Architecture
//!
//! ```text
//! WalletProvider (address, network, balance, native transfer)
//!   └── EvmWalletProvider (contract reads, transactions, signing, receipts)
//!         ├── ServerWalletProvider → CDP server account (EOA held by CDP)
//!         ├── SmartWalletProvider  → CDP smart account (user operations)
//!         └── LocalWalletProvider  → alloy PrivateKeySigner (key in process)
//! ```
//!
//! All methods block. Remote work runs on a
//! [`BlockingBridge`](crate::runtime::BlockingBridge); CDP calls go through a
//! fresh session per call.
//!
//! # Examples
//!
//! ```rust,ignore
//! use agentkit::config::ServerWalletConfig;
//! use agentkit::wallet::{ServerWalletProvider, WalletProvider};
//!
//! let config = ServerWalletConfig::default().with_env_fallback();
//! let wallet = ServerWalletProvider::new(config)?;
//!
//! println!("{} on {}", wallet.get_address(), wallet.get_network().network_id);
//! let tx_hash = wallet.native_transfer("0xRecipient...", "0.01")?;
//! ```

pub mod abi;
mod chain;
mod error;
mod local;
mod server;
mod smart;

use std::fmt;
use std::time::Duration;

use alloy::consensus::TxEip1559;
use alloy::dyn_abi::TypedData;
use alloy::eips::BlockId;
use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::{Address, Bytes, TxHash, TxKind, U256};
use alloy::rpc::types::TransactionReceipt;
use serde::{Deserialize, Serialize};

pub use chain::ChainClient;
pub use error::WalletError;
pub use local::{LocalWalletProvider, LocalWalletProviderBuilder};
pub use server::{ServerWalletProvider, ServerWalletProviderBuilder};
pub use smart::{SmartWalletProvider, SmartWalletProviderBuilder};

use crate::cdp::CdpClient;
use crate::network::{Chain, Network, ProtocolFamily, chain_for};

/// Chain-agnostic wallet capabilities.
pub trait WalletProvider: Send + Sync + fmt::Debug {
    /// Display form of the wallet address (EIP-55 checksummed for EVM).
    fn get_address(&self) -> &str;

    /// The network this provider is bound to.
    fn get_network(&self) -> &Network;

    /// Stable backend identifier.
    fn get_name(&self) -> &'static str;

    /// Whether this provider can operate on `network`.
    fn supports_network(&self, network: &Network) -> bool;

    /// Native balance in base units (wei for EVM).
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Provider`] if the RPC endpoint fails.
    fn get_balance(&self) -> Result<U256, WalletError>;

    /// Transfer `amount` whole native units (e.g. `"1.5"` ETH) to `to`.
    ///
    /// Returns the transaction hash once the backend accepted the transfer.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidArgument`] for malformed input, or the
    /// backend's error.
    fn native_transfer(&self, to: &str, amount: &str) -> Result<TxHash, WalletError>;
}

/// EVM-specific wallet capabilities.
pub trait EvmWalletProvider: WalletProvider {
    /// The wallet address.
    fn address(&self) -> Address;

    /// Call a view function and decode its result.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidArgument`] for ABI or argument mismatches
    /// and [`WalletError::Provider`] for RPC failures.
    fn read_contract(&self, request: &ContractRead) -> Result<serde_json::Value, WalletError>;

    /// Submit a transaction and return its hash.
    ///
    /// # Errors
    ///
    /// Returns the backend's submission error.
    fn send_transaction(&self, transaction: &TransactionRequest) -> Result<TxHash, WalletError>;

    /// Sign an EIP-191 personal message.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Signing`] or the backend's error.
    fn sign_message(&self, message: &[u8]) -> Result<String, WalletError>;

    /// Sign EIP-712 typed data.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Signing`] or the backend's error.
    fn sign_typed_data(&self, typed_data: &TypedData) -> Result<String, WalletError>;

    /// Sign an EIP-1559 transaction without broadcasting it.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Signing`] or the backend's error.
    fn sign_transaction(&self, transaction: &TransactionRequest) -> Result<String, WalletError>;

    /// Poll until `hash` has a receipt.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Timeout`] after `options.timeout`, or RPC errors.
    fn wait_for_transaction_receipt(
        &self,
        hash: TxHash,
        options: ReceiptOptions,
    ) -> Result<TransactionReceipt, WalletError>;
}

/// A wallet provider whose account lives in the CDP custody service.
///
/// Actions that call CDP directly (such as the faucet) reuse the provider's
/// client so they share its credentials and bridge.
pub trait CdpWalletProvider: WalletProvider {
    /// The client the provider opens CDP sessions with.
    fn cdp_client(&self) -> &CdpClient;
}

/// A transaction to submit or sign.
///
/// Only `to`, `value` and `data` are used for submission; the fee and nonce
/// fields are consulted by [`EvmWalletProvider::sign_transaction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Recipient or contract address.
    pub to: Address,
    /// Native value in wei.
    #[serde(default)]
    pub value: U256,
    /// Calldata.
    #[serde(default)]
    pub data: Bytes,
    /// Sender nonce.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    /// Gas limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    /// EIP-1559 max fee per gas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<u128>,
    /// EIP-1559 max priority fee per gas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<u128>,
}

impl TransactionRequest {
    /// A call to `to` with no value and empty calldata.
    #[must_use]
    pub const fn new(to: Address) -> Self {
        Self {
            to,
            value: U256::ZERO,
            data: Bytes::new(),
            nonce: None,
            gas_limit: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
        }
    }

    /// Set the native value.
    #[must_use]
    pub const fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Set the calldata.
    #[must_use]
    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    /// Set the nonce.
    #[must_use]
    pub const fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Set the gas limit.
    #[must_use]
    pub const fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    /// Set both EIP-1559 fee fields.
    #[must_use]
    pub const fn with_fees(mut self, max_fee_per_gas: u128, max_priority_fee_per_gas: u128) -> Self {
        self.max_fee_per_gas = Some(max_fee_per_gas);
        self.max_priority_fee_per_gas = Some(max_priority_fee_per_gas);
        self
    }

    /// Build an unsigned EIP-1559 transaction. Unset fields are zero.
    #[must_use]
    pub fn to_eip1559(&self, chain_id: u64) -> TxEip1559 {
        TxEip1559 {
            chain_id,
            nonce: self.nonce.unwrap_or_default(),
            gas_limit: self.gas_limit.unwrap_or_default(),
            max_fee_per_gas: self.max_fee_per_gas.unwrap_or_default(),
            max_priority_fee_per_gas: self.max_priority_fee_per_gas.unwrap_or_default(),
            to: TxKind::Call(self.to),
            value: self.value,
            access_list: Default::default(),
            input: self.data.clone(),
        }
    }
}

/// A view-function call against a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRead {
    /// Contract address.
    pub address: Address,
    /// Contract ABI in JSON form (an array of ABI items).
    pub abi: serde_json::Value,
    /// Name of the function to call.
    pub function_name: String,
    /// Arguments, coerced to the function's parameter types.
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    /// Block to read at; latest when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<BlockId>,
}

impl ContractRead {
    /// Read `function_name` from `address` at the latest block with no arguments.
    #[must_use]
    pub fn new(address: Address, abi: serde_json::Value, function_name: impl Into<String>) -> Self {
        Self {
            address,
            abi,
            function_name: function_name.into(),
            args: Vec::new(),
            block: None,
        }
    }

    /// Set the call arguments.
    #[must_use]
    pub fn with_args(mut self, args: Vec<serde_json::Value>) -> Self {
        self.args = args;
        self
    }

    /// Read at a specific block.
    #[must_use]
    pub const fn at_block(mut self, block: BlockId) -> Self {
        self.block = Some(block);
        self
    }
}

/// Receipt polling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptOptions {
    /// Give up after this long (default 120 s).
    pub timeout: Duration,
    /// Delay between polls (default 100 ms).
    pub poll_interval: Duration,
}

impl Default for ReceiptOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Parse an EVM address supplied by a caller.
///
/// # Errors
///
/// Returns [`WalletError::InvalidArgument`] if `address` is not a hex address.
pub fn parse_address(address: &str) -> Result<Address, WalletError> {
    address
        .trim()
        .parse()
        .map_err(|e| WalletError::invalid_argument(format!("invalid address '{address}': {e}")))
}

/// Convert a decimal amount of whole ETH (e.g. `"1.5"`) to wei.
///
/// # Errors
///
/// Returns [`WalletError::InvalidArgument`] for malformed or negative amounts.
pub fn parse_whole_units(amount: &str) -> Result<U256, WalletError> {
    let trimmed = amount.trim();
    if trimmed.starts_with('-') {
        return Err(WalletError::invalid_argument(format!(
            "invalid amount '{amount}': must not be negative"
        )));
    }
    parse_ether(trimmed)
        .map_err(|e| WalletError::invalid_argument(format!("invalid amount '{amount}': {e}")))
}

/// Format a wei amount as whole ETH.
#[must_use]
pub fn format_whole_units(wei: U256) -> String {
    format_ether(wei)
}

/// Look up `network_id` and require it to be an EVM chain.
pub(crate) fn evm_chain(network_id: &str) -> Result<&'static Chain, WalletError> {
    let chain = chain_for(network_id)?;
    if chain.protocol_family != ProtocolFamily::Evm {
        return Err(WalletError::Config(format!(
            "network '{network_id}' is not an EVM network"
        )));
    }
    Ok(chain)
}

/// Checksummed display form of an address.
pub(crate) fn checksummed(address: Address) -> String {
    address.to_checksum(None)
}

/// Hex-encode a signature as `0x`-prefixed string.
pub(crate) fn signature_hex(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", alloy::primitives::hex::encode(bytes))
}
