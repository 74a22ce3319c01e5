//! Request and response records exchanged with the CDP API.

use std::fmt;

use alloy::primitives::{Address, B256, Bytes, TxHash, U256};
use serde::{Deserialize, Serialize};

/// API credentials that passed validation.
///
/// All three values are guaranteed non-empty. `Debug` never prints the secrets.
#[derive(Clone)]
pub struct ApiKeys {
    pub(crate) key_id: String,
    pub(crate) key_secret: String,
    pub(crate) wallet_secret: String,
}

impl ApiKeys {
    /// The API key id.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// The API key secret.
    #[must_use]
    pub fn key_secret(&self) -> &str {
        &self.key_secret
    }

    /// The wallet secret used to authorize signing requests.
    #[must_use]
    pub fn wallet_secret(&self) -> &str {
        &self.wallet_secret
    }
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeys")
            .field("key_id", &self.key_id)
            .field("key_secret", &"<redacted>")
            .field("wallet_secret", &"<redacted>")
            .finish()
    }
}

/// An externally owned account held by the custody service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmServerAccount {
    /// Account address.
    pub address: Address,
    /// Optional account name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A smart contract account and the accounts that own it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmSmartAccount {
    /// Smart account address.
    pub address: Address,
    /// Owner account addresses.
    #[serde(default)]
    pub owners: Vec<Address>,
    /// Optional account name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One call inside a user operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedCall {
    /// Call target.
    pub to: Address,
    /// Native value in wei.
    #[serde(default)]
    pub value: U256,
    /// Calldata.
    #[serde(default)]
    pub data: Bytes,
}

impl EncodedCall {
    /// A call with no value and empty calldata.
    #[must_use]
    pub const fn new(to: Address) -> Self {
        Self {
            to,
            value: U256::ZERO,
            data: Bytes::new(),
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
}

/// Lifecycle state of a user operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserOperationStatus {
    /// Prepared but not signed.
    Pending,
    /// Signed, not yet broadcast.
    Signed,
    /// Broadcast to the bundler.
    Broadcast,
    /// Included on chain.
    Complete,
    /// Reverted or rejected.
    Failed,
    /// Dropped by the bundler.
    Dropped,
}

impl UserOperationStatus {
    /// Whether no further transitions can happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Dropped)
    }

    /// Lowercase status name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Signed => "signed",
            Self::Broadcast => "broadcast",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Dropped => "dropped",
        }
    }
}

impl fmt::Display for UserOperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user operation as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    /// User operation hash.
    pub user_op_hash: B256,
    /// Network the operation targets.
    pub network: String,
    /// Current status.
    pub status: UserOperationStatus,
    /// Calls bundled in the operation.
    #[serde(default)]
    pub calls: Vec<EncodedCall>,
    /// Hash of the bundle transaction, once included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<TxHash>,
}

/// Inputs for compiling and deploying an arbitrary Solidity contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDeployment {
    /// Solidity compiler version.
    pub solidity_version: String,
    /// Standard JSON compiler input.
    pub solidity_input_json: String,
    /// Name of the contract to deploy.
    pub contract_name: String,
    /// Constructor arguments keyed by parameter name.
    #[serde(default)]
    pub constructor_args: serde_json::Map<String, serde_json::Value>,
}

/// Result of a contract, NFT or token deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedContract {
    /// Address of the deployed contract.
    pub contract_address: Address,
    /// Deployment transaction hash.
    pub transaction_hash: TxHash,
}

/// Result of an asset trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeResult {
    /// Amount of the destination asset received.
    pub to_amount: String,
    /// Trade transaction hash.
    pub transaction_hash: TxHash,
    /// Block explorer link for the trade.
    pub transaction_link: String,
}

/// Response of the Solana faucet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolanaFaucetResponse {
    /// Signature of the funding transaction.
    pub transaction_signature: String,
}
