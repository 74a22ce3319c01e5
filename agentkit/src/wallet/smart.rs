//! Smart wallets: CDP contract accounts driven by user operations.

use std::fmt;
use std::sync::Arc;

use alloy::consensus::SignableTransaction;
use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, TxHash, U256};
use alloy::rpc::types::TransactionReceipt;
use tracing::{debug, info, warn};

use super::{
    ChainClient, CdpWalletProvider, ContractRead, EvmWalletProvider, ReceiptOptions,
    TransactionRequest, WalletError, WalletProvider, checksummed, evm_chain, parse_address,
    parse_whole_units,
};
use crate::cdp::{
    CdpApi, CdpClient, CdpConnector, EncodedCall, EvmServerAccount, EvmSmartAccount,
    UserOperation, UserOperationStatus, UserOperationWait,
};
use crate::config::{GasConfig, SmartWalletConfig};
use crate::network::Network;

const NAME: &str = "cdp_evm_smart_wallet_provider";

/// Builder for [`SmartWalletProvider`].
#[derive(Debug)]
pub struct SmartWalletProviderBuilder {
    config: SmartWalletConfig,
    connector: Option<Arc<dyn CdpConnector>>,
    rpc_url: Option<String>,
    chain: Option<ChainClient>,
    wait: UserOperationWait,
}

impl SmartWalletProviderBuilder {
    /// Open CDP sessions through `connector` instead of the HTTP client.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn CdpConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Override the network's default JSON-RPC endpoint.
    #[must_use]
    pub fn rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    /// Use an existing RPC client.
    #[must_use]
    pub fn chain_client(mut self, chain: ChainClient) -> Self {
        self.chain = Some(chain);
        self
    }

    /// How long to wait for each user operation to settle.
    #[must_use]
    pub const fn user_operation_wait(mut self, wait: UserOperationWait) -> Self {
        self.wait = wait;
        self
    }

    /// Validate the configuration and resolve the owner and smart accounts.
    ///
    /// With a configured address the smart account is fetched, then its owner;
    /// otherwise an owner account is created and a smart account deployed for
    /// it. Either way this takes one CDP session.
    ///
    /// # Errors
    ///
    /// Returns a configuration error, or the CDP error if the accounts cannot
    /// be resolved.
    pub fn build(self) -> Result<SmartWalletProvider, WalletError> {
        let Self {
            config,
            connector,
            rpc_url,
            chain,
            wait,
        } = self;

        let keys = config.credentials.require()?;
        let chain_meta = evm_chain(config.network_id())?;
        let network = Network::from(chain_meta);
        let configured = config.address.as_deref().map(parse_address).transpose()?;
        let preferred_owner = config
            .owner_address
            .as_deref()
            .map(parse_address)
            .transpose()?;

        let cdp = match connector {
            Some(connector) => CdpClient::new(keys, connector),
            None => CdpClient::http(keys)?,
        };
        let chain = match chain {
            Some(chain) => chain,
            None => ChainClient::new(rpc_url.as_deref().unwrap_or(chain_meta.rpc_url))?,
        };

        let idempotency_key = config.idempotency_key.as_deref();
        let (smart, owner) = cdp.run(async |api: &dyn CdpApi| match configured {
            Some(address) => {
                let smart = api.get_smart_account(address).await?;
                let owner = api.get_account(select_owner(&smart, preferred_owner)?).await?;
                Ok((smart, owner))
            }
            None => {
                let owner = api.create_account(idempotency_key).await?;
                let smart = api.create_smart_account(owner.address, None).await?;
                Ok((smart, owner))
            }
        })?;

        info!(
            address = %smart.address,
            owner = %owner.address,
            network = %network.network_id,
            provider = NAME,
            "CDP smart wallet initialized",
        );

        Ok(SmartWalletProvider {
            cdp,
            chain,
            network,
            address: smart.address,
            address_display: checksummed(smart.address),
            owner,
            paymaster_url: config.paymaster_url,
            gas: config.gas,
            wait,
        })
    }
}

fn select_owner(smart: &EvmSmartAccount, preferred: Option<Address>) -> Result<Address, WalletError> {
    match preferred {
        Some(owner) if smart.owners.contains(&owner) => Ok(owner),
        Some(owner) => Err(WalletError::Config(format!(
            "{owner} is not an owner of smart account {}",
            smart.address
        ))),
        None => smart.owners.first().copied().ok_or_else(|| {
            WalletError::Config(format!("smart account {} has no owners", smart.address))
        }),
    }
}

/// A wallet backed by a CDP smart account.
///
/// Transfers and transactions are submitted as user operations, optionally
/// sponsored through a paymaster. Signatures come from the owner account.
pub struct SmartWalletProvider {
    cdp: CdpClient,
    chain: ChainClient,
    network: Network,
    address: Address,
    address_display: String,
    owner: EvmServerAccount,
    paymaster_url: Option<String>,
    gas: GasConfig,
    wait: UserOperationWait,
}

impl fmt::Debug for SmartWalletProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartWalletProvider")
            .field("address", &self.address_display)
            .field("owner", &self.owner.address)
            .field("network", &self.network)
            .field("paymaster_url", &self.paymaster_url)
            .finish_non_exhaustive()
    }
}

impl SmartWalletProvider {
    /// Create a builder.
    #[must_use]
    pub fn builder(config: SmartWalletConfig) -> SmartWalletProviderBuilder {
        SmartWalletProviderBuilder {
            config,
            connector: None,
            rpc_url: None,
            chain: None,
            wait: UserOperationWait::default(),
        }
    }

    /// Build a provider from `config` with the default HTTP client and RPC endpoint.
    ///
    /// # Errors
    ///
    /// See [`SmartWalletProviderBuilder::build`].
    pub fn new(config: SmartWalletConfig) -> Result<Self, WalletError> {
        Self::builder(config).build()
    }

    /// The account that owns and signs for the smart account.
    #[must_use]
    pub const fn owner(&self) -> &EvmServerAccount {
        &self.owner
    }

    /// The paymaster user operations are sponsored through, if any.
    #[must_use]
    pub fn paymaster_url(&self) -> Option<&str> {
        self.paymaster_url.as_deref()
    }

    /// Gas multipliers this provider was configured with.
    #[must_use]
    pub const fn gas(&self) -> &GasConfig {
        &self.gas
    }

    /// Submit `calls` as one user operation and wait for it to settle.
    ///
    /// Returns the hash of the transaction that included the operation.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::UserOperationFailed`] if the operation failed or
    /// was dropped, [`WalletError::Transaction`] if it completed without a
    /// transaction hash, or the CDP error.
    pub fn send_user_operation(&self, calls: &[EncodedCall]) -> Result<TxHash, WalletError> {
        let (address, owner) = (self.address, self.owner.address);
        let network = self.network.network_id.as_str();
        let paymaster_url = self.paymaster_url.as_deref();
        let wait = self.wait;

        let op = self.cdp.run(async |api: &dyn CdpApi| {
            let submitted = api
                .send_user_operation(address, owner, network, calls, paymaster_url)
                .await?;
            debug!(user_op_hash = %submitted.user_op_hash, calls = calls.len(), "user operation submitted");
            Ok(api
                .wait_for_user_operation(address, submitted.user_op_hash, wait)
                .await?)
        })?;

        settled_hash(&op)
    }
}

fn settled_hash(op: &UserOperation) -> Result<TxHash, WalletError> {
    match op.status {
        UserOperationStatus::Complete => op.transaction_hash.ok_or_else(|| {
            WalletError::Transaction(format!(
                "user operation {} completed without a transaction hash",
                op.user_op_hash
            ))
        }),
        status => {
            warn!(user_op_hash = %op.user_op_hash, %status, "user operation did not complete");
            Err(WalletError::UserOperationFailed {
                user_op_hash: op.user_op_hash.to_string(),
                status: status.to_string(),
            })
        }
    }
}

impl WalletProvider for SmartWalletProvider {
    fn get_address(&self) -> &str {
        &self.address_display
    }

    fn get_network(&self) -> &Network {
        &self.network
    }

    fn get_name(&self) -> &'static str {
        NAME
    }

    fn supports_network(&self, network: &Network) -> bool {
        network.is_evm()
    }

    fn get_balance(&self) -> Result<U256, WalletError> {
        self.cdp.bridge().block_on(self.chain.balance(self.address))
    }

    fn native_transfer(&self, to: &str, amount: &str) -> Result<TxHash, WalletError> {
        let to = parse_address(to)?;
        let value = parse_whole_units(amount)?;
        self.send_user_operation(&[EncodedCall::new(to).with_value(value)])
    }
}

impl EvmWalletProvider for SmartWalletProvider {
    fn address(&self) -> Address {
        self.address
    }

    fn read_contract(&self, request: &ContractRead) -> Result<serde_json::Value, WalletError> {
        self.cdp.bridge().block_on(self.chain.read_contract(request))
    }

    fn send_transaction(&self, transaction: &TransactionRequest) -> Result<TxHash, WalletError> {
        let call = EncodedCall::new(transaction.to)
            .with_value(transaction.value)
            .with_data(transaction.data.clone());
        self.send_user_operation(&[call])
    }

    fn sign_message(&self, message: &[u8]) -> Result<String, WalletError> {
        let owner = self.owner.address;
        self.cdp
            .run(async |api: &dyn CdpApi| Ok(api.sign_message(owner, message).await?))
    }

    fn sign_typed_data(&self, typed_data: &TypedData) -> Result<String, WalletError> {
        let owner = self.owner.address;
        self.cdp
            .run(async |api: &dyn CdpApi| Ok(api.sign_typed_data(owner, typed_data).await?))
    }

    fn sign_transaction(&self, transaction: &TransactionRequest) -> Result<String, WalletError> {
        let chain_id = self.network.chain_id.ok_or_else(|| {
            WalletError::Config(format!("network '{}' has no chain id", self.network.network_id))
        })?;
        let hash = transaction.to_eip1559(chain_id).signature_hash();
        let owner = self.owner.address;
        self.cdp
            .run(async |api: &dyn CdpApi| Ok(api.sign_hash(owner, hash).await?))
    }

    fn wait_for_transaction_receipt(
        &self,
        hash: TxHash,
        options: ReceiptOptions,
    ) -> Result<TransactionReceipt, WalletError> {
        self.cdp
            .bridge()
            .block_on(self.chain.wait_for_receipt(hash, options))
    }
}

impl CdpWalletProvider for SmartWalletProvider {
    fn cdp_client(&self) -> &CdpClient {
        &self.cdp
    }
}
