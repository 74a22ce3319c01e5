//! Local wallets: a private key held in process.
//!
//! The key comes from a hex private key or is derived from a BIP39 mnemonic
//! with [`kobe`]. Signing is done locally by an alloy [`PrivateKeySigner`];
//! transactions are filled and broadcast through an alloy provider carrying
//! the same signer.

use std::fmt;

use alloy::consensus::SignableTransaction;
use alloy::dyn_abi::TypedData;
use alloy::network::{Ethereum, TransactionBuilder};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest as RpcTransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::{Signer, SignerSync};
use tracing::{debug, info};

use super::{
    ChainClient, ContractRead, EvmWalletProvider, ReceiptOptions, TransactionRequest,
    WalletError, WalletProvider, checksummed, evm_chain, parse_address, parse_whole_units,
    signature_hex,
};
use crate::config::{GasConfig, LocalWalletConfig};
use crate::network::Network;
use crate::runtime::BlockingBridge;

const NAME: &str = "eth_account_wallet_provider";

/// Builder for [`LocalWalletProvider`].
///
/// # Examples
///
/// ```rust,ignore
/// let wallet = LocalWalletProvider::builder(LocalWalletConfig {
///     mnemonic: Some("abandon abandon ...".into()),
///     network_id: Some("base-sepolia".into()),
///     ..Default::default()
/// })
/// .build()?;
/// ```
pub struct LocalWalletProviderBuilder {
    config: LocalWalletConfig,
    provider: Option<DynProvider<Ethereum>>,
}

impl fmt::Debug for LocalWalletProviderBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWalletProviderBuilder")
            .field("config", &self.config)
            .field("provider", &self.provider.is_some())
            .finish()
    }
}

impl LocalWalletProviderBuilder {
    /// Use an existing provider instead of connecting to the RPC endpoint.
    ///
    /// The provider must already carry a wallet filler for this key.
    #[must_use]
    pub fn provider(mut self, provider: DynProvider<Ethereum>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Derive the signer and connect the provider.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Config`] when no key source is configured or the
    /// private key is malformed, [`WalletError::Derivation`] for a bad
    /// mnemonic, and [`WalletError::UnknownNetwork`] for an unknown network.
    pub fn build(self) -> Result<LocalWalletProvider, WalletError> {
        let Self { config, provider } = self;

        let chain_meta = evm_chain(config.network_id())?;
        let network = Network::from(chain_meta);

        let mut signer = if let Some(key) = config.private_key.as_deref() {
            signer_from_private_key(key)?
        } else if let Some(mnemonic) = config.mnemonic.as_deref() {
            signer_from_mnemonic(mnemonic, config.passphrase.as_deref(), config.index)?
        } else {
            return Err(WalletError::Config(
                "either private_key or mnemonic is required".into(),
            ));
        };
        signer.set_chain_id(network.chain_id);
        let address = signer.address();

        let provider = match provider {
            Some(provider) => provider,
            None => {
                let rpc_url = config.rpc_url.as_deref().unwrap_or(chain_meta.rpc_url);
                let url: url::Url = rpc_url.parse().map_err(|e| {
                    WalletError::Config(format!("invalid RPC URL '{rpc_url}': {e}"))
                })?;
                ProviderBuilder::new()
                    .wallet(signer.clone())
                    .connect_http(url)
                    .erased()
            }
        };

        info!(
            address = %address,
            chain_id = network.chain_id,
            network = %network.network_id,
            provider = NAME,
            "local wallet initialized",
        );

        Ok(LocalWalletProvider {
            signer,
            chain: ChainClient::from_provider(provider),
            bridge: BlockingBridge::new(),
            network,
            address,
            address_display: checksummed(address),
            gas: config.gas,
        })
    }
}

/// Derive a signer from a BIP39 mnemonic using kobe.
fn signer_from_mnemonic(
    mnemonic: &str,
    passphrase: Option<&str>,
    index: u32,
) -> Result<PrivateKeySigner, WalletError> {
    let wallet = kobe::Wallet::from_mnemonic(mnemonic, passphrase)
        .map_err(|e| WalletError::Derivation(format!("invalid mnemonic: {e}")))?;

    let derived = kobe_eth::Deriver::new(&wallet)
        .derive(index)
        .map_err(|e| WalletError::Derivation(format!("key derivation failed: {e}")))?;

    derived
        .private_key_hex
        .parse::<PrivateKeySigner>()
        .map_err(|e| WalletError::Derivation(format!("signer creation failed: {e}")))
}

fn signer_from_private_key(key: &str) -> Result<PrivateKeySigner, WalletError> {
    let key = key.trim();
    let key = key.strip_prefix("0x").unwrap_or(key);
    key.parse::<PrivateKeySigner>()
        .map_err(|e| WalletError::Config(format!("invalid private key: {e}")))
}

/// Multiply an estimate, rounding up.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn scale<T: Into<u128>>(estimate: T, multiplier: f64) -> u128 {
    (estimate.into() as f64 * multiplier).ceil() as u128
}

/// A wallet signing with a key held in this process.
pub struct LocalWalletProvider {
    signer: PrivateKeySigner,
    chain: ChainClient,
    bridge: BlockingBridge,
    network: Network,
    address: Address,
    address_display: String,
    gas: GasConfig,
}

impl fmt::Debug for LocalWalletProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWalletProvider")
            .field("address", &self.address_display)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

impl LocalWalletProvider {
    /// Create a builder.
    #[must_use]
    pub const fn builder(config: LocalWalletConfig) -> LocalWalletProviderBuilder {
        LocalWalletProviderBuilder {
            config,
            provider: None,
        }
    }

    /// Build a provider from `config`.
    ///
    /// # Errors
    ///
    /// See [`LocalWalletProviderBuilder::build`].
    pub fn new(config: LocalWalletConfig) -> Result<Self, WalletError> {
        Self::builder(config).build()
    }

    /// The local signer.
    #[must_use]
    pub const fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    /// Fill gas limit, fees and chain id the way [`submit`](Self::submit) sends them.
    ///
    /// Estimates are scaled by the configured multipliers; explicit values are
    /// used as given.
    async fn prepare(
        &self,
        transaction: &TransactionRequest,
    ) -> Result<RpcTransactionRequest, WalletError> {
        let provider = self.chain.provider();
        let mut request = RpcTransactionRequest::default()
            .with_from(self.address)
            .with_to(transaction.to)
            .with_value(transaction.value)
            .with_input(transaction.data.clone());
        if let Some(chain_id) = self.network.chain_id {
            request.set_chain_id(chain_id);
        }
        if let Some(nonce) = transaction.nonce {
            request.set_nonce(nonce);
        }

        let gas_limit = match transaction.gas_limit {
            Some(limit) => limit,
            None => {
                let estimate = provider
                    .estimate_gas(request.clone())
                    .await
                    .map_err(|e| WalletError::Transaction(format!("gas estimation failed: {e}")))?;
                u64::try_from(scale(estimate, self.gas.gas_limit_multiplier())).unwrap_or(u64::MAX)
            }
        };
        request.set_gas_limit(gas_limit);

        match (transaction.max_fee_per_gas, transaction.max_priority_fee_per_gas) {
            (Some(max_fee), Some(priority_fee)) => {
                request.set_max_fee_per_gas(max_fee);
                request.set_max_priority_fee_per_gas(priority_fee);
            }
            _ => {
                let fees = provider
                    .estimate_eip1559_fees()
                    .await
                    .map_err(|e| WalletError::Transaction(format!("fee estimation failed: {e}")))?;
                let multiplier = self.gas.fee_per_gas_multiplier();
                request.set_max_fee_per_gas(scale(fees.max_fee_per_gas, multiplier));
                request.set_max_priority_fee_per_gas(scale(fees.max_priority_fee_per_gas, multiplier));
            }
        }
        Ok(request)
    }

    async fn submit(&self, transaction: &TransactionRequest) -> Result<TxHash, WalletError> {
        let request = self.prepare(transaction).await?;
        let gas_limit = request.gas;
        let pending = self
            .chain
            .provider()
            .send_transaction(request)
            .await
            .map_err(|e| WalletError::Transaction(format!("send failed: {e}")))?;
        let hash = *pending.tx_hash();
        debug!(%hash, to = %transaction.to, gas_limit, "transaction broadcast");
        Ok(hash)
    }
}

impl WalletProvider for LocalWalletProvider {
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
        self.bridge.block_on(self.chain.balance(self.address))
    }

    fn native_transfer(&self, to: &str, amount: &str) -> Result<TxHash, WalletError> {
        let to = parse_address(to)?;
        let value = parse_whole_units(amount)?;
        self.send_transaction(&TransactionRequest::new(to).with_value(value))
    }
}

impl EvmWalletProvider for LocalWalletProvider {
    fn address(&self) -> Address {
        self.address
    }

    fn read_contract(&self, request: &ContractRead) -> Result<serde_json::Value, WalletError> {
        self.bridge.block_on(self.chain.read_contract(request))
    }

    fn send_transaction(&self, transaction: &TransactionRequest) -> Result<TxHash, WalletError> {
        self.bridge.block_on(self.submit(transaction))
    }

    fn sign_message(&self, message: &[u8]) -> Result<String, WalletError> {
        let signature = self
            .signer
            .sign_message_sync(message)
            .map_err(|e| WalletError::Signing(format!("message signing failed: {e}")))?;
        Ok(signature_hex(signature.as_bytes()))
    }

    fn sign_typed_data(&self, typed_data: &TypedData) -> Result<String, WalletError> {
        let hash = typed_data
            .eip712_signing_hash()
            .map_err(|e| WalletError::Signing(format!("invalid typed data: {e}")))?;
        let signature = self
            .signer
            .sign_hash_sync(&hash)
            .map_err(|e| WalletError::Signing(format!("typed data signing failed: {e}")))?;
        Ok(signature_hex(signature.as_bytes()))
    }

    fn sign_transaction(&self, transaction: &TransactionRequest) -> Result<String, WalletError> {
        let chain_id = self.network.chain_id.ok_or_else(|| {
            WalletError::Config(format!("network '{}' has no chain id", self.network.network_id))
        })?;
        let hash = transaction.to_eip1559(chain_id).signature_hash();
        let signature = self
            .signer
            .sign_hash_sync(&hash)
            .map_err(|e| WalletError::Signing(format!("transaction signing failed: {e}")))?;
        Ok(signature_hex(signature.as_bytes()))
    }

    fn wait_for_transaction_receipt(
        &self,
        hash: TxHash,
        options: ReceiptOptions,
    ) -> Result<TransactionReceipt, WalletError> {
        self.bridge.block_on(self.chain.wait_for_receipt(hash, options))
    }
}
