//! Server wallets: externally owned accounts custodied by CDP.

use std::fmt;
use std::sync::Arc;

use alloy::consensus::SignableTransaction;
use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionReceipt;
use tracing::{debug, info};

use super::{
    ChainClient, CdpWalletProvider, ContractRead, EvmWalletProvider, ReceiptOptions,
    TransactionRequest, WalletError, WalletProvider, checksummed, evm_chain, parse_address,
    parse_whole_units,
};
use crate::cdp::{CdpApi, CdpClient, CdpConnector, ContractDeployment, DeployedContract};
use crate::config::{GasConfig, ServerWalletConfig};
use crate::network::Network;

const NAME: &str = "cdp_evm_server_wallet_provider";

/// Builder for [`ServerWalletProvider`].
///
/// # Examples
///
/// ```rust,ignore
/// let wallet = ServerWalletProvider::builder(ServerWalletConfig::default().with_env_fallback())
///     .rpc_url("https://base-sepolia.g.alchemy.com/v2/xxx")
///     .build()?;
/// ```
#[derive(Debug)]
pub struct ServerWalletProviderBuilder {
    config: ServerWalletConfig,
    connector: Option<Arc<dyn CdpConnector>>,
    rpc_url: Option<String>,
    chain: Option<ChainClient>,
}

impl ServerWalletProviderBuilder {
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

    /// Validate the configuration and resolve the account.
    ///
    /// Credentials are checked first; the account is then fetched (when an
    /// address is configured) or created in a single CDP session.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::MissingCredentials`], [`WalletError::UnknownNetwork`]
    /// or [`WalletError::Config`] for bad configuration, or the CDP error if the
    /// account cannot be resolved.
    pub fn build(self) -> Result<ServerWalletProvider, WalletError> {
        let Self {
            config,
            connector,
            rpc_url,
            chain,
        } = self;

        let keys = config.credentials.require()?;
        let chain_meta = evm_chain(config.network_id())?;
        let network = Network::from(chain_meta);
        let configured = config.address.as_deref().map(parse_address).transpose()?;

        let cdp = match connector {
            Some(connector) => CdpClient::new(keys, connector),
            None => CdpClient::http(keys)?,
        };
        let chain = match chain {
            Some(chain) => chain,
            None => ChainClient::new(rpc_url.as_deref().unwrap_or(chain_meta.rpc_url))?,
        };

        let idempotency_key = config.idempotency_key.as_deref();
        let account = cdp.run(async |api: &dyn CdpApi| match configured {
            Some(address) => Ok(api.get_account(address).await?),
            None => Ok(api.create_account(idempotency_key).await?),
        })?;

        let address = account.address;
        info!(
            address = %address,
            network = %network.network_id,
            provider = NAME,
            "CDP server wallet initialized",
        );

        Ok(ServerWalletProvider {
            cdp,
            chain,
            network,
            address,
            address_display: checksummed(address),
            gas: config.gas,
        })
    }
}

/// A wallet whose key is held by the CDP custody service.
///
/// Every mutating call and every signature opens its own CDP session. Reads
/// go to the network's JSON-RPC endpoint.
pub struct ServerWalletProvider {
    cdp: CdpClient,
    chain: ChainClient,
    network: Network,
    address: Address,
    address_display: String,
    gas: GasConfig,
}

impl fmt::Debug for ServerWalletProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerWalletProvider")
            .field("address", &self.address_display)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

impl ServerWalletProvider {
    /// Create a builder.
    #[must_use]
    pub fn builder(config: ServerWalletConfig) -> ServerWalletProviderBuilder {
        ServerWalletProviderBuilder {
            config,
            connector: None,
            rpc_url: None,
            chain: None,
        }
    }

    /// Build a provider from `config` with the default HTTP client and RPC endpoint.
    ///
    /// # Errors
    ///
    /// See [`ServerWalletProviderBuilder::build`].
    pub fn new(config: ServerWalletConfig) -> Result<Self, WalletError> {
        Self::builder(config).build()
    }

    /// Gas multipliers this provider was configured with.
    #[must_use]
    pub const fn gas(&self) -> &GasConfig {
        &self.gas
    }

    /// Compile and deploy a Solidity contract.
    ///
    /// # Errors
    ///
    /// Returns the CDP error on failure.
    pub fn deploy_contract(
        &self,
        deployment: &ContractDeployment,
    ) -> Result<DeployedContract, WalletError> {
        let (address, network) = (self.address, self.network.network_id.as_str());
        debug!(contract = %deployment.contract_name, "deploying contract");
        self.cdp.run(async |api: &dyn CdpApi| {
            Ok(api.deploy_contract(address, network, deployment).await?)
        })
    }

    /// Deploy an ERC-721 collection.
    ///
    /// # Errors
    ///
    /// Returns the CDP error on failure.
    pub fn deploy_nft(
        &self,
        name: &str,
        symbol: &str,
        base_uri: &str,
    ) -> Result<DeployedContract, WalletError> {
        let (address, network) = (self.address, self.network.network_id.as_str());
        self.cdp.run(async |api: &dyn CdpApi| {
            Ok(api.deploy_nft(address, network, name, symbol, base_uri).await?)
        })
    }

    /// Deploy an ERC-20 token.
    ///
    /// # Errors
    ///
    /// Returns the CDP error on failure.
    pub fn deploy_token(
        &self,
        name: &str,
        symbol: &str,
        total_supply: &str,
    ) -> Result<DeployedContract, WalletError> {
        let (address, network) = (self.address, self.network.network_id.as_str());
        self.cdp.run(async |api: &dyn CdpApi| {
            Ok(api.deploy_token(address, network, name, symbol, total_supply).await?)
        })
    }

    /// Trade `amount` of `from_asset_id` for `to_asset_id` and describe the result.
    ///
    /// # Errors
    ///
    /// Returns the CDP error on failure.
    pub fn trade(
        &self,
        amount: &str,
        from_asset_id: &str,
        to_asset_id: &str,
    ) -> Result<String, WalletError> {
        let (address, network) = (self.address, self.network.network_id.as_str());
        let result = self.cdp.run(async |api: &dyn CdpApi| {
            Ok(api
                .trade(address, network, amount, from_asset_id, to_asset_id)
                .await?)
        })?;

        Ok(format!(
            "Traded {amount} of {from_asset_id} for {} of {to_asset_id}.\n\
             Transaction hash for the trade: {}\n\
             Transaction link for the trade: {}",
            result.to_amount, result.transaction_hash, result.transaction_link
        ))
    }
}

impl WalletProvider for ServerWalletProvider {
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
        self.send_transaction(&TransactionRequest::new(to).with_value(value))
    }
}

impl EvmWalletProvider for ServerWalletProvider {
    fn address(&self) -> Address {
        self.address
    }

    fn read_contract(&self, request: &ContractRead) -> Result<serde_json::Value, WalletError> {
        self.cdp.bridge().block_on(self.chain.read_contract(request))
    }

    fn send_transaction(&self, transaction: &TransactionRequest) -> Result<TxHash, WalletError> {
        let (address, network) = (self.address, self.network.network_id.as_str());
        let hash = self.cdp.run(async |api: &dyn CdpApi| {
            Ok(api.send_transaction(address, network, transaction).await?)
        })?;
        debug!(%hash, to = %transaction.to, "transaction submitted");
        Ok(hash)
    }

    fn sign_message(&self, message: &[u8]) -> Result<String, WalletError> {
        let address = self.address;
        self.cdp
            .run(async |api: &dyn CdpApi| Ok(api.sign_message(address, message).await?))
    }

    fn sign_typed_data(&self, typed_data: &TypedData) -> Result<String, WalletError> {
        let address = self.address;
        self.cdp
            .run(async |api: &dyn CdpApi| Ok(api.sign_typed_data(address, typed_data).await?))
    }

    fn sign_transaction(&self, transaction: &TransactionRequest) -> Result<String, WalletError> {
        let chain_id = self.network.chain_id.ok_or_else(|| {
            WalletError::Config(format!("network '{}' has no chain id", self.network.network_id))
        })?;
        let unsigned = Bytes::from(transaction.to_eip1559(chain_id).encoded_for_signing());
        let address = self.address;
        self.cdp
            .run(async |api: &dyn CdpApi| Ok(api.sign_transaction(address, &unsigned).await?))
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

impl CdpWalletProvider for ServerWalletProvider {
    fn cdp_client(&self) -> &CdpClient {
        &self.cdp
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use alloy::providers::{Provider, ProviderBuilder};
    use alloy::transports::mock::Asserter;

    use super::*;
    use crate::cdp::CdpError;
    use crate::config::CdpCredentials;
    use crate::testing::{MockCall, MockCdp, SERVER_ADDRESS, TX_HASH, test_credentials};

    fn config() -> ServerWalletConfig {
        ServerWalletConfig {
            credentials: test_credentials(),
            idempotency_key: Some("idem-1".into()),
            ..Default::default()
        }
    }

    fn build(mock: &MockCdp, config: ServerWalletConfig) -> Result<ServerWalletProvider, WalletError> {
        ServerWalletProvider::builder(config)
            .connector(Arc::new(mock.clone()))
            .build()
    }

    #[test]
    fn test_missing_credentials_fail_before_any_session() {
        let mock = MockCdp::new();
        let config = ServerWalletConfig {
            credentials: CdpCredentials {
                api_key_id: Some("id".into()),
                ..Default::default()
            },
            ..Default::default()
        };

        let err = build(&mock, config).unwrap_err();
        assert!(matches!(err, WalletError::MissingCredentials(_)));
        assert!(err.is_config());
        assert_eq!(mock.state.opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_network_fails_before_any_session() {
        let mock = MockCdp::new();
        let config = ServerWalletConfig {
            network_id: Some("moonbase".into()),
            ..config()
        };

        assert!(matches!(build(&mock, config), Err(WalletError::UnknownNetwork(_))));
        assert_eq!(mock.state.opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_creates_account_with_idempotency_key() {
        let mock = MockCdp::new();
        let wallet = build(&mock, config()).unwrap();

        assert_eq!(mock.state.calls(), vec![MockCall::CreateAccount(Some("idem-1".into()))]);
        assert_eq!(wallet.get_address(), SERVER_ADDRESS.to_checksum(None));
        assert_eq!(wallet.get_name(), "cdp_evm_server_wallet_provider");
        assert_eq!(wallet.get_network().network_id, "base-sepolia");
        assert_eq!(wallet.get_network().chain_id, Some(84_532));
        assert_eq!(mock.state.opened.load(Ordering::SeqCst), 1);
        assert_eq!(mock.state.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fetches_configured_account() {
        let mock = MockCdp::new();
        let existing = "0x4444444444444444444444444444444444444444";
        let wallet = build(
            &mock,
            ServerWalletConfig {
                address: Some(existing.into()),
                ..config()
            },
        )
        .unwrap();

        assert_eq!(mock.state.calls(), vec![MockCall::GetAccount(existing.parse().unwrap())]);
        assert_eq!(wallet.address(), existing.parse::<Address>().unwrap());
    }

    #[test]
    fn test_address_is_stable() {
        let mock = MockCdp::new();
        let wallet = build(&mock, config()).unwrap();
        let first = wallet.get_address().to_owned();
        wallet.sign_message(b"hello").unwrap();
        assert_eq!(wallet.get_address(), first);
    }

    #[test]
    fn test_native_transfer_converts_whole_units() {
        let mock = MockCdp::new();
        let wallet = build(&mock, config()).unwrap();
        let to = "0x5555555555555555555555555555555555555555";

        let hash = wallet.native_transfer(to, "1.5").unwrap();
        assert_eq!(hash, TX_HASH);

        let calls = mock.state.calls();
        let Some(MockCall::SendTransaction {
            address,
            network,
            transaction,
        }) = calls.last()
        else {
            panic!("expected a transaction, got {calls:?}");
        };
        assert_eq!(*address, SERVER_ADDRESS);
        assert_eq!(network, "base-sepolia");
        assert_eq!(transaction.to, to.parse::<Address>().unwrap());
        assert_eq!(transaction.value, U256::from(1_500_000_000_000_000_000_u128));
        assert_eq!(mock.state.opened.load(Ordering::SeqCst), 2);
        assert_eq!(mock.state.closed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalid_transfer_input_opens_no_session() {
        let mock = MockCdp::new();
        let wallet = build(&mock, config()).unwrap();

        assert!(matches!(
            wallet.native_transfer("0x5555555555555555555555555555555555555555", "lots"),
            Err(WalletError::InvalidArgument(_))
        ));
        assert!(matches!(
            wallet.native_transfer("not-an-address", "1"),
            Err(WalletError::InvalidArgument(_))
        ));
        assert_eq!(mock.state.opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_call_still_closes_session() {
        let mock = MockCdp::new();
        let wallet = build(&mock, config()).unwrap();
        mock.state.fail_requests.store(true, Ordering::SeqCst);

        let err = wallet
            .native_transfer("0x5555555555555555555555555555555555555555", "1")
            .unwrap_err();
        assert!(matches!(err, WalletError::Cdp(CdpError::Api { .. })));
        assert_eq!(
            mock.state.opened.load(Ordering::SeqCst),
            mock.state.closed.load(Ordering::SeqCst)
        );
    }

    #[test]
    fn test_sign_transaction_sends_unsigned_eip1559_payload() {
        let mock = MockCdp::new();
        let wallet = build(&mock, config()).unwrap();
        let tx = TransactionRequest::new(SERVER_ADDRESS)
            .with_nonce(1)
            .with_gas_limit(21_000)
            .with_fees(2_000_000_000, 1_000_000_000);

        assert_eq!(wallet.sign_transaction(&tx).unwrap(), "0xtx-signature");
        let calls = mock.state.calls();
        let Some(MockCall::SignTransaction(address, payload)) = calls.last() else {
            panic!("expected a signing call, got {calls:?}");
        };
        assert_eq!(*address, SERVER_ADDRESS);
        assert_eq!(payload.first(), Some(&0x02));
    }

    #[test]
    fn test_trade_summary() {
        let mock = MockCdp::new();
        let wallet = build(&mock, config()).unwrap();

        let summary = wallet.trade("1", "eth", "usdc").unwrap();
        let lines: Vec<_> = summary.lines().collect();
        assert_eq!(lines[0], "Traded 1 of eth for 42.5 of usdc.");
        assert_eq!(lines[1], format!("Transaction hash for the trade: {TX_HASH}"));
        assert_eq!(
            lines[2],
            "Transaction link for the trade: https://sepolia.basescan.org/tx/0xaa"
        );
    }

    #[test]
    fn test_deployments_go_through_cdp() {
        let mock = MockCdp::new();
        let wallet = build(&mock, config()).unwrap();

        wallet.deploy_token("Agent", "AGT", "1000000").unwrap();
        let deployed = wallet.deploy_nft("Agents", "AGN", "ipfs://base/").unwrap();
        assert_eq!(deployed.transaction_hash, TX_HASH);

        let calls = mock.state.calls();
        assert!(calls.contains(&MockCall::DeployToken("Agent".into())));
        assert!(calls.contains(&MockCall::DeployNft("Agents".into())));
    }

    #[test]
    fn test_balance_reads_from_rpc() {
        let mock = MockCdp::new();
        let asserter = Asserter::new();
        let provider = ProviderBuilder::new()
            .connect_mocked_client(asserter.clone())
            .erased();
        let wallet = ServerWalletProvider::builder(config())
            .connector(Arc::new(mock.clone()))
            .chain_client(ChainClient::from_provider(provider))
            .build()
            .unwrap();

        asserter.push_success(&U256::from(5_u64));
        assert_eq!(wallet.get_balance().unwrap(), U256::from(5_u64));
    }
}
