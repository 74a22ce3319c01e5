//! Actions backed directly by the CDP API.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{ActionDefinition, ActionError, ActionProvider, parse_args};
use crate::cdp::CdpApi;
use crate::network::{Network, ProtocolFamily};
use crate::wallet::{CdpWalletProvider, parse_address};

const NAME: &str = "cdp_api";

const REQUEST_FAUCET_FUNDS: &str = "request_faucet_funds";

const REQUEST_FAUCET_FUNDS_DESCRIPTION: &str = "\
This tool will request test tokens from the faucet for the default address in the wallet. \
It takes the wallet and asset ID as input. \
Faucet is only allowed on 'base-sepolia', 'ethereum-sepolia' or 'solana-devnet'. \
If fauceting on an EVM network, user can only provide asset ID 'eth', 'usdc', 'eurc' or 'cbbtc', \
if no asset ID is provided, the faucet will default to 'eth'. \
If fauceting on 'solana-devnet', user can only provide asset ID 'sol' or 'usdc', \
if no asset ID is provided, the faucet will default to 'sol'. \
You are not allowed to faucet with any other network or asset ID. \
If you are on another network, suggest that the user sends you some ETH from another wallet \
and provide the user with your wallet details.";

const EVM_FAUCET_NETWORKS: &[&str] = &["base-sepolia", "ethereum-sepolia"];
const EVM_FAUCET_ASSETS: &[&str] = &["eth", "usdc", "eurc", "cbbtc"];
const SVM_FAUCET_NETWORKS: &[&str] = &["solana-devnet"];
const SVM_FAUCET_ASSETS: &[&str] = &["sol", "usdc"];

/// Arguments of `request_faucet_funds`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RequestFaucetFundsArgs {
    /// The optional asset ID to request from the faucet.
    #[serde(default)]
    pub asset_id: Option<String>,
}

/// Testnet faucet funding through the CDP API.
#[derive(Debug, Clone, Copy, Default)]
pub struct CdpApiActionProvider;

impl CdpApiActionProvider {
    /// Create the provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Request testnet funds for the wallet's address.
    ///
    /// Unsupported networks or assets and remote failures are reported in
    /// the returned message; no remote call is made for rejected input.
    pub fn request_faucet_funds<W>(&self, wallet: &W, args: &RequestFaucetFundsArgs) -> String
    where
        W: CdpWalletProvider + ?Sized,
    {
        let network = wallet.get_network();
        let network_id = network.network_id.as_str();

        match network.protocol_family {
            ProtocolFamily::Evm => {
                if !EVM_FAUCET_NETWORKS.contains(&network_id) {
                    return "Error: Faucet is only supported on 'base-sepolia' or 'ethereum-sepolia' evm networks."
                        .to_owned();
                }
                let token = match select_asset(args.asset_id.as_deref(), EVM_FAUCET_ASSETS, network_id) {
                    Ok(token) => token,
                    Err(message) => return message,
                };
                let address = match parse_address(wallet.get_address()) {
                    Ok(address) => address,
                    Err(e) => return format!("Error requesting faucet funds: {e}"),
                };

                debug!(%address, network = network_id, token, "requesting faucet funds");
                let result = wallet
                    .cdp_client()
                    .run(async |api: &dyn CdpApi| Ok(api.request_faucet(address, network_id, token).await?));
                match result {
                    Ok(hash) => format!(
                        "Received {} from the faucet. Transaction hash: {hash}",
                        args.asset_id.as_deref().unwrap_or("ETH")
                    ),
                    Err(e) => {
                        warn!(error = %e, network = network_id, "faucet request failed");
                        format!("Error requesting faucet funds: {e}")
                    }
                }
            }
            ProtocolFamily::Svm => {
                if !SVM_FAUCET_NETWORKS.contains(&network_id) {
                    return "Error: Faucet is only supported on 'solana-devnet' solana networks."
                        .to_owned();
                }
                let token = match select_asset(args.asset_id.as_deref(), SVM_FAUCET_ASSETS, network_id) {
                    Ok(token) => token,
                    Err(message) => return message,
                };
                let address = wallet.get_address();

                debug!(address, network = network_id, token, "requesting faucet funds");
                let result = wallet
                    .cdp_client()
                    .run(async |api: &dyn CdpApi| Ok(api.request_solana_faucet(address, token).await?));
                match result {
                    Ok(response) => format!(
                        "Received {} from the faucet. Transaction signature hash: {}",
                        args.asset_id.as_deref().unwrap_or("SOL"),
                        response.transaction_signature
                    ),
                    Err(e) => {
                        warn!(error = %e, network = network_id, "faucet request failed");
                        format!("Error requesting faucet funds: {e}")
                    }
                }
            }
        }
    }
}

/// The requested asset if whitelisted, the first whitelisted asset when none
/// was requested, or the rejection message.
fn select_asset<'a>(
    requested: Option<&'a str>,
    allowed: &'static [&'static str],
    network_id: &str,
) -> Result<&'a str, String> {
    match requested {
        None => Ok(allowed[0]),
        Some(asset) if allowed.contains(&asset) => Ok(asset),
        Some(asset) => Err(format!(
            "Error: Asset '{asset}' is not supported by the faucet on '{network_id}'. Supported assets: {}.",
            allowed.join(", ")
        )),
    }
}

impl<W: CdpWalletProvider + ?Sized> ActionProvider<W> for CdpApiActionProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn actions(&self) -> Vec<ActionDefinition> {
        vec![ActionDefinition::new::<RequestFaucetFundsArgs>(
            REQUEST_FAUCET_FUNDS,
            REQUEST_FAUCET_FUNDS_DESCRIPTION,
        )]
    }

    fn supports_network(&self, network: &Network) -> bool {
        let id = network.network_id.as_str();
        match network.protocol_family {
            ProtocolFamily::Evm => EVM_FAUCET_NETWORKS.contains(&id),
            ProtocolFamily::Svm => SVM_FAUCET_NETWORKS.contains(&id),
        }
    }

    fn invoke(&self, wallet: &W, action: &str, args: Value) -> Result<String, ActionError> {
        match action {
            REQUEST_FAUCET_FUNDS => {
                let args: RequestFaucetFundsArgs = parse_args(action, args)?;
                Ok(self.request_faucet_funds(wallet, &args))
            }
            _ => Err(ActionError::unknown_action(NAME, action)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use alloy::primitives::{TxHash, U256};
    use serde_json::json;

    use super::*;
    use crate::cdp::CdpClient;
    use crate::config::ServerWalletConfig;
    use crate::testing::{MockCall, MockCdp, SERVER_ADDRESS, TX_HASH, test_credentials};
    use crate::wallet::{ServerWalletProvider, WalletError, WalletProvider};

    const SOLANA_ADDRESS: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

    /// Wallet stub for networks no concrete provider is built for.
    #[derive(Debug)]
    struct StubWallet {
        cdp: CdpClient,
        network: Network,
        address: &'static str,
    }

    impl StubWallet {
        fn solana(mock: &MockCdp, network_id: &str) -> Self {
            Self {
                cdp: mock.client(),
                network: Network::new(ProtocolFamily::Svm, network_id, None),
                address: SOLANA_ADDRESS,
            }
        }

        fn evm(mock: &MockCdp, network_id: &str, chain_id: u64) -> Self {
            Self {
                cdp: mock.client(),
                network: Network::new(ProtocolFamily::Evm, network_id, Some(chain_id)),
                address: "0x1111111111111111111111111111111111111111",
            }
        }
    }

    impl WalletProvider for StubWallet {
        fn get_address(&self) -> &str {
            self.address
        }

        fn get_network(&self) -> &Network {
            &self.network
        }

        fn get_name(&self) -> &'static str {
            "stub_wallet"
        }

        fn supports_network(&self, network: &Network) -> bool {
            network.protocol_family == self.network.protocol_family
        }

        fn get_balance(&self) -> Result<U256, WalletError> {
            Ok(U256::ZERO)
        }

        fn native_transfer(&self, _to: &str, _amount: &str) -> Result<TxHash, WalletError> {
            Err(WalletError::invalid_argument("unsupported"))
        }
    }

    impl CdpWalletProvider for StubWallet {
        fn cdp_client(&self) -> &CdpClient {
            &self.cdp
        }
    }

    fn server_wallet(mock: &MockCdp, network_id: &str) -> ServerWalletProvider {
        let config = ServerWalletConfig {
            credentials: test_credentials(),
            network_id: Some(network_id.into()),
            ..Default::default()
        };
        ServerWalletProvider::builder(config)
            .connector(Arc::new(mock.clone()))
            .build()
            .unwrap()
    }

    fn faucet<W: CdpWalletProvider + ?Sized>(wallet: &W, args: Value) -> String {
        CdpApiActionProvider::new()
            .invoke(wallet, REQUEST_FAUCET_FUNDS, args)
            .unwrap()
    }

    #[test]
    fn test_evm_default_asset() {
        let mock = MockCdp::new();
        let wallet = server_wallet(&mock, "base-sepolia");

        let out = faucet(&wallet, json!({}));
        assert_eq!(
            out,
            format!("Received ETH from the faucet. Transaction hash: {TX_HASH}")
        );
        assert_eq!(
            mock.state.calls().last(),
            Some(&MockCall::Faucet {
                address: SERVER_ADDRESS,
                network: "base-sepolia".into(),
                token: "eth".into(),
            })
        );
    }

    #[test]
    fn test_evm_explicit_asset() {
        let mock = MockCdp::new();
        let wallet = server_wallet(&mock, "ethereum-sepolia");

        let out = faucet(&wallet, json!({ "asset_id": "usdc" }));
        assert_eq!(
            out,
            format!("Received usdc from the faucet. Transaction hash: {TX_HASH}")
        );
        assert!(matches!(
            mock.state.calls().last(),
            Some(MockCall::Faucet { token, .. }) if token == "usdc"
        ));
    }

    #[test]
    fn test_evm_unsupported_network_makes_no_call() {
        let mock = MockCdp::new();
        let wallet = server_wallet(&mock, "base-mainnet");
        let opened = mock.state.opened.load(Ordering::SeqCst);

        assert_eq!(
            faucet(&wallet, json!({})),
            "Error: Faucet is only supported on 'base-sepolia' or 'ethereum-sepolia' evm networks."
        );
        assert_eq!(mock.state.opened.load(Ordering::SeqCst), opened);
    }

    #[test]
    fn test_unlisted_evm_network_is_rejected() {
        let mock = MockCdp::new();
        let wallet = StubWallet::evm(&mock, "polygon", 137);

        assert_eq!(
            faucet(&wallet, json!({})),
            "Error: Faucet is only supported on 'base-sepolia' or 'ethereum-sepolia' evm networks."
        );
        assert!(mock.state.calls().is_empty());
        assert_eq!(mock.state.opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_evm_unsupported_asset_makes_no_call() {
        let mock = MockCdp::new();
        let wallet = server_wallet(&mock, "base-sepolia");
        let opened = mock.state.opened.load(Ordering::SeqCst);

        assert_eq!(
            faucet(&wallet, json!({ "asset_id": "sol" })),
            "Error: Asset 'sol' is not supported by the faucet on 'base-sepolia'. Supported assets: eth, usdc, eurc, cbbtc."
        );
        assert_eq!(mock.state.opened.load(Ordering::SeqCst), opened);
    }

    #[test]
    fn test_remote_failure_is_reported_as_text() {
        let mock = MockCdp::new();
        let wallet = server_wallet(&mock, "base-sepolia");
        mock.state.fail_requests.store(true, Ordering::SeqCst);

        let out = faucet(&wallet, json!({ "asset_id": "eth" }));
        assert!(out.starts_with("Error requesting faucet funds: "), "{out}");
        assert!(out.contains("mock failure"), "{out}");
        assert_eq!(
            mock.state.opened.load(Ordering::SeqCst),
            mock.state.closed.load(Ordering::SeqCst)
        );
    }

    #[test]
    fn test_solana_default_asset() {
        let mock = MockCdp::new();
        let wallet = StubWallet::solana(&mock, "solana-devnet");

        assert_eq!(
            faucet(&wallet, json!({})),
            "Received SOL from the faucet. Transaction signature hash: 5oLanaSig"
        );
        assert_eq!(
            mock.state.calls(),
            vec![MockCall::SolanaFaucet {
                address: SOLANA_ADDRESS.into(),
                token: "sol".into(),
            }]
        );
    }

    #[test]
    fn test_solana_rejections() {
        let mock = MockCdp::new();

        let mainnet = StubWallet::solana(&mock, "solana-mainnet");
        assert_eq!(
            faucet(&mainnet, json!({})),
            "Error: Faucet is only supported on 'solana-devnet' solana networks."
        );

        let devnet = StubWallet::solana(&mock, "solana-devnet");
        assert_eq!(
            faucet(&devnet, json!({ "asset_id": "eth" })),
            "Error: Asset 'eth' is not supported by the faucet on 'solana-devnet'. Supported assets: sol, usdc."
        );
        assert!(mock.state.calls().is_empty());
        assert_eq!(mock.state.opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_supports_network() {
        let provider = CdpApiActionProvider::new();
        let supports = |id: &str| {
            <CdpApiActionProvider as ActionProvider<dyn CdpWalletProvider>>::supports_network(
                &provider,
                &Network::from_id(id).unwrap(),
            )
        };

        assert!(supports("base-sepolia"));
        assert!(supports("ethereum-sepolia"));
        assert!(supports("solana-devnet"));
        assert!(!supports("base-mainnet"));
        assert!(!supports("solana-mainnet"));
        assert!(!supports("polygon-mumbai"));

        let mixed = Network::new(ProtocolFamily::Svm, "base-sepolia", None);
        assert!(!<CdpApiActionProvider as ActionProvider<dyn CdpWalletProvider>>::supports_network(
            &provider, &mixed
        ));
    }

    #[test]
    fn test_invoke_errors() {
        let mock = MockCdp::new();
        let wallet = server_wallet(&mock, "base-sepolia");
        let provider = CdpApiActionProvider::new();

        assert!(matches!(
            provider.invoke(&wallet, "transfer", json!({})),
            Err(ActionError::UnknownAction { .. })
        ));
        assert!(matches!(
            provider.invoke(&wallet, REQUEST_FAUCET_FUNDS, json!({ "asset": "eth" })),
            Err(ActionError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_definition() {
        let actions =
            <CdpApiActionProvider as ActionProvider<dyn CdpWalletProvider>>::actions(&CdpApiActionProvider);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].name, "request_faucet_funds");
        assert!(actions[0].parameters["properties"]["asset_id"].is_object());
    }

    #[test]
    fn test_works_through_trait_objects() {
        let mock = MockCdp::new();
        let wallet: Box<dyn CdpWalletProvider> = Box::new(server_wallet(&mock, "base-sepolia"));
        let provider: &dyn ActionProvider<dyn CdpWalletProvider> = &CdpApiActionProvider;

        let out = provider
            .invoke(wallet.as_ref(), REQUEST_FAUCET_FUNDS, Value::Null)
            .unwrap();
        assert!(out.starts_with("Received ETH"), "{out}");
        assert_eq!(ActionProvider::<dyn CdpWalletProvider>::name(provider), "cdp_api");
    }
}
