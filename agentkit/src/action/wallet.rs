//! Basic actions available on every wallet provider.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::{ActionDefinition, ActionError, ActionProvider, parse_args};
use crate::network::{Network, ProtocolFamily};
use crate::wallet::{WalletProvider, format_whole_units};

const NAME: &str = "wallet";

const GET_WALLET_DETAILS: &str = "get_wallet_details";
const NATIVE_TRANSFER: &str = "native_transfer";

/// Arguments of `get_wallet_details` (none).
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GetWalletDetailsArgs {}

/// Arguments of `native_transfer`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NativeTransferArgs {
    /// The destination address to receive the funds.
    pub to: String,
    /// The amount to transfer in whole units, e.g. 1 for 1 ETH.
    pub value: String,
}

/// Wallet details and native transfers for any [`WalletProvider`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WalletActionProvider;

impl WalletActionProvider {
    /// Create the provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Multi-line summary of the wallet; a balance failure is reported inline.
    pub fn get_wallet_details<W: WalletProvider + ?Sized>(&self, wallet: &W) -> String {
        let network = wallet.get_network();
        let balance = match wallet.get_balance() {
            Ok(wei) => format!("{} {}", format_whole_units(wei), native_symbol(network)),
            Err(e) => format!("Error fetching balance: {e}"),
        };
        let chain_id = network
            .chain_id
            .map_or_else(|| "N/A".to_owned(), |id| id.to_string());

        format!(
            "Wallet Details:\n\
             - Provider: {}\n\
             - Address: {}\n\
             - Network:\n  \
             * Protocol Family: {}\n  \
             * Network ID: {}\n  \
             * Chain ID: {chain_id}\n\
             - Native Balance: {balance}",
            wallet.get_name(),
            wallet.get_address(),
            network.protocol_family,
            network.network_id,
        )
    }

    /// Transfer `args.value` whole units of the native asset to `args.to`.
    pub fn native_transfer<W: WalletProvider + ?Sized>(
        &self,
        wallet: &W,
        args: &NativeTransferArgs,
    ) -> String {
        match wallet.native_transfer(&args.to, &args.value) {
            Ok(hash) => format!(
                "Transferred {} {} to {}.\nTransaction hash: {hash}",
                args.value,
                native_symbol(wallet.get_network()),
                args.to
            ),
            Err(e) => format!("Error transferring the asset: {e}"),
        }
    }
}

const fn native_symbol(network: &Network) -> &'static str {
    match network.protocol_family {
        ProtocolFamily::Evm => "ETH",
        ProtocolFamily::Svm => "SOL",
    }
}

impl<W: WalletProvider + ?Sized> ActionProvider<W> for WalletActionProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn actions(&self) -> Vec<ActionDefinition> {
        vec![
            ActionDefinition::new::<GetWalletDetailsArgs>(
                GET_WALLET_DETAILS,
                "Get details about the connected wallet: provider, address, network \
                 (protocol family, network ID, chain ID) and native token balance.",
            ),
            ActionDefinition::new::<NativeTransferArgs>(
                NATIVE_TRANSFER,
                "Transfer native tokens (e.g. ETH) from the connected wallet to a destination \
                 address. The value is given in whole units, so 0.1 means 0.1 ETH. \
                 Returns the transaction hash.",
            ),
        ]
    }

    fn supports_network(&self, _network: &Network) -> bool {
        true
    }

    fn invoke(&self, wallet: &W, action: &str, args: Value) -> Result<String, ActionError> {
        match action {
            GET_WALLET_DETAILS => {
                let GetWalletDetailsArgs {} = parse_args(action, args)?;
                Ok(self.get_wallet_details(wallet))
            }
            NATIVE_TRANSFER => {
                let args: NativeTransferArgs = parse_args(action, args)?;
                Ok(self.native_transfer(wallet, &args))
            }
            _ => Err(ActionError::unknown_action(NAME, action)),
        }
    }
}
