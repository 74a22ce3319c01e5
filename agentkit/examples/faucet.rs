//! Fund a CDP server wallet from the testnet faucet.
//!
//! Requires `CDP_API_KEY_ID`, `CDP_API_KEY_SECRET` and `CDP_WALLET_SECRET`;
//! `NETWORK_ID` defaults to `base-sepolia`.

use agentkit::action::{ActionProvider, CdpApiActionProvider, WalletActionProvider};
use agentkit::config::ServerWalletConfig;
use agentkit::wallet::{ServerWalletProvider, WalletProvider};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "agentkit=info".into()))
        .with_target(false)
        .init();

    // Create or load the server account
    let wallet = ServerWalletProvider::new(ServerWalletConfig::default().with_env_fallback())?;

    let faucet = CdpApiActionProvider::new();
    let network = wallet.get_network();
    if !<CdpApiActionProvider as ActionProvider<ServerWalletProvider>>::supports_network(&faucet, network) {
        println!("{network} has no faucet");
        return Ok(());
    }

    let reply = faucet.invoke(&wallet, "request_faucet_funds", json!({ "asset_id": "eth" }))?;
    println!("{reply}");

    let details = WalletActionProvider::new().invoke(&wallet, "get_wallet_details", json!({}))?;
    println!("{details}");

    Ok(())
}
