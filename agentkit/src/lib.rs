#![cfg_attr(docsrs, feature(doc_cfg))]
//! Agentkit gives AI agents a wallet: CDP-custodied server and smart
//! accounts or a local key, exposed through one blocking provider interface,
//! plus actions an agent can call against it.
//!
//! # Example
//!
//! ```rust,ignore
//! use agentkit::action::{ActionProvider, CdpApiActionProvider};
//! use agentkit::config::ServerWalletConfig;
//! use agentkit::wallet::ServerWalletProvider;
//!
//! let wallet = ServerWalletProvider::new(ServerWalletConfig::default().with_env_fallback())?;
//! let reply = CdpApiActionProvider.invoke(&wallet, "request_faucet_funds", serde_json::json!({}))?;
//! ```

pub mod action;
pub mod cdp;
pub mod config;
pub mod error;
pub mod network;
pub mod runtime;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
pub use network::{Network, ProtocolFamily};
pub use wallet::{
    CdpWalletProvider, EvmWalletProvider, LocalWalletProvider, ServerWalletProvider,
    SmartWalletProvider, WalletProvider,
};
