//! Actions an agent can invoke against a wallet.
//!
//! An [`ActionProvider`] groups related actions, advertises them as
//! [`ActionDefinition`]s with a JSON schema for their arguments, and executes
//! them by name. Argument JSON is validated by deserializing into the action's
//! argument struct; domain failures come back as plain strings so the agent
//! can read them, while malformed calls are [`ActionError`]s.

pub mod cdp_api;
mod error;
pub mod wallet;

use std::fmt;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub use cdp_api::{CdpApiActionProvider, RequestFaucetFundsArgs};
pub use error::ActionError;
pub use wallet::{GetWalletDetailsArgs, NativeTransferArgs, WalletActionProvider};

use crate::network::Network;

/// Name, description and argument schema of one action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionDefinition {
    /// Action name used with [`ActionProvider::invoke`].
    pub name: String,
    /// Human readable description shown to the model.
    pub description: String,
    /// JSON schema of the argument object.
    pub parameters: Value,
}

impl ActionDefinition {
    /// Build a definition whose parameters are generated from `T`.
    #[must_use]
    pub fn new<T: JsonSchema>(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: schemars::schema_for!(T).to_value(),
        }
    }
}

/// A named group of actions usable with wallets of type `W`.
pub trait ActionProvider<W: ?Sized>: Send + Sync + fmt::Debug {
    /// Provider name.
    fn name(&self) -> &'static str;

    /// Definitions of every action this provider exposes.
    fn actions(&self) -> Vec<ActionDefinition>;

    /// Whether the provider's actions can run on `network`.
    fn supports_network(&self, network: &Network) -> bool;

    /// Run `action` with JSON `args` against `wallet`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::UnknownAction`] for names not listed by
    /// [`actions`](Self::actions) and [`ActionError::InvalidArguments`] when
    /// `args` does not match the action's schema.
    fn invoke(&self, wallet: &W, action: &str, args: Value) -> Result<String, ActionError>;
}

/// Deserialize the arguments of `action`, treating `null` as `{}`.
///
/// # Errors
///
/// Returns [`ActionError::InvalidArguments`] if `args` does not fit `T`.
pub fn parse_args<T: DeserializeOwned>(action: &str, args: Value) -> Result<T, ActionError> {
    let args = if args.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| ActionError::invalid_arguments(action, e))
}
