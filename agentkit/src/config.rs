//! Configuration for wallet providers.
//!
//! Configuration is resolved once, at startup, and handed to a provider
//! builder. Explicit fields always win; [`with_env_fallback`] fills the gaps
//! from the process environment:
//!
//! | Variable             | Field                             |
//! |----------------------|-----------------------------------|
//! | `CDP_API_KEY_ID`     | [`CdpCredentials::api_key_id`]    |
//! | `CDP_API_KEY_SECRET` | [`CdpCredentials::api_key_secret`]|
//! | `CDP_WALLET_SECRET`  | [`CdpCredentials::wallet_secret`] |
//! | `NETWORK_ID`         | `network_id`                      |
//! | `IDEMPOTENCY_KEY`    | `idempotency_key`                 |
//! | `PRIVATE_KEY`        | [`LocalWalletConfig::private_key`]|
//! | `MNEMONIC_PHRASE`    | [`LocalWalletConfig::mnemonic`]   |
//! | `RPC_URL`            | [`LocalWalletConfig::rpc_url`]    |
//!
//! Tests use `with_fallback` with a closure instead of the real environment.
//!
//! [`with_env_fallback`]: ServerWalletConfig::with_env_fallback

use std::fmt;

use crate::cdp::ApiKeys;
use crate::network::DEFAULT_NETWORK_ID;
use crate::wallet::WalletError;

/// Environment variable holding the CDP API key id.
pub const ENV_API_KEY_ID: &str = "CDP_API_KEY_ID";
/// Environment variable holding the CDP API key secret.
pub const ENV_API_KEY_SECRET: &str = "CDP_API_KEY_SECRET";
/// Environment variable holding the CDP wallet secret.
pub const ENV_WALLET_SECRET: &str = "CDP_WALLET_SECRET";
/// Environment variable holding the network id.
pub const ENV_NETWORK_ID: &str = "NETWORK_ID";
/// Environment variable holding the account-creation idempotency key.
pub const ENV_IDEMPOTENCY_KEY: &str = "IDEMPOTENCY_KEY";
/// Environment variable holding a hex private key.
pub const ENV_PRIVATE_KEY: &str = "PRIVATE_KEY";
/// Environment variable holding a BIP39 mnemonic.
pub const ENV_MNEMONIC: &str = "MNEMONIC_PHRASE";
/// Environment variable holding a JSON-RPC endpoint override.
pub const ENV_RPC_URL: &str = "RPC_URL";

/// Default multiplier applied to gas limit estimates.
pub const DEFAULT_GAS_LIMIT_MULTIPLIER: f64 = 1.2;
/// Default multiplier applied to fee-per-gas estimates.
pub const DEFAULT_FEE_PER_GAS_MULTIPLIER: f64 = 1.0;

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn fill(slot: &mut Option<String>, lookup: &impl Fn(&str) -> Option<String>, name: &str) {
    if slot.is_none() {
        *slot = lookup(name);
    }
}

/// CDP API credentials. All three are required to build a CDP-backed provider.
#[derive(Clone, Default)]
pub struct CdpCredentials {
    /// API key id.
    pub api_key_id: Option<String>,
    /// API key secret.
    pub api_key_secret: Option<String>,
    /// Wallet secret.
    pub wallet_secret: Option<String>,
}

impl fmt::Debug for CdpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdpCredentials")
            .field("api_key_id", &self.api_key_id)
            .field("api_key_secret", &self.api_key_secret.as_ref().map(|_| "<redacted>"))
            .field("wallet_secret", &self.wallet_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl CdpCredentials {
    /// Credentials with all three values set.
    #[must_use]
    pub fn new(
        api_key_id: impl Into<String>,
        api_key_secret: impl Into<String>,
        wallet_secret: impl Into<String>,
    ) -> Self {
        Self {
            api_key_id: Some(api_key_id.into()),
            api_key_secret: Some(api_key_secret.into()),
            wallet_secret: Some(wallet_secret.into()),
        }
    }

    /// Fill missing values using `lookup`.
    #[must_use]
    pub fn with_fallback(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        fill(&mut self.api_key_id, &lookup, ENV_API_KEY_ID);
        fill(&mut self.api_key_secret, &lookup, ENV_API_KEY_SECRET);
        fill(&mut self.wallet_secret, &lookup, ENV_WALLET_SECRET);
        self
    }

    /// Validate that every credential is present and non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::MissingCredentials`] naming the absent values.
    pub fn require(&self) -> Result<ApiKeys, WalletError> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

        let mut missing = Vec::new();
        if !present(&self.api_key_id) {
            missing.push(ENV_API_KEY_ID);
        }
        if !present(&self.api_key_secret) {
            missing.push(ENV_API_KEY_SECRET);
        }
        if !present(&self.wallet_secret) {
            missing.push(ENV_WALLET_SECRET);
        }

        match (&self.api_key_id, &self.api_key_secret, &self.wallet_secret) {
            (Some(id), Some(secret), Some(wallet)) if missing.is_empty() => Ok(ApiKeys {
                key_id: id.clone(),
                key_secret: secret.clone(),
                wallet_secret: wallet.clone(),
            }),
            _ => Err(WalletError::MissingCredentials(missing.join(", "))),
        }
    }
}

/// Gas estimate multipliers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GasConfig {
    /// Multiplier for gas limit estimates (default 1.2).
    pub gas_limit_multiplier: Option<f64>,
    /// Multiplier for fee-per-gas estimates (default 1.0).
    pub fee_per_gas_multiplier: Option<f64>,
}

impl GasConfig {
    /// Effective gas limit multiplier, never below 1.
    #[must_use]
    pub fn gas_limit_multiplier(&self) -> f64 {
        self.gas_limit_multiplier
            .map_or(DEFAULT_GAS_LIMIT_MULTIPLIER, |m| m.max(1.0))
    }

    /// Effective fee-per-gas multiplier, never below 1.
    #[must_use]
    pub fn fee_per_gas_multiplier(&self) -> f64 {
        self.fee_per_gas_multiplier
            .map_or(DEFAULT_FEE_PER_GAS_MULTIPLIER, |m| m.max(1.0))
    }
}

/// Configuration for [`ServerWalletProvider`](crate::wallet::ServerWalletProvider).
#[derive(Debug, Clone, Default)]
pub struct ServerWalletConfig {
    /// CDP credentials.
    pub credentials: CdpCredentials,
    /// Network id; defaults to `base-sepolia`.
    pub network_id: Option<String>,
    /// Existing account address. When absent a new account is created.
    pub address: Option<String>,
    /// Idempotency key for account creation.
    pub idempotency_key: Option<String>,
    /// Gas multipliers.
    pub gas: GasConfig,
}

impl ServerWalletConfig {
    /// Fill missing fields from the process environment.
    #[must_use]
    pub fn with_env_fallback(self) -> Self {
        self.with_fallback(env_lookup)
    }

    /// Fill missing fields using `lookup`.
    #[must_use]
    pub fn with_fallback(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        self.credentials = self.credentials.with_fallback(&lookup);
        fill(&mut self.network_id, &lookup, ENV_NETWORK_ID);
        fill(&mut self.idempotency_key, &lookup, ENV_IDEMPOTENCY_KEY);
        self
    }

    /// The configured network id or the default.
    #[must_use]
    pub fn network_id(&self) -> &str {
        self.network_id.as_deref().unwrap_or(DEFAULT_NETWORK_ID)
    }
}

/// Configuration for [`SmartWalletProvider`](crate::wallet::SmartWalletProvider).
#[derive(Debug, Clone, Default)]
pub struct SmartWalletConfig {
    /// CDP credentials.
    pub credentials: CdpCredentials,
    /// Network id; defaults to `base-sepolia`.
    pub network_id: Option<String>,
    /// Existing smart account address. When absent a new owner and smart account are created.
    pub address: Option<String>,
    /// Owner to select when an existing smart account has several.
    pub owner_address: Option<String>,
    /// Idempotency key for account creation.
    pub idempotency_key: Option<String>,
    /// Gas multipliers.
    pub gas: GasConfig,
    /// Paymaster endpoint for sponsored user operations.
    pub paymaster_url: Option<String>,
}

impl SmartWalletConfig {
    /// Fill missing fields from the process environment.
    #[must_use]
    pub fn with_env_fallback(self) -> Self {
        self.with_fallback(env_lookup)
    }

    /// Fill missing fields using `lookup`.
    #[must_use]
    pub fn with_fallback(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        self.credentials = self.credentials.with_fallback(&lookup);
        fill(&mut self.network_id, &lookup, ENV_NETWORK_ID);
        fill(&mut self.idempotency_key, &lookup, ENV_IDEMPOTENCY_KEY);
        self
    }

    /// The configured network id or the default.
    #[must_use]
    pub fn network_id(&self) -> &str {
        self.network_id.as_deref().unwrap_or(DEFAULT_NETWORK_ID)
    }
}

/// Configuration for [`LocalWalletProvider`](crate::wallet::LocalWalletProvider).
///
/// Either `private_key` or `mnemonic` must be set; the private key wins when both are.
#[derive(Clone, Default)]
pub struct LocalWalletConfig {
    /// Hex private key, with or without `0x`.
    pub private_key: Option<String>,
    /// BIP39 mnemonic phrase.
    pub mnemonic: Option<String>,
    /// BIP39 passphrase.
    pub passphrase: Option<String>,
    /// HD derivation index.
    pub index: u32,
    /// Network id; defaults to `base-sepolia`.
    pub network_id: Option<String>,
    /// JSON-RPC endpoint; defaults to the network's public endpoint.
    pub rpc_url: Option<String>,
    /// Gas multipliers.
    pub gas: GasConfig,
}

impl fmt::Debug for LocalWalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWalletConfig")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("mnemonic", &self.mnemonic.as_ref().map(|_| "<redacted>"))
            .field("index", &self.index)
            .field("network_id", &self.network_id)
            .field("rpc_url", &self.rpc_url)
            .field("gas", &self.gas)
            .finish_non_exhaustive()
    }
}

impl LocalWalletConfig {
    /// Fill missing fields from the process environment.
    #[must_use]
    pub fn with_env_fallback(self) -> Self {
        self.with_fallback(env_lookup)
    }

    /// Fill missing fields using `lookup`.
    #[must_use]
    pub fn with_fallback(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if self.private_key.is_none() && self.mnemonic.is_none() {
            fill(&mut self.private_key, &lookup, ENV_PRIVATE_KEY);
            fill(&mut self.mnemonic, &lookup, ENV_MNEMONIC);
        }
        fill(&mut self.network_id, &lookup, ENV_NETWORK_ID);
        fill(&mut self.rpc_url, &lookup, ENV_RPC_URL);
        self
    }

    /// The configured network id or the default.
    #[must_use]
    pub fn network_id(&self) -> &str {
        self.network_id.as_deref().unwrap_or(DEFAULT_NETWORK_ID)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_require_all_credentials() {
        let keys = CdpCredentials::new("id", "secret", "wallet").require().unwrap();
        assert_eq!(keys.key_id(), "id");
        assert_eq!(keys.wallet_secret(), "wallet");
    }

    #[test]
    fn test_require_reports_each_missing_credential() {
        let creds = CdpCredentials {
            api_key_id: Some("id".into()),
            api_key_secret: None,
            wallet_secret: Some("  ".into()),
        };
        let err = creds.require().unwrap_err();
        let WalletError::MissingCredentials(missing) = err else {
            panic!("expected MissingCredentials");
        };
        assert_eq!(missing, "CDP_API_KEY_SECRET, CDP_WALLET_SECRET");
    }

    #[test]
    fn test_explicit_values_win_over_fallback() {
        let config = ServerWalletConfig {
            credentials: CdpCredentials {
                api_key_id: Some("explicit".into()),
                ..Default::default()
            },
            network_id: Some("base-mainnet".into()),
            ..Default::default()
        }
        .with_fallback(env(&[
            ("CDP_API_KEY_ID", "from-env"),
            ("CDP_API_KEY_SECRET", "env-secret"),
            ("CDP_WALLET_SECRET", "env-wallet"),
            ("NETWORK_ID", "ethereum-sepolia"),
            ("IDEMPOTENCY_KEY", "idem"),
        ]));

        assert_eq!(config.credentials.api_key_id.as_deref(), Some("explicit"));
        assert_eq!(config.credentials.api_key_secret.as_deref(), Some("env-secret"));
        assert_eq!(config.network_id(), "base-mainnet");
        assert_eq!(config.idempotency_key.as_deref(), Some("idem"));
    }

    #[test]
    fn test_default_network() {
        let config = SmartWalletConfig::default().with_fallback(env(&[]));
        assert_eq!(config.network_id(), "base-sepolia");
        assert!(config.credentials.require().is_err());
    }

    #[test]
    fn test_local_config_prefers_explicit_key_source() {
        let config = LocalWalletConfig {
            mnemonic: Some("test test test".into()),
            ..Default::default()
        }
        .with_fallback(env(&[("PRIVATE_KEY", "0xabc"), ("RPC_URL", "http://localhost:8545")]));
        assert!(config.private_key.is_none());
        assert_eq!(config.rpc_url.as_deref(), Some("http://localhost:8545"));
    }

    #[test]
    fn test_gas_multipliers() {
        let gas = GasConfig::default();
        assert!((gas.gas_limit_multiplier() - 1.2).abs() < f64::EPSILON);
        assert!((gas.fee_per_gas_multiplier() - 1.0).abs() < f64::EPSILON);

        let gas = GasConfig {
            gas_limit_multiplier: Some(0.5),
            fee_per_gas_multiplier: Some(1.5),
        };
        assert!((gas.gas_limit_multiplier() - 1.0).abs() < f64::EPSILON);
        assert!((gas.fee_per_gas_multiplier() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", CdpCredentials::new("id", "top-secret", "wallet-secret"));
        assert!(!rendered.contains("top-secret"));
        assert!(!rendered.contains("wallet-secret"));
        assert!(rendered.contains("id"));
    }
}
