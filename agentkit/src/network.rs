//! Network descriptors and the static chain table.
//!
//! Every wallet provider is bound to exactly one [`Network`], resolved from a
//! network identifier such as `"base-sepolia"` through [`chain_for`].
//!
//! ```rust,ignore
//! use agentkit::network::{Network, ProtocolFamily};
//!
//! let network = Network::from_id("base-sepolia")?;
//! assert_eq!(network.protocol_family, ProtocolFamily::Evm);
//! assert_eq!(network.chain_id, Some(84_532));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::wallet::WalletError;

/// Network used when neither configuration nor environment names one.
pub const DEFAULT_NETWORK_ID: &str = "base-sepolia";

/// Protocol family of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolFamily {
    /// Ethereum virtual machine chains.
    Evm,
    /// Solana virtual machine chains.
    Svm,
}

impl ProtocolFamily {
    /// Lowercase identifier (`"evm"` or `"svm"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Evm => "evm",
            Self::Svm => "svm",
        }
    }
}

impl fmt::Display for ProtocolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static metadata for one entry of the chain table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chain {
    /// Network identifier, e.g. `"base-sepolia"`.
    pub network_id: &'static str,
    /// Protocol family of the chain.
    pub protocol_family: ProtocolFamily,
    /// EIP-155 chain id. `None` for non-EVM chains.
    pub chain_id: Option<u64>,
    /// Default public JSON-RPC endpoint.
    pub rpc_url: &'static str,
}

const CHAINS: &[Chain] = &[
    Chain {
        network_id: "base-mainnet",
        protocol_family: ProtocolFamily::Evm,
        chain_id: Some(8453),
        rpc_url: "https://mainnet.base.org",
    },
    Chain {
        network_id: "base-sepolia",
        protocol_family: ProtocolFamily::Evm,
        chain_id: Some(84_532),
        rpc_url: "https://sepolia.base.org",
    },
    Chain {
        network_id: "ethereum-mainnet",
        protocol_family: ProtocolFamily::Evm,
        chain_id: Some(1),
        rpc_url: "https://eth.merkle.io",
    },
    Chain {
        network_id: "ethereum-sepolia",
        protocol_family: ProtocolFamily::Evm,
        chain_id: Some(11_155_111),
        rpc_url: "https://sepolia.drpc.org",
    },
    Chain {
        network_id: "polygon-mainnet",
        protocol_family: ProtocolFamily::Evm,
        chain_id: Some(137),
        rpc_url: "https://polygon-rpc.com",
    },
    Chain {
        network_id: "polygon-mumbai",
        protocol_family: ProtocolFamily::Evm,
        chain_id: Some(80_001),
        rpc_url: "https://rpc.ankr.com/polygon_mumbai",
    },
    Chain {
        network_id: "arbitrum-mainnet",
        protocol_family: ProtocolFamily::Evm,
        chain_id: Some(42_161),
        rpc_url: "https://arb1.arbitrum.io/rpc",
    },
    Chain {
        network_id: "arbitrum-sepolia",
        protocol_family: ProtocolFamily::Evm,
        chain_id: Some(421_614),
        rpc_url: "https://sepolia-rollup.arbitrum.io/rpc",
    },
    Chain {
        network_id: "optimism-mainnet",
        protocol_family: ProtocolFamily::Evm,
        chain_id: Some(10),
        rpc_url: "https://mainnet.optimism.io",
    },
    Chain {
        network_id: "optimism-sepolia",
        protocol_family: ProtocolFamily::Evm,
        chain_id: Some(11_155_420),
        rpc_url: "https://sepolia.optimism.io",
    },
    Chain {
        network_id: "solana-mainnet",
        protocol_family: ProtocolFamily::Svm,
        chain_id: None,
        rpc_url: "https://api.mainnet-beta.solana.com",
    },
    Chain {
        network_id: "solana-devnet",
        protocol_family: ProtocolFamily::Svm,
        chain_id: None,
        rpc_url: "https://api.devnet.solana.com",
    },
];

/// Look up a chain by network identifier.
///
/// # Errors
///
/// Returns [`WalletError::UnknownNetwork`] if the identifier is not in the table.
pub fn chain_for(network_id: &str) -> Result<&'static Chain, WalletError> {
    CHAINS
        .iter()
        .find(|chain| chain.network_id == network_id)
        .ok_or_else(|| WalletError::UnknownNetwork(network_id.to_owned()))
}

/// All known chains.
#[must_use]
pub const fn chains() -> &'static [Chain] {
    CHAINS
}

/// The network a wallet provider is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Network {
    /// Protocol family.
    pub protocol_family: ProtocolFamily,
    /// Network identifier, e.g. `"base-sepolia"`.
    pub network_id: String,
    /// EIP-155 chain id, absent for non-EVM networks.
    pub chain_id: Option<u64>,
}

impl Network {
    /// Create a network descriptor without consulting the chain table.
    #[must_use]
    pub fn new(
        protocol_family: ProtocolFamily,
        network_id: impl Into<String>,
        chain_id: Option<u64>,
    ) -> Self {
        Self {
            protocol_family,
            network_id: network_id.into(),
            chain_id,
        }
    }

    /// Resolve a network descriptor from the chain table.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::UnknownNetwork`] for identifiers missing from the table.
    pub fn from_id(network_id: &str) -> Result<Self, WalletError> {
        chain_for(network_id).map(Self::from)
    }

    /// Whether this is an EVM network.
    #[must_use]
    pub fn is_evm(&self) -> bool {
        self.protocol_family == ProtocolFamily::Evm
    }
}

impl From<&Chain> for Network {
    fn from(chain: &Chain) -> Self {
        Self::new(chain.protocol_family, chain.network_id, chain.chain_id)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.chain_id {
            Some(id) => write!(f, "{}:{} ({id})", self.protocol_family, self.network_id),
            None => write!(f, "{}:{}", self.protocol_family, self.network_id),
        }
    }
}
