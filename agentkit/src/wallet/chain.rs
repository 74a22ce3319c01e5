//! JSON-RPC access shared by all EVM wallet providers.

use std::fmt;

use alloy::network::{Ethereum, TransactionBuilder};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest as RpcTransactionRequest};
use tracing::debug;

use super::{ContractRead, ReceiptOptions, WalletError, abi};

/// Read-side RPC client: balances, contract reads and receipt polling.
#[derive(Clone)]
pub struct ChainClient {
    provider: DynProvider<Ethereum>,
}

impl fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainClient").finish_non_exhaustive()
    }
}

impl ChainClient {
    /// Connect to an HTTP JSON-RPC endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Config`] if `rpc_url` is not a valid URL.
    pub fn new(rpc_url: &str) -> Result<Self, WalletError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e| WalletError::Config(format!("invalid RPC URL '{rpc_url}': {e}")))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self { provider })
    }

    /// Wrap an existing provider.
    #[must_use]
    pub const fn from_provider(provider: DynProvider<Ethereum>) -> Self {
        Self { provider }
    }

    /// The underlying provider.
    #[must_use]
    pub const fn provider(&self) -> &DynProvider<Ethereum> {
        &self.provider
    }

    /// Native balance of `address` at the latest block.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Provider`] on RPC failure.
    pub async fn balance(&self, address: Address) -> Result<U256, WalletError> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| WalletError::provider(format!("eth_getBalance failed: {e}")))
    }

    /// Execute a view call described by `request` and decode the result.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidArgument`] for ABI mismatches and
    /// [`WalletError::Provider`] on RPC failure.
    pub async fn read_contract(&self, request: &ContractRead) -> Result<serde_json::Value, WalletError> {
        let function = abi::find_function(&request.abi, &request.function_name, request.args.len())?;
        let input = abi::encode_call(&function, &request.args)?;
        let tx = RpcTransactionRequest::default()
            .with_to(request.address)
            .with_input(input);

        debug!(contract = %request.address, function = %request.function_name, "eth_call");
        let call = self.provider.call(tx);
        let output = match request.block {
            Some(block) => call.block(block).await,
            None => call.await,
        }
        .map_err(|e| WalletError::provider(format!("eth_call failed: {e}")))?;

        abi::decode_output(&function, &output)
    }

    /// Poll for the receipt of `hash`.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Provider`] on RPC failure and
    /// [`WalletError::Timeout`] once `options.timeout` has elapsed.
    pub async fn wait_for_receipt(
        &self,
        hash: TxHash,
        options: ReceiptOptions,
    ) -> Result<TransactionReceipt, WalletError> {
        let poll = async {
            loop {
                let receipt = self
                    .provider
                    .get_transaction_receipt(hash)
                    .await
                    .map_err(|e| WalletError::provider(format!("eth_getTransactionReceipt failed: {e}")))?;
                if let Some(receipt) = receipt {
                    return Ok(receipt);
                }
                tokio::time::sleep(options.poll_interval).await;
            }
        };

        tokio::time::timeout(options.timeout, poll)
            .await
            .map_err(|_| WalletError::Timeout {
                hash: hash.to_string(),
                timeout: options.timeout,
            })?
    }
}
