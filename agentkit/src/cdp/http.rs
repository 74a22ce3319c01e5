//! HTTP implementation of [`CdpApi`] over the CDP v2 REST API.
//!
//! Each [`HttpSession`] owns its own `reqwest::Client`, so closing and
//! dropping a session releases its connection pool. Credentials are attached
//! by an [`Authenticator`]; [`JwtAuthenticator`] is the default.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use alloy::consensus::SignableTransaction;
use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, B256, Bytes, TxHash, hex};
use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::HeaderName;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use super::auth::{Authenticator, JwtAuthenticator, RequestContext};
use super::{
    ApiKeys, CdpApi, CdpConnector, CdpError, ContractDeployment, DeployedContract, EncodedCall,
    EvmServerAccount, EvmSmartAccount, SolanaFaucetResponse, TradeResult, UserOperation,
};
use crate::network::chain_for;
use crate::wallet::{TransactionRequest, WalletError};

/// Default CDP API base URL.
pub const CDP_API_BASE_URL: &str = "https://api.cdp.coinbase.com/platform";

const IDEMPOTENCY_HEADER: HeaderName = HeaderName::from_static("x-idempotency-key");

/// Opens [`HttpSession`]s against the CDP REST API.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    base_url: Arc<str>,
    auth: Arc<dyn Authenticator>,
    timeout: Option<Duration>,
}

impl HttpConnector {
    /// Connector for the public CDP API with [`JwtAuthenticator`].
    ///
    /// # Errors
    ///
    /// See [`with_base_url`](Self::with_base_url).
    pub fn new() -> Result<Self, WalletError> {
        Self::with_base_url(CDP_API_BASE_URL)
    }

    /// Connector for a custom base URL.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Config`] if `base_url` is not an absolute HTTP(S) URL.
    pub fn with_base_url(base_url: &str) -> Result<Self, WalletError> {
        let parsed: url::Url = base_url
            .parse()
            .map_err(|e| WalletError::Config(format!("invalid CDP base URL '{base_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(WalletError::Config(format!(
                "CDP base URL '{base_url}' must use http or https"
            )));
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').into(),
            auth: Arc::new(JwtAuthenticator::new()),
            timeout: Some(Duration::from_secs(60)),
        })
    }

    /// Attach credentials with `auth` instead of [`JwtAuthenticator`].
    #[must_use]
    pub fn authenticator(mut self, auth: Arc<dyn Authenticator>) -> Self {
        self.auth = auth;
        self
    }

    /// Per-request timeout (default 60 s). `None` disables it.
    #[must_use]
    pub const fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CdpConnector for HttpConnector {
    async fn connect(&self, keys: &ApiKeys) -> Result<Box<dyn CdpApi>, CdpError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder = builder.user_agent(concat!("agentkit-rust/", env!("CARGO_PKG_VERSION")));

        Ok(Box::new(HttpSession {
            client: builder.build()?,
            base_url: Arc::clone(&self.base_url),
            auth: Arc::clone(&self.auth),
            keys: keys.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Per-request options.
#[derive(Debug, Clone, Copy, Default)]
struct Options<'a> {
    wallet_auth: bool,
    idempotency_key: Option<&'a str>,
}

impl<'a> Options<'a> {
    const READ: Self = Self {
        wallet_auth: false,
        idempotency_key: None,
    };
    const WALLET: Self = Self {
        wallet_auth: true,
        idempotency_key: None,
    };

    const fn idempotent(key: Option<&'a str>) -> Self {
        Self {
            wallet_auth: true,
            idempotency_key: key,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureResponse {
    signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignedTransactionResponse {
    signed_transaction: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionHashResponse {
    transaction_hash: TxHash,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error_message: Option<String>,
    error_type: Option<String>,
}

/// Pull a readable message out of an error response body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error_message: Some(message),
            error_type,
        }) => match error_type {
            Some(kind) => format!("{kind}: {message}"),
            None => message,
        },
        _ if body.trim().is_empty() => "empty response body".into(),
        _ => body.trim().to_owned(),
    }
}

/// Hex-encode an unsigned EIP-1559 transaction for `network`.
fn encode_unsigned(network: &str, transaction: &TransactionRequest) -> Result<String, CdpError> {
    let chain_id = chain_for(network)
        .ok()
        .and_then(|chain| chain.chain_id)
        .ok_or_else(|| CdpError::Other(format!("network '{network}' has no chain id")))?;
    Ok(hex::encode_prefixed(
        transaction.to_eip1559(chain_id).encoded_for_signing(),
    ))
}

/// Encode a message for the signing endpoint: UTF-8 text as is, anything else as hex.
fn message_payload(message: &[u8]) -> String {
    std::str::from_utf8(message).map_or_else(|_| hex::encode_prefixed(message), str::to_owned)
}

fn calls_payload(calls: &[EncodedCall]) -> Value {
    Value::Array(
        calls
            .iter()
            .map(|call| {
                json!({
                    "to": call.to,
                    "value": call.value.to_string(),
                    "data": call.data,
                })
            })
            .collect(),
    )
}

/// One authenticated session against the CDP REST API.
pub struct HttpSession {
    client: reqwest::Client,
    base_url: Arc<str>,
    auth: Arc<dyn Authenticator>,
    keys: ApiKeys,
    closed: AtomicBool,
}

impl fmt::Debug for HttpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSession")
            .field("base_url", &self.base_url)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl HttpSession {
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: Options<'_>,
    ) -> Result<T, CdpError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CdpError::Closed);
        }

        let url = format!("{}{path}", self.base_url);
        let context = RequestContext {
            method: &method,
            url: &url,
            path,
            body: body.as_ref(),
            wallet_auth: options.wallet_auth,
        };
        let headers = self.auth.headers(&self.keys, &context)?;

        let mut request = self.client.request(method.clone(), &url).headers(headers);
        if method == Method::POST {
            let key = options
                .idempotency_key
                .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_owned);
            request = request.header(IDEMPOTENCY_HEADER, key);
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        debug!(%method, path, "CDP request");
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CdpError::api(status.as_u16(), error_message(&text)));
        }
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, CdpError> {
        self.request(Method::GET, path, None, Options::READ).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
        options: Options<'_>,
    ) -> Result<T, CdpError> {
        self.request(Method::POST, path, Some(body), options).await
    }
}

#[async_trait]
impl CdpApi for HttpSession {
    async fn get_account(&self, address: Address) -> Result<EvmServerAccount, CdpError> {
        self.get(&format!("/v2/evm/accounts/{address}")).await
    }

    async fn create_account(
        &self,
        idempotency_key: Option<&str>,
    ) -> Result<EvmServerAccount, CdpError> {
        self.post("/v2/evm/accounts", json!({}), Options::idempotent(idempotency_key))
            .await
    }

    async fn get_smart_account(&self, address: Address) -> Result<EvmSmartAccount, CdpError> {
        self.get(&format!("/v2/evm/smart-accounts/{address}")).await
    }

    async fn create_smart_account(
        &self,
        owner: Address,
        idempotency_key: Option<&str>,
    ) -> Result<EvmSmartAccount, CdpError> {
        self.post(
            "/v2/evm/smart-accounts",
            json!({ "owners": [owner] }),
            Options::idempotent(idempotency_key),
        )
        .await
    }

    async fn send_transaction(
        &self,
        address: Address,
        network: &str,
        transaction: &TransactionRequest,
    ) -> Result<TxHash, CdpError> {
        let body = json!({
            "network": network,
            "transaction": encode_unsigned(network, transaction)?,
        });
        let response: TransactionHashResponse = self
            .post(
                &format!("/v2/evm/accounts/{address}/send/transaction"),
                body,
                Options::WALLET,
            )
            .await?;
        Ok(response.transaction_hash)
    }

    async fn send_user_operation(
        &self,
        smart_account: Address,
        owner: Address,
        network: &str,
        calls: &[EncodedCall],
        paymaster_url: Option<&str>,
    ) -> Result<UserOperation, CdpError> {
        let mut body = json!({
            "network": network,
            "calls": calls_payload(calls),
        });
        if let Some(url) = paymaster_url {
            body["paymasterUrl"] = json!(url);
        }
        let prepared: UserOperation = self
            .post(
                &format!("/v2/evm/smart-accounts/{smart_account}/user-operations"),
                body,
                Options::READ,
            )
            .await?;

        let signature = self.sign_hash(owner, prepared.user_op_hash).await?;
        self.post(
            &format!(
                "/v2/evm/smart-accounts/{smart_account}/user-operations/{}/send",
                prepared.user_op_hash
            ),
            json!({ "signature": signature }),
            Options::READ,
        )
        .await
    }

    async fn get_user_operation(
        &self,
        smart_account: Address,
        user_op_hash: B256,
    ) -> Result<UserOperation, CdpError> {
        self.get(&format!(
            "/v2/evm/smart-accounts/{smart_account}/user-operations/{user_op_hash}"
        ))
        .await
    }

    async fn sign_message(&self, address: Address, message: &[u8]) -> Result<String, CdpError> {
        let response: SignatureResponse = self
            .post(
                &format!("/v2/evm/accounts/{address}/sign/message"),
                json!({ "message": message_payload(message) }),
                Options::WALLET,
            )
            .await?;
        Ok(response.signature)
    }

    async fn sign_hash(&self, address: Address, hash: B256) -> Result<String, CdpError> {
        let response: SignatureResponse = self
            .post(
                &format!("/v2/evm/accounts/{address}/sign"),
                json!({ "hash": hash }),
                Options::WALLET,
            )
            .await?;
        Ok(response.signature)
    }

    async fn sign_typed_data(
        &self,
        address: Address,
        typed_data: &TypedData,
    ) -> Result<String, CdpError> {
        let response: SignatureResponse = self
            .post(
                &format!("/v2/evm/accounts/{address}/sign/typed-data"),
                serde_json::to_value(typed_data)?,
                Options::WALLET,
            )
            .await?;
        Ok(response.signature)
    }

    async fn sign_transaction(
        &self,
        address: Address,
        unsigned_transaction: &Bytes,
    ) -> Result<String, CdpError> {
        let response: SignedTransactionResponse = self
            .post(
                &format!("/v2/evm/accounts/{address}/sign/transaction"),
                json!({ "transaction": unsigned_transaction }),
                Options::WALLET,
            )
            .await?;
        Ok(response.signed_transaction)
    }

    async fn request_faucet(
        &self,
        address: Address,
        network: &str,
        token: &str,
    ) -> Result<TxHash, CdpError> {
        let response: TransactionHashResponse = self
            .post(
                "/v2/evm/faucet",
                json!({ "address": address, "network": network, "token": token }),
                Options::READ,
            )
            .await?;
        Ok(response.transaction_hash)
    }

    async fn request_solana_faucet(
        &self,
        address: &str,
        token: &str,
    ) -> Result<SolanaFaucetResponse, CdpError> {
        self.post(
            "/v2/solana/faucet",
            json!({ "address": address, "token": token }),
            Options::READ,
        )
        .await
    }

    async fn deploy_contract(
        &self,
        address: Address,
        network: &str,
        deployment: &ContractDeployment,
    ) -> Result<DeployedContract, CdpError> {
        let mut body = serde_json::to_value(deployment)?;
        body["network"] = json!(network);
        self.post(
            &format!("/v2/evm/accounts/{address}/contracts"),
            body,
            Options::WALLET,
        )
        .await
    }

    async fn deploy_nft(
        &self,
        address: Address,
        network: &str,
        name: &str,
        symbol: &str,
        base_uri: &str,
    ) -> Result<DeployedContract, CdpError> {
        self.post(
            &format!("/v2/evm/accounts/{address}/contracts/nft"),
            json!({ "network": network, "name": name, "symbol": symbol, "baseUri": base_uri }),
            Options::WALLET,
        )
        .await
    }

    async fn deploy_token(
        &self,
        address: Address,
        network: &str,
        name: &str,
        symbol: &str,
        total_supply: &str,
    ) -> Result<DeployedContract, CdpError> {
        self.post(
            &format!("/v2/evm/accounts/{address}/contracts/token"),
            json!({
                "network": network,
                "name": name,
                "symbol": symbol,
                "totalSupply": total_supply,
            }),
            Options::WALLET,
        )
        .await
    }

    async fn trade(
        &self,
        address: Address,
        network: &str,
        amount: &str,
        from_asset_id: &str,
        to_asset_id: &str,
    ) -> Result<TradeResult, CdpError> {
        self.post(
            &format!("/v2/evm/accounts/{address}/trades"),
            json!({
                "network": network,
                "amount": amount,
                "fromAssetId": from_asset_id,
                "toAssetId": to_asset_id,
            }),
            Options::WALLET,
        )
        .await
    }

    async fn close(&self) -> Result<(), CdpError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
