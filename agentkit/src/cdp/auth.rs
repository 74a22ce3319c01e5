//! Request authentication for the CDP REST API.
//!
//! Every request carries a short-lived bearer JWT signed with the API key
//! secret and scoped to the request's method, host and path. Endpoints that
//! touch account keys also carry an `X-Wallet-Auth` JWT signed with the wallet
//! secret, which binds the request body through a SHA-256 hash. Secrets never
//! leave the process.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alloy::primitives::hex;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use super::{ApiKeys, CdpError};

const WALLET_AUTH_HEADER: HeaderName = HeaderName::from_static("x-wallet-auth");

/// PKCS#8 v1 wrapper for a raw Ed25519 seed.
const ED25519_PKCS8_PREFIX: [u8; 16] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04, 0x20,
];

/// What an [`Authenticator`] sees of an outgoing request.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    /// HTTP method.
    pub method: &'a Method,
    /// Full request URL.
    pub url: &'a str,
    /// Path below the base URL, e.g. `/v2/evm/accounts`.
    pub path: &'a str,
    /// JSON body, if any.
    pub body: Option<&'a Value>,
    /// Whether the endpoint requires wallet authentication.
    pub wallet_auth: bool,
}

/// Produces the authentication headers for a CDP request.
pub trait Authenticator: Send + Sync + fmt::Debug {
    /// Headers to attach to the request described by `request`.
    ///
    /// # Errors
    ///
    /// Returns [`CdpError::Other`] if the credentials cannot be used to sign.
    fn headers(&self, keys: &ApiKeys, request: &RequestContext<'_>) -> Result<HeaderMap, CdpError>;
}

/// Signs a bearer JWT per request, plus a wallet JWT where required.
///
/// The API key secret may be a base64 Ed25519 key (64 bytes, seed first) or
/// a PKCS#8 PEM EC P-256 key. The wallet secret is a base64 PKCS#8 DER EC
/// P-256 key.
#[derive(Debug, Clone, Copy)]
pub struct JwtAuthenticator {
    expires_in: Duration,
}

impl Default for JwtAuthenticator {
    fn default() -> Self {
        Self {
            expires_in: Duration::from_secs(120),
        }
    }
}

impl JwtAuthenticator {
    /// Authenticator with a 120 s bearer token lifetime.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifetime of the bearer token.
    #[must_use]
    pub const fn expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = expires_in;
        self
    }

    fn headers_at(
        &self,
        keys: &ApiKeys,
        request: &RequestContext<'_>,
        now: u64,
    ) -> Result<HeaderMap, CdpError> {
        let uri = request_uri(request)?;
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {}", self.bearer_token(keys, &uri, now)?))?,
        );
        if request.wallet_auth {
            headers.insert(
                WALLET_AUTH_HEADER,
                header_value(&wallet_token(keys.wallet_secret(), &uri, request.body, now)?)?,
            );
        }
        Ok(headers)
    }

    fn bearer_token(&self, keys: &ApiKeys, uri: &str, now: u64) -> Result<String, CdpError> {
        let (key, algorithm) = api_signing_key(keys.key_secret())?;
        let header = json!({
            "alg": algorithm,
            "kid": keys.key_id(),
            "typ": "JWT",
            "nonce": nonce(),
        });
        let claims = json!({
            "sub": keys.key_id(),
            "iss": "cdp",
            "uris": [uri],
            "iat": now,
            "nbf": now,
            "exp": now + self.expires_in.as_secs(),
        });
        sign(&header, &claims, &key, algorithm)
    }
}

impl Authenticator for JwtAuthenticator {
    fn headers(&self, keys: &ApiKeys, request: &RequestContext<'_>) -> Result<HeaderMap, CdpError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| CdpError::Other("system clock is before the unix epoch".into()))?
            .as_secs();
        self.headers_at(keys, request, now)
    }
}

fn wallet_token(
    secret: &str,
    uri: &str,
    body: Option<&Value>,
    now: u64,
) -> Result<String, CdpError> {
    let der = STANDARD
        .decode(secret.trim())
        .map_err(|_| CdpError::Other("wallet secret is not valid base64".into()))?;
    let key = EncodingKey::from_ec_der(&der);

    let header = json!({ "alg": Algorithm::ES256, "typ": "JWT" });
    let mut claims = json!({
        "iat": now,
        "nbf": now,
        "jti": nonce(),
        "uris": [uri],
    });
    if let Some(hash) = body.map(body_hash).transpose()?.flatten() {
        claims["reqHash"] = json!(hash);
    }
    sign(&header, &claims, &key, Algorithm::ES256)
}

fn api_signing_key(secret: &str) -> Result<(EncodingKey, Algorithm), CdpError> {
    if secret.contains("-----BEGIN") {
        // Keys from env files often carry escaped newlines.
        let pem = secret.replace("\\n", "\n");
        let key = EncodingKey::from_ec_pem(pem.as_bytes()).map_err(|_| {
            CdpError::Other("API key secret is not a PKCS#8 PEM EC P-256 key".into())
        })?;
        return Ok((key, Algorithm::ES256));
    }

    let raw = STANDARD.decode(secret.trim()).ok().filter(|raw| raw.len() == 64);
    let seed = raw
        .as_deref()
        .and_then(|raw| raw.get(..32))
        .ok_or_else(|| CdpError::Other("API key secret is not a base64 Ed25519 key".into()))?;
    let mut der = Vec::with_capacity(ED25519_PKCS8_PREFIX.len() + seed.len());
    der.extend_from_slice(&ED25519_PKCS8_PREFIX);
    der.extend_from_slice(seed);
    Ok((EncodingKey::from_ed_der(&der), Algorithm::EdDSA))
}

fn sign(
    header: &Value,
    claims: &Value,
    key: &EncodingKey,
    algorithm: Algorithm,
) -> Result<String, CdpError> {
    let message = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(header)?),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?)
    );
    let signature = jsonwebtoken::crypto::sign(message.as_bytes(), key, algorithm)
        .map_err(|e| CdpError::Other(format!("failed to sign request token: {e}")))?;
    Ok(format!("{message}.{signature}"))
}

/// `"{METHOD} {host}{path}"` of the request URL.
fn request_uri(request: &RequestContext<'_>) -> Result<String, CdpError> {
    let url: url::Url = request
        .url
        .parse()
        .map_err(|e| CdpError::Other(format!("invalid request URL: {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| CdpError::Other("request URL has no host".into()))?;
    Ok(format!("{} {host}{}", request.method, url.path()))
}

/// SHA-256 hex of the key-sorted compact JSON body; `None` for an empty body.
fn body_hash(body: &Value) -> Result<Option<String>, CdpError> {
    let empty = match body {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        return Ok(None);
    }
    let canonical = serde_json::to_vec(&sorted(body))?;
    Ok(Some(hex::encode(Sha256::digest(&canonical))))
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), sorted(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

fn nonce() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn header_value(value: &str) -> Result<HeaderValue, CdpError> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|_| CdpError::Other("token contains characters not allowed in a header".into()))?;
    value.set_sensitive(true);
    Ok(value)
}
