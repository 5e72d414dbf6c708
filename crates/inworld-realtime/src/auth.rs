//! Session token acquisition.
//!
//! The token endpoint authenticates requests with an `IW1-HMAC-SHA256` header:
//! an HMAC-SHA256 chain seeded with `"IW1" + secret` over the request date,
//! the runtime host, the token RPC path, a random nonce and a fixed terminator.

use crate::{config::ClientConfig, error::ClientError};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use inworld_realtime_types::{AccessTokenRequest, Token};
use rand::Rng;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::{debug, info};

type HmacSha256 = Hmac<Sha256>;

const TOKEN_METHOD: &str = "ai.inworld.engine.v1.WorldEngine/GenerateToken";
const REQUEST_TERMINATOR: &str = "iw1_request";

/// Source of session tokens.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Exchanges the configured credentials for a fresh session token.
    async fn fetch_token(&self) -> Result<Token, ClientError>;
}

/// Computes the hex signature for one token request.
pub fn signature(
    secret: &str,
    datetime: &str,
    host: &str,
    nonce: &str,
) -> Result<String, ClientError> {
    let mut key = format!("IW1{}", secret).into_bytes();
    for part in [datetime, host, TOKEN_METHOD, nonce, REQUEST_TERMINATOR] {
        let mut mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| ClientError::Other(format!("HMAC key rejected: {}", e)))?;
        mac.update(part.as_bytes());
        key = mac.finalize().into_bytes().to_vec();
    }
    Ok(hex::encode(key))
}

/// Builds the full `Authorization` header value for the given date and nonce.
pub fn auth_header_at(
    api_key: &str,
    api_secret: &str,
    host: &str,
    datetime: &str,
    nonce: &str,
) -> Result<String, ClientError> {
    let signature = signature(api_secret, datetime, host, nonce)?;
    Ok(format!(
        "IW1-HMAC-SHA256 ApiKey={},DateTime={},Nonce={},Signature={}",
        api_key, datetime, nonce, signature
    ))
}

/// Builds the `Authorization` header value for a request made now.
pub fn auth_header(api_key: &str, api_secret: &str, host: &str) -> Result<String, ClientError> {
    let datetime = Utc::now().format("%Y%m%d%H%M%S").to_string();
    auth_header_at(api_key, api_secret, host, &datetime, &nonce())
}

/// An 11 digit random nonce.
fn nonce() -> String {
    let mut rng = rand::rng();
    (0..11)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// `TokenSource` backed by the Inworld token endpoint.
pub struct HttpTokenSource {
    http: reqwest::Client,
    url: String,
    runtime_host: String,
    api_key: Option<String>,
    api_secret: Option<SecretString>,
    resource_id: String,
}

impl HttpTokenSource {
    pub fn new(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            url: config.server.token_url(),
            runtime_host: config.server.runtime_host().to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            resource_id: config.workspace_full_name(),
        }
    }
}

#[async_trait]
impl TokenSource for HttpTokenSource {
    async fn fetch_token(&self) -> Result<Token, ClientError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ClientError::MissingCredential("Please fill API Key!"))?;
        let api_secret = self
            .api_secret
            .as_ref()
            .ok_or(ClientError::MissingCredential("Please fill API Secret!"))?;

        let header = auth_header(api_key, api_secret.expose_secret(), &self.runtime_host)?;
        debug!(url = %self.url, resource_id = %self.resource_id, "Requesting session token");

        let response = self
            .http
            .post(&self.url)
            .header(AUTHORIZATION, HeaderValue::from_str(&header)?)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(&AccessTokenRequest {
                api_key: api_key.to_string(),
                resource_id: self.resource_id.clone(),
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::TokenRequest(format!("{} {}", status, body)));
        }

        let token = Token::from_json(&body)?;
        info!(session_id = %token.session_id, "Session token acquired");
        Ok(token)
    }
}
