//! HTTP bridge to the user's wallet.
//!
//! Keys never reach this process. A local bridge (browser extension relay or
//! signer daemon) owns the connection and signs whatever it is asked to post.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::{info, instrument};

use crate::domain::{AppError, MsgExecuteContract, TxHash, Wallet, WalletConnection, WalletError};

/// Configuration for the wallet bridge client
#[derive(Debug)]
pub struct WalletBridgeConfig {
    /// Posting waits for the user to approve in the wallet, so this is generous
    pub timeout: Duration,
    pub chain_id: String,
    pub token: Option<SecretString>,
}

impl Default for WalletBridgeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            chain_id: "columbus-5".to_string(),
            token: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct PostRequest<'a> {
    chain_id: &'a str,
    msgs: &'a [MsgExecuteContract],
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    result: PostResult,
}

#[derive(Debug, Deserialize)]
struct PostResult {
    txhash: TxHash,
}

pub struct HttpWalletBridge {
    http_client: Client,
    base_url: String,
    config: WalletBridgeConfig,
}

impl HttpWalletBridge {
    pub fn new(base_url: &str, config: WalletBridgeConfig) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Wallet(WalletError::Unavailable(e.to_string())))?;

        info!(bridge_url = %base_url, chain_id = %config.chain_id, "Created wallet bridge client");
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn send<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R, AppError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| AppError::Wallet(WalletError::Unavailable(e.to_string())))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Wallet(WalletError::Rejected(body)));
        }
        if !status.is_success() {
            return Err(AppError::Wallet(WalletError::Unavailable(format!(
                "bridge returned {}",
                status
            ))));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Deserialization(e.to_string()))
    }
}

#[async_trait]
impl Wallet for HttpWalletBridge {
    #[instrument(skip(self))]
    async fn connection(&self) -> Result<WalletConnection, AppError> {
        let url = format!("{}/status", self.base_url);
        self.send(self.http_client.get(url)).await
    }

    #[instrument(skip(self))]
    async fn connect(&self) -> Result<WalletConnection, AppError> {
        let url = format!("{}/connect", self.base_url);
        self.send(self.http_client.post(url)).await
    }

    #[instrument(skip(self))]
    async fn disconnect(&self) -> Result<WalletConnection, AppError> {
        let url = format!("{}/disconnect", self.base_url);
        self.send(self.http_client.post(url)).await
    }

    #[instrument(skip(self, msgs), fields(msg_count = msgs.len()))]
    async fn post(&self, msgs: Vec<MsgExecuteContract>) -> Result<TxHash, AppError> {
        let url = format!("{}/post", self.base_url);
        let body = PostRequest {
            chain_id: &self.config.chain_id,
            msgs: &msgs,
        };
        let response: PostResponse = self.send(self.http_client.post(url).json(&body)).await?;
        Ok(response.result.txhash)
    }
}
