//! Chain client over the Terra LCD REST API.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::domain::{AppError, BlockchainError, ChainClient, TxInfo};

/// Configuration for the LCD client
#[derive(Debug, Clone)]
pub struct LcdClientConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for LcdClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Transport used by [`LcdChainClient`], swappable in tests
#[async_trait]
pub trait LcdProvider: Send + Sync {
    /// GET `path` with query parameters and return the JSON body.
    ///
    /// A 404 maps to `BlockchainError::TxNotFound`.
    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, AppError>;
}

/// reqwest-backed LCD transport
pub struct HttpLcdProvider {
    http_client: Client,
    base_url: String,
}

impl HttpLcdProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Blockchain(BlockchainError::Connection(e.to_string())))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl LcdProvider for HttpLcdProvider {
    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, AppError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http_client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::Blockchain(BlockchainError::Connection(e.to_string())))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Blockchain(BlockchainError::TxNotFound(body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_not_found_body(&body) {
                return Err(AppError::Blockchain(BlockchainError::TxNotFound(body)));
            }
            return Err(AppError::Blockchain(BlockchainError::RpcError(format!(
                "{}: {}",
                status, body
            ))));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Blockchain(BlockchainError::RpcError(e.to_string())))
    }
}

/// gRPC status code the gateway reports for an unknown tx
const GRPC_NOT_FOUND: u64 = 5;

/// Some LCD versions answer an unknown hash with 400 and `{"code": 5, ...}`
fn is_not_found_body(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("code").and_then(serde_json::Value::as_u64))
        == Some(GRPC_NOT_FOUND)
}

#[derive(Debug, Deserialize)]
struct TxResponseEnvelope {
    tx_response: TxInfo,
}

#[derive(Debug, Deserialize)]
struct QueryResultEnvelope {
    query_result: serde_json::Value,
}

/// LCD-backed [`ChainClient`]
pub struct LcdChainClient {
    provider: Box<dyn LcdProvider>,
    config: LcdClientConfig,
}

impl LcdChainClient {
    pub fn new(lcd_url: &str, config: LcdClientConfig) -> Result<Self, AppError> {
        let provider = HttpLcdProvider::new(lcd_url, config.timeout)?;
        info!(lcd_url = %lcd_url, "Created LCD chain client");
        Ok(Self {
            provider: Box::new(provider),
            config,
        })
    }

    /// Create a new client with a specific provider (useful for testing)
    pub fn with_provider(provider: Box<dyn LcdProvider>, config: LcdClientConfig) -> Self {
        Self { provider, config }
    }

    /// GET with retries on transport and server errors. Not-found is final.
    #[instrument(skip(self, query))]
    async fn lcd_call<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<R, AppError> {
        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_delay).await;
            }
            match self.provider.get(path, query).await {
                Ok(value) => {
                    return serde_json::from_value(value).map_err(|e| {
                        AppError::Blockchain(BlockchainError::RpcError(format!(
                            "Deserialization error: {}",
                            e
                        )))
                    });
                }
                Err(e @ AppError::Blockchain(BlockchainError::TxNotFound(_))) => return Err(e),
                Err(e) => {
                    warn!(attempt = attempt, error = ?e, path = %path, "LCD call failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            AppError::Blockchain(BlockchainError::RpcError("Unknown error".to_string()))
        }))
    }
}

#[async_trait]
impl ChainClient for LcdChainClient {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let _: serde_json::Value = self
            .lcd_call("/cosmos/base/tendermint/v1beta1/node_info", &[])
            .await?;
        Ok(())
    }

    /// Single lookup; the confirmation engine owns the retry schedule.
    #[instrument(skip(self))]
    async fn tx_info(&self, tx_hash: &str) -> Result<TxInfo, AppError> {
        let path = format!("/cosmos/tx/v1beta1/txs/{}", tx_hash);
        let value = self.provider.get(&path, &[]).await.map_err(|e| match e {
            AppError::Blockchain(BlockchainError::TxNotFound(_)) => {
                AppError::Blockchain(BlockchainError::TxNotFound(tx_hash.to_string()))
            }
            other => other,
        })?;
        let envelope: TxResponseEnvelope = serde_json::from_value(value).map_err(|e| {
            AppError::Blockchain(BlockchainError::RpcError(format!(
                "Malformed tx response: {}",
                e
            )))
        })?;
        debug!(height = %envelope.tx_response.height, "Transaction found");
        Ok(envelope.tx_response)
    }

    #[instrument(skip(self, query))]
    async fn contract_query(
        &self,
        contract: &str,
        query: serde_json::Value,
    ) -> Result<serde_json::Value, AppError> {
        let path = format!("/terra/wasm/v1beta1/contracts/{}/store", contract);
        let query_msg = STANDARD.encode(serde_json::to_vec(&query)?);
        let envelope: QueryResultEnvelope =
            self.lcd_call(&path, &[("query_msg", query_msg)]).await?;
        Ok(envelope.query_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type CallLog = Arc<Mutex<Vec<(String, Vec<(String, String)>)>>>;

    enum Reply {
        Ok(serde_json::Value),
        NotFound,
        ServerError,
    }

    struct ScriptedProvider {
        replies: Mutex<Vec<Reply>>,
        calls: CallLog,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl LcdProvider for ScriptedProvider {
        async fn get(
            &self,
            path: &str,
            query: &[(&str, String)],
        ) -> Result<serde_json::Value, AppError> {
            self.calls.lock().unwrap().push((
                path.to_string(),
                query
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            ));
            let mut replies = self.replies.lock().unwrap();
            let reply = if replies.is_empty() {
                Reply::ServerError
            } else {
                replies.remove(0)
            };
            match reply {
                Reply::Ok(v) => Ok(v),
                Reply::NotFound => Err(AppError::Blockchain(BlockchainError::TxNotFound(
                    "not found".to_string(),
                ))),
                Reply::ServerError => Err(AppError::Blockchain(BlockchainError::RpcError(
                    "500".to_string(),
                ))),
            }
        }
    }

    fn fast_config() -> LcdClientConfig {
        LcdClientConfig {
            timeout: Duration::from_secs(1),
            max_retries: 2,
            retry_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_tx_info_parses_tx_response() {
        let provider = ScriptedProvider::new(vec![Reply::Ok(serde_json::json!({
            "tx": {},
            "tx_response": {
                "txhash": "ABCD",
                "height": "1234",
                "code": 0,
                "raw_log": "[]",
                "gas_wanted": "200000",
                "gas_used": "150000"
            }
        }))]);
        let client = LcdChainClient::with_provider(Box::new(provider), fast_config());
        let tx = client.tx_info("ABCD").await.unwrap();
        assert_eq!(tx.height, "1234");
        assert!(tx.is_success());
    }

    #[tokio::test]
    async fn test_tx_info_not_found_is_not_retried() {
        let provider =
            ScriptedProvider::new(vec![Reply::NotFound, Reply::Ok(serde_json::json!({}))]);
        let client = LcdChainClient::with_provider(Box::new(provider), fast_config());
        let err = client.tx_info("MISSING").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Blockchain(BlockchainError::TxNotFound(ref h)) if h == "MISSING"
        ));
    }

    #[tokio::test]
    async fn test_contract_query_encodes_query_msg() {
        let provider = ScriptedProvider::new(vec![Reply::Ok(serde_json::json!({
            "query_result": {"balance": "50"}
        }))]);
        let calls = Arc::clone(&provider.calls);
        let client = LcdChainClient::with_provider(Box::new(provider), fast_config());
        let query = serde_json::json!({"get_balance": {"account": "Savings"}});
        let result = client
            .contract_query("terra1bank", query.clone())
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"balance": "50"}));

        let calls = calls.lock().unwrap();
        let (path, params) = &calls[0];
        assert_eq!(path, "/terra/wasm/v1beta1/contracts/terra1bank/store");
        assert_eq!(params[0].0, "query_msg");
        let decoded = STANDARD.decode(&params[0].1).unwrap();
        let sent: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(sent, query);
    }

    #[tokio::test]
    async fn test_contract_query_retries_server_errors() {
        let provider = ScriptedProvider::new(vec![
            Reply::ServerError,
            Reply::ServerError,
            Reply::Ok(serde_json::json!({"query_result": {"account": []}})),
        ]);
        let client = LcdChainClient::with_provider(Box::new(provider), fast_config());
        let result = client
            .contract_query("terra1bank", serde_json::json!({}))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_contract_query_gives_up_after_max_retries() {
        let provider = ScriptedProvider::new(vec![]);
        let client = LcdChainClient::with_provider(Box::new(provider), fast_config());
        let result = client
            .contract_query("terra1bank", serde_json::json!({}))
            .await;
        assert!(matches!(
            result,
            Err(AppError::Blockchain(BlockchainError::RpcError(_)))
        ));
    }

    #[test]
    fn test_not_found_body_detection() {
        assert!(is_not_found_body(
            r#"{"code":5,"message":"tx not found: ABCD","details":[]}"#
        ));
        assert!(!is_not_found_body(r#"{"code":3,"message":"invalid hash"}"#));
        assert!(!is_not_found_body("bad gateway"));
    }

    #[test]
    fn test_lcd_client_config_default() {
        let config = LcdClientConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_client_creation() {
        let client = LcdChainClient::new("https://lcd.example.com/", LcdClientConfig::default());
        assert!(client.is_ok());
    }
}
