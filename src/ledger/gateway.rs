//! HTTP client for the vault ledger gateway.
//!
//! The gateway is the service that holds the signer and talks to the chain. It exposes:
//! - `GET  {base}/vault/assets`  -> `{"assets": "<raw units>"}`
//! - `GET  {base}/vault/halted`  -> `{"halted": bool}`
//! - `GET  {base}/vault/asset`   -> `{"decimals": u32}`
//! - `POST {base}/vault/profits` and `{base}/vault/losses`
//!   with `{"amount", "memo", "idempotencyKey"}` -> `{"confirmedAt", "reference"}`

use super::{LedgerConnector, LedgerError};
use crate::domain::{Amount, CommitReceipt, CommitRequest};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Ledger connector backed by the gateway's HTTP API.
///
/// Every request is retried with exponential backoff on transport errors, 429 and 5xx. Commits are
/// retried too: they carry an idempotency key the gateway deduplicates on.
#[derive(Debug, Clone)]
pub struct LedgerGateway {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    max_retry_elapsed: Duration,
}

#[derive(Debug, Deserialize)]
struct AssetsResponse {
    assets: Amount,
}

#[derive(Debug, Deserialize)]
struct HaltedResponse {
    halted: bool,
}

#[derive(Debug, Deserialize)]
struct AssetResponse {
    decimals: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: Option<String>,
}

impl LedgerGateway {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retry_elapsed: Duration::from_secs(60),
        }
    }

    /// Cap on the total time spent retrying a single call.
    pub fn with_max_retry_elapsed(mut self, elapsed: Duration) -> Self {
        self.max_retry_elapsed = elapsed;
        self
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        idempotency_key: Option<&str>,
    ) -> Result<T, LedgerError> {
        let url = format!("{}{}", self.base_url, path);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_retry_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            let mut request = self.client.request(method.clone(), &url);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }
            if let Some(key) = idempotency_key {
                request = request.header("Idempotency-Key", key);
            }
            if let Some(body) = &body {
                request = request.json(body);
            }

            let response = request.send().await.map_err(|e| {
                warn!(url = %url, error = %e, "ledger gateway request failed, retrying");
                backoff::Error::transient(LedgerError::Unavailable(e.to_string()))
            })?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                warn!(url = %url, status = status.as_u16(), "ledger gateway unavailable, retrying");
                return Err(backoff::Error::transient(LedgerError::Unavailable(format!(
                    "HTTP {}",
                    status.as_u16()
                ))));
            }
            if !status.is_success() {
                let message = response
                    .json::<ErrorBody>()
                    .await
                    .ok()
                    .and_then(|b| b.error)
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
                return Err(backoff::Error::permanent(LedgerError::Rejected(message)));
            }

            response.json::<T>().await.map_err(|e| {
                backoff::Error::permanent(LedgerError::Unavailable(format!(
                    "malformed gateway response: {}",
                    e
                )))
            })
        })
        .await
    }

    async fn commit(&self, path: &str, request: &CommitRequest) -> Result<CommitReceipt, LedgerError> {
        if !request.amount.is_positive() {
            return Err(LedgerError::Rejected(format!(
                "commit amount must be positive, got {}",
                request.amount
            )));
        }
        debug!(
            direction = %request.direction,
            amount = %request.amount,
            key = %request.idempotency_key,
            "submitting ledger commit"
        );
        let body = serde_json::json!({
            "amount": request.amount,
            "memo": request.memo,
            "idempotencyKey": request.idempotency_key,
        });
        self.call(Method::POST, path, Some(body), Some(&request.idempotency_key))
            .await
    }
}

#[async_trait]
impl LedgerConnector for LedgerGateway {
    async fn current_assets(&self) -> Result<Amount, LedgerError> {
        let response: AssetsResponse = self.call(Method::GET, "/vault/assets", None, None).await?;
        Ok(response.assets)
    }

    async fn is_halted(&self) -> Result<bool, LedgerError> {
        let response: HaltedResponse = self.call(Method::GET, "/vault/halted", None, None).await?;
        Ok(response.halted)
    }

    async fn apply_profit(&self, request: &CommitRequest) -> Result<CommitReceipt, LedgerError> {
        self.commit("/vault/profits", request).await
    }

    async fn apply_loss(&self, request: &CommitRequest) -> Result<CommitReceipt, LedgerError> {
        self.commit("/vault/losses", request).await
    }

    async fn asset_decimals(&self) -> Result<u32, LedgerError> {
        let response: AssetResponse = self.call(Method::GET, "/vault/asset", None, None).await?;
        Ok(response.decimals)
    }
}
