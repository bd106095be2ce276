//! NAV API client implementation.

use super::{QuoteSource, QuoteSourceError};
use crate::domain::{Amount, Quote, Timestamp};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Pulls the latest NAV from an HTTP endpoint authenticated with `x-api-key`.
///
/// Expected response: `{"nav": "1000000.25", "timestamp": 1700000000}` where `nav` is in whole asset
/// units and `timestamp` in unix seconds.
#[derive(Debug, Clone)]
pub struct NavApiSource {
    client: Client,
    url: String,
    api_key: String,
    asset_decimals: u32,
    max_retry_elapsed: Duration,
}

impl NavApiSource {
    pub fn new(url: String, api_key: String, asset_decimals: u32) -> Self {
        Self {
            client: Client::new(),
            url,
            api_key,
            asset_decimals,
            max_retry_elapsed: Duration::from_secs(30),
        }
    }

    /// Cap on the total time spent retrying a single fetch.
    pub fn with_max_retry_elapsed(mut self, elapsed: Duration) -> Self {
        self.max_retry_elapsed = elapsed;
        self
    }

    async fn get_nav(&self) -> Result<serde_json::Value, QuoteSourceError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_retry_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(&self.url)
                .header("x-api-key", &self.api_key)
                .send()
                .await
                .map_err(|e| {
                    warn!("NAV request failed, retrying: {}", e);
                    backoff::Error::transient(QuoteSourceError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status == 429 || status.is_server_error() {
                warn!("NAV API returned {}, retrying", status.as_u16());
                return Err(backoff::Error::transient(QuoteSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(QuoteSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(QuoteSourceError::ParseError(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl QuoteSource for NavApiSource {
    async fn fetch_quote(&self) -> Result<Quote, QuoteSourceError> {
        debug!("Fetching NAV from {}", self.url);
        let response = self.get_nav().await?;
        parse_nav(&response, self.asset_decimals)
    }
}

fn parse_nav(nav_json: &serde_json::Value, asset_decimals: u32) -> Result<Quote, QuoteSourceError> {
    let nav_str = match nav_json.get("nav") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => return Err(QuoteSourceError::ParseError("Missing nav field".to_string())),
    };
    let value = Amount::parse_units(&nav_str, asset_decimals)
        .map_err(|e| QuoteSourceError::ParseError(format!("Invalid nav: {}", e)))?;
    if value.is_negative() {
        return Err(QuoteSourceError::ParseError(format!(
            "Negative nav: {}",
            nav_str
        )));
    }

    let timestamp = nav_json
        .get("timestamp")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| QuoteSourceError::ParseError("Missing timestamp field".to_string()))?;

    Ok(Quote::new(value, Timestamp::new(timestamp)))
}
