use crate::domain::{Decimal, MAX_ASSET_DECIMALS};
use crate::engine::{EnginePolicy, FeeRate, TriggerPolicy};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub ledger_endpoint: String,
    pub ledger_api_key: Option<String>,
    pub threshold_percent: f64,
    pub threshold_period_seconds: i64,
    pub fee_rate_percent: Decimal,
    pub fee_rate: FeeRate,
    /// `None` means ask the ledger at startup.
    pub asset_decimals: Option<u32>,
    pub operation_mode: OperationMode,
    /// Present in pull mode.
    pub nav_api: Option<NavApiConfig>,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    Pull,
    Push,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavApiConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn required(env_map: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
}

fn optional(env_map: &HashMap<String, String>, key: &str) -> Option<String> {
    env_map
        .get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue(key.to_string(), message.into())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| invalid("PORT", "must be a valid u16"))?;

        let database_path = required(&env_map, "DATABASE_PATH")?;
        let ledger_endpoint = required(&env_map, "LEDGER_ENDPOINT")?;
        let ledger_api_key = optional(&env_map, "LEDGER_API_KEY");

        let threshold_percent = required(&env_map, "PERCENTAGE_TRIGGER_CHANGE")?
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| {
                invalid(
                    "PERCENTAGE_TRIGGER_CHANGE",
                    "must be a non-negative number",
                )
            })?;

        let threshold_period_seconds = required(&env_map, "TIME_PERIOD_FOR_CONTRACT_WRITE")?
            .parse::<i64>()
            .ok()
            .filter(|v| *v >= 0)
            .ok_or_else(|| {
                invalid(
                    "TIME_PERIOD_FOR_CONTRACT_WRITE",
                    "must be a non-negative number of seconds",
                )
            })?;

        let fee_rate_percent = optional(&env_map, "PERFORMANCE_FEE_PERCENT")
            .map(|s| Decimal::from_str_canonical(&s))
            .transpose()
            .map_err(|_| invalid("PERFORMANCE_FEE_PERCENT", "must be a decimal number"))?
            .unwrap_or_else(Decimal::zero);
        let fee_rate = FeeRate::from_percent(fee_rate_percent)
            .map_err(|e| invalid("PERFORMANCE_FEE_PERCENT", e.to_string()))?;

        let asset_decimals = match optional(&env_map, "ASSET_DECIMALS") {
            Some(raw) => Some(
                raw.parse::<u32>()
                    .ok()
                    .filter(|d| *d <= MAX_ASSET_DECIMALS)
                    .ok_or_else(|| {
                        invalid(
                            "ASSET_DECIMALS",
                            format!("must be an integer in 0..={}", MAX_ASSET_DECIMALS),
                        )
                    })?,
            ),
            None => None,
        };

        let operation_mode = match env_map
            .get("OPERATION_MODE")
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
            .unwrap_or("pull")
        {
            "pull" => OperationMode::Pull,
            "push" => OperationMode::Push,
            other => {
                return Err(invalid(
                    "OPERATION_MODE",
                    format!("must be pull or push, got {}", other),
                ))
            }
        };

        let nav_api = match operation_mode {
            OperationMode::Pull => Some(NavApiConfig {
                url: required(&env_map, "GET_NAV_URL")?,
                api_key: required(&env_map, "API_KEY")?,
            }),
            OperationMode::Push => None,
        };

        let poll_interval_secs = env_map
            .get("POLL_INTERVAL_SECS")
            .map(|s| s.as_str())
            .unwrap_or("60")
            .parse::<u64>()
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(|| invalid("POLL_INTERVAL_SECS", "must be a positive integer"))?;

        Ok(Config {
            port,
            database_path,
            ledger_endpoint,
            ledger_api_key,
            threshold_percent,
            threshold_period_seconds,
            fee_rate_percent,
            fee_rate,
            asset_decimals,
            operation_mode,
            nav_api,
            poll_interval: Duration::from_secs(poll_interval_secs),
        })
    }

    pub fn engine_policy(&self) -> EnginePolicy {
        EnginePolicy {
            trigger: TriggerPolicy {
                threshold_percent: self.threshold_percent,
                threshold_period_seconds: self.threshold_period_seconds,
            },
            fee_rate: self.fee_rate,
        }
    }
}
