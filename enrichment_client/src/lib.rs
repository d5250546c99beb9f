//! HTTP lookups behind the interpreter's enrichment traits: BitQuery for
//! token supply and price, CoinGecko for the SOL/USD rate.

pub mod bitquery;
pub mod coingecko;
pub mod retry;

pub use bitquery::BitQueryClient;
pub use coingecko::CoinGeckoRateClient;
pub use retry::{retry_with_backoff, RetryConfig, RetryableError};

use config_manager::EnrichmentConfig;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrichmentClientError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Rate limit exceeded")]
    RateLimitExceeded,
    #[error("Server error: HTTP {0}")]
    ServerError(u16),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Missing data: {0}")]
    MissingData(String),
}

pub type Result<T> = std::result::Result<T, EnrichmentClientError>;

impl EnrichmentClientError {
    pub fn retry_kind(&self) -> RetryableError {
        match self {
            EnrichmentClientError::RateLimitExceeded => RetryableError::RateLimit,
            EnrichmentClientError::ServerError(_) => RetryableError::ServerError,
            EnrichmentClientError::HttpError(e) if e.is_timeout() => RetryableError::Timeout,
            _ => RetryableError::Other,
        }
    }
}

pub(crate) fn http_client(config: &EnrichmentConfig) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_seconds))
        .build()?)
}

/// Map HTTP status to the retry-relevant error variants
pub(crate) fn check_status(status: reqwest::StatusCode, service: &str) -> Result<()> {
    if status.as_u16() == 429 {
        return Err(EnrichmentClientError::RateLimitExceeded);
    }
    if status.is_server_error() {
        return Err(EnrichmentClientError::ServerError(status.as_u16()));
    }
    if !status.is_success() {
        return Err(EnrichmentClientError::ApiError(format!(
            "{} returned HTTP {}",
            service, status
        )));
    }
    Ok(())
}

/// Amounts arrive either as JSON numbers or as numeric strings
pub(crate) fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Decimal::from(i)),
            None => n.as_f64().and_then(|f| Decimal::try_from(f).ok()),
        },
        Value::String(s) => Decimal::from_str(s.trim())
            .or_else(|_| Decimal::from_scientific(s.trim()))
            .ok(),
        _ => None,
    }
}
