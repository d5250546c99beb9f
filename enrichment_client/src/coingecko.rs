use crate::retry::{retry_with_backoff, RetryConfig};
use crate::{check_status, decimal_from_value, http_client, EnrichmentClientError, Result};
use async_trait::async_trait;
use config_manager::EnrichmentConfig;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use tx_interpreter::NativeRateProvider;

#[derive(Debug, Clone, Copy)]
struct CachedRate {
    rate: Decimal,
    fetched_at: Instant,
}

/// SOL/USD from CoinGecko's simple price endpoint, cached for a fixed TTL
#[derive(Debug, Clone)]
pub struct CoinGeckoRateClient {
    client: Client,
    url: String,
    ttl: Duration,
    retry: RetryConfig,
    cache: Arc<RwLock<Option<CachedRate>>>,
}

impl CoinGeckoRateClient {
    pub fn new(config: &EnrichmentConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            url: config.sol_usd_api_url.clone(),
            ttl: Duration::from_secs(config.rate_cache_ttl_seconds),
            retry: RetryConfig::from_config(config),
            cache: Arc::new(RwLock::new(None)),
        })
    }

    /// Seed the cache, e.g. from a rate pushed by an upstream feed
    pub fn set_rate(&self, rate: Decimal) {
        if let Ok(mut cache) = self.cache.write() {
            *cache = Some(CachedRate {
                rate,
                fetched_at: Instant::now(),
            });
        }
    }

    fn cached_rate(&self) -> Option<Decimal> {
        let cache = self.cache.read().ok()?;
        cache
            .filter(|cached| cached.fetched_at.elapsed() < self.ttl)
            .map(|cached| cached.rate)
    }

    pub async fn fetch_sol_usd(&self) -> Result<Decimal> {
        let payload = retry_with_backoff(
            || self.get(),
            &self.retry,
            EnrichmentClientError::retry_kind,
        )
        .await?;

        payload
            .get("solana")
            .and_then(|solana| solana.get("usd"))
            .and_then(decimal_from_value)
            .ok_or_else(|| EnrichmentClientError::MissingData("solana.usd".to_string()))
    }

    async fn get(&self) -> Result<Value> {
        let response = self.client.get(&self.url).send().await?;
        check_status(response.status(), "CoinGecko")?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl NativeRateProvider for CoinGeckoRateClient {
    async fn native_usd_rate(&self) -> Decimal {
        if let Some(rate) = self.cached_rate() {
            debug!("SOL/USD cache hit: {}", rate);
            return rate;
        }

        match self.fetch_sol_usd().await {
            Ok(rate) => {
                self.set_rate(rate);
                rate
            }
            Err(e) => {
                warn!("SOL/USD lookup failed: {}", e);
                Decimal::ZERO
            }
        }
    }
}
