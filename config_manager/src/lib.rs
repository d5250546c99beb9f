use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Configuration loading error: {0}")]
    ConfigLoad(#[from] ConfigError),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;

pub const NATIVE_SOL_MINT: &str = "11111111111111111111111111111111";
pub const WRAPPED_SOL_MINT: &str = "So11111111111111111111111111111111111111112";

const MAX_BACKOFF_MS: u64 = 60_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Balance reconciliation heuristics
    pub reconciliation: ReconciliationConfig,

    /// Token metadata / price lookups
    pub enrichment: EnrichmentConfig,

    /// Runtime settings for the interpreter binary
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Identifier the chain uses for its base currency
    pub native_mint: String,

    /// Display symbol for the native asset
    pub native_symbol: String,

    /// Decimal places of the native asset (always 9 on Solana)
    pub native_decimals: u32,

    /// Decimals assumed when a currency carries none or an invalid value
    pub default_decimals: u32,

    /// Upper bound for currency decimals; anything above falls back to the default
    pub max_decimals: u32,

    /// Dust threshold: deltas smaller than `ratio * max|delta|` are ignored
    pub dominant_ratio: f64,

    /// Groups of mints that represent the same asset (e.g. SOL and wrapped SOL)
    pub equivalent_mints: Vec<EquivalentMintGroup>,

    /// Program / sysvar accounts whose balance updates are never economic movement
    pub auxiliary_addresses: Vec<String>,
}

/// Mints in `members` are reconciled as if they were `representative`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EquivalentMintGroup {
    pub representative: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Enable network enrichment of symbols, supply and USD values
    pub enabled: bool,

    /// BitQuery GraphQL endpoint
    pub bitquery_url: String,

    /// BitQuery bearer token
    pub bitquery_token: String,

    /// CoinGecko simple price endpoint for the SOL/USD rate
    pub sol_usd_api_url: String,

    /// Request timeout in seconds
    pub request_timeout_seconds: u64,

    /// Maximum retry attempts for rate-limited or failing requests
    pub max_retries: u32,

    /// Backoff per retry after HTTP 429; the last entry repeats
    pub rate_limit_backoff_ms: Vec<u64>,

    /// Backoff per retry after HTTP 5xx
    pub server_error_backoff_ms: Vec<u64>,

    /// Backoff per retry after a request timeout
    pub timeout_backoff_ms: Vec<u64>,

    /// How long a fetched SOL/USD rate stays valid
    pub rate_cache_ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Maximum number of transaction signatures remembered in stream mode
    pub dedup_capacity: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            reconciliation: ReconciliationConfig::default(),
            enrichment: EnrichmentConfig {
                enabled: false, // Needs a BitQuery token
                bitquery_url: "https://streaming.bitquery.io/eap".to_string(),
                bitquery_token: "".to_string(),
                sol_usd_api_url:
                    "https://api.coingecko.com/api/v3/simple/price?ids=solana&vs_currencies=usd"
                        .to_string(),
                request_timeout_seconds: 10,
                max_retries: 2,
                rate_limit_backoff_ms: vec![500, 1000, 2000],
                server_error_backoff_ms: vec![300, 600, 1200],
                timeout_backoff_ms: vec![500, 1000],
                rate_cache_ttl_seconds: 60,
            },
            service: ServiceConfig {
                dedup_capacity: 10_000,
            },
        }
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            native_mint: NATIVE_SOL_MINT.to_string(),
            native_symbol: "SOL".to_string(),
            native_decimals: 9,
            default_decimals: 9,
            max_decimals: 18,
            dominant_ratio: 0.1,
            equivalent_mints: vec![EquivalentMintGroup {
                representative: NATIVE_SOL_MINT.to_string(),
                members: vec![WRAPPED_SOL_MINT.to_string()],
            }],
            auxiliary_addresses: vec![
                "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA".to_string(),
                "ComputeBudget111111111111111111111111111111".to_string(),
                "SysvarRent111111111111111111111111111111111".to_string(),
            ],
        }
    }
}

impl ReconciliationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.native_mint.is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "reconciliation.native_mint cannot be empty".to_string(),
            ));
        }

        if !(self.dominant_ratio > 0.0 && self.dominant_ratio <= 1.0) {
            return Err(ConfigurationError::InvalidValue(format!(
                "reconciliation.dominant_ratio must be in (0, 1], got {}",
                self.dominant_ratio
            )));
        }

        if self.default_decimals > self.max_decimals || self.native_decimals > self.max_decimals {
            return Err(ConfigurationError::InvalidValue(format!(
                "decimals must not exceed reconciliation.max_decimals ({})",
                self.max_decimals
            )));
        }

        // 10^28 is the largest power of ten a Decimal can hold
        if self.max_decimals > 28 {
            return Err(ConfigurationError::InvalidValue(
                "reconciliation.max_decimals cannot exceed 28".to_string(),
            ));
        }

        for group in &self.equivalent_mints {
            if group.representative.is_empty() || group.members.is_empty() {
                return Err(ConfigurationError::InvalidValue(format!(
                    "equivalent mint group needs a representative and at least one member: {:?}",
                    group
                )));
            }
        }

        Ok(())
    }
}

impl EnrichmentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.bitquery_token.is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "BitQuery token is required when enrichment is enabled".to_string(),
            ));
        }

        if self.request_timeout_seconds == 0 {
            return Err(ConfigurationError::InvalidValue(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        let backoff = [
            &self.rate_limit_backoff_ms,
            &self.server_error_backoff_ms,
            &self.timeout_backoff_ms,
        ];
        if backoff.iter().flat_map(|table| table.iter()).any(|&ms| ms > MAX_BACKOFF_MS) {
            return Err(ConfigurationError::InvalidValue(format!(
                "Backoff delays must not exceed {}ms",
                MAX_BACKOFF_MS
            )));
        }

        Ok(())
    }
}

impl SystemConfig {
    /// Load configuration from `config.toml` (if present) and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config_builder = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&SystemConfig::default())?);

        if config_path.as_ref().exists() {
            info!(
                "Loading configuration from: {}",
                config_path.as_ref().display()
            );
            config_builder = config_builder.add_source(File::from(config_path.as_ref()));
        } else {
            debug!("Config file not found, using defaults and environment variables");
        }

        config_builder = config_builder.add_source(
            Environment::with_prefix("INTERP")
                .try_parsing(true)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("reconciliation.auxiliary_addresses")
                .with_list_parse_key("enrichment.rate_limit_backoff_ms")
                .with_list_parse_key("enrichment.server_error_backoff_ms")
                .with_list_parse_key("enrichment.timeout_backoff_ms"),
        );

        let system_config: SystemConfig = config_builder.build()?.try_deserialize()?;
        system_config.validate()?;

        Ok(system_config)
    }

    pub fn validate(&self) -> Result<()> {
        self.reconciliation.validate()?;
        self.enrichment.validate()?;

        if self.service.dedup_capacity == 0 {
            return Err(ConfigurationError::InvalidValue(
                "service.dedup_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SystemConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reconciliation.native_mint, NATIVE_SOL_MINT);
        assert_eq!(config.reconciliation.native_decimals, 9);
        assert_eq!(config.reconciliation.dominant_ratio, 0.1);
    }

    #[test]
    fn test_dominant_ratio_bounds() {
        let mut config = SystemConfig::default();
        config.reconciliation.dominant_ratio = 0.0;
        assert!(config.validate().is_err());

        config.reconciliation.dominant_ratio = 1.5;
        assert!(config.validate().is_err());

        config.reconciliation.dominant_ratio = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_enrichment_requires_token_when_enabled() {
        let mut config = SystemConfig::default();
        config.enrichment.enabled = true;
        assert!(config.validate().is_err());

        config.enrichment.bitquery_token = "token".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backoff_tables() {
        let mut config = SystemConfig::default();
        assert_eq!(config.enrichment.rate_limit_backoff_ms, vec![500, 1000, 2000]);

        config.enrichment.timeout_backoff_ms = vec![]; // no retry on timeouts
        assert!(config.validate().is_ok());

        config.enrichment.server_error_backoff_ms = vec![300, 120_000];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_equivalence_group_rejected() {
        let mut config = SystemConfig::default();
        config.reconciliation.equivalent_mints = vec![EquivalentMintGroup {
            representative: NATIVE_SOL_MINT.to_string(),
            members: vec![],
        }];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_missing_path_uses_defaults() {
        let config = SystemConfig::load_from_path("does/not/exist.toml").unwrap();
        assert_eq!(config.reconciliation.native_symbol, "SOL");
        assert_eq!(config.service.dedup_capacity, 10_000);
    }
}
