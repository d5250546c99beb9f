use crate::retry::{retry_with_backoff, RetryConfig};
use crate::{check_status, decimal_from_value, http_client, EnrichmentClientError, Result};
use async_trait::async_trait;
use config_manager::EnrichmentConfig;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use tx_interpreter::{TokenInfoProvider, TokenSupply};

const TOKEN_SUPPLY_QUERY: &str = r#"query TokenSupply($mint: String!) {
  Solana {
    TokenSupplyUpdates(
      limit: { count: 1 }
      orderBy: { descending: Block_Time }
      where: { TokenSupplyUpdate: { Currency: { MintAddress: { is: $mint } } } }
    ) {
      TokenSupplyUpdate {
        Amount
        Currency {
          MintAddress
          Name
          Symbol
        }
        PreBalance
        PostBalance
      }
    }
  }
}"#;

const LATEST_TRADE_QUERY: &str = r#"query LatestTrade($mint: String!) {
  Solana {
    DEXTradeByTokens(
      limit: { count: 1 }
      orderBy: { descending: Block_Slot }
      where: { Trade: { Currency: { MintAddress: { is: $mint } } } }
    ) {
      Trade {
        Amount
        AmountInUSD
        Price
        PriceInUSD
      }
      Block {
        Time
      }
    }
  }
}"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SolanaData<T> {
    solana: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SupplyUpdates {
    #[serde(default)]
    token_supply_updates: Vec<SupplyRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SupplyRow {
    token_supply_update: SupplyUpdate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SupplyUpdate {
    #[serde(default)]
    currency: SupplyCurrency,
    #[serde(default)]
    post_balance: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SupplyCurrency {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TradeRows {
    #[serde(rename = "DEXTradeByTokens", default)]
    trades: Vec<TradeRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TradeRow {
    trade: Trade,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Trade {
    #[serde(rename = "PriceInUSD", default)]
    price_in_usd: Value,
}

/// BitQuery GraphQL client for token supply and latest DEX price
#[derive(Debug, Clone)]
pub struct BitQueryClient {
    client: Client,
    url: String,
    token: String,
    retry: RetryConfig,
}

impl BitQueryClient {
    pub fn new(config: &EnrichmentConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            url: config.bitquery_url.clone(),
            token: config.bitquery_token.clone(),
            retry: RetryConfig::from_config(config),
        })
    }

    /// Latest supply update: (token name, post balance)
    pub async fn fetch_token_supply(&self, mint: &str) -> Result<TokenSupply> {
        let data: SolanaData<SupplyUpdates> = self.query(TOKEN_SUPPLY_QUERY, mint).await?;
        let update = data
            .solana
            .token_supply_updates
            .into_iter()
            .next()
            .map(|row| row.token_supply_update)
            .ok_or_else(|| {
                EnrichmentClientError::MissingData(format!("no TokenSupplyUpdates for {}", mint))
            })?;

        let supply = decimal_from_value(&update.post_balance).ok_or_else(|| {
            EnrichmentClientError::MissingData(format!("PostBalance missing for {}", mint))
        })?;
        let symbol = update
            .currency
            .name
            .filter(|name| !name.is_empty())
            .or(update.currency.symbol)
            .unwrap_or_default();

        debug!("Supply for {}: {} ({})", mint, supply, symbol);
        Ok(TokenSupply { symbol, supply })
    }

    /// USD price of the latest DEX trade, `None` when the token never traded
    pub async fn fetch_price_usd(&self, mint: &str) -> Result<Option<Decimal>> {
        let data: SolanaData<TradeRows> = self.query(LATEST_TRADE_QUERY, mint).await?;
        Ok(data
            .solana
            .trades
            .first()
            .and_then(|row| decimal_from_value(&row.trade.price_in_usd)))
    }

    async fn query<T: serde::de::DeserializeOwned>(&self, query: &str, mint: &str) -> Result<T> {
        let body = json!({ "query": query, "variables": { "mint": mint } });
        let data = retry_with_backoff(
            || self.post(&body),
            &self.retry,
            EnrichmentClientError::retry_kind,
        )
        .await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn post(&self, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        check_status(response.status(), "BitQuery")?;

        let mut payload: Value = response.json().await?;
        if let Some(errors) = payload.get("errors") {
            return Err(EnrichmentClientError::ApiError(format!(
                "BitQuery returned errors: {}",
                errors
            )));
        }

        match payload.get_mut("data").map(Value::take) {
            Some(data) if !data.is_null() => Ok(data),
            _ => Err(EnrichmentClientError::MissingData(
                "BitQuery response has no data".to_string(),
            )),
        }
    }
}

#[async_trait]
impl TokenInfoProvider for BitQueryClient {
    async fn token_supply(&self, mint: &str) -> TokenSupply {
        match self.fetch_token_supply(mint).await {
            Ok(supply) => supply,
            Err(e) => {
                warn!("Token supply lookup failed for {}: {}", mint, e);
                TokenSupply::default()
            }
        }
    }

    async fn token_price_usd(&self, mint: &str) -> Option<Decimal> {
        match self.fetch_price_usd(mint).await {
            Ok(price) => price,
            Err(e) => {
                warn!("Price lookup failed for {}: {}", mint, e);
                None
            }
        }
    }
}
