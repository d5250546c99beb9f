use crate::balance_calculator::scale_amount;
use crate::dominant_figure::default_dominant_ratio;
use crate::types::{BalanceUpdate, Currency, TransactionRecord};
use crate::{ReconcileError, Result};
use config_manager::ReconciliationConfig;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Reconciliation parameters in the form the classifiers consume
#[derive(Debug, Clone)]
pub struct ReconciliationSettings {
    pub native_mint: String,
    pub native_symbol: String,
    pub native_decimals: u32,
    pub default_decimals: u32,
    pub max_decimals: u32,
    pub dominant_ratio: Decimal,
    /// member mint -> representative mint
    equivalents: HashMap<String, String>,
    auxiliary_addresses: HashSet<String>,
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        Self::build(&ReconciliationConfig::default(), default_dominant_ratio())
    }
}

impl ReconciliationSettings {
    pub fn from_config(config: &ReconciliationConfig) -> Result<Self> {
        let ratio = Decimal::from_f64(config.dominant_ratio).ok_or_else(|| {
            ReconcileError::InvalidAmount(format!(
                "dominant ratio {} is not representable",
                config.dominant_ratio
            ))
        })?;
        Ok(Self::build(config, ratio))
    }

    fn build(config: &ReconciliationConfig, dominant_ratio: Decimal) -> Self {
        let equivalents = config
            .equivalent_mints
            .iter()
            .flat_map(|group| {
                group
                    .members
                    .iter()
                    .filter(move |member| **member != group.representative)
                    .map(move |member| (member.clone(), group.representative.clone()))
            })
            .collect();

        Self {
            native_mint: config.native_mint.clone(),
            native_symbol: config.native_symbol.clone(),
            native_decimals: config.native_decimals,
            default_decimals: config.default_decimals,
            max_decimals: config.max_decimals,
            dominant_ratio,
            equivalents,
            auxiliary_addresses: config.auxiliary_addresses.iter().cloned().collect(),
        }
    }

    pub fn with_dominant_ratio(mut self, ratio: Decimal) -> Self {
        self.dominant_ratio = ratio;
        self
    }

    pub fn canonical_mint<'a>(&'a self, mint: &'a str) -> &'a str {
        self.equivalents.get(mint).map(String::as_str).unwrap_or(mint)
    }

    pub fn is_native(&self, mint: &str) -> bool {
        self.canonical_mint(mint) == self.native_mint
    }

    pub fn is_auxiliary(&self, address: &str) -> bool {
        self.auxiliary_addresses.contains(address)
    }

    pub fn decimals_for(&self, currency: &Currency) -> u32 {
        if self.is_native(&currency.mint_address) {
            self.native_decimals
        } else {
            currency.resolved_decimals(self.default_decimals, self.max_decimals)
        }
    }

    pub fn scale(&self, raw: Decimal, currency: &Currency) -> Decimal {
        scale_amount(raw, self.decimals_for(currency))
    }

    /// Drops program/sysvar accounts and folds equivalent mints into their representative
    pub fn prepare(&self, record: &TransactionRecord) -> TransactionRecord {
        let updates: Vec<BalanceUpdate> = record
            .balance_updates
            .iter()
            .filter(|update| !self.is_auxiliary(update.account.address()))
            .map(|update| {
                let canonical = self.canonical_mint(update.mint());
                if canonical == update.mint() {
                    return update.clone();
                }
                let mut update = update.clone();
                update.currency.mint_address = canonical.to_string();
                update
            })
            .collect();

        let dropped = record.balance_updates.len() - updates.len();
        if dropped > 0 {
            debug!(
                "Dropped {} auxiliary balance updates from {}",
                dropped, record.transaction.signature
            );
        }

        record.with_updates(updates)
    }
}
