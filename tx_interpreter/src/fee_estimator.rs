use crate::balance_calculator::balance_deltas;
use crate::currency::currencies_involved;
use crate::dominant_figure::dominant_figures;
use crate::filters::{BalanceChangeFilter, BalanceFilter, NotSignerFilter, SignerFilter, TokenFilter};
use crate::settings::ReconciliationSettings;
use crate::types::TransactionRecord;
use crate::Result;
use rust_decimal::Decimal;
use tracing::{debug, warn};

/// Fees in raw units: chain fee in lamports, trade fee in `trade_fee_mint` units
#[derive(Debug, Clone, PartialEq)]
pub struct FeeEstimate {
    pub chain_fee: Decimal,
    pub trade_fee: Decimal,
    pub trade_fee_mint: Option<String>,
}

pub struct FeeEstimator<'a> {
    settings: &'a ReconciliationSettings,
}

impl<'a> FeeEstimator<'a> {
    pub fn new(settings: &'a ReconciliationSettings) -> Self {
        Self { settings }
    }

    /// Expects a record already passed through [`ReconciliationSettings::prepare`]
    pub fn estimate(&self, record: &TransactionRecord) -> Result<FeeEstimate> {
        let counterparty = BalanceChangeFilter.view(&NotSignerFilter.view(record)?)?;
        let chain_fee = record.transaction.fee;

        let Some(traded_mint) = self.traded_mint(record, &counterparty)? else {
            warn!(
                "No traded asset found for fee estimation in {}",
                record.transaction.signature
            );
            return Ok(FeeEstimate {
                chain_fee,
                trade_fee: Decimal::ZERO,
                trade_fee_mint: None,
            });
        };

        let leg = TokenFilter::single(traded_mint.as_str()).apply(&counterparty)?;
        let trade_fee = trade_fee_from_deltas(&balance_deltas(&leg), self.settings.dominant_ratio);

        debug!("Trade fee for {}: {} raw units", traded_mint, trade_fee);

        Ok(FeeEstimate {
            chain_fee,
            trade_fee,
            trade_fee_mint: Some(traded_mint),
        })
    }

    /// The non-native asset the counterparties moved. Falls back to the
    /// signer's side when the counterparty view is not a clean native pair.
    fn traded_mint(
        &self,
        record: &TransactionRecord,
        counterparty: &TransactionRecord,
    ) -> Result<Option<String>> {
        let assets = currencies_involved(&counterparty.balance_updates);
        if assets.len() == 2 && assets.iter().any(|mint| self.settings.is_native(mint)) {
            return Ok(assets.into_iter().find(|mint| !self.settings.is_native(mint)));
        }

        debug!(
            "Counterparty assets {:?} are not a native pair, using signer assets",
            assets
        );
        let signer = BalanceChangeFilter.view(&SignerFilter.view(record)?)?;
        let signer_assets = currencies_involved(&signer.balance_updates);
        Ok(signer_assets
            .into_iter()
            .find(|mint| !self.settings.is_native(mint))
            .or_else(|| assets.into_iter().find(|mint| !self.settings.is_native(mint))))
    }
}

/// Residual left after the dominant legs cancel out: `| |sum dominant| - |sum all| |`
pub fn trade_fee_from_deltas(deltas: &[Decimal], ratio: Decimal) -> Decimal {
    let dominant_sum: Decimal = dominant_figures(deltas, ratio).iter().sum();
    let total: Decimal = deltas.iter().sum();
    (dominant_sum.abs() - total.abs()).abs()
}
