use crate::types::BalanceUpdate;
use rust_decimal::Decimal;

/// Precision kept on raw deltas before comparisons
pub const DELTA_PRECISION: u32 = 7;

/// `PostBalance - PreBalance` for each update, in input order
pub fn balance_deltas(updates: &[BalanceUpdate]) -> Vec<Decimal> {
    updates
        .iter()
        .map(|update| update.delta().round_dp(DELTA_PRECISION))
        .collect()
}

/// Convert a raw integer amount to display units
pub fn scale_amount(raw: Decimal, decimals: u32) -> Decimal {
    // callers bound decimals to the configured max (<= 28)
    (raw * Decimal::new(1, decimals)).normalize()
}
