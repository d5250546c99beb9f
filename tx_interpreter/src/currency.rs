use crate::types::BalanceUpdate;
use std::collections::BTreeSet;
use tracing::debug;

/// Distinct mint addresses, sorted so the result is independent of update order
pub fn currencies_involved(updates: &[BalanceUpdate]) -> Vec<String> {
    updates
        .iter()
        .filter_map(|update| {
            let mint = update.mint();
            if mint.is_empty() {
                debug!("Balance update for {} has no mint address", update.account.address());
                return None;
            }
            Some(mint.to_string())
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
