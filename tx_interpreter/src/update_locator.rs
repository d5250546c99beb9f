use crate::types::BalanceUpdate;
use rust_decimal::Decimal;

/// Update whose delta is nearest to `target`; earliest wins on ties
pub fn locate_balance_update(updates: &[BalanceUpdate], target: Decimal) -> Option<&BalanceUpdate> {
    let mut best: Option<(&BalanceUpdate, Decimal)> = None;

    for update in updates {
        let distance = (update.delta() - target).abs();
        match best {
            Some((_, closest)) if distance >= closest => {}
            _ => best = Some((update, distance)),
        }
    }

    best.map(|(update, _)| update)
}
