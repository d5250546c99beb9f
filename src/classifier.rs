use rust_decimal::Decimal;
use tx_interpreter::{
    balance_deltas, currencies_involved, BalanceChangeFilter, BalanceFilter, Classification,
    ReconciliationSettings, SignerFilter, TransactionClassifier, TransactionKind,
    TransactionRecord,
};

/// Tells swaps from transfers by what the signer's balances did
pub struct BalanceShapeClassifier {
    settings: ReconciliationSettings,
}

impl BalanceShapeClassifier {
    pub fn new(settings: ReconciliationSettings) -> Self {
        Self { settings }
    }
}

impl TransactionClassifier for BalanceShapeClassifier {
    fn classify(&self, record: &TransactionRecord) -> Classification {
        let prepared = self.settings.prepare(record);

        let signer = match SignerFilter.view(&prepared).and_then(|view| BalanceChangeFilter.view(&view)) {
            Ok(view) => view,
            // no signer: the swap path reports it
            Err(_) => {
                return Classification {
                    kind: TransactionKind::Swap,
                    mints: Vec::new(),
                }
            }
        };

        let assets = currencies_involved(&signer.balance_updates);
        let deltas = balance_deltas(&signer.balance_updates);

        let kind = match assets.as_slice() {
            [] => TransactionKind::Unknown,
            [mint] if self.settings.is_native(mint) => {
                let outflow: Decimal = -deltas.iter().sum::<Decimal>();
                if outflow > prepared.transaction.fee {
                    TransactionKind::Transfer
                } else {
                    TransactionKind::Unknown
                }
            }
            [_] if deltas.iter().any(|delta| delta.is_sign_negative() && !delta.is_zero()) => {
                TransactionKind::Transfer
            }
            [_] => TransactionKind::Unknown,
            _ => TransactionKind::Swap,
        };

        Classification { kind, mints: assets }
    }
}
