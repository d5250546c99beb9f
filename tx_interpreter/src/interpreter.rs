use crate::enrichment::Enricher;
use crate::records::{SwapRecord, TransferRecord};
use crate::settings::ReconciliationSettings;
use crate::swap::SwapClassifier;
use crate::transfer::TransferClassifier;
use crate::types::TransactionRecord;
use crate::{ReconcileError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Swap,
    Transfer,
    Unknown,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransactionKind::Swap => "SWAP",
            TransactionKind::Transfer => "TRANSFER",
            TransactionKind::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: TransactionKind,
    /// Mints the classifier associates with the transaction
    pub mints: Vec<String>,
}

/// Decides what a transaction is before reconciliation
pub trait TransactionClassifier: Send + Sync {
    fn classify(&self, record: &TransactionRecord) -> Classification;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Interpretation {
    Swap(Box<SwapRecord>),
    Transfer(Box<TransferRecord>),
    Unsupported { message: String },
    /// Nothing resolvable: no movement in the transfer mint, or a swap leg
    /// with no matching update
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

impl From<&ReconcileError> for ErrorPayload {
    fn from(err: &ReconcileError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

pub struct Interpreter {
    classifier: Box<dyn TransactionClassifier>,
    swaps: SwapClassifier,
    transfers: TransferClassifier,
    enricher: Enricher,
}

impl Interpreter {
    pub fn new(
        settings: ReconciliationSettings,
        classifier: Box<dyn TransactionClassifier>,
        enricher: Enricher,
    ) -> Self {
        Self {
            classifier,
            swaps: SwapClassifier::new(settings.clone()),
            transfers: TransferClassifier::new(settings),
            enricher,
        }
    }

    pub async fn interpret(&self, record: &TransactionRecord) -> Result<Interpretation> {
        let classification = self.classifier.classify(record);
        debug!(
            "Transaction {} classified as {} ({:?})",
            record.transaction.signature, classification.kind, classification.mints
        );

        match classification.kind {
            TransactionKind::Swap => {
                let swap = match self.swaps.classify(record) {
                    Ok(swap) => swap,
                    Err(ReconcileError::LocatorNotFound { mint }) => {
                        warn!(
                            "Unresolvable {} leg in {}",
                            mint, record.transaction.signature
                        );
                        return Ok(Interpretation::Empty);
                    }
                    Err(err) => return Err(err),
                };
                let swap = self.enricher.enrich_swap(swap).await;
                info!(
                    "Swap {} {:?}: {} {} -> {} {}",
                    record.transaction.signature,
                    swap.direction,
                    swap.from_token.amount_change,
                    swap.from_token.symbol,
                    swap.to_token.amount_change,
                    swap.to_token.symbol
                );
                Ok(Interpretation::Swap(Box::new(swap)))
            }
            TransactionKind::Transfer => {
                let mint = classification
                    .mints
                    .first()
                    .ok_or(ReconcileError::MissingTransferMint)?;
                match self.transfers.classify(record, mint)? {
                    Some(transfer) => {
                        let transfer = self.enricher.enrich_transfer(transfer).await;
                        Ok(Interpretation::Transfer(Box::new(transfer)))
                    }
                    None => Ok(Interpretation::Empty),
                }
            }
            TransactionKind::Unknown => Ok(Interpretation::Unsupported {
                message: format!("Transaction type {} is not supported", classification.kind),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Account, BalanceUpdate, Currency, Transaction};
    use config_manager::NATIVE_SOL_MINT;
    use rust_decimal_macros::dec;

    struct Fixed(TransactionKind, Vec<String>);

    impl TransactionClassifier for Fixed {
        fn classify(&self, _record: &TransactionRecord) -> Classification {
            Classification {
                kind: self.0,
                mints: self.1.clone(),
            }
        }
    }

    fn interpreter(kind: TransactionKind, mints: &[&str]) -> Interpreter {
        let settings = ReconciliationSettings::default();
        Interpreter::new(
            settings.clone(),
            Box::new(Fixed(kind, mints.iter().map(|m| m.to_string()).collect())),
            Enricher::offline(settings),
        )
    }

    fn record() -> TransactionRecord {
        let sol = Currency::new(NATIVE_SOL_MINT, "SOL", 9);
        TransactionRecord {
            balance_updates: vec![
                BalanceUpdate::new(Account::wallet("A"), sol.clone(), dec!(3000000000), dec!(1000000000)),
                BalanceUpdate::new(Account::wallet("B"), sol, dec!(0), dec!(2000000000)),
            ],
            transaction: Transaction {
                signer: Some("A".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_routes_transfer() {
        let result = interpreter(TransactionKind::Transfer, &[NATIVE_SOL_MINT])
            .interpret(&record())
            .await
            .unwrap();
        match result {
            Interpretation::Transfer(transfer) => {
                assert_eq!(transfer.transfer_details.amount_transferred, dec!(2));
                assert_eq!(transfer.transfer_details.receiver.public_key, "B");
            }
            other => panic!("expected transfer, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transfer_without_mint_errors() {
        let result = interpreter(TransactionKind::Transfer, &[]).interpret(&record()).await;
        assert_eq!(result, Err(ReconcileError::MissingTransferMint));
    }

    #[tokio::test]
    async fn test_unknown_kind() {
        let result = interpreter(TransactionKind::Unknown, &[])
            .interpret(&record())
            .await
            .unwrap();
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["message"], "Transaction type UNKNOWN is not supported");
    }

    #[tokio::test]
    async fn test_swap_error_surfaces() {
        let result = interpreter(TransactionKind::Swap, &[]).interpret(&record()).await;
        assert!(matches!(result, Err(ReconcileError::IncompleteSwap { .. })));
    }

    #[test]
    fn test_error_payload() {
        let payload = ErrorPayload::from(&ReconcileError::MissingSigner);
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"error":"No signer address found in the transaction"}"#
        );
    }
}
