//! Predicates that select a subset of a transaction's balance updates.

use crate::types::{BalanceUpdate, TransactionRecord};
use crate::Result;
use std::collections::BTreeSet;

pub trait BalanceFilter {
    fn apply(&self, record: &TransactionRecord) -> Result<Vec<BalanceUpdate>>;

    /// Filtered updates wrapped back into a record, for chaining
    fn view(&self, record: &TransactionRecord) -> Result<TransactionRecord> {
        Ok(record.with_updates(self.apply(record)?))
    }
}

/// Accounts the signer controls, either directly or as token account owner
pub struct SignerFilter;

impl BalanceFilter for SignerFilter {
    fn apply(&self, record: &TransactionRecord) -> Result<Vec<BalanceUpdate>> {
        let signer = record.signer()?;
        Ok(record
            .balance_updates
            .iter()
            .filter(|update| {
                update.account.address() == signer || update.account.owner() == Some(signer)
            })
            .cloned()
            .collect())
    }
}

/// Counterparty accounts: neither the signer's address nor owned by it
pub struct NotSignerFilter;

impl BalanceFilter for NotSignerFilter {
    fn apply(&self, record: &TransactionRecord) -> Result<Vec<BalanceUpdate>> {
        let signer = record.signer()?;
        Ok(record
            .balance_updates
            .iter()
            .filter(|update| {
                update.account.address() != signer && update.account.owner() != Some(signer)
            })
            .cloned()
            .collect())
    }
}

pub struct TokenFilter {
    mints: BTreeSet<String>,
}

impl TokenFilter {
    pub fn new<I, S>(mints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mints: mints.into_iter().map(Into::into).collect(),
        }
    }

    pub fn single(mint: impl Into<String>) -> Self {
        Self::new([mint.into()])
    }
}

impl BalanceFilter for TokenFilter {
    fn apply(&self, record: &TransactionRecord) -> Result<Vec<BalanceUpdate>> {
        Ok(record
            .balance_updates
            .iter()
            .filter(|update| self.mints.contains(update.mint()))
            .cloned()
            .collect())
    }
}

/// Updates whose balance actually moved
pub struct BalanceChangeFilter;

impl BalanceFilter for BalanceChangeFilter {
    fn apply(&self, record: &TransactionRecord) -> Result<Vec<BalanceUpdate>> {
        Ok(record
            .balance_updates
            .iter()
            .filter(|update| update.post_balance != update.pre_balance)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Account, Currency, Transaction};
    use crate::ReconcileError;
    use rust_decimal_macros::dec;

    const SIGNER: &str = "Signer1111";

    fn record() -> TransactionRecord {
        let sol = Currency::new("11111111111111111111111111111111", "SOL", 9);
        let token = Currency::new("MintA", "AAA", 6);
        TransactionRecord {
            balance_updates: vec![
                BalanceUpdate::new(Account::wallet(SIGNER), sol.clone(), dec!(10), dec!(8)),
                BalanceUpdate::new(Account::token_account("Ata1", SIGNER), token.clone(), dec!(0), dec!(5)),
                BalanceUpdate::new(Account::token_account("Pool1", "PoolOwner"), token, dec!(9), dec!(4)),
                BalanceUpdate::new(Account::wallet("PoolOwner"), sol, dec!(3), dec!(3)),
            ],
            transaction: Transaction {
                signer: Some(SIGNER.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn addresses(updates: &[BalanceUpdate]) -> Vec<&str> {
        updates.iter().map(|u| u.account.address()).collect()
    }

    #[test]
    fn test_signer_filter_includes_owned_token_accounts() {
        let updates = SignerFilter.apply(&record()).unwrap();
        assert_eq!(addresses(&updates), vec![SIGNER, "Ata1"]);
    }

    #[test]
    fn test_signer_partition_is_complete() {
        let record = record();
        let signer = SignerFilter.apply(&record).unwrap();
        let others = NotSignerFilter.apply(&record).unwrap();
        assert_eq!(signer.len() + others.len(), record.balance_updates.len());
        assert_eq!(addresses(&others), vec!["Pool1", "PoolOwner"]);
    }

    #[test]
    fn test_missing_signer_errors() {
        let mut record = record();
        record.transaction.signer = None;
        assert_eq!(SignerFilter.apply(&record), Err(ReconcileError::MissingSigner));
        assert_eq!(NotSignerFilter.apply(&record), Err(ReconcileError::MissingSigner));
    }

    #[test]
    fn test_token_filter() {
        let updates = TokenFilter::single("MintA").apply(&record()).unwrap();
        assert_eq!(addresses(&updates), vec!["Ata1", "Pool1"]);

        let none = TokenFilter::new(Vec::<String>::new()).apply(&record()).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_balance_change_filter_chains() {
        let record = record();
        let counterparty = NotSignerFilter.view(&record).unwrap();
        let moved = BalanceChangeFilter.apply(&counterparty).unwrap();
        assert_eq!(addresses(&moved), vec!["Pool1"]);
    }
}
