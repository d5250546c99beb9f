//! Transaction payload as delivered by the indexer: one record per
//! transaction, one balance update per touched account.

use crate::{ReconcileError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Account whose balance moved. Token accounts carry the wallet that owns them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireAccount", into = "WireAccount")]
pub enum Account {
    Wallet { address: String },
    TokenAccount { address: String, owner: String },
}

impl Account {
    pub fn wallet(address: impl Into<String>) -> Self {
        Account::Wallet {
            address: address.into(),
        }
    }

    pub fn token_account(address: impl Into<String>, owner: impl Into<String>) -> Self {
        Account::TokenAccount {
            address: address.into(),
            owner: owner.into(),
        }
    }

    pub fn address(&self) -> &str {
        match self {
            Account::Wallet { address } | Account::TokenAccount { address, .. } => address,
        }
    }

    pub fn owner(&self) -> Option<&str> {
        match self {
            Account::Wallet { .. } => None,
            Account::TokenAccount { owner, .. } => Some(owner),
        }
    }

    /// The wallet that ultimately holds the funds
    pub fn owner_or_address(&self) -> &str {
        self.owner().unwrap_or_else(|| self.address())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireAccount {
    #[serde(default)]
    address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<WireTokenAccount>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireTokenAccount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
}

impl From<WireAccount> for Account {
    fn from(wire: WireAccount) -> Self {
        match wire.token.and_then(|token| token.owner) {
            Some(owner) if !owner.is_empty() => Account::TokenAccount {
                address: wire.address,
                owner,
            },
            _ => Account::Wallet {
                address: wire.address,
            },
        }
    }
}

impl From<Account> for WireAccount {
    fn from(account: Account) -> Self {
        match account {
            Account::Wallet { address } => WireAccount {
                address,
                token: None,
            },
            Account::TokenAccount { address, owner } => WireAccount {
                address,
                token: Some(WireTokenAccount { owner: Some(owner) }),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Currency {
    #[serde(default)]
    pub mint_address: String,
    #[serde(default)]
    pub symbol: String,
    /// Raw value from the payload; use [`Currency::resolved_decimals`]
    #[serde(default, deserialize_with = "lenient_decimals")]
    pub decimals: Option<i64>,
}

impl Currency {
    pub fn new(mint_address: impl Into<String>, symbol: impl Into<String>, decimals: u32) -> Self {
        Self {
            mint_address: mint_address.into(),
            symbol: symbol.into(),
            decimals: Some(decimals as i64),
        }
    }

    /// Decimals bounded to `[0, max]`, `default` when missing or out of range
    pub fn resolved_decimals(&self, default: u32, max: u32) -> u32 {
        match self.decimals {
            Some(decimals) if (0..=max as i64).contains(&decimals) => decimals as u32,
            _ => default,
        }
    }
}

fn lenient_decimals<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

/// One account's pre/post amounts for one currency, in raw integer units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireBalanceUpdate", into = "WireBalanceUpdate")]
pub struct BalanceUpdate {
    pub account: Account,
    pub currency: Currency,
    pub pre_balance: Decimal,
    pub post_balance: Decimal,
}

impl BalanceUpdate {
    pub fn new(account: Account, currency: Currency, pre_balance: Decimal, post_balance: Decimal) -> Self {
        Self {
            account,
            currency,
            pre_balance,
            post_balance,
        }
    }

    pub fn delta(&self) -> Decimal {
        self.post_balance - self.pre_balance
    }

    pub fn mint(&self) -> &str {
        &self.currency.mint_address
    }
}

#[derive(Serialize, Deserialize)]
struct WireBalanceUpdate {
    #[serde(rename = "BalanceUpdate")]
    balance_update: WireBalance,
    #[serde(rename = "Currency", default)]
    currency: Currency,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireBalance {
    account: Account,
    #[serde(default)]
    pre_balance: Decimal,
    #[serde(default)]
    post_balance: Decimal,
}

impl From<WireBalanceUpdate> for BalanceUpdate {
    fn from(wire: WireBalanceUpdate) -> Self {
        Self {
            account: wire.balance_update.account,
            currency: wire.currency,
            pre_balance: wire.balance_update.pre_balance,
            post_balance: wire.balance_update.post_balance,
        }
    }
}

impl From<BalanceUpdate> for WireBalanceUpdate {
    fn from(update: BalanceUpdate) -> Self {
        Self {
            balance_update: WireBalance {
                account: update.account,
                pre_balance: update.pre_balance,
                post_balance: update.post_balance,
            },
            currency: update.currency,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Transaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<String>,
    /// Chain fee in lamports
    #[serde(default)]
    pub fee: Decimal,
    #[serde(default)]
    pub signature: String,
    /// Passed through to the output untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Block metadata, opaque to reconciliation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Block(pub Value);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(rename = "BalanceUpdates", default)]
    pub balance_updates: Vec<BalanceUpdate>,
    #[serde(rename = "Transaction", default)]
    pub transaction: Transaction,
    #[serde(rename = "Block", default)]
    pub block: Block,
    #[serde(
        rename = "solUsdRate",
        default,
        deserialize_with = "lenient_rate",
        skip_serializing_if = "Option::is_none"
    )]
    pub sol_usd_rate: Option<Decimal>,
}

impl TransactionRecord {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn signer(&self) -> Result<&str> {
        match self.transaction.signer.as_deref() {
            Some(signer) if !signer.is_empty() => Ok(signer),
            _ => Err(ReconcileError::MissingSigner),
        }
    }

    /// Same transaction and block, different set of updates
    pub fn with_updates(&self, balance_updates: Vec<BalanceUpdate>) -> TransactionRecord {
        TransactionRecord {
            balance_updates,
            transaction: self.transaction.clone(),
            block: self.block.clone(),
            sol_usd_rate: self.sol_usd_rate,
        }
    }
}

fn lenient_rate<'de, D>(deserializer: D) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64().and_then(|f| Decimal::try_from(f).ok()),
        Some(Value::String(s)) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    })
}
