//! Reconciles per-account balance updates of a Solana transaction into a
//! swap or transfer record.

pub mod balance_calculator;
pub mod currency;
pub mod dominant_figure;
pub mod enrichment;
pub mod fee_estimator;
pub mod filters;
pub mod interpreter;
pub mod records;
pub mod settings;
pub mod swap;
pub mod transfer;
pub mod types;
pub mod update_locator;

pub use balance_calculator::{balance_deltas, scale_amount};
pub use currency::currencies_involved;
pub use dominant_figure::dominant_figures;
pub use enrichment::{Enricher, NativeRateProvider, NoEnrichment, TokenInfoProvider, TokenSupply};
pub use fee_estimator::{FeeEstimate, FeeEstimator};
pub use filters::{BalanceChangeFilter, BalanceFilter, NotSignerFilter, SignerFilter, TokenFilter};
pub use interpreter::{
    Classification, ErrorPayload, Interpretation, Interpreter, TransactionClassifier,
    TransactionKind,
};
pub use records::{FeeAmount, SwapDirection, SwapRecord, TokenLeg, TransferDetails, TransferParty, TransferRecord};
pub use settings::ReconciliationSettings;
pub use swap::SwapClassifier;
pub use transfer::TransferClassifier;
pub use types::{Account, BalanceUpdate, Block, Currency, Transaction, TransactionRecord};
pub use update_locator::locate_balance_update;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("No signer address found in the transaction")]
    MissingSigner,
    #[error("Multi-asset swap involving {} currencies; use the multi-asset interpretation", assets.len())]
    MultiAssetSwap { assets: Vec<String> },
    #[error("Swap does not involve the native asset: {assets:?}")]
    NonNativeSwap { assets: Vec<String> },
    #[error("Expected two assets in signer updates, found {assets:?}")]
    IncompleteSwap { assets: Vec<String> },
    #[error("Failed to analyze swap: {figures} dominant figures for {mint}")]
    AmbiguousSwap { mint: String, figures: usize },
    #[error("No balance update matches the amount moved for {mint}")]
    LocatorNotFound { mint: String },
    #[error("No mint listed for transfer transaction")]
    MissingTransferMint,
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
