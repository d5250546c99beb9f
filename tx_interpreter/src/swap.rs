//! Native/token swap reconciliation from the signer's point of view.

use crate::balance_calculator::{balance_deltas, scale_amount};
use crate::currency::currencies_involved;
use crate::dominant_figure::dominant_figures;
use crate::fee_estimator::FeeEstimator;
use crate::filters::{BalanceChangeFilter, BalanceFilter, NotSignerFilter, SignerFilter, TokenFilter};
use crate::records::{FeeAmount, SwapDirection, SwapRecord, TokenLeg};
use crate::settings::ReconciliationSettings;
use crate::types::{BalanceUpdate, TransactionRecord};
use crate::update_locator::locate_balance_update;
use crate::{ReconcileError, Result};
use rust_decimal::Decimal;
use tracing::{debug, warn};

pub struct SwapClassifier {
    settings: ReconciliationSettings,
}

/// Per-asset deltas of both sides of the trade
struct LegAnalysis {
    mint: String,
    signer_updates: Vec<BalanceUpdate>,
    signer_deltas: Vec<Decimal>,
    counterparty_dominant: Vec<Decimal>,
}

impl LegAnalysis {
    fn build(
        mint: &str,
        signer: &TransactionRecord,
        counterparty: &TransactionRecord,
        ratio: Decimal,
    ) -> Result<Self> {
        let filter = TokenFilter::single(mint);
        let signer_updates = filter.apply(signer)?;
        let signer_deltas = balance_deltas(&signer_updates);

        let counterparty_updates = filter.apply(counterparty)?;
        let counterparty_dominant = dominant_figures(&balance_deltas(&counterparty_updates), ratio);

        Ok(Self {
            mint: mint.to_string(),
            signer_updates,
            signer_deltas,
            counterparty_dominant,
        })
    }

    fn net(&self) -> Decimal {
        self.signer_deltas.iter().sum()
    }

    /// The pool side must settle each asset in a single dominant figure
    fn ensure_single_counterparty_figure(&self) -> Result<()> {
        match self.counterparty_dominant.len() {
            0 | 1 => Ok(()),
            figures => Err(ReconcileError::AmbiguousSwap {
                mint: self.mint.clone(),
                figures,
            }),
        }
    }

    /// Largest inflow or outflow on the signer's accounts
    fn extreme(&self, incoming: bool) -> Option<Decimal> {
        if incoming {
            self.signer_deltas.iter().max().copied()
        } else {
            self.signer_deltas.iter().min().copied()
        }
    }

    /// Zero when the leg nets out, otherwise the signer's extreme delta
    fn amount_moved(&self, incoming: bool) -> Result<Decimal> {
        if self.net().is_zero() {
            return Ok(Decimal::ZERO);
        }

        self.extreme(incoming)
            .ok_or_else(|| ReconcileError::LocatorNotFound {
                mint: self.mint.clone(),
            })
    }

    fn locate(&self, incoming: bool) -> Result<&BalanceUpdate> {
        self.extreme(incoming)
            .and_then(|target| locate_balance_update(&self.signer_updates, target))
            .ok_or_else(|| ReconcileError::LocatorNotFound {
                mint: self.mint.clone(),
            })
    }
}

impl SwapClassifier {
    pub fn new(settings: ReconciliationSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ReconciliationSettings {
        &self.settings
    }

    pub fn classify(&self, record: &TransactionRecord) -> Result<SwapRecord> {
        let prepared = self.settings.prepare(record);
        let signer = SignerFilter.view(&prepared)?;
        let counterparty = NotSignerFilter.view(&prepared)?;

        let other_mint = self.discover_traded_asset(&signer)?;
        let ratio = self.settings.dominant_ratio;
        let native = LegAnalysis::build(&self.settings.native_mint, &signer, &counterparty, ratio)?;
        let token = LegAnalysis::build(&other_mint, &signer, &counterparty, ratio)?;

        let native_net = native.net();
        let token_net = token.net();
        let direction = if native_net > Decimal::ZERO {
            SwapDirection::TokenToNative
        } else {
            SwapDirection::NativeToToken
        };
        let swap_detected = !native_net.is_zero()
            && !token_net.is_zero()
            && native_net.is_sign_positive() != token_net.is_sign_positive();

        if !swap_detected {
            debug!(
                "No opposing movement in {} (native net {}, token net {})",
                prepared.transaction.signature, native_net, token_net
            );
        }

        for leg in [&native, &token] {
            if let Err(e) = leg.ensure_single_counterparty_figure() {
                warn!(
                    "Counterparty figures for {} in {}: {:?}",
                    leg.mint, prepared.transaction.signature, leg.counterparty_dominant
                );
                return Err(e);
            }
        }

        let native_incoming = direction == SwapDirection::TokenToNative;
        let native_moved = native.amount_moved(native_incoming)?;
        let token_moved = token.amount_moved(!native_incoming)?;
        let native_update = native.locate(native_incoming)?;
        let token_update = token.locate(!native_incoming)?;

        let native_decimals = self.settings.native_decimals;
        let token_decimals = self.settings.decimals_for(&token_update.currency);

        let native_leg = TokenLeg {
            symbol: self.settings.native_symbol.clone(),
            mint: native.mint.clone(),
            decimals: native_decimals,
            amount_change: scale_amount(native_moved, native_decimals),
            pre_swap_balance: scale_amount(native_update.pre_balance, native_decimals),
            post_swap_balance: scale_amount(native_update.post_balance, native_decimals),
            ..Default::default()
        };
        let token_leg = TokenLeg {
            symbol: token_update.currency.symbol.clone(),
            mint: token.mint.clone(),
            decimals: token_decimals,
            amount_change: scale_amount(token_moved, token_decimals),
            pre_swap_balance: scale_amount(token_update.pre_balance, token_decimals),
            post_swap_balance: scale_amount(token_update.post_balance, token_decimals),
            ..Default::default()
        };

        let fees = FeeEstimator::new(&self.settings).estimate(&prepared)?;
        let fee_decimals = match fees.trade_fee_mint.as_deref() {
            Some(mint) if mint == token.mint => token_decimals,
            Some(mint) if self.settings.is_native(mint) => native_decimals,
            _ => self.settings.default_decimals,
        };

        let (from_token, to_token) = match direction {
            SwapDirection::NativeToToken => (native_leg, token_leg),
            SwapDirection::TokenToNative => (token_leg, native_leg),
        };

        Ok(SwapRecord {
            from_token,
            to_token,
            blockchain_fees: FeeAmount {
                amount: scale_amount(fees.chain_fee, native_decimals),
                mint: Some(self.settings.native_mint.clone()),
                ..Default::default()
            },
            swap_fees: FeeAmount {
                amount: scale_amount(fees.trade_fee, fee_decimals),
                mint: fees.trade_fee_mint,
                ..Default::default()
            },
            direction,
            swap_detected,
            transaction: prepared.transaction,
            block: prepared.block,
            sol_usd_rate: prepared.sol_usd_rate,
        })
    }

    /// The non-native mint of a two-asset native swap
    fn discover_traded_asset(&self, signer: &TransactionRecord) -> Result<String> {
        let changed = BalanceChangeFilter.apply(signer)?;
        let mut assets = currencies_involved(&changed);
        if assets.len() < 2 {
            // a leg can net to zero on one account but still be present
            assets = currencies_involved(&signer.balance_updates);
        }

        if assets.len() > 2 {
            warn!(
                "Signer moved {} assets in {}",
                assets.len(),
                signer.transaction.signature
            );
            return Err(ReconcileError::MultiAssetSwap { assets });
        }
        if !assets.iter().any(|mint| self.settings.is_native(mint)) {
            return Err(ReconcileError::NonNativeSwap { assets });
        }

        let other = assets
            .iter()
            .find(|mint| !self.settings.is_native(mint))
            .cloned();
        match other {
            Some(mint) if assets.len() == 2 => Ok(mint),
            _ => Err(ReconcileError::IncompleteSwap { assets }),
        }
    }
}
