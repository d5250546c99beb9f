//! SOL/USD valuation and token metadata for reconciled records.
//!
//! Lookups go through [`TokenInfoProvider`] and [`NativeRateProvider`]; a failed
//! lookup degrades to missing values rather than failing the record.

use crate::records::{SwapRecord, TokenLeg, TransferRecord};
use crate::settings::ReconciliationSettings;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

/// USD values below this on the token leg's post balance are reported as zero
pub fn dust_usd_threshold() -> Decimal {
    Decimal::new(1, 2)
}

const USD_PRECISION: u32 = 6;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenSupply {
    /// Token name; empty when unknown
    pub symbol: String,
    pub supply: Decimal,
}

#[async_trait]
pub trait TokenInfoProvider: Send + Sync {
    /// Latest known supply. Implementations return the default on failure.
    async fn token_supply(&self, mint: &str) -> TokenSupply;

    async fn token_price_usd(&self, mint: &str) -> Option<Decimal>;
}

#[async_trait]
pub trait NativeRateProvider: Send + Sync {
    /// USD per unit of the native asset, zero when unavailable
    async fn native_usd_rate(&self) -> Decimal;
}

/// Provider used when enrichment is disabled
pub struct NoEnrichment;

#[async_trait]
impl TokenInfoProvider for NoEnrichment {
    async fn token_supply(&self, _mint: &str) -> TokenSupply {
        TokenSupply::default()
    }

    async fn token_price_usd(&self, _mint: &str) -> Option<Decimal> {
        None
    }
}

#[async_trait]
impl NativeRateProvider for NoEnrichment {
    async fn native_usd_rate(&self) -> Decimal {
        Decimal::ZERO
    }
}

pub struct Enricher {
    settings: ReconciliationSettings,
    token_info: Arc<dyn TokenInfoProvider>,
    rates: Arc<dyn NativeRateProvider>,
}

impl Enricher {
    pub fn new(
        settings: ReconciliationSettings,
        token_info: Arc<dyn TokenInfoProvider>,
        rates: Arc<dyn NativeRateProvider>,
    ) -> Self {
        Self {
            settings,
            token_info,
            rates,
        }
    }

    /// SOL-denominated values only, computed from the swap itself
    pub fn offline(settings: ReconciliationSettings) -> Self {
        Self::new(settings, Arc::new(NoEnrichment), Arc::new(NoEnrichment))
    }

    /// Rate carried on the record, otherwise the provider's
    pub async fn resolve_rate(&self, record_rate: Option<Decimal>) -> Option<Decimal> {
        if let Some(rate) = record_rate.filter(|rate| *rate > Decimal::ZERO) {
            return Some(rate);
        }

        let rate = self.rates.native_usd_rate().await;
        if rate > Decimal::ZERO {
            Some(rate)
        } else {
            debug!("No SOL/USD rate available, USD values left empty");
            None
        }
    }

    pub async fn enrich_swap(&self, mut swap: SwapRecord) -> SwapRecord {
        let rate = self.resolve_rate(swap.sol_usd_rate).await;

        let mint = swap.token_leg().mint.clone();
        if !self.settings.is_native(&mint) {
            let supply = self.token_info.token_supply(&mint).await;
            let (_, token) = swap.legs_mut();
            if !supply.symbol.is_empty() {
                token.symbol = supply.symbol;
            }
            token.token_supply = Some(supply.supply);
        }

        apply_swap_valuation(&mut swap, rate);
        swap.sol_usd_rate = rate;
        swap
    }

    pub async fn enrich_transfer(&self, mut transfer: TransferRecord) -> TransferRecord {
        let rate = self.resolve_rate(transfer.sol_usd_rate).await;
        let details = &mut transfer.transfer_details;
        let native = self.settings.is_native(&details.mint_address);

        let price = if native {
            rate
        } else {
            self.token_info.token_price_usd(&details.mint_address).await
        };

        if native {
            details.amount_transferred_sol = Some(details.amount_transferred);
        }

        if let Some(price) = price {
            let usd = (details.amount_transferred.abs() * price.abs()).round_dp(USD_PRECISION);
            details.amount_transferred_usd = Some(usd);
            if let (false, Some(rate)) = (native, rate) {
                details.amount_transferred_sol = usd.checked_div(rate).map(|sol| sol.round_dp(details.decimals));
            }
        }

        if !native {
            let supply = self.token_info.token_supply(&details.mint_address).await;
            if !supply.symbol.is_empty() {
                details.symbol = supply.symbol;
            }
            details.token_supply = Some(supply.supply);
            transfer.market_capitalization = price.and_then(|price| price.checked_mul(supply.supply));
        }

        transfer.sol_usd_rate = rate;
        transfer
    }
}

/// Fill SOL and USD fields of a swap from its own exchange ratio
pub fn apply_swap_valuation(swap: &mut SwapRecord, rate: Option<Decimal>) {
    let rate = rate.filter(|rate| *rate > Decimal::ZERO);
    let native_mint = swap.native_leg().mint.clone();
    let token_mint = swap.token_leg().mint.clone();

    let (native, token) = swap.legs_mut();
    // SOL per token unit
    let ratio = if token.amount_change.is_zero() {
        Decimal::ZERO
    } else {
        (-native.amount_change)
            .checked_div(token.amount_change)
            .unwrap_or(Decimal::ZERO)
    };

    value_leg(native, Decimal::ONE, rate);
    value_leg(token, ratio, rate);

    if matches!(token.post_swap_balance_usd, Some(usd) if usd < dust_usd_threshold()) {
        token.post_swap_balance_usd = Some(Decimal::ZERO);
        token.post_swap_balance_sol = Some(Decimal::ZERO);
    }

    let fees = [&mut swap.blockchain_fees, &mut swap.swap_fees];
    for fee in fees {
        let sol = match fee.mint.as_deref() {
            Some(mint) if mint == native_mint => Some(fee.amount),
            Some(mint) if mint == token_mint => fee.amount.checked_mul(ratio.abs()),
            _ => None,
        };
        fee.amount_sol = sol;
        fee.amount_usd = sol.zip(rate).and_then(|(sol, rate)| sol.checked_mul(rate));
    }
}

fn value_leg(leg: &mut TokenLeg, ratio: Decimal, rate: Option<Decimal>) {
    let in_sol = |amount: Decimal| amount.checked_mul(ratio).unwrap_or(Decimal::ZERO);
    let in_usd = |sol: Decimal| rate.and_then(|rate| sol.checked_mul(rate));

    let amount = in_sol(leg.amount_change);
    let pre = in_sol(leg.pre_swap_balance);
    let post = in_sol(leg.post_swap_balance);

    leg.amount_sol = Some(amount);
    leg.pre_swap_balance_sol = Some(pre);
    leg.post_swap_balance_sol = Some(post);
    leg.amount_usd = in_usd(amount);
    leg.pre_swap_balance_usd = in_usd(pre);
    leg.post_swap_balance_usd = in_usd(post);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{FeeAmount, SwapDirection, TransferDetails};
    use crate::types::{Block, Transaction};
    use config_manager::NATIVE_SOL_MINT;
    use rust_decimal_macros::dec;

    struct MockTokenInfo;

    #[async_trait]
    impl TokenInfoProvider for MockTokenInfo {
        async fn token_supply(&self, _mint: &str) -> TokenSupply {
            TokenSupply {
                symbol: "Alpha Token".to_string(),
                supply: dec!(1000000),
            }
        }

        async fn token_price_usd(&self, _mint: &str) -> Option<Decimal> {
            Some(dec!(0.5))
        }
    }

    struct FixedRate(Decimal);

    #[async_trait]
    impl NativeRateProvider for FixedRate {
        async fn native_usd_rate(&self) -> Decimal {
            self.0
        }
    }

    fn buy() -> SwapRecord {
        SwapRecord {
            from_token: TokenLeg {
                symbol: "SOL".to_string(),
                mint: NATIVE_SOL_MINT.to_string(),
                decimals: 9,
                amount_change: dec!(-2),
                pre_swap_balance: dec!(10),
                post_swap_balance: dec!(8),
                ..Default::default()
            },
            to_token: TokenLeg {
                symbol: "AAA".to_string(),
                mint: "MintA".to_string(),
                decimals: 6,
                amount_change: dec!(100),
                pre_swap_balance: dec!(0),
                post_swap_balance: dec!(100),
                ..Default::default()
            },
            blockchain_fees: FeeAmount {
                amount: dec!(0.000005),
                mint: Some(NATIVE_SOL_MINT.to_string()),
                ..Default::default()
            },
            swap_fees: FeeAmount {
                amount: dec!(3),
                mint: Some("MintA".to_string()),
                ..Default::default()
            },
            direction: SwapDirection::NativeToToken,
            swap_detected: true,
            transaction: Transaction::default(),
            block: Block::default(),
            sol_usd_rate: None,
        }
    }

    #[test]
    fn test_valuation_without_rate() {
        let mut swap = buy();
        apply_swap_valuation(&mut swap, None);

        assert_eq!(swap.from_token.amount_sol, Some(dec!(-2)));
        assert_eq!(swap.to_token.amount_sol, Some(dec!(2)));
        assert_eq!(swap.to_token.post_swap_balance_sol, Some(dec!(2)));
        assert_eq!(swap.to_token.amount_usd, None);
        assert_eq!(swap.swap_fees.amount_sol, Some(dec!(0.06)));
        assert_eq!(swap.swap_fees.amount_usd, None);
    }

    #[test]
    fn test_valuation_with_rate() {
        let mut swap = buy();
        apply_swap_valuation(&mut swap, Some(dec!(150)));

        assert_eq!(swap.from_token.amount_usd, Some(dec!(-300)));
        assert_eq!(swap.to_token.amount_usd, Some(dec!(300)));
        assert_eq!(swap.to_token.pre_swap_balance_usd, Some(dec!(0)));
        assert_eq!(swap.blockchain_fees.amount_usd, Some(dec!(0.00075)));
        assert_eq!(swap.swap_fees.amount_usd, Some(dec!(9)));
    }

    #[test]
    fn test_dust_post_balance_zeroed() {
        let mut swap = buy();
        swap.direction = SwapDirection::TokenToNative;
        std::mem::swap(&mut swap.from_token, &mut swap.to_token);
        swap.from_token.amount_change = dec!(-100);
        swap.from_token.pre_swap_balance = dec!(100.00001);
        swap.from_token.post_swap_balance = dec!(0.00001);
        swap.to_token.amount_change = dec!(2);

        apply_swap_valuation(&mut swap, Some(dec!(150)));

        assert_eq!(swap.from_token.post_swap_balance_usd, Some(Decimal::ZERO));
        assert_eq!(swap.from_token.post_swap_balance_sol, Some(Decimal::ZERO));
        assert_eq!(swap.from_token.amount_usd, Some(dec!(-300)));
    }

    #[test]
    fn test_zero_token_change_gives_zero_ratio() {
        let mut swap = buy();
        swap.to_token.amount_change = Decimal::ZERO;
        apply_swap_valuation(&mut swap, None);
        assert_eq!(swap.to_token.amount_sol, Some(Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_enrich_swap_uses_provider_rate_and_supply() {
        let enricher = Enricher::new(
            ReconciliationSettings::default(),
            Arc::new(MockTokenInfo),
            Arc::new(FixedRate(dec!(100))),
        );

        let swap = enricher.enrich_swap(buy()).await;
        assert_eq!(swap.sol_usd_rate, Some(dec!(100)));
        assert_eq!(swap.to_token.symbol, "Alpha Token");
        assert_eq!(swap.to_token.token_supply, Some(dec!(1000000)));
        assert_eq!(swap.to_token.amount_usd, Some(dec!(200)));
    }

    #[tokio::test]
    async fn test_record_rate_takes_precedence() {
        let enricher = Enricher::new(
            ReconciliationSettings::default(),
            Arc::new(NoEnrichment),
            Arc::new(FixedRate(dec!(100))),
        );

        let mut swap = buy();
        swap.sol_usd_rate = Some(dec!(200));
        let swap = enricher.enrich_swap(swap).await;
        assert_eq!(swap.sol_usd_rate, Some(dec!(200)));
        assert_eq!(swap.to_token.symbol, "AAA");
        assert_eq!(swap.to_token.token_supply, Some(Decimal::ZERO));
    }

    fn transfer(mint: &str) -> TransferRecord {
        TransferRecord {
            transfer_details: TransferDetails {
                mint_address: mint.to_string(),
                symbol: "USDC".to_string(),
                decimals: 6,
                amount_transferred: dec!(5),
                ..Default::default()
            },
            market_capitalization: None,
            swap_detected: false,
            transaction: Transaction::default(),
            block: Block::default(),
            sol_usd_rate: Some(dec!(125)),
        }
    }

    #[tokio::test]
    async fn test_enrich_token_transfer() {
        let enricher = Enricher::new(
            ReconciliationSettings::default(),
            Arc::new(MockTokenInfo),
            Arc::new(NoEnrichment),
        );

        let transfer = enricher.enrich_transfer(transfer("MintU")).await;
        let details = &transfer.transfer_details;
        assert_eq!(details.amount_transferred_usd, Some(dec!(2.5)));
        assert_eq!(details.amount_transferred_sol, Some(dec!(0.02)));
        assert_eq!(details.token_supply, Some(dec!(1000000)));
        assert_eq!(transfer.market_capitalization, Some(dec!(500000)));
    }

    #[tokio::test]
    async fn test_enrich_native_transfer() {
        let enricher = Enricher::offline(ReconciliationSettings::default());

        let transfer = enricher.enrich_transfer(transfer(NATIVE_SOL_MINT)).await;
        let details = &transfer.transfer_details;
        assert_eq!(details.amount_transferred_sol, Some(dec!(5)));
        assert_eq!(details.amount_transferred_usd, Some(dec!(625)));
        assert_eq!(details.token_supply, None);
        assert_eq!(transfer.market_capitalization, None);
    }
}
