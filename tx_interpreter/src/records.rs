//! Output records. Field names follow the downstream JSON consumers.

use crate::types::{Block, Transaction};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapDirection {
    /// Signer spent the native asset and received a token
    NativeToToken,
    /// Signer sold a token for the native asset
    TokenToNative,
}

/// One side of a swap, amounts in display units
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TokenLeg {
    pub symbol: String,
    pub mint: String,
    pub decimals: u32,
    pub amount_change: Decimal,
    pub pre_swap_balance: Decimal,
    pub post_swap_balance: Decimal,
    #[serde(rename = "AmountSOL")]
    pub amount_sol: Option<Decimal>,
    #[serde(rename = "AmountUSD")]
    pub amount_usd: Option<Decimal>,
    #[serde(rename = "PreSwapBalanceSOL")]
    pub pre_swap_balance_sol: Option<Decimal>,
    #[serde(rename = "PreSwapBalanceUSD")]
    pub pre_swap_balance_usd: Option<Decimal>,
    #[serde(rename = "PostSwapBalanceSOL")]
    pub post_swap_balance_sol: Option<Decimal>,
    #[serde(rename = "PostSwapBalanceUSD")]
    pub post_swap_balance_usd: Option<Decimal>,
    pub token_supply: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeAmount {
    #[serde(rename = "Amount")]
    pub amount: Decimal,
    #[serde(rename = "Mint")]
    pub mint: Option<String>,
    #[serde(rename = "AmountSOL")]
    pub amount_sol: Option<Decimal>,
    #[serde(rename = "AmountUSD")]
    pub amount_usd: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapRecord {
    #[serde(rename = "FromToken")]
    pub from_token: TokenLeg,
    #[serde(rename = "ToToken")]
    pub to_token: TokenLeg,
    #[serde(rename = "BlockchainFees")]
    pub blockchain_fees: FeeAmount,
    #[serde(rename = "SwapFees")]
    pub swap_fees: FeeAmount,
    #[serde(rename = "Direction")]
    pub direction: SwapDirection,
    #[serde(rename = "swapDetected")]
    pub swap_detected: bool,
    #[serde(rename = "Transaction")]
    pub transaction: Transaction,
    #[serde(rename = "Block")]
    pub block: Block,
    #[serde(rename = "solUsdRate")]
    pub sol_usd_rate: Option<Decimal>,
}

impl SwapRecord {
    pub fn native_leg(&self) -> &TokenLeg {
        match self.direction {
            SwapDirection::NativeToToken => &self.from_token,
            SwapDirection::TokenToNative => &self.to_token,
        }
    }

    pub fn token_leg(&self) -> &TokenLeg {
        match self.direction {
            SwapDirection::NativeToToken => &self.to_token,
            SwapDirection::TokenToNative => &self.from_token,
        }
    }

    /// (native, token) legs
    pub fn legs_mut(&mut self) -> (&mut TokenLeg, &mut TokenLeg) {
        match self.direction {
            SwapDirection::NativeToToken => (&mut self.from_token, &mut self.to_token),
            SwapDirection::TokenToNative => (&mut self.to_token, &mut self.from_token),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransferParty {
    pub public_key: String,
    pub pre_transfer_balance: Decimal,
    pub post_transfer_balance: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransferDetails {
    pub mint_address: String,
    pub symbol: String,
    pub decimals: u32,
    pub sender: TransferParty,
    pub receiver: TransferParty,
    pub amount_transferred: Decimal,
    #[serde(rename = "AmountTransferredSOL")]
    pub amount_transferred_sol: Option<Decimal>,
    #[serde(rename = "AmountTransferredUSD")]
    pub amount_transferred_usd: Option<Decimal>,
    pub token_supply: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    #[serde(rename = "TransferDetails")]
    pub transfer_details: TransferDetails,
    #[serde(rename = "MarketCapitalization")]
    pub market_capitalization: Option<Decimal>,
    /// Always false; lets consumers tell the two record kinds apart
    #[serde(rename = "swapDetected")]
    pub swap_detected: bool,
    #[serde(rename = "Transaction")]
    pub transaction: Transaction,
    #[serde(rename = "Block")]
    pub block: Block,
    #[serde(rename = "solUsdRate")]
    pub sol_usd_rate: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_swap_record_field_names() {
        let record = SwapRecord {
            from_token: TokenLeg {
                symbol: "SOL".to_string(),
                mint: "11111111111111111111111111111111".to_string(),
                decimals: 9,
                amount_change: dec!(-2),
                ..Default::default()
            },
            to_token: TokenLeg {
                symbol: "AAA".to_string(),
                mint: "MintA".to_string(),
                decimals: 6,
                amount_change: dec!(100),
                ..Default::default()
            },
            blockchain_fees: FeeAmount::default(),
            swap_fees: FeeAmount::default(),
            direction: SwapDirection::NativeToToken,
            swap_detected: true,
            transaction: Transaction::default(),
            block: Block::default(),
            sol_usd_rate: None,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["FromToken"]["AmountChange"], json!(-2.0));
        assert_eq!(value["ToToken"]["AmountChange"], json!(100.0));
        assert_eq!(value["ToToken"]["PostSwapBalanceUSD"], json!(null));
        assert_eq!(value["Direction"], json!("NativeToToken"));
        assert_eq!(value["swapDetected"], json!(true));
        assert_eq!(record.native_leg().symbol, "SOL");
        assert_eq!(record.token_leg().symbol, "AAA");
    }
}
