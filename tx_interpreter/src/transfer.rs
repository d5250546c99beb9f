use crate::balance_calculator::{balance_deltas, scale_amount};
use crate::filters::{BalanceFilter, TokenFilter};
use crate::records::{TransferDetails, TransferParty, TransferRecord};
use crate::settings::ReconciliationSettings;
use crate::types::TransactionRecord;
use crate::update_locator::locate_balance_update;
use crate::Result;
use tracing::debug;

pub struct TransferClassifier {
    settings: ReconciliationSettings,
}

impl TransferClassifier {
    pub fn new(settings: ReconciliationSettings) -> Self {
        Self { settings }
    }

    /// `None` when nothing moved in `mint`
    pub fn classify(&self, record: &TransactionRecord, mint: &str) -> Result<Option<TransferRecord>> {
        let prepared = self.settings.prepare(record);
        let sender = prepared.signer()?.to_string();
        let mint = self.settings.canonical_mint(mint).to_string();

        let updates = TokenFilter::single(mint.as_str()).apply(&prepared)?;
        let deltas = balance_deltas(&updates);
        let (Some(outgoing), Some(incoming)) = (deltas.iter().min(), deltas.iter().max()) else {
            debug!("No {} updates in {}", mint, prepared.transaction.signature);
            return Ok(None);
        };

        let (Some(from), Some(to)) = (
            locate_balance_update(&updates, *outgoing),
            locate_balance_update(&updates, *incoming),
        ) else {
            return Ok(None);
        };

        let decimals = self.settings.decimals_for(&from.currency);
        let amount = scale_amount(*outgoing, decimals).abs().round_dp(decimals);

        let symbol = if to.currency.symbol.is_empty() && self.settings.is_native(&mint) {
            self.settings.native_symbol.clone()
        } else {
            to.currency.symbol.clone()
        };

        Ok(Some(TransferRecord {
            transfer_details: TransferDetails {
                mint_address: mint,
                symbol,
                decimals,
                sender: TransferParty {
                    public_key: sender,
                    pre_transfer_balance: scale_amount(from.pre_balance, decimals),
                    post_transfer_balance: scale_amount(from.post_balance, decimals),
                },
                receiver: TransferParty {
                    public_key: to.account.owner_or_address().to_string(),
                    pre_transfer_balance: scale_amount(to.pre_balance, decimals),
                    post_transfer_balance: scale_amount(to.post_balance, decimals),
                },
                amount_transferred: amount,
                ..Default::default()
            },
            market_capitalization: None,
            swap_detected: false,
            transaction: prepared.transaction.clone(),
            block: prepared.block.clone(),
            sol_usd_rate: prepared.sol_usd_rate,
        }))
    }
}
