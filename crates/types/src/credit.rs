use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::balance::BalanceSnapshot;
use crate::currency::Currency;
use crate::user::UserId;

/// Per-currency audit row for a reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyDelta {
    pub currency: Currency,
    pub previous: Decimal,
    pub current: Decimal,
    /// USD value this currency contributed to the gross deposit. Zero for
    /// currencies that decreased.
    pub credited_usd: Decimal,
}

/// Outcome of a successful reconciliation that detected a deposit.
///
/// Produced once per reconciliation and consumed exactly once by the ledger,
/// which persists the full new snapshot (not deltas) and increments the
/// user's top-up total by `net_usd`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditInstruction {
    pub user_id: UserId,
    pub new_snapshot: BalanceSnapshot,
    pub gross_usd: Decimal,
    pub net_usd: Decimal,
    pub breakdown: Vec<CurrencyDelta>,
}

/// Payload handed to the notification sink after a credit has been applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositEvent {
    pub event_id: String,
    pub user_id: UserId,
    pub breakdown: Vec<CurrencyDelta>,
    pub gross_usd: Decimal,
    pub net_usd: Decimal,
    pub timestamp: u64,
}

impl DepositEvent {
    /// Builds the outward-facing event for a credited instruction.
    /// USD figures are rounded to 2 dp here, at the display boundary only.
    #[must_use]
    pub fn from_instruction(instruction: &CreditInstruction, timestamp: u64) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            user_id: instruction.user_id.clone(),
            breakdown: instruction.breakdown.clone(),
            gross_usd: instruction.gross_usd.round_dp(2),
            net_usd: instruction.net_usd.round_dp(2),
            timestamp,
        }
    }
}
