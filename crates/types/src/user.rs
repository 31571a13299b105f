use std::collections::BTreeMap;

use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::balance::BalanceSnapshot;
use crate::currency::Currency;

/// Opaque, stable user identifier.
#[derive(
    Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct UserId(String);

impl UserId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Per-user ledger record.
///
/// Mutated only through `LedgerStore` operations; the reconciler never
/// touches it directly. `top_up_amount_usd` is monotonically non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub user_id: UserId,
    pub balances: BalanceSnapshot,
    pub addresses: BTreeMap<Currency, String>,
    pub top_up_amount_usd: Decimal,
    pub consumption_amount_usd: Decimal,
    pub last_refresh_at: Option<u64>,
}

impl UserAccount {
    #[must_use]
    pub fn new(user_id: UserId, addresses: BTreeMap<Currency, String>) -> Self {
        Self {
            user_id,
            balances: BalanceSnapshot::empty(),
            addresses,
            top_up_amount_usd: Decimal::ZERO,
            consumption_amount_usd: Decimal::ZERO,
            last_refresh_at: None,
        }
    }

    /// Spendable USD credit: top-ups minus consumption, displayed at 2 dp.
    /// Consumption is gated elsewhere so this never goes negative.
    #[must_use]
    pub fn available_usd(&self) -> Decimal {
        (self.top_up_amount_usd - self.consumption_amount_usd)
            .max(Decimal::ZERO)
            .round_dp(2)
    }
}
