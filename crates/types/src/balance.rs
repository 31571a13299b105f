use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::currency::Currency;
use crate::errors::RefreshError;

/// Point-in-time set of on-chain balances for one user.
///
/// A currency absent from the map is an implicit zero. Snapshots are created
/// fresh on every fetch and never mutated; two snapshots are compared by the
/// reconciler, never merged in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    amounts: BTreeMap<Currency, Decimal>,
}

impl BalanceSnapshot {
    #[must_use]
    pub const fn new(amounts: BTreeMap<Currency, Decimal>) -> Self {
        Self { amounts }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Balance for `currency`, zero when the currency is not present.
    #[must_use]
    pub fn amount(&self, currency: Currency) -> Decimal {
        self.amounts.get(&currency).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Currency, Decimal)> + '_ {
        self.amounts.iter().map(|(c, a)| (*c, *a))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.amounts.values().all(Decimal::is_zero)
    }
}

impl FromIterator<(Currency, Decimal)> for BalanceSnapshot {
    fn from_iter<I: IntoIterator<Item = (Currency, Decimal)>>(iter: I) -> Self {
        Self {
            amounts: iter.into_iter().collect(),
        }
    }
}

/// USD unit prices for a set of currencies at time of lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTable {
    prices: BTreeMap<Currency, Decimal>,
}

impl PriceTable {
    #[must_use]
    pub const fn new(prices: BTreeMap<Currency, Decimal>) -> Self {
        Self { prices }
    }

    /// USD unit price for `currency`.
    ///
    /// A missing price is a hard error, never a zero: valuing a balance
    /// without its own price entry would silently mis-credit the user.
    pub fn price(&self, currency: Currency) -> Result<Decimal, RefreshError> {
        self.prices
            .get(&currency)
            .copied()
            .ok_or(RefreshError::PricingGap(currency))
    }

    #[must_use]
    pub fn get(&self, currency: Currency) -> Option<Decimal> {
        self.prices.get(&currency).copied()
    }
}

impl FromIterator<(Currency, Decimal)> for PriceTable {
    fn from_iter<I: IntoIterator<Item = (Currency, Decimal)>>(iter: I) -> Self {
        Self {
            prices: iter.into_iter().collect(),
        }
    }
}
