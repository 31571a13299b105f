use std::collections::BTreeMap;

use dyn_clone::DynClone;
use types::{BalanceSnapshot, Currency, PriceTable, RefreshError};

/// Supplies current USD unit prices for a set of currencies.
///
/// Implementations must either return a complete table covering every
/// requested currency or fail the call; the reconciler never prices against
/// a partial table.
#[async_trait::async_trait]
pub trait PriceOracle: Send + Sync + DynClone {
    async fn get_prices(&self, currencies: &[Currency]) -> Result<PriceTable, RefreshError>;
}

dyn_clone::clone_trait_object!(PriceOracle);

/// Fetches a fresh on-chain balance snapshot for a user's deposit addresses.
#[async_trait::async_trait]
pub trait BalanceFetcher: Send + Sync + DynClone {
    async fn get_snapshot(
        &self,
        addresses: &BTreeMap<Currency, String>,
    ) -> Result<BalanceSnapshot, RefreshError>;
}

dyn_clone::clone_trait_object!(BalanceFetcher);
