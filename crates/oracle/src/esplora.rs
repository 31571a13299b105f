use std::collections::BTreeMap;

use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;
use types::{BalanceSnapshot, Currency, RefreshError};

use crate::oracle::BalanceFetcher;

/// Base units per coin reported by the chain index backing `currency`.
/// BTC and LTC indexes report satoshis; USDT amounts carry 6 decimals.
const fn base_units_per_coin(currency: Currency) -> Decimal {
    match currency {
        Currency::Btc | Currency::Ltc => Decimal::from_parts(100_000_000, 0, 0, false, 0),
        Currency::Usdt => Decimal::from_parts(1_000_000, 0, 0, false, 0),
    }
}

#[derive(Debug, Deserialize)]
struct AddressStats {
    chain_stats: TxoStats,
}

#[derive(Debug, Deserialize)]
struct TxoStats {
    funded_txo_sum: u64,
    spent_txo_sum: u64,
}

/// Balance fetcher backed by esplora-compatible REST endpoints
/// (`GET {base}/address/{address}`), one endpoint per chain.
///
/// Only confirmed funds count towards a snapshot; mempool activity is
/// ignored so a deposit is credited once, after confirmation.
#[derive(Clone)]
pub struct EsploraFetcher {
    client: Client,
    endpoints: BTreeMap<Currency, String>,
}

impl EsploraFetcher {
    #[must_use]
    pub fn new(endpoints: BTreeMap<Currency, String>) -> Self {
        Self {
            client: Client::new(),
            endpoints,
        }
    }

    async fn confirmed_balance(
        &self,
        currency: Currency,
        base_url: &str,
        address: &str,
    ) -> Result<Decimal, RefreshError> {
        let url = format!("{}/address/{}", base_url.trim_end_matches('/'), address);

        let stats: AddressStats = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RefreshError::FetcherUnavailable(format!("request failed: {e}")))?
            .error_for_status()
            .map_err(|e| RefreshError::FetcherUnavailable(format!("non-success status: {e}")))?
            .json()
            .await
            .map_err(|e| RefreshError::FetcherUnavailable(format!("invalid response: {e}")))?;

        let confirmed_sat = stats
            .chain_stats
            .funded_txo_sum
            .saturating_sub(stats.chain_stats.spent_txo_sum);

        Ok(Decimal::from(confirmed_sat) / base_units_per_coin(currency))
    }
}

#[async_trait::async_trait]
impl BalanceFetcher for EsploraFetcher {
    async fn get_snapshot(
        &self,
        addresses: &BTreeMap<Currency, String>,
    ) -> Result<BalanceSnapshot, RefreshError> {
        let mut amounts = BTreeMap::new();
        let mut failed = Vec::new();

        for (&currency, address) in addresses {
            let Some(base_url) = self.endpoints.get(&currency) else {
                return Err(RefreshError::FetcherUnavailable(format!(
                    "no chain endpoint configured for {currency}"
                )));
            };

            match self.confirmed_balance(currency, base_url, address).await {
                Ok(amount) => {
                    amounts.insert(currency, amount);
                }
                Err(e) => {
                    warn!(%currency, %address, "balance fetch failed: {e}");
                    failed.push(currency);
                }
            }
        }

        if failed.len() == addresses.len() && !addresses.is_empty() {
            return Err(RefreshError::FetcherUnavailable(
                "all chain queries failed".to_string(),
            ));
        }
        if !failed.is_empty() {
            return Err(RefreshError::PartialFetch(failed));
        }

        Ok(BalanceSnapshot::new(amounts))
    }
}
