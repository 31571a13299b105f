use std::collections::HashMap;

use reqwest::Client;
use rust_decimal::Decimal;
use types::{Currency, PriceTable, RefreshError};

use crate::oracle::PriceOracle;

pub const DEFAULT_API_URL: &str = "https://api.coingecko.com/api/v3/simple/price";

/// CoinGecko-backed price oracle. Fetches spot USD prices for the supported
/// currencies via `/simple/price`.
#[derive(Clone)]
pub struct CoinGeckoOracle {
    client: Client,
    base_url: String,
}

impl CoinGeckoOracle {
    #[must_use]
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for CoinGeckoOracle {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

#[async_trait::async_trait]
impl PriceOracle for CoinGeckoOracle {
    async fn get_prices(&self, currencies: &[Currency]) -> Result<PriceTable, RefreshError> {
        if currencies.is_empty() {
            return Ok(PriceTable::default());
        }

        let ids = currencies
            .iter()
            .map(|c| c.asset_id())
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .client
            .get(self.base_url.as_str())
            .query(&[("ids", ids.as_str()), ("vs_currencies", "usd")])
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| RefreshError::OracleUnavailable(format!("request failed: {e}")))?
            .error_for_status()
            .map_err(|e| RefreshError::OracleUnavailable(format!("non-success status: {e}")))?;

        // Response shape: { "bitcoin": { "usd": 12345.6 }, ... }
        let parsed: HashMap<String, HashMap<String, Decimal>> = response
            .json()
            .await
            .map_err(|e| RefreshError::OracleUnavailable(format!("invalid response: {e}")))?;

        let mut prices = Vec::with_capacity(currencies.len());
        for &currency in currencies {
            let quote = parsed
                .get(currency.asset_id())
                .and_then(|entry| entry.get("usd"))
                .copied()
                .ok_or_else(|| {
                    RefreshError::OracleUnavailable(format!("no usd quote for {currency}"))
                })?;
            if quote <= Decimal::ZERO {
                return Err(RefreshError::OracleUnavailable(format!(
                    "non-positive quote for {currency}: {quote}"
                )));
            }
            prices.push((currency, quote));
        }

        Ok(prices.into_iter().collect())
    }
}
