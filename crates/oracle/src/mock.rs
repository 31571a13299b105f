use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_decimal::Decimal;
use types::{BalanceSnapshot, Currency, PriceTable, RefreshError};

use crate::oracle::{BalanceFetcher, PriceOracle};

/// In-memory price oracle for tests. Returns the configured prices for the
/// requested currencies, or fails every call when built with `unavailable`.
#[derive(Clone, Default)]
pub struct MockPriceOracle {
    prices: BTreeMap<Currency, Decimal>,
    unavailable: bool,
    calls: Arc<AtomicUsize>,
}

impl MockPriceOracle {
    #[must_use]
    pub fn new<I: IntoIterator<Item = (Currency, Decimal)>>(prices: I) -> Self {
        Self {
            prices: prices.into_iter().collect(),
            unavailable: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PriceOracle for MockPriceOracle {
    async fn get_prices(&self, currencies: &[Currency]) -> Result<PriceTable, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.unavailable {
            return Err(RefreshError::OracleUnavailable("mock oracle offline".into()));
        }

        // Only hand back entries we actually have: a gap in the configured
        // prices surfaces as a PricingGap in the reconciler.
        Ok(currencies
            .iter()
            .filter_map(|c| self.prices.get(c).map(|p| (*c, *p)))
            .collect())
    }
}

/// Scripted balance fetcher for tests.
///
/// Responses queued with `push_response` are consumed in order; once the
/// queue is empty every call returns the fallback snapshot. An optional
/// per-call delay simulates a slow chain backend for timeout tests.
#[derive(Clone)]
pub struct MockBalanceFetcher {
    responses: Arc<Mutex<VecDeque<Result<BalanceSnapshot, RefreshError>>>>,
    fallback: BalanceSnapshot,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockBalanceFetcher {
    #[must_use]
    pub fn new(fallback: BalanceSnapshot) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            fallback,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_response(&self, response: Result<BalanceSnapshot, RefreshError>) {
        self.responses
            .lock()
            .expect("mock fetcher lock poisoned")
            .push_back(response);
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BalanceFetcher for MockBalanceFetcher {
    async fn get_snapshot(
        &self,
        _addresses: &BTreeMap<Currency, String>,
    ) -> Result<BalanceSnapshot, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self
            .responses
            .lock()
            .expect("mock fetcher lock poisoned")
            .pop_front();

        match queued {
            Some(response) => response,
            None => Ok(self.fallback.clone()),
        }
    }
}
