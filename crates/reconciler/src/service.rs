use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ledger::LedgerStore;
use oracle::{BalanceFetcher, PriceOracle};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use types::{DepositEvent, RefreshError, UserId};

use crate::config::Config;
use crate::gate::RefreshGate;
use crate::notify::NotificationSink;
use crate::reconcile::{DepositReconciler, ReconciliationResult};

/// What a completed refresh attempt did.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Credited(DepositEvent),
    NoDeposit,
}

/// Orchestrates one balance refresh end to end: gate admission, snapshot
/// and price fetch, reconciliation, ledger credit, notification.
///
/// A refresh either completes fully or aborts before the ledger write;
/// there is no path that leaves a half-applied credit.
#[derive(Clone)]
pub struct RefreshService {
    ledger: Arc<dyn LedgerStore>,
    oracle: Box<dyn PriceOracle>,
    fetcher: Box<dyn BalanceFetcher>,
    sink: Box<dyn NotificationSink>,
    gate: RefreshGate,
    reconciler: DepositReconciler,
    call_timeout: Duration,
}

impl RefreshService {
    #[must_use]
    pub fn new(
        config: &Config,
        ledger: Arc<dyn LedgerStore>,
        oracle: Box<dyn PriceOracle>,
        fetcher: Box<dyn BalanceFetcher>,
        sink: Box<dyn NotificationSink>,
    ) -> Self {
        Self {
            ledger,
            oracle,
            fetcher,
            sink,
            gate: RefreshGate::new(config.min_refresh_interval_secs),
            reconciler: DepositReconciler::new(
                config.supported_currencies.clone(),
                config.fee_rate,
            ),
            call_timeout: Duration::from_secs(config.call_timeout_secs),
        }
    }

    /// Runs one refresh attempt for `user_id`.
    pub async fn refresh(&self, user_id: &UserId) -> Result<RefreshOutcome, RefreshError> {
        let user = self
            .ledger
            .get_user(user_id)?
            .ok_or_else(|| RefreshError::UnknownUser(user_id.clone()))?;

        let now = unix_now();
        let permit = self.gate.try_admit(user_id, user.last_refresh_at, now)?;

        // Re-read under the permit: a credit that landed between the first
        // read and admission must not be reconciled against stale balances.
        let user = self
            .ledger
            .get_user(user_id)?
            .ok_or_else(|| RefreshError::UnknownUser(user_id.clone()))?;

        // The attempt is stamped before any network I/O so a failing
        // external service cannot be hammered by retries.
        self.ledger.record_refresh_attempt(user_id, now)?;

        let snapshot = timeout(self.call_timeout, self.fetcher.get_snapshot(&user.addresses))
            .await
            .map_err(|_| RefreshError::FetcherUnavailable("balance fetch timed out".into()))??;

        let prices = timeout(
            self.call_timeout,
            self.oracle.get_prices(self.reconciler.currencies()),
        )
        .await
        .map_err(|_| RefreshError::OracleUnavailable("price lookup timed out".into()))??;

        let outcome = match self
            .reconciler
            .reconcile(user_id, &user.balances, &snapshot, &prices)?
        {
            ReconciliationResult::NoDeposit => RefreshOutcome::NoDeposit,
            ReconciliationResult::Deposit(instruction) => {
                self.ledger.apply_credit(&instruction)?;

                let event = DepositEvent::from_instruction(&instruction, now);
                if let Err(e) = self.sink.deposit_detected(&event).await {
                    error!(user_id = %user_id, "notification sink failed: {e}");
                }
                RefreshOutcome::Credited(event)
            }
        };

        drop(permit);
        Ok(outcome)
    }

    /// User-facing boundary: the refresh action always completes from the
    /// caller's perspective, with every failure logged and swallowed but
    /// kept distinguishable in the logs.
    pub async fn handle_refresh(&self, user_id: &UserId) {
        match self.refresh(user_id).await {
            Ok(RefreshOutcome::Credited(event)) => {
                info!(user_id = %user_id, net_usd = %event.net_usd, "balance refreshed, deposit credited");
            }
            Ok(RefreshOutcome::NoDeposit) => {
                debug!(user_id = %user_id, "balance refreshed, no new deposits");
            }
            Err(e) if e.is_benign() => {
                debug!(user_id = %user_id, "refresh skipped: {e}");
            }
            Err(e) => {
                warn!(user_id = %user_id, "refresh attempt failed: {e}");
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
