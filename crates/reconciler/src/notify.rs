use dyn_clone::DynClone;
use tracing::info;
use types::{DepositEvent, RefreshError};

/// Outbound channel for deposit reports.
///
/// Fire-and-forget: the service logs sink failures and moves on, and a
/// given credit produces at most one event.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync + DynClone {
    async fn deposit_detected(&self, event: &DepositEvent) -> Result<(), RefreshError>;
}

dyn_clone::clone_trait_object!(NotificationSink);

/// Sink that reports deposits to the structured log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait::async_trait]
impl NotificationSink for TracingSink {
    async fn deposit_detected(&self, event: &DepositEvent) -> Result<(), RefreshError> {
        info!(
            event_id = %event.event_id,
            user_id = %event.user_id,
            gross_usd = %event.gross_usd,
            net_usd = %event.net_usd,
            currencies = event.breakdown.len(),
            "deposit credited"
        );
        Ok(())
    }
}
