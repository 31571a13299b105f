use std::sync::{Arc, Mutex};

use reconciler::NotificationSink;
use types::{DepositEvent, RefreshError};

/// Notification sink that records every event it receives.
#[derive(Clone, Default)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<DepositEvent>>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<DepositEvent> {
        self.events.lock().expect("sink lock poisoned").clone()
    }
}

#[async_trait::async_trait]
impl NotificationSink for CollectingSink {
    async fn deposit_detected(&self, event: &DepositEvent) -> Result<(), RefreshError> {
        self.events
            .lock()
            .expect("sink lock poisoned")
            .push(event.clone());
        Ok(())
    }
}
