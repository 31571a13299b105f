use std::sync::Arc;

use dashmap::DashMap;
use types::{RefreshError, UserId};

#[derive(Debug, Default)]
struct GateEntry {
    in_flight: bool,
    last_attempt: Option<u64>,
}

/// Admission guard for balance refreshes.
///
/// At most one reconciliation per user may be in flight, and attempts for
/// the same user must be at least `min_interval_secs` apart. Admission is a
/// single atomic step under the per-user map entry lock: the in-flight flag
/// and the attempt timestamp are checked and set together, so two requests
/// racing on admission can never both pass the cooldown check. The
/// timestamp is never rolled back on failure; a failed attempt still
/// consumes the cooldown window.
#[derive(Debug, Clone)]
pub struct RefreshGate {
    min_interval_secs: u64,
    entries: Arc<DashMap<UserId, GateEntry>>,
}

/// Live admission for one user. Dropping the permit releases the in-flight
/// marker, whatever path the refresh took.
#[derive(Debug)]
pub struct RefreshPermit {
    user_id: UserId,
    entries: Arc<DashMap<UserId, GateEntry>>,
}

impl RefreshGate {
    #[must_use]
    pub fn new(min_interval_secs: u64) -> Self {
        Self {
            min_interval_secs,
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Requests admission for `user_id` at time `now` (unix seconds).
    ///
    /// `persisted_last` is the ledger's last-refresh timestamp; the gate
    /// honors whichever of it and its own record is most recent, so the
    /// cooldown survives process restarts.
    pub fn try_admit(
        &self,
        user_id: &UserId,
        persisted_last: Option<u64>,
        now: u64,
    ) -> Result<RefreshPermit, RefreshError> {
        let mut entry = self.entries.entry(user_id.clone()).or_default();

        if entry.in_flight {
            return Err(RefreshError::AlreadyInFlight);
        }

        if let Some(last) = entry.last_attempt.max(persisted_last) {
            let elapsed = now.saturating_sub(last);
            if elapsed < self.min_interval_secs {
                return Err(RefreshError::TooSoon(self.min_interval_secs - elapsed));
            }
        }

        entry.in_flight = true;
        entry.last_attempt = Some(now);
        drop(entry);

        Ok(RefreshPermit {
            user_id: user_id.clone(),
            entries: Arc::clone(&self.entries),
        })
    }
}

impl Drop for RefreshPermit {
    fn drop(&mut self) {
        if let Some(mut entry) = self.entries.get_mut(&self.user_id) {
            entry.in_flight = false;
        }
    }
}
