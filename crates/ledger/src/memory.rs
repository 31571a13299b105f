use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use dashmap::DashMap;
use types::{CreditInstruction, RefreshError, UserAccount, UserId};

use crate::store::LedgerStore;

/// In-memory ledger used by tests.
///
/// Counts credit writes and can be told to fail the next write, which the
/// integration tests use to check the no-partial-credit and no-double-credit
/// properties.
#[derive(Default)]
pub struct MemoryLedger {
    users: DashMap<UserId, UserAccount>,
    credit_writes: AtomicUsize,
    fail_next_write: AtomicBool,
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn credit_write_count(&self) -> usize {
        self.credit_writes.load(Ordering::SeqCst)
    }

    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }
}

impl LedgerStore for MemoryLedger {
    fn get_user(&self, user_id: &UserId) -> Result<Option<UserAccount>, RefreshError> {
        Ok(self.users.get(user_id).map(|entry| entry.clone()))
    }

    fn insert_user(&self, account: &UserAccount) -> Result<(), RefreshError> {
        self.users.insert(account.user_id.clone(), account.clone());
        Ok(())
    }

    fn record_refresh_attempt(&self, user_id: &UserId, timestamp: u64) -> Result<(), RefreshError> {
        let mut entry = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| RefreshError::UnknownUser(user_id.clone()))?;
        entry.last_refresh_at = Some(timestamp);
        Ok(())
    }

    fn apply_credit(&self, instruction: &CreditInstruction) -> Result<(), RefreshError> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(RefreshError::LedgerWrite("injected write failure".into()));
        }

        // The dashmap entry guard keeps the balance update and the top-up
        // increment a single atomic step, mirroring the RocksDB row write.
        let mut entry = self
            .users
            .get_mut(&instruction.user_id)
            .ok_or_else(|| RefreshError::UnknownUser(instruction.user_id.clone()))?;

        entry.balances = instruction.new_snapshot.clone();
        entry.top_up_amount_usd += instruction.net_usd.round_dp(2);
        self.credit_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
