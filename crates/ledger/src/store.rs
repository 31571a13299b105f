use std::collections::BTreeMap;

use types::{BalanceSnapshot, CreditInstruction, Currency, RefreshError, UserAccount, UserId};

/// Keyed store for per-user ledger records.
///
/// The user record is the only shared mutable state in the system.
/// Implementations must serialize concurrent writers for the same user while
/// allowing full concurrency across distinct users, and `apply_credit` must
/// be atomic: no observable state where the balances are updated but the
/// top-up total is not, or vice versa.
pub trait LedgerStore: Send + Sync {
    fn get_user(&self, user_id: &UserId) -> Result<Option<UserAccount>, RefreshError>;

    fn insert_user(&self, account: &UserAccount) -> Result<(), RefreshError>;

    /// Stamps the user's last-refresh timestamp. Called on admission, before
    /// any network I/O, and never rolled back when the attempt later fails.
    fn record_refresh_attempt(&self, user_id: &UserId, timestamp: u64) -> Result<(), RefreshError>;

    /// Persists the instruction's snapshot verbatim and increments the
    /// top-up total by the net USD value, rounded to 2 dp at this boundary.
    fn apply_credit(&self, instruction: &CreditInstruction) -> Result<(), RefreshError>;

    fn get_balances(&self, user_id: &UserId) -> Result<BalanceSnapshot, RefreshError> {
        self.get_user(user_id)?
            .map(|account| account.balances)
            .ok_or_else(|| RefreshError::UnknownUser(user_id.clone()))
    }

    fn get_addresses(&self, user_id: &UserId) -> Result<BTreeMap<Currency, String>, RefreshError> {
        self.get_user(user_id)?
            .map(|account| account.addresses)
            .ok_or_else(|| RefreshError::UnknownUser(user_id.clone()))
    }
}
