use std::path::Path;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use rocksdb::DB;
use types::{CreditInstruction, RefreshError, UserAccount, UserId};

use crate::store::LedgerStore;

/// RocksDB-backed ledger.
///
/// Each user record lives under a single key and is rewritten whole, so a
/// credit (new balances + incremented top-up total) lands in one atomic put.
/// Read-modify-write sequences take a per-user lock; distinct users proceed
/// concurrently.
pub struct RocksDbLedger {
    db: DB,
    write_locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl RocksDbLedger {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RefreshError> {
        let db = DB::open_default(path)?;
        Ok(Self {
            db,
            write_locks: DashMap::new(),
        })
    }

    fn user_key(user_id: &UserId) -> String {
        format!("u:{user_id}")
    }

    fn lock_for(&self, user_id: &UserId) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(user_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn load(&self, user_id: &UserId) -> Result<Option<UserAccount>, RefreshError> {
        let Some(bytes) = self.db.get(Self::user_key(user_id))? else {
            return Ok(None);
        };
        let (account, _) =
            bincode::serde::decode_from_slice::<UserAccount, _>(&bytes, bincode::config::standard())
                .map_err(|e| RefreshError::Storage(format!("corrupt user record: {e}")))?;
        Ok(Some(account))
    }

    fn store(&self, account: &UserAccount) -> Result<(), RefreshError> {
        let bytes = bincode::serde::encode_to_vec(account, bincode::config::standard())
            .map_err(|e| RefreshError::Storage(format!("failed to encode user record: {e}")))?;
        self.db.put(Self::user_key(&account.user_id), bytes)?;
        Ok(())
    }
}

impl LedgerStore for RocksDbLedger {
    fn get_user(&self, user_id: &UserId) -> Result<Option<UserAccount>, RefreshError> {
        self.load(user_id)
    }

    fn insert_user(&self, account: &UserAccount) -> Result<(), RefreshError> {
        let lock = self.lock_for(&account.user_id);
        let _guard = lock.lock().map_err(|_| poisoned())?;
        self.store(account)
    }

    fn record_refresh_attempt(&self, user_id: &UserId, timestamp: u64) -> Result<(), RefreshError> {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().map_err(|_| poisoned())?;

        let mut account = self
            .load(user_id)?
            .ok_or_else(|| RefreshError::UnknownUser(user_id.clone()))?;
        account.last_refresh_at = Some(timestamp);
        self.store(&account)
    }

    fn apply_credit(&self, instruction: &CreditInstruction) -> Result<(), RefreshError> {
        let lock = self.lock_for(&instruction.user_id);
        let _guard = lock.lock().map_err(|_| poisoned())?;

        let mut account = self
            .load(&instruction.user_id)?
            .ok_or_else(|| RefreshError::UnknownUser(instruction.user_id.clone()))?;

        account.balances = instruction.new_snapshot.clone();
        account.top_up_amount_usd += instruction.net_usd.round_dp(2);

        let bytes = bincode::serde::encode_to_vec(&account, bincode::config::standard())
            .map_err(|e| RefreshError::LedgerWrite(format!("failed to encode user record: {e}")))?;
        self.db
            .put(Self::user_key(&account.user_id), bytes)
            .map_err(|e| RefreshError::LedgerWrite(e.to_string()))
    }
}

fn poisoned() -> RefreshError {
    RefreshError::Storage("ledger write lock poisoned".to_string())
}
