use std::error::Error;

use derive_more::Display;

use crate::currency::Currency;
use crate::user::UserId;

/// Everything that can go wrong during a balance refresh.
///
/// `TooSoon` and `AlreadyInFlight` are benign no-ops from the caller's point
/// of view. External-dependency failures abort the attempt with no ledger
/// mutation and no notification, but the cooldown stays consumed.
#[derive(Debug, Display, Clone)]
pub enum RefreshError {
    #[display("refresh throttled, retry in {}s", _0)]
    TooSoon(u64),

    #[display("a refresh for this user is already in flight")]
    AlreadyInFlight,

    #[display("price oracle unavailable: {}", _0)]
    OracleUnavailable(String),

    #[display("balance fetcher unavailable: {}", _0)]
    FetcherUnavailable(String),

    #[display("balance fetch failed for some chains: {:?}", _0)]
    PartialFetch(Vec<Currency>),

    #[display("no USD price for {}", _0)]
    PricingGap(Currency),

    #[display("ledger write failed: {}", _0)]
    LedgerWrite(String),

    #[display("ledger storage error: {}", _0)]
    Storage(String),

    #[display("unknown user: {}", _0)]
    UnknownUser(UserId),

    #[display("configuration error: {}", _0)]
    Config(String),
}

impl RefreshError {
    /// True for outcomes the user-facing boundary treats as a quiet no-op.
    #[must_use]
    pub const fn is_benign(&self) -> bool {
        matches!(self, Self::TooSoon(_) | Self::AlreadyInFlight)
    }
}

impl From<rocksdb::Error> for RefreshError {
    fn from(e: rocksdb::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl Error for RefreshError {}
