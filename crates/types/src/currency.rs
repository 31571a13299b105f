use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A cryptocurrency the platform can accept deposits in.
///
/// The set of currencies a deployment actually supports is configured at
/// runtime; this enum only enumerates what the code knows how to handle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Btc,
    Ltc,
    Usdt,
}

impl Currency {
    pub const ALL: [Self; 3] = [Self::Btc, Self::Ltc, Self::Usdt];

    #[must_use]
    pub const fn ticker(self) -> &'static str {
        match self {
            Self::Btc => "BTC",
            Self::Ltc => "LTC",
            Self::Usdt => "USDT",
        }
    }

    /// CoinGecko asset id used by the price oracle.
    #[must_use]
    pub const fn asset_id(self) -> &'static str {
        match self {
            Self::Btc => "bitcoin",
            Self::Ltc => "litecoin",
            Self::Usdt => "tether",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ticker())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BTC" => Ok(Self::Btc),
            "LTC" => Ok(Self::Ltc),
            "USDT" => Ok(Self::Usdt),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}
