pub mod coingecko;
pub mod esplora;
pub mod mock;
pub mod oracle;

pub use coingecko::CoinGeckoOracle;
pub use esplora::EsploraFetcher;
pub use oracle::{BalanceFetcher, PriceOracle};
