pub mod balance;
pub mod credit;
pub mod currency;
pub mod errors;
pub mod user;

pub use balance::{BalanceSnapshot, PriceTable};
pub use credit::{CreditInstruction, CurrencyDelta, DepositEvent};
pub use currency::Currency;
pub use errors::RefreshError;
pub use user::{UserAccount, UserId};
