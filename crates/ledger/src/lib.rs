pub mod memory;
pub mod rocks;
pub mod store;

pub use memory::MemoryLedger;
pub use rocks::RocksDbLedger;
pub use store::LedgerStore;
