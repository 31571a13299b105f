pub mod config;
pub mod gate;
pub mod notify;
pub mod reconcile;
pub mod service;

pub use config::Config;
pub use gate::{RefreshGate, RefreshPermit};
pub use notify::{NotificationSink, TracingSink};
pub use reconcile::{DepositReconciler, ReconciliationResult};
pub use service::{RefreshOutcome, RefreshService};
