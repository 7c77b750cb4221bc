pub mod payment_service;
pub mod watcher;

pub use payment_service::{PaymentOffer, PaymentService, StartedPayment};
pub use watcher::{AccessGrant, PaymentWatcher, WatchOutcome, WatcherConfig, WatcherPool};
