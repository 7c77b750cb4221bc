use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use crate::domain::PendingPayment;
use crate::error::Result;

pub mod json_store;

pub use json_store::JsonFileStore;

/// Durable `payment_id -> PendingPayment` mapping.
///
/// Mutations persist before returning. When persisting fails the in-memory
/// change is kept and `AppError::Persistence` is returned.
#[async_trait]
pub trait PendingPaymentStore: Send + Sync {
    async fn put(&self, payment: PendingPayment) -> Result<()>;
    async fn remove(&self, payment_id: &str) -> Result<Option<PendingPayment>>;
    async fn get(&self, payment_id: &str) -> Option<PendingPayment>;
    async fn get_all(&self) -> Vec<PendingPayment>;
    async fn contains_user(&self, user_id: i64) -> bool;
    async fn remove_older_than(
        &self,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<PendingPayment>>;
}
