use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::{
    config::Settings,
    domain::{CreatePixPayment, PendingPayment, PixCharge},
    error::Result,
    integrations::Notifier,
    payments::PaymentGateway,
    repository::PendingPaymentStore,
    service::watcher::{PaymentWatcher, WatchOutcome, WatcherConfig, WatcherPool},
};

/// What a PIX charge is created for.
#[derive(Debug, Clone)]
pub struct PaymentOffer {
    pub amount_cents: i64,
    pub description: String,
    pub payer_email: String,
    pub expires_in: Duration,
}

impl PaymentOffer {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            amount_cents: settings.payment.amount_cents,
            description: settings.payment.description.clone(),
            payer_email: settings.payment.payer_email.clone(),
            expires_in: settings.payment_expiry(),
        }
    }

    pub fn request_for(&self, user_id: i64, now: DateTime<Utc>) -> CreatePixPayment {
        CreatePixPayment {
            amount_cents: self.amount_cents,
            description: format!("{} - User {}", self.description, user_id),
            expires_at: now + self.expires_in,
            payer_email: self.payer_email.clone(),
        }
    }
}

pub struct StartedPayment {
    pub charge: PixCharge,
    pub watcher: JoinHandle<WatchOutcome>,
}

pub struct PaymentService {
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn PendingPaymentStore>,
    watchers: WatcherPool,
    offer: PaymentOffer,
    watcher_config: WatcherConfig,
    stale_after: Duration,
}

impl PaymentService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn PendingPaymentStore>,
        offer: PaymentOffer,
        watcher_config: WatcherConfig,
        stale_after: Duration,
    ) -> Self {
        Self {
            gateway,
            notifier,
            store,
            watchers: WatcherPool::new(),
            offer,
            watcher_config,
            stale_after,
        }
    }

    pub fn offer(&self) -> &PaymentOffer {
        &self.offer
    }

    pub fn watchers(&self) -> &WatcherPool {
        &self.watchers
    }

    /// Opens a PIX charge, records it and starts watching it.
    pub async fn start_payment(&self, user_id: i64, chat_id: i64) -> Result<StartedPayment> {
        let request = self.offer.request_for(user_id, Utc::now());
        let charge = self.gateway.create_pix(&request).await?;

        let record = PendingPayment::new(charge.payment_id.clone(), user_id, chat_id);
        if let Err(e) = self.store.put(record.clone()).await {
            // Still tracked in memory for this process.
            tracing::error!(
                payment_id = %record.payment_id,
                "Pending payment not persisted: {}",
                e
            );
        }

        let watcher = self.watch(record);
        Ok(StartedPayment { charge, watcher })
    }

    pub fn watch(&self, payment: PendingPayment) -> JoinHandle<WatchOutcome> {
        self.watchers.spawn(PaymentWatcher::new(
            payment,
            self.gateway.clone(),
            self.notifier.clone(),
            self.store.clone(),
            self.watcher_config.clone(),
        ))
    }

    pub async fn has_pending(&self, user_id: i64) -> bool {
        self.store.contains_user(user_id).await
    }

    pub async fn pending(&self) -> Vec<PendingPayment> {
        self.store.get_all().await
    }

    pub async fn sweep_stale(&self) -> Result<Vec<PendingPayment>> {
        self.sweep_stale_at(Utc::now()).await
    }

    pub async fn sweep_stale_at(&self, now: DateTime<Utc>) -> Result<Vec<PendingPayment>> {
        let removed = self.store.remove_older_than(self.stale_after, now).await?;
        if !removed.is_empty() {
            tracing::info!("Swept {} stale pending payment(s)", removed.len());
        }
        for payment in &removed {
            tracing::debug!(payment_id = %payment.payment_id, "Stale pending payment removed");
        }
        Ok(removed)
    }

    /// Restarts a watcher for every stored payment. The attempt ceiling
    /// starts over.
    pub async fn recover(&self) -> usize {
        let pending = self.store.get_all().await;
        let count = pending.len();
        for payment in pending {
            tracing::info!(payment_id = %payment.payment_id, "Resuming watcher");
            // Detached; the pool keeps tracking it.
            drop(self.watch(payment));
        }
        count
    }
}
