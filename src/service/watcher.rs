use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::{
    config::Settings,
    domain::{PaymentStatus, PendingPayment},
    integrations::{MessageFormat, Notifier},
    messages,
    payments::PaymentGateway,
    repository::PendingPaymentStore,
};

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub max_attempts: u32,
    pub poll_interval: Duration,
    /// Group the user is admitted to on approval.
    pub group_chat_id: Option<i64>,
    /// Chat alerted when a payment is abandoned at the attempt ceiling.
    pub support_chat_id: Option<i64>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            poll_interval: Duration::from_secs(10),
            group_chat_id: None,
            support_chat_id: None,
        }
    }
}

impl WatcherConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_attempts: settings.watcher.max_attempts,
            poll_interval: settings.poll_interval(),
            group_chat_id: settings.telegram.group_chat_id,
            support_chat_id: settings.telegram.admin_chat_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessGrant {
    Direct,
    InviteLink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    Approved(AccessGrant),
    Declined(PaymentStatus),
    TimedOut,
}

/// Polls one payment until it settles, is declined, or the attempt ceiling
/// is reached. Every outcome removes the store record.
pub struct PaymentWatcher {
    payment: PendingPayment,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn PendingPaymentStore>,
    config: WatcherConfig,
}

impl PaymentWatcher {
    pub fn new(
        payment: PendingPayment,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn PendingPaymentStore>,
        config: WatcherConfig,
    ) -> Self {
        Self {
            payment,
            gateway,
            notifier,
            store,
            config,
        }
    }

    pub async fn run(self) -> WatchOutcome {
        let payment_id = self.payment.payment_id.as_str();
        tracing::info!(
            payment_id,
            user_id = self.payment.user_id,
            max_attempts = self.config.max_attempts,
            "Watching payment"
        );

        let mut attempt = 0;
        while attempt < self.config.max_attempts {
            match self.gateway.get_status(payment_id).await {
                Ok(PaymentStatus::Approved) => {
                    tracing::info!(payment_id, attempt, "Payment approved");
                    let access = self.on_approved().await;
                    self.finish().await;
                    return WatchOutcome::Approved(access);
                }
                Ok(status @ (PaymentStatus::Rejected | PaymentStatus::Cancelled)) => {
                    tracing::info!(payment_id, attempt, %status, "Payment declined");
                    self.notify(messages::PAYMENT_DECLINED).await;
                    self.finish().await;
                    return WatchOutcome::Declined(status);
                }
                Ok(status) => {
                    tracing::debug!(payment_id, attempt, %status, "Payment not settled yet");
                }
                Err(e) => {
                    tracing::warn!(payment_id, attempt, error = %e, "Status poll failed");
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
            attempt += 1;
        }

        // The record goes even if the payment settles later.
        tracing::warn!(
            payment_id,
            attempts = attempt,
            "No terminal status within the polling window; tracking abandoned"
        );
        self.notify(messages::VERIFICATION_EXPIRED).await;
        if let Some(support) = self.config.support_chat_id {
            let alert = messages::support_timeout_alert(&self.payment, attempt);
            if let Err(e) = self.notifier.send_message(support, &alert, MessageFormat::Plain).await {
                tracing::error!(payment_id, "Failed to alert support chat: {}", e);
            }
        }
        self.finish().await;
        WatchOutcome::TimedOut
    }

    async fn on_approved(&self) -> AccessGrant {
        self.notify(messages::PAYMENT_APPROVED).await;

        if let Some(group) = self.config.group_chat_id {
            match self
                .notifier
                .grant_group_access(group, self.payment.user_id)
                .await
            {
                Ok(()) => {
                    self.notify(messages::ADDED_TO_GROUP).await;
                    return AccessGrant::Direct;
                }
                Err(e) => {
                    tracing::warn!(
                        payment_id = %self.payment.payment_id,
                        "Direct group access failed, sending invite link: {}",
                        e
                    );
                }
            }
        }

        let text = match self.notifier.invite_link() {
            Some(link) => messages::invite_link(link),
            None => messages::INVITE_UNAVAILABLE.to_string(),
        };
        self.notify(&text).await;
        AccessGrant::InviteLink
    }

    async fn notify(&self, text: &str) {
        if let Err(e) = self
            .notifier
            .send_message(self.payment.chat_id, text, MessageFormat::Plain)
            .await
        {
            tracing::error!(
                payment_id = %self.payment.payment_id,
                chat_id = self.payment.chat_id,
                "Failed to notify user: {}",
                e
            );
        }
    }

    async fn finish(&self) {
        let payment_id = self.payment.payment_id.as_str();
        match self.store.remove(payment_id).await {
            Ok(Some(_)) => tracing::debug!(payment_id, "Pending payment removed"),
            Ok(None) => tracing::debug!(payment_id, "Pending payment already removed"),
            Err(e) => tracing::error!(payment_id, "Removed in memory but not persisted: {}", e),
        }
    }
}

/// Owns the watcher tasks so shutdown can wait for or abandon them.
#[derive(Clone, Default)]
pub struct WatcherPool {
    tracker: TaskTracker,
}

impl WatcherPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&self, watcher: PaymentWatcher) -> JoinHandle<WatchOutcome> {
        self.tracker.spawn(watcher.run())
    }

    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Waits up to `grace` and returns how many watchers were abandoned.
    /// Abandoned payments stay in the store and are recovered on restart.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        self.tracker.close();
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            return 0;
        }
        let abandoned = self.tracker.len();
        tracing::warn!("Abandoning {} running watcher(s) at shutdown", abandoned);
        abandoned
    }
}
