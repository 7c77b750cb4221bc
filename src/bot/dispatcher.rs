use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    bot::Command,
    error::Result,
    integrations::{telegram::IncomingMessage, MessageFormat, Notifier, UpdateSource},
    messages,
    service::PaymentService,
};

const FETCH_BACKOFF: Duration = Duration::from_secs(5);

/// Long-polls chat updates and turns commands into payment service calls.
pub struct Dispatcher {
    updates: Arc<dyn UpdateSource>,
    notifier: Arc<dyn Notifier>,
    service: Arc<PaymentService>,
    admin_chat_id: Option<i64>,
}

impl Dispatcher {
    pub fn new(
        updates: Arc<dyn UpdateSource>,
        notifier: Arc<dyn Notifier>,
        service: Arc<PaymentService>,
        admin_chat_id: Option<i64>,
    ) -> Self {
        Self {
            updates,
            notifier,
            service,
            admin_chat_id,
        }
    }

    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut offset = 0;

        tracing::info!("Dispatcher listening for commands");
        loop {
            let batch = tokio::select! {
                _ = &mut shutdown => break,
                batch = self.updates.fetch_updates(offset) => batch,
            };

            match batch {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        if let Some(message) = update.message {
                            self.handle_message(&message).await;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Fetching updates failed: {}", e);
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(FETCH_BACKOFF) => {}
                    }
                }
            }
        }
        tracing::info!("Dispatcher stopped");
    }

    pub async fn handle_message(&self, message: &IncomingMessage) {
        let Some(command) = message.text.as_deref().and_then(Command::parse) else {
            return;
        };

        let user_id = message.sender_id();
        if command.is_admin_only() && !self.is_admin(user_id) {
            tracing::debug!(user_id, ?command, "Ignoring admin command from non-admin");
            return;
        }

        let result = match command {
            Command::Start => self.handle_start(user_id).await,
            Command::Pay => self.handle_pay(user_id, message.chat.id).await,
            Command::Status => self.handle_status(user_id).await,
            Command::ListPending => self.handle_list_pending(user_id).await,
            Command::Sweep => self.handle_sweep(user_id).await,
        };

        if let Err(e) = result {
            tracing::error!(user_id, ?command, "Command failed: {}", e);
        }
    }

    fn is_admin(&self, user_id: i64) -> bool {
        self.admin_chat_id == Some(user_id)
    }

    async fn reply(&self, chat_id: i64, text: &str) -> Result<()> {
        self.notifier.send_message(chat_id, text, MessageFormat::Plain).await
    }

    async fn handle_start(&self, user_id: i64) -> Result<()> {
        let text = messages::welcome(self.service.offer().amount_cents);
        self.reply(user_id, &text).await
    }

    async fn handle_pay(&self, user_id: i64, chat_id: i64) -> Result<()> {
        let started = match self.service.start_payment(user_id, chat_id).await {
            Ok(started) => started,
            Err(e) => {
                tracing::error!(user_id, "Could not create PIX charge: {}", e);
                return self.reply(user_id, messages::PIX_FAILED).await;
            }
        };

        let offer = self.service.offer();
        let intro = messages::pix_created(offer.amount_cents, offer.expires_in.num_hours());
        self.notifier
            .send_message(user_id, &intro, MessageFormat::Html)
            .await?;
        self.notifier
            .send_message(user_id, &messages::pix_code(&started.charge.pix_code), MessageFormat::Html)
            .await?;
        self.reply(user_id, messages::WAITING_CONFIRMATION).await
    }

    async fn handle_status(&self, user_id: i64) -> Result<()> {
        let text = if self.service.has_pending(user_id).await {
            messages::STATUS_PENDING
        } else {
            messages::STATUS_NONE
        };
        self.reply(user_id, text).await
    }

    async fn handle_list_pending(&self, user_id: i64) -> Result<()> {
        let pending = self.service.pending().await;
        self.reply(user_id, &messages::pending_list(&pending, Utc::now()))
            .await
    }

    async fn handle_sweep(&self, user_id: i64) -> Result<()> {
        match self.service.sweep_stale().await {
            Ok(removed) => self.reply(user_id, &messages::sweep_report(removed.len())).await,
            Err(e) => {
                tracing::error!("Sweep failed to persist: {}", e);
                self.reply(user_id, messages::UNEXPECTED_ERROR).await
            }
        }
    }
}
