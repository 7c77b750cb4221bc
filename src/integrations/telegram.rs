use async_trait::async_trait;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, ChatId, ParseMode, UpdateKind, UserId};
use teloxide::RequestError;

use crate::{
    config::TelegramConfig,
    error::{AppError, Result},
    integrations::{MessageFormat, Notifier, UpdateSource},
};

/// The parts of a Telegram update the dispatcher acts on.
#[derive(Debug, Clone)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

impl IncomingMessage {
    /// Sender id, falling back to the chat id for anonymous posts.
    pub fn sender_id(&self) -> i64 {
        self.from.as_ref().map(|u| u.id).unwrap_or(self.chat.id)
    }
}

#[derive(Debug, Clone)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
}

impl From<teloxide::types::Update> for Update {
    fn from(update: teloxide::types::Update) -> Self {
        let from = update
            .from()
            .and_then(|user| i64::try_from(user.id.0).ok())
            .map(|id| User { id });

        let message = match update.kind {
            UpdateKind::Message(message) => Some(IncomingMessage {
                chat: Chat { id: message.chat.id.0 },
                from,
                text: message.text().map(str::to_string),
            }),
            _ => None,
        };

        Self {
            update_id: i64::from(update.id.0),
            message,
        }
    }
}

/// Telegram Bot API client.
pub struct TelegramNotifier {
    bot: Bot,
    invite_link: Option<String>,
    long_poll_timeout_secs: u32,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = teloxide::net::default_reqwest_settings()
            // must outlive the getUpdates long poll
            .timeout(Duration::from_secs(config.long_poll_timeout_secs.saturating_add(30)))
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client: {}", e)))?;

        let api_url = reqwest::Url::parse(&config.api_url)
            .map_err(|e| AppError::Config(format!("telegram.api_url: {}", e)))?;

        let bot = Bot::with_client(config.bot_token.clone().unwrap_or_default(), client)
            .set_api_url(api_url);

        Ok(Self {
            bot,
            invite_link: config
                .group_invite_link
                .clone()
                .filter(|link| !link.is_empty()),
            long_poll_timeout_secs: u32::try_from(config.long_poll_timeout_secs).unwrap_or(u32::MAX),
        })
    }
}

fn api_error(method: &str, e: RequestError) -> AppError {
    AppError::Notifier(format!("{} failed: {}", method, e))
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "Telegram"
    }

    async fn health_check(&self) -> Result<()> {
        let me = self.bot.get_me().await.map_err(|e| api_error("getMe", e))?;
        tracing::debug!(bot_id = me.user.id.0, "Telegram bot reachable");
        Ok(())
    }

    async fn send_message(&self, chat_id: i64, text: &str, format: MessageFormat) -> Result<()> {
        let request = self.bot.send_message(ChatId(chat_id), text);
        let request = match format {
            MessageFormat::Html => request.parse_mode(ParseMode::Html),
            MessageFormat::Plain => request,
        };
        request.await.map_err(|e| api_error("sendMessage", e))?;
        Ok(())
    }

    async fn grant_group_access(&self, group_id: i64, user_id: i64) -> Result<()> {
        let user = u64::try_from(user_id)
            .map(UserId)
            .map_err(|_| AppError::Notifier(format!("invalid user id {}", user_id)))?;

        self.bot
            .approve_chat_join_request(ChatId(group_id), user)
            .await
            .map_err(|e| api_error("approveChatJoinRequest", e))?;
        Ok(())
    }

    fn invite_link(&self) -> Option<&str> {
        self.invite_link.as_deref()
    }
}

#[async_trait]
impl UpdateSource for TelegramNotifier {
    async fn fetch_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let updates = self
            .bot
            .get_updates()
            .offset(i32::try_from(offset).unwrap_or(i32::MAX))
            .timeout(self.long_poll_timeout_secs)
            .allowed_updates(vec![AllowedUpdate::Message])
            .await
            .map_err(|e| api_error("getUpdates", e))?;

        Ok(updates.into_iter().map(Update::from).collect())
    }
}
