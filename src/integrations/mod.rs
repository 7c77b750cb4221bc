use async_trait::async_trait;
use crate::error::Result;

pub mod telegram;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    Plain,
    Html,
}

/// Chat side of the relay: message delivery and group access.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    async fn health_check(&self) -> Result<()>;
    async fn send_message(&self, chat_id: i64, text: &str, format: MessageFormat) -> Result<()>;
    /// Fails when the bot lacks admin rights or the user has no pending
    /// join request.
    async fn grant_group_access(&self, group_id: i64, user_id: i64) -> Result<()>;
    /// Pre-provisioned invite link, if one is configured.
    fn invite_link(&self) -> Option<&str>;
}

/// Incoming chat traffic for the command dispatcher.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn fetch_updates(&self, offset: i64) -> Result<Vec<telegram::Update>>;
}
