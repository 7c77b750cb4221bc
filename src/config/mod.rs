use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};
use std::time::Duration;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Production,
    Development,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub mode: RunMode,
    pub gateway: GatewayConfig,
    pub telegram: TelegramConfig,
    pub payment: PaymentConfig,
    pub watcher: WatcherSettings,
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub access_token: Option<String>,
    pub base_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub api_url: String,
    pub admin_chat_id: Option<i64>,
    pub group_chat_id: Option<i64>,
    pub group_invite_link: Option<String>,
    pub long_poll_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    pub amount_cents: i64,
    pub description: String,
    pub payer_email: String,
    pub expiry_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatcherSettings {
    pub max_attempts: u32,
    pub poll_interval_secs: u64,
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: String,
    pub stale_after_hours: i64,
    pub sweep_interval_secs: u64,
}

impl Settings {
    pub fn new() -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("mode", "production")?
            .set_default("gateway.base_url", "https://api.mercadopago.com")?
            .set_default("gateway.request_timeout_secs", 15)?
            .set_default("telegram.api_url", "https://api.telegram.org")?
            .set_default("telegram.long_poll_timeout_secs", 30)?
            .set_default("payment.amount_cents", 2500)?
            .set_default("payment.description", "Acesso ao Grupo")?
            .set_default("payment.payer_email", "email@dominio.xpto")?
            .set_default("payment.expiry_hours", 24)?
            .set_default("watcher.max_attempts", 60)?
            .set_default("watcher.poll_interval_secs", 10)?
            .set_default("watcher.shutdown_grace_secs", 5)?
            .set_default("store.path", "pending_payments.json")?
            .set_default("store.stale_after_hours", 24)?
            .set_default("store.sweep_interval_secs", 3600)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Environment variables (PIXRELAY__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("PIXRELAY").separator("__"))

            // Flat variable names used by existing deployments
            .set_override_option("gateway.access_token", legacy_env("MERCADOPAGO_ACCESS_TOKEN"))?
            .set_override_option("telegram.bot_token", legacy_env("TELEGRAM_TOKEN"))?
            .set_override_option("telegram.admin_chat_id", legacy_env("MY_CHAT_ID"))?
            .set_override_option("telegram.group_chat_id", legacy_env("GROUP_CHAT_ID"))?
            .set_override_option("telegram.group_invite_link", legacy_env("GROUP_INVITE_LINK"))?

            .build()?;

        config.try_deserialize()
    }

    /// Names of the required settings that are absent or empty.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.gateway.access_token) {
            missing.push("gateway.access_token (MERCADOPAGO_ACCESS_TOKEN)");
        }
        if is_blank(&self.telegram.bot_token) {
            missing.push("telegram.bot_token (TELEGRAM_TOKEN)");
        }
        if self.telegram.admin_chat_id.is_none() {
            missing.push("telegram.admin_chat_id (MY_CHAT_ID)");
        }
        if self.telegram.group_chat_id.is_none() {
            missing.push("telegram.group_chat_id (GROUP_CHAT_ID)");
        }
        if is_blank(&self.telegram.group_invite_link) {
            missing.push("telegram.group_invite_link (GROUP_INVITE_LINK)");
        }
        missing
    }

    /// Settings whose values would stall or panic the timers built from them.
    pub fn invalid_values(&self) -> Vec<&'static str> {
        let mut invalid = Vec::new();
        if self.watcher.poll_interval_secs == 0 {
            invalid.push("watcher.poll_interval_secs must be positive");
        }
        if self.store.sweep_interval_secs == 0 {
            invalid.push("store.sweep_interval_secs must be positive");
        }
        if !valid_hours(self.payment.expiry_hours) {
            invalid.push("payment.expiry_hours must be between 1 and 8760");
        }
        if !valid_hours(self.store.stale_after_hours) {
            invalid.push("store.stale_after_hours must be between 1 and 8760");
        }
        invalid
    }

    /// Invalid values are always fatal. Missing required settings are fatal
    /// in production and only logged in development.
    pub fn check_required(&self) -> Result<()> {
        let invalid = self.invalid_values();
        if !invalid.is_empty() {
            return Err(AppError::Config(invalid.join(", ")));
        }

        let missing = self.missing_required();
        if missing.is_empty() {
            return Ok(());
        }

        match self.mode {
            RunMode::Production => Err(AppError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            ))),
            RunMode::Development => {
                for name in &missing {
                    tracing::warn!("Development mode: required setting {} is not configured", name);
                }
                Ok(())
            }
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.watcher.poll_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.watcher.shutdown_grace_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.store.sweep_interval_secs)
    }

    pub fn stale_after(&self) -> chrono::Duration {
        hours_or_default(self.store.stale_after_hours)
    }

    pub fn payment_expiry(&self) -> chrono::Duration {
        hours_or_default(self.payment.expiry_hours)
    }
}

const MAX_HOURS: i64 = 24 * 365;

fn valid_hours(hours: i64) -> bool {
    (1..=MAX_HOURS).contains(&hours)
}

fn hours_or_default(hours: i64) -> chrono::Duration {
    let hours = if valid_hours(hours) { hours } else { 24 };
    chrono::Duration::hours(hours)
}

fn legacy_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: RunMode::Production,
            gateway: GatewayConfig {
                access_token: None,
                base_url: "https://api.mercadopago.com".to_string(),
                request_timeout_secs: 15,
            },
            telegram: TelegramConfig {
                bot_token: None,
                api_url: "https://api.telegram.org".to_string(),
                admin_chat_id: None,
                group_chat_id: None,
                group_invite_link: None,
                long_poll_timeout_secs: 30,
            },
            payment: PaymentConfig {
                amount_cents: 2500,
                description: "Acesso ao Grupo".to_string(),
                payer_email: "email@dominio.xpto".to_string(),
                expiry_hours: 24,
            },
            watcher: WatcherSettings {
                max_attempts: 60,
                poll_interval_secs: 10,
                shutdown_grace_secs: 5,
            },
            store: StoreConfig {
                path: "pending_payments.json".to_string(),
                stale_after_hours: 24,
                sweep_interval_secs: 3600,
            },
        }
    }
}
