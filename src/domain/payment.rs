use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One in-flight payment that a watcher is polling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingPayment {
    pub payment_id: String,
    pub user_id: i64,
    pub chat_id: i64,
    pub created_at: DateTime<Utc>,
}

impl PendingPayment {
    pub fn new(payment_id: impl Into<String>, user_id: i64, chat_id: i64) -> Self {
        Self {
            payment_id: payment_id.into(),
            user_id,
            chat_id,
            created_at: Utc::now(),
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.created_at)
    }

    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) > max_age
    }
}

/// Status as reported by the gateway. Unknown provider values are kept
/// verbatim and treated as non-terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Other(String),
}

impl PaymentStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => PaymentStatus::Pending,
            "approved" => PaymentStatus::Approved,
            "rejected" => PaymentStatus::Rejected,
            "cancelled" => PaymentStatus::Cancelled,
            other => PaymentStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Other(s) => s.as_str(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Approved | PaymentStatus::Rejected | PaymentStatus::Cancelled
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request sent to the gateway to open a PIX charge.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatePixPayment {
    pub amount_cents: i64,
    pub description: String,
    pub expires_at: DateTime<Utc>,
    pub payer_email: String,
}

/// What the gateway hands back: the id to poll and the "copia e cola" code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixCharge {
    pub payment_id: String,
    pub pix_code: String,
}

/// Formats cents as Brazilian reais, e.g. `2500` -> `R$ 25,00`.
pub fn format_brl(amount_cents: i64) -> String {
    let sign = if amount_cents < 0 { "-" } else { "" };
    let cents = amount_cents.unsigned_abs();
    format!("{}R$ {},{:02}", sign, cents / 100, cents % 100)
}
