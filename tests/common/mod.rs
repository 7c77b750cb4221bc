#![allow(dead_code)]

use async_trait::async_trait;
use pix_relay::{
    domain::{CreatePixPayment, PaymentStatus, PixCharge},
    error::{AppError, Result},
    integrations::{MessageFormat, Notifier},
    payments::PaymentGateway,
    repository::JsonFileStore,
    service::WatcherConfig,
};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const GROUP_ID: i64 = -100_555;
pub const SUPPORT_ID: i64 = 900;
pub const INVITE: &str = "https://t.me/+vipgroup";

#[derive(Debug, Clone)]
pub enum Poll {
    Status(PaymentStatus),
    Fail,
}

/// Gateway that replays a script of poll results, then repeats `fallback`.
pub struct FakeGateway {
    charge: PixCharge,
    script: Mutex<VecDeque<Poll>>,
    fallback: PaymentStatus,
    polls: AtomicUsize,
    created: Mutex<Vec<CreatePixPayment>>,
    fail_create: bool,
}

impl FakeGateway {
    pub fn new(script: Vec<Poll>, fallback: PaymentStatus) -> Self {
        Self {
            charge: PixCharge {
                payment_id: "P1".to_string(),
                pix_code: "C1".to_string(),
            },
            script: Mutex::new(script.into()),
            fallback,
            polls: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
            fail_create: false,
        }
    }

    /// Pending for `n - 1` polls, then `status`.
    pub fn settles_on(n: usize, status: PaymentStatus) -> Self {
        let mut script = vec![Poll::Status(PaymentStatus::Pending); n - 1];
        script.push(Poll::Status(status.clone()));
        Self::new(script, status)
    }

    pub fn never_settles() -> Self {
        Self::new(Vec::new(), PaymentStatus::Pending)
    }

    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Self::never_settles()
        }
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<CreatePixPayment> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn name(&self) -> &str {
        "fake"
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    async fn create_pix(&self, request: &CreatePixPayment) -> Result<PixCharge> {
        if self.fail_create {
            return Err(AppError::Gateway("unavailable".to_string()));
        }
        self.created.lock().unwrap().push(request.clone());
        Ok(self.charge.clone())
    }

    async fn get_status(&self, _payment_id: &str) -> Result<PaymentStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Poll::Status(status)) => Ok(status),
            Some(Poll::Fail) => Err(AppError::Gateway("connection reset".to_string())),
            None => Ok(self.fallback.clone()),
        }
    }
}

/// Notifier that records every message and grant attempt.
pub struct RecordingNotifier {
    sent: Mutex<Vec<(i64, String, MessageFormat)>>,
    grants: Mutex<Vec<(i64, i64)>>,
    grant_fails: bool,
    invite_link: Option<String>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            grants: Mutex::new(Vec::new()),
            grant_fails: false,
            invite_link: Some(INVITE.to_string()),
        }
    }

    pub fn without_admin_rights() -> Self {
        Self {
            grant_fails: true,
            ..Self::new()
        }
    }

    pub fn messages_to(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(chat, _, _)| *chat == chat_id)
            .map(|(_, text, _)| text.clone())
            .collect()
    }

    pub fn sent(&self) -> Vec<(i64, String, MessageFormat)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn grants(&self) -> Vec<(i64, i64)> {
        self.grants.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    async fn send_message(&self, chat_id: i64, text: &str, format: MessageFormat) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id, text.to_string(), format));
        Ok(())
    }

    async fn grant_group_access(&self, group_id: i64, user_id: i64) -> Result<()> {
        self.grants.lock().unwrap().push((group_id, user_id));
        if self.grant_fails {
            return Err(AppError::Notifier("not enough rights".to_string()));
        }
        Ok(())
    }

    fn invite_link(&self) -> Option<&str> {
        self.invite_link.as_deref()
    }
}

pub fn watcher_config() -> WatcherConfig {
    WatcherConfig {
        max_attempts: 60,
        poll_interval: Duration::from_secs(10),
        group_chat_id: Some(GROUP_ID),
        support_chat_id: Some(SUPPORT_ID),
    }
}

pub async fn open_store(dir: &Path) -> Arc<JsonFileStore> {
    Arc::new(JsonFileStore::load(dir.join("pending_payments.json")).await)
}
