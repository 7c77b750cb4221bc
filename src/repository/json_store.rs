use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::{
    domain::PendingPayment,
    error::Result,
    repository::PendingPaymentStore,
};

type Entries = BTreeMap<String, PendingPayment>;

/// Pending payments kept in memory and mirrored to a JSON file.
///
/// The whole map is rewritten on every mutation, so the mutex covers both the
/// change and the write.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<Entries>,
}

impl JsonFileStore {
    /// Opens the state file. A missing file yields an empty store. An
    /// unreadable or corrupt file is moved aside first so the next write
    /// cannot replace it.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Entries>(&bytes) {
                Ok(entries) => {
                    tracing::info!(
                        "Loaded {} pending payment(s) from {}",
                        entries.len(),
                        path.display()
                    );
                    entries
                }
                Err(e) => {
                    tracing::error!(
                        "State file {} is corrupt ({}); starting with an empty store",
                        path.display(),
                        e
                    );
                    quarantine(&path).await;
                    Entries::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(
                    "No state file at {}; starting with an empty store",
                    path.display()
                );
                Entries::new()
            }
            Err(e) => {
                tracing::error!(
                    "Could not read state file {} ({}); starting with an empty store",
                    path.display(),
                    e
                );
                quarantine(&path).await;
                Entries::new()
            }
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    // Caller holds the lock.
    async fn persist(&self, entries: &Entries) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(entries)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = sibling(&self.path, ".tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!("Persisted {} pending payment(s)", entries.len());
        Ok(())
    }
}

#[async_trait]
impl PendingPaymentStore for JsonFileStore {
    async fn put(&self, payment: PendingPayment) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(payment.payment_id.clone(), payment);
        self.persist(&entries).await
    }

    async fn remove(&self, payment_id: &str) -> Result<Option<PendingPayment>> {
        let mut entries = self.entries.lock().await;
        let removed = entries.remove(payment_id);
        if removed.is_some() {
            self.persist(&entries).await?;
        }
        Ok(removed)
    }

    async fn get(&self, payment_id: &str) -> Option<PendingPayment> {
        self.entries.lock().await.get(payment_id).cloned()
    }

    async fn get_all(&self) -> Vec<PendingPayment> {
        self.entries.lock().await.values().cloned().collect()
    }

    async fn contains_user(&self, user_id: i64) -> bool {
        self.entries
            .lock()
            .await
            .values()
            .any(|p| p.user_id == user_id)
    }

    async fn remove_older_than(
        &self,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<PendingPayment>> {
        let mut entries = self.entries.lock().await;

        let stale: Vec<String> = entries
            .values()
            .filter(|p| p.is_stale(max_age, now))
            .map(|p| p.payment_id.clone())
            .collect();

        let removed: Vec<PendingPayment> = stale
            .iter()
            .filter_map(|id| entries.remove(id))
            .collect();

        if !removed.is_empty() {
            self.persist(&entries).await?;
        }
        Ok(removed)
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("pending_payments"));
    name.push(suffix);
    path.with_file_name(name)
}

async fn quarantine(path: &Path) {
    let target = sibling(path, ".corrupt");
    match tokio::fs::rename(path, &target).await {
        Ok(()) => tracing::warn!("Moved bad state file to {}", target.display()),
        Err(e) => tracing::error!("Could not move bad state file aside: {}", e),
    }
}
