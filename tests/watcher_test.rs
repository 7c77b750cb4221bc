use pix_relay::{
    domain::{PaymentStatus, PendingPayment},
    messages,
    repository::PendingPaymentStore,
    service::{AccessGrant, PaymentWatcher, WatchOutcome, WatcherConfig},
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::time::Instant;

mod common;
use common::{FakeGateway, Poll, RecordingNotifier, GROUP_ID, INVITE, SUPPORT_ID};

const USER: i64 = 4242;
const CHAT: i64 = 4243;

async fn watch(
    gateway: Arc<FakeGateway>,
    notifier: Arc<RecordingNotifier>,
    config: WatcherConfig,
) -> anyhow::Result<(WatchOutcome, bool)> {
    let dir = tempdir()?;
    let store = common::open_store(dir.path()).await;
    let payment = PendingPayment::new("P1", USER, CHAT);
    store.put(payment.clone()).await?;

    let outcome = PaymentWatcher::new(payment, gateway, notifier, store.clone(), config)
        .run()
        .await;

    // Check the file, not just memory
    let still_stored = common::open_store(dir.path()).await.get("P1").await.is_some();
    Ok((outcome, still_stored))
}

#[tokio::test(start_paused = true)]
async fn test_approved_on_third_poll() -> anyhow::Result<()> {
    let gateway = Arc::new(FakeGateway::settles_on(3, PaymentStatus::Approved));
    let notifier = Arc::new(RecordingNotifier::new());
    let started = Instant::now();

    let (outcome, still_stored) =
        watch(gateway.clone(), notifier.clone(), common::watcher_config()).await?;

    assert_eq!(outcome, WatchOutcome::Approved(AccessGrant::Direct));
    assert!(!still_stored);
    assert_eq!(gateway.polls(), 3);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(20) && elapsed < Duration::from_secs(21));
    assert_eq!(notifier.grants(), vec![(GROUP_ID, USER)]);
    assert_eq!(
        notifier.messages_to(CHAT),
        vec![
            messages::PAYMENT_APPROVED.to_string(),
            messages::ADDED_TO_GROUP.to_string(),
        ]
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_approved_on_last_allowed_poll() -> anyhow::Result<()> {
    let gateway = Arc::new(FakeGateway::settles_on(60, PaymentStatus::Approved));
    let notifier = Arc::new(RecordingNotifier::new());

    let (outcome, still_stored) =
        watch(gateway.clone(), notifier.clone(), common::watcher_config()).await?;

    assert_eq!(outcome, WatchOutcome::Approved(AccessGrant::Direct));
    assert!(!still_stored);
    assert_eq!(gateway.polls(), 60);
    assert!(!notifier
        .messages_to(CHAT)
        .contains(&messages::VERIFICATION_EXPIRED.to_string()));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_rejected_sends_one_failure_notice() -> anyhow::Result<()> {
    let gateway = Arc::new(FakeGateway::settles_on(1, PaymentStatus::Rejected));
    let notifier = Arc::new(RecordingNotifier::new());

    let (outcome, still_stored) =
        watch(gateway.clone(), notifier.clone(), common::watcher_config()).await?;

    assert_eq!(outcome, WatchOutcome::Declined(PaymentStatus::Rejected));
    assert!(!still_stored);
    assert_eq!(gateway.polls(), 1);
    assert_eq!(notifier.messages_to(CHAT), vec![messages::PAYMENT_DECLINED.to_string()]);
    assert!(notifier.grants().is_empty());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_after_pending_polls() -> anyhow::Result<()> {
    let gateway = Arc::new(FakeGateway::settles_on(5, PaymentStatus::Cancelled));
    let notifier = Arc::new(RecordingNotifier::new());

    let (outcome, still_stored) =
        watch(gateway.clone(), notifier.clone(), common::watcher_config()).await?;

    assert_eq!(outcome, WatchOutcome::Declined(PaymentStatus::Cancelled));
    assert!(!still_stored);
    assert_eq!(gateway.polls(), 5);
    assert_eq!(notifier.messages_to(CHAT).len(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_times_out_after_sixty_polls() -> anyhow::Result<()> {
    let gateway = Arc::new(FakeGateway::never_settles());
    let notifier = Arc::new(RecordingNotifier::new());
    let started = Instant::now();

    let (outcome, still_stored) =
        watch(gateway.clone(), notifier.clone(), common::watcher_config()).await?;

    assert_eq!(outcome, WatchOutcome::TimedOut);
    assert!(!still_stored);
    assert_eq!(gateway.polls(), 60);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(600) && elapsed < Duration::from_secs(601));
    assert_eq!(
        notifier.messages_to(CHAT),
        vec![messages::VERIFICATION_EXPIRED.to_string()]
    );

    let alerts = notifier.messages_to(SUPPORT_ID);
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("P1"));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_grant_failure_falls_back_to_invite_link() -> anyhow::Result<()> {
    let gateway = Arc::new(FakeGateway::settles_on(2, PaymentStatus::Approved));
    let notifier = Arc::new(RecordingNotifier::without_admin_rights());

    let (outcome, still_stored) =
        watch(gateway.clone(), notifier.clone(), common::watcher_config()).await?;

    assert_eq!(outcome, WatchOutcome::Approved(AccessGrant::InviteLink));
    assert!(!still_stored);
    assert_eq!(notifier.grants(), vec![(GROUP_ID, USER)]);
    assert_eq!(
        notifier.messages_to(CHAT),
        vec![
            messages::PAYMENT_APPROVED.to_string(),
            messages::invite_link(INVITE),
        ]
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_no_group_configured_sends_invite_link() -> anyhow::Result<()> {
    let gateway = Arc::new(FakeGateway::settles_on(1, PaymentStatus::Approved));
    let notifier = Arc::new(RecordingNotifier::new());
    let config = WatcherConfig {
        group_chat_id: None,
        ..common::watcher_config()
    };

    let (outcome, _) = watch(gateway, notifier.clone(), config).await?;

    assert_eq!(outcome, WatchOutcome::Approved(AccessGrant::InviteLink));
    assert!(notifier.grants().is_empty());
    assert!(notifier.messages_to(CHAT).contains(&messages::invite_link(INVITE)));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transient_errors_count_as_inconclusive_polls() -> anyhow::Result<()> {
    let gateway = Arc::new(FakeGateway::new(
        vec![
            Poll::Fail,
            Poll::Status(PaymentStatus::Other("in_process".to_string())),
            Poll::Fail,
            Poll::Status(PaymentStatus::Approved),
        ],
        PaymentStatus::Pending,
    ));
    let notifier = Arc::new(RecordingNotifier::new());

    let (outcome, _) = watch(gateway.clone(), notifier.clone(), common::watcher_config()).await?;

    assert_eq!(outcome, WatchOutcome::Approved(AccessGrant::Direct));
    assert_eq!(gateway.polls(), 4);
    // Errors stay silent to the user
    assert_eq!(notifier.messages_to(CHAT).len(), 2);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_errors_until_ceiling_time_out() -> anyhow::Result<()> {
    let gateway = Arc::new(FakeGateway::new(vec![Poll::Fail; 3], PaymentStatus::Pending));
    let notifier = Arc::new(RecordingNotifier::new());
    let config = WatcherConfig {
        max_attempts: 3,
        support_chat_id: None,
        ..common::watcher_config()
    };

    let (outcome, still_stored) = watch(gateway.clone(), notifier.clone(), config).await?;

    assert_eq!(outcome, WatchOutcome::TimedOut);
    assert!(!still_stored);
    assert_eq!(gateway.polls(), 3);
    assert_eq!(notifier.sent().len(), 1);

    Ok(())
}
