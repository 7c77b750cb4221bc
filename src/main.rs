use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pix_relay::{
    bot::Dispatcher,
    config::Settings,
    integrations::{telegram::TelegramNotifier, Notifier},
    payments::{MercadoPagoClient, PaymentGateway},
    repository::JsonFileStore,
    service::{PaymentOffer, PaymentService, WatcherConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pix_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new()?;
    settings.check_required()?;

    tracing::info!("Starting PIX relay ({:?} mode)", settings.mode);
    tracing::info!("Admin chat: {:?}", settings.telegram.admin_chat_id);
    tracing::info!("Group chat: {:?}", settings.telegram.group_chat_id);

    // Pending payments survive restarts through the state file
    let store = Arc::new(JsonFileStore::load(&settings.store.path).await);

    let gateway = Arc::new(MercadoPagoClient::new(&settings.gateway));
    let telegram = Arc::new(TelegramNotifier::new(&settings.telegram)?);

    // Check integration health
    if let Err(e) = gateway.health_check().await {
        tracing::warn!("{} health check failed: {}", gateway.name(), e);
    }
    if let Err(e) = telegram.health_check().await {
        tracing::warn!("{} health check failed: {}", telegram.name(), e);
    }

    let service = Arc::new(PaymentService::new(
        gateway,
        telegram.clone(),
        store,
        PaymentOffer::from_settings(&settings),
        WatcherConfig::from_settings(&settings),
        settings.stale_after(),
    ));

    // Old records go first; everything left gets its watcher back
    if let Err(e) = service.sweep_stale().await {
        tracing::error!("Startup sweep failed to persist: {}", e);
    }
    let recovered = service.recover().await;
    tracing::info!("Recovered {} pending payment(s)", recovered);

    // Periodic stale-record sweep
    let sweeper = {
        let service = service.clone();
        let period = settings.sweep_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(e) = service.sweep_stale().await {
                    tracing::error!("Periodic sweep failed to persist: {}", e);
                }
            }
        })
    };

    let dispatcher = Dispatcher::new(
        telegram.clone(),
        telegram,
        service.clone(),
        settings.telegram.admin_chat_id,
    );

    dispatcher
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown requested");
        })
        .await;

    sweeper.abort();
    let abandoned = service.watchers().shutdown(settings.shutdown_grace()).await;
    tracing::info!(
        "Stopped; {} payment(s) left for recovery on next start",
        abandoned
    );

    Ok(())
}
