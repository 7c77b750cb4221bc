//! Offline inspection of the pending-payment state file.
//!
//! Run it while the relay is stopped: the relay rewrites the whole file on
//! every change and would overwrite edits made here.

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pix_relay::repository::{JsonFileStore, PendingPaymentStore};

#[derive(Parser)]
#[command(author, version, about = "Inspect and clean the PIX relay state file")]
struct Cli {
    /// Path to the state file
    #[arg(long, default_value = "pending_payments.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List pending payments
    List,
    /// Remove payments older than the threshold
    Sweep {
        #[arg(long, default_value_t = 24)]
        older_than_hours: i64,
    },
    /// Remove one payment by id
    Remove { payment_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let store = JsonFileStore::load(&cli.state).await;
    let now = Utc::now();

    match cli.command {
        Commands::List => {
            let pending = store.get_all().await;
            if pending.is_empty() {
                println!("No pending payments in {}", cli.state.display());
            }
            for payment in pending {
                println!(
                    "{}\tuser={}\tchat={}\tcreated={}\tage={}m",
                    payment.payment_id,
                    payment.user_id,
                    payment.chat_id,
                    payment.created_at.to_rfc3339(),
                    payment.age(now).num_minutes()
                );
            }
        }
        Commands::Sweep { older_than_hours } => {
            let Some(max_age) = Duration::try_hours(older_than_hours).filter(|d| *d >= Duration::zero())
            else {
                anyhow::bail!("--older-than-hours must be a non-negative number of hours");
            };
            let removed = store.remove_older_than(max_age, now).await?;
            println!("🧹 Removed {} stale payment(s)", removed.len());
            for payment in removed {
                println!("  - {}", payment.payment_id);
            }
        }
        Commands::Remove { payment_id } => match store.remove(&payment_id).await? {
            Some(_) => println!("✅ Removed {}", payment_id),
            None => anyhow::bail!("payment {} is not pending", payment_id),
        },
    }

    Ok(())
}
