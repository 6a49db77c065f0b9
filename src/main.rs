//! Growbox Alerter service
//!
//! Run with: cargo run
//! Run a single pass and exit: cargo run -- --once
//!
//! Configuration comes from the environment (an optional `.env` file is
//! loaded first). See `AlerterConfig::from_env` for the full list; the
//! most common ones are:
//! - ALERTER_EMAIL / ALERTER_PASSWORD: SMTP sender credentials
//! - BOT_TOKEN: chat bot token
//! - ALERTER_DATA_DIR: row store directory (default: box_data)
//! - ALERTER_CHECK_INTERVAL_SECS: pass interval (default: 10)
//! - RUST_LOG: Log level (default: growbox_alerter=info)

use std::sync::Arc;

use growbox_alerter::config::AlerterConfig;
use growbox_alerter::directory::SqliteDirectory;
use growbox_alerter::notify::{Dispatcher, SmtpMailer, TelegramSender};
use growbox_alerter::scheduler::{AlertWorker, Alerter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "growbox_alerter=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Ok(path) = dotenv {
        tracing::info!("Loaded environment from {}", path.display());
    }

    let config = AlerterConfig::from_env()?;

    tracing::info!("Alerter configuration:");
    tracing::info!("  Row store: {}", config.data_dir.display());
    tracing::info!("  Subscribers: {}", config.db_path.display());
    tracing::info!("  Check interval: {:?}", config.check_interval);
    tracing::info!("  Cooldown: {:?}", config.cooldown);
    tracing::info!("  Max data age: {:?}", config.max_data_age);
    for bound in config.thresholds.iter() {
        tracing::info!(
            "  {}: {}-{}{}",
            bound.label,
            bound.min,
            bound.max,
            bound.unit
        );
    }

    let directory = SqliteDirectory::open(&config.db_path, config.send_timeout);
    let mut dispatcher = Dispatcher::new(Arc::new(directory));

    match &config.email {
        Some(email) => match SmtpMailer::new(email, config.send_timeout) {
            Ok(mailer) => {
                tracing::info!("  Email: {} via {}:{}", email.sender, email.smtp_host, email.smtp_port);
                dispatcher = dispatcher.with_mailer(Arc::new(mailer));
            }
            Err(e) => tracing::error!(error = %e, "Email channel disabled"),
        },
        None => tracing::warn!("  Email: DISABLED (ALERTER_EMAIL/ALERTER_PASSWORD not set)"),
    }

    match &config.chat {
        Some(chat) => match TelegramSender::new(chat, config.send_timeout) {
            Ok(sender) => {
                tracing::info!("  Chat: {}", chat.api_url);
                dispatcher = dispatcher.with_chat(Arc::new(sender));
            }
            Err(e) => tracing::error!(error = %e, "Chat channel disabled"),
        },
        None => tracing::warn!("  Chat: DISABLED (BOT_TOKEN not set)"),
    }

    let alerter = Arc::new(Alerter::new(&config, dispatcher));
    let mut worker = AlertWorker::new(alerter, config.check_interval);

    if std::env::args().skip(1).any(|arg| arg == "--once") {
        let outcome = worker.run_once().await;
        tracing::info!(outcome = ?outcome, "Single pass finished");
        return Ok(());
    }

    tracing::info!("Starting alert service");
    let handle = worker.start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    worker.stop().await;
    handle.await?;

    let stats = worker.stats();
    tracing::info!(
        passes = stats.passes,
        alerts = stats.alerts_sent,
        errors = stats.errors,
        "Alert service stopped"
    );

    Ok(())
}
