//! Telegram media organizer - entry point
//!
//! Loads configuration, installs tracing, starts the watcher service and runs
//! until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;

use telegram_media_organizer::cli::{CliOptions, USAGE};
use telegram_media_organizer::config::Config;
use telegram_media_organizer::services::{
    Service, ServicesManager, WatcherService, build_organizer, init_tracing,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliOptions::from_args();
    if cli.show_help {
        print!("{USAGE}");
        return Ok(());
    }

    dotenvy::dotenv().ok();
    let mut config = Config::from_env()?;
    cli.apply(&mut config);

    init_tracing(config.log_format)?;
    tracing::info!("Starting Telegram media organizer");
    tracing::info!(
        watch_dir = %config.watch_dir.display(),
        destination = %config.destination_root.display(),
        routing = ?config.routing_mode,
        "Configuration loaded"
    );

    let settings = config.watcher_settings();
    let organizer = build_organizer(&settings)?;
    let watcher = Arc::new(WatcherService::new("watcher", settings, organizer));

    let services = ServicesManager::builder()
        .add_service(watcher.clone() as Arc<dyn Service>)
        .start()
        .await?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested");

    for (name, health) in services.health_all().await {
        tracing::info!(
            service = %name,
            status = ?health.status,
            message = health.message.as_deref().unwrap_or(""),
            "Service health at shutdown"
        );
    }

    if let Some(stats) = watcher.stats().await {
        tracing::info!(
            discovered = stats.discovered,
            moved = stats.moved,
            ignored = stats.ignored,
            errored = stats.errored,
            "Final pipeline counters"
        );
    }

    services.stop_all().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
