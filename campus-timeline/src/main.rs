// Campus timeline maintenance daemon
// Opens the timeline store and sweeps expired session feed cursors

use anyhow::Context;
use campus_timeline::services::SweepScheduler;
use campus_timeline::Timeline;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn data_dir() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CAMPUS_TIMELINE_DATA").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./data"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_timeline=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting campus timeline");

    let data_dir = data_dir();
    let (timeline, _settings) = Timeline::open(&data_dir)
        .await
        .with_context(|| format!("failed to open timeline in {}", data_dir.display()))?;

    let ttl = timeline.settings.cursor_ttl();
    let frequency = timeline.settings.sweep_frequency()?;

    timeline.cursors.clear_expired(ttl).await?;

    let scheduler = SweepScheduler::new(timeline.cursors.clone()).await?;
    scheduler.schedule_sweep(frequency, ttl).await?;
    scheduler.start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    tracing::info!("Shutting down campus timeline");
    scheduler.shutdown().await?;
    timeline.repo.pool().close().await;

    Ok(())
}
