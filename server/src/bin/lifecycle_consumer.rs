//! Lifecycle consumer daemon.
//!
//! Reads product-detection events from the stream bus, drives the
//! size-chart extraction API and commits enrichment results. Runs as its
//! own process so stream consumption scales independently of scraping.

use longline_consumer::{ConsumerConfig, LifecycleConsumer, SizeChartClient};
use longline_core::AppConfig;
use longline_db::Database;
use longline_events::StreamBus;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "fatal consumer error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_with_env()?;

    let db = Database::connect(&config.database).await?;
    db.run_migrations().await?;

    let bus = StreamBus::connect(&config.bus).await?;

    let client = SizeChartClient::new(
        config.consumer.size_chart_url.clone(),
        config.consumer.size_chart_retries,
    )?;

    let consumer = LifecycleConsumer::new(
        db.clone(),
        bus,
        client,
        ConsumerConfig {
            stream: config.consumer.stream_name.clone(),
            group: config.consumer.group.clone(),
            consumer_name: config.consumer.consumer_name.clone(),
            block: Duration::from_secs(config.consumer.block_s),
            base_url: config.scraper.base_url.clone(),
        },
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            signal_cancel.cancel();
        }
    });

    consumer.run(cancel).await?;
    db.close().await;

    tracing::info!("consumer shutdown complete");
    Ok(())
}
