//! Longline scraper daemon.
//!
//! Hosts the REST boundary, the job worker loop and the outbox relay in
//! one process. The lifecycle consumer runs as its own binary.

mod api;
mod state;

use longline_browser::{BrowserEngine, SessionPool};
use longline_core::AppConfig;
use longline_db::Database;
use longline_events::{Relay, RelayConfig, StreamBus};
use longline_scheduler::{JobManager, JobWorker, WorkerConfig};
use longline_scraper::{CategoryCrawler, ProductExtractor};
use state::AppState;
use std::sync::Arc;
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
        tracing::error!(error = %err, "fatal startup error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_with_env()?;

    let db = Database::connect(&config.database).await?;
    db.run_migrations().await?;

    let bus = StreamBus::connect(&config.bus).await?;

    let engine = Arc::new(BrowserEngine::launch(&config.browser).await?);
    let sessions = Arc::new(SessionPool::new(engine, &config.browser));

    let crawler = CategoryCrawler::new(
        sessions.navigator().clone(),
        config.scraper.base_url.clone(),
        config.browser.nav_retries,
    );
    let extractor = Arc::new(ProductExtractor::new(
        sessions.navigator().clone(),
        config.scraper.base_url.clone(),
        config.browser.nav_retries,
    ));

    let cancel = CancellationToken::new();

    // Worker loop
    let worker = JobWorker::new(
        db.clone(),
        sessions.clone(),
        crawler,
        ProductExtractor::new(
            sessions.navigator().clone(),
            config.scraper.base_url.clone(),
            config.browser.nav_retries,
        ),
        WorkerConfig {
            job_poll: Duration::from_secs(config.scraper.job_poll_s),
            product_interval: Duration::from_secs(config.scraper.product_interval_s),
            page_interval: Duration::from_secs(config.browser.page_interval_s),
        },
    );
    let worker_cancel = cancel.clone();
    let worker_task = tokio::spawn(async move {
        worker.run(worker_cancel).await;
    });

    // Outbox relay
    let relay = Relay::new(
        db.clone(),
        bus.clone(),
        RelayConfig {
            poll_interval: Duration::from_secs(config.outbox.poll_s),
            batch_size: config.outbox.batch,
            max_retries: config.outbox.max_retries,
        },
    );
    let relay_cancel = cancel.clone();
    let relay_task = tokio::spawn(async move {
        relay.run(relay_cancel).await;
    });

    // REST boundary
    let app_state = Arc::new(AppState {
        db: db.clone(),
        manager: JobManager::new(db.clone()),
        sessions,
        extractor,
        base_url: config.scraper.base_url.clone(),
        nav_retries: config.browser.nav_retries,
    });
    let router = api::router(app_state);

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "HTTP server listening");

    let server_cancel = cancel.clone();
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        server_cancel.cancelled().await;
    });

    // Propagate SIGINT/SIGTERM as one process-wide cancellation
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            signal_cancel.cancel();
        }
    });

    server.await?;

    cancel.cancel();
    let _ = worker_task.await;
    let _ = relay_task.await;
    db.close().await;

    tracing::info!("shutdown complete");
    Ok(())
}
