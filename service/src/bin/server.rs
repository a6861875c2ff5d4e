//! Catalog composite server.
//!
//! # Usage
//!
//! ```bash
//! # Start Redpanda and the three dependent services
//! docker compose up -d
//!
//! cargo run --bin server
//! ```

use catalog_composite::integration::{HttpCatalogTransport, ServiceEndpoints};
use catalog_composite::{CompositeApp, Config};
use catalog_composite_core::environment::SystemClock;
use catalog_composite_redpanda::RedpandaEventBus;
use catalog_composite_runtime::metrics::MetricsExporter;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,catalog_composite=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    config.validate()?;
    tracing::info!(
        address = %config.server.service_address,
        item = %config.downstream.item_url,
        ratings = %config.downstream.ratings_url,
        commentary = %config.downstream.commentary_url,
        redpanda = %config.redpanda.brokers,
        "Configuration loaded"
    );

    let mut exporter = MetricsExporter::new();
    exporter.install()?;

    let bus = RedpandaEventBus::builder()
        .brokers(config.redpanda.brokers.clone())
        .build()?;

    let transport = HttpCatalogTransport::new(
        ServiceEndpoints {
            item: config.downstream.item_url.clone(),
            ratings: config.downstream.ratings_url.clone(),
            commentary: config.downstream.commentary_url.clone(),
        },
        config.downstream.secondary_timeout,
        config.downstream.health_timeout,
    );

    let app = CompositeApp::new(
        &config,
        Arc::new(transport),
        Arc::new(bus),
        Arc::new(SystemClock),
        exporter.handle().cloned(),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!(bind = %config.bind_address(), "Catalog composite listening");

    axum::serve(listener, app.router())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down gracefully, draining publish pool");
    app.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
