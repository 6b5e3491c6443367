//! Beep - availability monitor with rolling 90-day SLA tracking.

mod config;
mod hub;
mod probe;
mod scheduler;
mod sla;
mod store;
mod web;

use config::Config;
use hub::Hub;
use scheduler::Scheduler;
use sla::TrackerMap;
use store::nats::NatsKv;
use store::StatusWriter;
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("beep=info".parse()?),
        )
        .init();

    let cfg = Config::load();
    tracing::info!("starting Beep on port {}...", cfg.http_port);

    let kv = match NatsKv::connect(&cfg).await {
        Ok(kv) => Arc::new(kv),
        Err(e) => {
            tracing::error!("failed to connect to NATS at {}: {e}", cfg.nats_url);
            std::process::exit(1);
        }
    };
    tracing::info!("connected to NATS at {}", cfg.nats_url);

    let endpoints = Arc::new(cfg.endpoints.clone());
    let hub = Arc::new(Hub::new());
    let trackers = Arc::new(TrackerMap::new(cfg.sla_target, cfg.bucket_span));
    let writer = Arc::new(StatusWriter::new(kv.clone()));

    let scheduler = Scheduler::new(
        endpoints.clone(),
        trackers.clone(),
        hub.clone(),
        writer,
        cfg.user_agent.clone(),
    );
    scheduler.start().await;
    tracing::info!("Beep is now active and monitoring services");

    let server = Server::new(&cfg, endpoints, hub, trackers, kv.clone());
    server.start(shutdown_signal()).await?;

    tracing::info!("shutdown signal received, draining probe workers...");
    scheduler.shutdown().await;

    if let Err(e) = kv.flush().await {
        tracing::error!("NATS flush error: {e}");
    }
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
