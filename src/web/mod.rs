//! Web server: the live SSE stream plus the small status API.

pub mod handlers;

use crate::config::{Config, Endpoint};
use crate::hub::Hub;
use crate::sla::TrackerMap;
use crate::store::KvBucket;

use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub endpoints: Arc<Vec<Endpoint>>,
    pub hub: Arc<Hub>,
    pub trackers: Arc<TrackerMap>,
    pub kv: Arc<dyn KvBucket>,
}

/// HTTP server for Beep.
pub struct Server {
    state: AppState,
    port: u16,
}

impl Server {
    pub fn new(
        cfg: &Config,
        endpoints: Arc<Vec<Endpoint>>,
        hub: Arc<Hub>,
        trackers: Arc<TrackerMap>,
        kv: Arc<dyn KvBucket>,
    ) -> Self {
        Self {
            state: AppState {
                endpoints,
                hub,
                trackers,
                kv,
            },
            port: cfg.http_port,
        }
    }

    fn routes(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/v1/sse", post(handlers::handle_sse))
            .route("/v1/status", get(handlers::handle_status))
            .route("/v1/status/history", get(handlers::handle_history))
            .route("/v1/reset", get(handlers::handle_reset))
            .route("/ping", get(handlers::handle_ping))
            .layer(cors)
            .layer(CatchPanicLayer::custom(handlers::recover_panic))
            .with_state(self.state.clone())
    }

    /// Serve until the shutdown future resolves. Failing to bind the
    /// listening socket is fatal.
    pub async fn start(
        &self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Beep API server running on http://{addr}");

        axum::serve(listener, self.routes())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}
