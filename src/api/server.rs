//! HTTP server using Axum
//!
//! Serves the demo page, the health check, and the WebSocket upgrade
//! endpoint, with graceful shutdown driven by a watch channel.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::error::Result;

use super::routes;

/// Shared state for handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Server-wide graceful-shutdown signal, handed to every session
    pub shutdown: watch::Receiver<bool>,
}

/// The echo server
pub struct EchoServer {
    config: Config,
    state: AppState,
}

impl EchoServer {
    /// Create a new server; `shutdown` is propagated to every session
    pub fn new(config: Config, shutdown: watch::Receiver<bool>) -> Self {
        let state = AppState {
            config: config.clone(),
            shutdown,
        };

        Self { config, state }
    }

    fn build_router(&self) -> Router {
        routes::create_router(self.state.clone()).layer(TraceLayer::new_for_http())
    }

    /// Run the server until the shutdown signal fires
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let listener = TcpListener::bind(self.config.addr()).await?;
        info!("server listening on {}", self.config.addr());

        axum::serve(
            listener,
            self.build_router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;

        info!("server shut down");
        Ok(())
    }
}
