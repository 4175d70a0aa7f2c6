//! Echod server - Entry Point
//!
//! Starts the echo server with graceful shutdown support.

use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use echod::api::EchoServer;
use echod::config::Config;
use echod::error::EchoError;

/// How long in-flight connections get to close after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> echod::Result<()> {
    let config = Config::from_env();

    // Initialize tracing; RUST_LOG overrides the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("echod={},tower_http=info", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        port = config.port,
        read_buffer_size = config.read_buffer_size,
        write_buffer_size = config.write_buffer_size,
        "starting websocket echo server"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = EchoServer::new(config, shutdown_rx);

    let server_shutdown = shutdown_tx.subscribe();
    let mut server_task = tokio::spawn(async move { server.run(server_shutdown).await });

    tokio::select! {
        res = &mut server_task => {
            // Bind failure or another fatal server error
            return res.map_err(|e| EchoError::Internal(e.to_string()))?;
        }
        _ = shutdown_signal() => {}
    }

    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    match timeout(SHUTDOWN_GRACE, &mut server_task).await {
        Ok(res) => res.map_err(|e| EchoError::Internal(e.to_string()))??,
        Err(_) => warn!("grace period elapsed, forcing shutdown"),
    }

    info!("server stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
