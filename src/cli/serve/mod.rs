//! Serve command - resolves configuration, assembles the pipeline and runs
//! the server
//!
//! Startup is all-or-nothing: a configuration or assembly failure aborts
//! before the listener binds, with a non-zero exit and a message naming the
//! violated field. Exit code 0 means a graceful shutdown.

use std::net::{IpAddr, SocketAddr};

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use crate::api;
use crate::config::{ServerSettings, Settings};
use crate::infrastructure::logging;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env().map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;
    logging::init_logging(settings.environment, settings.logging.format);

    let addr = build_socket_addr(&settings.server)?;
    let environment = settings.environment;

    let state = crate::create_app_state(settings).await?;
    let app = api::build_router(state)?;

    info!("Starting server on {} ({} environment)", addr, environment);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shutdown complete");
    Ok(())
}

fn build_socket_addr(server: &ServerSettings) -> anyhow::Result<SocketAddr> {
    Ok(SocketAddr::from((
        server.host.parse::<IpAddr>()?,
        server.port,
    )))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_socket_addr() {
        let server = ServerSettings {
            host: "0.0.0.0".to_string(),
            port: 5000,
        };

        let addr = build_socket_addr(&server).unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:5000");
    }

    #[test]
    fn test_build_socket_addr_rejects_hostname() {
        let server = ServerSettings {
            host: "not an address".to_string(),
            port: 5000,
        };

        assert!(build_socket_addr(&server).is_err());
    }
}
