use std::time::Duration;

use skirmish::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

const DEFAULT_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_GRACE_MS: u64 = 3000;

/// Listen address from `SKIRMISH_ADDR`.
fn bind_addr() -> String {
    std::env::var("SKIRMISH_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string())
}

/// Shutdown grace period from `SKIRMISH_SHUTDOWN_GRACE_MS`.
fn shutdown_grace() -> Duration {
    let millis = std::env::var("SKIRMISH_SHUTDOWN_GRACE_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_GRACE_MS);
    Duration::from_millis(millis)
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let server = SkirmishServer::builder().bind(&bind_addr()).build().await?;
    tracing::info!(addr = %server.local_addr()?, "starting skirmish server");

    let shutdown = server.shutdown_token();
    let mut running = tokio::spawn(server.run());

    tokio::select! {
        // The accept loop only returns on shutdown, so an early return is
        // a failure worth surfacing.
        result = &mut running => {
            result??;
            return Ok(());
        }
        _ = termination_signal() => {
            tracing::info!("termination signal received");
        }
    }

    shutdown.cancel();
    let grace = shutdown_grace();
    match tokio::time::timeout(grace, running).await {
        Ok(result) => result??,
        Err(_) => {
            tracing::warn!(grace_ms = grace.as_millis() as u64, "graceful shutdown timed out, exiting");
        }
    }
    Ok(())
}
