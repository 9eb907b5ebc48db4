use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use noshoes_core::{CleanupConfig, SweepHandle, Sweeper};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use noshoes_api::config::ServerConfig;
use noshoes_api::router::build_app_router;
use noshoes_api::state::{AppState, RetentionState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "noshoes_api=debug,noshoes_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid server configuration");
        std::process::exit(1);
    });
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Retention sweeper ---
    let sweeper = match CleanupConfig::from_env().and_then(|c| c.build_sweeper_if_enabled()) {
        Ok(Some(sweeper)) => Some(sweeper),
        Ok(None) => {
            tracing::info!("GPX retention disabled and not configured");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "GPX retention disabled: invalid cleanup configuration");
            None
        }
    };
    let (retention, sweep_handle) = match sweeper {
        Some(sweeper) => start_sweeper(sweeper),
        None => (None, None),
    };

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        retention,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let host: IpAddr = config.host.parse().unwrap_or_else(|e| {
        tracing::error!(host = %config.host, error = %e, "Invalid HOST address");
        std::process::exit(1);
    });
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    if let Some(handle) = sweep_handle {
        let timeout = Duration::from_secs(config.shutdown_timeout_secs);
        if handle.shutdown(timeout).await {
            tracing::info!("Retention sweeper shut down");
        } else {
            tracing::warn!(
                timeout_secs = config.shutdown_timeout_secs,
                "Retention sweep still running at shutdown timeout, abandoning it"
            );
        }
    }

    tracing::info!("Graceful shutdown complete");
}

fn start_sweeper(sweeper: Sweeper) -> (Option<RetentionState>, Option<SweepHandle>) {
    let policy = sweeper.policy();
    tracing::info!(
        schedule = %sweeper.schedule(),
        storage_path = %policy.storage_root().display(),
        max_age_hours = policy.max_age().num_hours(),
        recursive = policy.recursive(),
        extension = policy.extension().unwrap_or("*"),
        "GPX retention configured"
    );

    let handle = sweeper.start();
    (Some(RetentionState::new(sweeper, &handle)), Some(handle))
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
