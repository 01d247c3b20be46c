// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact Shield Service
//!
//! Serves the contact form API and the static frontend behind a
//! three-tier abuse shield.
//!
//! ## Configuration
//!
//! Defaults are overlaid by an optional TOML file (`CONFIG_FILE`, default
//! `contact-shield.toml`) and by `SHIELD__*` environment variables. The
//! following shortcuts are also honoured:
//!
//! - `PORT`: listen on `0.0.0.0:$PORT` (default: 3001)
//! - `DATABASE_PATH`: SQLite file (default: db/contacts.db)
//! - `ADMIN_API_KEY`: key for the admin endpoints
//! - `FRONTEND_URL`: extra allowed CORS origin
//! - `STATIC_DIR`: static frontend directory
//! - `APP_ENV`: `development` or `production`

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use contact_shield::{config::Config, db::Database, handlers::AppState, routes::router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = Config::load()?;
    info!(
        bind_addr = %config.bind_addr,
        environment = ?config.environment,
        abuse_max_requests = config.rate_limit.abuse_max_requests,
        abuse_window_secs = config.rate_limit.abuse_window_secs,
        abuse_block_secs = config.rate_limit.abuse_block_secs,
        submission_max_requests = config.rate_limit.submission_max_requests,
        "Starting contact shield"
    );

    let db = Database::open(&config.database.path)?;
    let addr: SocketAddr = config.bind_addr.parse()?;
    let sweep_interval = config.rate_limit.sweep_interval();

    let state = Arc::new(AppState::new(config, db)?);
    let sweeper = state.shield.spawn_sweeper(sweep_interval);

    let app = router(state.clone());

    // Start server
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    state.shield.clear().await;
    info!("Shield state cleared, shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
