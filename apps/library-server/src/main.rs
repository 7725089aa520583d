//! # Library Server
//!
//! HTTP JSON API for the school library.
//!
//! ## Usage
//! ```bash
//! # Defaults, or the platform config file if present
//! library-server
//!
//! # Explicit config file
//! library-server --config ./library.toml
//!
//! # Environment overrides
//! LIBRARY_PORT=9000 LIBRARY_REQUIRE_LOGIN=true LIBRARY_SESSION_SECRET=... library-server
//! ```
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  init_tracing ─► LibraryConfig::load ─► Database::new (migrations)     │
//! │       ─► router(AppState) ─► axum::serve ... until Ctrl+C / SIGTERM    │
//! │       ─► Database::close                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use anyhow::Context;
use library_db::{Database, DbConfig};
use library_server::{router, AppState, LibraryConfig};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting School Library server");

    let config = LibraryConfig::load(config_path_from_args()).context("Failed to load configuration")?;
    info!(
        addr = %config.server.bind_address(),
        db = %config.database.path.display(),
        require_login = config.auth.require_login,
        "Configuration loaded"
    );

    if let Some(parent) = config.database.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
    }

    let db_config = DbConfig::new(&config.database.path).max_connections(config.database.max_connections);
    let db = Database::new(db_config)
        .await
        .context("Failed to open database")?
        .with_policy(config.to_policy());
    info!("Database connected and migrations applied");

    let listener = TcpListener::bind(config.server.bind_address())
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind_address()))?;
    info!(addr = %config.server.bind_address(), "Library server listening");

    let app = router(AppState::new(db.clone(), config));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,library=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

/// `--config <path>` / `-c <path>`, else `LIBRARY_CONFIG`.
fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" || arg == "-c" {
            return args.next().map(PathBuf::from);
        }
    }
    std::env::var("LIBRARY_CONFIG").ok().map(PathBuf::from)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
