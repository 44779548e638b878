//! ivts-ts (Interview Transcript Service)
//!
//! HTTP front end for transcript submission plus the background
//! finalization sweep.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ivts_common::config::{RootFolderInitializer, RootFolderResolver, ServiceConfig};
use ivts_common::db::init_database;
use ivts_common::SystemClock;
use tokio::signal;
use tracing::{info, warn};

use ivts_ts::api::health::BuildInfo;
use ivts_ts::db::SqliteInterviewStore;
use ivts_ts::session::{SessionRules, TranscriptWriter};
use ivts_ts::sweep::{renderer_for, FinalizationSweep, SweepSettings};
use ivts_ts::{build_router, AppState};

/// Command-line arguments for ivts-ts
#[derive(Parser, Debug)]
#[command(name = "ivts-ts")]
#[command(about = "Interview transcript service")]
#[command(version)]
struct Args {
    /// Root folder holding the database, config and archive
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Service config file (defaults to <root>/ivts.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "IVTS_PORT")]
    port: Option<u16>,

    /// Do not start the background finalization sweep
    #[arg(long)]
    no_sweep: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let root_folder = RootFolderResolver::new("ivts-ts")
        .with_cli_arg(args.root_folder.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| initializer.config_path());

    // Config is read before tracing starts because it carries the log level
    let config = ServiceConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .init();

    let build = BuildInfo::current();
    info!(
        "Starting Interview Transcript Service (ivts-ts) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        build.revision,
        build.built_at,
        build.profile
    );

    if config_path.exists() {
        info!("Service config: {}", config_path.display());
    } else {
        warn!(
            "Service config not found at {}, using defaults",
            config_path.display()
        );
    }

    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    let db_path = initializer.database_path();
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("✓ Database ready: {}", db_path.display());

    let store = Arc::new(SqliteInterviewStore::new(pool));
    let clock = Arc::new(SystemClock);

    let writer = Arc::new(TranscriptWriter::new(
        store.clone(),
        clock.clone(),
        SessionRules::from(&config.session),
        config.database.max_lock_wait_ms,
    ));

    let sweep = Arc::new(FinalizationSweep::new(
        store.clone(),
        renderer_for(config.sweep.document_format),
        clock,
        SweepSettings::from_config(
            &config.sweep,
            initializer.root_folder(),
            config.database.max_lock_wait_ms,
        ),
    ));

    let sweep_task = if config.sweep.enabled && !args.no_sweep {
        Some(sweep.clone().run())
    } else {
        info!("Background finalization sweep disabled");
        None
    };

    let app = build_router(AppState::new(store, writer, sweep));

    let port = args.port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", config.server.bind_addr, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("ivts-ts listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(task) = sweep_task {
        task.abort();
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
