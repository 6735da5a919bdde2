mod catalog;
mod clock;
mod config;
mod css;
mod error;
mod handler;
mod passcode;
mod session;
mod state;
mod template;

use anyhow::Context;
use axum::{Router, http::StatusCode, routing::get};
use chrono::FixedOffset;
use clap::Parser;
use config::{ConfigStore, JsonConfigStore};
use state::AppState;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// How often idle sessions are swept from memory.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Parser, Debug)]
#[command(name = "passgate", about = "Serve a download list behind a shared, self-expiring passcode")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Directory holding admin.json and download.json.
    /// Defaults to the directory of the server binary.
    #[arg(long, env = "DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Passcode configuration file. Overrides `<data-dir>/admin.json`.
    #[arg(long, env = "ADMIN_FILE")]
    admin_file: Option<PathBuf>,

    /// Download catalog file. Overrides `<data-dir>/download.json`.
    #[arg(long, env = "DOWNLOAD_FILE")]
    download_file: Option<PathBuf>,

    /// Fixed UTC offset used for every timestamp, e.g. "+08:00".
    #[arg(long, env = "UTC_OFFSET", default_value = "+08:00", value_parser = clock::parse_utc_offset)]
    utc_offset: FixedOffset,

    /// Idle lifetime of a visitor session, in hours.
    #[arg(long, env = "SESSION_TTL_HOURS", default_value = "24")]
    session_ttl_hours: u64,

    /// Upper bound on waiting for the config write lock, in milliseconds.
    #[arg(long, env = "LOCK_TIMEOUT_MS", default_value = "2000")]
    lock_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (silently ignored if absent).
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "passgate=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let data_dir = match args.data_dir {
        Some(path) => path,
        None => {
            let exe = std::env::current_exe().context("Cannot determine binary path")?;
            exe.parent()
                .context("Binary has no parent directory")?
                .to_path_buf()
        }
    };
    let admin_file = args.admin_file.unwrap_or_else(|| data_dir.join("admin.json"));
    let download_file = args
        .download_file
        .unwrap_or_else(|| data_dir.join("download.json"));

    tracing::info!("config file: {}", admin_file.display());
    tracing::info!("catalog file: {}", download_file.display());
    tracing::info!("time zone: UTC{}", args.utc_offset);

    let config_store = JsonConfigStore::new(
        admin_file,
        Duration::from_millis(args.lock_timeout_ms),
    );
    match config_store.load().await {
        Ok(config) if config.is_configured() => tracing::info!(
            ttl_hours = config.ttl_hours,
            passcode_version = config.passcode_version,
            activated = config.is_activated(),
            "Passcode configured"
        ),
        Ok(_) => tracing::warn!("No passcode set in {}", config_store.path().display()),
        // Not fatal: every request reports it until the file is fixed.
        Err(e) => tracing::warn!("{}", e),
    }

    let state = AppState {
        config: Arc::new(config_store),
        catalog: Arc::new(catalog::CatalogStore::new(download_file)),
        sessions: session::SessionStore::new(Duration::from_secs(args.session_ttl_hours * 3600)),
        clock: clock::Clock::new(args.utc_offset),
    };

    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            tick.tick().await;
            let removed = sessions.prune().await;
            if removed > 0 {
                tracing::debug!("Pruned {} idle sessions", removed);
            }
        }
    });

    // CatchPanicLayer is outermost so it recovers from panics anywhere in the stack.
    let app = Router::new()
        .route("/healthz", get(|| async { StatusCode::OK }))
        .route("/", get(handler::get_index).post(handler::post_index))
        .fallback(handler::not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new());

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Cannot bind to {addr}"))?;

    tracing::info!("Listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result { tracing::error!("ctrl-c error: {}", e); }
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
    tracing::info!("Shutting down gracefully");
}
