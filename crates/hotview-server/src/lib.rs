//! Static file server with live reload for hotview.
//!
//! This crate provides a native Rust HTTP server using axum, serving:
//! - Files from a single directory, with a fixed extension-to-MIME table
//! - The default document with a live reload client injected
//! - A server-sent events endpoint that pushes `reload` when watched files change
//!
//! # Quick Start
//!
//! ```ignore
//! use std::path::PathBuf;
//! use hotview_server::{ServerConfig, run_server};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let config = ServerConfig {
//!         root: PathBuf::from("public"),
//!         watch_paths: vec![PathBuf::from("public/index.html")],
//!         ..ServerConfig::default()
//!     };
//!
//!     run_server(config).await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum server (hotview-server)
//!                        │
//!                        ├─► /sse ──► NotificationFanout::register
//!                        │                   ▲
//!                        │                   │ broadcast
//!                        │            ChangeWatcher (mtime polling task)
//!                        │
//!                        └─► Static files (default document gets client snippet)
//! ```

mod app;
mod error;
mod live_reload;
mod middleware;
mod state;
mod static_files;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use error::StartError;
use live_reload::{ChangeWatcher, NotificationFanout};
use state::{AppState, LiveReloadState};

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Directory files are served from.
    pub root: PathBuf,
    /// Document served for `/`, relative to `root`.
    pub default_document: String,
    /// Enable live reload.
    pub live_reload_enabled: bool,
    /// Path of the event-stream endpoint.
    pub live_reload_endpoint: String,
    /// Files whose modification triggers a reload.
    pub watch_paths: Vec<PathBuf>,
    /// Interval between modification time samples.
    pub poll_interval: Duration,
    /// Delay between detecting a change and notifying clients.
    pub debounce: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
            root: PathBuf::from("."),
            default_document: "index.html".to_owned(),
            live_reload_enabled: true,
            live_reload_endpoint: "/sse".to_owned(),
            watch_paths: Vec::new(),
            poll_interval: Duration::from_millis(1000),
            debounce: Duration::from_millis(100),
        }
    }
}

/// Bind the listening socket and run the server until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the port can't be bound or the server fails.
pub async fn run_server(config: ServerConfig) -> Result<(), StartError> {
    let listener = bind(&config.host, config.port).await?;
    serve(listener, config, shutdown_signal()).await
}

/// Bind a TCP listener on `host:port`.
///
/// # Errors
///
/// Returns [`StartError::PortInUse`] if another process holds the port.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener, StartError> {
    TcpListener::bind((host, port)).await.map_err(|source| {
        if source.kind() == std::io::ErrorKind::AddrInUse {
            StartError::PortInUse(port)
        } else {
            StartError::Bind {
                host: host.to_owned(),
                port,
                source,
            }
        }
    })
}

/// Serve on an already bound listener until `shutdown` completes.
///
/// Shutdown runs in order: stop the change watcher, close every live reload
/// connection, stop accepting connections.
///
/// # Errors
///
/// Returns an error if the accept loop fails.
pub async fn serve(
    listener: TcpListener,
    config: ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), StartError> {
    let fanout = Arc::new(NotificationFanout::new());
    let watcher_token = CancellationToken::new();

    // Start watching before accepting so early edits aren't missed
    let watcher = if config.live_reload_enabled {
        let watcher = ChangeWatcher::new(
            config.watch_paths.iter().cloned(),
            config.poll_interval,
            config.debounce,
        )
        .await;
        tracing::info!(files = watcher.watched().count(), "Live reload enabled");
        Some(tokio::spawn(
            watcher.run(Arc::clone(&fanout), watcher_token.clone()),
        ))
    } else {
        None
    };

    let live_reload = config.live_reload_enabled.then(|| LiveReloadState {
        fanout: Arc::clone(&fanout),
        snippet: live_reload::client_snippet(&config.live_reload_endpoint),
        endpoint: config.live_reload_endpoint.clone(),
    });

    let state = Arc::new(AppState {
        root: config.root.clone(),
        default_document: config.default_document.clone(),
        live_reload,
    });

    let app = app::create_router(state);

    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, root = %config.root.display(), "Starting server");

    let shutdown_fanout = Arc::clone(&fanout);
    let shutdown_token = watcher_token.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            shutdown_token.cancel();
            let closed = shutdown_fanout.close_all();
            tracing::info!(clients = closed, "Closed live reload connections");
        })
        .await?;

    watcher_token.cancel();
    if let Some(handle) = watcher
        && let Err(err) = handle.await
    {
        tracing::warn!(error = %err, "Change watcher task failed");
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}

/// Create server configuration from hotview config.
#[must_use]
pub fn server_config_from_config(config: &hotview_config::Config) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        root: config.site_resolved.root.clone(),
        default_document: config.site_resolved.default_document.clone(),
        live_reload_enabled: config.live_reload.enabled,
        live_reload_endpoint: config.live_reload.endpoint.clone(),
        watch_paths: config.watched_paths(),
        poll_interval: Duration::from_millis(config.live_reload.poll_interval_ms),
        debounce: Duration::from_millis(config.live_reload.debounce_ms),
    }
}
