//! `hotview serve` command implementation.

use std::path::PathBuf;

use clap::Args;
use hotview_config::{CliSettings, Config};
use hotview_server::{StartError, run_server, server_config_from_config};

use super::check::preflight;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover hotview.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to serve (overrides config).
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose output (request and reload logs).
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable live reload (default: enabled).
    #[arg(long)]
    live_reload: Option<bool>,

    /// Disable live reload.
    #[arg(long, conflicts_with = "live_reload")]
    no_live_reload: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, required files are missing,
    /// or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let live_reload_enabled = self.resolve_live_reload_enabled();
        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            root: self.root,
            live_reload_enabled,
        };

        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        tracing::debug!(
            config_path = ?config.config_path,
            root = %config.site_resolved.root.display(),
            "Configuration loaded"
        );

        // Nothing is bound until the required files are confirmed
        preflight(&config, &output)?;

        output.highlight(&format!(
            "Serving {} at http://{}:{}",
            config.site_resolved.root.display(),
            config.server.host,
            config.server.port
        ));
        output.info(&format!(
            "Default document: {}",
            config.site_resolved.default_document
        ));

        if config.live_reload.enabled {
            output.info(&format!(
                "Live reload: enabled ({})",
                config.live_reload.endpoint
            ));
            for path in config.watched_paths() {
                output.item(&path.display().to_string());
            }
        } else {
            output.info("Live reload: disabled");
        }
        output.info("Press Ctrl+C to stop");

        let server_config = server_config_from_config(&config);
        match run_server(server_config).await {
            Ok(()) => {
                output.success("Server stopped");
                Ok(())
            }
            Err(err @ StartError::PortInUse(_)) => {
                output.warning("Stop the other server first or pick another port with --port");
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Resolve `live_reload_enabled` from --live-reload/--no-live-reload flags.
    fn resolve_live_reload_enabled(&self) -> Option<bool> {
        self.no_live_reload.then_some(false).or(self.live_reload)
    }
}
