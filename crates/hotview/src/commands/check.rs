//! `hotview check` command implementation.

use std::path::PathBuf;

use clap::Args;
use hotview_config::{CliSettings, Config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the check command.
#[derive(Args)]
pub(crate) struct CheckArgs {
    /// Path to configuration file (default: auto-discover hotview.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to serve (overrides config).
    #[arg(short, long)]
    root: Option<PathBuf>,
}

impl CheckArgs {
    /// Execute the check command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or required files are missing.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let cli_settings = CliSettings {
            root: self.root,
            ..CliSettings::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        preflight(&config, &output)
    }
}

/// Verify required files exist under the site root.
///
/// Lists the missing ones with a restore hint and fails if any are absent.
pub(crate) fn preflight(config: &Config, output: &Output) -> Result<(), CliError> {
    output.info("Checking required files...");

    let missing = config.missing_required_files();
    tracing::debug!(
        root = %config.site_resolved.root.display(),
        missing = missing.len(),
        "Checked required files"
    );
    if missing.is_empty() {
        output.success("All required files present");
        return Ok(());
    }

    output.error("Missing files:");
    for file in &missing {
        output.item(file);
    }
    output.info("");
    output.info("To restore tracked files:");
    output.info(&format!("   git checkout HEAD -- {}", missing.join(" ")));

    Err(CliError::MissingFiles(missing))
}
