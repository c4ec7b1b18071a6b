//! CLI error types.

use hotview_config::ConfigError;
use hotview_server::StartError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Server(#[from] StartError),

    #[error("{} required file(s) missing", .0.len())]
    MissingFiles(Vec<String>),
}
