//! Error types for the HTTP server.

use axum::http::StatusCode;
use axum::http::header;
use axum::response::{IntoResponse, Response};

/// Per-request error, rendered as a plain-text response.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ServerError {
    /// No file at the requested path.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// I/O error while reading a file that passed the existence check.
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::FileNotFound(_) => StatusCode::NOT_FOUND,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

/// Error raised while starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// Another process already listens on the port.
    #[error("Port {0} is already in use")]
    PortInUse(u16),

    /// Binding failed for another reason.
    #[error("Failed to bind {host}:{port}: {source}")]
    Bind {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The accept loop failed.
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}
