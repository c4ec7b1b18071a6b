//! Static file serving.
//!
//! Every request that isn't the live reload endpoint lands here. Files are
//! read from the site root on each request; the default document gets the
//! live reload client injected before `</body>`.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{Uri, header};
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;

use crate::error::ServerError;
use crate::state::AppState;

/// Create router for static file serving.
pub(crate) fn static_router() -> Router<Arc<AppState>> {
    Router::new().fallback(serve_file)
}

/// Serve the file named by the request path.
async fn serve_file(State(state): State<Arc<AppState>>, uri: Uri) -> Result<Response, ServerError> {
    let decoded = percent_decode_str(uri.path()).decode_utf8_lossy();
    let requested = decoded.trim_start_matches('/');

    // Map root to the default document
    let relative = if requested.is_empty() {
        state.default_document.as_str()
    } else {
        requested
    };

    tracing::debug!(uri = %uri.path(), file = relative, "Request");

    if is_default_document(relative, &state.default_document) {
        return serve_default_document(&state).await;
    }

    let Some(path) = resolve(&state.root, relative) else {
        tracing::info!(file = relative, "Rejected path outside served root");
        return Err(ServerError::FileNotFound(relative.to_owned()));
    };

    match tokio::fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => {}
        _ => {
            tracing::info!(file = relative, "File not found");
            return Err(ServerError::FileNotFound(relative.to_owned()));
        }
    }

    let content = tokio::fs::read(&path).await.inspect_err(|err| {
        tracing::warn!(file = relative, error = %err, "Failed to read file");
    })?;

    tracing::debug!(file = relative, bytes = content.len(), "Served");
    Ok(([(header::CONTENT_TYPE, mime_for(relative))], content).into_response())
}

/// Serve the default document with the live reload client injected.
///
/// Read fresh on every request so edits show up without a restart. The file
/// is handled as bytes; only the snippet insertion changes its content.
async fn serve_default_document(state: &AppState) -> Result<Response, ServerError> {
    let path = state.root.join(&state.default_document);

    let html = match tokio::fs::read(&path).await {
        Ok(html) => html,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "Default document missing, serving placeholder");
            missing_document_page(&state.default_document).into_bytes()
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Failed to read default document");
            return Err(err.into());
        }
    };

    let body = match state.live_reload_snippet() {
        Some(snippet) => inject_snippet(&html, snippet),
        None => html,
    };

    Ok(([(header::CONTENT_TYPE, "text/html")], body).into_response())
}

/// Whether `relative` names the default document, ignoring `.` segments and
/// trailing slashes.
fn is_default_document(relative: &str, default_document: &str) -> bool {
    fn significant(path: &str) -> Vec<Component<'_>> {
        Path::new(path)
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    }
    significant(relative) == significant(default_document)
}

/// Join `relative` onto `root`, refusing anything that could leave `root`.
fn resolve(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return None;
    }
    Some(root.join(relative))
}

/// Insert `snippet` before the first `</body>`, or append it if there is none.
fn inject_snippet(html: &[u8], snippet: &str) -> Vec<u8> {
    const BODY_CLOSE: &[u8] = b"</body>";

    let lowered = html.to_ascii_lowercase();
    let position = lowered
        .windows(BODY_CLOSE.len())
        .position(|window| window == BODY_CLOSE);

    let mut out = Vec::with_capacity(html.len() + snippet.len());
    match position {
        Some(index) => {
            out.extend_from_slice(&html[..index]);
            out.extend_from_slice(snippet.as_bytes());
            out.extend_from_slice(&html[index..]);
        }
        None => {
            out.extend_from_slice(html);
            out.extend_from_slice(snippet.as_bytes());
        }
    }
    out
}

/// Placeholder page served when the default document is absent.
fn missing_document_page(name: &str) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html><head><title>hotview</title></head>\n\
         <body>\n\
         <h1>Default document not found</h1>\n\
         <p>{name} is missing from the served directory.</p>\n\
         </body></html>\n"
    )
}

/// Return the MIME type for a file path from its extension.
fn mime_for(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("html" | "htm") => "text/html",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("css") => "text/css",
        _ => "application/octet-stream",
    }
}
