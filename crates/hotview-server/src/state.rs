//! Application state.
//!
//! Shared state for all request handlers.

use std::path::PathBuf;
use std::sync::Arc;

use crate::live_reload::NotificationFanout;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Directory files are served from.
    pub(crate) root: PathBuf,
    /// Document served for `/`, relative to `root`.
    pub(crate) default_document: String,
    /// Live reload wiring (if enabled).
    pub(crate) live_reload: Option<LiveReloadState>,
}

/// Live reload pieces the handlers need.
pub(crate) struct LiveReloadState {
    /// Subscriber set shared with the change watcher.
    pub(crate) fanout: Arc<NotificationFanout>,
    /// Event-stream endpoint path.
    pub(crate) endpoint: String,
    /// Client snippet injected into the default document.
    pub(crate) snippet: String,
}

impl AppState {
    /// Snippet to inject into the default document, if live reload is on.
    pub(crate) fn live_reload_snippet(&self) -> Option<&str> {
        self.live_reload.as_ref().map(|lr| lr.snippet.as_str())
    }
}
