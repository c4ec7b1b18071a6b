//! Live reload system for development mode.
//!
//! A [`ChangeWatcher`] polls watched files and asks the
//! [`NotificationFanout`] to push a reload to every browser connected to the
//! event-stream endpoint.

mod fanout;
mod sse;
mod watcher;

pub(crate) use fanout::NotificationFanout;
pub(crate) use sse::sse_handler;
pub(crate) use watcher::ChangeWatcher;

/// Client script injected into the default document.
const CLIENT_TEMPLATE: &str = include_str!("client.html");

/// Placeholder in [`CLIENT_TEMPLATE`] replaced by the endpoint path.
const ENDPOINT_PLACEHOLDER: &str = "__HOTVIEW_ENDPOINT__";

/// Render the client snippet for the given event-stream endpoint.
pub(crate) fn client_snippet(endpoint: &str) -> String {
    CLIENT_TEMPLATE.replace(ENDPOINT_PLACEHOLDER, endpoint)
}
