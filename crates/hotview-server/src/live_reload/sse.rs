//! Event-stream endpoint for live reload.
//!
//! Registers each connection with the fanout and forwards its notifications
//! as server-sent events until the client disconnects.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use tokio_stream::StreamExt;

use super::fanout::Notification;
use crate::state::AppState;

impl From<Notification> for Event {
    fn from(notification: Notification) -> Self {
        // Field order is the wire order: data, then id
        Event::default()
            .data(notification.kind.as_str())
            .id(notification.id.to_string())
    }
}

/// Handle GET on the live reload endpoint.
pub(crate) async fn sse_handler(State(state): State<Arc<AppState>>) -> Response {
    let Some(ref live_reload) = state.live_reload else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let subscription = live_reload.fanout.register();
    tracing::info!(
        subscriber = subscription.id(),
        clients = live_reload.fanout.len(),
        "Live reload client connected"
    );

    // Dropping the stream on disconnect unregisters the subscriber
    let stream = subscription.map(|notification| Ok::<_, Infallible>(Event::from(notification)));

    (
        [(header::CONNECTION, "keep-alive")],
        Sse::new(stream),
    )
        .into_response()
}
