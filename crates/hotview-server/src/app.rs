//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::live_reload;
use crate::middleware::{catch_panic, headers};
use crate::state::AppState;
use crate::static_files;

/// Create the application router.
///
/// # Arguments
///
/// * `state` - Shared application state
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new();

    // Event stream for live reload
    if let Some(live_reload) = &state.live_reload {
        router = router.route(&live_reload.endpoint, get(live_reload::sse_handler));
    }

    // Everything else is a file
    router = router.merge(static_files::static_router());

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(catch_panic::catch_panic_layer())
                .layer(headers::no_cache_layer())
                .layer(headers::allow_any_origin_layer()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live_reload::{NotificationFanout, client_snippet};
    use crate::state::LiveReloadState;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use std::path::Path;
    use tokio_stream::StreamExt;
    use tower::ServiceExt;

    fn state(root: &Path, endpoint: Option<&str>) -> Arc<AppState> {
        Arc::new(AppState {
            root: root.to_path_buf(),
            default_document: "index.html".to_owned(),
            live_reload: endpoint.map(|endpoint| LiveReloadState {
                fanout: Arc::new(NotificationFanout::new()),
                endpoint: endpoint.to_owned(),
                snippet: client_snippet(endpoint),
            }),
        })
    }

    #[tokio::test]
    async fn test_file_responses_carry_default_headers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();

        let response = create_router(state(dir.path(), Some("/sse")))
            .oneshot(Request::get("/app.js").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/javascript"
        );
    }

    #[tokio::test]
    async fn test_not_found_carries_default_headers() {
        let dir = tempfile::tempdir().unwrap();

        let response = create_router(state(dir.path(), Some("/sse")))
            .oneshot(Request::get("/nonexistent.file").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&body).contains("File not found"));
    }

    #[tokio::test]
    async fn test_custom_endpoint_is_routed() {
        let dir = tempfile::tempdir().unwrap();

        let response = create_router(state(dir.path(), Some("/events")))
            .oneshot(Request::get("/events").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let mut body = response.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        assert!(first.starts_with(b"data: connected\nid: "));
    }

    #[tokio::test]
    async fn test_endpoint_falls_through_to_files_when_disabled() {
        let dir = tempfile::tempdir().unwrap();

        let response = create_router(state(dir.path(), None))
            .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
