//! Default response headers.
//!
//! Every response is marked uncacheable and readable cross-origin unless the
//! handler already set the header:
//! - Cache-Control
//! - Access-Control-Allow-Origin

use axum::http::HeaderValue;
use axum::http::header;
use tower_http::set_header::SetResponseHeaderLayer;

/// Create layer that adds `Cache-Control: no-cache`.
pub(crate) fn no_cache_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache"),
    )
}

/// Create layer that adds `Access-Control-Allow-Origin: *`.
pub(crate) fn allow_any_origin_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    )
}
