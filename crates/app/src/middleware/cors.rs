use axum::http::Method;
use tower_http::cors::{Any, CorsLayer};

/// The UI polls the status API from a browser origin we do not know ahead
/// of time, so any origin may read it.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any)
}
