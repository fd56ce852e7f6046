//! CORS (Cross-Origin Resource Sharing) middleware configuration

use axum::http::{header, HeaderName, Method};
use tower_http::cors::{Any, CorsLayer as TowerCorsLayer};

/// Browser front-ends are served from arbitrary origins, so every origin is
/// allowed and no credentials are involved.
pub fn cors_layer() -> TowerCorsLayer {
    TowerCorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::POST,
            Method::GET,
            Method::OPTIONS,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::ACCEPT_ENCODING,
            header::AUTHORIZATION,
            header::RANGE,
        ])
        .expose_headers(exposed_headers())
        .allow_credentials(false)
}

fn exposed_headers() -> [HeaderName; 2] {
    [header::CONTENT_RANGE, header::CONTENT_LENGTH]
}
