use axum::{
    body::Body,
    extract::State,
    http::{
        header::{self, HeaderValue},
        Method, Request, Response, StatusCode,
    },
    middleware::Next,
};
use tracing::debug;

use crate::app::AppState;

const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
const ALLOWED_HEADERS: &str = "content-type, authorization, accept, origin, x-requested-with";

/// Origin to echo back, if any.
/// A `*` entry reflects any origin outside production; otherwise origins are whitelisted.
pub fn resolve_origin(
    allowed_origins: &[String],
    is_production: bool,
    origin: Option<&str>,
) -> Option<String> {
    let origin = origin?;
    let has_wildcard = allowed_origins.iter().any(|o| o == "*");

    if has_wildcard && !is_production {
        debug!("CORS: reflecting origin {}", origin);
        return Some(origin.to_string());
    }
    if allowed_origins.iter().any(|o| o == origin) {
        return Some(origin.to_string());
    }
    debug!("CORS: origin not in whitelist: {}", origin);
    None
}

/// CORS for the mobile web views and the admin console
pub async fn dynamic_cors_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response<Body>, StatusCode> {
    let config = &state.config;

    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok());
    let allowed = resolve_origin(&config.cors_allowed_origins, config.is_production(), origin)
        .and_then(|o| HeaderValue::from_str(&o).ok());

    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        if let Some(allowed) = allowed {
            let headers = response.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allowed);
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOWED_HEADERS),
            );
            headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("3600"));
        }
        *response.status_mut() = StatusCode::OK;
        return Ok(response);
    }

    let mut response = next.run(req).await;
    if let Some(allowed) = allowed {
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allowed);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }

    Ok(response)
}
