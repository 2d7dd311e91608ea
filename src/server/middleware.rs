//! Rate limiting for the generation endpoints.

use super::state::SharedState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::net::SocketAddr;
use tracing::warn;

const LIMITED_PATHS: &[&str] = &["/boards", "/images"];

fn is_limited(request: &Request) -> bool {
    request.method() == Method::POST && LIMITED_PATHS.contains(&request.uri().path())
}

/// Peer address, or the first `X-Forwarded-For` hop when the proxy is
/// trusted. Falls back to `unknown` when neither is available.
pub(crate) fn client_key(request: &Request, trust_proxy: bool) -> String {
    let forwarded = || {
        request
            .headers()
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    let peer = || {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    };

    trust_proxy
        .then(forwarded)
        .flatten()
        .or_else(peer)
        .unwrap_or_else(|| "unknown".to_string())
}

pub(crate) async fn rate_limit_middleware(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    if !is_limited(&request) {
        return next.run(request).await;
    }

    let client = client_key(&request, state.rate_limiter.trust_proxy());
    match state.rate_limiter.check(&client).await {
        Ok(()) => next.run(request).await,
        Err(limited) => {
            warn!("Rate limit exceeded for {} on {}", client, request.uri().path());
            let body = serde_json::json!({
                "message": "Too many requests, please try again later.",
                "nextAllowedRequest": limited.next_allowed,
            });
            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            // Round up so clients never retry inside the window.
            let retry_secs = limited.retry_after.as_secs()
                + u64::from(limited.retry_after.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&retry_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}
