//! HTTP API
//!
//! Endpoints:
//! - GET  /health    - liveness
//! - POST /boards    - create a vision board from goals (rate limited)
//! - GET  /boards    - list boards, newest first
//! - POST /images    - generate an image from a prompt (rate limited)
//! - GET  /images    - list generated images, newest first
//! - POST /feedback  - store a suggestion
//!
//! Every error body is `{"message": ...}`.

mod handlers;
mod middleware;
pub mod state;

pub use state::{AppState, RateLimiter, SharedState};

use crate::models::Config;
use crate::Error;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use std::net::SocketAddr;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use self::handlers::{
    handle_create_board, handle_create_image, handle_feedback, handle_health, handle_list_boards,
    handle_list_images, handle_not_found,
};
use self::middleware::rate_limit_middleware;

/// Maximum request body size: 50 MB.
const MAX_BODY_SIZE: usize = 50 * 1024 * 1024;

pub(crate) fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "message": message }))).into_response()
}

/// Maps service errors onto HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        json_error(status, &self.0.to_string())
    }
}

/// Any origin in development, otherwise the configured allow-list.
pub fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.development {
        info!("CORS allowing any origin (development)");
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    info!("CORS configured for origins: {:?}", config.allowed_origins);
    layer.allow_origin(AllowOrigin::list(origins))
}

pub fn router(state: SharedState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/boards", post(handle_create_board).get(handle_list_boards))
        .route("/images", post(handle_create_image).get(handle_list_images))
        .route("/feedback", post(handle_feedback))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve `app` on `port` until Ctrl+C.
pub async fn serve(app: Router, port: u16) -> crate::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
