use std::time::Duration;

use axum::{
    BoxError, Json, Router,
    error_handling::HandleErrorLayer,
    routing::{get, post},
};
use tower::ServiceBuilder;

use clipstream_types::api::HealthResponse;

use crate::error::ApiError;
use crate::state::AppState;
use crate::users;

/// All public routes. Transport layers (CORS, tracing, limits, timeouts) are
/// added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/users/register", post(users::register))
        .route("/health", get(health))
        .with_state(state)
}

/// Bound every request by `timeout`. A request that runs over is dropped,
/// which releases whatever it staged, and answered with the 408 envelope.
pub fn with_request_timeout(router: Router, timeout: Duration) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_layer_error))
            .timeout(timeout),
    )
}

async fn handle_layer_error(err: BoxError) -> ApiError {
    if err.is::<tower::timeout::error::Elapsed>() {
        ApiError::Timeout
    } else {
        ApiError::Internal(anyhow::anyhow!("unhandled middleware error: {}", err))
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
