pub mod extractors;
pub mod messages;
pub mod ws;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::context::AppContext;
use crate::health;

pub async fn health_handler(State(ctx): State<AppContext>) -> impl IntoResponse {
    match health::health_check(&ctx.db_pool).await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable")
        }
    }
}
