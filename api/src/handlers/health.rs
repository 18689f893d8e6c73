use axum::{extract::State, Json};
use chrono::Utc;
use tracing::debug;

use crate::{
    models::{DatabaseHealth, HealthResponse},
    AppState,
};

/// Health check endpoint
///
/// GET /api/v1/health
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service is up; `status` reports database reachability", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    debug!("Health check requested");

    // Check database connectivity
    let db_health = match sqlx::query("SELECT 1")
        .fetch_one(state.user_manager.database().pool())
        .await
    {
        Ok(_) => DatabaseHealth {
            connected: true,
            message: "Database connection successful".to_string(),
        },
        Err(e) => DatabaseHealth {
            connected: false,
            message: format!("Database connection failed: {}", e),
        },
    };

    Json(HealthResponse {
        status: if db_health.connected {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        database: db_health,
    })
}
