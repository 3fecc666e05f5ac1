use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;
use services::services::database_validator::DatabaseValidator;
use tracing::warn;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::DeploymentImpl;

#[derive(Debug, Serialize, TS)]
pub struct HealthStatus {
    pub database_ok: bool,
    pub migrations_applied: i64,
    pub missing_tables: Vec<String>,
    pub ai_generation_enabled: bool,
}

/// GET /api/health
pub async fn health(
    State(deployment): State<DeploymentImpl>,
) -> (StatusCode, Json<ApiResponse<HealthStatus>>) {
    let ai_generation_enabled = deployment.generation().is_some();
    let status = match DatabaseValidator::new(deployment.db().pool.clone()).inspect().await {
        Ok(report) => HealthStatus {
            database_ok: report.is_ok(),
            migrations_applied: report.migrations_applied,
            missing_tables: report.missing_tables,
            ai_generation_enabled,
        },
        Err(e) => {
            warn!(error = %e, "Health check could not inspect the database");
            HealthStatus {
                database_ok: false,
                migrations_applied: 0,
                missing_tables: Vec::new(),
                ai_generation_enabled,
            }
        }
    };

    if status.database_ok {
        (StatusCode::OK, Json(ApiResponse::success(status)))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::error_with_data(status)),
        )
    }
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/health", get(health))
}
