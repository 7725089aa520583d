//! Liveness endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use library_db::migrations::migration_status;
use serde::Serialize;
use tracing::warn;

use crate::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    /// Absent when the database is unreachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrations: Option<MigrationReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub applied: usize,
    pub total: usize,
}

/// 200 while the database answers with its schema up to date, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    if !state.db.health_check().await {
        warn!("Health check failed: database unreachable");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "degraded",
                database: "unavailable",
                migrations: None,
            }),
        );
    }

    let migrations = match migration_status(state.db.pool()).await {
        Ok((total, applied)) => Some(MigrationReport { applied, total }),
        Err(e) => {
            warn!(error = %e, "Could not read migration status");
            None
        }
    };

    let pending = migrations.map_or(false, |m| m.applied < m.total);
    if pending {
        warn!(?migrations, "Database schema has pending migrations");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "degraded",
                database: "migrations pending",
                migrations,
            }),
        );
    }

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            database: "ok",
            migrations,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::test_state;

    #[tokio::test]
    async fn test_health_reports_database() {
        let state = test_state().await;

        let (status, Json(body)) = health(State(state.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.database, "ok");
        let migrations = body.migrations.unwrap();
        assert!(migrations.total >= 1);
        assert_eq!(migrations.applied, migrations.total);

        state.db.close().await;
        let (status, Json(body)) = health(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "degraded");
        assert!(body.migrations.is_none());
    }
}
