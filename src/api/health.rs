// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Liveness and readiness checks.
//!
//! Readiness verifies the share store answers and, for the redb backend,
//! that the database directory is still mounted.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Degraded,
    Missing,
    Unavailable,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// `ok` when every check passed, `degraded` otherwise.
    pub status: CheckStatus,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    pub service: CheckStatus,
    /// Only reported when shares live in a redb file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<CheckStatus>,
    pub store: CheckStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: CheckStatus,
}

async fn run_checks(state: &AppState) -> HealthChecks {
    let data_dir = state.data_dir.as_ref().map(|dir| {
        if dir.is_dir() {
            CheckStatus::Ok
        } else {
            CheckStatus::Missing
        }
    });

    // No share has an empty token, so this reads without touching data.
    let store = match state.shares.store().get_link_by_token("").await {
        Ok(_) => CheckStatus::Ok,
        Err(_) => CheckStatus::Unavailable,
    };

    HealthChecks {
        service: CheckStatus::Ok,
        data_dir,
        store,
    }
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "All checks passed", body = ReadyResponse),
        (status = 503, description = "At least one check failed", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let checks = run_checks(&state).await;
    let healthy = checks.store == CheckStatus::Ok
        && checks.data_dir.is_none_or(|s| s == CheckStatus::Ok);

    let (code, status) = if healthy {
        (StatusCode::OK, CheckStatus::Ok)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, CheckStatus::Degraded)
    };
    (code, Json(ReadyResponse { status, checks }))
}

/// Answers as long as the process is up.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses((status = 200, description = "Process is running", body = HealthResponse))
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: CheckStatus::Ok,
    })
}

#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Ready to serve shares", body = ReadyResponse),
        (status = 503, description = "Not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(state: State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    health(state).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::lifecycle::testing::lifecycle;

    #[tokio::test]
    async fn liveness_is_always_ok() {
        let Json(body) = liveness().await;
        assert_eq!(body.status, CheckStatus::Ok);
    }

    #[tokio::test]
    async fn memory_store_is_ready() {
        let (lifecycle, _) = lifecycle();
        let (code, Json(body)) = health(State(AppState::new(lifecycle, None))).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body.status, CheckStatus::Ok);
        assert!(body.checks.data_dir.is_none());
        assert_eq!(body.checks.store, CheckStatus::Ok);
    }

    #[tokio::test]
    async fn missing_data_dir_is_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone");
        let (lifecycle, _) = lifecycle();
        let (code, Json(body)) = readiness(State(AppState::new(lifecycle, Some(gone)))).await;
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, CheckStatus::Degraded);
        assert_eq!(body.checks.data_dir, Some(CheckStatus::Missing));
    }

    #[test]
    fn statuses_serialize_lowercase() {
        let json = serde_json::to_string(&HealthResponse {
            status: CheckStatus::Unavailable,
        })
        .unwrap();
        assert_eq!(json, r#"{"status":"unavailable"}"#);
    }
}
