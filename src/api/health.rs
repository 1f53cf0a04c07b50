// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    pub uptime_seconds: u64,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Embedded database answers read transactions.
    pub database: String,
    pub checkpoint: CheckpointHealth,
    /// JWKS status per identity provider. Empty in development mode.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub jwks: BTreeMap<String, String>,
}

/// Durability status. Informational; never fails the health check.
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckpointHealth {
    /// Writes exist that the next checkpoint will persist.
    pub pending_writes: bool,
    pub last_checkpoint_at: Option<DateTime<Utc>>,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

fn check_database(state: &AppState) -> String {
    match state.store.health_check() {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            "unavailable".to_string()
        }
    }
}

/// Fetch keys for providers without a fresh cache.
async fn check_jwks(state: &AppState) -> BTreeMap<String, String> {
    let mut statuses = BTreeMap::new();
    for provider in state.auth_config.providers() {
        let status = if provider.jwks.is_cached().await || provider.jwks.refresh().await.is_ok() {
            "ok"
        } else {
            "unavailable"
        };
        statuses.insert(provider.name.clone(), status.to_string());
    }
    statuses
}

/// Health check endpoint handler.
///
/// Returns 200 if all checks pass, 503 if any check fails.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ReadyResponse),
        (status = 503, description = "Service is unhealthy", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let database = check_database(&state);
    let jwks = check_jwks(&state).await;
    let checkpoint = state.checkpoint();

    let all_ok = database == "ok" && jwks.values().all(|s| s == "ok");

    let response = ReadyResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        uptime_seconds: u64::try_from((Utc::now() - state.started_at).num_seconds()).unwrap_or(0),
        checks: HealthChecks {
            service: "ok".to_string(),
            database,
            checkpoint: CheckpointHealth {
                pending_writes: checkpoint.is_dirty(),
                last_checkpoint_at: checkpoint.last_checkpoint_at(),
            },
            jwks,
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe handler.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Service is not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(state: State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    health(state).await
}
