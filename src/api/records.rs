// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Maintenance record endpoints.
//!
//! Every handler requires [`Member`]. Records are scoped to the caller's
//! primary identifier; a record owned by someone else answers 404.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    audit_log,
    auth::Member,
    error::ApiError,
    models::{CreateRecordRequest, UpdateRecordRequest},
    state::AppState,
    storage::{AuditEventType, MaintenanceRecord, OwnershipCheck},
};

const RESOURCE: &str = "record";

fn not_blank(field: &str, value: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{field} must not be empty")));
    }
    Ok(value.to_string())
}

fn lookup_key(record_id: &str) -> String {
    format!("Record {record_id}")
}

#[utoipa::path(
    get,
    path = "/v1/records",
    tag = "Records",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller's records, soonest due first", body = [MaintenanceRecord]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Login not permitted")
    )
)]
pub async fn list_records(
    Member(user): Member,
    State(state): State<AppState>,
) -> Result<Json<Vec<MaintenanceRecord>>, ApiError> {
    Ok(Json(state.records.list_by_owner(&user.user_id)?))
}

#[utoipa::path(
    post,
    path = "/v1/records",
    tag = "Records",
    security(("bearer" = [])),
    request_body = CreateRecordRequest,
    responses(
        (status = 201, description = "Record created", body = MaintenanceRecord),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Login not permitted")
    )
)]
pub async fn create_record(
    Member(user): Member,
    State(state): State<AppState>,
    Json(request): Json<CreateRecordRequest>,
) -> Result<(StatusCode, Json<MaintenanceRecord>), ApiError> {
    let mut record = MaintenanceRecord::new(
        user.user_id.clone(),
        not_blank("asset", &request.asset)?,
        not_blank("title", &request.title)?,
    );
    record.notes = request.notes;
    record.due_on = request.due_on;

    state.records.create(&record)?;
    audit_log!(state.store, AuditEventType::RecordCreated, &user.user_id, RESOURCE, &record.id);

    Ok((StatusCode::CREATED, Json(record)))
}

#[utoipa::path(
    get,
    path = "/v1/records/{record_id}",
    tag = "Records",
    security(("bearer" = [])),
    params(("record_id" = String, Path, description = "Record identifier")),
    responses(
        (status = 200, description = "The record", body = MaintenanceRecord),
        (status = 404, description = "No such record for this user")
    )
)]
pub async fn get_record(
    Member(user): Member,
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<Json<MaintenanceRecord>, ApiError> {
    let record = state
        .records
        .get(&record_id)?
        .owned_by(&user, &lookup_key(&record_id))?;
    Ok(Json(record))
}

#[utoipa::path(
    put,
    path = "/v1/records/{record_id}",
    tag = "Records",
    security(("bearer" = [])),
    params(("record_id" = String, Path, description = "Record identifier")),
    request_body = UpdateRecordRequest,
    responses(
        (status = 200, description = "Updated record", body = MaintenanceRecord),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "No such record for this user")
    )
)]
pub async fn update_record(
    Member(user): Member,
    State(state): State<AppState>,
    Path(record_id): Path<String>,
    Json(request): Json<UpdateRecordRequest>,
) -> Result<Json<MaintenanceRecord>, ApiError> {
    let mut record = state
        .records
        .get(&record_id)?
        .owned_by(&user, &lookup_key(&record_id))?;

    if let Some(asset) = request.asset {
        record.asset = not_blank("asset", &asset)?;
    }
    if let Some(title) = request.title {
        record.title = not_blank("title", &title)?;
    }
    if request.notes.is_some() {
        record.notes = request.notes;
    }
    if request.due_on.is_some() {
        record.due_on = request.due_on;
    }
    if let Some(status) = request.status {
        record.set_status(status);
    }

    let updated = state.records.update(&record)?;
    audit_log!(
        state.store,
        AuditEventType::RecordUpdated,
        &user.user_id,
        RESOURCE,
        &record_id,
        details = serde_json::json!({ "status": updated.status })
    );

    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/v1/records/{record_id}",
    tag = "Records",
    security(("bearer" = [])),
    params(("record_id" = String, Path, description = "Record identifier")),
    responses(
        (status = 204, description = "Record deleted"),
        (status = 404, description = "No such record for this user")
    )
)]
pub async fn delete_record(
    Member(user): Member,
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .records
        .get(&record_id)?
        .owned_by(&user, &lookup_key(&record_id))?;

    state.records.delete(&record_id)?;
    audit_log!(state.store, AuditEventType::RecordDeleted, &user.user_id, RESOURCE, &record_id);

    Ok(StatusCode::NO_CONTENT)
}
