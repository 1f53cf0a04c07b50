// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints.
//!
//! These endpoints require the `admin` role and provide:
//! - Role assignment administration
//! - Login history
//! - Audit log queries
//!
//! Role changes take effect for bearer requests immediately and for cookie
//! sessions once their enrichment marker goes stale.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    audit_log,
    auth::{AdminOnly, RoleSet},
    error::ApiError,
    models::{
        validate_identifier_type, validate_role_names, AuditQuery, GrantRolesRequest,
        SetRolesRequest,
    },
    state::AppState,
    storage::{
        AuditEvent, AuditEventType, AuditRepository, LoginRecord, RoleAssignment, RoleGrant,
        StoreError,
    },
};

const RESOURCE: &str = "role_assignment";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleAssignmentListResponse {
    pub assignments: Vec<RoleAssignment>,
    pub total: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginListResponse {
    /// Most recent login first
    pub logins: Vec<LoginRecord>,
    pub total: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    /// Newest first
    pub events: Vec<AuditEvent>,
    pub total: usize,
}

/// Validated role set and the canonical identifier type.
fn validated_roles(
    roles: Vec<String>,
    identifier_type: &str,
) -> Result<(RoleSet, &'static str), ApiError> {
    validate_role_names(&roles).map_err(ApiError::bad_request)?;
    let kind = validate_identifier_type(identifier_type).map_err(ApiError::bad_request)?;
    Ok((RoleSet::from(roles), kind))
}

fn not_found(identifier: &str) -> ApiError {
    StoreError::NotFound(format!("Role assignment {identifier}")).into()
}

// ============================================================================
// Handlers
// ============================================================================

/// List every role assignment.
#[utoipa::path(
    get,
    path = "/v1/admin/roles",
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All role assignments", body = RoleAssignmentListResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn list_role_assignments(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<RoleAssignmentListResponse>, ApiError> {
    let assignments = state.roles.get_all()?;
    Ok(Json(RoleAssignmentListResponse {
        total: assignments.len(),
        assignments,
    }))
}

/// Role assignment of one identifier (matched by value, case-insensitively).
#[utoipa::path(
    get,
    path = "/v1/admin/roles/{identifier}",
    tag = "Admin",
    security(("bearer" = [])),
    params(("identifier" = String, Path, description = "Email, subject or object id")),
    responses(
        (status = 200, description = "The role assignment", body = RoleAssignment),
        (status = 404, description = "No assignment for this identifier")
    )
)]
pub async fn get_role_assignment(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<RoleAssignment>, ApiError> {
    state
        .roles
        .get_by_identifier(&identifier)?
        .map(Json)
        .ok_or_else(|| not_found(&identifier))
}

/// Replace the role set of an identifier, creating the record if needed.
#[utoipa::path(
    put,
    path = "/v1/admin/roles/{identifier}",
    tag = "Admin",
    security(("bearer" = [])),
    params(("identifier" = String, Path, description = "Email, subject or object id")),
    request_body = SetRolesRequest,
    responses(
        (status = 200, description = "Stored assignment", body = RoleAssignment),
        (status = 400, description = "Invalid role or identifier type")
    )
)]
pub async fn set_roles(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Json(request): Json<SetRolesRequest>,
) -> Result<Json<RoleAssignment>, ApiError> {
    let (roles, kind) = validated_roles(request.roles, &request.identifier_type)?;

    let mut assignment = RoleAssignment::new(&identifier, kind, roles);
    assignment.display_name = request.display_name;
    assignment.provider = request.provider;

    let stored = state.roles.upsert(assignment)?;
    tracing::info!(
        admin = %admin.user_id,
        identifier = %stored.user_identifier,
        roles = ?stored.roles,
        "Role set replaced"
    );
    audit_log!(
        state.store,
        AuditEventType::RolesReplaced,
        &admin.user_id,
        RESOURCE,
        &stored.user_identifier,
        details = serde_json::json!({ "roles": stored.roles })
    );

    Ok(Json(stored))
}

/// Add roles to an identifier.
#[utoipa::path(
    post,
    path = "/v1/admin/roles/{identifier}/grant",
    tag = "Admin",
    security(("bearer" = [])),
    params(("identifier" = String, Path, description = "Email, subject or object id")),
    request_body = GrantRolesRequest,
    responses(
        (status = 200, description = "Assignment after the grant", body = RoleAssignment),
        (status = 400, description = "Invalid role or identifier type")
    )
)]
pub async fn grant_roles(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Json(request): Json<GrantRolesRequest>,
) -> Result<Json<RoleAssignment>, ApiError> {
    let (roles, kind) = validated_roles(request.roles, &request.identifier_type)?;
    let granted = roles.clone();

    let stored = state.roles.add_roles(RoleGrant {
        identifier,
        identifier_type: kind.to_string(),
        roles,
        display_name: request.display_name,
        provider: request.provider,
    })?;
    tracing::info!(
        admin = %admin.user_id,
        identifier = %stored.user_identifier,
        granted = ?granted,
        "Roles granted"
    );
    audit_log!(
        state.store,
        AuditEventType::RolesGranted,
        &admin.user_id,
        RESOURCE,
        &stored.user_identifier,
        details = serde_json::json!({ "granted": granted })
    );

    Ok(Json(stored))
}

/// Remove roles from an identifier. The record is kept even when empty.
#[utoipa::path(
    post,
    path = "/v1/admin/roles/{identifier}/revoke",
    tag = "Admin",
    security(("bearer" = [])),
    params(("identifier" = String, Path, description = "Email, subject or object id")),
    request_body = GrantRolesRequest,
    responses(
        (status = 200, description = "Assignment after the revocation", body = RoleAssignment),
        (status = 404, description = "No assignment for this identifier")
    )
)]
pub async fn revoke_roles(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Json(request): Json<GrantRolesRequest>,
) -> Result<Json<RoleAssignment>, ApiError> {
    let (roles, _) = validated_roles(request.roles, &request.identifier_type)?;

    let stored = state
        .roles
        .remove_roles(&identifier, &roles)?
        .ok_or_else(|| not_found(&identifier))?;
    tracing::info!(
        admin = %admin.user_id,
        identifier = %stored.user_identifier,
        revoked = ?roles,
        "Roles revoked"
    );
    audit_log!(
        state.store,
        AuditEventType::RolesRevoked,
        &admin.user_id,
        RESOURCE,
        &stored.user_identifier,
        details = serde_json::json!({ "revoked": roles })
    );

    Ok(Json(stored))
}

/// Login history, most recent first.
#[utoipa::path(
    get,
    path = "/v1/admin/logins",
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Login records", body = LoginListResponse),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn list_logins(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<LoginListResponse>, ApiError> {
    let logins = state.logins.list_all()?;
    Ok(Json(LoginListResponse {
        total: logins.len(),
        logins,
    }))
}

/// Recent audit events, optionally filtered by acting user.
#[utoipa::path(
    get,
    path = "/v1/admin/audit",
    tag = "Admin",
    security(("bearer" = [])),
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit events", body = AuditLogResponse),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn query_audit_log(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let audit = AuditRepository::new(&state.store);
    let limit = query.effective_limit();

    let events = match (&query.user_id, &query.resource_type, &query.resource_id) {
        (Some(user_id), _, _) => audit.search_by_user(user_id, limit)?,
        (None, Some(resource_type), Some(resource_id)) => {
            audit.search_by_resource(resource_type, resource_id, limit)?
        }
        (None, None, Some(_)) => {
            return Err(ApiError::bad_request("resource_id requires resource_type"))
        }
        _ => audit.recent(limit)?,
    };

    Ok(Json(AuditLogResponse {
        total: events.len(),
        events,
    }))
}
