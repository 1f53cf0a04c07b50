// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        CreateRecordRequest, GrantRolesRequest, IdentifierView, LoginResponse, RoleView,
        SetRolesRequest, UpdateRecordRequest, UserMeResponse,
    },
    state::AppState,
    storage::{
        AuditEvent, AuditEventType, LoginRecord, MaintenanceRecord, MaintenanceStatus,
        RoleAssignment,
    },
};

pub mod admin;
pub mod health;
pub mod records;
pub mod session;
pub mod users;

/// Build the application router.
///
/// # Routes
///
/// - `GET /health`, `/health/live`, `/health/ready`: probes, no auth
/// - `/v1/auth/*`: cookie session login and logout
/// - `/v1/users/me`: the caller's identity and roles
/// - `/v1/records/*`: maintenance records (`canLogin`)
/// - `/v1/admin/*`: role administration, logins and audit (`admin`)
/// - `/docs`: Swagger UI
pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/auth/login", post(session::login))
        .route("/auth/logout", post(session::logout))
        .route("/users/me", get(users::get_current_user))
        .route(
            "/records",
            get(records::list_records).post(records::create_record),
        )
        .route(
            "/records/{record_id}",
            get(records::get_record)
                .put(records::update_record)
                .delete(records::delete_record),
        )
        .route("/admin/roles", get(admin::list_role_assignments))
        .route(
            "/admin/roles/{identifier}",
            get(admin::get_role_assignment).put(admin::set_roles),
        )
        .route("/admin/roles/{identifier}/grant", post(admin::grant_roles))
        .route("/admin/roles/{identifier}/revoke", post(admin::revoke_roles))
        .route("/admin/logins", get(admin::list_logins))
        .route("/admin/audit", get(admin::query_audit_log));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        session::login,
        session::logout,
        users::get_current_user,
        records::list_records,
        records::create_record,
        records::get_record,
        records::update_record,
        records::delete_record,
        admin::list_role_assignments,
        admin::get_role_assignment,
        admin::set_roles,
        admin::grant_roles,
        admin::revoke_roles,
        admin::list_logins,
        admin::query_audit_log
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::CheckpointHealth,
            health::HealthResponse,
            UserMeResponse,
            IdentifierView,
            RoleView,
            LoginResponse,
            MaintenanceRecord,
            MaintenanceStatus,
            CreateRecordRequest,
            UpdateRecordRequest,
            RoleAssignment,
            GrantRolesRequest,
            SetRolesRequest,
            LoginRecord,
            AuditEvent,
            AuditEventType,
            admin::RoleAssignmentListResponse,
            admin::LoginListResponse,
            admin::AuditLogResponse
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Session", description = "Cookie session login and logout"),
        (name = "Users", description = "The caller's identity and roles"),
        (name = "Records", description = "Maintenance records"),
        (name = "Admin", description = "Role administration and audit")
    )
)]
struct ApiDoc;
