// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cookie session endpoints.
//!
//! Login exchanges a provider token for an `upkeep_session` cookie. This is
//! the only place enrichment runs with `is_new_login = true`.

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    auth::{
        extractor::bearer_token,
        session::{clear_session_cookie, session_cookie, session_id_from_headers},
        AuthError, AuthenticatedUser,
    },
    models::LoginResponse,
    state::AppState,
    storage::{audit, AuditEvent, AuditEventType},
};

/// Start a session from a bearer token.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "Session",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Session established; cookie set", body = LoginResponse),
        (status = 401, description = "Invalid or missing token"),
        (status = 403, description = "User may not log in")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    let token = bearer_token(&headers)?.ok_or(AuthError::MissingCredentials)?;
    let principal = state.auth_config.verify(token).await?;
    let enriched = state.enricher.enrich(&principal, true);
    let user = AuthenticatedUser::from_principal(enriched.clone(), None)?;

    if !user.can_login() {
        tracing::info!(user_id = %user.user_id, "Login denied: no canLogin role");
        audit::record(
            &state.store,
            &AuditEvent::new(AuditEventType::LoginDenied).with_user(&user.user_id),
        );
        return Err(AuthError::LoginNotPermitted);
    }

    let session_id = state.sessions.create(enriched);
    let ttl = state.sessions.ttl();

    let event = AuditEvent::new(AuditEventType::SessionStarted)
        .with_user(&user.user_id)
        .with_details(serde_json::json!({ "provider": user.principal.provider() }));
    audit::record(&state.store, &event);
    tracing::info!(user_id = %user.user_id, "Session started");

    let body = LoginResponse {
        session_id: session_id.clone(),
        user_id: user.user_id,
        roles: user.roles.into_vec(),
        expires_in: ttl.as_secs(),
    };

    Ok((
        [(SET_COOKIE, session_cookie(&session_id, ttl))],
        Json(body),
    )
        .into_response())
}

/// End the current session. Always clears the cookie.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "Session",
    responses(
        (status = 204, description = "Session ended; cookie cleared")
    )
)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(session_id) = session_id_from_headers(&headers) {
        if let Some(session) = state.sessions.get(&session_id) {
            let user_id = AuthenticatedUser::from_principal(session.principal, None)
                .map(|user| user.user_id)
                .ok();
            state.sessions.remove(&session_id);

            let mut event = AuditEvent::new(AuditEventType::SessionEnded);
            if let Some(user_id) = user_id {
                event = event.with_user(user_id);
            }
            audit::record(&state.store, &event);
        }
    }

    (
        StatusCode::NO_CONTENT,
        [(SET_COOKIE, clear_session_cookie())],
    )
        .into_response()
}
