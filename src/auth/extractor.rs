// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated users.
//!
//! ```rust,ignore
//! async fn my_handler(Member(user): Member) -> impl IntoResponse {
//!     // user is AuthenticatedUser holding canLogin or admin
//! }
//! ```
//!
//! ## Credential order
//!
//! 1. `upkeep_session` cookie: the session's enriched principal is reused
//!    while its `roles_enriched_at` marker is younger than
//!    [`ROLE_REVALIDATION_WINDOW`](super::session::ROLE_REVALIDATION_WINDOW);
//!    otherwise it is re-enriched and stored back into the session. When the
//!    role store is unreachable the request gets provider roles only and the
//!    session is left as it was, so the next request retries the store.
//! 2. `Authorization: Bearer <token>`: verified and enriched on every request.
//!
//! Authorization checks read `role` claims only.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use chrono::Utc;

use super::session::{self, Session};
use super::{AuthError, AuthenticatedUser};
use crate::state::AppState;

/// Any authenticated user, whatever their roles.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let bearer = bearer_token(&parts.headers)?;

        if let Some(session_id) = session::session_id_from_headers(&parts.headers) {
            match state.sessions.get(&session_id) {
                Some(session) => return revalidate(state, session).map(Auth),
                None if bearer.is_none() => return Err(AuthError::SessionExpired),
                None => {}
            }
        }

        let token = bearer.ok_or(AuthError::MissingCredentials)?;
        let principal = state.auth_config.verify(token).await?;
        let enriched = state.enricher.enrich(&principal, false);

        AuthenticatedUser::from_principal(enriched, None).map(Auth)
    }
}

/// Bearer token from the authorization header, if one was sent.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(header) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = header.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(Some)
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Reuse a session principal, re-enriching it once the marker is stale.
fn revalidate(state: &AppState, session: Session) -> Result<AuthenticatedUser, AuthError> {
    let principal = if session.needs_revalidation(Utc::now()) {
        let outcome = state.enricher.enrich_checked(&session.principal, false);
        if outcome.degraded {
            tracing::debug!(session_id = %session.id, "Session revalidation degraded, session kept");
        } else {
            state.sessions.replace_principal(&session.id, outcome.principal.clone());
            tracing::debug!(session_id = %session.id, "Session roles revalidated");
        }
        outcome.principal
    } else {
        session.principal
    };

    AuthenticatedUser::from_principal(principal, Some(session.id))
}

/// User allowed to use the application (`canLogin` or `admin`).
pub struct Member(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Member {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.can_login() {
            return Err(AuthError::LoginNotPermitted);
        }

        Ok(Member(user))
    }
}

/// Extractor that requires admin role.
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminOnly(user))
    }
}
