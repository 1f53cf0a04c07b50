// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. Persisted types
//! ([`RoleAssignment`](crate::storage::RoleAssignment),
//! [`MaintenanceRecord`](crate::storage::MaintenanceRecord), ...) are
//! returned as-is and live next to their repositories.
//!
//! ## Model Categories
//!
//! - **Users**: the caller's resolved identity
//! - **Sessions**: cookie login responses
//! - **Records**: maintenance record create/update requests
//! - **Admin**: role grants and audit queries

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{AuthenticatedUser, IdentityCandidate};
use crate::storage::MaintenanceStatus;

// =============================================================================
// Users
// =============================================================================

/// One identifier extracted from the caller's token.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct IdentifierView {
    /// `email`, `sub` or `oid`
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl From<IdentityCandidate> for IdentifierView {
    fn from(candidate: IdentityCandidate) -> Self {
        Self {
            kind: candidate.kind.as_str().to_string(),
            value: candidate.normalized(),
        }
    }
}

/// An effective role and where it came from.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct RoleView {
    pub role: String,
    /// `provider` or `internal`
    pub origin: String,
}

/// Response for GET /v1/users/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// Normalized primary identifier
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Identity provider that issued the token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// All identifiers, most reliable first
    pub identifiers: Vec<IdentifierView>,
    pub roles: Vec<RoleView>,
    /// When roles were last resolved against the role store
    pub roles_enriched_at: Option<DateTime<Utc>>,
    /// Session ID (if authenticated through a session cookie)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl From<AuthenticatedUser> for UserMeResponse {
    fn from(user: AuthenticatedUser) -> Self {
        let roles = user
            .principal
            .role_origins()
            .into_iter()
            .map(|(origin, role)| RoleView {
                role,
                origin: origin.to_string(),
            })
            .collect();

        Self {
            identifiers: user.identifiers().into_iter().map(Into::into).collect(),
            provider: user.principal.provider().map(str::to_string),
            roles_enriched_at: user.principal.enriched_at(),
            user_id: user.user_id,
            display_name: user.display_name,
            roles,
            session_id: user.session_id,
        }
    }
}

// =============================================================================
// Sessions
// =============================================================================

/// Response for POST /v1/auth/login
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub session_id: String,
    pub user_id: String,
    pub roles: Vec<String>,
    /// Session lifetime in seconds
    pub expires_in: u64,
}

// =============================================================================
// Maintenance Records
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateRecordRequest {
    /// Equipment or property the work applies to
    pub asset: String,
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub due_on: Option<NaiveDate>,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateRecordRequest {
    pub asset: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub status: Option<MaintenanceStatus>,
    pub due_on: Option<NaiveDate>,
}

// =============================================================================
// Admin
// =============================================================================

fn default_identifier_type() -> String {
    "email".to_string()
}

/// Body of the grant and revoke endpoints.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GrantRolesRequest {
    pub roles: Vec<String>,
    /// `email`, `sub` or `oid` (default `email`)
    #[serde(default = "default_identifier_type")]
    pub identifier_type: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

/// Body of PUT /v1/admin/roles/{identifier}: replaces the role set.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetRolesRequest {
    pub roles: Vec<String>,
    #[serde(default = "default_identifier_type")]
    pub identifier_type: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AuditQuery {
    /// Maximum number of events, newest first (default 100, max 1000)
    pub limit: Option<usize>,
    /// Only events by this user
    pub user_id: Option<String>,
    /// Only events on this resource type (`role_assignment`, `record`)
    pub resource_type: Option<String>,
    /// Only events on this resource; requires `resource_type`
    pub resource_id: Option<String>,
}

pub const DEFAULT_AUDIT_LIMIT: usize = 100;
pub const MAX_AUDIT_LIMIT: usize = 1000;

impl AuditQuery {
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_AUDIT_LIMIT)
            .clamp(1, MAX_AUDIT_LIMIT)
    }
}

/// Role name validity: non-empty, no whitespace, at most 64 characters.
pub fn validate_role_names(roles: &[String]) -> Result<(), String> {
    for role in roles {
        let trimmed = role.trim();
        if trimmed.is_empty() {
            return Err("role names must not be empty".to_string());
        }
        if trimmed.len() > 64 || trimmed.chars().any(char::is_whitespace) {
            return Err(format!("invalid role name {role:?}"));
        }
    }
    Ok(())
}

/// Wire name of a known identifier type; aliases are accepted.
pub fn validate_identifier_type(kind: &str) -> Result<&'static str, String> {
    crate::auth::IdentifierType::parse(kind)
        .map(|kind| kind.as_str())
        .ok_or_else(|| format!("unknown identifier type {kind:?}"))
}
