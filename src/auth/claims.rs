// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Claim sets and the authenticated user representation.
//!
//! Identity providers disagree on claim names, so a [`Principal`] is kept as
//! a flat, ordered bag of `(kind, value)` pairs. Typed access to the fields
//! the application cares about goes through [`super::identifiers`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::error::AuthError;
use super::identifiers::{self, IdentityCandidate};
use super::roles::{RoleOrigin, RoleSet, ADMIN, CAN_LOGIN};

/// Claim kinds emitted by enrichment.
pub mod claim_types {
    /// Standard role claim. The only claim authorization decisions read.
    pub const ROLE: &str = "role";

    /// Provenance of one role, formatted as `<origin>:<role>`.
    /// Display and debugging only.
    pub const ROLE_ORIGIN: &str = "role_origin";

    /// RFC 3339 timestamp of the enrichment that produced the role claims.
    pub const ROLES_ENRICHED_AT: &str = "roles_enriched_at";
}

/// A single typed fact about an authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Claim {
    pub kind: String,
    pub value: String,
}

impl Claim {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

/// The full set of claims describing one authenticated session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Name of the identity provider that authenticated the session.
    provider: Option<String>,
    claims: Vec<Claim>,
}

impl Principal {
    pub fn new(provider: Option<String>) -> Self {
        Self {
            provider,
            claims: Vec::new(),
        }
    }

    /// Builder-style claim append.
    pub fn with_claim(mut self, kind: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(kind, value);
        self
    }

    pub fn push(&mut self, kind: impl Into<String>, value: impl Into<String>) {
        self.claims.push(Claim::new(kind, value));
    }

    /// Build a principal from verified token claims.
    ///
    /// Nested objects become dotted keys (`publicMetadata.role`), arrays
    /// become one claim per element, nulls are dropped.
    pub fn from_token_claims(provider: Option<&str>, claims: &Map<String, Value>) -> Self {
        let mut principal = Self::new(provider.map(str::to_string));
        for (key, value) in claims {
            flatten_claim(key, value, &mut principal.claims);
        }
        principal
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// All values for a claim kind, in order.
    pub fn values<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.claims
            .iter()
            .filter(move |c| c.kind == kind)
            .map(|c| c.value.as_str())
    }

    pub fn first(&self, kind: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.kind == kind)
            .map(|c| c.value.as_str())
    }

    pub fn has_claim(&self, kind: &str) -> bool {
        self.claims.iter().any(|c| c.kind == kind)
    }

    /// Roles carried by standard `role` claims.
    pub fn roles(&self) -> RoleSet {
        self.values(claim_types::ROLE).collect()
    }

    /// Role provenance tags left by enrichment.
    pub fn role_origins(&self) -> Vec<(RoleOrigin, String)> {
        self.values(claim_types::ROLE_ORIGIN)
            .filter_map(|tag| {
                let (origin, role) = tag.split_once(':')?;
                Some((RoleOrigin::parse(origin)?, role.to_string()))
            })
            .collect()
    }

    /// When this principal's roles were last enriched, if ever.
    pub fn enriched_at(&self) -> Option<DateTime<Utc>> {
        self.first(claim_types::ROLES_ENRICHED_AT)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|at| at.with_timezone(&Utc))
    }
}

fn flatten_claim(key: &str, value: &Value, out: &mut Vec<Claim>) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push(Claim::new(key, s.as_str())),
        Value::Bool(_) | Value::Number(_) => out.push(Claim::new(key, value.to_string())),
        Value::Array(items) => {
            for item in items {
                flatten_claim(key, item, out);
            }
        }
        Value::Object(fields) => {
            for (child, nested) in fields {
                flatten_claim(&format!("{key}.{child}"), nested, out);
            }
        }
    }
}

/// Authenticated user information derived from an enriched principal.
///
/// This is the primary type used throughout the application to represent
/// the authenticated user making a request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Primary identifier (first identity candidate, normalized).
    pub user_id: String,

    /// Human-readable name, if the provider supplied one.
    pub display_name: Option<String>,

    /// Effective roles after enrichment.
    pub roles: RoleSet,

    /// Session ID when authenticated through a session cookie.
    pub session_id: Option<String>,

    /// The enriched principal itself.
    pub principal: Principal,
}

impl AuthenticatedUser {
    /// Create from an enriched principal.
    ///
    /// Fails when the principal carries no usable identifier.
    pub fn from_principal(
        principal: Principal,
        session_id: Option<String>,
    ) -> Result<Self, AuthError> {
        let primary = identifiers::primary_candidate(&principal).ok_or(AuthError::MissingIdentity)?;

        Ok(Self {
            user_id: primary.normalized(),
            display_name: identifiers::display_name(&principal).map(str::to_string),
            roles: principal.roles(),
            session_id,
            principal,
        })
    }

    /// Identity candidates of the underlying principal, most reliable first.
    pub fn identifiers(&self) -> Vec<IdentityCandidate> {
        identifiers::extract_candidates(&self.principal)
    }

    /// Check if the user holds a role (case-insensitive).
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Check if this user is an admin.
    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN)
    }

    /// Check if this user may use the application.
    pub fn can_login(&self) -> bool {
        self.has_role(CAN_LOGIN) || self.is_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_claims() -> Map<String, Value> {
        json!({
            "sub": "user_123",
            "email": "User@Example.com",
            "iat": 1700000000,
            "email_verified": true,
            "roles": ["canLogin", "viewer"],
            "publicMetadata": { "role": "admin" },
            "nbf": null
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn from_token_claims_flattens_arrays_and_objects() {
        let principal = Principal::from_token_claims(Some("clerk"), &sample_claims());

        assert_eq!(principal.provider(), Some("clerk"));
        assert_eq!(principal.first("sub"), Some("user_123"));
        assert_eq!(principal.values("roles").collect::<Vec<_>>(), vec!["canLogin", "viewer"]);
        assert_eq!(principal.first("publicMetadata.role"), Some("admin"));
        assert_eq!(principal.first("iat"), Some("1700000000"));
        assert_eq!(principal.first("email_verified"), Some("true"));
        assert!(!principal.has_claim("nbf"));
    }

    #[test]
    fn first_value_outlives_the_lookup_key() {
        let principal = Principal::default()
            .with_claim("email", "a@x.com")
            .with_claim("email", "b@x.com");

        let value = {
            let kind = String::from("email");
            principal.first(&kind)
        };
        assert_eq!(value, Some("a@x.com"));
        assert_eq!(principal.first("oid"), None);
    }

    #[test]
    fn role_origins_parse_tags() {
        let principal = Principal::default()
            .with_claim(claim_types::ROLE_ORIGIN, "provider:canLogin")
            .with_claim(claim_types::ROLE_ORIGIN, "internal:admin")
            .with_claim(claim_types::ROLE_ORIGIN, "garbage");

        assert_eq!(
            principal.role_origins(),
            vec![
                (RoleOrigin::Provider, "canLogin".to_string()),
                (RoleOrigin::Internal, "admin".to_string()),
            ]
        );
    }

    #[test]
    fn enriched_at_reads_marker() {
        let now = Utc::now();
        let principal =
            Principal::default().with_claim(claim_types::ROLES_ENRICHED_AT, now.to_rfc3339());
        assert_eq!(principal.enriched_at(), Some(now));
        assert!(Principal::default().enriched_at().is_none());
    }

    #[test]
    fn from_principal_uses_normalized_primary_identifier() {
        let principal = Principal::default()
            .with_claim("sub", "user_123")
            .with_claim("email", " User@Example.com ")
            .with_claim("name", "Jane Doe")
            .with_claim(claim_types::ROLE, "canLogin");

        let user = AuthenticatedUser::from_principal(principal, None).unwrap();
        assert_eq!(user.user_id, "user@example.com");
        assert_eq!(user.display_name.as_deref(), Some("Jane Doe"));
        assert!(user.can_login());
        assert!(!user.is_admin());
    }

    #[test]
    fn from_principal_requires_an_identifier() {
        let principal = Principal::default().with_claim("name", "Nobody");
        let result = AuthenticatedUser::from_principal(principal, None);
        assert!(matches!(result, Err(AuthError::MissingIdentity)));
    }

    #[test]
    fn admin_can_login_without_explicit_role() {
        let principal = Principal::default()
            .with_claim("sub", "root")
            .with_claim(claim_types::ROLE, "Admin");
        let user = AuthenticatedUser::from_principal(principal, None).unwrap();
        assert!(user.is_admin());
        assert!(user.can_login());
    }
}
