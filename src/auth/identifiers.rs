// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity candidate extraction.
//!
//! Providers expose the logged-in user under different claim names: Google
//! and Clerk use `email`/`sub`, Entra ID adds `oid` and `upn`, WS-Fed style
//! tokens use long schema URIs. Which provider spells what is kept in the
//! lookup tables below and nowhere else.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::claims::Principal;

/// Semantic kind of a user identifier, most portable first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum IdentifierType {
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "sub")]
    Subject,
    #[serde(rename = "oid")]
    ProviderObjectId,
}

impl IdentifierType {
    /// Wire name, also stored on role assignments.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierType::Email => "email",
            IdentifierType::Subject => "sub",
            IdentifierType::ProviderObjectId => "oid",
        }
    }

    /// Parse a stored or requested identifier type (case-insensitive).
    pub fn parse(s: &str) -> Option<IdentifierType> {
        match s.trim().to_lowercase().as_str() {
            "email" => Some(IdentifierType::Email),
            "sub" | "subject" => Some(IdentifierType::Subject),
            "oid" | "objectid" | "provider_object_id" => Some(IdentifierType::ProviderObjectId),
            _ => None,
        }
    }
}

impl std::fmt::Display for IdentifierType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(type, value)` pair used to look up persisted roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IdentityCandidate {
    pub kind: IdentifierType,
    pub value: String,
}

impl IdentityCandidate {
    pub fn new(kind: IdentifierType, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn normalized(&self) -> String {
        normalize_identifier(&self.value)
    }
}

/// Canonical form used for every identifier comparison and write.
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Claim spellings per identifier type, checked in this order.
pub const CLAIM_SPELLINGS: &[(IdentifierType, &[&str])] = &[
    (
        IdentifierType::Email,
        &[
            "email",
            "emails",
            "upn",
            "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/emailaddress",
            "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/upn",
        ],
    ),
    (
        IdentifierType::Subject,
        &[
            "sub",
            "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier",
        ],
    ),
    (
        IdentifierType::ProviderObjectId,
        &[
            "oid",
            "http://schemas.microsoft.com/identity/claims/objectidentifier",
        ],
    ),
];

/// Claim spellings carrying a display name.
pub const NAME_CLAIMS: &[&str] = &[
    "name",
    "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name",
    "nickname",
    "preferred_username",
];

/// Claim spellings carrying provider-asserted roles.
pub const ROLE_CLAIMS: &[&str] = &[
    super::claims::claim_types::ROLE,
    "roles",
    "publicMetadata.role",
    "http://schemas.microsoft.com/ws/2008/06/identity/claims/role",
];

/// Extract identity candidates from a principal, most reliable first.
///
/// Every spelling of one identifier type is tried before the next type.
/// Blank values and duplicates are skipped.
pub fn extract_candidates(principal: &Principal) -> Vec<IdentityCandidate> {
    let mut candidates: Vec<IdentityCandidate> = Vec::new();

    for (kind, spellings) in CLAIM_SPELLINGS {
        for spelling in *spellings {
            for value in principal.values(spelling) {
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                let duplicate = candidates.iter().any(|c| {
                    c.kind == *kind && normalize_identifier(&c.value) == normalize_identifier(value)
                });
                if !duplicate {
                    candidates.push(IdentityCandidate::new(*kind, value));
                }
            }
        }
    }

    candidates
}

/// The candidate login tracking and record ownership key on.
pub fn primary_candidate(principal: &Principal) -> Option<IdentityCandidate> {
    extract_candidates(principal).into_iter().next()
}

/// First non-blank display name claim.
pub fn display_name(principal: &Principal) -> Option<&str> {
    NAME_CLAIMS
        .iter()
        .flat_map(|spelling| principal.values(spelling))
        .map(str::trim)
        .find(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_spellings_come_before_subject() {
        let principal = Principal::default()
            .with_claim("sub", "abc-123")
            .with_claim("oid", "0000-1111")
            .with_claim(
                "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/emailaddress",
                "ws@x.com",
            )
            .with_claim("email", "a@x.com");

        let candidates = extract_candidates(&principal);
        assert_eq!(
            candidates,
            vec![
                IdentityCandidate::new(IdentifierType::Email, "a@x.com"),
                IdentityCandidate::new(IdentifierType::Email, "ws@x.com"),
                IdentityCandidate::new(IdentifierType::Subject, "abc-123"),
                IdentityCandidate::new(IdentifierType::ProviderObjectId, "0000-1111"),
            ]
        );
    }

    #[test]
    fn blank_values_are_skipped() {
        let principal = Principal::default()
            .with_claim("email", "   ")
            .with_claim("upn", "")
            .with_claim("sub", "abc");

        let candidates = extract_candidates(&principal);
        assert_eq!(
            candidates,
            vec![IdentityCandidate::new(IdentifierType::Subject, "abc")]
        );
    }

    #[test]
    fn values_are_trimmed_and_deduplicated() {
        let principal = Principal::default()
            .with_claim("email", "User@X.com ")
            .with_claim("upn", "user@x.com");

        let candidates = extract_candidates(&principal);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].value, "User@X.com");
        assert_eq!(candidates[0].normalized(), "user@x.com");
    }

    #[test]
    fn no_identifiers_yields_empty_list() {
        let principal = Principal::default().with_claim("name", "Anonymous");
        assert!(extract_candidates(&principal).is_empty());
        assert!(primary_candidate(&principal).is_none());
    }

    #[test]
    fn identifier_type_parse_accepts_aliases() {
        assert_eq!(IdentifierType::parse("EMAIL"), Some(IdentifierType::Email));
        assert_eq!(IdentifierType::parse("subject"), Some(IdentifierType::Subject));
        assert_eq!(IdentifierType::parse("oid"), Some(IdentifierType::ProviderObjectId));
        assert_eq!(IdentifierType::parse("phone"), None);
    }

    #[test]
    fn display_name_skips_blank_claims() {
        let principal = Principal::default()
            .with_claim("name", " ")
            .with_claim("nickname", "jd");
        assert_eq!(display_name(&principal), Some("jd"));
    }
}
