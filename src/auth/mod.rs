// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Verifies identity tokens and turns them into authorization-ready
//! principals.
//!
//! ## Auth Flow
//!
//! 1. The client authenticates with a configured identity provider
//! 2. The client sends `Authorization: Bearer <JWT>` (or a session cookie
//!    obtained from `POST /v1/auth/login`)
//! 3. The server:
//!    - picks the provider whose issuer matches the token's `iss`
//!    - verifies signature, expiry, issuer and audience against its JWKS
//!    - extracts identity candidates (email, subject, provider object id)
//!    - merges provider roles with roles persisted in the role store
//!    - tags every role with its origin and stamps `roles_enriched_at`
//!
//! With no providers configured the server runs in development mode and
//! accepts unsigned tokens.
//!
//! ## Security
//!
//! - All non-health endpoints require authentication
//! - JWKS is cached with TTL per provider
//! - Clock skew tolerance is 60 seconds
//! - Authorization decisions read `role` claims only, never `role_origin`

pub mod claims;
pub mod enrichment;
pub mod error;
pub mod extractor;
pub mod identifiers;
pub mod jwks;
pub mod provider;
pub mod resolver;
pub mod roles;
pub mod session;

#[cfg(test)]
pub(crate) mod test_keys;

pub use claims::{AuthenticatedUser, Principal};
pub use enrichment::{ClaimsEnricher, Enrichment};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, Member};
pub use identifiers::{IdentifierType, IdentityCandidate};
pub use jwks::JwksManager;
pub use provider::{AuthConfig, IdentityProvider};
pub use roles::{RoleOrigin, RoleSet};
