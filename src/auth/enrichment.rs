// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Claims enrichment.
//!
//! Merges provider-asserted roles with roles persisted in the role store and
//! rebuilds the principal around the union. Runs on every login and on every
//! session revalidation, since grants can change between logins.
//!
//! ## Output claims
//!
//! | Claim | Count | Meaning |
//! |-------|-------|---------|
//! | `role` | one per effective role | authorization input |
//! | `role_origin` | one per effective role | `provider:<role>` or `internal:<role>`, display only |
//! | `roles_enriched_at` | one | RFC 3339 time of this enrichment |
//!
//! Every other claim is copied unchanged. A role asserted by both the
//! provider and the store is tagged `provider`.
//!
//! ## Re-enrichment
//!
//! Roles a previous enrichment tagged `internal` are not treated as provider
//! roles the next time around. Enriching twice with no store change yields
//! the same role set, and a revoked grant disappears on the next pass.
//!
//! ## Failures
//!
//! A store read failure degrades to provider-only roles with a warning. A
//! degraded pass carries the previous `roles_enriched_at` forward instead of
//! stamping a new one, so the principal is retried against the store on its
//! next use. Login tracking failures are logged and otherwise ignored.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use super::claims::{claim_types, Principal};
use super::identifiers::{self, ROLE_CLAIMS};
use super::resolver::RoleResolver;
use super::roles::{RoleOrigin, RoleSet};
use crate::storage::LoginTracker;

/// Result of one enrichment pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub principal: Principal,
    /// The role store could not be read; only provider roles were applied.
    pub degraded: bool,
}

pub struct ClaimsEnricher {
    resolver: RoleResolver,
    logins: Arc<dyn LoginTracker>,
}

impl ClaimsEnricher {
    pub fn new(resolver: RoleResolver, logins: Arc<dyn LoginTracker>) -> Self {
        Self { resolver, logins }
    }

    /// Produce the enriched principal for one login or request validation.
    pub fn enrich(&self, principal: &Principal, is_new_login: bool) -> Principal {
        self.enrich_checked(principal, is_new_login).principal
    }

    /// Like [`enrich`](Self::enrich), also reporting whether the role store
    /// was skipped.
    pub fn enrich_checked(&self, principal: &Principal, is_new_login: bool) -> Enrichment {
        let provider_roles = provider_roles(principal);

        let candidates = identifiers::extract_candidates(principal);
        let (persisted_roles, degraded) = match self.resolver.resolve(&candidates) {
            Ok(roles) => (roles, false),
            Err(e) => {
                warn!(
                    error = %e,
                    candidates = candidates.len(),
                    "Role store unavailable, continuing with provider roles only"
                );
                (RoleSet::new(), true)
            }
        };

        if is_new_login {
            self.track_login(principal);
        }

        let previously_enriched = principal.has_claim(claim_types::ROLE_ORIGIN)
            || principal.has_claim(claim_types::ROLES_ENRICHED_AT);
        if persisted_roles.is_empty() && provider_roles.is_empty() && !previously_enriched {
            return Enrichment { principal: principal.clone(), degraded };
        }

        let effective = provider_roles.union(&persisted_roles);
        debug!(
            provider = provider_roles.len(),
            persisted = persisted_roles.len(),
            effective = effective.len(),
            degraded,
            "Principal enriched"
        );

        let marker = if degraded {
            principal.first(claim_types::ROLES_ENRICHED_AT).map(str::to_string)
        } else {
            Some(Utc::now().to_rfc3339())
        };

        Enrichment {
            principal: rebuild(principal, &effective, &provider_roles, marker),
            degraded,
        }
    }

    fn track_login(&self, principal: &Principal) {
        let Some(primary) = identifiers::primary_candidate(principal) else {
            debug!("Login without identifiers, not tracked");
            return;
        };

        if let Err(e) = self.logins.record_login(
            &primary,
            identifiers::display_name(principal),
            principal.provider(),
        ) {
            warn!(error = %e, identifier = %primary.normalized(), "Failed to record login");
        }
    }
}

/// Roles the provider asserted, under any known role claim spelling.
///
/// Roles tagged `internal` by an earlier enrichment came from the store, not
/// the provider, and are left out.
fn provider_roles(principal: &Principal) -> RoleSet {
    let internal: RoleSet = principal
        .role_origins()
        .iter()
        .filter(|(origin, _)| *origin == RoleOrigin::Internal)
        .map(|(_, role)| role.as_str())
        .collect();

    ROLE_CLAIMS
        .iter()
        .flat_map(|spelling| principal.values(spelling))
        .filter(|role| !internal.contains(role))
        .collect()
}

fn rebuild(
    principal: &Principal,
    effective: &RoleSet,
    provider_roles: &RoleSet,
    marker: Option<String>,
) -> Principal {
    let mut enriched = Principal::new(principal.provider().map(str::to_string));

    for claim in principal.claims() {
        let generated = claim.kind == claim_types::ROLE
            || claim.kind == claim_types::ROLE_ORIGIN
            || claim.kind == claim_types::ROLES_ENRICHED_AT;
        if !generated {
            enriched.push(claim.kind.as_str(), claim.value.as_str());
        }
    }

    for role in effective.iter() {
        enriched.push(claim_types::ROLE, role);
    }
    for role in effective.iter() {
        let origin = if provider_roles.contains(role) {
            RoleOrigin::Provider
        } else {
            RoleOrigin::Internal
        };
        enriched.push(claim_types::ROLE_ORIGIN, format!("{origin}:{role}"));
    }
    if let Some(marker) = marker {
        enriched.push(claim_types::ROLES_ENRICHED_AT, marker);
    }

    enriched
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use crate::auth::identifiers::IdentityCandidate;
    use crate::auth::roles::CAN_LOGIN;
    use crate::storage::database::tests::temp_store;
    use crate::storage::{
        LoginRecord, LoginRepository, RoleAssignment, RoleGrant, RoleRepository, RoleStore,
        StoreError, StoreResult,
    };

    /// Role store that is always unreachable.
    pub(crate) struct DownStore;

    fn down() -> StoreError {
        StoreError::Io(std::io::Error::other("store offline"))
    }

    impl RoleStore for DownStore {
        fn get_by_identifier(&self, _: &str) -> StoreResult<Option<RoleAssignment>> {
            Err(down())
        }
        fn get_by_any_identifier(
            &self,
            _: &[IdentityCandidate],
        ) -> StoreResult<Option<RoleAssignment>> {
            Err(down())
        }
        fn get_all(&self) -> StoreResult<Vec<RoleAssignment>> {
            Err(down())
        }
        fn upsert(&self, _: RoleAssignment) -> StoreResult<RoleAssignment> {
            Err(down())
        }
        fn add_roles(&self, _: RoleGrant) -> StoreResult<RoleAssignment> {
            Err(down())
        }
        fn remove_roles(&self, _: &str, _: &RoleSet) -> StoreResult<Option<RoleAssignment>> {
            Err(down())
        }
        fn delete(&self, _: &str) -> StoreResult<bool> {
            Err(down())
        }
    }

    /// Login tracker that counts calls and can be told to fail.
    #[derive(Default)]
    struct SpyLogins {
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    impl LoginTracker for SpyLogins {
        fn record_login(
            &self,
            candidate: &IdentityCandidate,
            display_name: Option<&str>,
            provider: Option<&str>,
        ) -> StoreResult<LoginRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(down());
            }
            let now = Utc::now();
            Ok(LoginRecord {
                user_identifier: candidate.normalized(),
                identifier_type: candidate.kind.as_str().to_string(),
                display_name: display_name.map(str::to_string),
                provider: provider.map(str::to_string),
                first_seen_at: now,
                last_seen_at: now,
                login_count: 1,
            })
        }
    }

    fn roles(names: &[&str]) -> RoleSet {
        names.iter().copied().collect()
    }

    fn grant(repo: &RoleRepository, identifier: &str, names: &[&str]) {
        repo.add_roles(RoleGrant {
            identifier: identifier.to_string(),
            identifier_type: "email".to_string(),
            roles: roles(names),
            display_name: None,
            provider: None,
        })
        .unwrap();
    }

    fn origins(principal: &Principal) -> Vec<String> {
        principal
            .values(claim_types::ROLE_ORIGIN)
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn persisted_roles_resolve_through_messy_email() {
        let (store, _dir) = temp_store();
        let repo = RoleRepository::new(store);
        grant(&repo, "user@x.com", &[CAN_LOGIN]);
        let enricher = ClaimsEnricher::new(
            RoleResolver::new(Arc::new(repo)),
            Arc::new(SpyLogins::default()),
        );

        let principal = Principal::new(Some("google".to_string()))
            .with_claim("email", "User@X.com ")
            .with_claim(claim_types::ROLE, "");

        let enriched = enricher.enrich(&principal, false);
        assert_eq!(enriched.roles(), roles(&[CAN_LOGIN]));
        assert_eq!(origins(&enriched), vec!["internal:canLogin"]);
        assert!(enriched.enriched_at().is_some());
        assert_eq!(enriched.first("email"), Some("User@X.com "));
        assert_eq!(enriched.provider(), Some("google"));
    }

    #[test]
    fn provider_only_role_is_tagged_provider() {
        let (store, _dir) = temp_store();
        let enricher = ClaimsEnricher::new(
            RoleResolver::new(Arc::new(RoleRepository::new(store))),
            Arc::new(SpyLogins::default()),
        );

        let principal = Principal::default()
            .with_claim("sub", "abc")
            .with_claim("roles", CAN_LOGIN);

        let enriched = enricher.enrich(&principal, false);
        assert_eq!(enriched.roles(), roles(&[CAN_LOGIN]));
        assert_eq!(origins(&enriched), vec!["provider:canLogin"]);
    }

    #[test]
    fn role_from_both_sources_is_tagged_provider_once() {
        let (store, _dir) = temp_store();
        let repo = RoleRepository::new(store);
        grant(&repo, "a@x.com", &["Admin", "editor"]);
        let enricher = ClaimsEnricher::new(
            RoleResolver::new(Arc::new(repo)),
            Arc::new(SpyLogins::default()),
        );

        let principal = Principal::default()
            .with_claim("email", "a@x.com")
            .with_claim("publicMetadata.role", "admin");

        let enriched = enricher.enrich(&principal, false);
        assert_eq!(enriched.roles(), roles(&["admin", "editor"]));
        assert_eq!(enriched.values(claim_types::ROLE).count(), 2);
        assert_eq!(origins(&enriched), vec!["provider:admin", "internal:editor"]);
    }

    #[test]
    fn enrichment_is_stable_under_repetition() {
        let (store, _dir) = temp_store();
        let repo = RoleRepository::new(store);
        grant(&repo, "a@x.com", &["editor"]);
        let enricher = ClaimsEnricher::new(
            RoleResolver::new(Arc::new(repo)),
            Arc::new(SpyLogins::default()),
        );

        let principal = Principal::default()
            .with_claim("email", "a@x.com")
            .with_claim("roles", CAN_LOGIN);

        let once = enricher.enrich(&principal, false);
        let twice = enricher.enrich(&once, false);

        assert_eq!(once.roles(), twice.roles());
        assert_eq!(origins(&once), origins(&twice));
        assert_eq!(twice.values(claim_types::ROLES_ENRICHED_AT).count(), 1);
    }

    #[test]
    fn revoked_grant_disappears_on_next_enrichment() {
        let (store, _dir) = temp_store();
        let repo = Arc::new(RoleRepository::new(store));
        grant(&repo, "a@x.com", &[CAN_LOGIN, "admin"]);
        let enricher = ClaimsEnricher::new(
            RoleResolver::new(repo.clone()),
            Arc::new(SpyLogins::default()),
        );

        let principal = Principal::default().with_claim("email", "a@x.com");
        let first = enricher.enrich(&principal, true);
        assert!(first.roles().contains("admin"));

        repo.remove_roles("a@x.com", &roles(&["admin"])).unwrap();
        let second = enricher.enrich(&first, false);
        assert_eq!(second.roles(), roles(&[CAN_LOGIN]));
        assert_eq!(origins(&second), vec!["internal:canLogin"]);
    }

    #[test]
    fn unreachable_store_degrades_to_provider_roles() {
        let enricher = ClaimsEnricher::new(
            RoleResolver::new(Arc::new(DownStore)),
            Arc::new(SpyLogins::default()),
        );

        let principal = Principal::default()
            .with_claim("email", "a@x.com")
            .with_claim("roles", CAN_LOGIN);

        let outcome = enricher.enrich_checked(&principal, true);
        assert!(outcome.degraded);
        assert_eq!(outcome.principal.roles(), roles(&[CAN_LOGIN]));
        assert_eq!(origins(&outcome.principal), vec!["provider:canLogin"]);
        assert!(outcome.principal.enriched_at().is_none());
    }

    #[test]
    fn degraded_pass_keeps_previous_marker() {
        let enricher = ClaimsEnricher::new(
            RoleResolver::new(Arc::new(DownStore)),
            Arc::new(SpyLogins::default()),
        );
        let stale = (Utc::now() - chrono::Duration::minutes(10)).to_rfc3339();
        let principal = Principal::default()
            .with_claim("email", "a@x.com")
            .with_claim(claim_types::ROLE, "admin")
            .with_claim(claim_types::ROLE_ORIGIN, "internal:admin")
            .with_claim(claim_types::ROLES_ENRICHED_AT, stale.as_str());

        let outcome = enricher.enrich_checked(&principal, false);
        assert!(outcome.degraded);
        assert!(outcome.principal.roles().is_empty());
        assert_eq!(
            outcome.principal.first(claim_types::ROLES_ENRICHED_AT),
            Some(stale.as_str())
        );
    }

    #[test]
    fn healthy_store_is_not_degraded() {
        let (store, _dir) = temp_store();
        let enricher = ClaimsEnricher::new(
            RoleResolver::new(Arc::new(RoleRepository::new(store))),
            Arc::new(SpyLogins::default()),
        );
        let principal = Principal::default()
            .with_claim("email", "a@x.com")
            .with_claim("roles", CAN_LOGIN);

        let outcome = enricher.enrich_checked(&principal, false);
        assert!(!outcome.degraded);
        assert!(outcome.principal.enriched_at().is_some());
    }

    #[test]
    fn no_roles_anywhere_returns_principal_unchanged() {
        let (store, _dir) = temp_store();
        let enricher = ClaimsEnricher::new(
            RoleResolver::new(Arc::new(RoleRepository::new(store))),
            Arc::new(SpyLogins::default()),
        );

        let principal = Principal::default()
            .with_claim("email", "nobody@x.com")
            .with_claim("name", "Nobody");

        assert_eq!(enricher.enrich(&principal, false), principal);
    }

    #[test]
    fn new_login_is_tracked_once_per_call() {
        let (store, _dir) = temp_store();
        let logins = Arc::new(SpyLogins::default());
        let enricher = ClaimsEnricher::new(
            RoleResolver::new(Arc::new(RoleRepository::new(store))),
            logins.clone(),
        );
        let principal = Principal::default().with_claim("email", "a@x.com");

        enricher.enrich(&principal, true);
        enricher.enrich(&principal, false);
        assert_eq!(logins.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn login_tracking_failure_does_not_affect_result() {
        let (store, _dir) = temp_store();
        let repo = RoleRepository::new(store);
        grant(&repo, "a@x.com", &[CAN_LOGIN]);
        let logins = Arc::new(SpyLogins::default());
        logins.failing.store(true, Ordering::SeqCst);
        let enricher = ClaimsEnricher::new(RoleResolver::new(Arc::new(repo)), logins.clone());

        let principal = Principal::default().with_claim("email", "a@x.com");
        let enriched = enricher.enrich(&principal, true);

        assert_eq!(logins.calls.load(Ordering::SeqCst), 1);
        assert_eq!(enriched.roles(), roles(&[CAN_LOGIN]));
    }

    #[test]
    fn login_tracking_persists_primary_identifier() {
        let (store, _dir) = temp_store();
        let logins = Arc::new(LoginRepository::new(store.clone()));
        let enricher = ClaimsEnricher::new(
            RoleResolver::new(Arc::new(RoleRepository::new(store))),
            logins.clone(),
        );

        let principal = Principal::new(Some("entra".to_string()))
            .with_claim("oid", "0000-1111")
            .with_claim("upn", "Ada@Corp.com")
            .with_claim("name", "Ada");
        enricher.enrich(&principal, true);

        let record = logins.get("ada@corp.com").unwrap().unwrap();
        assert_eq!(record.identifier_type, "email");
        assert_eq!(record.display_name.as_deref(), Some("Ada"));
        assert_eq!(record.provider.as_deref(), Some("entra"));
    }
}
