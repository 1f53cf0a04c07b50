// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role assignment repository.
//!
//! One record per normalized identifier value. The identifier type stored on
//! a record is informational: historical grants did not always record it
//! consistently, so lookups fall back to value-only matching.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{ReadableTable, Table};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::identifiers::{normalize_identifier, IdentifierType, IdentityCandidate};
use crate::auth::roles::RoleSet;
use crate::storage::database::{Store, StoreResult, ROLE_ASSIGNMENTS};

/// Persisted roles granted to one identifier.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct RoleAssignment {
    /// Unique assignment identifier (UUID)
    pub id: String,
    /// Normalized (trimmed, lowercase) identifier value
    pub user_identifier: String,
    /// Identifier type the grant was recorded under (`email`, `sub`, `oid`)
    pub identifier_type: String,
    /// Granted roles
    #[schema(value_type = Vec<String>)]
    pub roles: RoleSet,
    /// Display name captured at grant time
    pub display_name: Option<String>,
    /// Identity provider the grant was made for
    pub provider: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl RoleAssignment {
    /// New, not yet persisted assignment. `id` and timestamps are assigned
    /// by [`RoleStore::upsert`].
    pub fn new(
        identifier: &str,
        identifier_type: impl Into<String>,
        roles: RoleSet,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            user_identifier: normalize_identifier(identifier),
            identifier_type: identifier_type.into(),
            roles,
            display_name: None,
            provider: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// Whether the record was stored under the given identifier type.
    fn recorded_as(&self, kind: IdentifierType) -> bool {
        IdentifierType::parse(&self.identifier_type) == Some(kind)
    }
}

/// Arguments of an additive role grant.
#[derive(Debug, Clone)]
pub struct RoleGrant {
    pub identifier: String,
    pub identifier_type: String,
    pub roles: RoleSet,
    pub display_name: Option<String>,
    pub provider: Option<String>,
}

/// Data access for role assignments.
///
/// Implementations serialize concurrent writers themselves; callers add no
/// locking of their own.
pub trait RoleStore: Send + Sync {
    /// Exact lookup by identifier value (normalized before comparison).
    fn get_by_identifier(&self, identifier: &str) -> StoreResult<Option<RoleAssignment>>;

    /// First assignment matching any candidate.
    ///
    /// Pass one tries each candidate's exact `(type, value)` pair in order;
    /// pass two retries each candidate by value alone, in the same order.
    fn get_by_any_identifier(
        &self,
        candidates: &[IdentityCandidate],
    ) -> StoreResult<Option<RoleAssignment>>;

    fn get_all(&self) -> StoreResult<Vec<RoleAssignment>>;

    /// Insert, or replace the mutable fields of the existing record while
    /// keeping its `id`, `created_at` and `identifier_type`.
    fn upsert(&self, assignment: RoleAssignment) -> StoreResult<RoleAssignment>;

    /// Union the granted roles into the existing record (or create it).
    fn add_roles(&self, grant: RoleGrant) -> StoreResult<RoleAssignment>;

    /// Remove roles. Returns `None` if no record exists for the identifier.
    /// A record left without roles is kept.
    fn remove_roles(
        &self,
        identifier: &str,
        roles: &RoleSet,
    ) -> StoreResult<Option<RoleAssignment>>;

    /// Delete the record. Returns whether one existed.
    fn delete(&self, identifier: &str) -> StoreResult<bool>;
}

/// redb-backed [`RoleStore`].
#[derive(Clone)]
pub struct RoleRepository {
    store: Arc<Store>,
}

impl RoleRepository {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

fn load(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
) -> StoreResult<Option<RoleAssignment>> {
    match table.get(key)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

/// Write `assignment` over whatever is stored for its identifier.
fn merge_and_save(
    table: &mut Table<'_, &'static str, &'static [u8]>,
    mut assignment: RoleAssignment,
) -> StoreResult<RoleAssignment> {
    let key = normalize_identifier(&assignment.user_identifier);
    let now = Utc::now();

    match load(table, &key)? {
        Some(existing) => {
            assignment.id = existing.id;
            assignment.created_at = existing.created_at;
            assignment.identifier_type = existing.identifier_type;
        }
        None => {
            assignment.id = uuid::Uuid::new_v4().to_string();
            assignment.created_at = now;
        }
    }
    assignment.user_identifier = key;
    assignment.modified_at = now;

    let json = serde_json::to_vec(&assignment)?;
    table.insert(assignment.user_identifier.as_str(), json.as_slice())?;
    Ok(assignment)
}

impl RoleStore for RoleRepository {
    fn get_by_identifier(&self, identifier: &str) -> StoreResult<Option<RoleAssignment>> {
        let key = normalize_identifier(identifier);
        self.store.read(|txn| {
            let table = txn.open_table(ROLE_ASSIGNMENTS)?;
            load(&table, &key)
        })
    }

    fn get_by_any_identifier(
        &self,
        candidates: &[IdentityCandidate],
    ) -> StoreResult<Option<RoleAssignment>> {
        if candidates.is_empty() {
            return Ok(None);
        }

        let found = self.store.read(|txn| {
            let table = txn.open_table(ROLE_ASSIGNMENTS)?;
            let mut found = Vec::with_capacity(candidates.len());
            for candidate in candidates {
                found.push(load(&table, &candidate.normalized())?);
            }
            Ok(found)
        })?;

        let exact = candidates
            .iter()
            .zip(&found)
            .find_map(|(candidate, hit)| hit.as_ref().filter(|a| a.recorded_as(candidate.kind)));
        if let Some(assignment) = exact {
            return Ok(Some(assignment.clone()));
        }

        Ok(found.into_iter().flatten().next())
    }

    fn get_all(&self) -> StoreResult<Vec<RoleAssignment>> {
        self.store.read(|txn| {
            let table = txn.open_table(ROLE_ASSIGNMENTS)?;
            let mut assignments = Vec::new();
            for entry in table.iter()? {
                let (_, value) = entry?;
                assignments.push(serde_json::from_slice(value.value())?);
            }
            Ok(assignments)
        })
    }

    fn upsert(&self, assignment: RoleAssignment) -> StoreResult<RoleAssignment> {
        self.store.write(|txn| {
            let mut table = txn.open_table(ROLE_ASSIGNMENTS)?;
            merge_and_save(&mut table, assignment)
        })
    }

    fn add_roles(&self, grant: RoleGrant) -> StoreResult<RoleAssignment> {
        let key = normalize_identifier(&grant.identifier);
        self.store.write(|txn| {
            let mut table = txn.open_table(ROLE_ASSIGNMENTS)?;

            let assignment = match load(&table, &key)? {
                Some(mut existing) => {
                    existing.roles = existing.roles.union(&grant.roles);
                    if grant.display_name.is_some() {
                        existing.display_name = grant.display_name;
                    }
                    if grant.provider.is_some() {
                        existing.provider = grant.provider;
                    }
                    existing
                }
                None => {
                    let mut fresh = RoleAssignment::new(&key, grant.identifier_type, grant.roles);
                    fresh.display_name = grant.display_name;
                    fresh.provider = grant.provider;
                    fresh
                }
            };

            merge_and_save(&mut table, assignment)
        })
    }

    fn remove_roles(
        &self,
        identifier: &str,
        roles: &RoleSet,
    ) -> StoreResult<Option<RoleAssignment>> {
        let key = normalize_identifier(identifier);
        if self.get_by_identifier(&key)?.is_none() {
            return Ok(None);
        }

        self.store.write(|txn| {
            let mut table = txn.open_table(ROLE_ASSIGNMENTS)?;
            let Some(mut existing) = load(&table, &key)? else {
                return Ok(None);
            };
            existing.roles = existing.roles.difference(roles);
            merge_and_save(&mut table, existing).map(Some)
        })
    }

    fn delete(&self, identifier: &str) -> StoreResult<bool> {
        let key = normalize_identifier(identifier);
        self.store.write(|txn| {
            let mut table = txn.open_table(ROLE_ASSIGNMENTS)?;
            let removed = table.remove(key.as_str())?.is_some();
            Ok(removed)
        })
    }
}
