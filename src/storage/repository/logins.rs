// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login tracking.
//!
//! One record per primary identifier, updated on every new login.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::identifiers::IdentityCandidate;
use crate::storage::database::{Store, StoreResult, LOGIN_RECORDS};

/// Login history of one user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct LoginRecord {
    /// Normalized primary identifier
    pub user_identifier: String,
    /// Identifier type of the primary identifier (`email`, `sub`, `oid`)
    pub identifier_type: String,
    pub display_name: Option<String>,
    /// Provider of the most recent login
    pub provider: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub login_count: u64,
}

/// Sink for login events raised by enrichment.
pub trait LoginTracker: Send + Sync {
    fn record_login(
        &self,
        candidate: &IdentityCandidate,
        display_name: Option<&str>,
        provider: Option<&str>,
    ) -> StoreResult<LoginRecord>;
}

/// redb-backed [`LoginTracker`].
#[derive(Clone)]
pub struct LoginRepository {
    store: Arc<Store>,
}

impl LoginRepository {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn get(&self, identifier: &str) -> StoreResult<Option<LoginRecord>> {
        let key = crate::auth::identifiers::normalize_identifier(identifier);
        self.store.read(|txn| {
            let table = txn.open_table(LOGIN_RECORDS)?;
            let record = match table.get(key.as_str())? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };
            Ok(record)
        })
    }

    /// All login records, most recently seen first.
    pub fn list_all(&self) -> StoreResult<Vec<LoginRecord>> {
        let mut records: Vec<LoginRecord> = self.store.read(|txn| {
            let table = txn.open_table(LOGIN_RECORDS)?;
            let mut records = Vec::new();
            for entry in table.iter()? {
                let (_, value) = entry?;
                records.push(serde_json::from_slice(value.value())?);
            }
            Ok(records)
        })?;
        records.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at));
        Ok(records)
    }
}

impl LoginTracker for LoginRepository {
    fn record_login(
        &self,
        candidate: &IdentityCandidate,
        display_name: Option<&str>,
        provider: Option<&str>,
    ) -> StoreResult<LoginRecord> {
        let key = candidate.normalized();
        let now = Utc::now();

        self.store.write(|txn| {
            let mut table = txn.open_table(LOGIN_RECORDS)?;
            let existing: Option<LoginRecord> = match table.get(key.as_str())? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };

            let record = match existing {
                Some(mut record) => {
                    record.last_seen_at = now;
                    record.login_count += 1;
                    if let Some(name) = display_name {
                        record.display_name = Some(name.to_string());
                    }
                    if let Some(provider) = provider {
                        record.provider = Some(provider.to_string());
                    }
                    record
                }
                None => LoginRecord {
                    user_identifier: key.clone(),
                    identifier_type: candidate.kind.as_str().to_string(),
                    display_name: display_name.map(str::to_string),
                    provider: provider.map(str::to_string),
                    first_seen_at: now,
                    last_seen_at: now,
                    login_count: 1,
                },
            };

            let json = serde_json::to_vec(&record)?;
            table.insert(key.as_str(), json.as_slice())?;
            Ok(record)
        })
    }
}
