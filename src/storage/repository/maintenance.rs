// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Maintenance record repository.
//!
//! Records are keyed by id and owned by the normalized primary identifier
//! of the user who created them.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::database::{Store, StoreError, StoreResult, MAINTENANCE_RECORDS};
use crate::storage::ownership::OwnedResource;

/// Lifecycle of a maintenance task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    #[default]
    Scheduled,
    InProgress,
    Done,
    Cancelled,
}

/// A maintenance record stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct MaintenanceRecord {
    /// Unique record identifier (UUID)
    pub id: String,
    /// Owner's normalized primary identifier
    pub owner_identifier: String,
    /// Equipment or property the work applies to
    pub asset: String,
    /// Short description of the work
    pub title: String,
    pub notes: Option<String>,
    pub status: MaintenanceStatus,
    pub due_on: Option<NaiveDate>,
    /// Set when the status first becomes `done`
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MaintenanceRecord {
    pub fn new(owner_identifier: impl Into<String>, asset: String, title: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_identifier: owner_identifier.into(),
            asset,
            title,
            notes: None,
            status: MaintenanceStatus::default(),
            due_on: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Change status, stamping `completed_at` on the first transition to done.
    pub fn set_status(&mut self, status: MaintenanceStatus) {
        if status == MaintenanceStatus::Done && self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
        self.status = status;
    }
}

impl OwnedResource for MaintenanceRecord {
    fn owner_identifier(&self) -> &str {
        &self.owner_identifier
    }
}

/// Repository for maintenance records.
#[derive(Clone)]
pub struct MaintenanceRepository {
    store: Arc<Store>,
}

impl MaintenanceRepository {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn get(&self, record_id: &str) -> StoreResult<Option<MaintenanceRecord>> {
        self.store.read(|txn| {
            let table = txn.open_table(MAINTENANCE_RECORDS)?;
            let record = match table.get(record_id)? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };
            Ok(record)
        })
    }

    pub fn create(&self, record: &MaintenanceRecord) -> StoreResult<()> {
        let json = serde_json::to_vec(record)?;
        self.store.write(|txn| {
            let mut table = txn.open_table(MAINTENANCE_RECORDS)?;
            table.insert(record.id.as_str(), json.as_slice())?;
            Ok(())
        })
    }

    /// Replace an existing record. `updated_at` is refreshed.
    pub fn update(&self, record: &MaintenanceRecord) -> StoreResult<MaintenanceRecord> {
        let mut updated = record.clone();
        updated.updated_at = Utc::now();
        let json = serde_json::to_vec(&updated)?;

        self.store.write(|txn| {
            let mut table = txn.open_table(MAINTENANCE_RECORDS)?;
            let exists = table.get(record.id.as_str())?.is_some();
            if !exists {
                return Err(StoreError::NotFound(format!("Record {}", record.id)));
            }
            table.insert(record.id.as_str(), json.as_slice())?;
            Ok(())
        })?;

        Ok(updated)
    }

    pub fn delete(&self, record_id: &str) -> StoreResult<()> {
        self.store.write(|txn| {
            let mut table = txn.open_table(MAINTENANCE_RECORDS)?;
            let removed = table.remove(record_id)?.is_some();
            if !removed {
                return Err(StoreError::NotFound(format!("Record {record_id}")));
            }
            Ok(())
        })
    }

    /// Records owned by one user, soonest due first (undated last).
    pub fn list_by_owner(&self, owner_identifier: &str) -> StoreResult<Vec<MaintenanceRecord>> {
        let mut records: Vec<MaintenanceRecord> = self
            .list_all()?
            .into_iter()
            .filter(|r| r.owner_identifier == owner_identifier)
            .collect();
        records.sort_by(|a, b| match (a.due_on, b.due_on) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.created_at.cmp(&b.created_at),
        });
        Ok(records)
    }

    /// List all records (admin view).
    pub fn list_all(&self) -> StoreResult<Vec<MaintenanceRecord>> {
        self.store.read(|txn| {
            let table = txn.open_table(MAINTENANCE_RECORDS)?;
            let mut records = Vec::new();
            for entry in table.iter()? {
                let (_, value) = entry?;
                records.push(serde_json::from_slice(value.value())?);
            }
            Ok(records)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::tests::temp_store;

    fn sample(owner: &str, title: &str) -> MaintenanceRecord {
        MaintenanceRecord::new(owner, "Boiler".to_string(), title.to_string())
    }

    #[test]
    fn create_and_get() {
        let (store, _dir) = temp_store();
        let repo = MaintenanceRepository::new(store);

        let record = sample("a@x.com", "Annual service");
        repo.create(&record).unwrap();

        assert_eq!(repo.get(&record.id).unwrap(), Some(record));
        assert!(repo.get("missing").unwrap().is_none());
    }

    #[test]
    fn update_refreshes_timestamp() {
        let (store, _dir) = temp_store();
        let repo = MaintenanceRepository::new(store);

        let mut record = sample("a@x.com", "Annual service");
        repo.create(&record).unwrap();

        record.set_status(MaintenanceStatus::Done);
        let updated = repo.update(&record).unwrap();
        assert_eq!(updated.status, MaintenanceStatus::Done);
        assert!(updated.completed_at.is_some());
        assert!(updated.updated_at >= record.updated_at);
        assert_eq!(repo.get(&record.id).unwrap(), Some(updated));
    }

    #[test]
    fn update_missing_is_not_found() {
        let (store, _dir) = temp_store();
        let repo = MaintenanceRepository::new(store);

        let result = repo.update(&sample("a@x.com", "Ghost"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn delete_removes_record() {
        let (store, _dir) = temp_store();
        let repo = MaintenanceRepository::new(store);

        let record = sample("a@x.com", "Filter change");
        repo.create(&record).unwrap();
        repo.delete(&record.id).unwrap();

        assert!(repo.get(&record.id).unwrap().is_none());
        assert!(matches!(repo.delete(&record.id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn list_by_owner_filters_and_orders_by_due_date() {
        let (store, _dir) = temp_store();
        let repo = MaintenanceRepository::new(store);

        let mut later = sample("a@x.com", "Later");
        later.due_on = NaiveDate::from_ymd_opt(2026, 12, 1);
        let mut sooner = sample("a@x.com", "Sooner");
        sooner.due_on = NaiveDate::from_ymd_opt(2026, 11, 1);
        let undated = sample("a@x.com", "Whenever");
        let foreign = sample("b@x.com", "Not mine");

        for record in [&later, &sooner, &undated, &foreign] {
            repo.create(record).unwrap();
        }

        let titles: Vec<_> = repo
            .list_by_owner("a@x.com")
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["Sooner", "Later", "Whenever"]);
        assert_eq!(repo.list_all().unwrap().len(), 4);
    }

    #[test]
    fn done_timestamp_is_stamped_once() {
        let mut record = sample("a@x.com", "Gutter");
        record.set_status(MaintenanceStatus::Done);
        let first = record.completed_at;
        record.set_status(MaintenanceStatus::InProgress);
        record.set_status(MaintenanceStatus::Done);
        assert_eq!(record.completed_at, first);
    }
}
