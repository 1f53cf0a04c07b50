// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for security-sensitive operations.
//!
//! Role administration, session start/end and maintenance record mutations
//! are appended to the `audit_events` table. Keys sort newest first.
//! A failed audit write is logged and never fails the audited operation.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::database::{Store, StoreResult, AUDIT_EVENTS};

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Role administration
    RolesGranted,
    RolesRevoked,
    RolesReplaced,
    AdminSeeded,

    // Sessions
    SessionStarted,
    SessionEnded,
    LoginDenied,

    // Maintenance records
    RecordCreated,
    RecordUpdated,
    RecordDeleted,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// Acting user's primary identifier (if known).
    pub user_id: Option<String>,
    /// Resource affected (role assignment identifier, record id, ...).
    pub resource_id: Option<String>,
    /// Resource type (`role_assignment`, `record`, `session`).
    pub resource_type: Option<String>,
    /// Additional details as JSON.
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            user_id: None,
            resource_id: None,
            resource_type: None,
            details: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Table key: inverted big-endian microsecond timestamp, then event id.
    fn key(&self) -> Vec<u8> {
        let micros = u64::try_from(self.timestamp.timestamp_micros()).unwrap_or(0);
        let mut key = Vec::with_capacity(8 + self.event_id.len());
        key.extend_from_slice(&(u64::MAX - micros).to_be_bytes());
        key.extend_from_slice(self.event_id.as_bytes());
        key
    }
}

/// Repository for audit events.
pub struct AuditRepository<'a> {
    store: &'a Store,
}

impl<'a> AuditRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Append an event.
    pub fn log(&self, event: &AuditEvent) -> StoreResult<()> {
        let key = event.key();
        let json = serde_json::to_vec(event)?;
        self.store.write(|txn| {
            let mut table = txn.open_table(AUDIT_EVENTS)?;
            table.insert(key.as_slice(), json.as_slice())?;
            Ok(())
        })
    }

    /// Most recent events first, at most `limit`.
    pub fn recent(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        self.scan(limit, |_| true)
    }

    /// Most recent events triggered by one user.
    pub fn search_by_user(&self, user_id: &str, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        self.scan(limit, |e| e.user_id.as_deref() == Some(user_id))
    }

    /// Most recent events touching one resource.
    pub fn search_by_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<AuditEvent>> {
        self.scan(limit, |e| {
            e.resource_type.as_deref() == Some(resource_type)
                && e.resource_id.as_deref() == Some(resource_id)
        })
    }

    fn scan(
        &self,
        limit: usize,
        filter: impl Fn(&AuditEvent) -> bool,
    ) -> StoreResult<Vec<AuditEvent>> {
        self.store.read(|txn| {
            let table = txn.open_table(AUDIT_EVENTS)?;
            let mut events = Vec::new();
            for entry in table.iter()? {
                if events.len() >= limit {
                    break;
                }
                let (_, value) = entry?;
                let event: AuditEvent = serde_json::from_slice(value.value())?;
                if filter(&event) {
                    events.push(event);
                }
            }
            Ok(events)
        })
    }
}

/// Append an audit event, logging (not propagating) failures.
///
/// `audit_log!(store, event_type, user_id)` or
/// `audit_log!(store, event_type, user_id, resource_type, resource_id)`,
/// optionally followed by `details = json!(...)`.
#[macro_export]
macro_rules! audit_log {
    ($store:expr, $event_type:expr, $user_id:expr) => {{
        let event = $crate::storage::AuditEvent::new($event_type).with_user($user_id);
        $crate::storage::audit::record(&$store, &event);
    }};
    ($store:expr, $event_type:expr, $user_id:expr, $resource_type:expr, $resource_id:expr) => {{
        let event = $crate::storage::AuditEvent::new($event_type)
            .with_user($user_id)
            .with_resource($resource_type, $resource_id);
        $crate::storage::audit::record(&$store, &event);
    }};
    ($store:expr, $event_type:expr, $user_id:expr, $resource_type:expr, $resource_id:expr, details = $details:expr) => {{
        let event = $crate::storage::AuditEvent::new($event_type)
            .with_user($user_id)
            .with_resource($resource_type, $resource_id)
            .with_details($details);
        $crate::storage::audit::record(&$store, &event);
    }};
}

/// Write an event, downgrading failure to a warning.
pub fn record(store: &Store, event: &AuditEvent) {
    if let Err(e) = AuditRepository::new(store).log(event) {
        tracing::warn!(
            error = %e,
            event_type = ?event.event_type,
            "Failed to write audit event"
        );
    }
}
