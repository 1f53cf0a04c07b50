// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `role_assignments`: normalized identifier → serialized RoleAssignment
//! - `login_records`: normalized identifier → serialized LoginRecord
//! - `maintenance_records`: record id → serialized MaintenanceRecord
//! - `audit_events`: inverted timestamp | event id → serialized AuditEvent
//!
//! ## Durability
//!
//! Repository writes go through [`Store::write`], which commits with
//! `Durability::None` and then marks the shared [`CheckpointState`] dirty.
//! Those commits are visible to every later read transaction but are only
//! persisted by the next [`Store::flush`], an empty `Durability::Immediate`
//! commit issued by the checkpoint scheduler.

use std::path::Path;
use std::sync::Arc;

use redb::{
    Database, Durability, ReadTransaction, ReadableDatabase, TableDefinition, WriteTransaction,
};

use super::checkpoint::{Checkpoint, CheckpointState};

// =============================================================================
// Table Definitions
// =============================================================================

/// Role assignments keyed by normalized identifier (JSON bytes).
pub(crate) const ROLE_ASSIGNMENTS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("role_assignments");

/// Login tracking keyed by normalized identifier (JSON bytes).
pub(crate) const LOGIN_RECORDS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("login_records");

/// Maintenance records keyed by record id (JSON bytes).
pub(crate) const MAINTENANCE_RECORDS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("maintenance_records");

/// Audit events keyed by `!timestamp_be | event_id` for newest-first scans.
pub(crate) const AUDIT_EVENTS: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("audit_events");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("redb durability error: {0}")]
    RedbDurability(#[from] redb::SetDurabilityError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Store
// =============================================================================

/// Handle to the embedded database shared by every repository.
pub struct Store {
    db: Database,
    checkpoint: Arc<CheckpointState>,
}

impl Store {
    /// Open (or create) the database at the given path.
    ///
    /// Table creation is committed durably so a fresh database survives a
    /// crash before the first checkpoint.
    pub fn open(path: &Path, checkpoint: Arc<CheckpointState>) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ROLE_ASSIGNMENTS)?;
            let _ = write_txn.open_table(LOGIN_RECORDS)?;
            let _ = write_txn.open_table(MAINTENANCE_RECORDS)?;
            let _ = write_txn.open_table(AUDIT_EVENTS)?;
        }
        write_txn.commit()?;

        tracing::info!(path = %path.display(), "Database opened");

        Ok(Self { db, checkpoint })
    }

    /// Shared checkpoint state this store reports writes to.
    pub fn checkpoint_state(&self) -> Arc<CheckpointState> {
        self.checkpoint.clone()
    }

    /// Run `f` inside a read transaction.
    pub fn read<T>(&self, f: impl FnOnce(&ReadTransaction) -> StoreResult<T>) -> StoreResult<T> {
        let read_txn = self.db.begin_read()?;
        f(&read_txn)
    }

    /// Run `f` inside a buffered write transaction.
    ///
    /// The transaction is aborted if `f` fails. On commit the checkpoint
    /// state is marked dirty.
    pub fn write<T>(&self, f: impl FnOnce(&WriteTransaction) -> StoreResult<T>) -> StoreResult<T> {
        let mut write_txn = self.db.begin_write()?;
        write_txn.set_durability(Durability::None)?;

        let value = match f(&write_txn) {
            Ok(value) => value,
            Err(e) => {
                if let Err(abort_err) = write_txn.abort() {
                    tracing::warn!(error = %abort_err, "Failed to abort write transaction");
                }
                return Err(e);
            }
        };

        write_txn.commit()?;
        self.checkpoint.mark_dirty();
        Ok(value)
    }

    /// Make every buffered commit durable.
    pub fn flush(&self) -> StoreResult<()> {
        let mut write_txn = self.db.begin_write()?;
        write_txn.set_durability(Durability::Immediate)?;
        write_txn.commit()?;
        Ok(())
    }

    /// Verify the database answers read transactions.
    pub fn health_check(&self) -> StoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(ROLE_ASSIGNMENTS)?;
        Ok(())
    }
}

impl Checkpoint for Store {
    fn flush(&self) -> StoreResult<()> {
        Store::flush(self)
    }
}

// =============================================================================
// Tests
// =============================================================================
