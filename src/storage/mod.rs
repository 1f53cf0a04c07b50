// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state lives in a single redb database under `DATA_DIR`.
//!
//! ## Write Path
//!
//! ```text
//! repository ──▶ Store::write ──▶ commit (Durability::None) ──▶ mark_dirty
//!                                                                   │
//! CheckpointScheduler ◀── every CHECKPOINT_INTERVAL_SECONDS ◀──────┘
//!        └──▶ Store::flush (Durability::Immediate)
//! ```
//!
//! Buffered commits are visible to readers immediately. A crash loses at
//! most the writes made since the last successful checkpoint; a graceful
//! shutdown always ends with a final checkpoint.

pub mod audit;
pub mod checkpoint;
pub mod database;
pub mod ownership;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use checkpoint::{Checkpoint, CheckpointScheduler, CheckpointState, TickOutcome};
pub use database::{Store, StoreError, StoreResult};
pub use ownership::{OwnedResource, OwnershipCheck};
pub use repository::{
    LoginRecord, LoginRepository, LoginTracker, MaintenanceRecord, MaintenanceRepository,
    MaintenanceStatus, RoleAssignment, RoleGrant, RoleRepository, RoleStore,
};
