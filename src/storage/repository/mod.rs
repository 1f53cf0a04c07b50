// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the embedded database.
//!
//! Each repository owns one table and serializes its entities as JSON.

pub mod logins;
pub mod maintenance;
pub mod roles;

pub use logins::{LoginRecord, LoginRepository, LoginTracker};
pub use maintenance::{MaintenanceRecord, MaintenanceRepository, MaintenanceStatus};
pub use roles::{RoleAssignment, RoleGrant, RoleRepository, RoleStore};
