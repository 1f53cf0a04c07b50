// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted role resolution.
//!
//! Which identifiers to try is decided by [`super::identifiers`]; how to
//! query them is decided by the [`RoleStore`]. This type only connects the
//! two.

use std::sync::Arc;

use super::identifiers::IdentityCandidate;
use super::roles::RoleSet;
use crate::storage::{RoleStore, StoreResult};

#[derive(Clone)]
pub struct RoleResolver {
    store: Arc<dyn RoleStore>,
}

impl RoleResolver {
    pub fn new(store: Arc<dyn RoleStore>) -> Self {
        Self { store }
    }

    /// Persisted roles for the first assignment matching `candidates`.
    ///
    /// No match is an empty set, not an error. Store failures are returned
    /// so the caller decides how to degrade.
    pub fn resolve(&self, candidates: &[IdentityCandidate]) -> StoreResult<RoleSet> {
        Ok(self
            .store
            .get_by_any_identifier(candidates)?
            .map(|assignment| assignment.roles)
            .unwrap_or_default())
    }
}
