// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ownership enforcement for user-owned records.
//!
//! A record owned by someone else is reported exactly like a missing one,
//! so callers cannot probe for other users' record ids.

use crate::auth::AuthenticatedUser;

use super::database::{StoreError, StoreResult};

/// Trait for resources that have an owner.
pub trait OwnedResource {
    /// Normalized primary identifier of the owner.
    fn owner_identifier(&self) -> &str;

    fn is_owned_by(&self, user: &AuthenticatedUser) -> bool {
        self.owner_identifier() == user.user_id
    }
}

/// Turn a lookup result into "found and owned by `user`" or `NotFound`.
pub trait OwnershipCheck<T> {
    fn owned_by(self, user: &AuthenticatedUser, id: &str) -> StoreResult<T>;
}

impl<T: OwnedResource> OwnershipCheck<T> for Option<T> {
    fn owned_by(self, user: &AuthenticatedUser, id: &str) -> StoreResult<T> {
        match self {
            Some(resource) if resource.is_owned_by(user) => Ok(resource),
            _ => Err(StoreError::NotFound(id.to_string())),
        }
    }
}
