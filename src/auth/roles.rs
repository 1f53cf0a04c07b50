// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role names and role sets.
//!
//! Roles are free-form strings: providers assert whatever their directory
//! holds, and administrators grant whatever the application checks. Two
//! spellings that differ only in case are the same role.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Full administrative access, including role administration.
pub const ADMIN: &str = "admin";

/// Permission to use the application at all.
pub const CAN_LOGIN: &str = "canLogin";

/// Where an effective role came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RoleOrigin {
    /// Asserted by the identity provider in the token.
    Provider,
    /// Granted through the role store.
    Internal,
}

impl RoleOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleOrigin::Provider => "provider",
            RoleOrigin::Internal => "internal",
        }
    }

    pub fn parse(s: &str) -> Option<RoleOrigin> {
        match s {
            "provider" => Some(RoleOrigin::Provider),
            "internal" => Some(RoleOrigin::Internal),
            _ => None,
        }
    }
}

impl std::fmt::Display for RoleOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered set of role names with case-insensitive uniqueness.
///
/// The first spelling inserted is the one kept. Serialized as a JSON array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct RoleSet(Vec<String>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a role. Returns `false` for blank names and roles already present.
    pub fn insert(&mut self, role: &str) -> bool {
        let role = role.trim();
        if role.is_empty() || self.contains(role) {
            return false;
        }
        self.0.push(role.to_string());
        true
    }

    /// Remove a role regardless of case. Returns whether it was present.
    pub fn remove(&mut self, role: &str) -> bool {
        let before = self.0.len();
        let key = role.trim().to_lowercase();
        self.0.retain(|existing| existing.to_lowercase() != key);
        self.0.len() != before
    }

    /// Membership under Unicode lowercase folding, the same folding
    /// identifiers get.
    pub fn contains(&self, role: &str) -> bool {
        let key = role.trim().to_lowercase();
        self.0.iter().any(|existing| existing.to_lowercase() == key)
    }

    /// Roles of `self` followed by the roles of `other` not already present.
    pub fn union(&self, other: &RoleSet) -> RoleSet {
        let mut merged = self.clone();
        merged.extend(other.iter());
        merged
    }

    /// Roles of `self` that are not in `other`.
    pub fn difference(&self, other: &RoleSet) -> RoleSet {
        self.iter().filter(|role| !other.contains(role)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl PartialEq for RoleSet {
    /// Set equality, ignoring order and case.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|role| other.contains(role))
    }
}

impl Eq for RoleSet {}

impl<'a> Extend<&'a str> for RoleSet {
    fn extend<I: IntoIterator<Item = &'a str>>(&mut self, iter: I) {
        for role in iter {
            self.insert(role);
        }
    }
}

impl<'a> FromIterator<&'a str> for RoleSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = RoleSet::new();
        set.extend(iter);
        set
    }
}

impl From<Vec<String>> for RoleSet {
    fn from(roles: Vec<String>) -> Self {
        roles.iter().map(String::as_str).collect()
    }
}

impl From<RoleSet> for Vec<String> {
    fn from(set: RoleSet) -> Self {
        set.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(roles: &[&str]) -> RoleSet {
        roles.iter().copied().collect()
    }

    #[test]
    fn insert_is_case_insensitive_and_keeps_first_spelling() {
        let mut roles = RoleSet::new();
        assert!(roles.insert("Admin"));
        assert!(!roles.insert("admin"));
        assert!(!roles.insert("  ADMIN "));
        assert_eq!(roles.len(), 1);
        assert_eq!(roles.iter().collect::<Vec<_>>(), vec!["Admin"]);

        let roles = set(&["Ärzte", "ärzte", "ÄRZTE"]);
        assert_eq!(roles.len(), 1);
        assert!(roles.contains("ärzte"));
    }

    #[test]
    fn remove_folds_non_ascii_case() {
        let mut roles = set(&["Ärzte", "canLogin"]);
        assert!(roles.remove("ÄRZTE"));
        assert_eq!(roles.iter().collect::<Vec<_>>(), vec!["canLogin"]);
    }

    #[test]
    fn blank_roles_are_ignored() {
        let roles = set(&["", "  ", "canLogin"]);
        assert_eq!(roles.into_vec(), vec!["canLogin".to_string()]);
    }

    #[test]
    fn union_is_idempotent() {
        let a = set(&["canLogin", "editor"]);
        let b = set(&["Editor", "admin"]);

        let once = a.union(&b);
        let twice = once.union(&b);
        assert_eq!(once, twice);
        assert_eq!(once, set(&["canLogin", "editor", "admin"]));
    }

    #[test]
    fn remove_ignores_case() {
        let mut roles = set(&["canLogin", "Admin"]);
        assert!(roles.remove("ADMIN"));
        assert!(!roles.remove("admin"));
        assert_eq!(roles, set(&["canlogin"]));
    }

    #[test]
    fn equality_ignores_order() {
        assert_eq!(set(&["a", "b"]), set(&["B", "A"]));
        assert_ne!(set(&["a"]), set(&["a", "b"]));
    }

    #[test]
    fn difference_keeps_only_missing_roles() {
        let provider = set(&["canLogin", "viewer"]);
        let persisted = set(&["viewer"]);
        assert_eq!(provider.difference(&persisted), set(&["canLogin"]));
    }

    #[test]
    fn deserialization_deduplicates() {
        let roles: RoleSet = serde_json::from_str(r#"["Admin","admin","canLogin"]"#).unwrap();
        assert_eq!(roles.len(), 2);
        assert_eq!(serde_json::to_string(&roles).unwrap(), r#"["Admin","canLogin"]"#);
    }

    #[test]
    fn origin_round_trips_through_strings() {
        assert_eq!(RoleOrigin::parse("provider"), Some(RoleOrigin::Provider));
        assert_eq!(RoleOrigin::parse(RoleOrigin::Internal.as_str()), Some(RoleOrigin::Internal));
        assert_eq!(RoleOrigin::parse("other"), None);
    }
}
