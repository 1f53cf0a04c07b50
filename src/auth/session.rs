// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory login sessions.
//!
//! A session holds the enriched principal produced at login. Requests that
//! present the session cookie reuse it until its `roles_enriched_at` marker
//! is older than [`ROLE_REVALIDATION_WINDOW`], after which the principal is
//! re-enriched and replaced. Role changes made by an administrator therefore
//! reach live sessions within that window.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::http::{header::COOKIE, HeaderMap};
use chrono::{DateTime, Utc};
use lru::LruCache;

use super::claims::Principal;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "upkeep_session";

/// Maximum age of enriched roles before a session is re-enriched.
pub const ROLE_REVALIDATION_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Session lifetime.
pub const SESSION_TTL: Duration = Duration::from_secs(8 * 60 * 60);

/// Maximum live sessions; least recently used are evicted first.
pub const SESSION_CAPACITY: usize = 10_000;

/// One login session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub principal: Principal,
    pub created_at: DateTime<Utc>,
    expires_at: Instant,
}

impl Session {
    /// Whether the principal's roles are older than the revalidation window
    /// (or were never enriched).
    pub fn needs_revalidation(&self, now: DateTime<Utc>) -> bool {
        needs_revalidation(&self.principal, now)
    }
}

/// Whether `principal` must be re-enriched before it is trusted again.
pub fn needs_revalidation(principal: &Principal, now: DateTime<Utc>) -> bool {
    match principal.enriched_at() {
        Some(at) => {
            let age = now.signed_duration_since(at).to_std().unwrap_or_default();
            age >= ROLE_REVALIDATION_WINDOW
        }
        None => true,
    }
}

/// LRU session store.
pub struct SessionStore {
    cache: Mutex<LruCache<String, Session>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SESSION_CAPACITY, SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start a session for an enriched principal. Returns the session id.
    pub fn create(&self, principal: Principal) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let session = Session {
            id: id.clone(),
            principal,
            created_at: Utc::now(),
            expires_at: Instant::now() + self.ttl,
        };
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(id.clone(), session);
        }
        id
    }

    /// Look up a live session. Expired sessions are dropped.
    pub fn get(&self, id: &str) -> Option<Session> {
        let mut cache = self.cache.lock().ok()?;
        if let Some(session) = cache.get(id) {
            if session.expires_at > Instant::now() {
                return Some(session.clone());
            }
            cache.pop(id);
        }
        None
    }

    /// Replace the principal of a live session after re-enrichment.
    pub fn replace_principal(&self, id: &str, principal: Principal) -> bool {
        let Ok(mut cache) = self.cache.lock() else {
            return false;
        };
        match cache.get_mut(id) {
            Some(session) => {
                session.principal = principal;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &str) -> bool {
        self.cache
            .lock()
            .map(|mut cache| cache.pop(id).is_some())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Cookie helpers
// =============================================================================

/// `Set-Cookie` value establishing a session.
pub fn session_cookie(id: &str, ttl: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={id}; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age={}",
        ttl.as_secs()
    )
}

/// `Set-Cookie` value clearing the session cookie.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age=0")
}

/// Session id from the request's `Cookie` headers, if present.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
