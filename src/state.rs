// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::auth::enrichment::ClaimsEnricher;
use crate::auth::provider::AuthConfig;
use crate::auth::resolver::RoleResolver;
use crate::auth::session::SessionStore;
use crate::storage::{
    CheckpointState, LoginRepository, MaintenanceRepository, RoleRepository, RoleStore, Store,
};

#[derive(Clone)]
pub struct AppState {
    /// Embedded database
    pub store: Arc<Store>,
    /// Role administration surface
    pub roles: Arc<dyn RoleStore>,
    pub logins: LoginRepository,
    pub records: MaintenanceRepository,
    pub enricher: Arc<ClaimsEnricher>,
    pub sessions: Arc<SessionStore>,
    pub auth_config: AuthConfig,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wire every repository and the enrichment pipeline to one store.
    pub fn new(store: Arc<Store>) -> Self {
        let roles: Arc<dyn RoleStore> = Arc::new(RoleRepository::new(store.clone()));
        let logins = LoginRepository::new(store.clone());
        let enricher = ClaimsEnricher::new(
            RoleResolver::new(roles.clone()),
            Arc::new(logins.clone()),
        );

        Self {
            records: MaintenanceRepository::new(store.clone()),
            store,
            roles,
            logins,
            enricher: Arc::new(enricher),
            sessions: Arc::new(SessionStore::default()),
            auth_config: AuthConfig::development(),
            started_at: Utc::now(),
        }
    }

    pub fn with_auth_config(mut self, auth_config: AuthConfig) -> Self {
        self.auth_config = auth_config;
        self
    }

    pub fn checkpoint(&self) -> Arc<CheckpointState> {
        self.store.checkpoint_state()
    }
}
