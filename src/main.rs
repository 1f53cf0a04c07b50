// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use upkeep_server::{
    api::router,
    auth::{roles, AuthConfig, RoleSet},
    config::AppConfig,
    logging,
    state::AppState,
    storage::{audit, AuditEvent, AuditEventType, CheckpointScheduler, CheckpointState, RoleGrant, Store},
};

#[tokio::main]
async fn main() {
    logging::init_tracing();

    let config = AppConfig::from_env().expect("Invalid configuration");

    let checkpoint = Arc::new(CheckpointState::new());
    let store = Arc::new(
        Store::open(&config.database_path(), checkpoint.clone()).expect("Failed to open database"),
    );

    let auth_config = AuthConfig::from_providers(&config.providers);
    if auth_config.is_development() {
        warn!("No identity providers configured: accepting unsigned tokens (development mode)");
    } else {
        let names: Vec<&str> = auth_config.providers().iter().map(|p| p.name.as_str()).collect();
        info!(providers = ?names, "Identity providers configured");
    }

    let state = AppState::new(store.clone()).with_auth_config(auth_config);

    if let Some(identifier) = config.seed_admin.as_deref() {
        seed_admin(&state, identifier);
    }

    let shutdown = CancellationToken::new();
    let scheduler = CheckpointScheduler::new(store.clone(), checkpoint)
        .with_interval(config.checkpoint_interval);
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown.clone()));

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind listen address");
    info!(%addr, "Upkeep server listening (docs at /docs)");

    if let Err(e) = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "HTTP server failed");
    }

    // Requests have drained; the scheduler's final flush persists what they wrote.
    shutdown.cancel();
    if let Err(e) = scheduler_handle.await {
        error!(error = %e, "Checkpoint scheduler task failed");
    }
    info!("Shutdown complete");
}

/// Grant `admin` and `canLogin` to the configured identifier.
fn seed_admin(state: &AppState, identifier: &str) {
    let identifier_type = if identifier.contains('@') { "email" } else { "sub" };
    let roles: RoleSet = [roles::ADMIN, roles::CAN_LOGIN].into_iter().collect();

    match state.roles.add_roles(RoleGrant {
        identifier: identifier.to_string(),
        identifier_type: identifier_type.to_string(),
        roles,
        display_name: None,
        provider: None,
    }) {
        Ok(assignment) => {
            info!(identifier = %assignment.user_identifier, "Seed admin granted");
            let event = AuditEvent::new(AuditEventType::AdminSeeded)
                .with_resource("role_assignment", assignment.user_identifier);
            audit::record(&state.store, &event);
        }
        Err(e) => error!(error = %e, "Failed to seed admin"),
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining requests");
}
