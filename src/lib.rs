// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Upkeep - Maintenance Record Service
//!
//! A single-instance record-keeping service whose authorization is driven by
//! roles resolved from an embedded database on every request, whichever
//! identity provider issued the caller's token.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token verification, identity extraction and role enrichment
//! - `storage` - redb store, repositories, audit log and checkpoint scheduler
//! - `config` - Environment configuration
//! - `logging` - Structured logging setup

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod state;
pub mod storage;
