// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup. Invalid
//! values abort startup rather than falling back to defaults.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory holding `upkeep.redb` | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `CHECKPOINT_INTERVAL_SECONDS` | Seconds between checkpoint ticks | `5` |
//! | `AUTH_PROVIDERS` | Comma-separated provider names; empty means development mode | empty |
//! | `AUTH_<NAME>_ISSUER` | Expected `iss` for provider `<NAME>` | Required per provider |
//! | `AUTH_<NAME>_JWKS_URL` | JWKS endpoint for provider `<NAME>` | Required per provider |
//! | `AUTH_<NAME>_AUDIENCE` | Expected `aud` for provider `<NAME>` | Optional |
//! | `SEED_ADMIN` | Identifier granted `admin` and `canLogin` at startup | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use crate::storage::checkpoint::DEFAULT_CHECKPOINT_INTERVAL;

/// Environment variable name for the data directory.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const CHECKPOINT_INTERVAL_ENV: &str = "CHECKPOINT_INTERVAL_SECONDS";
pub const AUTH_PROVIDERS_ENV: &str = "AUTH_PROVIDERS";
pub const SEED_ADMIN_ENV: &str = "SEED_ADMIN";

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Database file name inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "upkeep.redb";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: String,
        value: String,
        expected: &'static str,
    },

    #[error("provider {provider:?} is listed in AUTH_PROVIDERS but {var} is not set")]
    MissingProviderSetting { provider: String, var: String },
}

/// Verification settings of one identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Lowercase provider name
    pub name: String,
    pub issuer: String,
    pub jwks_url: String,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub checkpoint_interval: Duration,
    /// Empty in development mode
    pub providers: Vec<ProviderConfig>,
    pub seed_admin: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| {
            lookup(var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port = match get(PORT_ENV) {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
                var: PORT_ENV.to_string(),
                value: raw,
                expected: "a port number",
            })?,
            None => DEFAULT_PORT,
        };

        let checkpoint_interval = match get(CHECKPOINT_INTERVAL_ENV) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        var: CHECKPOINT_INTERVAL_ENV.to_string(),
                        value: raw,
                        expected: "a positive number of seconds",
                    })
                }
            },
            None => DEFAULT_CHECKPOINT_INTERVAL,
        };

        let mut providers = Vec::new();
        for name in get(AUTH_PROVIDERS_ENV).unwrap_or_default().split(',') {
            let name = name.trim().to_lowercase();
            if name.is_empty() {
                continue;
            }
            let prefix = format!("AUTH_{}", name.to_uppercase().replace('-', "_"));
            let required = |suffix: &str| {
                let var = format!("{prefix}_{suffix}");
                get(&var).ok_or(ConfigError::MissingProviderSetting {
                    provider: name.clone(),
                    var,
                })
            };

            providers.push(ProviderConfig {
                issuer: required("ISSUER")?,
                jwks_url: required("JWKS_URL")?,
                audience: get(&format!("{prefix}_AUDIENCE")),
                name,
            });
        }

        Ok(Self {
            data_dir: PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.into())),
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            checkpoint_interval,
            providers,
            seed_admin: get(SEED_ADMIN_ENV),
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
