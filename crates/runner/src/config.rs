// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner settings from environment variables.
//!
//! The original deployment had no command line of its own, so everything
//! is environment-driven:
//!
//! - `QJ_CHANNELS` — channel capacity spec (`root:4,root.sub:2`).
//!   Absent or empty disables the runner entirely.
//! - `QJ_DATABASE_URL` — base Postgres URL without a database path.
//! - `QJ_DB_NAMES` — comma-separated logical database names to watch.
//! - `QJ_PORT` — local port of the job server's runjob endpoint.

use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost:5432";
const DEFAULT_PORT: u16 = 8069;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid QJ_PORT value '{0}'")]
    InvalidPort(String),
}

/// Process-level configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub channels: String,
    pub database_url: String,
    pub db_names: Vec<String>,
    pub port: u16,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup (tests pass a map).
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let channels = var("QJ_CHANNELS").unwrap_or_default();
        let database_url =
            var("QJ_DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let db_names = var("QJ_DB_NAMES")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let port = match var("QJ_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| SettingsError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        Ok(Self { channels, database_url, db_names, port })
    }

    /// True when no channel configuration was provided; the runner must
    /// then never touch a database or claim a job.
    pub fn disabled(&self) -> bool {
        self.channels.trim().is_empty()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
