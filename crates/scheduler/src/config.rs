// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Channel configuration string parsing.
//!
//! The runner is configured with a single string of the form
//! `root:4,root.sub:2`. Each entry names a channel by its dot-separated
//! path and sets its capacity (max concurrent enqueued/started jobs).

use thiserror::Error;

/// Name of the tree root; every channel path hangs under it.
pub const ROOT_CHANNEL: &str = "root";

/// One parsed `name:capacity` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    /// Full dot-separated path, starting with `root`.
    pub name: String,
    pub capacity: usize,
}

/// Malformed channel configuration. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("malformed channel entry '{0}': expected name:capacity")]
    Malformed(String),

    #[error("invalid capacity in channel entry '{0}'")]
    BadCapacity(String),

    #[error("empty channel name segment in '{0}'")]
    EmptySegment(String),

    #[error("channel '{0}' is not under the root channel")]
    NotUnderRoot(String),

    #[error("duplicate channel '{0}'")]
    Duplicate(String),
}

/// Parse a channel configuration string into channel specs.
///
/// Entries are comma separated; whitespace around entries is ignored and
/// empty entries (trailing commas) are skipped. Paths must start with
/// `root` and contain no empty segments. Duplicate names are rejected.
pub fn parse_channel_config(config: &str) -> Result<Vec<ChannelSpec>, ConfigError> {
    let mut specs: Vec<ChannelSpec> = Vec::new();

    for entry in config.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let (name, capacity) = entry
            .split_once(':')
            .ok_or_else(|| ConfigError::Malformed(entry.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::Malformed(entry.to_string()));
        }
        let capacity: usize = capacity
            .trim()
            .parse()
            .map_err(|_| ConfigError::BadCapacity(entry.to_string()))?;

        if name.split('.').any(str::is_empty) {
            return Err(ConfigError::EmptySegment(name.to_string()));
        }
        if name != ROOT_CHANNEL && !name.starts_with("root.") {
            return Err(ConfigError::NotUnderRoot(name.to_string()));
        }
        if specs.iter().any(|s| s.name == name) {
            return Err(ConfigError::Duplicate(name.to_string()));
        }

        specs.push(ChannelSpec { name: name.to_string(), capacity });
    }

    Ok(specs)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
