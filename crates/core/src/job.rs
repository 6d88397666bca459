// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queued job snapshot and state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a queued job (the upstream row's uuid).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new JobId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string value of this JobId.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// State of a queued job as recorded in durable storage.
///
/// Everything except `Done` is "not done" and stays tracked in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting to be dispatched
    Pending,
    /// Claimed by the runner, dispatch issued
    Enqueued,
    /// Executor reported the job as running
    Started,
    /// Finished successfully; dropped from memory
    Done,
    /// Finished with an error; kept in memory but never dispatched
    Failed,
}

impl JobState {
    /// True once the job has completed successfully.
    pub fn is_done(self) -> bool {
        matches!(self, JobState::Done)
    }

    /// True while the job counts against channel capacity.
    pub fn is_running(self) -> bool {
        matches!(self, JobState::Enqueued | JobState::Started)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Enqueued => "enqueued",
            JobState::Started => "started",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized state string from durable storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job state: {0}")]
pub struct UnknownState(pub String);

impl FromStr for JobState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobState::Pending),
            "enqueued" => Ok(JobState::Enqueued),
            "started" => Ok(JobState::Started),
            "done" => Ok(JobState::Done),
            "failed" => Ok(JobState::Failed),
            other => Err(UnknownState(other.to_string())),
        }
    }
}

/// Dispatch ordering key: priority first (lower runs sooner), then
/// creation time, then the storage sequence as the final tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey {
    pub priority: i32,
    pub date_created: DateTime<Utc>,
    pub seq: i64,
}

/// Immutable snapshot of one queued unit of work.
///
/// Mirrors the scheduling attributes of the upstream `queue_job` row.
/// The runner never mutates these fields in place; a changed row arrives
/// as a fresh snapshot through a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Logical database the job belongs to.
    pub db_name: String,
    /// Dot-separated channel path (e.g. "root.sub"); empty means root.
    pub channel: Option<String>,
    /// Monotonic creation sequence from durable storage.
    pub seq: i64,
    pub date_created: DateTime<Utc>,
    /// Lower value = higher priority.
    pub priority: i32,
    /// Not-before timestamp; the job is ineligible until this passes.
    pub eta: Option<DateTime<Utc>>,
    pub state: JobState,
}

impl Job {
    pub fn sort_key(&self) -> SortKey {
        SortKey { priority: self.priority, date_created: self.date_created, seq: self.seq }
    }

    /// True if the job may be dispatched at `now` (eta elapsed or unset).
    pub fn eta_ready(&self, now: DateTime<Utc>) -> bool {
        self.eta.map_or(true, |eta| eta <= now)
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
