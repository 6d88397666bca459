// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification-source adapter traits.
//!
//! A [`JobSource`] wraps one logical database: it exposes the durable job
//! set, per-job lookups, the enqueued/pending state transitions, and a
//! change-notification stream. A [`SourceConnector`] opens sources by
//! database name so the runner can rebuild every connection from scratch
//! during recovery.

use async_trait::async_trait;
use qj_core::{Job, JobId};
use thiserror::Error;
use tokio::sync::mpsc;

/// Event pushed by a source's notification stream into the runner loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// Something about this job changed (insert, update or delete).
    /// The runner re-reads the row to find out what.
    JobChanged { db_name: String, job_id: JobId },
    /// The notification stream broke; the runner must reinitialize.
    ConnectionLost { db_name: String },
}

/// Notification-source failures. All of these are recoverable: the runner
/// tears every connection down and reinitializes after a delay.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("notification stream lost for db {0}")]
    ConnectionLost(String),

    #[error("notification channel closed")]
    StreamClosed,

    #[error("{0}")]
    Other(String),
}

/// One logical database holding a job queue.
#[async_trait]
pub trait JobSource: Send + Sync {
    fn db_name(&self) -> &str;

    /// Capability probe: does this database have the job queue installed?
    /// Databases without it are never subscribed to.
    async fn has_queue(&self) -> Result<bool, SourceError>;

    /// Subscribe to job-change notifications, forwarding them into `tx`.
    /// Called once per connection, before the initial job sync.
    async fn start_listening(&self, tx: mpsc::Sender<SourceEvent>) -> Result<(), SourceError>;

    /// All jobs whose state is not done, with their scheduling attributes.
    async fn list_not_done(&self) -> Result<Vec<Job>, SourceError>;

    /// Current snapshot of one job; `None` if the row no longer exists.
    async fn fetch_job(&self, id: &JobId) -> Result<Option<Job>, SourceError>;

    /// Durably mark a job enqueued. Must complete before dispatch.
    async fn set_enqueued(&self, id: &JobId) -> Result<(), SourceError>;

    /// Revert an enqueued job to pending after a failed dispatch. Guarded
    /// on the enqueued state so a job that already started is untouched.
    async fn revert_enqueued(&self, id: &JobId) -> Result<(), SourceError>;

    /// Release the connection and stop the notification stream.
    async fn close(&self);
}

/// Opens [`JobSource`]s by database name.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    type Source: JobSource + Send + Sync + 'static;

    async fn connect(&self, db_name: &str) -> Result<Self::Source, SourceError>;
}
