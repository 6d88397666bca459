// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job-executor adapter: asks an external server to run a job by id.
//!
//! Dispatch is best-effort with a short timeout. Any non-success means
//! "assume the job never started"; the runner reverts it to pending and
//! the next scheduling pass retries. This is at-least-once: a job that
//! did start server-side despite the timeout may run twice, and the
//! executor is expected to guard against that (idempotent jobs or a
//! started-state check), not the scheduler.

use async_trait::async_trait;
use qj_core::JobId;
use std::time::Duration;
use thiserror::Error;

/// Dispatch failure. Per-job and recoverable: the affected job is
/// reverted to pending and retried on a later pass.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("executor request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// Runs a job by identifier on behalf of the scheduler.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn run_job(&self, db_name: &str, id: &JobId) -> Result<(), ExecError>;
}

/// HTTP executor hitting the job server's anonymous runjob endpoint.
pub struct HttpExecutor {
    client: reqwest::Client,
    port: u16,
}

impl HttpExecutor {
    /// Timeout kept short: we only care whether the request was accepted,
    /// not about the job's outcome.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

    pub fn new(port: u16) -> Result<Self, ExecError> {
        let client = reqwest::Client::builder().timeout(Self::REQUEST_TIMEOUT).build()?;
        Ok(Self { client, port })
    }
}

#[async_trait]
impl JobExecutor for HttpExecutor {
    async fn run_job(&self, db_name: &str, id: &JobId) -> Result<(), ExecError> {
        let url = format!(
            "http://localhost:{}/queue_job/runjob?db={}&job_uuid={}",
            self.port, db_name, id
        );
        let response = self.client.get(&url).send().await?;
        response.error_for_status()?;
        Ok(())
    }
}
