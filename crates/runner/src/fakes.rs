// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory fake adapters for runner tests.
//!
//! [`FakeDb`] stands in for one database: it stores job rows and mirrors
//! the notification trigger by pushing a change event whenever a row is
//! written through it.

use crate::executor::{ExecError, JobExecutor};
use crate::source::{JobSource, SourceConnector, SourceError, SourceEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use qj_core::{Job, JobId, JobState};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Default)]
struct FakeDbState {
    jobs: HashMap<JobId, Job>,
    has_queue: bool,
    fail_connect: bool,
    tx: Option<mpsc::Sender<SourceEvent>>,
    enqueued: Vec<JobId>,
    reverted: Vec<JobId>,
}

/// Shared in-memory database, handed to both the test and the source.
#[derive(Clone)]
pub struct FakeDb {
    name: String,
    inner: Arc<Mutex<FakeDbState>>,
}

impl FakeDb {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(FakeDbState { has_queue: true, ..Default::default() })),
        }
    }

    /// Write a row and emit the change notification (like the trigger).
    pub fn insert_job(&self, job: Job) {
        let id = job.id.clone();
        self.inner.lock().jobs.insert(id.clone(), job);
        self.emit(&id);
    }

    /// Delete a row; subscribers get a now-stale notification.
    pub fn delete_job(&self, id: &JobId) {
        self.inner.lock().jobs.remove(id);
        self.emit(id);
    }

    pub fn job_state(&self, id: &JobId) -> Option<JobState> {
        self.inner.lock().jobs.get(id).map(|j| j.state)
    }

    pub fn set_has_queue(&self, has_queue: bool) {
        self.inner.lock().has_queue = has_queue;
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.inner.lock().fail_connect = fail;
    }

    /// Simulate the notification stream breaking.
    pub fn break_connection(&self) {
        let tx = self.inner.lock().tx.clone();
        if let Some(tx) = tx {
            let _ = tx.try_send(SourceEvent::ConnectionLost { db_name: self.name.clone() });
        }
    }

    pub fn enqueued(&self) -> Vec<JobId> {
        self.inner.lock().enqueued.clone()
    }

    pub fn reverted(&self) -> Vec<JobId> {
        self.inner.lock().reverted.clone()
    }

    fn emit(&self, id: &JobId) {
        let tx = self.inner.lock().tx.clone();
        if let Some(tx) = tx {
            let _ = tx.try_send(SourceEvent::JobChanged {
                db_name: self.name.clone(),
                job_id: id.clone(),
            });
        }
    }
}

/// Source adapter over a [`FakeDb`].
pub struct FakeJobSource {
    db: FakeDb,
}

#[async_trait]
impl JobSource for FakeJobSource {
    fn db_name(&self) -> &str {
        &self.db.name
    }

    async fn has_queue(&self) -> Result<bool, SourceError> {
        Ok(self.db.inner.lock().has_queue)
    }

    async fn start_listening(&self, tx: mpsc::Sender<SourceEvent>) -> Result<(), SourceError> {
        self.db.inner.lock().tx = Some(tx);
        Ok(())
    }

    async fn list_not_done(&self) -> Result<Vec<Job>, SourceError> {
        Ok(self
            .db
            .inner
            .lock()
            .jobs
            .values()
            .filter(|j| !j.state.is_done())
            .cloned()
            .collect())
    }

    async fn fetch_job(&self, id: &JobId) -> Result<Option<Job>, SourceError> {
        Ok(self.db.inner.lock().jobs.get(id).cloned())
    }

    async fn set_enqueued(&self, id: &JobId) -> Result<(), SourceError> {
        {
            let mut state = self.db.inner.lock();
            if let Some(job) = state.jobs.get_mut(id) {
                job.state = JobState::Enqueued;
            }
            state.enqueued.push(id.clone());
        }
        self.db.emit(id);
        Ok(())
    }

    async fn revert_enqueued(&self, id: &JobId) -> Result<(), SourceError> {
        {
            let mut state = self.db.inner.lock();
            match state.jobs.get_mut(id) {
                Some(job) if job.state == JobState::Enqueued => {
                    job.state = JobState::Pending;
                    state.reverted.push(id.clone());
                }
                _ => return Ok(()),
            }
        }
        self.db.emit(id);
        Ok(())
    }

    async fn close(&self) {
        self.db.inner.lock().tx = None;
    }
}

#[derive(Default)]
struct FakeConnectorState {
    dbs: HashMap<String, FakeDb>,
    connects: usize,
}

/// Connector over a set of [`FakeDb`]s, counting connection attempts.
#[derive(Clone, Default)]
pub struct FakeConnector {
    inner: Arc<Mutex<FakeConnectorState>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_db(&self, db: FakeDb) {
        self.inner.lock().dbs.insert(db.name.clone(), db);
    }

    pub fn connect_count(&self) -> usize {
        self.inner.lock().connects
    }
}

#[async_trait]
impl SourceConnector for FakeConnector {
    type Source = FakeJobSource;

    async fn connect(&self, db_name: &str) -> Result<FakeJobSource, SourceError> {
        let db = {
            let mut state = self.inner.lock();
            state.connects += 1;
            state
                .dbs
                .get(db_name)
                .cloned()
                .ok_or_else(|| SourceError::Other(format!("unknown database {db_name}")))?
        };
        if db.inner.lock().fail_connect {
            return Err(SourceError::Other(format!("connect refused for {db_name}")));
        }
        Ok(FakeJobSource { db })
    }
}

#[derive(Default)]
struct FakeExecutorState {
    calls: Vec<(String, JobId)>,
    fail: bool,
}

/// Executor recording dispatches, optionally failing them all.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    inner: Arc<Mutex<FakeExecutorState>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.inner.lock().fail = fail;
    }

    pub fn calls(&self) -> Vec<(String, JobId)> {
        self.inner.lock().calls.clone()
    }
}

#[async_trait]
impl JobExecutor for FakeExecutor {
    async fn run_job(&self, db_name: &str, id: &JobId) -> Result<(), ExecError> {
        let mut state = self.inner.lock();
        if state.fail {
            return Err(ExecError::Other("executor unavailable".to_string()));
        }
        state.calls.push((db_name.to_string(), id.clone()));
        Ok(())
    }
}
