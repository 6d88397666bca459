// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runner loop.
//!
//! Single coordinating task: it seeds the channel manager from durable
//! state, drains change notifications, asks the manager which jobs may
//! run, persists the enqueued transition, and fires dispatches without
//! waiting on them. Connection trouble tears everything down and starts
//! over after a short delay; only a malformed channel configuration is
//! fatal.

use crate::executor::JobExecutor;
use crate::source::{JobSource, SourceConnector, SourceError, SourceEvent};
use qj_core::{Clock, Job};
use qj_scheduler::{ChannelManager, ConfigError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runner loop configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Channel capacity specification, e.g. `root:4,root.sub:2`.
    /// Empty disables the runner entirely.
    pub channels: String,
    /// Logical databases to watch.
    pub db_names: Vec<String>,
    /// Upper bound on one wait; bounds the eta re-check latency.
    pub select_timeout: Duration,
    /// Sleep between teardown and reinitialization after an error.
    pub recovery_delay: Duration,
}

impl RunnerConfig {
    pub const SELECT_TIMEOUT: Duration = Duration::from_secs(60);
    pub const ERROR_RECOVERY_DELAY: Duration = Duration::from_secs(5);

    pub fn new(channels: impl Into<String>, db_names: Vec<String>) -> Self {
        Self {
            channels: channels.into(),
            db_names,
            select_timeout: Self::SELECT_TIMEOUT,
            recovery_delay: Self::ERROR_RECOVERY_DELAY,
        }
    }
}

/// Observable lifecycle state of the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Initializing,
    Ready,
    Stopping,
    Stopped,
}

/// Coordinates sources, the channel manager and the executor.
pub struct Runner<C: SourceConnector, E, K> {
    config: RunnerConfig,
    connector: C,
    executor: Arc<E>,
    clock: K,
    manager: ChannelManager,
    sources: HashMap<String, Arc<C::Source>>,
    events_tx: mpsc::Sender<SourceEvent>,
    events_rx: mpsc::Receiver<SourceEvent>,
    cancel: CancellationToken,
    state: RunnerState,
}

impl<C, E, K> Runner<C, E, K>
where
    C: SourceConnector,
    E: JobExecutor + 'static,
    K: Clock,
{
    /// Create a runner. Fails only on a malformed channel configuration,
    /// which aborts process start.
    pub fn new(
        config: RunnerConfig,
        connector: C,
        executor: E,
        clock: K,
        cancel: CancellationToken,
    ) -> Result<Self, ConfigError> {
        let mut manager = ChannelManager::new();
        manager.configure(&config.channels)?;
        let (events_tx, events_rx) = mpsc::channel(1024);
        Ok(Self {
            config,
            connector,
            executor: Arc::new(executor),
            clock,
            manager,
            sources: HashMap::new(),
            events_tx,
            events_rx,
            cancel,
            state: RunnerState::Initializing,
        })
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until cancelled. The outer loop does error recovery: any
    /// source failure discards all in-memory state, closes every
    /// connection, sleeps, and reinitializes from durable state.
    pub async fn run(&mut self) {
        if self.config.channels.trim().is_empty() {
            info!("no channels configured, job runner disabled");
            self.state = RunnerState::Stopped;
            return;
        }

        info!("starting");
        while !self.cancel.is_cancelled() {
            self.state = RunnerState::Initializing;
            if let Err(err) = self.cycle().await {
                warn!(
                    error = %err,
                    delay_secs = self.config.recovery_delay.as_secs(),
                    "runner error, reinitializing after delay"
                );
                self.close_databases(true).await;
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.config.recovery_delay) => {}
                }
            }
        }
        self.state = RunnerState::Stopping;
        // Enqueued bookkeeping is deliberately left in place; the next
        // startup reconciles it from durable state.
        self.close_databases(false).await;
        self.state = RunnerState::Stopped;
        info!("stopped");
    }

    /// One initialize-then-serve cycle. Returns `Ok(())` only on stop.
    async fn cycle(&mut self) -> Result<(), SourceError> {
        info!("initializing database connections");
        self.initialize().await?;
        self.state = RunnerState::Ready;
        info!("database connections ready");

        while !self.cancel.is_cancelled() {
            self.drain_notifications().await?;
            self.run_jobs().await?;
            self.wait_notification().await?;
        }
        Ok(())
    }

    /// Connect each database, install its notification stream, and seed
    /// the channel manager with its not-done jobs.
    pub(crate) async fn initialize(&mut self) -> Result<(), SourceError> {
        for db_name in self.config.db_names.clone() {
            let source = self.connector.connect(&db_name).await?;
            if !source.has_queue().await? {
                debug!(db = %db_name, "job queue not installed, skipping");
                continue;
            }
            source.start_listening(self.events_tx.clone()).await?;
            let jobs = source.list_not_done().await?;
            for job in jobs {
                self.manager.notify(job);
            }
            self.sources.insert(db_name.clone(), Arc::new(source));
            info!(db = %db_name, jobs = self.manager.len(), "runner ready for db");
        }
        Ok(())
    }

    /// Close every connection. `remove_jobs` drops the databases' jobs
    /// from memory too (recovery); shutdown keeps the bookkeeping.
    pub(crate) async fn close_databases(&mut self, remove_jobs: bool) {
        for (db_name, source) in self.sources.drain() {
            if remove_jobs {
                self.manager.remove_db(&db_name);
            }
            source.close().await;
        }
    }

    /// Handle every notification already queued, without blocking.
    async fn drain_notifications(&mut self) -> Result<(), SourceError> {
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_event(event).await?;
        }
        Ok(())
    }

    pub(crate) async fn apply_event(&mut self, event: SourceEvent) -> Result<(), SourceError> {
        match event {
            SourceEvent::JobChanged { db_name, job_id } => {
                let Some(source) = self.sources.get(&db_name) else {
                    return Ok(());
                };
                match source.fetch_job(&job_id).await? {
                    Some(job) => self.manager.notify(job),
                    // Stale notification: the row is gone upstream.
                    None => self.manager.remove_job(&job_id),
                }
                Ok(())
            }
            SourceEvent::ConnectionLost { db_name } => Err(SourceError::ConnectionLost(db_name)),
        }
    }

    /// Claim and dispatch every job the manager deems runnable now.
    /// The enqueued transition is persisted before the executor call.
    pub(crate) async fn run_jobs(&mut self) -> Result<(), SourceError> {
        let now = self.clock.now();
        for job in self.manager.get_jobs_to_run(now) {
            if self.cancel.is_cancelled() {
                break;
            }
            let Some(source) = self.sources.get(&job.db_name) else {
                continue;
            };
            info!(job = %job.id, db = %job.db_name, "asking executor to run job");
            source.set_enqueued(&job.id).await?;
            self.spawn_dispatch(Arc::clone(source), job);
        }
        Ok(())
    }

    /// Fire-and-forget dispatch. The task's only duty on failure is to
    /// revert the job to pending so a later pass retries it; the
    /// coordinator never joins it.
    fn spawn_dispatch(&self, source: Arc<C::Source>, job: Job) {
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            if let Err(err) = executor.run_job(&job.db_name, &job.id).await {
                warn!(
                    job = %job.id,
                    db = %job.db_name,
                    error = %err,
                    "dispatch failed, reverting job to pending"
                );
                if let Err(err) = source.revert_enqueued(&job.id).await {
                    warn!(job = %job.id, error = %err, "failed to revert job");
                }
            }
        });
    }

    /// Block until a notification arrives, the timeout elapses (so
    /// eta-delayed jobs get re-checked), or the runner is stopped.
    async fn wait_notification(&mut self) -> Result<(), SourceError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Ok(()),
            event = self.events_rx.recv() => match event {
                Some(event) => self.apply_event(event).await,
                None => Err(SourceError::StreamClosed),
            },
            _ = tokio::time::sleep(self.config.select_timeout) => Ok(()),
        }
    }

    #[cfg(test)]
    pub(crate) fn manager(&self) -> &ChannelManager {
        &self.manager
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
