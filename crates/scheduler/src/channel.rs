// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single channel node: an ordered pending queue plus a running set.

use chrono::{DateTime, Utc};
use qj_core::{Job, JobId, SortKey};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Pending-queue entry. Carries the eta so eligibility checks don't need
/// a lookup back into the manager's job index.
#[derive(Debug, Clone)]
struct QueuedJob {
    id: JobId,
    eta: Option<DateTime<Utc>>,
}

/// One node of the channel tree.
///
/// Owns only scheduling bookkeeping for its own jobs; tree-wide capacity
/// decisions (the min-spare walk to the root) live in the manager, which
/// is the only caller of [`Channel::get_runnable_jobs`].
#[derive(Debug)]
pub struct Channel {
    name: String,
    capacity: usize,
    parent: Option<String>,
    children: BTreeSet<String>,
    /// Pending jobs in dispatch order.
    pending: BTreeMap<SortKey, QueuedJob>,
    /// Reverse index for O(1) removal from `pending`.
    pending_by_id: HashMap<JobId, SortKey>,
    /// Jobs currently counted against capacity (enqueued or started).
    running: HashSet<JobId>,
}

impl Channel {
    pub fn new(name: impl Into<String>, capacity: usize, parent: Option<String>) -> Self {
        Self {
            name: name.into(),
            capacity,
            parent,
            children: BTreeSet::new(),
            pending: BTreeMap::new(),
            pending_by_id: HashMap::new(),
            running: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn children(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(String::as_str)
    }

    pub fn add_child(&mut self, name: impl Into<String>) {
        self.children.insert(name.into());
    }

    /// Number of this channel's own jobs counted against capacity.
    /// Descendants are accounted for by the manager's subtree walk.
    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Insert or replace (by identifier) a job in this channel.
    ///
    /// Pending jobs enter the ordered queue; enqueued/started jobs enter
    /// the running set; failed jobs are tracked by neither (they consume
    /// no capacity and are never dispatched).
    pub fn add_job(&mut self, job: &Job) {
        self.remove_job(&job.id);
        if job.state.is_running() {
            self.running.insert(job.id.clone());
        } else if job.state == qj_core::JobState::Pending {
            let key = job.sort_key();
            self.pending.insert(key, QueuedJob { id: job.id.clone(), eta: job.eta });
            self.pending_by_id.insert(job.id.clone(), key);
        }
    }

    /// Remove a job if present; no-op otherwise.
    pub fn remove_job(&mut self, id: &JobId) {
        self.running.remove(id);
        if let Some(key) = self.pending_by_id.remove(id) {
            self.pending.remove(&key);
        }
    }

    /// Move a pending job into the running set (dispatch bookkeeping).
    pub fn set_running(&mut self, id: &JobId) {
        if let Some(key) = self.pending_by_id.remove(id) {
            self.pending.remove(&key);
        }
        self.running.insert(id.clone());
    }

    /// Pending jobs eligible at `now`, in dispatch order, truncated to
    /// `limit`. Jobs whose eta has not passed are skipped, not popped.
    pub fn get_runnable_jobs(&self, now: DateTime<Utc>, limit: usize) -> Vec<JobId> {
        self.pending
            .values()
            .filter(|queued| queued.eta.map_or(true, |eta| eta <= now))
            .take(limit)
            .map(|queued| queued.id.clone())
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
