// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Channel manager: owns the channel tree and the job index, and decides
//! which queued jobs are eligible to run.

use crate::channel::Channel;
use crate::config::{parse_channel_config, ConfigError, ROOT_CHANNEL};
use chrono::{DateTime, Utc};
use qj_core::{Job, JobId};
use std::collections::HashMap;
use tracing::debug;

struct TrackedJob {
    channel: String,
    job: Job,
}

/// Owns all channels and job records. The runner loop never touches
/// channel or job state directly; everything goes through `notify`,
/// `remove_job`, `remove_db` and `get_jobs_to_run`.
pub struct ChannelManager {
    channels: HashMap<String, Channel>,
    jobs: HashMap<JobId, TrackedJob>,
}

impl ChannelManager {
    /// Create a manager with a bare root channel of capacity 1.
    pub fn new() -> Self {
        let mut channels = HashMap::new();
        channels.insert(ROOT_CHANNEL.to_string(), Channel::new(ROOT_CHANNEL, 1, None));
        Self { channels, jobs: HashMap::new() }
    }

    /// Apply a channel configuration string (e.g. `root:4,root.sub:2`).
    ///
    /// Creates the named channels (and any missing intermediate nodes)
    /// and sets their capacities. Malformed entries are fatal.
    pub fn configure(&mut self, config: &str) -> Result<(), ConfigError> {
        for spec in parse_channel_config(config)? {
            let name = self.ensure_channel(Some(&spec.name));
            if let Some(channel) = self.channels.get_mut(&name) {
                channel.set_capacity(spec.capacity);
            }
            debug!(channel = %name, capacity = spec.capacity, "channel configured");
        }
        Ok(())
    }

    /// Idempotent upsert driven by a notification snapshot.
    ///
    /// A done job is purged; anything else is inserted or moved to the
    /// channel named by its path, creating tree nodes on demand (new
    /// nodes inherit their parent's capacity). Re-notifying identical
    /// attributes leaves the entry untouched, preserving queue position.
    pub fn notify(&mut self, job: Job) {
        if job.state.is_done() {
            self.remove_job(&job.id);
            return;
        }

        let channel_name = self.ensure_channel(job.channel.as_deref());

        if let Some(tracked) = self.jobs.get(&job.id) {
            if tracked.channel == channel_name && tracked.job == job {
                return;
            }
            if let Some(old) = self.channels.get_mut(&tracked.channel) {
                old.remove_job(&job.id);
            }
        }

        debug!(
            job = %job.id,
            db = %job.db_name,
            channel = %channel_name,
            state = %job.state,
            "job tracked"
        );
        if let Some(channel) = self.channels.get_mut(&channel_name) {
            channel.add_job(&job);
        }
        self.jobs.insert(job.id.clone(), TrackedJob { channel: channel_name, job });
    }

    /// Remove a job from whichever channel holds it. No-op if unknown.
    pub fn remove_job(&mut self, id: &JobId) {
        if let Some(tracked) = self.jobs.remove(id) {
            if let Some(channel) = self.channels.get_mut(&tracked.channel) {
                channel.remove_job(id);
            }
            debug!(job = %id, "job untracked");
        }
    }

    /// Drop every job belonging to a database (connection teardown).
    pub fn remove_db(&mut self, db_name: &str) {
        let ids: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|(_, t)| t.job.db_name == db_name)
            .map(|(id, _)| id.clone())
            .collect();
        for id in ids {
            self.remove_job(&id);
        }
    }

    /// Jobs eligible to run at `now`, across all channels, respecting
    /// nested capacity. Returned jobs are marked enqueued in memory so
    /// they immediately count against capacity; the caller is expected
    /// to persist that state before dispatching.
    pub fn get_jobs_to_run(&mut self, now: DateTime<Utc>) -> Vec<Job> {
        let mut to_run = Vec::new();

        for name in self.traversal_order() {
            let spare = self.path_spare(&name);
            if spare == 0 {
                continue;
            }
            let runnable = match self.channels.get(&name) {
                Some(channel) => channel.get_runnable_jobs(now, spare),
                None => continue,
            };
            for id in runnable {
                if let Some(channel) = self.channels.get_mut(&name) {
                    channel.set_running(&id);
                }
                if let Some(tracked) = self.jobs.get_mut(&id) {
                    tracked.job.state = qj_core::JobState::Enqueued;
                    to_run.push(tracked.job.clone());
                }
            }
        }

        to_run
    }

    /// Look up a tracked job.
    pub fn job(&self, id: &JobId) -> Option<&Job> {
        self.jobs.get(id).map(|t| &t.job)
    }

    /// Number of tracked (not-done) jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    /// Normalize a job's channel path and create any missing nodes.
    ///
    /// An absent or empty path means the root channel; a path that does
    /// not start with `root` is treated as relative to it. New nodes
    /// inherit the capacity of their parent.
    fn ensure_channel(&mut self, path: Option<&str>) -> String {
        let path = path.unwrap_or("").trim();
        if path.is_empty() || path == ROOT_CHANNEL {
            return ROOT_CHANNEL.to_string();
        }

        let relative = path.strip_prefix("root.").unwrap_or(path);
        let mut parent = ROOT_CHANNEL.to_string();
        for segment in relative.split('.').filter(|s| !s.is_empty()) {
            let name = format!("{}.{}", parent, segment);
            if !self.channels.contains_key(&name) {
                let capacity =
                    self.channels.get(&parent).map(Channel::capacity).unwrap_or(1);
                self.channels.insert(
                    name.clone(),
                    Channel::new(&name, capacity, Some(parent.clone())),
                );
                if let Some(p) = self.channels.get_mut(&parent) {
                    p.add_child(&name);
                }
                debug!(channel = %name, capacity, "channel created on demand");
            }
            parent = name;
        }
        parent
    }

    /// Depth-first preorder over the tree, children in name order.
    fn traversal_order(&self) -> Vec<String> {
        let mut order = Vec::with_capacity(self.channels.len());
        let mut stack = vec![ROOT_CHANNEL.to_string()];
        while let Some(name) = stack.pop() {
            if let Some(channel) = self.channels.get(&name) {
                // Reverse so the sorted children pop in name order.
                let children: Vec<String> =
                    channel.children().map(str::to_string).collect();
                stack.extend(children.into_iter().rev());
            }
            order.push(name);
        }
        order
    }

    /// Running jobs in a channel's subtree (itself plus descendants).
    fn subtree_running(&self, name: &str) -> usize {
        let mut total = 0;
        let mut stack = vec![name.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(channel) = self.channels.get(&current) {
                total += channel.running_count();
                stack.extend(channel.children().map(str::to_string));
            }
        }
        total
    }

    /// Spare capacity for a channel: the minimum of
    /// `capacity - subtree_running` over the channel and its ancestors.
    fn path_spare(&self, name: &str) -> usize {
        let mut spare = usize::MAX;
        let mut current = Some(name.to_string());
        while let Some(ref cur) = current {
            let Some(channel) = self.channels.get(cur) else { break };
            spare = spare.min(channel.capacity().saturating_sub(self.subtree_running(cur)));
            current = channel.parent().map(str::to_string);
        }
        if spare == usize::MAX {
            0
        } else {
            spare
        }
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
