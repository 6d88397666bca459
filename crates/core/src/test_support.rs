// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders shared across crates (behind the `test-support` feature).

use crate::job::{Job, JobId, JobState};
use chrono::{DateTime, TimeZone, Utc};

/// Fluent builder for [`Job`] fixtures.
///
/// Defaults to a pending root-channel job created at a fixed origin so
/// ordering-sensitive tests are deterministic.
pub struct JobBuilder {
    id: String,
    db_name: String,
    channel: Option<String>,
    seq: i64,
    date_created: DateTime<Utc>,
    priority: i32,
    eta: Option<DateTime<Utc>>,
    state: JobState,
}

impl JobBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            db_name: "testdb".to_string(),
            channel: None,
            seq: 0,
            date_created: test_origin(),
            priority: 10,
            eta: None,
            state: JobState::Pending,
        }
    }

    pub fn db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = db_name.into();
        self
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn seq(mut self, seq: i64) -> Self {
        self.seq = seq;
        self
    }

    pub fn date_created(mut self, date_created: DateTime<Utc>) -> Self {
        self.date_created = date_created;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn eta(mut self, eta: DateTime<Utc>) -> Self {
        self.eta = Some(eta);
        self
    }

    pub fn state(mut self, state: JobState) -> Self {
        self.state = state;
        self
    }

    pub fn build(self) -> Job {
        Job {
            id: JobId::new(self.id),
            db_name: self.db_name,
            channel: self.channel,
            seq: self.seq,
            date_created: self.date_created,
            priority: self.priority,
            eta: self.eta,
            state: self.state,
        }
    }
}

/// Fixed origin timestamp used by [`JobBuilder`] and [`crate::FakeClock`].
pub fn test_origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).single().unwrap_or_else(Utc::now)
}
