// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! qj-scheduler: capacity-bounded channel tree for queued jobs.
//!
//! Channels form a tree rooted at `root`. Each channel caps how many of
//! its jobs (and its descendants' jobs) may be enqueued or started at
//! once; a job is only dispatched when every channel on its path to the
//! root has spare capacity. Within a channel, pending jobs are ordered
//! by priority, creation time, then sequence, and gated on their eta.

pub mod channel;
pub mod config;
pub mod manager;

pub use channel::Channel;
pub use config::{parse_channel_config, ChannelSpec, ConfigError, ROOT_CHANNEL};
pub use manager::ChannelManager;
