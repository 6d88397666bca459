// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! qj-core: domain types for the queue-job runner.

pub mod clock;
pub mod job;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use job::{Job, JobId, JobState, SortKey, UnknownState};
#[cfg(any(test, feature = "test-support"))]
pub use test_support::JobBuilder;
