// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! qj-runner: the runner loop and its external adapters.
//!
//! The loop owns one connection per logical database, feeds change
//! notifications into the channel manager, and hands eligible jobs to an
//! executor over fire-and-forget HTTP. It never runs jobs itself.

pub mod config;
pub mod executor;
pub mod pg;
pub mod runner;
pub mod source;

#[cfg(any(test, feature = "test-support"))]
pub mod fakes;

pub use config::Settings;
pub use executor::{ExecError, HttpExecutor, JobExecutor};
pub use pg::{PgConnector, PgJobSource};
pub use runner::{Runner, RunnerState};
pub use source::{JobSource, SourceConnector, SourceError, SourceEvent};
