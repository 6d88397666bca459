// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Duration;
use proptest::prelude::*;
use qj_core::test_support::test_origin;
use qj_core::{JobBuilder, JobState};

fn configured(config: &str) -> ChannelManager {
    let mut manager = ChannelManager::new();
    manager.configure(config).unwrap();
    manager
}

fn ids(jobs: &[qj_core::Job]) -> Vec<&str> {
    jobs.iter().map(|j| j.id.as_str()).collect()
}

#[test]
fn dispatch_order_is_priority_then_sequence() {
    let now = test_origin();
    let mut manager = configured("root:3");
    manager.notify(JobBuilder::new("a").priority(1).seq(5).build());
    manager.notify(JobBuilder::new("b").priority(1).seq(3).build());
    manager.notify(JobBuilder::new("c").priority(0).seq(9).build());

    let jobs = manager.get_jobs_to_run(now);
    assert_eq!(ids(&jobs), vec!["c", "b", "a"]);
}

#[test]
fn capacity_limits_dispatch() {
    let now = test_origin();
    let mut manager = configured("root:2");
    for i in 0..5 {
        manager.notify(JobBuilder::new(format!("j{i}")).seq(i).build());
    }

    let first = manager.get_jobs_to_run(now);
    assert_eq!(ids(&first), vec!["j0", "j1"]);

    // Dispatched jobs hold their slots; nothing more fits.
    assert!(manager.get_jobs_to_run(now).is_empty());

    // One job finishing frees exactly one slot.
    manager.notify(JobBuilder::new("j0").seq(0).state(JobState::Done).build());
    assert_eq!(ids(&manager.get_jobs_to_run(now)), vec!["j2"]);
}

#[test]
fn zero_capacity_channel_never_dispatches() {
    let now = test_origin();
    let mut manager = configured("root:0");
    manager.notify(JobBuilder::new("a").build());
    assert!(manager.get_jobs_to_run(now).is_empty());
}

#[test]
fn nested_capacity_bounded_by_parent() {
    let now = test_origin();
    let mut manager = configured("root:1,root.sub:2");
    manager.notify(JobBuilder::new("a").channel("root.sub").seq(1).build());
    manager.notify(JobBuilder::new("b").channel("root.sub").seq(2).build());

    // Child capacity is 2 but the parent allows only 1 in the subtree.
    assert_eq!(ids(&manager.get_jobs_to_run(now)), vec!["a"]);
    assert!(manager.get_jobs_to_run(now).is_empty());
}

#[test]
fn sibling_channels_share_parent_capacity() {
    let now = test_origin();
    let mut manager = configured("root:3,root.a:2,root.b:2");
    for i in 0..3 {
        manager.notify(JobBuilder::new(format!("a{i}")).channel("root.a").seq(i).build());
        manager.notify(JobBuilder::new(format!("b{i}")).channel("root.b").seq(i).build());
    }

    let jobs = manager.get_jobs_to_run(now);
    // Each child caps at 2; the parent stops the combined count at 3.
    assert_eq!(jobs.len(), 3);
    let a_count = jobs.iter().filter(|j| j.id.as_str().starts_with('a')).count();
    let b_count = jobs.iter().filter(|j| j.id.as_str().starts_with('b')).count();
    assert!(a_count <= 2 && b_count <= 2);
    assert_eq!(a_count + b_count, 3);
}

#[test]
fn running_jobs_in_parent_starve_children() {
    let now = test_origin();
    let mut manager = configured("root:1");
    manager.notify(JobBuilder::new("busy").state(JobState::Started).build());
    manager.notify(JobBuilder::new("queued").channel("root.sub").build());

    assert!(manager.get_jobs_to_run(now).is_empty());
}

#[test]
fn notify_is_idempotent() {
    let now = test_origin();
    let mut manager = configured("root:2");
    let job = JobBuilder::new("a").seq(1).build();
    manager.notify(job.clone());
    manager.notify(job.clone());
    manager.notify(JobBuilder::new("b").seq(2).build());

    assert_eq!(manager.len(), 2);
    // "a" kept its original queue position.
    assert_eq!(ids(&manager.get_jobs_to_run(now)), vec!["a", "b"]);
}

#[test]
fn notify_done_removes_job() {
    let mut manager = configured("root:2");
    manager.notify(JobBuilder::new("a").build());
    assert_eq!(manager.len(), 1);

    manager.notify(JobBuilder::new("a").state(JobState::Done).build());
    assert_eq!(manager.len(), 0);
    assert!(manager.get_jobs_to_run(test_origin()).is_empty());
}

#[test]
fn remove_job_unknown_is_noop() {
    let mut manager = configured("root:2");
    manager.remove_job(&"ghost".into());
    assert!(manager.is_empty());
}

#[test]
fn eta_gating_in_dispatch() {
    let now = test_origin();
    let mut manager = configured("root:2");
    manager.notify(JobBuilder::new("later").eta(now + Duration::seconds(30)).build());

    assert!(manager.get_jobs_to_run(now).is_empty());
    assert_eq!(ids(&manager.get_jobs_to_run(now + Duration::seconds(30))), vec!["later"]);
}

#[test]
fn dispatch_marks_job_enqueued_in_memory() {
    let now = test_origin();
    let mut manager = configured("root:1");
    manager.notify(JobBuilder::new("a").build());

    manager.get_jobs_to_run(now);
    assert_eq!(manager.job(&"a".into()).map(|j| j.state), Some(JobState::Enqueued));
}

#[test]
fn reverted_job_is_dispatched_again() {
    let now = test_origin();
    let mut manager = configured("root:1");
    let job = JobBuilder::new("a").build();
    manager.notify(job.clone());

    assert_eq!(manager.get_jobs_to_run(now).len(), 1);
    // Dispatch failed upstream; the pending snapshot comes back around.
    manager.notify(job);
    assert_eq!(ids(&manager.get_jobs_to_run(now)), vec!["a"]);
}

#[test]
fn seeded_running_jobs_consume_capacity() {
    // Initial sync can deliver jobs already enqueued/started upstream.
    let now = test_origin();
    let mut manager = configured("root:2");
    manager.notify(JobBuilder::new("a").state(JobState::Enqueued).build());
    manager.notify(JobBuilder::new("b").state(JobState::Started).build());
    manager.notify(JobBuilder::new("c").build());

    assert!(manager.get_jobs_to_run(now).is_empty());
}

#[test]
fn failed_jobs_tracked_but_never_dispatched() {
    let now = test_origin();
    let mut manager = configured("root:1");
    manager.notify(JobBuilder::new("broken").state(JobState::Failed).build());
    manager.notify(JobBuilder::new("ok").build());

    // The failed job is kept in memory but frees its capacity slot.
    assert_eq!(manager.len(), 2);
    assert_eq!(ids(&manager.get_jobs_to_run(now)), vec!["ok"]);
}

#[test]
fn dynamic_channel_inherits_parent_capacity() {
    let now = test_origin();
    let mut manager = configured("root:3");
    for i in 0..5 {
        manager.notify(JobBuilder::new(format!("j{i}")).channel("root.surprise").seq(i).build());
    }

    // "root.surprise" was never configured; it inherits capacity 3.
    assert_eq!(manager.get_jobs_to_run(now).len(), 3);
    assert_eq!(manager.channel("root.surprise").map(Channel::capacity), Some(3));
}

#[test]
fn bare_channel_name_resolves_under_root() {
    let now = test_origin();
    let mut manager = configured("root:1,root.sub:1");
    manager.notify(JobBuilder::new("a").channel("sub").build());

    assert_eq!(ids(&manager.get_jobs_to_run(now)), vec!["a"]);
    assert_eq!(manager.channel("root.sub").map(Channel::running_count), Some(1));
}

#[test]
fn channel_move_reparents_job() {
    let now = test_origin();
    let mut manager = configured("root:2,root.a:1,root.b:1");
    manager.notify(JobBuilder::new("x").channel("root.a").build());
    manager.notify(JobBuilder::new("x").channel("root.b").build());

    assert_eq!(manager.len(), 1);
    let jobs = manager.get_jobs_to_run(now);
    assert_eq!(ids(&jobs), vec!["x"]);
    assert_eq!(manager.channel("root.b").map(Channel::running_count), Some(1));
    assert_eq!(manager.channel("root.a").map(Channel::running_count), Some(0));
}

#[test]
fn remove_db_drops_only_that_database() {
    let mut manager = configured("root:4");
    manager.notify(JobBuilder::new("a").db_name("alpha").build());
    manager.notify(JobBuilder::new("b").db_name("beta").build());

    manager.remove_db("alpha");
    assert_eq!(manager.len(), 1);
    assert!(manager.job(&"b".into()).is_some());
}

proptest! {
    /// However many jobs burst into one channel, the number concurrently
    /// enqueued never exceeds the configured capacity.
    #[test]
    fn capacity_never_exceeded(capacity in 0usize..5, burst in 0usize..30, completions in 0usize..30) {
        let now = test_origin();
        let mut manager = configured(&format!("root:{capacity}"));
        for i in 0..burst {
            manager.notify(JobBuilder::new(format!("j{i}")).seq(i as i64).build());
        }

        let first = manager.get_jobs_to_run(now);
        prop_assert!(first.len() <= capacity);

        // Complete a few and re-run; the bound must still hold.
        for job in first.iter().take(completions) {
            manager.notify(JobBuilder::new(job.id.as_str()).state(JobState::Done).build());
        }
        let second = manager.get_jobs_to_run(now);
        let enqueued = (0..burst)
            .filter(|i| {
                manager
                    .job(&format!("j{i}").as_str().into())
                    .is_some_and(|j| j.state.is_running())
            })
            .count();
        prop_assert!(enqueued <= capacity);
        prop_assert!(first.len().saturating_sub(completions.min(first.len())) + second.len() <= capacity);
    }
}
