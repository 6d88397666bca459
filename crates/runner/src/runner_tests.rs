// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::fakes::{FakeConnector, FakeDb, FakeExecutor};
use qj_core::{FakeClock, JobBuilder, JobState};
use std::time::Duration;

type TestRunner = Runner<FakeConnector, FakeExecutor, FakeClock>;

struct Harness {
    db: FakeDb,
    connector: FakeConnector,
    executor: FakeExecutor,
}

fn setup(channels: &str) -> (TestRunner, Harness) {
    let db = FakeDb::new("main");
    let connector = FakeConnector::new();
    connector.add_db(db.clone());
    let executor = FakeExecutor::new();

    let config = RunnerConfig {
        channels: channels.to_string(),
        db_names: vec!["main".to_string()],
        select_timeout: Duration::from_millis(50),
        recovery_delay: Duration::from_millis(10),
    };
    let runner = Runner::new(
        config,
        connector.clone(),
        executor.clone(),
        FakeClock::new(),
        tokio_util::sync::CancellationToken::new(),
    )
    .unwrap();

    (runner, Harness { db, connector, executor })
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within timeout");
}

#[test]
fn malformed_channel_config_is_fatal() {
    let config = RunnerConfig::new("root:x", vec![]);
    let result = Runner::new(
        config,
        FakeConnector::new(),
        FakeExecutor::new(),
        FakeClock::new(),
        tokio_util::sync::CancellationToken::new(),
    );
    assert!(matches!(result, Err(qj_scheduler::ConfigError::BadCapacity(_))));
}

#[tokio::test]
async fn empty_channel_config_disables_runner() {
    let (mut runner, h) = setup("");
    runner.run().await;

    assert_eq!(runner.state(), RunnerState::Stopped);
    assert_eq!(h.connector.connect_count(), 0);
}

#[tokio::test]
async fn initialize_seeds_from_durable_state() {
    let (mut runner, h) = setup("root:2");
    h.db.insert_job(JobBuilder::new("a").db_name("main").seq(1).build());
    h.db.insert_job(JobBuilder::new("b").db_name("main").seq(2).build());
    h.db.insert_job(JobBuilder::new("c").db_name("main").seq(3).state(JobState::Done).build());

    runner.initialize().await.unwrap();

    assert_eq!(runner.manager().len(), 2);
    assert!(runner.manager().job(&"c".into()).is_none());
}

#[tokio::test]
async fn skips_database_without_queue() {
    let (mut runner, h) = setup("root:2");
    h.db.set_has_queue(false);

    runner.initialize().await.unwrap();

    assert!(runner.sources.is_empty());
    assert!(runner.manager().is_empty());
}

#[tokio::test]
async fn run_jobs_persists_enqueued_before_dispatch() {
    let (mut runner, h) = setup("root:1");
    h.db.insert_job(JobBuilder::new("a").db_name("main").build());

    runner.initialize().await.unwrap();
    runner.run_jobs().await.unwrap();

    // Durable state already shows enqueued, even before the executor runs.
    assert_eq!(h.db.enqueued(), vec!["a".into()]);
    assert_eq!(h.db.job_state(&"a".into()), Some(JobState::Enqueued));

    let executor = h.executor.clone();
    wait_until(move || executor.calls().len() == 1).await;
    assert_eq!(h.executor.calls()[0], ("main".to_string(), "a".into()));
}

#[tokio::test]
async fn dispatch_failure_reverts_job_and_retries() {
    let (mut runner, h) = setup("root:1");
    h.executor.set_fail(true);
    h.db.insert_job(JobBuilder::new("a").db_name("main").build());

    runner.initialize().await.unwrap();
    runner.run_jobs().await.unwrap();

    let db = h.db.clone();
    wait_until(move || db.reverted().contains(&"a".into())).await;
    assert_eq!(h.db.job_state(&"a".into()), Some(JobState::Pending));

    // The revert's own notification flows back and the job is retried.
    h.executor.set_fail(false);
    runner.drain_notifications().await.unwrap();
    runner.run_jobs().await.unwrap();

    let executor = h.executor.clone();
    wait_until(move || executor.calls().len() == 1).await;
    assert_eq!(h.db.job_state(&"a".into()), Some(JobState::Enqueued));
}

#[tokio::test]
async fn stale_notification_removes_job() {
    let (mut runner, h) = setup("root:1");
    h.db.insert_job(JobBuilder::new("a").db_name("main").build());
    runner.initialize().await.unwrap();
    assert_eq!(runner.manager().len(), 1);

    // Row deleted upstream; the notification no longer matches anything.
    h.db.delete_job(&"a".into());
    runner.drain_notifications().await.unwrap();

    assert!(runner.manager().is_empty());
}

#[tokio::test]
async fn notification_adds_new_job() {
    let (mut runner, h) = setup("root:1");
    runner.initialize().await.unwrap();
    assert!(runner.manager().is_empty());

    h.db.insert_job(JobBuilder::new("fresh").db_name("main").build());
    runner.drain_notifications().await.unwrap();

    assert_eq!(runner.manager().len(), 1);
}

#[tokio::test]
async fn connection_loss_triggers_full_reinitialization() {
    let (mut runner, h) = setup("root:2");
    h.db.insert_job(JobBuilder::new("a").db_name("main").seq(1).build());

    let cancel = runner.cancel_token();
    let handle = tokio::spawn(async move {
        runner.run().await;
        runner
    });

    let executor = h.executor.clone();
    wait_until(move || executor.calls().len() == 1).await;

    h.db.break_connection();
    let connector = h.connector.clone();
    wait_until(move || connector.connect_count() >= 2).await;

    // The rebuilt connection keeps serving new jobs.
    h.db.insert_job(JobBuilder::new("b").db_name("main").seq(2).build());
    let executor = h.executor.clone();
    wait_until(move || executor.calls().iter().any(|(_, id)| id == &"b".into())).await;

    cancel.cancel();
    let runner = handle.await.unwrap();
    assert_eq!(runner.state(), RunnerState::Stopped);
}

#[tokio::test]
async fn stop_wakes_blocked_wait_immediately() {
    let (mut runner, h) = setup("root:1");
    // A long select timeout: only cancellation can wake the wait.
    runner.config.select_timeout = Duration::from_secs(60);

    let cancel = runner.cancel_token();
    let handle = tokio::spawn(async move {
        runner.run().await;
        runner
    });

    let connector = h.connector.clone();
    wait_until(move || connector.connect_count() == 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    cancel.cancel();
    let runner = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("stop did not wake the wait")
        .unwrap();
    assert_eq!(runner.state(), RunnerState::Stopped);
}

#[tokio::test]
async fn shutdown_keeps_enqueued_bookkeeping() {
    let (mut runner, h) = setup("root:1");
    h.db.insert_job(JobBuilder::new("a").db_name("main").build());

    runner.initialize().await.unwrap();
    runner.run_jobs().await.unwrap();
    runner.close_databases(false).await;

    // Stop must not retroactively unmark enqueued jobs; the next startup
    // reconciles them from durable state.
    assert_eq!(h.db.job_state(&"a".into()), Some(JobState::Enqueued));
}
