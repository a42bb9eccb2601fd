//! Integration tests for the reference driver loop
//!
//! The driver tops the pool up until the first interrupt, then drains;
//! a second interrupt during the drain escalates to a forced kill.

use async_trait::async_trait;
use prometheus_child_pool::config::ChildPoolConfig;
use prometheus_child_pool::core::{AppResult, Job, WorkerPoolManager};
use prometheus_child_pool::runtime::{run, ShutdownMode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Job blocked on a gate until the test opens it.
#[derive(Clone)]
struct GateJob {
    gate: Arc<Semaphore>,
    started: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
}

impl GateJob {
    fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            started: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Job for GateJob {
    async fn run(&self) -> AppResult<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let _permit = self.gate.acquire().await?;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn eventually<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(60), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached");
}

fn manager(job: GateJob) -> Arc<WorkerPoolManager<GateJob>> {
    manager_with_pre_work(job, 0)
}

fn manager_with_pre_work(job: GateJob, pre_work_ms: u64) -> Arc<WorkerPoolManager<GateJob>> {
    let config = ChildPoolConfig::new()
        .with_max_children(3)
        .with_pre_work_delay_ms(pre_work_ms, pre_work_ms);
    Arc::new(WorkerPoolManager::new(config, job).unwrap())
}

#[tokio::test(start_paused = true)]
async fn test_driver_drains_gracefully_on_first_interrupt() {
    let job = GateJob::new();
    let manager = manager(job.clone());

    let driver = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { run(&manager).await })
    };

    eventually(|| job.started.load(Ordering::SeqCst) == 3).await;
    assert_eq!(manager.live_children(), 3);

    manager.interrupts().raise();
    eventually(|| manager.registry().is_closed()).await;
    assert_eq!(manager.live_children(), 3, "busy children survive the first interrupt");

    job.gate.add_permits(1_000);
    let mode = driver.await.unwrap().unwrap();
    assert_eq!(mode, ShutdownMode::Graceful);
    assert_eq!(manager.live_children(), 0);
    assert_eq!(job.finished.load(Ordering::SeqCst), 3);
    assert_eq!(manager.stats().spawned, 3);
}

#[tokio::test(start_paused = true)]
async fn test_driver_kills_on_second_interrupt() {
    let job = GateJob::new();
    let manager = manager(job.clone());

    let driver = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { run(&manager).await })
    };

    eventually(|| job.started.load(Ordering::SeqCst) == 3).await;

    manager.interrupts().raise();
    eventually(|| manager.registry().is_closed()).await;
    manager.interrupts().raise();

    let mode = driver.await.unwrap().unwrap();
    assert_eq!(mode, ShutdownMode::Forced);
    assert_eq!(manager.live_children(), 0);
    assert_eq!(job.finished.load(Ordering::SeqCst), 0);
    assert_eq!(manager.stats().killed, 3);
}

#[tokio::test(start_paused = true)]
async fn test_driver_kills_on_back_to_back_interrupts() {
    let job = GateJob::new();
    let manager = manager(job.clone());

    let driver = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { run(&manager).await })
    };

    eventually(|| job.started.load(Ordering::SeqCst) == 3).await;

    // Both land before the driver sees the first one.
    manager.interrupts().raise();
    manager.interrupts().raise();

    let mode = tokio::time::timeout(Duration::from_secs(3600), driver)
        .await
        .expect("driver must not wait on busy children")
        .unwrap()
        .unwrap();
    assert_eq!(mode, ShutdownMode::Forced);
    assert_eq!(manager.live_children(), 0);
    assert_eq!(job.finished.load(Ordering::SeqCst), 0);
    assert_eq!(manager.stats().killed, 3);
}

#[tokio::test(start_paused = true)]
async fn test_driver_shutdown_during_pre_work_starts_no_jobs() {
    let job = GateJob::new();
    let manager = manager_with_pre_work(job.clone(), 50);

    let driver = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { run(&manager).await })
    };

    eventually(|| manager.live_children() == 3).await;
    manager.interrupts().raise();

    let mode = driver.await.unwrap().unwrap();
    assert_eq!(mode, ShutdownMode::Graceful);
    assert_eq!(job.started.load(Ordering::SeqCst), 0);
    let stats = manager.stats();
    assert_eq!(stats.spawned, 3);
    assert_eq!(stats.killed, 3);
    assert_eq!(stats.live, 0);
}
