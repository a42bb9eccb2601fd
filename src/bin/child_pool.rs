//! Run a child pool with a fake job until SIGTERM/SIGINT.
//!
//! The first signal stops spawning, kills idle children and drains the
//! rest; a second signal kills every remaining child.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use rand::Rng;
use tracing::info;

use prometheus_child_pool::config::ChildPoolConfig;
use prometheus_child_pool::core::{AppResult, Job, WorkerPoolManager};
use prometheus_child_pool::runtime;
use prometheus_child_pool::util::init_tracing;

/// Job that mixes a sleep with a short CPU burst.
#[derive(Clone)]
struct FakeJob;

#[async_trait]
impl Job for FakeJob {
    async fn run(&self) -> AppResult<()> {
        let (sleep_ms, spins) = {
            let mut rng = rand::rng();
            (rng.random_range(100..=2_000_u64), rng.random_range(10_000..=1_000_000_u64))
        };
        tokio::time::sleep(Duration::from_millis(sleep_ms)).await;

        let checksum = (0..spins).fold(0_u64, |acc, i| acc.wrapping_mul(31).wrapping_add(i));
        info!(sleep_ms, spins, checksum, "fake job done");
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> AppResult<()> {
    init_tracing();

    let config = ChildPoolConfig::from_env()
        .map_err(anyhow::Error::msg)
        .context("loading child pool configuration")?;
    let manager = WorkerPoolManager::new(config, FakeJob)?;
    manager.install_signal_handlers()?;

    info!(ident = %manager.get_ident(), "worker started");
    let mode = runtime::run(&manager).await?;
    info!(?mode, stats = ?manager.stats(), "worker stopped");
    Ok(())
}
