//! Workload Driver
//!
//! Runs concurrent workers issuing a mix of store, load and delete calls
//! against a shared cache, then summarizes what happened.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::{StatsSnapshot, TtlCache};
use crate::config::Config;

/// Operations between cooperative yields in each worker.
const YIELD_EVERY: u64 = 64;

// == Worker Report ==
/// Operation counts from a single worker.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct WorkerReport {
    pub stores: u64,
    pub loads: u64,
    pub deletes: u64,
    pub store_errors: u64,
}

impl WorkerReport {
    fn merge(&mut self, other: WorkerReport) {
        self.stores += other.stores;
        self.loads += other.loads;
        self.deletes += other.deletes;
        self.store_errors += other.store_errors;
    }

    pub fn operations(&self) -> u64 {
        self.stores + self.loads + self.deletes
    }
}

// == Workload Report ==
/// Final report printed by the binary.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadReport {
    /// RFC 3339 timestamp of report creation
    pub generated_at: String,
    /// False if the run was cut short by a shutdown signal
    pub completed: bool,
    pub workers: usize,
    pub key_space: u64,
    pub entry_ttl_ms: u64,
    pub operations: WorkerReport,
    pub cache: StatsSnapshot,
}

impl WorkloadReport {
    pub fn new(config: &Config, operations: Option<WorkerReport>, cache: StatsSnapshot) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            completed: operations.is_some(),
            workers: config.workers,
            key_space: config.key_space,
            entry_ttl_ms: config.entry_ttl_ms,
            operations: operations.unwrap_or_default(),
            cache,
        }
    }
}

/// Runs `config.workers` workers against `cache` for `config.run_duration()`.
///
/// Workers live in a `JoinSet`, so dropping the returned future aborts
/// them all.
pub async fn run_workload(cache: TtlCache<u64, u64>, config: &Config) -> WorkerReport {
    let deadline = Instant::now() + config.run_duration();
    let mut workers = JoinSet::new();

    for worker in 0..config.workers {
        let cache = cache.clone();
        let config = config.clone();
        workers.spawn(async move { run_worker(worker as u64, cache, config, deadline).await });
    }
    info!(workers = config.workers, "Workload started");

    let mut total = WorkerReport::default();
    while let Some(result) = workers.join_next().await {
        match result {
            Ok(report) => total.merge(report),
            Err(e) => warn!("Worker failed: {}", e),
        }
    }

    info!(operations = total.operations(), "Workload finished");
    total
}

async fn run_worker(
    worker: u64,
    cache: TtlCache<u64, u64>,
    config: Config,
    deadline: Instant,
) -> WorkerReport {
    let key_space = config.key_space.max(1);
    let ttl = config.entry_ttl();
    let mut rng = StdRng::seed_from_u64(worker);
    let mut report = WorkerReport::default();
    let mut ops: u64 = 0;

    while Instant::now() < deadline {
        let roll: u8 = rng.gen_range(0..10);
        let key = rng.gen_range(0..key_space);

        match roll {
            // 60% loads, 30% stores, 10% deletes
            0..=5 => {
                cache.load(&key);
                report.loads += 1;
            }
            6..=8 => {
                match cache.store(key, ops, ttl) {
                    Ok(_) => report.stores += 1,
                    Err(e) => {
                        report.store_errors += 1;
                        warn!(worker, "Store failed: {}", e);
                    }
                }
            }
            _ => {
                cache.delete(&key);
                report.deletes += 1;
            }
        }

        ops += 1;
        if ops % YIELD_EVERY == 0 {
            tokio::task::yield_now().await;
        }
    }

    debug!(worker, operations = report.operations(), "Worker done");
    report
}
