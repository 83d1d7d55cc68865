//! Splitting a request across workers and joining their results.
//!
//! Seeds are derived before any worker starts and every worker runs on its
//! own OS thread with its own stream. There is no shared mutable state while
//! trials run; the only synchronisation point is the final join.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{GachaError, GachaResult};
use crate::request::TrialPlan;
use crate::rng::derive_worker_seeds;
use crate::worker::{run_worker, WorkerResult};

const DESKTOP_MAX_WORKERS: usize = 16;
const MOBILE_MAX_WORKERS: usize = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    #[default]
    Desktop,
    Mobile,
}

impl FromStr for DeviceClass {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "desktop" => Ok(DeviceClass::Desktop),
            "mobile" => Ok(DeviceClass::Mobile),
            other => Err(format!("unknown device class '{other}' (expected desktop or mobile)")),
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceClass::Desktop => f.write_str("desktop"),
            DeviceClass::Mobile => f.write_str("mobile"),
        }
    }
}

/// Logical CPUs reported by the platform, or 1 when unknown.
pub fn detect_concurrency() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Worker count for a machine with `concurrency` logical CPUs.
///
/// Desktops leave one core for the caller; mobile devices use at most half
/// their cores to stay cool.
pub fn recommended_workers(concurrency: usize, device: DeviceClass) -> usize {
    match device {
        DeviceClass::Desktop => concurrency
            .saturating_sub(1)
            .clamp(1, DESKTOP_MAX_WORKERS),
        DeviceClass::Mobile => (concurrency / 2).clamp(1, MOBILE_MAX_WORKERS),
    }
}

/// One worker's share of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub worker: usize,
    pub seed: u32,
    pub trials: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPlan {
    pub base_seed: u32,
    pub partitions: Vec<Partition>,
}

impl WorkerPlan {
    /// Derive one seed per worker and split `trial_count` into near-equal
    /// shares, the remainder going to worker 0.
    pub fn new(base_seed: u32, workers: usize, trial_count: u64) -> GachaResult<Self> {
        if workers == 0 {
            return Err(GachaError::NoWorkers);
        }
        let workers = workers.min(usize::try_from(trial_count.max(1)).unwrap_or(usize::MAX));
        let share = trial_count / workers as u64;
        let remainder = trial_count % workers as u64;
        let partitions = derive_worker_seeds(base_seed, workers)
            .into_iter()
            .enumerate()
            .map(|(worker, seed)| Partition {
                worker,
                seed,
                trials: if worker == 0 { share + remainder } else { share },
            })
            .collect();
        Ok(Self {
            base_seed,
            partitions,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn trial_count(&self) -> u64 {
        self.partitions.iter().map(|partition| partition.trials).sum()
    }
}

/// Run every partition on its own scoped thread and join them all.
///
/// A panicking or failing worker fails the whole run; partial sets of
/// results are never returned.
pub fn run_threaded(
    plan: &TrialPlan,
    workers: &WorkerPlan,
    cancel: Option<&AtomicBool>,
) -> GachaResult<Vec<WorkerResult>> {
    thread::scope(|scope| {
        let handles: Vec<_> = workers
            .partitions
            .iter()
            .map(|partition| {
                let partition = *partition;
                let handle = thread::Builder::new()
                    .name(format!("gacha-worker-{}", partition.worker))
                    .spawn_scoped(scope, move || {
                        run_worker(plan, partition.worker, partition.seed, partition.trials, cancel)
                    });
                (partition.worker, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        let mut failure = None;
        for (worker, handle) in handles {
            let joined = match handle {
                Ok(handle) => handle.join().map_err(|payload| GachaError::WorkerFailed {
                    worker,
                    message: panic_message(payload.as_ref()),
                }),
                Err(err) => Err(GachaError::WorkerFailed {
                    worker,
                    message: format!("failed to spawn thread: {err}"),
                }),
            };
            match joined.and_then(|result| result) {
                Ok(result) => {
                    debug!(
                        worker,
                        seed = result.seed,
                        trials = result.trials_run,
                        "worker finished"
                    );
                    results.push(result);
                }
                Err(err) => {
                    if !matches!(err, GachaError::Cancelled) {
                        error!(worker, %err, "worker failed");
                    }
                    failure.get_or_insert(err);
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(results),
        }
    })
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "worker panicked".to_string()
    }
}
