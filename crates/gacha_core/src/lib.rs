pub mod archetype;
pub mod banner;
pub mod dispatch;
pub mod error;
pub mod io;
pub mod pity;
pub mod rates;
pub mod reduce;
pub mod request;
pub mod rng;
pub mod trial;
pub mod worker;

use std::sync::atomic::AtomicBool;

use dispatch::{detect_concurrency, recommended_workers, run_threaded, DeviceClass, WorkerPlan};
use error::{GachaError, GachaResult};
use reduce::{reduce, MergedResult};
use request::{SimulationRequest, TrialPlan};
use tracing::{info, warn};
use worker::WorkerResult;

/// How a run is spread over threads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Explicit worker count; the device heuristic decides when absent.
    pub workers: Option<usize>,
    pub device: DeviceClass,
}

impl DispatchSettings {
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| recommended_workers(detect_concurrency(), self.device))
    }
}

/// A validated request with its seeds derived, ready to hand to workers.
#[derive(Clone, Debug)]
pub struct PreparedRun {
    pub plan: TrialPlan,
    pub workers: WorkerPlan,
    pub percentile: f64,
}

impl PreparedRun {
    /// Merge one result per partition into the outward report.
    pub fn finish(&self, results: &[WorkerResult]) -> MergedResult {
        let merged = reduce(results).finalize(self.workers.base_seed, self.percentile);
        info!(
            base_seed = merged.base_seed,
            trials = merged.trial_count,
            success_rate = merged.success_rate,
            mean_pulls = merged.mean_pulls_per_trial,
            "simulation finished"
        );
        merged
    }
}

/// Validate `request`, resolve its base seed and split it into partitions.
///
/// A request without a seed draws one from the operating system here, so
/// the returned plan is always replayable from `workers.base_seed`.
pub fn prepare(request: &SimulationRequest, settings: &DispatchSettings) -> GachaResult<PreparedRun> {
    let plan = TrialPlan::compile(request)?;
    let base_seed = request.seed.unwrap_or_else(rng::entropy_seed);
    let workers = WorkerPlan::new(
        base_seed,
        settings.worker_count(),
        u64::from(request.trial_count),
    )?;
    info!(
        base_seed,
        workers = workers.worker_count(),
        trials = request.trial_count,
        banners = plan.banners.len(),
        "simulation starting"
    );
    Ok(PreparedRun {
        plan,
        workers,
        percentile: request.percentile,
    })
}

/// Run `request` to completion on scoped worker threads.
pub fn simulate(request: &SimulationRequest, settings: &DispatchSettings) -> GachaResult<MergedResult> {
    simulate_with_cancel(request, settings, None)
}

/// [`simulate`], stopping between trials once `cancel` is set.
pub fn simulate_with_cancel(
    request: &SimulationRequest,
    settings: &DispatchSettings,
    cancel: Option<&AtomicBool>,
) -> GachaResult<MergedResult> {
    let prepared = prepare(request, settings)?;
    match run_threaded(&prepared.plan, &prepared.workers, cancel) {
        Ok(results) => Ok(prepared.finish(&results)),
        Err(GachaError::Cancelled) => {
            warn!(base_seed = prepared.workers.base_seed, "simulation cancelled");
            Err(GachaError::Cancelled)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banner::{BannerConfig, GachaType, Rarity, TargetOperator};

    fn request() -> SimulationRequest {
        let banner = BannerConfig::new("single", GachaType::Single)
            .with_max_attempts(250)
            .with_target(TargetOperator::new("SilverAsh", Rarity::Six));
        SimulationRequest::new(vec![banner], 2_000).with_seed(777)
    }

    #[test]
    fn simulate_reports_every_trial_and_seed() {
        let settings = DispatchSettings {
            workers: Some(3),
            device: DeviceClass::Desktop,
        };
        let merged = simulate(&request(), &settings).unwrap();
        assert_eq!(merged.trial_count, 2_000);
        assert_eq!(merged.worker_seeds, rng::derive_worker_seeds(777, 3));
        assert_eq!(merged.banners.len(), 1);
        let banner = &merged.banners[0];
        assert_eq!(banner.totals.trials, 2_000);
        assert_eq!(
            banner.totals.success_histogram.iter().sum::<u64>(),
            banner.totals.success_count
        );
        // Single-banner hard pity guarantees the pickup within 250 pulls.
        assert_eq!(banner.totals.success_count, 2_000);
    }

    #[test]
    fn missing_seed_is_resolved_before_dispatch() {
        let mut request = request();
        request.seed = None;
        request.trial_count = 10;
        let prepared = prepare(&request, &DispatchSettings::default()).unwrap();
        let seeds: Vec<u32> = prepared.workers.partitions.iter().map(|p| p.seed).collect();
        assert_eq!(
            seeds,
            rng::derive_worker_seeds(prepared.workers.base_seed, prepared.workers.worker_count())
        );
    }

    #[test]
    fn configuration_errors_stop_before_any_worker_runs() {
        let mut request = request();
        request.banners[0].min_attempts = 400;
        let err = simulate(&request, &DispatchSettings::default()).unwrap_err();
        assert!(matches!(err, GachaError::AttemptBounds { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn explicit_zero_workers_is_rejected() {
        let settings = DispatchSettings {
            workers: Some(0),
            device: DeviceClass::Mobile,
        };
        let err = simulate(&request(), &settings).unwrap_err();
        assert!(matches!(err, GachaError::NoWorkers));
    }
}
