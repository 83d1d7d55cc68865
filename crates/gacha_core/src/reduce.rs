//! Folding worker results into the single report handed to callers.
//!
//! The combine is commutative and associative: counters add, histograms add
//! elementwise with missing bins treated as zero, and worker seeds are kept
//! ordered by worker index no matter which result arrives first. Percentile
//! fields are derived once, after the fold, in [`Aggregate::finalize`].

use serde::{Deserialize, Serialize};

use crate::rates::ratio;
use crate::worker::{BannerAccumulator, WorkerResult};

/// Running fold of any number of [`WorkerResult`]s.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Aggregate {
    /// `(worker index, seed)`, sorted.
    pub worker_seeds: Vec<(usize, u32)>,
    pub trials_run: u64,
    pub trials_succeeded: u64,
    pub total_pulls: u64,
    pub banners: Vec<BannerAccumulator>,
}

impl Aggregate {
    pub fn absorb(&mut self, result: &WorkerResult) {
        self.insert_seed(result.worker, result.seed);
        self.trials_run += result.trials_run;
        self.trials_succeeded += result.trials_succeeded;
        self.total_pulls += result.total_pulls;
        self.merge_banners(&result.banners);
    }

    pub fn combine(mut self, other: &Aggregate) -> Aggregate {
        for (worker, seed) in &other.worker_seeds {
            self.insert_seed(*worker, *seed);
        }
        self.trials_run += other.trials_run;
        self.trials_succeeded += other.trials_succeeded;
        self.total_pulls += other.total_pulls;
        self.merge_banners(&other.banners);
        self
    }

    fn insert_seed(&mut self, worker: usize, seed: u32) {
        let at = self
            .worker_seeds
            .partition_point(|entry| *entry <= (worker, seed));
        self.worker_seeds.insert(at, (worker, seed));
    }

    fn merge_banners(&mut self, banners: &[BannerAccumulator]) {
        for (index, theirs) in banners.iter().enumerate() {
            match self.banners.get_mut(index) {
                Some(ours) => ours.merge(theirs),
                None => self.banners.push(theirs.clone()),
            }
        }
    }

    /// Derive rates and percentile fields. `percentile` is the share of
    /// successful trials, from the top of the histogram, the cutoff must cover.
    pub fn finalize(self, base_seed: u32, percentile: f64) -> MergedResult {
        let banners = self
            .banners
            .into_iter()
            .map(|totals| BannerReport::from_totals(totals, percentile))
            .collect();
        MergedResult {
            base_seed,
            worker_count: self.worker_seeds.len(),
            worker_seeds: self.worker_seeds.into_iter().map(|(_, seed)| seed).collect(),
            trial_count: self.trials_run,
            trials_succeeded: self.trials_succeeded,
            success_rate: ratio(self.trials_succeeded, self.trials_run),
            total_pulls: self.total_pulls,
            mean_pulls_per_trial: ratio(self.total_pulls, self.trials_run),
            percentile,
            banners,
        }
    }
}

/// Fold every result into one [`Aggregate`].
pub fn reduce<'a, I>(results: I) -> Aggregate
where
    I: IntoIterator<Item = &'a WorkerResult>,
{
    results.into_iter().fold(Aggregate::default(), |mut acc, result| {
        acc.absorb(result);
        acc
    })
}

/// The only object exposed outward after a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedResult {
    pub base_seed: u32,
    /// Seed of each worker, in worker-index order.
    pub worker_seeds: Vec<u32>,
    pub worker_count: usize,
    pub trial_count: u64,
    pub trials_succeeded: u64,
    pub success_rate: f64,
    pub total_pulls: u64,
    pub mean_pulls_per_trial: f64,
    pub percentile: f64,
    pub banners: Vec<BannerReport>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerReport {
    #[serde(flatten)]
    pub totals: BannerAccumulator,
    pub success_rate: f64,
    pub mean_pulls: f64,
    /// Mean pulls consumed by the trials that met every goal.
    pub mean_pulls_to_success: f64,
    pub cutoff_index: usize,
    pub cumulative_at_cutoff: u64,
    pub min_index: usize,
    pub max_index: usize,
}

impl BannerReport {
    fn from_totals(totals: BannerAccumulator, percentile: f64) -> Self {
        let (cutoff_index, cumulative_at_cutoff) =
            percentile_cutoff(&totals.success_histogram, percentile);
        let (min_index, max_index) = nonzero_bounds(&totals.success_histogram);
        Self {
            success_rate: ratio(totals.success_count, totals.trials),
            mean_pulls: ratio(totals.total_pulls, totals.trials),
            mean_pulls_to_success: histogram_mean(&totals.success_histogram),
            cutoff_index,
            cumulative_at_cutoff,
            min_index,
            max_index,
            totals,
        }
    }
}

/// Walk `histogram` from the highest bin down and return the smallest index
/// whose cumulative mass (bins `0..=index`) still covers `percentile` percent
/// of the total, with that cumulative mass. An empty histogram yields `(0, 0)`.
pub fn percentile_cutoff(histogram: &[u64], percentile: f64) -> (usize, u64) {
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return (0, 0);
    }
    let needed = total as f64 * percentile / 100.0;
    let mut covered = total;
    let mut cutoff = (histogram.len() - 1, total);
    for (index, count) in histogram.iter().enumerate().rev() {
        if (covered as f64) < needed {
            break;
        }
        cutoff = (index, covered);
        covered -= count;
    }
    cutoff
}

/// First and last nonzero bins, `(0, 0)` when there are none.
pub fn nonzero_bounds(histogram: &[u64]) -> (usize, usize) {
    let first = histogram.iter().position(|count| *count > 0);
    let last = histogram.iter().rposition(|count| *count > 0);
    match (first, last) {
        (Some(first), Some(last)) => (first, last),
        _ => (0, 0),
    }
}

pub fn histogram_mean(histogram: &[u64]) -> f64 {
    let (weighted, total) = histogram
        .iter()
        .enumerate()
        .fold((0u64, 0u64), |(weighted, total), (index, count)| {
            (weighted + index as u64 * count, total + count)
        });
    ratio(weighted, total)
}
