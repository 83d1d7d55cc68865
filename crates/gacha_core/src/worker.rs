use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{GachaError, GachaResult};
use crate::request::{BannerPlan, TrialPlan};
use crate::rng::{RollSource, Stream};
use crate::trial::{run_trial, BannerOutcome, FailureMode, TierTally};

/// Tier totals summed over trials.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierStats {
    pub total: u64,
    pub pickup: u64,
    pub target: u64,
}

impl TierStats {
    fn add(&mut self, tally: &TierTally) {
        self.total += tally.total;
        self.pickup += tally.pickup;
        self.target += tally.target;
    }

    fn merge(&mut self, other: &TierStats) {
        self.total += other.total;
        self.pickup += other.pickup;
        self.target += other.target;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RarityStats {
    pub six: TierStats,
    pub five: TierStats,
    pub four: TierStats,
}

impl RarityStats {
    fn tiers_mut(&mut self) -> [&mut TierStats; 3] {
        [&mut self.six, &mut self.five, &mut self.four]
    }
}

/// Per-target sums over trials.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetStats {
    pub name: String,
    pub goal: u32,
    /// Trials in which at least one copy arrived.
    pub obtained: u64,
    /// Trials in which the goal count was reached.
    pub completed: u64,
    pub copies: u64,
    /// Index = pulls consumed when the goal was reached.
    pub completion_histogram: Vec<u64>,
}

/// Running sums for one banner across every trial a worker runs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerAccumulator {
    pub banner_id: String,
    pub trials: u64,
    pub success_count: u64,
    pub total_pulls: u64,
    pub currency_spent: u64,
    pub rarity: RarityStats,
    /// Index = pulls consumed when the banner's goals were all met.
    pub success_histogram: Vec<u64>,
    /// Index = pulls consumed when a hard-pity award or bonus was granted.
    pub pity_histogram: Vec<u64>,
    pub targets: Vec<TargetStats>,
    pub currency_shortage_failures: u64,
    pub max_attempts_failures: u64,
}

impl BannerAccumulator {
    pub fn for_banner(banner: &BannerPlan) -> Self {
        Self {
            banner_id: banner.id.clone(),
            targets: banner
                .targets
                .iter()
                .map(|target| TargetStats {
                    name: target.name.clone(),
                    goal: target.goal,
                    ..TargetStats::default()
                })
                .collect(),
            ..Self::default()
        }
    }

    /// Fold one banner outcome into the sums.
    pub fn record(&mut self, outcome: &BannerOutcome) {
        self.trials += 1;
        self.total_pulls += u64::from(outcome.pulls);
        self.currency_spent += outcome.currency_spent;
        for (stats, tally) in self.rarity.tiers_mut().into_iter().zip(&outcome.tiers) {
            stats.add(tally);
        }

        if let Some(pulls) = outcome.completed_at {
            self.success_count += 1;
            bump(&mut self.success_histogram, pulls);
        }
        for pulls in &outcome.pity_awards {
            bump(&mut self.pity_histogram, *pulls);
        }
        match outcome.failure {
            Some(FailureMode::CurrencyShortage) => self.currency_shortage_failures += 1,
            Some(FailureMode::MaxAttempts) => self.max_attempts_failures += 1,
            None => {}
        }

        for (stats, progress) in self.targets.iter_mut().zip(&outcome.targets) {
            stats.copies += u64::from(progress.copies);
            if progress.first_obtained_at.is_some() {
                stats.obtained += 1;
            }
            if let Some(pulls) = progress.completed_at {
                stats.completed += 1;
                bump(&mut stats.completion_histogram, pulls);
            }
        }
    }

    /// Add `other` into `self`. Commutative and associative.
    pub fn merge(&mut self, other: &BannerAccumulator) {
        if self.banner_id.is_empty() {
            self.banner_id = other.banner_id.clone();
        }
        self.trials += other.trials;
        self.success_count += other.success_count;
        self.total_pulls += other.total_pulls;
        self.currency_spent += other.currency_spent;
        self.rarity.six.merge(&other.rarity.six);
        self.rarity.five.merge(&other.rarity.five);
        self.rarity.four.merge(&other.rarity.four);
        merge_histograms(&mut self.success_histogram, &other.success_histogram);
        merge_histograms(&mut self.pity_histogram, &other.pity_histogram);
        self.currency_shortage_failures += other.currency_shortage_failures;
        self.max_attempts_failures += other.max_attempts_failures;

        for (index, theirs) in other.targets.iter().enumerate() {
            match self.targets.get_mut(index) {
                Some(ours) => {
                    ours.obtained += theirs.obtained;
                    ours.completed += theirs.completed;
                    ours.copies += theirs.copies;
                    merge_histograms(&mut ours.completion_histogram, &theirs.completion_histogram);
                }
                None => self.targets.push(theirs.clone()),
            }
        }
    }
}

/// Everything one worker produced. Workers never share or merge these
/// while running.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResult {
    pub worker: usize,
    pub seed: u32,
    pub trials_run: u64,
    pub trials_succeeded: u64,
    pub total_pulls: u64,
    pub banners: Vec<BannerAccumulator>,
}

/// Run `trials` trials of `plan` on the stream seeded with `seed`.
///
/// `cancel` is polled between trials, never inside one.
pub fn run_worker(
    plan: &TrialPlan,
    worker: usize,
    seed: u32,
    trials: u64,
    cancel: Option<&AtomicBool>,
) -> GachaResult<WorkerResult> {
    let mut rng = Stream::from_seed(seed);
    run_worker_with(plan, worker, seed, trials, &mut rng, cancel)
}

/// [`run_worker`] with an explicit roll source.
pub fn run_worker_with<R: RollSource>(
    plan: &TrialPlan,
    worker: usize,
    seed: u32,
    trials: u64,
    rng: &mut R,
    cancel: Option<&AtomicBool>,
) -> GachaResult<WorkerResult> {
    let mut result = WorkerResult {
        worker,
        seed,
        banners: plan.banners.iter().map(BannerAccumulator::for_banner).collect(),
        ..WorkerResult::default()
    };

    for _ in 0..trials {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Err(GachaError::Cancelled);
        }
        let trial = run_trial(plan, rng);
        result.trials_run += 1;
        result.total_pulls += trial.pulls();
        if trial.succeeded() {
            result.trials_succeeded += 1;
        }
        for (accumulator, outcome) in result.banners.iter_mut().zip(&trial.banners) {
            accumulator.record(outcome);
        }
    }

    Ok(result)
}

pub(crate) fn bump(histogram: &mut Vec<u64>, index: u32) {
    let index = index as usize;
    if histogram.len() <= index {
        histogram.resize(index + 1, 0);
    }
    histogram[index] += 1;
}

/// Elementwise sum; bins missing on either side count as zero.
pub fn merge_histograms(into: &mut Vec<u64>, other: &[u64]) {
    if into.len() < other.len() {
        into.resize(other.len(), 0);
    }
    for (slot, value) in into.iter_mut().zip(other) {
        *slot += value;
    }
}
