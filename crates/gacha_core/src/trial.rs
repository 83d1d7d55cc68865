//! One trial: a full pass over every active banner in order.
//!
//! Banners share nothing but the worker's roll source and, in
//! resource-consumption mode, the trial's currency wallet. Each banner run
//! owns a fresh [`PityState`] and per-target progress that are dropped when
//! the banner finishes.

use crate::archetype::{milestone_bonus, resolve};
use crate::banner::{OperatorRole, Rarity};
use crate::pity::PityState;
use crate::request::{BannerPlan, SimulationMode, TrialPlan};
use crate::rng::RollSource;

/// Why a banner stopped before reaching its goals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureMode {
    CurrencyShortage,
    MaxAttempts,
}

/// Pull counts for one tier during one banner run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TierTally {
    pub total: u64,
    pub pickup: u64,
    pub target: u64,
}

/// Progress of one target operator during one banner run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TargetProgress {
    pub copies: u32,
    /// Pulls consumed when the first copy arrived.
    pub first_obtained_at: Option<u32>,
    /// Pulls consumed when the goal count was reached.
    pub completed_at: Option<u32>,
}

/// Result of one banner within one trial.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BannerOutcome {
    pub pulls: u32,
    /// Pulls consumed when every target reached its goal.
    pub completed_at: Option<u32>,
    pub failure: Option<FailureMode>,
    /// Indexed by [`Rarity::tier_index`].
    pub tiers: [TierTally; 3],
    pub targets: Vec<TargetProgress>,
    /// Pulls consumed at each hard-pity award or milestone bonus.
    pub pity_awards: Vec<u32>,
    pub currency_spent: u64,
}

impl BannerOutcome {
    pub fn succeeded(&self) -> bool {
        self.completed_at.is_some()
    }

    fn tally(&mut self, rarity: Rarity, is_pickup: bool, is_target: bool) {
        if let Some(tier) = rarity.tier_index() {
            let tally = &mut self.tiers[tier];
            tally.total += 1;
            tally.pickup += u64::from(is_pickup);
            tally.target += u64::from(is_target);
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrialOutcome {
    pub banners: Vec<BannerOutcome>,
}

impl TrialOutcome {
    /// A trial succeeds only when every banner in it succeeded.
    pub fn succeeded(&self) -> bool {
        self.banners.iter().all(BannerOutcome::succeeded)
    }

    pub fn pulls(&self) -> u64 {
        self.banners.iter().map(|banner| u64::from(banner.pulls)).sum()
    }
}

/// Run every banner of `plan` once, drawing rolls from `rng`.
pub fn run_trial<R: RollSource>(plan: &TrialPlan, rng: &mut R) -> TrialOutcome {
    let mut wallet = match plan.mode {
        SimulationMode::Probability => None,
        SimulationMode::ResourceConsumption => Some(plan.initial_currency),
    };
    let banners = plan
        .banners
        .iter()
        .map(|banner| run_banner(banner, rng, &mut wallet))
        .collect();
    TrialOutcome { banners }
}

/// Pull on one banner until its goals are met, its cap is hit, or the wallet
/// runs dry. `wallet` is `None` when pulls are free.
pub fn run_banner<R: RollSource>(
    banner: &BannerPlan,
    rng: &mut R,
    wallet: &mut Option<u64>,
) -> BannerOutcome {
    if let Some(funds) = wallet.as_mut() {
        *funds = funds.saturating_add(banner.starting_currency);
    }

    let mut pity = PityState::new(banner.rules.caps);
    let mut outcome = BannerOutcome {
        targets: vec![TargetProgress::default(); banner.targets.len()],
        ..BannerOutcome::default()
    };
    if banner.targets.is_empty() {
        outcome.completed_at = Some(0);
    }

    let mut attempt: u32 = 0;
    loop {
        if outcome.succeeded() && attempt >= banner.min_attempts {
            break;
        }
        if banner.max_attempts.is_some_and(|max| attempt >= max) {
            outcome.failure = Some(FailureMode::MaxAttempts);
            break;
        }
        if let Some(funds) = wallet.as_mut() {
            if *funds < banner.per_pull_cost {
                outcome.failure = Some(FailureMode::CurrencyShortage);
                break;
            }
            *funds -= banner.per_pull_cost;
            outcome.currency_spent += banner.per_pull_cost;
        }

        pity.attempt = attempt;
        let rolled = pity.classify(rng.next_percent());
        let result = resolve(&banner.rules, rolled, attempt, &mut pity, rng);
        pity.record(result.rarity);
        let pulls = attempt + 1;
        outcome.pulls = pulls;

        let credited = result.slot.and_then(|slot| {
            pity.mark_slot(result.rarity, slot);
            banner.target_for_slot(result.rarity, slot)
        });
        outcome.tally(result.rarity, result.is_pickup, credited.is_some());
        if let Some(index) = credited {
            credit(banner, &mut outcome, index, pulls);
        }
        if result.pity_forced {
            outcome.pity_awards.push(pulls);
        }

        if let Some(rarity) = milestone_bonus(&banner.rules, attempt) {
            let bonus_target = milestone_target(banner, &outcome, rarity);
            if let Some(index) = bonus_target {
                pity.mark_slot(rarity, banner.targets[index].slot);
                credit(banner, &mut outcome, index, pulls);
            }
            outcome.tally(rarity, true, bonus_target.is_some());
            outcome.pity_awards.push(pulls);
        }

        if outcome.completed_at.is_none() && all_complete(banner, &outcome) {
            outcome.completed_at = Some(pulls);
        }
        attempt = pulls;
    }

    if outcome.succeeded() {
        outcome.failure = None;
    }
    outcome
}

fn credit(banner: &BannerPlan, outcome: &mut BannerOutcome, index: usize, pulls: u32) {
    let goal = banner.targets[index].goal;
    let progress = &mut outcome.targets[index];
    progress.copies += 1;
    if progress.first_obtained_at.is_none() {
        progress.first_obtained_at = Some(pulls);
    }
    if progress.completed_at.is_none() && progress.copies >= goal {
        progress.completed_at = Some(pulls);
    }
}

fn all_complete(banner: &BannerPlan, outcome: &BannerOutcome) -> bool {
    banner
        .targets
        .iter()
        .zip(&outcome.targets)
        .all(|(target, progress)| progress.copies >= target.goal)
}

/// Limited-role target of `rarity` that receives a milestone bonus: the first
/// one still short of its goal, else the first one at all.
fn milestone_target(banner: &BannerPlan, outcome: &BannerOutcome, rarity: Rarity) -> Option<usize> {
    let mut candidates = banner
        .targets
        .iter()
        .enumerate()
        .filter(|(_, target)| target.rarity == rarity && target.role == OperatorRole::Limited);
    let first = candidates.clone().next().map(|(index, _)| index);
    candidates
        .find(|(index, target)| outcome.targets[*index].copies < target.goal)
        .map(|(index, _)| index)
        .or(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banner::{BannerConfig, GachaType, TargetOperator};
    use crate::request::SimulationRequest;
    use crate::rng::Stream;

    fn plan(banners: Vec<BannerConfig>) -> TrialPlan {
        TrialPlan::compile(&SimulationRequest::new(banners, 1).with_seed(0)).unwrap()
    }

    #[test]
    fn banner_without_targets_succeeds_without_pulling() {
        let plan = plan(vec![BannerConfig::new("empty", GachaType::Single)]);
        let mut rng = Stream::from_seed(3);
        let trial = run_trial(&plan, &mut rng);
        assert!(trial.succeeded());
        assert_eq!(trial.banners[0].pulls, 0);
        assert_eq!(trial.banners[0].completed_at, Some(0));
    }

    #[test]
    fn minimum_attempts_keep_pulling_after_success() {
        let mut banner = BannerConfig::new("spend", GachaType::Contract).with_max_attempts(50);
        banner.min_attempts = 40;
        let plan = plan(vec![banner]);
        let mut rng = Stream::from_seed(11);
        let trial = run_trial(&plan, &mut rng);
        assert_eq!(trial.banners[0].pulls, 40);
        assert_eq!(trial.banners[0].completed_at, Some(0));
    }

    #[test]
    fn attempt_cap_is_recorded_as_failure() {
        let banner = BannerConfig::new("cap", GachaType::Single)
            .with_max_attempts(5)
            .with_target(TargetOperator::new("Ch'en", Rarity::Six));
        let plan = plan(vec![banner]);
        let mut rng = || 0.999;
        let outcome = run_banner(&plan.banners[0], &mut rng, &mut None);
        assert_eq!(outcome.pulls, 5);
        assert_eq!(outcome.failure, Some(FailureMode::MaxAttempts));
        assert!(!outcome.succeeded());
        assert_eq!(outcome.tiers[0].total, 0);
    }

    #[test]
    fn empty_wallet_is_recorded_as_currency_shortage() {
        let banner = BannerConfig::new("broke", GachaType::Single)
            .with_max_attempts(300)
            .with_target(TargetOperator::new("Ch'en", Rarity::Six));
        let plan = plan(vec![banner]);
        let mut rng = || 0.999;
        let mut wallet = Some(1_900);
        let outcome = run_banner(&plan.banners[0], &mut rng, &mut wallet);
        assert_eq!(outcome.pulls, 3);
        assert_eq!(outcome.failure, Some(FailureMode::CurrencyShortage));
        assert_eq!(outcome.currency_spent, 1_800);
        assert_eq!(wallet, Some(100));
    }

    #[test]
    fn wallet_carries_over_between_banners() {
        let mut first = BannerConfig::new("first", GachaType::Contract).with_max_attempts(10);
        first.min_attempts = 2;
        let mut second = BannerConfig::new("second", GachaType::Contract).with_max_attempts(10);
        second.min_attempts = 3;
        second.starting_currency = 600;
        let request = SimulationRequest::new(vec![first, second], 1).with_resources(3_000);
        let plan = TrialPlan::compile(&request).unwrap();
        let mut rng = Stream::from_seed(5);
        let trial = run_trial(&plan, &mut rng);
        assert_eq!(trial.banners[0].currency_spent, 1_200);
        assert_eq!(trial.banners[1].currency_spent, 1_800);
        assert_eq!(trial.pulls(), 5);
        assert!(trial.succeeded());
    }

    #[test]
    fn duplicates_count_toward_goals() {
        let banner = BannerConfig::new("dupes", GachaType::Contract)
            .with_max_attempts(1_000)
            .with_target(TargetOperator::new("W", Rarity::Six).with_goal(2));
        let plan = plan(vec![banner]);
        // Every pull is a 6★ on slot 0 of the contract banner.
        let mut rng = || 0.0;
        let outcome = run_banner(&plan.banners[0], &mut rng, &mut None);
        assert_eq!(outcome.pulls, 2);
        assert_eq!(outcome.completed_at, Some(2));
        assert_eq!(outcome.targets[0].first_obtained_at, Some(1));
        assert_eq!(outcome.targets[0].copies, 2);
        assert_eq!(outcome.tiers[0], TierTally { total: 2, pickup: 2, target: 2 });
    }

    #[test]
    fn limited_bonus_prefers_unfinished_limited_targets() {
        let banner = BannerConfig::new("lim", GachaType::Limited)
            .with_max_attempts(300)
            .with_target(TargetOperator::new("Normal", Rarity::Six))
            .with_target(TargetOperator::new("Limited", Rarity::Six).limited());
        let plan = plan(vec![banner]);
        let mut rng = || 0.999;
        let outcome = run_banner(&plan.banners[0], &mut rng, &mut None);
        assert_eq!(outcome.pulls, 300);
        assert_eq!(outcome.targets[1].completed_at, Some(300));
        assert_eq!(outcome.targets[0].copies, 0);
        assert_eq!(outcome.failure, Some(FailureMode::MaxAttempts));
        assert_eq!(outcome.pity_awards, vec![300]);
    }
}
