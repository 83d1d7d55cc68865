//! Hard-pity guarantees driven by a roll source that never lands a pickup on
//! its own: every tier roll is 99.9, so only soft pity produces 6★ pulls and
//! every pickup roll misses.

use gacha_core::banner::{BannerConfig, GachaType, Rarity, TargetOperator};
use gacha_core::request::{RotationPityPolicy, SimulationRequest, TrialPlan};
use gacha_core::trial::{run_banner, BannerOutcome, FailureMode};

fn unlucky() -> impl FnMut() -> f64 {
    || 0.999
}

fn run(banner: BannerConfig, policy: RotationPityPolicy) -> BannerOutcome {
    let mut request = SimulationRequest::new(vec![banner], 1).with_seed(0);
    request.rotation_pity = policy;
    let plan = TrialPlan::compile(&request).unwrap();
    run_banner(&plan.banners[0], &mut unlucky(), &mut None)
}

#[test]
fn single_pickup_arrives_with_the_first_six_star_after_150() {
    let banner = BannerConfig::new("single", GachaType::Single)
        .with_max_attempts(300)
        .with_target(TargetOperator::new("Exusiai", Rarity::Six));
    let outcome = run(banner, RotationPityPolicy::default());
    // Soft pity alone yields 6★ on pulls 99 and 198; only the second is past the threshold.
    assert_eq!(outcome.completed_at, Some(198));
    assert_eq!(outcome.pity_awards, vec![198]);
    assert_eq!(outcome.tiers[0].total, 2);
    assert_eq!(outcome.tiers[0].pickup, 1);
}

#[test]
fn collab_guarantee_starts_at_attempt_119() {
    let banner = BannerConfig::new("collab", GachaType::Collab)
        .with_max_attempts(300)
        .with_target(TargetOperator::new("Ash", Rarity::Six));
    let outcome = run(banner, RotationPityPolicy::default());
    assert_eq!(outcome.completed_at, Some(198));
    assert_eq!(outcome.pity_awards, vec![198]);
}

#[test]
fn limited_bonus_completes_the_banner_at_300() {
    let banner = BannerConfig::new("limited", GachaType::Limited)
        .with_max_attempts(400)
        .with_target(TargetOperator::new("Surtr", Rarity::Six).limited());
    let outcome = run(banner, RotationPityPolicy::default());
    assert_eq!(outcome.completed_at, Some(300));
    assert_eq!(outcome.pulls, 300);
    assert_eq!(outcome.pity_awards, vec![300]);
    assert_eq!(outcome.failure, None);
}

#[test]
fn rotation_guarantees_both_pickups_on_natural_six_stars() {
    let banner = BannerConfig::new("rotation", GachaType::Rotation)
        .with_max_attempts(500)
        .with_target(TargetOperator::new("Thorns", Rarity::Six))
        .with_target(TargetOperator::new("Mostima", Rarity::Six));
    let outcome = run(banner, RotationPityPolicy::NextSixStar);
    // 6★ land on pulls 99, 198, 297 and 396; 198 and 396 are past each threshold.
    assert_eq!(outcome.pity_awards, vec![198, 396]);
    assert_eq!(outcome.targets[0].completed_at, Some(198));
    assert_eq!(outcome.targets[1].completed_at, Some(396));
    assert_eq!(outcome.completed_at, Some(396));
}

#[test]
fn rotation_forced_policy_overrides_the_dice() {
    let banner = BannerConfig::new("rotation", GachaType::Rotation)
        .with_max_attempts(500)
        .with_target(TargetOperator::new("Thorns", Rarity::Six))
        .with_target(TargetOperator::new("Mostima", Rarity::Six));
    let outcome = run(banner, RotationPityPolicy::ForcedSixStar);
    assert_eq!(outcome.pity_awards, vec![151, 301]);
    assert_eq!(outcome.completed_at, Some(301));
}

#[test]
fn rotation_without_enough_pulls_fails_on_the_cap() {
    let banner = BannerConfig::new("rotation", GachaType::Rotation)
        .with_max_attempts(300)
        .with_target(TargetOperator::new("Thorns", Rarity::Six))
        .with_target(TargetOperator::new("Mostima", Rarity::Six));
    let outcome = run(banner, RotationPityPolicy::NextSixStar);
    assert_eq!(outcome.failure, Some(FailureMode::MaxAttempts));
    assert_eq!(outcome.targets[0].copies, 1);
    assert_eq!(outcome.targets[1].copies, 0);
}
