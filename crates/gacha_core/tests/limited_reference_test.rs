//! Monte Carlo mean against an exact expectation for a limited banner.

use gacha_core::banner::{BannerConfig, GachaType, PickupChances, Rarity, TargetOperator};
use gacha_core::dispatch::DeviceClass;
use gacha_core::rates::six_star_rate;
use gacha_core::request::SimulationRequest;
use gacha_core::{simulate, DispatchSettings};

const MAX_ATTEMPTS: usize = 300;
const MISS_STATES: usize = 99;

/// Exact mean pulls to obtain the target by dynamic programming over the
/// consecutive-miss counter. `hit` is the chance that a 6★ is the target.
fn expected_pulls(hit: f64) -> f64 {
    let mut alive = vec![0.0; MISS_STATES];
    alive[0] = 1.0;
    let mut mean = 0.0;
    for attempt in 0..MAX_ATTEMPTS {
        let mut next = vec![0.0; MISS_STATES];
        for (misses, mass) in alive.iter().enumerate() {
            let six = f64::from(six_star_rate(misses as u32)) / 100.0;
            mean += mass * six * hit * (attempt + 1) as f64;
            next[0] += mass * six * (1.0 - hit);
            if misses + 1 < MISS_STATES {
                next[misses + 1] += mass * (1.0 - six);
            }
        }
        alive = next;
    }
    // Whatever is left receives the bonus copy on the last pull.
    mean + alive.iter().sum::<f64>() * MAX_ATTEMPTS as f64
}

#[test]
fn limited_mean_matches_exact_expectation() {
    let banner = BannerConfig::new("limited", GachaType::Limited)
        .with_max_attempts(MAX_ATTEMPTS as u32)
        .with_pickup_chance(PickupChances::new(70.0, 50.0, 0.0))
        .with_target(TargetOperator::new("Nian", Rarity::Six).limited());
    let request = SimulationRequest::new(vec![banner], 100_000).with_seed(20_240_501);
    let settings = DispatchSettings {
        workers: Some(4),
        device: DeviceClass::Desktop,
    };
    let merged = simulate(&request, &settings).unwrap();
    let report = &merged.banners[0];

    assert_eq!(report.success_rate, 1.0);
    assert_eq!(report.max_index, MAX_ATTEMPTS);

    // Two limited 6★ pickup slots share the 70% pickup chance.
    let reference = expected_pulls(0.7 / 2.0);
    assert!((reference - 95.7).abs() < 0.5, "reference {reference}");
    let error = (report.mean_pulls_to_success - reference).abs() / reference;
    assert!(
        error < 0.03,
        "simulated {} vs exact {reference}",
        report.mean_pulls_to_success
    );
    assert!(report.cutoff_index > 200 && report.cutoff_index <= MAX_ATTEMPTS);
}
