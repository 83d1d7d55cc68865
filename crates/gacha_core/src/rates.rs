/// Base 6★ probability in percentage points.
pub const BASE_SIX_RATE: u32 = 2;

/// Width of the 5★ band that follows the 6★ band on the roll line.
pub const FIVE_STAR_BAND: u32 = 8;

/// Width of the 4★ band that follows the 5★ band on the roll line.
pub const FOUR_STAR_BAND: u32 = 50;

/// Consecutive 6★ misses after which every further miss raises the rate.
pub const SOFT_PITY_THRESHOLD: u32 = 50;

/// Rate increase per consecutive miss once soft pity is active.
pub const SOFT_PITY_STEP: u32 = 2;

/// Upper bound for any rate expressed in percentage points.
pub const RATE_CEILING: u32 = 100;

/// Goal count meaning "every duplicate the game lets you use".
pub const MAX_GOAL: u8 = 6;

/// 6★ rate in effect for the next pull after `misses` consecutive non-6★ pulls.
pub fn six_star_rate(misses: u32) -> u32 {
    if misses < SOFT_PITY_THRESHOLD {
        return BASE_SIX_RATE;
    }
    let steps = misses - (SOFT_PITY_THRESHOLD - 1);
    BASE_SIX_RATE
        .saturating_add(steps.saturating_mul(SOFT_PITY_STEP))
        .min(RATE_CEILING)
}

/// Divide two counters, yielding 0 instead of NaN or infinity.
pub fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64
}

/// [`ratio`] expressed in percent.
pub fn percent(numerator: u64, denominator: u64) -> f64 {
    ratio(numerator, denominator) * 100.0
}
