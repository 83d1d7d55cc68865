//! Pickup assignment and hard-pity rules per banner archetype.
//!
//! Soft pity is shared by every banner type and lives in [`crate::pity`].
//! What differs is what happens once a tier has been rolled: which pickup
//! slot (if any) the pull lands on, and when a guarantee overrides the dice.
//! Each archetype is one arm of the `match` in [`resolve`].

use crate::banner::{GachaType, PickupChances, Rarity, SlotCaps};
use crate::pity::PityState;
use crate::request::RotationPityPolicy;
use crate::rng::RollSource;

/// `single`: a 6★ after this attempt index lands on the pickup if it is still missing.
pub const SINGLE_PITY_AFTER: u32 = 149;
/// `collab`: from this attempt index on, the next 6★ lands on the missing pickup.
pub const COLLAB_PITY_FROM: u32 = 119;
/// `rotation`: first and second pity thresholds (exclusive attempt indices).
pub const ROTATION_PITY_AFTER: [u32; 2] = [149, 299];
/// `limited`: attempt index at which the bonus limited 6★ is granted.
pub const LIMITED_BONUS_AT: u32 = 299;

/// Rules of one banner resolved from its configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BannerRules {
    pub kind: GachaType,
    pub chances: PickupChances,
    pub caps: SlotCaps,
    pub rotation_pity: RotationPityPolicy,
}

impl BannerRules {
    pub fn new(kind: GachaType, chances: PickupChances, rotation_pity: RotationPityPolicy) -> Self {
        Self {
            kind,
            chances,
            caps: kind.slot_caps(),
            rotation_pity,
        }
    }
}

/// Outcome of assigning a rolled tier to a pickup slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RollResult {
    /// Tier actually awarded; differs from the rolled tier only when a
    /// guarantee forces a 6★.
    pub rarity: Rarity,
    /// Pickup slot within `rarity` the pull landed on.
    pub slot: Option<usize>,
    pub is_pickup: bool,
    /// A hard-pity guarantee decided this pull.
    pub pity_forced: bool,
}

impl RollResult {
    fn off_banner(rarity: Rarity) -> Self {
        Self {
            rarity,
            slot: None,
            is_pickup: false,
            pity_forced: false,
        }
    }

    fn pickup(rarity: Rarity, slot: usize) -> Self {
        Self {
            rarity,
            slot: Some(slot),
            is_pickup: true,
            pity_forced: false,
        }
    }

    fn forced(slot: usize) -> Self {
        Self {
            rarity: Rarity::Six,
            slot: Some(slot),
            is_pickup: true,
            pity_forced: true,
        }
    }
}

/// Decide which pickup slot a pull of `rolled` at `attempt` lands on.
///
/// Guarantees that fire update `pity.pity_rewards_granted`; soft-pity counters
/// are left to the caller, which records the returned tier afterwards.
pub fn resolve<R: RollSource>(
    rules: &BannerRules,
    rolled: Rarity,
    attempt: u32,
    pity: &mut PityState,
    rng: &mut R,
) -> RollResult {
    match rules.kind {
        GachaType::Single => {
            if rolled == Rarity::Six && attempt > SINGLE_PITY_AFTER && pity.pity_rewards_granted == 0 {
                if let Some(slot) = pity.first_unobtained_slot(Rarity::Six) {
                    pity.grant_pity();
                    return RollResult::forced(slot);
                }
            }
            even_split(rules, rolled, pity, rng)
        }
        GachaType::Limited | GachaType::Contract | GachaType::Orient => {
            even_split(rules, rolled, pity, rng)
        }
        GachaType::Collab => {
            if rolled == Rarity::Six && attempt >= COLLAB_PITY_FROM && pity.pity_rewards_granted == 0 {
                if let Some(slot) = pity.first_unobtained_slot(Rarity::Six) {
                    pity.grant_pity();
                    return RollResult::forced(slot);
                }
            }
            let result = even_split(rules, rolled, pity, rng);
            if result.is_pickup && rolled == Rarity::Five {
                return RollResult::pickup(Rarity::Five, collab_five_star_slot(pity, result));
            }
            result
        }
        GachaType::Rotation => rotation(rules, rolled, attempt, pity, rng),
    }
}

/// Attempt indices at which the archetype hands out a free unit on top of
/// the pull itself.
pub fn milestone_bonus(rules: &BannerRules, attempt: u32) -> Option<Rarity> {
    match rules.kind {
        GachaType::Limited if attempt == LIMITED_BONUS_AT => Some(Rarity::Six),
        _ => None,
    }
}

fn rotation<R: RollSource>(
    rules: &BannerRules,
    rolled: Rarity,
    attempt: u32,
    pity: &mut PityState,
    rng: &mut R,
) -> RollResult {
    let granted = pity.pity_rewards_granted;
    let armed = (granted < 1 && attempt > ROTATION_PITY_AFTER[0])
        || (granted < 2 && attempt > ROTATION_PITY_AFTER[1]);
    if !armed {
        return even_split(rules, rolled, pity, rng);
    }

    match rules.rotation_pity {
        RotationPityPolicy::NextSixStar => {
            if rolled == Rarity::Six {
                if let Some(slot) = pity.first_unobtained_slot(Rarity::Six) {
                    pity.grant_pity();
                    return RollResult::forced(slot);
                }
            }
            even_split(rules, rolled, pity, rng)
        }
        RotationPityPolicy::ForcedSixStar => {
            let slot = match pity.first_unobtained_slot(Rarity::Six) {
                Some(slot) => slot,
                None => pick_slot(pity.slot_count(Rarity::Six), rng),
            };
            pity.grant_pity();
            RollResult::forced(slot)
        }
    }
}

/// With exactly one 5★ pickup still missing, a 5★ pickup hit goes to it.
fn collab_five_star_slot(pity: &PityState, rolled: RollResult) -> usize {
    let slots = pity.slot_count(Rarity::Five);
    let drawn = rolled.slot.unwrap_or(0);
    if slots >= 2 && pity.obtained_count(Rarity::Five) == slots - 1 {
        return pity.first_unobtained_slot(Rarity::Five).unwrap_or(drawn);
    }
    drawn
}

/// Pickup roll followed by a uniform choice among the tier's pickup slots.
fn even_split<R: RollSource>(
    rules: &BannerRules,
    rolled: Rarity,
    pity: &PityState,
    rng: &mut R,
) -> RollResult {
    let slots = pity.slot_count(rolled);
    if slots == 0 {
        return RollResult::off_banner(rolled);
    }
    let chance = rules.chances.for_rarity(rolled);
    let on_banner = chance >= 100.0 || rng.next_percent() < chance;
    if !on_banner {
        return RollResult::off_banner(rolled);
    }
    RollResult::pickup(rolled, pick_slot(slots, rng))
}

fn pick_slot<R: RollSource>(slots: usize, rng: &mut R) -> usize {
    if slots <= 1 {
        return 0;
    }
    ((rng.next_unit() * slots as f64) as usize).min(slots - 1)
}
