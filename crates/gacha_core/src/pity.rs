//! Per-banner soft-pity counters.
//!
//! A [`PityState`] lives on the stack of a single banner run inside a single
//! trial. It is never shared between trials or workers.

use crate::banner::{Rarity, SlotCaps};
use crate::rates::{six_star_rate, BASE_SIX_RATE, FIVE_STAR_BAND, FOUR_STAR_BAND};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PityState {
    pub consecutive_misses: u32,
    /// 6★ probability for the next pull, in percentage points.
    pub adjusted_rate: u32,
    /// Hard-pity awards already granted on this banner.
    pub pity_rewards_granted: u32,
    pub attempt: u32,
    /// Pickup slots hit at least once during this banner run, per tier.
    slots_obtained: [Vec<bool>; 3],
}

impl PityState {
    pub fn new(caps: SlotCaps) -> Self {
        Self {
            consecutive_misses: 0,
            adjusted_rate: BASE_SIX_RATE,
            pity_rewards_granted: 0,
            attempt: 0,
            slots_obtained: [
                vec![false; caps.six],
                vec![false; caps.five],
                vec![false; caps.four],
            ],
        }
    }

    /// Map a roll in `[0, 100)` onto the rarity bands.
    pub fn classify(&self, roll: f64) -> Rarity {
        let six = f64::from(self.adjusted_rate);
        let five = six + f64::from(FIVE_STAR_BAND);
        let four = five + f64::from(FOUR_STAR_BAND);
        if roll < six {
            Rarity::Six
        } else if roll < five {
            Rarity::Five
        } else if roll < four {
            Rarity::Four
        } else {
            Rarity::Three
        }
    }

    /// Advance the soft-pity counters after a pull of `rarity`.
    pub fn record(&mut self, rarity: Rarity) {
        if rarity == Rarity::Six {
            self.consecutive_misses = 0;
        } else {
            self.consecutive_misses = self.consecutive_misses.saturating_add(1);
        }
        self.adjusted_rate = six_star_rate(self.consecutive_misses);
    }

    pub fn grant_pity(&mut self) {
        self.pity_rewards_granted += 1;
    }

    pub fn mark_slot(&mut self, rarity: Rarity, slot: usize) {
        if let Some(flag) = self.tier_slots_mut(rarity).and_then(|slots| slots.get_mut(slot)) {
            *flag = true;
        }
    }

    pub fn slot_count(&self, rarity: Rarity) -> usize {
        self.tier_slots(rarity).map_or(0, <[bool]>::len)
    }

    pub fn obtained_count(&self, rarity: Rarity) -> usize {
        self.tier_slots(rarity)
            .map_or(0, |slots| slots.iter().filter(|hit| **hit).count())
    }

    pub fn first_unobtained_slot(&self, rarity: Rarity) -> Option<usize> {
        self.tier_slots(rarity)
            .and_then(|slots| slots.iter().position(|hit| !*hit))
    }

    fn tier_slots(&self, rarity: Rarity) -> Option<&[bool]> {
        rarity
            .tier_index()
            .map(|tier| self.slots_obtained[tier].as_slice())
    }

    fn tier_slots_mut(&mut self, rarity: Rarity) -> Option<&mut Vec<bool>> {
        rarity
            .tier_index()
            .map(move |tier| &mut self.slots_obtained[tier])
    }
}
