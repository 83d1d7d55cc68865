use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::archetype::BannerRules;
use crate::banner::{BannerConfig, OperatorRole, Rarity};
use crate::error::{GachaError, GachaResult};
use crate::rates::MAX_GOAL;

pub const DEFAULT_PERCENTILE: f64 = 99.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SimulationMode {
    /// Pulls are free; only attempt caps stop a banner.
    #[default]
    Probability,
    /// Every pull spends currency and a banner stops when it runs dry.
    ResourceConsumption,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GoalPolicy {
    FirstCopyOnly,
    MaxDuplicates,
}

/// How rotation banners honour their pity once it is armed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RotationPityPolicy {
    /// The next natural 6★ is moved onto a pickup slot nobody has pulled yet.
    #[default]
    NextSixStar,
    /// The armed pull becomes a 6★ pickup regardless of the dice.
    ForcedSixStar,
}

/// Engine input as sent by the front-end.
#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    /// Base seed; drawn from OS entropy at the orchestration boundary when absent.
    #[serde(default)]
    pub seed: Option<u32>,
    pub banners: Vec<BannerConfig>,
    pub trial_count: u32,
    #[serde(default)]
    pub mode: SimulationMode,
    #[serde(default)]
    pub initial_currency: Option<u64>,
    #[serde(default)]
    pub goal_policy: Option<GoalPolicy>,
    #[serde(default = "default_percentile")]
    pub percentile: f64,
    #[serde(default)]
    pub rotation_pity: RotationPityPolicy,
}

fn default_percentile() -> f64 {
    DEFAULT_PERCENTILE
}

impl SimulationRequest {
    pub fn new(banners: Vec<BannerConfig>, trial_count: u32) -> Self {
        Self {
            seed: None,
            banners,
            trial_count,
            mode: SimulationMode::Probability,
            initial_currency: None,
            goal_policy: None,
            percentile: DEFAULT_PERCENTILE,
            rotation_pity: RotationPityPolicy::NextSixStar,
        }
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_resources(mut self, initial_currency: u64) -> Self {
        self.mode = SimulationMode::ResourceConsumption;
        self.initial_currency = Some(initial_currency);
        self
    }
}

/// Target operator resolved against its banner's pickup slots.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedTarget {
    pub name: String,
    pub rarity: Rarity,
    pub role: OperatorRole,
    pub goal: u32,
    pub slot: usize,
}

/// Validated, immutable description of one banner's run.
#[derive(Clone, Debug, PartialEq)]
pub struct BannerPlan {
    pub id: String,
    pub rules: BannerRules,
    pub targets: Vec<PlannedTarget>,
    slot_targets: [Vec<usize>; 3],
    pub max_attempts: Option<u32>,
    pub min_attempts: u32,
    pub starting_currency: u64,
    pub per_pull_cost: u64,
}

impl BannerPlan {
    /// Index into `targets` of the operator occupying `slot` of `rarity`.
    pub fn target_for_slot(&self, rarity: Rarity, slot: usize) -> Option<usize> {
        rarity
            .tier_index()
            .and_then(|tier| self.slot_targets[tier].get(slot).copied())
    }
}

/// Compiled request shared read-only by every worker.
#[derive(Clone, Debug, PartialEq)]
pub struct TrialPlan {
    pub banners: Vec<BannerPlan>,
    pub mode: SimulationMode,
    pub initial_currency: u64,
}

impl TrialPlan {
    /// Validate `request` and resolve every active banner into a [`BannerPlan`].
    ///
    /// All configuration errors surface here; the trial engine assumes the
    /// plan is well formed.
    pub fn compile(request: &SimulationRequest) -> GachaResult<Self> {
        if !(request.percentile > 0.0 && request.percentile <= 100.0) {
            return Err(GachaError::InvalidPercentile(request.percentile));
        }

        let mut seen = HashSet::new();
        let mut banners = Vec::with_capacity(request.banners.len());
        for banner in &request.banners {
            if !seen.insert(banner.id.as_str()) {
                return Err(GachaError::DuplicateBanner(banner.id.clone()));
            }
            if !banner.active {
                continue;
            }
            banners.push(compile_banner(banner, request)?);
        }

        Ok(Self {
            banners,
            mode: request.mode,
            initial_currency: request.initial_currency.unwrap_or(0),
        })
    }

    pub fn banner_ids(&self) -> Vec<String> {
        self.banners.iter().map(|banner| banner.id.clone()).collect()
    }
}

fn compile_banner(banner: &BannerConfig, request: &SimulationRequest) -> GachaResult<BannerPlan> {
    let kind = banner.gacha_type;
    let chances = kind.effective_pickup_chances(banner.pickup_chance);
    let caps = kind.slot_caps();

    for rarity in Rarity::PICKUP_TIERS {
        let value = chances.for_rarity(rarity);
        if !(0.0..=100.0).contains(&value) {
            return Err(GachaError::InvalidPickupChance {
                banner: banner.id.clone(),
                rarity,
                value,
            });
        }
    }

    match banner.max_attempts {
        Some(0) if !banner.target_operators.is_empty() => {
            return Err(GachaError::ZeroAttemptCap {
                banner: banner.id.clone(),
            });
        }
        Some(max) if banner.min_attempts > max => {
            return Err(GachaError::AttemptBounds {
                banner: banner.id.clone(),
                min: banner.min_attempts,
                max,
            });
        }
        _ => {}
    }

    let mut targets = Vec::with_capacity(banner.target_operators.len());
    let mut slot_targets: [Vec<usize>; 3] = Default::default();
    for target in &banner.target_operators {
        if target.goal == 0 || target.goal > MAX_GOAL {
            return Err(GachaError::InvalidGoal {
                banner: banner.id.clone(),
                target: target.name.clone(),
                goal: target.goal,
            });
        }

        let cap = caps.for_rarity(target.rarity);
        let tier_slots = target.rarity.tier_index().map(|tier| &mut slot_targets[tier]);
        let slot = match tier_slots {
            Some(slots) if slots.len() < cap => {
                slots.push(targets.len());
                slots.len() - 1
            }
            _ => {
                let count = banner
                    .target_operators
                    .iter()
                    .filter(|other| other.rarity == target.rarity)
                    .count();
                return Err(GachaError::OperatorCapExceeded {
                    banner: banner.id.clone(),
                    kind,
                    rarity: target.rarity,
                    count,
                    cap,
                });
            }
        };

        if request.mode == SimulationMode::Probability
            && banner.max_attempts.is_none()
            && chances.for_rarity(target.rarity) <= 0.0
        {
            return Err(GachaError::UnreachableTarget {
                banner: banner.id.clone(),
                target: target.name.clone(),
            });
        }

        let goal = match request.goal_policy {
            Some(GoalPolicy::FirstCopyOnly) => 1,
            Some(GoalPolicy::MaxDuplicates) => MAX_GOAL,
            None => target.goal,
        };

        targets.push(PlannedTarget {
            name: target.name.clone(),
            rarity: target.rarity,
            role: target.role,
            goal: u32::from(goal),
            slot,
        });
    }

    Ok(BannerPlan {
        id: banner.id.clone(),
        rules: BannerRules::new(kind, chances, request.rotation_pity),
        targets,
        slot_targets,
        max_attempts: banner.max_attempts,
        min_attempts: banner.min_attempts,
        starting_currency: banner.starting_currency,
        per_pull_cost: banner.per_pull_cost,
    })
}
