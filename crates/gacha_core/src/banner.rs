use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Banner archetype; selects pickup slot counts and hard-pity rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GachaType {
    Single,
    Limited,
    Collab,
    #[serde(alias = "revival")]
    Rotation,
    Contract,
    Orient,
}

impl GachaType {
    pub const ALL: [GachaType; 6] = [
        GachaType::Single,
        GachaType::Limited,
        GachaType::Collab,
        GachaType::Rotation,
        GachaType::Contract,
        GachaType::Orient,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GachaType::Single => "single",
            GachaType::Limited => "limited",
            GachaType::Collab => "collab",
            GachaType::Rotation => "rotation",
            GachaType::Contract => "contract",
            GachaType::Orient => "orient",
        }
    }

    /// Pickup slots per rarity offered by banners of this type.
    pub fn slot_caps(self) -> SlotCaps {
        match self {
            GachaType::Rotation => SlotCaps::new(2, 3, 0),
            GachaType::Single => SlotCaps::new(1, 2, 1),
            GachaType::Limited => SlotCaps::new(2, 1, 0),
            GachaType::Collab => SlotCaps::new(1, 2, 0),
            GachaType::Orient => SlotCaps::new(3, 3, 0),
            GachaType::Contract => SlotCaps::new(4, 6, 0),
        }
    }

    /// Pickup chances used when a banner does not configure its own.
    pub fn default_pickup_chances(self) -> PickupChances {
        match self {
            GachaType::Single => PickupChances::new(50.0, 50.0, 20.0),
            GachaType::Limited => PickupChances::new(70.0, 50.0, 0.0),
            GachaType::Collab | GachaType::Rotation => PickupChances::new(50.0, 50.0, 0.0),
            GachaType::Contract => PickupChances::new(100.0, 100.0, 100.0),
            GachaType::Orient => PickupChances::new(100.0, 60.0, 0.0),
        }
    }

    /// Pickup chances in effect: contract and orient banners have fixed odds
    /// that override anything configured.
    pub fn effective_pickup_chances(self, configured: Option<PickupChances>) -> PickupChances {
        match self {
            GachaType::Contract | GachaType::Orient => self.default_pickup_chances(),
            _ => configured.unwrap_or_else(|| self.default_pickup_chances()),
        }
    }
}

impl fmt::Display for GachaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rarity tier of a pull. Only 4★ through 6★ can carry pickups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Rarity {
    Three,
    Four,
    Five,
    Six,
}

impl Rarity {
    /// Tiers that own pickup slots, highest first.
    pub const PICKUP_TIERS: [Rarity; 3] = [Rarity::Six, Rarity::Five, Rarity::Four];

    pub fn stars(self) -> u8 {
        match self {
            Rarity::Three => 3,
            Rarity::Four => 4,
            Rarity::Five => 5,
            Rarity::Six => 6,
        }
    }

    /// Position in per-tier tables (6★ = 0, 5★ = 1, 4★ = 2); 3★ has none.
    pub fn tier_index(self) -> Option<usize> {
        match self {
            Rarity::Six => Some(0),
            Rarity::Five => Some(1),
            Rarity::Four => Some(2),
            Rarity::Three => None,
        }
    }
}

impl TryFrom<u8> for Rarity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(Rarity::Three),
            4 => Ok(Rarity::Four),
            5 => Ok(Rarity::Five),
            6 => Ok(Rarity::Six),
            other => Err(format!("unsupported rarity {other}")),
        }
    }
}

impl From<Rarity> for u8 {
    fn from(value: Rarity) -> Self {
        value.stars()
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}★", self.stars())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorRole {
    Limited,
    #[default]
    Normal,
}

/// Operator the player wants from a banner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetOperator {
    pub name: String,
    pub rarity: Rarity,
    #[serde(default)]
    pub role: OperatorRole,
    /// Copies wanted: 1 obtains the operator once, up to 6 for duplicates.
    #[serde(default = "default_goal")]
    pub goal: u8,
}

fn default_goal() -> u8 {
    1
}

/// Probability (0-100) that a pull of each tier lands on a pickup slot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PickupChances {
    pub six: f64,
    pub five: f64,
    #[serde(default)]
    pub four: f64,
}

impl PickupChances {
    pub const fn new(six: f64, five: f64, four: f64) -> Self {
        Self { six, five, four }
    }

    /// Chance for `rarity`; 3★ never has pickups.
    pub fn for_rarity(&self, rarity: Rarity) -> f64 {
        match rarity {
            Rarity::Six => self.six,
            Rarity::Five => self.five,
            Rarity::Four => self.four,
            Rarity::Three => 0.0,
        }
    }
}

/// Pickup slot counts per tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCaps {
    pub six: usize,
    pub five: usize,
    pub four: usize,
}

impl SlotCaps {
    pub const fn new(six: usize, five: usize, four: usize) -> Self {
        Self { six, five, four }
    }

    pub fn for_rarity(&self, rarity: Rarity) -> usize {
        match rarity {
            Rarity::Six => self.six,
            Rarity::Five => self.five,
            Rarity::Four => self.four,
            Rarity::Three => 0,
        }
    }
}

/// One banner the player wants to simulate.
#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerConfig {
    pub id: String,
    pub name: Option<String>,
    pub gacha_type: GachaType,
    #[serde(default)]
    pub target_operators: Vec<TargetOperator>,
    #[serde(default)]
    pub pickup_chance: Option<PickupChances>,
    /// Pull cap for one run of this banner; `None` is unbounded.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub min_attempts: u32,
    /// Currency credited when the banner starts (resource-consumption mode).
    #[serde(default)]
    pub starting_currency: u64,
    #[serde(default = "default_pull_cost")]
    pub per_pull_cost: u64,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// Orundum per single pull.
pub const DEFAULT_PULL_COST: u64 = 600;

fn default_pull_cost() -> u64 {
    DEFAULT_PULL_COST
}

fn default_active() -> bool {
    true
}

impl BannerConfig {
    pub fn new(id: impl Into<String>, gacha_type: GachaType) -> Self {
        Self {
            id: id.into(),
            name: None,
            gacha_type,
            target_operators: Vec::new(),
            pickup_chance: None,
            max_attempts: None,
            min_attempts: 0,
            starting_currency: 0,
            per_pull_cost: DEFAULT_PULL_COST,
            active: true,
        }
    }

    pub fn with_target(mut self, target: TargetOperator) -> Self {
        self.target_operators.push(target);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_pickup_chance(mut self, chances: PickupChances) -> Self {
        self.pickup_chance = Some(chances);
        self
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

impl TargetOperator {
    pub fn new(name: impl Into<String>, rarity: Rarity) -> Self {
        Self {
            name: name.into(),
            rarity,
            role: OperatorRole::Normal,
            goal: 1,
        }
    }

    pub fn limited(mut self) -> Self {
        self.role = OperatorRole::Limited;
        self
    }

    pub fn with_goal(mut self, goal: u8) -> Self {
        self.goal = goal;
        self
    }
}
