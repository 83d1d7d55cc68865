use thiserror::Error;

use crate::banner::{GachaType, Rarity};

#[derive(Error, Debug)]
pub enum GachaError {
    #[error("banner '{banner}': {count} {rarity} targets exceed the {kind} banner's {cap} pickup slots")]
    OperatorCapExceeded {
        banner: String,
        kind: GachaType,
        rarity: Rarity,
        count: usize,
        cap: usize,
    },

    #[error("banner '{banner}': target '{target}' has goal {goal}, expected 1..=6")]
    InvalidGoal {
        banner: String,
        target: String,
        goal: u8,
    },

    #[error("banner '{banner}': {rarity} pickup chance {value} outside 0..=100")]
    InvalidPickupChance {
        banner: String,
        rarity: Rarity,
        value: f64,
    },

    #[error("banner '{banner}': min_attempts {min} exceeds max_attempts {max}")]
    AttemptBounds { banner: String, min: u32, max: u32 },

    #[error("banner '{banner}': max_attempts is 0 but targets are configured")]
    ZeroAttemptCap { banner: String },

    #[error("banner '{banner}': target '{target}' can never be pulled and attempts are unbounded")]
    UnreachableTarget { banner: String, target: String },

    #[error("duplicate banner id '{0}'")]
    DuplicateBanner(String),

    #[error("percentile {0} outside (0, 100]")]
    InvalidPercentile(f64),

    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("worker {worker} failed: {message}")]
    WorkerFailed { worker: usize, message: String },

    #[error("simulation cancelled")]
    Cancelled,
}

impl GachaError {
    /// True when the request itself is malformed rather than the run failing.
    pub fn is_configuration(&self) -> bool {
        !matches!(
            self,
            GachaError::WorkerFailed { .. } | GachaError::Cancelled
        )
    }
}

pub type GachaResult<T> = Result<T, GachaError>;
