//! Deterministic random stream utilities.
//!
//! Every worker owns exactly one [`Stream`] seeded from a 32-bit value. Pulls
//! draw from it sequentially, so the order of trials, banners and attempts is
//! part of the reproducibility contract: the same seed replays the same run.
//! Worker seeds are themselves drawn from a stream seeded with the base seed,
//! which makes a recorded `(base_seed, workers)` pair enough to replay a whole
//! request.

use rand::rngs::OsRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_seeder::Seeder;

const U32_SPAN: f64 = 4_294_967_296.0;

/// Source of uniform samples consumed by the pull engine.
///
/// The engine is generic over this trait so tests can script exact roll
/// sequences; any `FnMut() -> f64` closure is a valid source.
pub trait RollSource {
    /// Next uniform sample in `[0, 1)`.
    fn next_unit(&mut self) -> f64;

    /// Next uniform sample in `[0, 100)`.
    fn next_percent(&mut self) -> f64 {
        self.next_unit() * 100.0
    }
}

impl<F> RollSource for F
where
    F: FnMut() -> f64,
{
    fn next_unit(&mut self) -> f64 {
        self()
    }
}

#[derive(Clone, Debug)]
pub struct Stream {
    inner: ChaCha8Rng,
}

impl Stream {
    /// Construct the stream for `seed`. Identical seeds yield identical sequences.
    pub fn from_seed(seed: u32) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(u64::from(seed)),
        }
    }

    /// Advance the stream and return the next `f64` sample in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// Advance the stream and return a sample scaled into the full `u32` range.
    pub fn next_scaled_u32(&mut self) -> u32 {
        (self.next_f64() * U32_SPAN).floor() as u32
    }
}

impl RollSource for Stream {
    fn next_unit(&mut self) -> f64 {
        self.next_f64()
    }
}

/// Closure form of [`Stream`]: each call yields the next sample in `[0, 1)`.
pub fn create_rng(seed: u32) -> impl FnMut() -> f64 {
    let mut stream = Stream::from_seed(seed);
    move || stream.next_f64()
}

/// Draw `count` worker seeds from a single stream seeded with `base_seed`.
pub fn derive_worker_seeds(base_seed: u32, count: usize) -> Vec<u32> {
    let mut stream = Stream::from_seed(base_seed);
    (0..count).map(|_| stream.next_scaled_u32()).collect()
}

/// Fresh base seed from the operating system RNG.
///
/// Only orchestration code should call this; the engine itself never reads
/// external entropy.
pub fn entropy_seed() -> u32 {
    OsRng.next_u32()
}

/// Hash a human-readable phrase into a base seed.
pub fn seed_from_phrase(phrase: &str) -> u32 {
    let mut rng: ChaCha8Rng = Seeder::from(phrase).make_rng();
    rng.next_u32()
}
