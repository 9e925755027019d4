//! Random sources consumed by the engine.
//!
//! Every random draw goes through [`RandomSource`], so reward math stays a pure
//! function of the rolls it is handed. Seeded play uses [`RngBundle`], which keeps
//! one ChaCha stream per domain so lucky purchases never perturb event timing.

use hmac::{Hmac, Mac};
use rand::distributions::{Distribution, Standard};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::Sha256;
use std::collections::VecDeque;

/// Uniform random source producing values in `[0, 1)`.
pub trait RandomSource {
    fn roll(&mut self) -> f64;
}

impl<T: RandomSource + ?Sized> RandomSource for &mut T {
    fn roll(&mut self) -> f64 {
        (**self).roll()
    }
}

/// Counting wrapper for RNG streams providing instrumentation.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl CountingRng<ChaCha20Rng> {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            draws: 0,
        }
    }
}

impl<R: RngCore> CountingRng<R> {
    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl<R: RngCore> RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.draws = self.draws.saturating_add(1);
        self.rng.try_fill_bytes(dest)
    }
}

impl<R: RngCore> RandomSource for CountingRng<R> {
    fn roll(&mut self) -> f64 {
        Standard.sample(self)
    }
}

/// Deterministic bundle of RNG streams segregated by engine domain.
#[derive(Debug, Clone)]
pub struct RngBundle {
    seed: u64,
    lucky: CountingRng<ChaCha20Rng>,
    events: CountingRng<ChaCha20Rng>,
}

impl RngBundle {
    /// Construct the bundle from a user-visible seed.
    #[must_use]
    pub fn from_user_seed(seed: u64) -> Self {
        Self {
            seed,
            lucky: CountingRng::new(derive_stream_seed(seed, b"lucky")),
            events: CountingRng::new(derive_stream_seed(seed, b"events")),
        }
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Stream used by lucky purchases.
    pub fn lucky(&mut self) -> &mut CountingRng<ChaCha20Rng> {
        &mut self.lucky
    }

    /// Stream used by the random event scheduler.
    pub fn events(&mut self) -> &mut CountingRng<ChaCha20Rng> {
        &mut self.events
    }

    /// Total draws across all streams.
    #[must_use]
    pub const fn total_draws(&self) -> u64 {
        self.lucky.draws().saturating_add(self.events.draws())
    }
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()) else {
        return user_seed ^ u64::from(domain_tag.first().copied().unwrap_or(0));
    };
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

/// Replays a fixed list of rolls, then a fallback value once exhausted.
///
/// Used by tests and replay tooling to force exact outcomes.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRolls {
    rolls: VecDeque<f64>,
    fallback: f64,
}

impl ScriptedRolls {
    #[must_use]
    pub fn new(rolls: impl IntoIterator<Item = f64>) -> Self {
        Self {
            rolls: rolls.into_iter().collect(),
            fallback: 0.0,
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: f64) -> Self {
        self.fallback = fallback;
        self
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rolls.len()
    }
}

impl RandomSource for ScriptedRolls {
    fn roll(&mut self) -> f64 {
        self.rolls.pop_front().unwrap_or(self.fallback)
    }
}
