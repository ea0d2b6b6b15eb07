//! Seeded randomness keyed by strings
//!
//! Every draw is a pure function of its seed string. Call sites build the
//! string from the game seed plus positional tokens (pill index, virus index,
//! attempt), so a replay from the same seed sees the same sequence.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::grid::Color;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Stable 64-bit FNV-1a hash of a seed string
pub fn hash_seed(seed: &str) -> u64 {
    seed.bytes()
        .fold(FNV_OFFSET, |hash, b| (hash ^ b as u64).wrapping_mul(FNV_PRIME))
}

/// Generator for a seed string
pub fn rng_for(seed: &str) -> Pcg32 {
    Pcg32::seed_from_u64(hash_seed(seed))
}

/// Uniform float in `[0, 1)` derived from `seed`
pub fn seed_random(seed: &str) -> f64 {
    rng_for(seed).random::<f64>()
}

/// Uniform integer in `min..=max` derived from `seed`
pub fn seed_random_int(seed: &str, min: i64, max: i64) -> i64 {
    debug_assert!(min <= max, "seed_random_int: min > max");
    (seed_random(seed) * (max - min + 1) as f64).floor() as i64 + min
}

/// Uniform color derived from `seed`
pub fn seed_random_color(seed: &str) -> Color {
    Color::ALL[seed_random_int(seed, 0, Color::ALL.len() as i64 - 1) as usize]
}
