use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// Returns a deterministic RNG so tests are reproducible.
pub(crate) fn rng() -> ChaCha20Rng {
    ChaCha20Rng::from_seed([0u8; 32])
}

/// Returns a deterministic RNG with a caller-picked seed, for tests that need
/// two parties with different key material.
pub(crate) fn rng_seeded(seed: u8) -> ChaCha20Rng {
    ChaCha20Rng::from_seed([seed; 32])
}
