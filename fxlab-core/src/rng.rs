//! Deterministic RNG hierarchy.
//!
//! A master seed expands into per-(pair, stream, iteration) sub-seeds via
//! BLAKE3 hashing. Derivation is hash-based, not order-dependent, so the
//! same master seed produces identical sub-seeds regardless of the order in
//! which pairs or scenario cells are processed. Replay determinism is a
//! structural guarantee: the generator is always injected, never ambient.

use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone)]
pub struct SeedHierarchy {
    master_seed: u64,
}

impl SeedHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive a deterministic sub-seed for a (pair, stream, iteration) tuple.
    ///
    /// `stream` names the consumer ("slippage", "scenario", ...), keeping
    /// independent random streams from aliasing each other.
    pub fn sub_seed(&self, pair: &str, stream: &str, iteration: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(pair.as_bytes());
        hasher.update(b"/");
        hasher.update(stream.as_bytes());
        hasher.update(&iteration.to_le_bytes());
        let hash = hasher.finalize();
        u64::from_le_bytes(hash.as_bytes()[..8].try_into().expect("blake3 output is 32 bytes"))
    }

    /// Create a seeded StdRng for a sub-stream.
    pub fn rng_for(&self, pair: &str, stream: &str, iteration: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(pair, stream, iteration))
    }
}
