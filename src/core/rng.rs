//! Deterministic Random Number Generator
//!
//! Uses Xorshift128+ algorithm for fast, high-quality, deterministic randomness.
//! Given the same seed, produces identical sequence on all platforms.
//!
//! The only randomness the rules engine consumes is the role permutation at
//! match start, so an unbiased shuffle here is what makes role assignment fair.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Determinism Guarantee
///
/// Given the same seed, this RNG will produce the exact same sequence
/// of random numbers on any platform (x86, ARM, WASM).
///
/// # Example
///
/// ```
/// use duskfall::core::rng::DeterministicRng;
///
/// let mut rng = DeterministicRng::new(12345);
/// let value = rng.next_u64();
/// assert_eq!(value, 6233086606872742541); // Always the same!
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Create RNG from match parameters.
    ///
    /// Derives a deterministic seed from:
    /// - Server entropy (unpredictable before the match)
    /// - Match ID (unique per match)
    /// - Sorted player IDs (prevents manipulation by join order)
    ///
    /// No single party can predict or steer the role permutation.
    pub fn from_match_params(
        entropy: &[u8; 32],
        match_id: &[u8; 16],
        player_ids: &[[u8; 16]],
    ) -> Self {
        let seed = derive_match_seed(entropy, match_id, player_ids);
        Self::new(seed)
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random u32.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    /// Generate a random integer in range [0, max).
    #[inline]
    pub fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        // Simple modulo - slight bias for very large max, but acceptable
        // for roster-sized ranges
        (self.next_u64() % max as u64) as u32
    }

    /// Shuffle a slice in place using Fisher-Yates algorithm.
    ///
    /// Every permutation is equally likely, which is what makes the
    /// role assignment fair.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        let len = slice.len();
        for i in (1..len).rev() {
            let j = self.next_int((i + 1) as u32) as usize;
            slice.swap(i, j);
        }
    }

    /// Select a random element from a slice.
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            let idx = self.next_int(slice.len() as u32) as usize;
            Some(&slice[idx])
        }
    }

    /// Get current state (for checkpointing/debugging).
    pub fn state(&self) -> [u64; 2] {
        self.state
    }

    /// Restore from saved state.
    pub fn set_state(&mut self, state: [u64; 2]) {
        self.state = state;
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive a match seed from verifiable parameters.
///
/// This function produces a deterministic seed that:
/// 1. Cannot be predicted before the server entropy is drawn
/// 2. Cannot be manipulated by any single party
/// 3. Is verifiable after the match (it is recorded in the transcript)
///
/// # Parameters
///
/// - `entropy`: server-drawn entropy (unpredictable)
/// - `match_id`: unique match identifier
/// - `player_ids`: all player IDs (MUST be sorted for determinism)
pub fn derive_match_seed(
    entropy: &[u8; 32],
    match_id: &[u8; 16],
    player_ids: &[[u8; 16]],
) -> u64 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"DUSKFALL_SEED_V1");

    // Server entropy
    hasher.update(entropy);

    // Match ID (unique per match)
    hasher.update(match_id);

    // Player IDs (sorted for determinism)
    // IMPORTANT: Caller must ensure player_ids is sorted!
    for pid in player_ids {
        hasher.update(pid);
    }

    let hash = hasher.finalize();

    // Take first 8 bytes as seed
    u64::from_le_bytes(hash[0..8].try_into().unwrap())
}

// =============================================================================
// TESTS
// =============================================================================
