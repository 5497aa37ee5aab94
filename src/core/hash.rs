//! State Hashing for Verification
//!
//! Provides deterministic hashing of game state for:
//! - View-consistency verification between clients and server
//! - Replay validation of recorded matches
//!
//! Hidden information (roles, night targets) is hashed along with the public
//! state, so two sessions agree on a hash only if they agree on everything.

use sha2::{Sha256, Digest};

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Deterministic hasher for game state.
///
/// Wraps SHA-256 with helpers for the engine's value types.
/// Order of updates is critical for determinism.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for session state.
    pub fn for_session_state() -> Self {
        Self::new(b"DUSKFALL_STATE_V1")
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with a UUID (16 bytes).
    #[inline]
    pub fn update_uuid(&mut self, uuid: &[u8; 16]) {
        self.hasher.update(uuid);
    }

    /// Update with an optional UUID.
    ///
    /// A presence byte precedes the payload so `None` followed by data can
    /// never collide with `Some`.
    #[inline]
    pub fn update_opt_uuid(&mut self, uuid: Option<&[u8; 16]>) {
        match uuid {
            Some(id) => {
                self.update_u8(1);
                self.update_uuid(id);
            }
            None => self.update_u8(0),
        }
    }

    /// Update with a length-prefixed string.
    #[inline]
    pub fn update_str(&mut self, value: &str) {
        self.update_u32(value.len() as u32);
        self.hasher.update(value.as_bytes());
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Compute a simple hash of arbitrary data.
pub fn hash_bytes(data: &[u8]) -> StateHash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute hash with domain separator.
pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> StateHash {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute state hash for session verification.
///
/// This function is called by `GameSession::compute_hash()`.
/// The parameter is a closure that adds state-specific data.
pub fn compute_state_hash<F>(tick: u32, rng_seed: u64, add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::for_session_state();

    // Always hash tick and seed first
    hasher.update_u32(tick);
    hasher.update_u64(rng_seed);

    // Add game-specific state
    add_state(&mut hasher);

    hasher.finalize()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_hasher_determinism() {
        let make_hash = || {
            let mut hasher = StateHasher::for_session_state();
            hasher.update_u32(100);
            hasher.update_u64(12345);
            hasher.update_str("alice");
            hasher.update_bool(true);
            hasher.finalize()
        };

        let hash1 = make_hash();
        let hash2 = make_hash();

        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_order_matters() {
        let hash1 = {
            let mut h = StateHasher::new(b"test");
            h.update_u32(1);
            h.update_u32(2);
            h.finalize()
        };

        let hash2 = {
            let mut h = StateHasher::new(b"test");
            h.update_u32(2);
            h.update_u32(1);
            h.finalize()
        };

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_domain_separation() {
        let data = [1u8, 2, 3, 4];

        let hash1 = hash_with_domain(b"DOMAIN_A", &data);
        let hash2 = hash_with_domain(b"DOMAIN_B", &data);

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_opt_uuid_presence_byte() {
        // None must not collide with Some of any id
        let id = [0u8; 16];

        let hash_none = {
            let mut h = StateHasher::new(b"test");
            h.update_opt_uuid(None);
            h.update_uuid(&id);
            h.finalize()
        };

        let hash_some = {
            let mut h = StateHasher::new(b"test");
            h.update_opt_uuid(Some(&id));
            h.finalize()
        };

        assert_ne!(hash_none, hash_some);
    }

    #[test]
    fn test_str_length_prefix() {
        // "ab" + "c" must differ from "a" + "bc"
        let hash1 = {
            let mut h = StateHasher::new(b"test");
            h.update_str("ab");
            h.update_str("c");
            h.finalize()
        };

        let hash2 = {
            let mut h = StateHasher::new(b"test");
            h.update_str("a");
            h.update_str("bc");
            h.finalize()
        };

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_compute_state_hash() {
        let hash = compute_state_hash(100, 12345, |hasher| {
            hasher.update_u8(3);
            hasher.update_bool(true);
        });

        // Hash should be consistent
        let hash2 = compute_state_hash(100, 12345, |hasher| {
            hasher.update_u8(3);
            hasher.update_bool(true);
        });

        assert_eq!(hash, hash2);

        // Different input = different hash
        let hash3 = compute_state_hash(101, 12345, |hasher| {
            hasher.update_u8(3);
            hasher.update_bool(true);
        });

        assert_ne!(hash, hash3);
    }
}
