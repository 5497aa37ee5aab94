//! Core deterministic primitives.
//!
//! All types in this module are designed for perfect cross-platform
//! determinism. They are the foundation for keeping every participant's
//! view of a match consistent.

pub mod rng;
pub mod hash;

// Re-export core types
pub use rng::DeterministicRng;
pub use hash::{StateHash, StateHasher, compute_state_hash};
