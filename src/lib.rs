//! # Duskfall Game Server
//!
//! Authoritative rules engine and server for Duskfall, a social-deduction
//! party game (a Mafia/Werewolf variant).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     DUSKFALL SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  game/           - Rules engine (deterministic)              │
//! │  ├── state.rs    - Session, roster, roles, phases            │
//! │  ├── roles.rs    - Role pool and fair assignment             │
//! │  ├── night.rs    - Night actions and resolution              │
//! │  ├── vote.rs     - Day-vote tally and resolution             │
//! │  ├── win.rs      - Win-condition evaluation                  │
//! │  ├── phase.rs    - Phase state machine                       │
//! │  ├── events.rs   - Events with visibility scoping            │
//! │  └── snapshot.rs - Public views and sink abstraction         │
//! │                                                              │
//! │  replay/         - Transcript recording and verification     │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── server.rs   - WebSocket server                          │
//! │  ├── protocol.rs - Message types                             │
//! │  ├── session.rs  - Room lifecycle, command serialization     │
//! │  └── auth.rs     - JWT validation                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are **100% deterministic**:
//! - No system time dependencies
//! - No map iteration: the roster is a join-ordered `Vec`, the vote tally
//!   keeps first-vote order
//! - All randomness from seeded Xorshift128+
//!
//! Given the same seed, the same roster, and the same command sequence, a
//! match produces **identical state hashes** on any platform. The network
//! layer funnels every inbound command through one queue per match, so the
//! authoritative state only ever has a single writer.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod replay;
pub mod network;

// Re-export commonly used types
pub use crate::core::rng::DeterministicRng;
pub use crate::core::hash::StateHash;
pub use crate::game::state::{GameSession, Player, PlayerId, Role, GamePhase, Winner};
pub use crate::game::phase::{PhaseMachine, MatchRules, StepResult};
pub use crate::game::snapshot::{Snapshot, SnapshotSink};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;

/// Default day discussion duration (seconds)
pub const DEFAULT_DISCUSSION_SECS: u32 = 45;

/// Default day vote duration (seconds)
pub const DEFAULT_VOTING_SECS: u32 = 30;
