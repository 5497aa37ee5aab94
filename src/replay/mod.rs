//! Match Replay and Verification
//!
//! Because the rules engine is deterministic, a match is fully described by
//! its seed, roster, rules, and command stream. This module records those
//! into a compact transcript and verifies outcomes by re-running them.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       REPLAY SYSTEM                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  transcript.rs - Seed + roster + command stream recording    │
//! │  verify.rs     - Verification by deterministic replay        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod transcript;
pub mod verify;

// Re-export key types
pub use transcript::{
    MatchTranscript, MatchMetadata, MatchResult,
    RecordedCommand, StateCheckpoint, TranscriptError,
    TRANSCRIPT_VERSION, CHECKPOINT_INTERVAL,
};
pub use verify::{replay_transcript, verify_transcript, VerificationError, VerificationReport};
