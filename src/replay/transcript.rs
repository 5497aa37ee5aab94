//! Match Transcript Recording
//!
//! Records everything needed to deterministically re-run a match: the seed,
//! the roster in join order, the rules, and the full ordered command stream,
//! plus periodic state-hash checkpoints and the final result.
//!
//! A transcript is small (ticks are run-length encoded) and is what lets any
//! party verify after the fact that the server resolved the match honestly.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::hash::StateHash;
use crate::game::phase::MatchRules;
use crate::game::state::{PlayerId, Role, Winner};

/// Current transcript version.
pub const TRANSCRIPT_VERSION: u8 = 1;

/// Checkpoint interval in ticks (every 10 seconds at 60 Hz).
pub const CHECKPOINT_INTERVAL: u32 = 600;

/// One command applied to the authoritative session, in arrival order.
///
/// Ticks are run-length encoded: consecutive timer ticks collapse into a
/// single `Tick { count }` entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordedCommand {
    /// Match start (role assignment).
    StartMatch,
    /// A night target submission that the engine accepted or dropped;
    /// recorded either way so the replay sees the same inputs.
    NightTarget {
        /// Acting role.
        role: Role,
        /// Submitting player.
        actor: PlayerId,
        /// Chosen target.
        target: PlayerId,
    },
    /// A day vote submission.
    Vote {
        /// Voting player.
        voter: PlayerId,
        /// Chosen target.
        target: PlayerId,
    },
    /// An explicit phase advance.
    Advance,
    /// `count` consecutive simulation ticks.
    Tick {
        /// Number of ticks.
        count: u32,
    },
}

/// Match metadata, fixed before the first command.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchMetadata {
    /// Unique match identifier.
    pub match_id: [u8; 16],

    /// Server entropy used for seed derivation.
    pub entropy: [u8; 32],

    /// Roster in join order: id and display name.
    pub roster: Vec<(PlayerId, String)>,

    /// RNG seed derived from entropy + match id + sorted player ids.
    pub rng_seed: u64,

    /// Rules the match ran under.
    pub rules: MatchRules,

    /// Wall-clock time the match started (informational only; the
    /// deterministic replay never reads it).
    pub started_at: DateTime<Utc>,
}

/// State checkpoint for partial verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCheckpoint {
    /// Tick number.
    pub tick: u32,

    /// State hash at this tick.
    pub state_hash: StateHash,
}

/// Final match outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Tick when the match ended.
    pub end_tick: u32,

    /// Winning faction.
    pub winner: Winner,

    /// Final state hash.
    pub final_state_hash: StateHash,
}

/// Complete match transcript.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchTranscript {
    /// Version for forward compatibility.
    pub version: u8,

    /// Match metadata.
    pub metadata: MatchMetadata,

    /// Ordered command stream.
    pub commands: Vec<RecordedCommand>,

    /// State hash checkpoints (every `CHECKPOINT_INTERVAL` ticks).
    pub checkpoints: Vec<StateCheckpoint>,

    /// Final result, once the match concluded.
    pub result: Option<MatchResult>,
}

impl MatchTranscript {
    /// Create a new transcript from match metadata.
    pub fn new(metadata: MatchMetadata) -> Self {
        Self {
            version: TRANSCRIPT_VERSION,
            metadata,
            commands: Vec::new(),
            checkpoints: Vec::new(),
            result: None,
        }
    }

    /// Record a command.
    pub fn record(&mut self, command: RecordedCommand) {
        match (&command, self.commands.last_mut()) {
            // Merge consecutive tick runs
            (
                RecordedCommand::Tick { count },
                Some(RecordedCommand::Tick { count: last }),
            ) => {
                *last += count;
            }
            _ => self.commands.push(command),
        }
    }

    /// Record one simulation tick.
    pub fn record_tick(&mut self) {
        self.record(RecordedCommand::Tick { count: 1 });
    }

    /// Record a state checkpoint.
    pub fn add_checkpoint(&mut self, tick: u32, state_hash: StateHash) {
        self.checkpoints.push(StateCheckpoint { tick, state_hash });
    }

    /// Finalize the transcript with the match result.
    pub fn finalize(&mut self, result: MatchResult) {
        self.result = Some(result);
    }

    /// Check if transcript is complete.
    pub fn is_complete(&self) -> bool {
        self.result.is_some()
    }

    /// Number of recorded commands (tick runs count once).
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Serialize to bytes using bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TranscriptError> {
        bincode::serialize(self).map_err(|e| TranscriptError::Serialization(e.to_string()))
    }

    /// Deserialize from bytes, checking the version.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TranscriptError> {
        let transcript: Self = bincode::deserialize(data)
            .map_err(|e| TranscriptError::Deserialization(e.to_string()))?;
        if transcript.version != TRANSCRIPT_VERSION {
            return Err(TranscriptError::VersionMismatch {
                expected: TRANSCRIPT_VERSION,
                got: transcript.version,
            });
        }
        Ok(transcript)
    }
}

/// Errors that can occur with transcripts.
#[derive(Debug, Error)]
pub enum TranscriptError {
    /// Serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Deserialization failed.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// Version mismatch.
    #[error("version mismatch: expected {expected}, got {got}")]
    VersionMismatch {
        /// Supported version.
        expected: u8,
        /// Version found in the data.
        got: u8,
    },
}
