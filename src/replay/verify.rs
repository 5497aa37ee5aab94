//! Verification by Deterministic Replay
//!
//! Re-runs a recorded match from its transcript and checks that every
//! checkpoint hash and the final result come out identical. Because the
//! engine is deterministic, any divergence means the transcript does not
//! describe the match it claims to.

use thiserror::Error;

use crate::game::phase::PhaseMachine;
use crate::game::state::GameSession;
use crate::replay::transcript::{MatchTranscript, RecordedCommand};

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    /// Number of checkpoints compared.
    pub checkpoints_checked: usize,
    /// Tick the replay ended on.
    pub end_tick: u32,
}

/// Verification failures.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// Transcript has no recorded result to verify against.
    #[error("transcript is incomplete")]
    IncompleteTranscript,

    /// A checkpoint hash diverged.
    #[error("checkpoint mismatch at tick {tick}")]
    CheckpointMismatch {
        /// Tick of the diverging checkpoint.
        tick: u32,
    },

    /// The replay produced a different final hash.
    #[error("final state hash mismatch")]
    FinalHashMismatch,

    /// The replay produced a different winner or end tick.
    #[error("result mismatch")]
    ResultMismatch,
}

/// Re-run a transcript's command stream and return the final session.
///
/// The replay rebuilds the session from the recorded seed and roster, then
/// applies every command in order, exactly as the live match did.
pub fn replay_transcript(transcript: &MatchTranscript) -> GameSession {
    let meta = &transcript.metadata;

    let mut session = GameSession::new(meta.match_id, meta.rng_seed);
    for (id, name) in &meta.roster {
        session.add_player(*id, name.clone());
    }

    let mut machine = PhaseMachine::new(session, meta.rules.clone());

    for command in &transcript.commands {
        match command {
            RecordedCommand::StartMatch => {
                machine.start_match();
            }
            RecordedCommand::NightTarget {
                role,
                actor,
                target,
            } => {
                machine.record_night_target(*role, actor, target);
            }
            RecordedCommand::Vote { voter, target } => {
                machine.record_vote(voter, target);
            }
            RecordedCommand::Advance => {
                machine.advance();
            }
            RecordedCommand::Tick { count } => {
                for _ in 0..*count {
                    machine.tick();
                }
            }
        }
    }

    let (session, _) = machine.into_parts();
    session
}

/// Verify a transcript by replay.
///
/// Checks every recorded checkpoint and the final result against the
/// re-simulated match.
pub fn verify_transcript(
    transcript: &MatchTranscript,
) -> Result<VerificationReport, VerificationError> {
    let Some(recorded_result) = &transcript.result else {
        return Err(VerificationError::IncompleteTranscript);
    };

    let meta = &transcript.metadata;
    let mut session = GameSession::new(meta.match_id, meta.rng_seed);
    for (id, name) in &meta.roster {
        session.add_player(*id, name.clone());
    }
    let mut machine = PhaseMachine::new(session, meta.rules.clone());

    let mut next_checkpoint = 0usize;

    for command in &transcript.commands {
        match command {
            RecordedCommand::StartMatch => {
                machine.start_match();
            }
            RecordedCommand::NightTarget {
                role,
                actor,
                target,
            } => {
                machine.record_night_target(*role, actor, target);
            }
            RecordedCommand::Vote { voter, target } => {
                machine.record_vote(voter, target);
            }
            RecordedCommand::Advance => {
                machine.advance();
            }
            RecordedCommand::Tick { count } => {
                // Checkpoints land on tick boundaries inside a run
                for _ in 0..*count {
                    machine.tick();
                    let tick = machine.session().tick;
                    if let Some(cp) = transcript.checkpoints.get(next_checkpoint) {
                        if cp.tick == tick {
                            if cp.state_hash != machine.session().compute_hash() {
                                return Err(VerificationError::CheckpointMismatch { tick });
                            }
                            next_checkpoint += 1;
                        }
                    }
                }
            }
        }
    }

    let session = machine.session();

    if session.compute_hash() != recorded_result.final_state_hash {
        return Err(VerificationError::FinalHashMismatch);
    }
    if session.tick != recorded_result.end_tick || session.winner != Some(recorded_result.winner) {
        return Err(VerificationError::ResultMismatch);
    }

    Ok(VerificationReport {
        checkpoints_checked: next_checkpoint,
        end_tick: session.tick,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    use crate::game::phase::MatchRules;
    use crate::game::state::{PlayerId, Role, Winner};
    use crate::replay::transcript::{MatchMetadata, MatchResult};

    fn pid(n: u8) -> PlayerId {
        PlayerId::new([n; 16])
    }

    /// Record a short scripted match and return its transcript.
    ///
    /// The script mirrors the live path: commands are recorded exactly as
    /// they are applied to the machine.
    fn record_scripted_match() -> MatchTranscript {
        let roster: Vec<(PlayerId, String)> = (1..=4u8)
            .map(|i| (pid(i), format!("player{}", i)))
            .collect();

        let metadata = MatchMetadata {
            match_id: [3; 16],
            entropy: [0; 32],
            roster: roster.clone(),
            rng_seed: 991,
            rules: MatchRules::default(),
            started_at: DateTime::<Utc>::MIN_UTC,
        };
        let mut transcript = MatchTranscript::new(metadata);

        let mut session = GameSession::new([3; 16], 991);
        for (id, name) in &roster {
            session.add_player(*id, name.clone());
        }
        let mut machine = PhaseMachine::new(session, MatchRules::default());

        let mut apply = |machine: &mut PhaseMachine,
                         transcript: &mut MatchTranscript,
                         command: RecordedCommand| {
            match &command {
                RecordedCommand::StartMatch => {
                    machine.start_match();
                }
                RecordedCommand::NightTarget {
                    role,
                    actor,
                    target,
                } => machine.record_night_target(*role, actor, target),
                RecordedCommand::Vote { voter, target } => {
                    machine.record_vote(voter, target)
                }
                RecordedCommand::Advance => {
                    machine.advance();
                }
                RecordedCommand::Tick { count } => {
                    for _ in 0..*count {
                        machine.tick();
                    }
                }
            }
            transcript.record(command);
        };

        apply(&mut machine, &mut transcript, RecordedCommand::StartMatch);

        // Whoever drew mafia kills the first civilian seat they are not in
        let mafia = machine
            .session()
            .players()
            .iter()
            .find(|p| p.role == Role::Mafia)
            .map(|p| p.id)
            .unwrap();
        let victim = machine
            .session()
            .players()
            .iter()
            .find(|p| p.role == Role::Civilian)
            .map(|p| p.id)
            .unwrap();

        apply(
            &mut machine,
            &mut transcript,
            RecordedCommand::NightTarget {
                role: Role::Mafia,
                actor: mafia,
                target: victim,
            },
        );
        apply(&mut machine, &mut transcript, RecordedCommand::Advance);
        apply(&mut machine, &mut transcript, RecordedCommand::Advance);
        apply(&mut machine, &mut transcript, RecordedCommand::Advance);

        // Let some of the discussion clock run
        apply(
            &mut machine,
            &mut transcript,
            RecordedCommand::Tick { count: 120 },
        );
        apply(&mut machine, &mut transcript, RecordedCommand::Advance);

        // Everyone left votes out the mafia
        let voters: Vec<PlayerId> = machine
            .session()
            .living_players()
            .map(|p| p.id)
            .collect();
        for voter in voters {
            apply(
                &mut machine,
                &mut transcript,
                RecordedCommand::Vote {
                    voter,
                    target: mafia,
                },
            );
        }
        apply(&mut machine, &mut transcript, RecordedCommand::Advance);

        let session = machine.session();
        assert!(session.is_ended(), "script should finish the match");
        transcript.finalize(MatchResult {
            end_tick: session.tick,
            winner: session.winner.unwrap(),
            final_state_hash: session.compute_hash(),
        });

        transcript
    }

    #[test]
    fn test_replay_reproduces_final_state() {
        let transcript = record_scripted_match();
        let replayed = replay_transcript(&transcript);

        let result = transcript.result.as_ref().unwrap();
        assert_eq!(replayed.compute_hash(), result.final_state_hash);
        assert_eq!(replayed.winner, Some(Winner::Civilians));
    }

    #[test]
    fn test_verify_accepts_honest_transcript() {
        let transcript = record_scripted_match();
        let report = verify_transcript(&transcript).unwrap();
        assert_eq!(report.end_tick, transcript.result.as_ref().unwrap().end_tick);
    }

    #[test]
    fn test_verify_rejects_incomplete() {
        let mut transcript = record_scripted_match();
        transcript.result = None;

        assert!(matches!(
            verify_transcript(&transcript),
            Err(VerificationError::IncompleteTranscript)
        ));
    }

    #[test]
    fn test_verify_rejects_tampered_result() {
        let mut transcript = record_scripted_match();
        if let Some(result) = transcript.result.as_mut() {
            result.winner = Winner::Mafia;
        }

        assert!(verify_transcript(&transcript).is_err());
    }

    #[test]
    fn test_verify_rejects_tampered_commands() {
        let mut transcript = record_scripted_match();
        // Drop the mafia's night action: the replayed match diverges
        transcript
            .commands
            .retain(|c| !matches!(c, RecordedCommand::NightTarget { .. }));

        assert!(verify_transcript(&transcript).is_err());
    }
}
