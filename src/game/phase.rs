//! Phase State Machine
//!
//! Drives a match through its fixed phase sequence, owns the countdown
//! timer, and invokes role assignment, night resolution, vote resolution,
//! and the win check at the right transitions.
//!
//! The defined flow:
//!
//! ```text
//! Lobby -> NightMafia -> NightDoctor -> NightDetective -> DayDiscussion
//!             ^                              |                  |
//!             |                         (win check)        DayVoting
//!             |                              |                  |
//!             +------------------------------+------------(win check)
//!                                            |                  |
//!                                         GameEnd <-------------+
//! ```
//!
//! An external driver calls `tick()` once per simulation tick; timed phases
//! (day discussion, day vote) count down and auto-advance, every other phase
//! waits for an explicit `advance()`. On every transition the machine
//! publishes a full snapshot to its sinks. `GameEnd` is terminal: commands
//! arriving there are strict no-ops and emit nothing.

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::game::events::GameEvent;
use crate::game::night;
use crate::game::roles;
use crate::game::snapshot::{Snapshot, SnapshotSink};
use crate::game::state::{GamePhase, GameSession, PlayerId, Role, Winner};
use crate::game::vote;
use crate::game::win;
use crate::{DEFAULT_DISCUSSION_SECS, DEFAULT_VOTING_SECS, TICK_RATE};

/// Match rules fixed at construction.
///
/// Serialized into the match transcript so a replay runs under the same
/// rules the match did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRules {
    /// Day discussion duration in seconds.
    pub discussion_secs: u32,
    /// Day vote duration in seconds.
    pub voting_secs: u32,
    /// Minimum roster size to start a match.
    pub min_players: usize,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            discussion_secs: DEFAULT_DISCUSSION_SECS,
            voting_secs: DEFAULT_VOTING_SECS,
            min_players: 4,
        }
    }
}

/// Result of a `tick()` or `advance()` call.
#[derive(Debug, Default)]
pub struct StepResult {
    /// Events generated during this step (private ones included;
    /// the caller routes by visibility).
    pub events: Vec<GameEvent>,
    /// Whether a phase transition happened.
    pub transitioned: bool,
    /// Whether the match ended this step.
    pub match_ended: bool,
    /// Winner, if the match ended this step.
    pub winner: Option<Winner>,
}

/// The authoritative phase machine for one match.
///
/// Owns the session and the snapshot sinks. All mutation goes through the
/// command methods below; callers are expected to serialize them (one
/// writer per match).
pub struct PhaseMachine {
    session: GameSession,
    rules: MatchRules,
    sinks: Vec<Box<dyn SnapshotSink>>,
}

impl PhaseMachine {
    /// Create a machine around a lobby-phase session.
    pub fn new(session: GameSession, rules: MatchRules) -> Self {
        Self {
            session,
            rules,
            sinks: Vec::new(),
        }
    }

    /// Attach a snapshot sink. Multiple sinks compose.
    pub fn add_sink(&mut self, sink: Box<dyn SnapshotSink>) {
        self.sinks.push(sink);
    }

    /// Builder-style sink attachment.
    pub fn with_sink(mut self, sink: Box<dyn SnapshotSink>) -> Self {
        self.add_sink(sink);
        self
    }

    /// The session state.
    pub fn session(&self) -> &GameSession {
        &self.session
    }

    /// The session state, mutably. Lobby management only; during a match
    /// every mutation must go through the command methods.
    pub fn session_mut(&mut self) -> &mut GameSession {
        &mut self.session
    }

    /// The configured rules.
    pub fn rules(&self) -> &MatchRules {
        &self.rules
    }

    /// Consume the machine, returning the session and rules.
    pub fn into_parts(self) -> (GameSession, MatchRules) {
        (self.session, self.rules)
    }

    /// Start the match: assign roles and enter the first night.
    ///
    /// No-op unless the session is in the lobby with at least
    /// `rules.min_players` players.
    pub fn start_match(&mut self) -> StepResult {
        if self.session.phase != GamePhase::Lobby
            || self.session.player_count() < self.rules.min_players
        {
            return StepResult::default();
        }
        self.advance()
    }

    /// Record a night target. Silent no-op on invalid input.
    pub fn record_night_target(&mut self, role: Role, actor: &PlayerId, target: &PlayerId) {
        night::set_night_target(&mut self.session, role, actor, target);
    }

    /// Record a day vote. Silent no-op on invalid input.
    pub fn record_vote(&mut self, voter: &PlayerId, target: &PlayerId) {
        vote::record_vote(&mut self.session, voter, target);
    }

    /// Whether the current night phase's actor has acted (or cannot act).
    ///
    /// Drivers use this to advance night phases without waiting on the
    /// Master authority.
    pub fn night_action_done(&self) -> bool {
        night::acting_role_done(&self.session)
    }

    /// Advance one simulation tick.
    ///
    /// Counts elapsed time and, in timed phases, drives the countdown;
    /// a countdown reaching zero advances the phase. Does nothing in the
    /// lobby or after the match has ended.
    pub fn tick(&mut self) -> StepResult {
        match self.session.phase {
            GamePhase::Lobby => return StepResult::default(),
            GamePhase::GameEnd => {
                return StepResult {
                    match_ended: true,
                    winner: self.session.winner,
                    ..StepResult::default()
                };
            }
            _ => {}
        }

        self.session.tick += 1;

        if self.session.phase.is_timed() && self.session.phase_timer > 0 {
            self.session.phase_timer -= 1;
            if self.session.phase_timer == 0 {
                return self.advance();
            }
        }

        StepResult::default()
    }

    /// Advance to the next phase, performing the entry side effects.
    ///
    /// Called by the Master authority, by night-phase drivers once the
    /// acting role has submitted, and internally on timer expiry. Ignored
    /// in `GameEnd` (terminal) and in an under-populated lobby.
    pub fn advance(&mut self) -> StepResult {
        let from = self.session.phase;
        match from {
            GamePhase::Lobby => {
                if self.session.player_count() < self.rules.min_players {
                    return StepResult::default();
                }
                roles::assign_roles(&mut self.session);
                self.session.clear_night_targets();
                self.transition(from, GamePhase::NightMafia)
            }
            GamePhase::NightMafia => self.transition(from, GamePhase::NightDoctor),
            GamePhase::NightDoctor => self.transition(from, GamePhase::NightDetective),
            GamePhase::NightDetective => {
                night::resolve_night(&mut self.session);
                match win::check_win(&self.session) {
                    Some(winner) => self.finish(from, winner),
                    None => {
                        self.session.phase_timer = self.rules.discussion_secs * TICK_RATE;
                        self.transition(from, GamePhase::DayDiscussion)
                    }
                }
            }
            GamePhase::DayDiscussion => {
                self.session.phase_timer = self.rules.voting_secs * TICK_RATE;
                self.transition(from, GamePhase::DayVoting)
            }
            GamePhase::DayVoting => {
                vote::resolve_votes(&mut self.session);
                match win::check_win(&self.session) {
                    Some(winner) => self.finish(from, winner),
                    None => {
                        self.session.day += 1;
                        self.session.phase_timer = 0;
                        self.session.clear_night_targets();
                        self.transition(from, GamePhase::NightMafia)
                    }
                }
            }
            // Terminal: no state change, no snapshot
            GamePhase::GameEnd => StepResult::default(),
        }
    }

    /// Complete a transition: record it, publish a snapshot, drain events.
    fn transition(&mut self, from: GamePhase, to: GamePhase) -> StepResult {
        self.session.phase = to;
        let tick = self.session.tick;
        self.session.push_event(GameEvent::phase_changed(tick, from, to));

        debug!(?from, ?to, tick, "phase transition");
        self.publish_snapshot();

        StepResult {
            events: self.session.take_events(),
            transitioned: true,
            match_ended: false,
            winner: None,
        }
    }

    /// Conclude the match with a winner.
    fn finish(&mut self, from: GamePhase, winner: Winner) -> StepResult {
        self.session.winner = Some(winner);
        self.session.phase_timer = 0;
        self.session.phase = GamePhase::GameEnd;

        let tick = self.session.tick;
        self.session
            .push_event(GameEvent::phase_changed(tick, from, GamePhase::GameEnd));
        self.session.push_event(GameEvent::match_ended(tick, winner));

        debug!(?from, ?winner, tick, "match ended");
        self.publish_snapshot();

        StepResult {
            events: self.session.take_events(),
            transitioned: true,
            match_ended: true,
            winner: Some(winner),
        }
    }

    fn publish_snapshot(&mut self) {
        let snapshot = Snapshot::capture(&self.session);
        for sink in &mut self.sinks {
            sink.publish(&snapshot);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
