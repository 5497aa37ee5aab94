//! State Snapshots
//!
//! The public view of a match emitted after every phase transition, plus the
//! sink abstraction the phase machine publishes through.
//!
//! Sinks are passed to the machine at construction and composed freely
//! (local log, network broadcast, transcript recorder) - there is no global
//! presentation singleton anywhere in the engine. Per-recipient private data
//! travels as visibility-scoped events, never inside the snapshot.

use std::sync::{Arc, Mutex};

use serde::{Serialize, Deserialize};

use crate::core::hash::StateHash;
use crate::game::state::{GamePhase, GameSession, PlayerId, Role, Winner};
use crate::TICK_RATE;

/// One living player as shown in a snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    /// Player identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Assigned role.
    pub role: Role,
}

/// The full public view of a match at a phase boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Match identifier.
    pub match_id: [u8; 16],
    /// Simulation tick at emission.
    pub tick: u32,
    /// Phase just entered.
    pub phase: GamePhase,
    /// Completed night/day cycles.
    pub day: u32,
    /// Seconds left in the phase, for timed phases.
    pub timer_secs: Option<u32>,
    /// Every living player.
    pub players: Vec<PlayerView>,
    /// Winner, once the match has concluded.
    pub winner: Option<Winner>,
    /// Hash of the full authoritative state, for view-consistency checks.
    pub state_hash: StateHash,
}

impl Snapshot {
    /// Capture the current session state.
    pub fn capture(session: &GameSession) -> Self {
        let players = session
            .living_players()
            .map(|p| PlayerView {
                id: p.id,
                name: p.name.clone(),
                role: p.role,
            })
            .collect();

        let timer_secs = if session.phase.is_timed() {
            // Round up so a 1-tick remainder still shows a full second
            Some(session.phase_timer.div_ceil(TICK_RATE))
        } else {
            None
        };

        Self {
            match_id: session.match_id,
            tick: session.tick,
            phase: session.phase,
            day: session.day,
            timer_secs,
            players,
            winner: session.winner,
            state_hash: session.compute_hash(),
        }
    }
}

/// Consumer of snapshots.
///
/// One synchronous call per transition; delivery fan-out, retries, and
/// serialization are the implementor's concern, never the engine's.
pub trait SnapshotSink: Send + Sync {
    /// Publish a snapshot.
    fn publish(&mut self, snapshot: &Snapshot);
}

/// Sink that collects snapshots into shared storage.
///
/// Used by tests and by the transcript recorder.
#[derive(Clone, Default)]
pub struct CollectorSink {
    snapshots: Arc<Mutex<Vec<Snapshot>>>,
}

impl CollectorSink {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the collected snapshots.
    pub fn collected(&self) -> Arc<Mutex<Vec<Snapshot>>> {
        self.snapshots.clone()
    }

    /// Number of snapshots collected so far.
    pub fn len(&self) -> usize {
        self.snapshots.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Whether nothing has been collected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotSink for CollectorSink {
    fn publish(&mut self, snapshot: &Snapshot) {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.push(snapshot.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u8) -> PlayerId {
        PlayerId::new([n; 16])
    }

    #[test]
    fn test_snapshot_lists_living_players_only() {
        let mut session = GameSession::new([1; 16], 7);
        session.add_player(pid(1), "alice");
        session.add_player(pid(2), "bob");
        session.add_player(pid(3), "carol");
        session.player_mut(&pid(2)).unwrap().alive = false;

        let snapshot = Snapshot::capture(&session);

        let ids: Vec<PlayerId> = snapshot.players.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![pid(1), pid(3)]);
    }

    #[test]
    fn test_timer_secs_only_in_timed_phases() {
        let mut session = GameSession::new([1; 16], 7);
        session.phase = GamePhase::NightMafia;
        assert_eq!(Snapshot::capture(&session).timer_secs, None);

        session.phase = GamePhase::DayDiscussion;
        session.phase_timer = 45 * TICK_RATE;
        assert_eq!(Snapshot::capture(&session).timer_secs, Some(45));

        // Partial second rounds up
        session.phase_timer = 1;
        assert_eq!(Snapshot::capture(&session).timer_secs, Some(1));
    }

    #[test]
    fn test_collector_sink() {
        let sink = CollectorSink::new();
        let collected = sink.collected();
        let mut boxed: Box<dyn SnapshotSink> = Box::new(sink.clone());

        let session = GameSession::new([1; 16], 7);
        boxed.publish(&Snapshot::capture(&session));
        boxed.publish(&Snapshot::capture(&session));

        assert_eq!(sink.len(), 2);
        assert_eq!(collected.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_snapshot_hash_matches_session() {
        let mut session = GameSession::new([1; 16], 7);
        session.add_player(pid(1), "alice");

        let snapshot = Snapshot::capture(&session);
        assert_eq!(snapshot.state_hash, session.compute_hash());
    }
}
