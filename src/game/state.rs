//! Game State Definitions
//!
//! All state types for a Duskfall match.
//! Roster order is join order and is part of the deterministic state.

use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;
use crate::core::hash::{StateHash, StateHasher, compute_state_hash};
use crate::game::events::GameEvent;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier (UUID as bytes).
///
/// Implements Ord for deterministic sorting (seed derivation).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

// =============================================================================
// ROLE
// =============================================================================

/// Hidden role assigned to a player for the match's duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
#[derive(Default)]
pub enum Role {
    /// Kills one player per night.
    Mafia = 0,
    /// Protects one player per night.
    Doctor = 1,
    /// Learns one player's role per night.
    Detective = 2,
    /// No night action.
    #[default]
    Civilian = 3,
}

impl Role {
    /// The night phase in which this role acts, if any.
    pub fn night_phase(self) -> Option<GamePhase> {
        match self {
            Role::Mafia => Some(GamePhase::NightMafia),
            Role::Doctor => Some(GamePhase::NightDoctor),
            Role::Detective => Some(GamePhase::NightDetective),
            Role::Civilian => None,
        }
    }

    /// Get role from index (0-3).
    pub fn from_index(index: u8) -> Option<Role> {
        match index {
            0 => Some(Role::Mafia),
            1 => Some(Role::Doctor),
            2 => Some(Role::Detective),
            3 => Some(Role::Civilian),
            _ => None,
        }
    }
}

// =============================================================================
// GAME PHASE
// =============================================================================

/// One discrete stage of the match's turn cycle.
///
/// `Lobby` is initial; `GameEnd` is terminal (no outgoing transitions).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
#[derive(Default)]
pub enum GamePhase {
    /// Players joining, match not started.
    #[default]
    Lobby = 0,
    /// Mafia chooses a kill target.
    NightMafia = 1,
    /// Doctor chooses a player to protect.
    NightDoctor = 2,
    /// Detective chooses a player to investigate.
    NightDetective = 3,
    /// Open discussion, timed.
    DayDiscussion = 4,
    /// Day vote, timed.
    DayVoting = 5,
    /// Match concluded.
    GameEnd = 6,
}

impl GamePhase {
    /// Whether this phase runs on the countdown timer.
    ///
    /// Timed phases auto-advance when the timer reaches zero;
    /// all others advance only on explicit command.
    pub fn is_timed(self) -> bool {
        matches!(self, GamePhase::DayDiscussion | GamePhase::DayVoting)
    }

    /// Whether this is one of the night sub-phases.
    pub fn is_night(self) -> bool {
        matches!(
            self,
            GamePhase::NightMafia | GamePhase::NightDoctor | GamePhase::NightDetective
        )
    }

    /// The role that acts during this phase, if it is a night phase.
    pub fn acting_role(self) -> Option<Role> {
        match self {
            GamePhase::NightMafia => Some(Role::Mafia),
            GamePhase::NightDoctor => Some(Role::Doctor),
            GamePhase::NightDetective => Some(Role::Detective),
            _ => None,
        }
    }
}

// =============================================================================
// WINNER
// =============================================================================

/// Faction that won the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Winner {
    /// All mafia eliminated.
    Civilians = 0,
    /// Mafia reached parity with the rest of the roster.
    Mafia = 1,
}

// =============================================================================
// PLAYER STATE
// =============================================================================

/// State of a single player in the match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    /// Unique player ID
    pub id: PlayerId,

    /// Display name
    pub name: String,

    /// Assigned role (Civilian until assignment runs)
    pub role: Role,

    /// Is player still alive?
    pub alive: bool,

    /// Who this player voted for this cycle
    pub vote_target: Option<PlayerId>,

    /// Has this player voted this cycle?
    pub has_voted: bool,
}

impl Player {
    /// Create a new player in the lobby.
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            role: Role::Civilian,
            alive: true,
            vote_target: None,
            has_voted: false,
        }
    }

    /// Hash this player's state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_uuid(&self.id.0);
        hasher.update_str(&self.name);
        hasher.update_u8(self.role as u8);
        hasher.update_bool(self.alive);
        hasher.update_opt_uuid(self.vote_target.as_ref().map(|t| &t.0));
        hasher.update_bool(self.has_voted);
    }
}

// =============================================================================
// VOTE TALLY ENTRY
// =============================================================================

/// One entry in the day-vote tally.
///
/// Entries are appended in first-vote order; that order is the deterministic
/// tie-break when the tally is resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteEntry {
    /// Player the votes are for.
    pub target: PlayerId,
    /// Number of votes received so far this cycle.
    pub votes: u32,
}

// =============================================================================
// GAME SESSION
// =============================================================================

/// Complete authoritative state of one match.
///
/// Exactly one `GameSession` exists per match; it owns the roster and all
/// night/vote scratch state. All client views are derived from it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameSession {
    /// Match identifier
    pub match_id: [u8; 16],

    /// Elapsed simulation ticks
    pub tick: u32,

    /// Current phase
    pub phase: GamePhase,

    /// Remaining ticks in the current phase (timed phases only)
    pub phase_timer: u32,

    /// Completed night/day cycles
    pub day: u32,

    /// RNG seed (for verification)
    pub rng_seed: u64,

    /// Deterministic RNG state
    #[serde(skip)]
    pub rng: DeterministicRng,

    /// Roster in join order. Frozen once role assignment runs.
    players: Vec<Player>,

    /// Mafia's kill target this night
    pub mafia_target: Option<PlayerId>,

    /// Doctor's protection target this night
    pub doctor_target: Option<PlayerId>,

    /// Detective's investigation target this night
    pub detective_target: Option<PlayerId>,

    /// Day-vote tally in first-vote order
    pub vote_counts: Vec<VoteEntry>,

    /// Winner, once the match has concluded
    pub winner: Option<Winner>,

    /// Events generated since the last drain
    #[serde(skip)]
    pending_events: Vec<GameEvent>,
}

impl GameSession {
    /// Create a new session in the lobby.
    pub fn new(match_id: [u8; 16], rng_seed: u64) -> Self {
        Self {
            match_id,
            tick: 0,
            phase: GamePhase::Lobby,
            phase_timer: 0,
            day: 0,
            rng_seed,
            rng: DeterministicRng::new(rng_seed),
            players: Vec::new(),
            mafia_target: None,
            doctor_target: None,
            detective_target: None,
            vote_counts: Vec::new(),
            winner: None,
            pending_events: Vec::new(),
        }
    }

    /// Add a player to the roster.
    ///
    /// Only possible in the lobby and only for ids not already present;
    /// returns whether the player was added. Membership is frozen for the
    /// rest of the match once role assignment runs.
    pub fn add_player(&mut self, id: PlayerId, name: impl Into<String>) -> bool {
        if self.phase != GamePhase::Lobby || self.contains(&id) {
            return false;
        }
        self.players.push(Player::new(id, name));
        true
    }

    /// Remove a player from the roster (lobby only).
    ///
    /// Mid-match departures are a session-layer concern and never shrink
    /// the roster.
    pub fn remove_player(&mut self, id: &PlayerId) -> bool {
        if self.phase != GamePhase::Lobby {
            return false;
        }
        let before = self.players.len();
        self.players.retain(|p| p.id != *id);
        self.players.len() != before
    }

    /// Whether the roster contains this id.
    pub fn contains(&self, id: &PlayerId) -> bool {
        self.players.iter().any(|p| p.id == *id)
    }

    /// Get a player by ID.
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == *id)
    }

    /// Get a player mutably by ID.
    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == *id)
    }

    /// All players in join order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// All players in join order, mutably.
    pub fn players_mut(&mut self) -> &mut [Player] {
        &mut self.players
    }

    /// Roster size.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Living players in join order.
    pub fn living_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.alive)
    }

    /// Count of living players.
    pub fn living_count(&self) -> usize {
        self.living_players().count()
    }

    /// Count of living players with the given role.
    pub fn living_with_role(&self, role: Role) -> usize {
        self.living_players().filter(|p| p.role == role).count()
    }

    /// A player's assigned role, if the player exists.
    pub fn role_of(&self, id: &PlayerId) -> Option<Role> {
        self.player(id).map(|p| p.role)
    }

    /// Whether a command from this player should be accepted at all:
    /// the player must be on the roster and alive.
    pub fn is_living_player(&self, id: &PlayerId) -> bool {
        self.player(id).map(|p| p.alive).unwrap_or(false)
    }

    /// Clear all night targets.
    ///
    /// Runs after night resolution and again on every NightMafia entry.
    pub fn clear_night_targets(&mut self) {
        self.mafia_target = None;
        self.doctor_target = None;
        self.detective_target = None;
    }

    /// Check if the match has concluded.
    pub fn is_ended(&self) -> bool {
        self.phase == GamePhase::GameEnd
    }

    /// Compute hash of current state for verification.
    ///
    /// Covers hidden information too: two views agree on a hash only if
    /// they agree on roles, targets, and the tally, not just the public
    /// surface.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.tick, self.rng_seed, |hasher| {
            hasher.update_u8(self.phase as u8);
            hasher.update_u32(self.phase_timer);
            hasher.update_u32(self.day);

            hasher.update_u32(self.players.len() as u32);
            for player in &self.players {
                player.hash_into(hasher);
            }

            hasher.update_opt_uuid(self.mafia_target.as_ref().map(|t| &t.0));
            hasher.update_opt_uuid(self.doctor_target.as_ref().map(|t| &t.0));
            hasher.update_opt_uuid(self.detective_target.as_ref().map(|t| &t.0));

            hasher.update_u32(self.vote_counts.len() as u32);
            for entry in &self.vote_counts {
                hasher.update_uuid(&entry.target.0);
                hasher.update_u32(entry.votes);
            }

            match self.winner {
                Some(w) => {
                    hasher.update_u8(1);
                    hasher.update_u8(w as u8);
                }
                None => hasher.update_u8(0),
            }
        })
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u8) -> PlayerId {
        PlayerId::new([n; 16])
    }

    #[test]
    fn test_player_id_ordering() {
        let id1 = PlayerId::new([0; 16]);
        let id2 = PlayerId::new([1; 16]);
        let id3 = PlayerId::new([0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);

        assert!(id1 < id2);
        assert!(id1 < id3);
        assert!(id3 < id2);
    }

    #[test]
    fn test_player_id_uuid_roundtrip() {
        let id = PlayerId::new([7; 16]);
        let s = id.to_uuid_string();
        assert_eq!(PlayerId::from_uuid_str(&s), Some(id));
        assert!(PlayerId::from_uuid_str("not-a-uuid").is_none());
    }

    #[test]
    fn test_role_night_phases() {
        assert_eq!(Role::Mafia.night_phase(), Some(GamePhase::NightMafia));
        assert_eq!(Role::Doctor.night_phase(), Some(GamePhase::NightDoctor));
        assert_eq!(Role::Detective.night_phase(), Some(GamePhase::NightDetective));
        assert_eq!(Role::Civilian.night_phase(), None);

        // Inverse mapping
        assert_eq!(GamePhase::NightMafia.acting_role(), Some(Role::Mafia));
        assert_eq!(GamePhase::DayVoting.acting_role(), None);
    }

    #[test]
    fn test_phase_classification() {
        assert!(GamePhase::DayDiscussion.is_timed());
        assert!(GamePhase::DayVoting.is_timed());
        assert!(!GamePhase::NightMafia.is_timed());
        assert!(!GamePhase::Lobby.is_timed());

        assert!(GamePhase::NightDoctor.is_night());
        assert!(!GamePhase::DayVoting.is_night());
    }

    #[test]
    fn test_roster_join_order_and_uniqueness() {
        let mut session = GameSession::new([0; 16], 1);

        assert!(session.add_player(pid(3), "carol"));
        assert!(session.add_player(pid(1), "alice"));
        assert!(session.add_player(pid(2), "bob"));

        // Duplicate id rejected
        assert!(!session.add_player(pid(1), "alice-again"));
        assert_eq!(session.player_count(), 3);

        // Insertion order preserved, not sorted
        let order: Vec<PlayerId> = session.players().iter().map(|p| p.id).collect();
        assert_eq!(order, vec![pid(3), pid(1), pid(2)]);
    }

    #[test]
    fn test_roster_frozen_outside_lobby() {
        let mut session = GameSession::new([0; 16], 1);
        session.add_player(pid(1), "alice");
        session.phase = GamePhase::NightMafia;

        assert!(!session.add_player(pid(2), "bob"));
        assert!(!session.remove_player(&pid(1)));
        assert_eq!(session.player_count(), 1);
    }

    #[test]
    fn test_living_counts() {
        let mut session = GameSession::new([0; 16], 1);
        session.add_player(pid(1), "alice");
        session.add_player(pid(2), "bob");
        session.add_player(pid(3), "carol");

        session.player_mut(&pid(1)).unwrap().role = Role::Mafia;
        session.player_mut(&pid(3)).unwrap().alive = false;

        assert_eq!(session.living_count(), 2);
        assert_eq!(session.living_with_role(Role::Mafia), 1);
        assert!(session.is_living_player(&pid(2)));
        assert!(!session.is_living_player(&pid(3)));
        assert!(!session.is_living_player(&pid(99)));
    }

    #[test]
    fn test_state_hash_determinism() {
        let build = || {
            let mut session = GameSession::new([5; 16], 777);
            session.add_player(pid(1), "alice");
            session.add_player(pid(2), "bob");
            session.mafia_target = Some(pid(2));
            session
        };

        assert_eq!(build().compute_hash(), build().compute_hash());
    }

    #[test]
    fn test_state_hash_covers_hidden_state() {
        let mut session1 = GameSession::new([5; 16], 777);
        session1.add_player(pid(1), "alice");
        session1.add_player(pid(2), "bob");

        let mut session2 = session1.clone();

        // Same public surface, different hidden role
        session2.player_mut(&pid(1)).unwrap().role = Role::Mafia;
        assert_ne!(session1.compute_hash(), session2.compute_hash());

        // Night target also changes the hash
        let mut session3 = session1.clone();
        session3.doctor_target = Some(pid(1));
        assert_ne!(session1.compute_hash(), session3.compute_hash());
    }

    #[test]
    fn test_events_drain() {
        use crate::game::events::GameEvent;

        let mut session = GameSession::new([0; 16], 1);
        session.push_event(GameEvent::night_resolved(1, None));
        session.push_event(GameEvent::night_resolved(2, Some(pid(1))));

        let events = session.take_events();
        assert_eq!(events.len(), 2);
        assert!(session.take_events().is_empty());
    }
}
