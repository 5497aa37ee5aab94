//! Game Events
//!
//! Events generated by the rules engine for broadcast and replay.
//!
//! Unlike the snapshot, which is a full public view, events are incremental
//! and carry a visibility scope: hidden-information results (role reveals,
//! investigation outcomes) are addressed to a single recipient and must never
//! be broadcast. Routing is the session layer's job; the engine only tags.

use serde::{Serialize, Deserialize};

use crate::game::state::{GamePhase, PlayerId, Role, Winner};

/// Who may see an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventVisibility {
    /// Every participant.
    Public,
    /// Exactly one recipient.
    Private(PlayerId),
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventData {
    /// A role was dealt to a player at match start.
    RoleAssigned {
        player_id: PlayerId,
        role: Role,
    },

    /// The phase machine transitioned.
    PhaseChanged {
        from: GamePhase,
        to: GamePhase,
    },

    /// The night was resolved; `victim` is the player who died, if any.
    NightResolved {
        victim: Option<PlayerId>,
    },

    /// The detective learned a player's role.
    Investigation {
        detective: PlayerId,
        target: PlayerId,
        role: Role,
    },

    /// A player was voted out during the day.
    PlayerEliminated {
        player_id: PlayerId,
        votes: u32,
    },

    /// The match concluded.
    MatchEnded {
        winner: Winner,
    },
}

/// A game event with timing and visibility.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u32,

    /// Who may see it
    pub visibility: EventVisibility,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u32, visibility: EventVisibility, data: GameEventData) -> Self {
        Self {
            tick,
            visibility,
            data,
        }
    }

    /// Create role assigned event (private to the player).
    pub fn role_assigned(tick: u32, player_id: PlayerId, role: Role) -> Self {
        Self::new(
            tick,
            EventVisibility::Private(player_id),
            GameEventData::RoleAssigned { player_id, role },
        )
    }

    /// Create phase changed event.
    pub fn phase_changed(tick: u32, from: GamePhase, to: GamePhase) -> Self {
        Self::new(
            tick,
            EventVisibility::Public,
            GameEventData::PhaseChanged { from, to },
        )
    }

    /// Create night resolved event.
    pub fn night_resolved(tick: u32, victim: Option<PlayerId>) -> Self {
        Self::new(
            tick,
            EventVisibility::Public,
            GameEventData::NightResolved { victim },
        )
    }

    /// Create investigation result event (private to the detective).
    pub fn investigation(tick: u32, detective: PlayerId, target: PlayerId, role: Role) -> Self {
        Self::new(
            tick,
            EventVisibility::Private(detective),
            GameEventData::Investigation {
                detective,
                target,
                role,
            },
        )
    }

    /// Create player eliminated event.
    pub fn player_eliminated(tick: u32, player_id: PlayerId, votes: u32) -> Self {
        Self::new(
            tick,
            EventVisibility::Public,
            GameEventData::PlayerEliminated { player_id, votes },
        )
    }

    /// Create match ended event.
    pub fn match_ended(tick: u32, winner: Winner) -> Self {
        Self::new(
            tick,
            EventVisibility::Public,
            GameEventData::MatchEnded { winner },
        )
    }

    /// The single recipient, for private events.
    pub fn recipient(&self) -> Option<PlayerId> {
        match self.visibility {
            EventVisibility::Private(id) => Some(id),
            EventVisibility::Public => None,
        }
    }

    /// Whether a given player is allowed to see this event.
    pub fn visible_to(&self, player_id: &PlayerId) -> bool {
        match self.visibility {
            EventVisibility::Public => true,
            EventVisibility::Private(id) => id == *player_id,
        }
    }
}
