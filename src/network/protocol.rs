//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages are serialized as JSON for debugging ease,
//! with optional binary (bincode) for flat payloads.
//!
//! Hidden information never rides in a broadcast message: role reveals and
//! investigation results are delivered as per-recipient `Event` messages,
//! routed by the room before anything reaches a socket.

use serde::{Serialize, Deserialize};

use crate::game::events::{GameEvent, GameEventData};
use crate::game::snapshot::Snapshot;
use crate::game::state::{GamePhase, PlayerId, Role, Winner};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Authenticate with the server.
    Auth(AuthRequest),

    /// Create a new lobby and become its host.
    CreateLobby,

    /// Join an existing lobby.
    JoinLobby {
        /// Lobby to join.
        lobby_id: [u8; 16],
    },

    /// Toggle ready state in the lobby.
    Ready {
        /// Ready to start?
        ready: bool,
    },

    /// Start the match (host only).
    StartMatch,

    /// Submit a night target for one's role.
    NightTarget(NightTargetRequest),

    /// Vote against a player during the day vote.
    Vote {
        /// Target of the vote.
        target_id: [u8; 16],
    },

    /// Force the phase forward (host only).
    AdvancePhase,

    /// Request a fresh snapshot (reconnection).
    SyncRequest,

    /// Ping for latency measurement.
    Ping {
        /// Client timestamp, echoed back.
        timestamp: u64,
    },

    /// Leave the current lobby or match.
    Leave,
}

/// Authentication request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Player's claimed identifier (UUID string). Ignored when the server
    /// validates tokens - the id is derived from the token subject instead.
    pub player_id: String,
    /// Display name shown to other players.
    pub display_name: String,
    /// Authentication token (JWT), required when auth is configured.
    pub token: Option<String>,
    /// Client version for compatibility check.
    pub client_version: String,
}

/// A night-action submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NightTargetRequest {
    /// Role the submitter is acting as. Cross-checked against the
    /// authoritative roster; lying here is a silent no-op.
    pub role: Role,
    /// Chosen target.
    pub target_id: [u8; 16],
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Authentication result.
    AuthResult(AuthResult),

    /// Lobby membership changed.
    Lobby(LobbyStateInfo),

    /// Full state snapshot (emitted on every phase transition).
    Snapshot(Snapshot),

    /// Incremental match event. Private events reach only their recipient.
    Event(MatchEvent),

    /// Match ended: final result and full role reveal.
    MatchEnd(MatchEndInfo),

    /// Pong response.
    Pong {
        /// Echoed client timestamp.
        timestamp: u64,
        /// Server wall-clock (ms since epoch).
        server_time: u64,
    },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown {
        /// Human-readable reason.
        reason: String,
    },
}

/// Authentication result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResult {
    /// Whether auth succeeded.
    pub success: bool,
    /// Authoritative player id (UUID string) if successful.
    pub player_id: Option<String>,
    /// Error message if failed.
    pub error: Option<String>,
    /// Server version.
    pub server_version: String,
}

/// Lobby state, broadcast on every membership or readiness change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyStateInfo {
    /// Lobby identifier.
    pub lobby_id: [u8; 16],
    /// Current host (Master authority).
    pub host: Option<[u8; 16]>,
    /// Players in join order.
    pub players: Vec<LobbyPlayerInfo>,
}

/// One player as seen in the lobby.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyPlayerInfo {
    /// Player identifier.
    pub player_id: [u8; 16],
    /// Display name.
    pub name: String,
    /// Ready to start?
    pub ready: bool,
    /// Currently connected?
    pub connected: bool,
}

/// Match events as sent to clients.
///
/// Flattened from the engine's [`GameEvent`]: visibility routing has already
/// happened by the time one of these is serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MatchEvent {
    /// Your hidden role for this match.
    RoleAssigned {
        /// Assigned role.
        role: Role,
    },

    /// The phase machine transitioned.
    PhaseChanged {
        /// Phase left.
        from: GamePhase,
        /// Phase entered.
        to: GamePhase,
    },

    /// The night resolved.
    NightResolved {
        /// Player killed tonight, if any.
        victim: Option<[u8; 16]>,
    },

    /// Your investigation result (detective only).
    Investigation {
        /// Investigated player.
        target: [u8; 16],
        /// That player's role.
        role: Role,
    },

    /// A player was voted out.
    PlayerEliminated {
        /// Eliminated player.
        player_id: [u8; 16],
        /// Votes against them.
        votes: u32,
    },

    /// The match concluded.
    MatchEnded {
        /// Winning faction.
        winner: Winner,
    },
}

impl MatchEvent {
    /// Flatten an engine event for the wire.
    pub fn from_game_event(event: &GameEvent) -> Self {
        match &event.data {
            GameEventData::RoleAssigned { role, .. } => MatchEvent::RoleAssigned { role: *role },
            GameEventData::PhaseChanged { from, to } => MatchEvent::PhaseChanged {
                from: *from,
                to: *to,
            },
            GameEventData::NightResolved { victim } => MatchEvent::NightResolved {
                victim: victim.map(|v| *v.as_bytes()),
            },
            GameEventData::Investigation { target, role, .. } => MatchEvent::Investigation {
                target: *target.as_bytes(),
                role: *role,
            },
            GameEventData::PlayerEliminated { player_id, votes } => MatchEvent::PlayerEliminated {
                player_id: *player_id.as_bytes(),
                votes: *votes,
            },
            GameEventData::MatchEnded { winner } => MatchEvent::MatchEnded { winner: *winner },
        }
    }
}

/// Match end information, with the full role reveal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchEndInfo {
    /// Match identifier.
    pub match_id: [u8; 16],
    /// Final tick.
    pub end_tick: u32,
    /// Winning faction.
    pub winner: Winner,
    /// Every player's role, revealed now that the match is over.
    pub roles: Vec<RevealedRole>,
    /// Final state hash.
    pub final_state_hash: [u8; 32],
    /// Match transcript for independent verification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Vec<u8>>,
}

/// One entry of the end-of-match role reveal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealedRole {
    /// Player identifier.
    pub player_id: [u8; 16],
    /// Display name.
    pub name: String,
    /// The role they held.
    pub role: Role,
    /// Whether they survived the match.
    pub alive: bool,
}

/// Server error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Authentication failed.
    AuthFailed,
    /// Not authenticated.
    NotAuthenticated,
    /// JWT token has expired.
    TokenExpired,
    /// Invalid JWT token (signature, format, claims).
    InvalidToken,
    /// Invalid input.
    InvalidInput,
    /// Lobby not found.
    LobbyNotFound,
    /// Lobby is full.
    LobbyFull,
    /// Already in a lobby.
    AlreadyInLobby,
    /// Not in a lobby.
    NotInLobby,
    /// Only the host may do that.
    NotHost,
    /// Match already in progress.
    MatchInProgress,
    /// Not enough players to start.
    NotEnoughPlayers,
    /// Internal error.
    InternalError,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl NightTargetRequest {
    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

/// Parse a protocol player id into an engine id.
pub fn player_id_from_bytes(bytes: &[u8; 16]) -> PlayerId {
    PlayerId::new(*bytes)
}
