//! Network Layer
//!
//! WebSocket server for real-time multiplayer communication.
//! This layer is **non-deterministic** - all game logic runs through `game/`,
//! and every room's state is mutated by exactly one task consuming a
//! serialized command queue.

pub mod auth;
pub mod protocol;
pub mod session;
pub mod server;

pub use auth::{AuthConfig, TokenClaims, AuthError, validate_token};
pub use protocol::{ClientMessage, ServerMessage, MatchEvent, LobbyStateInfo, MatchEndInfo};
pub use session::{GameRoom, RoomId, RoomState, RoomConfig, RoomCommand, RoomHandle, RoomManager};
pub use server::{GameServer, ServerConfig, GameServerError};
