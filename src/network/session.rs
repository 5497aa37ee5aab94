//! Room Lifecycle and Command Serialization
//!
//! A room hosts one match from lobby to completion. Every inbound command -
//! joins, readiness, night targets, votes, forced advances - is funneled
//! through a single mpsc queue consumed by one task per room, alongside the
//! tick interval. The authoritative session therefore only ever has a single
//! writer; role actions arriving concurrently from many sockets are applied
//! atomically in arrival order.
//!
//! The room also records the match transcript: each command is recorded
//! exactly as it is applied, so the transcript replays to the same hashes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::core::rng::derive_match_seed;
use crate::game::phase::{MatchRules, PhaseMachine, StepResult};
use crate::game::snapshot::{Snapshot, SnapshotSink};
use crate::game::state::{GameSession, PlayerId, Role};
use crate::network::protocol::{
    ErrorCode, LobbyPlayerInfo, LobbyStateInfo, MatchEndInfo, MatchEvent, RevealedRole,
    ServerError, ServerMessage,
};
use crate::replay::transcript::{
    MatchMetadata, MatchResult, MatchTranscript, RecordedCommand, CHECKPOINT_INTERVAL,
};
use crate::TICK_RATE;

/// Unique room identifier.
pub type RoomId = [u8; 16];

/// Room state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// Players joining and readying up.
    Lobby,
    /// Match in progress.
    Playing,
    /// Match over or lobby abandoned; the room task exits.
    Closed,
}

/// Configuration for a room.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Maximum players in the lobby.
    pub max_players: usize,
    /// Match rules handed to the phase machine.
    pub rules: MatchRules,
    /// Record a transcript for post-match verification.
    pub record_transcript: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_players: 10,
            rules: MatchRules::default(),
            record_transcript: true,
        }
    }
}

/// A player connected to a room.
#[derive(Debug)]
pub struct RoomPlayer {
    /// Player identifier.
    pub player_id: PlayerId,
    /// Display name.
    pub name: String,
    /// Ready to start.
    pub ready: bool,
    /// Connection state. A mid-match leaver stays on the roster with this
    /// flag cleared; the engine never learns about connectivity.
    pub connected: bool,
    /// Message channel to this player.
    pub sender: mpsc::Sender<ServerMessage>,
}

/// Room errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RoomError {
    /// Lobby is full.
    #[error("Lobby is full")]
    LobbyFull,

    /// Player already in the lobby.
    #[error("Already in lobby")]
    AlreadyInLobby,

    /// Match is in progress.
    #[error("Match in progress")]
    MatchInProgress,

    /// Match not in progress.
    #[error("Match not in progress")]
    MatchNotInProgress,

    /// Player not in the room.
    #[error("Not in lobby")]
    NotInLobby,

    /// Only the host may do that.
    #[error("Only the host may do that")]
    NotHost,

    /// Not enough players to start.
    #[error("Not enough players")]
    NotEnoughPlayers,
}

impl RoomError {
    /// Matching protocol error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            RoomError::LobbyFull => ErrorCode::LobbyFull,
            RoomError::AlreadyInLobby => ErrorCode::AlreadyInLobby,
            RoomError::MatchInProgress => ErrorCode::MatchInProgress,
            RoomError::MatchNotInProgress => ErrorCode::InvalidInput,
            RoomError::NotInLobby => ErrorCode::NotInLobby,
            RoomError::NotHost => ErrorCode::NotHost,
            RoomError::NotEnoughPlayers => ErrorCode::NotEnoughPlayers,
        }
    }
}

/// Snapshot sink feeding the room's broadcast path.
///
/// The phase machine publishes synchronously during a transition; the room
/// drains this channel right after applying the command and fans out to the
/// connected players.
struct ChannelSink(mpsc::UnboundedSender<Snapshot>);

impl SnapshotSink for ChannelSink {
    fn publish(&mut self, snapshot: &Snapshot) {
        let _ = self.0.send(snapshot.clone());
    }
}

/// A room hosting one match.
pub struct GameRoom {
    /// Unique room identifier (doubles as the match id).
    pub id: RoomId,
    /// Configuration.
    pub config: RoomConfig,
    /// Current state.
    pub state: RoomState,
    /// Host (Master authority): the first player to join.
    host: Option<PlayerId>,
    /// Connected players in join order.
    players: Vec<RoomPlayer>,
    /// The authoritative machine, once the match has started.
    machine: Option<PhaseMachine>,
    /// Snapshots published by the machine, drained after each command.
    snapshot_rx: Option<mpsc::UnboundedReceiver<Snapshot>>,
    /// Entropy for seed derivation, drawn at room creation.
    entropy: [u8; 32],
    /// Transcript being recorded.
    transcript: Option<MatchTranscript>,
}

impl GameRoom {
    /// Create a new room.
    pub fn new(id: RoomId, config: RoomConfig, entropy: [u8; 32]) -> Self {
        Self {
            id,
            config,
            state: RoomState::Lobby,
            host: None,
            players: Vec::new(),
            machine: None,
            snapshot_rx: None,
            entropy,
            transcript: None,
        }
    }

    /// Add a player to the lobby. The first player becomes host.
    pub async fn join(
        &mut self,
        player_id: PlayerId,
        name: String,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<(), RoomError> {
        if self.state != RoomState::Lobby {
            return Err(RoomError::MatchInProgress);
        }
        if self.players.len() >= self.config.max_players {
            return Err(RoomError::LobbyFull);
        }
        if self.players.iter().any(|p| p.player_id == player_id) {
            return Err(RoomError::AlreadyInLobby);
        }

        self.players.push(RoomPlayer {
            player_id,
            name,
            ready: false,
            connected: true,
            sender,
        });

        if self.host.is_none() {
            self.host = Some(player_id);
        }

        self.broadcast_lobby().await;
        Ok(())
    }

    /// Remove a player.
    ///
    /// In the lobby the player leaves the roster (the host role moves to the
    /// next player if needed). Mid-match the roster is frozen, so the player
    /// is only marked disconnected.
    pub async fn leave(&mut self, player_id: &PlayerId) {
        match self.state {
            RoomState::Lobby => {
                self.players.retain(|p| p.player_id != *player_id);
                if self.host == Some(*player_id) {
                    self.host = self.players.first().map(|p| p.player_id);
                }
                if self.players.is_empty() {
                    self.state = RoomState::Closed;
                } else {
                    self.broadcast_lobby().await;
                }
            }
            RoomState::Playing => {
                if let Some(player) = self.players.iter_mut().find(|p| p.player_id == *player_id)
                {
                    player.connected = false;
                }
            }
            RoomState::Closed => {}
        }
    }

    /// Set a player's ready flag.
    pub async fn set_ready(&mut self, player_id: &PlayerId, ready: bool) {
        if self.state != RoomState::Lobby {
            return;
        }
        if let Some(player) = self.players.iter_mut().find(|p| p.player_id == *player_id) {
            player.ready = ready;
            self.broadcast_lobby().await;
        }
    }

    /// Whether everyone in the lobby is ready.
    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.ready)
    }

    /// Number of players in the room.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Current host.
    pub fn host(&self) -> Option<PlayerId> {
        self.host
    }

    /// The authoritative session, once playing.
    pub fn session(&self) -> Option<&GameSession> {
        self.machine.as_ref().map(|m| m.session())
    }

    /// Start the match. Host only; needs the configured minimum of players.
    pub async fn start(&mut self, requester: &PlayerId) -> Result<(), RoomError> {
        if self.state != RoomState::Lobby {
            return Err(RoomError::MatchInProgress);
        }
        if self.host != Some(*requester) {
            return Err(RoomError::NotHost);
        }
        if self.players.len() < self.config.rules.min_players {
            return Err(RoomError::NotEnoughPlayers);
        }

        // Seed from sorted ids so join order cannot steer the deal
        let mut sorted_ids: Vec<[u8; 16]> =
            self.players.iter().map(|p| *p.player_id.as_bytes()).collect();
        sorted_ids.sort_unstable();
        let seed = derive_match_seed(&self.entropy, &self.id, &sorted_ids);

        let mut session = GameSession::new(self.id, seed);
        for player in &self.players {
            session.add_player(player.player_id, player.name.clone());
        }

        let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
        let mut machine = PhaseMachine::new(session, self.config.rules.clone());
        machine.add_sink(Box::new(ChannelSink(snapshot_tx)));

        if self.config.record_transcript {
            let metadata = MatchMetadata {
                match_id: self.id,
                entropy: self.entropy,
                roster: self
                    .players
                    .iter()
                    .map(|p| (p.player_id, p.name.clone()))
                    .collect(),
                rng_seed: seed,
                rules: self.config.rules.clone(),
                started_at: Utc::now(),
            };
            self.transcript = Some(MatchTranscript::new(metadata));
        }

        self.machine = Some(machine);
        self.snapshot_rx = Some(snapshot_rx);
        self.state = RoomState::Playing;

        info!(
            room = %hex::encode(&self.id[..4]),
            players = self.players.len(),
            seed,
            "match starting"
        );

        self.record(RecordedCommand::StartMatch);
        let result = match self.machine.as_mut() {
            Some(machine) => machine.start_match(),
            None => StepResult::default(),
        };
        self.route_result(result).await;
        Ok(())
    }

    /// Apply a night-target submission.
    ///
    /// The engine validates everything; the room records the command either
    /// way so the transcript carries the same input stream the engine saw.
    /// Once the acting role has submitted, the night phase advances on its
    /// own - there is nothing to wait for with a single actor per sub-phase.
    pub async fn night_target(&mut self, actor: &PlayerId, role: Role, target: &PlayerId) {
        if self.state != RoomState::Playing {
            return;
        }
        self.record(RecordedCommand::NightTarget {
            role,
            actor: *actor,
            target: *target,
        });
        let night_done = match self.machine.as_mut() {
            Some(machine) => {
                machine.record_night_target(role, actor, target);
                machine.night_action_done()
            }
            None => false,
        };
        if night_done {
            self.advance_machine().await;
        }
    }

    /// Apply a day vote.
    pub async fn vote(&mut self, voter: &PlayerId, target: &PlayerId) {
        if self.state != RoomState::Playing {
            return;
        }
        self.record(RecordedCommand::Vote {
            voter: *voter,
            target: *target,
        });
        if let Some(machine) = self.machine.as_mut() {
            machine.record_vote(voter, target);
        }
    }

    /// Force the phase forward. Host only.
    pub async fn force_advance(&mut self, requester: &PlayerId) -> Result<(), RoomError> {
        if self.state != RoomState::Playing {
            return Err(RoomError::MatchNotInProgress);
        }
        if self.host != Some(*requester) {
            return Err(RoomError::NotHost);
        }
        self.advance_machine().await;
        Ok(())
    }

    /// Run one simulation tick.
    pub async fn tick(&mut self) {
        if self.state != RoomState::Playing {
            return;
        }
        self.record(RecordedCommand::Tick { count: 1 });
        let (result, checkpoint) = match self.machine.as_mut() {
            Some(machine) => {
                let result = machine.tick();
                let tick = machine.session().tick;
                let checkpoint = (tick > 0 && tick % CHECKPOINT_INTERVAL == 0)
                    .then(|| (tick, machine.session().compute_hash()));
                (result, checkpoint)
            }
            None => return,
        };
        if let (Some((tick, hash)), Some(transcript)) = (checkpoint, self.transcript.as_mut()) {
            transcript.add_checkpoint(tick, hash);
        }
        self.route_result(result).await;
    }

    /// Send the requester a fresh view of the room.
    pub async fn sync(&mut self, player_id: &PlayerId) {
        match self.state {
            RoomState::Lobby => {
                let info = self.lobby_info();
                self.send_to(player_id, ServerMessage::Lobby(info)).await;
            }
            RoomState::Playing => {
                if let Some(machine) = self.machine.as_ref() {
                    let snapshot = Snapshot::capture(machine.session());
                    self.send_to(player_id, ServerMessage::Snapshot(snapshot))
                        .await;
                }
            }
            RoomState::Closed => {}
        }
    }

    /// Reconnect a player with a fresh channel and resend state.
    pub async fn reconnect(
        &mut self,
        player_id: &PlayerId,
        sender: mpsc::Sender<ServerMessage>,
    ) -> bool {
        let Some(player) = self.players.iter_mut().find(|p| p.player_id == *player_id) else {
            return false;
        };
        player.connected = true;
        player.sender = sender;
        self.sync(player_id).await;
        true
    }

    /// Record a command into the transcript.
    fn record(&mut self, command: RecordedCommand) {
        if let Some(transcript) = self.transcript.as_mut() {
            match command {
                RecordedCommand::Tick { .. } => transcript.record_tick(),
                other => transcript.record(other),
            }
        }
    }

    /// Advance the machine, recording the command.
    ///
    /// Night phases whose actor is dead advance immediately so a match
    /// never stalls waiting on a role nobody holds. Every skip is recorded
    /// as its own command, so the transcript replays identically.
    async fn advance_machine(&mut self) {
        loop {
            self.record(RecordedCommand::Advance);
            let result = match self.machine.as_mut() {
                Some(machine) => machine.advance(),
                None => StepResult::default(),
            };
            self.route_result(result).await;

            if self.state != RoomState::Playing {
                break;
            }
            let skip = self
                .machine
                .as_ref()
                .map(|m| m.night_action_done())
                .unwrap_or(false);
            if !skip {
                break;
            }
        }
    }

    /// Deliver everything a step produced: snapshots to everyone, events by
    /// visibility, and the match-end sequence when the machine finished.
    async fn route_result(&mut self, result: StepResult) {
        // Snapshots published during the step
        let mut snapshots = Vec::new();
        if let Some(rx) = self.snapshot_rx.as_mut() {
            while let Ok(snapshot) = rx.try_recv() {
                snapshots.push(snapshot);
            }
        }
        for snapshot in snapshots {
            self.broadcast(ServerMessage::Snapshot(snapshot)).await;
        }

        // Events, routed by visibility
        for event in &result.events {
            let message = ServerMessage::Event(MatchEvent::from_game_event(event));
            match event.recipient() {
                Some(recipient) => self.send_to(&recipient, message).await,
                None => self.broadcast(message).await,
            }
        }

        if result.match_ended {
            self.finish_match().await;
        }
    }

    /// Broadcast the final result, attach the transcript, close the room.
    async fn finish_match(&mut self) {
        let Some(machine) = self.machine.as_ref() else {
            return;
        };
        let session = machine.session();
        let Some(winner) = session.winner else {
            warn!(room = %hex::encode(&self.id[..4]), "match ended without winner");
            return;
        };

        let final_state_hash = session.compute_hash();

        let transcript_bytes = self.transcript.as_mut().and_then(|transcript| {
            transcript.finalize(MatchResult {
                end_tick: session.tick,
                winner,
                final_state_hash,
            });
            transcript.to_bytes().ok()
        });

        let end_info = MatchEndInfo {
            match_id: self.id,
            end_tick: session.tick,
            winner,
            roles: session
                .players()
                .iter()
                .map(|p| RevealedRole {
                    player_id: *p.id.as_bytes(),
                    name: p.name.clone(),
                    role: p.role,
                    alive: p.alive,
                })
                .collect(),
            final_state_hash,
            transcript: transcript_bytes,
        };

        info!(
            room = %hex::encode(&self.id[..4]),
            ?winner,
            end_tick = end_info.end_tick,
            hash = %hex::encode(final_state_hash),
            "match ended"
        );

        self.broadcast(ServerMessage::MatchEnd(end_info)).await;
        self.state = RoomState::Closed;
    }

    /// Current lobby view.
    fn lobby_info(&self) -> LobbyStateInfo {
        LobbyStateInfo {
            lobby_id: self.id,
            host: self.host.map(|h| *h.as_bytes()),
            players: self
                .players
                .iter()
                .map(|p| LobbyPlayerInfo {
                    player_id: *p.player_id.as_bytes(),
                    name: p.name.clone(),
                    ready: p.ready,
                    connected: p.connected,
                })
                .collect(),
        }
    }

    async fn broadcast_lobby(&self) {
        let info = self.lobby_info();
        self.broadcast(ServerMessage::Lobby(info)).await;
    }

    /// Broadcast a message to all connected players.
    pub async fn broadcast(&self, message: ServerMessage) {
        for player in &self.players {
            if player.connected {
                let _ = player.sender.send(message.clone()).await;
            }
        }
    }

    /// Send a message to one player.
    pub async fn send_to(&self, player_id: &PlayerId, message: ServerMessage) {
        if let Some(player) = self
            .players
            .iter()
            .find(|p| p.player_id == *player_id && p.connected)
        {
            let _ = player.sender.send(message).await;
        }
    }
}

// =============================================================================
// ROOM COMMAND LOOP
// =============================================================================

/// Commands funneled into a room's single-writer loop.
#[derive(Debug)]
pub enum RoomCommand {
    /// Join the lobby.
    Join {
        /// Joining player.
        player_id: PlayerId,
        /// Display name.
        name: String,
        /// Channel for messages to this player.
        sender: mpsc::Sender<ServerMessage>,
    },
    /// Leave the room.
    Leave {
        /// Leaving player.
        player_id: PlayerId,
    },
    /// Set readiness.
    SetReady {
        /// Player.
        player_id: PlayerId,
        /// New flag.
        ready: bool,
    },
    /// Start the match (host only).
    Start {
        /// Requesting player.
        player_id: PlayerId,
    },
    /// Submit a night target.
    NightTarget {
        /// Acting player.
        player_id: PlayerId,
        /// Claimed role.
        role: Role,
        /// Chosen target.
        target: PlayerId,
    },
    /// Submit a day vote.
    Vote {
        /// Voting player.
        player_id: PlayerId,
        /// Chosen target.
        target: PlayerId,
    },
    /// Force the phase forward (host only).
    Advance {
        /// Requesting player.
        player_id: PlayerId,
    },
    /// Request a fresh view.
    Sync {
        /// Requesting player.
        player_id: PlayerId,
    },
    /// Reconnect with a fresh channel.
    Reconnect {
        /// Reconnecting player.
        player_id: PlayerId,
        /// New channel.
        sender: mpsc::Sender<ServerMessage>,
    },
    /// Connection dropped without a leave.
    Disconnect {
        /// Player whose socket closed.
        player_id: PlayerId,
    },
}

/// Drive a room until it closes.
///
/// This is the single writer for the room's state: commands and the tick
/// interval interleave in one `select!` loop, so no two mutations ever
/// overlap.
pub async fn run_room(mut room: GameRoom, mut commands: mpsc::Receiver<RoomCommand>) {
    let tick_duration = Duration::from_micros(1_000_000 / TICK_RATE as u64);
    let mut tick_interval = interval(tick_duration);
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    Some(command) => room.handle_command(command).await,
                    None => break,
                }
            }
            _ = tick_interval.tick() => {
                room.tick().await;
            }
        }

        if room.state == RoomState::Closed {
            break;
        }
    }

    debug!(room = %hex::encode(&room.id[..4]), "room task exiting");
}

impl GameRoom {
    /// Apply one queued command.
    pub async fn handle_command(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Join {
                player_id,
                name,
                sender,
            } => {
                if let Err(err) = self.join(player_id, name, sender.clone()).await {
                    let _ = sender
                        .send(ServerMessage::Error(ServerError {
                            code: err.code(),
                            message: err.to_string(),
                        }))
                        .await;
                }
            }
            RoomCommand::Leave { player_id } => self.leave(&player_id).await,
            RoomCommand::SetReady { player_id, ready } => {
                self.set_ready(&player_id, ready).await
            }
            RoomCommand::Start { player_id } => {
                if let Err(err) = self.start(&player_id).await {
                    self.send_error(&player_id, err).await;
                }
            }
            RoomCommand::NightTarget {
                player_id,
                role,
                target,
            } => self.night_target(&player_id, role, &target).await,
            RoomCommand::Vote { player_id, target } => self.vote(&player_id, &target).await,
            RoomCommand::Advance { player_id } => {
                if let Err(err) = self.force_advance(&player_id).await {
                    self.send_error(&player_id, err).await;
                }
            }
            RoomCommand::Sync { player_id } => self.sync(&player_id).await,
            RoomCommand::Reconnect { player_id, sender } => {
                self.reconnect(&player_id, sender).await;
            }
            RoomCommand::Disconnect { player_id } => self.leave(&player_id).await,
        }
    }

    async fn send_error(&self, player_id: &PlayerId, err: RoomError) {
        self.send_to(
            player_id,
            ServerMessage::Error(ServerError {
                code: err.code(),
                message: err.to_string(),
            }),
        )
        .await;
    }
}

// =============================================================================
// ROOM MANAGER
// =============================================================================

/// Handle for sending commands into a room's loop.
#[derive(Clone)]
pub struct RoomHandle {
    /// Room identifier.
    pub id: RoomId,
    /// Command queue into the room task.
    pub commands: mpsc::Sender<RoomCommand>,
}

/// Manages all active rooms.
pub struct RoomManager {
    rooms: RwLock<BTreeMap<RoomId, RoomHandle>>,
}

impl RoomManager {
    /// Create a new room manager.
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a room and spawn its command loop.
    pub async fn create_room(self: &Arc<Self>, config: RoomConfig) -> RoomHandle {
        let id = *uuid::Uuid::new_v4().as_bytes();

        // Entropy from two independent v4 uuids
        let mut entropy = [0u8; 32];
        entropy[..16].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
        entropy[16..].copy_from_slice(uuid::Uuid::new_v4().as_bytes());

        let room = GameRoom::new(id, config, entropy);
        let (command_tx, command_rx) = mpsc::channel(256);
        let handle = RoomHandle {
            id,
            commands: command_tx,
        };

        self.rooms.write().await.insert(id, handle.clone());

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            run_room(room, command_rx).await;
            manager.rooms.write().await.remove(&id);
        });

        info!(room = %hex::encode(&id[..4]), "room created");
        handle
    }

    /// Get a room by ID.
    pub async fn get_room(&self, id: &RoomId) -> Option<RoomHandle> {
        self.rooms.read().await.get(id).cloned()
    }

    /// Get active room count.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{GamePhase, Winner};
    use crate::replay::verify::verify_transcript;
    use crate::replay::MatchTranscript;

    fn pid(n: u8) -> PlayerId {
        PlayerId::new([n; 16])
    }

    fn test_room() -> GameRoom {
        GameRoom::new([0; 16], RoomConfig::default(), [7; 32])
    }

    async fn join_n(room: &mut GameRoom, n: u8) -> Vec<mpsc::Receiver<ServerMessage>> {
        let mut receivers = Vec::new();
        for i in 1..=n {
            let (tx, rx) = mpsc::channel(512);
            room.join(pid(i), format!("player{}", i), tx).await.unwrap();
            receivers.push(rx);
        }
        receivers
    }

    /// Drain everything currently queued for a receiver.
    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn test_join_and_host() {
        let mut room = test_room();
        let _rx = join_n(&mut room, 3).await;

        assert_eq!(room.player_count(), 3);
        assert_eq!(room.host(), Some(pid(1)));
    }

    #[tokio::test]
    async fn test_join_duplicate_rejected() {
        let mut room = test_room();
        let _rx = join_n(&mut room, 1).await;

        let (tx, _rx2) = mpsc::channel(8);
        let result = room.join(pid(1), "again".into(), tx).await;
        assert!(matches!(result, Err(RoomError::AlreadyInLobby)));
    }

    #[tokio::test]
    async fn test_lobby_full() {
        let config = RoomConfig {
            max_players: 2,
            ..Default::default()
        };
        let mut room = GameRoom::new([0; 16], config, [7; 32]);
        let _rx = join_n(&mut room, 2).await;

        let (tx, _rx2) = mpsc::channel(8);
        let result = room.join(pid(9), "late".into(), tx).await;
        assert!(matches!(result, Err(RoomError::LobbyFull)));
    }

    #[tokio::test]
    async fn test_host_reassigned_on_leave() {
        let mut room = test_room();
        let _rx = join_n(&mut room, 3).await;

        room.leave(&pid(1)).await;
        assert_eq!(room.host(), Some(pid(2)));
        assert_eq!(room.player_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_lobby_closes() {
        let mut room = test_room();
        let _rx = join_n(&mut room, 1).await;

        room.leave(&pid(1)).await;
        assert_eq!(room.state, RoomState::Closed);
    }

    #[tokio::test]
    async fn test_start_requires_host() {
        let mut room = test_room();
        let _rx = join_n(&mut room, 4).await;

        let result = room.start(&pid(2)).await;
        assert!(matches!(result, Err(RoomError::NotHost)));
        assert_eq!(room.state, RoomState::Lobby);
    }

    #[tokio::test]
    async fn test_start_requires_minimum() {
        let mut room = test_room();
        let _rx = join_n(&mut room, 3).await;

        let result = room.start(&pid(1)).await;
        assert!(matches!(result, Err(RoomError::NotEnoughPlayers)));
    }

    #[tokio::test]
    async fn test_start_deals_roles_and_broadcasts_snapshot() {
        let mut room = test_room();
        let mut receivers = join_n(&mut room, 4).await;

        room.start(&pid(1)).await.unwrap();
        assert_eq!(room.state, RoomState::Playing);
        assert_eq!(
            room.session().unwrap().phase,
            GamePhase::NightMafia
        );

        for (i, rx) in receivers.iter_mut().enumerate() {
            let messages = drain(rx);

            // Everyone got the first-night snapshot
            assert!(
                messages
                    .iter()
                    .any(|m| matches!(m, ServerMessage::Snapshot(s) if s.phase == GamePhase::NightMafia)),
                "player {} missing snapshot",
                i + 1
            );

            // Exactly one private role event each
            let roles: Vec<_> = messages
                .iter()
                .filter(|m| matches!(m, ServerMessage::Event(MatchEvent::RoleAssigned { .. })))
                .collect();
            assert_eq!(roles.len(), 1, "player {} got {} role events", i + 1, roles.len());
        }
    }

    #[tokio::test]
    async fn test_mid_match_leave_marks_disconnected() {
        let mut room = test_room();
        let _rx = join_n(&mut room, 4).await;
        room.start(&pid(1)).await.unwrap();

        room.leave(&pid(2)).await;

        // Roster frozen: the engine still has 4 players
        assert_eq!(room.session().unwrap().player_count(), 4);
        assert!(!room.players.iter().find(|p| p.player_id == pid(2)).unwrap().connected);
    }

    #[tokio::test]
    async fn test_night_auto_advances_after_submission() {
        let mut room = test_room();
        let _rx = join_n(&mut room, 4).await;
        room.start(&pid(1)).await.unwrap();

        let mafia = room
            .session()
            .unwrap()
            .players()
            .iter()
            .find(|p| p.role == Role::Mafia)
            .map(|p| p.id)
            .unwrap();
        let victim = room
            .session()
            .unwrap()
            .players()
            .iter()
            .find(|p| p.role == Role::Civilian)
            .map(|p| p.id)
            .unwrap();

        room.night_target(&mafia, Role::Mafia, &victim).await;

        // Mafia's submission moved the night to the doctor
        assert_eq!(room.session().unwrap().phase, GamePhase::NightDoctor);
    }

    #[tokio::test]
    async fn test_full_match_through_command_api() {
        let mut room = test_room();
        let mut receivers = join_n(&mut room, 4).await;
        room.start(&pid(1)).await.unwrap();

        let session = room.session().unwrap();
        let mafia = session.players().iter().find(|p| p.role == Role::Mafia).map(|p| p.id).unwrap();
        let doctor = session.players().iter().find(|p| p.role == Role::Doctor).map(|p| p.id).unwrap();
        let detective = session.players().iter().find(|p| p.role == Role::Detective).map(|p| p.id).unwrap();
        let civilian = session.players().iter().find(|p| p.role == Role::Civilian).map(|p| p.id).unwrap();

        // Night: mafia kills the civilian, doctor guards themselves,
        // detective inspects the mafia. Each submission advances the night.
        room.night_target(&mafia, Role::Mafia, &civilian).await;
        room.night_target(&doctor, Role::Doctor, &doctor).await;
        room.night_target(&detective, Role::Detective, &mafia).await;

        assert_eq!(room.session().unwrap().phase, GamePhase::DayDiscussion);
        assert!(!room.session().unwrap().player(&civilian).unwrap().alive);

        // Host fast-forwards the discussion
        room.force_advance(&pid(1)).await.unwrap();
        assert_eq!(room.session().unwrap().phase, GamePhase::DayVoting);

        // Survivors vote out the mafia
        room.vote(&mafia, &detective).await;
        room.vote(&doctor, &mafia).await;
        room.vote(&detective, &mafia).await;
        room.force_advance(&pid(1)).await.unwrap();

        assert_eq!(room.state, RoomState::Closed);

        // Every player saw the end message with the civilian win and the
        // full role reveal; the attached transcript verifies by replay.
        for rx in receivers.iter_mut() {
            let messages = drain(rx);
            let end = messages
                .iter()
                .find_map(|m| match m {
                    ServerMessage::MatchEnd(info) => Some(info.clone()),
                    _ => None,
                })
                .expect("match end message");

            assert_eq!(end.winner, Winner::Civilians);
            assert_eq!(end.roles.len(), 4);

            let bytes = end.transcript.expect("transcript attached");
            let transcript = MatchTranscript::from_bytes(&bytes).unwrap();
            let report = verify_transcript(&transcript).unwrap();
            assert_eq!(report.end_tick, end.end_tick);
        }
    }

    #[tokio::test]
    async fn test_investigation_reaches_only_detective() {
        let mut room = test_room();
        let mut receivers = join_n(&mut room, 4).await;
        room.start(&pid(1)).await.unwrap();

        let session = room.session().unwrap();
        let mafia = session.players().iter().find(|p| p.role == Role::Mafia).map(|p| p.id).unwrap();
        let doctor = session.players().iter().find(|p| p.role == Role::Doctor).map(|p| p.id).unwrap();
        let detective = session.players().iter().find(|p| p.role == Role::Detective).map(|p| p.id).unwrap();
        let detective_seat = session.players().iter().position(|p| p.id == detective).unwrap();

        room.night_target(&mafia, Role::Mafia, &doctor).await;
        room.night_target(&doctor, Role::Doctor, &doctor).await;
        room.night_target(&detective, Role::Detective, &mafia).await;

        for (seat, rx) in receivers.iter_mut().enumerate() {
            let saw_investigation = drain(rx).iter().any(|m| {
                matches!(m, ServerMessage::Event(MatchEvent::Investigation { .. }))
            });
            assert_eq!(
                saw_investigation,
                seat == detective_seat,
                "seat {} visibility wrong",
                seat
            );
        }
    }

    #[tokio::test]
    async fn test_room_manager_lifecycle() {
        let manager = Arc::new(RoomManager::new());

        let handle = manager.create_room(RoomConfig::default()).await;
        assert_eq!(manager.room_count().await, 1);
        assert!(manager.get_room(&handle.id).await.is_some());

        // A join then a leave empties the lobby; the room task exits and
        // unregisters itself.
        let (tx, _rx) = mpsc::channel(8);
        handle
            .commands
            .send(RoomCommand::Join {
                player_id: pid(1),
                name: "alice".into(),
                sender: tx,
            })
            .await
            .unwrap();
        handle
            .commands
            .send(RoomCommand::Leave { player_id: pid(1) })
            .await
            .unwrap();

        // Give the room task a moment to wind down
        for _ in 0..50 {
            if manager.room_count().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(manager.room_count().await, 0);
    }
}
