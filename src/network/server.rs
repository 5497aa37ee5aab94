//! WebSocket Game Server
//!
//! Accepts connections, authenticates them, and bridges sockets to room
//! command queues. Nothing here touches game state: every player action
//! becomes a `RoomCommand` and is applied by the room's single-writer loop.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::game::state::PlayerId;
use crate::network::auth::{validate_token, AuthConfig, AuthError};
use crate::network::protocol::{
    AuthRequest, AuthResult, ClientMessage, ErrorCode, ServerError, ServerMessage,
};
use crate::network::session::{RoomCommand, RoomConfig, RoomHandle, RoomManager};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().expect("static addr"),
            max_connections: 1000,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Per-connection state, owned by the connection task.
struct ClientState {
    /// Identity after successful auth.
    player_id: Option<PlayerId>,
    /// Display name from the auth request.
    name: String,
    /// Room this connection is in.
    room: Option<RoomHandle>,
}

impl ClientState {
    fn new() -> Self {
        Self {
            player_id: None,
            name: String::new(),
            room: None,
        }
    }
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Authentication configuration.
    auth: AuthConfig,
    /// Room manager.
    rooms: Arc<RoomManager>,
    /// Live connection count.
    connections: Arc<AtomicUsize>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig, auth: AuthConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            auth,
            rooms: Arc::new(RoomManager::new()),
            connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    /// Run the server.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Duskfall server listening on {}", self.config.bind_addr);
        if !self.auth.is_configured() {
            warn!("authentication not configured; accepting client-chosen ids");
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connections.load(Ordering::Relaxed) >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }
                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let rooms = self.rooms.clone();
        let auth = self.auth.clone();
        let version = self.config.version.clone();
        let connections = self.connections.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        connections.fetch_add(1, Ordering::Relaxed);

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    connections.fetch_sub(1, Ordering::Relaxed);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            // Serialize outbound messages onto the socket
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            let mut client = ClientState::new();

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        send_error(
                                            &msg_tx,
                                            ErrorCode::InvalidInput,
                                            "Invalid message format",
                                        )
                                        .await;
                                        continue;
                                    }
                                };
                                handle_client_message(
                                    client_msg,
                                    &mut client,
                                    &rooms,
                                    &auth,
                                    &version,
                                    &msg_tx,
                                )
                                .await;
                            }
                            Some(Ok(Message::Ping(_))) => {
                                // tungstenite answers pings itself
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                debug!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Socket gone: tell the room
            if let (Some(player_id), Some(room)) = (client.player_id, client.room.as_ref()) {
                let _ = room
                    .commands
                    .send(RoomCommand::Disconnect { player_id })
                    .await;
            }

            sender_task.abort();
            connections.fetch_sub(1, Ordering::Relaxed);
            debug!("Client {} cleaned up", addr);
        });
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    /// Get active room count.
    pub async fn room_count(&self) -> usize {
        self.rooms.room_count().await
    }
}

async fn send_error(sender: &mpsc::Sender<ServerMessage>, code: ErrorCode, message: &str) {
    let _ = sender
        .send(ServerMessage::Error(ServerError {
            code,
            message: message.to_string(),
        }))
        .await;
}

/// Route one client message.
async fn handle_client_message(
    msg: ClientMessage,
    client: &mut ClientState,
    rooms: &Arc<RoomManager>,
    auth: &AuthConfig,
    version: &str,
    sender: &mpsc::Sender<ServerMessage>,
) {
    // Everything except Auth and Ping requires an identity
    let needs_auth = !matches!(msg, ClientMessage::Auth(_) | ClientMessage::Ping { .. });
    if needs_auth && client.player_id.is_none() {
        send_error(sender, ErrorCode::NotAuthenticated, "Must authenticate first").await;
        return;
    }

    match msg {
        ClientMessage::Auth(request) => {
            handle_auth(request, client, auth, version, sender).await;
        }

        ClientMessage::CreateLobby => {
            let Some(player_id) = client.player_id else { return };
            if client.room.is_some() {
                send_error(sender, ErrorCode::AlreadyInLobby, "Already in a lobby").await;
                return;
            }
            let handle = rooms.create_room(RoomConfig::default()).await;
            let _ = handle
                .commands
                .send(RoomCommand::Join {
                    player_id,
                    name: client.name.clone(),
                    sender: sender.clone(),
                })
                .await;
            client.room = Some(handle);
        }

        ClientMessage::JoinLobby { lobby_id } => {
            let Some(player_id) = client.player_id else { return };
            if client.room.is_some() {
                send_error(sender, ErrorCode::AlreadyInLobby, "Already in a lobby").await;
                return;
            }
            match rooms.get_room(&lobby_id).await {
                Some(handle) => {
                    let _ = handle
                        .commands
                        .send(RoomCommand::Join {
                            player_id,
                            name: client.name.clone(),
                            sender: sender.clone(),
                        })
                        .await;
                    client.room = Some(handle);
                }
                None => {
                    send_error(sender, ErrorCode::LobbyNotFound, "No such lobby").await;
                }
            }
        }

        ClientMessage::Ready { ready } => {
            forward(client, |player_id| RoomCommand::SetReady { player_id, ready }).await;
        }

        ClientMessage::StartMatch => {
            forward(client, |player_id| RoomCommand::Start { player_id }).await;
        }

        ClientMessage::NightTarget(request) => {
            let target = PlayerId::new(request.target_id);
            forward(client, |player_id| RoomCommand::NightTarget {
                player_id,
                role: request.role,
                target,
            })
            .await;
        }

        ClientMessage::Vote { target_id } => {
            let target = PlayerId::new(target_id);
            forward(client, |player_id| RoomCommand::Vote { player_id, target }).await;
        }

        ClientMessage::AdvancePhase => {
            forward(client, |player_id| RoomCommand::Advance { player_id }).await;
        }

        ClientMessage::SyncRequest => {
            forward(client, |player_id| RoomCommand::Sync { player_id }).await;
        }

        ClientMessage::Ping { timestamp } => {
            let server_time = chrono::Utc::now().timestamp_millis().max(0) as u64;
            let _ = sender
                .send(ServerMessage::Pong {
                    timestamp,
                    server_time,
                })
                .await;
        }

        ClientMessage::Leave => {
            if let (Some(player_id), Some(room)) = (client.player_id, client.room.take()) {
                let _ = room.commands.send(RoomCommand::Leave { player_id }).await;
            }
        }
    }
}

/// Forward a command to the client's room, if any.
async fn forward<F>(client: &ClientState, build: F)
where
    F: FnOnce(PlayerId) -> RoomCommand,
{
    if let (Some(player_id), Some(room)) = (client.player_id, client.room.as_ref()) {
        let _ = room.commands.send(build(player_id)).await;
    }
}

/// Resolve a connection's identity.
///
/// With auth configured, the token decides the player id and the claimed id
/// is ignored. Without it, the claimed id is accepted (or a fresh one is
/// generated), which keeps local development friction-free.
async fn handle_auth(
    request: AuthRequest,
    client: &mut ClientState,
    auth: &AuthConfig,
    version: &str,
    sender: &mpsc::Sender<ServerMessage>,
) {
    let resolved: Result<PlayerId, (ErrorCode, String)> = if auth.is_configured() {
        match request.token.as_deref() {
            Some(token) => match validate_token(token, auth) {
                Ok(claims) => Ok(claims.player_id()),
                Err(AuthError::Expired) => {
                    Err((ErrorCode::TokenExpired, "token expired".into()))
                }
                Err(e) => Err((ErrorCode::InvalidToken, e.to_string())),
            },
            None => Err((ErrorCode::AuthFailed, "token required".into())),
        }
    } else {
        Ok(PlayerId::from_uuid_str(&request.player_id)
            .unwrap_or_else(|| PlayerId::new(*uuid::Uuid::new_v4().as_bytes())))
    };

    match resolved {
        Ok(player_id) => {
            client.player_id = Some(player_id);
            client.name = if request.display_name.is_empty() {
                format!("player-{}", &player_id.to_uuid_string()[..8])
            } else {
                request.display_name
            };

            let _ = sender
                .send(ServerMessage::AuthResult(AuthResult {
                    success: true,
                    player_id: Some(player_id.to_uuid_string()),
                    error: None,
                    server_version: version.to_string(),
                }))
                .await;
            debug!("client authenticated as {}", player_id.to_uuid_string());
        }
        Err((code, message)) => {
            let _ = sender
                .send(ServerMessage::AuthResult(AuthResult {
                    success: false,
                    player_id: None,
                    error: Some(message.clone()),
                    server_version: version.to_string(),
                }))
                .await;
            send_error(sender, code, &message).await;
        }
    }
}
