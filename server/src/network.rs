//! Server network layer handling UDP communications, the simulation tick and
//! snapshot broadcasting

use crate::client_manager::ClientManager;
use crate::game::{CommandOutcome, World};
use crate::snapshot::build_snapshot;
use log::{debug, error, info, warn};
use shared::{
    decode, encode, Packet, PlayerId, PlayerSnapshot, ProtocolError, Snapshot, MAX_PACKET_SIZE,
    PROTOCOL_VERSION, SNAPSHOT_PART_BUDGET,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: PlayerId },
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<PlayerId>,
    },
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("invalid server configuration: {0}")]
    InvalidConfig(String),
}

/// Timing and capacity settings of a server run
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub tick_duration: Duration,
    pub broadcast_duration: Duration,
    pub max_clients: usize,
    pub client_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            tick_duration: shared::tick_interval(),
            broadcast_duration: shared::broadcast_interval(),
            max_clients: 32,
            client_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerSettings {
    /// Broadcasting must never be finer-grained than simulating
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.tick_duration.is_zero() || self.broadcast_duration.is_zero() {
            return Err(ServerError::InvalidConfig(
                "tick and broadcast intervals must be positive".to_string(),
            ));
        }
        if self.broadcast_duration < self.tick_duration {
            return Err(ServerError::InvalidConfig(format!(
                "broadcast interval {:?} is shorter than tick interval {:?}",
                self.broadcast_duration, self.tick_duration
            )));
        }
        if self.max_clients == 0 {
            return Err(ServerError::InvalidConfig(
                "max clients must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cuts a snapshot into datagram-sized pieces, returned with their count
fn split_snapshot(snapshot: &Snapshot) -> Result<(u16, Vec<Snapshot>), ProtocolError> {
    let pieces = snapshot.split(SNAPSHOT_PART_BUDGET)?;
    let parts =
        u16::try_from(pieces.len()).map_err(|_| ProtocolError::TooManyParts(pieces.len()))?;
    Ok((parts, pieces))
}

/// Main server coordinating networking and game simulation.
///
/// The world is owned by the main loop and is only ever touched from it, so
/// commands, ticks and snapshot broadcasts are serialized and a broadcast
/// always sees a fully completed tick.
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    world: World,
    settings: ServerSettings,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
}

impl Server {
    pub async fn new(addr: &str, world: World, settings: ServerSettings) -> Result<Self, ServerError> {
        settings.validate()?;

        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                settings.max_clients,
                settings.client_timeout,
            ))),
            world,
            settings,
            server_tx,
            server_rx,
            game_tx,
            game_rx: Some(game_rx),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Sender that can feed the main loop from outside, e.g. to request shutdown
    pub fn handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match decode(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let Some(mut game_rx) = self.game_rx.take() else {
            return;
        };

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => match encode(&packet) {
                        Ok(data) => {
                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("Failed to send packet to {}: {}", addr, e);
                            }
                        }
                        Err(e) => error!("Failed to encode packet for {}: {}", addr, e),
                    },
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let data = match encode(&packet) {
                            Ok(data) => data,
                            Err(e) => {
                                error!("Failed to encode broadcast: {}", e);
                                continue;
                            }
                        };

                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }

                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if server_tx
                        .send(ServerMessage::ClientTimeout { client_id })
                        .is_err()
                    {
                        // Main loop is gone
                        return;
                    }
                }
            }
        });
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<PlayerId>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Applies an incoming packet to the world
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                name,
            } => self.handle_connect(client_version, &name, addr).await,

            Packet::SetName { name } => {
                if let Some(id) = self.client_for(addr).await {
                    self.world.set_name(id, &name);
                }
            }

            Packet::ChangeDirection { angle } => {
                if let Some(id) = self.client_for(addr).await {
                    if self.world.change_direction(id, angle) == CommandOutcome::Ignored {
                        debug!("Ignored direction change from player {}", id);
                    }
                }
            }

            Packet::Respawn => {
                if let Some(id) = self.client_for(addr).await {
                    self.world.respawn(id);
                }
            }

            Packet::Heartbeat => {
                self.client_for(addr).await;
            }

            Packet::Disconnect => {
                if let Some(id) = self.client_for(addr).await {
                    self.clients.write().await.remove_client(&id);
                    self.drop_player(id);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    async fn handle_connect(&mut self, client_version: u32, name: &str, addr: SocketAddr) {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            self.send_packet(
                Packet::Disconnected {
                    reason: "Protocol version mismatch".to_string(),
                },
                addr,
            );
            return;
        }

        // A reconnect from the same address replaces the old session
        let existing_client_id = {
            let clients = self.clients.read().await;
            clients.find_client_by_addr(addr)
        };
        if let Some(existing_id) = existing_client_id {
            info!("Removing existing client {} from {}", existing_id, addr);
            self.clients.write().await.remove_client(&existing_id);
            self.drop_player(existing_id);
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };

        let Some(client_id) = client_id else {
            self.send_packet(
                Packet::Disconnected {
                    reason: "Server full".to_string(),
                },
                addr,
            );
            return;
        };

        self.world.add_player(client_id);
        self.world.set_name(client_id, name);

        let config = self.world.config;
        let tick = self.world.tick;
        match split_snapshot(&build_snapshot(&self.world)) {
            Ok((parts, pieces)) => {
                for (part, snapshot) in (0u16..).zip(pieces) {
                    let init = Packet::Init {
                        player_id: client_id,
                        config,
                        tick,
                        part,
                        parts,
                        snapshot,
                    };
                    self.send_packet(init, addr);
                }
            }
            Err(e) => error!("Failed to prepare init for client {}: {}", client_id, e),
        }

        if let Some(snake) = self.world.player(client_id) {
            let player = PlayerSnapshot::from(snake);
            self.broadcast_packet(Packet::PlayerJoined { player }, Some(client_id));
        }
    }

    /// Resolves the player behind `addr`, refreshing its liveness
    async fn client_for(&self, addr: SocketAddr) -> Option<PlayerId> {
        let client_id = self.clients.write().await.touch_by_addr(addr);
        if client_id.is_none() {
            debug!("Packet from unknown address {}", addr);
        }
        client_id
    }

    /// Removes a player whose connection ended, for whatever reason
    fn drop_player(&mut self, client_id: PlayerId) {
        if self.world.remove_player(client_id) == CommandOutcome::Applied {
            self.broadcast_packet(
                Packet::PlayerLeft {
                    player_id: client_id,
                },
                Some(client_id),
            );
        }
    }

    fn run_tick(&mut self) {
        let report = self.world.tick();

        for death in &report.deaths {
            info!(
                "Player {} died (hit player {}), {} points credited",
                death.victim, death.collider, death.credit
            );
        }

        if self.world.tick % 60 == 0 {
            debug!(
                "Tick {}: {} players, {} foods, {} eaten, {} spawned",
                self.world.tick,
                self.world.players.len(),
                self.world.foods.len(),
                report.foods_eaten,
                report.foods_spawned
            );
        }
    }

    /// Broadcasts current game state to all connected clients
    async fn broadcast_game_state(&self) {
        let client_count = {
            let clients = self.clients.read().await;
            clients.len()
        };

        if client_count == 0 {
            return;
        }

        let tick = self.world.tick;
        match split_snapshot(&build_snapshot(&self.world)) {
            Ok((parts, pieces)) => {
                if parts > 1 {
                    debug!("Tick {} snapshot sent in {} parts", tick, parts);
                }
                for (part, snapshot) in (0u16..).zip(pieces) {
                    let packet = Packet::GameState {
                        tick,
                        part,
                        parts,
                        snapshot,
                    };
                    self.broadcast_packet(packet, None);
                }
            }
            Err(e) => error!("Failed to prepare snapshot for tick {}: {}", tick, e),
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), ServerError> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.settings.tick_duration);
        let mut broadcast_interval = interval(self.settings.broadcast_duration);
        broadcast_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Server started: tick every {:?}, broadcast every {:?}",
            self.settings.tick_duration, self.settings.broadcast_duration
        );

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            self.drop_player(client_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.run_tick();
                },

                _ = broadcast_interval.tick() => {
                    self.broadcast_game_state().await;
                },
            }
        }

        Ok(())
    }
}
