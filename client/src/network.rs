use crate::autopilot::{Autopilot, AutopilotCommand};
use crate::interpolation::{Interpolator, InterpolatorState};
use crate::reassembly::SnapshotAssembler;
use log::{debug, error, info, warn};
use shared::{decode, encode, Packet, PlayerId, ProtocolError, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::{AddrParseError, SocketAddr};
use std::ops::ControlFlow;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::interval;

/// Frame period of the headless render loop
const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
/// Silence from the server after which the connection counts as lost
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);
const RESPAWN_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("invalid server address: {0}")]
    InvalidAddress(#[from] AddrParseError),
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub name: String,
    pub autopilot: bool,
    pub status_interval: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            name: shared::DEFAULT_PLAYER_NAME.to_string(),
            autopilot: true,
            status_interval: Duration::from_secs(5),
        }
    }
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    client_id: Option<PlayerId>,
    connected: bool,
    options: ClientOptions,

    interpolator: Interpolator,
    autopilot: Autopilot,
    init_parts: SnapshotAssembler,
    state_parts: SnapshotAssembler,
    last_tick: u64,
    last_packet_time: Instant,
}

impl Client {
    pub async fn new(server_addr: &str, options: ClientOptions) -> Result<Self, ClientError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            client_id: None,
            connected: false,
            options,
            interpolator: Interpolator::new(shared::broadcast_interval()),
            autopilot: Autopilot::new(RESPAWN_DELAY),
            init_parts: SnapshotAssembler::new(),
            state_parts: SnapshotAssembler::new(),
            last_tick: 0,
            last_packet_time: Instant::now(),
        })
    }

    pub fn client_id(&self) -> Option<PlayerId> {
        self.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn interpolator(&self) -> &Interpolator {
        &self.interpolator
    }

    async fn connect(&mut self) -> Result<(), ClientError> {
        info!("Connecting to server as {}...", self.options.name);

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: self.options.name.clone(),
        };
        self.send_packet(&packet).await
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), ClientError> {
        let data = encode(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Breaks when the server has ended the session
    fn handle_packet(&mut self, packet: Packet, receive_time: Instant) -> ControlFlow<()> {
        self.last_packet_time = receive_time;

        match packet {
            Packet::Init {
                player_id,
                config,
                tick,
                part,
                parts,
                snapshot,
            } => {
                let Some(snapshot) = self.init_parts.accept(tick, part, parts, snapshot) else {
                    return ControlFlow::Continue(());
                };
                info!(
                    "Connected! Player ID: {} ({}x{} arena)",
                    player_id, config.width, config.height
                );
                self.client_id = Some(player_id);
                self.connected = true;
                self.last_tick = tick;
                self.interpolator.initialize(config, snapshot, receive_time);
            }

            Packet::GameState {
                tick,
                part,
                parts,
                snapshot,
            } => {
                // Datagrams may arrive out of order; an older snapshot would
                // make everything jump backwards
                if tick <= self.last_tick {
                    debug!("Dropping stale snapshot for tick {}", tick);
                    return ControlFlow::Continue(());
                }
                let Some(snapshot) = self.state_parts.accept(tick, part, parts, snapshot) else {
                    return ControlFlow::Continue(());
                };
                if self.interpolator.push_snapshot(snapshot, receive_time) {
                    self.last_tick = tick;
                }
            }

            Packet::PlayerJoined { player } => {
                info!("{} joined the arena", player.name);
            }

            Packet::PlayerLeft { player_id } => {
                info!("Player {} left the arena", player_id);
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.client_id = None;
                return ControlFlow::Break(());
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }

        ControlFlow::Continue(())
    }

    /// One frame: refresh the smoothed view and let the autopilot react to it
    async fn frame(&mut self, now: Instant) -> Result<(), ClientError> {
        self.interpolator.update(now);

        if !self.options.autopilot {
            return Ok(());
        }
        let (Some(me), Some(config)) = (self.client_id, self.interpolator.config().copied()) else {
            return Ok(());
        };

        let command = self
            .autopilot
            .decide(me, self.interpolator.latest(), &config, now);

        match command {
            Some(AutopilotCommand::ChangeDirection(angle)) => {
                self.send_packet(&Packet::ChangeDirection { angle }).await
            }
            Some(AutopilotCommand::Respawn) => {
                info!("Requesting respawn");
                self.send_packet(&Packet::Respawn).await
            }
            None => Ok(()),
        }
    }

    fn log_status(&self) {
        if self.interpolator.state() == InterpolatorState::Uninitialized {
            info!("Waiting for server...");
            return;
        }

        let snapshot = self.interpolator.interpolated();
        if let Some(me) = self.client_id.and_then(|id| snapshot.players.get(&id)) {
            info!(
                "{}: score {}, length {}, {}",
                me.name,
                me.score,
                me.segments.len(),
                if me.alive { "alive" } else { "dead" }
            );
        }

        let leaders: Vec<String> = snapshot
            .leaderboard(10)
            .iter()
            .map(|p| format!("{} ({})", p.name, p.score))
            .collect();
        info!(
            "Tick {}, {} players, {} foods. Leaders: {}",
            self.last_tick,
            snapshot.players.len(),
            snapshot.foods.len(),
            leaders.join(", ")
        );
    }

    pub async fn run(&mut self) -> Result<(), ClientError> {
        self.connect().await?;

        let mut frame_interval = interval(FRAME_INTERVAL);
        let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);
        let mut status_interval = interval(self.options.status_interval);

        let mut buffer = vec![0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    let receive_time = Instant::now();
                    match result {
                        Ok((len, _)) => match decode(&buffer[..len]) {
                            Ok(packet) => {
                                if self.handle_packet(packet, receive_time).is_break() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Dropping malformed packet: {}", e),
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = frame_interval.tick() => {
                    if let Err(e) = self.frame(Instant::now()).await {
                        error!("Error sending command: {}", e);
                    }
                },

                _ = heartbeat_interval.tick() => {
                    if self.connected {
                        if let Err(e) = self.send_packet(&Packet::Heartbeat).await {
                            error!("Error sending heartbeat: {}", e);
                        }
                    }

                    if self.last_packet_time.elapsed() > CONNECTION_TIMEOUT {
                        warn!("Connection lost: no packets for {:?}", CONNECTION_TIMEOUT);
                        self.connected = false;
                        break;
                    }
                },

                _ = status_interval.tick() => {
                    self.log_status();
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, leaving the arena...");
                    break;
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{GameConfig, PlayerSnapshot, Point, Snapshot};
    use tokio_test::assert_ok;

    fn me(id: PlayerId) -> PlayerSnapshot {
        PlayerSnapshot {
            id,
            name: "bot".to_string(),
            color: "#FF6B6B".to_string(),
            segments: vec![Point::new(50.0, 50.0)],
            score: 0,
            alive: true,
        }
    }

    fn with_player(id: PlayerId) -> Snapshot {
        Snapshot {
            players: [(id, me(id))].into_iter().collect(),
            foods: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_invalid_address_is_rejected() {
        let result = Client::new("not an address", ClientOptions::default()).await;
        assert!(matches!(result, Err(ClientError::InvalidAddress(_))));
    }

    fn init(player_id: PlayerId, snapshot: Snapshot) -> Packet {
        Packet::Init {
            player_id,
            config: GameConfig::default(),
            tick: 0,
            part: 0,
            parts: 1,
            snapshot,
        }
    }

    fn state(tick: u64, snapshot: Snapshot) -> Packet {
        Packet::GameState {
            tick,
            part: 0,
            parts: 1,
            snapshot,
        }
    }

    #[tokio::test]
    async fn test_init_starts_tracking() {
        let mut client = assert_ok!(Client::new("127.0.0.1:9", ClientOptions::default()).await);

        let flow = client.handle_packet(init(4, with_player(4)), Instant::now());

        assert!(flow.is_continue());
        assert!(client.is_connected());
        assert_eq!(client.client_id(), Some(4));
        assert_eq!(client.interpolator().state(), InterpolatorState::Tracking);
    }

    #[tokio::test]
    async fn test_init_waits_for_every_part() {
        let mut client = assert_ok!(Client::new("127.0.0.1:9", ClientOptions::default()).await);
        let now = Instant::now();
        let part = |part, snapshot| Packet::Init {
            player_id: 4,
            config: GameConfig::default(),
            tick: 12,
            part,
            parts: 2,
            snapshot,
        };

        client.handle_packet(part(1, with_player(5)), now);
        assert!(!client.is_connected());
        assert_eq!(client.interpolator().state(), InterpolatorState::Uninitialized);

        client.handle_packet(part(0, with_player(4)), now);
        assert!(client.is_connected());
        assert_eq!(client.last_tick, 12);
        let players = &client.interpolator().latest().players;
        assert!(players.contains_key(&4) && players.contains_key(&5));
    }

    #[tokio::test]
    async fn test_stale_game_state_is_dropped() {
        let mut client = assert_ok!(Client::new("127.0.0.1:9", ClientOptions::default()).await);
        let now = Instant::now();

        client.handle_packet(init(1, Snapshot::default()), now);
        client.handle_packet(state(10, with_player(1)), now);
        client.handle_packet(state(8, Snapshot::default()), now);

        assert!(client.interpolator().latest().players.contains_key(&1));
        assert_eq!(client.last_tick, 10);
    }

    #[tokio::test]
    async fn test_game_state_parts_are_merged() {
        let mut client = assert_ok!(Client::new("127.0.0.1:9", ClientOptions::default()).await);
        let now = Instant::now();
        client.handle_packet(init(1, Snapshot::default()), now);

        let part = |part, snapshot| Packet::GameState {
            tick: 3,
            part,
            parts: 2,
            snapshot,
        };
        client.handle_packet(part(0, with_player(1)), now);
        assert!(client.interpolator().latest().players.is_empty());
        assert_eq!(client.last_tick, 0);

        client.handle_packet(part(1, with_player(2)), now);
        assert_eq!(client.interpolator().latest().players.len(), 2);
        assert_eq!(client.last_tick, 3);
    }

    #[tokio::test]
    async fn test_disconnected_ends_the_session() {
        let mut client = assert_ok!(Client::new("127.0.0.1:9", ClientOptions::default()).await);
        let now = Instant::now();

        client.handle_packet(init(2, Snapshot::default()), now);
        let flow = client.handle_packet(
            Packet::Disconnected {
                reason: "Server full".to_string(),
            },
            now,
        );

        assert!(flow.is_break());
        assert!(!client.is_connected());
        assert_eq!(client.client_id(), None);
    }

    #[tokio::test]
    async fn test_run_returns_when_refused() {
        let server = assert_ok!(UdpSocket::bind("127.0.0.1:0").await);
        let server_addr = assert_ok!(server.local_addr()).to_string();
        let mut client = assert_ok!(Client::new(&server_addr, ClientOptions::default()).await);

        let refuse = async {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];
            let (len, from) = assert_ok!(server.recv_from(&mut buffer).await);
            assert!(matches!(assert_ok!(decode(&buffer[..len])), Packet::Connect { .. }));
            let reply = assert_ok!(encode(&Packet::Disconnected {
                reason: "Server full".to_string(),
            }));
            assert_ok!(server.send_to(&reply, from).await);
        };

        let (result, ()) = tokio::join!(
            tokio::time::timeout(Duration::from_secs(2), client.run()),
            refuse
        );

        // Returned well before the connection timeout would have fired
        assert_ok!(assert_ok!(result));
        assert!(!client.is_connected());
    }
}
