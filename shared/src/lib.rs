use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::f32::consts::PI;
use std::time::Duration;
use thiserror::Error;

pub const PROTOCOL_VERSION: u32 = 1;
pub const TICK_RATE: u32 = 60;
pub const BROADCAST_RATE: u32 = 30;
pub const MAX_PACKET_SIZE: usize = 65_507;
/// Room left in every datagram for the packet fields around a snapshot part
pub const PACKET_HEADER_RESERVE: usize = 1024;
/// Largest encoded snapshot part that still fits a datagram
pub const SNAPSHOT_PART_BUDGET: usize = MAX_PACKET_SIZE - PACKET_HEADER_RESERVE;
pub const DEFAULT_PLAYER_NAME: &str = "Player";
pub const MAX_NAME_LEN: usize = 12;

pub type PlayerId = u32;
pub type FoodId = u64;

/// Time between two snapshot broadcasts at the reference cadence.
pub fn broadcast_interval() -> Duration {
    Duration::from_secs_f64(1.0 / BROADCAST_RATE as f64)
}

/// Time between two simulation ticks at the reference cadence.
pub fn tick_interval() -> Duration {
    Duration::from_secs_f64(1.0 / TICK_RATE as f64)
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
        name: String,
    },
    SetName {
        name: String,
    },
    ChangeDirection {
        angle: f32,
    },
    Respawn,
    Heartbeat,
    Disconnect,

    /// Snapshots larger than one datagram are sent as `parts` packets
    /// sharing a tick; `part` counts from zero.
    Init {
        player_id: PlayerId,
        config: GameConfig,
        tick: u64,
        part: u16,
        parts: u16,
        snapshot: Snapshot,
    },
    GameState {
        tick: u64,
        part: u16,
        parts: u16,
        snapshot: Snapshot,
    },
    PlayerJoined {
        player: PlayerSnapshot,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    Disconnected {
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to encode packet: {0}")]
    Encode(#[source] bincode::Error),
    #[error("failed to decode packet: {0}")]
    Decode(#[source] bincode::Error),
    #[error("packet of {0} bytes exceeds the datagram limit")]
    Oversized(usize),
    #[error("snapshot needs {0} parts, more than a packet can number")]
    TooManyParts(usize),
}

pub fn encode(packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
    let data = bincode::serialize(packet).map_err(ProtocolError::Encode)?;
    if data.len() > MAX_PACKET_SIZE {
        return Err(ProtocolError::Oversized(data.len()));
    }
    Ok(data)
}

pub fn decode(data: &[u8]) -> Result<Packet, ProtocolError> {
    bincode::deserialize(data).map_err(ProtocolError::Decode)
}

/// World constants fixed at construction and sent once per connection.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct GameConfig {
    pub width: u32,
    pub height: u32,
    pub grid_size: u32,
    pub initial_length: usize,
    pub food_count: usize,
    pub speed: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
            grid_size: 10,
            initial_length: 5,
            food_count: 50,
            speed: 3.0,
        }
    }
}

impl GameConfig {
    pub fn width_f32(&self) -> f32 {
        self.width as f32
    }

    pub fn height_f32(&self) -> f32 {
        self.height as f32
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Food {
    pub id: FoodId,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub color: String,
}

impl Food {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Observable part of a player; steering state stays on the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub segments: Vec<Point>,
    pub score: u32,
    pub alive: bool,
}

impl PlayerSnapshot {
    pub fn head(&self) -> Option<Point> {
        self.segments.first().copied()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub players: HashMap<PlayerId, PlayerSnapshot>,
    pub foods: Vec<Food>,
}

impl Snapshot {
    /// Living players ranked by score, highest first. Ties go to the lower id.
    pub fn leaderboard(&self, limit: usize) -> Vec<&PlayerSnapshot> {
        let mut ranked: Vec<&PlayerSnapshot> =
            self.players.values().filter(|p| p.alive).collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
        ranked.truncate(limit);
        ranked
    }

    /// Splits the snapshot into parts that each encode within `budget` bytes.
    ///
    /// Players go first in id order, then foods in their original order.
    /// A body too long for a part of its own is cut into consecutive runs of
    /// segments, one run per part. There is always at least one part.
    pub fn split(&self, budget: usize) -> Result<Vec<Snapshot>, ProtocolError> {
        let mut splitter = SnapshotSplitter::new(budget)?;

        let mut ids: Vec<PlayerId> = self.players.keys().copied().collect();
        ids.sort_unstable();

        for id in ids {
            let Some(player) = self.players.get(&id) else {
                continue;
            };
            let cost = encoded_size(&(id, player))?;
            if cost <= splitter.room() {
                splitter.push_player(player.clone(), cost);
                continue;
            }

            let bare = PlayerSnapshot {
                segments: Vec::new(),
                ..player.clone()
            };
            let header = encoded_size(&(id, &bare))?;
            let point = encoded_size(&Point::default())?;
            let per_run = splitter.room().saturating_sub(header) / point;
            if per_run == 0 {
                return Err(ProtocolError::Oversized(cost));
            }

            for run in player.segments.chunks(per_run) {
                let piece = PlayerSnapshot {
                    segments: run.to_vec(),
                    ..bare.clone()
                };
                splitter.push_player(piece, header + run.len() * point);
            }
        }

        for food in &self.foods {
            let cost = encoded_size(food)?;
            if cost > splitter.room() {
                return Err(ProtocolError::Oversized(cost));
            }
            splitter.push_food(food.clone(), cost);
        }

        splitter.finish()
    }

    /// Reassembles parts produced by [`Snapshot::split`], given in part order
    pub fn merge<I: IntoIterator<Item = Snapshot>>(parts: I) -> Snapshot {
        let mut merged = Snapshot::default();
        for part in parts {
            for (id, player) in part.players {
                match merged.players.entry(id) {
                    Entry::Occupied(mut entry) => entry.get_mut().segments.extend(player.segments),
                    Entry::Vacant(entry) => {
                        entry.insert(player);
                    }
                }
            }
            merged.foods.extend(part.foods);
        }
        merged
    }
}

fn encoded_size<T: Serialize + ?Sized>(value: &T) -> Result<usize, ProtocolError> {
    let size = bincode::serialized_size(value).map_err(ProtocolError::Encode)?;
    Ok(size as usize)
}

/// Fills snapshot parts up to a byte budget, opening a new part when the
/// next item does not fit.
struct SnapshotSplitter {
    budget: usize,
    /// Encoded size of a part with no players and no foods
    empty: usize,
    used: usize,
    current: Snapshot,
    parts: Vec<Snapshot>,
}

impl SnapshotSplitter {
    fn new(budget: usize) -> Result<Self, ProtocolError> {
        let empty = encoded_size(&Snapshot::default())?;
        Ok(Self {
            budget,
            empty,
            used: empty,
            current: Snapshot::default(),
            parts: Vec::new(),
        })
    }

    /// Space available to a single item in a fresh part
    fn room(&self) -> usize {
        self.budget.saturating_sub(self.empty)
    }

    fn make_space(&mut self, cost: usize) {
        let occupied = !self.current.players.is_empty() || !self.current.foods.is_empty();
        if occupied && self.used + cost > self.budget {
            self.parts.push(std::mem::take(&mut self.current));
            self.used = self.empty;
        }
    }

    fn push_player(&mut self, player: PlayerSnapshot, cost: usize) {
        self.make_space(cost);
        self.used += cost;
        self.current.players.insert(player.id, player);
    }

    fn push_food(&mut self, food: Food, cost: usize) {
        self.make_space(cost);
        self.used += cost;
        self.current.foods.push(food);
    }

    fn finish(mut self) -> Result<Vec<Snapshot>, ProtocolError> {
        let occupied = !self.current.players.is_empty() || !self.current.foods.is_empty();
        if occupied || self.parts.is_empty() {
            self.parts.push(self.current);
        }
        if self.parts.len() > u16::MAX as usize {
            return Err(ProtocolError::TooManyParts(self.parts.len()));
        }
        Ok(self.parts)
    }
}

/// Wraps a coordinate that left `[0, dimension]` back in from the opposite edge.
pub fn wrap_coordinate(value: f32, dimension: f32) -> f32 {
    if value < 0.0 || value > dimension {
        value.rem_euclid(dimension)
    } else {
        value
    }
}

/// Signed delta from `from` to `to` along the shorter way around the torus.
pub fn shortest_delta(from: f32, to: f32, dimension: f32) -> f32 {
    let delta = to - from;
    if delta.abs() > dimension / 2.0 {
        if delta > 0.0 {
            delta - dimension
        } else {
            delta + dimension
        }
    } else {
        delta
    }
}

/// Normalizes an angle into (-PI, PI].
pub fn normalize_angle(angle: f32) -> f32 {
    let mut angle = angle % (2.0 * PI);
    if angle > PI {
        angle -= 2.0 * PI;
    }
    if angle <= -PI {
        angle += 2.0 * PI;
    }
    angle
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn player(id: PlayerId, score: u32, alive: bool) -> PlayerSnapshot {
        PlayerSnapshot {
            id,
            name: format!("p{}", id),
            color: "#FF6B6B".to_string(),
            segments: vec![Point::new(10.0, 10.0)],
            score,
            alive,
        }
    }

    #[test]
    fn test_default_config_matches_reference_world() {
        let config = GameConfig::default();
        assert_eq!(config.width, 1200);
        assert_eq!(config.height, 800);
        assert_eq!(config.grid_size, 10);
        assert_eq!(config.initial_length, 5);
        assert_eq!(config.food_count, 50);
        assert_approx_eq!(config.speed, 3.0);
    }

    #[test]
    fn test_broadcast_is_coarser_than_tick() {
        assert!(broadcast_interval() > tick_interval());
        assert_eq!(TICK_RATE % BROADCAST_RATE, 0);
    }

    #[test]
    fn test_wrap_coordinate_inside_is_untouched() {
        assert_approx_eq!(wrap_coordinate(0.0, 1200.0), 0.0);
        assert_approx_eq!(wrap_coordinate(600.0, 1200.0), 600.0);
        assert_approx_eq!(wrap_coordinate(1200.0, 1200.0), 1200.0);
    }

    #[test]
    fn test_wrap_coordinate_past_edges() {
        assert_approx_eq!(wrap_coordinate(1202.0, 1200.0), 2.0);
        assert_approx_eq!(wrap_coordinate(-3.0, 1200.0), 1197.0);
    }

    #[test]
    fn test_shortest_delta_crosses_boundary() {
        assert_approx_eq!(shortest_delta(5.0, 1195.0, 1200.0), -10.0);
        assert_approx_eq!(shortest_delta(1195.0, 5.0, 1200.0), 10.0);
        assert_approx_eq!(shortest_delta(100.0, 130.0, 1200.0), 30.0);
    }

    #[test]
    fn test_normalize_angle_range() {
        assert_approx_eq!(normalize_angle(0.0), 0.0);
        assert_approx_eq!(normalize_angle(PI), PI);
        assert_approx_eq!(normalize_angle(-PI), PI);
        assert_approx_eq!(normalize_angle(3.0 * PI / 2.0), -PI / 2.0, 1e-5);
        assert_approx_eq!(normalize_angle(-5.0 * PI / 2.0), -PI / 2.0, 1e-5);
        assert_approx_eq!(normalize_angle(4.0 * PI + 0.25), 0.25, 1e-4);
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_approx_eq!(a.distance(&b), 5.0);
    }

    #[test]
    fn test_leaderboard_skips_dead_and_orders_by_score() {
        let mut snapshot = Snapshot::default();
        for p in [
            player(1, 10, true),
            player(2, 30, true),
            player(3, 50, false),
            player(4, 30, true),
        ] {
            snapshot.players.insert(p.id, p);
        }

        let board = snapshot.leaderboard(10);
        let ids: Vec<PlayerId> = board.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 4, 1]);

        assert_eq!(snapshot.leaderboard(1).len(), 1);
    }

    #[test]
    fn test_packet_serialization_init() {
        let mut snapshot = Snapshot::default();
        snapshot.players.insert(7, player(7, 3, true));
        snapshot.foods.push(Food {
            id: 1,
            x: 20.0,
            y: 30.0,
            radius: 6.0,
            color: "hsl(120, 70%, 60%)".to_string(),
        });

        let packet = Packet::Init {
            player_id: 7,
            config: GameConfig::default(),
            tick: 3,
            part: 0,
            parts: 1,
            snapshot: snapshot.clone(),
        };

        let data = encode(&packet).unwrap();
        match decode(&data).unwrap() {
            Packet::Init {
                player_id,
                config,
                tick,
                part,
                parts,
                snapshot: decoded,
            } => {
                assert_eq!(player_id, 7);
                assert_eq!((tick, part, parts), (3, 0, 1));
                assert_eq!(config, GameConfig::default());
                assert_eq!(decoded, snapshot);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = decode(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01]);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_rejects_oversized_snapshot() {
        let mut snapshot = Snapshot::default();
        let mut big = player(1, 0, true);
        big.segments = vec![Point::new(1.0, 1.0); MAX_PACKET_SIZE / 8 + 1];
        snapshot.players.insert(1, big);

        let result = encode(&Packet::GameState {
            tick: 1,
            part: 0,
            parts: 1,
            snapshot,
        });
        assert!(matches!(result, Err(ProtocolError::Oversized(_))));
    }

    fn long_player(id: PlayerId, segments: usize) -> PlayerSnapshot {
        let mut p = player(id, 0, true);
        p.segments = (0..segments)
            .map(|i| Point::new(i as f32, id as f32))
            .collect();
        p
    }

    #[test]
    fn test_small_snapshot_is_one_part() {
        let mut snapshot = Snapshot::default();
        snapshot.players.insert(1, player(1, 5, true));

        let parts = snapshot.split(SNAPSHOT_PART_BUDGET).unwrap();
        assert_eq!(parts, vec![snapshot]);

        let empty = Snapshot::default().split(SNAPSHOT_PART_BUDGET).unwrap();
        assert_eq!(empty, vec![Snapshot::default()]);
    }

    #[test]
    fn test_split_keeps_parts_within_budget() {
        let mut snapshot = Snapshot::default();
        for id in 1..=12 {
            snapshot.players.insert(id, long_player(id, 1_000));
        }
        for id in 0..200 {
            snapshot.foods.push(Food {
                id,
                x: id as f32,
                y: 1.0,
                radius: 7.0,
                color: "hsl(200, 70%, 60%)".to_string(),
            });
        }

        let parts = snapshot.split(SNAPSHOT_PART_BUDGET).unwrap();
        assert!(parts.len() > 1);

        for (part, piece) in (0u16..).zip(parts.iter()) {
            let packet = Packet::GameState {
                tick: 9,
                part,
                parts: parts.len() as u16,
                snapshot: piece.clone(),
            };
            assert!(encode(&packet).is_ok());
        }

        assert_eq!(Snapshot::merge(parts), snapshot);
    }

    #[test]
    fn test_body_longer_than_a_datagram_is_cut_into_runs() {
        let mut snapshot = Snapshot::default();
        snapshot.players.insert(4, long_player(4, 20_000));
        snapshot.players.insert(5, player(5, 1, true));

        let parts = snapshot.split(SNAPSHOT_PART_BUDGET).unwrap();
        assert!(parts.len() >= 3);
        for piece in &parts {
            let size = bincode::serialized_size(piece).unwrap() as usize;
            assert!(size <= SNAPSHOT_PART_BUDGET);
        }

        let merged = Snapshot::merge(parts);
        assert_eq!(merged.players[&4].segments.len(), 20_000);
        assert_eq!(merged, snapshot);
    }

    #[test]
    fn test_tiny_budget_is_rejected() {
        let mut snapshot = Snapshot::default();
        snapshot.players.insert(1, long_player(1, 3));

        assert!(matches!(
            snapshot.split(20),
            Err(ProtocolError::Oversized(_))
        ));
    }
}
