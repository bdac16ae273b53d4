//! Headless steering: heads for the nearest food and asks to respawn a little
//! while after dying.

use shared::{shortest_delta, Food, GameConfig, PlayerId, Point, Snapshot};
use std::time::{Duration, Instant};

/// Heading changes smaller than this are not worth a packet
const ANGLE_EPSILON: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutopilotCommand {
    ChangeDirection(f32),
    Respawn,
}

pub struct Autopilot {
    respawn_delay: Duration,
    died_at: Option<Instant>,
    last_angle: Option<f32>,
}

impl Autopilot {
    pub fn new(respawn_delay: Duration) -> Self {
        Self {
            respawn_delay,
            died_at: None,
            last_angle: None,
        }
    }

    /// Picks the next command for player `me`, if any
    pub fn decide(
        &mut self,
        me: PlayerId,
        snapshot: &Snapshot,
        config: &GameConfig,
        now: Instant,
    ) -> Option<AutopilotCommand> {
        let player = snapshot.players.get(&me)?;

        if !player.alive {
            let died_at = *self.died_at.get_or_insert(now);
            if now.saturating_duration_since(died_at) >= self.respawn_delay {
                self.died_at = None;
                self.last_angle = None;
                return Some(AutopilotCommand::Respawn);
            }
            return None;
        }
        self.died_at = None;

        let head = player.head()?;
        let angle = nearest_food_angle(head, &snapshot.foods, config)?;

        match self.last_angle {
            Some(last) if (last - angle).abs() < ANGLE_EPSILON => None,
            _ => {
                self.last_angle = Some(angle);
                Some(AutopilotCommand::ChangeDirection(angle))
            }
        }
    }
}

/// Heading from `head` to the closest food, measured across the edges too
pub fn nearest_food_angle(head: Point, foods: &[Food], config: &GameConfig) -> Option<f32> {
    let width = config.width_f32();
    let height = config.height_f32();

    foods
        .iter()
        .map(|food| {
            let dx = shortest_delta(head.x, food.x, width);
            let dy = shortest_delta(head.y, food.y, height);
            (dx, dy, dx * dx + dy * dy)
        })
        .min_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(dx, dy, _)| dy.atan2(dx))
}
