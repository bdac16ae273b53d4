//! Projects the world into the value-copied view that gets broadcast

use crate::game::{Snake, World};
use shared::{PlayerSnapshot, Snapshot};

impl From<&Snake> for PlayerSnapshot {
    fn from(snake: &Snake) -> Self {
        Self {
            id: snake.id,
            name: snake.name.clone(),
            color: snake.color.clone(),
            segments: snake.segments.iter().copied().collect(),
            score: snake.score,
            alive: snake.alive,
        }
    }
}

/// Builds a snapshot that owns all of its data, so later ticks cannot
/// change it.
pub fn build_snapshot(world: &World) -> Snapshot {
    Snapshot {
        players: world
            .players
            .iter()
            .map(|(id, snake)| (*id, PlayerSnapshot::from(snake)))
            .collect(),
        foods: world.foods.clone(),
    }
}
