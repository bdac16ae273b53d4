//! Authoritative world model and the simulation engine that advances it

use crate::food::{random_coordinate, FoodSpawner};
use crate::sanitize::sanitize_name;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{normalize_angle, wrap_coordinate, Food, GameConfig, PlayerId, Point};
use std::collections::{BTreeMap, VecDeque};
use std::f32::consts::PI;

/// Largest heading change a snake can make in one tick (radians)
pub const MAX_TURN_RATE: f32 = 0.15;
/// Head radius used when testing food pickup
pub const FOOD_HEAD_RADIUS: f32 = 10.0;
/// Head radius used when testing body hits
pub const BODY_HEAD_RADIUS: f32 = 8.0;
pub const BODY_SEGMENT_RADIUS: f32 = 5.0;
/// Segments behind the head that a snake can never hit itself on
pub const NECK_SEGMENTS: usize = 10;
/// Minimum distance between a fresh spawn and the world edges
pub const SPAWN_MARGIN: f32 = 100.0;

pub const PLAYER_COLORS: [&str; 10] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD", "#98D8C8", "#F7DC6F",
    "#BB8FCE", "#85C1E9",
];

/// Result of a command addressed to a single player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied,
    /// The player exists but the command does not apply to its current state
    Ignored,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Death {
    pub victim: PlayerId,
    /// Player whose body was hit; equals `victim` on self-collision
    pub collider: PlayerId,
    pub credit: u32,
}

/// What happened during one tick, for logging and tests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub foods_eaten: usize,
    pub foods_spawned: usize,
    pub deaths: Vec<Death>,
}

#[derive(Debug, Clone)]
pub struct Snake {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    /// Head first
    pub segments: VecDeque<Point>,
    pub angle: f32,
    pub target_angle: f32,
    pub speed: f32,
    pub score: u32,
    pub alive: bool,
}

impl Snake {
    /// Lays out `length` segments behind `head`, opposite to `angle`
    pub fn new(
        id: PlayerId,
        name: String,
        color: String,
        head: Point,
        angle: f32,
        length: usize,
        spacing: f32,
        speed: f32,
    ) -> Self {
        let angle = normalize_angle(angle);
        Self {
            id,
            name,
            color,
            segments: layout_segments(head, angle, length, spacing),
            angle,
            target_angle: angle,
            speed,
            score: 0,
            alive: true,
        }
    }

    pub fn head(&self) -> Point {
        self.segments.front().copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Turns toward the target heading along the shorter arc, at most
    /// `MAX_TURN_RATE` per call.
    pub fn steer(&mut self) {
        let diff = normalize_angle(self.target_angle - self.angle);
        let diff = diff.clamp(-MAX_TURN_RATE, MAX_TURN_RATE);
        self.angle = normalize_angle(self.angle + diff);
    }

    /// Moves the head one step forward and drops the tail, wrapping at the
    /// world edges.
    pub fn advance(&mut self, width: f32, height: f32) -> Point {
        let head = self.head();
        let new_head = Point::new(
            wrap_coordinate(head.x + self.angle.cos() * self.speed, width),
            wrap_coordinate(head.y + self.angle.sin() * self.speed, height),
        );
        self.segments.push_front(new_head);
        self.segments.pop_back();
        new_head
    }

    /// Appends `count` segments past the tail, continuing the tail's direction
    pub fn grow(&mut self, count: usize) {
        let Some(tail) = self.segments.back().copied() else {
            return;
        };
        let prev_tail = self
            .segments
            .len()
            .checked_sub(2)
            .and_then(|i| self.segments.get(i).copied())
            .unwrap_or(tail);

        for j in 0..count {
            let step = 0.1 * j as f32;
            self.segments.push_back(Point::new(
                tail.x + (tail.x - prev_tail.x) * step,
                tail.y + (tail.y - prev_tail.y) * step,
            ));
        }
    }

    /// Eats every food the head touches; returns how many were eaten
    fn eat(&mut self, foods: &mut Vec<Food>) -> usize {
        let head = self.head();
        let before = foods.len();

        foods.retain(|food| {
            if head.distance(&food.position()) < FOOD_HEAD_RADIUS + food.radius {
                self.score += food.radius.floor() as u32;
                self.grow(growth_for(food.radius));
                false
            } else {
                true
            }
        });

        before - foods.len()
    }
}

/// Segments gained by eating a food of the given radius
pub fn growth_for(radius: f32) -> usize {
    (radius / 3.0).ceil() as usize
}

fn layout_segments(head: Point, angle: f32, length: usize, spacing: f32) -> VecDeque<Point> {
    (0..length)
        .map(|i| {
            let offset = i as f32 * spacing;
            Point::new(head.x - angle.cos() * offset, head.y - angle.sin() * offset)
        })
        .collect()
}

/// The shared mutable game world. Players are keyed in a `BTreeMap`, so a
/// tick always visits them in ascending id order.
#[derive(Debug)]
pub struct World {
    pub config: GameConfig,
    pub players: BTreeMap<PlayerId, Snake>,
    pub foods: Vec<Food>,
    pub tick: u64,
    spawner: FoodSpawner,
    rng: StdRng,
    color_index: usize,
}

impl World {
    pub fn new(config: GameConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic world for tests and replays
    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameConfig, rng: StdRng) -> Self {
        let mut world = Self {
            config,
            players: BTreeMap::new(),
            foods: Vec::with_capacity(config.food_count),
            tick: 0,
            spawner: FoodSpawner::new(),
            rng,
            color_index: 0,
        };
        world
            .spawner
            .replenish(&mut world.foods, &mut world.rng, &world.config);
        world
    }

    pub fn player(&self, id: PlayerId) -> Option<&Snake> {
        self.players.get(&id)
    }

    /// Places a new snake at a random interior position with a random
    /// heading. An existing player with the same id is replaced.
    pub fn add_player(&mut self, id: PlayerId) -> &Snake {
        let color = PLAYER_COLORS[self.color_index % PLAYER_COLORS.len()].to_string();
        self.color_index += 1;

        let name = format!("Player {}", self.players.len() + 1);
        let (head, angle) = self.random_spawn();
        let snake = Snake::new(
            id,
            name,
            color,
            head,
            angle,
            self.config.initial_length,
            self.config.grid_size as f32,
            self.config.speed,
        );

        info!(
            "Added player {} at ({:.1}, {:.1})",
            id,
            snake.head().x,
            snake.head().y
        );
        self.players.insert(id, snake);
        &self.players[&id]
    }

    pub fn set_name(&mut self, id: PlayerId, raw_name: &str) -> CommandOutcome {
        match self.players.get_mut(&id) {
            Some(snake) => {
                snake.name = sanitize_name(raw_name);
                info!("Player {} is now called {}", id, snake.name);
                CommandOutcome::Applied
            }
            None => CommandOutcome::NotFound,
        }
    }

    pub fn change_direction(&mut self, id: PlayerId, angle: f32) -> CommandOutcome {
        match self.players.get_mut(&id) {
            Some(snake) if snake.alive && angle.is_finite() => {
                snake.target_angle = normalize_angle(angle);
                CommandOutcome::Applied
            }
            Some(_) => CommandOutcome::Ignored,
            None => CommandOutcome::NotFound,
        }
    }

    /// Resets a player as if it had just joined, dead or alive. Name and color
    /// are kept.
    pub fn respawn(&mut self, id: PlayerId) -> CommandOutcome {
        if !self.players.contains_key(&id) {
            return CommandOutcome::NotFound;
        }

        let (head, angle) = self.random_spawn();
        let length = self.config.initial_length;
        let spacing = self.config.grid_size as f32;

        if let Some(snake) = self.players.get_mut(&id) {
            let angle = normalize_angle(angle);
            snake.segments = layout_segments(head, angle, length, spacing);
            snake.angle = angle;
            snake.target_angle = angle;
            snake.score = 0;
            snake.alive = true;
            info!("Player {} respawned", id);
        }
        CommandOutcome::Applied
    }

    /// Deletes a player. A living snake leaves its body behind as food.
    pub fn remove_player(&mut self, id: PlayerId) -> CommandOutcome {
        match self.players.remove(&id) {
            Some(snake) => {
                if snake.alive {
                    let corpse = self.spawner.corpse(&snake.segments, &snake.color);
                    self.foods.extend(corpse);
                }
                info!("Removed player {}", id);
                CommandOutcome::Applied
            }
            None => CommandOutcome::NotFound,
        }
    }

    /// Advances the world by one discrete step
    pub fn tick(&mut self) -> TickReport {
        self.tick += 1;
        let mut report = TickReport::default();
        let width = self.config.width_f32();
        let height = self.config.height_f32();

        let ids: Vec<PlayerId> = self.players.keys().copied().collect();
        for id in ids {
            let Some(snake) = self.players.get_mut(&id) else {
                continue;
            };
            if !snake.alive {
                continue;
            }

            snake.steer();
            snake.advance(width, height);
            report.foods_eaten += snake.eat(&mut self.foods);

            if let Some(collider) = self.find_collider(id) {
                if let Some(death) = self.kill(id, collider) {
                    report.deaths.push(death);
                }
            }
        }

        report.foods_spawned = self
            .spawner
            .replenish(&mut self.foods, &mut self.rng, &self.config);
        report
    }

    /// First living player (lowest id first) whose body the head of `id` overlaps
    fn find_collider(&self, id: PlayerId) -> Option<PlayerId> {
        let head = self.players.get(&id)?.head();
        let threshold = BODY_HEAD_RADIUS + BODY_SEGMENT_RADIUS;

        self.players
            .values()
            .filter(|other| other.alive)
            .find(|other| {
                let skip = if other.id == id { NECK_SEGMENTS } else { 0 };
                other
                    .segments
                    .iter()
                    .skip(skip)
                    .any(|segment| head.distance(segment) < threshold)
            })
            .map(|other| other.id)
    }

    fn kill(&mut self, victim: PlayerId, collider: PlayerId) -> Option<Death> {
        let snake = self.players.get_mut(&victim)?;
        snake.alive = false;
        let victim_score = snake.score;
        let corpse = self.spawner.corpse(&snake.segments, &snake.color);
        self.foods.extend(corpse);

        let mut credit = 0;
        if collider != victim {
            if let Some(killer) = self.players.get_mut(&collider) {
                credit = victim_score / 2;
                killer.score += credit;
                info!(
                    "Player {} killed player {} (+{} points)",
                    collider, victim, credit
                );
            }
        } else {
            debug!("Player {} ran into itself", victim);
        }

        Some(Death {
            victim,
            collider,
            credit,
        })
    }

    fn random_spawn(&mut self) -> (Point, f32) {
        let x = random_coordinate(&mut self.rng, self.config.width_f32(), SPAWN_MARGIN);
        let y = random_coordinate(&mut self.rng, self.config.height_f32(), SPAWN_MARGIN);
        let angle = self.rng.gen_range(0.0..2.0 * PI);
        (Point::new(x, y), angle)
    }
}
