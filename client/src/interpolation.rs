//! Smooths motion between the two most recent server snapshots.
//!
//! Snapshots arrive at the broadcast cadence while frames are drawn much more
//! often. Every frame the interpolator blends `previous` toward `current` by
//! how much of one broadcast interval has elapsed since `current` arrived.
//! Positions move along the shorter way around the torus, so a snake crossing
//! an edge slides through it instead of sweeping across the whole arena.

use log::debug;
use shared::{shortest_delta, wrap_coordinate, GameConfig, Point, Snapshot};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolatorState {
    /// No init message has been received yet
    Uninitialized,
    Tracking,
}

pub struct Interpolator {
    config: Option<GameConfig>,
    previous: Snapshot,
    current: Snapshot,
    interpolated: Snapshot,
    last_update: Option<Instant>,
    broadcast_interval: Duration,
}

impl Interpolator {
    pub fn new(broadcast_interval: Duration) -> Self {
        Self {
            config: None,
            previous: Snapshot::default(),
            current: Snapshot::default(),
            interpolated: Snapshot::default(),
            last_update: None,
            broadcast_interval,
        }
    }

    pub fn state(&self) -> InterpolatorState {
        if self.config.is_some() {
            InterpolatorState::Tracking
        } else {
            InterpolatorState::Uninitialized
        }
    }

    pub fn config(&self) -> Option<&GameConfig> {
        self.config.as_ref()
    }

    /// Most recent authoritative snapshot
    pub fn latest(&self) -> &Snapshot {
        &self.current
    }

    /// Starts tracking from the snapshot carried by the init message. There
    /// is nothing to blend yet, so both samples are the same.
    pub fn initialize(&mut self, config: GameConfig, snapshot: Snapshot, now: Instant) {
        debug!(
            "Interpolator initialized with {} players and {} foods",
            snapshot.players.len(),
            snapshot.foods.len()
        );

        self.config = Some(config);
        self.previous = snapshot.clone();
        self.interpolated = snapshot.clone();
        self.current = snapshot;
        self.last_update = Some(now);
    }

    /// Shifts `current` into `previous`. Returns false if the snapshot was
    /// dropped because no init message has been seen.
    pub fn push_snapshot(&mut self, snapshot: Snapshot, now: Instant) -> bool {
        if self.config.is_none() {
            return false;
        }

        self.previous = std::mem::replace(&mut self.current, snapshot);
        self.last_update = Some(now);
        true
    }

    /// Fraction of a broadcast interval elapsed since the last snapshot, in `[0, 1]`
    pub fn interpolation_factor(&self, now: Instant) -> f32 {
        let Some(last_update) = self.last_update else {
            return 0.0;
        };

        let interval = self.broadcast_interval.as_secs_f32();
        if interval <= 0.0 {
            return 1.0;
        }

        let elapsed = now.saturating_duration_since(last_update).as_secs_f32();
        (elapsed / interval).clamp(0.0, 1.0)
    }

    /// Recomputes the smoothed state for a frame drawn at `now`
    pub fn update(&mut self, now: Instant) -> &Snapshot {
        let Some(config) = self.config else {
            return &self.interpolated;
        };

        let factor = self.interpolation_factor(now);
        let width = config.width_f32();
        let height = config.height_f32();

        for (id, current) in &self.current.players {
            let previous = match self.previous.players.get(id) {
                Some(previous) if self.interpolated.players.contains_key(id) => previous,
                _ => {
                    // First appearance: nothing sensible to move from
                    self.interpolated.players.insert(*id, current.clone());
                    continue;
                }
            };

            let Some(shown) = self.interpolated.players.get_mut(id) else {
                continue;
            };

            shown.segments.resize(current.segments.len(), Point::default());
            for (i, (target, shown_segment)) in current
                .segments
                .iter()
                .zip(shown.segments.iter_mut())
                .enumerate()
            {
                let origin = previous.segments.get(i).unwrap_or(target);
                *shown_segment = Point::new(
                    lerp_wrapped(origin.x, target.x, factor, width),
                    lerp_wrapped(origin.y, target.y, factor, height),
                );
            }

            shown.name.clone_from(&current.name);
            shown.color.clone_from(&current.color);
            shown.score = current.score;
            shown.alive = current.alive;
        }

        let current_players = &self.current.players;
        self.interpolated
            .players
            .retain(|id, _| current_players.contains_key(id));

        self.interpolated.foods.clone_from(&self.current.foods);

        &self.interpolated
    }

    pub fn interpolated(&self) -> &Snapshot {
        &self.interpolated
    }
}

fn lerp_wrapped(from: f32, to: f32, factor: f32, dimension: f32) -> f32 {
    let delta = shortest_delta(from, to, dimension);
    wrap_coordinate(from + delta * factor, dimension)
}
