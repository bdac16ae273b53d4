//! Food economy: spawning, corpse conversion and population upkeep

use rand::Rng;
use shared::{Food, FoodId, GameConfig, Point};

/// Distance kept between randomly spawned food and the world edges
pub const FOOD_MARGIN: f32 = 10.0;
pub const MIN_FOOD_RADIUS: f32 = 5.0;
pub const MAX_FOOD_RADIUS: f32 = 10.0;
/// Radius of food dropped by a dead snake
pub const CORPSE_FOOD_RADIUS: f32 = 6.0;

/// Hands out food items with unique ids for a single world
#[derive(Debug)]
pub struct FoodSpawner {
    next_id: FoodId,
}

impl Default for FoodSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl FoodSpawner {
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    fn next_id(&mut self) -> FoodId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Creates a food item at a uniform-random interior position
    pub fn random_food<R: Rng>(&mut self, rng: &mut R, config: &GameConfig) -> Food {
        Food {
            id: self.next_id(),
            x: random_coordinate(rng, config.width_f32(), FOOD_MARGIN),
            y: random_coordinate(rng, config.height_f32(), FOOD_MARGIN),
            radius: rng.gen_range(MIN_FOOD_RADIUS..MAX_FOOD_RADIUS),
            color: random_food_color(rng),
        }
    }

    /// Creates a food item at an exact position
    pub fn food_at(&mut self, position: Point, radius: f32, color: &str) -> Food {
        Food {
            id: self.next_id(),
            x: position.x,
            y: position.y,
            radius,
            color: color.to_string(),
        }
    }

    /// Turns every other body segment, starting at the head, into food
    pub fn corpse<'a, I>(&mut self, segments: I, color: &str) -> Vec<Food>
    where
        I: IntoIterator<Item = &'a Point>,
    {
        segments
            .into_iter()
            .step_by(2)
            .map(|segment| self.food_at(*segment, CORPSE_FOOD_RADIUS, color))
            .collect()
    }

    /// Spawns food until the population reaches the configured target.
    ///
    /// Returns how many items were added. A population already above the
    /// target (after deaths) is left alone.
    pub fn replenish<R: Rng>(
        &mut self,
        foods: &mut Vec<Food>,
        rng: &mut R,
        config: &GameConfig,
    ) -> usize {
        let missing = config.food_count.saturating_sub(foods.len());
        for _ in 0..missing {
            let food = self.random_food(rng, config);
            foods.push(food);
        }
        missing
    }
}

/// Uniform coordinate in `[margin, dimension - margin)`, or the centre line
/// when the dimension is too small to leave a margin on both sides.
pub fn random_coordinate<R: Rng>(rng: &mut R, dimension: f32, margin: f32) -> f32 {
    if dimension > 2.0 * margin {
        rng.gen_range(margin..dimension - margin)
    } else {
        dimension / 2.0
    }
}

pub fn random_food_color<R: Rng>(rng: &mut R) -> String {
    format!("hsl({}, 70%, 60%)", rng.gen_range(0..360))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_config(food_count: usize) -> GameConfig {
        GameConfig {
            food_count,
            ..GameConfig::default()
        }
    }

    #[test]
    fn test_random_food_within_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut spawner = FoodSpawner::new();
        let config = GameConfig::default();

        for _ in 0..500 {
            let food = spawner.random_food(&mut rng, &config);
            assert!(food.x >= FOOD_MARGIN && food.x < config.width_f32() - FOOD_MARGIN);
            assert!(food.y >= FOOD_MARGIN && food.y < config.height_f32() - FOOD_MARGIN);
            assert!(food.radius >= MIN_FOOD_RADIUS && food.radius < MAX_FOOD_RADIUS);
            assert!(food.color.starts_with("hsl("));
        }
    }

    #[test]
    fn test_food_ids_are_unique() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut spawner = FoodSpawner::new();
        let config = GameConfig::default();

        let mut ids: Vec<FoodId> = (0..100)
            .map(|_| spawner.random_food(&mut rng, &config).id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_replenish_fills_to_target() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut spawner = FoodSpawner::new();
        let config = small_config(20);
        let mut foods = Vec::new();

        assert_eq!(spawner.replenish(&mut foods, &mut rng, &config), 20);
        assert_eq!(foods.len(), 20);

        foods.truncate(15);
        assert_eq!(spawner.replenish(&mut foods, &mut rng, &config), 5);
        assert_eq!(foods.len(), 20);
    }

    #[test]
    fn test_replenish_leaves_surplus() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut spawner = FoodSpawner::new();
        let config = small_config(3);
        let mut foods: Vec<Food> = (0..6)
            .map(|i| spawner.food_at(Point::new(i as f32, 0.0), 6.0, "#FFFFFF"))
            .collect();

        assert_eq!(spawner.replenish(&mut foods, &mut rng, &config), 0);
        assert_eq!(foods.len(), 6);
    }

    #[test]
    fn test_corpse_keeps_even_segments() {
        let mut spawner = FoodSpawner::new();
        let segments: Vec<Point> = (0..5).map(|i| Point::new(i as f32 * 10.0, 50.0)).collect();

        let foods = spawner.corpse(&segments, "#4ECDC4");

        assert_eq!(foods.len(), 3);
        let xs: Vec<f32> = foods.iter().map(|f| f.x).collect();
        assert_eq!(xs, vec![0.0, 20.0, 40.0]);
        assert!(foods.iter().all(|f| f.radius == CORPSE_FOOD_RADIUS));
        assert!(foods.iter().all(|f| f.color == "#4ECDC4"));
    }

    #[test]
    fn test_random_coordinate_degenerate_dimension() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(random_coordinate(&mut rng, 150.0, 100.0), 75.0);
    }
}
