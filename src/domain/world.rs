// Default world content for freshly created lobbies.

use super::entity::{Entity, EntityId, Vec3};

pub const ASTEROID_KIND: &str = "asteroid";
pub const FIRST_ASTEROID_ID: EntityId = 100;
pub const ASTEROID_COUNT: usize = 20;
pub const ASTEROID_HEALTH: i32 = 50;

const GRID_COLUMNS: usize = 5;
const GRID_SPACING: f64 = 20.0;

/// Where newly joined clients are placed.
pub const SPAWN_POSITION: Vec3 = [0.0, 0.0, 0.0];

/// A 5x4 grid of inert asteroids centred on the origin with fixed ids 100..=119.
///
/// The layout is fixed so every new lobby starts from the same reproducible world.
pub fn default_world() -> Vec<Entity> {
    (0..ASTEROID_COUNT)
        .map(|i| {
            let column = (i % GRID_COLUMNS) as f64 - 2.0;
            let row = (i / GRID_COLUMNS) as f64 - 2.0;
            Entity::new(FIRST_ASTEROID_ID + i as EntityId, ASTEROID_KIND)
                .with_position([column * GRID_SPACING, 0.0, row * GRID_SPACING])
                .with_health(ASTEROID_HEALTH)
        })
        .collect()
}
