// Domain layer: network-visible entities and snapshot diffing.

pub mod delta;
pub mod entity;
pub mod world;

pub use delta::{EntityDelta, apply_delta, compute_delta};
pub use entity::{Entity, EntityId, PartialEntity, Vec3};
pub use world::{SPAWN_POSITION, default_world};
