// Snapshot diffing between two entity collections keyed by identity.

use super::entity::{Entity, EntityId, PartialEntity, Vec3};
use std::collections::{HashMap, HashSet};

/// Difference between a previous and a current snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityDelta {
    pub changed: Vec<PartialEntity>,
    pub removed: Vec<EntityId>,
    pub added: Vec<Entity>,
}

impl EntityDelta {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty() && self.added.is_empty()
    }
}

// Bitwise comparison so NaN components never report a spurious change.
fn same_vec3(a: &Vec3, b: &Vec3) -> bool {
    a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

/// Compares two snapshots by entity identity.
///
/// Output order follows the input slices: `removed` and `changed` in `previous` order,
/// `added` in `current` order. Identities are expected to be unique within each slice;
/// the last occurrence wins otherwise.
pub fn compute_delta(previous: &[Entity], current: &[Entity]) -> EntityDelta {
    let prev_by_id: HashMap<EntityId, &Entity> = previous.iter().map(|e| (e.id, e)).collect();
    let curr_by_id: HashMap<EntityId, &Entity> = current.iter().map(|e| (e.id, e)).collect();

    let mut delta = EntityDelta::default();
    let mut seen: HashSet<EntityId> = HashSet::with_capacity(prev_by_id.len());

    for id in previous.iter().map(|e| e.id) {
        if !seen.insert(id) {
            continue;
        }
        let prev = prev_by_id[&id];
        let Some(curr) = curr_by_id.get(&id) else {
            delta.removed.push(id);
            continue;
        };

        let mut diff = PartialEntity::new(id);
        if !same_vec3(&prev.position, &curr.position) {
            diff.position = Some(curr.position);
        }
        if !same_vec3(&prev.velocity, &curr.velocity) {
            diff.velocity = Some(curr.velocity);
        }
        if prev.health != curr.health {
            diff.health = Some(curr.health);
        }
        if !diff.is_empty() {
            delta.changed.push(diff);
        }
    }

    seen.clear();
    for id in current.iter().map(|e| e.id) {
        if seen.insert(id) && !prev_by_id.contains_key(&id) {
            delta.added.push(curr_by_id[&id].clone());
        }
    }

    delta
}

/// Rebuilds the newer snapshot from `base` and a delta computed against it.
///
/// Applies `removed`, then `added`, then the field overrides in `changed`.
pub fn apply_delta(base: &[Entity], delta: &EntityDelta) -> Vec<Entity> {
    let removed: HashSet<EntityId> = delta.removed.iter().copied().collect();
    let mut out: Vec<Entity> = base
        .iter()
        .filter(|e| !removed.contains(&e.id))
        .cloned()
        .collect();
    out.extend(delta.added.iter().cloned());

    let index: HashMap<EntityId, usize> = out.iter().enumerate().map(|(i, e)| (e.id, i)).collect();
    for change in &delta.changed {
        if let Some(&i) = index.get(&change.id) {
            change.apply_to(&mut out[i]);
        }
    }
    out
}
