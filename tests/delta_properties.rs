use proptest::prelude::*;
use spacehub::domain::{Entity, EntityId, apply_delta, compute_delta};
use std::collections::BTreeMap;

// A few fixed values make equal fields across snapshots common.
fn component() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(0.0),
        Just(1.5),
        Just(-20.0),
        -1.0e6f64..1.0e6,
    ]
}

fn vec3() -> impl Strategy<Value = [f64; 3]> {
    (component(), component(), component()).prop_map(|(x, y, z)| [x, y, z])
}

fn health() -> impl Strategy<Value = Option<i32>> {
    prop::option::of(prop_oneof![Just(50), Just(40), any::<i32>()])
}

// Unique ids in arbitrary order.
fn snapshot() -> impl Strategy<Value = Vec<Entity>> {
    prop::collection::btree_map(0u64..30, (vec3(), vec3(), health()), 0..20)
        .prop_map(|fields| {
            fields
                .into_iter()
                .map(|(id, (position, velocity, health))| Entity {
                    id,
                    kind: "asteroid".to_string(),
                    position,
                    velocity,
                    health,
                })
                .collect::<Vec<_>>()
        })
        .prop_flat_map(|entities| Just(entities).prop_shuffle())
}

// A later snapshot derived from an earlier one: some entities removed, some edited, some new.
fn related_pair() -> impl Strategy<Value = (Vec<Entity>, Vec<Entity>)> {
    snapshot()
        .prop_flat_map(|previous| {
            let len = previous.len();
            (
                Just(previous),
                prop::collection::vec((any::<bool>(), any::<bool>(), health()), len),
                snapshot(),
            )
        })
        .prop_map(|(previous, edits, extra)| {
            let mut current: Vec<Entity> = previous
                .iter()
                .zip(edits)
                .filter(|(_, (keep, _, _))| *keep)
                .map(|(e, (_, edit, health))| {
                    let mut e = e.clone();
                    if edit {
                        e.health = health;
                    }
                    e
                })
                .collect();
            current.extend(extra.into_iter().map(|mut e| {
                e.id += 100;
                e
            }));
            (previous, current)
        })
}

fn by_id(entities: &[Entity]) -> BTreeMap<EntityId, Entity> {
    entities.iter().map(|e| (e.id, e.clone())).collect()
}

fn check_pair(previous: &[Entity], current: &[Entity]) -> Result<(), TestCaseError> {
    let delta = compute_delta(previous, current);

    prop_assert!(delta.changed.iter().all(|c| !c.is_empty()));

    let rebuilt = apply_delta(previous, &delta);
    prop_assert_eq!(rebuilt.len(), current.len());
    prop_assert_eq!(by_id(&rebuilt), by_id(current));

    let mut removed = delta.removed.clone();
    let mut added_back: Vec<EntityId> = compute_delta(current, previous)
        .added
        .iter()
        .map(|e| e.id)
        .collect();
    removed.sort_unstable();
    added_back.sort_unstable();
    prop_assert_eq!(removed, added_back);
    Ok(())
}

proptest! {
    #[test]
    fn when_snapshot_is_compared_with_itself_then_delta_is_empty(entities in snapshot()) {
        prop_assert!(compute_delta(&entities, &entities).is_empty());
    }

    #[test]
    fn when_snapshots_are_unrelated_then_delta_rebuilds_current(
        previous in snapshot(),
        current in snapshot(),
    ) {
        check_pair(&previous, &current)?;
    }

    #[test]
    fn when_snapshot_evolves_then_delta_rebuilds_current((previous, current) in related_pair()) {
        check_pair(&previous, &current)?;
    }
}
