// Network-visible world objects shared by every lobby.

pub type EntityId = u64;

/// Position or velocity triple.
pub type Vec3 = [f64; 3];

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    // Short kind tag, e.g. "asteroid".
    pub kind: String,
    pub position: Vec3,
    pub velocity: Vec3,
    // None means the entity cannot be damaged.
    pub health: Option<i32>,
}

impl Entity {
    pub fn new(id: EntityId, kind: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            position: [0.0; 3],
            velocity: [0.0; 3],
            health: None,
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_health(mut self, health: i32) -> Self {
        self.health = Some(health);
        self
    }
}

/// Fields of an entity that changed between two snapshots.
///
/// Absent fields are unchanged and must be omitted from the wire payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialEntity {
    pub id: EntityId,
    pub position: Option<Vec3>,
    pub velocity: Option<Vec3>,
    pub health: Option<Option<i32>>,
}

impl PartialEntity {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            position: None,
            velocity: None,
            health: None,
        }
    }

    /// True when nothing besides the identity is set.
    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.velocity.is_none() && self.health.is_none()
    }

    /// Overwrites the fields present in this record onto `entity`.
    pub fn apply_to(&self, entity: &mut Entity) {
        if let Some(position) = self.position {
            entity.position = position;
        }
        if let Some(velocity) = self.velocity {
            entity.velocity = velocity;
        }
        if let Some(health) = self.health {
            entity.health = health;
        }
    }
}
