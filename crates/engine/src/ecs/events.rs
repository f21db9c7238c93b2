use crate::geometry::{GridPosition, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Kinematics {
    pub position: Vec3,
    pub velocity: Vec3,
}

impl Kinematics {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    /// Position extrapolated `time_since_tick` seconds past the last tick.
    pub fn interpolated_position(&self, time_since_tick: f32) -> Vec3 {
        self.position + self.velocity * time_since_tick
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityPosition {
    Block(GridPosition),
    NonBlock(Kinematics),
}

impl EntityPosition {
    pub fn is_block(&self) -> bool {
        matches!(self, Self::Block(_))
    }
}

/// Change notifications emitted by the entity table during the apply-updates phase.
///
/// `is_load` / `is_unload` distinguish streaming (world segments coming and going) from
/// gameplay spawns and despawns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityEvent {
    Added {
        id: EntityId,
        is_load: bool,
        position: EntityPosition,
    },
    KinematicsModified {
        id: EntityId,
        kinematics: Kinematics,
    },
    BlockPositionModified {
        id: EntityId,
        position: GridPosition,
    },
    Removed {
        id: EntityId,
        is_unload: bool,
    },
}
