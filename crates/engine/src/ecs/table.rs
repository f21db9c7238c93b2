use std::collections::HashMap;

use tracing::warn;

use crate::geometry::GridPosition;

use super::events::{EntityEvent, EntityId, EntityPosition, Kinematics};

#[derive(Debug, Clone, PartialEq)]
pub struct EntityDesc {
    pub position: EntityPosition,
    pub sprite: Option<String>,
    pub is_item: bool,
}

impl EntityDesc {
    pub fn block(position: GridPosition) -> Self {
        Self {
            position: EntityPosition::Block(position),
            sprite: None,
            is_item: false,
        }
    }

    pub fn non_block(kinematics: Kinematics) -> Self {
        Self {
            position: EntityPosition::NonBlock(kinematics),
            sprite: None,
            is_item: false,
        }
    }

    pub fn with_sprite(mut self, sprite: impl Into<String>) -> Self {
        self.sprite = Some(sprite.into());
        self
    }

    pub fn as_item(mut self) -> Self {
        self.is_item = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub id: EntityId,
    pub position: EntityPosition,
    pub sprite: Option<String>,
    pub is_item: bool,
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PendingChange {
    Spawn { record: EntityRecord, is_load: bool },
    SetKinematics { id: EntityId, kinematics: Kinematics },
    SetBlockPosition { id: EntityId, position: GridPosition },
    Despawn { id: EntityId, is_unload: bool },
}

/// Keyed entity store. Mutations are queued and only become visible, together with
/// their change events, when [`EntityTable::apply_pending`] runs.
#[derive(Debug, Default)]
pub struct EntityTable {
    allocator: EntityIdAllocator,
    records: HashMap<EntityId, EntityRecord>,
    pending: Vec<PendingChange>,
    events: Vec<EntityEvent>,
    player: Option<EntityId>,
}

impl EntityTable {
    pub fn spawn(&mut self, desc: EntityDesc) -> EntityId {
        self.spawn_internal(desc, false)
    }

    /// Spawns an entity that arrives with a streamed-in world segment.
    pub fn load(&mut self, desc: EntityDesc) -> EntityId {
        self.spawn_internal(desc, true)
    }

    fn spawn_internal(&mut self, desc: EntityDesc, is_load: bool) -> EntityId {
        let id = self.allocator.allocate();
        self.pending.push(PendingChange::Spawn {
            record: EntityRecord {
                id,
                position: desc.position,
                sprite: desc.sprite,
                is_item: desc.is_item,
            },
            is_load,
        });
        id
    }

    pub fn set_kinematics(&mut self, id: EntityId, kinematics: Kinematics) {
        self.pending
            .push(PendingChange::SetKinematics { id, kinematics });
    }

    pub fn set_block_position(&mut self, id: EntityId, position: GridPosition) {
        self.pending
            .push(PendingChange::SetBlockPosition { id, position });
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        self.despawn_internal(id, false)
    }

    pub fn unload(&mut self, id: EntityId) -> bool {
        self.despawn_internal(id, true)
    }

    fn despawn_internal(&mut self, id: EntityId, is_unload: bool) -> bool {
        let exists_now = self.records.contains_key(&id);
        let pending_spawn = self.pending.iter().any(
            |change| matches!(change, PendingChange::Spawn { record, .. } if record.id == id),
        );
        if !exists_now && !pending_spawn {
            return false;
        }
        self.pending.push(PendingChange::Despawn { id, is_unload });
        true
    }

    /// Applies queued mutations in submission order and records one event per change.
    pub fn apply_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);
        for change in pending {
            match change {
                PendingChange::Spawn { record, is_load } => {
                    let id = record.id;
                    let position = record.position;
                    self.records.insert(id, record);
                    self.events.push(EntityEvent::Added {
                        id,
                        is_load,
                        position,
                    });
                }
                PendingChange::SetKinematics { id, kinematics } => {
                    let Some(record) = self.records.get_mut(&id) else {
                        warn!(entity = id.0, "kinematics_update_for_unknown_entity");
                        continue;
                    };
                    if record.position.is_block() {
                        warn!(entity = id.0, "kinematics_update_for_block_entity");
                        continue;
                    }
                    record.position = EntityPosition::NonBlock(kinematics);
                    self.events
                        .push(EntityEvent::KinematicsModified { id, kinematics });
                }
                PendingChange::SetBlockPosition { id, position } => {
                    let Some(record) = self.records.get_mut(&id) else {
                        warn!(entity = id.0, "block_position_update_for_unknown_entity");
                        continue;
                    };
                    if !record.position.is_block() {
                        warn!(entity = id.0, "block_position_update_for_non_block_entity");
                        continue;
                    }
                    record.position = EntityPosition::Block(position);
                    self.events
                        .push(EntityEvent::BlockPositionModified { id, position });
                }
                PendingChange::Despawn { id, is_unload } => {
                    // Duplicate despawns in one batch collapse into the first.
                    if self.records.remove(&id).is_none() {
                        continue;
                    }
                    if self.player == Some(id) {
                        self.player = None;
                    }
                    self.events.push(EntityEvent::Removed { id, is_unload });
                }
            }
        }
    }

    pub fn drain_events_into(&mut self, out: &mut Vec<EntityEvent>) {
        out.append(&mut self.events);
    }

    pub fn set_player(&mut self, player: Option<EntityId>) {
        self.player = player;
    }

    pub fn player(&self) -> Option<EntityId> {
        self.player
    }

    pub fn entity_count(&self) -> usize {
        self.records.len()
    }

    pub fn get(&self, id: EntityId) -> Option<&EntityRecord> {
        self.records.get(&id)
    }

    pub fn records(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.values()
    }

    pub fn position(&self, id: EntityId) -> Option<EntityPosition> {
        self.records.get(&id).map(|record| record.position)
    }

    pub fn kinematics(&self, id: EntityId) -> Option<Kinematics> {
        match self.records.get(&id)?.position {
            EntityPosition::NonBlock(kinematics) => Some(kinematics),
            EntityPosition::Block(_) => None,
        }
    }

    pub fn block_position(&self, id: EntityId) -> Option<GridPosition> {
        match self.records.get(&id)?.position {
            EntityPosition::Block(position) => Some(position),
            EntityPosition::NonBlock(_) => None,
        }
    }

    pub fn sprite(&self, id: EntityId) -> Option<&str> {
        self.records.get(&id)?.sprite.as_deref()
    }

    pub fn is_item(&self, id: EntityId) -> bool {
        self.records
            .get(&id)
            .map(|record| record.is_item)
            .unwrap_or(false)
    }
}
