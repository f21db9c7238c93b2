use crate::ecs::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    NonBlock,
    BlockFrontFace,
    BlockTopFace,
}

impl EntityKind {
    pub fn is_block_face(self) -> bool {
        matches!(self, Self::BlockFrontFace | Self::BlockTopFace)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityInfo {
    pub entity_id: EntityId,
    pub kind: EntityKind,
    pub z: f32,
    /// Whether the sprite's visual origin lies on this line.
    pub origin_on_line: bool,
}

/// Entities sharing one z-floor of a perspective line, highest exact z first.
#[derive(Debug, Default)]
pub struct EntityList {
    entities: Vec<EntityInfo>,
}

impl EntityList {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityInfo> {
        self.entities.iter()
    }

    pub fn as_slice(&self) -> &[EntityInfo] {
        &self.entities
    }

    pub fn contains(&self, entity_id: EntityId) -> bool {
        self.entities.iter().any(|info| info.entity_id == entity_id)
    }

    /// Ties keep insertion order.
    pub(crate) fn insert(&mut self, info: EntityInfo) {
        let index = self.entities.partition_point(|existing| existing.z >= info.z);
        self.entities.insert(index, info);
    }

    pub(crate) fn remove(&mut self, entity_id: EntityId) -> Option<EntityInfo> {
        let index = self
            .entities
            .iter()
            .position(|info| info.entity_id == entity_id)?;
        Some(self.entities.remove(index))
    }

    fn reset(&mut self) {
        self.entities.clear();
    }
}

/// Free list of emptied buckets so entities bouncing between z-floors do not churn the heap.
#[derive(Debug)]
pub struct EntityListPool {
    free: Vec<EntityList>,
    capacity: usize,
}

impl EntityListPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Vec::new(),
            capacity,
        }
    }

    pub fn take(&mut self) -> EntityList {
        self.free.pop().unwrap_or_default()
    }

    pub fn give_back(&mut self, mut list: EntityList) {
        if self.free.len() >= self.capacity {
            return;
        }
        list.reset();
        self.free.push(list);
    }

    pub fn pooled_count(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: u64, z: f32) -> EntityInfo {
        EntityInfo {
            entity_id: EntityId(id),
            kind: EntityKind::NonBlock,
            z,
            origin_on_line: true,
        }
    }

    #[test]
    fn insert_keeps_descending_exact_z() {
        let mut list = EntityList::default();
        list.insert(info(1, 2.1));
        list.insert(info(2, 2.9));
        list.insert(info(3, 2.5));
        list.insert(info(4, 2.0));

        let order: Vec<u64> = list.iter().map(|info| info.entity_id.0).collect();
        assert_eq!(order, vec![2, 3, 1, 4]);
    }

    #[test]
    fn equal_z_keeps_insertion_order() {
        let mut list = EntityList::default();
        list.insert(info(1, 3.0));
        list.insert(info(2, 3.0));
        list.insert(info(3, 3.0));

        let order: Vec<u64> = list.iter().map(|info| info.entity_id.0).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn remove_returns_record_and_missing_is_none() {
        let mut list = EntityList::default();
        list.insert(info(1, 0.5));
        assert_eq!(list.remove(EntityId(1)).map(|info| info.z), Some(0.5));
        assert!(list.remove(EntityId(1)).is_none());
        assert!(list.is_empty());
    }

    #[test]
    fn pool_recycles_cleared_lists_up_to_capacity() {
        let mut pool = EntityListPool::new(1);
        let mut first = pool.take();
        first.insert(info(9, 1.0));
        pool.give_back(first);
        pool.give_back(EntityList::default());
        assert_eq!(pool.pooled_count(), 1);

        let reused = pool.take();
        assert!(reused.is_empty());
        assert_eq!(pool.pooled_count(), 0);
    }
}
