use crate::ecs::EntityId;

use super::entity_list::{EntityInfo, EntityList, EntityListPool};

#[derive(Debug)]
struct ZFloor {
    z: i32,
    entities: EntityList,
}

/// One perspective line: its z-floor buckets ordered from highest to lowest, plus the
/// number of world-segment subscriptions that keep it alive.
#[derive(Debug, Default)]
pub struct PerspectiveLine {
    reference_count: u32,
    z_floors: Vec<ZFloor>,
}

impl PerspectiveLine {
    pub fn reference_count(&self) -> u32 {
        self.reference_count
    }

    pub fn is_empty(&self) -> bool {
        self.z_floors.is_empty()
    }

    /// Non-empty z-floors, highest first.
    pub fn z_floors(&self) -> impl DoubleEndedIterator<Item = (i32, &EntityList)> {
        self.z_floors.iter().map(|floor| (floor.z, &floor.entities))
    }

    /// Non-empty z-floors within `[min_z, max_z]`, highest first.
    pub fn z_floors_in_range(
        &self,
        min_z: i32,
        max_z: i32,
    ) -> impl Iterator<Item = (i32, &EntityList)> {
        let start = self.z_floors.partition_point(|floor| floor.z > max_z);
        self.z_floors[start..]
            .iter()
            .take_while(move |floor| floor.z >= min_z)
            .map(|floor| (floor.z, &floor.entities))
    }

    pub fn top_z_floor(&self) -> Option<(i32, &EntityList)> {
        self.z_floors().next()
    }

    pub fn z_floor(&self, z: i32) -> Option<&EntityList> {
        let index = self.find(z).ok()?;
        Some(&self.z_floors[index].entities)
    }

    pub(crate) fn add_reference(&mut self) {
        self.reference_count = self.reference_count.saturating_add(1);
    }

    /// Returns the remaining count.
    pub(crate) fn release_reference(&mut self) -> u32 {
        self.reference_count = self.reference_count.saturating_sub(1);
        self.reference_count
    }

    pub(crate) fn insert(&mut self, z_floor: i32, info: EntityInfo, pool: &mut EntityListPool) {
        let index = match self.find(z_floor) {
            Ok(index) => index,
            Err(index) => {
                self.z_floors.insert(
                    index,
                    ZFloor {
                        z: z_floor,
                        entities: pool.take(),
                    },
                );
                index
            }
        };
        self.z_floors[index].entities.insert(info);
    }

    /// Removes the entity from `z_floor`, handing the bucket back to the pool once empty.
    pub(crate) fn remove(
        &mut self,
        z_floor: i32,
        entity_id: EntityId,
        pool: &mut EntityListPool,
    ) -> Option<EntityInfo> {
        let index = self.find(z_floor).ok()?;
        let removed = self.z_floors[index].entities.remove(entity_id)?;
        if self.z_floors[index].entities.is_empty() {
            let floor = self.z_floors.remove(index);
            pool.give_back(floor.entities);
        }
        Some(removed)
    }

    pub(crate) fn release_into(self, pool: &mut EntityListPool) {
        for floor in self.z_floors {
            pool.give_back(floor.entities);
        }
    }

    fn find(&self, z: i32) -> Result<usize, usize> {
        self.z_floors
            .binary_search_by(|probe| probe.z.cmp(&z).reverse())
    }
}
