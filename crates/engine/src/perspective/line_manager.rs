use std::collections::HashMap;

use tracing::{debug, error, warn};

use crate::ecs::{EntityId, EntityPosition, Kinematics};
use crate::geometry::{floor_to_i32, GridPosition, LineIndex, Vec3};
use crate::world::WorldSegmentResolver;

use super::entity_list::{EntityInfo, EntityKind, EntityListPool};
use super::line::PerspectiveLine;

/// Authoritative map from perspective line to per-z-floor entity membership.
///
/// Kept in sync with entity events (add / move / remove) and with world-segment
/// subscriptions, which reference-count the lines they cover.
#[derive(Debug)]
pub struct PerspectiveLineManager {
    resolver: WorldSegmentResolver,
    lines: HashMap<LineIndex, PerspectiveLine>,
    lines_by_entity: HashMap<EntityId, Vec<LineIndex>>,
    z_depth_by_entity: HashMap<EntityId, f32>,
    pool: EntityListPool,
}

impl PerspectiveLineManager {
    pub fn new(resolver: WorldSegmentResolver, pool_capacity: usize) -> Self {
        Self {
            resolver,
            lines: HashMap::new(),
            lines_by_entity: HashMap::new(),
            z_depth_by_entity: HashMap::new(),
            pool: EntityListPool::new(pool_capacity),
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn tracked_entity_count(&self) -> usize {
        self.lines_by_entity.len()
    }

    pub fn pooled_list_count(&self) -> usize {
        self.pool.pooled_count()
    }

    pub fn lines_for_entity(&self, entity_id: EntityId) -> Option<&[LineIndex]> {
        self.lines_by_entity.get(&entity_id).map(Vec::as_slice)
    }

    pub fn z_depth(&self, entity_id: EntityId) -> Option<f32> {
        self.z_depth_by_entity.get(&entity_id).copied()
    }

    pub fn line(&self, index: LineIndex) -> Option<&PerspectiveLine> {
        self.lines.get(&index)
    }

    pub fn try_get_perspective_line(
        &self,
        block_position: GridPosition,
    ) -> Option<&PerspectiveLine> {
        self.lines.get(&block_position.line_index())
    }

    pub fn on_world_segment_subscribe(&mut self, segment_index: GridPosition) {
        let indices = self.lines_for_segment(segment_index);
        for index in &indices {
            self.lines.entry(*index).or_default().add_reference();
        }
        debug!(
            segment_x = segment_index.x,
            segment_y = segment_index.y,
            segment_z = segment_index.z,
            lines = indices.len(),
            "perspective_segment_subscribed"
        );
    }

    pub fn on_world_segment_unsubscribe(&mut self, segment_index: GridPosition) {
        let mut missing = 0usize;
        for index in self.lines_for_segment(segment_index) {
            let Some(line) = self.lines.get_mut(&index) else {
                missing += 1;
                continue;
            };
            if line.release_reference() == 0 {
                if let Some(line) = self.lines.remove(&index) {
                    line.release_into(&mut self.pool);
                }
            }
        }
        if missing > 0 {
            warn!(
                segment_x = segment_index.x,
                segment_y = segment_index.y,
                segment_z = segment_index.z,
                missing,
                "perspective_unsubscribe_for_missing_lines"
            );
        }
    }

    /// Lines crossing a segment, enumerated from its two camera-facing faces: the front
    /// faces of the front row and the top faces of the top layer. The block on the
    /// shared edge contributes its front face to the first set and its top face to the
    /// second, so no line is counted twice.
    pub(crate) fn lines_for_segment(&self, segment_index: GridPosition) -> Vec<LineIndex> {
        let range = self.resolver.block_range(segment_index);
        let front_y = range.min.y;
        let top_z = range.max.z - 1;
        let depth = (range.max.z - range.min.z) + (range.max.y - range.min.y);
        let mut indices = Vec::with_capacity((range.max.x - range.min.x) as usize * depth as usize);
        for x in range.min.x..range.max.x {
            for z in range.min.z..range.max.z {
                indices.push(front_face_line(GridPosition::new(x, front_y, z)));
            }
            for y in range.min.y..range.max.y {
                indices.push(GridPosition::new(x, y, top_z).line_index());
            }
        }
        indices
    }

    pub fn on_entity_added(&mut self, entity_id: EntityId, position: EntityPosition) {
        match position {
            EntityPosition::Block(block) => self.add_block_entity(entity_id, block),
            EntityPosition::NonBlock(kinematics) => {
                self.add_non_block_entity(entity_id, kinematics.position)
            }
        }
    }

    pub fn on_kinematics_modified(&mut self, entity_id: EntityId, kinematics: Kinematics) {
        if !self.z_depth_by_entity.contains_key(&entity_id) {
            debug!(entity = entity_id.0, "perspective_untracked_entity_moved");
            self.add_non_block_entity(entity_id, kinematics.position);
            return;
        }
        self.non_block_entity_moved(entity_id, kinematics.position);
    }

    pub fn on_block_position_modified(&mut self, entity_id: EntityId, position: GridPosition) {
        if self.lines_by_entity.contains_key(&entity_id) {
            self.remove_entity(entity_id);
        }
        self.add_block_entity(entity_id, position);
    }

    pub fn on_entity_removed(&mut self, entity_id: EntityId) {
        if !self.lines_by_entity.contains_key(&entity_id) {
            warn!(entity = entity_id.0, "perspective_remove_untracked_entity");
            return;
        }
        self.remove_entity(entity_id);
    }

    /// Highest entity on the line under `point` within the z-floor window `[min_z, max_z]`.
    ///
    /// Only the first non-empty z-floor is considered. A non-block entity there wins
    /// outright; otherwise a top face beats a front face.
    pub fn try_get_highest_entity_at_point(
        &self,
        point: Vec3,
        min_z: i32,
        max_z: i32,
    ) -> Option<EntityId> {
        let line = self.lines.get(&LineIndex::of_world(point))?;
        let (_, entities) = line.z_floors_in_range(min_z, max_z).next()?;

        let mut top_face = None;
        let mut front_face = None;
        for info in entities.iter() {
            match info.kind {
                EntityKind::NonBlock => return Some(info.entity_id),
                EntityKind::BlockTopFace => {
                    top_face.get_or_insert(info.entity_id);
                }
                EntityKind::BlockFrontFace => {
                    front_face.get_or_insert(info.entity_id);
                }
            }
        }
        top_face.or(front_face)
    }

    fn add_block_entity(&mut self, entity_id: EntityId, position: GridPosition) {
        if self.lines_by_entity.contains_key(&entity_id) {
            warn!(entity = entity_id.0, "perspective_block_added_twice");
            self.remove_entity(entity_id);
        }
        let z = position.z as f32;
        let top_line = position.line_index();
        let front_line = front_face_line(position);
        self.add_entity_to_line(
            top_line,
            EntityInfo {
                entity_id,
                kind: EntityKind::BlockTopFace,
                z,
                origin_on_line: true,
            },
        );
        self.add_entity_to_line(
            front_line,
            EntityInfo {
                entity_id,
                kind: EntityKind::BlockFrontFace,
                z,
                origin_on_line: false,
            },
        );
        self.lines_by_entity
            .insert(entity_id, vec![top_line, front_line]);
        self.z_depth_by_entity.insert(entity_id, z);
    }

    fn add_non_block_entity(&mut self, entity_id: EntityId, position: Vec3) {
        if self.lines_by_entity.contains_key(&entity_id) {
            warn!(entity = entity_id.0, "perspective_entity_added_twice");
            self.remove_entity(entity_id);
        }
        let line_index = LineIndex::of_world(position);
        self.add_entity_to_line(line_index, non_block_info(entity_id, position.z));
        self.lines_by_entity.insert(entity_id, vec![line_index]);
        self.z_depth_by_entity.insert(entity_id, position.z);
    }

    /// Non-block entities occupy exactly one line. A line change and a z-floor change
    /// are handled independently; an exact-z change within the same bucket only
    /// reorders the bucket.
    fn non_block_entity_moved(&mut self, entity_id: EntityId, position: Vec3) {
        let Some(old_z) = self.z_depth_by_entity.get(&entity_id).copied() else {
            return;
        };
        let Some(old_line) = self
            .lines_by_entity
            .get(&entity_id)
            .and_then(|lines| lines.first().copied())
        else {
            error!(entity = entity_id.0, "perspective_entity_missing_line_record");
            return;
        };

        let new_line = LineIndex::of_world(position);
        let new_z = position.z;
        let line_changed = new_line != old_line;
        let floor_changed = floor_to_i32(old_z) != floor_to_i32(new_z);

        if !line_changed && !floor_changed && old_z == new_z {
            return;
        }

        self.remove_entity_from_line(old_line, entity_id, old_z);
        self.add_entity_to_line(new_line, non_block_info(entity_id, new_z));
        if line_changed {
            self.lines_by_entity.insert(entity_id, vec![new_line]);
        }
        self.z_depth_by_entity.insert(entity_id, new_z);
    }

    fn remove_entity(&mut self, entity_id: EntityId) {
        let lines = self.lines_by_entity.remove(&entity_id).unwrap_or_default();
        let Some(z) = self.z_depth_by_entity.remove(&entity_id) else {
            error!(entity = entity_id.0, "perspective_entity_missing_z_depth");
            return;
        };
        for line_index in lines {
            self.remove_entity_from_line(line_index, entity_id, z);
        }
    }

    fn add_entity_to_line(&mut self, line_index: LineIndex, info: EntityInfo) {
        if !self.lines.contains_key(&line_index) {
            warn!(
                line_x = line_index.x,
                line_yz = line_index.yz,
                entity = info.entity_id.0,
                "perspective_line_created_without_subscription"
            );
        }
        let line = self.lines.entry(line_index).or_default();
        line.insert(floor_to_i32(info.z), info, &mut self.pool);
    }

    fn remove_entity_from_line(&mut self, line_index: LineIndex, entity_id: EntityId, z: f32) {
        let Some(line) = self.lines.get_mut(&line_index) else {
            warn!(
                line_x = line_index.x,
                line_yz = line_index.yz,
                entity = entity_id.0,
                "perspective_remove_from_missing_line"
            );
            return;
        };
        if line.remove(floor_to_i32(z), entity_id, &mut self.pool).is_none() {
            warn!(
                line_x = line_index.x,
                line_yz = line_index.yz,
                entity = entity_id.0,
                z,
                "perspective_entity_missing_from_z_floor"
            );
            return;
        }
        // Lines created lazily (no subscription) die with their last entity.
        if line.reference_count() == 0 && line.is_empty() {
            if let Some(line) = self.lines.remove(&line_index) {
                line.release_into(&mut self.pool);
            }
        }
    }
}

fn front_face_line(position: GridPosition) -> LineIndex {
    position.offset(0, -1, 0).line_index()
}

fn non_block_info(entity_id: EntityId, z: f32) -> EntityInfo {
    EntityInfo {
        entity_id,
        kind: EntityKind::NonBlock,
        z,
        origin_on_line: true,
    }
}
