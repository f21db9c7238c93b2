use crate::config::PerspectiveSettings;
use crate::ecs::{EntityId, EntityTable};
use crate::geometry::{floor_to_i32, LineIndex, Vec3};

use super::entity_list::EntityKind;
use super::line_manager::PerspectiveLineManager;
use super::overhead_graph::OverheadBlockGraphManager;
use super::transparency::OverheadTransparency;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockFace {
    Top,
    Front,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoveringBlock {
    pub entity_id: EntityId,
    pub face: BlockFace,
    /// Hovered point on the face, in world coordinates.
    pub position_on_block: Vec3,
}

/// Read-only perspective queries for rendering, picking and interaction code.
///
/// Borrowed for one frame from [`super::PerspectiveSystem::services`]; opacity answers
/// reflect the most recent `begin_frame`.
#[derive(Debug, Clone, Copy)]
pub struct PerspectiveServices<'a> {
    lines: &'a PerspectiveLineManager,
    transparency: &'a OverheadTransparency,
    graphs: &'a OverheadBlockGraphManager,
    entities: &'a EntityTable,
    settings: &'a PerspectiveSettings,
}

impl<'a> PerspectiveServices<'a> {
    pub(crate) fn new(
        lines: &'a PerspectiveLineManager,
        transparency: &'a OverheadTransparency,
        graphs: &'a OverheadBlockGraphManager,
        entities: &'a EntityTable,
        settings: &'a PerspectiveSettings,
    ) -> Self {
        Self {
            lines,
            transparency,
            graphs,
            entities,
            settings,
        }
    }

    pub fn lines(&self) -> &'a PerspectiveLineManager {
        self.lines
    }

    pub fn transparency(&self) -> &'a OverheadTransparency {
        self.transparency
    }

    pub fn try_get_highest_covering_entity(
        &self,
        position: Vec3,
        min_z: i32,
        max_z: i32,
    ) -> Option<EntityId> {
        self.lines
            .try_get_highest_entity_at_point(position, min_z, max_z)
    }

    /// Same as [`Self::try_get_highest_covering_entity`] with the z window spanning a
    /// viewport `viewport_height_tiles` tall centred on `position.z`.
    pub fn try_get_highest_covering_entity_in_view(
        &self,
        position: Vec3,
        viewport_height_tiles: f32,
    ) -> Option<EntityId> {
        let half = viewport_height_tiles.abs() * 0.5;
        let min_z = floor_to_i32(position.z - half);
        let max_z = floor_to_i32(position.z + half);
        self.try_get_highest_covering_entity(position, min_z, max_z)
    }

    pub fn try_get_highest_covering_entity_in_default_view(
        &self,
        position: Vec3,
    ) -> Option<EntityId> {
        self.try_get_highest_covering_entity_in_view(position, self.settings.view_height_tiles)
    }

    /// Highest fully opaque block face under `position`, walking z-floors top-down.
    /// Faded faces are skipped so the pointer reaches what the player can see.
    pub fn try_get_highest_visible_covering_block(&self, position: Vec3) -> Option<CoveringBlock> {
        let line = self.lines.line(LineIndex::of_world(position))?;
        for (_, entities) in line.z_floors() {
            let mut top = None;
            let mut front = None;
            for info in entities.iter() {
                if !info.kind.is_block_face() {
                    continue;
                }
                if self.get_opacity_for_entity(info.entity_id) < 1.0 {
                    continue;
                }
                match info.kind {
                    EntityKind::BlockTopFace => {
                        top.get_or_insert(info.entity_id);
                    }
                    EntityKind::BlockFrontFace => {
                        front.get_or_insert(info.entity_id);
                    }
                    EntityKind::NonBlock => {}
                }
            }
            let hit = top
                .map(|id| (id, BlockFace::Top))
                .or(front.map(|id| (id, BlockFace::Front)));
            if let Some((entity_id, face)) = hit {
                if let Some(covering) = self.covering_block(entity_id, face, position) {
                    return Some(covering);
                }
            }
        }
        None
    }

    pub fn get_opacity_for_entity(&self, entity_id: EntityId) -> f32 {
        self.transparency
            .get_opacity_for_entity(entity_id, self.entities, self.graphs)
    }

    /// Fills `out` with items lying on the player's line at the player's exact z.
    pub fn get_items_under_player(&self, out: &mut Vec<EntityId>) {
        out.clear();
        let Some(player) = self.entities.player() else {
            return;
        };
        let Some(kinematics) = self.entities.kinematics(player) else {
            return;
        };
        let position = kinematics.position;
        let Some(floor) = self
            .lines
            .line(LineIndex::of_world(position))
            .and_then(|line| line.z_floor(floor_to_i32(position.z)))
        else {
            return;
        };
        let tolerance = self.settings.item_z_tolerance;
        out.extend(
            floor
                .iter()
                .filter(|info| info.kind == EntityKind::NonBlock)
                .filter(|info| info.entity_id != player)
                .filter(|info| (info.z - position.z).abs() <= tolerance)
                .filter(|info| self.entities.is_item(info.entity_id))
                .map(|info| info.entity_id),
        );
    }

    /// Projects the query point along the view axis onto the chosen face.
    fn covering_block(
        &self,
        entity_id: EntityId,
        face: BlockFace,
        position: Vec3,
    ) -> Option<CoveringBlock> {
        let block = self.entities.block_position(entity_id)?;
        let projected = position.projected_yz();
        let (block_y, block_z) = (block.y as f32, block.z as f32);
        let position_on_block = match face {
            BlockFace::Top => Vec3::new(
                position.x,
                (projected - block_z).clamp(block_y, block_y + 1.0),
                block_z,
            ),
            BlockFace::Front => Vec3::new(
                position.x,
                block_y,
                (projected - block_y).clamp(block_z - 1.0, block_z),
            ),
        };
        Some(CoveringBlock {
            entity_id,
            face,
            position_on_block,
        })
    }
}
