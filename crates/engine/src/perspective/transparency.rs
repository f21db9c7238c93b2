use std::collections::HashMap;

use tracing::debug;

use crate::config::PerspectiveSettings;
use crate::ecs::{EntityId, EntityPosition, EntityTable};
use crate::geometry::{ceil_to_i32, floor_to_i32, LineIndex, Vec3};
use crate::sprites::{SpriteCatalog, TileFootprint};

use super::line_manager::PerspectiveLineManager;
use super::overhead_graph::OverheadBlockGraphManager;
use super::union_find::ComponentId;

/// One lattice cell touched by the player's footprint and its share of the footprint area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootprintCell {
    pub cell: LineIndex,
    pub weight: f32,
}

/// Frame-scoped fading of overhead geometry that would hide the player.
///
/// All state is rebuilt by [`OverheadTransparency::begin_frame`]; queries before the
/// first call, or on frames without a usable player, report full opacity.
#[derive(Debug)]
pub struct OverheadTransparency {
    settings: PerspectiveSettings,
    active: bool,
    player_id: Option<EntityId>,
    player_position: Vec3,
    z0: i32,
    z1: i32,
    interpolating: bool,
    interpolation_weight: f32,
    minimum_z: i32,
    footprint: Vec<FootprintCell>,
    overlap_cache: HashMap<(i32, ComponentId), f32>,
}

impl OverheadTransparency {
    pub fn new(settings: PerspectiveSettings) -> Self {
        Self {
            settings,
            active: false,
            player_id: None,
            player_position: Vec3::ZERO,
            z0: 0,
            z1: 0,
            interpolating: false,
            interpolation_weight: 0.0,
            minimum_z: 0,
            footprint: Vec::new(),
            overlap_cache: HashMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn player_id(&self) -> Option<EntityId> {
        self.player_id
    }

    pub fn player_position(&self) -> Vec3 {
        self.player_position
    }

    pub fn z_layers(&self) -> (i32, i32) {
        (self.z0, self.z1)
    }

    pub fn is_interpolating(&self) -> bool {
        self.interpolating
    }

    pub fn interpolation_weight(&self) -> f32 {
        self.interpolation_weight
    }

    pub fn minimum_z(&self) -> i32 {
        self.minimum_z
    }

    pub fn footprint(&self) -> &[FootprintCell] {
        &self.footprint
    }

    pub fn cached_overlap(&self, layer: i32, component: ComponentId) -> Option<f32> {
        self.overlap_cache.get(&(layer, component)).copied()
    }

    pub fn begin_frame(
        &mut self,
        time_since_tick: f32,
        entities: &EntityTable,
        lines: &PerspectiveLineManager,
        graphs: &OverheadBlockGraphManager,
        sprites: &SpriteCatalog,
    ) {
        self.reset();

        let Some(player_id) = entities.player() else {
            debug!("overhead_transparency_disabled_no_player");
            return;
        };
        let Some(kinematics) = entities.kinematics(player_id) else {
            debug!(
                player = player_id.0,
                "overhead_transparency_disabled_no_kinematics"
            );
            return;
        };
        let position = kinematics.interpolated_position(time_since_tick);
        if !position.is_finite() {
            debug!(player = player_id.0, "overhead_transparency_disabled_bad_position");
            return;
        }

        let z0 = floor_to_i32(position.z);
        let z1 = ceil_to_i32(position.z);
        let fraction = position.z - z0 as f32;
        let mut interpolating = z1 > z0 && fraction > self.settings.interpolation_threshold;

        let Some(graph0) = graphs.try_get_graph_for_z(z0) else {
            debug!(player = player_id.0, z0, "overhead_transparency_disabled_no_graph");
            return;
        };
        let graph1 = if interpolating {
            graphs.try_get_graph_for_z(z1)
        } else {
            None
        };
        if graph1.is_none() {
            interpolating = false;
        }

        let footprint = entities
            .sprite(player_id)
            .and_then(|key| sprites.tile_footprint(key))
            .unwrap_or(TileFootprint {
                width: self.settings.default_player_footprint.width,
                height: self.settings.default_player_footprint.height,
            });
        determine_player_overlaps(position, footprint, &mut self.footprint);
        self.minimum_z = select_minimum_z(
            lines,
            position,
            z0,
            self.settings.overhead_search_radius as i32,
        );

        let layers = std::iter::once((z0, graph0)).chain(graph1.map(|graph| (z1, graph)));
        for (layer, graph) in layers {
            for cell in &self.footprint {
                if let Some(component) = graph.find(cell.cell) {
                    *self.overlap_cache.entry((layer, component)).or_insert(0.0) += cell.weight;
                }
            }
        }

        self.active = true;
        self.player_id = Some(player_id);
        self.player_position = position;
        self.z0 = z0;
        self.z1 = z1;
        self.interpolating = interpolating;
        self.interpolation_weight = if interpolating { fraction } else { 0.0 };
    }

    /// Opacity multiplier in `[0, 1]` for the current frame.
    pub fn get_opacity_for_entity(
        &self,
        entity_id: EntityId,
        entities: &EntityTable,
        graphs: &OverheadBlockGraphManager,
    ) -> f32 {
        if !self.active || self.player_id == Some(entity_id) {
            return 1.0;
        }
        let Some(position) = entities.position(entity_id) else {
            return 1.0;
        };
        let (z_floor, lattice) = match position {
            EntityPosition::Block(block) => (block.z, block.line_index()),
            EntityPosition::NonBlock(kinematics) => {
                let z_floor = floor_to_i32(kinematics.position.z);
                if z_floor == self.z0 {
                    return 1.0;
                }
                (z_floor, LineIndex::of_world(kinematics.position))
            }
        };
        if z_floor < self.minimum_z {
            return 1.0;
        }

        let opacity0 = self.layer_opacity(self.z0, lattice, graphs);
        let opacity = if self.interpolating {
            let opacity1 = self.layer_opacity(self.z1, lattice, graphs);
            opacity0 + (opacity1 - opacity0) * self.interpolation_weight
        } else {
            opacity0
        };
        opacity.clamp(0.0, 1.0)
    }

    fn layer_opacity(
        &self,
        layer: i32,
        lattice: LineIndex,
        graphs: &OverheadBlockGraphManager,
    ) -> f32 {
        let Some(component) = graphs
            .try_get_graph_for_z(layer)
            .and_then(|graph| graph.find(lattice))
        else {
            return 1.0;
        };
        1.0 - self.cached_overlap(layer, component).unwrap_or(0.0)
    }

    fn reset(&mut self) {
        self.active = false;
        self.player_id = None;
        self.interpolating = false;
        self.interpolation_weight = 0.0;
        self.footprint.clear();
        self.overlap_cache.clear();
    }
}

/// Lattice cells under a footprint centred on the player's x and rising from the
/// player's projected `y + z`, weighted by covered area and normalised to sum to 1.
pub fn determine_player_overlaps(
    position: Vec3,
    footprint: TileFootprint,
    out: &mut Vec<FootprintCell>,
) {
    out.clear();
    let width = footprint.width.max(0.0);
    let height = footprint.height.max(0.0);
    if width <= 0.0 || height <= 0.0 {
        return;
    }
    let left = position.x - width * 0.5;
    let right = left + width;
    let bottom = position.projected_yz();
    let top = bottom + height;

    let mut total = 0.0;
    for yz in floor_to_i32(bottom)..ceil_to_i32(top) {
        let cover_yz = top.min(yz as f32 + 1.0) - bottom.max(yz as f32);
        if cover_yz <= 0.0 {
            continue;
        }
        for x in floor_to_i32(left)..ceil_to_i32(right) {
            let cover_x = right.min(x as f32 + 1.0) - left.max(x as f32);
            if cover_x <= 0.0 {
                continue;
            }
            let weight = cover_x * cover_yz;
            total += weight;
            out.push(FootprintCell {
                cell: LineIndex::new(x, yz),
                weight,
            });
        }
    }
    if total > 0.0 {
        for cell in out.iter_mut() {
            cell.weight /= total;
        }
    }
}

/// Lowest z-floor above the player from which overhead geometry may fade.
///
/// Every line within `radius` of the player's line reports its lowest block-bearing
/// z-floor above `z0`; the highest of those keeps doorway lintels and nearby wall tops
/// opaque. The result never exceeds what sits on the player's own line.
pub fn select_minimum_z(
    lines: &PerspectiveLineManager,
    position: Vec3,
    z0: i32,
    radius: i32,
) -> i32 {
    let center = LineIndex::of_world(position);
    let mut max_above: Option<i32> = None;
    for dyz in -radius..=radius {
        for dx in -radius..=radius {
            let index =
                LineIndex::new(center.x.saturating_add(dx), center.yz.saturating_add(dyz));
            if let Some(z) = lowest_blocking_floor_above(lines, index, z0) {
                max_above = Some(max_above.map_or(z, |current| current.max(z)));
            }
        }
    }
    let direct_above = lowest_blocking_floor_above(lines, center, z0);
    // The window always includes the player's own line, so a direct hit implies a
    // window hit.
    match (max_above, direct_above) {
        (Some(max_above), Some(direct_above)) => max_above.min(direct_above),
        (Some(max_above), None) => max_above,
        (None, _) => z0.saturating_add(1),
    }
}

fn lowest_blocking_floor_above(
    lines: &PerspectiveLineManager,
    index: LineIndex,
    z0: i32,
) -> Option<i32> {
    let line = lines.line(index)?;
    line.z_floors()
        .rev()
        .find(|(z, entities)| *z > z0 && entities.iter().any(|info| info.kind.is_block_face()))
        .map(|(z, _)| z)
}
