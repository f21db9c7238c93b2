use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::ecs::EntityId;
use crate::geometry::{GridPosition, LineIndex};

use super::union_find::UnionFind2dGrid;

/// Connectivity graphs for one generation, keyed by the z-layer just below each block
/// height. Any other layer sees the same blocks as the next keyed layer up.
#[derive(Debug, Default)]
struct GraphSet {
    layers: BTreeMap<i32, UnionFind2dGrid>,
}

impl GraphSet {
    fn get(&self, z: i32) -> Option<&UnionFind2dGrid> {
        self.layers.range(z..).next().map(|(_, graph)| graph)
    }
}

/// Per z-layer connected components of the block geometry overhead.
///
/// The graph for layer `L` covers the top and front faces of every block with
/// `z > L`. Rebuilds go into the back buffer on tick and become visible at the next
/// [`OverheadBlockGraphManager::begin_frame`].
#[derive(Debug, Default)]
pub struct OverheadBlockGraphManager {
    blocks: HashMap<EntityId, GridPosition>,
    buffers: [GraphSet; 2],
    active: usize,
    dirty: bool,
    update_pending: bool,
}

impl OverheadBlockGraphManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn layer_count(&self) -> usize {
        self.buffers[self.active].layers.len()
    }

    pub fn layer_range(&self) -> Option<(i32, i32)> {
        let layers = &self.buffers[self.active].layers;
        let (lowest, _) = layers.first_key_value()?;
        let (highest, _) = layers.last_key_value()?;
        Some((*lowest, *highest))
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn on_block_added(&mut self, entity_id: EntityId, position: GridPosition) {
        if self.blocks.insert(entity_id, position) != Some(position) {
            self.dirty = true;
        }
    }

    pub fn on_block_moved(&mut self, entity_id: EntityId, position: GridPosition) {
        self.on_block_added(entity_id, position);
    }

    pub fn on_block_removed(&mut self, entity_id: EntityId) {
        if self.blocks.remove(&entity_id).is_some() {
            self.dirty = true;
        }
    }

    /// Rebuilds the back buffer when blocks changed since the last rebuild.
    pub fn on_tick(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        let back = 1 - self.active;
        self.buffers[back] = self.build_graphs();
        self.update_pending = true;
        debug!(
            blocks = self.blocks.len(),
            layers = self.buffers[back].layers.len(),
            "overhead_graphs_rebuilt"
        );
    }

    /// Makes the latest rebuild visible. Returns whether the buffers flipped.
    pub fn begin_frame(&mut self) -> bool {
        if !self.update_pending {
            return false;
        }
        self.update_pending = false;
        self.active = 1 - self.active;
        debug!(layers = self.layer_count(), "overhead_graphs_flipped");
        true
    }

    /// Graph for layer `z`. Layers below the lowest built one see everything, so they
    /// share the lowest graph; layers at or above the highest block have none.
    pub fn try_get_graph_for_z(&self, z: i32) -> Option<&UnionFind2dGrid> {
        self.buffers[self.active].get(z)
    }

    fn build_graphs(&self) -> GraphSet {
        let mut by_z: BTreeMap<i32, Vec<LineIndex>> = BTreeMap::new();
        for position in self.blocks.values() {
            let cells = by_z.entry(position.z).or_default();
            cells.push(position.line_index());
            cells.push(position.offset(0, -1, 0).line_index());
        }

        let mut set = GraphSet::default();
        let mut grid = UnionFind2dGrid::new();
        // Walk from the top down so each layer only adds the blocks just above it.
        for (block_z, cells) in by_z.iter().rev() {
            grid.extend_connected(cells);
            grid.compress();
            set.layers.insert(block_z.saturating_sub(1), grid.clone());
        }
        set
    }
}
