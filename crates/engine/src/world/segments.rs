use thiserror::Error;

use crate::geometry::{floor_to_i32, GridPosition, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WorldSegmentError {
    #[error("world segment size must be positive, got {size}")]
    InvalidSegmentSize { size: u32 },
}

/// Half-open block range `[min, max)` covered by one world segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub min: GridPosition,
    pub max: GridPosition,
}

impl BlockRange {
    pub fn contains(&self, position: GridPosition) -> bool {
        position.x >= self.min.x
            && position.x < self.max.x
            && position.y >= self.min.y
            && position.y < self.max.y
            && position.z >= self.min.z
            && position.z < self.max.z
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldSegmentResolver {
    segment_size: i32,
}

impl WorldSegmentResolver {
    pub fn new(segment_size: u32) -> Result<Self, WorldSegmentError> {
        if segment_size == 0 || segment_size > i32::MAX as u32 {
            return Err(WorldSegmentError::InvalidSegmentSize { size: segment_size });
        }
        Ok(Self {
            segment_size: segment_size as i32,
        })
    }

    pub fn segment_size(&self) -> u32 {
        self.segment_size as u32
    }

    pub fn segment_index_for_position(&self, position: Vec3) -> GridPosition {
        self.segment_index_for_block(GridPosition::new(
            floor_to_i32(position.x),
            floor_to_i32(position.y),
            floor_to_i32(position.z),
        ))
    }

    pub fn segment_index_for_block(&self, block: GridPosition) -> GridPosition {
        GridPosition::new(
            block.x.div_euclid(self.segment_size),
            block.y.div_euclid(self.segment_size),
            block.z.div_euclid(self.segment_size),
        )
    }

    pub fn block_range(&self, segment_index: GridPosition) -> BlockRange {
        let size = self.segment_size;
        let min = GridPosition::new(
            segment_index.x * size,
            segment_index.y * size,
            segment_index.z * size,
        );
        BlockRange {
            min,
            max: min.offset(size, size, size),
        }
    }

    /// World-space bounding box `(min, max)` of a segment.
    pub fn bounding_box(&self, segment_index: GridPosition) -> (Vec3, Vec3) {
        let range = self.block_range(segment_index);
        (range.min.to_world(), range.max.to_world())
    }
}
