mod entity_list;
mod line;
mod line_manager;
mod overhead_graph;
mod services;
mod system;
mod transparency;
mod union_find;

pub use entity_list::{EntityInfo, EntityKind, EntityList, EntityListPool};
pub use line::PerspectiveLine;
pub use line_manager::PerspectiveLineManager;
pub use overhead_graph::OverheadBlockGraphManager;
pub use services::{BlockFace, CoveringBlock, PerspectiveServices};
pub use system::PerspectiveSystem;
pub use transparency::{
    determine_player_overlaps, select_minimum_z, FootprintCell, OverheadTransparency,
};
pub use union_find::{ComponentId, UnionFind2dGrid};
