mod events;
mod table;

pub use events::{EntityEvent, EntityId, EntityPosition, Kinematics};
pub use table::{EntityDesc, EntityIdAllocator, EntityRecord, EntityTable};
