mod segments;
mod subscriptions;

pub use segments::{BlockRange, WorldSegmentError, WorldSegmentResolver};
pub use subscriptions::{SegmentSubscriptionTracker, WorldSegmentEvent};
