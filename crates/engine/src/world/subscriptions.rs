use std::collections::BTreeSet;

use tracing::debug;

use crate::geometry::GridPosition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldSegmentEvent {
    Subscribed(GridPosition),
    Unsubscribed(GridPosition),
}

/// Keeps a cube of world segments subscribed around a moving center segment.
#[derive(Debug, Clone)]
pub struct SegmentSubscriptionTracker {
    radius: i32,
    radius_z: i32,
    center: Option<GridPosition>,
    subscribed: BTreeSet<GridPosition>,
}

impl SegmentSubscriptionTracker {
    pub fn new(radius: u32, radius_z: u32) -> Self {
        Self {
            radius: radius.min(i32::MAX as u32) as i32,
            radius_z: radius_z.min(i32::MAX as u32) as i32,
            center: None,
            subscribed: BTreeSet::new(),
        }
    }

    pub fn center(&self) -> Option<GridPosition> {
        self.center
    }

    pub fn is_subscribed(&self, segment_index: GridPosition) -> bool {
        self.subscribed.contains(&segment_index)
    }

    pub fn subscribed_count(&self) -> usize {
        self.subscribed.len()
    }

    /// Recenters the subscription cube. Unsubscribes are emitted before subscribes, each
    /// group in ascending segment order.
    pub fn update(&mut self, center: GridPosition, out: &mut Vec<WorldSegmentEvent>) {
        if self.center == Some(center) {
            return;
        }
        let mut wanted = BTreeSet::new();
        for dz in -self.radius_z..=self.radius_z {
            for dy in -self.radius..=self.radius {
                for dx in -self.radius..=self.radius {
                    wanted.insert(center.offset(dx, dy, dz));
                }
            }
        }

        let before = out.len();
        out.extend(
            self.subscribed
                .difference(&wanted)
                .copied()
                .map(WorldSegmentEvent::Unsubscribed),
        );
        out.extend(
            wanted
                .difference(&self.subscribed)
                .copied()
                .map(WorldSegmentEvent::Subscribed),
        );
        debug!(
            center_x = center.x,
            center_y = center.y,
            center_z = center.z,
            changes = out.len() - before,
            "segment_subscriptions_recentered"
        );
        self.subscribed = wanted;
        self.center = Some(center);
    }

    /// Drops every subscription, e.g. when the player goes away.
    pub fn clear(&mut self, out: &mut Vec<WorldSegmentEvent>) {
        out.extend(
            self.subscribed
                .iter()
                .copied()
                .map(WorldSegmentEvent::Unsubscribed),
        );
        self.subscribed.clear();
        self.center = None;
    }
}
