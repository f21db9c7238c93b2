use std::path::PathBuf;

use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::ecs::{EntityEvent, EntityTable};
use crate::perspective::{PerspectiveServices, PerspectiveSystem};
use crate::sprites::SpriteCatalog;
use crate::world::{
    SegmentSubscriptionTracker, WorldSegmentError, WorldSegmentEvent, WorldSegmentResolver,
};

/// Everything a scene touches: the entity store, sprite lookup, segment streaming and
/// the perspective state derived from them.
#[derive(Debug)]
pub struct World {
    entities: EntityTable,
    sprites: SpriteCatalog,
    resolver: WorldSegmentResolver,
    subscriptions: SegmentSubscriptionTracker,
    perspective: PerspectiveSystem,
    entity_events: Vec<EntityEvent>,
    segment_events: Vec<WorldSegmentEvent>,
    tick_count: u64,
}

impl World {
    pub fn new(config: &EngineConfig) -> Result<Self, WorldSegmentError> {
        let resolver = WorldSegmentResolver::new(config.world.segment_size)?;
        Ok(Self {
            entities: EntityTable::default(),
            sprites: SpriteCatalog::new(config.sprites.tile_size_px),
            resolver,
            subscriptions: SegmentSubscriptionTracker::new(
                config.world.subscription_radius,
                config.world.subscription_radius_z,
            ),
            perspective: PerspectiveSystem::new(config.perspective, resolver),
            entity_events: Vec::new(),
            segment_events: Vec::new(),
            tick_count: 0,
        })
    }

    pub fn with_asset_root(mut self, asset_root: impl Into<PathBuf>) -> Self {
        self.sprites = self.sprites.with_asset_root(asset_root);
        self
    }

    pub fn entities(&self) -> &EntityTable {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut EntityTable {
        &mut self.entities
    }

    pub fn sprites(&self) -> &SpriteCatalog {
        &self.sprites
    }

    pub fn sprites_mut(&mut self) -> &mut SpriteCatalog {
        &mut self.sprites
    }

    pub fn resolver(&self) -> &WorldSegmentResolver {
        &self.resolver
    }

    pub fn subscriptions(&self) -> &SegmentSubscriptionTracker {
        &self.subscriptions
    }

    pub fn perspective(&self) -> &PerspectiveSystem {
        &self.perspective
    }

    pub fn services(&self) -> PerspectiveServices<'_> {
        self.perspective.services(&self.entities)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn entity_count(&self) -> usize {
        self.entities.entity_count()
    }

    /// The apply-updates phase: pending entity changes land, subscriptions follow the
    /// player, and both event queues are handed to the perspective system.
    pub fn apply_updates(&mut self) {
        self.entities.apply_pending();
        self.entities.drain_events_into(&mut self.entity_events);
        self.recenter_subscriptions();

        if self.entity_events.is_empty() && self.segment_events.is_empty() {
            return;
        }
        debug!(
            entity_events = self.entity_events.len(),
            segment_events = self.segment_events.len(),
            "world_events_pumped"
        );
        self.perspective
            .pump_events(&self.entity_events, &self.segment_events);
        self.entity_events.clear();
        self.segment_events.clear();
    }

    pub fn tick(&mut self) {
        self.apply_updates();
        self.perspective.on_tick();
        self.tick_count = self.tick_count.saturating_add(1);
    }

    pub fn begin_frame(&mut self, time_since_tick_seconds: f32) {
        self.perspective
            .begin_frame(time_since_tick_seconds, &self.entities, &self.sprites);
    }

    /// Despawns everything and drops all subscriptions, leaving the perspective state empty.
    pub fn clear(&mut self) {
        let ids: Vec<_> = self.entities.records().map(|record| record.id).collect();
        for id in ids {
            self.entities.unload(id);
        }
        self.entities.set_player(None);
        self.apply_updates();
        self.perspective.on_tick();
        info!(entity_count = self.entities.entity_count(), "world_cleared");
    }

    fn recenter_subscriptions(&mut self) {
        let player_position = self
            .entities
            .player()
            .and_then(|player| self.entities.kinematics(player))
            .map(|kinematics| kinematics.position);
        match player_position {
            Some(position) => {
                let center = self.resolver.segment_index_for_position(position);
                self.subscriptions
                    .update(center, &mut self.segment_events);
            }
            None => {
                if self.subscriptions.center().is_some() {
                    self.subscriptions.clear(&mut self.segment_events);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{EntityDesc, Kinematics};
    use crate::geometry::{GridPosition, Vec3};

    fn world() -> World {
        let mut config = EngineConfig::default();
        config.world.segment_size = 8;
        config.world.subscription_radius = 1;
        config.world.subscription_radius_z = 0;
        World::new(&config).expect("world")
    }

    #[test]
    fn zero_segment_size_is_rejected() {
        let mut config = EngineConfig::default();
        config.world.segment_size = 0;
        assert!(World::new(&config).is_err());
    }

    #[test]
    fn subscriptions_follow_the_player() {
        let mut world = world();
        let player = world
            .entities_mut()
            .spawn(EntityDesc::non_block(Kinematics::at(Vec3::new(1.0, 1.0, 0.0))));
        world.entities_mut().set_player(Some(player));
        world.tick();

        assert_eq!(world.subscriptions().center(), Some(GridPosition::new(0, 0, 0)));
        assert_eq!(world.subscriptions().subscribed_count(), 9);
        assert!(world.perspective().lines().line_count() > 0);

        world
            .entities_mut()
            .set_kinematics(player, Kinematics::at(Vec3::new(20.0, 1.0, 0.0)));
        world.tick();
        assert_eq!(world.subscriptions().center(), Some(GridPosition::new(2, 0, 0)));
        assert!(world
            .subscriptions()
            .is_subscribed(GridPosition::new(3, -1, 0)));
        assert!(!world
            .subscriptions()
            .is_subscribed(GridPosition::new(0, 0, 0)));
    }

    #[test]
    fn frame_start_activates_transparency_under_roof() {
        let mut world = world();
        for x in 0..4 {
            for y in 0..4 {
                world
                    .entities_mut()
                    .spawn(EntityDesc::block(GridPosition::new(x, y, 3)));
            }
        }
        let player = world
            .entities_mut()
            .spawn(EntityDesc::non_block(Kinematics::at(Vec3::new(1.5, 0.5, 0.0))));
        world.entities_mut().set_player(Some(player));
        world.tick();
        world.begin_frame(0.0);

        let services = world.services();
        assert!(services.transparency().is_active());
        let faded = world
            .entities()
            .records()
            .filter(|record| services.get_opacity_for_entity(record.id) < 1.0)
            .count();
        assert!(faded > 0);
    }

    #[test]
    fn clear_empties_entities_and_lines() {
        let mut world = world();
        world
            .entities_mut()
            .spawn(EntityDesc::block(GridPosition::new(1, 1, 1)));
        let player = world
            .entities_mut()
            .spawn(EntityDesc::non_block(Kinematics::at(Vec3::new(1.0, 1.0, 2.0))));
        world.entities_mut().set_player(Some(player));
        world.tick();
        assert_eq!(world.entity_count(), 2);

        world.clear();
        assert_eq!(world.entity_count(), 0);
        assert_eq!(world.subscriptions().subscribed_count(), 0);
        assert_eq!(world.perspective().lines().line_count(), 0);
        assert_eq!(world.perspective().lines().tracked_entity_count(), 0);
    }
}
