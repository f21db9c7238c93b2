use tracing::debug;

use crate::config::PerspectiveSettings;
use crate::ecs::{EntityEvent, EntityPosition, EntityTable};
use crate::sprites::SpriteCatalog;
use crate::world::{WorldSegmentEvent, WorldSegmentResolver};

use super::line_manager::PerspectiveLineManager;
use super::overhead_graph::OverheadBlockGraphManager;
use super::services::PerspectiveServices;
use super::transparency::OverheadTransparency;

/// Owns the perspective state and routes entity and segment events into it.
#[derive(Debug)]
pub struct PerspectiveSystem {
    settings: PerspectiveSettings,
    lines: PerspectiveLineManager,
    graphs: OverheadBlockGraphManager,
    transparency: OverheadTransparency,
}

impl PerspectiveSystem {
    pub fn new(settings: PerspectiveSettings, resolver: WorldSegmentResolver) -> Self {
        Self {
            settings,
            lines: PerspectiveLineManager::new(resolver, settings.entity_list_pool_capacity),
            graphs: OverheadBlockGraphManager::new(),
            transparency: OverheadTransparency::new(settings),
        }
    }

    pub fn settings(&self) -> &PerspectiveSettings {
        &self.settings
    }

    pub fn lines(&self) -> &PerspectiveLineManager {
        &self.lines
    }

    pub fn graphs(&self) -> &OverheadBlockGraphManager {
        &self.graphs
    }

    pub fn transparency(&self) -> &OverheadTransparency {
        &self.transparency
    }

    pub fn handle_entity_event(&mut self, event: &EntityEvent) {
        match *event {
            EntityEvent::Added {
                id,
                is_load,
                position,
            } => {
                debug!(
                    entity = id.0,
                    is_load,
                    is_block = position.is_block(),
                    "perspective_entity_added"
                );
                self.lines.on_entity_added(id, position);
                if let EntityPosition::Block(block) = position {
                    self.graphs.on_block_added(id, block);
                }
            }
            EntityEvent::KinematicsModified { id, kinematics } => {
                self.lines.on_kinematics_modified(id, kinematics);
            }
            EntityEvent::BlockPositionModified { id, position } => {
                self.lines.on_block_position_modified(id, position);
                self.graphs.on_block_moved(id, position);
            }
            EntityEvent::Removed { id, is_unload } => {
                debug!(entity = id.0, is_unload, "perspective_entity_removed");
                self.lines.on_entity_removed(id);
                self.graphs.on_block_removed(id);
            }
        }
    }

    pub fn handle_segment_event(&mut self, event: &WorldSegmentEvent) {
        match *event {
            WorldSegmentEvent::Subscribed(segment_index) => {
                self.lines.on_world_segment_subscribe(segment_index)
            }
            WorldSegmentEvent::Unsubscribed(segment_index) => {
                self.lines.on_world_segment_unsubscribe(segment_index)
            }
        }
    }

    /// Applies one update phase worth of events. New segments are subscribed before
    /// entity events so loaded entities find their lines, and old segments are dropped
    /// last so unloaded entities can still leave theirs.
    pub fn pump_events(
        &mut self,
        entity_events: &[EntityEvent],
        segment_events: &[WorldSegmentEvent],
    ) {
        for event in segment_events {
            if matches!(event, WorldSegmentEvent::Subscribed(_)) {
                self.handle_segment_event(event);
            }
        }
        for event in entity_events {
            self.handle_entity_event(event);
        }
        for event in segment_events {
            if matches!(event, WorldSegmentEvent::Unsubscribed(_)) {
                self.handle_segment_event(event);
            }
        }
    }

    pub fn on_tick(&mut self) {
        self.graphs.on_tick();
    }

    /// Frame-start controller call; must run before any opacity query of the frame.
    pub fn begin_frame(
        &mut self,
        time_since_tick: f32,
        entities: &EntityTable,
        sprites: &SpriteCatalog,
    ) {
        self.graphs.begin_frame();
        self.transparency.begin_frame(
            time_since_tick,
            entities,
            &self.lines,
            &self.graphs,
            sprites,
        );
    }

    pub fn services<'a>(&'a self, entities: &'a EntityTable) -> PerspectiveServices<'a> {
        PerspectiveServices::new(
            &self.lines,
            &self.transparency,
            &self.graphs,
            entities,
            &self.settings,
        )
    }
}
