use engine::{EntityDesc, EntityId, GridPosition, Kinematics, Scene, SceneCommand, Vec3, World};
use tracing::{debug, info, warn};

const PLAYER_SPRITE: &str = "characters/player";
const ITEM_SPRITE: &str = "items/coin";
const WALK_SPEED_TILES_PER_SECOND: f32 = 3.0;
const ARRIVAL_THRESHOLD: f32 = 0.01;
const HOLD_TICKS_AFTER_WALK: u32 = 30;

const FLOOR_MIN: (i32, i32) = (-2, -4);
const FLOOR_MAX: (i32, i32) = (12, 12);
const HOUSE_MIN: (i32, i32) = (2, 2);
const HOUSE_MAX: (i32, i32) = (8, 8);
const WALL_HEIGHT: i32 = 2;
const ROOF_Z: i32 = 3;
const DOORWAY_X: i32 = 5;

/// What the last frame saw, kept for logging and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FrameReport {
    pub(crate) player_position: Option<Vec3>,
    pub(crate) roof_opacity: f32,
    pub(crate) minimum_z: i32,
    pub(crate) highest_covering: Option<EntityId>,
    pub(crate) visible_block: Option<EntityId>,
    pub(crate) items_under_player: Vec<EntityId>,
}

/// A one-room house with a doorway; the player walks in, stops on a coin, and walks back out.
pub(crate) struct HouseScene {
    player: Option<EntityId>,
    roof_probe: Option<EntityId>,
    waypoints: Vec<Vec3>,
    next_waypoint: usize,
    hold_ticks: u32,
    sheltered: Option<bool>,
    items_scratch: Vec<EntityId>,
    report: FrameReport,
}

impl HouseScene {
    pub(crate) fn new() -> Self {
        Self {
            player: None,
            roof_probe: None,
            waypoints: vec![
                Vec3::new(5.5, 2.5, 0.0),
                Vec3::new(5.5, 5.5, 0.0),
                Vec3::new(4.5, 4.5, 0.0),
                Vec3::new(5.5, 2.5, 0.0),
                Vec3::new(5.5, -2.5, 0.0),
            ],
            next_waypoint: 0,
            hold_ticks: 0,
            sheltered: None,
            items_scratch: Vec::new(),
            report: FrameReport::default(),
        }
    }

    pub(crate) fn player_start() -> Vec3 {
        Vec3::new(5.5, -2.5, 0.0)
    }

    pub(crate) fn report(&self) -> &FrameReport {
        &self.report
    }

    pub(crate) fn player(&self) -> Option<EntityId> {
        self.player
    }

    pub(crate) fn roof_probe(&self) -> Option<EntityId> {
        self.roof_probe
    }

    fn walk_finished(&self) -> bool {
        self.next_waypoint >= self.waypoints.len()
    }
}

impl Scene for HouseScene {
    fn load(&mut self, world: &mut World) {
        for (key, width_px, height_px) in [(PLAYER_SPRITE, 32, 64), (ITEM_SPRITE, 16, 16)] {
            if let Err(err) = world.sprites_mut().register(key, width_px, height_px) {
                warn!(sprite_key = key, error = %err, "sprite_register_failed");
            }
        }

        let entities = world.entities_mut();
        for x in FLOOR_MIN.0..FLOOR_MAX.0 {
            for y in FLOOR_MIN.1..FLOOR_MAX.1 {
                entities.spawn(EntityDesc::block(GridPosition::new(x, y, 0)));
            }
        }
        for z in 1..=WALL_HEIGHT {
            for x in HOUSE_MIN.0..HOUSE_MAX.0 {
                for y in HOUSE_MIN.1..HOUSE_MAX.1 {
                    let on_edge = x == HOUSE_MIN.0
                        || x == HOUSE_MAX.0 - 1
                        || y == HOUSE_MIN.1
                        || y == HOUSE_MAX.1 - 1;
                    let doorway = y == HOUSE_MIN.1 && x == DOORWAY_X;
                    if on_edge && !doorway {
                        entities.spawn(EntityDesc::block(GridPosition::new(x, y, z)));
                    }
                }
            }
        }
        let mut roof_probe = None;
        for x in HOUSE_MIN.0..HOUSE_MAX.0 {
            for y in HOUSE_MIN.1..HOUSE_MAX.1 {
                let id = entities.spawn(EntityDesc::block(GridPosition::new(x, y, ROOF_Z)));
                if (x, y) == (DOORWAY_X, HOUSE_MIN.1 + 1) {
                    roof_probe = Some(id);
                }
            }
        }

        for position in [Vec3::new(4.5, 4.5, 0.0), Vec3::new(9.5, 9.5, 0.0)] {
            entities.spawn(
                EntityDesc::non_block(Kinematics::at(position))
                    .with_sprite(ITEM_SPRITE)
                    .as_item(),
            );
        }

        let player = entities.spawn(
            EntityDesc::non_block(Kinematics::at(Self::player_start())).with_sprite(PLAYER_SPRITE),
        );
        entities.set_player(Some(player));

        self.player = Some(player);
        self.roof_probe = roof_probe;
        self.next_waypoint = 0;
        self.hold_ticks = 0;
        self.sheltered = None;
        self.report = FrameReport::default();
        info!(waypoints = self.waypoints.len(), "house_scene_built");
    }

    fn update(&mut self, fixed_dt_seconds: f32, world: &mut World) -> SceneCommand {
        let Some(player) = self.player else {
            return SceneCommand::Quit;
        };
        if self.walk_finished() {
            self.hold_ticks = self.hold_ticks.saturating_add(1);
            return if self.hold_ticks >= HOLD_TICKS_AFTER_WALK {
                SceneCommand::Quit
            } else {
                SceneCommand::None
            };
        }
        let Some(current) = world.entities().kinematics(player) else {
            warn!(entity_id = player.0, "house_scene_player_missing");
            return SceneCommand::Quit;
        };

        let target = self.waypoints[self.next_waypoint];
        let (next, arrived) = step_toward(
            current.position,
            target,
            WALK_SPEED_TILES_PER_SECOND,
            fixed_dt_seconds,
            ARRIVAL_THRESHOLD,
        );
        let velocity = if arrived || fixed_dt_seconds <= 0.0 {
            Vec3::ZERO
        } else {
            (next - current.position) * fixed_dt_seconds.recip()
        };
        world
            .entities_mut()
            .set_kinematics(player, Kinematics::at(next).with_velocity(velocity));
        if arrived {
            debug!(
                waypoint = self.next_waypoint,
                x = next.x,
                y = next.y,
                "house_scene_waypoint_reached"
            );
            self.next_waypoint += 1;
        }
        SceneCommand::None
    }

    fn frame(&mut self, world: &World) {
        let services = world.services();
        let player_position = self
            .player
            .and_then(|player| world.entities().kinematics(player))
            .map(|kinematics| kinematics.position);
        let roof_opacity = self
            .roof_probe
            .map(|id| services.get_opacity_for_entity(id))
            .unwrap_or(1.0);
        services.get_items_under_player(&mut self.items_scratch);

        self.report = FrameReport {
            player_position,
            roof_opacity,
            minimum_z: services.transparency().minimum_z(),
            highest_covering: player_position.and_then(|position| {
                services.try_get_highest_covering_entity_in_default_view(position)
            }),
            visible_block: player_position
                .and_then(|position| services.try_get_highest_visible_covering_block(position))
                .map(|covering| covering.entity_id),
            items_under_player: self.items_scratch.clone(),
        };

        let sheltered = roof_opacity < 1.0;
        if self.sheltered != Some(sheltered) {
            info!(sheltered, roof_opacity, "player_shelter_changed");
            self.sheltered = Some(sheltered);
        }
        if !self.report.items_under_player.is_empty() {
            debug!(count = self.report.items_under_player.len(), "items_under_player");
        }
        debug!(
            roof_opacity,
            minimum_z = self.report.minimum_z,
            covering = ?self.report.highest_covering.map(|id| id.0),
            "house_scene_frame"
        );
    }

    fn unload(&mut self, world: &mut World) {
        info!(entity_count = world.entity_count(), "scene_unload");
        world.clear();
        self.player = None;
        self.roof_probe = None;
        self.items_scratch.clear();
    }

    fn debug_title(&self, world: &World) -> Option<String> {
        Some(format!(
            "tick {} | roof {:.2} | min z {}",
            world.tick_count(),
            self.report.roof_opacity,
            self.report.minimum_z
        ))
    }
}

fn step_toward(
    current: Vec3,
    target: Vec3,
    speed: f32,
    fixed_dt_seconds: f32,
    arrival_threshold: f32,
) -> (Vec3, bool) {
    let delta = target - current;
    let distance_sq = delta.x * delta.x + delta.y * delta.y + delta.z * delta.z;
    if distance_sq <= arrival_threshold * arrival_threshold {
        return (target, true);
    }

    let distance = distance_sq.sqrt();
    let max_step = speed * fixed_dt_seconds;
    if max_step >= distance {
        return (target, true);
    }

    (current + delta * (max_step / distance), false)
}

#[cfg(test)]
mod tests {
    use engine::{run_app, EngineConfig, LoopConfig};

    use super::*;

    const FIXED_DT: f32 = 1.0 / 60.0;

    fn loaded() -> (World, HouseScene) {
        let mut world = World::new(&EngineConfig::default()).expect("world");
        let mut scene = HouseScene::new();
        scene.load(&mut world);
        world.apply_updates();
        (world, scene)
    }

    fn step(world: &mut World, scene: &mut HouseScene) -> SceneCommand {
        let command = scene.update(FIXED_DT, world);
        world.tick();
        world.begin_frame(0.0);
        scene.frame(world);
        command
    }

    #[test]
    fn step_toward_moves_by_speed_times_dt_without_overshoot() {
        let (next, arrived) = step_toward(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            2.0,
            0.5,
            0.1,
        );
        assert!(!arrived);
        assert!((next.x - 1.0).abs() < 1e-6);

        let (next, arrived) =
            step_toward(Vec3::new(9.5, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0), 2.0, 0.5, 0.1);
        assert!(arrived);
        assert_eq!(next, Vec3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn roof_is_opaque_before_the_player_enters() {
        let (mut world, mut scene) = loaded();
        world.tick();
        world.begin_frame(0.0);
        scene.frame(&world);

        let report = scene.report();
        assert_eq!(report.player_position, Some(HouseScene::player_start()));
        assert_eq!(report.roof_opacity, 1.0);
        assert!(report.items_under_player.is_empty());
        assert!(world.services().transparency().is_active());
    }

    #[test]
    fn roof_fades_once_the_player_is_inside() {
        let (mut world, mut scene) = loaded();
        let player = scene.player().expect("player");
        world
            .entities_mut()
            .set_kinematics(player, Kinematics::at(Vec3::new(5.5, 5.5, 0.0)));
        world.tick();
        world.begin_frame(0.0);
        scene.frame(&world);

        let report = scene.report();
        assert!(report.roof_opacity < 0.01);
        assert_eq!(report.minimum_z, ROOF_Z);
        let roof_probe = scene.roof_probe().expect("roof probe");
        assert_ne!(report.visible_block, Some(roof_probe));
    }

    #[test]
    fn coin_is_reported_under_the_player() {
        let (mut world, mut scene) = loaded();
        let player = scene.player().expect("player");
        world
            .entities_mut()
            .set_kinematics(player, Kinematics::at(Vec3::new(4.5, 4.5, 0.0)));
        world.tick();
        world.begin_frame(0.0);
        scene.frame(&world);

        let items = &scene.report().items_under_player;
        assert_eq!(items.len(), 1);
        assert!(world.entities().is_item(items[0]));
    }

    #[test]
    fn walk_goes_in_and_back_out_then_quits() {
        let (mut world, mut scene) = loaded();
        let mut saw_shelter = false;
        let mut quit_after = None;
        for tick in 0..2_000u32 {
            let command = step(&mut world, &mut scene);
            saw_shelter |= scene.report().roof_opacity < 1.0;
            if command == SceneCommand::Quit {
                quit_after = Some(tick);
                break;
            }
        }

        assert!(saw_shelter);
        assert!(quit_after.is_some());
        assert_eq!(scene.report().roof_opacity, 1.0);
        assert_eq!(
            scene.report().player_position,
            Some(HouseScene::player_start())
        );
    }

    #[test]
    fn unload_clears_the_world() {
        let (mut world, mut scene) = loaded();
        world.tick();
        assert!(world.entity_count() > 0);

        scene.unload(&mut world);
        assert_eq!(world.entity_count(), 0);
        assert_eq!(world.perspective().lines().line_count(), 0);
        assert!(scene.player().is_none());
    }

    #[test]
    fn runs_headless_under_the_engine_loop() {
        let config = LoopConfig {
            frame_limit: Some(3),
            max_render_fps: None,
            ..LoopConfig::default()
        };
        let summary =
            run_app(EngineConfig::default(), config, Box::new(HouseScene::new())).expect("run");
        assert_eq!(summary.frames, 3);
    }
}
