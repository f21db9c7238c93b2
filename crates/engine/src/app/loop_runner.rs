use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigError, EngineConfig};
use crate::world::WorldSegmentError;

use super::metrics::MetricsAccumulator;
use super::{MetricsHandle, Scene, SceneCommand, World};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub max_render_fps: Option<u32>,
    /// Stop after this many frames; `None` runs until the scene quits.
    pub frame_limit: Option<u64>,
    pub asset_root: Option<PathBuf>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            max_render_fps: Some(60),
            frame_limit: None,
            asset_root: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid engine config: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to create world: {0}")]
    World(#[from] WorldSegmentError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub frames: u64,
    pub ticks: u64,
    pub quit_requested: bool,
}

pub fn run_app(
    engine_config: EngineConfig,
    config: LoopConfig,
    scene: Box<dyn Scene>,
) -> Result<LoopSummary, AppError> {
    run_app_with_metrics(engine_config, config, scene, MetricsHandle::default())
}

pub fn run_app_with_metrics(
    engine_config: EngineConfig,
    config: LoopConfig,
    mut scene: Box<dyn Scene>,
    metrics_handle: MetricsHandle,
) -> Result<LoopSummary, AppError> {
    engine_config.validate()?;
    let mut world = World::new(&engine_config)?;
    if let Some(asset_root) = &config.asset_root {
        world = world.with_asset_root(asset_root.clone());
    }

    let mut runner = FrameRunner::new(&config, Instant::now());
    let effective_render_cap = normalize_render_fps_cap(config.max_render_fps);
    let render_frame_target = target_frame_duration(effective_render_cap);
    info!(
        target_tps = runner.target_tps,
        max_frame_delta_ms = runner.max_frame_delta.as_millis() as u64,
        max_ticks_per_frame = runner.max_ticks_per_frame,
        metrics_log_interval_ms = runner.metrics_log_interval.as_millis() as u64,
        render_fps_cap = %format_render_cap(effective_render_cap),
        frame_limit = ?config.frame_limit,
        "loop_config"
    );

    scene.load(&mut world);
    world.apply_updates();
    info!(entity_count = world.entity_count(), "scene_loaded");

    let mut last_frame_instant = Instant::now();
    let mut last_present_instant = Instant::now();
    let mut quit_requested = false;
    loop {
        let (frames, _) = runner.metrics.totals();
        if config.frame_limit.is_some_and(|limit| frames >= limit) {
            info!(reason = "frame_limit", "shutdown_requested");
            break;
        }

        let now = Instant::now();
        let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
        last_frame_instant = now;

        let outcome = runner.run_frame(raw_frame_dt, &mut world, scene.as_mut());
        if let Some(title) = scene.debug_title(&world) {
            tracing::debug!(title = title.as_str(), "scene_title");
        }

        let elapsed_since_last_present =
            Instant::now().saturating_duration_since(last_present_instant);
        let cap_sleep = compute_cap_sleep(elapsed_since_last_present, render_frame_target);
        if cap_sleep > Duration::ZERO {
            thread::sleep(cap_sleep);
        }
        last_present_instant = Instant::now();

        if let Some(snapshot) = runner.metrics.maybe_snapshot(now) {
            metrics_handle.publish(snapshot);
            info!(
                fps = snapshot.fps,
                tps = snapshot.tps,
                frame_time_ms = snapshot.frame_time_ms,
                begin_frame_ms = snapshot.begin_frame_ms,
                entity_count = world.entity_count(),
                "loop_metrics"
            );
        }

        if outcome.quit_requested {
            info!(reason = "scene_quit", "shutdown_requested");
            quit_requested = true;
            break;
        }
    }

    scene.unload(&mut world);
    world.apply_updates();
    let (frames, ticks) = runner.metrics.totals();
    info!(frames, ticks, "shutdown");
    Ok(LoopSummary {
        frames,
        ticks,
        quit_requested,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FrameOutcome {
    pub(crate) ticks_run: u32,
    pub(crate) quit_requested: bool,
}

/// One frame of the fixed-timestep schedule: ticks owed by the accumulator, then the
/// perspective frame-start call, then the scene's per-frame hook.
#[derive(Debug)]
pub(crate) struct FrameRunner {
    target_tps: u32,
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    metrics_log_interval: Duration,
    accumulator: Duration,
    metrics: MetricsAccumulator,
}

impl FrameRunner {
    pub(crate) fn new(config: &LoopConfig, now: Instant) -> Self {
        let target_tps = config.target_tps.max(1);
        let metrics_log_interval =
            normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
        Self {
            target_tps,
            fixed_dt: Duration::from_secs_f64(1.0 / target_tps as f64),
            max_frame_delta: normalize_non_zero_duration(
                config.max_frame_delta,
                Duration::from_millis(250),
            ),
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            metrics_log_interval,
            accumulator: Duration::ZERO,
            metrics: MetricsAccumulator::new(metrics_log_interval, now),
        }
    }

    pub(crate) fn run_frame(
        &mut self,
        raw_frame_dt: Duration,
        world: &mut World,
        scene: &mut dyn Scene,
    ) -> FrameOutcome {
        let clamped_frame_dt = clamp_frame_delta(raw_frame_dt, self.max_frame_delta);
        self.accumulator = self.accumulator.saturating_add(clamped_frame_dt);

        let step_plan = plan_sim_steps(self.accumulator, self.fixed_dt, self.max_ticks_per_frame);
        let fixed_dt_seconds = self.fixed_dt.as_secs_f32();
        let mut outcome = FrameOutcome::default();
        for _ in 0..step_plan.ticks_to_run {
            let command = scene.update(fixed_dt_seconds, world);
            world.tick();
            self.metrics.record_tick();
            outcome.ticks_run += 1;
            if command == SceneCommand::Quit {
                outcome.quit_requested = true;
                break;
            }
        }
        self.accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = self.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
        }

        let begin_frame_start = Instant::now();
        world.begin_frame(self.accumulator.as_secs_f32());
        let begin_frame_cost = begin_frame_start.elapsed();
        scene.frame(world);
        self.metrics.record_frame(raw_frame_dt, begin_frame_cost);
        outcome
    }
}

struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::take(&mut accumulator)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn normalize_render_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn format_render_cap(cap: Option<u32>) -> String {
    match cap {
        Some(value) => value.to_string(),
        None => "off".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::ecs::{EntityDesc, Kinematics};
    use crate::geometry::{GridPosition, Vec3};

    #[derive(Debug, Default)]
    struct SceneLog {
        loaded: bool,
        unloaded: bool,
        updates: u32,
        frames: u32,
        last_opacity_checks: usize,
    }

    struct ScriptedScene {
        log: Rc<RefCell<SceneLog>>,
        quit_after_updates: Option<u32>,
    }

    impl Scene for ScriptedScene {
        fn load(&mut self, world: &mut World) {
            let entities = world.entities_mut();
            entities.spawn(EntityDesc::block(GridPosition::new(0, 0, 3)));
            let player =
                entities.spawn(EntityDesc::non_block(Kinematics::at(Vec3::new(0.5, 0.5, 0.0))));
            entities.set_player(Some(player));
            self.log.borrow_mut().loaded = true;
        }

        fn update(&mut self, _fixed_dt_seconds: f32, _world: &mut World) -> SceneCommand {
            let mut log = self.log.borrow_mut();
            log.updates += 1;
            match self.quit_after_updates {
                Some(limit) if log.updates >= limit => SceneCommand::Quit,
                _ => SceneCommand::None,
            }
        }

        fn frame(&mut self, world: &World) {
            let services = world.services();
            let checked = world
                .entities()
                .records()
                .map(|record| services.get_opacity_for_entity(record.id))
                .filter(|opacity| (0.0..=1.0).contains(opacity))
                .count();
            let mut log = self.log.borrow_mut();
            log.frames += 1;
            log.last_opacity_checks = checked;
        }

        fn unload(&mut self, world: &mut World) {
            world.clear();
            self.log.borrow_mut().unloaded = true;
        }
    }

    fn scripted(quit_after_updates: Option<u32>) -> (ScriptedScene, Rc<RefCell<SceneLog>>) {
        let log = Rc::new(RefCell::new(SceneLog::default()));
        (
            ScriptedScene {
                log: Rc::clone(&log),
                quit_after_updates,
            },
            log,
        )
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        assert_eq!(
            clamp_frame_delta(Duration::from_secs(2), max_frame_delta),
            max_frame_delta
        );
        assert_eq!(
            clamp_frame_delta(Duration::from_millis(16), max_frame_delta),
            Duration::from_millis(16)
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let plan = plan_sim_steps(Duration::from_millis(35), Duration::from_millis(10), 5);
        assert_eq!(plan.ticks_to_run, 3);
        assert_eq!(plan.remaining_accumulator, Duration::from_millis(5));
        assert_eq!(plan.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let plan = plan_sim_steps(Duration::from_millis(100), Duration::from_millis(10), 4);
        assert_eq!(plan.ticks_to_run, 4);
        assert_eq!(plan.remaining_accumulator, Duration::ZERO);
        assert_eq!(plan.dropped_backlog, Duration::from_millis(60));
    }

    #[test]
    fn target_frame_duration_for_60hz_is_expected() {
        assert_eq!(target_frame_duration(None), None);
        let duration = target_frame_duration(Some(60)).expect("duration");
        assert!((duration.as_secs_f64() - (1.0 / 60.0)).abs() < 0.000_001);
    }

    #[test]
    fn compute_cap_sleep_only_when_under_budget() {
        let target = target_frame_duration(Some(60));
        assert_eq!(compute_cap_sleep(Duration::from_millis(20), target), Duration::ZERO);
        assert!(compute_cap_sleep(Duration::from_millis(5), target) > Duration::ZERO);
        assert_eq!(compute_cap_sleep(Duration::from_millis(5), None), Duration::ZERO);
    }

    #[test]
    fn normalize_render_fps_cap_disables_zero() {
        assert_eq!(normalize_render_fps_cap(Some(0)), None);
        assert_eq!(normalize_render_fps_cap(Some(60)), Some(60));
        assert_eq!(format_render_cap(None), "off");
    }

    #[test]
    fn frame_runner_ticks_then_begins_frame() {
        let config = LoopConfig {
            target_tps: 100,
            ..LoopConfig::default()
        };
        let mut runner = FrameRunner::new(&config, Instant::now());
        let mut world = World::new(&EngineConfig::default()).expect("world");
        let (mut scene, log) = scripted(None);
        scene.load(&mut world);
        world.apply_updates();

        let outcome = runner.run_frame(Duration::from_millis(35), &mut world, &mut scene);
        assert_eq!(outcome.ticks_run, 3);
        assert!(!outcome.quit_requested);
        assert_eq!(world.tick_count(), 3);
        assert_eq!(log.borrow().frames, 1);
        assert_eq!(log.borrow().last_opacity_checks, 2);
        assert!(world.services().transparency().is_active());

        let outcome = runner.run_frame(Duration::from_millis(4), &mut world, &mut scene);
        assert_eq!(outcome.ticks_run, 0);
        assert_eq!(log.borrow().frames, 2);
    }

    #[test]
    fn frame_runner_stops_ticking_on_quit() {
        let config = LoopConfig {
            target_tps: 100,
            ..LoopConfig::default()
        };
        let mut runner = FrameRunner::new(&config, Instant::now());
        let mut world = World::new(&EngineConfig::default()).expect("world");
        let (mut scene, log) = scripted(Some(2));

        let outcome = runner.run_frame(Duration::from_millis(50), &mut world, &mut scene);
        assert_eq!(outcome.ticks_run, 2);
        assert!(outcome.quit_requested);
        assert_eq!(log.borrow().updates, 2);
    }

    #[test]
    fn run_app_honours_frame_limit_and_unloads() {
        let (scene, log) = scripted(None);
        let config = LoopConfig {
            frame_limit: Some(5),
            max_render_fps: None,
            ..LoopConfig::default()
        };
        let summary = run_app(EngineConfig::default(), config, Box::new(scene)).expect("run");
        assert_eq!(summary.frames, 5);
        assert!(!summary.quit_requested);
        let log = log.borrow();
        assert!(log.loaded && log.unloaded);
        assert_eq!(log.frames, 5);
    }

    #[test]
    fn run_app_rejects_invalid_config() {
        let (scene, _log) = scripted(None);
        let mut engine_config = EngineConfig::default();
        engine_config.world.segment_size = 0;
        let result = run_app(engine_config, LoopConfig::default(), Box::new(scene));
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
