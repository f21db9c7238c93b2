mod loop_runner;
mod metrics;
mod scene;
mod world;

pub use loop_runner::{run_app, run_app_with_metrics, AppError, LoopConfig, LoopSummary};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use scene::{Scene, SceneCommand};
pub use world::World;
