use std::process::ExitCode;

use engine::run_app;
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match run_app(app.engine_config, app.config, app.scene) {
        Ok(summary) => {
            info!(
                frames = summary.frames,
                ticks = summary.ticks,
                quit_requested = summary.quit_requested,
                "sandbox_finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}
