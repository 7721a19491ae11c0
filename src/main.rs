//! Camera Detect - Main Entry Point
//!
//! The full variant: menus for filters, detection toggles, frame capture and
//! the about dialog.

use camera_detect::shell;
use camera_detect::AppOptions;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Camera Detect v{}", env!("CARGO_PKG_VERSION"));

    shell::run(AppOptions::full())
}
