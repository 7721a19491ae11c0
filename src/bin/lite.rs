//! Camera Detect (lite) - Entry Point
//!
//! The minimal variant: camera feed with detection and annotation, no menus.

use camera_detect::shell;
use camera_detect::AppOptions;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Camera Detect (lite) v{}", env!("CARGO_PKG_VERSION"));

    shell::run(AppOptions::lite())
}
