//! TubeDeck: download audio/video with yt-dlp and browse YouTube search results

// egui application and widgets
mod app;
// config.toml loading and saving
mod config;
// Background workers and their message channel to the UI
mod coordinator;
// yt-dlp adapter
mod downloader;
// Error type shared by every module
mod error;
// tracing subscriber setup
mod logging;
// Jobs, search results and operation state
mod model;
// yt-dlp progress line parsing
mod progress;
// YouTube Data API adapter
mod search;
// Result-table selection and filtering
mod selection;
// Thumbnail fetching for result rows
mod thumbnail;
// Duration, filename and number formatting
mod utils;

use std::time::Duration;

use eframe::egui::{self, Visuals};
use tokio::runtime::Runtime;
use tracing::{info, warn};

use app::TubeApp;
use config::{default_config_path, Config};

// How long shutdown waits for blocking thumbnail fetches before giving up on them
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Program entry point: initializes logging, runtime and config, then launches the GUI
fn main() -> Result<(), eframe::Error> {
    logging::init_tracing();

    // Owned here so it can be shut down once the window closes
    let runtime = Runtime::new().expect("failed to start tokio runtime");
    let handle = runtime.handle().clone();

    // Load settings; a broken file falls back to defaults
    let config_path = default_config_path();
    let config = match config_path.as_deref() {
        Some(path) => Config::load(path).unwrap_or_else(|err| {
            warn!(path = %path.display(), "ignoring config file: {}", err);
            Config::default()
        }),
        None => Config::default(),
    };
    info!(download_dir = %config.download_dir.display(), api_key = config.api_key().is_some(), "starting");

    // Configure the native window
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("TubeDeck")
            .with_inner_size([920.0, 680.0]),
        ..Default::default()
    };
    // Run the application until the window closes
    let result = eframe::run_native(
        "TubeDeck",
        options,
        Box::new(move |cc| {
            // Use dark theme visuals
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(TubeApp::new(config, config_path, handle))
        }),
    );

    // Dropping the remaining workers kills any yt-dlp child they still own
    info!("shutting down workers");
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}
