//! Cadence Demo Viewer
//!
//! Opens a window and clears every frame to a slowly cycling colour. Useful for
//! watching frame pacing, resizes and minimisation without any pipeline setup.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p cadence-viewer -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `--vsync`: Present with FIFO instead of mailbox/immediate
//! - `--frames-in-flight <N>`: Frames the CPU may record ahead (default: 2)
//! - `--target-fps <N>`: Cap the frame rate (default: uncapped)
//! - `--speed <F>`: Colour cycle speed in radians per second (default: 0.5)
//! - `-h, --help`: Print help message
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;

use cadence_app::{run_app, AppConfig};

use crate::app::{Viewer, ViewerOptions};

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

fn main() -> anyhow::Result<()> {
    // Check for help flag before starting the app
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    let options = ViewerOptions::from_args();

    let mut config = AppConfig::new("Cadence - Frame Pacing Demo")
        .with_size(WIDTH, HEIGHT)
        .with_vsync(options.vsync)
        .with_frames_in_flight(options.frames_in_flight);
    if let Some(fps) = options.target_fps {
        config = config.with_target_fps(fps);
    }

    run_app::<Viewer>(config)
}

fn print_help() {
    eprintln!(
        "Cadence Demo Viewer

USAGE:
    cargo run -p cadence-viewer -- [OPTIONS]

OPTIONS:
    --vsync                 Present with FIFO instead of mailbox/immediate
    --frames-in-flight <N>  Frames the CPU may record ahead (default: 2)
    --target-fps <N>        Cap the frame rate (default: uncapped)
    --speed <F>             Colour cycle speed in radians per second (default: 0.5)
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}
