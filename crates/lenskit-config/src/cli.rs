//! Command-line argument parsing for the lens flare preview.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Lens flare preview command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "lenskit", about = "Headless lens flare pass preview")]
pub struct CliArgs {
    /// Camera width.
    #[arg(long)]
    pub width: Option<u32>,

    /// Camera height.
    #[arg(long)]
    pub height: Option<u32>,

    /// Frames to render.
    #[arg(long)]
    pub frames: Option<u32>,

    /// Number of cameras.
    #[arg(long)]
    pub cameras: Option<u32>,

    /// Treat cameras as interactive views.
    #[arg(long)]
    pub interactive: Option<bool>,

    /// Streak direction in degrees.
    #[arg(long)]
    pub direction: Option<f32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.preview.width = w;
        }
        if let Some(h) = args.height {
            self.preview.height = h;
        }
        if let Some(frames) = args.frames {
            self.preview.frames = frames;
        }
        if let Some(cameras) = args.cameras {
            self.preview.cameras = cameras;
        }
        if let Some(interactive) = args.interactive {
            self.preview.interactive = interactive;
        }
        if let Some(direction) = args.direction {
            self.anamorphic.direction = direction;
            self.anamorphic = self.anamorphic.clamped();
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
