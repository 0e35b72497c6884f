//! Configuration for the lens flare effects and the preview tool.
//!
//! Settings persist to disk as RON and can be overridden from the command
//! line. Unknown or missing fields fall back to defaults so older and newer
//! config files both load.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, PreviewConfig, RenderConfig, default_config_dir};
pub use error::ConfigError;
