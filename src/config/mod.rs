//! Configuration module
//!
//! This module provides:
//! - Display options (`TickerOptions`) and their enums
//! - YAML loading with environment overrides (`load_options`)
//! - Command-line arguments (`CliArgs`)
//! - Logging setup (`init_logging`)

pub mod cli;
pub mod logging;
mod loader;
mod types;

pub use cli::CliArgs;
pub use loader::{apply_env_overrides, load_config, load_config_from_str, load_options};
pub use logging::init_logging;
pub use types::{Exchange, HeadingStyle, PulseStyle, TickerOptions};
