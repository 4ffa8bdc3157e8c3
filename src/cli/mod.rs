//! CLI-specific functionality
//!
//! This module contains the command line surface: argument parsing,
//! configuration discovery and the log filter derived from `-v`.

pub mod args;
pub mod config;

pub use args::{Args, Commands, RunArgs};
pub use config::{ConfigDiscovery, ConfigError, EngineSettings, RunConfig, Settings};

/// Default `tracing` directive for a `-v` count. `RUST_LOG` takes precedence.
pub fn log_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "labbox=warn",
        1 => "labbox=info",
        2 => "labbox=debug",
        _ => "labbox=trace",
    }
}
