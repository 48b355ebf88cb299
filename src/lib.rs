// dependabot-configurator - Generate dependabot policies from a repository scan
//
// This is the library crate containing the scanning, synthesis, and emission logic.
// The binaries (main.rs, bin/pin-workflows.rs) provide the command-line entry points.

pub mod cli;
pub mod config;
pub mod document;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use document::Document;
pub use models::{DependabotConfig, Settings, UpdateEntry};
pub use services::{GenerateOptions, GenerationReport, generate};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
