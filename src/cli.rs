//! Command-line arguments for both binaries.

use crate::logging::{LogFormat, LogOptions};
use crate::services::generator::GenerateOptions;
use crate::services::pinning::{DEFAULT_PINACT_BIN, DEFAULT_WORKFLOWS_DIR, PinOptions};
use crate::services::synthesis::SynthesisOptions;
use camino::Utf8PathBuf;
use clap::{ArgAction, Args, Parser};
use std::time::Duration;

/// Logging flags shared by both binaries.
#[derive(Debug, Clone, Args)]
pub struct LoggingArgs {
    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Console log format
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    /// Also write daily-rotated log files into this directory
    #[arg(long)]
    pub log_dir: Option<Utf8PathBuf>,
}

impl LoggingArgs {
    pub fn log_options(&self, log_prefix: &str) -> LogOptions {
        LogOptions {
            debug: self.debug,
            format: self.log_format,
            log_dir: self.log_dir.clone(),
            log_prefix: log_prefix.to_string(),
        }
    }
}

/// Generate .github/dependabot.yml from the manifests found in a repository.
#[derive(Debug, Clone, Parser)]
#[command(name = "dependabot-configurator", version, about)]
pub struct GenerateArgs {
    /// Open pull request limit for version updates; 0 or less disables them
    #[arg(long, allow_negative_numbers = true)]
    pub open_pull_requests_limit: i64,

    /// Branch version updates target
    #[arg(long)]
    pub main_branch: String,

    /// Repository root to scan
    #[arg(long, default_value = ".")]
    pub repo_path: Utf8PathBuf,

    /// Include transitive dependencies in security updates
    #[arg(
        long,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = parse_bool_flag,
        action = ArgAction::Set,
    )]
    pub transitive_security: bool,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl GenerateArgs {
    pub fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            repo_path: self.repo_path.clone(),
            synthesis: SynthesisOptions {
                open_pull_requests_limit: self.open_pull_requests_limit,
                target_branch: self.main_branch.clone(),
                transitive_security: self.transitive_security,
            },
        }
    }
}

/// Pin workflow action references to commit SHAs with pinact.
#[derive(Debug, Clone, Parser)]
#[command(name = "pin-workflows", version, about)]
pub struct PinArgs {
    /// Directory holding the workflow files
    #[arg(long, default_value = DEFAULT_WORKFLOWS_DIR)]
    pub repo_path: Utf8PathBuf,

    /// Pin every workflow, even ones already fully pinned
    #[arg(long)]
    pub force: bool,

    /// Pinning tool executable
    #[arg(long, default_value = DEFAULT_PINACT_BIN)]
    pub pinact_bin: String,

    /// Per-workflow timeout for the pinning tool
    #[arg(long, default_value_t = 120)]
    pub timeout_secs: u64,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl PinArgs {
    pub fn pin_options(&self) -> PinOptions {
        PinOptions {
            workflows_dir: self.repo_path.clone(),
            force: self.force,
            pinact_bin: self.pinact_bin.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Case-insensitive true/false/yes/no/1/0.
pub fn parse_bool_flag(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(format!(
            "invalid boolean value {value:?} (expected true/false, yes/no, or 1/0)"
        )),
    }
}
