//! dependabot-configurator - generate `.github/dependabot.yml` for a repository.
//!
//! # Execution Flow
//!
//! 1. Parse arguments (clap reports missing or invalid ones and exits non-zero)
//! 2. Initialize logging (JSON on stderr by default, optional rolling log files)
//! 3. Load `.github/.configurator_settings.yml` if present
//! 4. Scan for manifests, synthesize version and security entries
//! 5. Write `.github/dependabot.yml`
//!
//! Any error along the way is logged and the process exits with status 1.

use anyhow::Result;
use clap::Parser;
use dependabot_configurator::cli::GenerateArgs;
use dependabot_configurator::{APP_NAME, VERSION, generate};

fn main() -> Result<()> {
    let args = GenerateArgs::parse();

    let _guard = dependabot_configurator::logging::setup_logging(&args.logging.log_options(APP_NAME))?;

    tracing::info!(version = VERSION, "Starting {}", APP_NAME);

    let report = generate(&args.generate_options()).inspect_err(|e| {
        tracing::error!(error = %format!("{e:#}"), "Failed to generate dependabot configuration");
    })?;

    tracing::info!(output = %report.output_path, "Finished");
    Ok(())
}
