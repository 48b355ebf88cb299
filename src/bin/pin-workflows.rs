//! pin-workflows - pin GitHub Actions references in workflow files with pinact.
//!
//! Workflows calling the organization's own reusable workflows (named by the
//! `ORGANIZATION_PREFIX` environment variable) are left alone. Per-workflow
//! failures are logged and counted but do not change the exit status; only a
//! setup failure such as a missing organization prefix exits with 1.

use anyhow::Result;
use clap::Parser;
use dependabot_configurator::cli::PinArgs;
use dependabot_configurator::services::pinning::{self, organization_prefix_from_env};
use std::process::ExitCode;

const LOG_PREFIX: &str = "pin-workflows";

fn main() -> ExitCode {
    let args = PinArgs::parse();

    let _guard = match dependabot_configurator::logging::setup_logging(&args.logging.log_options(LOG_PREFIX)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::FAILURE;
        }
    };

    match run(&args) {
        Ok(()) => {
            tracing::info!(exit_code = 0, "Pinning script finished successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), exit_code = 1, "Exiting due to critical error");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &PinArgs) -> Result<()> {
    let org_prefix = organization_prefix_from_env()?;

    // Workflows are pinned one at a time; a current-thread runtime is enough.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let summary = runtime.block_on(pinning::run(&args.pin_options(), &org_prefix));

    tracing::debug!(?summary, "Pinning summary");
    Ok(())
}
