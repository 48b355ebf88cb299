//! End-to-end policy generation.
//!
//! Control flow:
//! 1. Load the settings overlay
//! 2. Scan the repository and merge custom files
//! 3. Resolve registries
//! 4. Synthesize entries and apply ignore-dependency rules
//! 5. Assemble, render, and write `.github/dependabot.yml`

use crate::config::ConfigManager;
use crate::document::Document;
use crate::models::ECOSYSTEMS;
use crate::services::registry::RegistryMap;
use crate::services::scanner::{ManifestScanner, merge_custom_files};
use crate::services::synthesis::{EntrySynthesizer, SynthesisOptions, apply_ignore_dependencies};
use anyhow::{Result, bail};
use camino::Utf8PathBuf;

/// Inputs of one generator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    pub repo_path: Utf8PathBuf,
    pub synthesis: SynthesisOptions,
}

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub output_path: Utf8PathBuf,
    pub directories: usize,
    pub version_entries: usize,
    pub security_entries: usize,
    pub registries: usize,
    pub custom_files: usize,
    pub ignore_blocks: usize,
}

/// Run the generator against `options.repo_path`.
///
/// # Errors
/// Fails if the repository path is not a directory, the settings overlay is
/// unreadable or not a list, or the output cannot be written.
pub fn generate(options: &GenerateOptions) -> Result<GenerationReport> {
    if !options.repo_path.is_dir() {
        bail!("Repository path does not exist or is not a directory: {}", options.repo_path);
    }

    tracing::info!(
        repo_path = %options.repo_path,
        open_pull_requests_limit = options.synthesis.open_pull_requests_limit,
        target_branch = %options.synthesis.target_branch,
        transitive_security = options.synthesis.transitive_security,
        "Generating dependabot configuration"
    );

    let config_manager = ConfigManager::new(&options.repo_path);
    let settings = config_manager.load_settings()?;

    let scanner = ManifestScanner::new(ECOSYSTEMS)?;
    let mut manifest = scanner.scan(config_manager.repo_root());
    let custom_files = merge_custom_files(config_manager.repo_root(), &settings.custom_files, &mut manifest);

    config_manager.ensure_github_dir()?;

    let registries = RegistryMap::resolve(&settings.registries);

    let synthesizer = EntrySynthesizer::new(&settings, &registries, &options.synthesis);
    let mut entries = synthesizer.synthesize(&manifest);
    let ignore_blocks = apply_ignore_dependencies(&mut entries, &settings.ignore_dependencies);

    let security_entries = entries.iter().filter(|e| e.is_security()).count();
    let version_entries = entries.len() - security_entries;

    let document = Document::assemble(entries, registries.document_section());
    let rendered = document.render()?;
    config_manager.write_output(&rendered)?;

    let report = GenerationReport {
        output_path: config_manager.output_path().to_path_buf(),
        directories: manifest.len(),
        version_entries,
        security_entries,
        registries: registries.len(),
        custom_files,
        ignore_blocks,
    };

    tracing::info!(
        output = %report.output_path,
        directories = report.directories,
        version_entries = report.version_entries,
        security_entries = report.security_entries,
        registries = report.registries,
        custom_files = report.custom_files,
        ignore_blocks = report.ignore_blocks,
        "Dependabot configuration generated"
    );

    Ok(report)
}
