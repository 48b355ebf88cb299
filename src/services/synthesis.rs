//! Update entry synthesis.
//!
//! For each directory (sorted) and each distinct ecosystem in it (sorted), the
//! synthesizer emits at most one version-update entry and always exactly one
//! security-update entry. Version updates are suppressed by:
//! - an open-PR limit of 0
//! - a manifest filename matching an `ignore-version-updates-for-files` glob
//! - the directory sitting at or below an `ignore-directory` rule
//!
//! Security updates ignore all three.

use crate::models::{IgnoreBlock, IgnoreDependencyRule, Schedule, Settings, UpdateEntry};
use crate::services::registry::RegistryMap;
use crate::services::scanner::{DirectoryManifest, ManifestFile};
use globset::{Glob, GlobMatcher};

/// Caller-supplied knobs for synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOptions {
    pub open_pull_requests_limit: i64,
    pub target_branch: String,
    pub transitive_security: bool,
}

/// Compiled `ignore-version-updates-for-files` globs, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct FilePatterns {
    patterns: Vec<(String, GlobMatcher)>,
}

impl FilePatterns {
    /// Compile the patterns; invalid globs are logged and dropped.
    pub fn compile(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|pattern| match Glob::new(pattern) {
                Ok(glob) => Some((pattern.clone(), glob.compile_matcher())),
                Err(e) => {
                    tracing::warn!(file_pattern = %pattern, error = %e, "Invalid file pattern, ignoring");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    /// First pattern matching any of `filenames`, scanning files in order and,
    /// for each file, patterns in order.
    pub fn first_match<'a, I>(&self, filenames: I) -> Option<&str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        filenames.into_iter().find_map(|filename| {
            self.patterns
                .iter()
                .find(|(_, matcher)| matcher.is_match(filename))
                .map(|(pattern, _)| pattern.as_str())
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// The `ignore-directory` rule suppressing version updates for `directory`.
///
/// Both sides are compared with surrounding slashes trimmed; a rule matches its
/// own directory and every directory below it, never a sibling sharing a prefix.
pub fn ignored_directory_rule<'a>(directory: &str, ignore_directories: &'a [String]) -> Option<&'a str> {
    let normalized = directory.trim_matches('/');
    ignore_directories
        .iter()
        .find(|rule| {
            let rule_normalized = rule.trim_matches('/');
            normalized == rule_normalized
                || normalized.starts_with(&format!("{}/", rule_normalized))
        })
        .map(String::as_str)
}

/// Builds the ordered entry list from a manifest and the settings overlay.
pub struct EntrySynthesizer<'a> {
    settings: &'a Settings,
    registries: &'a RegistryMap,
    options: &'a SynthesisOptions,
    file_patterns: FilePatterns,
}

impl<'a> EntrySynthesizer<'a> {
    pub fn new(settings: &'a Settings, registries: &'a RegistryMap, options: &'a SynthesisOptions) -> Self {
        Self {
            settings,
            registries,
            options,
            file_patterns: FilePatterns::compile(&settings.ignore_file_patterns),
        }
    }

    pub fn synthesize(&self, manifest: &DirectoryManifest) -> Vec<UpdateEntry> {
        let mut entries = Vec::new();

        for (directory, files) in manifest.iter() {
            for ecosystem in manifest.ecosystems_in(directory) {
                self.synthesize_unit(directory, ecosystem, files, &mut entries);
            }
        }

        entries
    }

    /// Entries for one (directory, ecosystem) unit, however many manifest
    /// files it has.
    fn synthesize_unit(
        &self,
        directory: &str,
        ecosystem: &str,
        files: &[ManifestFile],
        entries: &mut Vec<UpdateEntry>,
    ) {
        let unit_files = files
            .iter()
            .filter(|f| f.ecosystem == ecosystem)
            .map(|f| f.filename.as_str());
        let skipped_by_pattern = self.file_patterns.first_match(unit_files);

        if let Some(pattern) = skipped_by_pattern {
            tracing::info!(
                manager = ecosystem,
                directory,
                file_pattern = pattern,
                "Skipping version updates for manager due to file pattern ignore"
            );
        }

        let schedule = Schedule::for_ecosystem(ecosystem);

        if self.options.open_pull_requests_limit > 0 && skipped_by_pattern.is_none() {
            if let Some(rule) = ignored_directory_rule(directory, &self.settings.ignore_directories) {
                tracing::info!(
                    directory,
                    manager = ecosystem,
                    rule,
                    "Skipping directory due to ignore rule"
                );
            } else {
                let mut entry = UpdateEntry::version_update(
                    ecosystem,
                    directory,
                    schedule.clone(),
                    self.options.open_pull_requests_limit,
                    &self.options.target_branch,
                );
                self.attach_registries(&mut entry);
                entries.push(entry);
            }
        }

        let mut security = UpdateEntry::security_update(
            ecosystem,
            directory,
            schedule,
            self.options.transitive_security,
        );
        self.attach_registries(&mut security);
        entries.push(security);
    }

    fn attach_registries(&self, entry: &mut UpdateEntry) {
        let applicable = self.registries.applicable_to(&entry.package_ecosystem);
        if applicable.is_empty() {
            return;
        }

        tracing::info!(
            manager = %entry.package_ecosystem,
            directory = %entry.directory,
            kind = entry.kind.as_str(),
            registries = ?applicable,
            "Added registries to update entry"
        );
        entry.registries = Some(applicable);
    }
}

/// Append an ignore block per matching rule to every version-update entry of
/// the rule's ecosystem.
///
/// Entries carrying the security group are never touched. Blocks are not
/// deduplicated. Returns the number of blocks appended.
pub fn apply_ignore_dependencies(entries: &mut [UpdateEntry], rules: &[IgnoreDependencyRule]) -> usize {
    let mut applied = 0;

    for rule in rules {
        let (Some(ecosystem), Some(dependency)) =
            (non_empty(&rule.package_ecosystem), non_empty(&rule.dependency_name))
        else {
            tracing::warn!(rule = ?rule, "Ignore dependency rule missing package-ecosystem or dependency-name, skipping");
            continue;
        };

        let block = IgnoreBlock {
            dependency_name: dependency.to_string(),
            update_types: rule.update_types.clone(),
        };

        for entry in entries.iter_mut() {
            if entry.package_ecosystem != ecosystem || entry.groups.is_empty() || entry.is_security() {
                continue;
            }

            entry.ignore.get_or_insert_with(Vec::new).push(block.clone());
            applied += 1;
            tracing::debug!(
                dependency,
                ecosystem,
                update_types = ?block.update_types,
                target_update_directory = %entry.directory,
                "Applied ignore dependency rule"
            );
        }
    }

    applied
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}
