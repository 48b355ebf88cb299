//! Manifest discovery.
//!
//! [`ManifestScanner`] walks the repository once and matches every file against
//! the ecosystem glob table, producing a [`DirectoryManifest`] keyed by
//! canonical directory (`/` for the root, `/a/b` otherwise). Custom file
//! declarations from the settings overlay are folded in afterwards by
//! [`merge_custom_files`] so that downstream code cannot tell them apart from
//! discovered manifests.
//!
//! Wildcards never match a path component that begins with `.`; such a
//! component is only reachable when a pattern spells it out literally, as in
//! `.github/workflows/*.yml`.

use crate::models::ecosystem::{ecosystem_names, is_known_ecosystem};
use crate::models::{CustomFileDecl, Ecosystem};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use globset::{GlobBuilder, GlobMatcher};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use thiserror::Error;
use walkdir::WalkDir;

/// A manifest file found in a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFile {
    pub ecosystem: String,
    pub filename: String,
}

/// Manifest files grouped by canonical directory, directories in sorted order.
///
/// Duplicate `(ecosystem, filename)` pairs are kept as recorded; consumers
/// collapse them through [`DirectoryManifest::ecosystems_in`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryManifest {
    directories: BTreeMap<String, Vec<ManifestFile>>,
}

impl DirectoryManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a manifest file under `directory` (already canonical).
    pub fn push(&mut self, directory: &str, ecosystem: &str, filename: &str) {
        self.directories
            .entry(directory.to_string())
            .or_default()
            .push(ManifestFile {
                ecosystem: ecosystem.to_string(),
                filename: filename.to_string(),
            });
    }

    /// Directories with their raw file lists, in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ManifestFile])> {
        self.directories
            .iter()
            .map(|(dir, files)| (dir.as_str(), files.as_slice()))
    }

    pub fn files(&self, directory: &str) -> Option<&[ManifestFile]> {
        self.directories.get(directory).map(Vec::as_slice)
    }

    /// Distinct ecosystems present in a directory, sorted.
    pub fn ecosystems_in(&self, directory: &str) -> BTreeSet<&str> {
        self.files(directory)
            .unwrap_or_default()
            .iter()
            .map(|f| f.ecosystem.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.directories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }
}

/// Canonical directory of a root-relative, `/`-separated file path.
///
/// `requirements.txt` → `/`, `services/api/go.mod` → `/services/api`.
pub fn canonical_directory(relative_file: &str) -> String {
    match relative_file.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => format!("/{}", dir),
        _ => "/".to_string(),
    }
}

fn basename(relative_file: &str) -> &str {
    relative_file
        .rsplit_once('/')
        .map_or(relative_file, |(_, name)| name)
}

fn is_hidden(component: &str) -> bool {
    component.starts_with('.') && component != "." && component != ".."
}

/// Literal path segments of a pattern that start with `.`.
fn literal_hidden_segments(pattern: &str) -> HashSet<String> {
    pattern
        .split('/')
        .filter(|seg| is_hidden(seg) && !seg.contains(['*', '?', '[', '{']))
        .map(str::to_string)
        .collect()
}

struct PatternMatcher {
    ecosystem: &'static str,
    pattern: &'static str,
    matcher: GlobMatcher,
    hidden_allowed: HashSet<String>,
}

impl PatternMatcher {
    fn matches(&self, relative_file: &str) -> bool {
        let hidden_ok = relative_file
            .split('/')
            .filter(|c| is_hidden(c))
            .all(|c| self.hidden_allowed.contains(c));
        hidden_ok && self.matcher.is_match(relative_file)
    }
}

/// Scanner over a fixed ecosystem table.
pub struct ManifestScanner {
    matchers: Vec<PatternMatcher>,
    /// Hidden names spelled literally by any pattern; the walk only enters these.
    hidden_allowed: HashSet<String>,
}

impl ManifestScanner {
    /// Compile every pattern of the table.
    ///
    /// # Errors
    /// Fails if a pattern is not a valid glob.
    pub fn new(table: &'static [Ecosystem]) -> Result<Self> {
        let mut matchers = Vec::new();
        let mut hidden_allowed = HashSet::new();

        for ecosystem in table {
            for &pattern in ecosystem.patterns {
                let glob = GlobBuilder::new(pattern)
                    .literal_separator(true)
                    .build()
                    .with_context(|| format!("invalid manifest glob: {pattern:?}"))?;
                let hidden = literal_hidden_segments(pattern);
                hidden_allowed.extend(hidden.iter().cloned());
                matchers.push(PatternMatcher {
                    ecosystem: ecosystem.name,
                    pattern,
                    matcher: glob.compile_matcher(),
                    hidden_allowed: hidden,
                });
            }
        }

        Ok(Self {
            matchers,
            hidden_allowed,
        })
    }

    /// Scan the repository rooted at `root`.
    ///
    /// Files are visited per (ecosystem, pattern) in table order and, within a
    /// pattern, in path order. Walk errors are logged and the offending entry is
    /// left out of the result.
    pub fn scan(&self, root: &Utf8Path) -> DirectoryManifest {
        let files = self.collect_files(root);
        let mut manifest = DirectoryManifest::new();

        for pm in &self.matchers {
            for relative_file in files.iter().filter(|f| pm.matches(f)) {
                let directory = canonical_directory(relative_file);
                let filename = basename(relative_file);
                manifest.push(&directory, pm.ecosystem, filename);
                tracing::debug!(
                    manager = pm.ecosystem,
                    directory = %directory,
                    file = filename,
                    pattern = pm.pattern,
                    "Detected package manager in directory"
                );
            }
        }

        manifest
    }

    /// Root-relative, `/`-separated paths of every regular file, sorted.
    fn collect_files(&self, root: &Utf8Path) -> Vec<String> {
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| !is_hidden(name) || self.hidden_allowed.contains(name))
            });

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(root = %root, error = %e, "Error walking repository, skipping entry");
                    continue;
                }
            };

            // Symlinks count when they resolve to a regular file.
            let is_file = entry.file_type().is_file()
                || (entry.file_type().is_symlink() && entry.path().is_file());
            if !is_file {
                continue;
            }

            let Some(relative) = entry
                .path()
                .strip_prefix(root)
                .ok()
                .and_then(Utf8Path::from_path)
            else {
                tracing::warn!(path = %entry.path().display(), "Skipping non UTF-8 path");
                continue;
            };

            let relative = relative
                .components()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join("/");
            files.push(relative);
        }

        files.sort();
        files
    }
}

/// Why a custom file declaration was rejected.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CustomFileError {
    #[error("custom file entry missing required fields (path, manager)")]
    MissingFields,

    #[error("invalid package manager {manager:?} for custom file {path}")]
    UnknownEcosystem { manager: String, path: String },

    #[error("custom file {path} resolves outside the repository")]
    OutsideRepository { path: String },

    #[error("custom file not found: {full_path}")]
    NotFound { path: String, full_path: Utf8PathBuf },
}

/// A validated custom file, ready to merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCustomFile {
    pub directory: String,
    pub ecosystem: String,
    pub filename: String,
}

/// Validate one declaration against the known ecosystems and the filesystem.
pub fn resolve_custom_file(
    root: &Utf8Path,
    decl: &CustomFileDecl,
) -> Result<ResolvedCustomFile, CustomFileError> {
    let (Some(path), Some(manager)) = (decl.path.as_deref(), decl.manager.as_deref()) else {
        return Err(CustomFileError::MissingFields);
    };

    if !is_known_ecosystem(manager) {
        return Err(CustomFileError::UnknownEcosystem {
            manager: manager.to_string(),
            path: path.to_string(),
        });
    }

    let relative = normalize_relative(path).ok_or_else(|| CustomFileError::OutsideRepository {
        path: path.to_string(),
    })?;

    let full_path = root.join(&relative);
    if relative.is_empty() || !full_path.is_file() {
        return Err(CustomFileError::NotFound {
            path: path.to_string(),
            full_path,
        });
    }

    Ok(ResolvedCustomFile {
        directory: canonical_directory(&relative),
        ecosystem: manager.to_string(),
        filename: basename(&relative).to_string(),
    })
}

/// Lexically normalize a repository path: leading `/` and `.` are dropped and
/// `..` pops a component. Returns `None` when `..` climbs above the root.
fn normalize_relative(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

/// Fold custom file declarations into the manifest.
///
/// Invalid declarations are logged and skipped. Returns how many were added.
pub fn merge_custom_files(
    root: &Utf8Path,
    custom_files: &[CustomFileDecl],
    manifest: &mut DirectoryManifest,
) -> usize {
    if custom_files.is_empty() {
        return 0;
    }

    tracing::info!(count = custom_files.len(), "Processing custom file specifications");

    let mut added = 0;
    for decl in custom_files {
        match resolve_custom_file(root, decl) {
            Ok(resolved) => {
                manifest.push(&resolved.directory, &resolved.ecosystem, &resolved.filename);
                tracing::info!(
                    manager = %resolved.ecosystem,
                    directory = %resolved.directory,
                    file = %resolved.filename,
                    "Added custom file to directory managers"
                );
                added += 1;
            }
            Err(e) => log_rejected_custom_file(decl, &e),
        }
    }

    added
}

fn log_rejected_custom_file(decl: &CustomFileDecl, error: &CustomFileError) {
    match error {
        CustomFileError::MissingFields => {
            tracing::error!(entry = ?decl, error = %error, "Custom file entry missing required fields");
        }
        CustomFileError::UnknownEcosystem { .. } => {
            tracing::error!(
                entry = ?decl,
                valid_managers = ?ecosystem_names(),
                error = %error,
                "Invalid package manager specified in custom file"
            );
        }
        CustomFileError::OutsideRepository { .. } => {
            tracing::warn!(entry = ?decl, error = %error, "Custom file outside repository");
        }
        CustomFileError::NotFound { full_path, .. } => {
            tracing::warn!(
                entry = ?decl,
                full_path = %full_path,
                error = %error,
                "Custom file not found"
            );
        }
    }
}
