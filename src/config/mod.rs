use crate::models::settings::{
    KEY_CUSTOM_FILES, KEY_IGNORE_DEPENDENCY, KEY_IGNORE_DIRECTORY, KEY_IGNORE_FILES,
    KEY_REGISTRIES,
};
use crate::models::{CustomFileDecl, IgnoreDependencyRule, RegistryDecl, Settings};
use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use serde::de::DeserializeOwned;
use serde_yaml_ng::Value;
use std::fs;

/// Directory under the repository root holding both files.
pub const GITHUB_DIR: &str = ".github";

/// Settings overlay file name inside [`GITHUB_DIR`].
pub const SETTINGS_FILE: &str = ".configurator_settings.yml";

/// Generated configuration file name inside [`GITHUB_DIR`].
pub const OUTPUT_FILE: &str = "dependabot.yml";

/// Configuration manager for the repository metadata directory.
///
/// Manages two files under `<repo>/.github/`:
/// - Settings overlay (`.configurator_settings.yml`): optional user rules
/// - Output (`dependabot.yml`): the generated policy, overwritten on every run
#[derive(Debug, Clone)]
pub struct ConfigManager {
    repo_root: Utf8PathBuf,
    github_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
    output_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager rooted at the repository directory.
    ///
    /// Nothing is created on disk until [`ConfigManager::ensure_github_dir`] or
    /// [`ConfigManager::write_output`] runs.
    pub fn new<P: AsRef<Utf8Path>>(repo_root: P) -> Self {
        let repo_root = repo_root.as_ref().to_path_buf();
        let github_dir = repo_root.join(GITHUB_DIR);

        Self {
            settings_path: github_dir.join(SETTINGS_FILE),
            output_path: github_dir.join(OUTPUT_FILE),
            github_dir,
            repo_root,
        }
    }

    /// Load the settings overlay.
    ///
    /// # Returns
    /// The parsed Settings, or empty Settings if the file doesn't exist
    ///
    /// # Errors
    /// Fails if the file cannot be read, is not valid YAML, or its top level
    /// is not a sequence. Individual malformed entries are logged and skipped.
    pub fn load_settings(&self) -> Result<Settings> {
        if !self.settings_path.is_file() {
            tracing::info!(file = %self.settings_path, "No configurator settings found");
            return Ok(Settings::default());
        }

        tracing::info!(file = %self.settings_path, "Loading configurator settings");

        let file_contents = fs::read_to_string(&self.settings_path)
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        let settings = parse_settings(&file_contents)
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        if settings.is_empty() {
            tracing::info!(file = %self.settings_path, "No configurator settings found");
        } else {
            tracing::info!(
                file = %self.settings_path,
                count_dependencies = settings.ignore_dependencies.len(),
                count_directories = settings.ignore_directories.len(),
                count_file_patterns = settings.ignore_file_patterns.len(),
                count_registries = settings.registries.len(),
                count_custom_files = settings.custom_files.len(),
                "Configurator settings loaded"
            );
        }

        Ok(settings)
    }

    /// Create `<repo>/.github` if it doesn't exist.
    pub fn ensure_github_dir(&self) -> Result<()> {
        if !self.github_dir.exists() {
            fs::create_dir_all(&self.github_dir)
                .with_context(|| format!("Failed to create directory: {}", self.github_dir))?;
        }
        tracing::debug!(path = %self.github_dir, "Ensured .github directory exists");
        Ok(())
    }

    /// Write the rendered document over `dependabot.yml`.
    ///
    /// The text goes to a sibling temporary file first and is then renamed
    /// into place, so readers never observe a half-written document.
    pub fn write_output(&self, contents: &str) -> Result<()> {
        self.ensure_github_dir()?;

        let temp_path = self.github_dir.join(format!(".{}.tmp", OUTPUT_FILE));
        fs::write(&temp_path, contents)
            .with_context(|| format!("Failed to write temporary output: {}", temp_path))?;
        fs::rename(&temp_path, &self.output_path)
            .with_context(|| format!("Failed to replace output: {}", self.output_path))?;

        tracing::info!(path = %self.output_path, "Saved generated dependabot configuration");
        Ok(())
    }

    /// Get the repository root.
    pub fn repo_root(&self) -> &Utf8Path {
        &self.repo_root
    }

    /// Get the settings overlay path.
    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }

    /// Get the generated configuration path.
    pub fn output_path(&self) -> &Utf8Path {
        &self.output_path
    }
}

/// Parse settings overlay text.
///
/// The overlay is a sequence of single-key maps. Every recognized key is folded
/// into its typed category; an unrecognized key or a malformed value is logged
/// and skipped without failing the whole load.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    let document: Value = serde_yaml_ng::from_str(contents)?;

    let entries = match document {
        Value::Null => return Ok(Settings::default()),
        Value::Sequence(entries) => entries,
        other => bail!(
            "expected a list of settings entries, found {}",
            value_kind(&other)
        ),
    };

    let mut settings = Settings::default();

    for (index, entry) in entries.into_iter().enumerate() {
        let Value::Mapping(mapping) = entry else {
            tracing::error!(index, "Settings entry is not a mapping, skipping");
            continue;
        };

        // Every recognized key in one entry is processed, not just the first.
        for (key, value) in mapping {
            let Some(key) = key.as_str() else {
                tracing::warn!(index, "Settings entry has a non-string key, skipping");
                continue;
            };

            match key {
                KEY_IGNORE_DEPENDENCY => {
                    extend_from::<IgnoreDependencyRule>(
                        &mut settings.ignore_dependencies,
                        key,
                        index,
                        value,
                    );
                }
                KEY_IGNORE_DIRECTORY => {
                    extend_from::<String>(&mut settings.ignore_directories, key, index, value);
                }
                KEY_IGNORE_FILES => {
                    extend_from::<String>(&mut settings.ignore_file_patterns, key, index, value);
                }
                KEY_REGISTRIES => {
                    extend_from::<RegistryDecl>(&mut settings.registries, key, index, value);
                }
                KEY_CUSTOM_FILES => {
                    extend_from::<CustomFileDecl>(&mut settings.custom_files, key, index, value);
                }
                unknown => {
                    tracing::warn!(index, key = unknown, "Unrecognized settings key, skipping");
                }
            }
        }
    }

    Ok(settings)
}

fn extend_from<T: DeserializeOwned>(target: &mut Vec<T>, key: &str, index: usize, value: Value) {
    if value.is_null() {
        tracing::warn!(index, key, "Settings entry is empty");
        return;
    }

    let items = match serde_yaml_ng::from_value::<Vec<Value>>(value) {
        Ok(items) => items,
        Err(e) => {
            tracing::error!(index, key, error = %e, "Malformed settings entry, skipping");
            return;
        }
    };

    for (item_index, item) in items.into_iter().enumerate() {
        match serde_yaml_ng::from_value::<T>(item) {
            Ok(parsed) => target.push(parsed),
            Err(e) => {
                tracing::error!(
                    index,
                    key,
                    item_index,
                    error = %e,
                    "Malformed settings item, skipping"
                );
            }
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
