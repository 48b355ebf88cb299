use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;

/// Settings overlay loaded from `.github/.configurator_settings.yml`.
///
/// Each field collects one rule category across every entry of the overlay,
/// in file order. A missing overlay is simply `Settings::default()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub ignore_dependencies: Vec<IgnoreDependencyRule>,
    pub ignore_directories: Vec<String>,
    pub ignore_file_patterns: Vec<String>,
    pub registries: Vec<RegistryDecl>,
    pub custom_files: Vec<CustomFileDecl>,
}

impl Settings {
    /// True when no category holds any rule.
    pub fn is_empty(&self) -> bool {
        self.ignore_dependencies.is_empty()
            && self.ignore_directories.is_empty()
            && self.ignore_file_patterns.is_empty()
            && self.registries.is_empty()
            && self.custom_files.is_empty()
    }
}

/// `ignore-dependency` rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IgnoreDependencyRule {
    #[serde(default)]
    pub package_ecosystem: Option<String>,

    #[serde(default)]
    pub dependency_name: Option<String>,

    #[serde(default)]
    pub update_types: Vec<String>,
}

/// `custom-files` declaration: a manifest the glob table would not find.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFileDecl {
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default, alias = "package-ecosystem")]
    pub manager: Option<String>,
}

/// A registry declaration exactly as written, keys in declaration order.
///
/// Validation happens later in the registry resolver; the loader keeps every
/// field so that credentials and extra keys pass through untouched.
pub type RegistryDecl = IndexMap<String, Value>;

/// Recognized top-level keys of a settings entry.
pub const KEY_IGNORE_DEPENDENCY: &str = "ignore-dependency";
pub const KEY_IGNORE_DIRECTORY: &str = "ignore-directory";
pub const KEY_IGNORE_FILES: &str = "ignore-version-updates-for-files";
pub const KEY_REGISTRIES: &str = "registries";
pub const KEY_CUSTOM_FILES: &str = "custom-files";
