//! Data models for the configurator.
//!
//! - [`ECOSYSTEMS`]: the static table of package ecosystems and their manifest globs
//! - [`Settings`]: the typed settings overlay loaded from `.configurator_settings.yml`
//! - [`DependabotConfig`] / [`UpdateEntry`]: the generated `dependabot.yml` document
//!
//! The dependabot structs derive `Serialize` with kebab-case keys, and their
//! field order is the key order of the written document.

pub mod dependabot;
pub mod ecosystem;
pub mod settings;

pub use dependabot::{
    AllowRule, AppliesTo, DependabotConfig, DependencyType, Group, IgnoreBlock, Schedule,
    UpdateEntry, UpdateKind, SECURITY_GROUP,
};
pub use ecosystem::{ECOSYSTEMS, Ecosystem, is_known_ecosystem};
pub use settings::{CustomFileDecl, IgnoreDependencyRule, RegistryDecl, Settings};
