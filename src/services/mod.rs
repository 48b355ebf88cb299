//! Services module - the generator pipeline and the workflow pinning runner.
//!
//! # Components
//!
//! - [`scanner`]: walks the repository, matches manifests against the ecosystem
//!   table, and folds in custom file declarations
//! - [`registry`]: validates registry declarations and answers which registries
//!   apply to an ecosystem
//! - [`synthesis`]: turns the directory manifest into ordered version and
//!   security update entries, then applies ignore-dependency rules
//! - [`generator`]: runs the whole pipeline and writes `.github/dependabot.yml`
//! - [`pinning`]: finds workflows with unpinned action references and runs the
//!   external pinning tool on them
//!
//! Everything here except [`pinning`] is synchronous and does no I/O beyond
//! reading the repository tree and writing the output file.

pub mod generator;
pub mod pinning;
pub mod registry;
pub mod scanner;
pub mod synthesis;

pub use generator::{GenerateOptions, GenerationReport, generate};
pub use pinning::{PinError, PinOptions, PinSummary, PinningService, find_valid_workflows};
pub use registry::{RegistryError, RegistryMap};
pub use scanner::{CustomFileError, DirectoryManifest, ManifestScanner, merge_custom_files};
pub use synthesis::{EntrySynthesizer, SynthesisOptions, apply_ignore_dependencies};
