/// A package ecosystem and the manifest globs that signal its presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ecosystem {
    pub name: &'static str,
    pub patterns: &'static [&'static str],
}

/// Ecosystem identifier that receives the mid-week schedule.
pub const DOCKER: &str = "docker";

/// Every ecosystem the scanner knows about, in scan order.
///
/// Patterns are relative to the repository root. `**` spans any number of
/// directories (including none) and `*` never crosses a `/`.
pub static ECOSYSTEMS: &[Ecosystem] = &[
    Ecosystem {
        name: "bundler",
        patterns: &["**/Gemfile", "**/Gemfile.lock"],
    },
    Ecosystem {
        name: "cargo",
        patterns: &["**/Cargo.toml", "**/Cargo.lock"],
    },
    Ecosystem {
        name: "composer",
        patterns: &["**/composer.json", "**/composer.lock"],
    },
    Ecosystem {
        name: DOCKER,
        patterns: &["**/Dockerfile"],
    },
    Ecosystem {
        name: "elm",
        patterns: &["**/elm.json"],
    },
    Ecosystem {
        name: "github-actions",
        patterns: &[".github/workflows/*.yml", ".github/workflows/*.yaml"],
    },
    Ecosystem {
        name: "gomod",
        patterns: &["**/go.mod", "**/go.sum"],
    },
    Ecosystem {
        name: "gradle",
        patterns: &["**/build.gradle", "**/build.gradle.kts"],
    },
    Ecosystem {
        name: "maven",
        patterns: &["**/pom.xml"],
    },
    Ecosystem {
        name: "npm",
        patterns: &["**/package.json", "**/package-lock.json", "**/yarn.lock"],
    },
    Ecosystem {
        name: "nuget",
        patterns: &["**/*.csproj", "**/packages.config"],
    },
    Ecosystem {
        name: "pip",
        patterns: &[
            // requirements_prod.txt, requirements-dev.txt, ...
            "**/requirements*.txt",
            "**/pyproject.toml",
            "**/poetry.lock",
            "**/Pipfile",
            "**/Pipfile.lock",
        ],
    },
    Ecosystem {
        name: "pub",
        patterns: &["**/pubspec.yaml", "**/pubspec.lock"],
    },
    Ecosystem {
        name: "swift",
        patterns: &["**/Package.swift"],
    },
    Ecosystem {
        name: "terraform",
        patterns: &["**/.terraform.lock.hcl"],
    },
];

/// Look up an ecosystem by identifier.
pub fn find_ecosystem(name: &str) -> Option<&'static Ecosystem> {
    ECOSYSTEMS.iter().find(|e| e.name == name)
}

/// Check whether `name` is a known ecosystem identifier.
pub fn is_known_ecosystem(name: &str) -> bool {
    find_ecosystem(name).is_some()
}

/// All known ecosystem identifiers, in table order.
pub fn ecosystem_names() -> Vec<&'static str> {
    ECOSYSTEMS.iter().map(|e| e.name).collect()
}
