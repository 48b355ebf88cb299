use crate::metrics::Metrics;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fs;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use walkdir::WalkDir;

/// Environment variable naming the organization whose reusable workflows are excluded.
pub const ORG_PREFIX_ENV: &str = "ORGANIZATION_PREFIX";

/// Default pinning tool executable.
pub const DEFAULT_PINACT_BIN: &str = "pinact";

/// Default per-workflow tool timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default directory searched for workflows.
pub const DEFAULT_WORKFLOWS_DIR: &str = "./.github/workflows";

/// Errors that can occur while pinning workflows
#[derive(Error, Debug)]
pub enum PinError {
    #[error("ORGANIZATION_PREFIX environment variable must be set")]
    MissingOrganizationPrefix,

    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with code {code:?}")]
    ExitStatus {
        tool: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

/// Validate an organization prefix value; missing or empty is an error.
pub fn organization_prefix(value: Option<String>) -> Result<String, PinError> {
    match value {
        Some(prefix) if !prefix.is_empty() => Ok(prefix),
        _ => {
            tracing::error!("ORGANIZATION_PREFIX environment variable is required but not set");
            Err(PinError::MissingOrganizationPrefix)
        }
    }
}

/// Read the organization prefix from [`ORG_PREFIX_ENV`].
pub fn organization_prefix_from_env() -> Result<String, PinError> {
    organization_prefix(std::env::var(ORG_PREFIX_ENV).ok())
}

/// Workflow files under `base` that don't call the organization's reusable workflows.
///
/// Files are `.yml`/`.yaml`, searched recursively. A file whose content contains
/// `uses: <org_prefix>/` is excluded. Unreadable files and walk errors (including
/// a missing `base`) are logged and left out. The result is sorted.
pub fn find_valid_workflows(base: &Utf8Path, org_prefix: &str) -> Vec<Utf8PathBuf> {
    tracing::info!(base_path = %base, org_prefix, "Searching for workflow files");

    let exclusion_pattern = format!("uses: {}/", org_prefix);
    let mut valid_workflows = Vec::new();

    for entry in WalkDir::new(base) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!(base_path = %base, error = %e, "Error walking directory");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(path) = Utf8PathBuf::try_from(entry.into_path()) else {
            tracing::warn!(base_path = %base, "Skipping non UTF-8 path");
            continue;
        };

        if !matches!(path.extension(), Some("yml" | "yaml")) {
            continue;
        }

        tracing::debug!(path = %path, "Checking potential workflow file");

        match fs::read_to_string(&path) {
            Ok(content) if content.contains(&exclusion_pattern) => {
                tracing::debug!(path = %path, pattern = %exclusion_pattern, "Skipping reusable workflow");
            }
            Ok(_) => {
                tracing::debug!(path = %path, "Found valid workflow file");
                valid_workflows.push(path);
            }
            Err(e) => {
                tracing::error!(path = %path, error = %e, "Error reading workflow file, skipping");
            }
        }
    }

    valid_workflows.sort();

    tracing::info!(
        count = valid_workflows.len(),
        org_prefix,
        "Finished searching for workflow files"
    );
    valid_workflows
}

/// Options of one pinning run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinOptions {
    pub workflows_dir: Utf8PathBuf,
    pub force: bool,
    pub pinact_bin: String,
    pub timeout: Duration,
}

impl Default for PinOptions {
    fn default() -> Self {
        Self {
            workflows_dir: Utf8PathBuf::from(DEFAULT_WORKFLOWS_DIR),
            force: false,
            pinact_bin: DEFAULT_PINACT_BIN.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Outcome of a pinning run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinSummary {
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
    pub elapsed: Duration,
}

/// Successful tool invocation
#[derive(Debug, Clone)]
pub struct PinOutput {
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

/// Service for detecting unpinned action references and running the pinning tool
///
/// Regexes are compiled once at construction:
/// - `uses_pattern`: `^\s*-?\s*uses:\s*(\S+)` captures the referenced action
/// - `sha_pattern`: `@[a-f0-9]{40}` recognizes a full commit SHA pin
pub struct PinningService {
    uses_pattern: Regex,
    sha_pattern: Regex,
    pinact_bin: String,
    timeout: Duration,
}

impl PinningService {
    pub fn new(pinact_bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            uses_pattern: Regex::new(r"^\s*-?\s*uses:\s*(\S+)").expect("Invalid uses regex"),
            sha_pattern: Regex::new(r"@[a-f0-9]{40}").expect("Invalid SHA pin regex"),
            pinact_bin: pinact_bin.into(),
            timeout,
        }
    }

    /// First action reference in `content` not pinned to a commit SHA, with its
    /// 1-based line number.
    pub fn first_unpinned_reference<'a>(&self, content: &'a str) -> Option<(usize, &'a str)> {
        for (index, line) in content.lines().enumerate() {
            let Some(captures) = self.uses_pattern.captures(line) else {
                continue;
            };
            let reference = captures.get(1).map_or("", |m| m.as_str()).trim();

            if self.sha_pattern.is_match(reference) {
                tracing::debug!(line = index + 1, action = reference, "Action is already pinned");
            } else {
                return Some((index + 1, reference));
            }
        }
        None
    }

    /// Whether `path` has at least one unpinned action reference.
    ///
    /// A file that cannot be read is logged and reported as not needing pinning.
    pub fn needs_pinning(&self, path: &Utf8Path) -> bool {
        tracing::debug!(workflow_path = %path, "Checking workflow for pinning needs");

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::error!(path = %path, error = %e, "Error reading workflow file during check");
                return false;
            }
        };

        match self.first_unpinned_reference(&content) {
            Some((line, action)) => {
                tracing::info!(workflow = %path, line, action, "Found unpinned action");
                true
            }
            None => {
                tracing::debug!(workflow_path = %path, "Finished check: No unpinned actions found");
                false
            }
        }
    }

    /// Run `<tool> run -u <workflow>` with the configured timeout.
    ///
    /// A child still running at the deadline is killed.
    pub async fn pin_workflow(&self, workflow: &Utf8Path) -> Result<PinOutput, PinError> {
        tracing::info!(
            workflow = %workflow,
            command = %format!("{} run -u {}", self.pinact_bin, workflow),
            "Attempting to pin workflow"
        );

        let start = Instant::now();

        let child = Command::new(&self.pinact_bin)
            .args(["run", "-u", workflow.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PinError::Spawn {
                tool: self.pinact_bin.clone(),
                source,
            })?;

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| PinError::Timeout(self.timeout))?
            .map_err(|source| PinError::Spawn {
                tool: self.pinact_bin.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(PinError::ExitStatus {
                tool: self.pinact_bin.clone(),
                code: output.status.code(),
                stdout,
                stderr,
            });
        }

        Ok(PinOutput {
            stdout,
            stderr,
            duration: start.elapsed(),
        })
    }

    /// Pin each workflow in order, continuing past failures.
    pub async fn pin_workflows(&self, workflows: &[Utf8PathBuf], metrics: &Metrics) {
        tracing::info!(total_workflows = workflows.len(), "Starting pinact execution");

        for workflow in workflows {
            let start = Instant::now();
            let result = self.pin_workflow(workflow).await;
            metrics.record_tool_time(start.elapsed());

            match result {
                Ok(output) => {
                    tracing::info!(
                        workflow = %workflow,
                        stdout = %output.stdout,
                        duration_secs = output.duration.as_secs_f64(),
                        "pinact executed successfully"
                    );
                    if !output.stderr.is_empty() {
                        tracing::warn!(workflow = %workflow, stderr = %output.stderr, "pinact produced stderr output");
                    }
                    metrics.record_pinned();
                }
                Err(PinError::ExitStatus { code, stdout, stderr, .. }) => {
                    tracing::error!(
                        workflow = %workflow,
                        return_code = ?code,
                        stdout = %stdout,
                        stderr = %stderr,
                        "pinact command failed"
                    );
                    metrics.record_failed();
                }
                Err(PinError::Timeout(limit)) => {
                    tracing::error!(workflow = %workflow, timeout_secs = limit.as_secs(), "pinact command timed out");
                    metrics.record_failed();
                }
                Err(e) => {
                    tracing::error!(workflow = %workflow, error = %e, "Unexpected error during pinact execution");
                    metrics.record_failed();
                }
            }
        }

        if metrics.failed() > 0 {
            tracing::warn!(failed = metrics.failed(), "Some workflows failed to pin");
        }
    }
}

impl Default for PinningService {
    fn default() -> Self {
        Self::new(DEFAULT_PINACT_BIN, DEFAULT_TIMEOUT)
    }
}

/// Discover, filter, and pin workflows.
///
/// Only a missing organization prefix is an error; per-workflow failures are
/// counted in the summary.
pub async fn run(options: &PinOptions, org_prefix: &str) -> PinSummary {
    tracing::info!(
        repo_path = %options.workflows_dir,
        force = options.force,
        pinact_bin = %options.pinact_bin,
        "Starting workflow pinning"
    );

    let metrics = Metrics::new();
    let service = PinningService::new(options.pinact_bin.clone(), options.timeout);

    let base = absolute_path(&options.workflows_dir);
    let candidates = find_valid_workflows(&base, org_prefix);
    tracing::info!(count = candidates.len(), "Found potential workflows");

    let workflows: Vec<Utf8PathBuf> = if options.force {
        tracing::info!("Force mode enabled: pinning all workflows regardless of current pin status");
        candidates
    } else {
        candidates
            .into_iter()
            .filter(|workflow| {
                let needed = service.needs_pinning(workflow);
                if !needed {
                    metrics.record_skipped();
                }
                needed
            })
            .collect()
    };

    if workflows.is_empty() {
        tracing::info!("No workflows require pinning");
    } else {
        tracing::info!(count = workflows.len(), paths = ?workflows, "Identified workflows requiring pinning");
        service.pin_workflows(&workflows, &metrics).await;
    }

    metrics.log_summary();

    PinSummary {
        success: metrics.pinned(),
        failed: metrics.failed(),
        skipped: metrics.skipped(),
        total: metrics.attempted(),
        elapsed: metrics.elapsed(),
    }
}

/// `path` made absolute against the working directory; left unchanged if that fails.
fn absolute_path(path: &Utf8Path) -> Utf8PathBuf {
    std::path::absolute(path)
        .ok()
        .and_then(|p| Utf8PathBuf::try_from(p).ok())
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PINNED: &str = "actions/checkout@0123456789abcdef0123456789abcdef01234567";

    fn utf8_dir(temp_dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_organization_prefix() {
        assert_eq!(organization_prefix(Some("acme".to_string())).unwrap(), "acme");
        assert!(matches!(
            organization_prefix(None),
            Err(PinError::MissingOrganizationPrefix)
        ));
        assert!(matches!(
            organization_prefix(Some(String::new())),
            Err(PinError::MissingOrganizationPrefix)
        ));
    }

    #[test]
    fn test_first_unpinned_reference() {
        let service = PinningService::default();
        let content = format!(
            "jobs:\n  build:\n    steps:\n      - uses: {PINNED}\n      - name: setup\n        uses: actions/setup-python@v5\n      - uses: actions/cache@v4\n"
        );
        assert_eq!(
            service.first_unpinned_reference(&content),
            Some((6, "actions/setup-python@v5"))
        );
    }

    #[test]
    fn test_fully_pinned_content() {
        let service = PinningService::default();
        let content = format!("steps:\n  - uses: {PINNED} # v4\n");
        assert_eq!(service.first_unpinned_reference(&content), None);
        assert_eq!(service.first_unpinned_reference("name: ci\n"), None);
    }

    #[test]
    fn test_uppercase_sha_is_not_a_pin() {
        let service = PinningService::default();
        let content = "- uses: actions/checkout@0123456789ABCDEF0123456789ABCDEF01234567\n";
        assert!(service.first_unpinned_reference(content).is_some());
    }

    #[test]
    fn test_needs_pinning_unreadable_is_false() {
        let temp_dir = TempDir::new().unwrap();
        let service = PinningService::default();
        assert!(!service.needs_pinning(&utf8_dir(&temp_dir).join("missing.yml")));
    }

    #[test]
    fn test_find_valid_workflows_filters() {
        let temp_dir = TempDir::new().unwrap();
        let base = utf8_dir(&temp_dir);
        fs::write(base.join("ci.yml"), "- uses: actions/checkout@v4\n").unwrap();
        fs::write(base.join("release.yaml"), "- uses: actions/checkout@v4\n").unwrap();
        fs::write(base.join("shared.yml"), "- uses: acme/workflows/.github/workflows/x.yml@main\n").unwrap();
        fs::write(base.join("notes.txt"), "- uses: actions/checkout@v4\n").unwrap();
        fs::create_dir(base.join("nested")).unwrap();
        fs::write(base.join("nested/deep.yml"), "name: deep\n").unwrap();

        let found = find_valid_workflows(&base, "acme");

        assert_eq!(
            found,
            vec![base.join("ci.yml"), base.join("nested/deep.yml"), base.join("release.yaml")]
        );
    }

    #[test]
    fn test_find_valid_workflows_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        let found = find_valid_workflows(&utf8_dir(&temp_dir).join("absent"), "acme");
        assert!(found.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pin_workflow_exit_codes() {
        let temp_dir = TempDir::new().unwrap();
        let workflow = utf8_dir(&temp_dir).join("ci.yml");
        fs::write(&workflow, "- uses: actions/checkout@v4\n").unwrap();

        let ok = PinningService::new("true", Duration::from_secs(10));
        assert!(ok.pin_workflow(&workflow).await.is_ok());

        let failing = PinningService::new("false", Duration::from_secs(10));
        assert!(matches!(
            failing.pin_workflow(&workflow).await,
            Err(PinError::ExitStatus { code: Some(1), .. })
        ));
    }

    #[tokio::test]
    async fn test_pin_workflow_missing_tool() {
        let service = PinningService::new("definitely-not-a-real-pinning-tool", Duration::from_secs(5));
        let result = service.pin_workflow(Utf8Path::new("ci.yml")).await;
        assert!(matches!(result, Err(PinError::Spawn { .. })));
    }
}
