//! End-to-end tests for the policy generator
//!
//! Each test builds a throwaway repository, runs the generator, and re-parses
//! the written `.github/dependabot.yml`.

use camino::{Utf8Path, Utf8PathBuf};
use dependabot_configurator::services::SynthesisOptions;
use dependabot_configurator::{GenerateOptions, generate};
use serde_yaml_ng::Value;
use std::fs;
use std::io;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn create_test_repo() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, root)
}

fn write_file(root: &Utf8Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn write_settings(root: &Utf8Path, yaml: &str) {
    write_file(root, ".github/.configurator_settings.yml", yaml);
}

fn options(root: &Utf8Path, limit: i64, transitive_security: bool) -> GenerateOptions {
    GenerateOptions {
        repo_path: root.to_path_buf(),
        synthesis: SynthesisOptions {
            open_pull_requests_limit: limit,
            target_branch: "main".to_string(),
            transitive_security,
        },
    }
}

fn run(root: &Utf8Path, limit: i64) -> (String, Value) {
    run_with(options(root, limit, false))
}

fn run_with(options: GenerateOptions) -> (String, Value) {
    let report = generate(&options).unwrap();
    let text = fs::read_to_string(&report.output_path).unwrap();
    let value = serde_yaml_ng::from_str(&text).unwrap();
    (text, value)
}

fn updates(document: &Value) -> &Vec<Value> {
    document["updates"].as_sequence().unwrap()
}

/// (directory, ecosystem, open-pull-requests-limit) per entry, in order
fn summary(document: &Value) -> Vec<(String, String, u64)> {
    updates(document)
        .iter()
        .map(|entry| {
            (
                entry["directory"].as_str().unwrap().to_string(),
                entry["package-ecosystem"].as_str().unwrap().to_string(),
                entry["open-pull-requests-limit"].as_u64().unwrap(),
            )
        })
        .collect()
}

fn is_security(entry: &Value) -> bool {
    entry["groups"].get("prodsec").is_some()
}

#[test]
fn test_empty_repository() {
    let (_temp_dir, root) = create_test_repo();

    let (text, document) = run(&root, 5);

    assert_eq!(text, "version: 2\nupdates: []\n");
    assert_eq!(document["version"].as_u64(), Some(2));
    assert!(root.join(".github").is_dir());
}

#[test]
fn test_root_pip_manifest() {
    let (_temp_dir, root) = create_test_repo();
    write_file(&root, "requirements.txt", "requests==2.31.0\n");

    let (text, document) = run(&root, 1);
    let entries = updates(&document);

    assert_eq!(entries.len(), 2);

    let version = &entries[0];
    assert_eq!(version["package-ecosystem"].as_str(), Some("pip"));
    assert_eq!(version["directory"].as_str(), Some("/"));
    assert_eq!(version["open-pull-requests-limit"].as_u64(), Some(1));
    assert_eq!(version["target-branch"].as_str(), Some("main"));
    assert_eq!(version["allow"][0]["dependency-type"].as_str(), Some("direct"));
    assert_eq!(version["groups"]["pip_updates"]["applies-to"].as_str(), Some("version-updates"));
    assert_eq!(version["schedule"]["time"].as_str(), Some("08:00"));
    assert_eq!(version["schedule"]["timezone"].as_str(), Some("America/Chicago"));

    let security = &entries[1];
    assert_eq!(security["open-pull-requests-limit"].as_u64(), Some(0));
    assert!(security.get("target-branch").is_none());
    assert_eq!(security["labels"][0].as_str(), Some("security-update"));
    assert_eq!(security["groups"]["prodsec"]["applies-to"].as_str(), Some("security-updates"));

    assert!(text.contains("  # / pip version updates\n  - package-ecosystem: pip\n"));
    assert!(text.contains("  # / pip security updates\n"));
    assert!(text.contains("time: \"08:00\""));
}

#[test]
fn test_multiple_manifests_collapse_per_ecosystem() {
    let (_temp_dir, root) = create_test_repo();
    write_file(&root, ".github/workflows/ci.yml", "name: ci\n");
    write_file(&root, ".github/workflows/release.yaml", "name: release\n");
    write_file(&root, "requirements.txt", "");
    write_file(&root, "requirements-dev.txt", "");
    write_file(&root, "pyproject.toml", "");

    let (text, document) = run(&root, 2);

    assert_eq!(
        summary(&document),
        vec![
            ("/".to_string(), "pip".to_string(), 2),
            ("/".to_string(), "pip".to_string(), 0),
            ("/.github/workflows".to_string(), "github-actions".to_string(), 2),
            ("/.github/workflows".to_string(), "github-actions".to_string(), 0),
        ]
    );
    assert!(text.contains("# .github/workflows github-actions version updates"));
    assert_eq!(
        updates(&document)[2]["groups"]
            .get("github_actions_updates")
            .and_then(|g| g["applies-to"].as_str()),
        Some("version-updates")
    );
}

#[test]
fn test_nested_directories_sorted() {
    let (_temp_dir, root) = create_test_repo();
    write_file(&root, "services/web/package.json", "{}");
    write_file(&root, "services/api/go.mod", "module api\n");
    write_file(&root, "Dockerfile", "FROM scratch\n");
    write_file(&root, "services/api/Dockerfile", "FROM scratch\n");

    let (_, document) = run(&root, 1);
    let units: Vec<(String, String)> = summary(&document)
        .into_iter()
        .map(|(dir, eco, _)| (dir, eco))
        .collect();

    assert_eq!(
        units,
        vec![
            ("/".to_string(), "docker".to_string()),
            ("/".to_string(), "docker".to_string()),
            ("/services/api".to_string(), "docker".to_string()),
            ("/services/api".to_string(), "docker".to_string()),
            ("/services/api".to_string(), "gomod".to_string()),
            ("/services/api".to_string(), "gomod".to_string()),
            ("/services/web".to_string(), "npm".to_string()),
            ("/services/web".to_string(), "npm".to_string()),
        ]
    );

    let docker = &updates(&document)[0];
    assert_eq!(docker["schedule"]["day"].as_str(), Some("wednesday"));
    assert_eq!(updates(&document)[4]["schedule"]["day"].as_str(), Some("monday"));
}

#[test]
fn test_hidden_directories_not_scanned() {
    let (_temp_dir, root) = create_test_repo();
    write_file(&root, ".venv/lib/requirements.txt", "");
    write_file(&root, ".cache/package.json", "{}");
    write_file(&root, "infra/.terraform.lock.hcl", "");

    let (_, document) = run(&root, 1);

    assert_eq!(
        summary(&document),
        vec![
            ("/infra".to_string(), "terraform".to_string(), 1),
            ("/infra".to_string(), "terraform".to_string(), 0),
        ]
    );
}

#[test]
fn test_zero_limit_emits_only_security() {
    let (_temp_dir, root) = create_test_repo();
    write_file(&root, "requirements.txt", "");
    write_file(&root, "web/package.json", "{}");

    let (_, document) = run(&root, 0);
    let entries = updates(&document);

    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(is_security));
}

#[test]
fn test_negative_limit_emits_only_security() {
    let (_temp_dir, root) = create_test_repo();
    write_file(&root, "requirements.txt", "");

    let (text, document) = run(&root, -1);
    let entries = updates(&document);

    assert_eq!(entries.len(), 1);
    assert!(is_security(&entries[0]));
    assert_eq!(entries[0]["open-pull-requests-limit"].as_u64(), Some(0));
    assert!(!text.contains("version updates"));
}

#[test]
fn test_transitive_security() {
    let (_temp_dir, root) = create_test_repo();
    write_file(&root, "Cargo.toml", "[package]\n");

    let (_, document) = run_with(options(&root, 1, true));
    let entries = updates(&document);

    assert_eq!(entries[0]["allow"][0]["dependency-type"].as_str(), Some("direct"));
    assert_eq!(entries[1]["allow"][0]["dependency-type"].as_str(), Some("all"));
}

#[test]
fn test_ignore_directory_keeps_security() {
    let (_temp_dir, root) = create_test_repo();
    write_file(&root, "legacy/requirements.txt", "");
    write_file(&root, "legacy/tools/package.json", "{}");
    write_file(&root, "legacy-v2/requirements.txt", "");
    write_settings(&root, "- ignore-directory:\n    - /legacy/\n");

    let (_, document) = run(&root, 1);

    assert_eq!(
        summary(&document),
        vec![
            ("/legacy".to_string(), "pip".to_string(), 0),
            ("/legacy-v2".to_string(), "pip".to_string(), 1),
            ("/legacy-v2".to_string(), "pip".to_string(), 0),
            ("/legacy/tools".to_string(), "npm".to_string(), 0),
        ]
    );
}

#[test]
fn test_file_pattern_ignore() {
    let (_temp_dir, root) = create_test_repo();
    write_file(&root, "requirements_dev.txt", "");
    write_file(&root, "package.json", "{}");
    write_settings(&root, "- ignore-version-updates-for-files:\n    - \"*_dev.txt\"\n");

    let (_, document) = run(&root, 1);

    assert_eq!(
        summary(&document),
        vec![
            ("/".to_string(), "npm".to_string(), 1),
            ("/".to_string(), "npm".to_string(), 0),
            ("/".to_string(), "pip".to_string(), 0),
        ]
    );
}

#[test]
fn test_ignore_dependency_only_on_version_entries() {
    let (_temp_dir, root) = create_test_repo();
    write_file(&root, "requirements.txt", "");
    write_file(&root, "package.json", "{}");
    write_settings(
        &root,
        r#"
- ignore-dependency:
    - package-ecosystem: pip
      dependency-name: django
      update-types: ["version-update:semver-major"]
    - package-ecosystem: pip
      dependency-name: celery
"#,
    );

    let (text, document) = run(&root, 1);
    let entries = updates(&document);

    for entry in entries {
        let ecosystem = entry["package-ecosystem"].as_str().unwrap();
        if ecosystem == "pip" && !is_security(entry) {
            let ignore = entry["ignore"].as_sequence().unwrap();
            assert_eq!(ignore.len(), 2);
            assert_eq!(ignore[0]["dependency-name"].as_str(), Some("django"));
            assert_eq!(
                ignore[0]["update-types"][0].as_str(),
                Some("version-update:semver-major")
            );
            assert_eq!(ignore[1]["update-types"].as_sequence().map(Vec::len), Some(0));
        } else {
            assert!(entry.get("ignore").is_none());
        }
    }
    assert!(text.contains("      - dependency-name: django\n        update-types:\n          - version-update:semver-major\n"));
}

#[test]
fn test_registries_scoped_by_ecosystem() {
    let (_temp_dir, root) = create_test_repo();
    write_file(&root, "requirements.txt", "");
    write_file(&root, "web/package.json", "{}");
    write_settings(
        &root,
        r#"
- registries:
    - name: pypi-private
      type: python-index
      url: https://pypi.example.com/simple
      username: bot
      password: "${{ secrets.PYPI_TOKEN }}"
      applies-to: [pip]
    - type: git
      url: https://github.com
    - name: incomplete
      type: npm-registry
"#,
    );

    let (text, document) = run(&root, 1);

    for entry in updates(&document) {
        if entry["package-ecosystem"].as_str() == Some("pip") {
            assert_eq!(entry["registries"][0].as_str(), Some("pypi-private"));
        } else {
            assert!(entry.get("registries").is_none());
        }
    }

    let registries = document["registries"].as_mapping().unwrap();
    assert_eq!(registries.len(), 1);
    let pypi = &document["registries"]["pypi-private"];
    assert_eq!(pypi["type"].as_str(), Some("python-index"));
    assert_eq!(pypi["password"].as_str(), Some("${{ secrets.PYPI_TOKEN }}"));
    assert!(pypi.get("name").is_none());
    assert!(pypi.get("applies-to").is_none());

    let comment = text.find("# Registry configurations\nregistries:\n").unwrap();
    assert!(comment > text.find("updates:").unwrap());
}

#[test]
fn test_unscoped_registry_applies_everywhere() {
    let (_temp_dir, root) = create_test_repo();
    write_file(&root, "requirements.txt", "");
    write_file(&root, "package.json", "{}");
    write_settings(&root, "- registries:\n    - name: github\n      type: git\n      url: https://github.com\n");

    let (_, document) = run(&root, 1);

    for entry in updates(&document) {
        assert_eq!(entry["registries"][0].as_str(), Some("github"));
    }
}

#[test]
fn test_custom_files() {
    let (_temp_dir, root) = create_test_repo();
    write_file(&root, "deps/base.lst", "requests\n");
    write_file(&root, "tools/images.txt", "");
    write_settings(
        &root,
        r#"
- custom-files:
    - path: /deps/base.lst
      manager: pip
    - path: tools/images.txt
      package-ecosystem: docker
    - path: deps/missing.lst
      manager: pip
    - path: deps/base.lst
      manager: not-a-manager
    - path: ../outside.txt
      manager: pip
    - manager: pip
"#,
    );

    let (_, document) = run(&root, 1);

    assert_eq!(
        summary(&document),
        vec![
            ("/deps".to_string(), "pip".to_string(), 1),
            ("/deps".to_string(), "pip".to_string(), 0),
            ("/tools".to_string(), "docker".to_string(), 1),
            ("/tools".to_string(), "docker".to_string(), 0),
        ]
    );
}

#[test]
fn test_output_is_deterministic() {
    let (_temp_dir, root) = create_test_repo();
    write_file(&root, "requirements.txt", "");
    write_file(&root, "a/package.json", "{}");
    write_file(&root, "b/Cargo.toml", "");
    write_settings(&root, "- ignore-directory: [b]\n");

    let (first, _) = run(&root, 3);
    let (second, _) = run(&root, 3);

    assert_eq!(first, second);
}

#[test]
fn test_malformed_settings_is_fatal() {
    let (_temp_dir, root) = create_test_repo();
    write_file(&root, "requirements.txt", "");
    write_settings(&root, "ignore-directory: [a]\n");

    let result = generate(&options(&root, 1, false));

    assert!(result.is_err());
    assert!(!root.join(".github/dependabot.yml").exists());
}

#[test]
fn test_existing_output_overwritten() {
    let (_temp_dir, root) = create_test_repo();
    write_file(&root, ".github/dependabot.yml", "stale: true\n");

    let (text, _) = run(&root, 1);

    assert_eq!(text, "version: 2\nupdates: []\n");
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

#[test]
fn test_skip_events_are_logged() {
    let (_temp_dir, root) = create_test_repo();
    write_file(&root, "requirements_dev.txt", "");
    write_file(&root, "old/package.json", "{}");
    write_settings(
        &root,
        "- ignore-version-updates-for-files: [\"*_dev.txt\"]\n- ignore-directory: [old]\n",
    );

    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        generate(&options(&root, 1, false)).unwrap();
    });

    let output = logs.contents();
    let file_skip = output
        .lines()
        .find(|line| line.contains("Skipping version updates for manager due to file pattern ignore"))
        .unwrap();
    assert!(file_skip.contains(r#""manager":"pip""#));
    assert!(file_skip.contains(r#""directory":"/""#));
    assert!(file_skip.contains(r#""file_pattern":"*_dev.txt""#));

    let directory_skip = output
        .lines()
        .find(|line| line.contains("Skipping directory due to ignore rule"))
        .unwrap();
    assert!(directory_skip.contains(r#""directory":"/old""#));
    assert!(directory_skip.contains(r#""rule":"old""#));
}
