use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_yaml_ng::Value;

use super::ecosystem::DOCKER;

/// `version` marker of the dependabot configuration format.
pub const CONFIG_VERSION: u8 = 2;

/// Group name reserved for security updates.
pub const SECURITY_GROUP: &str = "prodsec";

pub const LABEL_DEPENDENCIES: &str = "dependencies";
pub const LABEL_VERSION_UPDATE: &str = "version-update";
pub const LABEL_SECURITY_UPDATE: &str = "security-update";

const SCHEDULE_TIME: &str = "08:00";
const SCHEDULE_TIMEZONE: &str = "America/Chicago";

/// The whole `dependabot.yml` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependabotConfig {
    pub version: u8,

    pub updates: Vec<UpdateEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registries: Option<IndexMap<String, IndexMap<String, Value>>>,
}

impl DependabotConfig {
    pub fn new(updates: Vec<UpdateEntry>) -> Self {
        Self {
            version: CONFIG_VERSION,
            updates,
            registries: None,
        }
    }
}

/// Which kind of policy an entry carries. Not serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    #[default]
    Version,
    Security,
}

impl UpdateKind {
    /// Word used in entry annotations.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateKind::Version => "version",
            UpdateKind::Security => "security",
        }
    }
}

/// One element of `updates`.
///
/// Key order in the written document follows the kind: version entries put
/// `groups` before `target-branch` and `labels`, security entries put `labels`
/// before `groups`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UpdateEntry {
    #[serde(skip)]
    pub kind: UpdateKind,

    pub package_ecosystem: String,

    pub directory: String,

    pub schedule: Schedule,

    pub allow: Vec<AllowRule>,

    pub open_pull_requests_limit: i64,

    pub groups: IndexMap<String, Group>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_branch: Option<String>,

    pub labels: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registries: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore: Option<Vec<IgnoreBlock>>,
}

impl UpdateEntry {
    /// Routine version-update policy for one directory and ecosystem.
    pub fn version_update(
        ecosystem: &str,
        directory: &str,
        schedule: Schedule,
        open_pull_requests_limit: i64,
        target_branch: &str,
    ) -> Self {
        let mut groups = IndexMap::new();
        groups.insert(
            version_group_name(ecosystem),
            Group::new(AppliesTo::VersionUpdates),
        );

        Self {
            kind: UpdateKind::Version,
            package_ecosystem: ecosystem.to_string(),
            directory: directory.to_string(),
            schedule,
            allow: vec![AllowRule::new(DependencyType::Direct)],
            open_pull_requests_limit,
            groups,
            target_branch: Some(target_branch.to_string()),
            labels: vec![
                LABEL_VERSION_UPDATE.to_string(),
                LABEL_DEPENDENCIES.to_string(),
            ],
            registries: None,
            ignore: None,
        }
    }

    /// Security-update policy. The PR limit of 0 disables version updates
    /// for this entry and leaves security PRs unlimited.
    pub fn security_update(
        ecosystem: &str,
        directory: &str,
        schedule: Schedule,
        transitive_security: bool,
    ) -> Self {
        let mut groups = IndexMap::new();
        groups.insert(
            SECURITY_GROUP.to_string(),
            Group::new(AppliesTo::SecurityUpdates),
        );

        let dependency_type = if transitive_security {
            DependencyType::All
        } else {
            DependencyType::Direct
        };

        Self {
            kind: UpdateKind::Security,
            package_ecosystem: ecosystem.to_string(),
            directory: directory.to_string(),
            schedule,
            allow: vec![AllowRule::new(dependency_type)],
            open_pull_requests_limit: 0,
            groups,
            target_branch: None,
            labels: vec![
                LABEL_SECURITY_UPDATE.to_string(),
                LABEL_DEPENDENCIES.to_string(),
            ],
            registries: None,
            ignore: None,
        }
    }

    /// True when the entry carries the security group.
    pub fn is_security(&self) -> bool {
        self.groups.contains_key(SECURITY_GROUP)
    }
}

impl Serialize for UpdateEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("package-ecosystem", &self.package_ecosystem)?;
        map.serialize_entry("directory", &self.directory)?;
        map.serialize_entry("schedule", &self.schedule)?;
        map.serialize_entry("allow", &self.allow)?;
        map.serialize_entry("open-pull-requests-limit", &self.open_pull_requests_limit)?;

        match self.kind {
            UpdateKind::Version => {
                map.serialize_entry("groups", &self.groups)?;
                if let Some(branch) = &self.target_branch {
                    map.serialize_entry("target-branch", branch)?;
                }
                map.serialize_entry("labels", &self.labels)?;
            }
            UpdateKind::Security => {
                map.serialize_entry("labels", &self.labels)?;
                map.serialize_entry("groups", &self.groups)?;
                if let Some(branch) = &self.target_branch {
                    map.serialize_entry("target-branch", branch)?;
                }
            }
        }

        if let Some(registries) = &self.registries {
            map.serialize_entry("registries", registries)?;
        }
        if let Some(ignore) = &self.ignore {
            map.serialize_entry("ignore", ignore)?;
        }
        map.end()
    }
}

/// `<ecosystem>_updates`, with dashes replaced so the name is a valid identifier.
pub fn version_group_name(ecosystem: &str) -> String {
    format!("{}_updates", ecosystem.replace('-', "_"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub interval: String,
    pub day: String,
    pub time: String,
    pub timezone: String,
}

impl Schedule {
    /// Weekly at 08:00 Chicago time; docker runs on Wednesday, the rest on Monday.
    pub fn for_ecosystem(ecosystem: &str) -> Self {
        let day = if ecosystem == DOCKER { "wednesday" } else { "monday" };
        Self {
            interval: "weekly".to_string(),
            day: day.to_string(),
            time: SCHEDULE_TIME.to_string(),
            timezone: SCHEDULE_TIMEZONE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    Direct,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AllowRule {
    pub dependency_type: DependencyType,
}

impl AllowRule {
    pub fn new(dependency_type: DependencyType) -> Self {
        Self { dependency_type }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppliesTo {
    VersionUpdates,
    SecurityUpdates,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Group {
    pub applies_to: AppliesTo,
    pub update_types: Vec<String>,
}

impl Group {
    /// Group covering minor and patch bumps.
    pub fn new(applies_to: AppliesTo) -> Self {
        Self {
            applies_to,
            update_types: vec!["minor".to_string(), "patch".to_string()],
        }
    }
}

/// Element of an entry's `ignore` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IgnoreBlock {
    pub dependency_name: String,
    pub update_types: Vec<String>,
}
