//! Registry resolution.
//!
//! Turns raw `registries` declarations from the settings overlay into the
//! document's `registries` section plus a lookup used to attach registry names
//! to update entries.

use crate::models::RegistryDecl;
use indexmap::IndexMap;
use serde_yaml_ng::Value;
use thiserror::Error;

const KEY_NAME: &str = "name";
const KEY_TYPE: &str = "type";
const KEY_URL: &str = "url";
const KEY_APPLIES_TO: &str = "applies-to";

/// Fields every registry declaration must carry.
pub const REQUIRED_FIELDS: [&str; 3] = [KEY_NAME, KEY_TYPE, KEY_URL];

/// Why a registry declaration was rejected.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("registry entry missing 'name' field")]
    MissingName,

    #[error("registry {name} missing required fields: {missing:?}")]
    MissingFields { name: String, missing: Vec<String> },

    #[error("registry {name} has a malformed 'applies-to' list")]
    InvalidAppliesTo { name: String },
}

/// A validated registry.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryInfo {
    pub registry_type: String,
    /// Ecosystems this registry serves; empty means all of them.
    pub applies_to: Vec<String>,
    /// Declared fields minus `name` and `applies-to`, as emitted in the document.
    pub config: IndexMap<String, Value>,
}

impl RegistryInfo {
    pub fn applies_to_ecosystem(&self, ecosystem: &str) -> bool {
        self.applies_to.is_empty() || self.applies_to.iter().any(|e| e == ecosystem)
    }
}

/// Valid registries keyed by name, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryMap {
    registries: IndexMap<String, RegistryInfo>,
}

impl RegistryMap {
    /// Validate every declaration, logging and dropping the invalid ones.
    pub fn resolve(declarations: &[RegistryDecl]) -> Self {
        let mut registries = IndexMap::new();

        for decl in declarations {
            match validate_registry(decl) {
                Ok((name, info)) => {
                    tracing::info!(
                        name = %name,
                        registry_type = %info.registry_type,
                        applies_to = ?info.applies_to,
                        "Added registry configuration"
                    );
                    registries.insert(name, info);
                }
                Err(e @ RegistryError::MissingName) => {
                    tracing::warn!(registry = ?decl, error = %e, "Registry entry missing 'name' field, skipping");
                }
                Err(e) => {
                    tracing::error!(
                        registry = ?decl,
                        required = ?REQUIRED_FIELDS,
                        error = %e,
                        "Registry missing required fields"
                    );
                }
            }
        }

        Self { registries }
    }

    /// Names of registries applicable to `ecosystem`, in declaration order.
    pub fn applicable_to(&self, ecosystem: &str) -> Vec<String> {
        self.registries
            .iter()
            .filter(|(_, info)| info.applies_to_ecosystem(ecosystem))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// The document's `registries` section, or `None` when nothing is valid.
    pub fn document_section(&self) -> Option<IndexMap<String, IndexMap<String, Value>>> {
        if self.registries.is_empty() {
            return None;
        }
        Some(
            self.registries
                .iter()
                .map(|(name, info)| (name.clone(), info.config.clone()))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&RegistryInfo> {
        self.registries.get(name)
    }

    pub fn len(&self) -> usize {
        self.registries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }
}

/// Validate one declaration.
///
/// A required field written as `null` (`type:` with no value) counts as
/// missing, same as an absent key.
pub fn validate_registry(decl: &RegistryDecl) -> Result<(String, RegistryInfo), RegistryError> {
    let name = match decl.get(KEY_NAME).and_then(scalar_text) {
        Some(name) if !name.is_empty() => name,
        _ => return Err(RegistryError::MissingName),
    };

    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|field| decl.get(**field).is_none_or(Value::is_null))
        .map(|field| field.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(RegistryError::MissingFields { name, missing });
    }

    let applies_to = match decl.get(KEY_APPLIES_TO) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(items)) => {
            let parsed: Option<Vec<String>> = items.iter().map(scalar_text).collect();
            parsed.ok_or_else(|| RegistryError::InvalidAppliesTo { name: name.clone() })?
        }
        Some(_) => return Err(RegistryError::InvalidAppliesTo { name }),
    };

    let registry_type = decl.get(KEY_TYPE).and_then(scalar_text).unwrap_or_default();

    let config = decl
        .iter()
        .filter(|(key, _)| key.as_str() != KEY_NAME && key.as_str() != KEY_APPLIES_TO)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok((
        name,
        RegistryInfo {
            registry_type,
            applies_to,
            config,
        },
    ))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
