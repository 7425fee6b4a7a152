//! Layered configuration resolution
//!
//! Loads the base configuration file plus include fragments scoped to the
//! "core" and "element" namespaces into a single effective mapping.
//!
//! Precedence: base < core includes < element includes, except that an
//! element include may never override a key a core include already set.
//! Such a conflict is recorded and the core value retained.

#![allow(dead_code)]

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Malformed values in the configuration layers
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config key '{key}' is not a boolean: '{value}'")]
    NotABoolean { key: String, value: String },

    #[error("config key '{key}' is not an integer: '{value}'")]
    NotAnInteger { key: String, value: String },

    #[error("key '{}' in {} has a non-scalar value", key, path.display())]
    NonScalar { key: String, path: PathBuf },
}

/// A rejected element-include override of a core-set key
#[derive(Clone, Debug, Serialize)]
pub struct IncludeConflict {
    pub key: String,
    pub kept: String,
    pub rejected: String,
    pub fragment: PathBuf,
}

/// Immutable resolved configuration
///
/// Created once at startup and shared read-only by every worker.
#[derive(Clone, Debug, Default, Serialize)]
pub struct EffectiveConfig {
    values: BTreeMap<String, String>,
    /// Resolution log: which fragments were applied or skipped
    pub applied: Vec<String>,
    /// Element-include overrides rejected in favor of core values
    pub conflicts: Vec<IncludeConflict>,
}

impl EffectiveConfig {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(raw) => match raw.to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Some(true)),
                "false" | "no" | "off" | "0" => Ok(Some(false)),
                _ => Err(ConfigError::NotABoolean {
                    key: key.to_string(),
                    value: raw.clone(),
                }),
            },
        }
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<u64>().map(Some).map_err(|_| {
                ConfigError::NotAnInteger {
                    key: key.to_string(),
                    value: raw.clone(),
                }
            }),
        }
    }

    pub fn get_u32(&self, key: &str) -> Result<Option<u32>, ConfigError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<u32>().map(Some).map_err(|_| {
                ConfigError::NotAnInteger {
                    key: key.to_string(),
                    value: raw.clone(),
                }
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Builder that loads the base file and include fragments
#[derive(Clone, Debug, Default)]
pub struct ConfigResolver {
    base: Option<PathBuf>,
    core_include_dirs: Vec<PathBuf>,
    element_include_dirs: Vec<PathBuf>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base configuration file. Errors loading it are fatal.
    pub fn with_base(mut self, path: impl Into<PathBuf>) -> Self {
        self.base = Some(path.into());
        self
    }

    /// Add a directory of core-scoped include fragments.
    pub fn add_core_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.core_include_dirs.push(dir.into());
        self
    }

    /// Add a directory of element-scoped include fragments.
    pub fn add_element_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.element_include_dirs.push(dir.into());
        self
    }

    /// Resolve the layered configuration.
    ///
    /// The base file must load cleanly; a missing or malformed include
    /// fragment is logged, recorded in the resolution log, and skipped.
    pub fn resolve(&self) -> Result<EffectiveConfig> {
        let mut config = EffectiveConfig::default();

        if let Some(base) = &self.base {
            config.values = load_fragment(base)
                .with_context(|| format!("failed to load base config: {}", base.display()))?;
            config.applied.push(format!("base: {}", base.display()));
            debug!("Loaded {} keys from base config", config.values.len());
        }

        // Core includes override the base and fence their keys against
        // element overrides.
        let mut core_keys: BTreeSet<String> = BTreeSet::new();
        for fragment in collect_fragments(&self.core_include_dirs, &mut config.applied) {
            match load_fragment(&fragment) {
                Ok(values) => {
                    for (key, value) in values {
                        core_keys.insert(key.clone());
                        config.values.insert(key, value);
                    }
                    config
                        .applied
                        .push(format!("core include: {}", fragment.display()));
                }
                Err(e) => {
                    warn!("Skipping core include {}: {e:#}", fragment.display());
                    config
                        .applied
                        .push(format!("skipped core include: {}", fragment.display()));
                }
            }
        }

        for fragment in collect_fragments(&self.element_include_dirs, &mut config.applied) {
            match load_fragment(&fragment) {
                Ok(values) => {
                    for (key, value) in values {
                        if core_keys.contains(&key) {
                            let kept = config.values.get(&key).cloned().unwrap_or_default();
                            warn!(
                                "Element include {} may not override core key '{}' \
                                 (keeping '{}', rejecting '{}')",
                                fragment.display(),
                                key,
                                kept,
                                value
                            );
                            config.conflicts.push(IncludeConflict {
                                key,
                                kept,
                                rejected: value,
                                fragment: fragment.clone(),
                            });
                            continue;
                        }
                        config.values.insert(key, value);
                    }
                    config
                        .applied
                        .push(format!("element include: {}", fragment.display()));
                }
                Err(e) => {
                    warn!("Skipping element include {}: {e:#}", fragment.display());
                    config
                        .applied
                        .push(format!("skipped element include: {}", fragment.display()));
                }
            }
        }

        Ok(config)
    }
}

/// List the YAML fragments of each include directory, sorted by file name
/// for a stable application order. Missing directories are recoverable.
fn collect_fragments(dirs: &[PathBuf], applied: &mut Vec<String>) -> Vec<PathBuf> {
    let mut fragments = Vec::new();
    for dir in dirs {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Skipping include directory {}: {e}", dir.display());
                applied.push(format!("skipped include dir: {}", dir.display()));
                continue;
            }
        };
        let mut in_dir: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_yaml_file(p))
            .collect();
        in_dir.sort();
        fragments.extend(in_dir);
    }
    fragments
}

/// Load one key/value fragment. Values must be scalars.
fn load_fragment(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let raw: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let mut values = BTreeMap::new();
    for (key, value) in raw {
        let rendered = match value {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Null => String::new(),
            _ => {
                return Err(ConfigError::NonScalar {
                    key,
                    path: path.to_path_buf(),
                }
                .into())
            }
        };
        values.insert(key, rendered);
    }
    Ok(values)
}

fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
