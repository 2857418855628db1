//! Provisioning manifest loading and validation.
//!
//! The manifest is the single explicit input to an orchestration run: target
//! dataset directory, appliance config path, the ordered acquisition
//! strategies, the optional library bootstrap, and the fallback settings.
//! Nothing is discovered from ambient context.

use std::fs::File;
use std::io::BufReader;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::Deserialize;
use url::Url;

use crate::dataset::{DatasetInfo, Partition};
use crate::error::AerieError;

/// Default per-strategy timeout in seconds when the manifest omits one.
const DEFAULT_TIMEOUT_SECS: u64 = 900;

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_confidence_threshold() -> f64 {
    0.45
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_pip() -> String {
    "pip3".to_string()
}

fn default_fallback_classes() -> Vec<String> {
    vec!["bird".to_string()]
}

fn default_fallback_samples() -> u64 {
    5
}

/// Top-level provisioning manifest.
#[derive(Debug, Deserialize)]
pub struct Manifest {
    /// Directory the acquired dataset (and its info record) lands in
    pub dataset_dir: Utf8PathBuf,
    /// Path of the appliance config document to patch after acquisition
    pub config_path: Utf8PathBuf,
    /// Per-strategy timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Optional library bootstrap performed before any strategy runs
    #[serde(default)]
    pub bootstrap: Option<BootstrapSpec>,
    /// Model path recorded into the config document's `ai` section
    pub model_path: String,
    /// Detection confidence threshold recorded into the config document
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Ordered acquisition strategies, attempted by ascending priority
    pub strategies: Vec<StrategySpec>,
    /// Offline fallback settings used when every strategy fails
    #[serde(default)]
    pub fallback: FallbackSpec,
}

/// External library dependency installed before network strategies run.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapSpec {
    /// Importable module name (e.g. "ultralytics")
    pub library: String,
    /// Minimum version constraint passed to the installer
    pub min_version: String,
    /// Interpreter used to probe importability
    #[serde(default = "default_python")]
    pub python: String,
    /// Installer command
    #[serde(default = "default_pip")]
    pub pip: String,
}

/// One configured way to obtain the dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategySpec {
    /// Unique label within the run
    pub name: String,
    /// Ordinal position; lower runs first, ties keep declaration order
    pub priority: u32,
    /// Script (or other executable) backing this strategy
    pub invocable: Utf8PathBuf,
    /// Extra arguments passed to the invocable
    #[serde(default)]
    pub args: Vec<String>,
    /// Metadata recorded as the dataset info when this strategy succeeds
    pub dataset: DatasetDecl,
}

/// Declared metadata for the dataset a strategy provides.
///
/// Strategy invocables are opaque subprocesses, so the manifest declares
/// what each one delivers; the orchestrator records this declaration on
/// success.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetDecl {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: String,
    pub classes: Vec<String>,
    pub samples: u64,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub license: String,
}

impl DatasetDecl {
    /// Builds the persisted info record for this declaration.
    pub fn to_info(&self) -> DatasetInfo {
        DatasetInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            source: self.source.clone(),
            partitions: vec![Partition {
                name: "train".to_string(),
                samples: self.samples,
            }],
            classes: self.classes.clone(),
            format: self.format.clone(),
            license: self.license.clone(),
        }
    }
}

/// Settings for the offline substitute dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackSpec {
    #[serde(default = "default_fallback_classes")]
    pub classes: Vec<String>,
    #[serde(default = "default_fallback_samples")]
    pub samples: u64,
}

impl Default for FallbackSpec {
    fn default() -> Self {
        Self {
            classes: default_fallback_classes(),
            samples: default_fallback_samples(),
        }
    }
}

impl Manifest {
    /// Validates the manifest beyond what deserialization enforces.
    pub fn validate(&self) -> Result<(), AerieError> {
        if self.strategies.is_empty() {
            return Err(AerieError::Validation(
                "manifest must declare at least one strategy".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for strategy in &self.strategies {
            if strategy.name.is_empty() {
                return Err(AerieError::Validation("strategy name must not be empty".to_string()));
            }
            if !seen.insert(strategy.name.as_str()) {
                return Err(AerieError::Validation(format!(
                    "duplicate strategy name: {}",
                    strategy.name
                )));
            }
            if strategy.dataset.classes.is_empty() {
                return Err(AerieError::Validation(format!(
                    "strategy {} declares no classes",
                    strategy.name
                )));
            }
            if !strategy.dataset.source.is_empty() {
                Url::parse(&strategy.dataset.source).map_err(|e| {
                    AerieError::Validation(format!(
                        "strategy {} has an invalid dataset source: {}",
                        strategy.name, e
                    ))
                })?;
            }
        }

        if let Some(bootstrap) = &self.bootstrap {
            // Dotted version like "8" or "8.0.0"; the constraint is passed
            // verbatim to the installer, so reject anything surprising early.
            let version_re = Regex::new(r"^\d+(\.\d+)*$").expect("static regex");
            if !version_re.is_match(&bootstrap.min_version) {
                return Err(AerieError::Validation(format!(
                    "bootstrap min_version must be a dotted version, got: {}",
                    bootstrap.min_version
                )));
            }
            if bootstrap.library.is_empty() {
                return Err(AerieError::Validation(
                    "bootstrap library must not be empty".to_string(),
                ));
            }
        }

        if self.model_path.is_empty() {
            return Err(AerieError::Validation("model_path must not be empty".to_string()));
        }

        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AerieError::Validation(format!(
                "confidence_threshold must be within [0, 1], got: {}",
                self.confidence_threshold
            )));
        }

        if self.timeout_secs == 0 {
            return Err(AerieError::Validation("timeout_secs must be non-zero".to_string()));
        }

        if self.fallback.classes.is_empty() {
            return Err(AerieError::Validation(
                "fallback must declare at least one class".to_string(),
            ));
        }
        if self.fallback.samples == 0 {
            return Err(AerieError::Validation(
                "fallback samples must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns the strategies sorted by ascending priority.
    ///
    /// The sort is stable: strategies with equal priority keep their
    /// declaration order.
    pub fn ordered_strategies(&self) -> Vec<&StrategySpec> {
        let mut ordered: Vec<&StrategySpec> = self.strategies.iter().collect();
        ordered.sort_by_key(|s| s.priority);
        ordered
    }
}

/// Loads a manifest from a YAML file.
pub fn load_manifest(path: &Utf8Path) -> Result<Manifest> {
    let file = File::open(path).with_context(|| format!("failed to load file: {}", path))?;
    let reader = BufReader::new(file);
    let manifest: Manifest = serde_yaml::from_reader(reader)
        .with_context(|| format!("failed to parse yaml: {}", path))?;
    Ok(manifest)
}
