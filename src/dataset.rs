//! Dataset description records.
//!
//! Every successful provisioning run (real or fallback) writes a
//! `dataset_info.yaml` next to the acquired data so downstream components
//! can discover what was provisioned without re-deriving it from the files.
//! The record is overwritten wholesale on each run, never patched.

use std::fs::File;
use std::io::BufReader;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::error::AerieError;

/// File name of the dataset description record inside the dataset directory.
pub const DATASET_INFO_FILE: &str = "dataset_info.yaml";

/// One partition of a dataset (e.g. `train`, `val`) with its sample count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub name: String,
    pub samples: u64,
}

/// Descriptive record for an acquired or synthesized dataset.
///
/// Immutable after write; a re-run replaces the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// Dataset name (e.g. "AirBirds")
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Where the dataset came from: a URL for downloaded datasets,
    /// "synthetic" for the offline fallback
    #[serde(default)]
    pub source: String,
    /// Available partitions with per-partition sample counts
    pub partitions: Vec<Partition>,
    /// Ordered class labels
    pub classes: Vec<String>,
    /// Declared annotation format (e.g. "yolo")
    #[serde(default)]
    pub format: String,
    /// License tag (e.g. "CC-BY-4.0")
    #[serde(default)]
    pub license: String,
}

impl DatasetInfo {
    /// Total sample count across all partitions.
    pub fn samples(&self) -> u64 {
        self.partitions.iter().map(|p| p.samples).sum()
    }

    /// Writes the record to `<dir>/dataset_info.yaml`, replacing any
    /// existing record.
    pub fn write(&self, dir: &Utf8Path) -> Result<(), AerieError> {
        let path = dir.join(DATASET_INFO_FILE);
        let text = serde_yaml::to_string(self)
            .map_err(|e| AerieError::Config(format!("failed to serialize dataset info: {}", e)))?;
        std::fs::write(&path, text).map_err(|e| AerieError::io(path.to_string(), e))?;
        tracing::debug!("wrote dataset info: {}", path);
        Ok(())
    }

    /// Loads a record from `<dir>/dataset_info.yaml`.
    pub fn load(dir: &Utf8Path) -> Result<Self, AerieError> {
        let path = dir.join(DATASET_INFO_FILE);
        let file = File::open(&path).map_err(|e| AerieError::io(path.to_string(), e))?;
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader)
            .map_err(|e| AerieError::Config(format!("failed to parse {}: {}", path, e)))
    }
}
