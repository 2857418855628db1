//! Config document synchronization.
//!
//! The appliance keeps one YAML config document shared by every subsystem
//! (camera, logging, ai, ...). The orchestrator owns only the `ai` leaf
//! keys it provisions; [`ConfigSynchronizer`] patches exactly those and
//! leaves every sibling key and section untouched. The write is atomic:
//! either the fully updated document lands, or the prior document stays
//! intact.

use std::fs;
use std::fs::File;
use std::io::BufReader;

use camino::{Utf8Path, Utf8PathBuf};
use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use crate::error::AerieError;

/// The `ai` section leaf keys written after a successful acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct AiPatch {
    pub model_path: String,
    pub classes: Vec<String>,
    pub confidence_threshold: f64,
    pub dataset_dir: String,
}

impl AiPatch {
    /// The `(key, value)` pairs this patch sets under `ai`.
    fn entries(&self) -> [(&'static str, Value); 4] {
        [
            ("model_path", Value::String(self.model_path.clone())),
            (
                "classes",
                Value::Sequence(self.classes.iter().cloned().map(Value::String).collect()),
            ),
            ("confidence_threshold", Value::from(self.confidence_threshold)),
            ("dataset_dir", Value::String(self.dataset_dir.clone())),
        ]
    }
}

/// RAII guard removing the temp file unless the rename succeeded.
struct TempFileGuard {
    path: Utf8PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: Utf8PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            match fs::remove_file(&self.path) {
                Ok(()) => debug!("cleaned up temp file: {}", self.path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("temp file already removed: {}", self.path);
                }
                Err(e) => {
                    tracing::error!(path = %self.path, "failed to cleanup temp file: {}", e);
                }
            }
        }
    }
}

/// Merges acquisition outcomes into the persisted config document.
pub struct ConfigSynchronizer;

impl ConfigSynchronizer {
    /// Applies `patch` to the document at `config_path`.
    ///
    /// Loads the existing document when present (starting from an empty one
    /// otherwise), sets only the `ai` leaf keys named by the patch, and
    /// writes the result back atomically via a temp file and rename in the
    /// same directory. The parent directory is created when missing.
    pub fn apply(config_path: &Utf8Path, patch: &AiPatch) -> Result<(), AerieError> {
        let mut document = Self::load_document(config_path)?;

        let ai = document
            .entry(Value::String("ai".to_string()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        let Value::Mapping(ai) = ai else {
            return Err(AerieError::ConfigSync(format!(
                "{}: existing `ai` section is not a mapping",
                config_path
            )));
        };
        for (key, value) in patch.entries() {
            ai.insert(Value::String(key.to_string()), value);
        }

        Self::write_document(config_path, &document)?;
        info!("config synchronized: {}", config_path);
        Ok(())
    }

    fn load_document(config_path: &Utf8Path) -> Result<Mapping, AerieError> {
        if !config_path.exists() {
            debug!("config document absent, starting from empty: {}", config_path);
            return Ok(Mapping::new());
        }

        let file = File::open(config_path).map_err(|e| {
            AerieError::ConfigSync(format!(
                "{}: {}",
                config_path,
                crate::error::io_error_kind_message(&e)
            ))
        })?;
        let document: Value = serde_yaml::from_reader(BufReader::new(file))
            .map_err(|e| AerieError::ConfigSync(format!("failed to parse {}: {}", config_path, e)))?;
        match document {
            Value::Mapping(mapping) => Ok(mapping),
            // An empty file parses as null; treat it like an absent document.
            Value::Null => Ok(Mapping::new()),
            _ => Err(AerieError::ConfigSync(format!(
                "{}: document root is not a mapping",
                config_path
            ))),
        }
    }

    fn write_document(config_path: &Utf8Path, document: &Mapping) -> Result<(), AerieError> {
        let sync_err = |context: String, e: std::io::Error| {
            AerieError::ConfigSync(format!("{}: {}", context, crate::error::io_error_kind_message(&e)))
        };

        let parent = config_path.parent().ok_or_else(|| {
            AerieError::ConfigSync(format!("config path has no parent directory: {}", config_path))
        })?;
        if !parent.as_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .map_err(|e| sync_err(format!("failed to create directory: {}", parent), e))?;
        }

        let text = serde_yaml::to_string(document)
            .map_err(|e| AerieError::ConfigSync(format!("failed to serialize config: {}", e)))?;

        // Temp file in the same directory so the rename cannot cross
        // filesystems.
        let file_name = config_path.file_name().ok_or_else(|| {
            AerieError::ConfigSync(format!("config path has no file name: {}", config_path))
        })?;
        let temp_path = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));
        let mut guard = TempFileGuard::new(temp_path.clone());

        {
            let mut temp_file = File::create(&temp_path)
                .map_err(|e| sync_err(format!("failed to create temp file: {}", temp_path), e))?;
            use std::io::Write;
            temp_file
                .write_all(text.as_bytes())
                .map_err(|e| sync_err(format!("failed to write temp file: {}", temp_path), e))?;
            temp_file
                .sync_all()
                .map_err(|e| sync_err(format!("failed to sync temp file: {}", temp_path), e))?;
        }

        fs::rename(&temp_path, config_path).map_err(|e| {
            sync_err(format!("failed to rename {} to {}", temp_path, config_path), e)
        })?;
        guard.disarm();

        Ok(())
    }
}
