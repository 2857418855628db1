//! Offline fallback dataset generation.
//!
//! When every network-dependent strategy has failed, [`FallbackGenerator`]
//! synthesizes a minimal placeholder dataset so the appliance can start in
//! degraded testing mode instead of failing outright. Generation is fully
//! offline and deterministic: identical settings produce an identical
//! dataset layout and info record every time.

use std::fmt::Write as _;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use crate::dataset::{DatasetInfo, Partition};
use crate::error::AerieError;
use crate::manifest::FallbackSpec;

/// Name recorded for the synthesized dataset.
const FALLBACK_DATASET_NAME: &str = "AirBirds-sample";

/// Side length of the placeholder images.
const SAMPLE_IMAGE_SIZE: usize = 64;

/// Produces the offline substitute dataset.
pub struct FallbackGenerator<'a> {
    settings: &'a FallbackSpec,
}

impl<'a> FallbackGenerator<'a> {
    pub fn new(settings: &'a FallbackSpec) -> Self {
        Self { settings }
    }

    /// Returns the info record the generated dataset will carry, without
    /// touching the filesystem. Deterministic for a given settings value.
    pub fn dataset_info(&self) -> DatasetInfo {
        DatasetInfo {
            name: FALLBACK_DATASET_NAME.to_string(),
            description: "Synthetic placeholder dataset for degraded testing mode".to_string(),
            source: "synthetic".to_string(),
            partitions: vec![Partition {
                name: "train".to_string(),
                samples: self.settings.samples,
            }],
            classes: self.settings.classes.clone(),
            format: "yolo".to_string(),
            license: String::new(),
        }
    }

    /// Writes the placeholder dataset into `target_dir` and returns its
    /// info record.
    ///
    /// Layout: `images/train/sample_NNN.pgm` placeholder frames and
    /// `labels/train/sample_NNN.txt` YOLO annotations with one centered
    /// box each, plus the `dataset_info.yaml` record. Any filesystem
    /// failure aborts the whole run: the fallback has no further fallback.
    pub fn generate(&self, target_dir: &Utf8Path) -> Result<DatasetInfo, AerieError> {
        info!(
            samples = self.settings.samples,
            "generating offline fallback dataset in {}", target_dir
        );

        let images_dir = target_dir.join("images/train");
        let labels_dir = target_dir.join("labels/train");
        for dir in [&images_dir, &labels_dir] {
            fs::create_dir_all(dir).map_err(|e| write_failed(dir, e))?;
        }

        let image = placeholder_image();
        for index in 0..self.settings.samples {
            let image_path = images_dir.join(format!("sample_{:03}.pgm", index));
            fs::write(&image_path, &image).map_err(|e| write_failed(&image_path, e))?;

            let label_path = labels_dir.join(format!("sample_{:03}.txt", index));
            // One centered box, class 0. Enough for a smoke-test epoch.
            fs::write(&label_path, "0 0.5 0.5 0.2 0.2\n")
                .map_err(|e| write_failed(&label_path, e))?;
        }

        let dataset_info = self.dataset_info();
        dataset_info
            .write(target_dir)
            .map_err(|e| AerieError::FallbackWrite(e.to_string()))?;

        info!("fallback dataset ready: {} sample(s)", self.settings.samples);
        Ok(dataset_info)
    }
}

fn write_failed(path: &Utf8PathBuf, source: std::io::Error) -> AerieError {
    AerieError::FallbackWrite(format!(
        "{}: {}",
        path,
        crate::error::io_error_kind_message(&source)
    ))
}

/// Renders the constant placeholder frame as a plain-text PGM.
fn placeholder_image() -> String {
    let mut image = String::new();
    let _ = writeln!(image, "P2");
    let _ = writeln!(image, "{} {}", SAMPLE_IMAGE_SIZE, SAMPLE_IMAGE_SIZE);
    let _ = writeln!(image, "255");
    let row = "128 ".repeat(SAMPLE_IMAGE_SIZE).trim_end().to_string();
    for _ in 0..SAMPLE_IMAGE_SIZE {
        let _ = writeln!(image, "{}", row);
    }
    image
}
