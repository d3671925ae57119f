//! Batch watermark recovery.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use serde::Serialize;

use crate::enumerate::{ImageAsset, ImageSet};
use crate::error::Result;
use crate::options::{covers_placement, DecodeOptions};
use crate::pool::{run_tasks, ProgressFn};
use crate::region::extract;
use crate::scan::decode_region;

/// One image to scan.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeTask {
    /// Image to read.
    pub image_path: PathBuf,
    /// Fraction of each side scanned from the bottom-right corner.
    pub region_fraction: f32,
    /// Upscaling multiplier applied before decoding.
    pub scale_factor: f32,
}

/// What scanning one image produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum DecodeStatus {
    /// At least one payload was decoded.
    Found,
    /// The image was read but no QR code was found in the region.
    NotDetected,
    /// The image could not be read.
    Unreadable(String),
}

/// Outcome of scanning one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeResult {
    /// Scanned image path.
    pub path: PathBuf,
    /// Every payload decoded from the region, in detection order.
    pub payloads: Vec<String>,
    /// Scan outcome.
    pub status: DecodeStatus,
}

impl DecodeResult {
    /// Whether any payload was decoded.
    #[must_use]
    pub fn found(&self) -> bool {
        !self.payloads.is_empty()
    }

    fn from_payloads(path: PathBuf, payloads: Vec<String>) -> Self {
        let status = if payloads.is_empty() {
            DecodeStatus::NotDetected
        } else {
            DecodeStatus::Found
        };
        Self {
            path,
            payloads,
            status,
        }
    }

    fn unreadable(path: PathBuf, reason: String) -> Self {
        Self {
            path,
            payloads: Vec::new(),
            status: DecodeStatus::Unreadable(reason),
        }
    }
}

/// Recovers QR watermarks from the bottom-right corner of images.
#[derive(Debug, Clone)]
pub struct Decoder {
    opts: DecodeOptions,
    images: ImageSet,
}

impl Decoder {
    /// Create a decoder recognizing the default image extensions.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfig`] if `opts` fails validation,
    /// including when the region cannot contain the expected mark.
    pub fn new(opts: DecodeOptions) -> Result<Self> {
        Self::with_image_set(opts, ImageSet::default())
    }

    /// Create a decoder with an explicit set of recognized extensions.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfig`] if `opts` fails validation.
    pub fn with_image_set(opts: DecodeOptions, images: ImageSet) -> Result<Self> {
        opts.validate()?;
        Ok(Self { opts, images })
    }

    /// Options in use.
    #[must_use]
    pub fn options(&self) -> &DecodeOptions {
        &self.opts
    }

    /// Decode the payloads in the bottom-right region of an in-memory image.
    #[must_use]
    pub fn decode_image(&self, image: &DynamicImage) -> Vec<String> {
        let region = extract(image, self.opts.region_fraction, self.opts.scale_factor);
        decode_region(&region)
    }

    /// Load and scan one image file.
    #[must_use]
    pub fn decode_file(&self, path: &Path) -> DecodeResult {
        self.run_task(&self.task_for(path.to_path_buf()))
    }

    fn task_for(&self, image_path: PathBuf) -> DecodeTask {
        DecodeTask {
            image_path,
            region_fraction: self.opts.region_fraction,
            scale_factor: self.opts.scale_factor,
        }
    }

    /// Run one prepared task.
    #[must_use]
    pub fn run_task(&self, task: &DecodeTask) -> DecodeResult {
        let (asset, image) = match ImageAsset::open(&task.image_path) {
            Ok(loaded) => loaded,
            Err(e) => {
                log::warn!("{e}");
                return DecodeResult::unreadable(task.image_path.clone(), e.to_string());
            }
        };

        if let Some(embed) = &self.opts.expected_mark {
            if !covers_placement(asset.width, asset.height, task.region_fraction, embed) {
                log::warn!(
                    "{}: scan region {:.3} of {}x{} cannot contain a 1/{} mark with {}px margin",
                    asset.path.display(),
                    task.region_fraction,
                    asset.width,
                    asset.height,
                    embed.box_ratio,
                    embed.margin
                );
            }
        }

        let region = extract(&image, task.region_fraction, task.scale_factor);
        let payloads = decode_region(&region);
        if payloads.is_empty() {
            log::info!("{}: no watermark detected", asset.path.display());
        } else {
            log::debug!("{}: decoded {:?}", asset.path.display(), payloads);
        }
        DecodeResult::from_payloads(asset.path, payloads)
    }

    /// Scan every supported image in `image_dir`.
    ///
    /// Non-image entries are skipped. Runs sequentially when `workers` is 0
    /// or 1, otherwise on a pool of that many threads. Results are returned
    /// in sorted file-name order.
    ///
    /// # Errors
    ///
    /// Returns an error only if `image_dir` cannot be read or the pool
    /// cannot start.
    pub fn decode_directory(
        &self,
        image_dir: &Path,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Vec<DecodeResult>> {
        let tasks: Vec<DecodeTask> = self
            .images
            .list(image_dir)?
            .into_iter()
            .map(|p| self.task_for(p))
            .collect();

        log::info!(
            "scanning {} images in {} ({} workers)",
            tasks.len(),
            image_dir.display(),
            self.opts.workers.max(1)
        );

        let results = run_tasks(
            &tasks,
            self.opts.workers,
            progress,
            |task| self.run_task(task),
            |task, msg| {
                log::warn!("{}: worker panicked: {msg}", task.image_path.display());
                DecodeResult::unreadable(task.image_path.clone(), format!("worker panicked: {msg}"))
            },
        )?;

        let found = results.iter().filter(|r| r.found()).count();
        log::info!("found watermarks in {found} of {} images", results.len());
        Ok(results)
    }
}
