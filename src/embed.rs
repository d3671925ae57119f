//! Batch watermark embedding.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbImage};

use crate::composite::{composite, Placement};
use crate::enumerate::{ImageAsset, ImageSet};
use crate::error::{Error, Result};
use crate::options::EmbedOptions;
use crate::pool::{run_tasks, ProgressFn};
use crate::synth::{synthesize, target_side_for, WatermarkSpec};

/// One image to watermark, fully resolved before dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedTask {
    /// Image to read.
    pub source: PathBuf,
    /// Payload to encode.
    pub payload: String,
    /// Where the marked image is written.
    pub output: PathBuf,
    /// Divisor applied to the host width to size the mark.
    pub box_ratio: u32,
    /// Earlier source in the same batch that maps to the same `output`.
    ///
    /// Such a task is reported as failed instead of overwriting that output.
    pub collides_with: Option<PathBuf>,
}

/// Outcome of embedding a watermark into one image.
#[derive(Debug, Clone)]
pub struct EmbedResult {
    /// Source image path.
    pub path: PathBuf,
    /// Output path (written only on success).
    pub output: PathBuf,
    /// Payload that was (or would have been) encoded.
    pub payload: String,
    /// Whether the marked image was written.
    pub success: bool,
    /// Human-readable status message.
    pub message: String,
}

impl EmbedResult {
    fn new(task: &EmbedTask) -> Self {
        Self {
            path: task.source.clone(),
            output: task.output.clone(),
            payload: task.payload.clone(),
            success: false,
            message: String::new(),
        }
    }
}

/// Embeds QR watermarks into images, one at a time or a directory at once.
///
/// Create with [`Embedder::new()`] and reuse for multiple batches.
#[derive(Debug, Clone)]
pub struct Embedder {
    opts: EmbedOptions,
    images: ImageSet,
}

impl Embedder {
    /// Create an embedder recognizing the default image extensions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `opts` fails validation.
    pub fn new(opts: EmbedOptions) -> Result<Self> {
        Self::with_image_set(opts, ImageSet::default())
    }

    /// Create an embedder with an explicit set of recognized extensions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `opts` fails validation.
    pub fn with_image_set(opts: EmbedOptions, images: ImageSet) -> Result<Self> {
        opts.validate()?;
        Ok(Self { opts, images })
    }

    /// Options in use.
    #[must_use]
    pub fn options(&self) -> &EmbedOptions {
        &self.opts
    }

    /// Return a copy of `host` with a QR mark for `payload` in its
    /// bottom-right corner, sized `host_width / box_ratio`.
    ///
    /// # Errors
    ///
    /// Fails if the mark would be empty, the payload does not fit the QR
    /// capacity, or the mark and margin do not fit the host.
    pub fn watermark_image(
        &self,
        host: &DynamicImage,
        payload: &str,
        box_ratio: u32,
    ) -> Result<RgbImage> {
        let side = target_side_for(host.width(), box_ratio)?;
        let mark = synthesize(&WatermarkSpec::new(payload, side, &self.opts))?;
        composite(&host.to_rgb8(), &mark, Placement::bottom_right(self.opts.margin))
    }

    /// Build the task list for a directory without touching any image.
    ///
    /// Images are taken in sorted order and image `i` gets the payload
    /// `image_dir + i` and the output `output_dir/<stem>_qr.jpg`. When two
    /// sources share a stem, the first keeps the output and later ones are
    /// marked with [`EmbedTask::collides_with`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDirectory`] if `image_dir` cannot be read.
    pub fn plan(&self, image_dir: &Path, output_dir: &Path) -> Result<Vec<EmbedTask>> {
        let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
        let tasks = self
            .images
            .list(image_dir)?
            .into_iter()
            .enumerate()
            .map(|(idx, source)| {
                let output = output_dir.join(marked_file_name(&source));
                let collides_with = match claimed.get(&output) {
                    Some(first) => Some(first.clone()),
                    None => {
                        claimed.insert(output.clone(), source.clone());
                        None
                    }
                };
                EmbedTask {
                    output,
                    payload: payload_for(image_dir, idx),
                    box_ratio: self.opts.box_ratio,
                    collides_with,
                    source,
                }
            })
            .collect();
        Ok(tasks)
    }

    /// Load, watermark and save a single image.
    ///
    /// Never fails outright: any error is reported in the returned
    /// [`EmbedResult`] and logged.
    #[must_use]
    pub fn embed_file(&self, source: &Path, output: &Path, payload: &str) -> EmbedResult {
        self.run_task(&EmbedTask {
            source: source.to_path_buf(),
            payload: payload.to_string(),
            output: output.to_path_buf(),
            box_ratio: self.opts.box_ratio,
            collides_with: None,
        })
    }

    /// Run one prepared task.
    #[must_use]
    pub fn run_task(&self, task: &EmbedTask) -> EmbedResult {
        let mut result = EmbedResult::new(task);
        match self.try_task(task) {
            Ok(()) => {
                result.success = true;
                result.message = format!("Watermark '{}' embedded", task.payload);
            }
            Err(e) => {
                log::warn!("{}: {e}", task.source.display());
                result.message = e.to_string();
            }
        }
        result
    }

    fn try_task(&self, task: &EmbedTask) -> Result<()> {
        if let Some(first) = &task.collides_with {
            return Err(Error::OutputCollision {
                output: task.output.clone(),
                first: first.clone(),
                source_path: task.source.clone(),
            });
        }
        let (asset, host) = ImageAsset::open(&task.source)?;
        log::debug!(
            "embedding '{}' into {} ({}x{})",
            task.payload,
            asset.path.display(),
            asset.width,
            asset.height
        );
        let marked = self.watermark_image(&host, &task.payload, task.box_ratio)?;

        if let Some(parent) = task.output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| write_failure(&task.output, e))?;
            }
        }
        if task.output.exists() {
            std::fs::remove_file(&task.output).map_err(|e| write_failure(&task.output, e))?;
        }
        save_image(&marked, &task.output)
    }

    /// Watermark every supported image in `image_dir` into `output_dir`.
    ///
    /// Runs sequentially when `workers` is 1, otherwise on a pool of that
    /// many threads. Results are returned in enumeration order. A failing
    /// image is recorded in its result and the batch carries on.
    ///
    /// # Errors
    ///
    /// Only setup problems are returned: an unreadable input directory, an
    /// output directory that cannot be created, or a pool that cannot start.
    pub fn embed_directory(
        &self,
        image_dir: &Path,
        output_dir: &Path,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Vec<EmbedResult>> {
        let tasks = self.plan(image_dir, output_dir)?;

        if !output_dir.exists() {
            std::fs::create_dir_all(output_dir)?;
        }

        log::info!(
            "embedding {} images from {} into {} ({} workers)",
            tasks.len(),
            image_dir.display(),
            output_dir.display(),
            self.opts.workers
        );

        let results = run_tasks(
            &tasks,
            self.opts.workers,
            progress,
            |task| self.run_task(task),
            |task, msg| {
                log::warn!("{}: worker panicked: {msg}", task.source.display());
                let mut r = EmbedResult::new(task);
                r.message = format!("worker panicked: {msg}");
                r
            },
        )?;

        let ok = results.iter().filter(|r| r.success).count();
        log::info!("embedded {ok} of {} images", results.len());
        Ok(results)
    }
}

/// Payload for the image at ordinal `index` of `image_dir`: the directory
/// path exactly as given, followed by the index.
#[must_use]
pub fn payload_for(image_dir: &Path, index: usize) -> String {
    format!("{}{index}", image_dir.display())
}

/// File name of the marked copy of `source`: `<stem>_qr.jpg`.
#[must_use]
pub fn marked_file_name(source: &Path) -> String {
    let stem = source.file_stem().unwrap_or_default().to_string_lossy();
    format!("{stem}_qr.jpg")
}

/// Generate a default output path next to the input.
///
/// Example: `"frame_0001.png"` becomes `"frame_0001_qr.jpg"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(marked_file_name(input))
}

fn write_failure(path: &Path, e: std::io::Error) -> Error {
    Error::WriteFailure {
        path: path.to_path_buf(),
        source: image::ImageError::IoError(e),
    }
}

/// Save an RGB image with format-specific quality settings.
///
/// JPEG is written at quality 100 so compression does not blur module edges.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] for unknown extensions and
/// [`Error::WriteFailure`] if encoding or writing fails.
pub fn save_image(img: &RgbImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    let fail = |source: image::ImageError| Error::WriteFailure {
        path: path.to_path_buf(),
        source,
    };

    match format {
        ImageFormat::Jpeg => {
            let file = std::fs::File::create(path).map_err(|e| write_failure(path, e))?;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 100);
            encoder.encode_image(img).map_err(fail)?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp | ImageFormat::Tiff => {
            img.save(path).map_err(fail)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn payload_appends_index_to_directory() {
        assert_eq!(payload_for(Path::new("/data/frames"), 0), "/data/frames0");
        assert_eq!(payload_for(Path::new("frames/"), 12), "frames/12");
    }

    #[test]
    fn default_output_path_appends_qr_suffix() {
        let p = default_output_path(Path::new("/tmp/frame_0001.png"));
        assert_eq!(p, PathBuf::from("/tmp/frame_0001_qr.jpg"));

        let p = default_output_path(Path::new("image.jpeg"));
        assert_eq!(p.file_name().unwrap().to_str().unwrap(), "image_qr.jpg");
    }

    #[test]
    fn new_rejects_invalid_options() {
        let opts = EmbedOptions {
            box_ratio: 0,
            ..EmbedOptions::default()
        };
        assert!(matches!(Embedder::new(opts), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn watermark_image_places_mark_bottom_right() {
        let embedder = Embedder::new(EmbedOptions::default()).unwrap();
        let host = DynamicImage::ImageRgb8(RgbImage::from_pixel(1000, 800, Rgb([90, 20, 160])));
        let out = embedder.watermark_image(&host, "frames0", 40).unwrap();

        // 25px mark at (970, 770); its top-left pixel is quiet zone, the
        // margin beyond it is untouched.
        assert_eq!(out.dimensions(), (1000, 800));
        assert_ne!(*out.get_pixel(970, 770), Rgb([90, 20, 160]));
        assert_eq!(*out.get_pixel(969, 769), Rgb([90, 20, 160]));
        assert_eq!(*out.get_pixel(996, 796), Rgb([90, 20, 160]));
        // Original is not modified.
        assert_eq!(host.to_rgb8().get_pixel(970, 770), &Rgb([90, 20, 160]));
    }

    #[test]
    fn watermark_image_rejects_narrow_host() {
        let embedder = Embedder::new(EmbedOptions::default()).unwrap();
        let host = DynamicImage::ImageRgb8(RgbImage::new(30, 30));
        assert!(matches!(
            embedder.watermark_image(&host, "p", 50),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn save_image_rejects_unknown_extension() {
        let img = RgbImage::new(4, 4);
        let err = save_image(&img, Path::new("out.xyz")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }
}
