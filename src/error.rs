//! Error types for the qr-watermark crate.

use std::path::PathBuf;

use crate::options::EcLevel;

/// Errors that can occur while embedding or recovering QR watermarks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The image codec could not load a file.
    #[error("failed to read image {}: {source}", .path.display())]
    UnreadableImage {
        /// Path of the image that failed to load.
        path: PathBuf,
        /// Underlying codec error.
        #[source]
        source: image::ImageError,
    },

    /// The payload does not fit the chosen QR version and error-correction level.
    #[error("payload of {len} bytes does not fit QR version {version} at EC level {ec_level}")]
    EncodingCapacityExceeded {
        /// Payload length in bytes.
        len: usize,
        /// Largest QR version that was tried.
        version: i16,
        /// Error-correction level in use.
        ec_level: EcLevel,
    },

    /// The composited image could not be written to its output path.
    #[error("failed to write {}: {source}", .path.display())]
    WriteFailure {
        /// Output path that could not be written.
        path: PathBuf,
        /// Underlying codec or I/O error.
        #[source]
        source: image::ImageError,
    },

    /// The image is too small to contain the watermark at the expected position.
    #[error("image too small ({width}x{height}) for {wm_size}x{wm_size} watermark")]
    ImageTooSmall {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Watermark side length plus margin, in pixels.
        wm_size: u32,
    },

    /// An option value is out of range or inconsistent with another option.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The input directory could not be listed.
    #[error("cannot read directory {}: {source}", .path.display())]
    InvalidDirectory {
        /// Directory that failed to open.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The worker pool could not be started.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The output image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Two inputs map to the same output file name.
    #[error(
        "output {} already claimed by {}; skipping {}",
        .output.display(),
        .first.display(),
        .source_path.display()
    )]
    OutputCollision {
        /// Shared output path.
        output: PathBuf,
        /// Earlier input in enumeration order that keeps the output.
        first: PathBuf,
        /// Input that was skipped.
        source_path: PathBuf,
    },
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
