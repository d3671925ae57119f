//! Tag batches of images with a visible QR-code watermark and recover it later.
//!
//! Every image in a directory gets a small QR code in its bottom-right corner
//! carrying a payload derived from the directory path and the image's sorted
//! position. The decoder crops that corner, upscales it and reads the code
//! back. The two halves share nothing but the files on disk.
//!
//! # Quick Start
//!
//! ```no_run
//! use qr_watermark::{EmbedOptions, Embedder};
//! use std::path::Path;
//!
//! let embedder = Embedder::new(EmbedOptions { box_ratio: 40, ..EmbedOptions::default() })
//!     .expect("valid options");
//! let results = embedder
//!     .embed_directory(Path::new("frames"), Path::new("frames_add_qrcode"), None)
//!     .expect("readable directory");
//! println!("{} marked", results.iter().filter(|r| r.success).count());
//! ```
//!
//! # Decoding
//!
//! ```no_run
//! use qr_watermark::{DecodeOptions, Decoder};
//! use std::path::Path;
//!
//! let decoder = Decoder::new(DecodeOptions::default()).expect("valid options");
//! let result = decoder.decode_file(Path::new("frames_add_qrcode/frame_0000_qr.jpg"));
//! println!("{}: {:?}", result.path.display(), result.payloads);
//! ```

#![deny(missing_docs)]

pub mod composite;
pub mod decode;
pub mod embed;
pub mod enumerate;
pub mod error;
pub mod options;
pub mod pool;
pub mod region;
pub mod scan;
pub mod synth;

pub use decode::{DecodeResult, DecodeStatus, DecodeTask, Decoder};
pub use embed::{
    default_output_path, marked_file_name, payload_for, save_image, EmbedResult, EmbedTask,
    Embedder,
};
pub use enumerate::{is_supported_image, ImageAsset, ImageSet, DEFAULT_EXTENSIONS};
pub use error::{Error, Result};
pub use options::{covers_placement, DecodeOptions, EcLevel, EmbedOptions};
