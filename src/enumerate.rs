//! Deterministic listing of the images in a directory.

use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::error::{Error, Result};

/// Extensions recognized by [`ImageSet::default`], lowercase and without the dot.
pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"];

/// The set of image files in a directory, filtered by extension.
///
/// Listing is sorted by file name, so the ordinal index of each image is
/// stable across runs for unchanged directory contents. The embed pipeline
/// derives payloads from that index.
#[derive(Debug, Clone)]
pub struct ImageSet {
    extensions: Vec<String>,
}

impl Default for ImageSet {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS.iter().copied())
    }
}

impl ImageSet {
    /// Create an image set recognizing the given extensions (case-insensitive,
    /// with or without a leading dot).
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        Self { extensions }
    }

    /// Recognized extensions, lowercase.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Check if a path has one of the recognized extensions.
    #[must_use]
    pub fn is_supported(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|known| *known == ext)
            }
            None => false,
        }
    }

    /// List the supported regular files in `dir`, sorted by file name.
    ///
    /// Symbolic links are followed. Entries that do not resolve to a regular
    /// file or lack a recognized extension are skipped and logged at debug
    /// level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDirectory`] if `dir` cannot be read.
    pub fn list(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let read_dir = std::fs::read_dir(dir).map_err(|source| Error::InvalidDirectory {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = read_dir
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| {
                let keep = self.is_supported(p);
                if !keep {
                    log::debug!("skipping non-image entry {}", p.display());
                }
                keep
            })
            .collect();

        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(paths)
    }
}

/// Check if a file has one of the [`DEFAULT_EXTENSIONS`].
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    ImageSet::default().is_supported(path)
}

/// Read-only view of an image file opened for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    /// Source path.
    pub path: PathBuf,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ImageAsset {
    /// Decode the image at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnreadableImage`] if the codec cannot load the file.
    pub fn open(path: &Path) -> Result<(Self, DynamicImage)> {
        let img = image::open(path).map_err(|source| Error::UnreadableImage {
            path: path.to_path_buf(),
            source,
        })?;
        let asset = Self {
            path: path.to_path_buf(),
            width: img.width(),
            height: img.height(),
        };
        Ok((asset, img))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let dir = std::env::temp_dir().join(format!("qr-watermark-{prefix}-{nanos}"));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn is_supported_image_accepts_common_formats() {
        assert!(is_supported_image(Path::new("frame.jpg")));
        assert!(is_supported_image(Path::new("frame.JPEG")));
        assert!(is_supported_image(Path::new("frame.png")));
        assert!(is_supported_image(Path::new("frame.gif")));
        assert!(is_supported_image(Path::new("frame.Tiff")));
        assert!(is_supported_image(Path::new("frame.webp")));
        assert!(is_supported_image(Path::new("frame.bmp")));
    }

    #[test]
    fn is_supported_image_rejects_unsupported_formats() {
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("frame")));
        assert!(!is_supported_image(Path::new(".jpg")));
    }

    #[test]
    fn custom_extension_set_is_normalized() {
        let set = ImageSet::new([".PNG", "Jpg"]);
        assert_eq!(set.extensions(), ["png", "jpg"]);
        assert!(set.is_supported(Path::new("a.png")));
        assert!(!set.is_supported(Path::new("a.gif")));
    }

    #[test]
    fn list_is_sorted_filtered_and_repeatable() {
        let dir = unique_temp_dir("enumerate");
        for name in ["frame_0002.jpg", "frame_0000.png", "readme.txt", "frame_0001.JPG"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.join("nested.jpg")).unwrap();

        let set = ImageSet::default();
        let first = set.list(&dir).unwrap();
        let names: Vec<_> = first
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["frame_0000.png", "frame_0001.JPG", "frame_0002.jpg"]);
        assert_eq!(first, set.list(&dir).unwrap());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn list_follows_symlinks_to_images() {
        let dir = unique_temp_dir("symlink");
        let store = dir.join("store");
        std::fs::create_dir_all(&store).unwrap();
        std::fs::write(store.join("real.jpg"), b"x").unwrap();

        let frames = dir.join("frames");
        std::fs::create_dir_all(&frames).unwrap();
        std::os::unix::fs::symlink(store.join("real.jpg"), frames.join("linked.jpg")).unwrap();
        std::os::unix::fs::symlink(dir.join("missing.jpg"), frames.join("dangling.jpg")).unwrap();
        std::os::unix::fs::symlink(&store, frames.join("dir.png")).unwrap();

        let listed = ImageSet::default().list(&frames).unwrap();
        assert_eq!(listed, [frames.join("linked.jpg")]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn list_missing_directory_is_an_error() {
        let err = ImageSet::default()
            .list(Path::new("/definitely/not/here"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDirectory { .. }));
    }

    #[test]
    fn open_reports_unreadable_file() {
        let dir = unique_temp_dir("asset");
        let path = dir.join("broken.jpg");
        std::fs::write(&path, b"not a jpeg").unwrap();
        assert!(matches!(
            ImageAsset::open(&path),
            Err(Error::UnreadableImage { .. })
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
