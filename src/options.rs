//! Options for the embed and decode pipelines.
//!
//! The two pipelines never share state, so the only link between the corner
//! a mark is placed in and the corner a decoder scans is these option values.
//! [`DecodeOptions::check_covers`] and [`covers_placement`] make that link
//! explicit instead of leaving it to convention.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Largest accepted `module_size`, in pixels per module.
pub const MAX_MODULE_SIZE: u32 = 100;

/// Largest accepted quiet-zone `border`, in modules.
pub const MAX_BORDER: u32 = 16;

/// Largest accepted `scale_factor`.
pub const MAX_SCALE_FACTOR: f32 = 100.0;

/// QR error-correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EcLevel {
    /// About 7% of codewords can be restored.
    #[default]
    L,
    /// About 15% of codewords can be restored.
    M,
    /// About 25% of codewords can be restored.
    Q,
    /// About 30% of codewords can be restored.
    H,
}

impl EcLevel {
    pub(crate) fn to_qr(self) -> qrcode::EcLevel {
        match self {
            Self::L => qrcode::EcLevel::L,
            Self::M => qrcode::EcLevel::M,
            Self::Q => qrcode::EcLevel::Q,
            Self::H => qrcode::EcLevel::H,
        }
    }
}

impl fmt::Display for EcLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::L => "L",
            Self::M => "M",
            Self::Q => "Q",
            Self::H => "H",
        };
        f.write_str(s)
    }
}

impl FromStr for EcLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "L" => Ok(Self::L),
            "M" => Ok(Self::M),
            "Q" => Ok(Self::Q),
            "H" => Ok(Self::H),
            other => Err(format!("unknown error-correction level '{other}' (expected L, M, Q or H)")),
        }
    }
}

/// Options controlling watermark synthesis, placement and batch embedding.
#[derive(Debug, Clone)]
pub struct EmbedOptions {
    /// Divisor applied to the host width to size the mark (smaller = larger mark).
    pub box_ratio: u32,
    /// Gap between the mark and the bottom-right image edges, in pixels.
    pub margin: u32,
    /// QR error-correction level.
    pub ec_level: EcLevel,
    /// Rendered pixels per QR module before resampling to the target size.
    pub module_size: u32,
    /// White quiet-zone width around the symbol, in modules.
    pub border: u32,
    /// QR version (1-40). A minimum when `fit` is set, exact otherwise.
    pub version: i16,
    /// Grow the QR version when the payload does not fit `version`.
    pub fit: bool,
    /// Number of worker threads; 1 processes sequentially.
    pub workers: usize,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            box_ratio: 50,
            margin: 5,
            ec_level: EcLevel::L,
            module_size: 10,
            border: 1,
            version: 2,
            fit: true,
            workers: 1,
        }
    }
}

impl EmbedOptions {
    /// Check that every option is in range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending option.
    pub fn validate(&self) -> Result<()> {
        if self.box_ratio == 0 {
            return Err(Error::InvalidConfig("box_ratio must be at least 1".into()));
        }
        if !(1..=MAX_MODULE_SIZE).contains(&self.module_size) {
            return Err(Error::InvalidConfig(format!(
                "module_size must be between 1 and {MAX_MODULE_SIZE}, got {}",
                self.module_size
            )));
        }
        if self.border > MAX_BORDER {
            return Err(Error::InvalidConfig(format!(
                "border must be at most {MAX_BORDER} modules, got {}",
                self.border
            )));
        }
        if !(1..=40).contains(&self.version) {
            return Err(Error::InvalidConfig(format!(
                "QR version must be between 1 and 40, got {}",
                self.version
            )));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be at least 1".into()));
        }
        Ok(())
    }
}

/// Options controlling region extraction and batch decoding.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Fraction of the image width and height scanned from the bottom-right corner.
    pub region_fraction: f32,
    /// Upscaling multiplier applied to the region before decoding.
    pub scale_factor: f32,
    /// Number of worker threads; 0 or 1 processes sequentially.
    pub workers: usize,
    /// Embed options the scanned images were produced with, if known.
    ///
    /// When set, every image is checked with [`covers_placement`] and a
    /// warning is logged if the scan region cannot contain the mark.
    pub expected_mark: Option<EmbedOptions>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            region_fraction: 0.1,
            scale_factor: 15.0,
            workers: 1,
            expected_mark: None,
        }
    }
}

impl DecodeOptions {
    /// Check that every option is in range, and that the region covers
    /// `expected_mark` when one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] describing the problem.
    pub fn validate(&self) -> Result<()> {
        if !(self.region_fraction > 0.0 && self.region_fraction <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "region_fraction must be in (0, 1], got {}",
                self.region_fraction
            )));
        }
        if !(self.scale_factor >= 1.0 && self.scale_factor <= MAX_SCALE_FACTOR) {
            return Err(Error::InvalidConfig(format!(
                "scale_factor must be between 1 and {MAX_SCALE_FACTOR}, got {}",
                self.scale_factor
            )));
        }
        if let Some(embed) = &self.expected_mark {
            embed.validate()?;
            self.check_covers(embed)?;
        }
        Ok(())
    }

    /// Check, independently of image size, that the scan region is at least
    /// as wide as a mark produced with `embed`.
    ///
    /// The mark side is `width / box_ratio`, so the region needs
    /// `region_fraction >= 1 / box_ratio` along the width axis. The margin and
    /// the height axis depend on the image and are checked per image by
    /// [`covers_placement`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the region can never contain the mark.
    pub fn check_covers(&self, embed: &EmbedOptions) -> Result<()> {
        #[allow(clippy::cast_precision_loss)]
        let min_fraction = 1.0 / embed.box_ratio as f32;
        if self.region_fraction < min_fraction {
            return Err(Error::InvalidConfig(format!(
                "region_fraction {} is smaller than the mark (1/{} = {min_fraction:.4} of the width)",
                self.region_fraction, embed.box_ratio
            )));
        }
        Ok(())
    }
}

/// Whether a decode region of `region_fraction` on a `width`x`height` image
/// fully contains the mark placed there with `embed`.
#[must_use]
pub fn covers_placement(width: u32, height: u32, region_fraction: f32, embed: &EmbedOptions) -> bool {
    if embed.box_ratio == 0 {
        return false;
    }
    let needed = width / embed.box_ratio + embed.margin;
    let (rw, rh) = crate::region::region_size(width, height, region_fraction);
    rw >= needed && rh >= needed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_tool() {
        let embed = EmbedOptions::default();
        assert_eq!(embed.box_ratio, 50);
        assert_eq!(embed.margin, 5);
        assert_eq!(embed.ec_level, EcLevel::L);
        assert_eq!(embed.module_size, 10);
        assert_eq!(embed.border, 1);
        assert_eq!(embed.version, 2);
        assert!(embed.validate().is_ok());

        let decode = DecodeOptions::default();
        assert!((decode.region_fraction - 0.1).abs() < f32::EPSILON);
        assert!((decode.scale_factor - 15.0).abs() < f32::EPSILON);
        assert!(decode.validate().is_ok());
    }

    #[test]
    fn ec_level_parses_case_insensitively() {
        assert_eq!("h".parse::<EcLevel>().unwrap(), EcLevel::H);
        assert_eq!("Q".parse::<EcLevel>().unwrap(), EcLevel::Q);
        assert!("X".parse::<EcLevel>().is_err());
    }

    #[test]
    fn embed_validation_rejects_out_of_range_values() {
        let zero_ratio = EmbedOptions {
            box_ratio: 0,
            ..EmbedOptions::default()
        };
        assert!(matches!(zero_ratio.validate(), Err(Error::InvalidConfig(_))));

        let bad_version = EmbedOptions {
            version: 41,
            ..EmbedOptions::default()
        };
        assert!(bad_version.validate().is_err());

        let huge_modules = EmbedOptions {
            module_size: 100_000,
            ..EmbedOptions::default()
        };
        assert!(matches!(huge_modules.validate(), Err(Error::InvalidConfig(_))));

        let wide_border = EmbedOptions {
            border: MAX_BORDER + 1,
            ..EmbedOptions::default()
        };
        assert!(wide_border.validate().is_err());

        let no_workers = EmbedOptions {
            workers: 0,
            ..EmbedOptions::default()
        };
        assert!(no_workers.validate().is_err());
    }

    #[test]
    fn decode_validation_rejects_out_of_range_values() {
        let zero_region = DecodeOptions {
            region_fraction: 0.0,
            ..DecodeOptions::default()
        };
        assert!(zero_region.validate().is_err());

        let shrink = DecodeOptions {
            scale_factor: 0.5,
            ..DecodeOptions::default()
        };
        assert!(shrink.validate().is_err());

        let blow_up = DecodeOptions {
            scale_factor: 1.0e6,
            ..DecodeOptions::default()
        };
        assert!(blow_up.validate().is_err());

        let nan = DecodeOptions {
            scale_factor: f32::NAN,
            ..DecodeOptions::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn region_narrower_than_mark_is_rejected() {
        let embed = EmbedOptions {
            box_ratio: 5,
            ..EmbedOptions::default()
        };
        let decode = DecodeOptions {
            region_fraction: 0.1,
            expected_mark: Some(embed.clone()),
            ..DecodeOptions::default()
        };
        assert!(decode.check_covers(&embed).is_err());
        assert!(decode.validate().is_err());

        let wide = DecodeOptions {
            region_fraction: 0.3,
            ..DecodeOptions::default()
        };
        assert!(wide.check_covers(&embed).is_ok());
    }

    #[test]
    fn placement_coverage_accounts_for_margin_and_height() {
        let embed = EmbedOptions {
            box_ratio: 40,
            ..EmbedOptions::default()
        };
        // 1000x800: mark 25px + 5px margin = 30px; region 100x80.
        assert!(covers_placement(1000, 800, 0.1, &embed));
        // Very wide, short image: region height 10px cannot hold 30px.
        assert!(!covers_placement(1000, 100, 0.1, &embed));
    }
}
