//! QR watermark synthesis.
//!
//! A payload is encoded with the `qrcode` crate, rendered as a black/white
//! bitmap at a fixed number of pixels per module, then resampled to the
//! requested side length with Lanczos3 so module edges stay sharp enough to
//! decode after compositing.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use qrcode::types::QrError;
use qrcode::{Color, QrCode, Version};

use crate::error::{Error, Result};
use crate::options::{EcLevel, EmbedOptions};

const MAX_VERSION: i16 = 40;

/// Largest side of the rendered symbol before resampling, in pixels.
pub const MAX_RENDER_SIDE: u32 = 8192;

/// Everything needed to synthesize one watermark bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkSpec {
    /// String encoded into the QR symbol.
    pub payload: String,
    /// Side length of the final square bitmap, in pixels.
    pub target_side: u32,
    /// QR error-correction level.
    pub ec_level: EcLevel,
    /// Rendered pixels per module before resampling.
    pub module_size: u32,
    /// Quiet-zone width, in modules.
    pub border: u32,
    /// QR version; the minimum when `fit` is set.
    pub version: i16,
    /// Allow versions above `version` when the payload needs them.
    pub fit: bool,
}

impl WatermarkSpec {
    /// Build a spec for `payload` at `target_side` pixels using the symbol
    /// parameters in `opts`.
    #[must_use]
    pub fn new(payload: impl Into<String>, target_side: u32, opts: &EmbedOptions) -> Self {
        Self {
            payload: payload.into(),
            target_side,
            ec_level: opts.ec_level,
            module_size: opts.module_size,
            border: opts.border,
            version: opts.version,
            fit: opts.fit,
        }
    }
}

/// Side length of the mark for a host image of `host_width` pixels.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] if `box_ratio` is zero or the host is
/// narrower than `box_ratio` pixels, which would give an empty mark.
pub fn target_side_for(host_width: u32, box_ratio: u32) -> Result<u32> {
    if box_ratio == 0 {
        return Err(Error::InvalidConfig("box_ratio must be at least 1".into()));
    }
    match host_width / box_ratio {
        0 => Err(Error::InvalidConfig(format!(
            "image width {host_width} is below box_ratio {box_ratio}; watermark would be empty"
        ))),
        side => Ok(side),
    }
}

/// Encode the payload into a QR symbol honoring the version policy.
fn encode(spec: &WatermarkSpec) -> Result<QrCode> {
    let ec = spec.ec_level.to_qr();
    let data = spec.payload.as_bytes();
    let last = if spec.fit { MAX_VERSION } else { spec.version };

    for v in spec.version..=last {
        match QrCode::with_version(data, Version::Normal(v), ec) {
            Ok(code) => {
                log::debug!("encoded {} bytes as QR version {v}", data.len());
                return Ok(code);
            }
            Err(QrError::DataTooLong) => {}
            Err(e) => {
                return Err(Error::InvalidConfig(format!("QR encoding failed: {e}")));
            }
        }
    }

    Err(Error::EncodingCapacityExceeded {
        len: data.len(),
        version: last,
        ec_level: spec.ec_level,
    })
}

/// Side length of the rendered symbol, or `None` past [`MAX_RENDER_SIDE`].
fn render_side(modules: u32, module_size: u32, border: u32) -> Option<u32> {
    border
        .checked_mul(2)
        .and_then(|b| b.checked_add(modules))
        .and_then(|m| m.checked_mul(module_size))
        .filter(|side| *side <= MAX_RENDER_SIDE)
}

/// Render a QR symbol as a black/white bitmap, `module_size` pixels per module.
fn render(code: &QrCode, module_size: u32, border: u32) -> Result<GrayImage> {
    let width = u32::try_from(code.width()).unwrap_or(u32::MAX);
    let side = render_side(width, module_size, border).ok_or_else(|| {
        Error::InvalidConfig(format!(
            "{width}-module symbol with border {border} at {module_size}px per module \
             exceeds {MAX_RENDER_SIDE}px"
        ))
    })?;
    let mut img = GrayImage::from_pixel(side, side, Luma([255]));

    for (idx, color) in code.to_colors().into_iter().enumerate() {
        if color != Color::Dark {
            continue;
        }
        let idx = u32::try_from(idx).unwrap_or(u32::MAX);
        let px = (border + idx % width) * module_size;
        let py = (border + idx / width) * module_size;
        for dy in 0..module_size {
            for dx in 0..module_size {
                img.put_pixel(px + dx, py + dy, Luma([0]));
            }
        }
    }
    Ok(img)
}

/// Synthesize the square watermark bitmap described by `spec`.
///
/// # Errors
///
/// Returns [`Error::EncodingCapacityExceeded`] if the payload does not fit
/// the allowed versions, or [`Error::InvalidConfig`] for a zero target side
/// or module size.
pub fn synthesize(spec: &WatermarkSpec) -> Result<GrayImage> {
    if spec.target_side == 0 {
        return Err(Error::InvalidConfig("target side must be at least 1 pixel".into()));
    }
    if spec.module_size == 0 {
        return Err(Error::InvalidConfig("module_size must be at least 1".into()));
    }

    let code = encode(spec)?;
    let rendered = render(&code, spec.module_size, spec.border)?;
    if rendered.width() == spec.target_side {
        return Ok(rendered);
    }
    Ok(imageops::resize(
        &rendered,
        spec.target_side,
        spec.target_side,
        FilterType::Lanczos3,
    ))
}
