//! Region-of-interest extraction for decoding.
//!
//! The decoder only looks at the bottom-right corner, where the compositor
//! places the mark. The crop is usually tiny compared with the host, so it
//! is upscaled before decoding: QR readers need several pixels per module to
//! lock onto finder patterns reliably.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, RgbImage};

/// Upper bound on the pixel count of an upscaled region.
pub const MAX_SCALED_PIXELS: u64 = 40_000_000;

/// Size of the bottom-right region scanned on a `width`x`height` image.
///
/// Each side is `floor(side * region_fraction)`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn region_size(width: u32, height: u32, region_fraction: f32) -> (u32, u32) {
    let f = f64::from(region_fraction.clamp(0.0, 1.0));
    let rw = (f64::from(width) * f).floor() as u32;
    let rh = (f64::from(height) * f).floor() as u32;
    (rw.min(width), rh.min(height))
}

/// Dimensions of a `rw`x`rh` region upscaled by `scale_factor`.
///
/// The factor is reduced when the result would exceed [`MAX_SCALED_PIXELS`],
/// keeping the aspect ratio. It never drops below 1.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn scaled_size(rw: u32, rh: u32, scale_factor: f32) -> (u32, u32) {
    let mut scale = f64::from(scale_factor);
    if !scale.is_finite() || scale < 1.0 {
        scale = 1.0;
    }
    let area = f64::from(rw) * f64::from(rh);
    if area * scale * scale > MAX_SCALED_PIXELS as f64 {
        scale = (MAX_SCALED_PIXELS as f64 / area).sqrt().max(1.0);
    }
    let new_w = (f64::from(rw) * scale) as u32;
    let new_h = (f64::from(rh) * scale) as u32;
    (new_w.max(rw), new_h.max(rh))
}

/// Crop the bottom-right `region_fraction` of `image` and upscale it by
/// `scale_factor` with area-style (triangle) interpolation.
///
/// The upscaled size is capped as described in [`scaled_size`]. Returns an
/// empty image when the fraction rounds down to zero pixels.
#[must_use]
pub fn extract(image: &DynamicImage, region_fraction: f32, scale_factor: f32) -> RgbImage {
    let (width, height) = image.dimensions();
    let (rw, rh) = region_size(width, height, region_fraction);
    if rw == 0 || rh == 0 {
        return RgbImage::new(0, 0);
    }

    let crop = image.crop_imm(width - rw, height - rh, rw, rh).to_rgb8();

    let (new_w, new_h) = scaled_size(rw, rh, scale_factor);
    if new_w == rw && new_h == rh {
        return crop;
    }
    imageops::resize(&crop, new_w, new_h, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn region_size_floors_fraction() {
        assert_eq!(region_size(1000, 800, 0.1), (100, 80));
        assert_eq!(region_size(1919, 1079, 0.1), (191, 107));
        assert_eq!(region_size(5, 5, 0.1), (0, 0));
        assert_eq!(region_size(640, 480, 1.0), (640, 480));
    }

    #[test]
    fn extract_takes_bottom_right_corner() {
        let mut img = RgbImage::from_pixel(100, 50, Rgb([0, 0, 0]));
        for y in 45..50 {
            for x in 90..100 {
                img.put_pixel(x, y, Rgb([255, 0, 0]));
            }
        }
        let region = extract(&DynamicImage::ImageRgb8(img), 0.1, 1.0);
        assert_eq!(region.dimensions(), (10, 5));
        assert!(region.pixels().all(|p| *p == Rgb([255, 0, 0])));
    }

    #[test]
    fn extract_upscales_by_factor() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(1000, 800));
        let region = extract(&img, 0.1, 15.0);
        assert_eq!(region.dimensions(), (1500, 1200));
    }

    #[test]
    fn scaled_size_is_capped() {
        assert_eq!(scaled_size(100, 80, 15.0), (1500, 1200));
        assert_eq!(scaled_size(100, 80, 0.5), (100, 80));
        assert_eq!(scaled_size(100, 80, f32::NAN), (100, 80));

        let (w, h) = scaled_size(3840, 2160, 100.0);
        assert!(u64::from(w) * u64::from(h) <= MAX_SCALED_PIXELS);
        assert!(w > 3840 && h > 2160);

        // Already over the cap: no upscaling, but no shrinking either.
        assert_eq!(scaled_size(10_000, 8_000, 15.0), (10_000, 8_000));
    }

    #[test]
    fn tiny_region_is_empty() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        let region = extract(&img, 0.1, 15.0);
        assert_eq!(region.dimensions(), (0, 0));
    }
}
