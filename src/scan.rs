//! QR decoding of an extracted region.

use image::imageops;
use image::RgbImage;
use rqrr::PreparedImage;

/// Decode every QR symbol found in `region`.
///
/// The region is reduced to a single luma channel before detection. Payloads
/// are returned in detection order; an empty vector means nothing was found,
/// which is a normal outcome rather than an error. Grids that are located but
/// fail to decode are logged and skipped.
#[must_use]
pub fn decode_region(region: &RgbImage) -> Vec<String> {
    if region.width() == 0 || region.height() == 0 {
        return Vec::new();
    }

    let gray = imageops::grayscale(region);
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let raw = gray.as_raw();

    let mut prepared = PreparedImage::prepare_from_greyscale(w, h, |x, y| raw[y * w + x]);
    prepared
        .detect_grids()
        .into_iter()
        .filter_map(|grid| match grid.decode() {
            Ok((_, content)) => Some(content),
            Err(e) => {
                log::debug!("located QR grid failed to decode: {e:?}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::{composite, Placement};
    use crate::options::EmbedOptions;
    use crate::synth::{synthesize, WatermarkSpec};
    use image::Rgb;

    #[test]
    fn blank_region_decodes_to_nothing() {
        let region = RgbImage::from_pixel(300, 300, Rgb([128, 128, 128]));
        assert!(decode_region(&region).is_empty());
        assert!(decode_region(&RgbImage::new(0, 0)).is_empty());
    }

    #[test]
    fn decodes_synthesized_mark() {
        let mark = synthesize(&WatermarkSpec::new(
            "frames/clip7",
            270,
            &EmbedOptions::default(),
        ))
        .unwrap();
        let host = RgbImage::from_pixel(320, 320, Rgb([255, 255, 255]));
        let marked = composite(&host, &mark, Placement::bottom_right(5)).unwrap();
        assert_eq!(decode_region(&marked), ["frames/clip7"]);
    }
}
