//! Watermark placement and compositing.
//!
//! The mark is always placed in the bottom-right corner, `margin` pixels
//! from both edges, and copied fully opaque: any blending with the host would
//! lower the black/white contrast the decoder relies on.

use image::{GrayImage, Rgb, RgbImage};

use crate::error::{Error, Result};

/// Image corner a mark is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Corner {
    /// Bottom-right corner. The only corner the decoder scans.
    #[default]
    BottomRight,
}

/// Where a mark goes on a host image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Anchor corner.
    pub corner: Corner,
    /// Gap between the mark and the image edges, in pixels.
    pub margin: u32,
}

impl Placement {
    /// Bottom-right placement with the given margin.
    #[must_use]
    pub fn bottom_right(margin: u32) -> Self {
        Self {
            corner: Corner::BottomRight,
            margin,
        }
    }

    /// Top-left coordinate of a `side`x`side` mark on a `width`x`height` host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageTooSmall`] if the mark and margin do not fit.
    /// The mark is never clipped.
    pub fn position(&self, width: u32, height: u32, side: u32) -> Result<(u32, u32)> {
        let needed = side.saturating_add(self.margin);
        if width < needed || height < needed {
            return Err(Error::ImageTooSmall {
                width,
                height,
                wm_size: needed,
            });
        }
        match self.corner {
            Corner::BottomRight => Ok((width - needed, height - needed)),
        }
    }
}

/// Composite `mark` onto a copy of `host` at `placement`.
///
/// The host is left untouched. Every mark pixel replaces the host pixel
/// under it.
///
/// # Errors
///
/// Returns [`Error::ImageTooSmall`] if the mark does not fit.
pub fn composite(host: &RgbImage, mark: &GrayImage, placement: Placement) -> Result<RgbImage> {
    let side = mark.width().max(mark.height());
    let (pos_x, pos_y) = placement.position(host.width(), host.height(), side)?;
    log::debug!(
        "placing {}x{} mark at ({pos_x}, {pos_y}) on {}x{} host",
        mark.width(),
        mark.height(),
        host.width(),
        host.height()
    );

    let mut out = host.clone();
    for (dx, dy, px) in mark.enumerate_pixels() {
        let v = px[0];
        out.put_pixel(pos_x + dx, pos_y + dy, Rgb([v, v, v]));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn position_is_bottom_right_with_margin() {
        let p = Placement::bottom_right(5);
        assert_eq!(p.position(1000, 800, 25).unwrap(), (970, 770));
        assert_eq!(p.position(30, 30, 25).unwrap(), (0, 0));
    }

    #[test]
    fn position_rejects_oversized_mark() {
        let p = Placement::bottom_right(5);
        assert!(matches!(
            p.position(29, 100, 25),
            Err(Error::ImageTooSmall { wm_size: 30, .. })
        ));
        assert!(p.position(100, 29, 25).is_err());
    }

    #[test]
    fn composite_copies_mark_opaquely_without_touching_host() {
        let host = RgbImage::from_pixel(100, 80, Rgb([10, 200, 30]));
        let mut mark = GrayImage::from_pixel(20, 20, Luma([255]));
        mark.put_pixel(0, 0, Luma([0]));

        let out = composite(&host, &mark, Placement::bottom_right(5)).unwrap();

        // Host is unchanged.
        assert!(host.pixels().all(|p| *p == Rgb([10, 200, 30])));
        // Mark spans (75..95, 55..75).
        assert_eq!(*out.get_pixel(75, 55), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(94, 74), Rgb([255, 255, 255]));
        // Margin and the rest of the image keep host pixels.
        assert_eq!(*out.get_pixel(95, 75), Rgb([10, 200, 30]));
        assert_eq!(*out.get_pixel(74, 54), Rgb([10, 200, 30]));
        assert_eq!(*out.get_pixel(0, 0), Rgb([10, 200, 30]));
    }

    #[test]
    fn mark_within_bounds_never_clips() {
        // side <= min(w, h) - margin always fits entirely.
        for (w, h) in [(31, 31), (64, 40), (400, 35)] {
            let margin = 5;
            let side = w.min(h) - margin;
            let mark = GrayImage::from_pixel(side, side, Luma([0]));
            let host = RgbImage::new(w, h);
            let out = composite(&host, &mark, Placement::bottom_right(margin)).unwrap();
            let (x, y) = Placement::bottom_right(margin).position(w, h, side).unwrap();
            assert!(x + side + margin <= w && y + side + margin <= h);
            assert_eq!(out.dimensions(), (w, h));
        }
    }
}
