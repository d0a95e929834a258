//! Region-of-interest geometry.
//!
//! The torso band is a fixed vertical slice of the image that skips the
//! head at the top and legs/footwear at the bottom. The skin sampling
//! box is another fractional rectangle, placed where a face or neck
//! usually sits in a worn-garment photo.

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, PipelineError, check_fraction, check_ordered};

/// An axis-aligned integer rectangle in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge (inclusive).
    pub x: u32,
    /// Top edge (inclusive).
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle.
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge (exclusive).
    #[must_use]
    pub const fn right(self) -> u32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive).
    #[must_use]
    pub const fn bottom(self) -> u32 {
        self.y + self.height
    }

    /// Number of pixels covered.
    #[must_use]
    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` if the rectangle covers no pixels.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns `true` if pixel `(px, py)` lies inside the rectangle.
    #[must_use]
    pub const fn contains(self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Returns `true` if the rectangle lies entirely within `dimensions`.
    #[must_use]
    pub const fn fits_within(self, dimensions: Dimensions) -> bool {
        self.right() <= dimensions.width && self.bottom() <= dimensions.height
    }
}

/// Vertical extent of the torso band as fractions of image height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TorsoBand {
    /// Top of the band (fraction of height).
    pub top: f64,
    /// Bottom of the band (fraction of height).
    pub bottom: f64,
}

impl TorsoBand {
    /// Default top edge: 20% down from the top.
    pub const DEFAULT_TOP: f64 = 0.2;
    /// Default bottom edge: 80% down from the top.
    pub const DEFAULT_BOTTOM: f64 = 0.8;

    pub(crate) fn validate(&self) -> Result<(), PipelineError> {
        check_fraction("torso_band.top", self.top)?;
        check_fraction("torso_band.bottom", self.bottom)?;
        check_ordered("torso_band.top", self.top, "torso_band.bottom", self.bottom)
    }
}

impl Default for TorsoBand {
    fn default() -> Self {
        Self {
            top: Self::DEFAULT_TOP,
            bottom: Self::DEFAULT_BOTTOM,
        }
    }
}

/// `floor(extent * fraction)`, clamped to `[0, extent]`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn scale(extent: u32, fraction: f64) -> u32 {
    let v = (f64::from(extent) * fraction).floor();
    if v <= 0.0 {
        0
    } else {
        (v as u32).min(extent)
    }
}

/// Full-width torso rectangle for an image of the given size.
///
/// Rows `[floor(h * top), floor(h * bottom))` are included. For very
/// short images where that range is empty, the single row at
/// `floor(h * top)` is used instead so the ROI is never degenerate.
/// A zero-sized image yields an empty rectangle.
#[must_use]
pub fn torso_band(dimensions: Dimensions, band: TorsoBand) -> Rect {
    let Dimensions { width, height } = dimensions;
    if width == 0 || height == 0 {
        return Rect::new(0, 0, 0, 0);
    }
    let y0 = scale(height, band.top).min(height - 1);
    let y1 = scale(height, band.bottom).max(y0 + 1).min(height);
    Rect::new(0, y0, width, y1 - y0)
}

/// Rectangle spanning `[floor(w*x0), floor(w*x1)) x [floor(h*y0), floor(h*y1))`.
///
/// May be empty for tiny images; callers treat an empty box as "no
/// sample available".
#[must_use]
pub fn fractional_box(dimensions: Dimensions, x0: f64, x1: f64, y0: f64, y1: f64) -> Rect {
    let left = scale(dimensions.width, x0);
    let right = scale(dimensions.width, x1).max(left);
    let top = scale(dimensions.height, y0);
    let bottom = scale(dimensions.height, y1).max(top);
    Rect::new(left, top, right - left, bottom - top)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    #[test]
    fn torso_band_default_is_middle_sixty_percent() {
        let r = torso_band(dims(100, 200), TorsoBand::default());
        assert_eq!(r, Rect::new(0, 40, 100, 120));
    }

    #[test]
    fn torso_band_floors_fractional_rows() {
        // 0.2 * 33 = 6.6 -> 6, 0.8 * 33 = 26.4 -> 26
        let r = torso_band(dims(10, 33), TorsoBand::default());
        assert_eq!(r.y, 6);
        assert_eq!(r.height, 20);
    }

    #[test]
    fn torso_band_fits_within_image() {
        for h in 1..40 {
            let d = dims(7, h);
            let r = torso_band(d, TorsoBand::default());
            assert!(r.fits_within(d), "band {r:?} escapes {d:?}");
            assert!(!r.is_empty(), "band must not be empty for height {h}");
        }
    }

    #[test]
    fn single_row_image_uses_that_row() {
        let r = torso_band(dims(5, 1), TorsoBand::default());
        assert_eq!(r, Rect::new(0, 0, 5, 1));
    }

    #[test]
    fn zero_sized_image_gives_empty_band() {
        assert!(torso_band(dims(0, 0), TorsoBand::default()).is_empty());
    }

    #[test]
    fn skin_box_matches_fractions() {
        let r = fractional_box(dims(100, 100), 0.35, 0.65, 0.12, 0.25);
        assert_eq!(r, Rect::new(35, 12, 30, 13));
    }

    #[test]
    fn fractional_box_on_tiny_image_may_be_empty() {
        let r = fractional_box(dims(2, 2), 0.35, 0.65, 0.12, 0.25);
        assert!(r.is_empty());
    }

    #[test]
    fn rect_contains_is_half_open() {
        let r = Rect::new(2, 3, 4, 5);
        assert!(r.contains(2, 3));
        assert!(r.contains(5, 7));
        assert!(!r.contains(6, 7));
        assert!(!r.contains(5, 8));
        assert_eq!(r.area(), 20);
    }

    #[test]
    fn inverted_band_is_rejected() {
        let band = TorsoBand {
            top: 0.9,
            bottom: 0.1,
        };
        assert!(band.validate().is_err());
    }
}
