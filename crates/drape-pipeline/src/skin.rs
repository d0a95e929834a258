//! Skin-tone suppression.
//!
//! Samples a small box where a face or neck usually sits, averages its
//! HSV color, and removes ROI pixels that are close to that average
//! from the garment mask. This is not a skin model: it only removes
//! tones similar to whatever the sample box contains. When the box has
//! too few foreground pixels (cropped photo, flat-lay garment) nothing
//! is removed.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::mask::Mask;
use crate::roi::Rect;
use crate::types::{PipelineError, check_fraction, check_ordered};

/// A color in HSV space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsv {
    /// Hue in degrees, `[0, 360)`. Zero for grays.
    pub h: f64,
    /// Saturation, `[0, 1]`.
    pub s: f64,
    /// Value, `[0, 1]`.
    pub v: f64,
}

impl Hsv {
    /// Convert 8-bit sRGB to HSV.
    #[must_use]
    #[allow(clippy::many_single_char_names)]
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let r = f64::from(r) / 255.0;
        let g = f64::from(g) / 255.0;
        let b = f64::from(b) / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let d = max - min;

        let mut h = 0.0;
        if d > 0.0 {
            let sector = if (max - r).abs() < f64::EPSILON {
                ((g - b) / d).rem_euclid(6.0)
            } else if (max - g).abs() < f64::EPSILON {
                (b - r) / d + 2.0
            } else {
                (r - g) / d + 4.0
            };
            h = sector * 60.0;
        }
        let s = if max > 0.0 { d / max } else { 0.0 };
        Self { h, s, v: max }
    }
}

/// Shorter-arc distance between two hues in degrees, in `[0, 180]`.
#[must_use]
pub fn hue_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).abs().rem_euclid(360.0);
    d.min(360.0 - d)
}

/// Settings for skin-tone suppression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkinSettings {
    /// Whether to run suppression at all.
    pub enabled: bool,
    /// Left edge of the sample box (fraction of width).
    pub box_left: f64,
    /// Right edge of the sample box (fraction of width).
    pub box_right: f64,
    /// Top edge of the sample box (fraction of height).
    pub box_top: f64,
    /// Bottom edge of the sample box (fraction of height).
    pub box_bottom: f64,
    /// The box must contain strictly more foreground pixels than this.
    pub min_samples: usize,
    /// Maximum hue distance in degrees (exclusive).
    pub hue_tolerance: f64,
    /// Maximum saturation difference (exclusive).
    pub saturation_tolerance: f64,
    /// Maximum value difference (exclusive).
    pub value_tolerance: f64,
}

impl SkinSettings {
    /// Default sample box left edge.
    pub const DEFAULT_BOX_LEFT: f64 = 0.35;
    /// Default sample box right edge.
    pub const DEFAULT_BOX_RIGHT: f64 = 0.65;
    /// Default sample box top edge.
    pub const DEFAULT_BOX_TOP: f64 = 0.12;
    /// Default sample box bottom edge.
    pub const DEFAULT_BOX_BOTTOM: f64 = 0.25;
    /// Default minimum sample count.
    pub const DEFAULT_MIN_SAMPLES: usize = 50;
    /// Default hue tolerance in degrees.
    pub const DEFAULT_HUE_TOLERANCE: f64 = 25.0;
    /// Default saturation tolerance.
    pub const DEFAULT_SATURATION_TOLERANCE: f64 = 0.18;
    /// Default value tolerance.
    pub const DEFAULT_VALUE_TOLERANCE: f64 = 0.2;

    pub(crate) fn validate(&self) -> Result<(), PipelineError> {
        check_fraction("skin.box_left", self.box_left)?;
        check_fraction("skin.box_right", self.box_right)?;
        check_fraction("skin.box_top", self.box_top)?;
        check_fraction("skin.box_bottom", self.box_bottom)?;
        check_ordered("skin.box_left", self.box_left, "skin.box_right", self.box_right)?;
        check_ordered("skin.box_top", self.box_top, "skin.box_bottom", self.box_bottom)?;
        if self.hue_tolerance < 0.0 || self.saturation_tolerance < 0.0 || self.value_tolerance < 0.0
        {
            return Err(PipelineError::InvalidConfig(
                "skin tolerances must be non-negative".to_owned(),
            ));
        }
        Ok(())
    }

    /// Returns `true` if `pixel` is within tolerance of `tone`.
    #[must_use]
    pub fn matches(&self, tone: Hsv, pixel: Hsv) -> bool {
        hue_distance(pixel.h, tone.h) < self.hue_tolerance
            && (pixel.s - tone.s).abs() < self.saturation_tolerance
            && (pixel.v - tone.v).abs() < self.value_tolerance
    }
}

impl Default for SkinSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            box_left: Self::DEFAULT_BOX_LEFT,
            box_right: Self::DEFAULT_BOX_RIGHT,
            box_top: Self::DEFAULT_BOX_TOP,
            box_bottom: Self::DEFAULT_BOX_BOTTOM,
            min_samples: Self::DEFAULT_MIN_SAMPLES,
            hue_tolerance: Self::DEFAULT_HUE_TOLERANCE,
            saturation_tolerance: Self::DEFAULT_SATURATION_TOLERANCE,
            value_tolerance: Self::DEFAULT_VALUE_TOLERANCE,
        }
    }
}

/// Mean HSV of the foreground pixels inside `sample_box`.
///
/// Hue is averaged on the circle so reddish tones straddling 0° do not
/// average to cyan. Returns `None` unless strictly more than
/// `min_samples` pixels have alpha above `alpha_threshold`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sample_skin_tone(
    rgba: &RgbaImage,
    sample_box: Rect,
    alpha_threshold: u8,
    min_samples: usize,
) -> Option<Hsv> {
    let (mut sin_sum, mut cos_sum, mut s_sum, mut v_sum) = (0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64);
    let mut n = 0_usize;

    let right = sample_box.right().min(rgba.width());
    let bottom = sample_box.bottom().min(rgba.height());
    for y in sample_box.y..bottom {
        for x in sample_box.x..right {
            let [r, g, b, a] = rgba.get_pixel(x, y).0;
            if a <= alpha_threshold {
                continue;
            }
            let hsv = Hsv::from_rgb(r, g, b);
            let rad = hsv.h.to_radians();
            sin_sum += rad.sin();
            cos_sum += rad.cos();
            s_sum += hsv.s;
            v_sum += hsv.v;
            n += 1;
        }
    }

    if n <= min_samples {
        log::debug!("skin sample box has {n} foreground pixels, skipping suppression");
        return None;
    }

    let count = n as f64;
    let h = sin_sum.atan2(cos_sum).to_degrees().rem_euclid(360.0);
    Some(Hsv {
        h,
        s: s_sum / count,
        v: v_sum / count,
    })
}

/// Exclude ROI pixels within tolerance of `tone` from `mask`.
///
/// `roi_rgba` must be aligned index-for-index with `mask`. Only pixels
/// currently covered are examined. Returns the number of pixels removed.
pub fn suppress_skin(
    mask: &mut Mask,
    roi_rgba: &RgbaImage,
    tone: Hsv,
    settings: &SkinSettings,
) -> usize {
    debug_assert_eq!(mask.dimensions(), roi_rgba.dimensions());

    let mut removed = 0;
    for (i, pixel) in roi_rgba.pixels().enumerate() {
        if !mask.is_covered(i) {
            continue;
        }
        let [r, g, b, _] = pixel.0;
        if settings.matches(tone, Hsv::from_rgb(r, g, b)) {
            mask.exclude(i);
            removed += 1;
        }
    }
    removed
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SKIN: [u8; 3] = [224, 172, 140];

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn primaries_have_expected_hues() {
        assert!(approx(Hsv::from_rgb(255, 0, 0).h, 0.0, 1e-9));
        assert!(approx(Hsv::from_rgb(0, 255, 0).h, 120.0, 1e-9));
        assert!(approx(Hsv::from_rgb(0, 0, 255).h, 240.0, 1e-9));
        assert!(approx(Hsv::from_rgb(255, 0, 255).h, 300.0, 1e-9));
    }

    #[test]
    fn gray_has_zero_hue_and_saturation() {
        let hsv = Hsv::from_rgb(128, 128, 128);
        assert!(hsv.h.abs() < f64::EPSILON);
        assert!(hsv.s.abs() < f64::EPSILON);
        assert!(approx(hsv.v, 128.0 / 255.0, 1e-9));
    }

    #[test]
    fn black_has_zero_saturation() {
        let hsv = Hsv::from_rgb(0, 0, 0);
        assert!(hsv.s.abs() < f64::EPSILON);
        assert!(hsv.v.abs() < f64::EPSILON);
    }

    #[test]
    fn hue_distance_takes_shorter_arc() {
        assert!(approx(hue_distance(350.0, 10.0), 20.0, 1e-9));
        assert!(approx(hue_distance(10.0, 350.0), 20.0, 1e-9));
        assert!(approx(hue_distance(0.0, 180.0), 180.0, 1e-9));
        assert!(approx(hue_distance(90.0, 90.0), 0.0, 1e-9));
    }

    #[test]
    fn sample_requires_more_than_min_samples() {
        // 10x5 box = 50 pixels, which is not strictly more than 50.
        let img = RgbaImage::from_pixel(10, 5, image::Rgba([SKIN[0], SKIN[1], SKIN[2], 255]));
        assert!(sample_skin_tone(&img, Rect::new(0, 0, 10, 5), 10, 50).is_none());
        assert!(sample_skin_tone(&img, Rect::new(0, 0, 10, 5), 10, 49).is_some());
    }

    #[test]
    fn transparent_pixels_are_not_sampled() {
        let img = RgbaImage::from_pixel(20, 20, image::Rgba([SKIN[0], SKIN[1], SKIN[2], 5]));
        assert!(sample_skin_tone(&img, Rect::new(0, 0, 20, 20), 10, 1).is_none());
    }

    #[test]
    fn circular_mean_handles_red_wraparound() {
        // Alternate hues just below 360 and just above 0.
        let img = RgbaImage::from_fn(20, 20, |x, _| {
            if x % 2 == 0 {
                image::Rgba([255, 0, 20, 255])
            } else {
                image::Rgba([255, 20, 0, 255])
            }
        });
        let tone = sample_skin_tone(&img, Rect::new(0, 0, 20, 20), 10, 50).unwrap();
        assert!(
            hue_distance(tone.h, 0.0) < 1.0,
            "expected mean hue near 0, got {}",
            tone.h
        );
    }

    #[test]
    fn sample_box_is_clipped_to_image() {
        let img = RgbaImage::from_pixel(10, 10, image::Rgba([SKIN[0], SKIN[1], SKIN[2], 255]));
        let tone = sample_skin_tone(&img, Rect::new(5, 5, 100, 100), 10, 10).unwrap();
        assert!(tone.s > 0.0);
    }

    #[test]
    fn suppress_removes_only_matching_pixels() {
        let roi = RgbaImage::from_fn(4, 1, |x, _| {
            if x < 2 {
                image::Rgba([SKIN[0], SKIN[1], SKIN[2], 255])
            } else {
                image::Rgba([20, 30, 120, 255])
            }
        });
        let mut mask = Mask::filled(4, 1, 255);
        let tone = Hsv::from_rgb(SKIN[0], SKIN[1], SKIN[2]);
        let removed = suppress_skin(&mut mask, &roi, tone, &SkinSettings::default());
        assert_eq!(removed, 2);
        assert!(!mask.is_covered(0));
        assert!(!mask.is_covered(1));
        assert!(mask.is_covered(2));
        assert!(mask.is_covered(3));
    }

    #[test]
    fn suppress_skips_already_excluded_pixels() {
        let roi = RgbaImage::from_pixel(3, 1, image::Rgba([SKIN[0], SKIN[1], SKIN[2], 255]));
        let mut mask = Mask::filled(3, 1, 0);
        let tone = Hsv::from_rgb(SKIN[0], SKIN[1], SKIN[2]);
        assert_eq!(
            suppress_skin(&mut mask, &roi, tone, &SkinSettings::default()),
            0
        );
    }

    #[test]
    fn default_settings_are_valid() {
        assert!(SkinSettings::default().validate().is_ok());
    }
}
