//! Gray-world brightness normalization.
//!
//! Assumes the masked region should average to a mid-level gray and
//! applies one brightness factor to all three channels. Per-channel
//! scaling would also remove color casts, but on a single garment the
//! "cast" is usually the garment's own color, so only overall brightness
//! is corrected. The factor is clamped so a dim photo of a dark garment
//! is not washed out.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::mask::Mask;
use crate::types::PipelineError;

/// Settings for illumination normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IlluminationSettings {
    /// Whether to normalize at all.
    pub enabled: bool,
    /// Channel mean the masked region is scaled towards.
    pub target: f64,
    /// Lower bound on the brightness factor.
    pub min_scale: f64,
    /// Upper bound on the brightness factor.
    pub max_scale: f64,
}

impl IlluminationSettings {
    /// Default target level (mid-gray).
    pub const DEFAULT_TARGET: f64 = 128.0;
    /// Default minimum factor.
    pub const DEFAULT_MIN_SCALE: f64 = 0.8;
    /// Default maximum factor.
    pub const DEFAULT_MAX_SCALE: f64 = 1.35;

    pub(crate) fn validate(&self) -> Result<(), PipelineError> {
        if !(self.target > 0.0 && self.target <= 255.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "illumination.target must be within (0, 255], got {}",
                self.target
            )));
        }
        if !(self.min_scale > 0.0 && self.min_scale <= self.max_scale) {
            return Err(PipelineError::InvalidConfig(format!(
                "illumination scale range [{}, {}] is invalid",
                self.min_scale, self.max_scale
            )));
        }
        Ok(())
    }
}

impl Default for IlluminationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            target: Self::DEFAULT_TARGET,
            min_scale: Self::DEFAULT_MIN_SCALE,
            max_scale: Self::DEFAULT_MAX_SCALE,
        }
    }
}

/// Brightness factor for the covered pixels of `rgba`.
///
/// Returns `None` when no pixel is covered. A region whose mean is
/// exactly zero gets a factor of 1.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn brightness_scale(
    rgba: &RgbaImage,
    mask: &Mask,
    settings: &IlluminationSettings,
) -> Option<f64> {
    let (mut r, mut g, mut b) = (0.0_f64, 0.0_f64, 0.0_f64);
    let mut n = 0_usize;
    for (i, pixel) in rgba.pixels().enumerate() {
        if !mask.is_covered(i) {
            continue;
        }
        let [pr, pg, pb, _] = pixel.0;
        r += f64::from(pr);
        g += f64::from(pg);
        b += f64::from(pb);
        n += 1;
    }
    if n == 0 {
        return None;
    }

    let count = n as f64;
    let mean = (r / count + g / count + b / count) / 3.0;
    if mean <= 0.0 {
        return Some(1.0);
    }
    Some(
        (settings.target / mean)
            .max(settings.min_scale)
            .min(settings.max_scale),
    )
}

/// Rescale a single channel value, rounding and saturating to `u8`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn rescale(value: u8, scale: f64) -> u8 {
    (f64::from(value) * scale).round().clamp(0.0, 255.0) as u8
}

/// Return a copy of `rgba` with covered color channels multiplied by
/// `scale`.
///
/// Uncovered pixels and every alpha value are copied through untouched.
#[must_use]
pub fn apply_brightness(rgba: &RgbaImage, mask: &Mask, scale: f64) -> RgbaImage {
    let mut out = rgba.clone();
    for (i, pixel) in out.pixels_mut().enumerate() {
        if !mask.is_covered(i) {
            continue;
        }
        for c in &mut pixel.0[..3] {
            *c = rescale(*c, scale);
        }
    }
    out
}

/// Normalize the covered pixels of `rgba` in one pass over the mask.
///
/// Returns the normalized copy together with the factor that was
/// applied, as computed by [`brightness_scale`]. With an empty mask the
/// copy equals the input and the factor is `None`.
#[must_use]
pub fn normalize_illumination(
    rgba: &RgbaImage,
    mask: &Mask,
    settings: &IlluminationSettings,
) -> (RgbaImage, Option<f64>) {
    let Some(scale) = brightness_scale(rgba, mask, settings) else {
        return (rgba.clone(), None);
    };
    log::debug!("illumination scale {scale:.3}");
    (apply_brightness(rgba, mask, scale), Some(scale))
}
