//! Shared types for the drape garment color pipeline.

use serde::{Deserialize, Serialize};

use crate::classify::ClassifierThresholds;
use crate::downsample::DownsampleFilter;
use crate::illumination::IlluminationSettings;
use crate::mask::MaskMeta;
use crate::roi::{Rect, TorsoBand};
use crate::skin::SkinSettings;

/// Re-export `RgbaImage` so downstream crates can hold pixel buffers
/// without depending on `image` directly.
pub use image::RgbaImage;

/// Re-export `DynamicImage` for callers that decode images themselves.
pub use image::DynamicImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an RGBA buffer.
    #[must_use]
    pub fn of(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// The dominant garment color reported by the classifier.
///
/// `base` and `label` always carry the same palette key. Both are kept
/// because existing API consumers read one or the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedColor {
    /// Palette key of the chosen color (e.g. `"navy"`).
    pub base: String,
    /// Display color as `#RRGGBB`.
    pub hex: String,
    /// Same value as `base`.
    pub label: String,
    /// Classification confidence in `[0, 1]`.
    pub confidence: f64,
}

impl ExtractedColor {
    /// Label reported when no pixel survived masking.
    pub const UNKNOWN: &'static str = "unknown";

    /// Result for an empty sample set: `"unknown"` with zero confidence.
    #[must_use]
    pub fn unknown() -> Self {
        Self::new(Self::UNKNOWN, "#000000", 0.0)
    }

    /// Build a result where `base` and `label` share the same key.
    #[must_use]
    pub fn new(label: &str, hex: &str, confidence: f64) -> Self {
        Self {
            base: label.to_owned(),
            hex: hex.to_owned(),
            label: label.to_owned(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Returns `true` when the classifier had no samples to work with.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.base == Self::UNKNOWN
    }
}

/// Configuration for the garment color pipeline.
///
/// Every tunable threshold lives here (or in one of the nested settings
/// structs) with a `DEFAULT_*` constant, so the CLI and library defaults
/// cannot drift apart. Missing fields deserialize to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Images wider than this are downscaled before segmentation.
    pub max_width: u32,

    /// Resampling filter used for the downscale.
    pub downsample_filter: DownsampleFilter,

    /// Alpha values strictly above this count as foreground.
    pub alpha_threshold: u8,

    /// Vertical band of the image analyzed as the torso.
    pub torso_band: TorsoBand,

    /// Skin-tone suppression settings.
    pub skin: SkinSettings,

    /// Gray-world brightness correction settings.
    pub illumination: IlluminationSettings,

    /// Achromatic/chromatic decision thresholds.
    pub classifier: ClassifierThresholds,
}

impl PipelineConfig {
    /// Default working width in pixels.
    pub const DEFAULT_MAX_WIDTH: u32 = 768;

    /// Default downscale filter.
    pub const DEFAULT_DOWNSAMPLE_FILTER: DownsampleFilter = DownsampleFilter::Triangle;

    /// Default alpha noise floor (out of 255).
    pub const DEFAULT_ALPHA_THRESHOLD: u8 = 10;

    /// Check that fractions are within `[0, 1]` and ranges are ordered.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_width == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_width must be at least 1".to_owned(),
            ));
        }
        self.torso_band.validate()?;
        self.skin.validate()?;
        self.illumination.validate()?;
        self.classifier.validate()?;
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_width: Self::DEFAULT_MAX_WIDTH,
            downsample_filter: Self::DEFAULT_DOWNSAMPLE_FILTER,
            alpha_threshold: Self::DEFAULT_ALPHA_THRESHOLD,
            torso_band: TorsoBand::default(),
            skin: SkinSettings::default(),
            illumination: IlluminationSettings::default(),
            classifier: ClassifierThresholds::default(),
        }
    }
}

/// Outcome of one full analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// The classified garment color.
    pub color: ExtractedColor,
    /// Torso ROI within the working (downscaled) image.
    pub roi: Rect,
    /// Dimensions of the working image the ROI refers to.
    pub dimensions: Dimensions,
    /// Mask construction metadata.
    pub meta: MaskMeta,
    /// Brightness factor applied by illumination normalization
    /// (`None` when skipped or when the mask was empty).
    pub brightness_scale: Option<f64>,
}

/// Errors that can occur during pipeline processing.
///
/// Only decoding and configuration can fail; every stage after decode
/// is total over well-formed input.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// Failed to encode a debug image.
    #[error("failed to encode image: {0}")]
    ImageEncode(#[source] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

/// Check that `value` lies in `[0, 1]`, naming `field` in the error.
pub(crate) fn check_fraction(field: &str, value: f64) -> Result<(), PipelineError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PipelineError::InvalidConfig(format!(
            "{field} must be within [0, 1], got {value}"
        )))
    }
}

/// Check that `low <= high`, naming both fields in the error.
pub(crate) fn check_ordered(
    low_field: &str,
    low: f64,
    high_field: &str,
    high: f64,
) -> Result<(), PipelineError> {
    if low <= high {
        Ok(())
    } else {
        Err(PipelineError::InvalidConfig(format!(
            "{low_field} ({low}) must not exceed {high_field} ({high})"
        )))
    }
}
