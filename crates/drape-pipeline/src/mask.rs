//! Garment mask construction.
//!
//! Turns a decoded photo into a coverage mask over the torso band:
//!
//! 1. Downsample to the working width.
//! 2. Separate foreground from background (pluggable backend with a
//!    whole-frame fallback).
//! 3. Crop the torso band and mark pixels with alpha above the noise
//!    floor as covered.
//! 4. Remove pixels that resemble the skin tone sampled near the face.
//!
//! The mask stores a coverage byte per ROI pixel rather than a boolean.
//! Soft alpha edges from a segmentation model survive as intermediate
//! values, and [`COVERAGE_THRESHOLD`] is the single place where
//! "included" is decided.

use image::{DynamicImage, GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::pipeline::Decoded;
use crate::roi::{self, Rect};
use crate::segment::{Segmenter, SeparationOutcome};
use crate::skin::{self, Hsv};
use crate::types::{Dimensions, PipelineConfig};

/// Coverage at or above this value counts as "included".
pub const COVERAGE_THRESHOLD: u8 = 128;

/// Coverage value written for fully included pixels.
pub const COVERED: u8 = 255;

/// Coverage value written for excluded pixels.
pub const EXCLUDED: u8 = 0;

/// Per-pixel coverage over a region of interest.
///
/// Row-major, one byte per pixel, aligned with the ROI pixel buffer it
/// was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask(GrayImage);

impl Mask {
    /// Wrap an existing coverage image.
    #[must_use]
    pub const fn new(coverage: GrayImage) -> Self {
        Self(coverage)
    }

    /// A mask where every pixel has the same coverage.
    #[must_use]
    pub fn filled(width: u32, height: u32, coverage: u8) -> Self {
        Self(GrayImage::from_pixel(width, height, image::Luma([coverage])))
    }

    /// Build a mask from raw coverage bytes.
    ///
    /// Returns `None` if `data.len() != width * height`.
    #[must_use]
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        GrayImage::from_raw(width, height, data).map(Self)
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// `(width, height)`.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    /// Number of pixels (covered or not).
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.as_raw().len()
    }

    /// Returns `true` if the mask has no pixels at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.as_raw().is_empty()
    }

    /// Raw coverage bytes, row-major.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        self.0.as_raw()
    }

    /// Borrow the coverage as a grayscale image.
    #[must_use]
    pub const fn as_image(&self) -> &GrayImage {
        &self.0
    }

    /// Coverage byte at linear index `i` (0 when out of range).
    #[must_use]
    pub fn coverage(&self, i: usize) -> u8 {
        self.0.as_raw().get(i).copied().unwrap_or(EXCLUDED)
    }

    /// Returns `true` if pixel `i` is included.
    #[must_use]
    pub fn is_covered(&self, i: usize) -> bool {
        self.coverage(i) >= COVERAGE_THRESHOLD
    }

    /// Mark pixel `i` as excluded. Out-of-range indices are ignored.
    pub fn exclude(&mut self, i: usize) {
        let raw: &mut [u8] = &mut self.0;
        if let Some(c) = raw.get_mut(i) {
            *c = EXCLUDED;
        }
    }

    /// Number of included pixels.
    #[must_use]
    pub fn covered_count(&self) -> usize {
        self.0
            .as_raw()
            .iter()
            .filter(|&&c| c >= COVERAGE_THRESHOLD)
            .count()
    }

    /// Percentage of pixels included, `0.0` for an empty mask.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn coverage_percent(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.covered_count() as f64 / self.len() as f64 * 100.0
    }

    /// Consume the mask and return the coverage image.
    #[must_use]
    pub fn into_image(self) -> GrayImage {
        self.0
    }
}

/// How the mask was built, for diagnosing bad segmentations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskMeta {
    /// Whether the segmentation backend succeeded.
    pub separation: SeparationOutcome,
    /// Mean HSV of the skin sample, when one was taken.
    pub skin_tone: Option<Hsv>,
    /// Pixels removed by skin suppression.
    pub skin_pixels_removed: usize,
    /// Share of ROI pixels still covered, in percent.
    ///
    /// Values near 0 or near 100 usually mean segmentation failed.
    pub masked_area_percent: f64,
}

impl MaskMeta {
    /// Compact description of the steps that shaped the mask, e.g.
    /// `"segmented+roi+skin"` or `"whole-frame+roi"`.
    #[must_use]
    pub fn method(&self) -> String {
        let mut method = String::from(if self.separation.is_fallback() {
            "whole-frame"
        } else {
            "segmented"
        });
        method.push_str("+roi");
        if self.skin_tone.is_some() {
            method.push_str("+skin");
        }
        method
    }
}

/// Everything downstream stages need from mask construction.
#[derive(Debug, Clone)]
pub struct GarmentMask {
    /// Torso ROI within the working image.
    pub roi: Rect,
    /// Working (downscaled) image dimensions.
    pub dimensions: Dimensions,
    /// Coverage per ROI pixel.
    pub mask: Mask,
    /// ROI pixels copied out of the working image, aligned with `mask`.
    pub roi_rgba: RgbaImage,
    /// Diagnostics about how the mask was built.
    pub meta: MaskMeta,
}

impl GarmentMask {
    /// ROI width (also the mask width).
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.roi.width
    }

    /// ROI height (also the mask height).
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.roi.height
    }
}

/// Crop `roi` out of `rgba` and derive a coverage mask from its alpha.
///
/// Pixels with alpha strictly above `alpha_threshold` are covered.
#[must_use]
pub fn alpha_mask(rgba: &RgbaImage, roi: Rect, alpha_threshold: u8) -> (Mask, RgbaImage) {
    let roi_rgba = image::imageops::crop_imm(rgba, roi.x, roi.y, roi.width, roi.height).to_image();
    let coverage = GrayImage::from_fn(roi_rgba.width(), roi_rgba.height(), |x, y| {
        let alpha = roi_rgba.get_pixel(x, y).0[3];
        image::Luma([if alpha > alpha_threshold {
            COVERED
        } else {
            EXCLUDED
        }])
    });
    (Mask::new(coverage), roi_rgba)
}

/// Build the garment mask from an image whose alpha channel already
/// carries the foreground matte.
///
/// This is everything after segmentation: ROI crop, alpha threshold,
/// skin suppression, and metadata.
#[must_use]
pub fn mask_from_separation(
    separated: &RgbaImage,
    separation: SeparationOutcome,
    config: &PipelineConfig,
) -> GarmentMask {
    let dimensions = Dimensions::of(separated);
    let roi = roi::torso_band(dimensions, config.torso_band);
    let (mut mask, roi_rgba) = alpha_mask(separated, roi, config.alpha_threshold);

    let skin_tone = if config.skin.enabled {
        let sample_box = roi::fractional_box(
            dimensions,
            config.skin.box_left,
            config.skin.box_right,
            config.skin.box_top,
            config.skin.box_bottom,
        );
        skin::sample_skin_tone(
            separated,
            sample_box,
            config.alpha_threshold,
            config.skin.min_samples,
        )
    } else {
        None
    };

    let skin_pixels_removed =
        skin_tone.map_or(0, |tone| skin::suppress_skin(&mut mask, &roi_rgba, tone, &config.skin));

    let masked_area_percent = mask.coverage_percent();
    log::debug!(
        "mask roi={roi:?} covered={masked_area_percent:.1}% skin_removed={skin_pixels_removed}"
    );
    if mask.covered_count() == 0 {
        log::warn!("garment mask is empty after ROI and skin suppression");
    }

    GarmentMask {
        roi,
        dimensions,
        mask,
        roi_rgba,
        meta: MaskMeta {
            separation,
            skin_tone,
            skin_pixels_removed,
            masked_area_percent,
        },
    }
}

/// Build the garment mask for a decoded photo.
///
/// Never fails: segmentation errors degrade to whole-frame foreground
/// and are reported in [`MaskMeta::separation`].
#[must_use]
pub fn build_garment_mask(
    image: &DynamicImage,
    segmenter: &dyn Segmenter,
    config: &PipelineConfig,
) -> GarmentMask {
    Decoded::borrowed(image, segmenter)
        .downsample(config)
        .segment()
        .mask(config)
        .into_garment()
}
