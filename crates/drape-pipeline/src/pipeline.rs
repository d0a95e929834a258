//! The analysis as a sequence of typed stages.
//!
//! Each stage value owns what the previous step produced and has one
//! method that performs the next step, so the order is fixed by the
//! types. [`crate::analyze`] runs the sequence straight through and
//! [`crate::diagnostics::analyze_with_diagnostics`] advances it one
//! [`Stage`] at a time, timing each transition. Both therefore execute
//! exactly the same work.

use std::borrow::Cow;

use image::{DynamicImage, RgbaImage};

use crate::classify::extract_color_from_mask;
use crate::diagnostics::{StageMetrics, count_foreground};
use crate::illumination::normalize_illumination;
use crate::mask::{GarmentMask, mask_from_separation};
use crate::segment::{Segmenter, Separation, separate};
use crate::types::{Analysis, PipelineConfig, PipelineError};

/// Encoded input that has not been decoded yet.
pub struct Pending<'a> {
    bytes: &'a [u8],
    segmenter: &'a dyn Segmenter,
}

impl<'a> Pending<'a> {
    pub fn new(bytes: &'a [u8], segmenter: &'a dyn Segmenter) -> Self {
        Self { bytes, segmenter }
    }

    /// Decode the bytes and apply EXIF orientation.
    pub fn decode(self) -> Result<Decoded<'a>, PipelineError> {
        let image = crate::decode::decode(self.bytes)?;
        Ok(Decoded {
            image: Cow::Owned(image),
            input_bytes: self.bytes.len(),
            segmenter: self.segmenter,
        })
    }
}

/// Upright photo at its original resolution.
pub struct Decoded<'a> {
    image: Cow<'a, DynamicImage>,
    input_bytes: usize,
    segmenter: &'a dyn Segmenter,
}

impl<'a> Decoded<'a> {
    /// Start from a photo the caller already decoded.
    pub const fn borrowed(image: &'a DynamicImage, segmenter: &'a dyn Segmenter) -> Self {
        Self {
            image: Cow::Borrowed(image),
            input_bytes: 0,
            segmenter,
        }
    }

    pub fn downsample(self, config: &PipelineConfig) -> Downsampled<'a> {
        let (working, applied) =
            crate::downsample::downsample(&self.image, config.max_width, config.downsample_filter);
        Downsampled {
            rgba: crate::decode::to_rgba(&working),
            original: (self.image.width(), self.image.height()),
            applied,
            segmenter: self.segmenter,
        }
    }

    fn metrics(&self) -> StageMetrics {
        let (width, height) = (self.image.width(), self.image.height());
        StageMetrics::Decode {
            input_bytes: self.input_bytes,
            width,
            height,
            pixel_count: u64::from(width) * u64::from(height),
        }
    }
}

/// Working-resolution RGBA.
pub struct Downsampled<'a> {
    rgba: RgbaImage,
    original: (u32, u32),
    applied: bool,
    segmenter: &'a dyn Segmenter,
}

impl<'a> Downsampled<'a> {
    pub fn segment(self) -> Segmented<'a> {
        Segmented {
            separation: separate(&self.rgba, self.segmenter),
            backend: self.segmenter.name(),
        }
    }

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Downsample {
            original_width: self.original.0,
            original_height: self.original.1,
            width: self.rgba.width(),
            height: self.rgba.height(),
            applied: self.applied,
        }
    }
}

/// Foreground matte, or the whole-frame fallback.
pub struct Segmented<'a> {
    separation: Separation,
    backend: &'a str,
}

impl<'a> Segmented<'a> {
    pub fn mask(self, config: &PipelineConfig) -> Masked<'a> {
        let Separation { image, outcome } = self.separation;
        Masked {
            garment: Cow::Owned(mask_from_separation(&image, outcome, config)),
        }
    }

    fn metrics(&self, config: &PipelineConfig) -> StageMetrics {
        StageMetrics::Segment {
            backend: self.backend.to_owned(),
            fallback: self.separation.outcome.is_fallback(),
            foreground_pixels: count_foreground(&self.separation.image, config.alpha_threshold),
        }
    }
}

/// Torso ROI with skin removed.
pub struct Masked<'a> {
    garment: Cow<'a, GarmentMask>,
}

impl<'a> Masked<'a> {
    /// Start from a mask the caller kept.
    pub const fn borrowed(garment: &'a GarmentMask) -> Self {
        Self {
            garment: Cow::Borrowed(garment),
        }
    }

    pub fn into_garment(self) -> GarmentMask {
        self.garment.into_owned()
    }

    pub fn normalize(self, config: &PipelineConfig) -> Normalized<'a> {
        let (pixels, scale) =
            normalize_illumination(&self.garment.roi_rgba, &self.garment.mask, &config.illumination);
        Normalized {
            garment: self.garment,
            pixels,
            scale,
        }
    }

    pub fn classify(self, config: &PipelineConfig) -> Analysis {
        classify(&self.garment, &self.garment.roi_rgba, None, config)
    }

    fn metrics(&self) -> StageMetrics {
        let garment = &self.garment;
        StageMetrics::Mask {
            roi_width: garment.width(),
            roi_height: garment.height(),
            skin_pixels_removed: garment.meta.skin_pixels_removed,
            covered_pixels: garment.mask.covered_count(),
            masked_area_percent: garment.meta.masked_area_percent,
        }
    }
}

/// ROI pixels after brightness correction.
pub struct Normalized<'a> {
    garment: Cow<'a, GarmentMask>,
    pixels: RgbaImage,
    scale: Option<f64>,
}

impl Normalized<'_> {
    pub fn classify(self, config: &PipelineConfig) -> Analysis {
        classify(&self.garment, &self.pixels, self.scale, config)
    }

    const fn metrics(&self) -> StageMetrics {
        StageMetrics::Illumination { scale: self.scale }
    }
}

fn classify(
    garment: &GarmentMask,
    pixels: &RgbaImage,
    brightness_scale: Option<f64>,
    config: &PipelineConfig,
) -> Analysis {
    let color = extract_color_from_mask(pixels, &garment.mask, &config.classifier);
    log::debug!(
        "analysis: {} ({:.2}) via {}",
        color.label,
        color.confidence,
        garment.meta.method()
    );
    Analysis {
        color,
        roi: garment.roi,
        dimensions: garment.dimensions,
        meta: garment.meta.clone(),
        brightness_scale,
    }
}

/// A decoded run at any point before classification.
pub enum Stage<'a> {
    Decoded(Decoded<'a>),
    Downsampled(Downsampled<'a>),
    Segmented(Segmented<'a>),
    Masked(Masked<'a>),
    Normalized(Normalized<'a>),
}

/// Result of [`Stage::advance`].
pub enum Step<'a> {
    Next(Stage<'a>),
    Done(Analysis),
}

impl<'a> Stage<'a> {
    /// Perform the next step. Illumination is skipped when disabled.
    pub fn advance(self, config: &PipelineConfig) -> Step<'a> {
        match self {
            Self::Decoded(s) => Step::Next(Self::Downsampled(s.downsample(config))),
            Self::Downsampled(s) => Step::Next(Self::Segmented(s.segment())),
            Self::Segmented(s) => Step::Next(Self::Masked(s.mask(config))),
            Self::Masked(s) if config.illumination.enabled => {
                Step::Next(Self::Normalized(s.normalize(config)))
            }
            Self::Masked(s) => Step::Done(s.classify(config)),
            Self::Normalized(s) => Step::Done(s.classify(config)),
        }
    }

    /// Run every remaining step.
    pub fn run(self, config: &PipelineConfig) -> Analysis {
        let mut stage = self;
        loop {
            match stage.advance(config) {
                Step::Next(next) => stage = next,
                Step::Done(analysis) => return analysis,
            }
        }
    }

    /// What the step that produced this stage did.
    pub fn metrics(&self, config: &PipelineConfig) -> StageMetrics {
        match self {
            Self::Decoded(s) => s.metrics(),
            Self::Downsampled(s) => s.metrics(),
            Self::Segmented(s) => s.metrics(config),
            Self::Masked(s) => s.metrics(),
            Self::Normalized(s) => s.metrics(),
        }
    }
}

impl Step<'_> {
    /// What the step just performed did.
    pub fn metrics(&self, config: &PipelineConfig) -> StageMetrics {
        match self {
            Self::Next(stage) => stage.metrics(config),
            Self::Done(analysis) => StageMetrics::Classify {
                label: analysis.color.label.clone(),
                confidence: analysis.color.confidence,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::diagnostics::StageKind;
    use crate::segment::Passthrough;

    fn person(rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(40, 60, |_, y| {
            if y < 18 {
                image::Rgba([224, 172, 140, 255])
            } else {
                image::Rgba([rgb[0], rgb[1], rgb[2], 255])
            }
        }))
    }

    fn walk(image: &DynamicImage, config: &PipelineConfig) -> (Vec<StageKind>, Analysis) {
        let mut kinds = vec![StageKind::Decode];
        let mut stage = Stage::Decoded(Decoded::borrowed(image, &Passthrough));
        loop {
            let step = stage.advance(config);
            kinds.push(step.metrics(config).kind());
            match step {
                Step::Next(next) => stage = next,
                Step::Done(analysis) => return (kinds, analysis),
            }
        }
    }

    #[test]
    fn stages_run_in_pipeline_order() {
        let (kinds, _) = walk(&person([200, 30, 30]), &PipelineConfig::default());
        assert_eq!(kinds, StageKind::ALL);
    }

    #[test]
    fn disabled_illumination_goes_straight_to_classify() {
        let mut config = PipelineConfig::default();
        config.illumination.enabled = false;
        let (kinds, analysis) = walk(&person([200, 30, 30]), &config);
        assert!(!kinds.contains(&StageKind::Illumination));
        assert_eq!(kinds.last(), Some(&StageKind::Classify));
        assert!(analysis.brightness_scale.is_none());
    }

    #[test]
    fn stepping_and_running_agree() {
        let image = person([5, 10, 40]);
        let config = PipelineConfig::default();
        let (_, stepped) = walk(&image, &config);
        let ran = Stage::Decoded(Decoded::borrowed(&image, &Passthrough)).run(&config);
        assert_eq!(stepped, ran);
    }

    #[test]
    fn decode_reports_encoded_size() {
        let bytes = crate::debug::encode_png(&person([1, 2, 3]).to_rgba8()).unwrap();
        let decoded = Pending::new(&bytes, &Passthrough).decode().unwrap();
        assert!(matches!(
            decoded.metrics(),
            StageMetrics::Decode { input_bytes, width: 40, height: 60, .. } if input_bytes == bytes.len()
        ));
    }
}
