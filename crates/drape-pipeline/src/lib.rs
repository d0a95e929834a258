//! drape-pipeline: dominant garment color extraction (sans-IO).
//!
//! Finds the dominant color of a garment in a photo through:
//! decode -> downsample -> foreground separation -> torso ROI ->
//! skin suppression -> illumination normalization -> Lab sampling ->
//! neutral/chromatic split -> CIEDE2000 palette match.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory
//! byte slices and image buffers and returns structured data. The
//! segmentation model is supplied by the caller through the
//! [`Segmenter`] trait; persisting debug masks is the caller's job
//! (see [`debug::MaskStore`]).

pub mod ciede2000;
pub mod classify;
pub mod cluster;
pub mod debug;
pub mod decode;
pub mod diagnostics;
pub mod downsample;
pub mod illumination;
pub mod lab;
pub mod mask;
pub mod palette;
mod pipeline;
pub mod roi;
pub mod segment;
pub mod skin;
pub mod stats;
pub mod types;

pub use classify::{ClassifierThresholds, extract_color_from_mask};
pub use illumination::{IlluminationSettings, normalize_illumination};
pub use mask::{GarmentMask, Mask, MaskMeta, build_garment_mask};
pub use segment::{Segmenter, SeparationOutcome};
pub use types::{Analysis, Dimensions, ExtractedColor, PipelineConfig, PipelineError};

use image::DynamicImage;

use crate::pipeline::{Decoded, Masked, Pending, Stage};

/// Classify an already-built garment mask.
///
/// Normalizes illumination over the covered ROI pixels (unless
/// disabled) and classifies the result. Useful when the caller wants to
/// keep the mask, e.g. in a [`debug::MaskStore`].
#[must_use]
pub fn analyze_garment(garment: &GarmentMask, config: &PipelineConfig) -> Analysis {
    Stage::Masked(Masked::borrowed(garment)).run(config)
}

/// Run the pipeline on a decoded image.
///
/// Never fails. Segmentation errors degrade to whole-frame foreground
/// (visible in [`Analysis::meta`]) and an empty mask yields
/// [`ExtractedColor::unknown`]. `config` is assumed valid; see
/// [`PipelineConfig::validate`].
#[must_use]
pub fn analyze_image(
    image: &DynamicImage,
    segmenter: &dyn Segmenter,
    config: &PipelineConfig,
) -> Analysis {
    Stage::Decoded(Decoded::borrowed(image, segmenter)).run(config)
}

/// Decode `image_bytes` and run the full pipeline.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// validation.
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
pub fn analyze(
    image_bytes: &[u8],
    segmenter: &dyn Segmenter,
    config: &PipelineConfig,
) -> Result<Analysis, PipelineError> {
    config.validate()?;
    let decoded = Pending::new(image_bytes, segmenter).decode()?;
    Ok(Stage::Decoded(decoded).run(config))
}
