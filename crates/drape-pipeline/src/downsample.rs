//! Working-resolution resize.
//!
//! Phone photos arrive at 12+ megapixels while the color decision only
//! needs a few thousand torso samples. Segmentation and every per-pixel
//! stage are linear in pixel count, so photos wider than
//! [`PipelineConfig::max_width`](crate::PipelineConfig::max_width) are
//! shrunk to that width first. Only the width is bounded: tall portrait
//! shots keep their full torso height relative to width.

use std::fmt;
use std::str::FromStr;

use image::DynamicImage;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

/// Resampling kernel for the working-resolution resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DownsampleFilter {
    /// Keep the decoded resolution.
    Disabled,
    /// Nearest-neighbor.
    Nearest,
    /// Bilinear.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom).
    CatmullRom,
    /// Gaussian.
    Gaussian,
    /// Lanczos, 3 lobes.
    Lanczos3,
}

impl DownsampleFilter {
    /// Every variant, in order of increasing cost.
    pub const ALL: [Self; 6] = [
        Self::Disabled,
        Self::Nearest,
        Self::Triangle,
        Self::CatmullRom,
        Self::Gaussian,
        Self::Lanczos3,
    ];

    /// Kebab-case name, matching the serialized form.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Nearest => "nearest",
            Self::Triangle => "triangle",
            Self::CatmullRom => "catmull-rom",
            Self::Gaussian => "gaussian",
            Self::Lanczos3 => "lanczos3",
        }
    }

    const fn kernel(self) -> Option<FilterType> {
        match self {
            Self::Disabled => None,
            Self::Nearest => Some(FilterType::Nearest),
            Self::Triangle => Some(FilterType::Triangle),
            Self::CatmullRom => Some(FilterType::CatmullRom),
            Self::Gaussian => Some(FilterType::Gaussian),
            Self::Lanczos3 => Some(FilterType::Lanczos3),
        }
    }
}

impl fmt::Display for DownsampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DownsampleFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|filter| filter.name() == s)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|f| f.name()).collect();
                format!("unknown filter {s:?}, expected one of: {}", names.join(", "))
            })
    }
}

/// Height that keeps the aspect ratio at `target_width`, at least 1.
fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    let scaled = u64::from(height) * u64::from(target_width) / u64::from(width.max(1));
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}

/// Shrink `image` to at most `max_width` pixels wide.
///
/// Returns the working image and `true` when a resize happened. Images
/// that already fit, a zero `max_width`, and
/// [`DownsampleFilter::Disabled`] all return a copy of the input.
#[must_use]
pub fn downsample(
    image: &DynamicImage,
    max_width: u32,
    filter: DownsampleFilter,
) -> (DynamicImage, bool) {
    let width = image.width();
    match filter.kernel() {
        Some(kernel) if max_width > 0 && width > max_width => {
            let height = scaled_height(width, image.height(), max_width);
            log::debug!(
                "downsample {width}x{} -> {max_width}x{height} ({filter})",
                image.height()
            );
            (image.resize_exact(max_width, height, kernel), true)
        }
        _ => (image.clone(), false),
    }
}
