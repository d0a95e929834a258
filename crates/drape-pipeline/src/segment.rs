//! Foreground/background separation.
//!
//! This module defines the [`Segmenter`] trait for pluggable
//! background-removal backends. A backend takes an RGBA image and
//! returns the same image with a foreground alpha channel; everything
//! downstream reads only that alpha.
//!
//! # Fallback policy
//!
//! Segmentation is never allowed to fail a request. [`separate`]
//! catches any backend error (or a result of the wrong size) and reuses
//! the input pixels as-is, which for an opaque photo means "the whole
//! frame is foreground". The degradation is recorded in
//! [`SeparationOutcome`] so callers can see it in the mask metadata.

use image::{GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::types::Dimensions;

/// Errors a segmentation backend can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SegmentError {
    /// No backend is configured or it could not be loaded.
    #[error("segmentation backend unavailable: {0}")]
    Unavailable(String),

    /// The backend ran but failed.
    #[error("segmentation backend failed: {0}")]
    Backend(String),

    /// The backend returned an image of a different size.
    #[error("segmentation output is {actual:?}, expected {expected:?}")]
    DimensionMismatch {
        /// Size of the image handed to the backend.
        expected: Dimensions,
        /// Size of the image the backend returned.
        actual: Dimensions,
    },
}

/// A foreground segmentation capability.
///
/// Implementations must be usable from several requests at once; the
/// pipeline only ever borrows them immutably.
pub trait Segmenter: Send + Sync {
    /// Short backend name recorded in mask metadata.
    fn name(&self) -> &str;

    /// Return `image` with its alpha channel replaced by a foreground
    /// matte (0 = background, 255 = foreground).
    ///
    /// # Errors
    ///
    /// Any [`SegmentError`]; the pipeline falls back to whole-frame
    /// foreground.
    fn segment(&self, image: &RgbaImage) -> Result<RgbaImage, SegmentError>;
}

/// Uses the image's own alpha channel as the matte.
///
/// Suitable for inputs that were already cut out upstream. Opaque
/// photos pass through as whole-frame foreground.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Segmenter for Passthrough {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn segment(&self, image: &RgbaImage) -> Result<RgbaImage, SegmentError> {
        Ok(image.clone())
    }
}

/// Applies a grayscale matte produced out-of-process.
///
/// The matte is resized to the working image when sizes differ, so a
/// matte computed on the full-resolution photo can be reused after
/// downsampling. The resulting alpha is the minimum of the image's own
/// alpha and the matte.
#[derive(Debug, Clone)]
pub struct PrecomputedMatte {
    matte: GrayImage,
}

impl PrecomputedMatte {
    /// Wrap a matte (white = foreground).
    #[must_use]
    pub const fn new(matte: GrayImage) -> Self {
        Self { matte }
    }
}

impl Segmenter for PrecomputedMatte {
    fn name(&self) -> &'static str {
        "precomputed-matte"
    }

    fn segment(&self, image: &RgbaImage) -> Result<RgbaImage, SegmentError> {
        if self.matte.width() == 0 || self.matte.height() == 0 {
            return Err(SegmentError::Backend("matte is empty".to_owned()));
        }
        let (w, h) = image.dimensions();
        let resized;
        let matte = if self.matte.dimensions() == (w, h) {
            &self.matte
        } else {
            resized =
                image::imageops::resize(&self.matte, w, h, image::imageops::FilterType::Triangle);
            &resized
        };

        let mut out = image.clone();
        for (pixel, m) in out.pixels_mut().zip(matte.pixels()) {
            pixel.0[3] = pixel.0[3].min(m.0[0]);
        }
        Ok(out)
    }
}

/// A backend that always fails, standing in for a missing model.
#[derive(Debug, Clone)]
pub struct Unavailable {
    reason: String,
}

impl Unavailable {
    /// Create a backend that fails with `reason`.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Segmenter for Unavailable {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn segment(&self, _image: &RgbaImage) -> Result<RgbaImage, SegmentError> {
        Err(SegmentError::Unavailable(self.reason.clone()))
    }
}

/// How the foreground alpha was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeparationOutcome {
    /// The backend produced the matte.
    Segmented {
        /// Backend name.
        backend: String,
    },
    /// The backend failed; the input pixels were reused unchanged.
    WholeFrame {
        /// Backend name.
        backend: String,
        /// Why the backend result was discarded.
        reason: String,
    },
}

impl SeparationOutcome {
    /// Returns `true` when the fallback path was taken.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::WholeFrame { .. })
    }
}

/// Result of [`separate`]: the image carrying the foreground alpha,
/// plus how it was obtained.
#[derive(Debug, Clone)]
pub struct Separation {
    /// RGBA image whose alpha channel is the foreground matte.
    pub image: RgbaImage,
    /// Whether the backend succeeded.
    pub outcome: SeparationOutcome,
}

/// Run `segmenter` on `image`, falling back to the input on failure.
///
/// Never fails. A backend error, or an output whose dimensions differ
/// from the input, is logged and turned into
/// [`SeparationOutcome::WholeFrame`].
#[must_use]
pub fn separate(image: &RgbaImage, segmenter: &dyn Segmenter) -> Separation {
    let backend = segmenter.name().to_owned();
    let expected = Dimensions::of(image);

    let result = segmenter.segment(image).and_then(|cut| {
        let actual = Dimensions::of(&cut);
        if actual == expected {
            Ok(cut)
        } else {
            Err(SegmentError::DimensionMismatch { expected, actual })
        }
    });

    match result {
        Ok(cut) => {
            log::debug!("segmentation by {backend} succeeded");
            Separation {
                image: cut,
                outcome: SeparationOutcome::Segmented { backend },
            }
        }
        Err(e) => {
            log::warn!("segmentation by {backend} failed, using whole frame: {e}");
            Separation {
                image: image.clone(),
                outcome: SeparationOutcome::WholeFrame {
                    backend,
                    reason: e.to_string(),
                },
            }
        }
    }
}
