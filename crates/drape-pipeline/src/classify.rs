//! Dominant color classification over masked pixels.
//!
//! Decision order:
//!
//! 1. Sample covered pixels (strided so large ROIs stay bounded) and
//!    convert them to Lab.
//! 2. If most samples are near-neutral, decide white/black/gray from
//!    lightness quantiles alone.
//! 3. Otherwise split the a*/b* plane into a chromatic and a neutral
//!    cluster. A strong, sizeable chromatic cluster is matched against
//!    the palette by CIEDE2000; anything weaker falls back to a
//!    lightness-only decision.
//!
//! Ambiguous evidence always resolves toward a neutral label. A false
//! "gray" costs less in search matching than a false "brown".

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::cluster::{self, Split};
use crate::lab::{Lab, srgb_to_lab};
use crate::mask::Mask;
use crate::palette;
use crate::stats;
use crate::types::{ExtractedColor, PipelineError, check_fraction, check_ordered};

/// Confidences reported for each achromatic label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AchromaticConfidence {
    /// Confidence for `"white"`.
    pub white: f64,
    /// Confidence for `"black"`.
    pub black: f64,
    /// Confidence for the gray family.
    pub gray: f64,
}

/// Every threshold the classifier uses.
///
/// Values are empirically tuned; the defaults reproduce the reference
/// behavior and each has a `DEFAULT_*` constant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    /// Approximate cap on the number of sampled pixels.
    pub target_samples: usize,
    /// Chroma below this counts as near-neutral.
    pub low_chroma: f64,
    /// Lightness at or above this counts as "high".
    pub high_lightness: f64,
    /// Lightness at or below this counts as "low".
    pub low_lightness: f64,
    /// Near-neutral share that triggers the achromatic short-circuit.
    pub achromatic_fraction: f64,

    /// Short-circuit white: minimum share of high-lightness samples.
    pub white_high_fraction: f64,
    /// Short-circuit white (alternative): minimum 90th percentile L.
    pub white_p90: f64,
    /// ...together with a median L of at least this...
    pub white_median: f64,
    /// ...or a 70th percentile L of at least this.
    pub white_p70: f64,
    /// Short-circuit black: minimum share of low-lightness samples.
    pub black_low_fraction: f64,
    /// Short-circuit black (alternative): maximum median L.
    pub black_median: f64,

    /// Gray family: median L at or above this is `"lightgray"`.
    pub light_gray_median: f64,
    /// Gray family: median L at or below this is `"darkgray"`.
    pub dark_gray_median: f64,

    /// Minimum mean chroma for the chromatic cluster to be trusted.
    pub chromatic_min_chroma: f64,
    /// Minimum share of samples in the chromatic cluster.
    pub chromatic_min_share: f64,
    /// Two-means rounds.
    pub cluster_iterations: usize,

    /// Fallback white: minimum median L (or see `fallback_white_p85`).
    pub fallback_white_median: f64,
    /// Fallback white: minimum 85th percentile L.
    pub fallback_white_p85: f64,
    /// Fallback black: maximum median L.
    pub fallback_black_median: f64,

    /// CIEDE2000 distance that maps to zero confidence before clamping.
    pub confidence_distance: f64,
    /// Lower clamp for chromatic confidence.
    pub min_confidence: f64,
    /// Upper clamp for chromatic confidence.
    pub max_confidence: f64,

    /// Confidences used by the achromatic short-circuit.
    pub short_circuit_confidence: AchromaticConfidence,
    /// Confidences used when the chromatic cluster is too weak.
    pub fallback_confidence: AchromaticConfidence,
}

impl ClassifierThresholds {
    /// Default sample cap.
    pub const DEFAULT_TARGET_SAMPLES: usize = 30_000;
    /// Default near-neutral chroma cutoff.
    pub const DEFAULT_LOW_CHROMA: f64 = 6.0;
    /// Default high-lightness cutoff.
    pub const DEFAULT_HIGH_LIGHTNESS: f64 = 88.0;
    /// Default low-lightness cutoff.
    pub const DEFAULT_LOW_LIGHTNESS: f64 = 18.0;
    /// Default short-circuit trigger.
    pub const DEFAULT_ACHROMATIC_FRACTION: f64 = 0.7;
    /// Default short-circuit white share.
    pub const DEFAULT_WHITE_HIGH_FRACTION: f64 = 0.5;
    /// Default short-circuit white p90.
    pub const DEFAULT_WHITE_P90: f64 = 90.0;
    /// Default short-circuit white median.
    pub const DEFAULT_WHITE_MEDIAN: f64 = 84.0;
    /// Default short-circuit white p70.
    pub const DEFAULT_WHITE_P70: f64 = 88.0;
    /// Default short-circuit black share.
    pub const DEFAULT_BLACK_LOW_FRACTION: f64 = 0.6;
    /// Default short-circuit black median.
    pub const DEFAULT_BLACK_MEDIAN: f64 = 16.0;
    /// Default light gray median.
    pub const DEFAULT_LIGHT_GRAY_MEDIAN: f64 = 75.0;
    /// Default dark gray median.
    pub const DEFAULT_DARK_GRAY_MEDIAN: f64 = 35.0;
    /// Default chromatic cluster chroma.
    pub const DEFAULT_CHROMATIC_MIN_CHROMA: f64 = 10.0;
    /// Default chromatic cluster share.
    pub const DEFAULT_CHROMATIC_MIN_SHARE: f64 = 0.35;
    /// Default two-means rounds.
    pub const DEFAULT_CLUSTER_ITERATIONS: usize = cluster::DEFAULT_ITERATIONS;
    /// Default fallback white median.
    pub const DEFAULT_FALLBACK_WHITE_MEDIAN: f64 = 82.0;
    /// Default fallback white p85.
    pub const DEFAULT_FALLBACK_WHITE_P85: f64 = 88.0;
    /// Default fallback black median.
    pub const DEFAULT_FALLBACK_BLACK_MEDIAN: f64 = 18.0;
    /// Default zero-confidence distance.
    pub const DEFAULT_CONFIDENCE_DISTANCE: f64 = 25.0;
    /// Default confidence floor.
    pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.6;
    /// Default confidence ceiling.
    pub const DEFAULT_MAX_CONFIDENCE: f64 = 0.99;
    /// Default short-circuit confidences.
    pub const DEFAULT_SHORT_CIRCUIT_CONFIDENCE: AchromaticConfidence = AchromaticConfidence {
        white: 0.97,
        black: 0.95,
        gray: 0.88,
    };
    /// Default fallback confidences.
    pub const DEFAULT_FALLBACK_CONFIDENCE: AchromaticConfidence = AchromaticConfidence {
        white: 0.9,
        black: 0.9,
        gray: 0.8,
    };

    pub(crate) fn validate(&self) -> Result<(), PipelineError> {
        for (field, value) in [
            ("classifier.achromatic_fraction", self.achromatic_fraction),
            ("classifier.white_high_fraction", self.white_high_fraction),
            ("classifier.black_low_fraction", self.black_low_fraction),
            ("classifier.chromatic_min_share", self.chromatic_min_share),
            ("classifier.min_confidence", self.min_confidence),
            ("classifier.max_confidence", self.max_confidence),
        ] {
            check_fraction(field, value)?;
        }
        for c in [self.short_circuit_confidence, self.fallback_confidence] {
            check_fraction("classifier confidence (white)", c.white)?;
            check_fraction("classifier confidence (black)", c.black)?;
            check_fraction("classifier confidence (gray)", c.gray)?;
        }
        check_ordered(
            "classifier.min_confidence",
            self.min_confidence,
            "classifier.max_confidence",
            self.max_confidence,
        )?;
        check_ordered(
            "classifier.dark_gray_median",
            self.dark_gray_median,
            "classifier.light_gray_median",
            self.light_gray_median,
        )?;
        if self.target_samples == 0 {
            return Err(PipelineError::InvalidConfig(
                "classifier.target_samples must be at least 1".to_owned(),
            ));
        }
        if self.confidence_distance <= 0.0 {
            return Err(PipelineError::InvalidConfig(
                "classifier.confidence_distance must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            target_samples: Self::DEFAULT_TARGET_SAMPLES,
            low_chroma: Self::DEFAULT_LOW_CHROMA,
            high_lightness: Self::DEFAULT_HIGH_LIGHTNESS,
            low_lightness: Self::DEFAULT_LOW_LIGHTNESS,
            achromatic_fraction: Self::DEFAULT_ACHROMATIC_FRACTION,
            white_high_fraction: Self::DEFAULT_WHITE_HIGH_FRACTION,
            white_p90: Self::DEFAULT_WHITE_P90,
            white_median: Self::DEFAULT_WHITE_MEDIAN,
            white_p70: Self::DEFAULT_WHITE_P70,
            black_low_fraction: Self::DEFAULT_BLACK_LOW_FRACTION,
            black_median: Self::DEFAULT_BLACK_MEDIAN,
            light_gray_median: Self::DEFAULT_LIGHT_GRAY_MEDIAN,
            dark_gray_median: Self::DEFAULT_DARK_GRAY_MEDIAN,
            chromatic_min_chroma: Self::DEFAULT_CHROMATIC_MIN_CHROMA,
            chromatic_min_share: Self::DEFAULT_CHROMATIC_MIN_SHARE,
            cluster_iterations: Self::DEFAULT_CLUSTER_ITERATIONS,
            fallback_white_median: Self::DEFAULT_FALLBACK_WHITE_MEDIAN,
            fallback_white_p85: Self::DEFAULT_FALLBACK_WHITE_P85,
            fallback_black_median: Self::DEFAULT_FALLBACK_BLACK_MEDIAN,
            confidence_distance: Self::DEFAULT_CONFIDENCE_DISTANCE,
            min_confidence: Self::DEFAULT_MIN_CONFIDENCE,
            max_confidence: Self::DEFAULT_MAX_CONFIDENCE,
            short_circuit_confidence: Self::DEFAULT_SHORT_CIRCUIT_CONFIDENCE,
            fallback_confidence: Self::DEFAULT_FALLBACK_CONFIDENCE,
        }
    }
}

/// Lightness and chroma statistics over all samples.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SampleStats {
    median: f64,
    p70: f64,
    p85: f64,
    p90: f64,
    high_fraction: f64,
    low_fraction: f64,
    low_chroma_fraction: f64,
}

impl SampleStats {
    fn compute(samples: &[Lab], t: &ClassifierThresholds) -> Self {
        let lightness: Vec<f64> = samples.iter().map(|s| s.l).collect();
        let chroma: Vec<f64> = samples.iter().map(|s| s.chroma()).collect();
        let sorted = stats::sorted(&lightness);
        let q = |p: f64| stats::quantile(&sorted, p).unwrap_or(0.0);
        Self {
            median: q(0.5),
            p70: q(0.7),
            p85: q(0.85),
            p90: q(0.9),
            high_fraction: stats::fraction(&lightness, |l| l >= t.high_lightness),
            low_fraction: stats::fraction(&lightness, |l| l <= t.low_lightness),
            low_chroma_fraction: stats::fraction(&chroma, |c| c < t.low_chroma),
        }
    }
}

/// Lab values of covered pixels, visiting every `stride`-th mask index.
///
/// The stride is `max(1, floor(len / target_samples))` so the number of
/// visited pixels stays near `target_samples`.
#[must_use]
pub fn sample_lab(rgba: &RgbaImage, mask: &Mask, target_samples: usize) -> Vec<Lab> {
    let stride = (mask.len() / target_samples.max(1)).max(1);
    let raw = rgba.as_raw();
    (0..mask.len())
        .step_by(stride)
        .filter(|&i| mask.is_covered(i))
        .filter_map(|i| {
            let p = raw.get(i * 4..i * 4 + 3)?;
            Some(srgb_to_lab(p[0], p[1], p[2]))
        })
        .collect()
}

/// Palette color for `label`, keeping the label even if it were missing
/// from the palette.
fn palette_color(label: &str, confidence: f64) -> ExtractedColor {
    let hex = palette::lookup(label).map_or("#000000", |e| e.hex);
    ExtractedColor::new(label, hex, confidence)
}

fn gray_label(median: f64, t: &ClassifierThresholds) -> &'static str {
    if median >= t.light_gray_median {
        "lightgray"
    } else if median <= t.dark_gray_median {
        "darkgray"
    } else {
        "gray"
    }
}

/// Decision when most samples are near-neutral.
fn short_circuit(s: &SampleStats, t: &ClassifierThresholds) -> ExtractedColor {
    let conf = t.short_circuit_confidence;
    if s.high_fraction >= t.white_high_fraction
        || (s.p90 >= t.white_p90 && (s.median >= t.white_median || s.p70 >= t.white_p70))
    {
        return palette_color("white", conf.white);
    }
    if s.low_fraction >= t.black_low_fraction || s.median <= t.black_median {
        return palette_color("black", conf.black);
    }
    palette_color(gray_label(s.median, t), conf.gray)
}

/// Decision when the chromatic cluster is too weak to trust.
fn achromatic_fallback(s: &SampleStats, t: &ClassifierThresholds) -> ExtractedColor {
    let conf = t.fallback_confidence;
    if s.high_fraction >= t.white_high_fraction
        && (s.median >= t.fallback_white_median || s.p85 >= t.fallback_white_p85)
    {
        return palette_color("white", conf.white);
    }
    if s.median <= t.fallback_black_median {
        return palette_color("black", conf.black);
    }
    palette_color(gray_label(s.median, t), conf.gray)
}

/// Map a CIEDE2000 distance to a confidence in
/// `[min_confidence, max_confidence]`.
#[must_use]
pub fn confidence_from_distance(distance: f64, t: &ClassifierThresholds) -> f64 {
    (1.0 - distance / t.confidence_distance)
        .max(t.min_confidence)
        .min(t.max_confidence)
}

fn is_trusted(split: &Split, t: &ClassifierThresholds) -> bool {
    split.chromatic.mean_chroma >= t.chromatic_min_chroma
        && split.chromatic_share() >= t.chromatic_min_share
}

/// Classify the dominant color of the covered pixels of `rgba`.
///
/// `rgba` and `mask` must be aligned pixel-for-pixel. Returns
/// [`ExtractedColor::unknown`] when no pixel is covered. Never fails:
/// numeric degeneracies resolve to an achromatic label.
#[must_use]
pub fn extract_color_from_mask(
    rgba: &RgbaImage,
    mask: &Mask,
    thresholds: &ClassifierThresholds,
) -> ExtractedColor {
    let t = thresholds;
    let samples = sample_lab(rgba, mask, t.target_samples);
    if samples.is_empty() {
        log::debug!("no covered pixels to classify");
        return ExtractedColor::unknown();
    }

    let s = SampleStats::compute(&samples, t);
    log::debug!(
        "classify n={} L50={:.1} low_chroma={:.2} high={:.2} low={:.2}",
        samples.len(),
        s.median,
        s.low_chroma_fraction,
        s.high_fraction,
        s.low_fraction
    );

    if s.low_chroma_fraction >= t.achromatic_fraction {
        return short_circuit(&s, t);
    }

    let Some(split) = cluster::two_means_ab(&samples, t.cluster_iterations, s.median) else {
        return achromatic_fallback(&s, t);
    };
    log::debug!(
        "chromatic cluster chroma={:.1} share={:.2}",
        split.chromatic.mean_chroma,
        split.chromatic_share()
    );
    if !is_trusted(&split, t) {
        return achromatic_fallback(&s, t);
    }

    let target = split.chromatic.mean;
    if !target.is_finite() {
        log::debug!("chromatic target is not finite, treating as neutral");
        return achromatic_fallback(&s, t);
    }
    match palette::nearest(target) {
        Some((entry, distance)) => {
            ExtractedColor::new(entry.label, entry.hex, confidence_from_distance(distance, t))
        }
        None => achromatic_fallback(&s, t),
    }
}
