//! Per-stage timings and metrics for one analysis.
//!
//! [`analyze_with_diagnostics`] steps through the same stage sequence
//! as [`crate::analyze`] and records how long each step took along with
//! what it produced. The bench CLI prints these to tune thresholds and to catch
//! bad segmentations across a folder of photos. Time is read through a
//! caller-supplied [`Clock`]; the library itself never touches the
//! system clock.

use std::fmt::Write as _;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Pending, Stage, Step};
use crate::segment::Segmenter;
use crate::types::{Analysis, PipelineConfig, PipelineError};

/// Monotonic time source injected by the host.
pub trait Clock {
    /// Point in time as understood by this clock.
    type Instant;

    /// Read the clock.
    fn now(&self) -> Self::Instant;

    /// Time since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// `Duration` as an `f64` number of seconds.
mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        value.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(raw)
            .map_err(|e| serde::de::Error::custom(format!("invalid duration {raw}: {e}")))
    }
}

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Byte decoding and EXIF orientation.
    Decode,
    /// Resize to the working width.
    Downsample,
    /// Foreground separation.
    Segment,
    /// ROI crop, alpha threshold and skin suppression.
    Mask,
    /// Brightness normalization. Skipped when disabled.
    Illumination,
    /// Palette classification.
    Classify,
}

impl StageKind {
    /// Every stage, in execution order.
    pub const ALL: [Self; 6] = [
        Self::Decode,
        Self::Downsample,
        Self::Segment,
        Self::Mask,
        Self::Illumination,
        Self::Classify,
    ];

    /// Lowercase name, matching the serialized form.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::Downsample => "downsample",
            Self::Segment => "segment",
            Self::Mask => "mask",
            Self::Illumination => "illumination",
            Self::Classify => "classify",
        }
    }
}

/// Everything measured during one analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stages that ran, in execution order.
    pub stages: Vec<StageDiagnostics>,
    /// Wall time for the whole run, in seconds when serialized.
    #[serde(with = "seconds")]
    pub total_duration: Duration,
    /// The analysis the run produced.
    pub summary: Analysis,
}

/// Timing and output of one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall time, in seconds when serialized.
    #[serde(with = "seconds")]
    pub duration: Duration,
    /// What the stage produced.
    pub metrics: StageMetrics,
}

impl StageDiagnostics {
    /// Which stage this is.
    #[must_use]
    pub const fn kind(&self) -> StageKind {
        self.metrics.kind()
    }
}

/// What a stage produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Decoded photo.
    Decode {
        /// Encoded size.
        input_bytes: usize,
        /// Width after orientation.
        width: u32,
        /// Height after orientation.
        height: u32,
        /// `width * height`.
        pixel_count: u64,
    },
    /// Working image.
    Downsample {
        /// Decoded width.
        original_width: u32,
        /// Decoded height.
        original_height: u32,
        /// Working width.
        width: u32,
        /// Working height.
        height: u32,
        /// Whether a resize happened.
        applied: bool,
    },
    /// Separation result.
    Segment {
        /// Backend name.
        backend: String,
        /// Whether the whole-frame fallback was used.
        fallback: bool,
        /// Pixels with alpha above the noise floor.
        foreground_pixels: u64,
    },
    /// Garment mask.
    Mask {
        /// ROI width.
        roi_width: u32,
        /// ROI height.
        roi_height: u32,
        /// Pixels removed as skin.
        skin_pixels_removed: usize,
        /// Covered pixels remaining.
        covered_pixels: usize,
        /// Covered share of the ROI in percent.
        masked_area_percent: f64,
    },
    /// Brightness correction.
    Illumination {
        /// Applied factor, `None` for an empty mask.
        scale: Option<f64>,
    },
    /// Final color.
    Classify {
        /// Palette key.
        label: String,
        /// Reported confidence.
        confidence: f64,
    },
}

impl StageMetrics {
    /// The stage these metrics belong to.
    #[must_use]
    pub const fn kind(&self) -> StageKind {
        match self {
            Self::Decode { .. } => StageKind::Decode,
            Self::Downsample { .. } => StageKind::Downsample,
            Self::Segment { .. } => StageKind::Segment,
            Self::Mask { .. } => StageKind::Mask,
            Self::Illumination { .. } => StageKind::Illumination,
            Self::Classify { .. } => StageKind::Classify,
        }
    }

    /// One-line summary used in [`PipelineDiagnostics::report`].
    #[must_use]
    pub fn details(&self) -> String {
        match self {
            Self::Decode {
                input_bytes,
                width,
                height,
                ..
            } => format!("{input_bytes} bytes, {width}x{height}"),
            Self::Downsample {
                original_width,
                original_height,
                width,
                height,
                applied: true,
            } => format!("{original_width}x{original_height} to {width}x{height}"),
            Self::Downsample { width, height, .. } => format!("kept {width}x{height}"),
            Self::Segment {
                backend,
                fallback,
                foreground_pixels,
            } => format!(
                "{backend}{}, {foreground_pixels} fg px",
                if *fallback { " (whole frame)" } else { "" }
            ),
            Self::Mask {
                roi_width,
                roi_height,
                skin_pixels_removed,
                covered_pixels,
                masked_area_percent,
            } => format!(
                "roi {roi_width}x{roi_height}, {covered_pixels} covered ({masked_area_percent:.1}%), {skin_pixels_removed} skin"
            ),
            Self::Illumination { scale: Some(scale) } => format!("x{scale:.3}"),
            Self::Illumination { scale: None } => "empty mask".to_owned(),
            Self::Classify { label, confidence } => format!("{label} @ {confidence:.2}"),
        }
    }
}

impl PipelineDiagnostics {
    /// Diagnostics for `kind`, if that stage ran.
    #[must_use]
    pub fn stage(&self, kind: StageKind) -> Option<&StageDiagnostics> {
        self.stages.iter().find(|s| s.kind() == kind)
    }

    /// Plain-text table of stage timings followed by the result.
    #[must_use]
    pub fn report(&self) -> String {
        let total = self.total_duration.as_secs_f64();
        let roi = self.summary.roi;
        let dims = self.summary.dimensions;
        let color = &self.summary.color;

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} {} ({:.2}) via {}",
            color.label,
            color.hex,
            color.confidence,
            self.summary.meta.method()
        );
        let _ = writeln!(
            out,
            "working {}x{}, roi {}x{}+{}+{}, total {:.3}ms",
            dims.width,
            dims.height,
            roi.width,
            roi.height,
            roi.x,
            roi.y,
            total * 1e3
        );
        for stage in &self.stages {
            let name = stage.kind().name();
            let secs = stage.duration.as_secs_f64();
            let share = if total > 0.0 { secs / total * 100.0 } else { 0.0 };
            let _ = writeln!(
                out,
                "  {name:<13}{:>9.3}ms {share:>5.1}%  {}",
                secs * 1e3,
                stage.metrics.details()
            );
        }
        out.truncate(out.trim_end().len());
        out
    }
}

/// Count pixels with alpha strictly above `threshold`.
pub(crate) fn count_foreground(image: &image::RgbaImage, threshold: u8) -> u64 {
    image
        .pixels()
        .map(|p| u64::from(u8::from(p.0[3] > threshold)))
        .sum()
}

/// Run [`crate::analyze`] while timing every stage.
///
/// Metrics are gathered after each stage's clock reading, so they do
/// not count towards its duration.
///
/// # Errors
///
/// Same as [`crate::analyze`].
pub fn analyze_with_diagnostics<C: Clock>(
    bytes: &[u8],
    segmenter: &dyn Segmenter,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(Analysis, PipelineDiagnostics), PipelineError> {
    config.validate()?;
    let total_start = clock.now();
    let mut stages = Vec::with_capacity(StageKind::ALL.len());

    let start = clock.now();
    let decoded = Pending::new(bytes, segmenter).decode()?;
    let duration = clock.elapsed(&start);
    let mut stage = Stage::Decoded(decoded);
    stages.push(StageDiagnostics {
        duration,
        metrics: stage.metrics(config),
    });

    let analysis = loop {
        let start = clock.now();
        let step = stage.advance(config);
        let duration = clock.elapsed(&start);
        stages.push(StageDiagnostics {
            duration,
            metrics: step.metrics(config),
        });
        match step {
            Step::Next(next) => stage = next,
            Step::Done(analysis) => break analysis,
        }
    };

    let diagnostics = PipelineDiagnostics {
        stages,
        total_duration: clock.elapsed(&total_start),
        summary: analysis.clone(),
    };
    Ok((analysis, diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::segment::{Passthrough, SeparationOutcome, Unavailable};

    /// Clock that advances one millisecond per reading.
    struct TickClock(Cell<u64>);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    /// Skin-toned head over a garment-colored body.
    fn png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(width, height, |_, y| {
            if y < height * 3 / 10 {
                image::Rgba([224, 172, 140, 255])
            } else {
                image::Rgba([rgb[0], rgb[1], rgb[2], 255])
            }
        });
        crate::debug::encode_png(&img).unwrap()
    }

    #[test]
    fn skipped_stages_are_not_listed() {
        let bytes = png(20, 20, [200, 30, 30]);
        let mut config = PipelineConfig::default();
        config.illumination.enabled = false;
        let (_, diag) =
            analyze_with_diagnostics(&bytes, &Passthrough, &config, &TickClock(Cell::new(0)))
                .unwrap();
        let names: Vec<_> = diag.stages.iter().map(|s| s.kind().name()).collect();
        assert_eq!(names, ["decode", "downsample", "segment", "mask", "classify"]);
    }

    #[test]
    fn count_foreground_uses_strict_threshold() {
        let img = image::RgbaImage::from_fn(3, 1, |x, _| image::Rgba([0, 0, 0, [10, 11, 0][x as usize]]));
        assert_eq!(count_foreground(&img, 10), 1);
    }

    #[test]
    fn diagnostics_cover_every_stage() {
        let bytes = png(40, 60, [200, 30, 30]);
        let clock = TickClock(Cell::new(0));
        let (analysis, diag) =
            analyze_with_diagnostics(&bytes, &Passthrough, &PipelineConfig::default(), &clock)
                .unwrap();
        assert_eq!(analysis.color.base, "red");
        let kinds: Vec<_> = diag.stages.iter().map(StageDiagnostics::kind).collect();
        assert_eq!(kinds, StageKind::ALL);
        let decode = diag.stage(StageKind::Decode).unwrap();
        assert!(diag.total_duration >= decode.duration);
        assert!(matches!(
            decode.metrics,
            StageMetrics::Decode {
                width: 40,
                height: 60,
                ..
            }
        ));
        assert_eq!(diag.summary, analysis);
    }

    #[test]
    fn disabled_illumination_has_no_stage() {
        let bytes = png(20, 20, [128, 128, 128]);
        let mut config = PipelineConfig::default();
        config.illumination.enabled = false;
        let (analysis, diag) =
            analyze_with_diagnostics(&bytes, &Passthrough, &config, &TickClock(Cell::new(0)))
                .unwrap();
        assert!(diag.stage(StageKind::Illumination).is_none());
        assert!(analysis.brightness_scale.is_none());
    }

    #[test]
    fn diagnostics_match_plain_analysis() {
        let bytes = png(50, 80, [5, 10, 40]);
        let mut no_skin = PipelineConfig::default();
        no_skin.skin.enabled = false;
        let mut no_illumination = PipelineConfig::default();
        no_illumination.illumination.enabled = false;
        let unavailable = Unavailable::new("model not loaded");
        let backends: [&dyn Segmenter; 2] = [&Passthrough, &unavailable];

        for config in [PipelineConfig::default(), no_skin, no_illumination] {
            for segmenter in backends {
                let plain = crate::analyze(&bytes, segmenter, &config).unwrap();
                let (timed, diag) =
                    analyze_with_diagnostics(&bytes, segmenter, &config, &TickClock(Cell::new(0)))
                        .unwrap();
                assert_eq!(plain, timed);
                assert_eq!(diag.summary, plain);
            }
        }
    }

    #[test]
    fn illumination_metrics_report_applied_scale() {
        let bytes = png(30, 40, [250, 250, 250]);
        let (analysis, diag) = analyze_with_diagnostics(
            &bytes,
            &Passthrough,
            &PipelineConfig::default(),
            &TickClock(Cell::new(0)),
        )
        .unwrap();
        let stage = diag.stage(StageKind::Illumination).unwrap();
        assert!(matches!(
            stage.metrics,
            StageMetrics::Illumination { scale } if scale == analysis.brightness_scale
        ));
    }

    #[test]
    fn each_stage_is_timed_separately() {
        // Every stage reads the clock twice and the run once more at
        // each end, so a one-tick clock gives 1ms per stage.
        let bytes = png(20, 20, [200, 30, 30]);
        let (_, diag) = analyze_with_diagnostics(
            &bytes,
            &Passthrough,
            &PipelineConfig::default(),
            &TickClock(Cell::new(0)),
        )
        .unwrap();
        assert!(diag.stages.iter().all(|s| s.duration == Duration::from_millis(1)));
        assert!(diag.total_duration > Duration::from_millis(6));
    }

    #[test]
    fn report_mentions_stages_and_color() {
        let bytes = png(60, 60, [30, 100, 215]);
        let (_, diag) = analyze_with_diagnostics(
            &bytes,
            &Passthrough,
            &PipelineConfig::default(),
            &TickClock(Cell::new(0)),
        )
        .unwrap();
        let report = diag.report();
        assert!(report.starts_with("blue #"));
        assert!(report.contains("segment"));
        assert!(report.contains("illumination"));
        assert!(report.contains("blue"));
        assert!(report.contains("segmented+roi"));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let bytes = png(20, 20, [200, 30, 30]);
        let (_, diag) = analyze_with_diagnostics(
            &bytes,
            &Passthrough,
            &PipelineConfig::default(),
            &TickClock(Cell::new(0)),
        )
        .unwrap();
        let json = serde_json::to_value(&diag).unwrap();
        assert!(json["stages"][0]["duration"].is_f64());
        assert_eq!(json["stages"][0]["metrics"]["Decode"]["width"], 20);
        let back: PipelineDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(
            back.summary.meta.separation,
            SeparationOutcome::Segmented {
                backend: "passthrough".to_owned()
            }
        );
    }

    #[test]
    fn invalid_config_is_rejected_before_decoding() {
        let config = PipelineConfig {
            max_width: 0,
            ..PipelineConfig::default()
        };
        let err = analyze_with_diagnostics(&[], &Passthrough, &config, &TickClock(Cell::new(0)))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }
}
