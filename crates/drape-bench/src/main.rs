//! drape-bench: run the garment color pipeline on a photo from disk.
//!
//! Prints the classified color with per-stage timings and mask
//! statistics. Typical uses:
//!
//! - checking what a product photo classifies as, and how confidently
//! - tuning thresholds via `--config-json` against labeled photos
//! - finding failed segmentations (masked area near 0% or 100%)
//! - dumping the mask overlay with `--mask-png`
//!
//! ```text
//! cargo run --release --bin drape-bench -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Per-stage logging is available with `RUST_LOG=debug`.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use drape_pipeline::diagnostics::{self, Clock, PipelineDiagnostics, StageKind};
use drape_pipeline::downsample::DownsampleFilter;
use drape_pipeline::segment::{Passthrough, PrecomputedMatte, Segmenter};
use drape_pipeline::{PipelineConfig, debug, decode};

/// Dominant garment color extraction for drape.
#[derive(Parser)]
#[command(name = "drape-bench", version)]
struct Cli {
    /// Input photo (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Grayscale foreground matte (white = garment). Without it the
    /// photo's own alpha channel is used.
    #[arg(long)]
    matte: Option<PathBuf>,

    /// Maximum working width in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MAX_WIDTH, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    max_width: u32,

    /// Resampling filter: disabled, nearest, triangle, catmull-rom,
    /// gaussian or lanczos3.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_DOWNSAMPLE_FILTER)]
    downsample_filter: DownsampleFilter,

    /// Alpha values strictly above this count as foreground.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_ALPHA_THRESHOLD)]
    alpha_threshold: u8,

    /// Skip skin-tone suppression.
    #[arg(long)]
    no_skin: bool,

    /// Skip illumination normalization.
    #[arg(long)]
    no_illumination: bool,

    /// Write the mask overlay (blue, alpha = coverage) to this PNG.
    #[arg(long)]
    mask_png: Option<PathBuf>,

    /// Repeat the analysis this many times and summarize timings.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Print diagnostics as JSON.
    #[arg(long)]
    json: bool,

    /// Read the full pipeline config from a JSON file. Overrides the
    /// individual pipeline flags.
    #[arg(long, conflicts_with = "config_json")]
    config: Option<PathBuf>,

    /// Full pipeline config as inline JSON. Missing fields take their
    /// defaults. Overrides the individual pipeline flags.
    #[arg(long)]
    config_json: Option<String>,
}

impl Cli {
    /// Resolve the pipeline config and validate it.
    fn pipeline_config(&self) -> Result<PipelineConfig, String> {
        let config = match (&self.config, &self.config_json) {
            (Some(path), _) => {
                let json = read_to_string(path)?;
                serde_json::from_str(&json)
                    .map_err(|e| format!("Error parsing {}: {e}", path.display()))?
            }
            (None, Some(json)) => serde_json::from_str(json)
                .map_err(|e| format!("Error parsing --config-json: {e}"))?,
            (None, None) => {
                let mut config = PipelineConfig {
                    max_width: self.max_width,
                    downsample_filter: self.downsample_filter,
                    alpha_threshold: self.alpha_threshold,
                    ..PipelineConfig::default()
                };
                config.skin.enabled = !self.no_skin;
                config.illumination.enabled = !self.no_illumination;
                config
            }
        };
        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }

    /// The segmentation backend: the matte file if given, otherwise
    /// the photo's alpha channel.
    fn segmenter(&self) -> Result<Box<dyn Segmenter>, String> {
        let Some(ref path) = self.matte else {
            return Ok(Box::new(Passthrough));
        };
        let matte = decode::decode(&read(path)?)
            .map_err(|e| format!("Error decoding matte {}: {e}", path.display()))?
            .to_luma8();
        Ok(Box::new(PrecomputedMatte::new(matte)))
    }
}

fn read(path: &Path) -> Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))
}

fn read_to_string(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("Error reading {}: {e}", path.display()))
}

/// Rebuild the garment mask and write its overlay to `path`.
fn write_mask_png(
    image_bytes: &[u8],
    segmenter: &dyn Segmenter,
    config: &PipelineConfig,
    path: &Path,
) -> Result<usize, String> {
    let image = decode::decode(image_bytes).map_err(|e| e.to_string())?;
    let garment = drape_pipeline::build_garment_mask(&image, segmenter, config);
    let png = debug::encode_png(&debug::render_mask_overlay(&garment.mask))
        .map_err(|e| e.to_string())?;
    std::fs::write(path, &png).map_err(|e| format!("Error writing {}: {e}", path.display()))?;
    Ok(png.len())
}

/// Print one run's diagnostics in the requested format.
fn print_run(diagnostics: &PipelineDiagnostics, json: bool) -> Result<(), String> {
    if json {
        let text = serde_json::to_string_pretty(diagnostics)
            .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
        println!("{text}");
    } else {
        println!("{}", diagnostics.report());
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = cli.pipeline_config()?;
    let segmenter = cli.segmenter()?;
    let image_bytes = read(&cli.image_path)?;

    eprintln!(
        "Image: {} ({} bytes), segmenter: {}, runs: {}",
        cli.image_path.display(),
        image_bytes.len(),
        segmenter.name(),
        cli.runs,
    );
    log::debug!("config: {config:?}");

    let mut runs = Vec::with_capacity(cli.runs);
    for index in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", index + 1, cli.runs);
        }
        let (analysis, diag) = diagnostics::analyze_with_diagnostics(
            &image_bytes,
            segmenter.as_ref(),
            &config,
            &StdClock,
        )
        .map_err(|e| format!("Pipeline error: {e}"))?;
        log::info!(
            "{}: {} {} ({:.2})",
            cli.image_path.display(),
            analysis.color.label,
            analysis.color.hex,
            analysis.color.confidence,
        );
        print_run(&diag, cli.json)?;
        runs.push(diag);
    }

    if let Some(ref path) = cli.mask_png {
        let len = write_mask_png(&image_bytes, segmenter.as_ref(), &config, path)?;
        eprintln!("Mask written to {} ({len} bytes)", path.display());
    }

    if runs.len() > 1 {
        print_summary(&runs);
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

/// [`Clock`] backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Mean of `values` in milliseconds, `None` when empty.
#[allow(clippy::cast_precision_loss)]
fn mean_ms(values: impl Iterator<Item = Duration>) -> Option<f64> {
    let (count, total) = values.fold((0_usize, 0.0), |(n, sum), d| {
        (n + 1, sum + d.as_secs_f64() * 1000.0)
    });
    (count > 0).then(|| total / count as f64)
}

/// Print timing statistics across runs and flag unstable labels.
fn print_summary(runs: &[PipelineDiagnostics]) {
    let Some(first) = runs.first() else {
        return;
    };
    let totals: Vec<f64> = runs
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();
    let min = totals.iter().copied().fold(f64::INFINITY, f64::min);
    let max = totals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = mean_ms(runs.iter().map(|d| d.total_duration)).unwrap_or(0.0);

    println!();
    println!("Summary ({} runs)\n{}", runs.len(), "=".repeat(60));
    println!("Total: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");
    println!();
    println!("{:<16} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(32));
    for kind in StageKind::ALL {
        let durations = runs
            .iter()
            .filter_map(|d| d.stage(kind).map(|s| s.duration));
        if let Some(stage_mean) = mean_ms(durations) {
            println!("{:<16} {stage_mean:>10.3}ms", kind.name());
        }
    }

    if runs
        .iter()
        .any(|d| d.summary.color.label != first.summary.color.label)
    {
        println!();
        println!("Warning: classification differed between runs");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("drape-bench").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_library() {
        let config = parse(&["shirt.jpg"]).pipeline_config().unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn flags_toggle_stages() {
        let config = parse(&["shirt.jpg", "--no-skin", "--no-illumination"])
            .pipeline_config()
            .unwrap();
        assert!(!config.skin.enabled);
        assert!(!config.illumination.enabled);
    }

    #[test]
    fn filter_flag_uses_library_names() {
        let cli = parse(&["shirt.jpg", "--downsample-filter", "catmull-rom"]);
        assert_eq!(cli.downsample_filter, DownsampleFilter::CatmullRom);
        assert!(
            Cli::try_parse_from(["drape-bench", "shirt.jpg", "--downsample-filter", "bicubic"])
                .is_err()
        );
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = parse(&[
            "shirt.jpg",
            "--max-width",
            "128",
            "--config-json",
            r#"{"max_width": 512}"#,
        ]);
        assert_eq!(cli.pipeline_config().unwrap().max_width, 512);
    }

    #[test]
    fn invalid_config_json_is_reported() {
        let cli = parse(&["shirt.jpg", "--config-json", r#"{"torso_band": {"top": 2.0}}"#]);
        assert!(cli.pipeline_config().is_err());
    }

    #[test]
    fn zero_max_width_is_rejected_by_parser() {
        assert!(Cli::try_parse_from(["drape-bench", "shirt.jpg", "--max-width", "0"]).is_err());
    }

    #[test]
    fn missing_matte_file_is_an_error() {
        let cli = parse(&["shirt.jpg", "--matte", "/nonexistent/matte.png"]);
        assert!(cli.segmenter().is_err());
        assert_eq!(parse(&["shirt.jpg"]).segmenter().unwrap().name(), "passthrough");
    }

    #[test]
    fn mean_of_nothing_is_none() {
        assert!(mean_ms(std::iter::empty()).is_none());
        let mean = mean_ms([Duration::from_millis(2), Duration::from_millis(4)].into_iter());
        assert!((mean.unwrap() - 3.0).abs() < 1e-9);
    }
}
