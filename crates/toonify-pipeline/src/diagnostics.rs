//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter tuning. [`process_staged_with_diagnostics`] runs the same
//! stages as [`process_staged`](crate::process_staged) while recording
//! a [`StageDiagnostics`] entry per stage.
//!
//! The pipeline never reads a clock itself. Callers pass a [`Clock`]
//! implementation (the CLI uses `std::time::Instant`); the plain entry
//! points use [`NoClock`], which reports zero durations.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::params::DerivedConstants;
use crate::types::{PipelineError, StagedResult, Style, StyleParameters};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// Current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A [`Clock`] that never advances. Every duration is zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl Clock for NoClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// Records stages in execution order.
pub struct Timeline<'a, C: Clock> {
    clock: &'a C,
    stages: Vec<StageDiagnostics>,
}

impl<'a, C: Clock> Timeline<'a, C> {
    /// Start an empty timeline.
    pub const fn new(clock: &'a C) -> Self {
        Self {
            clock,
            stages: Vec::new(),
        }
    }

    /// Run one infallible stage.
    ///
    /// Only `run` is timed; `describe` builds the metrics afterwards.
    pub fn time<T>(
        &mut self,
        name: &'static str,
        run: impl FnOnce() -> T,
        describe: impl FnOnce(&T) -> StageMetrics,
    ) -> T {
        let start = self.clock.now();
        let value = run();
        let duration = self.clock.elapsed(&start);
        self.push(name, duration, describe(&value));
        value
    }

    /// Run one fallible stage. Failed stages are not recorded.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `run`.
    pub fn try_time<T, E>(
        &mut self,
        name: &'static str,
        run: impl FnOnce() -> Result<T, E>,
        describe: impl FnOnce(&T) -> StageMetrics,
    ) -> Result<T, E> {
        let start = self.clock.now();
        let value = run()?;
        let duration = self.clock.elapsed(&start);
        self.push(name, duration, describe(&value));
        Ok(value)
    }

    fn push(&mut self, name: &'static str, duration: Duration, metrics: StageMetrics) {
        tracing::debug!(
            stage = name,
            elapsed_ms = duration_ms(duration),
            "stage complete"
        );
        self.stages.push(StageDiagnostics {
            name: name.to_string(),
            duration,
            metrics,
        });
    }

    /// Stages recorded so far.
    #[must_use]
    pub fn stages(&self) -> &[StageDiagnostics] {
        &self.stages
    }

    /// Consume the timeline, returning its stages.
    #[must_use]
    pub fn into_stages(self) -> Vec<StageDiagnostics> {
        self.stages
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Style that rendered the output.
    pub style: Style,
    /// Normalized parameters the run used.
    pub params: StyleParameters,
    /// Constants derived from `params`.
    pub derived: DerivedConstants,
    /// Quantizer seed, `None` for deterministic styles.
    pub seed: Option<u64>,
    /// Every executed stage, in order.
    pub stages: Vec<StageDiagnostics>,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Stage identifier, e.g. `"edge_mask"`.
    pub name: String,
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Grayscale conversion metrics.
    Grayscale {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// Comic adaptive-threshold edge mask.
    EdgeMask {
        /// Adaptive threshold neighborhood size.
        line_size: u32,
        /// Median blur aperture.
        median_aperture: u32,
        /// Threshold offset `C`.
        threshold_offset: f32,
        /// Number of edge (dark) pixels in the mask.
        edge_pixel_count: u64,
        /// Total pixel count for computing edge density.
        total_pixel_count: u64,
    },
    /// Anime gradient line art.
    LineArt {
        /// Median blur aperture.
        median_aperture: u32,
        /// Hysteresis low threshold.
        low_threshold: f32,
        /// Hysteresis high threshold.
        high_threshold: f32,
        /// Number of line pixels.
        edge_pixel_count: u64,
        /// Total pixel count for computing edge density.
        total_pixel_count: u64,
    },
    /// K-means color quantization.
    Quantize {
        /// Palette size requested.
        requested_colors: u32,
        /// Palette size produced (bounded by distinct input colors).
        palette_size: usize,
        /// Lloyd iterations of the winning attempt.
        iterations: u32,
        /// Sum of squared pixel-to-center distances.
        compactness: f64,
    },
    /// Bilateral smoothing of the quantized image.
    Smooth {
        /// Window diameter.
        diameter: u32,
        /// Range sigma.
        sigma_color: f32,
        /// Spatial sigma.
        sigma_space: f32,
    },
    /// Bold-edge thickening.
    BoldEdges {
        /// Square element size.
        kernel_size: u32,
        /// Edge pixels before thickening.
        edge_pixels_before: u64,
        /// Edge pixels after thickening.
        edge_pixels_after: u64,
    },
    /// Masked blend of color and edges.
    Mask {
        /// Pixels forced to black.
        masked_pixel_count: u64,
    },
    /// HSV saturation scaling.
    Saturation {
        /// Multiplier applied to S.
        factor: f32,
        /// Mean saturation before.
        mean_before: f32,
        /// Mean saturation after.
        mean_after: f32,
    },
    /// Weighted blend of color and line art.
    Blend {
        /// Weight of the color image.
        color_weight: f32,
        /// Weight of the line art.
        edge_weight: f32,
    },
    /// Pencil: invert and Gaussian blur.
    Sketch {
        /// Gaussian kernel size.
        kernel_size: u32,
        /// Gaussian sigma.
        sigma: f32,
    },
    /// Pencil: color dodge.
    Dodge {
        /// Pixels that saturated to white.
        white_pixel_count: u64,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Edge pixels in the final mask, if the style has one.
    pub edge_pixel_count: Option<u64>,
    /// Number of palette colors, zero for pencil.
    pub palette_size: usize,
}

impl PipelineDiagnostics {
    /// Look up a stage by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageDiagnostics> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        let seed = self
            .seed
            .map_or_else(|| "n/a".to_string(), |s| s.to_string());
        lines.push(format!("Style: {}  |  Seed: {seed}", self.style));
        lines.push(format!(
            "Derived: line_size={} blur={} edge_threshold={} palette={}",
            self.derived.line_size,
            self.derived.blur_value,
            self.derived.edge_threshold,
            self.derived.palette_size,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for diag in &self.stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{:<24} {ms:>8.3}ms {pct:>9.1}%  {details}", diag.name));
        }

        lines.push(String::new());
        let edges = self
            .summary
            .edge_pixel_count
            .map_or_else(|| "n/a".to_string(), |n| n.to_string());
        lines.push(format!(
            "Edge pixels: {edges}  |  Palette colors: {}",
            self.summary.palette_size,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[allow(clippy::cast_precision_loss)]
fn density(count: u64, total: u64) -> f64 {
    if total > 0 {
        count as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Grayscale { width, height } => format!("{width}x{height}"),
        StageMetrics::EdgeMask {
            line_size,
            median_aperture,
            threshold_offset,
            edge_pixel_count,
            total_pixel_count,
        } => format!(
            "block={line_size} median={median_aperture} C={threshold_offset:.1} edges={edge_pixel_count} ({:.1}%)",
            density(*edge_pixel_count, *total_pixel_count),
        ),
        StageMetrics::LineArt {
            median_aperture,
            low_threshold,
            high_threshold,
            edge_pixel_count,
            total_pixel_count,
        } => format!(
            "median={median_aperture} low={low_threshold:.1} high={high_threshold:.1} edges={edge_pixel_count} ({:.1}%)",
            density(*edge_pixel_count, *total_pixel_count),
        ),
        StageMetrics::Quantize {
            requested_colors,
            palette_size,
            iterations,
            compactness,
        } => format!(
            "k={requested_colors} -> {palette_size} colors, {iterations} iters, compactness={compactness:.0}",
        ),
        StageMetrics::Smooth {
            diameter,
            sigma_color,
            sigma_space,
        } => format!("d={diameter} sigma_color={sigma_color:.1} sigma_space={sigma_space:.1}"),
        StageMetrics::BoldEdges {
            kernel_size,
            edge_pixels_before,
            edge_pixels_after,
        } => format!("kernel={kernel_size} edges={edge_pixels_before}->{edge_pixels_after}"),
        StageMetrics::Mask { masked_pixel_count } => format!("masked={masked_pixel_count}"),
        StageMetrics::Saturation {
            factor,
            mean_before,
            mean_after,
        } => format!("x{factor:.2} mean S {mean_before:.3}->{mean_after:.3}"),
        StageMetrics::Blend {
            color_weight,
            edge_weight,
        } => format!("color={color_weight:.2} edges={edge_weight:.2}"),
        StageMetrics::Sketch { kernel_size, sigma } => {
            format!("ksize={kernel_size} sigma={sigma:.2}")
        }
        StageMetrics::Dodge { white_pixel_count } => format!("white={white_pixel_count}"),
    }
}

/// Run the staged pipeline while collecting per-stage diagnostics.
///
/// Produces the same [`StagedResult`] as
/// [`process_staged`](crate::process_staged) for the same inputs and
/// seed.
///
/// # Errors
///
/// Returns [`PipelineError::ImageDecode`] if the bytes cannot be decoded
/// and [`PipelineError::Processing`] if a stage fails.
pub fn process_staged_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    params: &StyleParameters,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let start = clock.now();
    let mut timeline = Timeline::new(clock);

    let decoded = crate::pipeline::Pipeline::new(image_bytes.to_vec(), params.clone())
        .decode_timed(&mut timeline)?;
    let params = decoded.params().clone();
    let derived = *decoded.derived();
    let staged = decoded.render_timed(&mut timeline)?.into_result();

    let total_duration = clock.elapsed(&start);
    let summary = PipelineSummary {
        image_width: staged.dimensions.width,
        image_height: staged.dimensions.height,
        pixel_count: staged.dimensions.pixel_count(),
        edge_pixel_count: staged.edges.as_ref().map(crate::edge::count_edge_pixels),
        palette_size: staged.palette.len(),
    };

    let diagnostics = PipelineDiagnostics {
        style: staged.style,
        params,
        derived,
        seed: staged.seed,
        stages: timeline.into_stages(),
        total_duration,
        summary,
    };
    Ok((staged, diagnostics))
}
