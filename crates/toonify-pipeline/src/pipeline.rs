//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process_staged`] which runs the entire pipeline in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use toonify_pipeline::{Pipeline, PipelineError, StyleParameters};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let decoded = Pipeline::new(png, StyleParameters::default()).decode()?;
//! println!("blur value: {}", decoded.derived().blur_value);
//!
//! let staged = decoded.render()?.into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying all previously computed intermediates.

use crate::diagnostics::{Clock, NoClock, StageMetrics, Timeline};
use crate::params::DerivedConstants;
use crate::quantize::KmeansOptions;
use crate::style::{Compositor, StyleInput};
use crate::types::{Dimensions, GrayImage, PipelineError, RgbImage, StagedResult, StyleParameters};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// The source image bytes and parameters are stored but not yet touched.
/// Call [`decode`](Self::decode) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing, call .decode() to continue"]
pub struct Pending {
    params: StyleParameters,
    kmeans: KmeansOptions,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Override the quantizer tuning.
    pub const fn with_kmeans(mut self, kmeans: KmeansOptions) -> Self {
        self.kmeans = kmeans;
        self
    }

    /// Decode the source image and advance to the [`Decoded`] stage.
    ///
    /// Parameters are normalized here, before anything is derived from
    /// them.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ImageDecode`] if the source bytes are
    /// empty, the format is unrecognized, or the data is corrupt.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        self.decode_timed(&mut Timeline::new(&NoClock))
    }

    pub(crate) fn decode_timed<C: Clock>(
        self,
        timeline: &mut Timeline<'_, C>,
    ) -> Result<Decoded, PipelineError> {
        let input_bytes = self.source.len();
        let original = timeline.try_time(
            "decode",
            || crate::grayscale::decode(&self.source),
            |img| {
                let dims = Dimensions::of(img);
                StageMetrics::Decode {
                    input_bytes,
                    width: dims.width,
                    height: dims.height,
                    pixel_count: dims.pixel_count(),
                }
            },
        )?;
        let grayscale = timeline.time(
            "grayscale",
            || crate::grayscale::to_gray(&original),
            |g| StageMetrics::Grayscale {
                width: g.width(),
                height: g.height(),
            },
        );

        let params = self.params.normalized();
        let derived = DerivedConstants::from_params(&params);
        Ok(Decoded {
            params,
            derived,
            kmeans: self.kmeans,
            dimensions: Dimensions::of(&original),
            original,
            grayscale,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding and grayscale conversion.
///
/// Call [`render`](Self::render) to run the selected style.
#[must_use = "pipeline stages are consumed by advancing, call .render() to continue"]
pub struct Decoded {
    params: StyleParameters,
    derived: DerivedConstants,
    kmeans: KmeansOptions,
    dimensions: Dimensions,
    original: RgbImage,
    grayscale: GrayImage,
}

impl Decoded {
    /// The decoded RGB source.
    #[must_use]
    pub const fn original(&self) -> &RgbImage {
        &self.original
    }

    /// Grayscale of the source.
    #[must_use]
    pub const fn grayscale(&self) -> &GrayImage {
        &self.grayscale
    }

    /// Normalized parameters.
    #[must_use]
    pub const fn params(&self) -> &StyleParameters {
        &self.params
    }

    /// Constants derived from the normalized parameters.
    #[must_use]
    pub const fn derived(&self) -> &DerivedConstants {
        &self.derived
    }

    /// Source image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Run the selected style and advance to the [`Rendered`] stage.
    ///
    /// Randomized styles use `params.seed` when set and otherwise draw a
    /// fresh seed, which is kept in the result.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Processing`] if a style step fails.
    pub fn render(self) -> Result<Rendered, PipelineError> {
        self.render_timed(&mut Timeline::new(&NoClock))
    }

    pub(crate) fn render_timed<C: Clock>(
        self,
        timeline: &mut Timeline<'_, C>,
    ) -> Result<Rendered, PipelineError> {
        let style = self.params.style;
        let seed = style
            .is_randomized()
            .then(|| self.params.seed.unwrap_or_else(rand::random));

        tracing::info!(
            %style,
            width = self.dimensions.width,
            height = self.dimensions.height,
            ?seed,
            "rendering"
        );

        let input = StyleInput {
            image: &self.original,
            gray: &self.grayscale,
            params: &self.params,
            derived: self.derived,
            seed: seed.unwrap_or_default(),
            kmeans: self.kmeans,
        };
        let composed = style.compose(&input, timeline)?;

        Ok(Rendered {
            result: StagedResult {
                original: self.original,
                grayscale: self.grayscale,
                edges: composed.edges,
                quantized: composed.quantized,
                palette: composed.palette,
                output: composed.output,
                style,
                seed,
                dimensions: self.dimensions,
            },
        })
    }
}

// ───────────────────────── Stage 2: Rendered ─────────────────────────

/// Pipeline state after the style has run. Terminal.
#[must_use = "call .into_result() to take the staged result"]
pub struct Rendered {
    result: StagedResult,
}

impl Rendered {
    /// The final output image.
    #[must_use]
    pub const fn output(&self) -> &RgbImage {
        &self.result.output
    }

    /// The full staged result.
    #[must_use]
    pub const fn result(&self) -> &StagedResult {
        &self.result
    }

    /// Consume the pipeline, returning every intermediate.
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        self.result
    }
}

/// Entry point for the incremental pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from source image bytes and parameters.
    ///
    /// No processing is performed; the bytes and parameters are simply
    /// stored. Call [`.decode()`](Pending::decode) to begin.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, params: StyleParameters) -> Pending {
        Pending {
            params,
            kmeans: KmeansOptions::new(),
            source: image_bytes,
        }
    }
}
