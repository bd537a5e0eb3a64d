//! Shared types for the toonify cartoonification pipeline.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference
/// single-channel intermediates without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference the decoded
/// source and the final output without depending on `image` directly.
pub use image::RgbImage;

/// Mask value marking an edge pixel.
pub const EDGE: u8 = 0;

/// Mask value marking a background (non-edge) pixel.
pub const BACKGROUND: u8 = 255;

/// Cartoon rendering style.
///
/// Selection is a single dispatch per call; see
/// [`Compositor`](crate::style::Compositor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Style {
    /// Adaptive-threshold ink lines over a quantized, smoothed palette.
    #[default]
    Comic,
    /// Thin gradient lines blended over a small, vivid palette.
    Anime,
    /// Grayscale color-dodge sketch.
    Pencil,
}

impl Style {
    /// All styles, in presentation order.
    pub const ALL: [Self; 3] = [Self::Comic, Self::Anime, Self::Pencil];

    /// Parse a style name leniently.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Unrecognized names fall back to [`Style::Comic`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|style| style.name().eq_ignore_ascii_case(name))
            .unwrap_or_default()
    }

    /// Lowercase name as accepted by [`Style::from_name`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Comic => "comic",
            Self::Anime => "anime",
            Self::Pencil => "pencil",
        }
    }

    /// Whether this style runs the randomized color quantizer.
    #[must_use]
    pub const fn is_randomized(self) -> bool {
        matches!(self, Self::Comic | Self::Anime)
    }
}

impl From<String> for Style {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// User-facing knobs for one pipeline invocation.
///
/// Fields are public and may hold out-of-range values; every pipeline
/// entry point calls [`normalized`](Self::normalized) before deriving
/// anything from them, so out-of-range input is clamped, never rejected.
///
/// Raw string key/value input (e.g. HTML form fields) goes through
/// [`StyleParameters::from_raw`]. Deserialization is just as lenient:
/// any JSON value is accepted in any slot and normalized the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "crate::params::RawStyleParameters")]
pub struct StyleParameters {
    /// Edge prominence, 1-100. Higher values produce more edges.
    pub edge_strength: u32,

    /// Target palette size, 2-32.
    pub color_simplification: u32,

    /// Blur and smoothing strength, 1-20.
    pub smoothing_level: u32,

    /// Which compositor renders the output.
    pub style: Style,

    /// Comic line thickness, 1-10. Only used with `bold_edges`.
    pub line_thickness: u32,

    /// Comic saturation boost in percent, 50-150.
    #[serde(rename = "saturation")]
    pub saturation_boost: u32,

    /// Whether comic edges are thickened before masking.
    pub bold_edges: bool,

    /// Seed for the quantizer's cluster initialization.
    ///
    /// `None` draws a fresh seed per call; the seed actually used is
    /// reported in [`StagedResult::seed`].
    pub seed: Option<u64>,
}

impl StyleParameters {
    /// Default edge strength.
    pub const DEFAULT_EDGE_STRENGTH: u32 = 50;
    /// Default palette size.
    pub const DEFAULT_COLOR_SIMPLIFICATION: u32 = 8;
    /// Default smoothing level.
    pub const DEFAULT_SMOOTHING_LEVEL: u32 = 7;
    /// Default comic line thickness.
    pub const DEFAULT_LINE_THICKNESS: u32 = 5;
    /// Default saturation boost (percent, 100 = unchanged).
    pub const DEFAULT_SATURATION_BOOST: u32 = 100;
    /// Default bold-edge setting.
    pub const DEFAULT_BOLD_EDGES: bool = true;

    /// Valid edge strength values.
    pub const EDGE_STRENGTH_RANGE: RangeInclusive<u32> = 1..=100;
    /// Valid palette sizes.
    pub const COLOR_SIMPLIFICATION_RANGE: RangeInclusive<u32> = 2..=32;
    /// Valid smoothing levels.
    pub const SMOOTHING_LEVEL_RANGE: RangeInclusive<u32> = 1..=20;
    /// Valid line thickness values.
    pub const LINE_THICKNESS_RANGE: RangeInclusive<u32> = 1..=10;
    /// Valid saturation boost percentages.
    pub const SATURATION_BOOST_RANGE: RangeInclusive<u32> = 50..=150;

    /// Saturation multiplier (`saturation_boost / 100`).
    #[must_use]
    pub fn saturation_factor(&self) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let percent = self.saturation_boost as f32;
        percent / 100.0
    }
}

impl Default for StyleParameters {
    fn default() -> Self {
        Self {
            edge_strength: Self::DEFAULT_EDGE_STRENGTH,
            color_simplification: Self::DEFAULT_COLOR_SIMPLIFICATION,
            smoothing_level: Self::DEFAULT_SMOOTHING_LEVEL,
            style: Style::default(),
            line_thickness: Self::DEFAULT_LINE_THICKNESS,
            saturation_boost: Self::DEFAULT_SATURATION_BOOST,
            bold_edges: Self::DEFAULT_BOLD_EDGES,
            seed: None,
        }
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an image buffer.
    #[must_use]
    pub fn of<P: image::Pixel>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count.
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Result of a pipeline run with its intermediates preserved.
///
/// Style-specific intermediates are `None` when the selected style does
/// not produce them (e.g. pencil has no edge mask or palette).
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Decoded source image.
    pub original: RgbImage,
    /// Grayscale conversion of the source.
    pub grayscale: GrayImage,
    /// Edge mask in the [`EDGE`]/[`BACKGROUND`] convention.
    ///
    /// Comic: the mask actually applied (after optional thickening).
    /// Anime: the line art before promotion to three channels.
    pub edges: Option<GrayImage>,
    /// Palette-reduced image produced by the quantizer.
    pub quantized: Option<RgbImage>,
    /// Cluster centers used for `quantized`.
    pub palette: Vec<[u8; 3]>,
    /// Final rendering.
    pub output: RgbImage,
    /// Style that produced `output`.
    pub style: Style,
    /// Quantizer seed actually used, `None` for deterministic styles.
    pub seed: Option<u64>,
    /// Source image dimensions.
    pub dimensions: Dimensions,
}

/// Reasons an input could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The input contained no bytes.
    #[error("input image data is empty")]
    Empty,

    /// The bytes are not a supported or intact image.
    #[error(transparent)]
    Format(#[from] image::ImageError),
}

/// Errors that can occur during pipeline processing.
///
/// There is deliberately no invalid-parameter variant: parameters are
/// clamped or defaulted, never rejected.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The input could not be decoded. No stage has run.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] DecodeError),

    /// A processing stage failed. No partial output is produced.
    #[error("processing failed: {0}")]
    Processing(String),
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageDecode(DecodeError::Format(err))
    }
}
