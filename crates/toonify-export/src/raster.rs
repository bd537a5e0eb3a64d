//! Raster encoding for rendered images and intermediates.

use std::fmt;

use image::{ExtendedColorType, ImageEncoder};
use serde::{Deserialize, Serialize};
use toonify_pipeline::{GrayImage, RgbImage};

/// Encoded output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "format")]
pub enum OutputFormat {
    /// Lossless PNG.
    #[default]
    Png,
    /// Baseline JPEG at the given quality (1-100).
    Jpeg {
        /// Encoder quality, clamped to 1-100 at encode time.
        quality: u8,
    },
}

impl OutputFormat {
    /// JPEG quality used when none is given.
    pub const DEFAULT_JPEG_QUALITY: u8 = 90;

    /// Conventional file extension, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg { .. } => "jpg",
        }
    }

    /// Guess the format from a file extension (case-insensitive).
    ///
    /// JPEG guesses use [`DEFAULT_JPEG_QUALITY`](Self::DEFAULT_JPEG_QUALITY).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg {
                quality: Self::DEFAULT_JPEG_QUALITY,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Png => f.write_str("PNG"),
            Self::Jpeg { quality } => write!(f, "JPEG (quality {quality})"),
        }
    }
}

/// Errors that can occur while encoding.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The encoder rejected the image.
    #[error("failed to encode {format}: {source}")]
    Encode {
        /// Target format.
        format: OutputFormat,
        /// Underlying encoder error.
        #[source]
        source: image::ImageError,
    },
}

/// Encode an RGB rendering.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if the encoder fails (for example on
/// a zero-sized image).
pub fn encode_rgb(image: &RgbImage, format: OutputFormat) -> Result<Vec<u8>, ExportError> {
    encode_raw(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgb8,
        format,
    )
}

/// Encode a single-channel intermediate such as an edge mask.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if the encoder fails.
pub fn encode_gray(image: &GrayImage, format: OutputFormat) -> Result<Vec<u8>, ExportError> {
    encode_raw(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::L8,
        format,
    )
}

fn encode_raw(
    raw: &[u8],
    width: u32,
    height: u32,
    color: ExtendedColorType,
    format: OutputFormat,
) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    let result = match format {
        OutputFormat::Png => image::codecs::png::PngEncoder::new(&mut bytes)
            .write_image(raw, width, height, color),
        OutputFormat::Jpeg { quality } => {
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
                .write_image(raw, width, height, color)
        }
    };
    result.map_err(|source| ExportError::Encode { format, source })?;
    Ok(bytes)
}
