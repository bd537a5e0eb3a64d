//! Image decoding and channel conversions.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces the RGB
//! working image. Grayscale conversion precedes every edge computation,
//! and single-channel results are broadcast back to RGB for output.

use image::{GrayImage, RgbImage};

use crate::types::{DecodeError, PipelineError};

/// Decode raw image bytes into an RGB image.
///
/// Alpha is dropped and single-channel inputs are expanded, so every
/// downstream stage sees three channels.
///
/// # Errors
///
/// Returns [`PipelineError::ImageDecode`] if `bytes` is empty, the
/// format is unrecognized, or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty.into());
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// Convert an RGB image to grayscale with BT.601 luma weights
/// (0.299 R + 0.587 G + 0.114 B), rounded to nearest.
///
/// The edge thresholds assume BT.601 luma; `imageops::grayscale` uses
/// Rec. 709 weights instead.
#[must_use = "returns the grayscale image"]
pub fn to_gray(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        image::Luma([bt601_luma(r, g, b)])
    })
}

/// Fixed-point BT.601 luma. The weights sum to 1000, so the result
/// never exceeds 255.
fn bt601_luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    u8::try_from((weighted + 500) / 1000).unwrap_or(u8::MAX)
}

/// Broadcast a single-channel image to three identical channels.
#[must_use = "returns the RGB image"]
pub fn gray_to_rgb(image: &GrayImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let v = image.get_pixel(x, y).0[0];
        image::Rgb([v, v, v])
    })
}
