//! toonify-pipeline: Pure cartoonification pipeline (sans-IO).
//!
//! Turns a photograph into one of three stylized renderings:
//!
//! - **comic**: adaptive-threshold ink lines over a smoothed k-means
//!   palette, with optional bold edges and a saturation boost
//! - **anime**: thin gradient line art blended over a smaller, more
//!   vivid palette
//! - **pencil**: grayscale color-dodge sketch
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! byte slices and images and returns structured data. Reading files,
//! encoding output, and naming results live in the `toonify-export`
//! and `toonify` crates.
//!
//! Parameters are never rejected. Every entry point normalizes
//! [`StyleParameters`] (clamping numeric fields, defaulting unknown
//! styles) before deriving anything from them.

pub mod blur;
pub mod canny;
pub mod color;
pub mod composite;
pub mod diagnostics;
pub mod edge;
pub mod grayscale;
pub mod params;
pub mod pipeline;
pub mod quantize;
pub mod style;
pub mod types;

pub use params::DerivedConstants;
pub use pipeline::Pipeline;
pub use quantize::KmeansOptions;
pub use style::{Composed, Compositor};
pub use types::{
    DecodeError, Dimensions, GrayImage, PipelineError, RgbImage, StagedResult, Style,
    StyleParameters,
};

/// Run the full pipeline on encoded image bytes.
///
/// Accepts PNG, JPEG, BMP, or WebP. The output is always 3-channel RGB
/// with the input's width and height.
///
/// # Errors
///
/// Returns [`PipelineError::ImageDecode`] if the bytes are empty or not a
/// decodable image, and [`PipelineError::Processing`] if a stage fails.
pub fn process(image_bytes: &[u8], params: &StyleParameters) -> Result<RgbImage, PipelineError> {
    Ok(process_staged(image_bytes, params)?.output)
}

/// Run the pipeline on an already-decoded image.
///
/// # Errors
///
/// Returns [`PipelineError::Processing`] if a stage fails, including
/// for an image with no pixels.
pub fn cartoonify(image: &RgbImage, params: &StyleParameters) -> Result<RgbImage, PipelineError> {
    let params = params.normalized();
    let derived = DerivedConstants::from_params(&params);
    let gray = grayscale::to_gray(image);
    let seed = params.seed.unwrap_or_else(rand::random);

    tracing::info!(
        style = %params.style,
        width = image.width(),
        height = image.height(),
        seed,
        "cartoonify"
    );

    let input = style::StyleInput {
        image,
        gray: &gray,
        params: &params,
        derived,
        seed,
        kmeans: KmeansOptions::new(),
    };
    let composed = params
        .style
        .compose(&input, &mut diagnostics::Timeline::new(&diagnostics::NoClock))?;
    Ok(composed.output)
}

/// Run the full pipeline, keeping every intermediate.
///
/// The returned [`StagedResult`] carries the decoded source, grayscale,
/// edge mask, quantized image and palette (when the style produces
/// them), the final output, and the quantizer seed actually used.
///
/// # Errors
///
/// Same as [`process`].
pub fn process_staged(
    image_bytes: &[u8],
    params: &StyleParameters,
) -> Result<StagedResult, PipelineError> {
    Ok(Pipeline::new(image_bytes.to_vec(), params.clone())
        .decode()?
        .render()?
        .into_result())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Create a PNG with a dark left half and a warm right half.
    fn two_tone_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, _y| {
            if x < width / 2 {
                image::Rgb([25, 25, 35])
            } else {
                image::Rgb([220, 150, 90])
            }
        });
        let mut buf = Vec::new();
        image::ImageEncoder::write_image(
            image::codecs::png::PngEncoder::new(&mut buf),
            img.as_raw(),
            width,
            height,
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn process_preserves_dimensions() {
        let out = process(&two_tone_png(40, 30), &StyleParameters::default()).unwrap();
        assert_eq!(out.dimensions(), (40, 30));
    }

    #[test]
    fn process_empty_input() {
        let result = process(&[], &StyleParameters::default());
        assert!(matches!(
            result,
            Err(PipelineError::ImageDecode(DecodeError::Empty))
        ));
    }

    #[test]
    fn process_invalid_image() {
        let result = process(b"not an image", &StyleParameters::default());
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn cartoonify_matches_process_with_seed() {
        let bytes = two_tone_png(20, 20);
        let params = StyleParameters {
            seed: Some(17),
            ..StyleParameters::default()
        };
        let decoded = grayscale::decode(&bytes).unwrap();
        assert_eq!(
            cartoonify(&decoded, &params).unwrap(),
            process(&bytes, &params).unwrap()
        );
    }

    #[test]
    fn cartoonify_rejects_empty_image() {
        let result = cartoonify(&RgbImage::new(0, 0), &StyleParameters::default());
        assert!(matches!(result, Err(PipelineError::Processing(_))));
    }

    #[test]
    fn process_staged_keeps_intermediates() {
        let params = StyleParameters {
            seed: Some(2),
            ..StyleParameters::default()
        };
        let staged = process_staged(&two_tone_png(16, 16), &params).unwrap();
        assert_eq!(staged.original.dimensions(), (16, 16));
        assert_eq!(staged.grayscale.dimensions(), (16, 16));
        assert!(staged.edges.is_some());
        assert!(staged.quantized.is_some());
        assert_eq!(staged.seed, Some(2));
    }
}
