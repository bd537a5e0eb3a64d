//! Style compositors: turn a decoded image into the final rendering.
//!
//! [`Compositor`] is the seam between the pipeline driver and the
//! per-style algorithms. [`Style`] implements it by dispatching once per
//! call to the comic, anime, or pencil recipe.
//!
//! # Recipes
//!
//! - **Comic**: adaptive-threshold edge mask, k-means palette, bilateral
//!   smoothing, optional bold edges, masked blend, saturation scaling.
//! - **Anime**: thin gradient line art, smaller palette, stronger
//!   smoothing, fixed saturation boost, weighted blend with the lines.
//! - **Pencil**: inverted grayscale, Gaussian blur, color dodge.

use image::{GrayImage, RgbImage};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::diagnostics::{Clock, StageMetrics, Timeline};
use crate::params::{DerivedConstants, effective_palette_size};
use crate::quantize::{KmeansOptions, Quantized};
use crate::types::{PipelineError, Style, StyleParameters};
use crate::{blur, color, composite, edge, grayscale, quantize};

/// Bilateral window diameter for the color passes.
pub const COLOR_SMOOTH_DIAMETER: u32 = 9;

/// Comic range sigma per unit of `blur_value`.
const COMIC_SIGMA_COLOR_SCALE: u32 = 10;
/// Comic spatial sigma per unit of `blur_value`.
const COMIC_SIGMA_SPACE_SCALE: u32 = 5;

/// Anime palette is the comic palette divided by this.
pub const ANIME_PALETTE_DIVISOR: f32 = 1.5;
/// Anime range sigma per unit of `blur_value`.
const ANIME_SIGMA_COLOR_SCALE: u32 = 15;
/// Anime spatial sigma per unit of `blur_value`.
const ANIME_SIGMA_SPACE_SCALE: u32 = 7;
/// Anime saturation multiplier, independent of `saturation_boost`.
pub const ANIME_SATURATION: f32 = 1.4;
/// Weight of the line art in the anime blend.
pub const ANIME_EDGE_WEIGHT: f32 = 0.3;

/// Everything a compositor reads.
#[derive(Debug, Clone)]
pub struct StyleInput<'a> {
    /// Decoded source image.
    pub image: &'a RgbImage,
    /// Grayscale of `image`.
    pub gray: &'a GrayImage,
    /// Normalized parameters.
    pub params: &'a StyleParameters,
    /// Constants derived from `params`.
    pub derived: DerivedConstants,
    /// Seed for the quantizer RNG.
    pub seed: u64,
    /// Quantizer tuning.
    pub kmeans: KmeansOptions,
}

/// A finished rendering with the intermediates worth keeping.
#[derive(Debug, Clone)]
pub struct Composed {
    /// Edge mask or line art (0 = edge), if the style makes one.
    pub edges: Option<GrayImage>,
    /// Quantized image, if the style quantizes.
    pub quantized: Option<RgbImage>,
    /// Palette behind `quantized`.
    pub palette: Vec<[u8; 3]>,
    /// Final RGB output, same size as the input.
    pub output: RgbImage,
}

/// A rendering strategy.
pub trait Compositor {
    /// Render `input`, recording each step on `timeline`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Processing`] if a step fails.
    fn compose<C: Clock>(
        &self,
        input: &StyleInput<'_>,
        timeline: &mut Timeline<'_, C>,
    ) -> Result<Composed, PipelineError>;
}

impl Compositor for Style {
    fn compose<C: Clock>(
        &self,
        input: &StyleInput<'_>,
        timeline: &mut Timeline<'_, C>,
    ) -> Result<Composed, PipelineError> {
        if input.image.width() == 0 || input.image.height() == 0 {
            return Err(PipelineError::Processing("image has no pixels".to_string()));
        }
        match *self {
            Self::Comic => comic(input, timeline),
            Self::Anime => anime(input, timeline),
            Self::Pencil => pencil(input, timeline),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn sigma(blur_value: u32, scale: u32) -> f32 {
    (blur_value * scale) as f32
}

fn quantize_stage<C: Clock>(
    input: &StyleInput<'_>,
    k: u32,
    timeline: &mut Timeline<'_, C>,
) -> Result<Quantized, PipelineError> {
    let mut rng = StdRng::seed_from_u64(input.seed);
    timeline.try_time(
        "quantize",
        || quantize::quantize(input.image, k, &input.kmeans, &mut rng),
        |q| StageMetrics::Quantize {
            requested_colors: k,
            palette_size: q.centers.len(),
            iterations: q.iterations,
            compactness: q.compactness,
        },
    )
}

fn smooth_stage<C: Clock>(
    image: &RgbImage,
    sigma_color: f32,
    sigma_space: f32,
    timeline: &mut Timeline<'_, C>,
) -> RgbImage {
    timeline.time(
        "smooth",
        || blur::bilateral_filter(image, COLOR_SMOOTH_DIAMETER, sigma_color, sigma_space),
        |_| StageMetrics::Smooth {
            diameter: COLOR_SMOOTH_DIAMETER,
            sigma_color,
            sigma_space,
        },
    )
}

fn saturation_stage<C: Clock>(
    image: &RgbImage,
    factor: f32,
    timeline: &mut Timeline<'_, C>,
) -> RgbImage {
    timeline.time(
        "saturation",
        || color::boost_saturation(image, factor),
        |out| StageMetrics::Saturation {
            factor,
            mean_before: color::mean_saturation(image),
            mean_after: color::mean_saturation(out),
        },
    )
}

fn comic<C: Clock>(
    input: &StyleInput<'_>,
    timeline: &mut Timeline<'_, C>,
) -> Result<Composed, PipelineError> {
    let derived = &input.derived;
    let total = crate::types::Dimensions::of(input.gray).pixel_count();

    let mask = timeline.time(
        "edge_mask",
        || edge::comic_edge_mask(input.gray, derived),
        |m| StageMetrics::EdgeMask {
            line_size: derived.line_size,
            median_aperture: derived.median_aperture(),
            threshold_offset: derived.threshold_offset(),
            edge_pixel_count: edge::count_edge_pixels(m),
            total_pixel_count: total,
        },
    );

    let quantized = quantize_stage(input, derived.palette_size, timeline)?;

    let smoothed = smooth_stage(
        &quantized.image,
        sigma(derived.blur_value, COMIC_SIGMA_COLOR_SCALE),
        sigma(derived.blur_value, COMIC_SIGMA_SPACE_SCALE),
        timeline,
    );

    let mask = if input.params.bold_edges {
        let thickness = input.params.line_thickness;
        timeline.time(
            "bold_edges",
            || edge::thicken_edges(&mask, thickness),
            |thick| StageMetrics::BoldEdges {
                kernel_size: (thickness / 2).max(1),
                edge_pixels_before: edge::count_edge_pixels(&mask),
                edge_pixels_after: edge::count_edge_pixels(thick),
            },
        )
    } else {
        mask
    };

    let masked = timeline.try_time(
        "mask",
        || composite::apply_mask(&smoothed, &mask),
        |_| StageMetrics::Mask {
            masked_pixel_count: edge::count_edge_pixels(&mask),
        },
    )?;

    let output = saturation_stage(&masked, input.params.saturation_factor(), timeline);

    Ok(Composed {
        edges: Some(mask),
        quantized: Some(quantized.image),
        palette: quantized.centers,
        output,
    })
}

fn anime<C: Clock>(
    input: &StyleInput<'_>,
    timeline: &mut Timeline<'_, C>,
) -> Result<Composed, PipelineError> {
    let derived = &input.derived;
    let total = crate::types::Dimensions::of(input.gray).pixel_count();
    let (low, high) = derived.line_art_thresholds();

    let lines = timeline.time(
        "line_art",
        || edge::anime_line_art(input.gray, derived),
        |l| StageMetrics::LineArt {
            median_aperture: derived.anime_median_aperture(),
            low_threshold: low,
            high_threshold: high,
            edge_pixel_count: edge::count_edge_pixels(l),
            total_pixel_count: total,
        },
    );

    let k = effective_palette_size(derived.palette_size, ANIME_PALETTE_DIVISOR);
    let quantized = quantize_stage(input, k, timeline)?;

    let smoothed = smooth_stage(
        &quantized.image,
        sigma(derived.blur_value, ANIME_SIGMA_COLOR_SCALE),
        sigma(derived.blur_value, ANIME_SIGMA_SPACE_SCALE),
        timeline,
    );

    let enhanced = saturation_stage(&smoothed, ANIME_SATURATION, timeline);

    let color_weight = 1.0 - ANIME_EDGE_WEIGHT;
    let output = timeline.try_time(
        "blend",
        || {
            let lines_rgb = grayscale::gray_to_rgb(&lines);
            composite::add_weighted(&enhanced, color_weight, &lines_rgb, ANIME_EDGE_WEIGHT)
        },
        |_| StageMetrics::Blend {
            color_weight,
            edge_weight: ANIME_EDGE_WEIGHT,
        },
    )?;

    Ok(Composed {
        edges: Some(lines),
        quantized: Some(quantized.image),
        palette: quantized.centers,
        output,
    })
}

fn pencil<C: Clock>(
    input: &StyleInput<'_>,
    timeline: &mut Timeline<'_, C>,
) -> Result<Composed, PipelineError> {
    let kernel_size = input.derived.sketch_kernel_size();
    let sigma = blur::sigma_for_kernel_size(kernel_size);

    let blurred = timeline.time(
        "sketch",
        || blur::gaussian_blur(&composite::invert(input.gray), sigma),
        |_| StageMetrics::Sketch { kernel_size, sigma },
    );

    let sketch = timeline.try_time(
        "dodge",
        || composite::color_dodge(input.gray, &blurred),
        |s| StageMetrics::Dodge {
            white_pixel_count: s.pixels().map(|p| u64::from(p.0[0] == u8::MAX)).sum(),
        },
    )?;

    Ok(Composed {
        edges: None,
        quantized: None,
        palette: Vec::new(),
        output: grayscale::gray_to_rgb(&sketch),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::diagnostics::NoClock;

    fn scene() -> RgbImage {
        RgbImage::from_fn(32, 24, |x, y| {
            if (8..24).contains(&x) && (6..18).contains(&y) {
                image::Rgb([30, 60, 170])
            } else if x < 16 {
                image::Rgb([210, 180, 90])
            } else {
                image::Rgb([90, 160, 80])
            }
        })
    }

    fn render(style: Style, params: &StyleParameters, seed: u64) -> Composed {
        let image = scene();
        let gray = grayscale::to_gray(&image);
        let input = StyleInput {
            image: &image,
            gray: &gray,
            params,
            derived: DerivedConstants::from_params(params),
            seed,
            kmeans: KmeansOptions::new(),
        };
        style
            .compose(&input, &mut Timeline::new(&NoClock))
            .unwrap()
    }

    #[test]
    fn every_style_keeps_dimensions() {
        let params = StyleParameters::default();
        for style in Style::ALL {
            let composed = render(style, &params, 1);
            assert_eq!(composed.output.dimensions(), (32, 24), "{style}");
        }
    }

    #[test]
    fn comic_keeps_mask_and_palette() {
        let composed = render(Style::Comic, &StyleParameters::default(), 4);
        assert!(composed.edges.is_some());
        assert!(!composed.palette.is_empty());
        assert!(composed.palette.len() <= 8);
    }

    #[test]
    fn comic_edges_are_black_in_output() {
        let composed = render(Style::Comic, &StyleParameters::default(), 4);
        let mask = composed.edges.unwrap();
        for (x, y, m) in mask.enumerate_pixels() {
            if m.0[0] == crate::types::EDGE {
                assert_eq!(composed.output.get_pixel(x, y).0, [0, 0, 0]);
            }
        }
    }

    #[test]
    fn anime_palette_is_reduced() {
        let params = StyleParameters {
            color_simplification: 12,
            ..StyleParameters::default()
        };
        let composed = render(Style::Anime, &params, 2);
        assert!(composed.palette.len() <= 8);
    }

    #[test]
    fn anime_output_never_pure_black() {
        // The 0.3 * 255 line-art contribution lifts every non-edge pixel,
        // and edges keep 70% of their color.
        let composed = render(Style::Anime, &StyleParameters::default(), 2);
        let lines = composed.edges.unwrap();
        for (x, y, l) in lines.enumerate_pixels() {
            if l.0[0] == crate::types::BACKGROUND {
                let p = composed.output.get_pixel(x, y).0;
                assert!(p.iter().all(|&c| c >= 76), "{p:?} at ({x}, {y})");
            }
        }
    }

    #[test]
    fn pencil_is_gray_and_has_no_intermediates() {
        let composed = render(Style::Pencil, &StyleParameters::default(), 0);
        assert!(composed.edges.is_none());
        assert!(composed.quantized.is_none());
        assert!(composed.palette.is_empty());
        assert!(composed.output.pixels().all(|p| p.0[0] == p.0[1] && p.0[1] == p.0[2]));
    }

    #[test]
    fn pencil_ignores_seed() {
        let params = StyleParameters::default();
        assert_eq!(
            render(Style::Pencil, &params, 1).output,
            render(Style::Pencil, &params, 2).output
        );
    }

    #[test]
    fn same_seed_same_comic() {
        let params = StyleParameters::default();
        assert_eq!(
            render(Style::Comic, &params, 9).output,
            render(Style::Comic, &params, 9).output
        );
    }
}
