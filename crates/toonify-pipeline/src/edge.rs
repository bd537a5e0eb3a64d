//! Edge masks for the comic and anime styles.
//!
//! Every mask here uses the [`EDGE`]/[`BACKGROUND`] convention: dark
//! (0) pixels are ink lines and light (255) pixels are background, so the
//! mask can gate a color image directly.

use image::{GrayImage, Luma};

use crate::blur;
use crate::canny;
use crate::params::DerivedConstants;
use crate::types::{BACKGROUND, EDGE};

/// Bilateral diameter of the noise pass before comic thresholding.
const COMIC_PREFILTER_DIAMETER: u32 = 5;

/// Bilateral sigmas (color and space) of the comic noise pass.
const COMIC_PREFILTER_SIGMA: f32 = 50.0;

/// Build the comic edge mask from a grayscale image.
///
/// Bilateral noise pass, median blur (`blur_value`), mean adaptive
/// threshold (`line_size`, offset `edge_threshold / 10`), then a small
/// closing that drops isolated dark specks.
#[must_use = "returns the edge mask"]
pub fn comic_edge_mask(gray: &GrayImage, derived: &DerivedConstants) -> GrayImage {
    let smoothed = blur::bilateral_filter(
        gray,
        COMIC_PREFILTER_DIAMETER,
        COMIC_PREFILTER_SIGMA,
        COMIC_PREFILTER_SIGMA,
    );
    let blurred = blur::median_blur(&smoothed, derived.median_aperture());
    let binary = adaptive_threshold_mean(&blurred, derived.line_size, derived.threshold_offset());
    close_speckles(&binary)
}

/// Binarize against the local mean of a `block_size` square.
///
/// A pixel is [`BACKGROUND`] when `src - mean > -ceil(offset)` and
/// [`EDGE`] otherwise, so pixels noticeably darker than their
/// neighborhood become ink. Borders replicate the edge pixels.
#[must_use = "returns the binary mask"]
pub fn adaptive_threshold_mean(gray: &GrayImage, block_size: u32, offset: f32) -> GrayImage {
    let radius = block_size / 2;
    let mean = imageproc::filter::box_filter(gray, radius, radius);

    #[allow(clippy::cast_possible_truncation)]
    let delta = if offset > 0.0 {
        offset.ceil() as i32
    } else {
        offset.floor() as i32
    };

    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let src = i32::from(gray.get_pixel(x, y).0[0]);
        let local = i32::from(mean.get_pixel(x, y).0[0]);
        if src - local > -delta {
            Luma([BACKGROUND])
        } else {
            Luma([EDGE])
        }
    })
}

/// Morphological closing of the light background with a 2x2 square.
///
/// Dark features one pixel wide disappear; wider lines keep their shape.
#[must_use = "returns the cleaned mask"]
pub fn close_speckles(mask: &GrayImage) -> GrayImage {
    let dilated = window_extreme(mask, -1, 0, u8::max);
    window_extreme(&dilated, 0, 1, u8::min)
}

/// Grow the dark edge pixels for bold comic lines.
///
/// The square element is `k = max(1, line_thickness / 2)` pixels wide,
/// anchored at `k / 2`. A thickness below 4 gives `k = 1`, which leaves
/// the mask untouched.
#[must_use = "returns the thickened mask"]
pub fn thicken_edges(mask: &GrayImage, line_thickness: u32) -> GrayImage {
    let kernel = (line_thickness / 2).max(1);
    if kernel == 1 {
        return mask.clone();
    }
    let anchor = i64::from(kernel / 2);
    window_extreme(mask, -anchor, i64::from(kernel) - 1 - anchor, u8::min)
}

/// Thin anime line art.
///
/// Median blur (`max(3, blur_value - 2)`) followed by gradient edge
/// detection with thresholds `edge_threshold` and `3 * edge_threshold`.
/// Detected edges come back as [`EDGE`] on a [`BACKGROUND`] field.
#[must_use = "returns the line-art mask"]
pub fn anime_line_art(gray: &GrayImage, derived: &DerivedConstants) -> GrayImage {
    let blurred = blur::median_blur(gray, derived.anime_median_aperture());
    let (low, high) = derived.line_art_thresholds();
    invert_edge_map(&canny::detect_edges(&blurred, low, high))
}

/// Invert a binary edge map (bitwise NOT).
///
/// Turns detector output (edges 255) into mask convention (edges 0).
#[must_use = "returns the inverted edge map"]
pub fn invert_edge_map(edges: &GrayImage) -> GrayImage {
    GrayImage::from_fn(edges.width(), edges.height(), |x, y| {
        Luma([!edges.get_pixel(x, y).0[0]])
    })
}

/// Number of [`EDGE`] pixels in a mask.
#[must_use]
pub fn count_edge_pixels(mask: &GrayImage) -> u64 {
    mask.pixels().map(|p| u64::from(p.0[0] == EDGE)).sum()
}

/// Apply `pick` over every offset in `lo..=hi` on both axes.
///
/// Out-of-bounds samples are skipped, so the border never bleeds in.
fn window_extreme(mask: &GrayImage, lo: i64, hi: i64, pick: fn(u8, u8) -> u8) -> GrayImage {
    let (width, height) = mask.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let mut acc = mask.get_pixel(x, y).0[0];
        for dy in lo..=hi {
            for dx in lo..=hi {
                let Ok(nx) = u32::try_from(i64::from(x) + dx) else {
                    continue;
                };
                let Ok(ny) = u32::try_from(i64::from(y) + dy) else {
                    continue;
                };
                if nx < width && ny < height {
                    acc = pick(acc, mask.get_pixel(nx, ny).0[0]);
                }
            }
        }
        Luma([acc])
    })
}
