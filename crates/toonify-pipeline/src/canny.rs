//! Gradient edge detection with hysteresis.
//!
//! Sobel gradients, L1 magnitude, non-maximum suppression along the
//! quantized gradient direction, then 8-connected hysteresis. Unlike
//! `imageproc::edges::canny` there is no built-in Gaussian pre-blur: the
//! caller chooses its own smoothing, and the hysteresis walk is
//! bounds-checked on every side so edges touching the border are safe.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel;

/// Output value for an edge pixel.
pub const EDGE_ON: u8 = 255;

/// Output value for a non-edge pixel.
pub const EDGE_OFF: u8 = 0;

/// Detect edges, returning [`EDGE_ON`] on edge pixels and [`EDGE_OFF`]
/// elsewhere.
///
/// Pixels whose suppressed gradient magnitude exceeds `high_threshold`
/// seed edges; pixels above `low_threshold` join an edge when they are
/// 8-connected to a seed. Swapped thresholds are reordered.
///
/// Images narrower or shorter than 3 pixels have no interior and come
/// back empty.
#[must_use = "returns the edge map"]
pub fn detect_edges(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let (low, high) = if low_threshold <= high_threshold {
        (low_threshold, high_threshold)
    } else {
        (high_threshold, low_threshold)
    };

    let (width, height) = image.dimensions();
    if width < 3 || height < 3 {
        return GrayImage::new(width, height);
    }

    let gx: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_VERTICAL_3X3);

    let magnitude: Vec<f32> = gx
        .iter()
        .zip(gy.iter())
        .map(|(&h, &v)| f32::from(h.unsigned_abs()) + f32::from(v.unsigned_abs()))
        .collect();

    let thinned = non_maximum_suppression(&magnitude, &gx, &gy, width, height);
    hysteresis(&thinned, width, height, low, high)
}

/// Quantized gradient direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Horizontal,
    Diagonal,
    Vertical,
    AntiDiagonal,
}

impl Direction {
    fn of(x_gradient: f32, y_gradient: f32) -> Self {
        let mut angle = y_gradient.atan2(x_gradient).to_degrees();
        if angle < 0.0 {
            angle += 180.0;
        }
        if !(22.5..157.5).contains(&angle) {
            Self::Horizontal
        } else if angle < 67.5 {
            Self::Diagonal
        } else if angle < 112.5 {
            Self::Vertical
        } else {
            Self::AntiDiagonal
        }
    }

    /// Offsets of the two neighbors across the edge.
    const fn neighbors(self) -> [(i64, i64); 2] {
        match self {
            Self::Horizontal => [(-1, 0), (1, 0)],
            Self::Diagonal => [(1, 1), (-1, -1)],
            Self::Vertical => [(0, -1), (0, 1)],
            Self::AntiDiagonal => [(-1, 1), (1, -1)],
        }
    }
}

/// Zero every magnitude that is not a local maximum across the edge.
///
/// Border pixels are always zeroed.
fn non_maximum_suppression(
    magnitude: &[f32],
    gx: &Image<Luma<i16>>,
    gy: &Image<Luma<i16>>,
    width: u32,
    height: u32,
) -> Vec<f32> {
    let w = width as usize;
    let mut out = vec![0.0f32; magnitude.len()];

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let idx = y as usize * w + x as usize;
            let value = magnitude[idx];
            if value == 0.0 {
                continue;
            }
            let direction = Direction::of(
                f32::from(gx.get_pixel(x, y).0[0]),
                f32::from(gy.get_pixel(x, y).0[0]),
            );
            let is_max = direction.neighbors().iter().all(|&(dx, dy)| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let n = (i64::from(y) + dy) as usize * w + (i64::from(x) + dx) as usize;
                value >= magnitude[n]
            });
            if is_max {
                out[idx] = value;
            }
        }
    }
    out
}

/// Keep strong pixels and every weak pixel connected to one.
fn hysteresis(thinned: &[f32], width: u32, height: u32, low: f32, high: f32) -> GrayImage {
    let mut out = GrayImage::from_pixel(width, height, Luma([EDGE_OFF]));
    let mut stack: Vec<(u32, u32)> = Vec::new();
    let w = width as usize;

    for y in 0..height {
        for x in 0..width {
            let idx = y as usize * w + x as usize;
            if thinned[idx] < high || out.get_pixel(x, y).0[0] == EDGE_ON {
                continue;
            }
            out.put_pixel(x, y, Luma([EDGE_ON]));
            stack.push((x, y));

            while let Some((cx, cy)) = stack.pop() {
                for (nx, ny) in neighbors8(cx, cy, width, height) {
                    let n = ny as usize * w + nx as usize;
                    if thinned[n] >= low && out.get_pixel(nx, ny).0[0] != EDGE_ON {
                        out.put_pixel(nx, ny, Luma([EDGE_ON]));
                        stack.push((nx, ny));
                    }
                }
            }
        }
    }
    out
}

/// In-bounds 8-connected neighbors of `(x, y)`.
fn neighbors8(x: u32, y: u32, width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    const OFFSETS: [(i64, i64); 8] = [
        (-1, -1),
        (0, -1),
        (1, -1),
        (-1, 0),
        (1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
    ];
    OFFSETS.into_iter().filter_map(move |(dx, dy)| {
        let nx = u32::try_from(i64::from(x) + dx).ok()?;
        let ny = u32::try_from(i64::from(y) + dy).ok()?;
        (nx < width && ny < height).then_some((nx, ny))
    })
}
