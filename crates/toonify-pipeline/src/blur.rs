//! Smoothing filters: Gaussian, median, and edge-preserving bilateral.
//!
//! [`gaussian_blur`] and [`median_blur`] wrap `imageproc` on a single
//! grayscale channel. [`bilateral_filter`] is generic over 8-bit pixel
//! types so the same code smooths the grayscale edge input and the
//! quantized color image.

use image::{GrayImage, ImageBuffer, Pixel};

/// Apply Gaussian blur to a grayscale image.
///
/// Non-positive sigma values (zero or negative) return the image
/// unchanged, since `imageproc`'s underlying function panics on
/// `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}

/// Sigma for a Gaussian kernel of `kernel_size` taps.
///
/// `0.3 * ((size - 1) * 0.5 - 1) + 0.8`, the usual choice when only a
/// kernel size is specified.
#[must_use]
pub fn sigma_for_kernel_size(kernel_size: u32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let size = kernel_size.max(1) as f32;
    0.3f32.mul_add((size - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Median-filter a grayscale image with a square `aperture`.
///
/// `aperture` is the full window side; even values behave like the next
/// odd size. An aperture of 1 or less returns the image unchanged.
#[must_use = "returns the filtered image"]
pub fn median_blur(image: &GrayImage, aperture: u32) -> GrayImage {
    let radius = aperture / 2;
    if radius == 0 {
        return image.clone();
    }
    imageproc::filter::median_filter(image, radius, radius)
}

/// Edge-preserving bilateral filter.
///
/// Each output pixel is the weighted mean of a circular neighborhood of
/// diameter `diameter`. A neighbor's weight is the product of a spatial
/// Gaussian (`sigma_space`, pixels) and a range Gaussian (`sigma_color`)
/// on the L1 color distance to the center pixel, so pixels across a
/// strong boundary contribute almost nothing and the boundary survives.
///
/// Non-positive sigmas are treated as 1. Out-of-bounds neighbors are
/// skipped rather than padded.
#[must_use = "returns the filtered image"]
pub fn bilateral_filter<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    diameter: u32,
    sigma_color: f32,
    sigma_space: f32,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let (width, height) = image.dimensions();
    let channels = usize::from(P::CHANNEL_COUNT);
    let sigma_color = if sigma_color > 0.0 { sigma_color } else { 1.0 };
    let sigma_space = if sigma_space > 0.0 { sigma_space } else { 1.0 };
    let radius = i64::from((diameter / 2).max(1));

    let window = spatial_window(radius, sigma_space);
    let color_weights = color_weight_table(channels, sigma_color);

    let raw = image.as_raw();
    let stride = width as usize * channels;
    let mut out = ImageBuffer::<P, Vec<u8>>::new(width, height);

    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let center_idx = y as usize * stride + x as usize * channels;
        let center = &raw[center_idx..center_idx + channels];

        let mut sums = [0.0f32; 4];
        let mut total = 0.0f32;
        for &(dx, dy, space_weight) in &window {
            let nx = i64::from(x) + dx;
            let ny = i64::from(y) + dy;
            if nx < 0 || ny < 0 || nx >= i64::from(width) || ny >= i64::from(height) {
                continue;
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let idx = ny as usize * stride + nx as usize * channels;
            let neighbor = &raw[idx..idx + channels];

            let distance: usize = center
                .iter()
                .zip(neighbor)
                .map(|(&a, &b)| usize::from(a.abs_diff(b)))
                .sum();
            let weight = space_weight * color_weights[distance];
            for (sum, &value) in sums.iter_mut().zip(neighbor) {
                *sum += weight * f32::from(value);
            }
            total += weight;
        }

        // The center pixel always contributes weight 1, so `total > 0`.
        for (dst, sum) in pixel.channels_mut().iter_mut().zip(sums) {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let value = (sum / total).round().clamp(0.0, 255.0) as u8;
            *dst = value;
        }
    }

    out
}

/// Offsets inside a disc of `radius` with their spatial weights.
fn spatial_window(radius: i64, sigma_space: f32) -> Vec<(i64, i64, f32)> {
    let coeff = -0.5 / (sigma_space * sigma_space);
    let mut window = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = dx * dx + dy * dy;
            if r2 > radius * radius {
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let weight = (r2 as f32 * coeff).exp();
            window.push((dx, dy, weight));
        }
    }
    window
}

/// Range weights indexed by L1 color distance (`0..=255 * channels`).
fn color_weight_table(channels: usize, sigma_color: f32) -> Vec<f32> {
    let coeff = -0.5 / (sigma_color * sigma_color);
    (0..=255 * channels)
        .map(|d| {
            #[allow(clippy::cast_precision_loss)]
            let d = d as f32;
            (d * d * coeff).exp()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    /// Create a test image with a sharp black-to-white boundary at x=5.
    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(10, 10, |x, _y| {
            if x < 5 {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        })
    }

    #[test]
    fn zero_sigma_returns_identical_image() {
        let img = sharp_edge_image();
        assert_eq!(gaussian_blur(&img, 0.0), img);
        assert_eq!(gaussian_blur(&img, -1.0), img);
    }

    #[test]
    fn gaussian_blur_smooths_sharp_edge() {
        let blurred = gaussian_blur(&sharp_edge_image(), 2.0);
        let left_of_edge = blurred.get_pixel(4, 5).0[0];
        let right_of_edge = blurred.get_pixel(5, 5).0[0];
        assert!(left_of_edge > 0, "got {left_of_edge}");
        assert!(right_of_edge < 255, "got {right_of_edge}");
    }

    #[test]
    fn sigma_for_kernel_size_matches_formula() {
        assert!((sigma_for_kernel_size(15) - 2.6).abs() < 1e-5);
        assert!((sigma_for_kernel_size(3) - 0.8).abs() < 1e-5);
    }

    #[test]
    fn median_removes_salt_noise() {
        let mut img = GrayImage::from_pixel(9, 9, image::Luma([40]));
        img.put_pixel(4, 4, image::Luma([255]));
        let filtered = median_blur(&img, 3);
        assert_eq!(filtered.get_pixel(4, 4).0[0], 40);
    }

    #[test]
    fn median_aperture_one_is_identity() {
        let img = sharp_edge_image();
        assert_eq!(median_blur(&img, 1), img);
    }

    #[test]
    fn median_preserves_dimensions() {
        let img = GrayImage::new(17, 31);
        assert_eq!(median_blur(&img, 7).dimensions(), (17, 31));
    }

    #[test]
    fn bilateral_keeps_uniform_image() {
        let img = RgbImage::from_pixel(12, 8, image::Rgb([100, 150, 200]));
        let filtered = bilateral_filter(&img, 9, 70.0, 35.0);
        assert_eq!(filtered, img);
    }

    #[test]
    fn bilateral_preserves_strong_boundary() {
        let img = sharp_edge_image();
        let filtered = bilateral_filter(&img, 5, 50.0, 50.0);
        // A 255-level step is far outside sigma_color, so the boundary
        // pixels stay close to their original values.
        assert!(filtered.get_pixel(4, 5).0[0] < 5);
        assert!(filtered.get_pixel(5, 5).0[0] > 250);
    }

    #[test]
    fn bilateral_smooths_small_noise() {
        let img = GrayImage::from_fn(10, 10, |x, y| {
            if (x + y) % 2 == 0 {
                image::Luma([100])
            } else {
                image::Luma([110])
            }
        });
        let filtered = bilateral_filter(&img, 5, 50.0, 50.0);
        let center = filtered.get_pixel(5, 5).0[0];
        assert!((102..=108).contains(&center), "expected smoothing, got {center}");
    }

    #[test]
    fn bilateral_preserves_dimensions_and_channels() {
        let img = RgbImage::new(7, 3);
        let filtered = bilateral_filter(&img, 9, 10.0, 10.0);
        assert_eq!(filtered.dimensions(), (7, 3));
    }
}
