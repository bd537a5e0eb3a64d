//! HSV conversion and saturation adjustment.
//!
//! Hue is in degrees `[0, 360)`; saturation and value are in `[0, 1]`.
//! Channels are handled as `f32` and only rounded back to `u8` at the
//! end of a pixel, so a factor of 1.0 is lossless.

use image::RgbImage;

/// A color in hue-saturation-value space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    /// Hue in degrees, `[0, 360)`. Zero for achromatic colors.
    pub h: f32,
    /// Saturation, `[0, 1]`.
    pub s: f32,
    /// Value (brightness), `[0, 1]`.
    pub v: f32,
}

/// Convert an 8-bit RGB triple to HSV.
#[must_use]
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> Hsv {
    let r = f32::from(r) / 255.0;
    let g = f32::from(g) / 255.0;
    let b = f32::from(b) / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max > 0.0 { delta / max } else { 0.0 };

    let h = if delta <= 0.0 {
        0.0
    } else if (max - r).abs() < f32::EPSILON {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if (max - g).abs() < f32::EPSILON {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    Hsv { h, s, v: max }
}

/// Convert HSV back to an 8-bit RGB triple, rounding each channel.
#[must_use]
pub fn hsv_to_rgb(hsv: Hsv) -> [u8; 3] {
    let h = hsv.h.rem_euclid(360.0);
    let s = hsv.s.clamp(0.0, 1.0);
    let v = hsv.v.clamp(0.0, 1.0);

    let c = v * s;
    let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    [to_channel(r + m), to_channel(g + m), to_channel(b + m)]
}

fn to_channel(unit: f32) -> u8 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let value = (unit * 255.0).round().clamp(0.0, 255.0) as u8;
    value
}

/// Scale the saturation of every pixel by `factor`, clamped to `[0, 1]`.
///
/// Hue and value are unchanged, so grays (zero saturation) stay gray and
/// black stays black.
#[must_use = "returns the adjusted image"]
pub fn boost_saturation(image: &RgbImage, factor: f32) -> RgbImage {
    if (factor - 1.0).abs() < f32::EPSILON {
        return image.clone();
    }

    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let mut hsv = rgb_to_hsv(pixel.0);
        hsv.s = (hsv.s * factor).clamp(0.0, 1.0);
        pixel.0 = hsv_to_rgb(hsv);
    }
    out
}

/// Mean HSV saturation of an image, `[0, 1]`. Zero for an empty image.
#[must_use]
pub fn mean_saturation(image: &RgbImage) -> f32 {
    let count = image.pixels().len();
    if count == 0 {
        return 0.0;
    }
    let total: f64 = image
        .pixels()
        .map(|p| f64::from(rgb_to_hsv(p.0).s))
        .sum();
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let mean = (total / count as f64) as f32;
    mean
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primaries_have_expected_hue() {
        assert!((rgb_to_hsv([255, 0, 0]).h - 0.0).abs() < 1e-3);
        assert!((rgb_to_hsv([0, 255, 0]).h - 120.0).abs() < 1e-3);
        assert!((rgb_to_hsv([0, 0, 255]).h - 240.0).abs() < 1e-3);
        assert!((rgb_to_hsv([255, 0, 255]).h - 300.0).abs() < 1e-3);
    }

    #[test]
    fn gray_has_zero_saturation() {
        let hsv = rgb_to_hsv([128, 128, 128]);
        assert!(hsv.s.abs() < f32::EPSILON);
        assert!((hsv.v - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn black_is_safe() {
        let hsv = rgb_to_hsv([0, 0, 0]);
        assert!(hsv.s.abs() < f32::EPSILON);
        assert_eq!(hsv_to_rgb(hsv), [0, 0, 0]);
    }

    #[test]
    fn conversion_is_lossless_on_u8_grid() {
        for rgb in [[12, 200, 77], [255, 128, 0], [3, 3, 250], [90, 45, 45]] {
            assert_eq!(hsv_to_rgb(rgb_to_hsv(rgb)), rgb);
        }
    }

    #[test]
    fn boost_increases_saturation() {
        let img = RgbImage::from_pixel(2, 2, image::Rgb([200, 120, 120]));
        let boosted = boost_saturation(&img, 1.5);
        assert!(mean_saturation(&boosted) > mean_saturation(&img));
        // Value (max channel) is preserved.
        assert_eq!(boosted.get_pixel(0, 0).0[0], 200);
    }

    #[test]
    fn boost_clamps_at_full_saturation() {
        let img = RgbImage::from_pixel(1, 1, image::Rgb([200, 20, 20]));
        let boosted = boost_saturation(&img, 10.0);
        assert_eq!(boosted.get_pixel(0, 0).0, [200, 0, 0]);
    }

    #[test]
    fn reduce_moves_toward_gray() {
        let img = RgbImage::from_pixel(1, 1, image::Rgb([200, 100, 100]));
        let reduced = boost_saturation(&img, 0.5);
        assert_eq!(reduced.get_pixel(0, 0).0, [200, 150, 150]);
    }

    #[test]
    fn grays_are_unchanged_by_boost() {
        let img = RgbImage::from_pixel(3, 3, image::Rgb([90, 90, 90]));
        assert_eq!(boost_saturation(&img, 1.4), img);
    }

    #[test]
    fn unit_factor_is_identity() {
        let img = RgbImage::from_fn(4, 4, |x, y| {
            image::Rgb([(x * 60) as u8, (y * 60) as u8, 17])
        });
        assert_eq!(boost_saturation(&img, 1.0), img);
    }

    #[test]
    fn mean_saturation_of_empty_is_zero() {
        assert!(mean_saturation(&RgbImage::new(0, 0)).abs() < f32::EPSILON);
    }
}
