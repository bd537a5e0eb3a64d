//! Pixel-wise image combinators used by the style compositors.

use image::{GrayImage, Luma, RgbImage};

use crate::types::{EDGE, PipelineError};

fn check_same_size(a: (u32, u32), b: (u32, u32), what: &str) -> Result<(), PipelineError> {
    if a == b {
        Ok(())
    } else {
        Err(PipelineError::Processing(format!(
            "{what}: size mismatch {}x{} vs {}x{}",
            a.0, a.1, b.0, b.1
        )))
    }
}

/// Gate `color` by `mask`.
///
/// Where the mask is [`BACKGROUND`](crate::types::BACKGROUND) the color
/// passes through; where it is [`EDGE`] the pixel becomes black.
/// Intermediate mask values count as background.
///
/// # Errors
///
/// Returns [`PipelineError::Processing`] if the sizes differ.
pub fn apply_mask(color: &RgbImage, mask: &GrayImage) -> Result<RgbImage, PipelineError> {
    check_same_size(color.dimensions(), mask.dimensions(), "apply_mask")?;
    let mut out = color.clone();
    for (pixel, m) in out.pixels_mut().zip(mask.pixels()) {
        if m.0[0] == EDGE {
            pixel.0 = [0, 0, 0];
        }
    }
    Ok(out)
}

/// Weighted sum `a * weight_a + b * weight_b`, rounded and saturated.
///
/// # Errors
///
/// Returns [`PipelineError::Processing`] if the sizes differ.
pub fn add_weighted(
    a: &RgbImage,
    weight_a: f32,
    b: &RgbImage,
    weight_b: f32,
) -> Result<RgbImage, PipelineError> {
    check_same_size(a.dimensions(), b.dimensions(), "add_weighted")?;
    let mut out = a.clone();
    for (dst, src) in out.iter_mut().zip(b.iter()) {
        let mixed = f32::from(*dst).mul_add(weight_a, f32::from(*src) * weight_b);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let value = mixed.round().clamp(0.0, 255.0) as u8;
        *dst = value;
    }
    Ok(out)
}

/// Color-dodge `base` by `blend`: `base * 256 / (255 - blend)`.
///
/// Results saturate at 255; a fully white blend pixel (zero divisor)
/// yields 0.
///
/// # Errors
///
/// Returns [`PipelineError::Processing`] if the sizes differ.
pub fn color_dodge(base: &GrayImage, blend: &GrayImage) -> Result<GrayImage, PipelineError> {
    check_same_size(base.dimensions(), blend.dimensions(), "color_dodge")?;
    Ok(GrayImage::from_fn(base.width(), base.height(), |x, y| {
        let b = f32::from(base.get_pixel(x, y).0[0]);
        let divisor = 255 - blend.get_pixel(x, y).0[0];
        if divisor == 0 {
            return Luma([0]);
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let value = (b * 256.0 / f32::from(divisor)).round().min(255.0) as u8;
        Luma([value])
    }))
}

/// Invert every level of a grayscale image.
#[must_use = "returns the inverted image"]
pub fn invert(image: &GrayImage) -> GrayImage {
    let mut out = image.clone();
    image::imageops::invert(&mut out);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::BACKGROUND;

    #[test]
    fn mask_blacks_out_edges() {
        let color = RgbImage::from_pixel(2, 1, image::Rgb([10, 20, 30]));
        let mask = GrayImage::from_raw(2, 1, vec![EDGE, BACKGROUND]).unwrap();
        let out = apply_mask(&color, &mask).unwrap();
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(out.get_pixel(1, 0).0, [10, 20, 30]);
    }

    #[test]
    fn mask_size_mismatch_is_error() {
        let color = RgbImage::new(3, 3);
        let mask = GrayImage::new(3, 2);
        assert!(matches!(
            apply_mask(&color, &mask),
            Err(PipelineError::Processing(_))
        ));
    }

    #[test]
    fn add_weighted_mixes() {
        let a = RgbImage::from_pixel(1, 1, image::Rgb([100, 200, 0]));
        let b = RgbImage::from_pixel(1, 1, image::Rgb([255, 255, 255]));
        let out = add_weighted(&a, 0.7, &b, 0.3).unwrap();
        // 70 + 76.5 = 146.5, 140 + 76.5 = 216.5, 0 + 76.5 = 76.5
        assert_eq!(out.get_pixel(0, 0).0, [147, 217, 77]);
    }

    #[test]
    fn add_weighted_saturates() {
        let a = RgbImage::from_pixel(1, 1, image::Rgb([250, 250, 250]));
        let out = add_weighted(&a, 1.0, &a, 1.0).unwrap();
        assert_eq!(out.get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn dodge_formula() {
        let base = GrayImage::from_raw(3, 1, vec![100, 100, 200]).unwrap();
        let blend = GrayImage::from_raw(3, 1, vec![155, 255, 100]).unwrap();
        let out = color_dodge(&base, &blend).unwrap();
        assert_eq!(out.get_pixel(0, 0).0[0], 255); // 100*256/100 = 256 -> 255
        assert_eq!(out.get_pixel(1, 0).0[0], 0); // zero divisor
        assert_eq!(out.get_pixel(2, 0).0[0], 255); // 200*256/155 = 330 -> 255
    }

    #[test]
    fn dodge_with_black_blend_is_near_identity() {
        let base = GrayImage::from_raw(2, 1, vec![51, 0]).unwrap();
        let blend = GrayImage::new(2, 1);
        let out = color_dodge(&base, &blend).unwrap();
        // 51 * 256 / 255 = 51.2
        assert_eq!(out.get_pixel(0, 0).0[0], 51);
        assert_eq!(out.get_pixel(1, 0).0[0], 0);
    }

    #[test]
    fn invert_flips_levels() {
        let img = GrayImage::from_raw(2, 1, vec![0, 200]).unwrap();
        assert_eq!(invert(&img).as_raw(), &vec![255, 55]);
    }
}
