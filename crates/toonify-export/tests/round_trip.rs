//! Integration test: render every style and encode the result.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use toonify_export::{OutputFormat, encode_gray, encode_rgb};
use toonify_pipeline::{Style, StyleParameters};

/// Synthetic photo-like input: a gradient sky over two colored blocks.
fn scene_png() -> Vec<u8> {
    let img = image::RgbImage::from_fn(48, 32, |x, y| {
        if y < 12 {
            let v = u8::try_from(120 + y * 8).unwrap();
            image::Rgb([v / 2, v / 2 + 20, v])
        } else if x < 24 {
            image::Rgb([170, 60, 40])
        } else {
            image::Rgb([40, 120, 60])
        }
    });
    let mut buf = Vec::new();
    image::ImageEncoder::write_image(
        image::codecs::png::PngEncoder::new(&mut buf),
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgb8,
    )
    .unwrap();
    buf
}

#[test]
fn every_style_encodes_to_png_and_jpeg() {
    let input = scene_png();
    for style in Style::ALL {
        let params = StyleParameters {
            style,
            seed: Some(1234),
            ..StyleParameters::default()
        };
        let output = toonify_pipeline::process(&input, &params).expect("pipeline should succeed");

        for format in [OutputFormat::Png, OutputFormat::Jpeg { quality: 85 }] {
            let bytes = encode_rgb(&output, format).unwrap();
            let back = image::load_from_memory(&bytes).unwrap();
            assert_eq!(
                (back.width(), back.height()),
                (48, 32),
                "{style} as {format}"
            );
        }

        let png = encode_rgb(&output, OutputFormat::Png).unwrap();
        assert_eq!(image::load_from_memory(&png).unwrap().to_rgb8(), output);
    }
}

#[test]
fn edge_mask_exports_as_grayscale() {
    let params = StyleParameters {
        seed: Some(7),
        ..StyleParameters::default()
    };
    let staged = toonify_pipeline::process_staged(&scene_png(), &params).unwrap();
    let mask = staged.edges.expect("comic keeps its edge mask");
    let bytes = encode_gray(&mask, OutputFormat::Png).unwrap();
    let back = image::load_from_memory(&bytes).unwrap();
    assert_eq!(back.color(), image::ColorType::L8);
    assert_eq!(back.to_luma8(), mask);
}
