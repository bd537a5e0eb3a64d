//! Parameter normalization and derived algorithm constants.
//!
//! Raw parameters arrive as loosely typed string pairs (HTML form
//! fields, CLI flags). [`StyleParameters::from_raw`] turns them into a
//! validated [`StyleParameters`] without ever failing: missing or
//! malformed values take their defaults and numeric values are clamped
//! into range.
//!
//! [`DerivedConstants`] maps the user-facing knobs onto the values the
//! filters actually consume. They are recomputed on every call.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::types::{Style, StyleParameters};

/// Raw key for [`StyleParameters::edge_strength`].
pub const KEY_EDGE_STRENGTH: &str = "edgeStrength";
/// Raw key for [`StyleParameters::color_simplification`].
pub const KEY_COLOR_SIMPLIFICATION: &str = "colorSimplification";
/// Raw key for [`StyleParameters::smoothing_level`].
pub const KEY_SMOOTHING_LEVEL: &str = "smoothingLevel";
/// Raw key for [`StyleParameters::style`].
pub const KEY_STYLE: &str = "style";
/// Raw key for [`StyleParameters::line_thickness`].
pub const KEY_LINE_THICKNESS: &str = "lineThickness";
/// Raw key for [`StyleParameters::saturation_boost`].
pub const KEY_SATURATION: &str = "saturation";
/// Raw key for [`StyleParameters::bold_edges`].
pub const KEY_BOLD_EDGES: &str = "boldEdges";
/// Raw key for [`StyleParameters::seed`].
pub const KEY_SEED: &str = "seed";

impl StyleParameters {
    /// Build parameters from raw string key/value pairs.
    ///
    /// Keys are matched exactly; unknown keys are ignored. When a key
    /// appears more than once the last occurrence wins. The result is
    /// already [normalized](Self::normalized).
    #[must_use]
    pub fn from_raw<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let value = value.as_ref().trim();
            match key.as_ref() {
                KEY_EDGE_STRENGTH => {
                    set_clamped(&mut params.edge_strength, value, &Self::EDGE_STRENGTH_RANGE);
                }
                KEY_COLOR_SIMPLIFICATION => set_clamped(
                    &mut params.color_simplification,
                    value,
                    &Self::COLOR_SIMPLIFICATION_RANGE,
                ),
                KEY_SMOOTHING_LEVEL => set_clamped(
                    &mut params.smoothing_level,
                    value,
                    &Self::SMOOTHING_LEVEL_RANGE,
                ),
                KEY_STYLE => params.style = Style::from_name(value),
                KEY_LINE_THICKNESS => set_clamped(
                    &mut params.line_thickness,
                    value,
                    &Self::LINE_THICKNESS_RANGE,
                ),
                KEY_SATURATION => set_clamped(
                    &mut params.saturation_boost,
                    value,
                    &Self::SATURATION_BOOST_RANGE,
                ),
                KEY_BOLD_EDGES => {
                    if let Some(flag) = parse_bool(value) {
                        params.bold_edges = flag;
                    }
                }
                KEY_SEED => {
                    if let Ok(seed) = value.parse::<u64>() {
                        params.seed = Some(seed);
                    }
                }
                _ => {}
            }
        }
        params.normalized()
    }

    /// Return a copy with every numeric field clamped into its range.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            edge_strength: clamp_to(self.edge_strength, &Self::EDGE_STRENGTH_RANGE),
            color_simplification: clamp_to(
                self.color_simplification,
                &Self::COLOR_SIMPLIFICATION_RANGE,
            ),
            smoothing_level: clamp_to(self.smoothing_level, &Self::SMOOTHING_LEVEL_RANGE),
            line_thickness: clamp_to(self.line_thickness, &Self::LINE_THICKNESS_RANGE),
            saturation_boost: clamp_to(self.saturation_boost, &Self::SATURATION_BOOST_RANGE),
            ..self.clone()
        }
    }
}

fn clamp_to(value: u32, range: &RangeInclusive<u32>) -> u32 {
    value.clamp(*range.start(), *range.end())
}

/// A loosely typed configuration value: whatever a JSON document put in
/// a parameter slot.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
    Other(#[allow(dead_code)] serde::de::IgnoredAny),
}

impl RawValue {
    /// String form fed to [`StyleParameters::from_raw`]. Arrays, maps,
    /// and other shapes have none and leave the default in place.
    fn into_text(self) -> Option<String> {
        match self {
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Uint(u) => Some(u.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Text(s) => Some(s),
            Self::Other(_) => None,
        }
    }
}

/// Deserialization shape of [`StyleParameters`].
///
/// Every slot accepts any JSON value. Conversion routes the values
/// through [`StyleParameters::from_raw`], so structured configuration
/// gets the same leniency as form fields: unknown styles become comic,
/// numbers (signed, fractional, or quoted) are clamped, and anything
/// unparsable keeps its default.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RawStyleParameters {
    edge_strength: Option<RawValue>,
    color_simplification: Option<RawValue>,
    smoothing_level: Option<RawValue>,
    style: Option<RawValue>,
    line_thickness: Option<RawValue>,
    saturation: Option<RawValue>,
    bold_edges: Option<RawValue>,
    seed: Option<RawValue>,
}

impl From<RawStyleParameters> for StyleParameters {
    fn from(raw: RawStyleParameters) -> Self {
        let slots = [
            (KEY_EDGE_STRENGTH, raw.edge_strength),
            (KEY_COLOR_SIMPLIFICATION, raw.color_simplification),
            (KEY_SMOOTHING_LEVEL, raw.smoothing_level),
            (KEY_STYLE, raw.style),
            (KEY_LINE_THICKNESS, raw.line_thickness),
            (KEY_SATURATION, raw.saturation),
            (KEY_BOLD_EDGES, raw.bold_edges),
            (KEY_SEED, raw.seed),
        ];
        Self::from_raw(slots.into_iter().filter_map(|(key, value)| {
            value.and_then(RawValue::into_text).map(|text| (key, text))
        }))
    }
}

/// Overwrite `field` with the clamped integer in `value`, if it parses.
fn set_clamped(field: &mut u32, value: &str, range: &RangeInclusive<u32>) {
    if let Some(parsed) = parse_int(value) {
        let clamped = parsed.clamp(i64::from(*range.start()), i64::from(*range.end()));
        // The clamp above keeps the value inside the u32 range.
        *field = u32::try_from(clamped).unwrap_or(*range.start());
    }
}

/// Parse an integer, accepting finite decimals truncated toward zero.
fn parse_int(value: &str) -> Option<i64> {
    if let Ok(int) = value.parse::<i64>() {
        return Some(int);
    }
    let float = value.parse::<f64>().ok().filter(|f| f.is_finite())?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    let truncated = float.trunc().clamp(i64::MIN as f64, i64::MAX as f64) as i64;
    Some(truncated)
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Algorithm constants derived from normalized [`StyleParameters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedConstants {
    /// Adaptive threshold neighborhood size, odd, 3-19.
    pub line_size: u32,
    /// Blur strength, 3-19.
    pub blur_value: u32,
    /// Edge threshold, 1-100. Inverse of edge strength.
    pub edge_threshold: u32,
    /// Palette size, 2-32.
    pub palette_size: u32,
}

impl DerivedConstants {
    /// Derive constants from parameters, normalizing them first.
    #[must_use]
    pub fn from_params(params: &StyleParameters) -> Self {
        let params = params.normalized();
        Self {
            line_size: (params.smoothing_level * 2 + 3).clamp(3, 19),
            blur_value: params.smoothing_level.clamp(3, 19),
            edge_threshold: 101_u32.saturating_sub(params.edge_strength).clamp(1, 100),
            palette_size: params.color_simplification,
        }
    }

    /// Odd median aperture for the comic edge mask.
    #[must_use]
    pub const fn median_aperture(&self) -> u32 {
        odd_aperture(self.blur_value)
    }

    /// Odd median aperture for the anime line art: `max(3, blur - 2)`.
    #[must_use]
    pub const fn anime_median_aperture(&self) -> u32 {
        let size = self.blur_value.saturating_sub(2);
        odd_aperture(if size < 3 { 3 } else { size })
    }

    /// Adaptive threshold offset `C = edge_threshold / 10`.
    #[must_use]
    pub fn threshold_offset(&self) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let threshold = self.edge_threshold as f32;
        threshold / 10.0
    }

    /// Low and high hysteresis thresholds for the anime line art.
    #[must_use]
    pub fn line_art_thresholds(&self) -> (f32, f32) {
        #[allow(clippy::cast_precision_loss)]
        let low = self.edge_threshold as f32;
        (low, low * 3.0)
    }

    /// Gaussian kernel size for the pencil sketch: `blur * 2 + 1`.
    #[must_use]
    pub const fn sketch_kernel_size(&self) -> u32 {
        self.blur_value * 2 + 1
    }
}

/// Round an even aperture up to the next odd size.
const fn odd_aperture(size: u32) -> u32 {
    if size % 2 == 0 { size + 1 } else { size }
}

/// Palette size after dividing by a style-specific divisor, minimum 2.
#[must_use]
pub fn effective_palette_size(palette_size: u32, divisor: f32) -> u32 {
    if divisor <= 0.0 {
        return palette_size.max(2);
    }
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let divided = (palette_size as f32 / divisor).floor() as u32;
    divided.max(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> StyleParameters {
        StyleParameters::from_raw(pairs.iter().copied())
    }

    #[test]
    fn empty_input_yields_defaults() {
        assert_eq!(raw(&[]), StyleParameters::default());
    }

    #[test]
    fn recognized_keys_are_applied() {
        let params = raw(&[
            ("edgeStrength", "80"),
            ("colorSimplification", "12"),
            ("smoothingLevel", "4"),
            ("style", "anime"),
            ("lineThickness", "9"),
            ("saturation", "130"),
            ("boldEdges", "false"),
            ("seed", "42"),
        ]);
        assert_eq!(params.edge_strength, 80);
        assert_eq!(params.color_simplification, 12);
        assert_eq!(params.smoothing_level, 4);
        assert_eq!(params.style, Style::Anime);
        assert_eq!(params.line_thickness, 9);
        assert_eq!(params.saturation_boost, 130);
        assert!(!params.bold_edges);
        assert_eq!(params.seed, Some(42));
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        assert_eq!(raw(&[("colorSimplification", "0")]).color_simplification, 2);
        assert_eq!(
            raw(&[("colorSimplification", "1000")]).color_simplification,
            32
        );
        assert_eq!(raw(&[("edgeStrength", "-5")]).edge_strength, 1);
        assert_eq!(raw(&[("saturation", "10")]).saturation_boost, 50);
        assert_eq!(raw(&[("saturation", "999999999999")]).saturation_boost, 150);
        assert_eq!(raw(&[("lineThickness", "11")]).line_thickness, 10);
        assert_eq!(raw(&[("smoothingLevel", "0")]).smoothing_level, 1);
    }

    #[test]
    fn malformed_values_keep_defaults() {
        let params = raw(&[
            ("edgeStrength", "strong"),
            ("colorSimplification", ""),
            ("smoothingLevel", "NaN"),
            ("boldEdges", "maybe"),
            ("seed", "-1"),
        ]);
        assert_eq!(params, StyleParameters::default());
    }

    #[test]
    fn decimal_values_truncate() {
        assert_eq!(raw(&[("edgeStrength", "42.9")]).edge_strength, 42);
        assert_eq!(raw(&[("smoothingLevel", " 7.0 ")]).smoothing_level, 7);
    }

    #[test]
    fn unknown_style_and_keys_are_ignored() {
        let params = raw(&[("style", "sketch"), ("vignette", "true")]);
        assert_eq!(params.style, Style::Comic);
        assert_eq!(params, StyleParameters::default());
    }

    #[test]
    fn bold_edges_is_case_insensitive() {
        assert!(!raw(&[("boldEdges", "FALSE")]).bold_edges);
        assert!(raw(&[("boldEdges", "True")]).bold_edges);
    }

    #[test]
    fn keys_are_case_sensitive() {
        assert_eq!(
            raw(&[("EdgeStrength", "90")]).edge_strength,
            StyleParameters::DEFAULT_EDGE_STRENGTH
        );
    }

    #[test]
    fn normalized_clamps_hand_built_values() {
        let params = StyleParameters {
            edge_strength: 0,
            color_simplification: 1000,
            smoothing_level: 50,
            line_thickness: 0,
            saturation_boost: 0,
            ..StyleParameters::default()
        }
        .normalized();
        assert_eq!(params.edge_strength, 1);
        assert_eq!(params.color_simplification, 32);
        assert_eq!(params.smoothing_level, 20);
        assert_eq!(params.line_thickness, 1);
        assert_eq!(params.saturation_boost, 50);
    }

    #[test]
    fn derived_constants_for_defaults() {
        let derived = DerivedConstants::from_params(&StyleParameters::default());
        assert_eq!(derived.line_size, 17);
        assert_eq!(derived.blur_value, 7);
        assert_eq!(derived.edge_threshold, 51);
        assert_eq!(derived.palette_size, 8);
    }

    #[test]
    fn derived_constants_stay_in_range() {
        for smoothing in 0..=25 {
            for edge in [0, 1, 50, 100, 200] {
                let derived = DerivedConstants::from_params(&StyleParameters {
                    smoothing_level: smoothing,
                    edge_strength: edge,
                    ..StyleParameters::default()
                });
                assert!((3..=19).contains(&derived.line_size));
                assert_eq!(derived.line_size % 2, 1, "line size must be odd");
                assert!((3..=19).contains(&derived.blur_value));
                assert!((1..=100).contains(&derived.edge_threshold));
                assert_eq!(derived.median_aperture() % 2, 1);
                assert_eq!(derived.anime_median_aperture() % 2, 1);
            }
        }
    }

    #[test]
    fn edge_threshold_is_inverse_of_strength() {
        let weak = DerivedConstants::from_params(&StyleParameters {
            edge_strength: 1,
            ..StyleParameters::default()
        });
        let strong = DerivedConstants::from_params(&StyleParameters {
            edge_strength: 100,
            ..StyleParameters::default()
        });
        assert_eq!(weak.edge_threshold, 100);
        assert_eq!(strong.edge_threshold, 1);
    }

    #[test]
    fn even_blur_rounds_up_to_odd_aperture() {
        let derived = DerivedConstants::from_params(&StyleParameters {
            smoothing_level: 8,
            ..StyleParameters::default()
        });
        assert_eq!(derived.blur_value, 8);
        assert_eq!(derived.median_aperture(), 9);
        assert_eq!(derived.anime_median_aperture(), 7);
    }

    #[test]
    fn anime_aperture_has_floor_of_three() {
        let derived = DerivedConstants::from_params(&StyleParameters {
            smoothing_level: 1,
            ..StyleParameters::default()
        });
        assert_eq!(derived.blur_value, 3);
        assert_eq!(derived.anime_median_aperture(), 3);
    }

    #[test]
    fn thresholds_and_kernel_sizes() {
        let derived = DerivedConstants::from_params(&StyleParameters::default());
        assert!((derived.threshold_offset() - 5.1).abs() < 1e-5);
        assert_eq!(derived.line_art_thresholds(), (51.0, 153.0));
        assert_eq!(derived.sketch_kernel_size(), 15);
    }

    #[test]
    fn effective_palette_size_divides_with_floor_of_two() {
        assert_eq!(effective_palette_size(8, 1.0), 8);
        assert_eq!(effective_palette_size(8, 1.5), 5);
        assert_eq!(effective_palette_size(2, 1.5), 2);
        assert_eq!(effective_palette_size(3, 1.5), 2);
        assert_eq!(effective_palette_size(32, 1.5), 21);
    }
}
