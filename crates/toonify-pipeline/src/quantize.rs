//! K-means color quantization.
//!
//! Pixels are deduplicated into a weighted color histogram first, so each
//! Lloyd iteration scales with the number of distinct colors rather than
//! the number of pixels. Clustering on the weighted histogram is
//! equivalent to clustering every pixel.
//!
//! Centers are seeded with k-means++ from a caller-supplied RNG; the same
//! RNG state always yields the same palette.

use image::RgbImage;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

/// Largest palette the quantizer will produce.
pub const MAX_CLUSTERS: u32 = 256;

/// Tuning for the k-means quantizer.
///
/// # Examples
/// ```
/// # use toonify_pipeline::quantize::KmeansOptions;
/// let options = KmeansOptions::new().attempts(5).max_iterations(10);
/// assert_eq!(options.attempts, 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KmeansOptions {
    /// Independent clusterings to run; the most compact one wins.
    pub attempts: u32,
    /// Upper bound on Lloyd iterations per attempt.
    pub max_iterations: u32,
    /// Stop once an iteration improves compactness by less than this.
    pub epsilon: f64,
}

impl KmeansOptions {
    /// Default number of attempts.
    pub const DEFAULT_ATTEMPTS: u32 = 3;
    /// Default iteration cap.
    pub const DEFAULT_MAX_ITERATIONS: u32 = 20;
    /// Default convergence threshold.
    pub const DEFAULT_EPSILON: f64 = 1e-3;

    /// Creates options with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attempts: Self::DEFAULT_ATTEMPTS,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            epsilon: Self::DEFAULT_EPSILON,
        }
    }

    /// Sets the number of attempts. Zero is treated as one.
    #[must_use]
    pub const fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Sets the iteration cap.
    #[must_use]
    pub const fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the convergence threshold.
    #[must_use]
    pub const fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }
}

impl Default for KmeansOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Output of [`quantize`].
#[derive(Debug, Clone)]
pub struct Quantized {
    /// Every pixel replaced by its cluster center.
    pub image: RgbImage,
    /// Cluster centers, rounded to 8 bits.
    pub centers: Vec<[u8; 3]>,
    /// Lloyd iterations run by the winning attempt.
    pub iterations: u32,
    /// Sum of squared distances from pixels to their centers.
    pub compactness: f64,
}

/// Reduce `image` to at most `k` colors.
///
/// `k` is clamped to `1..=MAX_CLUSTERS` and to the number of distinct
/// colors, so a flat image yields a single-color palette.
///
/// # Errors
///
/// Returns [`PipelineError::Processing`] if the image has no pixels.
pub fn quantize<R: Rng + ?Sized>(
    image: &RgbImage,
    k: u32,
    options: &KmeansOptions,
    rng: &mut R,
) -> Result<Quantized, PipelineError> {
    let histogram = ColorHistogram::from_image(image);
    if histogram.colors.is_empty() {
        return Err(PipelineError::Processing(
            "cannot quantize an image with no pixels".to_string(),
        ));
    }

    let k = (k.clamp(1, MAX_CLUSTERS) as usize).min(histogram.colors.len());

    let mut best = lloyd(&histogram, kmeans_plus_plus(&histogram, k, rng), options);
    for _ in 1..options.attempts {
        let candidate = lloyd(&histogram, kmeans_plus_plus(&histogram, k, rng), options);
        if candidate.compactness < best.compactness {
            best = candidate;
        }
    }

    let centers: Vec<[u8; 3]> = best.centers.iter().map(|&c| round_center(c)).collect();

    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        // Every pixel color is in the histogram by construction.
        if let Ok(idx) = histogram.colors.binary_search(&pixel.0) {
            pixel.0 = centers[best.labels[idx]];
        }
    }

    Ok(Quantized {
        image: out,
        centers,
        iterations: best.iterations,
        compactness: best.compactness,
    })
}

/// Distinct colors in sorted order with their pixel counts.
struct ColorHistogram {
    colors: Vec<[u8; 3]>,
    points: Vec<[f32; 3]>,
    weights: Vec<f64>,
}

impl ColorHistogram {
    fn from_image(image: &RgbImage) -> Self {
        let mut all: Vec<[u8; 3]> = image.pixels().map(|p| p.0).collect();
        all.sort_unstable();

        let mut colors: Vec<[u8; 3]> = Vec::new();
        let mut weights: Vec<f64> = Vec::new();
        for color in all {
            match colors.last() {
                Some(&last) if last == color => {
                    if let Some(w) = weights.last_mut() {
                        *w += 1.0;
                    }
                }
                _ => {
                    colors.push(color);
                    weights.push(1.0);
                }
            }
        }

        let points = colors
            .iter()
            .map(|c| c.map(f32::from))
            .collect();

        Self {
            colors,
            points,
            weights,
        }
    }
}

/// One finished clustering attempt.
struct Clustering {
    centers: Vec<[f32; 3]>,
    /// Cluster index per histogram entry.
    labels: Vec<usize>,
    compactness: f64,
    iterations: u32,
}

fn distance_sq(a: [f32; 3], b: [f32; 3]) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr.mul_add(dr, dg.mul_add(dg, db * db))
}

fn nearest(point: [f32; 3], centers: &[[f32; 3]]) -> (usize, f32) {
    let mut best = (0, f32::INFINITY);
    for (i, &center) in centers.iter().enumerate() {
        let d = distance_sq(point, center);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// k-means++ seeding: each new center is drawn with probability
/// proportional to its weighted squared distance from the nearest
/// center already chosen.
fn kmeans_plus_plus<R: Rng + ?Sized>(
    histogram: &ColorHistogram,
    k: usize,
    rng: &mut R,
) -> Vec<[f32; 3]> {
    let points = &histogram.points;
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.gen_range(0..points.len())]);

    let mut closest: Vec<f64> = points
        .iter()
        .map(|&p| f64::from(distance_sq(p, centers[0])))
        .collect();

    while centers.len() < k {
        let total: f64 = closest
            .iter()
            .zip(&histogram.weights)
            .map(|(d, w)| d * w)
            .sum();

        let chosen = if total > 0.0 {
            let mut target = rng.gen_range(0.0..total);
            let mut chosen = points.len() - 1;
            for (i, (d, w)) in closest.iter().zip(&histogram.weights).enumerate() {
                target -= d * w;
                if target < 0.0 {
                    chosen = i;
                    break;
                }
            }
            chosen
        } else {
            rng.gen_range(0..points.len())
        };

        let center = points[chosen];
        centers.push(center);
        for (d, &p) in closest.iter_mut().zip(points) {
            *d = d.min(f64::from(distance_sq(p, center)));
        }
    }

    centers
}

/// Label every point with its nearest center, returning the compactness.
fn assign(histogram: &ColorHistogram, centers: &[[f32; 3]], labels: &mut [usize]) -> f64 {
    let mut compactness = 0.0;
    for ((label, &point), &weight) in labels
        .iter_mut()
        .zip(&histogram.points)
        .zip(&histogram.weights)
    {
        let (idx, d) = nearest(point, centers);
        *label = idx;
        compactness += f64::from(d) * weight;
    }
    compactness
}

/// Move each center to the weighted mean of its points. Clusters that
/// lost every point keep their previous center.
fn update_centers(histogram: &ColorHistogram, labels: &[usize], centers: &mut [[f32; 3]]) {
    let mut sums = vec![[0.0f64; 3]; centers.len()];
    let mut counts = vec![0.0f64; centers.len()];
    for ((&label, point), &weight) in labels
        .iter()
        .zip(&histogram.points)
        .zip(&histogram.weights)
    {
        for (sum, &channel) in sums[label].iter_mut().zip(point) {
            *sum += f64::from(channel) * weight;
        }
        counts[label] += weight;
    }
    for ((center, sum), count) in centers.iter_mut().zip(sums).zip(counts) {
        if count > 0.0 {
            #[allow(clippy::cast_possible_truncation)]
            {
                *center = sum.map(|s| (s / count) as f32);
            }
        }
    }
}

fn lloyd(
    histogram: &ColorHistogram,
    mut centers: Vec<[f32; 3]>,
    options: &KmeansOptions,
) -> Clustering {
    let mut labels = vec![0; histogram.points.len()];
    let mut compactness = assign(histogram, &centers, &mut labels);
    let mut iterations = 0;

    while iterations < options.max_iterations {
        update_centers(histogram, &labels, &mut centers);
        let next = assign(histogram, &centers, &mut labels);
        let improvement = compactness - next;
        compactness = next;
        iterations += 1;
        if improvement < options.epsilon {
            break;
        }
    }

    Clustering {
        centers,
        labels,
        compactness,
        iterations,
    }
}

fn round_center(center: [f32; 3]) -> [u8; 3] {
    center.map(|c| {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let value = c.round().clamp(0.0, 255.0) as u8;
        value
    })
}
