//! Dominant colour extraction.
//!
//! Pixels are sampled from a downscaled copy of the image and clustered with
//! k-means (k-means++ seeding). The RNG is seeded from a digest of the samples,
//! so the palette of a given image is stable across runs.

use image::{imageops::FilterType, GenericImageView};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::error::Result;

pub type Rgb = [f64; 3];

#[derive(Debug, Clone)]
pub struct PaletteConfig {
    pub color_count: usize,
    pub sample_size: usize,
    pub max_iterations: usize,
    /// Images are shrunk to fit a square of this size before sampling
    pub max_dimension: u32,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            color_count: 16,
            sample_size: 5000,
            max_iterations: 50,
            max_dimension: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaletteColor {
    pub hex: String,
    pub population: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub centroid: Rgb,
    pub size: usize,
}

pub fn load_pixels(path: &Path, config: &PaletteConfig) -> Result<Vec<Rgb>> {
    let img = image::open(path)?;
    let (width, height) = img.dimensions();

    let img = if width > config.max_dimension || height > config.max_dimension {
        img.resize(config.max_dimension, config.max_dimension, FilterType::Triangle)
    } else {
        img
    };
    let rgb = img.to_rgb8();

    let total = (rgb.width() * rgb.height()) as usize;
    let step = (total / config.sample_size.max(1)).max(1);

    Ok(rgb
        .pixels()
        .step_by(step)
        .map(|p| [p[0] as f64, p[1] as f64, p[2] as f64])
        .collect())
}

/// Palette of `path` sorted by share, or `None` if nothing could be sampled.
pub fn extract_palette(path: &Path, config: &PaletteConfig) -> Result<Option<Vec<PaletteColor>>> {
    let samples = load_pixels(path, config)?;
    if samples.is_empty() {
        return Ok(None);
    }

    let mut rng = StdRng::from_seed(seed_for(&samples));
    let clusters = kmeans(&samples, config.color_count, config.max_iterations, &mut rng);

    Ok(palette_from_clusters(&clusters))
}

pub fn palette_from_clusters(clusters: &[Cluster]) -> Option<Vec<PaletteColor>> {
    let total: usize = clusters.iter().map(|c| c.size).sum();
    if total == 0 {
        return None;
    }

    let mut colors: Vec<PaletteColor> = clusters
        .iter()
        .map(|cluster| PaletteColor {
            hex: rgb_to_hex(cluster.centroid),
            population: cluster.size,
            percentage: round_to(cluster.size as f64 / total as f64 * 100.0, 2),
        })
        .collect();
    colors.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));

    Some(colors)
}

/// Lloyd's k-means with k-means++ initialisation.
///
/// Returns at most `k` clusters; fewer when the samples hold fewer distinct
/// colours. A cluster that loses all its members keeps its last centroid.
pub fn kmeans<R: Rng>(samples: &[Rgb], k: usize, max_iterations: usize, rng: &mut R) -> Vec<Cluster> {
    if samples.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut centroids = seed_centroids(samples, k, rng);
    let mut assignments = vec![usize::MAX; samples.len()];

    for iteration in 0..max_iterations.max(1) {
        let mut changed = false;
        for (sample, assignment) in samples.iter().zip(assignments.iter_mut()) {
            let nearest = nearest_centroid(sample, &centroids).0;
            if *assignment != nearest {
                *assignment = nearest;
                changed = true;
            }
        }

        if !changed {
            tracing::trace!("k-means converged after {} iterations", iteration);
            break;
        }

        let mut sums = vec![[0.0; 3]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for (sample, &cluster) in samples.iter().zip(&assignments) {
            for channel in 0..3 {
                sums[cluster][channel] += sample[channel];
            }
            counts[cluster] += 1;
        }
        for (index, centroid) in centroids.iter_mut().enumerate() {
            if counts[index] > 0 {
                let n = counts[index] as f64;
                *centroid = [sums[index][0] / n, sums[index][1] / n, sums[index][2] / n];
            }
        }
    }

    let mut sizes = vec![0usize; centroids.len()];
    for &cluster in &assignments {
        sizes[cluster] += 1;
    }

    centroids
        .into_iter()
        .zip(sizes)
        .map(|(centroid, size)| Cluster { centroid, size })
        .collect()
}

fn seed_centroids<R: Rng>(samples: &[Rgb], k: usize, rng: &mut R) -> Vec<Rgb> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(samples[rng.random_range(0..samples.len())]);

    let mut distances: Vec<f64> = samples
        .iter()
        .map(|s| squared_distance(s, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = distances.iter().sum();
        if total <= 0.0 {
            // every sample already coincides with a centroid
            break;
        }

        let mut target = rng.random::<f64>() * total;
        let mut chosen = samples.len() - 1;
        for (index, distance) in distances.iter().enumerate() {
            if *distance <= 0.0 {
                continue;
            }
            if target < *distance {
                chosen = index;
                break;
            }
            target -= distance;
        }
        if distances[chosen] <= 0.0 {
            chosen = match distances.iter().rposition(|d| *d > 0.0) {
                Some(index) => index,
                None => break,
            };
        }

        let centroid = samples[chosen];
        for (sample, distance) in samples.iter().zip(distances.iter_mut()) {
            *distance = distance.min(squared_distance(sample, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

fn nearest_centroid(sample: &Rgb, centroids: &[Rgb]) -> (usize, f64) {
    centroids
        .iter()
        .map(|c| squared_distance(sample, c))
        .enumerate()
        .fold((0, f64::INFINITY), |best, (index, d)| {
            if d < best.1 {
                (index, d)
            } else {
                best
            }
        })
}

fn squared_distance(a: &Rgb, b: &Rgb) -> f64 {
    (0..3).map(|i| (a[i] - b[i]).powi(2)).sum()
}

fn seed_for(samples: &[Rgb]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for sample in samples {
        hasher.update([sample[0] as u8, sample[1] as u8, sample[2] as u8]);
    }
    hasher.finalize().into()
}

pub fn rgb_to_hex(rgb: Rgb) -> String {
    let channel = |v: f64| v.round().clamp(0.0, 255.0) as u8;
    format!(
        "#{:02X}{:02X}{:02X}",
        channel(rgb[0]),
        channel(rgb[1]),
        channel(rgb[2])
    )
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
