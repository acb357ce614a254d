//! K-Means with k-means++ seeding.
//!
//! Runs are reproducible: every restart draws from one `ChaCha8Rng`
//! seeded with [`KMeans::seed`], and the restart with the lowest inertia
//! wins.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClusterError, ClusterResult};
use crate::hierarchical::relabel;

pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeans {
    pub k: usize,
    pub n_init: usize,
    pub max_iter: usize,
    pub tolerance: f64,
    pub seed: u64,
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
            seed: DEFAULT_SEED,
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansFit {
    /// Labels renumbered by first appearance
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances to the assigned centroid
    pub inertia: f64,
}

impl KMeans {
    pub fn fit(&self, points: &[Vec<f64>]) -> ClusterResult<KMeansFit> {
        if self.k == 0 || self.k > points.len() {
            return Err(ClusterError::invalid_parameter(format!(
                "k must be in 1..={}, got {}",
                points.len(),
                self.k
            )));
        }
        if self.n_init == 0 {
            return Err(ClusterError::invalid_parameter("n_init must be >= 1"));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut best: Option<(Vec<usize>, Vec<Vec<f64>>, f64)> = None;
        for run in 0..self.n_init {
            let (labels, centroids, inertia) = self.lloyd(points, &mut rng);
            debug!(run, inertia, k = self.k, "k-means restart");
            if best.as_ref().map_or(true, |(_, _, b)| inertia < *b) {
                best = Some((labels, centroids, inertia));
            }
        }

        let (labels, centroids, inertia) = best.ok_or_else(|| ClusterError::degenerate("no k-means run completed"))?;
        // Reorder centroids to match the relabelled clusters.
        let relabelled = relabel(&labels);
        let mut ordered = vec![Vec::new(); centroids.len()];
        for (old, new) in labels.iter().zip(&relabelled) {
            if ordered[*new].is_empty() {
                ordered[*new] = centroids[*old].clone();
            }
        }
        ordered.retain(|c| !c.is_empty());

        Ok(KMeansFit {
            labels: relabelled,
            centroids: ordered,
            inertia,
        })
    }

    fn lloyd(&self, points: &[Vec<f64>], rng: &mut ChaCha8Rng) -> (Vec<usize>, Vec<Vec<f64>>, f64) {
        let mut centroids = plus_plus_init(points, self.k, rng);
        let mut labels = vec![0; points.len()];

        for _ in 0..self.max_iter {
            for (i, p) in points.iter().enumerate() {
                labels[i] = nearest(p, &centroids).0;
            }

            let mut shift = 0.0;
            for (c, centroid) in centroids.iter_mut().enumerate() {
                let members: Vec<&Vec<f64>> = points
                    .iter()
                    .zip(&labels)
                    .filter(|(_, &l)| l == c)
                    .map(|(p, _)| p)
                    .collect();
                // An emptied cluster keeps its previous centroid.
                if members.is_empty() {
                    continue;
                }
                let mut mean = vec![0.0; centroid.len()];
                for m in &members {
                    for (acc, v) in mean.iter_mut().zip(m.iter()) {
                        *acc += v;
                    }
                }
                for acc in &mut mean {
                    *acc /= members.len() as f64;
                }
                shift += squared(&mean, centroid);
                *centroid = mean;
            }

            if shift <= self.tolerance * self.tolerance {
                break;
            }
        }

        let mut inertia = 0.0;
        for (i, p) in points.iter().enumerate() {
            let (c, d2) = nearest(p, &centroids);
            labels[i] = c;
            inertia += d2;
        }
        (labels, centroids, inertia)
    }
}

/// k-means++: first centre uniform, then proportional to squared distance
/// from the nearest chosen centre.
fn plus_plus_init(points: &[Vec<f64>], k: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<f64>> {
    let mut centroids = vec![points[rng.gen_range(0..points.len())].clone()];
    while centroids.len() < k {
        let weights: Vec<f64> = points.iter().map(|p| nearest(p, &centroids).1).collect();
        let total: f64 = weights.iter().sum();
        let next = if total <= 0.0 {
            // All remaining points coincide with a centre.
            rng.gen_range(0..points.len())
        } else {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = weights
                .iter()
                .rposition(|w| *w > 0.0)
                .unwrap_or(points.len() - 1);
            for (i, w) in weights.iter().enumerate() {
                if target < *w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            chosen
        };
        centroids.push(points[next].clone());
    }
    centroids
}

fn squared(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Index of and squared distance to the nearest centroid.
fn nearest(p: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared(p, c)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Vec<Vec<f64>> {
        let mut points = Vec::new();
        for i in 0..6 {
            let jitter = i as f64 * 0.05;
            points.push(vec![jitter, -jitter]);
            points.push(vec![8.0 + jitter, 8.0 - jitter]);
        }
        points
    }

    #[test]
    fn test_recovers_two_blobs() {
        let fit = KMeans::new(2).fit(&blobs()).unwrap();
        let expected: Vec<usize> = (0..12).map(|i| i % 2).collect();
        assert_eq!(fit.labels, expected);
        assert_eq!(fit.centroids.len(), 2);
        assert!(fit.centroids[0][0] < 1.0 && fit.centroids[1][0] > 7.0);
        println!("[PASS] test_recovers_two_blobs - inertia {:.4}", fit.inertia);
    }

    #[test]
    fn test_same_seed_same_result() {
        let a = KMeans::new(3).fit(&blobs()).unwrap();
        let b = KMeans::new(3).fit(&blobs()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_k_bounds() {
        assert!(KMeans::new(0).fit(&blobs()).is_err());
        assert!(KMeans::new(13).fit(&blobs()).is_err());
        let all = KMeans::new(12).fit(&blobs()).unwrap();
        assert!(all.inertia < 1e-12);
    }

    #[test]
    fn test_identical_points() {
        let points = vec![vec![1.0, 1.0]; 4];
        let fit = KMeans::new(2).fit(&points).unwrap();
        assert_eq!(fit.inertia, 0.0);
    }
}
