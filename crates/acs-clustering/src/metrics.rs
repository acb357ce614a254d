//! Cluster-validity indices.
//!
//! Both indices are only defined for `2 <= n_labels <= n_samples - 1`;
//! outside that range they return `None`.

use acs_core::stats;

use crate::hierarchical::label_count;

/// Whether validity indices are defined for this labelling.
pub fn metrics_defined(labels: &[usize]) -> bool {
    let k = label_count(labels);
    k >= 2 && k < labels.len()
}

/// Mean silhouette coefficient over all samples.
///
/// A sample alone in its cluster scores 0.
pub fn silhouette_score(points: &[Vec<f64>], labels: &[usize]) -> Option<f64> {
    if points.len() != labels.len() || !metrics_defined(labels) {
        return None;
    }
    let k = labels.iter().max().map_or(0, |m| m + 1);
    let n = points.len();

    let mut total = 0.0;
    for i in 0..n {
        let mut sums = vec![0.0; k];
        let mut counts = vec![0usize; k];
        for j in 0..n {
            if i == j {
                continue;
            }
            sums[labels[j]] += stats::euclidean(&points[i], &points[j]);
            counts[labels[j]] += 1;
        }

        let own = labels[i];
        if counts[own] == 0 {
            continue;
        }
        let a = sums[own] / counts[own] as f64;
        let b = (0..k)
            .filter(|&c| c != own && counts[c] > 0)
            .map(|c| sums[c] / counts[c] as f64)
            .fold(f64::INFINITY, f64::min);
        let denom = a.max(b);
        if denom > 0.0 && b.is_finite() {
            total += (b - a) / denom;
        }
    }
    Some(total / n as f64)
}

/// Davies–Bouldin index (lower is better).
pub fn davies_bouldin_score(points: &[Vec<f64>], labels: &[usize]) -> Option<f64> {
    if points.len() != labels.len() || !metrics_defined(labels) {
        return None;
    }
    let k = labels.iter().max().map_or(0, |m| m + 1);
    let dim = points.first().map_or(0, Vec::len);

    let mut centroids = vec![vec![0.0; dim]; k];
    let mut counts = vec![0usize; k];
    for (p, &l) in points.iter().zip(labels) {
        counts[l] += 1;
        for (c, v) in centroids[l].iter_mut().zip(p) {
            *c += v;
        }
    }
    for (c, &n) in centroids.iter_mut().zip(&counts) {
        if n > 0 {
            c.iter_mut().for_each(|v| *v /= n as f64);
        }
    }

    // Mean distance of members to their centroid.
    let mut scatter = vec![0.0; k];
    for (p, &l) in points.iter().zip(labels) {
        scatter[l] += stats::euclidean(p, &centroids[l]);
    }
    for (s, &n) in scatter.iter_mut().zip(&counts) {
        if n > 0 {
            *s /= n as f64;
        }
    }

    let present: Vec<usize> = (0..k).filter(|&c| counts[c] > 0).collect();
    let worst: Vec<f64> = present
        .iter()
        .map(|&i| {
            present
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| {
                    let separation = stats::euclidean(&centroids[i], &centroids[j]);
                    if separation > 0.0 {
                        (scatter[i] + scatter[j]) / separation
                    } else {
                        0.0
                    }
                })
                .fold(0.0, f64::max)
        })
        .collect();
    stats::mean(&worst)
}
