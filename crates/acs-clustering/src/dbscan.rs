//! Density-based clustering (DBSCAN).

use acs_core::stats;
use serde::{Deserialize, Serialize};

use crate::error::{ClusterError, ClusterResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DbscanParams {
    /// Neighbourhood radius (inclusive)
    pub eps: f64,
    /// Neighbourhood size, counting the point itself, for a core point
    pub min_samples: usize,
}

impl Default for DbscanParams {
    fn default() -> Self {
        Self {
            eps: 0.5,
            min_samples: 3,
        }
    }
}

impl DbscanParams {
    pub fn validate(&self) -> ClusterResult<()> {
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(ClusterError::invalid_parameter(format!(
                "eps must be > 0, got {}",
                self.eps
            )));
        }
        if self.min_samples == 0 {
            return Err(ClusterError::invalid_parameter("min_samples must be >= 1"));
        }
        Ok(())
    }
}

/// Label every point with its cluster, `None` for noise.
///
/// Clusters are numbered in order of discovery, scanning points by index.
pub fn dbscan(points: &[Vec<f64>], params: &DbscanParams) -> ClusterResult<Vec<Option<usize>>> {
    params.validate()?;
    let n = points.len();

    let neighbourhoods: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| stats::euclidean(&points[i], &points[j]) <= params.eps)
                .collect()
        })
        .collect();
    let is_core = |i: usize| neighbourhoods[i].len() >= params.min_samples;

    let mut labels: Vec<Option<usize>> = vec![None; n];
    let mut next = 0;
    for seed in 0..n {
        if labels[seed].is_some() || !is_core(seed) {
            continue;
        }
        labels[seed] = Some(next);
        let mut frontier = vec![seed];
        while let Some(p) = frontier.pop() {
            if !is_core(p) {
                continue;
            }
            for &q in &neighbourhoods[p] {
                if labels[q].is_none() {
                    labels[q] = Some(next);
                    frontier.push(q);
                }
            }
        }
        next += 1;
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_clusters_and_noise() {
        let points: Vec<Vec<f64>> = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![0.0, 0.1],
            vec![5.0, 5.0],
            vec![5.1, 5.0],
            vec![5.0, 5.1],
            vec![20.0, 20.0],
        ];
        let labels = dbscan(&points, &DbscanParams { eps: 0.5, min_samples: 3 }).unwrap();
        assert_eq!(
            labels,
            vec![Some(0), Some(0), Some(0), Some(1), Some(1), Some(1), None]
        );
        println!("[PASS] test_two_clusters_and_noise");
    }

    #[test]
    fn test_min_samples_counts_self() {
        let points = vec![vec![0.0], vec![0.4]];
        let labels = dbscan(&points, &DbscanParams { eps: 0.5, min_samples: 2 }).unwrap();
        assert_eq!(labels, vec![Some(0), Some(0)]);
    }

    #[test]
    fn test_border_point_joins_cluster() {
        // 0.9 is within eps of the core at 0.5 but is not itself core.
        let points = vec![vec![0.0], vec![0.25], vec![0.5], vec![0.9]];
        let labels = dbscan(&points, &DbscanParams { eps: 0.45, min_samples: 3 }).unwrap();
        assert_eq!(labels, vec![Some(0); 4]);
    }

    #[test]
    fn test_invalid_params() {
        assert!(dbscan(&[], &DbscanParams { eps: 0.0, min_samples: 3 }).is_err());
        assert!(dbscan(&[], &DbscanParams { eps: 0.5, min_samples: 0 }).is_err());
    }
}
