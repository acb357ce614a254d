//! Agglomerative clustering with Lance–Williams distance updates.
//!
//! [`Dendrogram::build`] records the full merge sequence once; flat
//! partitions are then cut either by cluster count or by a cophenetic
//! distance threshold. Flat labels are numbered in order of first
//! appearance, so the cluster containing row 0 is always label 0.

use serde::{Deserialize, Serialize};

use acs_core::stats;

use crate::error::{ClusterError, ClusterResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    #[default]
    Ward,
    Complete,
    Average,
    Single,
}

/// One agglomeration step: cluster `b` is absorbed into cluster `a` at
/// `distance`. Clusters are named by a representative row index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Merge {
    pub a: usize,
    pub b: usize,
    pub distance: f64,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dendrogram {
    n: usize,
    linkage: Linkage,
    merges: Vec<Merge>,
}

impl Dendrogram {
    /// Agglomerate `points` (Euclidean) bottom-up until one cluster remains.
    pub fn build(points: &[Vec<f64>], linkage: Linkage) -> ClusterResult<Self> {
        let n = points.len();
        if n == 0 {
            return Err(ClusterError::insufficient_samples(1, 0));
        }

        let mut dist = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = stats::euclidean(&points[i], &points[j]);
                dist[i][j] = d;
                dist[j][i] = d;
            }
        }

        let mut active: Vec<bool> = vec![true; n];
        let mut sizes: Vec<usize> = vec![1; n];
        let mut merges = Vec::with_capacity(n.saturating_sub(1));

        for _ in 1..n {
            // Closest active pair; ties go to the lowest indices.
            let mut best: Option<(usize, usize, f64)> = None;
            for i in (0..n).filter(|&i| active[i]) {
                for j in ((i + 1)..n).filter(|&j| active[j]) {
                    if best.map_or(true, |(_, _, d)| dist[i][j] < d) {
                        best = Some((i, j, dist[i][j]));
                    }
                }
            }
            let Some((a, b, d_ab)) = best else { break };

            let (na, nb) = (sizes[a] as f64, sizes[b] as f64);
            for k in (0..n).filter(|&k| active[k] && k != a && k != b) {
                let nk = sizes[k] as f64;
                let (d_ka, d_kb) = (dist[k][a], dist[k][b]);
                let updated = match linkage {
                    Linkage::Single => d_ka.min(d_kb),
                    Linkage::Complete => d_ka.max(d_kb),
                    Linkage::Average => (na * d_ka + nb * d_kb) / (na + nb),
                    Linkage::Ward => (((nk + na) * d_ka * d_ka + (nk + nb) * d_kb * d_kb
                        - nk * d_ab * d_ab)
                        / (nk + na + nb))
                        .max(0.0)
                        .sqrt(),
                };
                dist[k][a] = updated;
                dist[a][k] = updated;
            }

            active[b] = false;
            sizes[a] += sizes[b];
            merges.push(Merge {
                a,
                b,
                distance: d_ab,
                size: sizes[a],
            });
        }

        Ok(Self { n, linkage, merges })
    }

    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    pub fn n_samples(&self) -> usize {
        self.n
    }

    /// Flat partition into exactly `k` clusters.
    pub fn cut_k(&self, k: usize) -> ClusterResult<Vec<usize>> {
        if k == 0 || k > self.n {
            return Err(ClusterError::invalid_parameter(format!(
                "n_clusters must be in 1..={}, got {k}",
                self.n
            )));
        }
        Ok(self.apply(self.n - k))
    }

    /// Flat partition keeping every merge at or below `threshold`.
    pub fn cut_distance(&self, threshold: f64) -> ClusterResult<Vec<usize>> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ClusterError::invalid_parameter(format!(
                "distance threshold must be a non-negative number, got {threshold}"
            )));
        }
        // Merge order is not strictly monotonic for every linkage, so count
        // the prefix whose distances stay under the threshold.
        let steps = self
            .merges
            .iter()
            .take_while(|m| m.distance <= threshold)
            .count();
        Ok(self.apply(steps))
    }

    fn apply(&self, steps: usize) -> Vec<usize> {
        let mut parent: Vec<usize> = (0..self.n).collect();
        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }
        for m in self.merges.iter().take(steps) {
            let (ra, rb) = (find(&mut parent, m.a), find(&mut parent, m.b));
            if ra != rb {
                parent[rb] = ra;
            }
        }
        let roots: Vec<usize> = (0..self.n).map(|i| find(&mut parent, i)).collect();
        relabel(&roots)
    }
}

/// Renumber arbitrary labels 0.. in order of first appearance.
pub fn relabel(labels: &[usize]) -> Vec<usize> {
    let mut seen: Vec<usize> = Vec::new();
    labels
        .iter()
        .map(|l| match seen.iter().position(|s| s == l) {
            Some(p) => p,
            None => {
                seen.push(*l);
                seen.len() - 1
            }
        })
        .collect()
}

/// Number of distinct labels.
pub fn label_count(labels: &[usize]) -> usize {
    let mut distinct: Vec<usize> = labels.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    distinct.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0],
            vec![10.0, 10.0],
            vec![0.2, 0.1],
            vec![10.1, 9.9],
            vec![0.1, 0.3],
        ]
    }

    #[test]
    fn test_cut_k_separates_blobs() {
        for linkage in [Linkage::Ward, Linkage::Complete, Linkage::Average, Linkage::Single] {
            let d = Dendrogram::build(&two_blobs(), linkage).unwrap();
            assert_eq!(d.merges().len(), 4);
            assert_eq!(d.cut_k(2).unwrap(), vec![0, 1, 0, 1, 0], "{linkage:?}");
        }
        println!("[PASS] test_cut_k_separates_blobs");
    }

    #[test]
    fn test_cut_k_extremes() {
        let d = Dendrogram::build(&two_blobs(), Linkage::Ward).unwrap();
        assert_eq!(d.cut_k(1).unwrap(), vec![0; 5]);
        assert_eq!(d.cut_k(5).unwrap(), vec![0, 1, 2, 3, 4]);
        assert!(d.cut_k(0).is_err());
        assert!(d.cut_k(6).is_err());
    }

    #[test]
    fn test_cut_distance() {
        let d = Dendrogram::build(&two_blobs(), Linkage::Single).unwrap();
        assert_eq!(d.cut_distance(1.0).unwrap(), vec![0, 1, 0, 1, 0]);
        assert_eq!(d.cut_distance(100.0).unwrap(), vec![0; 5]);
        assert_eq!(label_count(&d.cut_distance(0.0).unwrap()), 5);
    }

    #[test]
    fn test_ward_merge_height() {
        // Two points at distance 2: Ward height equals the Euclidean distance.
        let d = Dendrogram::build(&[vec![0.0], vec![2.0]], Linkage::Ward).unwrap();
        assert!((d.merges()[0].distance - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_relabel_first_appearance() {
        assert_eq!(relabel(&[7, 3, 7, 9]), vec![0, 1, 0, 2]);
        assert_eq!(label_count(&[7, 3, 7, 9]), 3);
    }
}
