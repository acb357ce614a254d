//! Fixed-radius neighbour queries over a uniform grid.

use std::collections::HashMap;

type Cell = (i64, i64, i64);

/// Bucket index for radius queries; cell edge equals the query radius so a
/// query only visits the 27 surrounding cells.
pub(crate) struct RadiusIndex<'a> {
    points: &'a [[f64; 3]],
    radius: f64,
    cells: HashMap<Cell, Vec<usize>>,
}

impl<'a> RadiusIndex<'a> {
    pub(crate) fn new(points: &'a [[f64; 3]], radius: f64) -> Self {
        let mut cells: HashMap<Cell, Vec<usize>> = HashMap::new();
        for (i, p) in points.iter().enumerate() {
            cells.entry(cell_of(p, radius)).or_default().push(i);
        }
        Self {
            points,
            radius,
            cells,
        }
    }

    /// Indices of all points within `radius` of `points[i]`, itself included.
    pub(crate) fn neighbors_of(&self, i: usize) -> Vec<usize> {
        let p = self.points[i];
        let (cx, cy, cz) = cell_of(&p, self.radius);
        let r2 = self.radius * self.radius;

        let mut out = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(bucket) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &j in bucket {
                        let q = self.points[j];
                        let d2 = (p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2) + (p[2] - q[2]).powi(2);
                        if d2 <= r2 {
                            out.push(j);
                        }
                    }
                }
            }
        }
        out
    }
}

fn cell_of(p: &[f64; 3], size: f64) -> Cell {
    (
        (p[0] / size).floor() as i64,
        (p[1] / size).floor() as i64,
        (p[2] / size).floor() as i64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_brute_force() {
        let points: Vec<[f64; 3]> = (0..200)
            .map(|i| {
                let t = i as f64;
                [(t * 0.37).sin() * 10.0, (t * 0.11).cos() * 10.0, (t * 0.05) % 3.0]
            })
            .collect();
        let index = RadiusIndex::new(&points, 3.0);

        for i in [0, 17, 99, 199] {
            let mut got = index.neighbors_of(i);
            got.sort_unstable();
            let expected: Vec<usize> = (0..points.len())
                .filter(|&j| {
                    let (p, q) = (points[i], points[j]);
                    (p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2) + (p[2] - q[2]).powi(2) <= 9.0
                })
                .collect();
            assert_eq!(got, expected, "neighbourhood of {i}");
        }
    }

    #[test]
    fn test_includes_self() {
        let points = [[0.0, 0.0, 0.0], [10.0, 10.0, 10.0]];
        let index = RadiusIndex::new(&points, 1.0);
        assert_eq!(index.neighbors_of(1), vec![1]);
    }
}
