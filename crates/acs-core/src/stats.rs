//! Descriptive statistics shared by every analysis stage.
//!
//! Conventions matter here because downstream thresholds were tuned against
//! them:
//!
//! - [`percentile`] interpolates linearly between closest ranks.
//! - [`population_std`] divides by `n`; [`sample_std`] divides by `n - 1`.
//! - [`Standardizer`] scales by the population std and maps a zero std to 1.
//!
//! Functions over empty input return `None` instead of a made-up number.

use serde::{Deserialize, Serialize};

/// Offset added to denominators that may legitimately be zero.
pub const EPSILON: f64 = 1e-6;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn sum_squared_deviation(values: &[f64], mean: f64) -> f64 {
    values.iter().map(|v| (v - mean).powi(2)).sum()
}

/// Standard deviation with divisor `n`.
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    Some((sum_squared_deviation(values, m) / values.len() as f64).sqrt())
}

/// Standard deviation with divisor `n - 1`. Requires at least two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    Some((sum_squared_deviation(values, m) / (values.len() - 1) as f64).sqrt())
}

/// Coefficient of variation `sample_std / (mean + EPSILON)`.
///
/// `None` for fewer than two values.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let std = sample_std(values)?;
    let m = mean(values)?;
    Some(std / (m + EPSILON))
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Peak-to-peak extent; zero for empty input.
pub fn range(values: &[f64]) -> f64 {
    match (min(values), max(values)) {
        (Some(lo), Some(hi)) => hi - lo,
        _ => 0.0,
    }
}

/// Percentile `q` in `[0, 100]` with linear interpolation between ranks.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let q = q.clamp(0.0, 100.0) / 100.0;
    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

/// `n` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

// ============================================================================
// Column standardization
// ============================================================================

/// Per-column z-score transform fitted on a row-major matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    pub means: Vec<f64>,
    /// Population std per column; zero-variance columns carry 1.0
    pub scales: Vec<f64>,
}

impl Standardizer {
    /// Fit column means and scales. Returns `None` for an empty matrix.
    pub fn fit(rows: &[Vec<f64>]) -> Option<Self> {
        let width = rows.first()?.len();
        let mut means = Vec::with_capacity(width);
        let mut scales = Vec::with_capacity(width);

        for col in 0..width {
            let column: Vec<f64> = rows.iter().map(|r| r[col]).collect();
            let m = mean(&column)?;
            let s = population_std(&column)?;
            means.push(m);
            scales.push(if s == 0.0 { 1.0 } else { s });
        }

        Some(Self { means, scales })
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }
}

/// Fit and apply a [`Standardizer`] in one step.
pub fn standardize(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    match Standardizer::fit(rows) {
        Some(s) => s.transform(rows),
        None => Vec::new(),
    }
}

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!(close(percentile(&v, 50.0).unwrap(), 2.5));
        assert!(close(percentile(&v, 75.0).unwrap(), 3.25));
        assert!(close(percentile(&v, 0.0).unwrap(), 1.0));
        assert!(close(percentile(&v, 100.0).unwrap(), 4.0));
        assert!(percentile(&[], 50.0).is_none());
        println!("[PASS] test_percentile_linear_interpolation");
    }

    #[test]
    fn test_percentile_ignores_input_order() {
        let a = [5.0, 1.0, 3.0];
        let b = [1.0, 3.0, 5.0];
        assert_eq!(percentile(&a, 40.0), percentile(&b, 40.0));
    }

    #[test]
    fn test_std_divisors() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(close(population_std(&v).unwrap(), 2.0));
        assert!(close(sample_std(&v).unwrap(), (32.0f64 / 7.0).sqrt()));
        assert!(sample_std(&[1.0]).is_none());
        println!("[PASS] test_std_divisors - population uses n, sample uses n-1");
    }

    #[test]
    fn test_coefficient_of_variation_absent_for_single_value() {
        assert!(coefficient_of_variation(&[10.0]).is_none());
        let cv = coefficient_of_variation(&[10.0, 10.0, 10.0]).unwrap();
        assert!(close(cv, 0.0));
    }

    #[test]
    fn test_linspace_endpoints() {
        let v = linspace(0.0, 1.0, 5);
        assert_eq!(v.len(), 5);
        assert!(close(v[1], 0.25));
        assert_eq!(v[4], 1.0);
        assert_eq!(linspace(3.0, 9.0, 1), vec![3.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_standardizer_zero_variance_column() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let s = Standardizer::fit(&rows).unwrap();
        assert_eq!(s.scales[1], 1.0, "constant column must not divide by zero");

        let z = s.transform(&rows);
        assert!(close(z[0][0], -1.0));
        assert!(close(z[1][0], 1.0));
        assert!(close(z[0][1], 0.0));
        println!("[PASS] test_standardizer_zero_variance_column");
    }

    #[test]
    fn test_standardize_empty() {
        assert!(standardize(&[]).is_empty());
        assert!(Standardizer::fit(&[]).is_none());
    }
}
