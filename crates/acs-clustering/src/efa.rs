//! Elliptic Fourier descriptors of closed 2D outlines.
//!
//! Coefficients follow Kuhl and Giardina (1982). Normalization removes
//! rotation, starting point and size so outlines of the same shape compare
//! equal: the first harmonic becomes `(1, 0, 0, d1)` with `|d1|` the minor
//! to major axis ratio of its ellipse.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClusterError, ClusterResult};

pub const DEFAULT_HARMONICS: usize = 10;

/// Coefficients of one harmonic: `x(t) = a cos + b sin`, `y(t) = c cos + d sin`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EllipticHarmonic {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

/// Descriptors of `contour` up to `n_harmonics`.
///
/// The contour is closed implicitly when its last point differs from the
/// first. Repeated consecutive points are ignored.
pub fn elliptic_fourier_descriptors(
    contour: &[[f64; 2]],
    n_harmonics: usize,
    normalize: bool,
) -> ClusterResult<Vec<EllipticHarmonic>> {
    if n_harmonics == 0 {
        return Err(ClusterError::invalid_parameter("n_harmonics must be at least 1"));
    }
    if contour.len() < 3 {
        return Err(ClusterError::insufficient_samples(3, contour.len()));
    }
    if contour.iter().flatten().any(|v| !v.is_finite()) {
        return Err(ClusterError::invalid_parameter("contour has non-finite coordinates"));
    }

    let mut points = contour.to_vec();
    if points.first() != points.last() {
        points.push(points[0]);
    }

    // (dx, dy, dt) per non-degenerate segment
    let segments: Vec<(f64, f64, f64)> = points
        .windows(2)
        .map(|w| {
            let (dx, dy) = (w[1][0] - w[0][0], w[1][1] - w[0][1]);
            (dx, dy, dx.hypot(dy))
        })
        .filter(|s| s.2 > 0.0)
        .collect();
    if segments.len() < 3 {
        return Err(ClusterError::degenerate("contour has fewer than 3 distinct segments"));
    }

    let mut t = Vec::with_capacity(segments.len() + 1);
    t.push(0.0);
    for s in &segments {
        t.push(t[t.len() - 1] + s.2);
    }
    let perimeter = t[t.len() - 1];
    let phi: Vec<f64> = t.iter().map(|ti| 2.0 * PI * ti / perimeter).collect();

    let mut harmonics = Vec::with_capacity(n_harmonics);
    for n in 1..=n_harmonics {
        let nf = n as f64;
        let scale = perimeter / (2.0 * nf * nf * PI * PI);
        let (mut a, mut b, mut c, mut d) = (0.0, 0.0, 0.0, 0.0);
        for (i, (dx, dy, dt)) in segments.iter().enumerate() {
            let d_cos = (nf * phi[i + 1]).cos() - (nf * phi[i]).cos();
            let d_sin = (nf * phi[i + 1]).sin() - (nf * phi[i]).sin();
            a += dx / dt * d_cos;
            b += dx / dt * d_sin;
            c += dy / dt * d_cos;
            d += dy / dt * d_sin;
        }
        harmonics.push(EllipticHarmonic {
            a: scale * a,
            b: scale * b,
            c: scale * c,
            d: scale * d,
        });
    }

    if normalize {
        normalize_harmonics(&mut harmonics)?;
    }
    debug!(n_points = contour.len(), n_harmonics, normalize, "elliptic Fourier descriptors computed");
    Ok(harmonics)
}

/// Rotate to the first harmonic's major axis phase, align that axis with x,
/// then divide by its semi-major length.
fn normalize_harmonics(harmonics: &mut [EllipticHarmonic]) -> ClusterResult<()> {
    let h1 = harmonics[0];
    let theta = 0.5
        * (2.0 * (h1.a * h1.b + h1.c * h1.d))
            .atan2(h1.a * h1.a - h1.b * h1.b + h1.c * h1.c - h1.d * h1.d);

    for (i, h) in harmonics.iter_mut().enumerate() {
        let (sin, cos) = ((i + 1) as f64 * theta).sin_cos();
        *h = EllipticHarmonic {
            a: h.a * cos + h.b * sin,
            b: -h.a * sin + h.b * cos,
            c: h.c * cos + h.d * sin,
            d: -h.c * sin + h.d * cos,
        };
    }

    let psi = harmonics[0].c.atan2(harmonics[0].a);
    let (sin, cos) = psi.sin_cos();
    for h in harmonics.iter_mut() {
        *h = EllipticHarmonic {
            a: cos * h.a + sin * h.c,
            b: cos * h.b + sin * h.d,
            c: -sin * h.a + cos * h.c,
            d: -sin * h.b + cos * h.d,
        };
    }

    let size = harmonics[0].a.abs();
    if size <= f64::EPSILON || !size.is_finite() {
        return Err(ClusterError::degenerate("first harmonic has no extent"));
    }
    for h in harmonics.iter_mut() {
        h.a /= size;
        h.b /= size;
        h.c /= size;
        h.d /= size;
    }
    Ok(())
}
