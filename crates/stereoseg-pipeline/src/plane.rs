//! Disparity plane fitting.
//!
//! Least-squares fit of `d = a*x + b*y + c` to a set of disparity samples,
//! followed by inlier re-fits that drop samples whose residual exceeds a
//! threshold. Coordinates are centered before solving so that the normal
//! equations stay well conditioned for large images.

use crate::types::PlaneCoefficients;

/// One disparity observation at pixel position `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisparitySample {
    pub x: f64,
    pub y: f64,
    pub d: f64,
}

impl DisparitySample {
    #[must_use]
    pub const fn new(x: f64, y: f64, d: f64) -> Self {
        Self { x, y, d }
    }

    fn residual(self, plane: PlaneCoefficients) -> f64 {
        self.d - plane.disparity_at(self.x, self.y)
    }
}

/// Relative determinant below which the slope system is treated as
/// singular (collinear or single-point samples).
const SINGULAR_EPSILON: f64 = 1e-9;

/// Least-squares plane through `samples`.
///
/// Falls back to a fronto-parallel plane at the mean disparity when the
/// sample positions do not span two dimensions. Returns `None` for an
/// empty sample set.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn fit_plane(samples: &[DisparitySample]) -> Option<PlaneCoefficients> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let mean_x = samples.iter().map(|s| s.x).sum::<f64>() / n;
    let mean_y = samples.iter().map(|s| s.y).sum::<f64>() / n;
    let mean_d = samples.iter().map(|s| s.d).sum::<f64>() / n;

    let (mut sxx, mut sxy, mut syy, mut sxd, mut syd) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for s in samples {
        let (dx, dy, dd) = (s.x - mean_x, s.y - mean_y, s.d - mean_d);
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
        sxd += dx * dd;
        syd += dy * dd;
    }

    let det = sxx.mul_add(syy, -(sxy * sxy));
    let scale = (sxx + syy) * (sxx + syy);
    if scale <= 0.0 || det.abs() <= SINGULAR_EPSILON * scale {
        return Some(PlaneCoefficients::fronto_parallel(mean_d));
    }

    let a = sxd.mul_add(syy, -(syd * sxy)) / det;
    let b = syd.mul_add(sxx, -(sxd * sxy)) / det;
    let c = a.mul_add(-mean_x, b.mul_add(-mean_y, mean_d));
    Some(PlaneCoefficients::new(a, b, c))
}

/// Fit a plane, then re-fit on inliers up to `iterations - 1` more times.
///
/// A sample is an inlier when its absolute residual is at most
/// `inlier_threshold`. Iteration stops early when the inlier set stops
/// shrinking or would fall below three samples.
#[must_use]
pub fn fit_plane_robust(
    samples: &[DisparitySample],
    inlier_threshold: f64,
    iterations: u32,
) -> Option<PlaneCoefficients> {
    let mut plane = fit_plane(samples)?;
    let mut support = samples.len();

    for _ in 1..iterations {
        let inliers: Vec<DisparitySample> = samples
            .iter()
            .copied()
            .filter(|s| s.residual(plane).abs() <= inlier_threshold)
            .collect();
        if inliers.len() < 3 || inliers.len() == support {
            break;
        }
        support = inliers.len();
        match fit_plane(&inliers) {
            Some(refit) => plane = refit,
            None => break,
        }
    }

    Some(plane)
}
