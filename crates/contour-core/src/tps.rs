//! Thin plate spline interpolation between 2D control point sets.
//!
//! Fits the augmented system
//! ```text
//! | K   P | |w|   |Y|
//! | P^T 0 | |a| = |0|
//! ```
//! with `K[i][j] = U(|s_i - s_j|^2)`, `U(r2) = r2 * ln(r2)` and `P = [1, x, y]`,
//! solving by LU and falling back to the SVD pseudo-inverse when the system
//! is singular.

use nalgebra::DMatrix;
use thiserror::Error;

/// Minimum number of correspondences for a well-posed fit.
pub const MIN_CONTROL_POINTS: usize = 3;

const PINV_EPSILON: f64 = 1e-10;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TpsError {
    #[error("too few control points: need {needed}, got {got}")]
    TooFewPoints { needed: usize, got: usize },
    #[error("control point count mismatch: {source_len} source vs {target_len} target")]
    LengthMismatch { source_len: usize, target_len: usize },
    #[error("non-finite control point coordinate")]
    NonFinite,
    #[error("numerical failure: {0}")]
    Numerical(String),
}

/// A fitted spline mapping `source_points` onto `target_points`.
#[derive(Debug, Clone)]
pub struct TpsModel {
    source_points: Vec<[f64; 2]>,
    target_points: Vec<[f64; 2]>,
    /// (n + 3) × 2: n radial weights followed by the affine rows for [1, x, y].
    weights: DMatrix<f64>,
}

/// Radial basis `r² ln r²`, zero at the origin.
#[inline]
fn kernel(r2: f64) -> f64 {
    if r2 > 0.0 {
        r2 * r2.ln()
    } else {
        0.0
    }
}

#[inline]
fn squared_distance(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

impl TpsModel {
    /// Fit a spline that maps each source point onto its target point.
    pub fn fit(source_points: &[[f64; 2]], target_points: &[[f64; 2]]) -> Result<Self, TpsError> {
        let n = source_points.len();
        if n != target_points.len() {
            return Err(TpsError::LengthMismatch {
                source_len: n,
                target_len: target_points.len(),
            });
        }
        if n < MIN_CONTROL_POINTS {
            return Err(TpsError::TooFewPoints {
                needed: MIN_CONTROL_POINTS,
                got: n,
            });
        }
        if source_points
            .iter()
            .chain(target_points.iter())
            .any(|p| !p[0].is_finite() || !p[1].is_finite())
        {
            return Err(TpsError::NonFinite);
        }

        let size = n + 3;
        let mut l = DMatrix::<f64>::zeros(size, size);
        let mut y = DMatrix::<f64>::zeros(size, 2);

        for i in 0..n {
            for j in (i + 1)..n {
                let u = kernel(squared_distance(&source_points[i], &source_points[j]));
                l[(i, j)] = u;
                l[(j, i)] = u;
            }

            let [sx, sy] = source_points[i];
            l[(i, n)] = 1.0;
            l[(i, n + 1)] = sx;
            l[(i, n + 2)] = sy;
            l[(n, i)] = 1.0;
            l[(n + 1, i)] = sx;
            l[(n + 2, i)] = sy;

            y[(i, 0)] = target_points[i][0];
            y[(i, 1)] = target_points[i][1];
        }

        let weights = match l.clone().lu().solve(&y) {
            Some(w) if w.iter().all(|v| v.is_finite()) => w,
            _ => {
                tracing::debug!(points = n, "TPS system singular, using pseudo-inverse");
                let pinv = l
                    .pseudo_inverse(PINV_EPSILON)
                    .map_err(|e| TpsError::Numerical(e.to_string()))?;
                let w = pinv * &y;
                if !w.iter().all(|v| v.is_finite()) {
                    return Err(TpsError::Numerical(
                        "pseudo-inverse produced non-finite weights".into(),
                    ));
                }
                w
            }
        };

        Ok(Self {
            source_points: source_points.to_vec(),
            target_points: target_points.to_vec(),
            weights,
        })
    }

    pub fn source_points(&self) -> &[[f64; 2]] {
        &self.source_points
    }

    pub fn target_points(&self) -> &[[f64; 2]] {
        &self.target_points
    }

    pub fn weights(&self) -> &DMatrix<f64> {
        &self.weights
    }

    /// Map one point through the spline.
    pub fn transform_point(&self, p: [f64; 2]) -> [f64; 2] {
        let n = self.source_points.len();
        let w = &self.weights;

        let mut out = [
            w[(n, 0)] + w[(n + 1, 0)] * p[0] + w[(n + 2, 0)] * p[1],
            w[(n, 1)] + w[(n + 1, 1)] * p[0] + w[(n + 2, 1)] * p[1],
        ];

        for (j, s) in self.source_points.iter().enumerate() {
            let u = kernel(squared_distance(&p, s));
            if u != 0.0 {
                out[0] += w[(j, 0)] * u;
                out[1] += w[(j, 1)] * u;
            }
        }

        out
    }

    /// Map a batch of points through the spline.
    pub fn transform(&self, points: &[[f64; 2]]) -> Vec<[f64; 2]> {
        points.iter().map(|&p| self.transform_point(p)).collect()
    }
}
