use glam::{DMat2, DVec2};

use crate::error::CpdError;

/// Relative threshold under which a 2x2 determinant is treated as zero.
pub const SINGULAR_EPSILON: f64 = 1e-12;

/// Squared euclidean distance between two 2d points.
#[inline]
pub fn squared_distance(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

/// Trace of a 2x2 matrix.
#[inline]
pub fn trace(m: &DMat2) -> f64 {
    m.x_axis.x + m.y_axis.y
}

/// Outer product `u * v^T`.
#[inline]
pub fn outer(u: DVec2, v: DVec2) -> DMat2 {
    DMat2::from_cols(u * v.x, u * v.y)
}

/// Solve `lhs * X = rhs` for a 2x2 `X` using the closed-form cofactor inverse.
///
/// The determinant is compared against the magnitude of `lhs` so that the check
/// does not depend on the units of the input points.
///
/// # Errors
///
/// [`CpdError::SingularCovariance`] when `lhs` is singular or not finite.
pub fn solve_2x2(lhs: &DMat2, rhs: &DMat2) -> Result<DMat2, CpdError> {
    let det = lhs.determinant();
    let scale = lhs
        .to_cols_array()
        .iter()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));

    if !det.is_finite() || scale == 0.0 || det.abs() <= SINGULAR_EPSILON * scale * scale {
        return Err(CpdError::SingularCovariance { determinant: det });
    }

    // adj(lhs) / det
    let (a, b) = (lhs.x_axis.x, lhs.y_axis.x);
    let (c, d) = (lhs.x_axis.y, lhs.y_axis.y);
    let inv = DMat2::from_cols(DVec2::new(d, -c), DVec2::new(-b, a)) * (1.0 / det);

    Ok(inv * *rhs)
}

/// Build a matrix from row-major storage.
#[inline]
pub fn mat2_from_rows(rows: &[[f64; 2]; 2]) -> DMat2 {
    DMat2::from_cols_array_2d(rows).transpose()
}

/// Row-major storage of a matrix.
#[inline]
pub fn mat2_to_rows(m: &DMat2) -> [[f64; 2]; 2] {
    m.transpose().to_cols_array_2d()
}

/// Apply `p -> p * m + t` (row vector convention) to every point.
pub fn transform_points2d(points: &[[f64; 2]], m: &DMat2, t: DVec2) -> Vec<[f64; 2]> {
    let mt = m.transpose();
    points
        .iter()
        .map(|p| {
            let q = mt * DVec2::from_array(*p) + t;
            [q.x, q.y]
        })
        .collect()
}
