use glam::{DMat2, DVec2};

use crate::error::CpdError;
use crate::estimator::{CenteredMoments, CorrespondenceStats, Estimator, VarianceUpdate};
use crate::linalg;
use crate::pointcloud::DIM;

/// A 2d affine transform `y -> y * linear + translation` (row vector convention).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AffineTransform2d {
    /// Linear part, row-major.
    pub linear: [[f64; 2]; 2],
    /// Translation added after the linear map.
    pub translation: [f64; 2],
}

impl Default for AffineTransform2d {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform2d {
    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            linear: [[1.0, 0.0], [0.0, 1.0]],
            translation: [0.0, 0.0],
        }
    }

    /// Apply the transform to a set of points.
    pub fn apply(&self, points: &[[f64; 2]]) -> Vec<[f64; 2]> {
        linalg::transform_points2d(
            points,
            &linalg::mat2_from_rows(&self.linear),
            DVec2::from_array(self.translation),
        )
    }
}

/// Maximization step for the affine transform family.
///
/// The linear part is obtained by solving a 2x2 system in closed form, which restricts
/// this estimator to two dimensional point sets.
#[derive(Debug, Clone)]
pub struct AffineEstimator {
    b: DMat2,
    t: DVec2,
}

impl Default for AffineEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl AffineEstimator {
    /// Create an estimator starting from the identity transform.
    pub fn new() -> Self {
        Self::with_initial(AffineTransform2d::identity())
    }

    /// Create an estimator starting from an initial guess.
    pub fn with_initial(initial: AffineTransform2d) -> Self {
        Self {
            b: linalg::mat2_from_rows(&initial.linear),
            t: DVec2::from_array(initial.translation),
        }
    }
}

impl Estimator for AffineEstimator {
    type Transform = AffineTransform2d;
    type Fit = CenteredMoments;

    fn update_transform(
        &mut self,
        stats: &CorrespondenceStats,
        target: &[[f64; 2]],
        source: &[[f64; 2]],
    ) -> Result<Self::Fit, CpdError> {
        let moments = CenteredMoments::compute(stats, target, source)?;

        // YPY^T * B = A^T
        let b = linalg::solve_2x2(&moments.ypy.transpose(), &moments.a.transpose())?;
        let t = moments.mu_x - b.transpose() * moments.mu_y;

        if !b.is_finite() || !t.is_finite() {
            return Err(CpdError::SingularCovariance {
                determinant: moments.ypy.determinant(),
            });
        }

        self.b = b;
        self.t = t;

        Ok(moments)
    }

    fn transform_point_cloud(&self, points: &[[f64; 2]]) -> Vec<[f64; 2]> {
        linalg::transform_points2d(points, &self.b, self.t)
    }

    fn update_variance(
        &self,
        fit: &Self::Fit,
        stats: &CorrespondenceStats,
        sigma2: f64,
    ) -> VarianceUpdate {
        let d = DIM as f64;
        let tr_ab = linalg::trace(&(fit.a * self.b));
        let tr_bypyp = linalg::trace(&(self.b * fit.ypy * self.b));

        let error = (fit.xpx - 2.0 * tr_ab + tr_bypyp) / (2.0 * sigma2)
            + d * stats.np / 2.0 * sigma2.ln();

        VarianceUpdate {
            error,
            sigma2: (fit.xpx - tr_ab) / (stats.np * d),
        }
    }

    fn transform(&self) -> Self::Transform {
        AffineTransform2d {
            linear: linalg::mat2_to_rows(&self.b),
            translation: self.t.to_array(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Hard one-to-one correspondences between clouds of equal size.
    fn identity_stats(n: usize) -> CorrespondenceStats {
        let mut stats = CorrespondenceStats::zeros(n, n);
        for i in 0..n {
            stats.p.write(i, i, 1.0);
        }
        stats.p1 = vec![1.0; n];
        stats.pt1 = vec![1.0; n];
        stats.np = n as f64;
        stats
    }

    #[test]
    fn test_affine_apply() {
        let tf = AffineTransform2d {
            linear: [[2.0, 0.0], [0.0, 3.0]],
            translation: [1.0, -1.0],
        };
        let out = tf.apply(&[[1.0, 1.0], [0.0, 2.0]]);
        assert_eq!(out, vec![[3.0, 2.0], [1.0, 5.0]]);
    }

    #[test]
    fn test_update_transform_exact_correspondences() -> Result<(), CpdError> {
        let source = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [2.0, 3.0], [-1.0, 4.0]];
        let expected = AffineTransform2d {
            linear: [[1.1, 0.3], [-0.2, 0.9]],
            translation: [4.0, -2.0],
        };
        let target = expected.apply(&source);

        let stats = identity_stats(source.len());
        let mut estimator = AffineEstimator::new();
        let fit = estimator.update_transform(&stats, &target, &source)?;
        let tf = estimator.transform();

        for i in 0..2 {
            assert_relative_eq!(tf.translation[i], expected.translation[i], epsilon = 1e-9);
            for j in 0..2 {
                assert_relative_eq!(tf.linear[i][j], expected.linear[i][j], epsilon = 1e-9);
            }
        }

        // perfect fit leaves no residual variance
        let update = estimator.update_variance(&fit, &stats, 1.0);
        assert_relative_eq!(update.sigma2, 0.0, epsilon = 1e-9);

        let ty = estimator.transform_point_cloud(&source);
        for (p, q) in ty.iter().zip(target.iter()) {
            assert_relative_eq!(p[0], q[0], epsilon = 1e-9);
            assert_relative_eq!(p[1], q[1], epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_update_transform_collinear_source() {
        let source = [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]];
        let target = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        let stats = identity_stats(3);
        let mut estimator = AffineEstimator::new();
        let res = estimator.update_transform(&stats, &target, &source);
        assert!(matches!(res, Err(CpdError::SingularCovariance { .. })));
        // the transform is untouched by a failed update
        assert_eq!(estimator.transform(), AffineTransform2d::identity());
    }
}
