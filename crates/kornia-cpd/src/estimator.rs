use glam::{DMat2, DVec2};

use crate::error::CpdError;
use crate::linalg;

/// Sufficient statistics of the soft correspondences computed by the E-step.
///
/// `p` has one row per source point and one column per target point.
#[derive(Debug, Clone)]
pub struct CorrespondenceStats {
    /// Posterior correspondence probabilities, shape (M, N).
    pub p: faer::Mat<f64>,
    /// Correspondence mass of every source point (sum over targets), length M.
    pub p1: Vec<f64>,
    /// Correspondence mass of every target point (sum over sources), length N.
    pub pt1: Vec<f64>,
    /// Effective number of matched points.
    pub np: f64,
}

impl CorrespondenceStats {
    /// Empty statistics for `m` source points and `n` target points.
    pub fn zeros(m: usize, n: usize) -> Self {
        Self {
            p: faer::Mat::zeros(m, n),
            p1: vec![0.0; m],
            pt1: vec![0.0; n],
            np: 0.0,
        }
    }
}

/// Weighted first and second moments of both clouds around their weighted centroids.
///
/// These are the quantities every linear transform family needs in its M-step.
#[derive(Debug, Clone)]
pub struct CenteredMoments {
    /// Weighted centroid of the target.
    pub mu_x: DVec2,
    /// Weighted centroid of the source.
    pub mu_y: DVec2,
    /// Cross covariance `X_hat^T P^T Y_hat`.
    pub a: DMat2,
    /// Weighted source covariance `Y_hat^T diag(P1) Y_hat`.
    pub ypy: DMat2,
    /// Weighted spread of the target `Pt1^T rowsum(X_hat * X_hat)`.
    pub xpx: f64,
}

impl CenteredMoments {
    /// Compute the moments of `target` and `source` under the correspondences.
    pub fn compute(
        stats: &CorrespondenceStats,
        target: &[[f64; 2]],
        source: &[[f64; 2]],
    ) -> Result<Self, CpdError> {
        let np = stats.np;
        if !np.is_finite() || np <= f64::EPSILON {
            return Err(CpdError::DegenerateCorrespondences { np });
        }

        let mu_x = target
            .iter()
            .zip(stats.pt1.iter())
            .fold(DVec2::ZERO, |acc, (x, w)| acc + DVec2::from_array(*x) * *w)
            / np;
        let mu_y = source
            .iter()
            .zip(stats.p1.iter())
            .fold(DVec2::ZERO, |acc, (y, w)| acc + DVec2::from_array(*y) * *w)
            / np;

        let x_hat = target
            .iter()
            .map(|x| DVec2::from_array(*x) - mu_x)
            .collect::<Vec<_>>();

        let mut a = DMat2::ZERO;
        let mut ypy = DMat2::ZERO;
        for (i, y) in source.iter().enumerate() {
            let y_hat = DVec2::from_array(*y) - mu_y;

            // sum_j P_ij * x_hat_j
            let px = x_hat
                .iter()
                .enumerate()
                .fold(DVec2::ZERO, |acc, (j, x)| acc + *x * stats.p.read(i, j));

            a += linalg::outer(px, y_hat);
            ypy += linalg::outer(y_hat, y_hat) * stats.p1[i];
        }

        let xpx = x_hat
            .iter()
            .zip(stats.pt1.iter())
            .map(|(x, w)| w * x.length_squared())
            .sum::<f64>();

        Ok(Self {
            mu_x,
            mu_y,
            a,
            ypy,
            xpx,
        })
    }
}

/// Outcome of the variance update of the M-step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarianceUpdate {
    /// Objective used as the convergence signal.
    pub error: f64,
    /// Re-estimated variance. May be non-positive; the engine applies the floor.
    pub sigma2: f64,
}

/// Maximization strategy for one family of transforms.
///
/// The engine calls the three operations in order on every iteration:
/// [`Estimator::update_transform`], [`Estimator::transform_point_cloud`] and
/// [`Estimator::update_variance`]. The estimator owns its transform parameters;
/// everything else is passed in explicitly.
pub trait Estimator {
    /// Parameters of the transform family.
    type Transform: Clone + std::fmt::Debug;

    /// Intermediate quantities shared between the transform and variance updates.
    type Fit;

    /// Re-estimate the transform from the correspondences.
    fn update_transform(
        &mut self,
        stats: &CorrespondenceStats,
        target: &[[f64; 2]],
        source: &[[f64; 2]],
    ) -> Result<Self::Fit, CpdError>;

    /// Apply the current transform to a set of points.
    fn transform_point_cloud(&self, points: &[[f64; 2]]) -> Vec<[f64; 2]>;

    /// Compute the objective and the new variance after a transform update.
    fn update_variance(
        &self,
        fit: &Self::Fit,
        stats: &CorrespondenceStats,
        sigma2: f64,
    ) -> VarianceUpdate;

    /// Current transform parameters.
    fn transform(&self) -> Self::Transform;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_centered_moments_one_to_one() -> Result<(), CpdError> {
        // identity correspondences between two points
        let target = [[0.0, 0.0], [2.0, 0.0]];
        let source = [[1.0, 1.0], [3.0, 1.0]];
        let mut stats = CorrespondenceStats::zeros(2, 2);
        stats.p.write(0, 0, 1.0);
        stats.p.write(1, 1, 1.0);
        stats.p1 = vec![1.0, 1.0];
        stats.pt1 = vec![1.0, 1.0];
        stats.np = 2.0;

        let m = CenteredMoments::compute(&stats, &target, &source)?;
        assert_relative_eq!(m.mu_x.x, 1.0);
        assert_relative_eq!(m.mu_x.y, 0.0);
        assert_relative_eq!(m.mu_y.x, 2.0);
        assert_relative_eq!(m.mu_y.y, 1.0);
        // x_hat = [-1, 0], [1, 0]; y_hat = [-1, 0], [1, 0]
        assert_eq!(linalg::mat2_to_rows(&m.a), [[2.0, 0.0], [0.0, 0.0]]);
        assert_eq!(linalg::mat2_to_rows(&m.ypy), [[2.0, 0.0], [0.0, 0.0]]);
        assert_relative_eq!(m.xpx, 2.0);
        Ok(())
    }

    #[test]
    fn test_centered_moments_no_mass() {
        let stats = CorrespondenceStats::zeros(1, 1);
        let res = CenteredMoments::compute(&stats, &[[0.0, 0.0]], &[[1.0, 1.0]]);
        assert!(matches!(
            res,
            Err(CpdError::DegenerateCorrespondences { .. })
        ));
    }
}
