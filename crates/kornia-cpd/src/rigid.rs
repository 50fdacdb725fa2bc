use glam::{DMat2, DVec2};

use crate::error::CpdError;
use crate::estimator::{CenteredMoments, CorrespondenceStats, Estimator, VarianceUpdate};
use crate::linalg;
use crate::pointcloud::DIM;

/// A 2d similarity transform `y -> scale * y * rotation + translation`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SimilarityTransform2d {
    /// Rotation angle in radians, counter-clockwise.
    pub angle: f64,
    /// Rotation part, row-major, applied to row vectors.
    pub rotation: [[f64; 2]; 2],
    /// Isotropic scale. Always 1 for a rigid estimator.
    pub scale: f64,
    /// Translation added after rotation and scaling.
    pub translation: [f64; 2],
}

impl SimilarityTransform2d {
    /// Apply the transform to a set of points.
    pub fn apply(&self, points: &[[f64; 2]]) -> Vec<[f64; 2]> {
        linalg::transform_points2d(
            points,
            &(linalg::mat2_from_rows(&self.rotation) * self.scale),
            DVec2::from_array(self.translation),
        )
    }
}

/// Rotation matrix acting on row vectors: `y * r` rotates `y` by `angle`.
fn rotation_from_angle(angle: f64) -> DMat2 {
    let (s, c) = angle.sin_cos();
    linalg::mat2_from_rows(&[[c, s], [-s, c]])
}

/// Maximization step for rigid (rotation + translation) and similarity transforms.
///
/// In two dimensions the optimal rotation has a closed form: the angle maximizing
/// `trace(A R)` is `atan2(A10 - A01, A00 + A11)`.
#[derive(Debug, Clone)]
pub struct RigidEstimator {
    estimate_scale: bool,
    angle: f64,
    s: f64,
    t: DVec2,
}

impl RigidEstimator {
    /// Rigid estimator: the scale stays fixed at 1.
    pub fn rigid() -> Self {
        Self {
            estimate_scale: false,
            angle: 0.0,
            s: 1.0,
            t: DVec2::ZERO,
        }
    }

    /// Similarity estimator: an isotropic scale is estimated as well.
    pub fn similarity() -> Self {
        Self {
            estimate_scale: true,
            ..Self::rigid()
        }
    }

    /// Start from an initial guess instead of the identity.
    pub fn with_initial(mut self, angle: f64, scale: f64, translation: [f64; 2]) -> Self {
        self.angle = angle;
        self.s = scale;
        self.t = DVec2::from_array(translation);
        self
    }
}

/// Intermediate quantities of the rigid M-step.
#[derive(Debug, Clone)]
pub struct RigidFit {
    moments: CenteredMoments,
    tr_ar: f64,
    ypy: f64,
}

impl Estimator for RigidEstimator {
    type Transform = SimilarityTransform2d;
    type Fit = RigidFit;

    fn update_transform(
        &mut self,
        stats: &CorrespondenceStats,
        target: &[[f64; 2]],
        source: &[[f64; 2]],
    ) -> Result<Self::Fit, CpdError> {
        let moments = CenteredMoments::compute(stats, target, source)?;
        let a = &moments.a;

        let angle = (a.x_axis.y - a.y_axis.x).atan2(a.x_axis.x + a.y_axis.y);
        let r = rotation_from_angle(angle);
        let tr_ar = linalg::trace(&(*a * r));
        let ypy = linalg::trace(&moments.ypy);

        let s = if self.estimate_scale {
            if !ypy.is_finite() || ypy <= f64::EPSILON {
                return Err(CpdError::SingularCovariance { determinant: ypy });
            }
            tr_ar / ypy
        } else {
            1.0
        };

        self.angle = angle;
        self.s = s;
        self.t = moments.mu_x - r.transpose() * moments.mu_y * s;

        Ok(RigidFit { moments, tr_ar, ypy })
    }

    fn transform_point_cloud(&self, points: &[[f64; 2]]) -> Vec<[f64; 2]> {
        linalg::transform_points2d(points, &(rotation_from_angle(self.angle) * self.s), self.t)
    }

    fn update_variance(
        &self,
        fit: &Self::Fit,
        stats: &CorrespondenceStats,
        sigma2: f64,
    ) -> VarianceUpdate {
        let d = DIM as f64;
        let residual = fit.moments.xpx - 2.0 * self.s * fit.tr_ar + self.s * self.s * fit.ypy;

        VarianceUpdate {
            error: residual / (2.0 * sigma2) + d * stats.np / 2.0 * sigma2.ln(),
            sigma2: residual / (stats.np * d),
        }
    }

    fn transform(&self) -> Self::Transform {
        SimilarityTransform2d {
            angle: self.angle,
            rotation: linalg::mat2_to_rows(&rotation_from_angle(self.angle)),
            scale: self.s,
            translation: self.t.to_array(),
        }
    }
}
