use crate::affine::AffineEstimator;
use crate::error::CpdError;
use crate::estimator::{CorrespondenceStats, Estimator, VarianceUpdate};
use crate::linalg::squared_distance;
use crate::params::CpdParams;
use crate::pointcloud::{PointCloud2d, DIM};

/// State reported after every EM step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationSummary {
    /// Number of steps performed so far, this one included.
    pub iteration: usize,
    /// Objective after the step.
    pub error: f64,
    /// Absolute change of the objective with respect to the previous step.
    pub diff: f64,
    /// Variance of the mixture after the step.
    pub sigma2: f64,
    /// Effective number of matched points used by the step.
    pub np: f64,
}

/// Initial variance: mean squared distance between every target and source point,
/// divided by the dimensionality.
pub fn initial_sigma2(target: &[[f64; 2]], source: &[[f64; 2]]) -> f64 {
    let sum = source
        .iter()
        .map(|y| target.iter().map(|x| squared_distance(x, y)).sum::<f64>())
        .sum::<f64>();
    sum / (DIM * target.len() * source.len()) as f64
}

/// Coherent Point Drift registration session.
///
/// The session aligns a movable `source` cloud (M points) onto a fixed `target` cloud
/// (N points) by Expectation-Maximization over a Gaussian mixture centered on the
/// transformed source points. The transform family is chosen by the [`Estimator`].
///
/// The session never stops by itself: every call to [`Cpd::step`] (or to `next` on the
/// iterator) performs one more EM step. The caller decides when to stop, usually when
/// [`Cpd::diff`] falls below the tolerance or after a fixed number of iterations.
///
/// Example:
///
/// ```no_run
/// use kornia_cpd::{Cpd, CpdParams, PointCloud2d};
///
/// let target = PointCloud2d::new(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 2.0]])?;
/// let source = PointCloud2d::new(vec![[0.1, 0.0], [1.1, 0.1], [0.0, 1.2], [1.2, 2.1]])?;
/// let mut cpd = Cpd::affine(target, source, CpdParams::default())?;
/// for _ in 0..100 {
///     let summary = cpd.step()?;
///     if summary.diff < cpd.params().tolerance {
///         break;
///     }
/// }
/// println!("{:?}", cpd.transform());
/// # Ok::<(), kornia_cpd::CpdError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Cpd<E: Estimator> {
    target: PointCloud2d,
    source: PointCloud2d,
    transformed: Vec<[f64; 2]>,
    params: CpdParams,
    estimator: E,
    stats: CorrespondenceStats,
    sigma2: f64,
    error: f64,
    diff: f64,
    iteration: usize,
}

impl Cpd<AffineEstimator> {
    /// Create an affine registration session starting from the identity transform.
    pub fn affine(
        target: PointCloud2d,
        source: PointCloud2d,
        params: CpdParams,
    ) -> Result<Self, CpdError> {
        Self::new(target, source, params, AffineEstimator::new())
    }
}

impl<E: Estimator> Cpd<E> {
    /// Create a registration session.
    ///
    /// # Arguments
    ///
    /// * `target` - Fixed point cloud.
    /// * `source` - Point cloud moved onto the target.
    /// * `params` - Initial variance, tolerance and noise weight.
    /// * `estimator` - Maximization strategy, holding the initial transform.
    ///
    /// # Errors
    ///
    /// Fails when the parameters are invalid, before any iteration runs.
    pub fn new(
        target: PointCloud2d,
        source: PointCloud2d,
        params: CpdParams,
        estimator: E,
    ) -> Result<Self, CpdError> {
        params.validate()?;

        let sigma2 = match params.sigma2 {
            Some(sigma2) => sigma2,
            None => {
                let sigma2 = initial_sigma2(target.points(), source.points());
                if sigma2 > 0.0 {
                    sigma2
                } else {
                    log::warn!("Clouds coincide, starting from the variance floor");
                    params.sigma2_floor()
                }
            }
        };

        let transformed = estimator.transform_point_cloud(source.points());
        let stats = CorrespondenceStats::zeros(source.len(), target.len());

        log::debug!(
            "CPD session: N={} M={} sigma2={} tolerance={} w={}",
            target.len(),
            source.len(),
            sigma2,
            params.tolerance,
            params.w
        );

        Ok(Self {
            target,
            source,
            transformed,
            params,
            estimator,
            stats,
            sigma2,
            error: f64::INFINITY,
            diff: f64::INFINITY,
            iteration: 0,
        })
    }

    /// Perform one full EM step.
    ///
    /// On failure the session keeps the state of the last successful step.
    pub fn step(&mut self) -> Result<IterationSummary, CpdError> {
        let stats = self.expectation()?;
        self.maximization(stats)?;
        self.iteration += 1;

        log::debug!(
            "Iteration: {} error: {} diff: {} sigma2: {} Np: {}",
            self.iteration,
            self.error,
            self.diff,
            self.sigma2,
            self.stats.np
        );

        Ok(self.summary())
    }

    /// Compute the soft correspondences between the transformed source and the target.
    fn expectation(&self) -> Result<CorrespondenceStats, CpdError> {
        let target = self.target.points();
        let (m, n) = (self.transformed.len(), target.len());
        let d = DIM as f64;
        let w = self.params.w;

        // uniform noise term of the mixture
        let c = (2.0 * std::f64::consts::PI * self.sigma2).powf(d / 2.0) * w / (1.0 - w)
            * m as f64
            / n as f64;

        let mut stats = CorrespondenceStats::zeros(m, n);
        let p = &mut stats.p;
        for (i, ty) in self.transformed.iter().enumerate() {
            for (j, x) in target.iter().enumerate() {
                p.write(i, j, (-squared_distance(ty, x) / (2.0 * self.sigma2)).exp());
            }
        }

        for j in 0..n {
            let den = (0..m).map(|i| p.read(i, j)).sum::<f64>().max(f64::EPSILON) + c;
            for i in 0..m {
                let v = p.read(i, j) / den;
                p.write(i, j, v);
                stats.pt1[j] += v;
                stats.p1[i] += v;
            }
        }
        stats.np = stats.p1.iter().sum();

        if !stats.np.is_finite() || stats.np <= f64::EPSILON {
            log::warn!("Correspondence mass vanished: Np={}", stats.np);
            return Err(CpdError::DegenerateCorrespondences { np: stats.np });
        }

        Ok(stats)
    }

    /// Update transform, transformed cloud and variance, in this order.
    fn maximization(&mut self, stats: CorrespondenceStats) -> Result<(), CpdError> {
        let fit = self
            .estimator
            .update_transform(&stats, self.target.points(), self.source.points())
            .inspect_err(|e| log::warn!("Maximization failed: {e}"))?;

        self.transformed = self.estimator.transform_point_cloud(self.source.points());

        let VarianceUpdate { error, sigma2 } =
            self.estimator.update_variance(&fit, &stats, self.sigma2);

        self.diff = (error - self.error).abs();
        self.error = error;

        self.sigma2 = if sigma2 > 0.0 {
            sigma2
        } else {
            log::warn!(
                "Variance collapsed to {}, resetting to {}",
                sigma2,
                self.params.sigma2_floor()
            );
            self.params.sigma2_floor()
        };

        self.stats = stats;
        Ok(())
    }

    /// Summary of the current state.
    pub fn summary(&self) -> IterationSummary {
        IterationSummary {
            iteration: self.iteration,
            error: self.error,
            diff: self.diff,
            sigma2: self.sigma2,
            np: self.stats.np,
        }
    }

    /// Whether the last change of the objective is below the session tolerance.
    ///
    /// This is a query only, the session keeps iterating when asked to.
    pub fn is_converged(&self) -> bool {
        self.diff < self.params.tolerance
    }

    /// Fixed point cloud.
    pub fn target(&self) -> &PointCloud2d {
        &self.target
    }

    /// Point cloud being moved.
    pub fn source(&self) -> &PointCloud2d {
        &self.source
    }

    /// Source cloud under the current transform.
    pub fn transformed(&self) -> &[[f64; 2]] {
        &self.transformed
    }

    /// Current variance of the mixture.
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    /// Current objective. Infinite before the first step.
    pub fn error(&self) -> f64 {
        self.error
    }

    /// Last change of the objective. Infinite before the first step.
    pub fn diff(&self) -> f64 {
        self.diff
    }

    /// Number of steps performed.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Correspondences computed by the last step.
    pub fn correspondences(&self) -> &CorrespondenceStats {
        &self.stats
    }

    /// Session parameters.
    pub fn params(&self) -> &CpdParams {
        &self.params
    }

    /// Maximization strategy.
    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    /// Current transform parameters.
    pub fn transform(&self) -> E::Transform {
        self.estimator.transform()
    }

    /// Apply the current transform to arbitrary points.
    pub fn transform_points(&self, points: &[[f64; 2]]) -> Vec<[f64; 2]> {
        self.estimator.transform_point_cloud(points)
    }
}

/// Unbounded sequence of EM steps: `next` always returns `Some`.
impl<E: Estimator> Iterator for Cpd<E> {
    type Item = Result<IterationSummary, CpdError>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.step())
    }
}
