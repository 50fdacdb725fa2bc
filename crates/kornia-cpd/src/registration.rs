use crate::affine::AffineTransform2d;
use crate::engine::Cpd;
use crate::error::CpdError;
use crate::estimator::Estimator;
use crate::params::{ConvergenceCriteria, CpdParams};
use crate::pointcloud::PointCloud2d;

/// Result of a registration run.
///
/// The transform maps the source onto the target frame.
#[derive(Debug, Clone)]
pub struct CpdResult<T> {
    /// Estimated transform.
    pub transform: T,
    /// Source points under the estimated transform.
    pub transformed: Vec<[f64; 2]>,
    /// Final variance of the mixture.
    pub sigma2: f64,
    /// Final objective.
    pub error: f64,
    /// The total number of iterations performed.
    pub num_iterations: usize,
    /// Whether the change of the objective fell below the criteria tolerance.
    pub converged: bool,
}

/// Drive a session until convergence or until the iteration budget is spent.
///
/// # Arguments
///
/// * `cpd` - Registration session, possibly already stepped.
/// * `criteria` - Stopping policy.
///
/// # Returns
///
/// The state of the session when the loop stopped. Running out of iterations is not
/// an error, check [`CpdResult::converged`].
pub fn register<E: Estimator>(
    cpd: &mut Cpd<E>,
    criteria: &ConvergenceCriteria,
) -> Result<CpdResult<E::Transform>, CpdError> {
    let mut converged = false;

    for _ in 0..criteria.max_iterations {
        // NOTE: for debugging purposes, we measure the time taken for each iteration
        let now = std::time::Instant::now();
        let summary = cpd.step()?;
        log::debug!("elapsed: {:?}", now.elapsed());

        if summary.diff < criteria.tolerance {
            log::info!(
                "CPD converged in {} iterations with error {}",
                summary.iteration,
                summary.error
            );
            converged = true;
            break;
        }
    }

    if !converged {
        log::info!(
            "CPD stopped after {} iterations, diff {}",
            cpd.iteration(),
            cpd.diff()
        );
    }

    Ok(CpdResult {
        transform: cpd.transform(),
        transformed: cpd.transformed().to_vec(),
        sigma2: cpd.sigma2(),
        error: cpd.error(),
        num_iterations: cpd.iteration(),
        converged,
    })
}

/// Affine registration of `source` onto `target` in one call.
pub fn register_affine(
    target: PointCloud2d,
    source: PointCloud2d,
    params: CpdParams,
    criteria: &ConvergenceCriteria,
) -> Result<CpdResult<AffineTransform2d>, CpdError> {
    let mut cpd = Cpd::affine(target, source, params)?;
    register(&mut cpd, criteria)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_register_translation() -> Result<(), CpdError> {
        let source = vec![
            [0.0, 0.0],
            [4.0, 0.5],
            [1.0, 3.0],
            [5.0, 4.0],
            [2.5, 6.0],
            [-1.0, 2.0],
        ];
        let target = source
            .iter()
            .map(|p| [p[0] + 0.3, p[1] - 0.2])
            .collect::<Vec<_>>();

        let result = register_affine(
            PointCloud2d::new(target)?,
            PointCloud2d::new(source)?,
            CpdParams::default(),
            &ConvergenceCriteria {
                max_iterations: 200,
                tolerance: 1e-8,
            },
        )?;

        assert!(result.num_iterations > 0);
        assert_relative_eq!(result.transform.translation[0], 0.3, epsilon = 1e-3);
        assert_relative_eq!(result.transform.translation[1], -0.2, epsilon = 1e-3);
        assert!(result.sigma2 > 0.0);
        Ok(())
    }

    #[test]
    fn test_register_respects_budget() -> Result<(), CpdError> {
        let source = vec![[0.0, 0.0], [4.0, 0.5], [1.0, 3.0], [5.0, 4.0]];
        let target = vec![[1.0, 0.0], [4.0, 1.5], [1.0, 4.0], [6.0, 4.0]];
        let result = register_affine(
            PointCloud2d::new(target)?,
            PointCloud2d::new(source)?,
            CpdParams::default(),
            &ConvergenceCriteria {
                max_iterations: 3,
                tolerance: 1e-300,
            },
        )?;
        assert_eq!(result.num_iterations, 3);
        assert!(!result.converged);
        Ok(())
    }
}
