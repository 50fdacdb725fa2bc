use crate::error::CpdError;

/// Parameters of a registration session.
///
/// Missing fields take their default values when deserialized, so a partial
/// configuration document is enough to set up a session.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CpdParams {
    /// Initial variance of the Gaussian mixture. Estimated from the clouds when `None`.
    pub sigma2: Option<f64>,
    /// Convergence tolerance on the change of the objective between two iterations.
    pub tolerance: f64,
    /// Weight of the uniform noise component, in [0, 1).
    pub w: f64,
}

impl Default for CpdParams {
    fn default() -> Self {
        Self {
            sigma2: None,
            tolerance: 1e-3,
            w: 0.0,
        }
    }
}

impl CpdParams {
    /// Set the initial variance.
    pub fn with_sigma2(mut self, sigma2: f64) -> Self {
        self.sigma2 = Some(sigma2);
        self
    }

    /// Set the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the uniform noise weight.
    pub fn with_noise_weight(mut self, w: f64) -> Self {
        self.w = w;
        self
    }

    /// Check the parameters before any iteration runs.
    ///
    /// `w == 1` is rejected: the noise constant divides by `1 - w`.
    pub fn validate(&self) -> Result<(), CpdError> {
        if let Some(sigma2) = self.sigma2 {
            if !sigma2.is_finite() || sigma2 <= 0.0 {
                return Err(CpdError::InvalidVariance(sigma2));
            }
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(CpdError::InvalidTolerance(self.tolerance));
        }
        if !(0.0..1.0).contains(&self.w) {
            return Err(CpdError::InvalidNoiseWeight(self.w));
        }
        Ok(())
    }

    /// Value the variance is reset to when the estimate collapses to zero or below.
    #[inline]
    pub fn sigma2_floor(&self) -> f64 {
        self.tolerance / 10.0
    }
}

/// Stopping policy used by [`crate::register`].
///
/// The engine never stops by itself; this is the caller side of the loop.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConvergenceCriteria {
    /// Maximum number of iterations to perform.
    pub max_iterations: usize,
    /// Stop once the change of the objective falls below this value.
    pub tolerance: f64,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_are_valid() -> Result<(), CpdError> {
        let params = CpdParams::default();
        params.validate()?;
        assert_eq!(params.sigma2, None);
        assert_eq!(params.tolerance, 1e-3);
        assert_eq!(params.w, 0.0);
        assert_eq!(params.sigma2_floor(), 1e-4);
        Ok(())
    }

    #[test]
    fn test_invalid_params() {
        let invalid = [
            (
                CpdParams::default().with_sigma2(0.0),
                CpdError::InvalidVariance(0.0),
            ),
            (
                CpdParams::default().with_sigma2(-1.0),
                CpdError::InvalidVariance(-1.0),
            ),
            (
                CpdParams::default().with_tolerance(0.0),
                CpdError::InvalidTolerance(0.0),
            ),
            (
                CpdParams::default().with_noise_weight(1.0),
                CpdError::InvalidNoiseWeight(1.0),
            ),
            (
                CpdParams::default().with_noise_weight(-0.1),
                CpdError::InvalidNoiseWeight(-0.1),
            ),
        ];
        for (params, expected) in invalid {
            assert_eq!(params.validate(), Err(expected));
        }
        assert!(CpdParams::default()
            .with_tolerance(f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_params_partial_json() -> Result<(), Box<dyn std::error::Error>> {
        let params: CpdParams = serde_json::from_str(r#"{ "w": 0.2 }"#)?;
        assert_eq!(params.w, 0.2);
        assert_eq!(params.tolerance, 1e-3);
        assert_eq!(params.sigma2, None);

        let criteria: ConvergenceCriteria = serde_json::from_str(r#"{ "max_iterations": 7 }"#)?;
        assert_eq!(criteria.max_iterations, 7);
        assert_eq!(criteria.tolerance, 1e-3);
        Ok(())
    }
}
