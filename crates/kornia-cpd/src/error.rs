/// Errors raised while building or iterating a registration session.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum CpdError {
    /// The point cloud does not contain any point.
    #[error("Point cloud is empty")]
    EmptyPointCloud,

    /// A point does not have the number of coordinates the engine works with.
    #[error("Expected {expected}-dimensional points, got {actual}")]
    InvalidDimension {
        /// Dimensionality supported by the engine.
        expected: usize,
        /// Dimensionality found in the input.
        actual: usize,
    },

    /// A flat coordinate buffer does not split into whole points.
    #[error("Buffer of {len} values does not hold whole {dims}-dimensional points")]
    InvalidBufferLength {
        /// Number of values in the buffer.
        len: usize,
        /// Coordinates per point.
        dims: usize,
    },

    /// A point holds a NaN or infinite coordinate.
    #[error("Point {index} has a non-finite coordinate")]
    NonFiniteCoordinate {
        /// Position of the offending point in the cloud.
        index: usize,
    },

    /// The initial variance must be strictly positive and finite.
    #[error("Initial variance must be positive, got {0}")]
    InvalidVariance(f64),

    /// The convergence tolerance must be strictly positive and finite.
    #[error("Tolerance must be positive, got {0}")]
    InvalidTolerance(f64),

    /// The uniform noise weight must lie in [0, 1).
    #[error("Noise weight must lie in [0, 1), got {0}")]
    InvalidNoiseWeight(f64),

    /// The weighted source covariance cannot be inverted.
    #[error("Weighted source covariance is singular (determinant {determinant})")]
    SingularCovariance {
        /// Determinant (or scalar spread) that triggered the failure.
        determinant: f64,
    },

    /// The correspondence matrix lost all of its mass.
    #[error("Correspondences are degenerate (Np = {np})")]
    DegenerateCorrespondences {
        /// Effective number of matched points.
        np: f64,
    },
}
