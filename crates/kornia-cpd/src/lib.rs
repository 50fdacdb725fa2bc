#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod error;
pub use error::CpdError;

/// Two dimensional point clouds.
pub mod pointcloud;
pub use pointcloud::PointCloud2d;

/// Session parameters and stopping criteria.
pub mod params;
pub use params::{ConvergenceCriteria, CpdParams};

/// Closed-form 2x2 linear algebra used by the estimators.
pub mod linalg;

/// Expectation-Maximization engine.
pub mod engine;
pub use engine::{Cpd, IterationSummary};

/// Maximization strategies shared interface.
pub mod estimator;
pub use estimator::{CenteredMoments, CorrespondenceStats, Estimator, VarianceUpdate};

mod affine;
pub use affine::{AffineEstimator, AffineTransform2d};

mod rigid;
pub use rigid::{RigidEstimator, RigidFit, SimilarityTransform2d};

mod registration;
pub use registration::{register, register_affine, CpdResult};
