use crate::error::CpdError;

/// Number of coordinates per point handled by the registration engine.
pub const DIM: usize = 2;

/// A non-empty cloud of 2d points.
///
/// The engine is specialized to two dimensions, so every constructor that accepts
/// untyped rows checks the dimensionality of the input.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<[f64; 2]>")]
pub struct PointCloud2d(Vec<[f64; 2]>);

impl PointCloud2d {
    /// Create a point cloud from a list of 2d points.
    ///
    /// Fails on an empty list or on any NaN or infinite coordinate.
    pub fn new(points: Vec<[f64; 2]>) -> Result<Self, CpdError> {
        if points.is_empty() {
            return Err(CpdError::EmptyPointCloud);
        }
        if let Some(index) = points
            .iter()
            .position(|p| !(p[0].is_finite() && p[1].is_finite()))
        {
            return Err(CpdError::NonFiniteCoordinate { index });
        }
        Ok(Self(points))
    }

    /// Create a point cloud from rows of coordinates.
    ///
    /// Every row must hold exactly two coordinates.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, CpdError> {
        let points = rows
            .iter()
            .map(|row| match row.as_ref() {
                [x, y] => Ok([*x, *y]),
                other => Err(CpdError::InvalidDimension {
                    expected: DIM,
                    actual: other.len(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(points)
    }

    /// Create a point cloud from a row-major buffer with `dims` coordinates per point.
    pub fn from_flat(data: Vec<f64>, dims: usize) -> Result<Self, CpdError> {
        if dims != DIM {
            return Err(CpdError::InvalidDimension {
                expected: DIM,
                actual: dims,
            });
        }
        if data.len() % DIM != 0 {
            return Err(CpdError::InvalidBufferLength {
                len: data.len(),
                dims: DIM,
            });
        }
        let points = data.chunks_exact(DIM).map(|c| [c[0], c[1]]).collect();
        Self::new(points)
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 2]] {
        &self.0
    }

    /// Unweighted centroid of the points.
    pub fn centroid(&self) -> [f64; 2] {
        let n = self.0.len() as f64;
        let (sx, sy) = self
            .0
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
        [sx / n, sy / n]
    }

    /// Consume the point cloud and return its points.
    pub fn into_points(self) -> Vec<[f64; 2]> {
        self.0
    }
}

impl TryFrom<Vec<Vec<f64>>> for PointCloud2d {
    type Error = CpdError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        Self::from_rows(&rows)
    }
}

impl TryFrom<Vec<[f64; 2]>> for PointCloud2d {
    type Error = CpdError;

    fn try_from(points: Vec<[f64; 2]>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<PointCloud2d> for Vec<[f64; 2]> {
    fn from(cloud: PointCloud2d) -> Self {
        cloud.0
    }
}

impl std::ops::Deref for PointCloud2d {
    type Target = [[f64; 2]];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
