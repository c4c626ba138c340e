use nalgebra::{DVector, Point3, Vector3};

/// Ordered list of 3-D points. The position in the list is the anatomical
/// point index shared by every member of a corpus.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointSet {
    pub points: Vec<Point3<f64>>,
}

impl PointSet {
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }

    pub fn from_tuples(coords: &[(f64, f64, f64)]) -> Self {
        Self {
            points: coords
                .iter()
                .map(|&(x, y, z)| Point3::new(x, y, z))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point-major flattening: `x0, y0, z0, x1, y1, z1, ...`.
    pub fn to_flat(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.points.len() * 3,
            self.points.iter().flat_map(|p| [p.x, p.y, p.z]),
        )
    }

    /// Inverse of [`PointSet::to_flat`]. A trailing partial triple is ignored.
    pub fn from_flat(flat: &[f64]) -> Self {
        Self {
            points: flat
                .chunks_exact(3)
                .map(|c| Point3::new(c[0], c[1], c[2]))
                .collect(),
        }
    }

    /// Index of the first point with a NaN or infinite coordinate.
    pub fn first_non_finite(&self) -> Option<usize> {
        self.points
            .iter()
            .position(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()))
    }

    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.points.is_empty() {
            return None;
        }
        let sum = self
            .points
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords);
        Some(Point3::from(sum / self.points.len() as f64))
    }

    pub fn as_tuples(&self) -> Vec<(f64, f64, f64)> {
        self.points.iter().map(|p| (p.x, p.y, p.z)).collect()
    }
}

impl From<Vec<Point3<f64>>> for PointSet {
    fn from(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }
}

/// Splits a flat point-major vector into per-point displacement vectors.
pub fn flat_to_vectors(flat: &[f64]) -> Vec<Vector3<f64>> {
    flat.chunks_exact(3)
        .map(|c| Vector3::new(c[0], c[1], c[2]))
        .collect()
}
