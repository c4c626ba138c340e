pub mod normals;

use crate::error::{SsmError, SsmResult};
use crate::ssm::point_set::PointSet;
use nalgebra::Vector3;

pub use normals::recompute_mesh;

/// Triangle surface: points plus connectivity into them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    pub points: PointSet,
    pub triangles: Vec<[usize; 3]>,
}

impl Mesh {
    /// Builds a mesh after checking that every triangle index is in range.
    pub fn new(points: PointSet, triangles: Vec<[usize; 3]>) -> SsmResult<Self> {
        check_connectivity(points.len(), &triangles)?;
        Ok(Self { points, triangles })
    }

    /// Same connectivity on a new set of points of identical length.
    pub fn with_points(&self, points: PointSet) -> SsmResult<Self> {
        if points.len() != self.points.len() {
            return Err(SsmError::DimensionMismatch {
                what: "mesh point count",
                expected: self.points.len(),
                found: points.len(),
            });
        }
        Ok(Self {
            points,
            triangles: self.triangles.clone(),
        })
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

/// Renderable state derived from a point set and a connectivity: the
/// points, the triangles, and freshly computed normals.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshGeometry {
    pub points: PointSet,
    pub triangles: Vec<[usize; 3]>,
    /// One unit normal per point, zero for points no triangle touches.
    pub point_normals: Vec<Vector3<f64>>,
    /// One unit normal per triangle, zero for degenerate triangles.
    pub cell_normals: Vec<Vector3<f64>>,
}

impl MeshGeometry {
    pub fn to_mesh(&self) -> Mesh {
        Mesh {
            points: self.points.clone(),
            triangles: self.triangles.clone(),
        }
    }
}

pub(crate) fn check_connectivity(point_count: usize, triangles: &[[usize; 3]]) -> SsmResult<()> {
    for (triangle, tri) in triangles.iter().enumerate() {
        if let Some(&index) = tri.iter().find(|&&i| i >= point_count) {
            return Err(SsmError::InvalidConnectivity {
                triangle,
                index,
                point_count,
            });
        }
    }
    Ok(())
}
