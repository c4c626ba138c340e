use nalgebra::Vector3;

use super::{check_connectivity, MeshGeometry};
use crate::error::SsmResult;
use crate::ssm::point_set::PointSet;

const DEGENERATE_EPS: f64 = 1e-12;

/// Pairs `points` with `triangles` and computes fresh normals.
///
/// Cell normals follow the right-hand winding of each triangle. Point
/// normals are the normalized sum of the unit normals of the triangles
/// sharing the point (no feature-edge splitting). Nothing is cached: the
/// caller gets a new geometry each time the points change.
pub fn recompute_mesh(points: PointSet, triangles: &[[usize; 3]]) -> SsmResult<MeshGeometry> {
    check_connectivity(points.len(), triangles)?;

    let cell_normals: Vec<Vector3<f64>> = triangles
        .iter()
        .map(|&[a, b, c]| {
            let pa = points.points[a];
            let e1 = points.points[b] - pa;
            let e2 = points.points[c] - pa;
            let n = e1.cross(&e2);
            let len = n.norm();
            if len > DEGENERATE_EPS {
                n / len
            } else {
                Vector3::zeros()
            }
        })
        .collect();

    let mut point_normals = vec![Vector3::zeros(); points.len()];
    for (tri, normal) in triangles.iter().zip(&cell_normals) {
        for &i in tri {
            point_normals[i] += normal;
        }
    }
    for n in point_normals.iter_mut() {
        let len = n.norm();
        if len > DEGENERATE_EPS {
            *n /= len;
        }
    }

    Ok(MeshGeometry {
        points,
        triangles: triangles.to_vec(),
        point_normals,
        cell_normals,
    })
}
