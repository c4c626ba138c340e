use crate::ssm::point_set::PointSet;
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// Four two-point shapes on the corners of the unit square in y/z, with the
/// two points always one unit apart along x.
pub fn cube_corpus() -> Vec<PointSet> {
    vec![
        PointSet::from_tuples(&[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0)]),
        PointSet::from_tuples(&[(0.0, 0.0, 1.0), (1.0, 0.0, 1.0)]),
        PointSet::from_tuples(&[(0.0, 1.0, 0.0), (1.0, 1.0, 0.0)]),
        PointSet::from_tuples(&[(0.0, 1.0, 1.0), (1.0, 1.0, 1.0)]),
    ]
}

/// Points on a ring of radius `radius` in the xy-plane.
pub fn ring_points(n_points: usize, radius: f64) -> Vec<Point3<f64>> {
    (0..n_points)
        .map(|i| {
            let theta = 2.0 * PI * (i as f64) / (n_points as f64);
            Point3::new(radius * theta.cos(), radius * theta.sin(), 0.0)
        })
        .collect()
}

/// `n_samples` noisy variations of a ring with `n_points` points.
///
/// Each sample mixes three smooth deformations (scale, ellipticity, height
/// wave) and adds small per-coordinate noise, so the centered corpus has
/// full rank `min(n_samples - 1, 3 * n_points)`.
pub fn synthetic_corpus(n_samples: usize, n_points: usize, seed: u64) -> Vec<PointSet> {
    let mut rng = StdRng::seed_from_u64(seed);
    let base = ring_points(n_points, 10.0);

    (0..n_samples)
        .map(|_| {
            let scale: f64 = rng.random_range(-1.0..1.0);
            let ellipse: f64 = rng.random_range(-1.0..1.0);
            let wave: f64 = rng.random_range(-1.0..1.0);
            let points = base
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let theta = 2.0 * PI * (i as f64) / (n_points as f64);
                    let deformation = Vector3::new(
                        0.2 * scale * p.x + ellipse * p.x * 0.1,
                        0.2 * scale * p.y - ellipse * p.y * 0.1,
                        wave * (2.0 * theta).sin(),
                    );
                    let noise = Vector3::new(
                        rng.random_range(-0.05..0.05),
                        rng.random_range(-0.05..0.05),
                        rng.random_range(-0.05..0.05),
                    );
                    p + deformation + noise
                })
                .collect();
            PointSet::new(points)
        })
        .collect()
}
