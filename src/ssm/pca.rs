//! Principal component analysis of a centered data matrix.
//!
//! Works on whichever of the two scatter matrices is smaller: the N x N Gram
//! matrix `X Xᵀ` when there are fewer samples than dimensions (the usual
//! case for dense meshes), otherwise the D x D scatter matrix `Xᵀ X`. Both
//! share their non-zero eigenvalues.

use log::debug;
use nalgebra::{DMatrix, DVector, SymmetricEigen};

/// Eigenvalues at or below this fraction of the largest are treated as zero.
pub const RANK_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct PcaResult {
    /// M x D, one unit-length principal direction per row.
    pub components: DMatrix<f64>,
    /// Sample variance (N - 1 denominator) along each direction, descending.
    pub explained_variance: DVector<f64>,
    /// N x M projections of the centered rows onto the directions.
    pub scores: DMatrix<f64>,
}

/// Decomposes `centered` (N x D, rows already mean-subtracted).
///
/// Directions are sorted by descending variance and each one is flipped so
/// that its largest-magnitude entry is positive.
pub fn pca_centered(centered: &DMatrix<f64>) -> PcaResult {
    let (n, d) = centered.shape();
    decompose(centered, n <= d)
}

fn decompose(centered: &DMatrix<f64>, gram_form: bool) -> PcaResult {
    let (n, d) = centered.shape();
    debug!(
        "PCA on {} x {} data using the {} form",
        n,
        d,
        if gram_form { "Gram" } else { "scatter" }
    );

    let scatter = if gram_form {
        centered * centered.transpose()
    } else {
        centered.transpose() * centered
    };
    let eigen = SymmetricEigen::new(scatter);

    let mut order: Vec<usize> = (0..eigen.eigenvalues.len()).collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let largest = order
        .first()
        .map(|&i| eigen.eigenvalues[i])
        .unwrap_or(0.0);
    let max_modes = n.saturating_sub(1).min(d);
    let kept: Vec<usize> = if largest > 0.0 {
        order
            .into_iter()
            .filter(|&i| eigen.eigenvalues[i] > RANK_TOLERANCE * largest)
            .take(max_modes)
            .collect()
    } else {
        Vec::new()
    };

    let mut components = DMatrix::zeros(kept.len(), d);
    let mut explained_variance = DVector::zeros(kept.len());
    let denom = (n.max(2) - 1) as f64;

    for (m, &i) in kept.iter().enumerate() {
        let lambda = eigen.eigenvalues[i];
        let eigvec = eigen.eigenvectors.column(i);
        let mut direction: DVector<f64> = if gram_form {
            centered.transpose() * eigvec / lambda.sqrt()
        } else {
            eigvec.into_owned()
        };
        let norm = direction.norm();
        if norm > 0.0 {
            direction /= norm;
        }
        canonicalize_sign(&mut direction);

        components.row_mut(m).copy_from(&direction.transpose());
        explained_variance[m] = lambda / denom;
    }

    let scores = centered * components.transpose();

    PcaResult {
        components,
        explained_variance,
        scores,
    }
}

/// Flips `v` so that its largest-magnitude entry (first one on ties) is positive.
fn canonicalize_sign(v: &mut DVector<f64>) {
    let mut pivot = 0.0_f64;
    for &x in v.iter() {
        if x.abs() > pivot.abs() {
            pivot = x;
        }
    }
    if pivot < 0.0 {
        v.neg_mut();
    }
}

#[cfg(test)]
mod pca_tests {
    use super::*;
    use approx::assert_relative_eq;

    fn center(data: &DMatrix<f64>) -> DMatrix<f64> {
        let mean = data.row_mean();
        let mut centered = data.clone();
        for mut row in centered.row_iter_mut() {
            row -= &mean;
        }
        centered
    }

    #[test]
    fn test_line_data_has_single_mode() {
        // samples on the line t * (1, 2, 2) / 3
        let data = DMatrix::from_row_slice(
            4,
            3,
            &[
                0.0, 0.0, 0.0, //
                1.0, 2.0, 2.0, //
                2.0, 4.0, 4.0, //
                3.0, 6.0, 6.0,
            ],
        );
        let result = pca_centered(&center(&data));
        assert_eq!(result.components.nrows(), 1);
        assert_relative_eq!(result.components[(0, 0)], 1.0 / 3.0, epsilon = 1e-10);
        assert_relative_eq!(result.components[(0, 1)], 2.0 / 3.0, epsilon = 1e-10);
        assert_relative_eq!(result.components[(0, 2)], 2.0 / 3.0, epsilon = 1e-10);
        // scores are -4.5, -1.5, 1.5, 4.5 along the unit direction
        assert_relative_eq!(result.explained_variance[0], 15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_gram_and_scatter_forms_agree() {
        let data = DMatrix::from_row_slice(
            4,
            3,
            &[
                1.0, 0.5, 0.0, //
                -2.0, 1.0, 0.4, //
                0.3, -1.2, 2.0, //
                0.7, 0.1, -0.9,
            ],
        );
        let centered = center(&data);
        let scatter = decompose(&centered, false);
        let gram = decompose(&centered, true);
        assert_eq!(scatter.components.nrows(), 3);
        assert_eq!(gram.components.nrows(), 3);
        for m in 0..3 {
            assert_relative_eq!(
                scatter.explained_variance[m],
                gram.explained_variance[m],
                epsilon = 1e-9
            );
            for j in 0..3 {
                assert_relative_eq!(
                    scatter.components[(m, j)],
                    gram.components[(m, j)],
                    epsilon = 1e-6
                );
            }
        }
    }

    #[test]
    fn test_identical_samples_have_no_modes() {
        let data = DMatrix::from_row_slice(3, 3, &[1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
        let result = pca_centered(&center(&data));
        assert_eq!(result.components.nrows(), 0);
        assert_eq!(result.scores.shape(), (3, 0));
    }

    #[test]
    fn test_sign_rule() {
        let mut v = DVector::from_vec(vec![0.1, -0.9, 0.3]);
        canonicalize_sign(&mut v);
        assert_eq!(v.as_slice(), &[-0.1, 0.9, -0.3]);
    }
}
