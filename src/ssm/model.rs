use log::info;
use nalgebra::{DMatrix, DVector, Point3, Vector3};
use rayon::prelude::*;

use super::corpus::Corpus;
use super::pca::pca_centered;
use super::point_set::{flat_to_vectors, PointSet};
use crate::error::{SsmError, SsmResult};
use crate::mesh::{recompute_mesh, Mesh, MeshGeometry};

/// Point distribution model of a corpus.
///
/// Holds the mean shape, the orthonormal shape modes (rows of `components`,
/// point-major like [`PointSet::to_flat`]), their variances and the
/// coefficients of every corpus member. The raw corpus is not kept: a
/// member is recovered as `mean + coefficientsᵀ · components`.
///
/// Immutable after construction; every query takes `&self`.
#[derive(Debug, Clone)]
pub struct ShapeModel {
    mean: DVector<f64>,
    components: DMatrix<f64>,
    explained_variance: DVector<f64>,
    coefficients: DMatrix<f64>,
}

impl ShapeModel {
    /// Fits the model: mean, centering, PCA, projection of every member.
    pub fn build(corpus: &Corpus) -> SsmResult<Self> {
        let data = corpus.data_matrix();
        let mean = data.row_mean().transpose();

        let mut centered = data;
        for mut row in centered.row_iter_mut() {
            row -= mean.transpose();
        }

        let pca = pca_centered(&centered);
        info!(
            "Shape model built from {} samples of {} points: {} modes retained",
            corpus.sample_count(),
            corpus.point_count(),
            pca.components.nrows()
        );

        Ok(Self {
            mean,
            components: pca.components,
            explained_variance: pca.explained_variance,
            coefficients: pca.scores,
        })
    }

    /// Validates `members` as a corpus and builds the model.
    pub fn from_point_sets(members: Vec<PointSet>) -> SsmResult<Self> {
        let corpus = Corpus::new(members)?;
        Self::build(&corpus)
    }

    /// Reassembles a model from stored parts, checking their shapes agree.
    pub fn from_parts(
        mean: DVector<f64>,
        components: DMatrix<f64>,
        explained_variance: DVector<f64>,
        coefficients: DMatrix<f64>,
    ) -> SsmResult<Self> {
        let dim = mean.len();
        if dim == 0 || dim % 3 != 0 {
            return Err(SsmError::InvalidModel(format!(
                "mean has {} values, expected a positive multiple of 3",
                dim
            )));
        }
        if components.ncols() != dim {
            return Err(SsmError::InvalidModel(format!(
                "components have {} columns, mean has {} values",
                components.ncols(),
                dim
            )));
        }
        let modes = components.nrows();
        if explained_variance.len() != modes {
            return Err(SsmError::InvalidModel(format!(
                "{} variances for {} components",
                explained_variance.len(),
                modes
            )));
        }
        if coefficients.ncols() != modes {
            return Err(SsmError::InvalidModel(format!(
                "coefficients have {} columns for {} components",
                coefficients.ncols(),
                modes
            )));
        }
        if explained_variance.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(SsmError::InvalidModel(
                "explained variance must be finite and positive".to_string(),
            ));
        }
        if explained_variance
            .as_slice()
            .windows(2)
            .any(|w| w[0] < w[1])
        {
            return Err(SsmError::InvalidModel(
                "explained variance must be non-increasing".to_string(),
            ));
        }

        Ok(Self {
            mean,
            components,
            explained_variance,
            coefficients,
        })
    }

    pub fn sample_count(&self) -> usize {
        self.coefficients.nrows()
    }

    pub fn point_count(&self) -> usize {
        self.mean.len() / 3
    }

    /// Number of retained modes, M.
    pub fn mode_count(&self) -> usize {
        self.components.nrows()
    }

    pub fn mean(&self) -> PointSet {
        PointSet::from_flat(self.mean.as_slice())
    }

    pub fn mean_flat(&self) -> &DVector<f64> {
        &self.mean
    }

    /// M x 3P matrix of unit-length modes.
    pub fn components(&self) -> &DMatrix<f64> {
        &self.components
    }

    /// Mode `m` as one displacement vector per point.
    pub fn component(&self, m: usize) -> SsmResult<Vec<Vector3<f64>>> {
        self.check_mode(m)?;
        let row: Vec<f64> = self.components.row(m).iter().copied().collect();
        Ok(flat_to_vectors(&row))
    }

    pub fn explained_variance(&self) -> &[f64] {
        self.explained_variance.as_slice()
    }

    /// Share of the total variance carried by each mode.
    pub fn explained_variance_ratio(&self) -> Vec<f64> {
        let total: f64 = self.explained_variance.iter().sum();
        if total <= 0.0 {
            return vec![0.0; self.mode_count()];
        }
        self.explained_variance.iter().map(|v| v / total).collect()
    }

    pub fn cumulative_variance_ratio(&self) -> Vec<f64> {
        self.explained_variance_ratio()
            .into_iter()
            .scan(0.0, |acc, r| {
                *acc += r;
                Some(*acc)
            })
            .collect()
    }

    /// Standard deviation of the corpus along mode `m`.
    pub fn mode_std(&self, m: usize) -> SsmResult<f64> {
        self.check_mode(m)?;
        Ok(self.explained_variance[m].sqrt())
    }

    /// N x M coefficient matrix, one row per corpus member.
    pub fn coefficients(&self) -> &DMatrix<f64> {
        &self.coefficients
    }

    pub fn sample_coefficients(&self, i: usize) -> SsmResult<Vec<f64>> {
        if i >= self.sample_count() {
            return Err(SsmError::IndexOutOfRange {
                what: "sample",
                index: i,
                len: self.sample_count(),
            });
        }
        Ok(self.coefficients.row(i).iter().copied().collect())
    }

    /// `mean + Σ coefficients[m] · components[m]`.
    ///
    /// Missing trailing coefficients count as zero, so a prefix reconstructs
    /// with the leading modes only.
    pub fn reconstruct(&self, coefficients: &[f64]) -> SsmResult<PointSet> {
        self.check_coefficients(coefficients)?;
        let mut flat = self.mean.clone();
        for (m, &c) in coefficients.iter().enumerate() {
            flat.axpy(c, &self.components.row(m).transpose(), 1.0);
        }
        Ok(PointSet::from_flat(flat.as_slice()))
    }

    /// Projection of `shape - mean` onto every mode. Inverse of
    /// [`ShapeModel::reconstruct`] for shapes inside the model's span, the
    /// least-squares closest coefficients otherwise.
    pub fn coefficients_for(&self, shape: &PointSet) -> SsmResult<Vec<f64>> {
        if shape.len() != self.point_count() {
            return Err(SsmError::DimensionMismatch {
                what: "point count",
                expected: self.point_count(),
                found: shape.len(),
            });
        }
        let centered = shape.to_flat() - &self.mean;
        Ok((&self.components * centered).iter().copied().collect())
    }

    /// Position of anatomical point `p` in every corpus member, in corpus order.
    pub fn population_points(&self, p: usize) -> SsmResult<Vec<Point3<f64>>> {
        self.check_point(p)?;
        let base = Point3::new(self.mean[3 * p], self.mean[3 * p + 1], self.mean[3 * p + 2]);
        let loadings: Vec<Vector3<f64>> = (0..self.mode_count())
            .map(|m| {
                Vector3::new(
                    self.components[(m, 3 * p)],
                    self.components[(m, 3 * p + 1)],
                    self.components[(m, 3 * p + 2)],
                )
            })
            .collect();

        Ok((0..self.sample_count())
            .into_par_iter()
            .map(|i| {
                loadings
                    .iter()
                    .enumerate()
                    .fold(base, |acc, (m, l)| acc + l * self.coefficients[(i, m)])
            })
            .collect())
    }

    /// Euclidean distance between points `a` and `b` in every corpus member.
    pub fn distance_distribution(&self, a: usize, b: usize) -> SsmResult<Vec<f64>> {
        let pa = self.population_points(a)?;
        let pb = self.population_points(b)?;
        Ok(pa
            .par_iter()
            .zip(pb.par_iter())
            .map(|(x, y)| (x - y).norm())
            .collect())
    }

    /// Coefficients divided by the standard deviation of their mode.
    pub fn normalized_coefficients(&self, coefficients: &[f64]) -> SsmResult<Vec<f64>> {
        self.check_coefficients(coefficients)?;
        Ok(coefficients
            .iter()
            .zip(self.explained_variance.iter())
            .map(|(c, v)| c / v.sqrt())
            .collect())
    }

    /// How many standard deviations a shape lies from the mean, over all modes.
    pub fn normalized_magnitude(&self, coefficients: &[f64]) -> SsmResult<f64> {
        Ok(self
            .normalized_coefficients(coefficients)?
            .iter()
            .map(|c| c * c)
            .sum::<f64>()
            .sqrt())
    }

    /// Mean shape on the connectivity of `reference`, with normals.
    pub fn mean_mesh(&self, reference: &Mesh) -> SsmResult<MeshGeometry> {
        let mesh = reference.with_points(self.mean())?;
        recompute_mesh(mesh.points, &mesh.triangles)
    }

    fn check_coefficients(&self, coefficients: &[f64]) -> SsmResult<()> {
        if coefficients.len() > self.mode_count() {
            return Err(SsmError::DimensionMismatch {
                what: "coefficients",
                expected: self.mode_count(),
                found: coefficients.len(),
            });
        }
        Ok(())
    }

    fn check_point(&self, p: usize) -> SsmResult<()> {
        if p >= self.point_count() {
            return Err(SsmError::IndexOutOfRange {
                what: "point",
                index: p,
                len: self.point_count(),
            });
        }
        Ok(())
    }

    fn check_mode(&self, m: usize) -> SsmResult<()> {
        if m >= self.mode_count() {
            return Err(SsmError::IndexOutOfRange {
                what: "component",
                index: m,
                len: self.mode_count(),
            });
        }
        Ok(())
    }
}
