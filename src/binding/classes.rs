use pyo3::exceptions::{PyIndexError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::path::PathBuf;

use crate::entry::create_ssm_from_files;
use crate::error::SsmError;
use crate::io::load_model_json;
use crate::io::output::save_model_json;
use crate::mesh::MeshGeometry;
use crate::ssm::{DistanceStats, PointSet, ShapeModel};

pub(crate) fn to_py_err(err: SsmError) -> PyErr {
    match err {
        SsmError::IndexOutOfRange { .. } => PyIndexError::new_err(err.to_string()),
        _ => PyValueError::new_err(err.to_string()),
    }
}

fn tuples(points: &[nalgebra::Point3<f64>]) -> Vec<(f64, f64, f64)> {
    points.iter().map(|p| (p.x, p.y, p.z)).collect()
}

/// Triangle mesh with point normals, as produced for display.
///
/// Attributes:
///     points (list[tuple[float, float, float]]): Vertex coordinates
///     triangles (list[tuple[int, int, int]]): Vertex indices per triangle
///     normals (list[tuple[float, float, float]]): Unit normal per vertex
#[pyclass(name = "Mesh")]
#[derive(Debug, Clone)]
pub struct PyMesh {
    #[pyo3(get)]
    pub points: Vec<(f64, f64, f64)>,
    #[pyo3(get)]
    pub triangles: Vec<(usize, usize, usize)>,
    #[pyo3(get)]
    pub normals: Vec<(f64, f64, f64)>,
}

#[pymethods]
impl PyMesh {
    fn __repr__(&self) -> String {
        format!(
            "Mesh(points={}, triangles={})",
            self.points.len(),
            self.triangles.len()
        )
    }
}

impl From<&MeshGeometry> for PyMesh {
    fn from(geometry: &MeshGeometry) -> Self {
        Self {
            points: geometry.points.as_tuples(),
            triangles: geometry
                .triangles
                .iter()
                .map(|[a, b, c]| (*a, *b, *c))
                .collect(),
            normals: geometry
                .point_normals
                .iter()
                .map(|n| (n.x, n.y, n.z))
                .collect(),
        }
    }
}

/// Statistical shape model of a corpus of corresponded shapes.
///
/// Every shape of the corpus must have the same number of points, and
/// point ``i`` must denote the same anatomical location in every shape.
///
/// Example:
///     >>> import cfss
///     >>> model = cfss.ShapeModel.from_points(shapes)
///     >>> model.distance_distribution(10, 42)
#[pyclass(name = "ShapeModel")]
#[derive(Debug, Clone)]
pub struct PyShapeModel {
    pub inner: ShapeModel,
}

#[pymethods]
impl PyShapeModel {
    /// Builds a model from in-memory shapes.
    ///
    /// Args:
    ///     shapes (list[list[tuple[float, float, float]]]): One point list per shape.
    #[staticmethod]
    pub fn from_points(shapes: Vec<Vec<(f64, f64, f64)>>) -> PyResult<Self> {
        let members = shapes.iter().map(|s| PointSet::from_tuples(s)).collect();
        let inner = ShapeModel::from_point_sets(members).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Builds a model from mesh files (.vtk, .vtp, .obj or .csv).
    ///
    /// Args:
    ///     filenames (list[str]): Mesh files, one per shape.
    ///     reference_index (int, default 0): File whose triangles are used
    ///         for the average shape.
    ///
    /// Returns:
    ///     tuple[ShapeModel, Mesh]: The model and the average mesh.
    #[staticmethod]
    #[pyo3(signature = (filenames, reference_index = 0usize))]
    pub fn from_files(filenames: Vec<PathBuf>, reference_index: usize) -> PyResult<(Self, PyMesh)> {
        let built = create_ssm_from_files(&filenames, reference_index)
            .map_err(|e| PyRuntimeError::new_err(format!("{:#}", e)))?;
        let mesh = PyMesh::from(&built.mean);
        Ok((Self { inner: built.model }, mesh))
    }

    /// Loads a model saved with :meth:`save`.
    #[staticmethod]
    pub fn load(path: PathBuf) -> PyResult<Self> {
        let inner =
            load_model_json(&path).map_err(|e| PyRuntimeError::new_err(format!("{:#}", e)))?;
        Ok(Self { inner })
    }

    pub fn save(&self, path: PathBuf) -> PyResult<()> {
        save_model_json(&path, &self.inner)
            .map_err(|e| PyRuntimeError::new_err(format!("{:#}", e)))
    }

    /// Shape at the given mode coefficients. Missing trailing coefficients
    /// are taken as zero.
    pub fn reconstruct(&self, coefficients: Vec<f64>) -> PyResult<Vec<(f64, f64, f64)>> {
        let shape = self.inner.reconstruct(&coefficients).map_err(to_py_err)?;
        Ok(shape.as_tuples())
    }

    /// Projects a shape onto the modes.
    pub fn coefficients_for(&self, points: Vec<(f64, f64, f64)>) -> PyResult<Vec<f64>> {
        self.inner
            .coefficients_for(&PointSet::from_tuples(&points))
            .map_err(to_py_err)
    }

    /// Position of point ``p`` in every corpus shape.
    pub fn population_points(&self, p: usize) -> PyResult<Vec<(f64, f64, f64)>> {
        let points = self.inner.population_points(p).map_err(to_py_err)?;
        Ok(tuples(&points))
    }

    /// Distance between points ``a`` and ``b`` in every corpus shape.
    pub fn distance_distribution(&self, a: usize, b: usize) -> PyResult<Vec<f64>> {
        self.inner.distance_distribution(a, b).map_err(to_py_err)
    }

    /// Population statistics of the distance between ``a`` and ``b``.
    ///
    /// Args:
    ///     a (int): First point index.
    ///     b (int): Second point index.
    ///     current (float, optional): Distance to score against the corpus.
    ///
    /// Returns:
    ///     tuple[float, float, float | None]: Mean, standard deviation and
    ///     the z-score of ``current`` (None without ``current`` or when the
    ///     standard deviation is zero).
    #[pyo3(signature = (a, b, current = None))]
    pub fn distance_stats(
        &self,
        a: usize,
        b: usize,
        current: Option<f64>,
    ) -> PyResult<(f64, f64, Option<f64>)> {
        let distances = self.inner.distance_distribution(a, b).map_err(to_py_err)?;
        let stats = DistanceStats::from_samples(&distances)
            .ok_or_else(|| PyValueError::new_err("model has no samples"))?;
        let z = current.and_then(|c| stats.z_score(c));
        Ok((stats.mean, stats.std, z))
    }

    /// Euclidean norm of the coefficients in units of standard deviation.
    pub fn normalized_magnitude(&self, coefficients: Vec<f64>) -> PyResult<f64> {
        self.inner
            .normalized_magnitude(&coefficients)
            .map_err(to_py_err)
    }

    #[getter]
    pub fn mean(&self) -> Vec<(f64, f64, f64)> {
        self.inner.mean().as_tuples()
    }

    #[getter]
    pub fn explained_variance(&self) -> Vec<f64> {
        self.inner.explained_variance().to_vec()
    }

    #[getter]
    pub fn explained_variance_ratio(&self) -> Vec<f64> {
        self.inner.explained_variance_ratio()
    }

    /// Coefficients of every corpus shape, one row per shape.
    #[getter]
    pub fn coefficients(&self) -> Vec<Vec<f64>> {
        self.inner
            .coefficients()
            .row_iter()
            .map(|r| r.iter().copied().collect())
            .collect()
    }

    fn __repr__(&self) -> String {
        format!(
            "ShapeModel(samples={}, points={}, modes={})",
            self.inner.sample_count(),
            self.inner.point_count(),
            self.inner.mode_count()
        )
    }
}
