pub mod classes;

use pyo3::exceptions::PyRuntimeError;
use pyo3::prelude::*;
use std::path::PathBuf;

use crate::entry::create_average;
pub use classes::{PyMesh, PyShapeModel};

/// Writes the average of corresponded, aligned meshes.
///
/// Arguments:
///
/// - ``filenames`` – Mesh files (.vtk, .vtp, .obj or .csv), one per shape
/// - ``output`` – Destination, .vtk, .vtp or .obj
/// - ``ref_index`` (default: 0) – File whose triangles the average uses
///
/// Returns:
///
/// The average ``Mesh`` with point normals.
///
/// Example:
///
/// .. code-block:: python
///
///    import cfss
///    mesh = cfss.create_average(sorted(glob("aligned/*.vtk")), "mean.vtk")
#[pyfunction]
#[pyo3(name = "create_average", signature = (filenames, output, ref_index = 0usize))]
pub fn create_average_py(
    filenames: Vec<PathBuf>,
    output: PathBuf,
    ref_index: usize,
) -> PyResult<PyMesh> {
    let mean = create_average(&filenames, &output, ref_index)
        .map_err(|e| PyRuntimeError::new_err(format!("{:#}", e)))?;
    Ok(PyMesh::from(&mean))
}
