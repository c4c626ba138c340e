pub mod config;
pub mod entry;
pub mod error;
pub mod io;
pub mod mesh;
pub mod ssm;
mod utils;

#[cfg(feature = "python")]
mod binding;

pub use error::{CorpusError, SsmError, SsmResult};
pub use ssm::{Corpus, PointSet, ShapeModel};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// This is the module importable from Python:
///
/// ```python
/// import cfss
/// model, mean = cfss.ShapeModel.from_files(files)
/// model.distance_stats(10, 42)
/// ```
#[cfg(feature = "python")]
#[pymodule]
fn cfss(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add_function(wrap_pyfunction!(binding::create_average_py, m)?)?;

    m.add_class::<binding::PyShapeModel>()?;
    m.add_class::<binding::PyMesh>()?;
    Ok(())
}
