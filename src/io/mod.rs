pub mod input;
pub mod output;
pub mod vtk_xml;

use anyhow::{Context, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::{CorpusError, SsmError};
use crate::ssm::ShapeModel;

/// On-disk form of a [`ShapeModel`]. Matrices are stored row by row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredModel {
    pub point_count: usize,
    pub mean: Vec<[f64; 3]>,
    pub components: Vec<Vec<f64>>,
    pub explained_variance: Vec<f64>,
    pub coefficients: Vec<Vec<f64>>,
}

fn matrix_rows(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    m.row_iter().map(|r| r.iter().copied().collect()).collect()
}

fn rows_to_matrix(rows: &[Vec<f64>], ncols: usize, what: &str) -> Result<DMatrix<f64>, SsmError> {
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != ncols) {
        return Err(SsmError::InvalidModel(format!(
            "{} row {} has {} values, expected {}",
            what,
            i,
            row.len(),
            ncols
        )));
    }
    Ok(DMatrix::from_row_iterator(
        rows.len(),
        ncols,
        rows.iter().flatten().copied(),
    ))
}

impl From<&ShapeModel> for StoredModel {
    fn from(model: &ShapeModel) -> Self {
        Self {
            point_count: model.point_count(),
            mean: model
                .mean()
                .points
                .iter()
                .map(|p| [p.x, p.y, p.z])
                .collect(),
            components: matrix_rows(model.components()),
            explained_variance: model.explained_variance().to_vec(),
            coefficients: matrix_rows(model.coefficients()),
        }
    }
}

impl TryFrom<StoredModel> for ShapeModel {
    type Error = SsmError;

    fn try_from(stored: StoredModel) -> Result<Self, Self::Error> {
        if stored.mean.len() != stored.point_count {
            return Err(SsmError::InvalidModel(format!(
                "point_count is {} but the mean has {} points",
                stored.point_count,
                stored.mean.len()
            )));
        }
        let dim = 3 * stored.point_count;
        let modes = stored.explained_variance.len();
        let mean = DVector::from_iterator(dim, stored.mean.iter().flatten().copied());
        let components = rows_to_matrix(&stored.components, dim, "component")?;
        let coefficients = rows_to_matrix(&stored.coefficients, modes, "coefficient")?;
        ShapeModel::from_parts(
            mean,
            components,
            DVector::from_vec(stored.explained_variance),
            coefficients,
        )
    }
}

/// Loads a model written by [`output::save_model_json`].
pub fn load_model_json<P: AsRef<Path>>(path: P) -> Result<ShapeModel> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let stored: StoredModel = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse model file {:?}", path))?;
    let model = ShapeModel::try_from(stored)
        .with_context(|| format!("Inconsistent model file {:?}", path))?;
    Ok(model)
}

fn file_name(paths: &[PathBuf], member: usize) -> String {
    paths
        .get(member)
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("#{}", member))
}

/// Rewrites a corpus error in terms of the files the members came from.
pub fn describe_corpus_error(err: &CorpusError, paths: &[PathBuf]) -> String {
    match err {
        CorpusError::PointCountMismatch {
            expected,
            mismatched,
        } => {
            let offenders = mismatched
                .iter()
                .map(|(member, count)| format!("{} ({} points)", file_name(paths, *member), count))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "Meshes must have the same number of points: {} has {}, but {}",
                file_name(paths, 0),
                expected,
                offenders
            )
        }
        CorpusError::NonFinite { member, point } => format!(
            "{} has a non-finite coordinate at point {}",
            file_name(paths, *member),
            point
        ),
        other => other.to_string(),
    }
}
