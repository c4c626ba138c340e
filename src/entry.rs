use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::config::{CameraPresets, SsmConfig};
use crate::error::SsmError;
use crate::io::describe_corpus_error;
use crate::io::input::{list_mesh_files, load_meshes};
use crate::io::output::write_mesh;
use crate::mesh::{Mesh, MeshGeometry};
use crate::ssm::{MorphState, ShapeModel};

/// A model together with the meshes it was built from.
#[derive(Debug, Clone)]
pub struct BuiltModel {
    pub model: ShapeModel,
    /// Mesh whose connectivity is used for display.
    pub reference: Mesh,
    /// Mean shape on the reference connectivity.
    pub mean: MeshGeometry,
    pub files: Vec<PathBuf>,
}

/// Everything a viewer needs to start: the model, slider state and cameras.
#[derive(Debug, Clone)]
pub struct Session {
    pub config: SsmConfig,
    pub built: BuiltModel,
    pub morph: MorphState,
    pub cameras: Option<CameraPresets>,
}

fn map_build_error(err: SsmError, files: &[PathBuf]) -> anyhow::Error {
    match err {
        SsmError::InvalidCorpus(corpus) => anyhow!(describe_corpus_error(&corpus, files)),
        other => anyhow!(other),
    }
}

/// Loads `files` and builds a shape model. Member `i` of the model is
/// `files[i]`; the mesh at `reference_index` supplies the connectivity.
pub fn create_ssm_from_files(files: &[PathBuf], reference_index: usize) -> Result<BuiltModel> {
    if reference_index >= files.len() {
        bail!(
            "reference index {} out of range for {} files",
            reference_index,
            files.len()
        );
    }
    let meshes = load_meshes(files)?;
    let reference = meshes[reference_index].clone();
    let point_sets = meshes.into_iter().map(|m| m.points).collect();

    let model =
        ShapeModel::from_point_sets(point_sets).map_err(|e| map_build_error(e, files))?;
    let mean = model
        .mean_mesh(&reference)
        .context("Failed to attach connectivity to the mean shape")?;

    Ok(BuiltModel {
        model,
        reference,
        mean,
        files: files.to_vec(),
    })
}

/// Builds a model from every `*.ext` file of `dir`, in file name order.
pub fn create_ssm_from_dir<P: AsRef<Path>>(dir: P, ext: &str) -> Result<BuiltModel> {
    let dir = dir.as_ref();
    let files = list_mesh_files(dir, ext)?;
    if files.is_empty() {
        bail!("No *.{} files found in {:?}", ext, dir);
    }
    info!("Building shape model from {} files in {}", files.len(), dir.display());
    create_ssm_from_files(&files, 0)
}

/// Writes the mean of `filenames` on the connectivity of
/// `filenames[ref_index]`, with recomputed normals. Inputs must already be
/// in correspondence.
///
/// No rigid or Procrustes alignment happens here: the points are averaged
/// as stored. Register the meshes to a common frame before calling this,
/// otherwise pose differences end up in the average.
pub fn create_average<P: AsRef<Path>>(
    filenames: &[PathBuf],
    output: P,
    ref_index: usize,
) -> Result<MeshGeometry> {
    let built = create_ssm_from_files(filenames, ref_index)?;
    write_mesh(output.as_ref(), &built.mean)
        .with_context(|| format!("Failed to write average mesh to {:?}", output.as_ref()))?;
    info!("Average mesh written to {}", output.as_ref().display());
    Ok(built.mean)
}

/// Builds the model described by `config`, writes the average mesh if an
/// output is configured and loads the camera presets.
pub fn run(config: SsmConfig) -> Result<Session> {
    let files = list_mesh_files(&config.input_dir, &config.extension)?;
    if files.is_empty() {
        bail!(
            "No *.{} files found in {:?}",
            config.extension,
            config.input_dir
        );
    }
    let built = create_ssm_from_files(&files, config.reference_index)?;

    if let Some(output) = &config.output {
        write_mesh(output, &built.mean)
            .with_context(|| format!("Failed to write average mesh to {:?}", output))?;
        info!("Average mesh written to {}", output.display());
    }

    let cameras = config
        .cameras
        .as_ref()
        .map(CameraPresets::load)
        .transpose()?;

    let pcs = config.effective_pcs(built.model.sample_count(), built.model.mode_count());
    if pcs < config.pcs {
        warn!(
            "Only {} of {} requested principal components available",
            pcs, config.pcs
        );
    }
    let morph = MorphState::new(&built.model, pcs);

    Ok(Session {
        config,
        built,
        morph,
        cameras,
    })
}

#[cfg(test)]
mod entry_tests {
    use super::*;
    use crate::mesh::recompute_mesh;
    use crate::ssm::PointSet;
    use crate::utils::test_utils::synthetic_corpus;
    use approx::assert_relative_eq;
    use std::fs;

    // fan around point 0 of a ring
    fn ring_triangles(n_points: usize) -> Vec<[usize; 3]> {
        (1..n_points - 1).map(|i| [0, i, i + 1]).collect()
    }

    fn write_corpus(dir: &Path, members: &[PointSet], ext: &str) -> Vec<PathBuf> {
        members
            .iter()
            .enumerate()
            .map(|(i, points)| {
                let path = dir.join(format!("case_{:02}.{}", i, ext));
                let tris = ring_triangles(points.len());
                let geometry = recompute_mesh(points.clone(), &tris).unwrap();
                write_mesh(&path, &geometry).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_build_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        let members = synthetic_corpus(6, 8, 21);
        write_corpus(dir.path(), &members, "vtk");
        fs::write(dir.path().join("notes.txt"), "not a mesh").unwrap();

        let built = create_ssm_from_dir(dir.path(), "vtk").unwrap();
        assert_eq!(built.files.len(), 6);
        assert_eq!(built.model.sample_count(), 6);
        assert_eq!(built.model.point_count(), 8);
        assert_eq!(built.mean.triangles, ring_triangles(8));

        let expected = ShapeModel::from_point_sets(members).unwrap();
        for (a, b) in built
            .model
            .mean()
            .points
            .iter()
            .zip(&expected.mean().points)
        {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_mismatch_reports_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut members = synthetic_corpus(3, 6, 2);
        members.push(synthetic_corpus(1, 5, 2).remove(0));
        write_corpus(dir.path(), &members, "obj");

        let err = create_ssm_from_dir(dir.path(), "obj").unwrap_err();
        let text = format!("{:#}", err);
        assert!(text.contains("case_00.obj has 6"));
        assert!(text.contains("case_03.obj (5 points)"));
    }

    #[test]
    fn test_empty_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(create_ssm_from_dir(dir.path(), "vtk").is_err());
    }

    #[test]
    fn test_create_average() {
        let dir = tempfile::tempdir().unwrap();
        let members = synthetic_corpus(4, 6, 8);
        let files = write_corpus(dir.path(), &members, "vtk");
        let output = dir.path().join("out").join("average.obj");

        let mean = create_average(&files, &output, 2).unwrap();
        assert!(output.exists());
        assert_eq!(mean.points.len(), 6);
        for (p, i) in mean.points.points.iter().zip(0..) {
            let x: f64 = members.iter().map(|m| m.points[i].x).sum::<f64>() / 4.0;
            assert_relative_eq!(p.x, x, epsilon = 1e-12);
        }

        assert!(create_average(&files, &output, 4).is_err());
    }

    #[test]
    fn test_create_average_does_not_align() {
        let dir = tempfile::tempdir().unwrap();
        let base = synthetic_corpus(1, 6, 31).remove(0);
        let shifted = PointSet::new(
            base.points
                .iter()
                .map(|p| p + nalgebra::Vector3::new(10.0, 0.0, -4.0))
                .collect(),
        );
        let files = write_corpus(dir.path(), &[base.clone(), shifted], "vtk");
        let output = dir.path().join("average.vtk");

        let mean = create_average(&files, &output, 0).unwrap();
        for (m, p) in mean.points.points.iter().zip(&base.points) {
            assert_relative_eq!(m.x, p.x + 5.0, epsilon = 1e-12);
            assert_relative_eq!(m.y, p.y, epsilon = 1e-12);
            assert_relative_eq!(m.z, p.z - 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_run_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let members = synthetic_corpus(3, 6, 13);
        write_corpus(dir.path(), &members, "vtk");
        let cameras = dir.path().join("cameras.json");
        fs::write(
            &cameras,
            r#"{"presets": [{"name": "front", "camera": {
                "position": [0, -100, 0], "view_up": [0, 0, 1], "focal_point": [0, 0, 0]}}]}"#,
        )
        .unwrap();

        let config = SsmConfig {
            input_dir: dir.path().to_path_buf(),
            cameras: Some(cameras),
            output: Some(dir.path().join("mean.vtk")),
            ..SsmConfig::default()
        };
        let session = run(config).unwrap();
        // three samples leave two modes
        assert_eq!(session.morph.pcs(), 2);
        assert!(session.cameras.unwrap().get("front").is_some());
        assert!(dir.path().join("mean.vtk").exists());
    }
}
