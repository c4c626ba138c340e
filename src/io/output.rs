use anyhow::{bail, Context, Result};
use csv::Writer;
use log::info;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use super::vtk_xml::write_vtp;
use super::StoredModel;
use crate::mesh::MeshGeometry;
use crate::ssm::ShapeModel;

pub(super) fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Could not create output directory: {:?}", parent))?;
        }
    }
    Ok(())
}

/// Writes a mesh with normals, picking the format from the extension.
pub fn write_mesh<P: AsRef<Path>>(path: P, geometry: &MeshGeometry) -> Result<()> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "vtk" => write_vtk_polydata(path, geometry),
        "obj" => write_obj(path, geometry),
        "vtp" => write_vtp(path, geometry),
        _ => bail!("Invalid file format: {}", path.display()),
    }
}

/// Legacy ASCII polydata, file version 4.2, with point normals.
pub fn write_vtk_polydata<P: AsRef<Path>>(path: P, geometry: &MeshGeometry) -> Result<()> {
    let path = path.as_ref();
    create_parent_dir(path)?;
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "# vtk DataFile Version 4.2")?;
    writeln!(writer, "vtk output")?;
    writeln!(writer, "ASCII")?;
    writeln!(writer, "DATASET POLYDATA")?;
    writeln!(writer, "POINTS {} double", geometry.points.len())?;
    for p in &geometry.points.points {
        writeln!(writer, "{} {} {}", p.x, p.y, p.z)?;
    }

    if !geometry.triangles.is_empty() {
        writeln!(
            writer,
            "POLYGONS {} {}",
            geometry.triangles.len(),
            geometry.triangles.len() * 4
        )?;
        for [a, b, c] in &geometry.triangles {
            writeln!(writer, "3 {} {} {}", a, b, c)?;
        }
    }

    writeln!(writer, "POINT_DATA {}", geometry.points.len())?;
    writeln!(writer, "NORMALS Normals double")?;
    for n in &geometry.point_normals {
        writeln!(writer, "{} {} {}", n.x, n.y, n.z)?;
    }

    writer.flush()?;
    Ok(())
}

/// Wavefront OBJ with one `vn` per vertex.
pub fn write_obj<P: AsRef<Path>>(path: P, geometry: &MeshGeometry) -> Result<()> {
    let path = path.as_ref();
    create_parent_dir(path)?;
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);

    for p in &geometry.points.points {
        writeln!(writer, "v {} {} {}", p.x, p.y, p.z)?;
    }
    for n in &geometry.point_normals {
        writeln!(writer, "vn {} {} {}", n.x, n.y, n.z)?;
    }
    for [a, b, c] in &geometry.triangles {
        writeln!(
            writer,
            "f {0}//{0} {1}//{1} {2}//{2}",
            a + 1,
            b + 1,
            c + 1
        )?;
    }

    writer.flush()?;
    Ok(())
}

/// One row per corpus member: `case, pc1, pc2, ...`. Without labels the
/// cases are numbered from 1.
pub fn write_coefficients_csv<P: AsRef<Path>>(
    path: P,
    model: &ShapeModel,
    labels: Option<&[String]>,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(labels) = labels {
        if labels.len() != model.sample_count() {
            bail!(
                "{} labels for {} samples",
                labels.len(),
                model.sample_count()
            );
        }
    }
    create_parent_dir(path)?;
    let mut wtr = Writer::from_path(path)?;

    let mut header = vec!["case".to_string()];
    header.extend((1..=model.mode_count()).map(|m| format!("pc{}", m)));
    wtr.write_record(&header)?;

    for (i, row) in model.coefficients().row_iter().enumerate() {
        let label = labels
            .map(|l| l[i].clone())
            .unwrap_or_else(|| format!("case {}", i + 1));
        let mut record = vec![label];
        record.extend(row.iter().map(|c| c.to_string()));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Serializes the model as JSON.
pub fn save_model_json<P: AsRef<Path>>(path: P, model: &ShapeModel) -> Result<()> {
    let path = path.as_ref();
    create_parent_dir(path)?;
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    serde_json::to_writer(BufWriter::new(file), &StoredModel::from(model))
        .with_context(|| format!("Failed to write model to {:?}", path))?;
    info!("Saved shape model to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod output_tests {
    use super::*;
    use crate::io::input::{read_mesh, read_point_table};
    use crate::io::load_model_json;
    use crate::mesh::recompute_mesh;
    use crate::ssm::PointSet;
    use crate::utils::test_utils::synthetic_corpus;
    use approx::assert_relative_eq;

    fn square() -> MeshGeometry {
        let points = PointSet::from_tuples(&[
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (1.0, 1.0, 0.0),
            (0.0, 1.0, 0.0),
        ]);
        recompute_mesh(points, &[[0, 1, 2], [0, 2, 3]]).unwrap()
    }

    #[test]
    fn test_vtk_written_mesh_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mean.vtk");
        write_mesh(&path, &square()).unwrap();
        let mesh = read_mesh(&path).unwrap();
        assert_eq!(mesh, square().to_mesh());
    }

    #[test]
    fn test_obj_written_mesh_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mean.obj");
        write_mesh(&path, &square()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("vn 0 0 1"));
        let mesh = read_mesh(&path).unwrap();
        assert_eq!(mesh, square().to_mesh());
    }

    #[test]
    fn test_coefficient_table() {
        let model = ShapeModel::from_point_sets(synthetic_corpus(4, 5, 3)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coefs.csv");
        write_coefficients_csv(&path, &model, None).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), "case,pc1,pc2,pc3");
        assert!(lines.next().unwrap().starts_with("case 1,"));
        assert_eq!(text.lines().count(), 5);

        let labels = vec!["a".to_string()];
        assert!(write_coefficients_csv(&path, &model, Some(&labels)).is_err());
        // a point table reader must not mistake the coefficient table for points
        assert!(read_point_table(&path).is_err());
    }

    #[test]
    fn test_model_json_round_trip() {
        let model = ShapeModel::from_point_sets(synthetic_corpus(5, 7, 19)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        save_model_json(&path, &model).unwrap();
        let loaded = load_model_json(&path).unwrap();
        assert_eq!(loaded.mode_count(), model.mode_count());
        assert_eq!(loaded.sample_count(), model.sample_count());
        let d1 = model.distance_distribution(0, 3).unwrap();
        let d2 = loaded.distance_distribution(0, 3).unwrap();
        for (a, b) in d1.iter().zip(&d2) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }
}
