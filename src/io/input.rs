use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use nalgebra::Point3;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::iter::Peekable;
use std::path::{Path, PathBuf};

use super::vtk_xml::read_vtp;
use crate::mesh::Mesh;
use crate::ssm::point_set::PointSet;

/// Reads a mesh, picking the parser from the file extension.
///
/// `.vtk` is legacy ASCII polydata, `.vtp` / `.xml` is XML polydata, `.obj`
/// is Wavefront OBJ and `.csv` / `.txt` are point tables without
/// connectivity.
pub fn read_mesh<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let mesh = match ext.as_str() {
        "vtk" => read_vtk_polydata(path),
        "vtp" | "xml" => read_vtp(path),
        "obj" => read_obj(path),
        "csv" | "txt" => read_point_table(path).map(|points| Mesh {
            points,
            triangles: Vec::new(),
        }),
        _ => bail!("Invalid file format: {}", path.display()),
    }?;

    debug!(
        "Read {} ({} points, {} triangles)",
        path.display(),
        mesh.point_count(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

/// Files in `dir` with extension `ext`, sorted by file name.
pub fn list_mesh_files<P: AsRef<Path>>(dir: P, ext: &str) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Could not read input directory: {:?}", dir))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext));
        if path.is_file() && matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Reads every file in parallel, keeping the input order.
pub fn load_meshes(paths: &[PathBuf]) -> Result<Vec<Mesh>> {
    let meshes = paths
        .par_iter()
        .map(|p| read_mesh(p).with_context(|| format!("Failed to load mesh {}", p.display())))
        .collect::<Result<Vec<_>>>()?;
    info!("Loaded {} meshes", meshes.len());
    Ok(meshes)
}

/// Column separator of a point table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Byte(u8),
    /// Runs of spaces (and tabs mixed with spaces) between columns.
    Whitespace,
}

/// Utility: detect whether the file uses comma, tab, semicolon or plain
/// whitespace as delimiter.
fn detect_delimiter<P: AsRef<Path>>(path: P) -> Result<Delimiter> {
    let file = File::open(&path).with_context(|| {
        format!(
            "failed to open file for delimiter sniffing: {:?}",
            path.as_ref()
        )
    })?;
    let mut reader = BufReader::new(file);
    let mut first_line = String::new();
    reader
        .read_line(&mut first_line)
        .with_context(|| "failed to read first line for delimiter detection")?;

    let counts = [
        (b'\t', first_line.matches('\t').count()),
        (b';', first_line.matches(';').count()),
        (b',', first_line.matches(',').count()),
    ];
    let sniffed = counts
        .iter()
        .filter(|(_, n)| *n > 0)
        .max_by_key(|(_, n)| *n)
        .map(|(d, _)| Delimiter::Byte(*d));

    Ok(match sniffed {
        Some(Delimiter::Byte(b'\t')) if first_line.trim().contains(' ') => Delimiter::Whitespace,
        Some(d) => d,
        None if first_line.split_whitespace().count() > 1 => Delimiter::Whitespace,
        None => Delimiter::Byte(b','),
    })
}

/// Reads a table whose first three columns are x, y, z.
///
/// The first row is a header when one of its first three fields is not a
/// number. A row with fewer than three fields, or any later non-numeric
/// row, is an error since dropping it would shift every following point
/// index.
pub fn read_point_table<P: AsRef<Path>>(path: P) -> Result<PointSet> {
    let path = path.as_ref();
    let delim = detect_delimiter(path)?;
    let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(match delim {
            Delimiter::Byte(b) => b,
            Delimiter::Whitespace => b' ',
        })
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let mut points = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("invalid row {} in {:?}", row + 1, path))?;
        let fields: Vec<&str> = record
            .iter()
            .flat_map(|field| match delim {
                // a tab inside a space-separated row stays in one csv field
                Delimiter::Whitespace => field.split_whitespace().collect::<Vec<_>>(),
                Delimiter::Byte(_) => vec![field],
            })
            .take(3)
            .collect();
        if fields.len() < 3 {
            bail!(
                "row {} in {:?} has {} columns, expected x, y, z: {:?}",
                row + 1,
                path,
                fields.len(),
                record
            );
        }

        let coords = fields
            .iter()
            .map(|field| field.parse::<f64>())
            .collect::<std::result::Result<Vec<f64>, _>>();
        match coords {
            Ok(c) => points.push(Point3::new(c[0], c[1], c[2])),
            Err(_) if row == 0 => debug!("Skipping header row {:?} in {:?}", fields, path),
            Err(e) => bail!(
                "row {} in {:?} does not start with three numbers ({}): {:?}",
                row + 1,
                path,
                e,
                record
            ),
        }
    }

    if points.is_empty() {
        bail!("point table {:?} has no points", path);
    }
    Ok(PointSet::new(points))
}

/// Reads a Wavefront OBJ file through `tobj`. Polygons are triangulated and
/// every object or group is appended after the previous one.
///
/// `tobj` numbers the positions of each object by first use in its face
/// list and drops vertices no face uses. Files sharing one face list, as
/// the members of a corresponded corpus do, therefore keep their point
/// correspondence. Point clouds without faces belong in a point table.
pub fn read_obj<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let path = path.as_ref();
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: false,
            ..Default::default()
        },
    )
    .map_err(|e| anyhow!("failed to parse OBJ {:?}: {}", path, e))?;

    let mut points: Vec<Point3<f64>> = Vec::new();
    let mut triangles = Vec::new();
    for model in &models {
        let offset = points.len();
        let obj_mesh = &model.mesh;
        debug!(
            "OBJ model '{}': {} positions, {} triangles",
            model.name,
            obj_mesh.positions.len() / 3,
            obj_mesh.indices.len() / 3
        );

        points.extend(obj_mesh.positions.chunks_exact(3).map(|c| {
            Point3::new(f64::from(c[0]), f64::from(c[1]), f64::from(c[2]))
        }));
        triangles.extend(obj_mesh.indices.chunks_exact(3).map(|c| {
            [
                offset + c[0] as usize,
                offset + c[1] as usize,
                offset + c[2] as usize,
            ]
        }));
    }

    if triangles.is_empty() {
        bail!("OBJ file {:?} has no faces", path);
    }
    Mesh::new(PointSet::new(points), triangles)
        .with_context(|| format!("invalid connectivity in {:?}", path))
}

/// Triangle fan `(v0, vi, vi+1)` over a polygon.
pub(super) fn fan(polygon: &[usize]) -> Vec<[usize; 3]> {
    if polygon.len() < 3 {
        return Vec::new();
    }
    (1..polygon.len() - 1)
        .map(|i| [polygon[0], polygon[i], polygon[i + 1]])
        .collect()
}

/// Triangles of a strip, flipping every other one to keep the winding.
pub(super) fn strip(cell: &[usize]) -> Vec<[usize; 3]> {
    if cell.len() < 3 {
        return Vec::new();
    }
    (0..cell.len() - 2)
        .map(|i| {
            if i % 2 == 0 {
                [cell[i], cell[i + 1], cell[i + 2]]
            } else {
                [cell[i + 1], cell[i], cell[i + 2]]
            }
        })
        .collect()
}

/// Reads a legacy ASCII `.vtk` file holding `POLYDATA`.
///
/// Both the classic cell layout (`n i0 i1 ...` per cell) and the
/// `OFFSETS`/`CONNECTIVITY` layout of file version 5 are accepted. Field
/// data, point and cell attributes are skipped.
pub fn read_vtk_polydata<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).with_context(|| format!("failed to read {:?}", path))?;
    parse_vtk_polydata(&text).with_context(|| format!("failed to parse VTK {:?}", path))
}

const VTK_SECTIONS: [&str; 8] = [
    "FIELD",
    "POINTS",
    "VERTICES",
    "LINES",
    "POLYGONS",
    "TRIANGLE_STRIPS",
    "POINT_DATA",
    "CELL_DATA",
];

pub(crate) fn parse_vtk_polydata(text: &str) -> Result<Mesh> {
    let mut lines = text.lines();
    let header = lines.next().unwrap_or_default();
    if !header.starts_with("# vtk DataFile") {
        bail!("missing '# vtk DataFile' header");
    }
    let _title = lines.next();
    match lines.next().map(str::trim) {
        Some(f) if f.eq_ignore_ascii_case("ASCII") => {}
        Some(f) if f.eq_ignore_ascii_case("BINARY") => {
            bail!("binary legacy VTK files are not supported")
        }
        other => bail!("expected ASCII or BINARY, found {:?}", other),
    }

    let mut tokens = lines.flat_map(str::split_whitespace).peekable();

    let mut points: Vec<Point3<f64>> = Vec::new();
    let mut triangles = Vec::new();

    while let Some(token) = tokens.next() {
        match token.to_ascii_uppercase().as_str() {
            "DATASET" => {
                let kind = next_token(&mut tokens, "dataset type")?;
                if !kind.eq_ignore_ascii_case("POLYDATA") {
                    bail!("expected POLYDATA dataset, found {}", kind);
                }
            }
            "FIELD" => skip_field_data(&mut tokens)?,
            "POINTS" => {
                let n: usize = next_parsed(&mut tokens, "point count")?;
                let _dtype = next_token(&mut tokens, "point data type")?;
                points.reserve(n);
                for _ in 0..n {
                    let x = next_parsed(&mut tokens, "x")?;
                    let y = next_parsed(&mut tokens, "y")?;
                    let z = next_parsed(&mut tokens, "z")?;
                    points.push(Point3::new(x, y, z));
                }
            }
            kind @ ("VERTICES" | "LINES" | "POLYGONS" | "TRIANGLE_STRIPS") => {
                let cells = read_vtk_cells(&mut tokens)?;
                match kind {
                    "POLYGONS" => cells.iter().for_each(|c| triangles.extend(fan(c))),
                    "TRIANGLE_STRIPS" => cells.iter().for_each(|c| triangles.extend(strip(c))),
                    _ => {}
                }
            }
            "METADATA" => skip_metadata(&mut tokens),
            "POINT_DATA" | "CELL_DATA" => break,
            other => bail!("unexpected token {:?} in VTK body", other),
        }
    }

    if points.is_empty() {
        bail!("VTK file has no POINTS section");
    }
    Ok(Mesh::new(PointSet::new(points), triangles)?)
}

/// Skips `METADATA` up to the next section keyword.
fn skip_metadata<'a, I>(tokens: &mut Peekable<I>)
where
    I: Iterator<Item = &'a str>,
{
    while let Some(next) = tokens.peek() {
        if VTK_SECTIONS.contains(&next.to_ascii_uppercase().as_str()) {
            break;
        }
        tokens.next();
    }
}

/// Skips a `FIELD name n` block: `n` arrays of `arrayName numComponents
/// numTuples dataType` followed by their values.
fn skip_field_data<'a, I>(tokens: &mut Peekable<I>) -> Result<()>
where
    I: Iterator<Item = &'a str>,
{
    let _name = next_token(tokens, "field data name")?;
    let arrays: usize = next_parsed(tokens, "field array count")?;
    for _ in 0..arrays {
        let array = next_token(tokens, "field array name")?;
        let components: usize = next_parsed(tokens, "field array components")?;
        let tuples: usize = next_parsed(tokens, "field array tuples")?;
        let _dtype = next_token(tokens, "field array type")?;
        for _ in 0..components * tuples {
            next_token(tokens, "field array value")
                .with_context(|| format!("field array {:?} is truncated", array))?;
        }
        if tokens
            .peek()
            .is_some_and(|t| t.eq_ignore_ascii_case("METADATA"))
        {
            tokens.next();
            skip_metadata(tokens);
        }
    }
    Ok(())
}

fn next_token<'a, I>(tokens: &mut Peekable<I>, what: &str) -> Result<&'a str>
where
    I: Iterator<Item = &'a str>,
{
    tokens
        .next()
        .ok_or_else(|| anyhow!("unexpected end of file while reading {}", what))
}

fn next_parsed<'a, I, T>(tokens: &mut Peekable<I>, what: &str) -> Result<T>
where
    I: Iterator<Item = &'a str>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let token = next_token(tokens, what)?;
    token
        .parse::<T>()
        .with_context(|| format!("invalid {}: {:?}", what, token))
}

/// Reads the cell list following a `POLYGONS a b` style keyword.
fn read_vtk_cells<'a, I>(tokens: &mut Peekable<I>) -> Result<Vec<Vec<usize>>>
where
    I: Iterator<Item = &'a str>,
{
    let first: usize = next_parsed(tokens, "cell count")?;
    let second: usize = next_parsed(tokens, "cell list size")?;

    let offsets_layout = tokens
        .peek()
        .is_some_and(|t| t.eq_ignore_ascii_case("OFFSETS"));

    if offsets_layout {
        tokens.next();
        let _dtype = next_token(tokens, "offset type")?;
        let offsets = (0..first)
            .map(|_| next_parsed::<_, usize>(tokens, "offset"))
            .collect::<Result<Vec<_>>>()?;
        let keyword = next_token(tokens, "CONNECTIVITY")?;
        if !keyword.eq_ignore_ascii_case("CONNECTIVITY") {
            bail!("expected CONNECTIVITY, found {:?}", keyword);
        }
        let _dtype = next_token(tokens, "connectivity type")?;
        let connectivity = (0..second)
            .map(|_| next_parsed::<_, usize>(tokens, "connectivity"))
            .collect::<Result<Vec<_>>>()?;
        offsets
            .windows(2)
            .map(|w| {
                connectivity
                    .get(w[0]..w[1])
                    .map(|c| c.to_vec())
                    .ok_or_else(|| anyhow!("cell offsets {}..{} out of range", w[0], w[1]))
            })
            .collect()
    } else {
        let mut cells = Vec::with_capacity(first);
        let mut consumed = 0;
        for _ in 0..first {
            let n: usize = next_parsed(tokens, "cell size")?;
            let cell = (0..n)
                .map(|_| next_parsed::<_, usize>(tokens, "cell index"))
                .collect::<Result<Vec<_>>>()?;
            consumed += n + 1;
            cells.push(cell);
        }
        if consumed != second {
            bail!(
                "cell list size mismatch: header says {}, read {}",
                second,
                consumed
            );
        }
        Ok(cells)
    }
}
