//! VTK XML PolyData (`.vtp`) with inline ASCII data arrays.
//!
//! Only a single `Piece` is read. Binary, base64 and appended arrays are
//! rejected with an error naming the array.

use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use nalgebra::Point3;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use super::input::{fan, strip};
use super::output::create_parent_dir;
use crate::mesh::{Mesh, MeshGeometry};
use crate::ssm::point_set::PointSet;

/// Reads an XML PolyData file.
pub fn read_vtp<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).with_context(|| format!("failed to read {:?}", path))?;
    parse_vtp(&text).with_context(|| format!("failed to parse VTK XML {:?}", path))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Points,
    Polys,
    Strips,
    Other,
}

/// Cell arrays of one `Polys` or `Strips` element.
#[derive(Default)]
struct CellArrays {
    connectivity: Vec<usize>,
    offsets: Vec<usize>,
}

impl CellArrays {
    /// Cells from end offsets, the first cell starting at 0.
    fn cells(&self) -> Result<Vec<&[usize]>> {
        let mut start = 0;
        self.offsets
            .iter()
            .map(|&end| {
                let cell = self
                    .connectivity
                    .get(start..end)
                    .ok_or_else(|| anyhow!("cell offsets {}..{} out of range", start, end))?;
                start = end;
                Ok(cell)
            })
            .collect()
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == key {
            let value = std::str::from_utf8(&attr.value)
                .with_context(|| format!("attribute {:?} is not UTF-8", String::from_utf8_lossy(key)))?;
            return Ok(Some(value.to_string()));
        }
    }
    Ok(None)
}

fn parse_values<T>(text: &str, array: &str) -> Result<Vec<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    text.split_whitespace()
        .map(|v| {
            v.parse::<T>()
                .with_context(|| format!("invalid value {:?} in DataArray {:?}", v, array))
        })
        .collect()
}

pub(crate) fn parse_vtp(text: &str) -> Result<Mesh> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut section = Section::Other;
    let mut pieces = 0usize;
    let mut declared_points: Option<usize> = None;
    let mut array: Option<String> = None;
    let mut values = String::new();

    let mut points: Vec<Point3<f64>> = Vec::new();
    let mut cells = CellArrays::default();
    let mut triangles = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            // an empty array holds no values
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"DataArray" => {}
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let local_name = e.local_name();
                match local_name.as_ref() {
                    b"VTKFile" => {
                        let kind = attribute(e, b"type")?.unwrap_or_default();
                        if kind != "PolyData" {
                            bail!("expected a PolyData VTKFile, found {:?}", kind);
                        }
                    }
                    b"Piece" => {
                        pieces += 1;
                        if pieces > 1 {
                            bail!("files with several pieces are not supported");
                        }
                        declared_points = attribute(e, b"NumberOfPoints")?
                            .map(|n| n.trim().parse::<usize>())
                            .transpose()
                            .context("invalid NumberOfPoints")?;
                    }
                    b"Points" => section = Section::Points,
                    b"Polys" => section = Section::Polys,
                    b"Strips" => section = Section::Strips,
                    b"Verts" | b"Lines" | b"PointData" | b"CellData" | b"FieldData" => {
                        section = Section::Other
                    }
                    b"AppendedData" => bail!("appended binary data is not supported"),
                    b"DataArray" => {
                        let name = attribute(e, b"Name")?.unwrap_or_default();
                        let format = attribute(e, b"format")?.unwrap_or_else(|| "ascii".into());
                        if format != "ascii" {
                            bail!("DataArray {:?} uses {} format, only ascii is supported", name, format);
                        }
                        values.clear();
                        array = Some(name);
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                if array.is_some() {
                    values.push_str(&e.unescape()?);
                    values.push(' ');
                }
            }
            Ok(Event::End(ref e)) => {
                let local_name = e.local_name();
                match local_name.as_ref() {
                    b"DataArray" => {
                        let name = array.take().unwrap_or_default();
                        match section {
                            Section::Points => {
                                let coords = parse_values::<f64>(&values, &name)?;
                                if coords.len() % 3 != 0 {
                                    bail!("Points array has {} values, not a multiple of 3", coords.len());
                                }
                                points.extend(
                                    coords.chunks_exact(3).map(|c| Point3::new(c[0], c[1], c[2])),
                                );
                            }
                            Section::Polys | Section::Strips => match name.as_str() {
                                "connectivity" => cells.connectivity = parse_values(&values, &name)?,
                                "offsets" => cells.offsets = parse_values(&values, &name)?,
                                _ => {}
                            },
                            Section::Other => {}
                        }
                    }
                    b"Polys" => {
                        for cell in cells.cells()? {
                            triangles.extend(fan(cell));
                        }
                        cells = CellArrays::default();
                        section = Section::Other;
                    }
                    b"Strips" => {
                        for cell in cells.cells()? {
                            triangles.extend(strip(cell));
                        }
                        cells = CellArrays::default();
                        section = Section::Other;
                    }
                    b"Points" => section = Section::Other,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => bail!("XML error at position {}: {}", reader.error_position(), e),
            _ => {}
        }
        buf.clear();
    }

    if points.is_empty() {
        bail!("VTK XML file has no Points");
    }
    if let Some(n) = declared_points {
        if n != points.len() {
            bail!("Piece declares {} points but Points holds {}", n, points.len());
        }
    }
    debug!("Parsed VTK XML polydata: {} points, {} triangles", points.len(), triangles.len());
    Ok(Mesh::new(PointSet::new(points), triangles)?)
}

fn write_data_array<W: Write>(
    writer: &mut Writer<W>,
    attributes: &[(&str, &str)],
    values: String,
) -> Result<()> {
    let mut start = BytesStart::new("DataArray");
    for &(key, value) in attributes {
        start.push_attribute((key, value));
    }
    start.push_attribute(("format", "ascii"));
    writer.write_event(Event::Start(start))?;
    if !values.is_empty() {
        writer.write_event(Event::Text(BytesText::new(&values)))?;
    }
    writer.write_event(Event::End(BytesEnd::new("DataArray")))?;
    Ok(())
}

/// Writes an ASCII XML PolyData file with point normals.
pub fn write_vtp<P: AsRef<Path>>(path: P, geometry: &MeshGeometry) -> Result<()> {
    let path = path.as_ref();
    create_parent_dir(path)?;
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = Writer::new_with_indent(BufWriter::new(file), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("VTKFile");
    root.push_attribute(("type", "PolyData"));
    root.push_attribute(("version", "1.0"));
    root.push_attribute(("byte_order", "LittleEndian"));
    root.push_attribute(("header_type", "UInt64"));
    writer.write_event(Event::Start(root))?;
    writer.write_event(Event::Start(BytesStart::new("PolyData")))?;

    let n_points = geometry.points.len().to_string();
    let n_polys = geometry.triangles.len().to_string();
    let mut piece = BytesStart::new("Piece");
    piece.push_attribute(("NumberOfPoints", n_points.as_str()));
    piece.push_attribute(("NumberOfVerts", "0"));
    piece.push_attribute(("NumberOfLines", "0"));
    piece.push_attribute(("NumberOfStrips", "0"));
    piece.push_attribute(("NumberOfPolys", n_polys.as_str()));
    writer.write_event(Event::Start(piece))?;

    let mut point_data = BytesStart::new("PointData");
    point_data.push_attribute(("Normals", "Normals"));
    writer.write_event(Event::Start(point_data))?;
    let normals = geometry
        .point_normals
        .iter()
        .map(|n| format!("{} {} {}", n.x, n.y, n.z))
        .collect::<Vec<_>>()
        .join(" ");
    write_data_array(
        &mut writer,
        &[("type", "Float64"), ("Name", "Normals"), ("NumberOfComponents", "3")],
        normals,
    )?;
    writer.write_event(Event::End(BytesEnd::new("PointData")))?;

    writer.write_event(Event::Start(BytesStart::new("Points")))?;
    let coords = geometry
        .points
        .points
        .iter()
        .map(|p| format!("{} {} {}", p.x, p.y, p.z))
        .collect::<Vec<_>>()
        .join(" ");
    write_data_array(
        &mut writer,
        &[("type", "Float64"), ("Name", "Points"), ("NumberOfComponents", "3")],
        coords,
    )?;
    writer.write_event(Event::End(BytesEnd::new("Points")))?;

    writer.write_event(Event::Start(BytesStart::new("Polys")))?;
    let connectivity = geometry
        .triangles
        .iter()
        .map(|[a, b, c]| format!("{} {} {}", a, b, c))
        .collect::<Vec<_>>()
        .join(" ");
    let offsets = (1..=geometry.triangles.len())
        .map(|i| (3 * i).to_string())
        .collect::<Vec<_>>()
        .join(" ");
    write_data_array(
        &mut writer,
        &[("type", "Int64"), ("Name", "connectivity")],
        connectivity,
    )?;
    write_data_array(&mut writer, &[("type", "Int64"), ("Name", "offsets")], offsets)?;
    writer.write_event(Event::End(BytesEnd::new("Polys")))?;

    writer.write_event(Event::End(BytesEnd::new("Piece")))?;
    writer.write_event(Event::End(BytesEnd::new("PolyData")))?;
    writer.write_event(Event::End(BytesEnd::new("VTKFile")))?;

    writer.into_inner().flush()?;
    Ok(())
}
