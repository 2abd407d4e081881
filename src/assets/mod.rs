use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// How numeric fields that fail to parse are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Substitute zero for the bad field and keep going.
    #[default]
    Lenient,
    /// Abort the file with an error naming the line.
    Strict,
}

/// Flat position and triangle-index buffers for one geometry file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshGeometry {
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshGeometry {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub vertices: usize,
    pub triangles: usize,
    pub skipped_lines: usize,
    pub substituted_fields: usize,
    pub dropped_triangles: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read geometry at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: invalid numeric field '{field}'")]
    InvalidNumber { line: usize, field: String },
    #[error("line {line}: vertex reference {reference} does not resolve to a position")]
    InvalidReference { line: usize, reference: i64 },
    #[error("face references vertex {index} but only {vertex_count} positions exist")]
    IndexOutOfRange { index: u32, vertex_count: usize },
}

pub fn parse_geometry_file(
    path: &Path,
    mode: ParseMode,
) -> Result<(MeshGeometry, ParseStats), AssetError> {
    let file = File::open(path).map_err(|source| AssetError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let parsed = parse_geometry(file, mode).map_err(|err| match err {
        AssetError::Read { source, .. } => AssetError::Read {
            path: path.display().to_string(),
            source,
        },
        other => other,
    })?;
    let stats = &parsed.1;
    log::info!(
        "Loaded {} vertices and {} triangles from {}",
        stats.vertices,
        stats.triangles,
        path.display()
    );
    Ok(parsed)
}

pub fn parse_geometry<R: Read>(
    reader: R,
    mode: ParseMode,
) -> Result<(MeshGeometry, ParseStats), AssetError> {
    let mut geometry = MeshGeometry::default();
    let mut stats = ParseStats::default();
    let mut face = Vec::with_capacity(4);

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut line_number = 0usize;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|source| AssetError::Read {
                path: String::new(),
                source,
            })?;
        if read == 0 {
            break;
        }
        line_number += 1;
        // exporters write comments in legacy encodings
        let line = String::from_utf8_lossy(&buf);
        let mut fields = line.split_whitespace();
        let Some(tag) = fields.next() else {
            continue;
        };
        let fields: Vec<&str> = fields.collect();

        match tag {
            "v" => {
                if fields.len() < 3 {
                    stats.skipped_lines += 1;
                    continue;
                }
                let mut position = [0.0f32; 3];
                for (slot, field) in position.iter_mut().zip(&fields[..3]) {
                    *slot = parse_number(field, line_number, mode, &mut stats)?;
                }
                geometry.vertices.push(position);
            }
            "f" => {
                if fields.len() < 3 {
                    stats.skipped_lines += 1;
                    continue;
                }
                face.clear();
                for field in &fields {
                    let reference = field.split('/').next().unwrap_or_default();
                    let reference: i64 = parse_number(reference, line_number, mode, &mut stats)?;
                    face.push(resolve_reference(
                        reference,
                        geometry.vertices.len(),
                        line_number,
                        mode,
                    )?);
                }
                triangulate_fan(&face, &mut geometry.indices);
            }
            _ => {}
        }
    }

    stats.dropped_triangles = drop_out_of_range(&mut geometry, mode)?;
    stats.vertices = geometry.vertices.len();
    stats.triangles = geometry.triangle_count();
    if stats.substituted_fields > 0 || stats.dropped_triangles > 0 {
        log::warn!(
            "Geometry parsed with {} substituted fields and {} dropped triangles",
            stats.substituted_fields,
            stats.dropped_triangles
        );
    }
    Ok((geometry, stats))
}

fn parse_number<T>(
    field: &str,
    line: usize,
    mode: ParseMode,
    stats: &mut ParseStats,
) -> Result<T, AssetError>
where
    T: std::str::FromStr + Default,
{
    match field.parse() {
        Ok(value) => Ok(value),
        Err(_) => match mode {
            ParseMode::Strict => Err(AssetError::InvalidNumber {
                line,
                field: field.to_string(),
            }),
            ParseMode::Lenient => {
                stats.substituted_fields += 1;
                Ok(T::default())
            }
        },
    }
}

/// Maps a one-based (or negative, relative) reference to a zero-based index.
/// References before the first vertex become index 0 when lenient.
fn resolve_reference(
    reference: i64,
    vertex_count: usize,
    line: usize,
    mode: ParseMode,
) -> Result<u32, AssetError> {
    let resolved = match reference {
        r if r > 0 => r - 1,
        r if r < 0 => vertex_count as i64 + r,
        _ => -1,
    };
    if resolved < 0 {
        return match mode {
            ParseMode::Lenient => Ok(0),
            ParseMode::Strict => Err(AssetError::InvalidReference { line, reference }),
        };
    }
    // too large for u32: left out of range so the triangle gets dropped
    Ok(u32::try_from(resolved).unwrap_or(u32::MAX))
}

/// Fan triangulation from the first corner: (0,1,2), (0,2,3), ...
fn triangulate_fan(face: &[u32], indices: &mut Vec<u32>) {
    for pair in face[1..].windows(2) {
        indices.extend_from_slice(&[face[0], pair[0], pair[1]]);
    }
}

fn drop_out_of_range(geometry: &mut MeshGeometry, mode: ParseMode) -> Result<usize, AssetError> {
    let vertex_count = geometry.vertices.len();
    let Some(&index) = geometry
        .indices
        .iter()
        .find(|&&index| index as usize >= vertex_count)
    else {
        return Ok(0);
    };
    if mode == ParseMode::Strict {
        return Err(AssetError::IndexOutOfRange {
            index,
            vertex_count,
        });
    }

    let before = geometry.triangle_count();
    let kept: Vec<u32> = geometry
        .indices
        .chunks_exact(3)
        .filter(|tri| tri.iter().all(|&index| (index as usize) < vertex_count))
        .flatten()
        .copied()
        .collect();
    geometry.indices = kept;
    Ok(before - geometry.triangle_count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(source: &str, mode: ParseMode) -> Result<(MeshGeometry, ParseStats), AssetError> {
        parse_geometry(Cursor::new(source), mode)
    }

    #[test]
    fn triangle_faces_become_zero_based_indices() {
        let source = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3\nf 1 3 4\n";
        let (geometry, stats) = parse(source, ParseMode::Lenient).unwrap();
        assert_eq!(geometry.vertices.len(), 4);
        assert_eq!(geometry.vertices.concat().len(), 12);
        assert_eq!(geometry.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(stats.triangles, 2);
    }

    #[test]
    fn extra_vertex_fields_and_slash_references_are_ignored() {
        let source = "v 1.5 -2 3 1.0\nv 0 0 0\nv 4 4 4\nf 1/7/9 2//3 3/1\n";
        let (geometry, _) = parse(source, ParseMode::Lenient).unwrap();
        assert_eq!(geometry.vertices[0], [1.5, -2.0, 3.0]);
        assert_eq!(geometry.indices, vec![0, 1, 2]);
    }

    #[test]
    fn quad_faces_are_fan_triangulated() {
        let source = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let (geometry, _) = parse(source, ParseMode::Lenient).unwrap();
        assert_eq!(geometry.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn pentagon_yields_three_triangles() {
        let source = "v 0 0 0\nv 1 0 0\nv 2 1 0\nv 1 2 0\nv 0 1 0\nf 1 2 3 4 5\n";
        let (geometry, _) = parse(source, ParseMode::Lenient).unwrap();
        assert_eq!(geometry.indices, vec![0, 1, 2, 0, 2, 3, 0, 3, 4]);
    }

    #[test]
    fn short_and_unknown_lines_are_skipped() {
        let source = "# comment\n\nvn 0 1 0\nvt 0 0\no navmesh\nv 1 2\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2\nf 1 2 3\n";
        let (geometry, stats) = parse(source, ParseMode::Lenient).unwrap();
        assert_eq!(geometry.vertices.len(), 3);
        assert_eq!(geometry.indices, vec![0, 1, 2]);
        assert_eq!(stats.skipped_lines, 2);
    }

    #[test]
    fn lenient_mode_substitutes_zero() {
        let source = "v 1 abc 3\nv 0 0 0\nv 1 1 1\nf 1 2 3\n";
        let (geometry, stats) = parse(source, ParseMode::Lenient).unwrap();
        assert_eq!(geometry.vertices[0], [1.0, 0.0, 3.0]);
        assert_eq!(stats.substituted_fields, 1);
    }

    #[test]
    fn strict_mode_reports_the_line() {
        let source = "v 0 0 0\nv 1 x 3\n";
        match parse(source, ParseMode::Strict) {
            Err(AssetError::InvalidNumber { line, field }) => {
                assert_eq!(line, 2);
                assert_eq!(field, "x");
            }
            other => panic!("expected InvalidNumber, got {:?}", other),
        }
    }

    #[test]
    fn negative_references_are_relative() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let (geometry, _) = parse(source, ParseMode::Lenient).unwrap();
        assert_eq!(geometry.indices, vec![0, 1, 2]);
    }

    #[test]
    fn out_of_range_triangles_are_dropped_when_lenient() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\nf 1 2 9\n";
        let (geometry, stats) = parse(source, ParseMode::Lenient).unwrap();
        assert_eq!(geometry.indices, vec![0, 1, 2]);
        assert_eq!(stats.dropped_triangles, 1);
    }

    #[test]
    fn out_of_range_triangles_fail_when_strict() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n";
        assert!(matches!(
            parse(source, ParseMode::Strict),
            Err(AssetError::IndexOutOfRange {
                index: 8,
                vertex_count: 3
            })
        ));
    }

    #[test]
    fn faces_without_positions_leave_empty_geometry() {
        let (geometry, _) = parse("f 1 2 3\n", ParseMode::Lenient).unwrap();
        assert!(geometry.is_empty());
    }

    #[test]
    fn non_utf8_comment_does_not_discard_the_file() {
        let source: &[u8] = b"# Cr\xe9\xe9 par export\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let (geometry, stats) = parse_geometry(Cursor::new(source), ParseMode::Lenient).unwrap();
        assert_eq!(geometry.vertices.len(), 3);
        assert_eq!(geometry.indices, vec![0, 1, 2]);
        assert_eq!(stats.skipped_lines, 0);
    }

    #[test]
    fn crlf_line_endings_parse() {
        let (geometry, _) = parse("v 0 0 0\r\nv 1 0 0\r\nv 0 1 0\r\nf 1 2 3\r\n", ParseMode::Strict).unwrap();
        assert_eq!(geometry.indices, vec![0, 1, 2]);
    }

    #[test]
    fn oversized_references_are_dropped_like_other_out_of_range() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 99999999999\nf 1 2 9\n";
        let (geometry, stats) = parse(source, ParseMode::Lenient).unwrap();
        assert!(geometry.indices.is_empty());
        assert_eq!(stats.dropped_triangles, 2);

        assert!(matches!(
            parse(source, ParseMode::Strict),
            Err(AssetError::IndexOutOfRange {
                index: u32::MAX,
                vertex_count: 3
            })
        ));
    }

    #[test]
    fn zero_reference_is_repaired_or_rejected() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 2 3\n";
        let (geometry, _) = parse(source, ParseMode::Lenient).unwrap();
        assert_eq!(geometry.indices, vec![0, 1, 2]);
        assert!(matches!(
            parse(source, ParseMode::Strict),
            Err(AssetError::InvalidReference {
                line: 4,
                reference: 0
            })
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.obj");
        assert!(matches!(
            parse_geometry_file(&path, ParseMode::Lenient),
            Err(AssetError::Read { .. })
        ));
    }
}
