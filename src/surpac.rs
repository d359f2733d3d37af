//! Surpac STR+DTM triangulated surface pair (spec.md §4.6.6, read-only).
//!
//! STR files carry one vertex per line as `stringNumber,Y,X,Z` — Surpac's Y
//! before X convention — with `stringNumber == 0` marking an object break.
//! DTM files carry 1-based triangle vertex indices into that same string
//! table, grouped by `TRISOLATION` blocks or `0,0.0,0.0,0.0` breaks; each
//! group becomes its own [`Surface`] via the shared spatial-hash assembly
//! in spec.md §4.6.6.

use thiserror::Error;

use crate::model::{Point3, Surface};
use crate::spatial_hash::SpatialPointHash;
use crate::ParseResult;

#[derive(Debug, Error)]
pub enum SurpacError {
    #[error("STR row {0} does not have 4 columns")]
    BadStrRow(usize),
    #[error("DTM row {0} does not have 4 columns")]
    BadDtmRow(usize),
}

/// Parse an STR file's vertex table. Index 0 is unused so that 1-based DTM
/// references index directly; object-break rows (`stringNumber == 0`) are
/// recorded but not retained as vertices.
fn parse_str(text: &str) -> Result<Vec<Point3>, SurpacError> {
    let mut points = vec![Point3::new(0.0, 0.0, 0.0)];
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line == "END" {
            continue;
        }
        let cols: Vec<&str> = line.split(',').map(str::trim).collect();
        if cols.len() < 4 {
            continue;
        }
        let string_number: f64 = cols[0].parse().map_err(|_| SurpacError::BadStrRow(i))?;
        if string_number == 0.0 {
            continue;
        }
        let y: f64 = cols[1].parse().map_err(|_| SurpacError::BadStrRow(i))?;
        let x: f64 = cols[2].parse().map_err(|_| SurpacError::BadStrRow(i))?;
        let z: f64 = cols[3].parse().map_err(|_| SurpacError::BadStrRow(i))?;
        points.push(Point3::new(x, y, z));
    }
    Ok(points)
}

/// One block of 1-based triangle vertex index triples, as delimited by a
/// `TRISOLATION` marker line or a `0,0.0,0.0,0.0` break.
fn parse_dtm_blocks(text: &str) -> Result<Vec<Vec<(u32, u32, u32)>>, SurpacError> {
    let mut blocks: Vec<Vec<(u32, u32, u32)>> = vec![Vec::new()];

    for (i, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("END") {
            continue;
        }
        if trimmed.to_uppercase().contains("TRISOLATION") {
            if !blocks.last().unwrap().is_empty() {
                blocks.push(Vec::new());
            }
            continue;
        }
        let cols: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        if cols.len() < 4 {
            continue;
        }
        let Ok(a) = cols[1].parse::<f64>() else { continue };
        let Ok(b) = cols[2].parse::<f64>() else { continue };
        let Ok(c) = cols[3].parse::<f64>() else { continue };

        if a == 0.0 && b == 0.0 && c == 0.0 {
            if !blocks.last().unwrap().is_empty() {
                blocks.push(Vec::new());
            }
            continue;
        }

        let triangle = (a as u32, b as u32, c as u32);
        blocks.last_mut().unwrap().push(triangle);
        let _ = i;
    }

    blocks.retain(|b| !b.is_empty());
    Ok(blocks)
}

/// Assemble deduplicated `Surface`s from an STR vertex table and grouped DTM
/// triangle blocks, following spec.md §4.6.6. A single block becomes
/// `<base_name>`; multiple blocks become `<base_name>_part1`, `_part2`, ….
fn assemble_surfaces(base_name: &str, str_points: &[Point3], dtm_blocks: &[Vec<(u32, u32, u32)>]) -> Vec<Surface> {
    let mut surfaces = Vec::new();
    let multi = dtm_blocks.len() > 1;

    for (block_index, block) in dtm_blocks.iter().enumerate() {
        let mut hash = SpatialPointHash::with_default_tolerance();
        let mut triangles = Vec::new();

        for &(a, b, c) in block {
            let (Some(pa), Some(pb), Some(pc)) = (str_points.get(a as usize), str_points.get(b as usize), str_points.get(c as usize)) else {
                continue;
            };
            let (ia, _) = hash.intern(*pa);
            let (ib, _) = hash.intern(*pb);
            let (ic, _) = hash.intern(*pc);
            triangles.push(crate::model::surface::Triangle::new(ia, ib, ic, hash.points()));
        }

        let name = if multi { format!("{base_name}_part{}", block_index + 1) } else { base_name.to_string() };
        let id = name.clone();
        if let Some(surface) = Surface::from_mesh(id, name, hash.into_points(), triangles) {
            surfaces.push(surface);
        }
    }

    surfaces
}

/// Parse a matched STR+DTM pair into the surfaces they describe. `base_name`
/// is typically the shared file stem.
pub fn parse_pair(base_name: &str, str_text: &str, dtm_text: &str) -> Result<ParseResult<Vec<Surface>>, SurpacError> {
    tracing::debug!(%base_name, "parsing Surpac STR+DTM pair");
    let str_points = parse_str(str_text)?;
    let dtm_blocks = parse_dtm_blocks(dtm_text)?;
    let surfaces = assemble_surfaces(base_name, &str_points, &dtm_blocks);

    let mut result = ParseResult::new(surfaces);
    result.success_count = result.payload.len();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_str() -> String {
        "\
1,0.0,0.0,0.0\n\
1,0.0,10.0,0.0\n\
1,10.0,10.0,0.0\n\
1,10.0,0.0,0.0\n\
0,0.0,0.0,0.0\n\
END\n"
            .to_string()
    }

    #[test]
    fn single_block_produces_one_surface() {
        let str_text = square_str();
        let dtm_text = "TRISOLATION\n1,1,2,3\n1,1,3,4\nEND\n";
        let result = parse_pair("pit1", &str_text, dtm_text).unwrap();
        assert_eq!(result.payload.len(), 1);
        let surface = &result.payload[0];
        assert_eq!(surface.name, "pit1");
        assert_eq!(surface.triangles.len(), 2);
        assert_eq!(surface.points.len(), 4);
    }

    #[test]
    fn multiple_trisolation_blocks_split_into_parts() {
        let str_text = square_str();
        let dtm_text = "TRISOLATION\n1,1,2,3\nTRISOLATION\n1,1,3,4\nEND\n";
        let result = parse_pair("pit1", &str_text, dtm_text).unwrap();
        assert_eq!(result.payload.len(), 2);
        assert_eq!(result.payload[0].name, "pit1_part1");
        assert_eq!(result.payload[1].name, "pit1_part2");
    }

    #[test]
    fn object_break_row_splits_triangle_blocks() {
        let str_text = square_str();
        let dtm_text = "TRISOLATION\n1,1,2,3\n0,0.0,0.0,0.0\n1,1,3,4\nEND\n";
        let result = parse_pair("pit1", &str_text, dtm_text).unwrap();
        assert_eq!(result.payload.len(), 2);
    }

    #[test]
    fn y_before_x_convention_is_honored() {
        let str_text = "1,5.0,2.0,9.0\n0,0.0,0.0,0.0\n";
        let points = parse_str(&str_text).unwrap();
        assert_eq!(points[1].x, 2.0);
        assert_eq!(points[1].y, 5.0);
        assert_eq!(points[1].z, 9.0);
    }
}
