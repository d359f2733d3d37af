//! Orica SPF blast-design archive (spec.md §4.6.7, read-only).
//!
//! An SPF file is a ZIP archive of BLIS-namespaced XML (`http://www.orica.com
//! /namespaces/blis`). The three members this crate needs are
//! `Header.Xml`, `BlastHeader.Xml` and `BlisData.Xml`; everything else in
//! the archive is ignored. XML reading follows the teacher's
//! `descendants().filter(has_tag_name)` + child-text-lookup idiom
//! (`export::camouflage`).

use std::io::Read;

use roxmltree::{Document, Node};
use thiserror::Error;

use crate::geometry_resolver::{self, GeometryInput};
use crate::model::{Hole, Measured, Point3};
use crate::ParseResult;

#[derive(Debug, Error)]
pub enum SpfError {
    #[error("SPF archive is missing required member {0}")]
    MissingMember(&'static str),
    #[error("SPF XML member {0} failed to parse: {1}")]
    Xml(&'static str, String),
}

fn child_text<'a>(node: &'a Node, tag: &str) -> Option<&'a str> {
    node.children().find(|n| n.has_tag_name(tag))?.text()
}

fn child_f64(node: &Node, tag: &str) -> Option<f64> {
    child_text(node, tag)?.trim().parse().ok()
}

/// Try `(X,Y,Z)` first, then `(Easting,Northing,Elevation)`, then
/// `(Easting,Northing,RL)` (spec.md §4.6.7).
fn position_from(node: &Node) -> Option<Point3> {
    if let (Some(x), Some(y), Some(z)) = (child_f64(node, "X"), child_f64(node, "Y"), child_f64(node, "Z")) {
        return Some(Point3::new(x, y, z));
    }
    let (Some(easting), Some(northing)) = (child_f64(node, "Easting"), child_f64(node, "Northing")) else {
        return None;
    };
    let elevation = child_f64(node, "Elevation").or_else(|| child_f64(node, "RL"))?;
    Some(Point3::new(easting, northing, elevation))
}

struct RawHole {
    index: usize,
    hole_id: String,
    is_dummy: bool,
    diameter: f64,
    design_collar: Option<Point3>,
    design_toe: Option<Point3>,
    actual_collar: Option<Point3>,
    actual_toe: Option<Point3>,
}

fn is_truthy(text: &str) -> bool {
    matches!(text.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_holes(doc: &Document) -> Vec<RawHole> {
    doc.descendants()
        .filter(|n| n.has_tag_name("Hole"))
        .enumerate()
        .map(|(index, node)| {
            let hole_id = child_text(&node, "ID").unwrap_or_default().to_string();
            let is_dummy = child_text(&node, "IsDummy").map(is_truthy).unwrap_or(false);
            let diameter = child_f64(&node, "Diameter").unwrap_or(0.0);

            let design = node.children().find(|n| n.has_tag_name("Design"));
            let actual = node.children().find(|n| n.has_tag_name("Actual"));

            let design_collar = design.as_ref().and_then(|d| d.children().find(|n| n.has_tag_name("Collar"))).and_then(|n| position_from(&n));
            let design_toe = design.as_ref().and_then(|d| d.children().find(|n| n.has_tag_name("Toe"))).and_then(|n| position_from(&n));
            let actual_collar = actual.as_ref().and_then(|d| d.children().find(|n| n.has_tag_name("Collar"))).and_then(|n| position_from(&n));
            let actual_toe = actual.as_ref().and_then(|d| d.children().find(|n| n.has_tag_name("Toe"))).and_then(|n| position_from(&n));

            RawHole {
                index,
                hole_id,
                is_dummy,
                diameter,
                design_collar,
                design_toe,
                actual_collar,
                actual_toe,
            }
        })
        .collect()
}

struct TieType {
    delay_ms: f64,
    color_hex: String,
}

/// `(hole1Index, hole2Index, tieTypeIndex)` as spec.md §4.3.3 describes it.
struct TieEntry {
    from_index: usize,
    to_index: usize,
    tie_type_index: usize,
}

fn parse_tie_types(doc: &Document) -> Vec<TieType> {
    doc.descendants()
        .filter(|n| n.has_tag_name("TieType"))
        .map(|node| TieType {
            delay_ms: child_f64(&node, "Delay").unwrap_or(0.0),
            color_hex: child_text(&node, "ColorHex").unwrap_or("#777777").to_string(),
        })
        .collect()
}

fn parse_tie_table(doc: &Document) -> Vec<TieEntry> {
    doc.descendants()
        .filter(|n| n.has_tag_name("Tie"))
        .filter_map(|node| {
            let from_index = child_text(&node, "HoleIndex1")?.trim().parse().ok()?;
            let to_index = child_text(&node, "HoleIndex2")?.trim().parse().ok()?;
            let tie_type_index = child_text(&node, "TieTypeIndex")?.trim().parse().ok()?;
            Some(TieEntry { from_index, to_index, tie_type_index })
        })
        .collect()
}

fn parse_leadins(doc: &Document) -> std::collections::HashSet<usize> {
    doc.descendants()
        .filter(|n| n.has_tag_name("Leadin"))
        .filter_map(|node| child_text(&node, "HoleIndex").and_then(|s| s.trim().parse().ok()))
        .collect()
}

fn read_zip_member(bytes: &[u8], name: &str) -> Result<String, SpfError> {
    let cursor = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor).map_err(|_| SpfError::MissingMember("BlisData.Xml"))?;
    let mut file = archive.by_name(name).map_err(|_| SpfError::MissingMember(leak(name)))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).map_err(|_| SpfError::MissingMember(leak(name)))?;
    Ok(contents)
}

/// `SpfError::MissingMember` wants a `&'static str`; the handful of member
/// names this module ever looks up are all string literals already.
fn leak(name: &str) -> &'static str {
    match name {
        "Header.Xml" => "Header.Xml",
        "BlastHeader.Xml" => "BlastHeader.Xml",
        "BlisData.Xml" => "BlisData.Xml",
        _ => "unknown SPF member",
    }
}

/// Parse an SPF ZIP archive's bytes into a blast's holes. `blast_name` is
/// the input filename stem (spec.md §4.6.7).
pub fn parse(blast_name: &str, archive_bytes: &[u8]) -> Result<ParseResult<Vec<Hole>>, SpfError> {
    tracing::debug!(%blast_name, "parsing SPF archive");
    let _header_xml = read_zip_member(archive_bytes, "Header.Xml")?;
    let _blast_header_xml = read_zip_member(archive_bytes, "BlastHeader.Xml")?;
    let blis_xml = read_zip_member(archive_bytes, "BlisData.Xml")?;

    let doc = Document::parse(&blis_xml).map_err(|e| SpfError::Xml("BlisData.Xml", e.to_string()))?;

    let raw_holes = parse_holes(&doc);
    let tie_types = parse_tie_types(&doc);
    let tie_table = parse_tie_table(&doc);
    let leadins = parse_leadins(&doc);

    let mut from_hole_map: std::collections::HashMap<usize, (usize, usize)> = std::collections::HashMap::new();
    for entry in &tie_table {
        from_hole_map.insert(entry.to_index, (entry.from_index, entry.tie_type_index));
    }

    let mut result = ParseResult::new(Vec::new());

    for raw in &raw_holes {
        if raw.is_dummy {
            result.push_warning(format!("SPF hole {} is marked dummy, skipped", raw.hole_id));
            continue;
        }

        let collar = raw.actual_collar.or(raw.design_collar);
        let toe = raw.actual_toe.or(raw.design_toe);

        let input = GeometryInput { collar, toe, length: None, angle: None, bearing: None, subdrill: None };
        let Ok(resolved) = geometry_resolver::resolve(&input) else {
            result.push_warning(format!("SPF hole {} has no usable geometry", raw.hole_id));
            continue;
        };

        let (from_hole_id, delay, color_hex) = if leadins.contains(&raw.index) {
            (Hole::compose_from_hole_id(blast_name, &raw.hole_id), 0.0, "#777777".to_string())
        } else if let Some(&(from_index, tie_type_index)) = from_hole_map.get(&raw.index) {
            let from_id = raw_holes.get(from_index).map(|h| h.hole_id.clone()).unwrap_or_default();
            match tie_types.get(tie_type_index) {
                Some(tie_type) => (Hole::compose_from_hole_id(blast_name, &from_id), tie_type.delay_ms.round(), tie_type.color_hex.clone()),
                None => (Hole::compose_from_hole_id(blast_name, &raw.hole_id), 0.0, "#777777".to_string()),
            }
        } else {
            (Hole::compose_from_hole_id(blast_name, &raw.hole_id), 0.0, "#777777".to_string())
        };

        result.payload.push(Hole {
            hole_id: raw.hole_id.clone(),
            entity_name: blast_name.to_string(),
            collar: resolved.collar,
            grade: resolved.grade,
            toe: resolved.toe,
            hole_length_calculated: resolved.hole_length_calculated,
            hole_angle: resolved.hole_angle,
            hole_bearing: resolved.hole_bearing,
            subdrill_amount: resolved.subdrill_amount,
            subdrill_length: resolved.subdrill_length,
            bench_height: resolved.bench_height,
            hole_diameter: raw.diameter,
            hole_type: String::new(),
            from_hole_id,
            timing_delay_milliseconds: delay,
            color_hex_decimal: color_hex,
            measured_length: Measured::default(),
            measured_mass: Measured::default(),
            measured_comment: Measured::default(),
            row_id: None,
            pos_id: None,
            burden: None,
            spacing: None,
            connector_curve: None,
        });
        result.success_count += 1;
    }

    Ok(result)
}
