//! Binary DXF parser and writer (spec.md §4.6.1, §4.7.1).

use std::collections::BTreeSet;

use crate::entity_namer::EntityNamerStrategy;
use crate::model::{Drawing, DrawingMap, Hole, Surface};

use super::entities::{self, DxfBuildOptions, DxfBuildOutput};
use super::group_code::{self, Record, Value};
use super::DxfError;

/// Parse a complete binary-DXF file (sentinel included).
pub fn parse(bytes: &[u8], opts: &DxfBuildOptions) -> Result<DxfBuildOutput, DxfError> {
    group_code::check_sentinel(bytes)?;
    let records = group_code::decode(&bytes[group_code::SENTINEL.len()..])?;
    Ok(entities::build(&records, opts))
}

#[derive(Debug, Clone)]
pub struct BinaryDxfWriteOptions {
    pub naming_strategy: EntityNamerStrategy,
    /// Emit `LWPOLYLINE` instead of `POLYLINE`+`VERTEX`+`SEQEND`.
    pub use_lwpolyline: bool,
    /// Register the `MAPTEK_VULCAN` APPID and emit Vulcan extended data.
    pub include_vulcan: bool,
}

impl Default for BinaryDxfWriteOptions {
    fn default() -> Self {
        BinaryDxfWriteOptions { naming_strategy: EntityNamerStrategy::LayerIndex, use_lwpolyline: false, include_vulcan: false }
    }
}

/// Incrementing hex handle counter starting at 256 (0x100), per spec.md §4.7.1.
struct HandleCounter(u32);

impl HandleCounter {
    fn new() -> Self {
        HandleCounter(0x100)
    }

    fn next(&mut self) -> String {
        let h = format!("{:X}", self.0);
        self.0 += 1;
        h
    }
}

/// Write a complete binary-DXF file for a set of drawings and surfaces.
pub fn write(drawings: &DrawingMap, surfaces: &[Surface], opts: &BinaryDxfWriteOptions) -> Vec<u8> {
    let mut records = Vec::new();
    let mut handles = HandleCounter::new();

    let layers: BTreeSet<String> = drawings.iter().map(|(_, d)| d.common().layer.clone()).collect();

    records.push(Record::str(0, "SECTION"));
    records.push(Record::str(2, "HEADER"));
    records.push(Record::str(9, "$ACADVER"));
    records.push(Record::str(1, "AC1015"));
    records.push(Record::str(9, "$INSUNITS"));
    records.push(Record::new(70, Value::Int16(4)));
    records.push(Record::str(0, "ENDSEC"));

    records.push(Record::str(0, "SECTION"));
    records.push(Record::str(2, "TABLES"));

    records.push(Record::str(0, "TABLE"));
    records.push(Record::str(2, "LTYPE"));
    records.push(Record::str(0, "LTYPE"));
    records.push(Record::str(2, "CONTINUOUS"));
    records.push(Record::str(0, "ENDTAB"));

    records.push(Record::str(0, "TABLE"));
    records.push(Record::str(2, "LAYER"));
    for layer in &layers {
        records.push(Record::str(0, "LAYER"));
        records.push(Record::str(2, layer.clone()));
    }
    records.push(Record::str(0, "ENDTAB"));

    if opts.include_vulcan {
        records.push(Record::str(0, "TABLE"));
        records.push(Record::str(2, "APPID"));
        records.push(Record::str(0, "APPID"));
        records.push(Record::str(2, "MAPTEK_VULCAN"));
        records.push(Record::str(0, "ENDTAB"));
    }
    records.push(Record::str(0, "ENDSEC"));

    records.push(Record::str(0, "SECTION"));
    records.push(Record::str(2, "BLOCKS"));
    records.push(Record::str(0, "ENDSEC"));

    records.push(Record::str(0, "SECTION"));
    records.push(Record::str(2, "ENTITIES"));
    for (_, drawing) in drawings.iter() {
        write_drawing(&mut records, drawing, &mut handles, opts);
    }
    for surface in surfaces {
        write_surface_3dfaces(&mut records, surface, &mut handles);
    }
    records.push(Record::str(0, "ENDSEC"));

    records.push(Record::str(0, "EOF"));

    group_code::encode_with_sentinel(&records)
}

fn write_drawing(records: &mut Vec<Record>, drawing: &Drawing, handles: &mut HandleCounter, opts: &BinaryDxfWriteOptions) {
    let common = drawing.common();
    match drawing {
        Drawing::Point { vertex, .. } => {
            records.push(Record::str(0, "POINT"));
            records.push(Record::str(5, handles.next()));
            records.push(Record::str(8, common.layer.clone()));
            write_xyz(records, 10, vertex.position);
            records.push(Record::new(62, Value::Int16(crate::model::color::hex_to_aci(&vertex.color) as i16)));
        }
        Drawing::Line { vertices, .. } => {
            if vertices.len() == 2 {
                records.push(Record::str(0, "LINE"));
                records.push(Record::str(5, handles.next()));
                records.push(Record::str(8, common.layer.clone()));
                write_xyz(records, 10, vertices[0].position);
                write_xyz(records, 11, vertices[1].position);
            } else {
                write_polyline(records, vertices, false, handles, common.layer.clone(), opts.use_lwpolyline);
            }
        }
        Drawing::Polygon { vertices, .. } => write_polyline(records, vertices, true, handles, common.layer.clone(), opts.use_lwpolyline),
        Drawing::Circle { center, radius, color, .. } => {
            records.push(Record::str(0, "CIRCLE"));
            records.push(Record::str(5, handles.next()));
            records.push(Record::str(8, common.layer.clone()));
            write_xyz(records, 10, *center);
            records.push(Record::new(40, Value::Double(*radius)));
            records.push(Record::new(62, Value::Int16(crate::model::color::hex_to_aci(color) as i16)));
        }
        Drawing::Text { anchor, text, font_height, .. } => {
            records.push(Record::str(0, "TEXT"));
            records.push(Record::str(5, handles.next()));
            records.push(Record::str(8, common.layer.clone()));
            write_xyz(records, 10, *anchor);
            records.push(Record::new(40, Value::Double(*font_height)));
            records.push(Record::str(1, text.clone()));
        }
    }

    if let Some(vulcan_name) = &common.vulcan_name {
        if opts.include_vulcan {
            records.push(Record::str(1001, "MAPTEK_VULCAN"));
            records.push(Record::str(1000, format!("VulcanName={vulcan_name}")));
        }
    }
}

fn write_polyline(records: &mut Vec<Record>, vertices: &[crate::model::Vertex], closed: bool, handles: &mut HandleCounter, layer: String, use_lwpolyline: bool) {
    if use_lwpolyline {
        records.push(Record::str(0, "LWPOLYLINE"));
        records.push(Record::str(5, handles.next()));
        records.push(Record::str(8, layer));
        records.push(Record::new(70, Value::Int16(if closed { 1 } else { 0 })));
        for v in vertices {
            records.push(Record::new(10, Value::Double(v.position.x)));
            records.push(Record::new(20, Value::Double(v.position.y)));
        }
        return;
    }

    records.push(Record::str(0, "POLYLINE"));
    records.push(Record::str(5, handles.next()));
    records.push(Record::str(8, layer.clone()));
    records.push(Record::new(70, Value::Int16(if closed { 9 } else { 8 })));
    for v in vertices {
        records.push(Record::str(0, "VERTEX"));
        records.push(Record::str(5, handles.next()));
        records.push(Record::str(8, layer.clone()));
        write_xyz(records, 10, v.position);
    }
    records.push(Record::str(0, "SEQEND"));
    records.push(Record::str(5, handles.next()));
}

fn write_surface_3dfaces(records: &mut Vec<Record>, surface: &Surface, handles: &mut HandleCounter) {
    for t in &surface.triangles {
        records.push(Record::str(0, "3DFACE"));
        records.push(Record::str(5, handles.next()));
        records.push(Record::str(8, surface.name.clone()));
        write_xyz(records, 10, surface.points[t.v1 as usize]);
        write_xyz(records, 11, surface.points[t.v2 as usize]);
        write_xyz(records, 12, surface.points[t.v3 as usize]);
        write_xyz(records, 13, surface.points[t.v3 as usize]);
    }
}

fn write_xyz(records: &mut Vec<Record>, base_code: u16, p: crate::model::Point3) {
    records.push(Record::new(base_code, Value::Double(p.x)));
    records.push(Record::new(base_code + 10, Value::Double(p.y)));
    records.push(Record::new(base_code + 20, Value::Double(p.z)));
}

/// Write holes in "Vulcan mode": a 3-vertex 3-D polyline (collar, grade,
/// toe) with `VulcanName`/`VulcanBearing`/`VulcanDip`/`VulcanLength`
/// extended data, plus a TEXT label at the collar (spec.md §4.7.1).
pub fn write_holes_vulcan(holes: &[Hole]) -> Vec<u8> {
    let mut records = Vec::new();
    let mut handles = HandleCounter::new();

    records.push(Record::str(0, "SECTION"));
    records.push(Record::str(2, "ENTITIES"));

    for hole in holes {
        records.push(Record::str(0, "POLYLINE"));
        records.push(Record::str(5, handles.next()));
        records.push(Record::str(8, hole.entity_name.clone()));
        records.push(Record::new(70, Value::Int16(8)));
        for p in [hole.collar, hole.grade, hole.toe] {
            records.push(Record::str(0, "VERTEX"));
            records.push(Record::str(5, handles.next()));
            write_xyz(&mut records, 10, p);
        }
        records.push(Record::str(0, "SEQEND"));
        records.push(Record::str(5, handles.next()));

        records.push(Record::str(1001, "MAPTEK_VULCAN"));
        records.push(Record::str(1000, format!("VulcanName={}", hole.hole_id)));
        records.push(Record::str(1000, "VulcanGroup="));
        records.push(Record::str(1000, "VulcanValue=0"));
        records.push(Record::str(1000, format!("VulcanDescription={}", hole.hole_type)));
        records.push(Record::str(1000, format!("VulcanBearing={}", hole.hole_bearing)));
        records.push(Record::str(1000, format!("VulcanDip={}", 90.0 - hole.hole_angle)));
        records.push(Record::str(1000, format!("VulcanLength={}", hole.hole_length_calculated)));

        records.push(Record::str(0, "TEXT"));
        records.push(Record::str(5, handles.next()));
        records.push(Record::str(8, hole.entity_name.clone()));
        write_xyz(&mut records, 10, hole.collar);
        records.push(Record::new(40, Value::Double(2.5)));
        records.push(Record::str(1, hole.hole_id.clone()));
    }

    records.push(Record::str(0, "ENDSEC"));
    records.push(Record::str(0, "EOF"));
    group_code::encode_with_sentinel(&records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Point3, Vertex};

    #[test]
    fn write_then_parse_single_line() {
        let mut drawings = DrawingMap::new();
        let mut common = crate::model::DrawingCommon::new("L1");
        common.layer = "Bench1".to_string();
        drawings.insert_unique(Drawing::Line {
            common,
            vertices: vec![Vertex::new(Point3::new(1.0, 2.0, 3.0), 1), Vertex::new(Point3::new(4.0, 5.0, 6.0), 2)],
        });

        let bytes = write(&drawings, &[], &BinaryDxfWriteOptions::default());
        let parsed = parse(&bytes, &DxfBuildOptions::default()).unwrap();

        assert_eq!(parsed.drawings.len(), 1);
        let (_, drawing) = parsed.drawings.iter().next().unwrap();
        match drawing {
            Drawing::Line { vertices, .. } => {
                assert_eq!(vertices.len(), 2);
                assert!((vertices[0].position.x - 1.0).abs() < 1e-9);
                assert!((vertices[1].position.z - 6.0).abs() < 1e-9);
            }
            other => panic!("expected Line, got {other:?}"),
        }
    }

    #[test]
    fn bad_sentinel_is_rejected() {
        let bytes = b"not a dxf file at all, padding to 22+ bytes".to_vec();
        assert!(matches!(parse(&bytes, &DxfBuildOptions::default()), Err(DxfError::BadSentinel)));
    }
}
