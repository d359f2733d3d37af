//! ASCII DXF parser and writer (spec.md §4.6.2, §4.7.2).
//!
//! Grounded on the shared `dxf::entities` state machine (spec.md §4.6.2
//! states the ASCII front end differs only in tokenizing and in ELLIPSE/ARC
//! sampling); this module supplies both.

use std::f64::consts::PI;

use crate::model::{Drawing, DrawingCommon, DrawingMap, Point3, Surface, Vertex};

use super::entities::{self, DxfBuildOptions, DxfBuildOutput};
use super::group_code::{Record, Value};
use super::DxfError;

const ELLIPSE_SEGMENTS: usize = 64;
const ARC_SEGMENTS: usize = 32;

/// Tokenize an ASCII DXF text body into `(code, raw-value)` line pairs, then
/// infer each value's type the same way the binary codec does.
fn tokenize(text: &str) -> Result<Vec<Record>, DxfError> {
    let mut lines = text.lines();
    let mut records = Vec::new();
    loop {
        let Some(code_line) = lines.next() else { break };
        let code_line = code_line.trim();
        if code_line.is_empty() {
            continue;
        }
        let code: u16 = code_line.parse().map_err(|_| DxfError::BadGroupCode(code_line.to_string()))?;
        let Some(value_line) = lines.next() else {
            return Err(DxfError::UnpairedRecord);
        };
        let raw = value_line.trim();
        let value = match super::group_code::infer_value_type(code) {
            super::group_code::ValueType::Str => Value::Str(raw.to_string()),
            super::group_code::ValueType::Double => Value::Double(raw.parse().unwrap_or(0.0)),
            super::group_code::ValueType::Int16 => Value::Int16(raw.parse().unwrap_or(0)),
            super::group_code::ValueType::Int32 => Value::Int32(raw.parse().unwrap_or(0)),
            super::group_code::ValueType::Binary => Value::Str(raw.to_string()),
        };
        let is_eof = code == 0 && raw == "EOF";
        records.push(Record { code, value });
        if is_eof {
            break;
        }
    }
    Ok(records)
}

/// Parse a complete ASCII-DXF text file.
pub fn parse(text: &str, opts: &DxfBuildOptions) -> Result<DxfBuildOutput, DxfError> {
    let records = tokenize(text)?;
    let mut output = entities::build(&records, opts);
    expand_curves(&records, &mut output, opts);
    Ok(output)
}

/// ELLIPSE and ARC are not handled by the shared entity builder (it only
/// understands straight-line geometry); scan the raw records a second time
/// for those two entity types and synthesize sampled polylines for them.
fn expand_curves(records: &[Record], output: &mut DxfBuildOutput, opts: &DxfBuildOptions) {
    let mut i = 0;
    while i < records.len() {
        if records[i].code == 0 {
            match records[i].as_str() {
                Some("ELLIPSE") => {
                    if let Some(drawing) = build_ellipse(&records[i..]) {
                        output.drawings.insert_unique(drawing);
                    }
                }
                Some("ARC") => {
                    if let Some(drawing) = build_arc(&records[i..]) {
                        output.drawings.insert_unique(drawing);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    let _ = opts;
}

fn scan_entity_fields(records: &[Record]) -> (Option<Point3>, Option<f64>, Option<f64>, Option<f64>, Option<f64>, Option<f64>, String, Option<i32>) {
    let mut center = [None; 3];
    let mut major_axis_endpoint = [None; 3];
    // Code 40 is ARC's radius and ELLIPSE's minor/major ratio -- the two
    // entity types never share a record stream, so one slot covers both.
    let mut radius_or_ratio = None;
    // ELLIPSE start/end parameter, radians (codes 41/42).
    let mut ellipse_start_param = None;
    let mut ellipse_end_param = None;
    // ARC start/end angle, degrees (codes 50/51).
    let mut start_angle = None;
    let mut end_angle = None;
    let mut layer = "0".to_string();
    let mut color_index = None;

    for record in records.iter().skip(1) {
        if record.code == 0 {
            break;
        }
        match record.code {
            8 => layer = record.as_str().unwrap_or("0").to_string(),
            62 => color_index = record.as_i32(),
            10 => center[0] = record.as_f64(),
            20 => center[1] = record.as_f64(),
            30 => center[2] = record.as_f64(),
            11 => major_axis_endpoint[0] = record.as_f64(),
            21 => major_axis_endpoint[1] = record.as_f64(),
            31 => major_axis_endpoint[2] = record.as_f64(),
            40 => radius_or_ratio = record.as_f64(),
            41 => ellipse_start_param = record.as_f64(),
            42 => ellipse_end_param = record.as_f64(),
            50 => start_angle = record.as_f64(),
            51 => end_angle = record.as_f64(),
            _ => {}
        }
    }

    let center_pt = if center[0].is_some() || center[1].is_some() { Some(Point3::new(center[0].unwrap_or(0.0), center[1].unwrap_or(0.0), center[2].unwrap_or(0.0))) } else { None };
    let major_axis_x = major_axis_endpoint[0];
    let major_axis_y = major_axis_endpoint[1];

    (center_pt, major_axis_x, major_axis_y, radius_or_ratio, ellipse_start_param.or(start_angle), ellipse_end_param.or(end_angle), layer, color_index)
}

/// ELLIPSE -> 64-segment closed polygon (spec.md §4.6.2).
fn build_ellipse(records: &[Record]) -> Option<Drawing> {
    let (center, major_x, major_y, ratio, start, end, layer, color_index) = scan_entity_fields(records);
    let center = center?;
    let major_x = major_x?;
    let major_y = major_y.unwrap_or(0.0);
    let ratio = ratio.unwrap_or(1.0);
    let start = start.unwrap_or(0.0);
    let end = end.unwrap_or(2.0 * PI);

    let major_len = (major_x * major_x + major_y * major_y).sqrt();
    if major_len <= 0.0 {
        return None;
    }
    let rotation = major_y.atan2(major_x);
    let minor_len = major_len * ratio;

    let color = crate::model::color::aci_to_hex(color_index.unwrap_or(-1));
    let mut vertices = Vec::with_capacity(ELLIPSE_SEGMENTS);
    for i in 0..ELLIPSE_SEGMENTS {
        let t = start + (end - start) * (i as f64) / (ELLIPSE_SEGMENTS as f64 - 1.0);
        let local_x = major_len * t.cos();
        let local_y = minor_len * t.sin();
        let x = center.x + local_x * rotation.cos() - local_y * rotation.sin();
        let y = center.y + local_x * rotation.sin() + local_y * rotation.cos();
        vertices.push(Vertex::new(Point3::new(x, y, center.z), (i + 1) as u32));
        if let Some(last) = vertices.last_mut() {
            last.color = color.clone();
        }
    }
    if let Some(last) = vertices.last_mut() {
        last.closed = true;
    }

    let mut common = DrawingCommon::new("ellipse");
    common.layer = layer;
    Some(Drawing::Polygon { common, vertices })
}

/// ARC -> 32-segment open polyline (spec.md §4.6.2): if `endAngle <
/// startAngle`, add a full turn to `endAngle` before sampling, matching the
/// convention that arcs always sweep counter-clockwise from start to end.
fn build_arc(records: &[Record]) -> Option<Drawing> {
    let (center, _major_x, _major_y, radius_slot, start_angle, end_angle, layer, color_index) = scan_entity_fields(records);
    let center = center?;
    let radius = radius_slot?;
    let start_deg = start_angle.unwrap_or(0.0);
    let mut end_deg = end_angle.unwrap_or(360.0);
    if end_deg < start_deg {
        end_deg += 360.0;
    }
    let start = start_deg.to_radians();
    let end = end_deg.to_radians();

    let color = crate::model::color::aci_to_hex(color_index.unwrap_or(-1));
    let mut vertices = Vec::with_capacity(ARC_SEGMENTS);
    for i in 0..ARC_SEGMENTS {
        let t = start + (end - start) * (i as f64) / (ARC_SEGMENTS as f64 - 1.0);
        let x = center.x + radius * t.cos();
        let y = center.y + radius * t.sin();
        vertices.push(Vertex::new(Point3::new(x, y, center.z), (i + 1) as u32));
        if let Some(last) = vertices.last_mut() {
            last.color = color.clone();
        }
    }

    let mut common = DrawingCommon::new("arc");
    common.layer = layer;
    Some(Drawing::Line { common, vertices })
}

/// Render `(code, value)` records as ASCII DXF text (two lines per record).
fn render(records: &[Record]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&record.code.to_string());
        out.push('\n');
        match &record.value {
            Value::Str(s) => out.push_str(s),
            Value::Double(d) => out.push_str(&format!("{d:.6}")),
            Value::Int16(v) => out.push_str(&v.to_string()),
            Value::Int32(v) => out.push_str(&v.to_string()),
            Value::Int64(v) => out.push_str(&v.to_string()),
            Value::Binary(bytes) => out.push_str(&hex::encode_upper(bytes)),
        }
        out.push('\n');
    }
    out
}

/// Minimal local hex encoder so the ASCII writer needn't pull in the `hex`
/// crate just for this one (rare) binary-group-code fallback path.
mod hex {
    pub fn encode_upper(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02X}")).collect()
    }
}

/// Write a complete ASCII-DXF file for a set of drawings and surfaces, in
/// the same section layout as the binary writer (spec.md §4.7.2: "All other
/// shape, section, and extended-data conventions mirror §4.7.1").
pub fn write(drawings: &DrawingMap, surfaces: &[Surface]) -> String {
    let mut records = Vec::new();

    let layers: std::collections::BTreeSet<String> = drawings.iter().map(|(_, d)| d.common().layer.clone()).collect();

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
    records.push(Record::str(0, "ENDSEC"));

    records.push(Record::str(0, "SECTION"));
    records.push(Record::str(2, "BLOCKS"));
    records.push(Record::str(0, "ENDSEC"));

    records.push(Record::str(0, "SECTION"));
    records.push(Record::str(2, "ENTITIES"));
    for (_, drawing) in drawings.iter() {
        write_drawing(&mut records, drawing);
    }
    for surface in surfaces {
        for t in &surface.triangles {
            records.push(Record::str(0, "3DFACE"));
            records.push(Record::str(8, surface.name.clone()));
            write_xyz(&mut records, 10, surface.points[t.v1 as usize]);
            write_xyz(&mut records, 11, surface.points[t.v2 as usize]);
            write_xyz(&mut records, 12, surface.points[t.v3 as usize]);
            write_xyz(&mut records, 13, surface.points[t.v3 as usize]);
        }
    }
    records.push(Record::str(0, "ENDSEC"));
    records.push(Record::str(0, "EOF"));

    render(&records)
}

fn write_drawing(records: &mut Vec<Record>, drawing: &Drawing) {
    let common = drawing.common();
    match drawing {
        Drawing::Point { vertex, .. } => {
            records.push(Record::str(0, "POINT"));
            records.push(Record::str(8, common.layer.clone()));
            write_xyz(records, 10, vertex.position);
        }
        Drawing::Line { vertices, .. } if vertices.len() == 2 => {
            records.push(Record::str(0, "LINE"));
            records.push(Record::str(8, common.layer.clone()));
            write_xyz(records, 10, vertices[0].position);
            write_xyz(records, 11, vertices[1].position);
        }
        Drawing::Line { vertices, .. } | Drawing::Polygon { vertices, .. } => {
            let closed = matches!(drawing, Drawing::Polygon { .. });
            records.push(Record::str(0, "LWPOLYLINE"));
            records.push(Record::str(8, common.layer.clone()));
            records.push(Record::new(70, Value::Int16(if closed { 1 } else { 0 })));
            for v in vertices {
                records.push(Record::new(10, Value::Double(v.position.x)));
                records.push(Record::new(20, Value::Double(v.position.y)));
            }
        }
        Drawing::Circle { center, radius, .. } => {
            records.push(Record::str(0, "CIRCLE"));
            records.push(Record::str(8, common.layer.clone()));
            write_xyz(records, 10, *center);
            records.push(Record::new(40, Value::Double(*radius)));
        }
        Drawing::Text { anchor, text, font_height, .. } => {
            records.push(Record::str(0, "TEXT"));
            records.push(Record::str(8, common.layer.clone()));
            write_xyz(records, 10, *anchor);
            records.push(Record::new(40, Value::Double(*font_height)));
            records.push(Record::str(1, text.clone()));
        }
    }
}

fn write_xyz(records: &mut Vec<Record>, base_code: u16, p: Point3) {
    records.push(Record::new(base_code, Value::Double(p.x)));
    records.push(Record::new(base_code + 10, Value::Double(p.y)));
    records.push(Record::new(base_code + 20, Value::Double(p.z)));
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "0\nSECTION\n2\nENTITIES\n0\nLINE\n8\nBench1\n10\n1.0\n20\n2.0\n30\n3.0\n11\n4.0\n21\n5.0\n31\n6.0\n0\nENDSEC\n0\nEOF\n";

    #[test]
    fn tokenize_produces_expected_records() {
        let records = tokenize(SAMPLE).unwrap();
        assert_eq!(records[0].as_str(), Some("SECTION"));
        assert_eq!(records.last().unwrap().as_str(), Some("EOF"));
    }

    #[test]
    fn parse_single_line_entity() {
        let output = parse(SAMPLE, &DxfBuildOptions::default()).unwrap();
        assert_eq!(output.drawings.len(), 1);
        let (_, drawing) = output.drawings.iter().next().unwrap();
        assert!(matches!(drawing, Drawing::Line { .. }));
    }

    /// spec.md §4.7.2: the ASCII writer's section/table layout mirrors the
    /// binary writer's (§4.7.1) -- AC1015, $INSUNITS=4, an LTYPE CONTINUOUS
    /// table, and one LAYER entry per unique entity layer.
    #[test]
    fn write_emits_header_and_layer_table_like_the_binary_writer() {
        let mut drawings = DrawingMap::new();
        let mut common = DrawingCommon::new("P1");
        common.layer = "Bench1".to_string();
        drawings.insert_unique(Drawing::Point { common, vertex: Vertex::new(Point3::new(1.0, 2.0, 3.0), 1) });

        let text = write(&drawings, &[]);
        assert!(text.contains("AC1015"));
        assert!(text.contains("$INSUNITS"));
        assert!(text.contains("CONTINUOUS"));
        assert!(text.contains("LAYER"));
        assert!(text.contains("Bench1"));
    }

    #[test]
    fn write_then_parse_round_trip() {
        let mut drawings = DrawingMap::new();
        drawings.insert_unique(Drawing::Point {
            common: DrawingCommon::new("P1"),
            vertex: Vertex::new(Point3::new(7.0, 8.0, 9.0), 1),
        });
        let text = write(&drawings, &[]);
        let parsed = parse(&text, &DxfBuildOptions::default()).unwrap();
        assert_eq!(parsed.drawings.len(), 1);
    }

    #[test]
    fn arc_with_wraparound_angle_sweeps_forward() {
        let records = vec![
            Record::str(0, "ARC"),
            Record::str(8, "L1"),
            Record::new(10, Value::Double(0.0)),
            Record::new(20, Value::Double(0.0)),
            Record::new(40, Value::Double(5.0)),
            Record::new(50, Value::Double(350.0)),
            Record::new(51, Value::Double(10.0)),
        ];
        let drawing = build_arc(&records).unwrap();
        match drawing {
            Drawing::Line { vertices, .. } => {
                assert_eq!(vertices.len(), ARC_SEGMENTS);
                let first = vertices.first().unwrap().position;
                let last = vertices.last().unwrap().position;
                assert!((first.x - 5.0 * 350f64.to_radians().cos()).abs() < 1e-6);
                assert!((last.x - 5.0 * 10f64.to_radians().cos()).abs() < 1e-6);
            }
            other => panic!("expected Line, got {other:?}"),
        }
    }

    #[test]
    fn ellipse_closes_into_a_polygon() {
        let records = vec![
            Record::str(0, "ELLIPSE"),
            Record::str(8, "L1"),
            Record::new(10, Value::Double(0.0)),
            Record::new(20, Value::Double(0.0)),
            Record::new(11, Value::Double(10.0)),
            Record::new(21, Value::Double(0.0)),
            Record::new(40, Value::Double(0.5)),
        ];
        let drawing = build_ellipse(&records).unwrap();
        match drawing {
            Drawing::Polygon { vertices, .. } => {
                assert_eq!(vertices.len(), ELLIPSE_SEGMENTS);
                assert!(vertices.last().unwrap().closed);
            }
            other => panic!("expected Polygon, got {other:?}"),
        }
    }

    #[test]
    fn malformed_group_code_line_is_an_error() {
        let bad = "not-a-number\nSECTION\n";
        assert!(matches!(tokenize(bad), Err(DxfError::BadGroupCode(_))));
    }
}
