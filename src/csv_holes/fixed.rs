//! Fixed-schema blast-hole CSV (spec.md §4.6.4 parser / §4.7.3 writer).
//!
//! Accepts exactly the column counts spec.md §6 lists: `{4, 7, 9, 12, 14,
//! 30, 32, 35}`. The 35-column order is spec.md's canonical one; the
//! smaller counts are this crate's own resolution of spec.md's silence on
//! their exact layout — hand-picked practical subsets rather than blind
//! prefixes of the 35-order, recorded as a DESIGN.md decision.

use crate::error::GeoIoError;
use crate::geometry_resolver::{self, GeometryInput};
use crate::model::{Hole, Measured, Point3};
use crate::ParseResult;

use super::CsvHoleError;

pub const SUPPORTED_COLUMN_COUNTS: [usize; 8] = [4, 7, 9, 12, 14, 30, 32, 35];

/// spec.md §6's canonical 35-column order.
const CANONICAL_FIELDS: [&str; 35] = [
    "entityName",
    "entityType",
    "holeID",
    "startX",
    "startY",
    "startZ",
    "endX",
    "endY",
    "endZ",
    "gradeX",
    "gradeY",
    "gradeZ",
    "subdrillAmount",
    "subdrillLength",
    "benchHeight",
    "holeDiameter",
    "holeType",
    "fromHoleID",
    "timingDelayMs",
    "colorHex",
    "holeLengthCalculated",
    "holeAngle",
    "holeBearing",
    "holeTime",
    "measuredLength",
    "measuredLengthTS",
    "measuredMass",
    "measuredMassTS",
    "measuredComment",
    "measuredCommentTS",
    "rowID",
    "posID",
    "burden",
    "spacing",
    "connectorCurve",
];

fn schema_for_count(count: usize) -> Option<Vec<&'static str>> {
    match count {
        4 => Some(vec!["entityName", "startX", "startY", "startZ"]),
        7 => Some(vec!["entityName", "startX", "startY", "startZ", "endX", "endY", "endZ"]),
        9 => Some(vec!["entityName", "holeID", "startX", "startY", "startZ", "endX", "endY", "endZ", "holeDiameter"]),
        12 => Some(vec![
            "entityName",
            "holeID",
            "startX",
            "startY",
            "startZ",
            "endX",
            "endY",
            "endZ",
            "holeDiameter",
            "holeType",
            "timingDelayMs",
            "colorHex",
        ]),
        14 => Some(vec![
            "entityName",
            "holeID",
            "startX",
            "startY",
            "startZ",
            "endX",
            "endY",
            "endZ",
            "gradeX",
            "gradeY",
            "gradeZ",
            "holeDiameter",
            "holeType",
            "fromHoleID",
        ]),
        30 => Some(CANONICAL_FIELDS[..30].to_vec()),
        32 => Some(CANONICAL_FIELDS[..32].to_vec()),
        35 => Some(CANONICAL_FIELDS[..35].to_vec()),
        _ => None,
    }
}

fn field_index(schema: &[&str], name: &str) -> Option<usize> {
    schema.iter().position(|f| *f == name)
}

fn get_str<'a>(cols: &[&'a str], schema: &[&str], name: &str) -> Option<&'a str> {
    field_index(schema, name).and_then(|i| cols.get(i)).map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn get_f64(cols: &[&str], schema: &[&str], name: &str) -> Option<f64> {
    get_str(cols, schema, name).and_then(|s| s.parse().ok())
}

fn get_u32(cols: &[&str], schema: &[&str], name: &str) -> Option<u32> {
    get_str(cols, schema, name).and_then(|s| s.parse().ok())
}

/// A row is a likely header if the schema has startX/Y/Z columns and any of
/// them fails to parse as a float (spec.md §4.6.4).
fn looks_like_header(cols: &[&str], schema: &[&str]) -> bool {
    let (Some(ix), Some(iy), Some(iz)) = (field_index(schema, "startX"), field_index(schema, "startY"), field_index(schema, "startZ")) else {
        return false;
    };
    [ix, iy, iz].iter().any(|&i| cols.get(i).map(|s| s.trim().parse::<f64>().is_err()).unwrap_or(true))
}

/// Parse a fixed-schema blast-hole CSV body. The file-wide column count
/// (read from the first non-header data row) must be one of
/// [`SUPPORTED_COLUMN_COUNTS`] or this fails with a fatal `SchemaMismatch`
/// (spec.md §7); a later row whose column count drifts from that baseline
/// is a recoverable `BadRow` skip instead.
pub fn parse(text: &str) -> Result<ParseResult<Vec<Hole>>, GeoIoError> {
    let raw_rows: Vec<Vec<&str>> = text.lines().filter(|l| !l.trim().is_empty()).map(|l| l.split(',').collect()).collect();

    let mut schema = None;
    let mut established_count = 0usize;
    let mut start_index = 0usize;

    for (i, row) in raw_rows.iter().enumerate().take(3) {
        let count = row.len();
        if let Some(candidate) = schema_for_count(count) {
            if looks_like_header(row, &candidate) {
                continue;
            }
            schema = Some(candidate);
            established_count = count;
            start_index = i;
            break;
        }
    }

    let Some(schema) = schema else {
        let count = raw_rows.first().map(|r| r.len()).unwrap_or(0);
        return Err(GeoIoError::CsvHole(CsvHoleError::UnsupportedColumnCount(count)));
    };

    let mut result = ParseResult::new(Vec::new());
    for row in &raw_rows[start_index..] {
        if row.len() != established_count {
            result.push_warning(format!("row has {} columns, expected {established_count}", row.len()));
            continue;
        }
        match decode_row(row, &schema) {
            Some(hole) => {
                result.payload.push(hole);
                result.success_count += 1;
            }
            None => result.push_warning(format!("row failed geometry resolution: {row:?}")),
        }
    }
    Ok(result)
}

fn decode_row(cols: &[&str], schema: &[&str]) -> Option<Hole> {
    let entity_name = get_str(cols, schema, "entityName").unwrap_or("").to_string();
    let hole_id = get_str(cols, schema, "holeID").unwrap_or("").to_string();

    let collar = match (get_f64(cols, schema, "startX"), get_f64(cols, schema, "startY"), get_f64(cols, schema, "startZ")) {
        (Some(x), Some(y), Some(z)) => Some(Point3::new(x, y, z)),
        _ => None,
    };
    let toe = match (get_f64(cols, schema, "endX"), get_f64(cols, schema, "endY"), get_f64(cols, schema, "endZ")) {
        (Some(x), Some(y), Some(z)) => Some(Point3::new(x, y, z)),
        _ => None,
    };

    let input = GeometryInput {
        collar,
        toe,
        length: get_f64(cols, schema, "holeLengthCalculated"),
        angle: get_f64(cols, schema, "holeAngle"),
        bearing: get_f64(cols, schema, "holeBearing"),
        subdrill: get_f64(cols, schema, "subdrillAmount"),
    };
    let resolved = geometry_resolver::resolve(&input).ok()?;

    let raw_color = get_str(cols, schema, "colorHex").unwrap_or("");
    let normalized = crate::model::color::normalize_color_input(raw_color);
    let color_hex_decimal = if normalized.is_empty() { "#777777".to_string() } else { normalized };

    Some(Hole {
        hole_id: hole_id.clone(),
        entity_name: entity_name.clone(),
        collar: resolved.collar,
        grade: resolved.grade,
        toe: resolved.toe,
        hole_length_calculated: resolved.hole_length_calculated,
        hole_angle: resolved.hole_angle,
        hole_bearing: resolved.hole_bearing,
        subdrill_amount: resolved.subdrill_amount,
        subdrill_length: resolved.subdrill_length,
        bench_height: resolved.bench_height,
        hole_diameter: get_f64(cols, schema, "holeDiameter").unwrap_or(0.0),
        hole_type: get_str(cols, schema, "holeType").unwrap_or("").to_string(),
        from_hole_id: get_str(cols, schema, "fromHoleID").map(str::to_string).unwrap_or_else(|| Hole::compose_from_hole_id(&entity_name, &hole_id)),
        timing_delay_milliseconds: get_f64(cols, schema, "timingDelayMs").unwrap_or(0.0),
        color_hex_decimal,
        measured_length: Measured {
            value: get_f64(cols, schema, "measuredLength"),
            timestamp: get_str(cols, schema, "measuredLengthTS").map(str::to_string),
        },
        measured_mass: Measured {
            value: get_f64(cols, schema, "measuredMass"),
            timestamp: get_str(cols, schema, "measuredMassTS").map(str::to_string),
        },
        measured_comment: Measured {
            value: get_str(cols, schema, "measuredComment").map(str::to_string),
            timestamp: get_str(cols, schema, "measuredCommentTS").map(str::to_string),
        },
        row_id: get_u32(cols, schema, "rowID"),
        pos_id: get_u32(cols, schema, "posID"),
        burden: get_f64(cols, schema, "burden"),
        spacing: get_f64(cols, schema, "spacing"),
        connector_curve: get_str(cols, schema, "connectorCurve").map(str::to_string),
    })
}

/// Write holes back out in the full 35-column canonical order
/// (spec.md §4.7.3): the writer always emits the richest schema, regardless
/// of which schema the source file used.
pub fn write(holes: &[Hole]) -> String {
    let mut out = String::new();
    for h in holes {
        let fields: [String; 35] = [
            h.entity_name.clone(),
            "hole".to_string(),
            h.hole_id.clone(),
            h.collar.x.to_string(),
            h.collar.y.to_string(),
            h.collar.z.to_string(),
            h.toe.x.to_string(),
            h.toe.y.to_string(),
            h.toe.z.to_string(),
            h.grade.x.to_string(),
            h.grade.y.to_string(),
            h.grade.z.to_string(),
            h.subdrill_amount.to_string(),
            h.subdrill_length.to_string(),
            h.bench_height.to_string(),
            h.hole_diameter.to_string(),
            h.hole_type.clone(),
            h.from_hole_id.clone(),
            h.timing_delay_milliseconds.to_string(),
            h.color_hex_decimal.clone(),
            h.hole_length_calculated.to_string(),
            h.hole_angle.to_string(),
            h.hole_bearing.to_string(),
            String::new(),
            h.measured_length.value.map(|v| v.to_string()).unwrap_or_default(),
            h.measured_length.timestamp.clone().unwrap_or_default(),
            h.measured_mass.value.map(|v| v.to_string()).unwrap_or_default(),
            h.measured_mass.timestamp.clone().unwrap_or_default(),
            h.measured_comment.value.clone().unwrap_or_default(),
            h.measured_comment.timestamp.clone().unwrap_or_default(),
            h.row_id.map(|v| v.to_string()).unwrap_or_default(),
            h.pos_id.map(|v| v.to_string()).unwrap_or_default(),
            h.burden.map(|v| v.to_string()).unwrap_or_default(),
            h.spacing.map(|v| v.to_string()).unwrap_or_default(),
            h.connector_curve.clone().unwrap_or_default(),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_column_collar_only() {
        let text = "H1,0,0,100\n";
        let result = parse(text).unwrap();
        assert_eq!(result.payload.len(), 1);
        let hole = &result.payload[0];
        assert!((hole.collar.z - 100.0).abs() < 1e-9);
    }

    #[test]
    fn seven_column_collar_and_toe() {
        let text = "H1,0,0,100,5,0,91.339745962155614\n";
        let result = parse(text).unwrap();
        assert_eq!(result.payload.len(), 1);
        let hole = &result.payload[0];
        assert!((hole.hole_bearing - 90.0).abs() < 1e-6);
    }

    #[test]
    fn header_row_is_skipped() {
        let text = "entityName,startX,startY,startZ,endX,endY,endZ\nH1,0,0,100,5,0,91.3\n";
        let result = parse(text).unwrap();
        assert_eq!(result.payload.len(), 1);
    }

    #[test]
    fn unsupported_column_count_is_fatal() {
        let text = "a,b,c,d,e,f\n";
        assert!(matches!(parse(text), Err(GeoIoError::CsvHole(CsvHoleError::UnsupportedColumnCount(6)))));
    }

    #[test]
    fn row_with_drifting_column_count_is_skipped() {
        let text = "H1,0,0,100\nH2,0,0\n";
        let result = parse(text).unwrap();
        assert_eq!(result.payload.len(), 1);
        assert_eq!(result.error_count, 1);
    }

    #[test]
    fn write_then_parse_35_column_round_trip() {
        let text = "H1,0,0,100,5,0,91.339745962155614\n";
        let parsed = parse(text).unwrap();
        let written = write(&parsed.payload);
        let reparsed = parse(&written).unwrap();
        assert_eq!(reparsed.payload.len(), 1);
        assert!((reparsed.payload[0].toe.x - parsed.payload[0].toe.x).abs() < 1e-6);
    }
}
