//! Configurable blast-hole CSV (spec.md §4.6.5): the caller supplies a
//! column-index-to-field map instead of relying on a fixed schema, plus unit
//! and angle conventions and a row-collision policy. Runs the full
//! `GeometryResolver` ladder and then `RowDetector`, unlike the fixed schema
//! which only ever applies rule 1.

use std::collections::HashMap;

use crate::geometry_resolver::{self, GeometryInput};
use crate::model::{Hole, Measured, Point3};
use crate::row_detector;
use crate::ParseResult;

/// Which field a CSV column index maps to. Only `EntityName` and `HoleId`
/// are required; everything else is optional and feeds `GeometryInput` or
/// the passthrough `Hole` fields as supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    EntityName,
    HoleId,
    CollarX,
    CollarY,
    CollarZ,
    ToeX,
    ToeY,
    ToeZ,
    GradeX,
    GradeY,
    GradeZ,
    Length,
    Angle,
    Bearing,
    Subdrill,
    Diameter,
    HoleType,
    FromHoleId,
    TimingDelayMs,
    ColorHex,
}

pub type ColumnMap = HashMap<usize, Field>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiameterUnit {
    Millimetres,
    Metres,
    Inches,
}

impl DiameterUnit {
    fn to_millimetres(self, value: f64) -> f64 {
        match self {
            DiameterUnit::Millimetres => value,
            DiameterUnit::Metres => value * 1000.0,
            DiameterUnit::Inches => value * 25.4,
        }
    }
}

/// `Angle`: degrees from vertical-down, matching [`Hole::hole_angle`]
/// directly. `Dip`: degrees from horizontal, the complement (`90 - dip`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleConvention {
    Angle,
    Dip,
}

impl AngleConvention {
    fn to_angle_from_vertical(self, value: f64) -> f64 {
        match self {
            AngleConvention::Angle => value,
            AngleConvention::Dip => 90.0 - value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPolicy {
    Skip,
    UpdateById,
    /// Two holes collide if their collars fall within 1 cm in XY.
    UpdateByLocation,
}

#[derive(Debug, Clone)]
pub struct CustomCsvOptions {
    pub columns: ColumnMap,
    pub delimiter: char,
    pub has_header: bool,
    pub diameter_unit: DiameterUnit,
    pub angle_convention: AngleConvention,
    pub collision_policy: CollisionPolicy,
}

impl Default for CustomCsvOptions {
    fn default() -> Self {
        CustomCsvOptions {
            columns: HashMap::new(),
            delimiter: ',',
            has_header: true,
            diameter_unit: DiameterUnit::Millimetres,
            angle_convention: AngleConvention::Angle,
            collision_policy: CollisionPolicy::Skip,
        }
    }
}

const COLLISION_TOLERANCE_METRES: f64 = 0.01;

/// Parse a custom-schema blast-hole CSV body per `options`. Unlike
/// [`super::fixed::parse`], every row runs the full `GeometryResolver`
/// ladder (any supplied subset of collar/toe/length/angle/bearing/subdrill
/// is accepted) and the batch finishes with `RowDetector::assign_to_holes`
/// for any hole left without a `rowID`/`posID`.
pub fn parse(text: &str, options: &CustomCsvOptions) -> ParseResult<Vec<Hole>> {
    let mut result = ParseResult::new(Vec::new());
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    if options.has_header {
        lines.next();
    }

    for line in lines {
        let cols: Vec<&str> = line.split(options.delimiter).collect();
        match decode_row(&cols, options) {
            Some(hole) => {
                insert_with_collision_policy(&mut result.payload, hole, options.collision_policy);
                result.success_count += 1;
            }
            None => result.push_warning(format!("row failed geometry resolution or is missing an ID: {line:?}")),
        }
    }

    row_detector::assign_to_holes(&mut result.payload);
    result
}

fn get(cols: &[&str], columns: &ColumnMap, field: Field) -> Option<String> {
    columns.iter().find(|(_, f)| **f == field).and_then(|(i, _)| cols.get(*i)).map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn get_f64(cols: &[&str], columns: &ColumnMap, field: Field) -> Option<f64> {
    get(cols, columns, field).and_then(|s| s.parse().ok())
}

fn decode_row(cols: &[&str], options: &CustomCsvOptions) -> Option<Hole> {
    let entity_name = get(cols, &options.columns, Field::EntityName)?;
    let hole_id = get(cols, &options.columns, Field::HoleId)?;

    let collar = match (
        get_f64(cols, &options.columns, Field::CollarX),
        get_f64(cols, &options.columns, Field::CollarY),
        get_f64(cols, &options.columns, Field::CollarZ),
    ) {
        (Some(x), Some(y), Some(z)) => Some(Point3::new(x, y, z)),
        _ => None,
    };
    let toe = match (
        get_f64(cols, &options.columns, Field::ToeX),
        get_f64(cols, &options.columns, Field::ToeY),
        get_f64(cols, &options.columns, Field::ToeZ),
    ) {
        (Some(x), Some(y), Some(z)) => Some(Point3::new(x, y, z)),
        _ => None,
    };

    let angle = get_f64(cols, &options.columns, Field::Angle).map(|v| options.angle_convention.to_angle_from_vertical(v));

    let input = GeometryInput {
        collar,
        toe,
        length: get_f64(cols, &options.columns, Field::Length),
        angle,
        bearing: get_f64(cols, &options.columns, Field::Bearing),
        subdrill: get_f64(cols, &options.columns, Field::Subdrill),
    };
    let resolved = geometry_resolver::resolve(&input).ok()?;

    let diameter_raw = get_f64(cols, &options.columns, Field::Diameter).unwrap_or(0.0);
    let diameter = options.diameter_unit.to_millimetres(diameter_raw);

    let raw_color = get(cols, &options.columns, Field::ColorHex).unwrap_or_default();
    let normalized = crate::model::color::normalize_color_input(&raw_color);
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
        hole_diameter: diameter,
        hole_type: get(cols, &options.columns, Field::HoleType).unwrap_or_default(),
        from_hole_id: get(cols, &options.columns, Field::FromHoleId).unwrap_or_else(|| Hole::compose_from_hole_id(&entity_name, &hole_id)),
        timing_delay_milliseconds: get_f64(cols, &options.columns, Field::TimingDelayMs).unwrap_or(0.0),
        color_hex_decimal,
        measured_length: Measured::default(),
        measured_mass: Measured::default(),
        measured_comment: Measured::default(),
        row_id: None,
        pos_id: None,
        burden: None,
        spacing: None,
        connector_curve: None,
    })
}

fn collars_collide(a: &Hole, b: &Hole) -> bool {
    let dx = a.collar.x - b.collar.x;
    let dy = a.collar.y - b.collar.y;
    dx.hypot(dy) <= COLLISION_TOLERANCE_METRES
}

fn insert_with_collision_policy(holes: &mut Vec<Hole>, hole: Hole, policy: CollisionPolicy) {
    let existing_index = match policy {
        CollisionPolicy::Skip | CollisionPolicy::UpdateById => holes.iter().position(|h| h.hole_id == hole.hole_id && h.entity_name == hole.entity_name),
        CollisionPolicy::UpdateByLocation => holes.iter().position(|h| collars_collide(h, &hole)),
    };

    match (existing_index, policy) {
        (Some(_), CollisionPolicy::Skip) => {
            tracing::debug!(hole_id = %hole.hole_id, "skipped colliding hole");
        }
        (Some(i), CollisionPolicy::UpdateById) | (Some(i), CollisionPolicy::UpdateByLocation) => {
            tracing::debug!(hole_id = %hole.hole_id, "updated colliding hole");
            holes[i] = hole;
        }
        (None, _) => holes.push(hole),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_columns() -> ColumnMap {
        let mut m = HashMap::new();
        m.insert(0, Field::EntityName);
        m.insert(1, Field::HoleId);
        m.insert(2, Field::CollarX);
        m.insert(3, Field::CollarY);
        m.insert(4, Field::CollarZ);
        m.insert(5, Field::Length);
        m.insert(6, Field::Angle);
        m.insert(7, Field::Bearing);
        m.insert(8, Field::Diameter);
        m
    }

    #[test]
    fn parses_with_column_map_and_mm_diameter() {
        let options = CustomCsvOptions { columns: basic_columns(), has_header: true, ..Default::default() };
        let text = "entityName,holeID,x,y,z,length,angle,bearing,diameter\nB1,H1,0,0,100,15,0,90,115\n";
        let result = parse(text, &options);
        assert_eq!(result.payload.len(), 1);
        assert_eq!(result.payload[0].hole_diameter, 115.0);
    }

    #[test]
    fn dip_convention_is_complemented_to_angle() {
        let mut columns = basic_columns();
        columns.insert(6, Field::Angle);
        let options = CustomCsvOptions { columns, has_header: false, angle_convention: AngleConvention::Dip, ..Default::default() };
        let text = "B1,H1,0,0,100,15,90,90,115\n";
        let result = parse(text, &options);
        assert!((result.payload[0].hole_angle - 0.0).abs() < 1e-9);
    }

    #[test]
    fn inches_diameter_is_converted_to_millimetres() {
        let options = CustomCsvOptions { columns: basic_columns(), has_header: false, diameter_unit: DiameterUnit::Inches, ..Default::default() };
        let text = "B1,H1,0,0,100,15,0,90,4.5\n";
        let result = parse(text, &options);
        assert!((result.payload[0].hole_diameter - 4.5 * 25.4).abs() < 1e-9);
    }

    #[test]
    fn skip_policy_ignores_duplicate_hole_id() {
        let options = CustomCsvOptions { columns: basic_columns(), has_header: false, collision_policy: CollisionPolicy::Skip, ..Default::default() };
        let text = "B1,H1,0,0,100,15,0,90,115\nB1,H1,5,5,90,15,0,90,115\n";
        let result = parse(text, &options);
        assert_eq!(result.payload.len(), 1);
        assert_eq!(result.payload[0].collar.x, 0.0);
    }

    #[test]
    fn update_by_id_replaces_duplicate() {
        let options = CustomCsvOptions { columns: basic_columns(), has_header: false, collision_policy: CollisionPolicy::UpdateById, ..Default::default() };
        let text = "B1,H1,0,0,100,15,0,90,115\nB1,H1,5,5,90,15,0,90,115\n";
        let result = parse(text, &options);
        assert_eq!(result.payload.len(), 1);
        assert_eq!(result.payload[0].collar.x, 5.0);
    }

    #[test]
    fn update_by_location_merges_holes_within_tolerance() {
        let options = CustomCsvOptions { columns: basic_columns(), has_header: false, collision_policy: CollisionPolicy::UpdateByLocation, ..Default::default() };
        let text = "B1,H1,0,0,100,15,0,90,115\nB1,H2,0.001,0.001,100,20,0,90,115\n";
        let result = parse(text, &options);
        assert_eq!(result.payload.len(), 1);
        assert_eq!(result.payload[0].hole_id, "H2");
    }

    #[test]
    fn row_detector_assigns_row_and_pos_ids() {
        let options = CustomCsvOptions { columns: basic_columns(), has_header: false, ..Default::default() };
        let text = "B1,A1,0,0,100,15,0,90,115\nB1,A2,5,0,100,15,0,90,115\nB1,B1,0,5,100,15,0,90,115\n";
        let result = parse(text, &options);
        assert!(result.payload.iter().all(|h| h.row_id.is_some() && h.pos_id.is_some()));
    }
}
