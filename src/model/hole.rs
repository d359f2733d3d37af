//! Blast hole model (spec.md §3 "Hole").

use serde::{Deserialize, Serialize};

use super::point::Point3;

/// A measured scalar value plus the timestamp it was recorded, e.g.
/// `measuredLength` / `measuredLengthTS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measured<T> {
    pub value: Option<T>,
    pub timestamp: Option<String>,
}

impl<T> Default for Measured<T> {
    fn default() -> Self {
        Measured { value: None, timestamp: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hole {
    pub hole_id: String,
    pub entity_name: String,

    pub collar: Point3,
    pub grade: Point3,
    pub toe: Point3,

    pub hole_length_calculated: f64,
    /// Degrees, 0 = vertical down, 180 = vertical up.
    pub hole_angle: f64,
    /// Degrees, 0 = North, 90 = East, range [0, 360).
    pub hole_bearing: f64,

    /// Signed vertical delta-Z from grade to toe; positive => toe below grade.
    pub subdrill_amount: f64,
    /// Unsigned 3-D distance grade -> toe.
    pub subdrill_length: f64,
    /// Unsigned |startZ - gradeZ|.
    pub bench_height: f64,

    pub hole_diameter: f64,
    pub hole_type: String,
    /// Composite `"<entityName>:::<holeID>"`.
    pub from_hole_id: String,
    pub timing_delay_milliseconds: f64,
    pub color_hex_decimal: String,

    pub measured_length: Measured<f64>,
    pub measured_mass: Measured<f64>,
    pub measured_comment: Measured<String>,

    pub row_id: Option<u32>,
    pub pos_id: Option<u32>,
    pub burden: Option<f64>,
    pub spacing: Option<f64>,
    pub connector_curve: Option<String>,
}

impl Hole {
    /// Build the composite `fromHoleID` for a hole that ties to `from`.
    pub fn compose_from_hole_id(entity_name: &str, hole_id: &str) -> String {
        format!("{entity_name}:::{hole_id}")
    }

    /// A leadin/root hole always self-references.
    pub fn self_from_hole_id(&self) -> String {
        Self::compose_from_hole_id(&self.entity_name, &self.hole_id)
    }
}
