//! Blast-hole geometry completion and inversion (spec.md §4.3
//! `GeometryResolver`).
//!
//! Given whichever subset of {collar, toe, length, angle, bearing, subdrill}
//! a parser has on hand, [`resolve`] fills in the rest following the strict
//! five-rule priority ladder in spec.md §4.3. Every produced coordinate is
//! NaN-guarded (§4.3.2): a NaN toe/grade component is replaced by the
//! matching collar component, a NaN scalar by `0.0`.

use crate::error::GeoIoError;
use crate::model::Point3;

const EPSILON: f64 = 1e-9;

/// Whichever inputs a caller has on hand. `None` means "not supplied by this
/// source format", not zero.
#[derive(Debug, Clone, Default)]
pub struct GeometryInput {
    pub collar: Option<Point3>,
    pub toe: Option<Point3>,
    pub length: Option<f64>,
    /// Degrees, 0 = vertical down.
    pub angle: Option<f64>,
    /// Degrees, 0 = North, 90 = East.
    pub bearing: Option<f64>,
    /// Signed vertical delta-Z, toe to grade.
    pub subdrill: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGeometry {
    pub collar: Point3,
    pub grade: Point3,
    pub toe: Point3,
    pub hole_length_calculated: f64,
    pub hole_angle: f64,
    pub hole_bearing: f64,
    pub subdrill_amount: f64,
    pub subdrill_length: f64,
    pub bench_height: f64,
    pub warnings: Vec<String>,
}

/// Apply the priority ladder in spec.md §4.3. Fails with `MissingGeometry`
/// only when none of the five rules' input combinations are satisfied.
pub fn resolve(input: &GeometryInput) -> Result<ResolvedGeometry, GeoIoError> {
    let lab = (input.length, input.angle, input.bearing);

    if let (Some(collar), Some(toe)) = (input.collar, input.toe) {
        return Ok(rule1_from_collar_and_toe(collar, toe, input.subdrill));
    }

    if let (Some(collar), (Some(length), Some(angle), Some(bearing)), Some(subdrill)) = (input.collar, lab, input.subdrill) {
        return Ok(rule2_forward(collar, length, angle, bearing, subdrill));
    }

    if let (None, Some(toe), (Some(length), Some(angle), Some(bearing)), Some(subdrill)) = (input.collar, input.toe, lab, input.subdrill) {
        return Ok(rule3_inverse(toe, length, angle, bearing, subdrill));
    }

    if let (Some(collar), (Some(length), Some(angle), Some(bearing)), None) = (input.collar, lab, input.subdrill) {
        return Ok(rule2_forward(collar, length, angle, bearing, 1.0));
    }

    if let Some(collar) = input.collar {
        let bench_height_default = 10.0;
        let subdrill_default = 1.0;
        let length = bench_height_default + subdrill_default;
        return Ok(rule2_forward(collar, length, 0.0, 0.0, subdrill_default));
    }

    Err(GeoIoError::MissingGeometry)
}

fn rule1_from_collar_and_toe(collar: Point3, toe: Point3, subdrill: Option<f64>) -> ResolvedGeometry {
    let dx = toe.x - collar.x;
    let dy = toe.y - collar.y;
    let dz = collar.z - toe.z; // positive downward
    let length = collar.distance(&toe);
    let bearing = normalize_bearing(dx.atan2(dy).to_degrees());
    let angle = dx.hypot(dy).atan2(dz).to_degrees();
    let subdrill_amount = subdrill.unwrap_or_else(|| (length * 0.1).min(1.0));

    let mut out = grade_from_subdrill(collar, toe, subdrill_amount, angle, bearing);
    out.hole_length_calculated = length;
    out.hole_angle = angle;
    out.hole_bearing = bearing;
    out
}

fn rule2_forward(collar: Point3, length: f64, angle: f64, bearing: f64, subdrill_amount: f64) -> ResolvedGeometry {
    let toe = forward_project(collar, length, angle, bearing);
    let mut out = grade_from_subdrill(collar, toe, subdrill_amount, angle, bearing);
    out.hole_length_calculated = length;
    out.hole_angle = angle;
    out.hole_bearing = bearing;
    out
}

fn rule3_inverse(toe: Point3, length: f64, angle: f64, bearing: f64, subdrill_amount: f64) -> ResolvedGeometry {
    let collar = inverse_project_collar(toe, length, angle, bearing);
    let mut out = grade_from_subdrill(collar, toe, subdrill_amount, angle, bearing);
    out.hole_length_calculated = length;
    out.hole_angle = angle;
    out.hole_bearing = bearing;
    out
}

/// spec.md §4.3.1 forward projection: collar + (length, angle, bearing) -> toe.
fn forward_project(collar: Point3, length: f64, angle_deg: f64, bearing_deg: f64) -> Point3 {
    let a = angle_deg.to_radians();
    let b = bearing_deg.to_radians();
    let horizontal = length * a.sin();
    let vertical = length * a.cos();
    Point3::new(collar.x + horizontal * b.sin(), collar.y + horizontal * b.cos(), collar.z - vertical)
}

/// spec.md §4.3 rule 3 inverse projection: toe + (length, angle, bearing) -> collar.
fn inverse_project_collar(toe: Point3, length: f64, angle_deg: f64, bearing_deg: f64) -> Point3 {
    let a = angle_deg.to_radians();
    let b = bearing_deg.to_radians();
    Point3::new(
        toe.x - length * a.sin() * b.sin(),
        toe.y - length * a.sin() * b.cos(),
        toe.z + length * a.cos(),
    )
}

/// spec.md §4.3.2: grade from a signed vertical subdrill delta-Z, plus the
/// bench height and subdrill-length invariants. NaN-guards every output
/// coordinate/scalar.
fn grade_from_subdrill(collar: Point3, toe: Point3, subdrill_amount: f64, angle_deg: f64, bearing_deg: f64) -> ResolvedGeometry {
    let a = angle_deg.to_radians();
    let b = bearing_deg.to_radians();

    let grade_z = toe.z + subdrill_amount;
    let horiz_off = subdrill_amount * a.tan();
    let grade_x = toe.x - horiz_off * b.sin();
    let grade_y = toe.y - horiz_off * b.cos();
    let mut grade = Point3::new(grade_x, grade_y, grade_z);

    let subdrill_length = if a.abs() > EPSILON { subdrill_amount / a.cos() } else { subdrill_amount };
    let bench_height = (collar.z - grade.z).abs();

    let mut warnings = Vec::new();
    nan_guard_point(&mut grade, &collar, &mut warnings, "grade");
    let mut toe = toe;
    nan_guard_point(&mut toe, &collar, &mut warnings, "toe");
    let subdrill_length = nan_guard_scalar(subdrill_length, &mut warnings, "subdrillLength");
    let bench_height = nan_guard_scalar(bench_height, &mut warnings, "benchHeight");
    let subdrill_amount = nan_guard_scalar(subdrill_amount, &mut warnings, "subdrillAmount");

    ResolvedGeometry {
        collar,
        grade,
        toe,
        hole_length_calculated: 0.0,
        hole_angle: 0.0,
        hole_bearing: 0.0,
        subdrill_amount,
        subdrill_length,
        bench_height,
        warnings,
    }
}

fn nan_guard_point(p: &mut Point3, fallback: &Point3, warnings: &mut Vec<String>, label: &str) {
    if p.x.is_nan() || p.y.is_nan() || p.z.is_nan() {
        tracing::warn!(%label, "geometry field contained NaN, replaced with collar");
        warnings.push(format!("{label} contained NaN, replaced with collar"));
        *p = *fallback;
    }
}

fn nan_guard_scalar(v: f64, warnings: &mut Vec<String>, label: &str) -> f64 {
    if v.is_nan() {
        tracing::warn!(%label, "geometry field was NaN, replaced with 0");
        warnings.push(format!("{label} was NaN, replaced with 0"));
        0.0
    } else {
        v
    }
}

/// Normalize a bearing to `[0, 360)`.
pub fn normalize_bearing(deg: f64) -> f64 {
    let normalized = deg % 360.0;
    if normalized < 0.0 { normalized + 360.0 } else { normalized }
}
