//! Shared DXF entity-building state machine (spec.md §4.6.1/§4.6.2), used
//! verbatim by both the binary and ASCII DXF parsers: they differ only in
//! how they turn bytes into a `Vec<Record>` and in ASCII's ellipse/arc
//! sampling (handled in `dxf::ascii`).

use std::collections::HashSet;

use crate::entity_namer::{self, EntityNamerStrategy};
use crate::model::{Aabb3, Drawing, DrawingCommon, DrawingMap, Point3, Surface, Triangle, Vertex};
use crate::spatial_hash::SpatialPointHash;

use super::group_code::{Record, Value};

const VULCAN_APP_NAME: &str = "MAPTEK_VULCAN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Header,
    Tables,
    Blocks,
    Entities,
}

#[derive(Debug, Default)]
struct RawEntity {
    entity_type: String,
    handle: Option<String>,
    layer: Option<String>,
    color_index: Option<i32>,
    text: Option<String>,
    radius_height: Option<f64>,
    flags: i32,
    p1: [Option<f64>; 3],
    p2: [Option<f64>; 3],
    p3: [Option<f64>; 3],
    p4: [Option<f64>; 3],
    lwpolyline_vertices: Vec<(f64, f64)>,
    polyline_vertices: Vec<Point3>,
    in_polyline: bool,
    ext_app_name: Option<String>,
    ext_vulcan_name: Option<String>,
}

impl RawEntity {
    fn point(p: &[Option<f64>; 3]) -> Option<Point3> {
        Some(Point3::new(p[0]?, p[1]?, p[2].unwrap_or(0.0)))
    }
}

pub struct DxfBuildOptions {
    pub naming_strategy: EntityNamerStrategy,
    pub vertex_tolerance: f64,
}

impl Default for DxfBuildOptions {
    fn default() -> Self {
        DxfBuildOptions { naming_strategy: EntityNamerStrategy::LayerIndex, vertex_tolerance: crate::spatial_hash::DEFAULT_TOLERANCE }
    }
}

#[derive(Debug, Default)]
pub struct DxfBuildOutput {
    pub drawings: DrawingMap,
    pub surfaces: Vec<Surface>,
    pub warnings: Vec<String>,
}

/// Walk a decoded record stream and build drawings/surfaces from it.
pub fn build(records: &[Record], opts: &DxfBuildOptions) -> DxfBuildOutput {
    tracing::debug!(record_count = records.len(), "building drawings from DXF records");
    let mut section = Section::None;
    let mut drawings = DrawingMap::new();
    let mut warnings = Vec::new();
    let mut existing_names: HashSet<String> = HashSet::new();
    let mut layer_index: u32 = 0;
    let mut global_index: u32 = 0;

    let mut vertex_hash = SpatialPointHash::new(opts.vertex_tolerance);
    let mut triangles = Vec::new();

    let mut current: Option<RawEntity> = None;

    macro_rules! flush_entity {
        () => {
            if let Some(entity) = current.take() {
                finish_entity(
                    entity,
                    opts,
                    &mut drawings,
                    &mut existing_names,
                    &mut layer_index,
                    &mut global_index,
                    &mut vertex_hash,
                    &mut triangles,
                    &mut warnings,
                );
            }
        };
    }

    for record in records {
        match record.code {
            0 => {
                let value = record.as_str().unwrap_or_default();
                match value {
                    "SECTION" => {
                        flush_entity!();
                        section = Section::None; // set properly once the (2, name) record arrives
                    }
                    "ENDSEC" => {
                        flush_entity!();
                        section = Section::None;
                    }
                    "EOF" => {
                        flush_entity!();
                        break;
                    }
                    "VERTEX" => flush_vertex_marker(&mut current),
                    "SEQEND" => {
                        if section == Section::Entities {
                            flush_entity!();
                        }
                    }
                    _ if section == Section::Entities => {
                        flush_entity!();
                        current = Some(RawEntity { entity_type: value.to_string(), ..Default::default() });
                    }
                    _ => {}
                }
            }
            2 => {
                let value = record.as_str().unwrap_or_default();
                if current.is_none() {
                    section = match value {
                        "HEADER" => Section::Header,
                        "TABLES" => Section::Tables,
                        "BLOCKS" => Section::Blocks,
                        "ENTITIES" => Section::Entities,
                        _ => section,
                    };
                    tracing::debug!(?section, "entered DXF section");
                }
            }
            5 => set_field(&mut current, |e| e.handle = record.as_str().map(str::to_string)),
            8 => set_field(&mut current, |e| e.layer = record.as_str().map(str::to_string)),
            1 => set_field(&mut current, |e| e.text = record.as_str().map(str::to_string)),
            1001 => set_field(&mut current, |e| e.ext_app_name = record.as_str().map(str::to_string)),
            1000 => set_field(&mut current, |e| {
                if e.ext_app_name.as_deref() == Some(VULCAN_APP_NAME) {
                    if let Some(s) = record.as_str() {
                        if let Some(name) = s.strip_prefix("VulcanName=") {
                            if name != "-" && name != "--" {
                                e.ext_vulcan_name = Some(name.to_string());
                            }
                        }
                    }
                }
            }),
            10 => accumulate_xyz(&mut current, 0, 0, record),
            20 => accumulate_xyz(&mut current, 0, 1, record),
            30 => accumulate_xyz(&mut current, 0, 2, record),
            11 => accumulate_xyz(&mut current, 1, 0, record),
            21 => accumulate_xyz(&mut current, 1, 1, record),
            31 => accumulate_xyz(&mut current, 1, 2, record),
            12 => accumulate_xyz(&mut current, 2, 0, record),
            22 => accumulate_xyz(&mut current, 2, 1, record),
            32 => accumulate_xyz(&mut current, 2, 2, record),
            13 => accumulate_xyz(&mut current, 3, 0, record),
            23 => accumulate_xyz(&mut current, 3, 1, record),
            33 => accumulate_xyz(&mut current, 3, 2, record),
            40 => set_field(&mut current, |e| e.radius_height = record.as_f64()),
            62 => set_field(&mut current, |e| e.color_index = record.as_i32()),
            70 => set_field(&mut current, |e| e.flags = record.as_i32().unwrap_or(0)),
            _ => {}
        }
    }
    flush_entity!();

    DxfBuildOutput { drawings, surfaces: finalize_surfaces(vertex_hash, triangles), warnings }
}

fn set_field(current: &mut Option<RawEntity>, f: impl FnOnce(&mut RawEntity)) {
    if let Some(entity) = current.as_mut() {
        f(entity);
    }
}

fn accumulate_xyz(current: &mut Option<RawEntity>, which: usize, axis: usize, record: &Record) {
    if let Some(entity) = current.as_mut() {
        let value = record.as_f64();
        if entity.entity_type == "LWPOLYLINE" && which == 0 {
            match axis {
                0 => entity.lwpolyline_vertices.push((value.unwrap_or(0.0), 0.0)),
                1 => {
                    if let Some(last) = entity.lwpolyline_vertices.last_mut() {
                        last.1 = value.unwrap_or(0.0);
                    }
                }
                _ => {}
            }
            return;
        }
        let slot = match which {
            0 => &mut entity.p1,
            1 => &mut entity.p2,
            2 => &mut entity.p3,
            _ => &mut entity.p4,
        };
        slot[axis] = value;
    }
}

/// `VERTEX` records append to the enclosing `POLYLINE`'s vertex list rather
/// than opening a new entity; this flushes the just-accumulated p1 triple
/// (from the *previous* VERTEX, if any) into `polyline_vertices` and marks
/// the entity as polyline-mode so the next group-code-10/20/30 triple is
/// understood to belong to the new VERTEX.
fn flush_vertex_marker(current: &mut Option<RawEntity>) {
    if let Some(entity) = current.as_mut() {
        if entity.entity_type == "POLYLINE" {
            entity.in_polyline = true;
        } else if entity.in_polyline {
            if let Some(p) = RawEntity::point(&entity.p1) {
                entity.polyline_vertices.push(p);
            }
            entity.p1 = [None; 3];
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn finish_entity(
    mut entity: RawEntity,
    opts: &DxfBuildOptions,
    drawings: &mut DrawingMap,
    existing_names: &mut HashSet<String>,
    layer_index: &mut u32,
    global_index: &mut u32,
    vertex_hash: &mut SpatialPointHash,
    triangles: &mut Vec<Triangle>,
    warnings: &mut Vec<String>,
) {
    if entity.in_polyline {
        if let Some(p) = RawEntity::point(&entity.p1) {
            entity.polyline_vertices.push(p);
        }
    }

    let layer = entity.layer.clone().unwrap_or_else(|| "0".to_string());
    let color = crate::model::color::aci_to_hex(entity.color_index.unwrap_or(-1));
    *layer_index += 1;
    *global_index += 1;

    let name = entity_namer::generate(opts.naming_strategy, &layer, &entity.entity_type.to_lowercase(), entity.handle.as_deref(), *layer_index, *global_index, existing_names, None);

    let mut common = DrawingCommon::new(name);
    common.layer = layer.clone();
    common.handle = entity.handle.clone();

    let drawing = match entity.entity_type.as_str() {
        "POINT" => RawEntity::point(&entity.p1).map(|p| Drawing::Point { common: common.clone(), vertex: colored_vertex(p, 1, &color) }),
        "LINE" => match (RawEntity::point(&entity.p1), RawEntity::point(&entity.p2)) {
            (Some(a), Some(b)) => Some(Drawing::Line {
                common: common.clone(),
                vertices: vec![colored_vertex(a, 1, &color), colored_vertex(b, 2, &color)],
            }),
            _ => None,
        },
        "LWPOLYLINE" => {
            if entity.lwpolyline_vertices.len() >= 2 {
                let closed = entity.flags & 1 != 0;
                let vertices = polyline_from_xy(&entity.lwpolyline_vertices, closed);
                Some(if closed {
                    Drawing::Polygon { common: common.clone(), vertices }
                } else {
                    Drawing::Line { common: common.clone(), vertices }
                })
            } else {
                None
            }
        }
        "POLYLINE" => {
            if entity.polyline_vertices.len() >= 2 {
                let closed = entity.flags & 1 != 0;
                let vertices = polyline_from_points(&entity.polyline_vertices, closed);
                Some(if closed {
                    Drawing::Polygon { common: common.clone(), vertices }
                } else {
                    Drawing::Line { common: common.clone(), vertices }
                })
            } else {
                None
            }
        }
        "CIRCLE" => RawEntity::point(&entity.p1).map(|center| Drawing::Circle {
            common: common.clone(),
            center,
            radius: entity.radius_height.unwrap_or(0.0),
            color: color.clone(),
            line_width: 1.0,
        }),
        "TEXT" => RawEntity::point(&entity.p1).map(|anchor| Drawing::Text {
            common: common.clone(),
            anchor,
            text: entity.text.clone().unwrap_or_default(),
            font_height: entity.radius_height.unwrap_or(2.5),
            color: color.clone(),
        }),
        "3DFACE" => {
            add_3dface_triangle(&entity, vertex_hash, triangles);
            None
        }
        // Sampled into polylines by the ASCII front end's `expand_curves`
        // second pass (spec.md §4.6.2); not an unhandled type.
        "ELLIPSE" | "ARC" => None,
        other => {
            tracing::debug!(entity_type = %other, "unhandled DXF entity type");
            warnings.push(format!("unhandled DXF entity type {other}"));
            None
        }
    };

    if let Some(mut drawing) = drawing.map(Drawing::demote_if_needed) {
        if let Some(vulcan_name) = entity.ext_vulcan_name.clone() {
            drawing.common_mut().vulcan_name = Some(vulcan_name.clone());
            let anchor = first_vertex_point(&drawing).unwrap_or(Point3::ZERO);
            let mut text_common = DrawingCommon::new(format!("{}_vulcan", drawing.entity_name()));
            text_common.layer = layer;
            let text_drawing = Drawing::Text {
                common: text_common,
                anchor,
                text: vulcan_name,
                font_height: 2.5,
                color,
            };
            drawings.insert_unique(drawing);
            drawings.insert_unique(text_drawing);
        } else {
            drawings.insert_unique(drawing);
        }
    }
}

fn colored_vertex(p: Point3, point_id: u32, color: &str) -> Vertex {
    let mut v = Vertex::new(p, point_id);
    v.color = color.to_string();
    v
}

fn polyline_from_xy(points: &[(f64, f64)], closed: bool) -> Vec<Vertex> {
    let mut vertices: Vec<Vertex> = points.iter().enumerate().map(|(i, &(x, y))| colored_vertex(Point3::new(x, y, 0.0), (i + 1) as u32, "#777777")).collect();
    if closed {
        if let Some(last) = vertices.last_mut() {
            last.closed = true;
        }
    }
    vertices
}

fn polyline_from_points(points: &[Point3], closed: bool) -> Vec<Vertex> {
    let mut vertices: Vec<Vertex> = points.iter().enumerate().map(|(i, &p)| colored_vertex(p, (i + 1) as u32, "#777777")).collect();
    if closed {
        if let Some(last) = vertices.last_mut() {
            last.closed = true;
        }
    }
    vertices
}

fn first_vertex_point(drawing: &Drawing) -> Option<Point3> {
    match drawing {
        Drawing::Point { vertex, .. } => Some(vertex.position),
        Drawing::Line { vertices, .. } | Drawing::Polygon { vertices, .. } => vertices.first().map(|v| v.position),
        Drawing::Circle { center, .. } => Some(*center),
        Drawing::Text { anchor, .. } => Some(*anchor),
    }
}

fn add_3dface_triangle(entity: &RawEntity, vertex_hash: &mut SpatialPointHash, triangles: &mut Vec<Triangle>) {
    let p1 = RawEntity::point(&entity.p1);
    let p2 = RawEntity::point(&entity.p2);
    let p3 = RawEntity::point(&entity.p3);
    let p4 = RawEntity::point(&entity.p4);

    let (Some(a), Some(b), Some(c)) = (p1, p2, p3) else { return };
    push_triangle(vertex_hash, triangles, a, b, c);

    if let Some(d) = p4 {
        if d != c {
            push_triangle(vertex_hash, triangles, a, c, d);
        }
    }
}

fn push_triangle(vertex_hash: &mut SpatialPointHash, triangles: &mut Vec<Triangle>, a: Point3, b: Point3, c: Point3) {
    let (i1, _) = vertex_hash.intern(a);
    let (i2, _) = vertex_hash.intern(b);
    let (i3, _) = vertex_hash.intern(c);
    triangles.push(Triangle::new(i1, i2, i3, vertex_hash.points()));
}

fn finalize_surfaces(vertex_hash: SpatialPointHash, triangles: Vec<Triangle>) -> Vec<Surface> {
    if triangles.is_empty() {
        return Vec::new();
    }
    let points = vertex_hash.into_points();
    let mesh_bounds = Aabb3::of(&points);
    vec![Surface {
        id: "dxf_surface".to_string(),
        name: "dxf_surface".to_string(),
        points,
        triangles,
        mesh_bounds,
        visible: true,
        gradient: "hillshade".to_string(),
        transparency: 1.0,
        min_z_limit: None,
        max_z_limit: None,
        texture: None,
    }]
}

