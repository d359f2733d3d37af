//! Triangulated surface model (spec.md §3 "Surface").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::point::{Aabb3, Point3};

/// A triangle referencing three vertices by index into `Surface::points`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub v1: u32,
    pub v2: u32,
    pub v3: u32,
    pub min_z: f64,
    pub max_z: f64,
}

impl Triangle {
    pub fn new(v1: u32, v2: u32, v3: u32, points: &[Point3]) -> Self {
        let z1 = points[v1 as usize].z;
        let z2 = points[v2 as usize].z;
        let z3 = points[v3 as usize].z;
        Triangle {
            v1,
            v2,
            v3,
            min_z: z1.min(z2).min(z3),
            max_z: z1.max(z2).max(z3),
        }
    }
}

/// OBJ/MTL text blobs, material properties and keyed texture blobs carried by
/// a textured surface (spec.md §3 "Textured variant", supplemented in
/// SPEC_FULL.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TexturedSurface {
    pub obj_text: String,
    pub mtl_text: String,
    pub material_name: String,
    pub textures: HashMap<String, Vec<u8>>,
    pub texture_folder_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub id: String,
    pub name: String,
    pub points: Vec<Point3>,
    pub triangles: Vec<Triangle>,
    pub mesh_bounds: Aabb3,
    pub visible: bool,
    pub gradient: String,
    pub transparency: f64,
    pub min_z_limit: Option<f64>,
    pub max_z_limit: Option<f64>,
    pub texture: Option<TexturedSurface>,
}

impl Surface {
    /// Build a surface from an already-deduplicated vertex table and its
    /// triangle list, per spec.md §4.6.6. Returns `None` if `triangles` is
    /// empty ("If no triangles, no surface is emitted").
    pub fn from_mesh(id: impl Into<String>, name: impl Into<String>, points: Vec<Point3>, triangles: Vec<Triangle>) -> Option<Self> {
        if triangles.is_empty() {
            return None;
        }
        let mesh_bounds = Aabb3::of(&points);
        Some(Surface {
            id: id.into(),
            name: name.into(),
            points,
            triangles,
            mesh_bounds,
            visible: true,
            gradient: "hillshade".to_string(),
            transparency: 1.0,
            min_z_limit: None,
            max_z_limit: None,
            texture: None,
        })
    }

    /// Every triangle index must be in range (spec.md §3 invariant, tested
    /// by universal property 7).
    pub fn triangles_in_range(&self) -> bool {
        let n = self.points.len() as u32;
        self.triangles.iter().all(|t| t.v1 < n && t.v2 < n && t.v3 < n)
    }
}
