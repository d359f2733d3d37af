//! The `Drawing` tagged variant and its shared/variant-specific fields
//! (spec.md §3, "Polymorphic entity containers" in §9).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::point::Point3;

/// One vertex of a Point/Line/Polygon/Text entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: Point3,
    pub color: String,
    pub line_width: f64,
    /// 1-based, strictly increasing within an entity (spec.md §3 invariant).
    pub point_id: u32,
    /// Only meaningful on the last vertex of a Polygon.
    pub closed: bool,
}

impl Vertex {
    pub fn new(position: Point3, point_id: u32) -> Self {
        Vertex {
            position,
            color: "#777777".to_string(),
            line_width: 1.0,
            point_id,
            closed: false,
        }
    }
}

/// Fields shared by every `Drawing` variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingCommon {
    pub entity_name: String,
    pub layer: String,
    pub handle: Option<String>,
    pub vulcan_name: Option<String>,
}

impl DrawingCommon {
    pub fn new(entity_name: impl Into<String>) -> Self {
        DrawingCommon {
            entity_name: entity_name.into(),
            layer: "0".to_string(),
            handle: None,
            vulcan_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entityType", rename_all = "lowercase")]
pub enum Drawing {
    Point {
        #[serde(flatten)]
        common: DrawingCommon,
        vertex: Vertex,
    },
    Line {
        #[serde(flatten)]
        common: DrawingCommon,
        vertices: Vec<Vertex>,
    },
    Polygon {
        #[serde(flatten)]
        common: DrawingCommon,
        vertices: Vec<Vertex>,
    },
    Circle {
        #[serde(flatten)]
        common: DrawingCommon,
        center: Point3,
        radius: f64,
        color: String,
        line_width: f64,
    },
    Text {
        #[serde(flatten)]
        common: DrawingCommon,
        anchor: Point3,
        text: String,
        font_height: f64,
        color: String,
    },
}

impl Drawing {
    pub fn common(&self) -> &DrawingCommon {
        match self {
            Drawing::Point { common, .. }
            | Drawing::Line { common, .. }
            | Drawing::Polygon { common, .. }
            | Drawing::Circle { common, .. }
            | Drawing::Text { common, .. } => common,
        }
    }

    pub fn common_mut(&mut self) -> &mut DrawingCommon {
        match self {
            Drawing::Point { common, .. }
            | Drawing::Line { common, .. }
            | Drawing::Polygon { common, .. }
            | Drawing::Circle { common, .. }
            | Drawing::Text { common, .. } => common,
        }
    }

    pub fn entity_name(&self) -> &str {
        &self.common().entity_name
    }

    /// True if a Polygon has been reduced below 3 vertices and must be
    /// demoted to a Line on the next mutation (spec.md §3 invariant).
    pub fn polygon_needs_demotion(&self) -> bool {
        matches!(self, Drawing::Polygon { vertices, .. } if vertices.len() < 3)
    }

    /// Demote a Polygon with exactly 2 vertices to a Line, dropping the
    /// trailing `closed` flag. No-op for any other variant/vertex count.
    pub fn demote_if_needed(self) -> Drawing {
        match self {
            Drawing::Polygon { common, mut vertices } if vertices.len() == 2 => {
                if let Some(last) = vertices.last_mut() {
                    last.closed = false;
                }
                Drawing::Line { common, vertices }
            }
            other => other,
        }
    }
}

/// Stable-iteration-order mapping of entity name -> `Drawing`, as required by
/// spec.md §5 ("Drawings appear in the output mapping in first-encounter
/// order"). Backed by a `BTreeMap` keyed on insertion-ordered synthetic keys
/// would break that guarantee, so this wraps an insertion-ordered vector of
/// pairs plus an index for name lookups.
#[derive(Debug, Clone, Default)]
pub struct DrawingMap {
    order: Vec<String>,
    entries: BTreeMap<String, Drawing>,
}

impl DrawingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `drawing`, renaming it with a `_1`, `_2`, ... suffix if its
    /// entity name already exists (spec.md §3 invariant).
    pub fn insert_unique(&mut self, mut drawing: Drawing) -> String {
        let base = drawing.entity_name().to_string();
        let mut name = base.clone();
        let mut suffix = 0u32;
        while self.entries.contains_key(&name) {
            suffix += 1;
            name = format!("{base}_{suffix}");
        }
        if suffix > 0 {
            tracing::debug!(%base, %name, "drawing name collision resolved with suffix");
        }
        drawing.common_mut().entity_name = name.clone();
        self.order.push(name.clone());
        self.entries.insert(name.clone(), drawing);
        name
    }

    pub fn get(&self, name: &str) -> Option<&Drawing> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Insert `drawing` under its own entity name verbatim, without the
    /// collision-suffixing `insert_unique` does. Returns `false` and leaves
    /// the map untouched if that name is already taken (spec.md §4.6.8
    /// merge rule: "skip any entry whose key already exists").
    pub fn insert_exact(&mut self, drawing: Drawing) -> bool {
        let name = drawing.entity_name().to_string();
        if self.entries.contains_key(&name) {
            tracing::debug!(%name, "skipped merge entry, name already present");
            return false;
        }
        self.order.push(name.clone());
        self.entries.insert(name, drawing);
        true
    }

    pub fn remove(&mut self, name: &str) -> Option<Drawing> {
        let removed = self.entries.remove(name);
        if removed.is_some() {
            self.order.retain(|n| n != name);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in first-encounter (insertion) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Drawing)> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name).map(|d| (name.as_str(), d)))
    }

    /// Mutate every drawing in place, order irrelevant. Used by the
    /// dispatcher's centroid-translation step (spec.md §4.2: "callers
    /// translate by a centroid before interning").
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut Drawing)) {
        for drawing in self.entries.values_mut() {
            f(drawing);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(name: &str) -> Drawing {
        Drawing::Point {
            common: DrawingCommon::new(name),
            vertex: Vertex::new(Point3::ZERO, 1),
        }
    }

    #[test]
    fn duplicate_names_get_suffixed() {
        let mut map = DrawingMap::new();
        assert_eq!(map.insert_unique(pt("P1")), "P1");
        assert_eq!(map.insert_unique(pt("P1")), "P1_1");
        assert_eq!(map.insert_unique(pt("P1")), "P1_2");
    }

    #[test]
    fn iteration_is_first_encounter_order() {
        let mut map = DrawingMap::new();
        map.insert_unique(pt("B"));
        map.insert_unique(pt("A"));
        map.insert_unique(pt("C"));
        let names: Vec<_> = map.iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
    }

    #[test]
    fn two_vertex_polygon_demotes_to_line() {
        let poly = Drawing::Polygon {
            common: DrawingCommon::new("Poly1"),
            vertices: vec![Vertex::new(Point3::ZERO, 1), Vertex::new(Point3::new(1.0, 0.0, 0.0), 2)],
        };
        let demoted = poly.demote_if_needed();
        assert!(matches!(demoted, Drawing::Line { .. }));
    }
}
