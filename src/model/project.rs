//! Project-level aggregate (spec.md §3 "Project"), the payload of a KAP
//! archive. `products`/`charging`/`configs` are opaque JSON to this crate —
//! round-trip fidelity only, per spec.md §3.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::drawing::DrawingMap;
use super::hole::Hole;
use super::surface::Surface;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub blob: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct Project {
    pub holes: Vec<Hole>,
    pub drawings: DrawingMap,
    pub surfaces: HashMap<String, Surface>,
    pub images: HashMap<String, Image>,
    /// Opaque; round-trips through KAP unmodified.
    pub products: HashMap<String, serde_json::Value>,
    /// Opaque; keys are migrated from a plain `holeID` to the composite
    /// `"<entityName>:::<holeID>"` form on read (spec.md §4.6.8 merge rules).
    pub charging: HashMap<String, serde_json::Value>,
    /// Opaque; round-trips through KAP unmodified.
    pub configs: HashMap<String, serde_json::Value>,
    pub drawing_layers: Vec<String>,
    pub surface_layers: Vec<String>,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }
}
