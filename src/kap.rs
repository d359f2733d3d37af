//! Kirra project archive, this crate's own native round-trip format
//! (spec.md §4.6.8 parser / §4.7.3 writer).
//!
//! A KAP file is a ZIP archive of JSON collections plus binary blobs:
//! `manifest.json`, `holes.json`, `drawings.json` (an array of
//! `[name, Drawing]` pairs), `surfaces.json`, `images.json` + `images/<id>.blob`,
//! `textures/<folderKey>/<textureName>` per textured surface, `products.json`,
//! `charging.json`, `configs.json`, `layers.json`.

use std::collections::HashMap;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zip::write::FileOptions;

use crate::model::{Drawing, DrawingMap, Hole, Image, Point3, Project, Surface, Triangle};
use crate::ParseResult;

#[derive(Debug, Error)]
pub enum KapError {
    #[error("KAP archive is missing required member {0}")]
    MissingMember(&'static str),
    #[error("KAP JSON member failed to parse: {0}")]
    Json(#[from] serde_json::Error),
    #[error("KAP archive entry failed to read: {0}")]
    Zip(#[from] zip::result::ZipError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Clear the target `Project` before merging.
    Replace,
    /// Keep the target's existing entries; skip any incoming entry whose key
    /// already exists.
    Merge,
}

/// Per-collection added/skipped tallies from one [`merge_into`] call
/// (spec.md §8 S6: "merge summary reports `added=1, skipped=1`").
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub holes_added: usize,
    pub holes_skipped: usize,
    pub drawings_added: usize,
    pub drawings_skipped: usize,
    pub surfaces_added: usize,
    pub surfaces_skipped: usize,
    pub images_added: usize,
    pub images_skipped: usize,
    pub products_added: usize,
    pub products_skipped: usize,
    pub charging_added: usize,
    pub charging_skipped: usize,
    pub configs_added: usize,
    pub configs_skipped: usize,
}

impl MergeSummary {
    /// Total entries added/skipped across every collection.
    pub fn added(&self) -> usize {
        self.holes_added
            + self.drawings_added
            + self.surfaces_added
            + self.images_added
            + self.products_added
            + self.charging_added
            + self.configs_added
    }

    pub fn skipped(&self) -> usize {
        self.holes_skipped
            + self.drawings_skipped
            + self.surfaces_skipped
            + self.images_skipped
            + self.products_skipped
            + self.charging_skipped
            + self.configs_skipped
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    kap_version: String,
    schema_version: String,
    counts: HashMap<String, usize>,
}

/// JSON-friendly stand-in for [`Surface`]: texture blobs live as separate
/// zip members, named here rather than inlined.
#[derive(Debug, Serialize, Deserialize)]
struct SurfaceRecord {
    id: String,
    name: String,
    points: Vec<Point3>,
    triangles: Vec<Triangle>,
    visible: bool,
    gradient: String,
    transparency: f64,
    min_z_limit: Option<f64>,
    max_z_limit: Option<f64>,
    texture_meta: Option<SurfaceTextureMeta>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SurfaceTextureMeta {
    obj_text: String,
    mtl_text: String,
    material_name: String,
    texture_folder_key: String,
    texture_file_names: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ImageRecord {
    id: String,
    name: String,
    mime_type: String,
}

fn read_zip_text(archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>, name: &'static str) -> Result<Option<String>, KapError> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut contents = String::new();
            file.read_to_string(&mut contents)?;
            Ok(Some(contents))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn read_zip_bytes(archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>, name: &str) -> Option<Vec<u8>> {
    let mut file = archive.by_name(name).ok()?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).ok()?;
    Some(bytes)
}

/// Parse a KAP archive's bytes into a [`Project`]. Missing textures or a
/// missing `textureFileNames` list are recoverable (`AssetMissing`,
/// spec.md §7) and surface as warnings rather than failing the parse.
pub fn parse(archive_bytes: &[u8]) -> Result<ParseResult<Project>, KapError> {
    let cursor = std::io::Cursor::new(archive_bytes);
    let mut archive = zip::ZipArchive::new(cursor)?;

    let manifest_text = read_zip_text(&mut archive, "manifest.json")?.ok_or(KapError::MissingMember("manifest.json"))?;
    let manifest: Manifest = serde_json::from_str(&manifest_text)?;
    tracing::debug!(kap_version = %manifest.kap_version, schema_version = %manifest.schema_version, "parsing KAP archive");

    let mut result = ParseResult::new(Project::new());

    if let Some(text) = read_zip_text(&mut archive, "holes.json")? {
        result.payload.holes = serde_json::from_str(&text)?;
    }

    if let Some(text) = read_zip_text(&mut archive, "drawings.json")? {
        let pairs: Vec<(String, Drawing)> = serde_json::from_str(&text)?;
        let mut drawings = DrawingMap::new();
        for (_name, drawing) in pairs {
            drawings.insert_exact(drawing);
        }
        result.payload.drawings = drawings;
    }

    if let Some(text) = read_zip_text(&mut archive, "surfaces.json")? {
        let records: Vec<SurfaceRecord> = serde_json::from_str(&text)?;
        for record in records {
            let surface = resolve_surface_textures(&mut archive, record, &mut result.warnings);
            result.payload.surfaces.insert(surface.id.clone(), surface);
        }
    }

    if let Some(text) = read_zip_text(&mut archive, "images.json")? {
        let records: Vec<ImageRecord> = serde_json::from_str(&text)?;
        for record in records {
            let blob_name = format!("images/{}.blob", record.id);
            let Some(blob) = read_zip_bytes(&mut archive, &blob_name) else {
                result.push_warning(format!("KAP image blob missing: {blob_name}"));
                continue;
            };
            result.payload.images.insert(
                record.id.clone(),
                Image { id: record.id, name: record.name, mime_type: record.mime_type, blob },
            );
        }
    }

    if let Some(text) = read_zip_text(&mut archive, "products.json")? {
        result.payload.products = serde_json::from_str(&text)?;
    }
    if let Some(text) = read_zip_text(&mut archive, "charging.json")? {
        let raw: HashMap<String, serde_json::Value> = serde_json::from_str(&text)?;
        result.payload.charging = migrate_charging_keys(raw, &result.payload.holes);
    }
    if let Some(text) = read_zip_text(&mut archive, "configs.json")? {
        result.payload.configs = serde_json::from_str(&text)?;
    }
    if let Some(text) = read_zip_text(&mut archive, "layers.json")? {
        let layers: LayersRecord = serde_json::from_str(&text)?;
        result.payload.drawing_layers = layers.drawing_layers;
        result.payload.surface_layers = layers.surface_layers;
    }

    result.success_count = result.payload.holes.len() + result.payload.drawings.len() + result.payload.surfaces.len();
    Ok(result)
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LayersRecord {
    drawing_layers: Vec<String>,
    surface_layers: Vec<String>,
}

fn resolve_surface_textures(archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>, record: SurfaceRecord, warnings: &mut Vec<String>) -> Surface {
    let points = record.points;
    let mesh_bounds = crate::model::Aabb3::of(&points);
    let texture = record.texture_meta.map(|meta| {
        let mut textures = HashMap::new();
        for texture_name in &meta.texture_file_names {
            let path = format!("textures/{}/{}", meta.texture_folder_key, texture_name);
            match read_zip_bytes(archive, &path) {
                Some(bytes) => {
                    textures.insert(texture_name.clone(), bytes);
                }
                None => {
                    tracing::warn!(%path, "KAP texture missing");
                    warnings.push(format!("KAP texture missing: {path}"));
                }
            }
        }
        crate::model::TexturedSurface {
            obj_text: meta.obj_text,
            mtl_text: meta.mtl_text,
            material_name: meta.material_name,
            textures,
            texture_folder_key: meta.texture_folder_key,
        }
    });

    Surface {
        id: record.id,
        name: record.name,
        points,
        triangles: record.triangles,
        mesh_bounds,
        visible: record.visible,
        gradient: record.gradient,
        transparency: record.transparency,
        min_z_limit: record.min_z_limit,
        max_z_limit: record.max_z_limit,
        texture,
    }
}

/// A charging entry keyed by a plain `holeID` is migrated to the composite
/// `"<entityName>:::<holeID>"` key by cross-referencing the parsed hole list
/// (spec.md §4.6.8 merge rules); entries already composite, or with no
/// matching hole, pass through unchanged.
fn migrate_charging_keys(raw: HashMap<String, serde_json::Value>, holes: &[Hole]) -> HashMap<String, serde_json::Value> {
    raw.into_iter()
        .map(|(key, value)| {
            if key.contains(":::") {
                return (key, value);
            }
            match holes.iter().find(|h| h.hole_id == key) {
                Some(hole) => (Hole::compose_from_hole_id(&hole.entity_name, &hole.hole_id), value),
                None => (key, value),
            }
        })
        .collect()
}

/// Merge `parsed` into `target` per `mode` (spec.md §4.6.8). `Replace`
/// clears `target` first; `Merge` keeps `target`'s existing entries and
/// skips any incoming one whose key already exists. Returns the per-collection
/// added/skipped tallies (spec.md §8 S6).
pub fn merge_into(target: &mut Project, parsed: Project, mode: ImportMode) -> MergeSummary {
    tracing::debug!(?mode, hole_count = parsed.holes.len(), drawing_count = parsed.drawings.len(), "merging KAP project");
    if mode == ImportMode::Replace {
        *target = Project::new();
    }

    let mut summary = MergeSummary::default();

    let existing_hole_ids: std::collections::HashSet<String> = target.holes.iter().map(|h| h.hole_id.clone()).collect();
    for hole in parsed.holes {
        if existing_hole_ids.contains(&hole.hole_id) {
            summary.holes_skipped += 1;
        } else {
            target.holes.push(hole);
            summary.holes_added += 1;
        }
    }

    for (_name, drawing) in parsed.drawings.iter().map(|(n, d)| (n.to_string(), d.clone())).collect::<Vec<_>>() {
        if target.drawings.insert_exact(drawing) {
            summary.drawings_added += 1;
        } else {
            summary.drawings_skipped += 1;
        }
    }

    for (id, surface) in parsed.surfaces {
        if target.surfaces.contains_key(&id) {
            summary.surfaces_skipped += 1;
        } else {
            target.surfaces.insert(id, surface);
            summary.surfaces_added += 1;
        }
    }
    for (id, image) in parsed.images {
        if target.images.contains_key(&id) {
            summary.images_skipped += 1;
        } else {
            target.images.insert(id, image);
            summary.images_added += 1;
        }
    }
    for (key, value) in parsed.products {
        if target.products.contains_key(&key) {
            summary.products_skipped += 1;
        } else {
            target.products.insert(key, value);
            summary.products_added += 1;
        }
    }
    for (key, value) in migrate_charging_keys(parsed.charging, &target.holes) {
        if target.charging.contains_key(&key) {
            summary.charging_skipped += 1;
        } else {
            target.charging.insert(key, value);
            summary.charging_added += 1;
        }
    }
    for (key, value) in parsed.configs {
        if target.configs.contains_key(&key) {
            summary.configs_skipped += 1;
        } else {
            target.configs.insert(key, value);
            summary.configs_added += 1;
        }
    }
    for layer in parsed.drawing_layers {
        if !target.drawing_layers.contains(&layer) {
            target.drawing_layers.push(layer);
        }
    }
    for layer in parsed.surface_layers {
        if !target.surface_layers.contains(&layer) {
            target.surface_layers.push(layer);
        }
    }

    summary
}

/// `KirraProject_<YYYYMMDD_HHMMSS>.kap` (spec.md §4.7.3). The host supplies
/// the timestamp components; this crate does not read the wall clock
/// (spec.md §6 — I/O and environment access belong to the caller).
pub fn manifest_filename(timestamp: &str) -> String {
    format!("KirraProject_{timestamp}.kap")
}

/// Serialize `project` into a KAP archive's bytes.
pub fn write(project: &Project) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let cursor = std::io::Cursor::new(&mut buffer);
        let mut zip = zip::ZipWriter::new(cursor);

        let mut counts = HashMap::new();
        counts.insert("holes".to_string(), project.holes.len());
        counts.insert("drawings".to_string(), project.drawings.len());
        counts.insert("surfaces".to_string(), project.surfaces.len());
        counts.insert("images".to_string(), project.images.len());
        let manifest = Manifest { kap_version: "1".to_string(), schema_version: "1".to_string(), counts };
        write_json(&mut zip, "manifest.json", &manifest);

        write_json(&mut zip, "holes.json", &project.holes);

        let drawing_pairs: Vec<(&str, &Drawing)> = project.drawings.iter().collect();
        write_json(&mut zip, "drawings.json", &drawing_pairs);

        let mut surface_records = Vec::new();
        for surface in project.surfaces.values() {
            let texture_meta = surface.texture.as_ref().map(|t| {
                for (texture_name, bytes) in &t.textures {
                    let path = format!("textures/{}/{}", t.texture_folder_key, texture_name);
                    let options: FileOptions<()> = FileOptions::default();
                    zip.start_file(path, options).ok();
                    zip.write_all(bytes).ok();
                }
                SurfaceTextureMeta {
                    obj_text: t.obj_text.clone(),
                    mtl_text: t.mtl_text.clone(),
                    material_name: t.material_name.clone(),
                    texture_folder_key: t.texture_folder_key.clone(),
                    texture_file_names: t.textures.keys().cloned().collect(),
                }
            });
            surface_records.push(SurfaceRecord {
                id: surface.id.clone(),
                name: surface.name.clone(),
                points: surface.points.clone(),
                triangles: surface.triangles.clone(),
                visible: surface.visible,
                gradient: surface.gradient.clone(),
                transparency: surface.transparency,
                min_z_limit: surface.min_z_limit,
                max_z_limit: surface.max_z_limit,
                texture_meta,
            });
        }
        write_json(&mut zip, "surfaces.json", &surface_records);

        let image_records: Vec<ImageRecord> = project
            .images
            .values()
            .map(|img| ImageRecord { id: img.id.clone(), name: img.name.clone(), mime_type: img.mime_type.clone() })
            .collect();
        for image in project.images.values() {
            let path = format!("images/{}.blob", image.id);
            let options: FileOptions<()> = FileOptions::default();
            zip.start_file(path, options).ok();
            zip.write_all(&image.blob).ok();
        }
        write_json(&mut zip, "images.json", &image_records);

        write_json(&mut zip, "products.json", &project.products);
        write_json(&mut zip, "charging.json", &project.charging);
        write_json(&mut zip, "configs.json", &project.configs);
        write_json(
            &mut zip,
            "layers.json",
            &LayersRecord { drawing_layers: project.drawing_layers.clone(), surface_layers: project.surface_layers.clone() },
        );

        zip.finish().ok();
    }
    buffer
}

fn write_json<W: Write + std::io::Seek, T: Serialize>(zip: &mut zip::ZipWriter<W>, name: &str, value: &T) {
    let options: FileOptions<()> = FileOptions::default();
    if zip.start_file(name, options).is_ok() {
        if let Ok(text) = serde_json::to_string(value) {
            let _ = zip.write_all(text.as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DrawingCommon, Vertex};

    fn sample_project() -> Project {
        let mut project = Project::new();
        project.holes.push(Hole {
            hole_id: "H1".to_string(),
            entity_name: "Blast1".to_string(),
            collar: Point3::new(0.0, 0.0, 100.0),
            grade: Point3::new(0.0, 0.0, 91.0),
            toe: Point3::new(0.0, 0.0, 90.0),
            hole_length_calculated: 10.0,
            hole_angle: 0.0,
            hole_bearing: 0.0,
            subdrill_amount: 1.0,
            subdrill_length: 1.0,
            bench_height: 10.0,
            hole_diameter: 115.0,
            hole_type: "production".to_string(),
            from_hole_id: "Blast1:::H1".to_string(),
            timing_delay_milliseconds: 0.0,
            color_hex_decimal: "#777777".to_string(),
            measured_length: Default::default(),
            measured_mass: Default::default(),
            measured_comment: Default::default(),
            row_id: Some(1),
            pos_id: Some(1),
            burden: None,
            spacing: None,
            connector_curve: None,
        });
        project.drawings.insert_unique(Drawing::Point {
            common: DrawingCommon::new("P1"),
            vertex: Vertex::new(Point3::ZERO, 1),
        });
        project
    }

    #[test]
    fn write_then_parse_round_trips_holes_and_drawings() {
        let project = sample_project();
        let bytes = write(&project);
        let result = parse(&bytes).unwrap();
        assert_eq!(result.payload.holes.len(), 1);
        assert_eq!(result.payload.holes[0].hole_id, "H1");
        assert_eq!(result.payload.drawings.len(), 1);
    }

    #[test]
    fn merge_skips_existing_hole_id() {
        let mut target = sample_project();
        let mut incoming = Project::new();
        incoming.holes.push(target.holes[0].clone());
        incoming.holes[0].collar.x = 999.0;

        let summary = merge_into(&mut target, incoming, ImportMode::Merge);
        assert_eq!(target.holes.len(), 1);
        assert_eq!(target.holes[0].collar.x, 0.0);
        assert_eq!(summary.holes_added, 0);
        assert_eq!(summary.holes_skipped, 1);
    }

    /// S6 — start `{A}`, merge in `{A, B}` -> final `{A, B}`, summary
    /// `added=1, skipped=1`.
    #[test]
    fn merge_summary_reports_added_and_skipped() {
        let mut target = sample_project();
        let mut incoming = Project::new();
        incoming.holes.push(target.holes[0].clone());
        let mut new_hole = target.holes[0].clone();
        new_hole.hole_id = "H2".to_string();
        new_hole.from_hole_id = Hole::compose_from_hole_id(&new_hole.entity_name, &new_hole.hole_id);
        incoming.holes.push(new_hole);

        let summary = merge_into(&mut target, incoming, ImportMode::Merge);
        assert_eq!(target.holes.len(), 2);
        assert_eq!(summary.holes_added, 1);
        assert_eq!(summary.holes_skipped, 1);
    }

    #[test]
    fn replace_clears_target_first() {
        let mut target = sample_project();
        let incoming = Project::new();
        merge_into(&mut target, incoming, ImportMode::Replace);
        assert!(target.holes.is_empty());
        assert!(target.drawings.is_empty());
    }

    #[test]
    fn charging_key_migrates_to_composite_form() {
        let holes = vec![sample_project().holes.remove(0)];
        let mut raw = HashMap::new();
        raw.insert("H1".to_string(), serde_json::json!({"mass": 50.0}));
        let migrated = migrate_charging_keys(raw, &holes);
        assert!(migrated.contains_key("Blast1:::H1"));
    }

    #[test]
    fn missing_texture_is_a_warning_not_a_fatal_error() {
        let mut project = sample_project();
        project.surfaces.insert(
            "S1".to_string(),
            Surface {
                id: "S1".to_string(),
                name: "S1".to_string(),
                points: vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
                triangles: vec![Triangle::new(0, 1, 2, &[Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)])],
                mesh_bounds: crate::model::Aabb3::of(&[Point3::new(0.0, 0.0, 0.0)]),
                visible: true,
                gradient: "hillshade".to_string(),
                transparency: 1.0,
                min_z_limit: None,
                max_z_limit: None,
                texture: Some(crate::model::TexturedSurface {
                    obj_text: String::new(),
                    mtl_text: String::new(),
                    material_name: "mat".to_string(),
                    textures: HashMap::from([("missing.png".to_string(), vec![1, 2, 3])]),
                    texture_folder_key: "folder".to_string(),
                }),
            },
        );

        let bytes = write(&project);

        // Corrupt the archive by rebuilding it without the texture member,
        // simulating a texture that went missing after the manifest was written.
        let cursor = std::io::Cursor::new(bytes.as_slice());
        let mut archive = zip::ZipArchive::new(cursor).unwrap();
        let mut rebuilt = Vec::new();
        {
            let out_cursor = std::io::Cursor::new(&mut rebuilt);
            let mut writer = zip::ZipWriter::new(out_cursor);
            for i in 0..archive.len() {
                let mut file = archive.by_index(i).unwrap();
                if file.name().starts_with("textures/") {
                    continue;
                }
                let mut contents = Vec::new();
                file.read_to_end(&mut contents).unwrap();
                let options: FileOptions<()> = FileOptions::default();
                writer.start_file(file.name().to_string(), options).unwrap();
                writer.write_all(&contents).unwrap();
            }
            writer.finish().unwrap();
        }

        let result = parse(&rebuilt).unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("texture"));
    }
}
