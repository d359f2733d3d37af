//! External collaborator contracts (spec.md §6, §9).
//!
//! `FileReader`, `ZipContainer`, `XmlParser` and `CsvTokenizer` are the host
//! application's responsibility in the original design; this crate takes
//! already-read bytes/text and uses concrete crates (`zip`, `roxmltree`,
//! `csv`) internally rather than re-abstracting them (see SPEC_FULL.md §6).
//! `ProgressReporter`, `PersistenceGuard` and `DataStores` *are* modeled as
//! traits/structs, since a parser genuinely calls back into them.

use std::collections::HashMap;

use crate::model::{Drawing, DrawingMap, Hole, Image, Surface};

/// Optional progress UX hook. Absent (`None`) means "run silently"
/// (spec.md §6).
pub trait ProgressReporter {
    fn open(&mut self, title: &str);
    fn update(&mut self, percent: f32, message: &str);
    fn close(&mut self);
}

/// No-op implementation for headless use (spec.md §9).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressReporter for NullProgress {
    fn open(&mut self, _title: &str) {}
    fn update(&mut self, _percent: f32, _message: &str) {}
    fn close(&mut self) {}
}

/// Brackets an import so the caller's debounced autosave is suspended
/// (spec.md §5, §9's `_isImporting` flag).
pub trait PersistenceGuard {
    fn begin_import(&mut self);
    fn end_import(&mut self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullGuard;

impl PersistenceGuard for NullGuard {
    fn begin_import(&mut self) {}
    fn end_import(&mut self) {}
}

/// RAII bracket around a `PersistenceGuard`, since Rust has no `try/finally`:
/// `end_import` always fires on drop, even if the import body returns early
/// via `?` (spec.md §9 open question on `_kapImporting` fragility).
pub struct ImportScope<'a> {
    guard: &'a mut dyn PersistenceGuard,
}

impl<'a> ImportScope<'a> {
    pub fn enter(guard: &'a mut dyn PersistenceGuard) -> Self {
        guard.begin_import();
        ImportScope { guard }
    }
}

impl Drop for ImportScope<'_> {
    fn drop(&mut self) {
        self.guard.end_import();
    }
}

/// The caller-owned data stores a parser may replace or merge into
/// (spec.md §6 `DataStores`, §9 "explicit `DataStores` handle").
#[derive(Debug, Default)]
pub struct DataStores {
    pub holes: Vec<Hole>,
    pub drawings: DrawingMap,
    pub surfaces: HashMap<String, Surface>,
    pub images: HashMap<String, Image>,
    pub layers: Vec<String>,
}

impl DataStores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.holes.clear();
        self.drawings = DrawingMap::new();
        self.surfaces.clear();
        self.images.clear();
        self.layers.clear();
    }

    /// Insert `drawing` with automatic name-collision suffixing.
    pub fn add_drawing(&mut self, drawing: Drawing) -> String {
        self.drawings.insert_unique(drawing)
    }
}
