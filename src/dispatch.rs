//! Format classification and parser/writer dispatch (spec.md §4.8
//! `FormatDispatcher`).
//!
//! A single entry point classifies an input (by extension, with two content
//! -sniffing overrides for `.dxf`) and routes it to the matching parser;
//! `write` dispatches analogously by an explicit [`FormatId`]. The registry
//! is a static table built once and read-only thereafter (spec.md §5:
//! "the engine itself holds no shared mutable state aside from the
//! `FormatDispatcher` registry").

use crate::csv_holes::custom::CustomCsvOptions;
use crate::dxf::binary::BinaryDxfWriteOptions;
use crate::dxf::entities::DxfBuildOptions;
use crate::dxf::group_code;
use crate::entity_namer::EntityNamerStrategy;
use crate::error::GeoIoError;
use crate::model::{Drawing, DrawingMap, Hole, Point3, Project, Surface};
use crate::ParseResult;

/// Every format family this crate understands, identified the way spec.md
/// §4.8/§6 names them (`sniff` returns `"dxf"`/`"dxf-binary"`, `.csv`
/// defaults to `"blasthole-csv"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatId {
    DxfAscii,
    DxfBinary,
    Kad,
    Kap,
    Spf,
    SurpacPair,
    BlastHoleCsvFixed,
    BlastHoleCsvCustom,
}

impl FormatId {
    pub fn as_str(self) -> &'static str {
        match self {
            FormatId::DxfAscii => "dxf",
            FormatId::DxfBinary => "dxf-binary",
            FormatId::Kad => "kad",
            FormatId::Kap => "kap",
            FormatId::Spf => "spf",
            FormatId::SurpacPair => "surpac",
            FormatId::BlastHoleCsvFixed => "blasthole-csv",
            FormatId::BlastHoleCsvCustom => "blasthole-csv-custom",
        }
    }
}

impl std::fmt::Display for FormatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry metadata for one format family (spec.md §4.8: "`(formatId,
/// ParserFactory, WriterFactory, metadata{extensions, description,
/// category})`"). `ParserFactory`/`WriterFactory` are just the free
/// functions in each format's module, dispatched in [`parse_as`]/[`write`]
/// below rather than stored as trait objects — the registry itself only
/// needs to carry the describable metadata.
pub struct FormatMetadata {
    pub id: FormatId,
    pub extensions: &'static [&'static str],
    pub description: &'static str,
    pub category: &'static str,
}

const REGISTRY: &[FormatMetadata] = &[
    FormatMetadata { id: FormatId::Kad, extensions: &["kad", "txt"], description: "Kirra native drawing format", category: "drawing" },
    FormatMetadata { id: FormatId::DxfAscii, extensions: &["dxf"], description: "AutoCAD DXF (ASCII)", category: "drawing" },
    FormatMetadata { id: FormatId::DxfBinary, extensions: &["dxf"], description: "AutoCAD DXF (Binary)", category: "drawing" },
    FormatMetadata { id: FormatId::Kap, extensions: &["kap"], description: "Kirra project archive", category: "project" },
    FormatMetadata { id: FormatId::Spf, extensions: &["spf"], description: "Orica ShotPlus blast-design archive", category: "blast-design" },
    FormatMetadata { id: FormatId::SurpacPair, extensions: &["str", "dtm"], description: "Surpac triangulated surface (STR+DTM pair)", category: "surface" },
    FormatMetadata { id: FormatId::BlastHoleCsvFixed, extensions: &["csv"], description: "Blast-hole CSV (fixed schema)", category: "blast-holes" },
    FormatMetadata { id: FormatId::BlastHoleCsvCustom, extensions: &["csv"], description: "Blast-hole CSV (custom column mapping)", category: "blast-holes" },
];

/// Look up a format's registry entry.
pub fn metadata(id: FormatId) -> Option<&'static FormatMetadata> {
    REGISTRY.iter().find(|m| m.id == id)
}

/// A file-dialog-style filter string, e.g. `"Kirra native drawing format
/// (*.kad;*.txt)|*.kad;*.txt"`. Building the string is this component's
/// job per spec.md §2; what a caller's dialog does with it is out of scope
/// (spec.md §1 non-goals).
pub fn filter_string(id: FormatId) -> Option<String> {
    let meta = metadata(id)?;
    let patterns: Vec<String> = meta.extensions.iter().map(|e| format!("*.{e}")).collect();
    Some(format!("{} ({})|{}", meta.description, patterns.join(";"), patterns.join(";")))
}

/// All registered formats' filter strings, joined the way a combo-box
/// "all supported files" entry would be (`|`-separated, Windows
/// common-dialog convention).
pub fn all_filters() -> String {
    REGISTRY.iter().filter_map(|m| filter_string(m.id)).collect::<Vec<_>>().join("|")
}

fn extension_of(filename: &str) -> Option<String> {
    filename.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
}

/// Strip directory and extension, e.g. `"Bench3/MyBlast.spf"` -> `"MyBlast"`
/// (spec.md §4.6.7: "Blast name = input filename stem").
pub fn stem_of(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match base.rsplit_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => base.to_string(),
    }
}

/// True if `bytes` begins with the binary-DXF sentinel.
pub fn is_binary_dxf(bytes: &[u8]) -> bool {
    bytes.len() >= group_code::SENTINEL.len() && &bytes[..group_code::SENTINEL.len()] == group_code::SENTINEL
}

/// True if `bytes` is ASCII-DXF-shaped content: a `0` line followed by a
/// `SECTION` line (spec.md S5).
fn looks_like_ascii_dxf(bytes: &[u8]) -> bool {
    let text = decode_text(bytes);
    let mut lines = text.lines();
    matches!((lines.next().map(str::trim), lines.next().map(str::trim)), (Some("0"), Some("SECTION")))
}

/// Classify `bytes` purely by content, ignoring `filename` — the fallback
/// path used when the extension is unrecognized, and the basis for the
/// `.dxf` binary-vs-ASCII override.
fn sniff_by_content(bytes: &[u8]) -> Option<FormatId> {
    if is_binary_dxf(bytes) {
        Some(FormatId::DxfBinary)
    } else if looks_like_ascii_dxf(bytes) {
        Some(FormatId::DxfAscii)
    } else {
        None
    }
}

/// Classify an input by extension, with explicit content-sniff overrides for
/// `.dxf` (binary vs ASCII) per spec.md §4.8. `.csv` defaults to
/// `blasthole-csv`; `.txt` defaults to `kad`. Ambiguous/unknown extensions
/// fall back to a content-only sniff.
pub fn sniff(filename: &str, bytes: &[u8]) -> Option<FormatId> {
    match extension_of(filename).as_deref() {
        Some("dxf") => Some(if is_binary_dxf(bytes) { FormatId::DxfBinary } else { FormatId::DxfAscii }),
        Some("kad") | Some("txt") => Some(FormatId::Kad),
        Some("kap") => Some(FormatId::Kap),
        Some("spf") => Some(FormatId::Spf),
        Some("str") | Some("dtm") => Some(FormatId::SurpacPair),
        Some("csv") => Some(FormatId::BlastHoleCsvFixed),
        _ => sniff_by_content(bytes),
    }
}

/// ISO-8859-1-or-UTF-8 decode (spec.md §6: ASCII DXF text is "ISO-8859-1 or
/// UTF-8"). Valid UTF-8 is taken as-is; otherwise each byte is treated as its
/// own Latin-1 codepoint, which is a direct byte<->codepoint mapping and
/// therefore never fails.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Per-parse options (spec.md §9: a plain `Options` struct, not a kwargs
/// map). Construct with [`Default`] and the `with_*` builder setters.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub naming_strategy: EntityNamerStrategy,
    pub vertex_tolerance: f64,
    pub format_hint: Option<FormatId>,
    /// Original filename, used for extension sniffing when `format_hint` is
    /// absent and to derive the SPF blast name / Surpac base name.
    pub filename: Option<String>,
    /// The paired `.dtm` (or `.str`) file's text, required for `SurpacPair`.
    pub companion_text: Option<String>,
    /// Column mapping, required for `BlastHoleCsvCustom`.
    pub custom_csv: Option<CustomCsvOptions>,
    /// Subtracted from every parsed coordinate before the spatial hash and
    /// before the payload is handed back (spec.md §4.2: "callers translate
    /// by a centroid before interning", needed for UTM-scale inputs).
    pub centroid: Option<Point3>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            naming_strategy: EntityNamerStrategy::default(),
            vertex_tolerance: crate::spatial_hash::DEFAULT_TOLERANCE,
            format_hint: None,
            filename: None,
            companion_text: None,
            custom_csv: None,
            centroid: None,
        }
    }
}

impl ParseOptions {
    pub fn with_naming_strategy(mut self, strategy: EntityNamerStrategy) -> Self {
        self.naming_strategy = strategy;
        self
    }

    pub fn with_format_hint(mut self, format: FormatId) -> Self {
        self.format_hint = Some(format);
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_companion_text(mut self, text: impl Into<String>) -> Self {
        self.companion_text = Some(text.into());
        self
    }

    pub fn with_custom_csv(mut self, options: CustomCsvOptions) -> Self {
        self.custom_csv = Some(options);
        self
    }

    pub fn with_centroid(mut self, centroid: Point3) -> Self {
        self.centroid = Some(centroid);
        self
    }
}

/// The decoded shape a parse call hands back; which variant depends on the
/// format family (spec.md §9: "Polymorphic entity containers" modeled as a
/// tagged variant — the same treatment applies one level up, to the
/// dispatcher's own heterogeneous payload).
#[derive(Debug)]
pub enum ParsedPayload {
    Drawings(DrawingMap),
    DxfBundle { drawings: DrawingMap, surfaces: Vec<Surface> },
    Holes(Vec<Hole>),
    Surfaces(Vec<Surface>),
    Project(Project),
}

/// Classify `bytes` (by `filename`/`opts.format_hint`) and parse it.
pub fn parse(filename: &str, bytes: &[u8], opts: &ParseOptions) -> crate::Result<ParseResult<ParsedPayload>> {
    let format = opts.format_hint.or_else(|| sniff(filename, bytes)).ok_or(GeoIoError::UnknownFormat)?;
    parse_as(format, filename, bytes, opts)
}

/// Parse `bytes` as an explicit `format`, bypassing sniffing.
pub fn parse_as(format: FormatId, filename: &str, bytes: &[u8], opts: &ParseOptions) -> crate::Result<ParseResult<ParsedPayload>> {
    let mut result = match format {
        FormatId::Kad => {
            let text = decode_text(bytes);
            let parsed = crate::kad::parse(&text);
            wrap(parsed, ParsedPayload::Drawings)
        }
        FormatId::DxfAscii => {
            let text = decode_text(bytes);
            let build_opts = DxfBuildOptions { naming_strategy: opts.naming_strategy, vertex_tolerance: opts.vertex_tolerance };
            dxf_bundle(crate::dxf::ascii::parse(&text, &build_opts)?)
        }
        FormatId::DxfBinary => {
            let build_opts = DxfBuildOptions { naming_strategy: opts.naming_strategy, vertex_tolerance: opts.vertex_tolerance };
            dxf_bundle(crate::dxf::binary::parse(bytes, &build_opts)?)
        }
        FormatId::Kap => wrap(crate::kap::parse(bytes)?, ParsedPayload::Project),
        FormatId::Spf => {
            let blast_name = stem_of(opts.filename.as_deref().unwrap_or(filename));
            wrap(crate::spf::parse(&blast_name, bytes)?, ParsedPayload::Holes)
        }
        FormatId::SurpacPair => {
            let str_text = decode_text(bytes);
            let dtm_text = opts.companion_text.as_deref().ok_or_else(|| GeoIoError::SchemaMismatch("Surpac STR+DTM pair requires a companion file (opts.companion_text)".to_string()))?;
            let base_name = stem_of(opts.filename.as_deref().unwrap_or(filename));
            wrap(crate::surpac::parse_pair(&base_name, &str_text, dtm_text)?, ParsedPayload::Surfaces)
        }
        FormatId::BlastHoleCsvFixed => {
            let text = decode_text(bytes);
            wrap(crate::csv_holes::fixed::parse(&text)?, ParsedPayload::Holes)
        }
        FormatId::BlastHoleCsvCustom => {
            let text = decode_text(bytes);
            let custom_opts = opts.custom_csv.as_ref().ok_or_else(|| GeoIoError::SchemaMismatch("custom CSV format requires opts.custom_csv".to_string()))?;
            wrap(crate::csv_holes::custom::parse(&text, custom_opts), ParsedPayload::Holes)
        }
    };

    if let Some(centroid) = opts.centroid {
        translate_payload(&mut result.payload, centroid);
    }
    Ok(result)
}

fn wrap<T>(result: ParseResult<T>, into: impl FnOnce(T) -> ParsedPayload) -> ParseResult<ParsedPayload> {
    ParseResult { payload: into(result.payload), success_count: result.success_count, error_count: result.error_count, warnings: result.warnings }
}

fn dxf_bundle(out: crate::dxf::DxfBuildOutput) -> ParseResult<ParsedPayload> {
    let success_count = out.drawings.len() + out.surfaces.len();
    let error_count = out.warnings.len();
    ParseResult {
        payload: ParsedPayload::DxfBundle { drawings: out.drawings, surfaces: out.surfaces },
        success_count,
        error_count,
        warnings: out.warnings,
    }
}

fn translate_payload(payload: &mut ParsedPayload, centroid: Point3) {
    match payload {
        ParsedPayload::Drawings(map) => map.for_each_mut(|d| translate_drawing(d, centroid)),
        ParsedPayload::DxfBundle { drawings, surfaces } => {
            drawings.for_each_mut(|d| translate_drawing(d, centroid));
            translate_surfaces(surfaces, centroid);
        }
        ParsedPayload::Surfaces(surfaces) => translate_surfaces(surfaces, centroid),
        ParsedPayload::Holes(_) | ParsedPayload::Project(_) => {}
    }
}

fn sub(p: Point3, c: Point3) -> Point3 {
    Point3::new(p.x - c.x, p.y - c.y, p.z - c.z)
}

fn translate_drawing(drawing: &mut Drawing, centroid: Point3) {
    match drawing {
        Drawing::Point { vertex, .. } => vertex.position = sub(vertex.position, centroid),
        Drawing::Line { vertices, .. } | Drawing::Polygon { vertices, .. } => {
            for v in vertices.iter_mut() {
                v.position = sub(v.position, centroid);
            }
        }
        Drawing::Circle { center, .. } => *center = sub(*center, centroid),
        Drawing::Text { anchor, .. } => *anchor = sub(*anchor, centroid),
    }
}

fn translate_surfaces(surfaces: &mut [Surface], centroid: Point3) {
    for surface in surfaces.iter_mut() {
        for p in surface.points.iter_mut() {
            *p = sub(*p, centroid);
        }
        if !surface.points.is_empty() {
            surface.mesh_bounds = crate::model::Aabb3::of(&surface.points);
        }
    }
}

/// Per-write options (spec.md §4.7.1: LWPOLYLINE-vs-POLYLINE and Vulcan
/// extended-data toggles).
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    pub use_lwpolyline: bool,
    pub include_vulcan: bool,
}

/// What a writer consumes. Mirrors [`ParsedPayload`] minus `Kap`/`Project`'s
/// read side, plus a Vulcan-hole-mode request that has no parser
/// counterpart (spec.md §4.7.1 "Hole emission (Vulcan mode)").
#[derive(Clone, Copy)]
pub enum WriteRequest<'a> {
    Drawings(&'a DrawingMap),
    DxfBundle { drawings: &'a DrawingMap, surfaces: &'a [Surface] },
    HolesVulcan(&'a [Hole]),
    HolesCsv(&'a [Hole]),
    Project(&'a Project),
}

/// Encode `request` as `format`. Fails with `SchemaMismatch` if the request
/// shape and format are not a known pairing (e.g. asking the KAP writer for
/// a bare `Drawings` request).
pub fn write(format: FormatId, request: WriteRequest, opts: &WriteOptions) -> crate::Result<Vec<u8>> {
    match (format, request) {
        (FormatId::Kad, WriteRequest::Drawings(drawings)) => Ok(crate::kad::write(drawings).into_bytes()),
        (FormatId::DxfAscii, WriteRequest::Drawings(drawings)) => Ok(crate::dxf::ascii::write(drawings, &[]).into_bytes()),
        (FormatId::DxfAscii, WriteRequest::DxfBundle { drawings, surfaces }) => Ok(crate::dxf::ascii::write(drawings, surfaces).into_bytes()),
        (FormatId::DxfBinary, WriteRequest::Drawings(drawings)) => {
            let bin_opts = binary_write_options(opts);
            Ok(crate::dxf::binary::write(drawings, &[], &bin_opts))
        }
        (FormatId::DxfBinary, WriteRequest::DxfBundle { drawings, surfaces }) => {
            let bin_opts = binary_write_options(opts);
            Ok(crate::dxf::binary::write(drawings, surfaces, &bin_opts))
        }
        (FormatId::DxfBinary, WriteRequest::HolesVulcan(holes)) => Ok(crate::dxf::binary::write_holes_vulcan(holes)),
        (FormatId::Kap, WriteRequest::Project(project)) => Ok(crate::kap::write(project)),
        (FormatId::BlastHoleCsvFixed, WriteRequest::HolesCsv(holes)) => Ok(crate::csv_holes::fixed::write(holes).into_bytes()),
        (other, _) => Err(GeoIoError::SchemaMismatch(format!("writer {other} does not accept the given request shape"))),
    }
}

fn binary_write_options(opts: &WriteOptions) -> BinaryDxfWriteOptions {
    BinaryDxfWriteOptions { naming_strategy: EntityNamerStrategy::default(), use_lwpolyline: opts.use_lwpolyline, include_vulcan: opts.include_vulcan }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S5 — binary vs ASCII sniff.
    #[test]
    fn sniff_dxf_extension_checks_sentinel() {
        let binary = group_code::encode_with_sentinel(&[]);
        assert_eq!(sniff("design.dxf", &binary), Some(FormatId::DxfBinary));

        let ascii = b"0\nSECTION\n2\nENTITIES\n0\nENDSEC\n0\nEOF\n";
        assert_eq!(sniff("design.dxf", ascii), Some(FormatId::DxfAscii));
    }

    #[test]
    fn sniff_by_extension_covers_every_registered_family() {
        assert_eq!(sniff("a.kad", b""), Some(FormatId::Kad));
        assert_eq!(sniff("a.txt", b""), Some(FormatId::Kad));
        assert_eq!(sniff("a.kap", b""), Some(FormatId::Kap));
        assert_eq!(sniff("a.spf", b""), Some(FormatId::Spf));
        assert_eq!(sniff("a.str", b""), Some(FormatId::SurpacPair));
        assert_eq!(sniff("a.dtm", b""), Some(FormatId::SurpacPair));
        assert_eq!(sniff("a.csv", b""), Some(FormatId::BlastHoleCsvFixed));
    }

    #[test]
    fn sniff_falls_back_to_content_for_unknown_extension() {
        let ascii = b"0\nSECTION\n0\nEOF\n";
        assert_eq!(sniff("mystery.bin", ascii), Some(FormatId::DxfAscii));
        assert_eq!(sniff("mystery.bin", b"garbage"), None);
    }

    #[test]
    fn unknown_format_is_a_fatal_error() {
        let opts = ParseOptions::default();
        let err = parse("mystery.bin", b"garbage", &opts).unwrap_err();
        assert!(matches!(err, GeoIoError::UnknownFormat));
    }

    #[test]
    fn stem_of_strips_directory_and_extension() {
        assert_eq!(stem_of("Bench3/MyBlast.spf"), "MyBlast");
        assert_eq!(stem_of("MyBlast.spf"), "MyBlast");
        assert_eq!(stem_of("noext"), "noext");
    }

    #[test]
    fn filter_string_joins_extensions() {
        let filter = filter_string(FormatId::Kad).unwrap();
        assert_eq!(filter, "Kirra native drawing format (*.kad;*.txt)|*.kad;*.txt");
        assert!(all_filters().contains("Kirra project archive"));
    }

    #[test]
    fn kad_round_trips_through_dispatch() {
        let text = "L1,line,1,0,0,0,1,#FF0000\nL1,line,2,1,1,0,1,#FF0000\n";
        let opts = ParseOptions::default();
        let parsed = parse("drawing.kad", text.as_bytes(), &opts).unwrap();
        let ParsedPayload::Drawings(drawings) = parsed.payload else { panic!("expected Drawings") };
        assert_eq!(drawings.len(), 1);

        let bytes = write(FormatId::Kad, WriteRequest::Drawings(&drawings), &WriteOptions::default()).unwrap();
        let reparsed = parse("drawing.kad", &bytes, &ParseOptions::default()).unwrap();
        let ParsedPayload::Drawings(reparsed_drawings) = reparsed.payload else { panic!("expected Drawings") };
        assert_eq!(reparsed_drawings.len(), 1);
    }

    #[test]
    fn centroid_translation_shifts_parsed_coordinates() {
        let text = "P1,point,1,500000,7000000,100,1,#FF0000\n";
        let opts = ParseOptions::default().with_centroid(Point3::new(500000.0, 7000000.0, 0.0));
        let parsed = parse("drawing.kad", text.as_bytes(), &opts).unwrap();
        let ParsedPayload::Drawings(drawings) = parsed.payload else { panic!("expected Drawings") };
        let (_, drawing) = drawings.iter().next().unwrap();
        match drawing {
            Drawing::Point { vertex, .. } => {
                assert!((vertex.position.x).abs() < 1e-9);
                assert!((vertex.position.y).abs() < 1e-9);
                assert!((vertex.position.z - 100.0).abs() < 1e-9);
            }
            other => panic!("expected Point, got {other:?}"),
        }
    }

    #[test]
    fn writer_rejects_mismatched_request_shape() {
        let project = Project::new();
        let err = write(FormatId::Kad, WriteRequest::Project(&project), &WriteOptions::default()).unwrap_err();
        assert!(matches!(err, GeoIoError::SchemaMismatch(_)));
    }
}
