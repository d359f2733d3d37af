//! Cross-module round-trip tests against the public `dispatch` API, the way
//! a host application would actually call this crate (spec.md §8: "tests
//! should exercise the public surface, not just per-format internals").

use kirra_geo_io::dispatch::{self, FormatId, ParseOptions, ParsedPayload, WriteOptions, WriteRequest};
use kirra_geo_io::model::Project;

#[test]
fn kad_drawing_survives_a_parse_write_parse_cycle() {
    let text = "Bench1,line,1,0,0,10\nBench1,line,2,5,0,10\nBench1,line,3,5,5,10\n";
    let opts = ParseOptions::default();

    let first = dispatch::parse("pit.kad", text.as_bytes(), &opts).unwrap();
    let ParsedPayload::Drawings(drawings) = first.payload else { panic!("expected Drawings") };
    assert_eq!(drawings.len(), 1);

    let bytes = dispatch::write(FormatId::Kad, WriteRequest::Drawings(&drawings), &WriteOptions::default()).unwrap();
    let second = dispatch::parse("pit.kad", &bytes, &opts).unwrap();
    let ParsedPayload::Drawings(reparsed) = second.payload else { panic!("expected Drawings") };
    assert_eq!(reparsed.len(), 1);
    assert_eq!(reparsed.get("Bench1").unwrap(), drawings.get("Bench1").unwrap());
}

#[test]
fn kad_line_converts_to_ascii_dxf_and_back() {
    let text = "Toe1,line,1,100,200,5\nToe1,line,2,110,200,5\n";
    let opts = ParseOptions::default();

    let parsed = dispatch::parse("toe.kad", text.as_bytes(), &opts).unwrap();
    let ParsedPayload::Drawings(drawings) = parsed.payload else { panic!("expected Drawings") };

    let dxf_bytes = dispatch::write(FormatId::DxfAscii, WriteRequest::Drawings(&drawings), &WriteOptions::default()).unwrap();
    let reparsed = dispatch::parse("toe.dxf", &dxf_bytes, &opts).unwrap();
    let ParsedPayload::DxfBundle { drawings: dxf_drawings, .. } = reparsed.payload else { panic!("expected DxfBundle") };
    assert_eq!(dxf_drawings.len(), 1);
}

#[test]
fn ascii_dxf_round_trips_through_binary_dxf() {
    let ascii_text = "0\nSECTION\n2\nENTITIES\n0\nLINE\n5\nA1\n8\nBench2\n10\n0.0\n20\n0.0\n30\n0.0\n11\n1.0\n21\n1.0\n31\n0.0\n0\nENDSEC\n0\nEOF\n";
    let opts = ParseOptions::default();

    let parsed = dispatch::parse("design.dxf", ascii_text.as_bytes(), &opts).unwrap();
    let ParsedPayload::DxfBundle { drawings, surfaces } = parsed.payload else { panic!("expected DxfBundle") };
    assert_eq!(drawings.len(), 1);

    let binary_bytes = dispatch::write(
        FormatId::DxfBinary,
        WriteRequest::DxfBundle { drawings: &drawings, surfaces: &surfaces },
        &WriteOptions::default(),
    )
    .unwrap();

    let reparsed = dispatch::parse("design.dxf", &binary_bytes, &opts).unwrap();
    let ParsedPayload::DxfBundle { drawings: reparsed_drawings, .. } = reparsed.payload else { panic!("expected DxfBundle") };
    assert_eq!(reparsed_drawings.len(), 1);
}

#[test]
fn kap_project_survives_a_write_parse_cycle() {
    let mut project = Project::new();
    let kad_text = "Collar1,point,1,0,0,0\n";
    let parsed = dispatch::parse("drawing.kad", kad_text.as_bytes(), &ParseOptions::default()).unwrap();
    let ParsedPayload::Drawings(drawings) = parsed.payload else { panic!("expected Drawings") };
    project.drawings = drawings;

    let bytes = dispatch::write(FormatId::Kap, WriteRequest::Project(&project), &WriteOptions::default()).unwrap();
    let reparsed = dispatch::parse("project.kap", &bytes, &ParseOptions::default()).unwrap();
    let ParsedPayload::Project(reparsed_project) = reparsed.payload else { panic!("expected Project") };
    assert_eq!(reparsed_project.drawings.len(), 1);
    assert!(reparsed_project.drawings.contains("Collar1"));
}

#[test]
fn fixed_csv_holes_survive_a_write_parse_cycle() {
    // 9-column fixed schema: entityName,holeID,startX,startY,startZ,endX,endY,endZ,holeDiameter
    let csv_text = "H1,H1,0,0,0,0,0,-10,89\n";
    let parsed = dispatch::parse_as(FormatId::BlastHoleCsvFixed, "holes.csv", csv_text.as_bytes(), &ParseOptions::default()).unwrap();
    let ParsedPayload::Holes(holes) = parsed.payload else { panic!("expected Holes") };
    assert_eq!(holes.len(), 1);

    let bytes = dispatch::write(FormatId::BlastHoleCsvFixed, WriteRequest::HolesCsv(&holes), &WriteOptions::default()).unwrap();
    let reparsed = dispatch::parse_as(FormatId::BlastHoleCsvFixed, "holes.csv", &bytes, &ParseOptions::default()).unwrap();
    let ParsedPayload::Holes(reparsed_holes) = reparsed.payload else { panic!("expected Holes") };
    assert_eq!(reparsed_holes.len(), 1);
    assert_eq!(reparsed_holes[0].hole_id, "H1");
}
