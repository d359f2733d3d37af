//! Native line-oriented drawing format (spec.md §4.6.3 parser / §4.7.3
//! writer, "KAD").
//!
//! LF-terminated CSV rows, no header. One row carries one vertex:
//! `entityName,entityType,pointID,x,y,z,<type-specific tail>`. Rows for the
//! same `entityName` accumulate into a single `Drawing`, in file order.

use crate::model::{Drawing, DrawingCommon, DrawingMap, Point3, Vertex};
use crate::ParseResult;

const DEFAULT_COLOR: &str = "#777777";

struct Accumulator {
    entity_type: String,
    vertices: Vec<Vertex>,
    radius: f64,
    text: String,
    font_height: f64,
    circle_color: String,
    circle_line_width: f64,
}

/// Parse a complete KAD text body into a [`DrawingMap`].
///
/// Rows with fewer than 3 columns, an unknown `entityType`, or
/// non-parseable numeric fields are skipped and counted as errors
/// (spec.md §4.6.3); everything else contributes to `success_count`.
pub fn parse(text: &str) -> ParseResult<DrawingMap> {
    let mut order: Vec<String> = Vec::new();
    let mut accumulators: std::collections::HashMap<String, Accumulator> = std::collections::HashMap::new();
    let mut result = ParseResult::new(DrawingMap::new());

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let cols: Vec<&str> = line.split(',').collect();
        if cols.len() < 3 {
            result.push_warning(format!("KAD row has fewer than 3 columns: {line:?}"));
            continue;
        }
        let entity_name = cols[0].trim().to_string();
        let entity_type = cols[1].trim().to_lowercase();

        if !matches!(entity_type.as_str(), "point" | "line" | "poly" | "circle" | "text") {
            result.push_warning(format!("KAD row has unknown entityType {entity_type:?}: {line:?}"));
            continue;
        }
        if cols.len() < 6 {
            result.push_warning(format!("KAD row missing x/y/z columns: {line:?}"));
            continue;
        }
        let (Ok(x), Ok(y), Ok(z)) = (cols[3].trim().parse::<f64>(), cols[4].trim().parse::<f64>(), cols[5].trim().parse::<f64>()) else {
            result.push_warning(format!("KAD row has non-numeric coordinates: {line:?}"));
            continue;
        };
        let point = Point3::new(x, y, z);

        let parsed = match entity_type.as_str() {
            "point" | "line" => parse_point_or_line_tail(&cols),
            "poly" => parse_poly_tail(&cols),
            "circle" => parse_circle_tail(&cols),
            "text" => parse_text_tail(&cols),
            _ => unreachable!(),
        };
        let Some(tail) = parsed else {
            result.push_warning(format!("KAD row has malformed tail columns: {line:?}"));
            continue;
        };

        if !accumulators.contains_key(&entity_name) {
            order.push(entity_name.clone());
            accumulators.insert(
                entity_name.clone(),
                Accumulator {
                    entity_type: entity_type.clone(),
                    vertices: Vec::new(),
                    radius: 0.0,
                    text: String::new(),
                    font_height: 2.5,
                    circle_color: DEFAULT_COLOR.to_string(),
                    circle_line_width: 1.0,
                },
            );
        }
        let acc = accumulators.get_mut(&entity_name).unwrap();

        match tail {
            Tail::LineLike { color, line_width, closed } => {
                let point_id = acc.vertices.len() as u32 + 1;
                let mut vertex = Vertex::new(point, point_id);
                vertex.color = color;
                vertex.line_width = line_width;
                vertex.closed = closed;
                acc.vertices.push(vertex);
            }
            Tail::Circle { radius, line_width, color } => {
                acc.vertices = vec![Vertex::new(point, 1)];
                acc.radius = radius;
                acc.circle_line_width = line_width;
                acc.circle_color = color;
            }
            Tail::Text { text, color, font_height } => {
                acc.vertices = vec![Vertex::new(point, 1)];
                acc.text = text;
                acc.circle_color = color;
                acc.font_height = font_height;
            }
        }
        result.success_count += 1;
    }

    for name in order {
        let acc = accumulators.remove(&name).unwrap();
        if let Some(drawing) = build_drawing(&name, acc) {
            result.payload.insert_unique(drawing);
        }
    }

    result
}

enum Tail {
    LineLike { color: String, line_width: f64, closed: bool },
    Circle { radius: f64, line_width: f64, color: String },
    Text { text: String, color: String, font_height: f64 },
}

fn parse_point_or_line_tail(cols: &[&str]) -> Option<Tail> {
    if cols.len() < 8 {
        return None;
    }
    let line_width: f64 = cols[6].trim().parse().ok()?;
    let color = cols[7].trim().to_string();
    Some(Tail::LineLike { color, line_width, closed: false })
}

fn parse_poly_tail(cols: &[&str]) -> Option<Tail> {
    if cols.len() < 9 {
        return None;
    }
    let line_width: f64 = cols[6].trim().parse().ok()?;
    let color = cols[7].trim().to_string();
    let closed_raw = cols[8].trim();
    let closed = closed_raw == "true" || closed_raw == "1";
    Some(Tail::LineLike { color, line_width, closed })
}

fn parse_circle_tail(cols: &[&str]) -> Option<Tail> {
    if cols.len() < 9 {
        return None;
    }
    let radius: f64 = cols[6].trim().parse().ok()?;
    let line_width: f64 = cols[7].trim().parse().ok()?;
    let color = cols[8].trim().to_string();
    Some(Tail::Circle { radius, line_width, color })
}

fn parse_text_tail(cols: &[&str]) -> Option<Tail> {
    if cols.len() < 9 {
        return None;
    }
    let text = cols[6].trim().to_string();
    let color = cols[7].trim().to_string();
    let font_height: f64 = cols[8].trim().parse().ok()?;
    Some(Tail::Text { text, color, font_height })
}

fn build_drawing(name: &str, acc: Accumulator) -> Option<Drawing> {
    let common = DrawingCommon::new(name);
    match acc.entity_type.as_str() {
        "point" => acc.vertices.into_iter().next().map(|vertex| Drawing::Point { common, vertex }),
        "line" => {
            if acc.vertices.len() >= 2 {
                Some(Drawing::Line { common, vertices: acc.vertices })
            } else {
                None
            }
        }
        "poly" => {
            let vertices = acc.vertices;
            if vertices.len() >= 3 {
                Some(Drawing::Polygon { common, vertices })
            } else if vertices.len() == 2 {
                Some(Drawing::Line { common, vertices })
            } else {
                None
            }
        }
        "circle" => acc.vertices.first().map(|v| Drawing::Circle {
            common,
            center: v.position,
            radius: acc.radius,
            color: acc.circle_color,
            line_width: acc.circle_line_width,
        }),
        "text" => acc.vertices.first().map(|v| Drawing::Text {
            common,
            anchor: v.position,
            text: acc.text,
            font_height: acc.font_height,
            color: acc.circle_color,
        }),
        _ => None,
    }
}

/// Write a [`DrawingMap`] back into KAD text, one row per vertex
/// (spec.md §4.7.3): the exact inverse of [`parse`] for every field it
/// consumes.
pub fn write(drawings: &DrawingMap) -> String {
    let mut out = String::new();
    for (name, drawing) in drawings.iter() {
        match drawing {
            Drawing::Point { vertex, .. } => write_row(&mut out, name, "point", vertex, &[&vertex.line_width.to_string(), &vertex.color]),
            Drawing::Line { vertices, .. } => {
                for v in vertices {
                    write_row(&mut out, name, "line", v, &[&v.line_width.to_string(), &v.color]);
                }
            }
            Drawing::Polygon { vertices, .. } => {
                for v in vertices {
                    let closed = if v.closed { "true" } else { "false" };
                    write_row(&mut out, name, "poly", v, &[&v.line_width.to_string(), &v.color, closed]);
                }
            }
            Drawing::Circle { center, radius, color, line_width } => {
                let vertex = Vertex::new(*center, 1);
                write_row(&mut out, name, "circle", &vertex, &[&radius.to_string(), &line_width.to_string(), color]);
            }
            Drawing::Text { anchor, text, font_height, color } => {
                let vertex = Vertex::new(*anchor, 1);
                write_row(&mut out, name, "text", &vertex, &[text, color, &font_height.to_string()]);
            }
        }
    }
    out
}

fn write_row(out: &mut String, name: &str, entity_type: &str, vertex: &Vertex, tail: &[&str]) {
    out.push_str(name);
    out.push(',');
    out.push_str(entity_type);
    out.push(',');
    out.push_str(&vertex.point_id.to_string());
    out.push(',');
    out.push_str(&vertex.position.x.to_string());
    out.push(',');
    out.push_str(&vertex.position.y.to_string());
    out.push(',');
    out.push_str(&vertex.position.z.to_string());
    for field in tail {
        out.push(',');
        out.push_str(field);
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_point_line_poly_circle_text() {
        let text = "\
P1,point,1,0,0,0,1.0,#FF0000\n\
L1,line,1,0,0,0,1.0,#00FF00\n\
L1,line,2,1,0,0,1.0,#00FF00\n\
PO1,poly,1,0,0,0,1.0,#0000FF,false\n\
PO1,poly,2,1,0,0,1.0,#0000FF,false\n\
PO1,poly,3,1,1,0,1.0,#0000FF,true\n\
C1,circle,1,5,5,0,2.5,1.0,#FFFFFF\n\
T1,text,1,2,2,0,Hello,#000000,3.0\n";
        let result = parse(text);
        assert_eq!(result.payload.len(), 5);
        assert_eq!(result.error_count, 0);

        let poly = result.payload.get("PO1").unwrap();
        match poly {
            Drawing::Polygon { vertices, .. } => {
                assert_eq!(vertices.len(), 3);
                assert!(vertices.last().unwrap().closed);
            }
            other => panic!("expected Polygon, got {other:?}"),
        }
    }

    #[test]
    fn short_rows_are_skipped_and_counted() {
        let text = "bad,row\nP1,point,1,0,0,0,1.0,#FF0000\n";
        let result = parse(text);
        assert_eq!(result.payload.len(), 1);
        assert_eq!(result.error_count, 1);
    }

    #[test]
    fn unknown_entity_type_is_skipped() {
        let text = "X1,blob,1,0,0,0,1.0,#FF0000\n";
        let result = parse(text);
        assert_eq!(result.payload.len(), 0);
        assert_eq!(result.error_count, 1);
    }

    #[test]
    fn write_then_parse_round_trips_polygon() {
        let mut drawings = DrawingMap::new();
        drawings.insert_unique(Drawing::Polygon {
            common: DrawingCommon::new("Poly1"),
            vertices: vec![
                Vertex::new(Point3::new(0.0, 0.0, 0.0), 1),
                Vertex::new(Point3::new(1.0, 0.0, 0.0), 2),
                {
                    let mut v = Vertex::new(Point3::new(1.0, 1.0, 0.0), 3);
                    v.closed = true;
                    v
                },
            ],
        });
        let text = write(&drawings);
        let result = parse(&text);
        assert_eq!(result.payload.len(), 1);
        match result.payload.get("Poly1").unwrap() {
            Drawing::Polygon { vertices, .. } => assert_eq!(vertices.len(), 3),
            other => panic!("expected Polygon, got {other:?}"),
        }
    }
}
