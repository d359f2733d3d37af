//! Infer `rowID`/`posID` from hole patterns (spec.md §4.6.9 `RowDetector`).

use regex::Regex;
use std::sync::OnceLock;

use crate::model::Hole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdClass {
    Numeric(i64),
    Alphanumeric { letter: char, number: u32 },
    Other,
}

fn alpha_num_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z]+)(\d+)$").unwrap())
}

fn classify(id: &str) -> IdClass {
    if let Ok(n) = id.parse::<i64>() {
        return IdClass::Numeric(n);
    }
    if let Some(caps) = alpha_num_re().captures(id) {
        let letters = &caps[1];
        if letters.len() == 1 {
            if let Ok(number) = caps[2].parse::<u32>() {
                return IdClass::Alphanumeric {
                    letter: letters.chars().next().unwrap().to_ascii_uppercase(),
                    number,
                };
            }
        }
    }
    IdClass::Other
}

/// Assign `(row_id, pos_id)` for each hole in `holes`, in order. `holes` must
/// already lack row/pos assignments; `hole_ids` supplies the ID used for
/// classification (e.g. `Hole::hole_id`) and `positions`/`diameters_mm`
/// give the XY location and hole diameter needed for the line-fit clustering
/// rule. All three slices must be the same length as `holes`.
pub fn assign(hole_ids: &[String], positions: &[(f64, f64)], diameters_mm: &[f64]) -> Vec<(u32, u32)> {
    let n = hole_ids.len();
    if n == 0 {
        return Vec::new();
    }

    let classes: Vec<IdClass> = hole_ids.iter().map(|id| classify(id)).collect();

    let all_alphanumeric = classes.iter().all(|c| matches!(c, IdClass::Alphanumeric { .. }));
    if all_alphanumeric {
        let mut letters: Vec<char> = classes
            .iter()
            .map(|c| match c {
                IdClass::Alphanumeric { letter, .. } => *letter,
                _ => unreachable!(),
            })
            .collect();
        letters.sort_unstable();
        letters.dedup();
        let sequential = letters.len() >= 3
            && letters
                .windows(2)
                .all(|w| (w[1] as u32).wrapping_sub(w[0] as u32) == 1);
        if sequential {
            return assign_by_letter_rows(&classes);
        }
    }

    let all_numeric = classes.iter().all(|c| matches!(c, IdClass::Numeric(_)));
    if all_numeric {
        let mut nums: Vec<i64> = classes
            .iter()
            .map(|c| match c {
                IdClass::Numeric(n) => *n,
                _ => unreachable!(),
            })
            .collect();
        nums.sort_unstable();
        let contiguous = nums.windows(2).all(|w| w[1] - w[0] == 1);
        if contiguous {
            return assign_by_line_fit(positions, diameters_mm);
        }
    }

    (0..n).map(|i| (1u32, (i + 1) as u32)).collect()
}

fn assign_by_letter_rows(classes: &[IdClass]) -> Vec<(u32, u32)> {
    let mut letter_to_row: Vec<char> = Vec::new();
    let mut counters: std::collections::HashMap<char, u32> = std::collections::HashMap::new();
    classes
        .iter()
        .map(|c| {
            let letter = match c {
                IdClass::Alphanumeric { letter, .. } => *letter,
                _ => unreachable!(),
            };
            if !letter_to_row.contains(&letter) {
                letter_to_row.push(letter);
            }
            let row = (letter_to_row.iter().position(|l| *l == letter).unwrap() + 1) as u32;
            let pos = counters.entry(letter).or_insert(0);
            *pos += 1;
            (row, *pos)
        })
        .collect()
}

/// Greedy longest-line clustering: grow a row while the perpendicular
/// distance from every included point to the (start -> end) line stays
/// within `2 * diameter_mm / 1000` meters.
fn assign_by_line_fit(positions: &[(f64, f64)], diameters_mm: &[f64]) -> Vec<(u32, u32)> {
    let n = positions.len();
    let mut assignments = vec![(0u32, 0u32); n];
    let mut assigned = vec![false; n];
    let mut row_id = 1u32;

    let mut start = 0;
    while start < n {
        if assigned[start] {
            start += 1;
            continue;
        }
        let tolerance = 2.0 * diameters_mm[start] / 1000.0;
        let mut members = vec![start];
        let mut end = start;
        for cand in (start + 1)..n {
            if assigned[cand] {
                continue;
            }
            let trial_end = cand;
            if line_fits(positions, &members, trial_end, tolerance) {
                members.push(cand);
                end = trial_end;
            } else {
                break;
            }
        }
        let _ = end;
        for (pos, &idx) in members.iter().enumerate() {
            assignments[idx] = (row_id, (pos + 1) as u32);
            assigned[idx] = true;
        }
        row_id += 1;
        start += 1;
    }

    assignments
}

fn line_fits(positions: &[(f64, f64)], members: &[usize], candidate: usize, tolerance: f64) -> bool {
    let (sx, sy) = positions[members[0]];
    let (ex, ey) = positions[candidate];
    let dx = ex - sx;
    let dy = ey - sy;
    let len = (dx * dx + dy * dy).sqrt();
    if len < f64::EPSILON {
        return true;
    }
    members.iter().chain(std::iter::once(&candidate)).all(|&idx| {
        let (px, py) = positions[idx];
        let dist = ((ex - sx) * (sy - py) - (sx - px) * (ey - sy)).abs() / len;
        dist <= tolerance
    })
}

/// Convenience wrapper that assigns `row_id`/`pos_id` directly onto `holes`
/// lacking them, deriving the classification inputs from each hole's fields.
pub fn assign_to_holes(holes: &mut [Hole]) {
    let hole_ids: Vec<String> = holes.iter().map(|h| h.hole_id.clone()).collect();
    let positions: Vec<(f64, f64)> = holes.iter().map(|h| (h.collar.x, h.collar.y)).collect();
    let diameters: Vec<f64> = holes.iter().map(|h| h.hole_diameter).collect();
    let assignments = assign(&hole_ids, &positions, &diameters);
    for (hole, (row, pos)) in holes.iter_mut().zip(assignments) {
        hole.row_id = Some(row);
        hole.pos_id = Some(pos);
    }
}
