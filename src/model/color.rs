//! ACI <-> hex color mapping (`ColorTable`, spec.md §4.4).
//!
//! AutoCAD Color Index codes 1-9 map through a fixed table, 10+ through an
//! HSL ramp, and anything above 255 is reinterpreted as a packed 24-bit RGB
//! value. The reverse direction (`hex_to_aci`) uses a small exact table plus
//! a deterministic hash fallback so that round-tripping an unknown color is
//! at least stable across runs.

/// 24-bit RGB color, always serialized as `#RRGGBB`.
pub type ColorHex = String;

const DEFAULT_HEX: &str = "#777777";

const ACI_TABLE: [(u8, &str); 9] = [
    (1, "#FF0000"), // red
    (2, "#FFFF00"), // yellow
    (3, "#00FF00"), // green
    (4, "#00FFFF"), // cyan
    (5, "#0000FF"), // blue
    (6, "#FF00FF"), // magenta
    (7, "#FFFFFF"), // white
    (8, "#414141"), // dark gray
    (9, "#808080"), // light gray
];

/// Exact hex -> ACI table, checked before falling back to the content hash.
const HEX_TO_ACI_TABLE: [(&str, u8); 11] = [
    ("#FF0000", 1),
    ("#FFFF00", 2),
    ("#00FF00", 3),
    ("#00FFFF", 4),
    ("#0000FF", 5),
    ("#FF00FF", 6),
    ("#FFFFFF", 7),
    ("#000000", 0),
    ("#414141", 8),
    ("#808080", 9),
    ("#777777", 7),
];

/// CSS color-name fallback table used by parsers/writers that accept a
/// `colorHexDecimal` field which is sometimes a CSS name (spec.md §9 open
/// question) rather than a hex string.
const CSS_NAMES: [(&str, &str); 10] = [
    ("red", "#FF0000"),
    ("green", "#00FF00"),
    ("blue", "#0000FF"),
    ("yellow", "#FFFF00"),
    ("white", "#FFFFFF"),
    ("black", "#000000"),
    ("orange", "#FFA500"),
    ("purple", "#800080"),
    ("grey", "#808080"),
    ("gray", "#808080"),
];

/// Map an AutoCAD Color Index to a `#RRGGBB` hex string.
///
/// `idx <= 0` yields the default gray. `1..=9` use the fixed table. `10..=255`
/// walk an HSL ramp (`hue = idx * 137 mod 360`) so adjacent indices are
/// visually distinct. `idx > 255` is reinterpreted as a packed 24-bit RGB
/// value rather than an ACI code.
pub fn aci_to_hex(idx: i32) -> ColorHex {
    if idx <= 0 {
        return DEFAULT_HEX.to_string();
    }
    if idx > 255 {
        return format!("#{:06X}", (idx as u32) & 0x00FF_FFFF);
    }
    if let Ok(small) = u8::try_from(idx) {
        if let Some((_, hex)) = ACI_TABLE.iter().find(|(code, _)| *code == small) {
            return hex.to_string();
        }
    }
    let hue = ((idx as u32) * 137) % 360;
    hsl_to_hex(hue as f64, 0.70, 0.50)
}

/// Map a `#RRGGBB` hex string (or a recognized CSS name) back to an ACI code.
///
/// Empty or malformed input returns `7` (white), matching the source
/// behavior. Unrecognized-but-well-formed hex strings hash deterministically
/// into `1..=255` so that repeated imports of the same unknown color always
/// produce the same ACI code.
pub fn hex_to_aci(hex: &str) -> u8 {
    let hex = normalize_color_input(hex);
    if hex.is_empty() {
        return 7;
    }
    let upper = hex.to_uppercase();
    if let Some((_, aci)) = HEX_TO_ACI_TABLE.iter().find(|(h, _)| *h == upper) {
        return *aci;
    }
    if !is_well_formed_hex(&upper) {
        return 7;
    }
    let mut hash: i64 = 0;
    for byte in upper.bytes() {
        hash = (byte as i64).wrapping_add(hash.wrapping_shl(5)).wrapping_sub(hash);
    }
    ((hash.unsigned_abs() % 255) + 1) as u8
}

/// Accept either a CSS color name or a `#RRGGBB` string, always returning hex.
/// Used by writers per spec.md §9 ("writers must accept both and emit hex").
pub fn normalize_color_input(input: &str) -> ColorHex {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if let Some(stripped) = trimmed.strip_prefix('#') {
        if is_well_formed_hex(stripped) {
            return format!("#{}", stripped.to_uppercase());
        }
        return String::new();
    }
    let lower = trimmed.to_lowercase();
    CSS_NAMES
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, hex)| hex.to_string())
        .unwrap_or_default()
}

fn is_well_formed_hex(s: &str) -> bool {
    s.len() == 6 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn hsl_to_hex(h: f64, s: f64, l: f64) -> ColorHex {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let h_prime = h / 60.0;
    let x = c * (1.0 - (h_prime.rem_euclid(2.0) - 1.0).abs());
    let (r1, g1, b1) = match h_prime as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    let to_byte = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    format!("#{:02X}{:02X}{:02X}", to_byte(r1), to_byte(g1), to_byte(b1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aci_fixed_table() {
        assert_eq!(aci_to_hex(1), "#FF0000");
        assert_eq!(aci_to_hex(7), "#FFFFFF");
    }

    #[test]
    fn aci_default_for_non_positive() {
        assert_eq!(aci_to_hex(0), "#777777");
        assert_eq!(aci_to_hex(-5), "#777777");
    }

    #[test]
    fn aci_packed_rgb_above_255() {
        assert_eq!(aci_to_hex(0x00FF00FF), "#FF00FF");
    }

    #[test]
    fn hex_to_aci_exact_table() {
        assert_eq!(hex_to_aci("#FF0000"), 1);
        assert_eq!(hex_to_aci("#FFFFFF"), 7);
    }

    #[test]
    fn hex_to_aci_malformed_returns_white() {
        assert_eq!(hex_to_aci(""), 7);
        assert_eq!(hex_to_aci("not-a-color"), 7);
    }

    #[test]
    fn hex_to_aci_fallback_is_stable() {
        let a = hex_to_aci("#123456");
        let b = hex_to_aci("#123456");
        assert_eq!(a, b);
        assert!(a >= 1);
    }

    #[test]
    fn css_name_normalizes_to_hex() {
        assert_eq!(normalize_color_input("red"), "#FF0000");
        assert_eq!(normalize_color_input("#00ff00"), "#00FF00");
    }
}
