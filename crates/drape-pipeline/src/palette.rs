//! The fixed garment color palette.
//!
//! Labels are the keys downstream search indexes filter on, so they are
//! stable identifiers, not display names. Each entry's Lab value is
//! derived from its hex swatch once per process and shared read-only.

use std::sync::LazyLock;

use serde::Serialize;

use crate::ciede2000::delta_e_2000;
use crate::lab::{Lab, srgb_to_lab};

/// One named swatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaletteEntry {
    /// Stable palette key, e.g. `"navy"`.
    pub label: &'static str,
    /// Swatch color as `#RRGGBB`.
    pub hex: &'static str,
}

const fn entry(label: &'static str, hex: &'static str) -> PaletteEntry {
    PaletteEntry { label, hex }
}

/// Every color the classifier can report.
pub const PALETTE: [PaletteEntry; 28] = [
    entry("black", "#000000"),
    entry("white", "#FFFFFF"),
    entry("gray", "#808080"),
    entry("lightgray", "#D3D3D3"),
    entry("darkgray", "#505050"),
    entry("navy", "#001f3f"),
    entry("blue", "#1e6bd6"),
    entry("sky", "#60a5fa"),
    entry("teal", "#14b8a6"),
    entry("turquoise", "#40E0D0"),
    entry("cyan", "#22d3ee"),
    entry("green", "#22c55e"),
    entry("lime", "#84cc16"),
    entry("olive", "#556B2F"),
    entry("yellow", "#facc15"),
    entry("gold", "#f59e0b"),
    entry("orange", "#f97316"),
    entry("red", "#ef4444"),
    entry("maroon", "#800000"),
    entry("pink", "#ff9ecb"),
    entry("purple", "#7d3ac1"),
    entry("indigo", "#4f46e5"),
    entry("violet", "#8b5cf6"),
    entry("brown", "#8b5a2b"),
    entry("beige", "#d9c8a3"),
    entry("tan", "#d2b48c"),
    entry("khaki", "#f0e68c"),
    entry("cream", "#fffdd0"),
];

/// Parse `#RRGGBB` (case-insensitive) into RGB bytes.
#[must_use]
pub fn parse_hex(hex: &str) -> Option<[u8; 3]> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

static PALETTE_LAB: LazyLock<Vec<(PaletteEntry, Lab)>> = LazyLock::new(|| {
    PALETTE
        .iter()
        .filter_map(|&e| {
            let [r, g, b] = parse_hex(e.hex)?;
            Some((e, srgb_to_lab(r, g, b)))
        })
        .collect()
});

/// Palette entries paired with their Lab values.
#[must_use]
pub fn palette_lab() -> &'static [(PaletteEntry, Lab)] {
    &PALETTE_LAB
}

/// Find the entry with the given label.
#[must_use]
pub fn lookup(label: &str) -> Option<&'static PaletteEntry> {
    PALETTE.iter().find(|e| e.label == label)
}

/// Closest palette entry to `target` by CIEDE2000, with its distance.
///
/// The first entry wins exact ties. Returns `None` when every distance
/// is infinite (a non-finite target).
#[must_use]
pub fn nearest(target: Lab) -> Option<(PaletteEntry, f64)> {
    let mut best: Option<(PaletteEntry, f64)> = None;
    for &(entry, lab) in palette_lab() {
        let d = delta_e_2000(target, lab);
        if d.is_finite() && best.is_none_or(|(_, bd)| d < bd) {
            best = Some((entry, d));
        }
    }
    best
}
