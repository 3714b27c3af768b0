//! Static resource-key catalog.
//!
//! Maps key-prefix patterns to human-readable labels and back. The table is
//! ordered most-specific-first and lookup is first-match-wins, so an exact
//! `(type, group, instance)` entry shadows its type-only fallback.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::tgi::{Tgi, TgiMask};

/// One catalog row: a key pattern and its label.
#[derive(Debug, Clone, Copy)]
pub struct TgiLabel {
    pub mask: TgiMask,
    pub label: &'static str,
}

const fn entry(
    type_id: Option<u32>,
    group: Option<u32>,
    instance: Option<u32>,
    label: &'static str,
) -> TgiLabel {
    TgiLabel {
        mask: TgiMask::new(type_id, group, instance),
        label,
    }
}

#[rustfmt::skip]
static CATALOG: [TgiLabel; 43] = [
    entry(Some(0), Some(0), Some(0), "-"),
    entry(Some(0xe86b1eef), Some(0xe86b1eef), Some(0x286b1f03), "Directory"),
    entry(Some(0x6be74c60), Some(0x6be74c60), None, "LD"),
    entry(Some(0x5ad0e817), Some(0xbadb57f1), None, "S3D (Maxis)"),
    entry(Some(0x5ad0e817), None, None, "S3D"),
    entry(Some(0x05342861), None, None, "Cohort"),
    entry(Some(0x6534284a), Some(0x2821ed93), None, "Exemplar (Road)"),
    entry(Some(0x6534284a), Some(0xa92a02ea), None, "Exemplar (Street)"),
    entry(Some(0x6534284a), Some(0xcbe084cb), None, "Exemplar (One-Way Road)"),
    entry(Some(0x6534284a), Some(0xcb730fac), None, "Exemplar (Avenue)"),
    entry(Some(0x6534284a), Some(0xa8434037), None, "Exemplar (Highway)"),
    entry(Some(0x6534284a), Some(0xebe084d1), None, "Exemplar (Ground Highway)"),
    entry(Some(0x6534284a), Some(0x6be08658), None, "Exemplar (Dirt Road)"),
    entry(Some(0x6534284a), Some(0xe8347989), None, "Exemplar (Rail)"),
    entry(Some(0x6534284a), Some(0x2b79dffb), None, "Exemplar (Light Rail)"),
    entry(Some(0x6534284a), Some(0xebe084c2), None, "Exemplar (Monorail)"),
    entry(Some(0x6534284a), Some(0x8a15f3f2), None, "Exemplar (Subway)"),
    entry(Some(0x6534284a), Some(0x088e1962), None, "Exemplar (Power Pole)"),
    entry(Some(0x6534284a), Some(0x89ac5643), None, "Exemplar (T21)"),
    entry(Some(0x6534284a), None, None, "Exemplar"),
    entry(Some(0x7ab50e44), Some(0x1abe787d), None, "FSH (Misc)"),
    entry(Some(0x7ab50e44), Some(0x0986135e), None, "FSH (Base/Overlay Texture)"),
    entry(Some(0x7ab50e44), Some(0x2bc2759a), None, "FSH (Shadow Mask)"),
    entry(Some(0x7ab50e44), Some(0x2a2458f9), None, "FSH (Animation Sprites (Props))"),
    entry(Some(0x7ab50e44), Some(0x49a593e7), None, "FSH (Animation Sprites (Non Props))"),
    entry(Some(0x7ab50e44), Some(0x891b0e1a), None, "FSH (Terrain/Foundation)"),
    entry(Some(0x7ab50e44), Some(0x46a006b0), None, "FSH (UI Image)"),
    entry(Some(0x7ab50e44), None, None, "FSH"),
    entry(Some(0x296678f7), Some(0x69668828), None, "SC4Path (2D)"),
    entry(Some(0x296678f7), Some(0xa966883f), None, "SC4Path (3D)"),
    entry(Some(0x296678f7), None, None, "SC4Path"),
    entry(Some(0x856ddbac), Some(0x6a386d26), None, "PNG (Icon)"),
    entry(Some(0x856ddbac), None, None, "PNG"),
    entry(Some(0xca63e2a3), Some(0x4a5e8ef6), None, "LUA"),
    entry(Some(0xca63e2a3), Some(0x4a5e8f3f), None, "LUA (Generators)"),
    entry(Some(0x2026960b), Some(0xaa4d1933), None, "WAV"),
    entry(Some(0x2026960b), None, None, "LText"),
    entry(Some(0), Some(0x4a87bfe8), Some(0x2a87bffc), "INI (Font Table)"),
    entry(Some(0), Some(0x8a5971c5), Some(0x8a5993b9), "INI (Networks)"),
    entry(Some(0), Some(0x8a5971c5), None, "INI"),
    entry(Some(0x0a5bcf4b), Some(0xaa5bcf57), Some(0x10000000), "RUL0 (Intersection Ordering)"),
    entry(Some(0xea5118b0), None, None, "EffDir"),
    entry(None, None, None, "Unknown"),
];

struct CatalogIndex {
    by_label: HashMap<&'static str, TgiMask>,
    by_type: HashMap<u32, Vec<&'static TgiLabel>>,
    wildcard: Vec<&'static TgiLabel>,
}

static INDEX: LazyLock<CatalogIndex> = LazyLock::new(|| {
    let mut by_label = HashMap::new();
    let mut by_type: HashMap<u32, Vec<&'static TgiLabel>> = HashMap::new();
    let mut wildcard = Vec::new();
    for row in &CATALOG {
        by_label.entry(row.label).or_insert(row.mask);
        match row.mask.type_id {
            Some(type_id) => by_type.entry(type_id).or_default().push(row),
            None => wildcard.push(row),
        }
    }
    CatalogIndex {
        by_label,
        by_type,
        wildcard,
    }
});

/// The label of the first catalog pattern matching `tgi`.
pub fn describe(tgi: &Tgi) -> &'static str {
    let index = &*INDEX;
    let bucket = index.by_type.get(&tgi.type_id).map(Vec::as_slice).unwrap_or(&[]);
    bucket
        .iter()
        .chain(index.wildcard.iter())
        .find(|row| row.mask.matches(tgi))
        .map(|row| row.label)
        .unwrap_or("Unknown")
}

/// The canonical mask for a catalog label, if the label is known.
pub fn mask_for_label(label: &str) -> Option<TgiMask> {
    INDEX.by_label.get(label).copied()
}

/// The raw catalog rows, in priority order.
pub fn entries() -> &'static [TgiLabel] {
    &CATALOG
}
