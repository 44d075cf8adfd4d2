//! Container palettes.
//!
//! Palettes are normalized to 256 RGBA entries once, at load time. Linked
//! palettes share the storage of their target instead of copying it.

use std::sync::Arc;

use crate::warning::{LinkKind, Warning};

pub type Color = [u8; 4];
pub type Colors = [Color; 256];

/// Longest palette link chain followed before giving up.
pub const MAX_LINK_HOPS: usize = 256;

/// How the alpha channel of a normalized palette is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AlphaPolicy {
    /// Index 0 is fully transparent, every other entry opaque.
    #[default]
    IndexZeroTransparent,
    /// Keep whatever the container stored. v1 palettes have no alpha and
    /// come out opaque.
    Stored,
    Opaque,
}

/// Byte order of stored colour triplets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PaletteOptions {
    pub alpha: AlphaPolicy,
    pub channel_order: ChannelOrder,
}

/// Where a palette's colours come from before links are resolved.
#[derive(Debug, Clone)]
pub enum PaletteSource {
    Colors(Box<Colors>),
    Link(usize),
}

/// A palette as read from the container.
#[derive(Debug, Clone)]
pub struct PaletteEntry {
    pub source: PaletteSource,
    pub group_id: u16,
    pub palette_id: u16,
}

impl PaletteEntry {
    pub fn owned(colors: Colors) -> Self {
        Self {
            source: PaletteSource::Colors(Box::new(colors)),
            group_id: 0,
            palette_id: 0,
        }
    }

    pub fn linked(target: usize) -> Self {
        Self {
            source: PaletteSource::Link(target),
            group_id: 0,
            palette_id: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaletteRecord {
    pub index: usize,
    pub group_id: u16,
    pub palette_id: u16,
    /// Set when this palette aliases another one.
    pub link_index: Option<usize>,
    pub colors: Arc<Colors>,
}

#[derive(Debug, Clone, Default)]
pub struct PaletteTable {
    records: Vec<PaletteRecord>,
}

impl PaletteTable {
    /// Normalize owned palettes and resolve links.
    ///
    /// A link that is out of range, cyclic or longer than [`MAX_LINK_HOPS`]
    /// resolves to a grayscale ramp and raises a warning.
    pub fn build(entries: Vec<PaletteEntry>, options: &PaletteOptions, warnings: &mut Vec<Warning>) -> Self {
        let owned: Vec<Option<Arc<Colors>>> = entries
            .iter()
            .map(|entry| match &entry.source {
                PaletteSource::Colors(colors) => {
                    let mut colors = **colors;
                    normalize(&mut colors, options.alpha);
                    Some(Arc::new(colors))
                }
                PaletteSource::Link(_) => None,
            })
            .collect();

        let max_hops = entries.len().min(MAX_LINK_HOPS);
        let mut records = Vec::with_capacity(entries.len());

        for (index, entry) in entries.iter().enumerate() {
            let colors = match &owned[index] {
                Some(colors) => colors.clone(),
                None => resolve(&entries, &owned, index, max_hops, warnings).unwrap_or_else(|| {
                    let mut colors = grayscale();
                    normalize(&mut colors, options.alpha);
                    Arc::new(colors)
                }),
            };
            let link_index = match entry.source {
                PaletteSource::Link(target) => Some(target),
                PaletteSource::Colors(_) => None,
            };

            records.push(PaletteRecord {
                index,
                group_id: entry.group_id,
                palette_id: entry.palette_id,
                link_index,
                colors,
            });
        }

        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PaletteRecord> {
        self.records.get(index)
    }

    pub fn colors(&self, index: usize) -> Option<&Arc<Colors>> {
        self.records.get(index).map(|r| &r.colors)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PaletteRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a PaletteTable {
    type Item = &'a PaletteRecord;
    type IntoIter = std::slice::Iter<'a, PaletteRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

fn resolve(
    entries: &[PaletteEntry],
    owned: &[Option<Arc<Colors>>],
    start: usize,
    max_hops: usize,
    warnings: &mut Vec<Warning>,
) -> Option<Arc<Colors>> {
    let mut current = start;
    for _ in 0..max_hops {
        let PaletteSource::Link(target) = entries[current].source else {
            return owned[current].clone();
        };
        if target >= entries.len() {
            warnings.push(
                Warning::UnresolvedLink {
                    kind: LinkKind::Palette,
                    index: start,
                    target,
                }
                .logged(),
            );
            return None;
        }
        current = target;
    }

    if let Some(colors) = &owned[current] {
        return Some(colors.clone());
    }
    warnings.push(
        Warning::CyclicLink {
            kind: LinkKind::Palette,
            index: start,
        }
        .logged(),
    );
    None
}

/// 256-step gray ramp, fully opaque.
pub fn grayscale() -> Colors {
    std::array::from_fn(|i| [i as u8, i as u8, i as u8, 255])
}

/// Read up to 256 packed triplets. Missing entries are black, alpha is 255.
pub fn from_rgb(bytes: &[u8], order: ChannelOrder) -> Colors {
    let mut colors = [[0, 0, 0, 255]; 256];
    for (color, c) in colors.iter_mut().zip(bytes.chunks_exact(3)) {
        *color = ordered([c[0], c[1], c[2]], 255, order);
    }
    colors
}

/// Read up to 256 four-byte entries, keeping the fourth byte as alpha.
pub fn from_rgbx(bytes: &[u8], order: ChannelOrder) -> Colors {
    let mut colors = [[0, 0, 0, 0]; 256];
    for (color, c) in colors.iter_mut().zip(bytes.chunks_exact(4)) {
        *color = ordered([c[0], c[1], c[2]], c[3], order);
    }
    colors
}

fn ordered([a, b, c]: [u8; 3], alpha: u8, order: ChannelOrder) -> Color {
    match order {
        ChannelOrder::Rgb => [a, b, c, alpha],
        ChannelOrder::Bgr => [c, b, a, alpha],
    }
}

pub fn normalize(colors: &mut Colors, policy: AlphaPolicy) {
    match policy {
        AlphaPolicy::IndexZeroTransparent => {
            for (i, color) in colors.iter_mut().enumerate() {
                color[3] = if i == 0 { 0 } else { 255 };
            }
        }
        AlphaPolicy::Stored => {}
        AlphaPolicy::Opaque => {
            for color in colors.iter_mut() {
                color[3] = 255;
            }
        }
    }
}

/// Expand palette indices to RGBA bytes.
pub fn apply(indices: &[u8], colors: &Colors) -> Vec<u8> {
    let mut out = Vec::with_capacity(indices.len() * 4);
    for &index in indices {
        out.extend_from_slice(&colors[index as usize]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(value: u8) -> Colors {
        [[value, value, value, 255]; 256]
    }

    #[test]
    fn test_channel_order() {
        let bytes = [1, 2, 3, 4, 5, 6];
        assert_eq!(from_rgb(&bytes, ChannelOrder::Rgb)[1], [4, 5, 6, 255]);
        assert_eq!(from_rgb(&bytes, ChannelOrder::Bgr)[1], [6, 5, 4, 255]);
        assert_eq!(from_rgb(&bytes, ChannelOrder::Rgb)[2], [0, 0, 0, 255]);

        let bytes = [1, 2, 3, 9];
        assert_eq!(from_rgbx(&bytes, ChannelOrder::Rgb)[0], [1, 2, 3, 9]);
    }

    #[test]
    fn test_alpha_policies() {
        let mut colors = from_rgbx(&[1, 1, 1, 7, 2, 2, 2, 0], ChannelOrder::Rgb);
        let stored = colors;
        normalize(&mut colors, AlphaPolicy::IndexZeroTransparent);
        assert_eq!(colors[0][3], 0);
        assert_eq!(colors[1][3], 255);
        assert_eq!(colors[255][3], 255);

        let mut kept = stored;
        normalize(&mut kept, AlphaPolicy::Stored);
        assert_eq!((kept[0][3], kept[1][3]), (7, 0));

        let mut opaque = stored;
        normalize(&mut opaque, AlphaPolicy::Opaque);
        assert!(opaque.iter().all(|c| c[3] == 255));
    }

    #[test]
    fn test_links_share_storage() {
        let entries = vec![
            PaletteEntry::owned(solid(10)),
            PaletteEntry::linked(0),
            PaletteEntry::linked(1),
        ];
        let mut warnings = Vec::new();
        let table = PaletteTable::build(entries, &PaletteOptions::default(), &mut warnings);

        assert!(warnings.is_empty());
        assert_eq!(table.len(), 3);
        let first = table.colors(0).unwrap();
        assert!(Arc::ptr_eq(first, table.colors(1).unwrap()));
        assert!(Arc::ptr_eq(first, table.colors(2).unwrap()));
        assert_eq!(table.get(2).unwrap().link_index, Some(1));
        assert_eq!(first[0], [10, 10, 10, 0]);
    }

    #[test]
    fn test_bad_links_become_grayscale() {
        let entries = vec![
            PaletteEntry::linked(1),
            PaletteEntry::linked(0),
            PaletteEntry::linked(9),
        ];
        let mut warnings = Vec::new();
        let table = PaletteTable::build(entries, &PaletteOptions::default(), &mut warnings);

        assert_eq!(warnings.len(), 3);
        assert!(matches!(warnings[0], Warning::CyclicLink { index: 0, .. }));
        assert!(matches!(
            warnings[2],
            Warning::UnresolvedLink { index: 2, target: 9, .. }
        ));
        let colors = table.colors(2).unwrap();
        assert_eq!(colors[128], [128, 128, 128, 255]);
        assert_eq!(colors[0][3], 0);
    }

    #[test]
    fn test_apply() {
        let mut colors = grayscale();
        normalize(&mut colors, AlphaPolicy::IndexZeroTransparent);
        assert_eq!(apply(&[0, 200], &colors), vec![0, 0, 0, 0, 200, 200, 200, 255]);
    }
}
