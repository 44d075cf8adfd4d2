//! v1 containers: a chain of 32-byte subentries, each followed by its
//! PCX (or PNG) payload.

use std::collections::{HashMap, HashSet};

use crate::compression::SpriteFormat;
use crate::embedded::{self, PngHeader};
use crate::palette::{self, PaletteEntry, PaletteTable};
use crate::pcx::{self, PcxHeader};
use crate::reader::{SffReader, V1Subentry, V1_SUBENTRY_SIZE};
use crate::sff::{Container, SffOptions, SpriteDescriptor, SpriteFlags};
use crate::warning::{LinkKind, Warning};

struct Entry {
    sub: V1Subentry,
    payload_offset: u64,
    payload_length: u64,
}

pub(crate) fn read(data: &[u8], options: &SffOptions) -> Container {
    let mut reader = SffReader::new(data);
    let mut warnings = Vec::new();

    let Ok(header) = reader.read_v1_header() else {
        warnings.push(Warning::InvalidSignature { len: data.len() }.logged());
        return Container {
            warnings,
            ..Default::default()
        };
    };

    if header.subentry_stride as usize != V1_SUBENTRY_SIZE {
        log::debug!(
            "header stores a subentry size of {}, using {}",
            header.subentry_stride,
            V1_SUBENTRY_SIZE
        );
    }
    log::debug!(
        "v1 container: {} groups, {} images",
        header.group_count,
        header.image_count
    );

    let entries = walk_chain(&mut reader, header.first_subentry_offset, &mut warnings);
    let sources: Vec<Option<usize>> = (0..entries.len())
        .map(|index| resolve_link(&entries, index, &mut warnings))
        .collect();

    // Slot 0 is filled in once the whole chain has been seen.
    let mut palette_entries = vec![PaletteEntry::owned(palette::grayscale())];
    let mut palette_of_source: HashMap<usize, usize> = HashMap::new();
    let mut last_valid: Option<usize> = None;
    let mut sprites = Vec::with_capacity(entries.len());

    for (entry, source) in entries.iter().zip(&sources) {
        let (payload_offset, payload_length) = match source {
            Some(source) => (entries[*source].payload_offset, entries[*source].payload_length),
            None => (0, 0),
        };
        let payload = slice(data, payload_offset, payload_length);

        let mut flags = SpriteFlags::empty();
        if entry.sub.payload_size == 0 {
            flags |= SpriteFlags::LINK;
        }
        if entry.sub.palette_flag != 0 {
            flags |= SpriteFlags::SHARED_PALETTE;
        }

        let (format, width, height, color_depth) = if let Some(png) = embedded::find_png(payload) {
            match PngHeader::parse(png) {
                Some(h) => (SpriteFormat::Embedded, clamp(h.width), clamp(h.height), h.color_depth()),
                None => (SpriteFormat::Embedded, 0, 0, 0),
            }
        } else {
            match PcxHeader::parse(payload) {
                Some(h) => (SpriteFormat::Pcx, h.width(), h.height(), h.bits_per_pixel.saturating_mul(h.planes)),
                None => (SpriteFormat::Pcx, 0, 0, 8),
            }
        };

        if format == SpriteFormat::Pcx {
            if let (Some(source), Some(colors)) = (source, pcx::trailing_palette(payload)) {
                let index = *palette_of_source.entry(*source).or_insert_with(|| {
                    palette_entries.push(PaletteEntry::owned(palette::from_rgb(
                        colors,
                        options.palette.channel_order,
                    )));
                    palette_entries.len() - 1
                });
                flags |= SpriteFlags::OWN_PALETTE;
                last_valid = Some(index);
            }
        }

        sprites.push(SpriteDescriptor {
            group: entry.sub.group as i16,
            image: entry.sub.image as i16,
            width,
            height,
            axis_x: entry.sub.axis_x,
            axis_y: entry.sub.axis_y,
            format,
            color_depth,
            palette_index: last_valid.unwrap_or(0),
            link_index: (entry.sub.payload_size == 0).then_some(entry.sub.link_index as usize),
            data_offset: payload_offset,
            data_length: payload_length,
            flags,
        });
    }

    if let Some(last) = last_valid {
        palette_entries[0] = PaletteEntry::linked(last);
    }
    let palettes = PaletteTable::build(palette_entries, &options.palette, &mut warnings);

    Container {
        sprites,
        palettes,
        regions: None,
        warnings,
    }
}

fn walk_chain(reader: &mut SffReader<'_>, first: u32, warnings: &mut Vec<Warning>) -> Vec<Entry> {
    let mut entries = Vec::new();
    let mut seen = HashSet::new();
    let mut offset = first;

    while offset != 0 {
        if !seen.insert(offset) {
            warnings.push(
                Warning::TruncatedChain {
                    offset: offset as u64,
                    read: entries.len(),
                }
                .logged(),
            );
            break;
        }

        let sub = match reader.read_v1_subentry(offset) {
            Ok(sub) => sub,
            Err(_) => {
                warnings.push(
                    Warning::TruncatedChain {
                        offset: offset as u64,
                        read: entries.len(),
                    }
                    .logged(),
                );
                break;
            }
        };

        let payload_offset = offset as u64 + V1_SUBENTRY_SIZE as u64;
        let available = (reader.len() as u64).saturating_sub(payload_offset);
        let payload_length = (sub.payload_size as u64).min(available);
        if payload_length < sub.payload_size as u64 {
            log::warn!(
                "payload at {} is cut short: {} of {} bytes",
                payload_offset,
                payload_length,
                sub.payload_size
            );
        }

        offset = sub.next_offset;
        entries.push(Entry {
            sub,
            payload_offset,
            payload_length,
        });
    }

    entries
}

/// Index of the entry whose payload `index` uses, following links.
fn resolve_link(entries: &[Entry], index: usize, warnings: &mut Vec<Warning>) -> Option<usize> {
    let mut current = index;
    for _ in 0..=entries.len() {
        let sub = &entries[current].sub;
        if sub.payload_size != 0 {
            return Some(current);
        }
        let target = sub.link_index as usize;
        if target >= entries.len() {
            warnings.push(
                Warning::UnresolvedLink {
                    kind: LinkKind::Sprite,
                    index,
                    target,
                }
                .logged(),
            );
            return None;
        }
        current = target;
    }

    warnings.push(
        Warning::CyclicLink {
            kind: LinkKind::Sprite,
            index,
        }
        .logged(),
    );
    None
}

fn slice(data: &[u8], offset: u64, length: u64) -> &[u8] {
    let start = (offset as usize).min(data.len());
    let end = (offset.saturating_add(length) as usize).min(data.len());
    &data[start..end]
}

fn clamp(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}
