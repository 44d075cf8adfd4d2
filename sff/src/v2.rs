//! v2 containers: fixed-stride sprite and palette tables pointing into two
//! data regions.

use crate::compression::SpriteFormat;
use crate::palette::{self, PaletteEntry, PaletteSource, PaletteTable};
use crate::reader::{SffReader, V2Header, V2PaletteRecord, V2_VERSIONS};
use crate::sff::{Container, DataRegions, SffOptions, SpriteDescriptor, SpriteFlags};
use crate::warning::{Table, Warning};

const BYTES_PER_COLOR: u64 = 4;
const MAX_COLORS: u64 = 256;

pub(crate) fn read(data: &[u8], options: &SffOptions) -> Container {
    let mut reader = SffReader::new(data);
    let mut warnings = Vec::new();

    let header = match reader.read_v2_header() {
        Ok(header) if V2_VERSIONS.contains(&header.version) => header,
        Ok(header) => {
            log::warn!("unsupported v2 version tuple {:?}", header.version);
            warnings.push(Warning::InvalidSignature { len: data.len() }.logged());
            return Container {
                warnings,
                ..Default::default()
            };
        }
        Err(_) => {
            warnings.push(Warning::InvalidSignature { len: data.len() }.logged());
            return Container {
                warnings,
                ..Default::default()
            };
        }
    };

    log::debug!(
        "v2 container: {} sprites at {:#x}, {} palettes at {:#x}",
        header.sprite_count,
        header.sprite_offset,
        header.palette_count,
        header.palette_offset
    );

    let palette_entries = read_palettes(&mut reader, &header, options, &mut warnings);
    let palettes = PaletteTable::build(palette_entries, &options.palette, &mut warnings);
    let sprites = read_sprites(&mut reader, &header, &mut warnings);

    Container {
        sprites,
        palettes,
        regions: Some(DataRegions {
            ldata: header.ldata_offset as u64,
            tdata: header.tdata_offset as u64,
        }),
        warnings,
    }
}

fn read_palettes(
    reader: &mut SffReader<'_>,
    header: &V2Header,
    options: &SffOptions,
    warnings: &mut Vec<Warning>,
) -> Vec<PaletteEntry> {
    let expected = header.palette_count as usize;
    let mut entries = Vec::new();

    for index in 0..expected {
        let record = match reader.read_v2_palette_record(header.palette_offset, index) {
            Ok(record) => record,
            Err(_) => {
                warnings.push(
                    Warning::TruncatedTable {
                        table: Table::Palettes,
                        index,
                        expected,
                    }
                    .logged(),
                );
                break;
            }
        };

        entries.push(PaletteEntry {
            source: palette_source(reader, header, &record, options),
            group_id: record.group_id,
            palette_id: record.palette_id,
        });
    }

    entries
}

fn palette_source(
    reader: &SffReader<'_>,
    header: &V2Header,
    record: &V2PaletteRecord,
    options: &SffOptions,
) -> PaletteSource {
    if record.color_count == 0 || record.file_length == 0 {
        return PaletteSource::Link(record.link_index as usize);
    }

    let start = header.ldata_offset as u64 + record.file_offset as u64;
    let length = (record.file_length as u64).min(MAX_COLORS * BYTES_PER_COLOR);
    let available = (reader.len() as u64).saturating_sub(start).min(length);
    if available < length {
        log::warn!(
            "palette {},{} is cut short: {} of {} bytes",
            record.group_id,
            record.palette_id,
            available,
            length
        );
    }
    let bytes = reader.slice(start, available).unwrap_or_default();

    PaletteSource::Colors(Box::new(palette::from_rgbx(
        bytes,
        options.palette.channel_order,
    )))
}

fn read_sprites(
    reader: &mut SffReader<'_>,
    header: &V2Header,
    warnings: &mut Vec<Warning>,
) -> Vec<SpriteDescriptor> {
    let expected = header.sprite_count as usize;
    let mut sprites = Vec::new();

    for index in 0..expected {
        let record = match reader.read_v2_sprite_record(header.sprite_offset, index) {
            Ok(record) => record,
            Err(_) => {
                warnings.push(
                    Warning::TruncatedTable {
                        table: Table::Sprites,
                        index,
                        expected,
                    }
                    .logged(),
                );
                break;
            }
        };

        let mut flags = SpriteFlags::from_bits_truncate(record.flags & 0x00FF);
        let base = if flags.contains(SpriteFlags::TDATA) {
            header.tdata_offset
        } else {
            header.ldata_offset
        };
        let is_link = record.length == 0 || record.width == 0 || record.height == 0;
        if is_link {
            flags |= SpriteFlags::LINK;
        }

        sprites.push(SpriteDescriptor {
            group: record.group,
            image: record.image,
            width: record.width,
            height: record.height,
            axis_x: record.axis_x,
            axis_y: record.axis_y,
            format: SpriteFormat::from(record.format),
            color_depth: record.color_depth,
            palette_index: record.palette_index as usize,
            link_index: is_link.then_some(record.link_index as usize),
            data_offset: base as u64 + record.relative_offset as u64,
            data_length: record.length as u64,
            flags,
        });
    }

    sprites
}
