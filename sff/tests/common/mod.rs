//! Byte-level builders for synthetic containers.

#![allow(dead_code)]

pub const V2_HEADER_SIZE: usize = 0x80;

pub fn put_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

pub fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// An 8-bit single-plane PCX, RLE encoded, with an optional trailing palette.
pub fn pcx(width: u16, height: u16, pixels: &[u8], palette: Option<&[[u8; 3]; 256]>) -> Vec<u8> {
    let mut data = vec![0u8; 128];
    data[0] = 0x0A;
    data[1] = 5;
    data[2] = 1;
    data[3] = 8;
    put_u16(&mut data, 8, width - 1);
    put_u16(&mut data, 10, height - 1);
    data[65] = 1;
    put_u16(&mut data, 66, width);

    for &p in pixels {
        if p >= 0xC0 {
            data.push(0xC1);
        }
        data.push(p);
    }

    if let Some(palette) = palette {
        data.push(0x0C);
        for color in palette {
            data.extend_from_slice(color);
        }
    }
    data
}

/// A palette that is black except for one entry.
pub fn palette_with(index: usize, color: [u8; 3]) -> [[u8; 3]; 256] {
    let mut palette = [[0u8; 3]; 256];
    palette[index] = color;
    palette
}

pub fn indexed_png(width: u32, height: u32, palette: &[u8], indices: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Indexed);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_palette(palette.to_vec());
        let mut writer = encoder.write_header().expect("png header");
        writer.write_image_data(indices).expect("png data");
    }
    out
}

pub fn rgba_png(width: u32, height: u32, rgba: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().expect("png header");
        writer.write_image_data(rgba).expect("png data");
    }
    out
}

#[derive(Debug, Clone, Default)]
pub struct V1Sprite {
    pub group: u16,
    pub image: u16,
    pub axis: (i16, i16),
    pub link: u16,
    pub palette_flag: u8,
    pub payload: Vec<u8>,
}

impl V1Sprite {
    pub fn new(group: u16, image: u16, payload: Vec<u8>) -> Self {
        Self {
            group,
            image,
            payload,
            ..Default::default()
        }
    }

    pub fn link(group: u16, image: u16, target: u16) -> Self {
        Self {
            group,
            image,
            link: target,
            ..Default::default()
        }
    }
}

pub fn build_v1(sprites: &[V1Sprite]) -> Vec<u8> {
    let mut data = vec![0u8; 32];
    data[..12].copy_from_slice(b"ElecbyteSpr\0");
    data[12..16].copy_from_slice(&[0, 1, 0, 1]);
    put_u32(&mut data, 16, 1);
    put_u32(&mut data, 20, sprites.len() as u32);
    put_u32(&mut data, 24, if sprites.is_empty() { 0 } else { 32 });
    put_u32(&mut data, 28, 32);

    for (i, sprite) in sprites.iter().enumerate() {
        let offset = data.len();
        let next = if i + 1 == sprites.len() {
            0
        } else {
            offset + 32 + sprite.payload.len()
        };

        let mut sub = [0u8; 32];
        put_u32(&mut sub, 0, next as u32);
        put_u32(&mut sub, 4, sprite.payload.len() as u32);
        sub[8..10].copy_from_slice(&sprite.axis.0.to_le_bytes());
        sub[10..12].copy_from_slice(&sprite.axis.1.to_le_bytes());
        put_u16(&mut sub, 12, sprite.group);
        put_u16(&mut sub, 14, sprite.image);
        put_u16(&mut sub, 16, sprite.link);
        sub[18] = sprite.palette_flag;

        data.extend_from_slice(&sub);
        data.extend_from_slice(&sprite.payload);
    }
    data
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    #[default]
    L,
    T,
}

#[derive(Debug, Clone, Default)]
pub struct V2Sprite {
    pub group: i16,
    pub image: i16,
    pub width: u16,
    pub height: u16,
    pub axis: (i16, i16),
    pub link: u16,
    pub format: u8,
    pub color_depth: u8,
    pub palette: u16,
    /// Where the payload bytes are written.
    pub region: Region,
    /// Flags as stored. Defaults to matching `region`.
    pub flags: Option<u16>,
    pub payload: Vec<u8>,
}

impl V2Sprite {
    pub fn raw(group: i16, image: i16, width: u16, height: u16, pixels: Vec<u8>) -> Self {
        Self {
            group,
            image,
            width,
            height,
            color_depth: 8,
            payload: pixels,
            ..Default::default()
        }
    }

    pub fn link(group: i16, image: i16, target: u16) -> Self {
        Self {
            group,
            image,
            link: target,
            ..Default::default()
        }
    }

    pub fn with_palette(mut self, palette: u16) -> Self {
        self.palette = palette;
        self
    }

    pub fn with_format(mut self, format: u8) -> Self {
        self.format = format;
        self
    }

    pub fn in_region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }
}

#[derive(Debug, Clone)]
pub enum V2Palette {
    Colors(Vec<[u8; 4]>),
    Link(u16),
}

/// A palette where every entry but 0 has the same colour.
pub fn solid_palette(color: [u8; 3]) -> V2Palette {
    let mut colors = vec![[color[0], color[1], color[2], 0]; 256];
    colors[0] = [0, 0, 0, 0];
    V2Palette::Colors(colors)
}

pub fn build_v2(sprites: &[V2Sprite], palettes: &[V2Palette]) -> Vec<u8> {
    let sprite_table = V2_HEADER_SIZE;
    let palette_table = sprite_table + 28 * sprites.len();
    let ldata_start = palette_table + 16 * palettes.len();

    let mut ldata = Vec::new();
    let mut tdata = Vec::new();
    let mut palette_rows = Vec::new();
    for palette in palettes {
        let mut row = [0u8; 16];
        match palette {
            V2Palette::Colors(colors) => {
                put_u16(&mut row, 4, colors.len() as u16);
                put_u32(&mut row, 8, ldata.len() as u32);
                put_u32(&mut row, 12, (colors.len() * 4) as u32);
                for color in colors {
                    ldata.extend_from_slice(color);
                }
            }
            V2Palette::Link(target) => put_u16(&mut row, 6, *target),
        }
        palette_rows.extend_from_slice(&row);
    }

    let mut sprite_rows = Vec::new();
    for sprite in sprites {
        let region = match sprite.region {
            Region::L => &mut ldata,
            Region::T => &mut tdata,
        };
        let relative = if sprite.payload.is_empty() { 0 } else { region.len() };
        region.extend_from_slice(&sprite.payload);

        let mut row = [0u8; 28];
        row[0..2].copy_from_slice(&sprite.group.to_le_bytes());
        row[2..4].copy_from_slice(&sprite.image.to_le_bytes());
        put_u16(&mut row, 4, sprite.width);
        put_u16(&mut row, 6, sprite.height);
        row[8..10].copy_from_slice(&sprite.axis.0.to_le_bytes());
        row[10..12].copy_from_slice(&sprite.axis.1.to_le_bytes());
        put_u16(&mut row, 12, sprite.link);
        row[14] = sprite.format;
        row[15] = sprite.color_depth;
        put_u32(&mut row, 16, relative as u32);
        put_u32(&mut row, 20, sprite.payload.len() as u32);
        put_u16(&mut row, 24, sprite.palette);
        let flags = sprite
            .flags
            .unwrap_or(if sprite.region == Region::T { 1 } else { 0 });
        put_u16(&mut row, 26, flags);
        sprite_rows.extend_from_slice(&row);
    }

    let tdata_start = ldata_start + ldata.len();

    let mut data = vec![0u8; V2_HEADER_SIZE];
    data[..12].copy_from_slice(b"ElecbyteSpr\0");
    data[12..16].copy_from_slice(&[0, 1, 0, 2]);
    put_u32(&mut data, 0x24, sprite_table as u32);
    put_u32(&mut data, 0x28, sprites.len() as u32);
    put_u32(&mut data, 0x2C, palette_table as u32);
    put_u32(&mut data, 0x30, palettes.len() as u32);
    put_u32(&mut data, 0x34, ldata_start as u32);
    put_u32(&mut data, 0x38, ldata.len() as u32);
    put_u32(&mut data, 0x3C, tdata_start as u32);
    put_u32(&mut data, 0x40, tdata.len() as u32);

    data.extend_from_slice(&sprite_rows);
    data.extend_from_slice(&palette_rows);
    data.extend_from_slice(&ldata);
    data.extend_from_slice(&tdata);
    data
}
