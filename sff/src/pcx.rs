//! PCX blocks as stored by v1 containers.

use crate::compression::Pixels;

pub const PCX_HEADER_SIZE: usize = 128;
/// Byte that precedes a 768-byte palette appended to the image data.
pub const PALETTE_MARKER: u8 = 0x0C;
pub const PALETTE_TRAILER_SIZE: usize = 769;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcxHeader {
    pub encoding: u8,
    pub bits_per_pixel: u8,
    pub x_min: u16,
    pub y_min: u16,
    pub x_max: u16,
    pub y_max: u16,
    pub planes: u8,
    pub bytes_per_line: u16,
}

impl PcxHeader {
    pub fn parse(data: &[u8]) -> Option<Self> {
        let header = data.get(..PCX_HEADER_SIZE)?;
        let word = |at: usize| u16::from_le_bytes([header[at], header[at + 1]]);

        Some(Self {
            encoding: header[2],
            bits_per_pixel: header[3],
            x_min: word(4),
            y_min: word(6),
            x_max: word(8),
            y_max: word(10),
            planes: header[65],
            bytes_per_line: word(66),
        })
    }

    pub fn width(&self) -> u16 {
        self.x_max.saturating_sub(self.x_min).saturating_add(1)
    }

    pub fn height(&self) -> u16 {
        self.y_max.saturating_sub(self.y_min).saturating_add(1)
    }
}

/// The 768-byte RGB palette appended to an 8-bit PCX, if present.
pub fn trailing_palette(data: &[u8]) -> Option<&[u8]> {
    if data.len() >= PALETTE_TRAILER_SIZE && data[data.len() - PALETTE_TRAILER_SIZE] == PALETTE_MARKER
    {
        Some(&data[data.len() - (PALETTE_TRAILER_SIZE - 1)..])
    } else {
        None
    }
}

fn expand_scanlines(data: &[u8], encoded: bool, total: usize) -> Vec<u8> {
    if !encoded {
        let mut raw = data[..data.len().min(total)].to_vec();
        raw.resize(total, 0);
        return raw;
    }

    let mut out = Vec::with_capacity(total);
    let mut bytes = data.iter().copied();

    while out.len() < total {
        let Some(b) = bytes.next() else { break };
        if b & 0xC0 == 0xC0 {
            let value = bytes.next().unwrap_or(0);
            let run = ((b & 0x3F) as usize).min(total - out.len());
            out.resize(out.len() + run, value);
        } else {
            out.push(b);
        }
    }

    out.resize(total, 0);
    out
}

/// Decode a PCX block to `width * height` pixels.
///
/// Single-plane 8-bit images stay indexed. Three- and four-plane 8-bit
/// images are returned as RGBA.
pub fn decode(data: &[u8], width: usize, height: usize) -> Pixels {
    let pixel_count = width * height;

    let Some(header) = PcxHeader::parse(data) else {
        log::warn!("pcx block shorter than its header");
        return Pixels::Indexed(vec![0; pixel_count]);
    };

    let planes = header.planes.max(1) as usize;
    let bytes_per_line = header.bytes_per_line as usize;
    let scanline = planes * bytes_per_line;
    let raw = expand_scanlines(
        &data[PCX_HEADER_SIZE..],
        header.encoding == 1,
        scanline * height,
    );
    let columns = width.min(bytes_per_line);

    match (header.bits_per_pixel, planes) {
        (8, 1) => {
            let mut pixels = vec![0; pixel_count];
            for y in 0..height {
                let row = &raw[y * scanline..y * scanline + columns];
                pixels[y * width..y * width + columns].copy_from_slice(row);
            }
            Pixels::Indexed(pixels)
        }
        (8, 3 | 4) => {
            let mut pixels = vec![0; pixel_count * 4];
            for y in 0..height {
                let line = &raw[y * scanline..(y + 1) * scanline];
                for x in 0..columns {
                    let out = &mut pixels[(y * width + x) * 4..][..4];
                    out[0] = line[x];
                    out[1] = line[bytes_per_line + x];
                    out[2] = line[2 * bytes_per_line + x];
                    out[3] = if planes == 4 {
                        line[3 * bytes_per_line + x]
                    } else {
                        255
                    };
                }
            }
            Pixels::Rgba(pixels)
        }
        (bits, planes) => {
            log::warn!(
                "unsupported pcx layout: {} bits per pixel, {} planes",
                bits,
                planes
            );
            Pixels::Indexed(vec![0; pixel_count])
        }
    }
}
