//! Pixel decompressors for SFF sprite payloads.
//!
//! Every decoder here is total: malformed input never errors, it just yields
//! fewer pixels, and the shortfall is zero-padded to `width * height`.

use crate::embedded::{self, EmbeddedFallback};
use crate::pcx;

/// Storage format of a sprite payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpriteFormat {
    Raw,
    Rle8,
    Rle5,
    Lz5,
    /// PCX block, only found in v1 containers.
    Pcx,
    /// A complete PNG stored inside the container.
    Embedded,
    /// A code no producer documents. Decoded by guessing.
    Unknown(u8),
}

impl From<u8> for SpriteFormat {
    fn from(code: u8) -> Self {
        match code {
            0 | 1 => Self::Raw,
            2 => Self::Rle8,
            3 => Self::Rle5,
            4 | 25 => Self::Lz5,
            10..=12 => Self::Embedded,
            n => Self::Unknown(n),
        }
    }
}

impl std::fmt::Display for SpriteFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::Rle8 => write!(f, "rle8"),
            Self::Rle5 => write!(f, "rle5"),
            Self::Lz5 => write!(f, "lz5"),
            Self::Pcx => write!(f, "pcx"),
            Self::Embedded => write!(f, "png"),
            Self::Unknown(n) => write!(f, "unknown({})", n),
        }
    }
}

/// Decoded pixel data, before palette application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pixels {
    /// One palette index per pixel.
    Indexed(Vec<u8>),
    /// Four bytes per pixel, already in final colours.
    Rgba(Vec<u8>),
}

/// Decode a sprite payload.
///
/// An embedded PNG signature overrides whatever `format` says, since several
/// producers write the wrong code.
pub fn decode(
    format: SpriteFormat,
    data: &[u8],
    width: usize,
    height: usize,
    fallback: EmbeddedFallback,
) -> Pixels {
    let pixel_count = width * height;

    if let Some(png) = embedded::find_png(data) {
        if format != SpriteFormat::Embedded {
            log::debug!("png signature found in {} payload", format);
        }
        return match embedded::decode(png, width, height, fallback) {
            Ok(pixels) => pixels,
            Err(e) => {
                log::warn!("embedded image could not be decoded: {}", e);
                Pixels::Indexed(vec![0; pixel_count])
            }
        };
    }

    match format {
        SpriteFormat::Raw => Pixels::Indexed(decode_raw(data, pixel_count)),
        SpriteFormat::Rle8 => Pixels::Indexed(decode_rle8(data, pixel_count)),
        SpriteFormat::Rle5 => Pixels::Indexed(decode_rle5(data, pixel_count)),
        SpriteFormat::Lz5 => Pixels::Indexed(decode_lz5(data, pixel_count)),
        SpriteFormat::Pcx => pcx::decode(data, width, height),
        SpriteFormat::Embedded => {
            log::warn!("payload declared as png has no png signature");
            Pixels::Indexed(vec![0; pixel_count])
        }
        SpriteFormat::Unknown(_) => guess(data, pixel_count),
    }
}

/// Heuristic decode for unknown format codes. Tried in order: exact raw size,
/// raw RGBA size, LZ5 size header, RLE8 that fills the buffer, RLE5 that
/// fills the buffer, and finally raw truncate/pad.
pub fn guess(data: &[u8], pixel_count: usize) -> Pixels {
    if data.len() == pixel_count {
        log::debug!("guessed raw indexed");
        return Pixels::Indexed(data.to_vec());
    }
    if pixel_count > 0 && data.len() == pixel_count * 4 {
        log::debug!("guessed raw rgba");
        return Pixels::Rgba(data.to_vec());
    }
    if data.len() > 4 && data[..4] == (pixel_count as u32).to_le_bytes() {
        log::debug!("guessed lz5 from size header");
        return Pixels::Indexed(decode_lz5(data, pixel_count));
    }
    if !data.is_empty() {
        let rle8 = expand_rle8(data, pixel_count);
        if rle8.len() == pixel_count {
            log::debug!("guessed rle8");
            return Pixels::Indexed(rle8);
        }
        let rle5 = expand_rle5(data, pixel_count);
        if rle5.len() == pixel_count {
            log::debug!("guessed rle5");
            return Pixels::Indexed(rle5);
        }
    }
    log::debug!("no decoder matched, using payload as raw");
    Pixels::Indexed(decode_raw(data, pixel_count))
}

fn fit(mut pixels: Vec<u8>, pixel_count: usize) -> Vec<u8> {
    pixels.resize(pixel_count, 0);
    pixels
}

fn push_run(out: &mut Vec<u8>, value: u8, run: usize, limit: usize) {
    let run = run.min(limit.saturating_sub(out.len()));
    out.resize(out.len() + run, value);
}

pub fn decode_raw(data: &[u8], pixel_count: usize) -> Vec<u8> {
    fit(data[..data.len().min(pixel_count)].to_vec(), pixel_count)
}

/// RLE8: after a 4-byte size hint, `0x40..=0x7F` opens a run of
/// `byte & 0x3F` copies of the following byte, anything else is a literal.
pub fn decode_rle8(data: &[u8], pixel_count: usize) -> Vec<u8> {
    fit(expand_rle8(data, pixel_count), pixel_count)
}

fn expand_rle8(data: &[u8], limit: usize) -> Vec<u8> {
    let body = data.get(4..).unwrap_or_default();
    let mut out = Vec::with_capacity(limit);
    let mut bytes = body.iter().copied();

    while out.len() < limit {
        let Some(b) = bytes.next() else { break };
        if b & 0xC0 == 0x40 {
            let value = bytes.next().unwrap_or(0);
            push_run(&mut out, value, (b & 0x3F) as usize, limit);
        } else {
            out.push(b);
        }
    }

    out
}

/// RLE5: pairs of `(run, control)`. A control byte with the top bit set is
/// followed by one colour byte repeated `run + 1` times. Otherwise its low
/// seven bits count packed bytes, each holding a 3-bit run (`+1`) over a
/// 5-bit colour.
pub fn decode_rle5(data: &[u8], pixel_count: usize) -> Vec<u8> {
    fit(expand_rle5(data, pixel_count), pixel_count)
}

fn expand_rle5(data: &[u8], limit: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(limit);
    let mut i = 0;

    while i + 1 < data.len() && out.len() < limit {
        let run = data[i] as usize + 1;
        let control = data[i + 1];
        i += 2;

        if control & 0x80 != 0 {
            let Some(&value) = data.get(i) else { break };
            i += 1;
            push_run(&mut out, value, run, limit);
        } else {
            for _ in 0..(control & 0x7F) {
                let Some(&packed) = data.get(i) else { break };
                i += 1;
                push_run(&mut out, packed & 0x1F, (packed >> 5) as usize + 1, limit);
            }
        }
    }

    out
}

/// LZ5: a 4-byte decompressed size, then groups of one control byte and up
/// to eight units. Set bits are back-references, clear bits are short runs.
pub fn decode_lz5(data: &[u8], pixel_count: usize) -> Vec<u8> {
    fit(expand_lz5(data, pixel_count), pixel_count)
}

fn expand_lz5(data: &[u8], limit: usize) -> Vec<u8> {
    let Some(header) = data.get(..4) else {
        log::warn!("lz5 payload shorter than its size header");
        return Vec::new();
    };
    let declared = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let cap = declared.min(limit);

    let mut out = Vec::with_capacity(cap);
    let mut src = 4;
    // Offset bits borrowed from the top of consecutive short back-references.
    let mut recycle_byte = 0u8;
    let mut recycle_count = 0u32;

    'groups: while src < data.len() && out.len() < cap {
        let control = data[src];
        src += 1;

        for bit in 0..8 {
            if src >= data.len() || out.len() >= cap {
                break;
            }

            let b1 = data[src];
            src += 1;

            if (control >> bit) & 1 == 1 {
                let (offset, length) = if b1 & 0x3F == 0 {
                    let (Some(&b2), Some(&b3)) = (data.get(src), data.get(src + 1)) else {
                        break 'groups;
                    };
                    src += 2;
                    let offset = ((((b1 & 0xC0) as usize) << 2) | b2 as usize) + 1;
                    (offset, b3 as usize + 3)
                } else {
                    let length = (b1 & 0x3F) as usize + 1;
                    recycle_byte |= ((b1 & 0xC0) >> 6) << (6 - 2 * recycle_count);
                    recycle_count += 1;
                    if recycle_count == 4 {
                        let offset = recycle_byte as usize + 1;
                        recycle_byte = 0;
                        recycle_count = 0;
                        (offset, length)
                    } else {
                        let Some(&b2) = data.get(src) else { break 'groups };
                        src += 1;
                        (b2 as usize + 1, length)
                    }
                };

                for _ in 0..length {
                    if out.len() >= cap {
                        break;
                    }
                    let value = if offset <= out.len() {
                        out[out.len() - offset]
                    } else {
                        0
                    };
                    out.push(value);
                }
            } else {
                let value = b1 & 0x1F;
                let mut count = (b1 >> 5) as usize;
                if count == 0 {
                    let Some(&b2) = data.get(src) else { break 'groups };
                    src += 1;
                    count = b2 as usize + 8;
                }
                push_run(&mut out, value, count, cap);
            }
        }
    }

    out
}
