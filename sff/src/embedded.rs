//! PNG images stored inside sprite payloads.
//!
//! Producers prefix the PNG with a few bytes of their own, so the signature
//! is searched at a handful of offsets. Indexed PNGs are read with `png`
//! directly to keep the palette indices; everything else goes through
//! `image`.

use std::io::Cursor;

use crate::compression::Pixels;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const SIGNATURE_OFFSETS: [usize; 4] = [0, 4, 8, 16];
const PNG_COLOR_INDEXED: u8 = 3;

/// What to do with an indexed PNG whose own palette is unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EmbeddedFallback {
    /// Hand the indices back so the container palette is applied.
    #[default]
    ContainerPalette,
    /// Colour the indices with a fixed high-contrast palette.
    DebugPalette,
}

#[derive(Debug, thiserror::Error)]
pub enum EmbeddedError {
    #[error("png decoding failed: {0}")]
    Png(#[from] png::DecodingError),
    #[error("image decoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Fields of the IHDR chunk that matter for sprite metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngHeader {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: u8,
}

impl PngHeader {
    pub fn parse(png: &[u8]) -> Option<Self> {
        if png.get(..8)? != &PNG_SIGNATURE[..] || png.get(12..16)? != &b"IHDR"[..] {
            return None;
        }
        let ihdr = png.get(16..26)?;
        Some(Self {
            width: u32::from_be_bytes([ihdr[0], ihdr[1], ihdr[2], ihdr[3]]),
            height: u32::from_be_bytes([ihdr[4], ihdr[5], ihdr[6], ihdr[7]]),
            bit_depth: ihdr[8],
            color_type: ihdr[9],
        })
    }

    pub fn is_indexed(&self) -> bool {
        self.color_type == PNG_COLOR_INDEXED
    }

    /// Bits per pixel as reported in sprite metadata.
    pub fn color_depth(&self) -> u8 {
        if self.is_indexed() { self.bit_depth } else { 32 }
    }
}

/// Locate a PNG stream in `data`, returning it from its signature onwards.
pub fn find_png(data: &[u8]) -> Option<&[u8]> {
    SIGNATURE_OFFSETS.iter().find_map(|&offset| {
        let candidate = data.get(offset..)?;
        candidate.starts_with(&PNG_SIGNATURE).then_some(candidate)
    })
}

/// Raw contents of the first chunk of type `kind`.
pub fn find_chunk<'a>(png: &'a [u8], kind: &[u8; 4]) -> Option<&'a [u8]> {
    let mut pos = PNG_SIGNATURE.len();
    while pos + 8 <= png.len() {
        let length = u32::from_be_bytes([png[pos], png[pos + 1], png[pos + 2], png[pos + 3]]) as usize;
        let chunk_type = &png[pos + 4..pos + 8];
        let body = png.get(pos + 8..pos + 8 + length)?;
        if chunk_type == kind {
            return Some(body);
        }
        if chunk_type == b"IEND" {
            break;
        }
        pos += 12 + length;
    }
    None
}

/// Fixed fallback palette: index 0 transparent black, the rest spread over
/// the colour cube.
pub fn debug_palette() -> Vec<[u8; 3]> {
    (0..256usize)
        .map(|i| {
            if i == 0 {
                [0, 0, 0]
            } else {
                [(i * 37) as u8, (i * 73) as u8, (i * 151) as u8]
            }
        })
        .collect()
}

/// Decode a PNG stream to exactly `width * height` pixels.
///
/// Indexed images with a usable palette are expanded to RGBA. When the
/// palette is entirely black the PLTE chunk is re-read by hand; if that is
/// black too, `fallback` decides.
pub fn decode(
    png: &[u8],
    width: usize,
    height: usize,
    fallback: EmbeddedFallback,
) -> Result<Pixels, EmbeddedError> {
    let indexed = PngHeader::parse(png).is_some_and(|h| h.is_indexed());
    if !indexed {
        return decode_true_color(png, width, height);
    }

    let mut decoder = png::Decoder::new(Cursor::new(png));
    decoder.set_transformations(png::Transformations::IDENTITY);
    let mut reader = decoder.read_info()?;
    let bit_depth = match reader.output_color_type().1 {
        png::BitDepth::One => 1,
        png::BitDepth::Two => 2,
        png::BitDepth::Four => 4,
        png::BitDepth::Eight => 8,
        png::BitDepth::Sixteen => 16,
    };

    let mut buf = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buf)?;
    let (src_width, src_height) = (frame.width as usize, frame.height as usize);
    let indices = unpack_indices(&buf, src_width, src_height, frame.line_size, bit_depth);

    let info = reader.info();
    let decoded_palette = info.palette.as_deref().map(rgb_triplets);
    let transparency = info
        .trns
        .as_deref()
        .filter(|t| t.iter().any(|&a| a != 0))
        .map(<[u8]>::to_vec);

    let (width, height) = target_size(width, height, src_width, src_height);
    let indices = resample_nearest(&indices, src_width, src_height, 1, width, height);

    let palette = match decoded_palette.filter(|p| !is_all_black(p)) {
        Some(palette) => Some(palette),
        None => {
            log::warn!("embedded palette is entirely black, re-reading PLTE chunk");
            find_chunk(png, b"PLTE")
                .map(rgb_triplets)
                .filter(|p| !is_all_black(p))
        }
    };

    Ok(match (palette, fallback) {
        (Some(palette), _) => Pixels::Rgba(colorize(&indices, &palette, transparency.as_deref())),
        (None, EmbeddedFallback::ContainerPalette) => Pixels::Indexed(indices),
        (None, EmbeddedFallback::DebugPalette) => {
            Pixels::Rgba(colorize(&indices, &debug_palette(), Some(&[0])))
        }
    })
}

fn decode_true_color(png: &[u8], width: usize, height: usize) -> Result<Pixels, EmbeddedError> {
    let image = image::load_from_memory_with_format(png, image::ImageFormat::Png)?.to_rgba8();
    let (src_width, src_height) = (image.width() as usize, image.height() as usize);
    let (width, height) = target_size(width, height, src_width, src_height);

    Ok(Pixels::Rgba(resample_nearest(
        image.as_raw(),
        src_width,
        src_height,
        4,
        width,
        height,
    )))
}

fn target_size(width: usize, height: usize, src_width: usize, src_height: usize) -> (usize, usize) {
    if width == 0 || height == 0 {
        return (src_width, src_height);
    }
    if (width, height) != (src_width, src_height) {
        log::warn!(
            "embedded image is {}x{}, descriptor says {}x{}, resampling",
            src_width,
            src_height,
            width,
            height
        );
    }
    (width, height)
}

fn unpack_indices(buf: &[u8], width: usize, height: usize, line_size: usize, bit_depth: u8) -> Vec<u8> {
    let mut indices = Vec::with_capacity(width * height);
    for y in 0..height {
        let row = buf.get(y * line_size..).unwrap_or_default();
        for x in 0..width {
            let index = match bit_depth {
                8 => row.get(x).copied().unwrap_or(0),
                1 | 2 | 4 => {
                    let per_byte = (8 / bit_depth) as usize;
                    let byte = row.get(x / per_byte).copied().unwrap_or(0);
                    let shift = 8 - bit_depth as usize * (x % per_byte + 1);
                    (byte >> shift) & ((1 << bit_depth) - 1)
                }
                _ => 0,
            };
            indices.push(index);
        }
    }
    indices
}

pub(crate) fn resample_nearest(
    src: &[u8],
    src_width: usize,
    src_height: usize,
    channels: usize,
    width: usize,
    height: usize,
) -> Vec<u8> {
    if (src_width, src_height) == (width, height) {
        let mut out = src.to_vec();
        out.resize(width * height * channels, 0);
        return out;
    }

    let mut out = vec![0; width * height * channels];
    if src_width == 0 || src_height == 0 {
        return out;
    }
    for y in 0..height {
        let sy = y * src_height / height;
        for x in 0..width {
            let sx = x * src_width / width;
            let from = (sy * src_width + sx) * channels;
            let to = (y * width + x) * channels;
            if let Some(px) = src.get(from..from + channels) {
                out[to..to + channels].copy_from_slice(px);
            }
        }
    }
    out
}

fn rgb_triplets(bytes: &[u8]) -> Vec<[u8; 3]> {
    bytes.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()
}

fn is_all_black(palette: &[[u8; 3]]) -> bool {
    palette.iter().all(|c| *c == [0, 0, 0])
}

fn colorize(indices: &[u8], palette: &[[u8; 3]], transparency: Option<&[u8]>) -> Vec<u8> {
    let mut out = Vec::with_capacity(indices.len() * 4);
    for &index in indices {
        let [r, g, b] = palette.get(index as usize).copied().unwrap_or([0, 0, 0]);
        let a = transparency
            .and_then(|t| t.get(index as usize).copied())
            .unwrap_or(255);
        out.extend_from_slice(&[r, g, b, a]);
    }
    out
}
