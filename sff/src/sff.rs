//! High-level sprite container API.
//!
//! Opening a container reads only metadata. Pixels are decoded on demand, one
//! sprite at a time, and never cached here.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use bitflags::bitflags;

use crate::compression::{self, Pixels, SpriteFormat};
use crate::detect::{self, Version};
use crate::embedded::EmbeddedFallback;
use crate::palette::{self, Colors, PaletteOptions, PaletteTable};
use crate::warning::{LinkKind, Warning};
use crate::{v1, v2};

#[derive(Debug, thiserror::Error)]
pub enum SffError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("file is empty")]
    EmptyFile,
    #[error("sprite {group},{image} not found")]
    SpriteNotFound { group: i16, image: i16 },
    #[error("invalid sprite index: {0}")]
    InvalidSpriteIndex(usize),
    #[error("invalid palette index: {0}")]
    InvalidPaletteIndex(usize),
}

bitflags! {
    /// Sprite attributes. The low byte mirrors the v2 record flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct SpriteFlags: u16 {
        /// Payload lives in the T data region (v2).
        const TDATA = 0x0001;
        /// No payload of its own.
        const LINK = 0x0100;
        /// v1 palette flag: reuse the previous sprite's palette.
        const SHARED_PALETTE = 0x0200;
        /// Carries a palette of its own (v1 trailing palette).
        const OWN_PALETTE = 0x0400;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpriteDescriptor {
    pub group: i16,
    pub image: i16,
    pub width: u16,
    pub height: u16,
    pub axis_x: i16,
    pub axis_y: i16,
    pub format: SpriteFormat,
    pub color_depth: u8,
    pub palette_index: usize,
    /// Target of a link sprite. `None` for sprites with their own payload.
    pub link_index: Option<usize>,
    pub data_offset: u64,
    pub data_length: u64,
    pub flags: SpriteFlags,
}

impl SpriteDescriptor {
    pub fn is_link(&self) -> bool {
        self.data_length == 0 || self.width == 0 || self.height == 0
    }
}

/// RGBA pixels of one decoded sprite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRaster {
    pub width: u32,
    pub height: u32,
    /// RGBA pixel data, row-major order
    pub pixels: Vec<u8>,
}

impl DecodedRaster {
    /// The 1x1 fully transparent stand-in for sprites that cannot be resolved.
    pub fn transparent() -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: vec![0; 4],
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.pixels.get(at..at + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SffOptions {
    pub palette: PaletteOptions,
    pub embedded_fallback: EmbeddedFallback,
    /// Retry a v2 payload from the other data region when it looks blank.
    pub repair_regions: bool,
}

impl Default for SffOptions {
    fn default() -> Self {
        Self {
            palette: PaletteOptions::default(),
            embedded_fallback: EmbeddedFallback::default(),
            repair_regions: true,
        }
    }
}

/// Base offsets of the two v2 data regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DataRegions {
    pub ldata: u64,
    pub tdata: u64,
}

/// What a version-specific reader hands back.
#[derive(Debug, Default)]
pub(crate) struct Container {
    pub sprites: Vec<SpriteDescriptor>,
    pub palettes: PaletteTable,
    pub regions: Option<DataRegions>,
    pub warnings: Vec<Warning>,
}

pub struct Sff {
    data: Vec<u8>,
    version: Version,
    options: SffOptions,
    sprites: Vec<SpriteDescriptor>,
    lookup: HashMap<(i16, i16), usize>,
    palettes: PaletteTable,
    palette_usage: Vec<usize>,
    regions: Option<DataRegions>,
    warnings: Vec<Warning>,
}

impl Sff {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SffError> {
        Self::open_with(path, SffOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: SffOptions) -> Result<Self, SffError> {
        let data = std::fs::read(path)?;
        Self::from_bytes_with(data, options)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, SffError> {
        Self::from_bytes_with(data, SffOptions::default())
    }

    /// Parse a container from a byte buffer.
    ///
    /// Only an empty buffer is an error. Anything else loads, possibly as an
    /// empty or partial index, with the problems listed in [`Sff::warnings`].
    pub fn from_bytes_with(data: Vec<u8>, options: SffOptions) -> Result<Self, SffError> {
        if data.is_empty() {
            return Err(SffError::EmptyFile);
        }

        let version = detect::detect(&data);
        log::debug!("detected sprite container {}", version);

        let container = match version {
            Version::V2 => v2::read(&data, &options),
            Version::V1 => v1::read(&data, &options),
            Version::Unknown => {
                log::debug!("unrecognized signature, trying the v1 layout");
                v1::read(&data, &options)
            }
        };

        let mut lookup = HashMap::with_capacity(container.sprites.len());
        for (index, sprite) in container.sprites.iter().enumerate() {
            if let Some(previous) = lookup.insert((sprite.group, sprite.image), index) {
                log::debug!(
                    "sprite {},{} redefined at {} (was {})",
                    sprite.group,
                    sprite.image,
                    index,
                    previous
                );
            }
        }

        let mut palette_usage = vec![0; container.palettes.len()];
        for sprite in &container.sprites {
            if let Some(count) = palette_usage.get_mut(sprite.palette_index) {
                *count += 1;
            }
        }

        Ok(Self {
            data,
            version,
            options,
            sprites: container.sprites,
            lookup,
            palettes: container.palettes,
            palette_usage,
            regions: container.regions,
            warnings: container.warnings,
        })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn options(&self) -> &SffOptions {
        &self.options
    }

    /// All sprites in file order, including ones shadowed by a later
    /// definition of the same group and image.
    pub fn sprites(&self) -> &[SpriteDescriptor] {
        &self.sprites
    }

    pub fn sprite_count(&self) -> usize {
        self.sprites.len()
    }

    pub fn sprite_index(&self, group: i16, image: i16) -> Option<usize> {
        self.lookup.get(&(group, image)).copied()
    }

    pub fn sprite(&self, group: i16, image: i16) -> Option<&SpriteDescriptor> {
        self.sprite_index(group, image).map(|i| &self.sprites[i])
    }

    pub fn palettes(&self) -> &PaletteTable {
        &self.palettes
    }

    /// Number of sprites whose own palette index is `index`.
    pub fn palette_usage(&self, index: usize) -> usize {
        self.palette_usage.get(index).copied().unwrap_or(0)
    }

    /// A palette referenced by exactly one sprite. Overrides never replace it.
    pub fn is_dedicated_palette(&self, index: usize) -> bool {
        self.palette_usage(index) == 1
    }

    /// Problems found while loading.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Decode the sprite registered under `(group, image)`.
    pub fn decode(
        &self,
        group: i16,
        image: i16,
        palette_override: Option<usize>,
    ) -> Result<DecodedRaster, SffError> {
        let index = self
            .sprite_index(group, image)
            .ok_or(SffError::SpriteNotFound { group, image })?;
        self.decode_index(index, palette_override)
    }

    /// Decode a sprite by its position in [`Sff::sprites`].
    pub fn decode_index(
        &self,
        index: usize,
        palette_override: Option<usize>,
    ) -> Result<DecodedRaster, SffError> {
        if index >= self.sprites.len() {
            return Err(SffError::InvalidSpriteIndex(index));
        }
        if let Some(palette) = palette_override {
            if palette >= self.palettes.len() {
                return Err(SffError::InvalidPaletteIndex(palette));
            }
        }

        Ok(self.decode_linked(index, palette_override, HashSet::new()))
    }

    /// Palette index a decode of `sprite` would use.
    pub fn effective_palette(&self, sprite: &SpriteDescriptor, palette_override: Option<usize>) -> usize {
        let own = sprite.palette_index;
        match palette_override {
            Some(_) if self.is_dedicated_palette(own) => own,
            Some(palette) => palette,
            None => own,
        }
    }

    fn decode_linked(
        &self,
        index: usize,
        palette_override: Option<usize>,
        mut visited: HashSet<usize>,
    ) -> DecodedRaster {
        if !visited.insert(index) {
            Warning::CyclicLink {
                kind: LinkKind::Sprite,
                index,
            }
            .logged();
            return DecodedRaster::transparent();
        }

        let sprite = &self.sprites[index];
        if !sprite.is_link() {
            return self.decode_payload(index, sprite, palette_override);
        }

        match sprite.link_index {
            Some(target) if target < self.sprites.len() => {
                self.decode_linked(target, palette_override, visited)
            }
            Some(target) => {
                Warning::UnresolvedLink {
                    kind: LinkKind::Sprite,
                    index,
                    target,
                }
                .logged();
                DecodedRaster::transparent()
            }
            None => {
                log::warn!("sprite {} has neither pixels nor a link target", index);
                DecodedRaster::transparent()
            }
        }
    }

    fn decode_payload(
        &self,
        index: usize,
        sprite: &SpriteDescriptor,
        palette_override: Option<usize>,
    ) -> DecodedRaster {
        if let SpriteFormat::Unknown(code) = sprite.format {
            Warning::UnknownCodec { index, code }.logged();
        }

        let (width, height) = (sprite.width as usize, sprite.height as usize);
        let payload = self.payload(sprite);
        let pixels = match compression::decode(
            sprite.format,
            payload,
            width,
            height,
            self.options.embedded_fallback,
        ) {
            Pixels::Rgba(rgba) => rgba,
            Pixels::Indexed(indices) => {
                let colors = self.palette_colors(index, self.effective_palette(sprite, palette_override));
                palette::apply(&indices, &colors)
            }
        };

        DecodedRaster {
            width: width as u32,
            height: height as u32,
            pixels,
        }
    }

    fn palette_colors(&self, sprite_index: usize, palette: usize) -> Colors {
        if let Some(colors) = self.palettes.colors(palette) {
            return **colors;
        }
        log::warn!(
            "sprite {} uses missing palette {}, falling back to palette 0",
            sprite_index,
            palette
        );
        match self.palettes.colors(0) {
            Some(colors) => **colors,
            None => {
                let mut colors = palette::grayscale();
                palette::normalize(&mut colors, self.options.palette.alpha);
                colors
            }
        }
    }

    fn slice(&self, offset: u64, length: u64) -> &[u8] {
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.data.len());
        let end = usize::try_from(offset.saturating_add(length))
            .unwrap_or(usize::MAX)
            .min(self.data.len());
        &self.data[start..end]
    }

    /// Payload bytes of a sprite, clamped to the file.
    ///
    /// A compressed v2 payload that starts with sixteen zero bytes was most
    /// likely filed under the wrong data region; the other region is tried
    /// when it does not look blank too.
    fn payload(&self, sprite: &SpriteDescriptor) -> &[u8] {
        let payload = self.slice(sprite.data_offset, sprite.data_length);

        let Some(regions) = self.regions else {
            return payload;
        };
        if !self.options.repair_regions || sprite.format == SpriteFormat::Raw || !looks_blank(payload) {
            return payload;
        }

        let (base, other) = if sprite.flags.contains(SpriteFlags::TDATA) {
            (regions.tdata, regions.ldata)
        } else {
            (regions.ldata, regions.tdata)
        };
        let relative = sprite.data_offset.saturating_sub(base);
        let alternate = self.slice(other.saturating_add(relative), sprite.data_length);

        if alternate.len() as u64 == sprite.data_length && !looks_blank(alternate) {
            log::warn!(
                "sprite {},{} payload is blank, reading it from the other data region",
                sprite.group,
                sprite.image
            );
            alternate
        } else {
            payload
        }
    }
}

const BLANK_PREFIX: usize = 16;

fn looks_blank(payload: &[u8]) -> bool {
    payload.len() >= BLANK_PREFIX && payload[..BLANK_PREFIX].iter().all(|&b| b == 0)
}
