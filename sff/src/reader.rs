//! Low-level SFF file reader.
//!
//! Reads the raw fixed-layout structures of both container revisions. Nothing
//! here interprets links, palettes or pixel data.

use std::io::{Cursor, Read};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReaderError {
    #[error("unexpected end of file")]
    UnexpectedEof,
}

/// Signature shared by both revisions, without the trailing NUL.
pub const SFF_SIGNATURE: &[u8; 11] = b"ElecbyteSpr";
/// Marker token some v2 producers write into the header.
pub const SFF2_MARKER: &[u8; 4] = b"SFF2";

pub const V1_HEADER_SIZE: usize = 32;
pub const V1_SUBENTRY_SIZE: usize = 32;
pub const V2_SPRITE_RECORD_SIZE: usize = 28;
pub const V2_PALETTE_RECORD_SIZE: usize = 16;

/// Version tuples (as stored, bytes 12..16) accepted as v2.
pub const V2_VERSIONS: [[u8; 4]; 2] = [[0, 0, 0, 2], [0, 1, 0, 2]];

#[derive(Debug, Clone)]
pub struct V1Header {
    pub signature: [u8; 12],
    pub version: [u8; 4],
    pub group_count: u32,
    pub image_count: u32,
    pub first_subentry_offset: u32,
    pub subentry_stride: u32,
}

#[derive(Debug, Clone)]
pub struct V1Subentry {
    pub next_offset: u32,
    pub payload_size: u32,
    pub axis_x: i16,
    pub axis_y: i16,
    pub group: u16,
    pub image: u16,
    pub link_index: u16,
    pub palette_flag: u8,
}

#[derive(Debug, Clone)]
pub struct V2Header {
    pub version: [u8; 4],
    pub sprite_offset: u32,
    pub sprite_count: u32,
    pub palette_offset: u32,
    pub palette_count: u32,
    pub ldata_offset: u32,
    pub ldata_length: u32,
    pub tdata_offset: u32,
    pub tdata_length: u32,
}

#[derive(Debug, Clone)]
pub struct V2SpriteRecord {
    pub group: i16,
    pub image: i16,
    pub width: u16,
    pub height: u16,
    pub axis_x: i16,
    pub axis_y: i16,
    pub link_index: u16,
    pub format: u8,
    pub color_depth: u8,
    pub relative_offset: u32,
    pub length: u32,
    pub palette_index: u16,
    pub flags: u16,
}

#[derive(Debug, Clone)]
pub struct V2PaletteRecord {
    pub group_id: u16,
    pub palette_id: u16,
    pub color_count: u16,
    pub link_index: u16,
    pub file_offset: u32,
    pub file_length: u32,
}

pub struct SffReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> SffReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    pub fn seek(&mut self, pos: u64) {
        self.cursor.set_position(pos);
    }

    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    pub fn read_u8(&mut self) -> Result<u8, ReaderError> {
        let [b] = self.read_array::<1>()?;
        Ok(b)
    }

    pub fn read_u16(&mut self) -> Result<u16, ReaderError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, ReaderError> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, ReaderError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ReaderError> {
        let mut buf = [0u8; N];
        self.cursor
            .read_exact(&mut buf)
            .map_err(|_| ReaderError::UnexpectedEof)?;
        Ok(buf)
    }

    /// Borrow `len` bytes at `offset` without moving the cursor.
    pub fn slice(&self, offset: u64, len: u64) -> Result<&'a [u8], ReaderError> {
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = usize::try_from(offset).map_err(|_| ReaderError::UnexpectedEof)?;
        let len = usize::try_from(len).map_err(|_| ReaderError::UnexpectedEof)?;
        let end = start.checked_add(len).ok_or(ReaderError::UnexpectedEof)?;
        data.get(start..end).ok_or(ReaderError::UnexpectedEof)
    }

    pub fn read_v1_header(&mut self) -> Result<V1Header, ReaderError> {
        let raw = self.slice(0, V1_HEADER_SIZE as u64)?;
        let mut reader = SffReader::new(raw);

        Ok(V1Header {
            signature: reader.read_array()?,
            version: reader.read_array()?,
            group_count: reader.read_u32()?,
            image_count: reader.read_u32()?,
            first_subentry_offset: reader.read_u32()?,
            subentry_stride: reader.read_u32()?,
        })
    }

    /// Read one 32-byte subentry. The whole record must be present, a short
    /// read means the chain is truncated.
    pub fn read_v1_subentry(&mut self, offset: u32) -> Result<V1Subentry, ReaderError> {
        let raw = self.slice(offset as u64, V1_SUBENTRY_SIZE as u64)?;
        let mut reader = SffReader::new(raw);

        Ok(V1Subentry {
            next_offset: reader.read_u32()?,
            payload_size: reader.read_u32()?,
            axis_x: reader.read_i16()?,
            axis_y: reader.read_i16()?,
            group: reader.read_u16()?,
            image: reader.read_u16()?,
            link_index: reader.read_u16()?,
            palette_flag: reader.read_u8()?,
        })
    }

    /// Read the v2 header. Fields live at fixed positions, not in sequence.
    pub fn read_v2_header(&mut self) -> Result<V2Header, ReaderError> {
        self.seek(12);
        let version = self.read_array()?;

        self.seek(0x24);
        Ok(V2Header {
            version,
            sprite_offset: self.read_u32()?,
            sprite_count: self.read_u32()?,
            palette_offset: self.read_u32()?,
            palette_count: self.read_u32()?,
            ldata_offset: self.read_u32()?,
            ldata_length: self.read_u32()?,
            tdata_offset: self.read_u32()?,
            tdata_length: self.read_u32()?,
        })
    }

    pub fn read_v2_sprite_record(
        &mut self,
        table_offset: u32,
        index: usize,
    ) -> Result<V2SpriteRecord, ReaderError> {
        let offset = table_offset as u64 + (index * V2_SPRITE_RECORD_SIZE) as u64;
        let raw = self.slice(offset, V2_SPRITE_RECORD_SIZE as u64)?;
        let mut reader = SffReader::new(raw);

        Ok(V2SpriteRecord {
            group: reader.read_i16()?,
            image: reader.read_i16()?,
            width: reader.read_u16()?,
            height: reader.read_u16()?,
            axis_x: reader.read_i16()?,
            axis_y: reader.read_i16()?,
            link_index: reader.read_u16()?,
            format: reader.read_u8()?,
            color_depth: reader.read_u8()?,
            relative_offset: reader.read_u32()?,
            length: reader.read_u32()?,
            palette_index: reader.read_u16()?,
            flags: reader.read_u16()?,
        })
    }

    pub fn read_v2_palette_record(
        &mut self,
        table_offset: u32,
        index: usize,
    ) -> Result<V2PaletteRecord, ReaderError> {
        let offset = table_offset as u64 + (index * V2_PALETTE_RECORD_SIZE) as u64;
        let raw = self.slice(offset, V2_PALETTE_RECORD_SIZE as u64)?;
        let mut reader = SffReader::new(raw);

        Ok(V2PaletteRecord {
            group_id: reader.read_u16()?,
            palette_id: reader.read_u16()?,
            color_count: reader.read_u16()?,
            link_index: reader.read_u16()?,
            file_offset: reader.read_u32()?,
            file_length: reader.read_u32()?,
        })
    }
}
