//! Embedded pattern tiles: the in-memory tile, its GIMP pattern blob and the
//! planar "virtual array list" encoding used inside pattern records.

use std::io::{Read, Seek, Write};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use uuid::Uuid;

use crate::codec::{
    check_section_size, AslReadExt, AslWriteExt, OffsetStreamPusher, OffsetVerifier, Rect,
};
use crate::compression::{self, CompressionMethod};
use crate::config::CodecConfig;
use crate::error::{ParseError, Result, WriteError, WriteResult};
use crate::ir::PatternPayload;

const PATTERN_VERSION: u32 = 1;
const VA_LIST_VERSION: u32 = 3;
const VA_LIST_CHANNELS: u32 = 24;
const GPAT_MAGIC: &[u8; 4] = b"GPAT";
/// Bytes of a plane header counted by its length field before the pixel data:
/// depth (u32), rect, depth (u16), compression (u8).
pub const PLANE_HEADER_LEN: u32 = 4 + 16 + 2 + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMode {
    Bitmap,
    Grayscale,
    Indexed,
    Rgb,
    Multichannel,
}

impl ImageMode {
    pub fn from_u32(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::Bitmap),
            1 => Ok(Self::Grayscale),
            2 => Ok(Self::Indexed),
            3 => Ok(Self::Rgb),
            7 => Ok(Self::Multichannel),
            other => Err(ParseError::UnsupportedImageMode(other)),
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            Self::Bitmap => 0,
            Self::Grayscale => 1,
            Self::Indexed => 2,
            Self::Rgb => 3,
            Self::Multichannel => 7,
        }
    }

    pub fn planes(self) -> usize {
        match self {
            Self::Rgb => 3,
            _ => 1,
        }
    }
}

/// Colour table of an indexed pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub colors: Vec<[u8; 3]>,
    pub transparent_index: Option<u8>,
}

/// A raster tile held as 32-bit ARGB pixels in little-endian memory order,
/// i.e. four bytes per pixel: blue, green, red, alpha.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternTile {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Size in bytes of `width` x `height` samples of `bytes_per_pixel` each.
fn pixel_bytes(width: u32, height: u32, bytes_per_pixel: usize) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(bytes_per_pixel))
        .ok_or_else(|| ParseError::InvalidPattern(format!("{width}x{height} pattern is too large")))
}

impl PatternTile {
    pub fn new(name: impl Into<String>, width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = pixel_bytes(width, height, 4)?;
        if pixels.len() != expected {
            return Err(ParseError::InvalidPattern(format!(
                "{}x{} tile needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self {
            name: name.into(),
            width,
            height,
            pixels,
        })
    }

    pub fn filled(name: impl Into<String>, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let [r, g, b, a] = rgba;
        Self {
            name: name.into(),
            width,
            height,
            pixels: [b, g, r, a].repeat(width as usize * height as usize),
        }
    }

    pub fn from_rgba(name: impl Into<String>, width: u32, height: u32, rgba: &[u8]) -> Result<Self> {
        let pixels = rgba
            .chunks_exact(4)
            .flat_map(|p| [p[2], p[1], p[0], p[3]])
            .collect();
        Self::new(name, width, height, pixels)
    }

    pub fn to_rgba(&self) -> Vec<u8> {
        self.pixels
            .chunks_exact(4)
            .flat_map(|p| [p[2], p[1], p[0], p[3]])
            .collect()
    }

    pub fn pixel_rgba(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let p = &self.pixels[i..i + 4];
        Some([p[2], p[1], p[0], p[3]])
    }

    /// Serialises the tile as a GIMP `.pat` file (RGBA, big-endian header).
    pub fn encode_gpat(&self) -> Vec<u8> {
        let name = self.name.as_bytes();
        let header_size = 24 + name.len() as u32 + 1;
        let mut out = Vec::with_capacity(header_size as usize + self.pixels.len());
        out.extend_from_slice(&header_size.to_be_bytes());
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(&self.width.to_be_bytes());
        out.extend_from_slice(&self.height.to_be_bytes());
        out.extend_from_slice(&4u32.to_be_bytes());
        out.extend_from_slice(GPAT_MAGIC);
        out.extend_from_slice(name);
        out.push(0);
        out.extend_from_slice(&self.to_rgba());
        out
    }

    pub fn decode_gpat(data: &[u8]) -> Result<Self> {
        let mut cursor = data;
        let header_size = cursor.read_u32::<BigEndian>()?;
        let version = cursor.read_u32::<BigEndian>()?;
        let width = cursor.read_u32::<BigEndian>()?;
        let height = cursor.read_u32::<BigEndian>()?;
        let bytes_per_pixel = cursor.read_u32::<BigEndian>()?;
        let mut magic = [0u8; 4];
        cursor.read_exact(&mut magic)?;
        if &magic != GPAT_MAGIC || version != 1 {
            return Err(ParseError::InvalidPattern("not a GIMP pattern".into()));
        }

        let name_end = header_size as usize;
        let name_bytes = data
            .get(24..name_end)
            .ok_or_else(|| ParseError::InvalidPattern("pattern header overruns the data".into()))?;
        let name = String::from_utf8_lossy(name_bytes)
            .trim_end_matches('\0')
            .to_string();

        if !(1..=4).contains(&bytes_per_pixel) {
            return Err(ParseError::InvalidPattern(format!("{bytes_per_pixel} bytes per pixel")));
        }
        let body_end = pixel_bytes(width, height, bytes_per_pixel as usize)?
            .checked_add(name_end)
            .ok_or_else(|| ParseError::InvalidPattern("pattern body overflows".into()))?;
        let body = data.get(name_end..body_end).ok_or(ParseError::Truncated)?;
        let rgba: Vec<u8> = match bytes_per_pixel {
            1 => body.iter().flat_map(|&v| [v, v, v, 255]).collect(),
            2 => body
                .chunks_exact(2)
                .flat_map(|p| [p[0], p[0], p[0], p[1]])
                .collect(),
            3 => body
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            _ => body.to_vec(),
        };
        Self::from_rgba(name, width, height, &rgba)
    }

    /// Identifier derived from the tile contents.
    pub fn content_uuid(&self) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, &self.encode_gpat()).to_string()
    }

    pub fn to_payload(&self, uuid: impl Into<String>) -> PatternPayload {
        PatternPayload {
            uuid: uuid.into(),
            name: self.name.clone(),
            data: self.encode_gpat(),
        }
    }

    pub fn from_payload(payload: &PatternPayload) -> Result<Self> {
        let mut tile = Self::decode_gpat(&payload.data)?;
        tile.name = payload.name.clone();
        Ok(tile)
    }
}

fn row_bytes(depth: u32, width: u32) -> Result<usize> {
    match depth {
        1 => Ok((width as usize).div_ceil(8)),
        8 => Ok(width as usize),
        16 => pixel_bytes(width, 1, 2),
        other => Err(ParseError::InvalidPattern(format!("unsupported depth {other}"))),
    }
}

/// Converts raw rows of any supported depth into one byte per pixel.
fn samples_to_8bit<B: ByteOrder>(data: &[u8], depth: u32, width: u32, height: u32) -> Result<Vec<u8>> {
    let stride = row_bytes(depth, width)?;
    let mut out = Vec::with_capacity(width as usize * height as usize);
    for row in data.chunks_exact(stride).take(height as usize) {
        match depth {
            1 => {
                for x in 0..width as usize {
                    let bit = row[x / 8] & (0x80 >> (x % 8));
                    out.push(if bit != 0 { 0 } else { 255 });
                }
            }
            8 => out.extend_from_slice(row),
            _ => out.extend(row.chunks_exact(2).map(|s| (B::read_u16(s) >> 8) as u8)),
        }
    }
    Ok(out)
}

fn read_plane<R: Read + Seek + ?Sized, B: ByteOrder>(
    r: &mut R,
    array_rect: &Rect,
    config: &CodecConfig,
) -> Result<Vec<u8>> {
    let written = r.read_u32::<B>()?;
    if written == 0 {
        return Err(ParseError::InvalidPattern("pattern plane is not written".into()));
    }
    let plane_len = r.read_u32::<B>()?;
    if plane_len == 0 {
        return Err(ParseError::InvalidPattern("pattern plane is empty".into()));
    }
    check_section_size("pattern plane", plane_len as u64, config.max_section_size)?;

    let mut plane = OffsetVerifier::new(r, "pattern plane", plane_len as u64, 0)?;
    let depth = plane.read_u32::<B>()?;
    let rect = plane.read_rect::<B>()?;
    if rect != *array_rect {
        return Err(ParseError::InvalidPattern("non-uniform planes are not supported".into()));
    }
    let depth2 = plane.read_u16::<B>()?;
    if depth2 as u32 != depth {
        log::warn!("pattern plane declares depth {} and {}", depth, depth2);
    }
    let method = CompressionMethod::from_u8(plane.read_u8()?)?;

    let width = rect.width();
    let height = rect.height();
    let stride = row_bytes(depth, width)?;
    let raw_len = stride
        .checked_mul(height as usize)
        .ok_or_else(|| ParseError::InvalidPattern(format!("{width}x{height} plane is too large")))?;
    check_section_size("pattern plane data", raw_len as u64, config.max_section_size)?;
    check_section_size(
        "pattern pixels",
        pixel_bytes(width, height, 4)? as u64,
        config.max_section_size,
    )?;

    let data = match method {
        CompressionMethod::Raw => {
            if raw_len as u64 > plane.remaining() {
                return Err(ParseError::InvalidPattern(format!(
                    "raw plane needs {} bytes, only {} declared",
                    raw_len,
                    plane.remaining()
                )));
            }
            let mut data = vec![0u8; raw_len];
            plane.read_exact(&mut data)?;
            data
        }
        CompressionMethod::Rle => {
            if height as u64 * 2 > plane.remaining() {
                return Err(ParseError::InvalidPattern(format!(
                    "RLE row table for {} rows does not fit in {} bytes",
                    height,
                    plane.remaining()
                )));
            }
            let mut row_sizes = Vec::with_capacity(height as usize);
            for _ in 0..height {
                row_sizes.push(plane.read_u16::<B>()?);
            }
            let mut data = Vec::with_capacity(raw_len);
            for size in row_sizes {
                let mut packed = vec![0u8; size as usize];
                plane.read_exact(&mut packed)?;
                data.extend(compression::decompress(&packed, stride, CompressionMethod::Rle)?);
            }
            data
        }
        CompressionMethod::Zip => {
            let mut packed = vec![0u8; plane.remaining() as usize];
            plane.read_exact(&mut packed)?;
            compression::decompress(&packed, raw_len, CompressionMethod::Zip)?
        }
    };
    plane.finish(config.strict)?;

    samples_to_8bit::<B>(&data, depth, width, height)
}

/// Reads a virtual array list and returns BGRA pixels plus the tile size.
pub fn read_virtual_array_list<R: Read + Seek + ?Sized, B: ByteOrder>(
    r: &mut R,
    mode: ImageMode,
    palette: Option<&Palette>,
    config: &CodecConfig,
) -> Result<(u32, u32, Vec<u8>)> {
    r.expect_u32::<B>("virtual array list version", VA_LIST_VERSION)?;
    let len = r.read_u32::<B>()?;
    check_section_size("virtual array list", len as u64, config.max_section_size)?;

    let mut list = OffsetVerifier::new(r, "virtual array list", len as u64, 0)?;
    let rect = list.read_rect::<B>()?;
    list.expect_u32::<B>("virtual array list channel count", VA_LIST_CHANNELS)?;
    if rect.is_empty() {
        return Err(ParseError::InvalidPattern("empty pattern bounds".into()));
    }

    let mut planes = Vec::with_capacity(mode.planes());
    for _ in 0..mode.planes() {
        planes.push(read_plane::<_, B>(&mut list, &rect, config)?);
    }
    // Alpha and mask channels that may follow are not kept.
    list.skip_rest()?;

    let mut pixels = vec![255u8; pixel_bytes(rect.width(), rect.height(), 4)?];
    for (i, px) in pixels.chunks_exact_mut(4).enumerate() {
        match mode {
            ImageMode::Rgb => {
                for (k, plane) in planes.iter().enumerate() {
                    px[2 - k] = plane[i];
                }
            }
            ImageMode::Indexed => {
                let index = planes[0][i];
                let color = palette
                    .and_then(|p| p.colors.get(index as usize))
                    .copied()
                    .unwrap_or([0, 0, 0]);
                px[0] = color[2];
                px[1] = color[1];
                px[2] = color[0];
                if palette.and_then(|p| p.transparent_index) == Some(index) {
                    px[3] = 0;
                }
            }
            _ => {
                let v = planes[0][i];
                px[0] = v;
                px[1] = v;
                px[2] = v;
            }
        }
    }
    Ok((rect.width(), rect.height(), pixels))
}

fn write_plane<W: Write + Seek + ?Sized, B: ByteOrder>(
    w: &mut W,
    rect: &Rect,
    samples: &[u8],
) -> WriteResult<()> {
    let width = rect.width() as usize;
    let rows: Vec<Vec<u8>> = samples
        .chunks_exact(width)
        .map(compression::packbits_encode)
        .collect();
    let rle_len: usize = rows.iter().map(|r| r.len() + 2).sum();
    let method = if rle_len < samples.len() && rows.iter().all(|r| r.len() <= u16::MAX as usize) {
        CompressionMethod::Rle
    } else {
        CompressionMethod::Raw
    };

    w.write_u32::<B>(1)?;
    let mut plane = OffsetStreamPusher::<_, B>::new(w, 0)?;
    plane.write_u32::<B>(8)?;
    plane.write_rect::<B>(rect)?;
    plane.write_u16::<B>(8)?;
    plane.write_u8(method.as_u8())?;
    match method {
        CompressionMethod::Rle => {
            for row in &rows {
                plane.write_u16::<B>(row.len() as u16)?;
            }
            for row in &rows {
                plane.write_all(row)?;
            }
        }
        _ => plane.write_all(samples)?,
    }
    plane.finish()?;
    Ok(())
}

/// Writes the tile as three 8-bit planes, red first.
pub fn write_virtual_array_list<W: Write + Seek + ?Sized, B: ByteOrder>(
    w: &mut W,
    tile: &PatternTile,
) -> WriteResult<()> {
    let rect = Rect::from_size(tile.width, tile.height);
    w.write_u32::<B>(VA_LIST_VERSION)?;
    let mut list = OffsetStreamPusher::<_, B>::new(w, 0)?;
    list.write_rect::<B>(&rect)?;
    list.write_u32::<B>(VA_LIST_CHANNELS)?;
    for k in 0..3 {
        let samples: Vec<u8> = tile.pixels.chunks_exact(4).map(|p| p[2 - k]).collect();
        write_plane::<_, B>(&mut list, &rect, &samples)?;
    }
    list.finish()?;
    Ok(())
}

/// Reads one size-prefixed pattern record.
pub fn read_pattern_record<R: Read + Seek + ?Sized, B: ByteOrder>(
    r: &mut R,
    config: &CodecConfig,
) -> Result<PatternPayload> {
    let size = crate::codec::align_up(r.read_u32::<B>()? as u64, 4);
    check_section_size("pattern record", size, config.max_section_size)?;
    let mut record = OffsetVerifier::new(r, "pattern record", size, 3)?;

    record.expect_u32::<B>("pattern version", PATTERN_VERSION)?;
    let mode = ImageMode::from_u32(record.read_u32::<B>()?)?;
    let height = record.read_u16::<B>()?;
    let width = record.read_u16::<B>()?;
    let name = record.read_unicode_string::<B>()?;
    let uuid = record.read_pascal_string()?;

    let palette = if mode == ImageMode::Indexed {
        let mut colors = Vec::with_capacity(256);
        for _ in 0..256 {
            let mut rgb = [0u8; 3];
            record.read_exact(&mut rgb)?;
            colors.push(rgb);
        }
        let valid = record.read_u16::<B>()?;
        colors.truncate(valid.clamp(1, 256) as usize);
        let transparent = record.read_u16::<B>()?;
        Some(Palette {
            colors,
            transparent_index: u8::try_from(transparent).ok(),
        })
    } else {
        None
    };

    let (tile_width, tile_height, pixels) =
        read_virtual_array_list::<_, B>(&mut record, mode, palette.as_ref(), config)?;
    if tile_width != width as u32 || tile_height != height as u32 {
        log::warn!(
            "pattern {:?} declares {}x{} but its planes are {}x{}",
            name,
            width,
            height,
            tile_width,
            tile_height
        );
    }
    record.finish(config.strict)?;

    let tile = PatternTile::new(name, tile_width, tile_height, pixels)?;
    log::debug!("read pattern {:?} ({}) {}x{}", tile.name, uuid, tile.width, tile.height);
    Ok(tile.to_payload(uuid))
}

/// Writes one pattern record, padded to a four-byte boundary.
pub fn write_pattern_record<W: Write + Seek + ?Sized, B: ByteOrder>(
    w: &mut W,
    payload: &PatternPayload,
) -> WriteResult<()> {
    let tile = PatternTile::from_payload(payload)
        .map_err(|e| WriteError::InvalidDocument(format!("pattern {:?}: {e}", payload.uuid)))?;
    let width = u16::try_from(tile.width)
        .map_err(|_| WriteError::ValueOutOfRange(format!("pattern width {}", tile.width)))?;
    let height = u16::try_from(tile.height)
        .map_err(|_| WriteError::ValueOutOfRange(format!("pattern height {}", tile.height)))?;
    if width == 0 || height == 0 {
        return Err(WriteError::ValueOutOfRange(format!(
            "pattern {:?} has no pixels",
            payload.uuid
        )));
    }

    let mut record = OffsetStreamPusher::<_, B>::new(w, 4)?;
    record.write_u32::<B>(PATTERN_VERSION)?;
    record.write_u32::<B>(ImageMode::Rgb.as_u32())?;
    record.write_u16::<B>(height)?;
    record.write_u16::<B>(width)?;
    record.write_unicode_string::<B>(&payload.name)?;
    record.write_pascal_string(&payload.uuid)?;
    write_virtual_array_list::<_, B>(&mut record, &tile)?;
    record.finish()?;
    Ok(())
}
