//! Endian-aware primitives of the descriptor wire format and the two scoped
//! stream guards used around size-prefixed sections.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;

use byteorder::{ByteOrder, ReadBytesExt, WriteBytesExt};

use crate::error::{ParseError, Result, WriteError, WriteResult};

/// Longest string (in bytes or UTF-16 code units) accepted from a stream.
pub const MAX_STRING_LEN: u32 = 16 * 1024 * 1024;

/// Bounding rectangle as stored on the wire: top, left, bottom, right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub top: u32,
    pub left: u32,
    pub bottom: u32,
    pub right: u32,
}

impl Rect {
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            top: 0,
            left: 0,
            bottom: height,
            right: width,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

#[inline]
pub fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

pub fn check_section_size(what: &'static str, size: u64, limit: u32) -> Result<()> {
    if size > limit as u64 {
        return Err(ParseError::SectionTooLarge {
            what,
            size,
            limit: limit as u64,
        });
    }
    Ok(())
}

fn latin1_decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn latin1_encode(s: &str) -> WriteResult<Vec<u8>> {
    s.chars()
        .map(|c| {
            u8::try_from(c as u32).map_err(|_| {
                WriteError::ValueOutOfRange(format!("{c:?} in {s:?} is not a single-byte character"))
            })
        })
        .collect()
}

pub trait AslReadExt: Read {
    fn read_fixed_string(&mut self, len: usize) -> Result<String> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(latin1_decode(&buf))
    }

    /// Reads a four-character type tag.
    fn read_tag(&mut self) -> Result<String> {
        self.read_fixed_string(4)
    }

    /// Reads a `u32`-prefixed string; a zero length stands for a four-byte literal.
    fn read_var_string<B: ByteOrder>(&mut self) -> Result<String> {
        let len = match self.read_u32::<B>()? {
            0 => 4,
            n => n,
        };
        check_section_size("var string", len as u64, MAX_STRING_LEN)?;
        self.read_fixed_string(len as usize)
    }

    fn read_pascal_string(&mut self) -> Result<String> {
        let len = self.read_u8()?;
        self.read_fixed_string(len as usize)
    }

    /// Reads a `u32` count followed by that many UTF-16 code units. A single
    /// trailing NUL is dropped.
    fn read_unicode_string<B: ByteOrder>(&mut self) -> Result<String> {
        let count = self.read_u32::<B>()?;
        check_section_size("unicode string", count as u64 * 2, MAX_STRING_LEN)?;
        let mut units = Vec::with_capacity(count as usize);
        for _ in 0..count {
            units.push(self.read_u16::<B>()?);
        }
        if units.last() == Some(&0) {
            units.pop();
        }
        Ok(String::from_utf16_lossy(&units))
    }

    fn read_rect<B: ByteOrder>(&mut self) -> Result<Rect> {
        Ok(Rect {
            top: self.read_u32::<B>()?,
            left: self.read_u32::<B>()?,
            bottom: self.read_u32::<B>()?,
            right: self.read_u32::<B>()?,
        })
    }

    fn expect_u16<B: ByteOrder>(&mut self, what: &'static str, expected: u16) -> Result<()> {
        let found = self.read_u16::<B>()?;
        if found != expected {
            return Err(ParseError::BadSignature {
                what,
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        Ok(())
    }

    fn expect_u32<B: ByteOrder>(&mut self, what: &'static str, expected: u32) -> Result<()> {
        let found = self.read_u32::<B>()?;
        if found != expected {
            return Err(ParseError::BadSignature {
                what,
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        Ok(())
    }

    fn expect_tag(&mut self, what: &'static str, expected: &str) -> Result<()> {
        let found = self.read_tag()?;
        if found != expected {
            return Err(ParseError::BadSignature {
                what,
                expected: expected.to_string(),
                found,
            });
        }
        Ok(())
    }
}

impl<R: Read + ?Sized> AslReadExt for R {}

pub trait AslWriteExt: Write {
    fn write_fixed_string(&mut self, s: &str) -> WriteResult<()> {
        self.write_all(&latin1_encode(s)?)?;
        Ok(())
    }

    fn write_tag(&mut self, tag: &str) -> WriteResult<()> {
        let bytes = latin1_encode(tag)?;
        if bytes.len() != 4 {
            return Err(WriteError::ValueOutOfRange(format!(
                "type tag {tag:?} is not four bytes long"
            )));
        }
        self.write_all(&bytes)?;
        Ok(())
    }

    /// Mirror of [`AslReadExt::read_var_string`]: four-byte strings are written
    /// with a zero length prefix.
    fn write_var_string<B: ByteOrder>(&mut self, s: &str) -> WriteResult<()> {
        let bytes = latin1_encode(s)?;
        if bytes.is_empty() {
            return Err(WriteError::ValueOutOfRange(
                "an empty var string cannot be encoded".to_string(),
            ));
        }
        let len = u32::try_from(bytes.len())
            .map_err(|_| WriteError::ValueOutOfRange(format!("var string of {} bytes", bytes.len())))?;
        self.write_u32::<B>(if len == 4 { 0 } else { len })?;
        self.write_all(&bytes)?;
        Ok(())
    }

    fn write_pascal_string(&mut self, s: &str) -> WriteResult<()> {
        let bytes = latin1_encode(s)?;
        let len = u8::try_from(bytes.len())
            .map_err(|_| WriteError::ValueOutOfRange(format!("pascal string {s:?} is too long")))?;
        self.write_u8(len)?;
        self.write_all(&bytes)?;
        Ok(())
    }

    /// Writes the UTF-16 form of `s` plus a terminating NUL, counted in the prefix.
    fn write_unicode_string<B: ByteOrder>(&mut self, s: &str) -> WriteResult<()> {
        let units: Vec<u16> = s.encode_utf16().chain(std::iter::once(0)).collect();
        let count = u32::try_from(units.len())
            .map_err(|_| WriteError::ValueOutOfRange("unicode string too long".to_string()))?;
        self.write_u32::<B>(count)?;
        for unit in units {
            self.write_u16::<B>(unit)?;
        }
        Ok(())
    }

    fn write_rect<B: ByteOrder>(&mut self, rect: &Rect) -> WriteResult<()> {
        self.write_u32::<B>(rect.top)?;
        self.write_u32::<B>(rect.left)?;
        self.write_u32::<B>(rect.bottom)?;
        self.write_u32::<B>(rect.right)?;
        Ok(())
    }
}

impl<W: Write + ?Sized> AslWriteExt for W {}

/// Writes a placeholder `u32` size field and patches it with the number of
/// bytes written after it once the guard is finished or dropped.
///
/// With an alignment greater than one the body is zero-padded up to the next
/// multiple of that alignment (absolute stream position) and the padding is
/// counted in the size. The stream is left positioned at the end of the body.
/// The patch also runs on drop, so the size field is valid even when writing
/// the body bailed out early.
pub struct OffsetStreamPusher<'a, W: Write + Seek + ?Sized, B: ByteOrder> {
    stream: &'a mut W,
    size_field_pos: u64,
    alignment: u64,
    done: bool,
    _order: PhantomData<B>,
}

impl<'a, W: Write + Seek + ?Sized, B: ByteOrder> OffsetStreamPusher<'a, W, B> {
    pub fn new(stream: &'a mut W, alignment: u64) -> io::Result<Self> {
        let size_field_pos = stream.stream_position()?;
        stream.write_u32::<B>(0)?;
        Ok(Self {
            stream,
            size_field_pos,
            alignment,
            done: false,
            _order: PhantomData,
        })
    }

    pub fn finish(mut self) -> io::Result<u32> {
        self.patch()
    }

    fn patch(&mut self) -> io::Result<u32> {
        self.done = true;

        let mut end = self.stream.stream_position()?;
        let aligned = align_up(end, self.alignment);
        if aligned > end {
            let padding = vec![0u8; (aligned - end) as usize];
            self.stream.write_all(&padding)?;
            end = aligned;
        }

        let size = u32::try_from(end - self.size_field_pos - 4).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "section does not fit a 32-bit size field")
        })?;
        self.stream.seek(SeekFrom::Start(self.size_field_pos))?;
        self.stream.write_u32::<B>(size)?;
        self.stream.seek(SeekFrom::Start(end))?;
        Ok(size)
    }
}

impl<W: Write + Seek + ?Sized, B: ByteOrder> Write for OffsetStreamPusher<'_, W, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl<W: Write + Seek + ?Sized, B: ByteOrder> Seek for OffsetStreamPusher<'_, W, B> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.stream.seek(pos)
    }
}

impl<W: Write + Seek + ?Sized, B: ByteOrder> Drop for OffsetStreamPusher<'_, W, B> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Err(e) = self.patch() {
            log::warn!("failed to patch section size at {}: {}", self.size_field_pos, e);
        }
    }
}

/// Bounds reads to a size-declared section and leaves the stream at the
/// declared end when finished or dropped, whatever the inner parser consumed.
pub struct OffsetVerifier<'a, R: Read + Seek + ?Sized> {
    stream: &'a mut R,
    what: &'static str,
    pos: u64,
    expected_end: u64,
    tolerance: u64,
    done: bool,
}

impl<'a, R: Read + Seek + ?Sized> OffsetVerifier<'a, R> {
    /// `tolerance` is the number of trailing padding bytes the body may leave unread.
    pub fn new(stream: &'a mut R, what: &'static str, size: u64, tolerance: u64) -> io::Result<Self> {
        let pos = stream.stream_position()?;
        Ok(Self {
            stream,
            what,
            pos,
            expected_end: pos + size,
            tolerance,
            done: false,
        })
    }

    pub fn remaining(&self) -> u64 {
        self.expected_end.saturating_sub(self.pos)
    }

    /// Drops whatever is left of the section without reporting it.
    pub fn skip_rest(mut self) -> io::Result<()> {
        self.done = true;
        self.stream.seek(SeekFrom::Start(self.expected_end))?;
        Ok(())
    }

    /// Checks the consumed length and skips to the declared end. A mismatch
    /// beyond the tolerance is an error in strict mode and a warning otherwise.
    pub fn finish(mut self, strict: bool) -> Result<()> {
        self.done = true;
        let actual = self.pos;
        self.stream.seek(SeekFrom::Start(self.expected_end))?;

        let unread = self.expected_end.saturating_sub(actual);
        if actual > self.expected_end || unread > self.tolerance {
            if strict {
                return Err(ParseError::SectionOverrun {
                    what: self.what,
                    expected: self.expected_end,
                    actual,
                });
            }
            log::warn!(
                "{} ended at {}, declared end is {}; skipping to declared end",
                self.what,
                actual,
                self.expected_end
            );
        }
        Ok(())
    }
}

impl<R: Read + Seek + ?Sized> Read for OffsetVerifier<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let limit = self.remaining().min(buf.len() as u64) as usize;
        if limit == 0 {
            return Ok(0);
        }
        let n = self.stream.read(&mut buf[..limit])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek + ?Sized> Seek for OffsetVerifier<'_, R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = self.stream.seek(pos)?;
        Ok(self.pos)
    }
}

impl<R: Read + Seek + ?Sized> Drop for OffsetVerifier<'_, R> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Err(e) = self.stream.seek(SeekFrom::Start(self.expected_end)) {
            log::warn!("failed to skip to the end of {}: {}", self.what, e);
        }
    }
}
