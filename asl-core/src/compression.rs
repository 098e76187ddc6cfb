use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::{ParseError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Raw,
    Rle,
    Zip,
}

impl CompressionMethod {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Raw),
            1 => Ok(Self::Rle),
            2 => Ok(Self::Zip),
            other => Err(ParseError::UnsupportedCompression(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Raw => 0,
            Self::Rle => 1,
            Self::Zip => 2,
        }
    }
}

pub fn compress(data: &[u8], method: CompressionMethod) -> Vec<u8> {
    match method {
        CompressionMethod::Raw => data.to_vec(),
        CompressionMethod::Rle => packbits_encode(data),
        CompressionMethod::Zip => zlib_encode(data),
    }
}

/// Inflates `data` into exactly `expected` bytes.
pub fn decompress(data: &[u8], expected: usize, method: CompressionMethod) -> Result<Vec<u8>> {
    let out = match method {
        CompressionMethod::Raw => data.to_vec(),
        CompressionMethod::Rle => packbits_decode(data, expected)?,
        CompressionMethod::Zip => zlib_decode(data, expected)?,
    };
    if out.len() < expected {
        return Err(ParseError::InvalidPattern(format!(
            "decompressed {} bytes, expected {}",
            out.len(),
            expected
        )));
    }
    Ok(out)
}

pub fn packbits_encode(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len() + src.len() / 128 + 1);
    let mut i = 0;
    while i < src.len() {
        let mut run = 1;
        while i + run < src.len() && run < 128 && src[i + run] == src[i] {
            run += 1;
        }
        if run >= 3 {
            out.push((1 - run as i16) as i8 as u8);
            out.push(src[i]);
            i += run;
            continue;
        }

        let start = i;
        while i < src.len() && i - start < 128 {
            if i + 2 < src.len() && src[i] == src[i + 1] && src[i] == src[i + 2] {
                break;
            }
            i += 1;
        }
        out.push((i - start - 1) as u8);
        out.extend_from_slice(&src[start..i]);
    }
    out
}

pub fn packbits_decode(src: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected);
    let mut i = 0;
    while out.len() < expected && i < src.len() {
        let n = src[i] as i8;
        i += 1;
        if n >= 0 {
            let count = n as usize + 1;
            let literal = src
                .get(i..i + count)
                .ok_or_else(|| ParseError::InvalidPattern("RLE literal runs past the row".into()))?;
            out.extend_from_slice(literal);
            i += count;
        } else if n != -128 {
            let count = (1 - n as isize) as usize;
            let byte = *src
                .get(i)
                .ok_or_else(|| ParseError::InvalidPattern("RLE repeat without a value".into()))?;
            out.resize(out.len() + count, byte);
            i += 1;
        }
    }
    if out.len() > expected {
        log::warn!("RLE row decoded to {} bytes, truncating to {}", out.len(), expected);
        out.truncate(expected);
    }
    Ok(out)
}

fn zlib_encode(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    // Writing into a Vec cannot fail.
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}

fn zlib_decode(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected);
    ZlibDecoder::new(data)
        .take(expected as u64)
        .read_to_end(&mut out)
        .map_err(|e| ParseError::InvalidPattern(format!("ZIP plane: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn packbits_matches_reference_stream() {
        // Apple's TN1023 sample.
        let packed = [
            0xFE, 0xAA, 0x02, 0x80, 0x00, 0x2A, 0xFD, 0xAA, 0x03, 0x80, 0x00, 0x2A, 0x22, 0xF7,
            0xAA,
        ];
        let unpacked = packbits_decode(&packed, 24).unwrap();
        assert_eq!(
            unpacked,
            vec![
                0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0xAA, 0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A,
                0x22, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA
            ]
        );
        assert_eq!(packbits_decode(&packbits_encode(&unpacked), 24).unwrap(), unpacked);
    }

    #[test]
    fn packbits_long_runs_split_at_128() {
        let row = vec![5u8; 300];
        let packed = packbits_encode(&row);
        assert_eq!(packed, vec![0x81, 5, 0x81, 5, 0xD5, 5]);
        assert_eq!(packbits_decode(&packed, 300).unwrap(), row);
    }

    #[test]
    fn packbits_noise_grows() {
        let row: Vec<u8> = (0..64u8).collect();
        assert_eq!(packbits_encode(&row).len(), 65);
    }

    #[test]
    fn short_rle_input_is_rejected() {
        assert!(decompress(&[0x02, 1], 3, CompressionMethod::Rle).is_err());
    }

    #[test]
    fn zip_plane() {
        let plane = vec![9u8; 1000];
        let packed = compress(&plane, CompressionMethod::Zip);
        assert!(packed.len() < plane.len());
        assert_eq!(decompress(&packed, 1000, CompressionMethod::Zip).unwrap(), plane);
    }
}
