//! Asset payload compression
//!
//! Every asset is stored in the bundle file as one zlib-wrapped DEFLATE run.
//! The uncompressed length is kept in the asset's header record, so
//! decompression knows exactly how many bytes to expect.

use crate::error::{PackageError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Default DEFLATE level (zlib's default)
pub const DEFAULT_LEVEL: u32 = 6;

/// Highest DEFLATE level accepted
pub const MAX_LEVEL: u32 = 9;

/// Compress `data` at the given DEFLATE level (0-9)
pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(data.len() / 2 + 64),
        Compression::new(level.min(MAX_LEVEL)),
    );
    encoder
        .write_all(data)
        .map_err(|e| PackageError::Compress(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| PackageError::Compress(e.to_string()))
}

/// Decompress a run that must inflate to exactly `original_size` bytes
pub fn decompress(data: &[u8], original_size: usize) -> Result<Vec<u8>> {
    // Sizes come from disk, so cap the up-front allocation
    let mut out = Vec::with_capacity(original_size.min(data.len().saturating_mul(64)));
    ZlibDecoder::new(data)
        .take(original_size as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| PackageError::Decompress(e.to_string()))?;

    if out.len() != original_size {
        return Err(PackageError::Decompress(format!(
            "expected {} bytes, inflated {}",
            original_size,
            out.len()
        )));
    }
    Ok(out)
}

/// CRC-32 of a compressed run, as stored in the header record
pub fn checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}
