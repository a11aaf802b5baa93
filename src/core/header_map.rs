//! Asset header index
//!
//! Maps each asset key to the fixed-shape record describing where its
//! compressed bytes live in the bundle file.
//!
//! ## Serialized layout
//!
//! ```text
//! per record:
//!   key bytes      [len]
//!   terminator     u8   (0)
//!   version        u32
//!   compressed     u32
//!   original       u32
//!   bundle_offset  u32
//!   checksum       u32
//! ```

use crate::error::{PackageError, Result};
use crate::name_list::{read_terminated_key, KEY_TERMINATOR};
use std::collections::BTreeMap;
use tracing::warn;

/// Number of u32 fields following each key
pub const RECORD_FIELD_COUNT: usize = 5;

/// Serialized size of the numeric part of a record
pub const RECORD_FIELDS_SIZE: usize = RECORD_FIELD_COUNT * std::mem::size_of::<u32>();

/// Location and shape of one asset inside the bundle file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderRecord {
    /// Caller supplied, or packed from the source file's modification time
    pub version: u32,

    /// Length of the compressed run in the bundle file
    pub compressed_size: u32,

    /// Length of the asset after decompression
    pub original_size: u32,

    /// Start of the compressed run in the bundle file
    pub bundle_offset: u32,

    /// CRC-32 of the compressed run, 0 when not recorded
    pub checksum: u32,
}

impl HeaderRecord {
    /// One past the last bundle byte owned by this record
    pub fn bundle_end(&self) -> u64 {
        self.bundle_offset as u64 + self.compressed_size as u64
    }

    fn write_fields(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.compressed_size.to_le_bytes());
        buf.extend_from_slice(&self.original_size.to_le_bytes());
        buf.extend_from_slice(&self.bundle_offset.to_le_bytes());
        buf.extend_from_slice(&self.checksum.to_le_bytes());
    }

    fn read_fields(bytes: &[u8]) -> Self {
        let field = |i: usize| {
            let at = i * 4;
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        HeaderRecord {
            version: field(0),
            compressed_size: field(1),
            original_size: field(2),
            bundle_offset: field(3),
            checksum: field(4),
        }
    }
}

/// Key -> record map for every asset in a package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderIndex {
    records: BTreeMap<String, HeaderRecord>,
}

impl HeaderIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn insert(&mut self, key: &str, record: HeaderRecord) -> Result<()> {
        if self.has(key) {
            return Err(PackageError::DuplicateKey(key.to_string()));
        }
        self.records.insert(key.to_string(), record);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Result<HeaderRecord> {
        self.records
            .remove(key)
            .ok_or_else(|| PackageError::NotFound(key.to_string()))
    }

    pub fn get(&self, key: &str) -> Option<HeaderRecord> {
        self.records.get(key).copied()
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderRecord)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Largest `bundle_offset + compressed_size` over all records
    pub fn bundle_end(&self) -> u64 {
        self.records
            .values()
            .map(HeaderRecord::bundle_end)
            .max()
            .unwrap_or(0)
    }

    /// Shift down every record at or after `base_offset`
    ///
    /// Bookkeeping for a bundle that had a run of `removed_content_size`
    /// bytes starting at `base_offset` cut out. A record still indexed inside
    /// the removed run is clamped instead of wrapping.
    pub fn repack_offsets(&mut self, removed_content_size: u32, base_offset: u32) {
        for record in self.records.values_mut() {
            if record.bundle_offset >= base_offset {
                record.bundle_offset = record.bundle_offset.saturating_sub(removed_content_size);
            }
        }
    }

    pub fn byte_size(&self) -> usize {
        self.records
            .keys()
            .map(|key| key.len() + 1 + RECORD_FIELDS_SIZE)
            .sum()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.byte_size());
        for (key, record) in &self.records {
            buf.extend_from_slice(key.as_bytes());
            buf.push(KEY_TERMINATOR);
            record.write_fields(&mut buf);
        }
        buf
    }

    /// Replace the contents with the records encoded in `buf`
    ///
    /// A record whose key is already present is skipped, the first one wins.
    pub fn deserialize(&mut self, buf: &[u8]) -> Result<()> {
        if buf.is_empty() {
            return Err(PackageError::EmptyBuffer);
        }
        self.records.clear();

        let mut index = 0;
        while index < buf.len() {
            let key = read_terminated_key(buf, &mut index)?;
            let fields = buf
                .get(index..index + RECORD_FIELDS_SIZE)
                .ok_or(PackageError::Truncated("header record fields"))?;
            let record = HeaderRecord::read_fields(fields);
            index += RECORD_FIELDS_SIZE;

            if let Err(e) = self.insert(&key, record) {
                warn!("Skipping header record: {}", e);
            }
        }
        Ok(())
    }
}
