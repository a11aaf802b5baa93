//! Metadata file (`.eph`) layout
//!
//! ```text
//! format_tag        u32   (FORMAT_TAG)
//! file_version      u32   (reserved, 0)
//! asset_count       u32
//! name_list_size    u32
//! name_list_bytes   [name_list_size]
//! header_map_size   u32
//! header_map_bytes  [header_map_size]
//! ```
//!
//! All integers are little-endian.

use crate::error::{PackageError, Result};

/// On-disk layout version of the metadata file
pub const FORMAT_TAG: u32 = 0x01;

/// Reserved file version, always written as 0
pub const FILE_VERSION: u32 = 0;

/// Size of the three leading scalar fields
pub const SCALAR_HEADER_SIZE: usize = 3 * std::mem::size_of::<u32>();

/// Scalar fields at the start of the metadata file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataHeader {
    pub format_tag: u32,
    pub file_version: u32,
    pub asset_count: u32,
}

impl MetadataHeader {
    pub fn new() -> Self {
        MetadataHeader {
            format_tag: FORMAT_TAG,
            file_version: FILE_VERSION,
            asset_count: 0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.format_tag != FORMAT_TAG {
            return Err(PackageError::UnsupportedFormat(self.format_tag));
        }
        Ok(())
    }
}

impl Default for MetadataHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Full decoded contents of a metadata file
///
/// The two byte blobs are handed to `NameRegistry::deserialize` and
/// `HeaderIndex::deserialize` by the package store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataImage {
    pub header: MetadataHeader,
    pub name_list: Vec<u8>,
    pub header_map: Vec<u8>,
}

impl MetadataImage {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(
            SCALAR_HEADER_SIZE + 8 + self.name_list.len() + self.header_map.len(),
        );

        bytes.extend_from_slice(&self.header.format_tag.to_le_bytes());
        bytes.extend_from_slice(&self.header.file_version.to_le_bytes());
        bytes.extend_from_slice(&self.header.asset_count.to_le_bytes());

        bytes.extend_from_slice(&(self.name_list.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&self.name_list);

        bytes.extend_from_slice(&(self.header_map.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&self.header_map);

        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut offset = 0;

        let header = MetadataHeader {
            format_tag: read_u32(bytes, &mut offset, "format tag")?,
            file_version: read_u32(bytes, &mut offset, "file version")?,
            asset_count: read_u32(bytes, &mut offset, "asset count")?,
        };
        header.validate()?;

        let name_list_size = read_u32(bytes, &mut offset, "name list size")? as usize;
        let name_list = read_blob(bytes, &mut offset, name_list_size, "name list")?;

        let header_map_size = read_u32(bytes, &mut offset, "header map size")? as usize;
        let header_map = read_blob(bytes, &mut offset, header_map_size, "header map")?;

        Ok(MetadataImage {
            header,
            name_list,
            header_map,
        })
    }
}

fn read_u32(bytes: &[u8], offset: &mut usize, what: &'static str) -> Result<u32> {
    let field = bytes
        .get(*offset..*offset + 4)
        .ok_or(PackageError::Truncated(what))?;
    *offset += 4;
    Ok(u32::from_le_bytes([field[0], field[1], field[2], field[3]]))
}

fn read_blob(bytes: &[u8], offset: &mut usize, len: usize, what: &'static str) -> Result<Vec<u8>> {
    let blob = bytes
        .get(*offset..*offset + len)
        .ok_or(PackageError::Truncated(what))?;
    *offset += len;
    Ok(blob.to_vec())
}
