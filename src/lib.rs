//! # asset-pack - Binary Asset Package Store
//!
//! Packs many named, compressed binary assets into two files:
//!
//! - **Bundle file** (`<base>.epb`): append-only concatenation of
//!   DEFLATE-compressed asset runs
//! - **Metadata file** (`<base>.eph`): the asset name list and one fixed-shape
//!   header record per asset, rewritten on every change
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use asset_pack::{PackageStore, Result};
//!
//! # fn main() -> Result<()> {
//! let store = PackageStore::create("assets/level1")?;
//!
//! store.add_asset_from_memory(&[0xAB; 10000], "hero.png", 1)?;
//! let hero = store.get_asset_to_memory("hero.png")?;
//! assert_eq!(hero.len(), 10000);
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom configuration
//!
//! ```rust,no_run
//! use asset_pack::{PackageBuilder, PackageConfig, Result};
//!
//! # fn main() -> Result<()> {
//! let store = PackageBuilder::new()
//!     .path("assets/level1")
//!     .config(PackageConfig::default().with_compression_level(9))
//!     .create()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! add_asset_from_memory(bytes, key)
//!   ├─ compress (zlib)
//!   ├─ [bundle lock]  append run, note offset, insert name + header record
//!   └─ [metadata lock] rewrite <base>.eph
//!
//! get_asset_to_memory(key)
//!   ├─ [bundle lock]  look up header record, read run at offset
//!   └─ verify CRC-32, inflate to original size
//! ```

pub mod config;
pub mod core;

// Short crate:: paths for the core modules
#[allow(unused_imports)]
pub(crate) use crate::core::{
    compression, error, header, header_map, io, name_list, package, version,
};

pub use crate::config::PackageConfig;
pub use crate::core::{
    error::{PackageError, Result},
    header::{MetadataHeader, FORMAT_TAG},
    header_map::{HeaderIndex, HeaderRecord},
    io::{BUNDLE_FILE_EXT, METADATA_FILE_EXT},
    name_list::NameRegistry,
    package::{CompactionStats, PackageStore},
    version::{pack_version, unpack_version, AssetVersion},
};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Summary of one asset for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    /// Asset key
    pub key: String,

    /// Size after decompression
    pub original_size: u32,

    /// Size of the compressed run in the bundle file
    pub compressed_size: u32,

    /// Offset of the compressed run in the bundle file
    pub bundle_offset: u32,

    /// Stored version number
    pub version: u32,

    /// Version decoded as a local time, when it is a packed time
    pub timestamp: Option<NaiveDateTime>,

    /// CRC-32 of the compressed run (0 when not recorded)
    pub checksum: u32,
}

impl AssetEntry {
    /// Compressed size as a fraction of the original size
    pub fn ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        self.compressed_size as f64 / self.original_size as f64
    }
}

/// List every asset in the store, sorted by key
pub fn list_entries(store: &PackageStore) -> Vec<AssetEntry> {
    debug!("Listing {} assets", store.asset_count());
    store
        .asset_keys()
        .into_iter()
        .filter_map(|key| {
            let record = store.header_record(&key)?;
            Some(AssetEntry {
                original_size: record.original_size,
                compressed_size: record.compressed_size,
                bundle_offset: record.bundle_offset,
                version: record.version,
                timestamp: unpack_version(record.version),
                checksum: record.checksum,
                key,
            })
        })
        .collect()
}

/// Builder for creating or opening a store with a custom configuration
///
/// # Examples
///
/// ```rust,no_run
/// use asset_pack::PackageBuilder;
///
/// # fn main() -> asset_pack::Result<()> {
/// let store = PackageBuilder::new()
///     .path("assets/ui")
///     .config_file("assetpack.toml")?
///     .open()?;
/// # Ok(())
/// # }
/// ```
pub struct PackageBuilder {
    path: Option<PathBuf>,
    config: PackageConfig,
}

impl PackageBuilder {
    pub fn new() -> Self {
        PackageBuilder {
            path: None,
            config: PackageConfig::default(),
        }
    }

    /// Base path of the package (without extension)
    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn config(mut self, config: PackageConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the configuration from a TOML file
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Result<Self> {
        self.config = PackageConfig::load(path)?;
        Ok(self)
    }

    pub fn compression_level(mut self, level: u32) -> Self {
        self.config.compression_level = level;
        self
    }

    fn into_parts(self) -> Result<(PathBuf, PackageStore)> {
        let path = self.path.ok_or(PackageError::EmptyFileName)?;
        self.config.validate()?;
        Ok((path, PackageStore::new(self.config)))
    }

    /// Create a fresh package, truncating any existing files
    pub fn create(self) -> Result<PackageStore> {
        let (path, mut store) = self.into_parts()?;
        info!("Building new package at {:?}", path);
        store.create_new(&path)?;
        Ok(store)
    }

    /// Open an existing package
    pub fn open(self) -> Result<PackageStore> {
        let (path, mut store) = self.into_parts()?;
        store.open(&path)?;
        Ok(store)
    }

    /// Open the package if both files exist, otherwise create it
    pub fn open_or_create(self) -> Result<PackageStore> {
        let exists = self.path.as_ref().is_some_and(|base| {
            io::with_suffix(base, METADATA_FILE_EXT).exists()
                && io::with_suffix(base, BUNDLE_FILE_EXT).exists()
        });
        if exists {
            self.open()
        } else {
            self.create()
        }
    }
}

impl Default for PackageBuilder {
    fn default() -> Self {
        Self::new()
    }
}
