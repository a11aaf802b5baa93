//! Package store
//!
//! Ties a [`NameRegistry`] and a [`HeaderIndex`] to the two files backing a
//! package:
//!
//! ```text
//! <base>.eph   metadata: scalar header + name list + header map
//! <base>.epb   bundle:   concatenated compressed asset runs
//! ```
//!
//! ## Locking
//!
//! - `bundle` serializes every bundle read and write. It is held across
//!   "append and remember the offset" and across record lookup + read, so
//!   offsets never move under a reader. A remove holds it through its
//!   metadata rewrite and rollback, so compaction never sees a half-done
//!   remove.
//! - `metadata` serializes metadata file saves and reads.
//! - `catalog` guards the in-memory collections and is always the innermost
//!   lock.
//!
//! Lock order is bundle, then metadata, then catalog. An add releases the
//! bundle lock before rewriting the metadata file, so a crash in between
//! leaves unreferenced bytes at the end of the bundle. Readers only trust
//! the metadata file, and [`PackageStore::compact`] reclaims such runs.

use crate::compression;
use crate::config::PackageConfig;
use crate::error::{PackageError, Result};
use crate::header::{MetadataHeader, MetadataImage};
use crate::header_map::{HeaderIndex, HeaderRecord};
use crate::io::{with_suffix, BundleFile, MetadataFile, BUNDLE_FILE_EXT, METADATA_FILE_EXT};
use crate::name_list::{check_key, NameRegistry};
use crate::version::{unpack_version, version_from_file_time, AssetVersion};
use chrono::NaiveDateTime;
use parking_lot::{Mutex, RwLock};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// In-memory view of the metadata file
#[derive(Debug, Default)]
struct Catalog {
    header: MetadataHeader,
    names: NameRegistry,
    headers: HeaderIndex,
}

impl Catalog {
    fn has(&self, key: &str) -> bool {
        self.names.has(key) || self.headers.has(key)
    }

    /// Insert into both collections or neither
    fn insert(&mut self, key: &str, record: HeaderRecord) -> Result<()> {
        self.names.append(key)?;
        if let Err(e) = self.headers.insert(key, record) {
            let _ = self.names.remove(key);
            return Err(e);
        }
        self.header.asset_count += 1;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<HeaderRecord> {
        if !self.names.has(key) || !self.headers.has(key) {
            return Err(PackageError::NotFound(key.to_string()));
        }
        self.names.remove(key)?;
        let record = self.headers.remove(key)?;
        self.header.asset_count -= 1;
        Ok(record)
    }

    fn to_image(&self) -> MetadataImage {
        MetadataImage {
            header: self.header,
            name_list: self.names.serialize(),
            header_map: self.headers.serialize(),
        }
    }

    fn from_image(image: &MetadataImage) -> Result<Self> {
        let mut catalog = Catalog {
            header: image.header,
            ..Default::default()
        };
        if !image.name_list.is_empty() {
            catalog.names.deserialize(&image.name_list)?;
        }
        if !image.header_map.is_empty() {
            catalog.headers.deserialize(&image.header_map)?;
        }

        if catalog.names.len() != catalog.headers.count() {
            return Err(PackageError::CorruptMetadata(format!(
                "{} names but {} header records",
                catalog.names.len(),
                catalog.headers.count()
            )));
        }
        if let Some(missing) = catalog.names.iter().find(|name| !catalog.headers.has(name)) {
            return Err(PackageError::CorruptMetadata(format!(
                "name {:?} has no header record",
                missing
            )));
        }
        if catalog.header.asset_count as usize != catalog.names.len() {
            return Err(PackageError::CorruptMetadata(format!(
                "asset count {} does not match {} stored assets",
                catalog.header.asset_count,
                catalog.names.len()
            )));
        }
        Ok(catalog)
    }
}

/// Outcome of a bundle compaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionStats {
    /// Bundle length before compaction
    pub bundle_len_before: u64,
    /// Bundle length after compaction
    pub bundle_len_after: u64,
    /// Unreferenced runs cut out of the bundle
    pub runs_removed: usize,
}

impl CompactionStats {
    pub fn reclaimed(&self) -> u64 {
        self.bundle_len_before - self.bundle_len_after
    }
}

/// Asset package backed by a metadata file and a bundle file
///
/// A store is either closed (no files held) or open. [`create_new`] and
/// [`open`] open it; [`reset`] and [`close`] close it. Every other operation
/// fails with [`PackageError::NotOpen`] on a closed store.
///
/// Adds and reads take `&self` and may run concurrently from many threads.
///
/// [`create_new`]: PackageStore::create_new
/// [`open`]: PackageStore::open
/// [`reset`]: PackageStore::reset
/// [`close`]: PackageStore::close
pub struct PackageStore {
    config: PackageConfig,
    base_path: Option<PathBuf>,
    metadata: Mutex<Option<MetadataFile>>,
    bundle: Mutex<Option<BundleFile>>,
    catalog: RwLock<Catalog>,
}

impl PackageStore {
    /// Create a closed store
    pub fn new(config: PackageConfig) -> Self {
        PackageStore {
            config,
            base_path: None,
            metadata: Mutex::new(None),
            bundle: Mutex::new(None),
            catalog: RwLock::new(Catalog::default()),
        }
    }

    /// Create a fresh package at `base` with the default configuration
    pub fn create<P: AsRef<Path>>(base: P) -> Result<Self> {
        let mut store = Self::new(PackageConfig::default());
        store.create_new(base)?;
        Ok(store)
    }

    /// Open an existing package at `base` with the default configuration
    pub fn open_existing<P: AsRef<Path>>(base: P) -> Result<Self> {
        let mut store = Self::new(PackageConfig::default());
        store.open(base)?;
        Ok(store)
    }

    /// Create (or truncate) both package files and write an empty metadata image
    pub fn create_new<P: AsRef<Path>>(&mut self, base: P) -> Result<()> {
        self.reset();
        let result = self.create_files(base.as_ref());
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn create_files(&mut self, base: &Path) -> Result<()> {
        if base.as_os_str().is_empty() {
            return Err(PackageError::EmptyFileName);
        }
        info!("Creating asset package {:?}", base);

        let metadata = MetadataFile::create(with_suffix(base, METADATA_FILE_EXT))?;
        let bundle = BundleFile::create(with_suffix(base, BUNDLE_FILE_EXT))?;
        debug!("Metadata {:?}, bundle {:?}", metadata.path(), bundle.path());
        *self.metadata.get_mut() = Some(metadata);
        *self.bundle.get_mut() = Some(bundle);
        self.base_path = Some(base.to_path_buf());

        self.save_metadata_file()
    }

    /// Open both files of an existing package and load its metadata
    pub fn open<P: AsRef<Path>>(&mut self, base: P) -> Result<()> {
        self.reset();
        let result = self.open_files(base.as_ref());
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn open_files(&mut self, base: &Path) -> Result<()> {
        if base.as_os_str().is_empty() {
            return Err(PackageError::EmptyFileName);
        }
        info!("Opening asset package {:?}", base);

        let metadata = MetadataFile::open(with_suffix(base, METADATA_FILE_EXT))?;
        let bundle = BundleFile::open(with_suffix(base, BUNDLE_FILE_EXT))?;
        debug!("Metadata {:?}, bundle {:?}", metadata.path(), bundle.path());
        *self.metadata.get_mut() = Some(metadata);
        *self.bundle.get_mut() = Some(bundle);
        self.base_path = Some(base.to_path_buf());

        self.read_metadata_file()?;

        let bundle_len = self.bundle_len()?;
        let records_end = self.catalog.get_mut().headers.bundle_end();
        if records_end > bundle_len {
            return Err(PackageError::CorruptMetadata(format!(
                "records reach byte {} but bundle holds {} bytes",
                records_end, bundle_len
            )));
        }

        info!(
            "Opened asset package {:?} with {} assets",
            base,
            self.asset_count()
        );
        Ok(())
    }

    /// Close both files and drop all in-memory state
    pub fn reset(&mut self) {
        *self.metadata.get_mut() = None;
        *self.bundle.get_mut() = None;
        *self.catalog.get_mut() = Catalog::default();
        self.base_path = None;
    }

    /// Close the package
    pub fn close(mut self) {
        if let Some(base) = &self.base_path {
            info!("Closing asset package {:?}", base);
        }
        self.reset();
    }

    pub fn is_open(&self) -> bool {
        let bundle_open = self.bundle.lock().is_some();
        let metadata_open = self.metadata.lock().is_some();
        bundle_open && metadata_open
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(PackageError::NotOpen)
        }
    }

    /// Base path the package files were derived from
    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    pub fn config(&self) -> &PackageConfig {
        &self.config
    }

    /// Scalar fields as they will be written to the metadata file
    pub fn metadata_header(&self) -> MetadataHeader {
        self.catalog.read().header
    }

    /// Add the contents of a file under `key`
    pub fn add_asset_from_file<P: AsRef<Path>>(
        &self,
        file_path: P,
        key: &str,
        version: impl Into<AssetVersion>,
    ) -> Result<HeaderRecord> {
        let file_path = file_path.as_ref();
        if file_path.as_os_str().is_empty() {
            return Err(PackageError::EmptyFileName);
        }
        check_key(key)?;
        self.ensure_open()?;

        let version = match version.into() {
            AssetVersion::Explicit(version) => version,
            AssetVersion::FileTime => version_from_file_time(file_path)?,
        };
        let bytes = std::fs::read(file_path)?;
        self.add_asset_from_memory(&bytes, key, version)
    }

    /// Compress `bytes`, append them to the bundle and record them under `key`
    pub fn add_asset_from_memory(&self, bytes: &[u8], key: &str, version: u32) -> Result<HeaderRecord> {
        if bytes.is_empty() {
            return Err(PackageError::EmptyBuffer);
        }
        check_key(key)?;
        self.ensure_open()?;

        let original_size = u32::try_from(bytes.len()).map_err(|_| PackageError::BundleTooLarge)?;
        let compressed = compression::compress(bytes, self.config.compression_level)?;
        let compressed_size =
            u32::try_from(compressed.len()).map_err(|_| PackageError::BundleTooLarge)?;
        let checksum = compression::checksum(&compressed);

        let record = {
            let mut guard = self.bundle.lock();
            let bundle = guard.as_mut().ok_or(PackageError::NotOpen)?;

            if self.catalog.read().has(key) {
                return Err(PackageError::DuplicateKey(key.to_string()));
            }
            if bundle.len()? + compressed_size as u64 > u32::MAX as u64 {
                return Err(PackageError::BundleTooLarge);
            }

            let offset = bundle.append(&compressed, self.config.sync_on_write)?;
            let record = HeaderRecord {
                version,
                compressed_size,
                original_size,
                bundle_offset: offset as u32,
                checksum,
            };
            self.catalog.write().insert(key, record)?;
            record
        };

        if let Err(e) = self.save_metadata_file() {
            warn!("Rolling back {} after metadata write failure: {}", key, e);
            if let Err(rollback) = self.catalog.write().remove(key) {
                error!("Rollback of {} failed: {}", key, rollback);
            }
            return Err(e);
        }

        debug!(
            "Added {} ({} -> {} bytes at offset {})",
            key, record.original_size, record.compressed_size, record.bundle_offset
        );
        Ok(record)
    }

    /// Read and decompress the asset stored under `key`
    pub fn get_asset_to_memory(&self, key: &str) -> Result<Vec<u8>> {
        if key.is_empty() {
            return Err(PackageError::EmptyKey);
        }

        let (record, compressed) = {
            let mut guard = self.bundle.lock();
            let bundle = guard.as_mut().ok_or(PackageError::NotOpen)?;

            let record = self
                .catalog
                .read()
                .headers
                .get(key)
                .ok_or_else(|| PackageError::NotFound(key.to_string()))?;
            if record.original_size == 0 {
                return Err(PackageError::ZeroSizeAsset(key.to_string()));
            }

            let (compressed, read) =
                bundle.read_at(record.bundle_offset as u64, record.compressed_size as usize)?;
            if read != record.compressed_size as usize {
                return Err(PackageError::ShortRead {
                    expected: record.compressed_size as usize,
                    actual: read,
                });
            }
            (record, compressed)
        };

        if self.config.verify_checksums {
            verify_checksum(key, &record, &compressed)?;
        }
        let data = compression::decompress(&compressed, record.original_size as usize)?;

        debug!("Read {} ({} bytes)", key, data.len());
        Ok(data)
    }

    /// Like [`get_asset_to_memory`](Self::get_asset_to_memory), but any failure is `None`
    pub fn try_get_asset(&self, key: &str) -> Option<Vec<u8>> {
        match self.get_asset_to_memory(key) {
            Ok(data) => Some(data),
            Err(e) => {
                debug!("Asset {} unavailable: {}", key, e);
                None
            }
        }
    }

    /// Decompress the asset stored under `key` into `file_path`, truncating it
    pub fn get_asset_to_file<P: AsRef<Path>>(&self, file_path: P, key: &str) -> Result<()> {
        let file_path = file_path.as_ref();
        if file_path.as_os_str().is_empty() {
            return Err(PackageError::EmptyFileName);
        }
        let data = self.get_asset_to_memory(key)?;

        let mut output = File::create(file_path)?;
        output.write_all(&data)?;
        output.flush()?;

        let written = output.metadata()?.len();
        if written != data.len() as u64 {
            return Err(PackageError::WriteSizeCheck {
                expected: data.len() as u64,
                actual: written,
            });
        }
        Ok(())
    }

    /// Logically delete an asset
    ///
    /// The bundle bytes stay in place until [`compact`](Self::compact) runs.
    pub fn remove_asset(&self, key: &str) -> Result<HeaderRecord> {
        if key.is_empty() {
            return Err(PackageError::EmptyKey);
        }
        let guard = self.bundle.lock();
        if guard.is_none() {
            return Err(PackageError::NotOpen);
        }

        let record = self.catalog.write().remove(key)?;
        if let Err(e) = self.save_metadata_file() {
            warn!("Restoring {} after metadata write failure: {}", key, e);
            if let Err(rollback) = self.catalog.write().insert(key, record) {
                error!("Restore of {} failed: {}", key, rollback);
            }
            return Err(e);
        }
        drop(guard);

        debug!("Removed {} ({} bundle bytes now unreferenced)", key, record.compressed_size);
        Ok(record)
    }

    /// Cut every unreferenced run out of the bundle file and shift offsets down
    ///
    /// Unreferenced runs come from removed assets and from adds interrupted
    /// before their metadata rewrite. The bundle is rewritten in place before
    /// the metadata file, so this is not crash-safe.
    pub fn compact(&self) -> Result<CompactionStats> {
        let stats = {
            let mut guard = self.bundle.lock();
            let bundle = guard.as_mut().ok_or(PackageError::NotOpen)?;
            let mut catalog = self.catalog.write();

            let bundle_len_before = bundle.len()?;
            let mut runs: Vec<(u64, u64)> = catalog
                .headers
                .iter()
                .map(|(_, record)| (record.bundle_offset as u64, record.bundle_end()))
                .collect();
            runs.sort_unstable();

            let mut gaps = Vec::new();
            let mut live_end = 0u64;
            for (start, end) in runs {
                if start > live_end {
                    gaps.push((live_end, start));
                }
                live_end = live_end.max(end);
            }
            if live_end > bundle_len_before {
                return Err(PackageError::CorruptMetadata(format!(
                    "records reach byte {} but bundle holds {} bytes",
                    live_end, bundle_len_before
                )));
            }

            let trailing = bundle_len_before > live_end;
            if gaps.is_empty() && !trailing {
                return Ok(CompactionStats {
                    bundle_len_before,
                    bundle_len_after: bundle_len_before,
                    runs_removed: 0,
                });
            }

            let content = bundle.read_all()?;
            let mut packed = Vec::with_capacity(live_end as usize);
            let mut cursor = 0usize;
            for &(start, end) in &gaps {
                packed.extend_from_slice(&content[cursor..start as usize]);
                cursor = end as usize;
            }
            packed.extend_from_slice(&content[cursor..live_end as usize]);
            bundle.rewrite(&packed)?;

            // Highest gap first, so lower gaps still see original offsets
            for &(start, end) in gaps.iter().rev() {
                catalog
                    .headers
                    .repack_offsets((end - start) as u32, start as u32);
            }

            CompactionStats {
                bundle_len_before,
                bundle_len_after: packed.len() as u64,
                runs_removed: gaps.len() + usize::from(trailing),
            }
        };

        self.save_metadata_file()?;
        info!(
            "Compacted bundle: {} -> {} bytes ({} runs removed)",
            stats.bundle_len_before, stats.bundle_len_after, stats.runs_removed
        );
        Ok(stats)
    }

    /// Check every record against the bundle: bounds, checksum and decompression
    pub fn verify(&self) -> Result<()> {
        let mut guard = self.bundle.lock();
        let bundle = guard.as_mut().ok_or(PackageError::NotOpen)?;
        let catalog = self.catalog.read();
        let bundle_len = bundle.len()?;

        for (key, record) in catalog.headers.iter() {
            if record.bundle_end() > bundle_len {
                return Err(PackageError::CorruptMetadata(format!(
                    "{} ends at byte {} past bundle length {}",
                    key,
                    record.bundle_end(),
                    bundle_len
                )));
            }
            let (compressed, _) =
                bundle.read_at(record.bundle_offset as u64, record.compressed_size as usize)?;
            verify_checksum(key, record, &compressed)?;
            compression::decompress(&compressed, record.original_size as usize)?;
        }
        Ok(())
    }

    pub fn header_record(&self, key: &str) -> Option<HeaderRecord> {
        self.catalog.read().headers.get(key)
    }

    /// Uncompressed size of an asset, 0 if missing
    pub fn original_size(&self, key: &str) -> u32 {
        self.header_record(key)
            .map(|record| record.original_size)
            .unwrap_or(0)
    }

    /// Local time decoded from the asset's version
    ///
    /// `None` if the asset is missing or its version is not a packed time.
    pub fn timestamp(&self, key: &str) -> Option<NaiveDateTime> {
        self.header_record(key)
            .and_then(|record| unpack_version(record.version))
    }

    pub fn has_asset(&self, key: &str) -> bool {
        self.catalog.read().names.has(key)
    }

    pub fn asset_count(&self) -> usize {
        self.catalog.read().header.asset_count as usize
    }

    /// All asset keys, sorted
    pub fn asset_keys(&self) -> Vec<String> {
        self.catalog.read().names.iter().map(str::to_string).collect()
    }

    /// Current bundle file length
    pub fn bundle_len(&self) -> Result<u64> {
        let mut guard = self.bundle.lock();
        guard.as_mut().ok_or(PackageError::NotOpen)?.len()
    }

    /// Serialize the scalar header and both collections into the metadata file
    pub fn save_metadata_file(&self) -> Result<()> {
        let mut guard = self.metadata.lock();
        let file = guard.as_mut().ok_or(PackageError::NotOpen)?;
        let image = self.catalog.read().to_image();
        file.write_all(&image.to_bytes(), self.config.atomic_metadata)
    }

    /// Rebuild both collections from the metadata file
    pub fn read_metadata_file(&self) -> Result<()> {
        let mut guard = self.metadata.lock();
        let file = guard.as_mut().ok_or(PackageError::NotOpen)?;
        let image = MetadataImage::from_bytes(&file.read_all()?)?;
        let catalog = Catalog::from_image(&image)?;
        *self.catalog.write() = catalog;
        Ok(())
    }

    /// Locked positional read from the bundle file
    ///
    /// Returns the buffer and how many bytes were actually read.
    pub fn read_bundle_content(&self, offset: u32, size: u32) -> Result<(Vec<u8>, usize)> {
        let mut guard = self.bundle.lock();
        let bundle = guard.as_mut().ok_or(PackageError::NotOpen)?;
        bundle.read_at(offset as u64, size as usize)
    }
}

fn verify_checksum(key: &str, record: &HeaderRecord, compressed: &[u8]) -> Result<()> {
    if record.checksum == 0 {
        return Ok(());
    }
    let computed = compression::checksum(compressed);
    if computed != record.checksum {
        return Err(PackageError::ChecksumMismatch {
            key: key.to_string(),
            stored: record.checksum,
            computed,
        });
    }
    Ok(())
}
